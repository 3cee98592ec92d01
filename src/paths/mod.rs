//! Tilde expansion for configured paths.
//!
//! [`PathResolver::expand_path`] turns `~`, `~/rest` and `~user/rest` into
//! absolute paths. Named users are resolved through a lazily built
//! [`UserDirectory`].

pub mod users;

use std::path::{MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path, PathBuf, is_separator};

pub use users::{
    DirectoryService, NoDirectoryService, UserDirectory, UserList, UserRecord,
    platform_directory_service,
};

/// Expands `~` prefixes against the current user's home and the user list.
#[derive(Debug)]
pub struct PathResolver {
    home: Option<PathBuf>,
    users: UserDirectory,
}

impl PathResolver {
    pub const fn new(home: Option<PathBuf>, users: UserDirectory) -> Self {
        Self { home, users }
    }

    /// The current user's home directory and the system user list.
    pub fn system() -> Self {
        Self::new(dirs::home_dir(), UserDirectory::system())
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub const fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub const fn users_mut(&mut self) -> &mut UserDirectory {
        &mut self.users
    }

    /// Expand a leading `~` or `~user`.
    ///
    /// The path is normalized and loses trailing separators. Unknown users,
    /// users whose home does not exist, and the `~-` / `~+` forms are left
    /// unexpanded.
    pub fn expand_path(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        let path = normalize(path);
        let Some(rest) = path.strip_prefix('~') else {
            return path;
        };

        let (name, tail) = match rest.find(is_separator) {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };

        if name.is_empty() {
            return self
                .home
                .as_deref()
                .map_or(path.clone(), |home| join(home, tail));
        }
        if name == "-" || name == "+" {
            return path;
        }
        match self.users.lookup(name) {
            Some(user) if user.home.is_dir() => join(&user.home, tail),
            Some(_) => {
                tracing::debug!(user = name, "home directory missing, leaving path unexpanded");
                path
            }
            None => path,
        }
    }
}

fn join(base: &Path, tail: &str) -> String {
    let joined = if tail.is_empty() {
        base.to_path_buf()
    } else {
        base.join(tail)
    };
    joined.to_string_lossy().into_owned()
}

/// Lexically normalize a path: collapse repeated separators, `.` and `..`,
/// and drop trailing separators.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with(is_separator);
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(is_separator) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join(MAIN_SEPARATOR_STR);
    if absolute {
        format!("{MAIN_SEPARATOR}{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

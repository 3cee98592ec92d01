//! Account lookup for `~user` expansion.
//!
//! The user list is merged from two sources:
//! - the account database (`/etc/passwd` shape, or the ten-field BSD
//!   `master.passwd` shape with password-aging columns)
//! - a platform directory service, when one exists, exporting a JSON list
//!   of records whose attributes are a string or a list of strings

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::Deserialize;

/// Default account database location.
pub const ACCOUNT_DATABASE: &str = "/etc/passwd";

/// One account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub password: String,
    pub uid: Option<i64>,
    pub gid: Option<i64>,
    /// Login class (BSD only).
    pub class: Option<String>,
    /// Password change time (BSD only).
    pub change: Option<String>,
    /// Account expiry time (BSD only).
    pub expire: Option<String>,
    pub gecos: String,
    pub home: PathBuf,
    pub shell: String,
}

/// Accounts keyed by login name.
pub type UserList = HashMap<String, UserRecord>;

/// Parse an account database, skipping blank lines, comments and lines of
/// an unknown shape.
pub fn parse_account_database(text: &str) -> Vec<UserRecord> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let record = parse_account_line(line);
            if record.is_none() {
                tracing::debug!(line, "skipping malformed account entry");
            }
            record
        })
        .collect()
}

fn parse_account_line(line: &str) -> Option<UserRecord> {
    let fields: Vec<&str> = line.split(':').collect();
    let record = match fields.as_slice() {
        [name, password, uid, gid, gecos, home, shell] => UserRecord {
            name: (*name).to_string(),
            password: (*password).to_string(),
            uid: uid.parse().ok(),
            gid: gid.parse().ok(),
            gecos: (*gecos).to_string(),
            home: PathBuf::from(*home),
            shell: (*shell).to_string(),
            ..UserRecord::default()
        },
        [name, password, uid, gid, class, change, expire, gecos, home, shell] => UserRecord {
            name: (*name).to_string(),
            password: (*password).to_string(),
            uid: uid.parse().ok(),
            gid: gid.parse().ok(),
            class: Some((*class).to_string()),
            change: Some((*change).to_string()),
            expire: Some((*expire).to_string()),
            gecos: (*gecos).to_string(),
            home: PathBuf::from(*home),
            shell: (*shell).to_string(),
        },
        _ => return None,
    };
    (!record.name.is_empty()).then_some(record)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AttributeValue {
    One(String),
    Many(Vec<String>),
}

impl AttributeValue {
    fn first(&self) -> Option<&str> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }
}

/// Parse a directory-service export.
///
/// Records that fail to decode are logged and skipped.
pub fn parse_directory_payload(payload: &str) -> Vec<UserRecord> {
    let records: Vec<serde_json::Value> = match serde_json::from_str(payload) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(%err, "directory service payload is not a record list");
            return Vec::new();
        }
    };
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            match serde_json::from_value::<HashMap<String, AttributeValue>>(value) {
                Ok(attributes) => record_from_attributes(index, &attributes),
                Err(err) => {
                    tracing::warn!(index, %err, "skipping directory record");
                    None
                }
            }
        })
        .collect()
}

fn record_from_attributes(
    index: usize,
    attributes: &HashMap<String, AttributeValue>,
) -> Option<UserRecord> {
    let mut record = UserRecord::default();
    for (key, value) in attributes {
        let Some(value) = value.first() else {
            continue;
        };
        let attribute = normalize_attribute(key);
        match attribute {
            "RecordName" => record.name = value.to_string(),
            "Password" => record.password = value.to_string(),
            "UniqueID" | "PrimaryGroupID" => {
                let Ok(id) = value.trim().parse::<i64>() else {
                    tracing::warn!(
                        index,
                        key = %key,
                        value,
                        "skipping directory record with bad id"
                    );
                    return None;
                };
                if attribute == "UniqueID" {
                    record.uid = Some(id);
                } else {
                    record.gid = Some(id);
                }
            }
            "NFSHomeDirectory" => record.home = PathBuf::from(value),
            "UserShell" => record.shell = value.to_string(),
            "RealName" => record.gecos = value.to_string(),
            _ => {}
        }
    }
    if record.name.is_empty() {
        tracing::warn!(index, "skipping directory record without a name");
        return None;
    }
    Some(record)
}

// "dsAttrTypeStandard:UniqueID" -> "UniqueID"
fn normalize_attribute(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, name)| name)
}

/// A platform directory service that can export user records.
pub trait DirectoryService: Send + Sync {
    /// Export all user records as a JSON list, or `None` when the platform
    /// has no such service.
    ///
    /// # Errors
    /// Returns an error if the service could not be queried.
    fn export(&self) -> io::Result<Option<String>>;
}

/// Platforms without a directory service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDirectoryService;

impl DirectoryService for NoDirectoryService {
    fn export(&self) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// macOS Open Directory, queried through `dscl` and converted with `plutil`.
#[cfg(target_os = "macos")]
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenDirectory;

#[cfg(target_os = "macos")]
impl DirectoryService for OpenDirectory {
    fn export(&self) -> io::Result<Option<String>> {
        use std::process::{Command, Stdio};

        let mut dscl = Command::new("dscl")
            .args(["-plist", ".", "-readall", "/Users"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let plist = dscl
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("dscl produced no output"))?;
        let output = Command::new("plutil")
            .args(["-convert", "json", "-o", "-", "-"])
            .stdin(plist)
            .stderr(Stdio::null())
            .output()?;
        dscl.wait()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "plutil exited with {}",
                output.status
            )));
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

/// The directory service for the running platform.
pub fn platform_directory_service() -> Box<dyn DirectoryService> {
    #[cfg(target_os = "macos")]
    {
        Box::new(OpenDirectory)
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(NoDirectoryService)
    }
}

/// Build the merged user list.
///
/// Returns `None` when neither source produced a record, which means the
/// lookup is unavailable rather than that a user is missing.
pub fn load_user_list(account_database: &Path, service: &dyn DirectoryService) -> Option<UserList> {
    let mut users = UserList::new();

    match fs::read_to_string(account_database) {
        Ok(text) => {
            for record in parse_account_database(&text) {
                users.entry(record.name.clone()).or_insert(record);
            }
        }
        Err(err) => {
            tracing::debug!(
                path = %account_database.display(),
                %err,
                "account database unavailable"
            );
        }
    }

    match service.export() {
        Ok(Some(payload)) => {
            for record in parse_directory_payload(&payload) {
                users.entry(record.name.clone()).or_insert(record);
            }
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(%err, "directory service query failed"),
    }

    tracing::debug!(count = users.len(), "loaded user list");
    (!users.is_empty()).then_some(users)
}

/// Lazily built, memoized user list.
pub struct UserDirectory {
    account_database: PathBuf,
    service: Box<dyn DirectoryService>,
    users: OnceCell<Option<UserList>>,
}

impl UserDirectory {
    pub fn new(account_database: impl Into<PathBuf>, service: Box<dyn DirectoryService>) -> Self {
        Self {
            account_database: account_database.into(),
            service,
            users: OnceCell::new(),
        }
    }

    /// The system account database plus the platform directory service.
    pub fn system() -> Self {
        Self::new(ACCOUNT_DATABASE, platform_directory_service())
    }

    /// The user list, built on first call.
    pub fn users(&self) -> Option<&UserList> {
        self.users
            .get_or_init(|| load_user_list(&self.account_database, self.service.as_ref()))
            .as_ref()
    }

    pub fn lookup(&self, name: &str) -> Option<&UserRecord> {
        self.users()?.get(name)
    }

    /// Drop the cached list so the next lookup rebuilds it.
    pub fn invalidate(&mut self) {
        self.users = OnceCell::new();
    }
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("account_database", &self.account_database)
            .field("loaded", &self.users.get().is_some())
            .finish_non_exhaustive()
    }
}

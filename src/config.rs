use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default remote source; `#` is replaced with the RFC number.
pub const DEFAULT_DOWNLOAD_SOURCE: &str = "https://www.rfc-editor.org/rfc/rfc#.txt";

/// Default number of rows shown around a landing position.
pub const DEFAULT_ROWS: u16 = 24;

/// Settings as they appear in a config file or on the command line.
/// `None` means "not given here".
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub cache_dir: Option<String>,
    pub download: Option<bool>,
    pub download_source: Option<String>,
    pub rows: Option<u16>,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            cache_dir: other.cache_dir.clone().or_else(|| self.cache_dir.clone()),
            download: other.download.or(self.download),
            download_source: other
                .download_source
                .clone()
                .or_else(|| self.download_source.clone()),
            rows: other.rows.or(self.rows),
        }
    }
}

/// Effective settings with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Cache directory, possibly starting with `~`.
    pub cache_dir: String,
    pub download_enabled: bool,
    pub download_source: String,
    pub rows: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir().to_string(),
            download_enabled: true,
            download_source: DEFAULT_DOWNLOAD_SOURCE.to_string(),
            rows: DEFAULT_ROWS,
        }
    }
}

impl Settings {
    pub fn from_flags(flags: &ConfigFlags) -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: flags.cache_dir.clone().unwrap_or(defaults.cache_dir),
            download_enabled: flags.download.unwrap_or(defaults.download_enabled),
            download_source: flags
                .download_source
                .clone()
                .unwrap_or(defaults.download_source),
            rows: flags.rows.unwrap_or(defaults.rows).max(1),
        }
    }
}

/// Platform default cache directory, in tilde form.
pub const fn default_cache_dir() -> &'static str {
    if cfg!(target_os = "windows") {
        "~/AppData/Local/rfc"
    } else if cfg!(target_os = "macos") {
        "~/Library/Caches/rfc"
    } else {
        "~/.cache/rfc"
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("rfcview").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("rfcview")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("rfcview").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("rfcview").join("config");
        }
    }

    PathBuf::from(".rfcviewrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".rfcviewrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# rfcview defaults (saved with --save)".to_string());
    if let Some(dir) = &flags.cache_dir {
        lines.push(format!("--cache-dir {dir}"));
    }
    match flags.download {
        Some(true) => lines.push("--download".to_string()),
        Some(false) => lines.push("--no-download".to_string()),
        None => {}
    }
    if let Some(source) = &flags.download_source {
        lines.push(format!("--download-source {source}"));
    }
    if let Some(rows) = flags.rows {
        lines.push(format!("--rows {rows}"));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token == "--download" {
            flags.download = Some(true);
        } else if token == "--no-download" {
            flags.download = Some(false);
        } else if token == "--cache-dir" {
            if let Some(next) = tokens.get(i + 1) {
                flags.cache_dir = Some(next.clone());
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--cache-dir=") {
            flags.cache_dir = Some(value.to_string());
        } else if token == "--download-source" {
            if let Some(next) = tokens.get(i + 1) {
                flags.download_source = Some(next.clone());
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--download-source=") {
            flags.download_source = Some(value.to_string());
        } else if token == "--rows" {
            if let Some(next) = tokens.get(i + 1) {
                flags.rows = next.parse().ok();
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--rows=") {
            flags.rows = value.parse().ok();
        }
        i += 1;
    }
    flags
}

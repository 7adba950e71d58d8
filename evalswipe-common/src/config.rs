//! Configuration loading and resolution
//!
//! Values resolve in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unparseable TOML file never aborts startup; it is logged and
//! the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "EVALSWIPE_ROOT_FOLDER";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "EVALSWIPE_BACKEND_URL";

/// Backend base URL used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000/api";

/// Reviewer id attached to annotations when none is configured
pub const DEFAULT_REVIEWER_ID: &str = "current_user";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file path (stderr when absent)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// On-disk configuration (`config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the session checkpoint database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Base URL of the review backend, e.g. `http://host:8000/api`
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Reviewer id recorded on every annotation
    #[serde(default)]
    pub reviewer_id: Option<String>,

    /// Braintrust key forwarded on imports (the backend may also hold one)
    #[serde(default)]
    pub braintrust_api_key: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Load configuration from `path`, falling back to defaults
    ///
    /// Never fails: a missing file is normal on first run and a broken file
    /// is reported with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match read_toml_config(path) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded TOML config");
                config
            }
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No TOML config, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable TOML config");
                Self::default()
            }
        }
    }
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config atomically (temp file + rename)
///
/// Creates the parent directory when missing.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Default config file location (`~/.config/evalswipe/config.toml`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("evalswipe").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("evalswipe.toml"))
}

/// Platform default root folder (`~/.local/share/evalswipe` on Linux)
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("evalswipe"))
        .unwrap_or_else(|| PathBuf::from("./evalswipe_data"))
}

/// Resolves the root folder from CLI, environment, TOML and defaults
pub struct RootFolderResolver<'a> {
    cli_arg: Option<PathBuf>,
    toml: Option<&'a TomlConfig>,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, toml: &'a TomlConfig) -> Self {
        self.toml = Some(toml);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml.and_then(|t| t.root_folder.clone()) {
            return path;
        }

        default_root_folder()
    }
}

impl Default for RootFolderResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the backend base URL (CLI → ENV → TOML → default)
///
/// A trailing slash is stripped so endpoint paths can be appended directly.
pub fn resolve_backend_url(cli_arg: Option<&str>, toml: &TomlConfig) -> String {
    let env_value = std::env::var(BACKEND_URL_ENV).ok();
    let url = cli_arg
        .map(str::to_string)
        .or(env_value.filter(|v| !v.trim().is_empty()))
        .or_else(|| toml.backend_url.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    url.trim_end_matches('/').to_string()
}

/// Resolve the reviewer id (CLI → TOML → default)
pub fn resolve_reviewer_id(cli_arg: Option<&str>, toml: &TomlConfig) -> String {
    cli_arg
        .map(str::to_string)
        .or_else(|| toml.reviewer_id.clone())
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REVIEWER_ID.to_string())
}

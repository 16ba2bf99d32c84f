//! Configuration loading and backend/session resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default Processing Backend base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "MDI_BACKEND_URL";

/// Environment variable overriding the session database path
pub const SESSION_DB_ENV: &str = "MDI_SESSION_DB";

/// Largest PDF accepted for upload (10 MiB)
pub const DEFAULT_MAX_PDF_BYTES: u64 = 10 * 1024 * 1024;

/// Contents of `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Processing Backend base URL
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Per-request timeout for backend and signed-URL calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// SQLite file used for cross-navigation session state
    #[serde(default)]
    pub session_db: Option<PathBuf>,

    /// Upload size cap in bytes
    #[serde(default = "default_max_pdf_bytes")]
    pub max_pdf_bytes: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub progress: ProgressConfig,
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// tracing filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// How extraction progress is presented while the backend works
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Fixed-increment cosmetic ramp, gated on the backend reply
    Simulated,
    /// No percentage until the backend answers
    Indeterminate,
}

/// `[progress]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressConfig {
    #[serde(default = "default_progress_mode")]
    pub mode: ProgressMode,

    /// Ramp increment (percent)
    #[serde(default = "default_progress_step")]
    pub step: u8,

    /// Delay between ramp increments
    #[serde(default = "default_progress_interval_ms")]
    pub interval_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_pdf_bytes() -> u64 {
    DEFAULT_MAX_PDF_BYTES
}

fn default_log_level() -> String {
    "mdi_intake=info".to_string()
}

fn default_progress_mode() -> ProgressMode {
    ProgressMode::Simulated
}

fn default_progress_step() -> u8 {
    10
}

fn default_progress_interval_ms() -> u64 {
    200
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            session_db: None,
            max_pdf_bytes: default_max_pdf_bytes(),
            logging: LoggingConfig::default(),
            progress: ProgressConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mode: default_progress_mode(),
            step: default_progress_step(),
            interval_ms: default_progress_interval_ms(),
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the config file, falling back to defaults when none exists
///
/// An explicit path must exist; the platform default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        _ => Ok(TomlConfig::default()),
    }
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// `~/.config/mdi/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mdi").join("config.toml"))
}

/// Resolve the Processing Backend base URL
///
/// Trailing slashes are stripped so endpoint paths can be appended directly.
pub fn resolve_backend_url(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    let raw = if let Some(url) = cli_arg.filter(|u| !u.trim().is_empty()) {
        url.to_string()
    } else if let Some(url) = std::env::var(BACKEND_URL_ENV)
        .ok()
        .filter(|u| !u.trim().is_empty())
    {
        url
    } else if let Some(url) = toml_config
        .backend_url
        .as_ref()
        .filter(|u| !u.trim().is_empty())
    {
        url.clone()
    } else {
        DEFAULT_BACKEND_URL.to_string()
    };

    raw.trim().trim_end_matches('/').to_string()
}

/// Resolve the session database path
pub fn resolve_session_db(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(SESSION_DB_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.session_db {
        return path.clone();
    }

    default_data_folder().join("session.db")
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mdi"))
        .unwrap_or_else(|| PathBuf::from("./mdi_data"))
}

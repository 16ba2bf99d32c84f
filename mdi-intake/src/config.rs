//! Runtime settings for mdi-intake
//!
//! Resolves each setting with CLI → ENV → TOML → default priority and logs
//! where the backend URL came from.

use crate::services::ControllerSettings;
use mdi_common::config::{
    resolve_backend_url, resolve_session_db, ProgressConfig, TomlConfig, BACKEND_URL_ENV,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub max_pdf_bytes: u64,
    pub progress: ProgressConfig,
    pub session_db: PathBuf,
    /// tracing filter used when RUST_LOG is unset
    pub log_level: String,
}

impl IntakeSettings {
    pub fn resolve(
        cli_backend_url: Option<&str>,
        cli_session_db: Option<&Path>,
        toml_config: &TomlConfig,
    ) -> Self {
        let backend_url = resolve_backend_url(cli_backend_url, toml_config);
        info!(
            "Backend URL {} (from {})",
            backend_url,
            backend_url_source(cli_backend_url, toml_config)
        );

        let mut progress = toml_config.progress.clone();
        if progress.step == 0 {
            warn!("progress.step = 0 would never finish the ramp, using 10");
            progress.step = 10;
        }

        Self {
            backend_url,
            request_timeout: Duration::from_secs(toml_config.request_timeout_secs.max(1)),
            max_pdf_bytes: toml_config.max_pdf_bytes,
            progress,
            session_db: resolve_session_db(cli_session_db, toml_config),
            log_level: toml_config.logging.level.clone(),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            max_pdf_bytes: self.max_pdf_bytes,
            progress: self.progress.clone(),
        }
    }
}

fn backend_url_source(cli_arg: Option<&str>, toml_config: &TomlConfig) -> &'static str {
    let present = |v: Option<&str>| v.is_some_and(|s| !s.trim().is_empty());

    if present(cli_arg) {
        "command line"
    } else if present(std::env::var(BACKEND_URL_ENV).ok().as_deref()) {
        "environment"
    } else if present(toml_config.backend_url.as_deref()) {
        "TOML"
    } else {
        "default"
    }
}

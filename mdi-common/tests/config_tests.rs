//! Unit tests for configuration resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate MDI_BACKEND_URL / MDI_SESSION_DB are marked with
//! #[serial] so they run sequentially, not in parallel.

use mdi_common::config::{
    load_config, load_toml_config, resolve_backend_url, resolve_session_db, write_toml_config,
    ProgressMode, TomlConfig, BACKEND_URL_ENV, DEFAULT_BACKEND_URL, DEFAULT_MAX_PDF_BYTES,
    SESSION_DB_ENV,
};
use serial_test::serial;
use std::path::{Path, PathBuf};

fn toml_with_backend(url: &str) -> TomlConfig {
    TomlConfig {
        backend_url: Some(url.to_string()),
        ..TomlConfig::default()
    }
}

// ============================================================================
// Backend URL resolution
// ============================================================================

#[test]
#[serial]
fn test_cli_overrides_env_and_toml() {
    std::env::set_var(BACKEND_URL_ENV, "http://env:1");
    let config = toml_with_backend("http://toml:2");

    let url = resolve_backend_url(Some("http://cli:3"), &config);
    assert_eq!(url, "http://cli:3");

    std::env::remove_var(BACKEND_URL_ENV);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    std::env::set_var(BACKEND_URL_ENV, "http://env:1");
    let config = toml_with_backend("http://toml:2");

    let url = resolve_backend_url(None, &config);
    assert_eq!(url, "http://env:1");

    std::env::remove_var(BACKEND_URL_ENV);
}

#[test]
#[serial]
fn test_toml_fallback_when_cli_and_env_absent() {
    std::env::remove_var(BACKEND_URL_ENV);
    let config = toml_with_backend("http://toml:2/");

    let url = resolve_backend_url(None, &config);
    assert_eq!(url, "http://toml:2");
}

#[test]
#[serial]
fn test_default_backend_url() {
    std::env::remove_var(BACKEND_URL_ENV);

    let url = resolve_backend_url(None, &TomlConfig::default());
    assert_eq!(url, DEFAULT_BACKEND_URL);
}

#[test]
#[serial]
fn test_whitespace_cli_value_is_ignored() {
    std::env::remove_var(BACKEND_URL_ENV);
    let config = toml_with_backend("http://toml:2");

    let url = resolve_backend_url(Some("   "), &config);
    assert_eq!(url, "http://toml:2");
}

// ============================================================================
// Session database resolution
// ============================================================================

#[test]
#[serial]
fn test_session_db_priority() {
    std::env::set_var(SESSION_DB_ENV, "/tmp/env.db");
    let config = TomlConfig {
        session_db: Some(PathBuf::from("/tmp/toml.db")),
        ..TomlConfig::default()
    };

    assert_eq!(
        resolve_session_db(Some(Path::new("/tmp/cli.db")), &config),
        PathBuf::from("/tmp/cli.db")
    );
    assert_eq!(resolve_session_db(None, &config), PathBuf::from("/tmp/env.db"));

    std::env::remove_var(SESSION_DB_ENV);
    assert_eq!(resolve_session_db(None, &config), PathBuf::from("/tmp/toml.db"));

    let fallback = resolve_session_db(None, &TomlConfig::default());
    assert!(fallback.ends_with("session.db"));
}

// ============================================================================
// TOML parsing
// ============================================================================

#[test]
fn test_partial_toml_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "backend_url = \"http://api.local:9000\"\n").unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.backend_url.as_deref(), Some("http://api.local:9000"));
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.max_pdf_bytes, DEFAULT_MAX_PDF_BYTES);
    assert_eq!(config.progress.mode, ProgressMode::Simulated);
    assert_eq!(config.progress.step, 10);
    assert_eq!(config.progress.interval_ms, 200);
}

#[test]
fn test_progress_table_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[progress]\nmode = \"indeterminate\"\ninterval_ms = 50\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.progress.mode, ProgressMode::Indeterminate);
    assert_eq!(config.progress.interval_ms, 50);
    assert_eq!(config.progress.step, 10);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "backend_url = [not valid").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, mdi_common::Error::Config(_)));
}

#[test]
fn test_explicit_missing_config_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(load_config(Some(&missing)).is_err());
}

#[test]
fn test_write_then_load_preserves_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = toml_with_backend("http://saved:1");
    config.progress.mode = ProgressMode::Indeterminate;
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

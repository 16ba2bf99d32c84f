//! Session key/value store
//!
//! Carries the handful of values that must survive a navigation or restart
//! (last device picks, uploaded file name/URL, selected device). The
//! workflow controller's in-memory state stays the data channel; this store
//! is written as checkpoints and read only to pre-fill forms.

use mdi_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;

/// Keys the front-end persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    InitialMessage,
    UploadedPdfUrl,
    UploadedPdfName,
    ResetEmail,
    SelectedDevice,
    Conversations,
    DeviceName,
    DeviceBrand,
    DeviceType,
}

impl SessionKey {
    pub const ALL: [SessionKey; 9] = [
        SessionKey::InitialMessage,
        SessionKey::UploadedPdfUrl,
        SessionKey::UploadedPdfName,
        SessionKey::ResetEmail,
        SessionKey::SelectedDevice,
        SessionKey::Conversations,
        SessionKey::DeviceName,
        SessionKey::DeviceBrand,
        SessionKey::DeviceType,
    ];

    /// Storage key, identical to the browser storage key names
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKey::InitialMessage => "initialMessage",
            SessionKey::UploadedPdfUrl => "uploadedPdfUrl",
            SessionKey::UploadedPdfName => "uploadedPdfName",
            SessionKey::ResetEmail => "resetEmail",
            SessionKey::SelectedDevice => "selectedDevice",
            SessionKey::Conversations => "conversations",
            SessionKey::DeviceName => "deviceName",
            SessionKey::DeviceBrand => "deviceBrand",
            SessionKey::DeviceType => "deviceType",
        }
    }
}

/// SQLite-backed key/value store
#[derive(Clone)]
pub struct SessionStore {
    db: SqlitePool,
}

impl SessionStore {
    /// Open the store at `path`, creating file and table as needed
    pub async fn open(path: &Path) -> Result<Self> {
        let db = super::init_database_pool(path).await?;
        Ok(Self { db })
    }

    /// Store that lives only as long as the process
    pub async fn in_memory() -> Result<Self> {
        let db = super::init_memory_pool().await?;
        Ok(Self { db })
    }

    pub async fn get(&self, key: SessionKey) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM session_entries WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.db)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|(value,)| value))
    }

    pub async fn set(&self, key: SessionKey, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO session_entries (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.db)
        .await
        .map_err(Error::Database)?;

        tracing::debug!(key = key.as_str(), "Session entry stored");
        Ok(())
    }

    /// JSON-encoded value (e.g. `conversations`, `selectedDevice`)
    pub async fn get_json<T: DeserializeOwned>(&self, key: SessionKey) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::CorruptEntry {
                    key: key.as_str().to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: SessionKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| Error::Encode {
            key: key.as_str().to_string(),
            reason: e.to_string(),
        })?;
        self.set(key, &raw).await
    }

    pub async fn remove(&self, key: SessionKey) -> Result<()> {
        sqlx::query("DELETE FROM session_entries WHERE key = ?")
            .bind(key.as_str())
            .execute(&self.db)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Drop every entry
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM session_entries")
            .execute(&self.db)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

//! Shared error type for the config layer and the session store

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file unreadable, unparsable or unwritable
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored session value no longer decodes as the expected type
    #[error("Session entry {key} is corrupt: {reason}")]
    CorruptEntry { key: String, reason: String },

    /// A value could not be encoded for the session store
    #[error("Session entry {key} could not be encoded: {reason}")]
    Encode { key: String, reason: String },
}

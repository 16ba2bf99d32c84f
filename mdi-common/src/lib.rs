//! # MDI Common Library
//!
//! Shared code for the MDI (Manual Device Intake) crates including:
//! - Error types
//! - Configuration loading (CLI → ENV → TOML → default)
//! - Event types (IntakeEvent enum) and the EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};

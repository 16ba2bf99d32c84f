//! mdi-intake library interface
//!
//! Device-manual intake workflow: register a device, upload its PDF manual
//! through a signed URL, run extraction, then review and correct the
//! extracted paragraph chunks and image alt text page by page.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{IntakeError, IntakeResult};

//! Error types for mdi-intake
//!
//! Three failure classes reach the user:
//! - validation errors (field-level, recovered locally, shown inline)
//! - transport errors (request never produced a usable reply)
//! - backend rejections (`success: false`), treated like transport errors
//!
//! None of them is fatal; the caller re-invokes the action to retry.

use crate::models::{FieldErrors, WizardAction, WizardStep};
use thiserror::Error;

/// Shown when the backend rejects a request without a message
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Intake error type
#[derive(Debug, Error)]
pub enum IntakeError {
    /// One or more form fields failed validation
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Request could not be sent or the reply could not be read
    #[error("Network error calling {endpoint}: {detail}")]
    Network { endpoint: String, detail: String },

    /// Backend answered with a non-2xx status
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },

    /// Backend answered `success: false`
    #[error("{endpoint} rejected the request: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        endpoint: String,
        message: Option<String>,
    },

    /// 2xx reply whose shape does not match the contract
    #[error("Unexpected response from {endpoint}: {detail}")]
    Malformed { endpoint: String, detail: String },

    /// Direct PUT to a signed URL was refused
    #[error("Upload to storage failed with HTTP {status}")]
    UploadFailed { status: u16 },

    /// Extraction finished in the failed state
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Same action already pending
    #[error("{0} is already in progress")]
    Busy(WizardAction),

    /// Operation aborted through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Action belongs to a different wizard step
    #[error("Action requires step {expected}, wizard is at step {actual}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },

    /// Current step's prerequisite is not satisfied yet
    #[error("Step {0} is not complete")]
    StepNotReady(WizardStep),

    /// No step after the editor
    #[error("Already at the last step")]
    TerminalStep,

    /// Extraction needs a pdf id the upload reply did not provide
    #[error("No PDF id available for extraction")]
    MissingPdfId,

    /// Only one unsaved chunk may exist at a time
    #[error("Save or delete the unsaved chunk before adding another")]
    UnsavedChunkPending,

    /// Text or alt edits require edit mode
    #[error("Item {0} is not in edit mode")]
    NotEditing(usize),

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No images on this page")]
    NoImages,

    /// Page raster could not be cropped or encoded
    #[error("Snip failed: {0}")]
    Snip(String),

    /// Downloaded document is not a readable PDF
    #[error("PDF could not be read: {0}")]
    Document(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// mdi-common error
    #[error("Common error: {0}")]
    Common(#[from] mdi_common::Error),
}

impl IntakeError {
    /// Text for the blocking alert shown to the user
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::Validation(errors) => errors.to_string(),
            IntakeError::Rejected { message, .. } | IntakeError::Status { message, .. } => message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            IntakeError::Network { .. } => {
                "Could not reach the processing server. Please try again.".to_string()
            }
            IntakeError::Malformed { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Field errors carried by a validation failure
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            IntakeError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub(crate) fn network(endpoint: &str, err: impl std::fmt::Display) -> Self {
        IntakeError::Network {
            endpoint: endpoint.to_string(),
            detail: err.to_string(),
        }
    }

    pub(crate) fn malformed(endpoint: &str, detail: impl Into<String>) -> Self {
        IntakeError::Malformed {
            endpoint: endpoint.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<FieldErrors> for IntakeError {
    fn from(errors: FieldErrors) -> Self {
        IntakeError::Validation(errors)
    }
}

/// Result type for intake operations
pub type IntakeResult<T> = Result<T, IntakeError>;

//! Extraction run and its progress updates

use mdi_common::events::ExtractionStatus;
use serde::{Deserialize, Serialize};

/// Step 3 result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub pdf_id: i64,
    pub status: ExtractionStatus,
    /// Last reported percentage; None while indeterminate
    pub progress: Option<u8>,
    /// Backend message (or fallback) for a failed run
    pub message: Option<String>,
}

impl ExtractionRun {
    pub fn pending(pdf_id: i64) -> Self {
        Self {
            pdf_id,
            status: ExtractionStatus::Pending,
            progress: None,
            message: None,
        }
    }

    /// Fold one update into the run
    pub fn apply(&mut self, update: &ExtractionUpdate) {
        self.status = update.status;
        if update.progress.is_some() {
            self.progress = update.progress;
        }
        if update.message.is_some() {
            self.message = update.message.clone();
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ExtractionStatus::Pending
    }
}

/// One element of the extraction progress stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionUpdate {
    pub progress: Option<u8>,
    pub status: ExtractionStatus,
    pub message: Option<String>,
    /// Progress value comes from the cosmetic ramp, not from the backend
    pub simulated: bool,
}

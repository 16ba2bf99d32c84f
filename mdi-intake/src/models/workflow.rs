//! Wizard step state machine
//!
//! Steps progress strictly linearly:
//! DEVICE_INFO → PDF_UPLOAD → EXTRACTION → EDITOR
//!
//! EDITOR is terminal; only external navigation leaves it.

use crate::models::{DeviceDraft, ExtractionRun, UploadTicket};
use chrono::{DateTime, Utc};
use mdi_common::events::ExtractionStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Wizard step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStep {
    /// Device type, brand and name form
    DeviceInfo,
    /// PDF picker and signed-URL upload
    PdfUpload,
    /// Extraction trigger and progress
    Extraction,
    /// Chunk and image editor
    Editor,
}

impl WizardStep {
    /// 1-based step number
    pub fn number(self) -> u8 {
        match self {
            WizardStep::DeviceInfo => 1,
            WizardStep::PdfUpload => 2,
            WizardStep::Extraction => 3,
            WizardStep::Editor => 4,
        }
    }

    pub fn from_number(number: u8) -> Option<WizardStep> {
        match number {
            1 => Some(WizardStep::DeviceInfo),
            2 => Some(WizardStep::PdfUpload),
            3 => Some(WizardStep::Extraction),
            4 => Some(WizardStep::Editor),
            _ => None,
        }
    }

    pub fn next(self) -> Option<WizardStep> {
        match self {
            WizardStep::DeviceInfo => Some(WizardStep::PdfUpload),
            WizardStep::PdfUpload => Some(WizardStep::Extraction),
            WizardStep::Extraction => Some(WizardStep::Editor),
            WizardStep::Editor => None,
        }
    }

    pub fn prev(self) -> Option<WizardStep> {
        match self {
            WizardStep::DeviceInfo => None,
            WizardStep::PdfUpload => Some(WizardStep::DeviceInfo),
            WizardStep::Extraction => Some(WizardStep::PdfUpload),
            WizardStep::Editor => Some(WizardStep::Extraction),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardStep::DeviceInfo => "DeviceInfo",
            WizardStep::PdfUpload => "PdfUpload",
            WizardStep::Extraction => "Extraction",
            WizardStep::Editor => "Editor",
        };
        write!(f, "{}({})", name, self.number())
    }
}

/// Network-triggering actions guarded against double submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WizardAction {
    LoadCatalog,
    RegisterDevice,
    UploadPdf,
    Extract,
}

impl fmt::Display for WizardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardAction::LoadCatalog => "Loading device catalog",
            WizardAction::RegisterDevice => "Device registration",
            WizardAction::UploadPdf => "PDF upload",
            WizardAction::Extract => "Extraction",
        };
        f.write_str(name)
    }
}

/// Field-level validation messages, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: &str, message: &str) {
        self.0.insert(field.to_string(), message.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when no field failed
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        f.write_str(&parts.join("; "))
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTransition {
    pub session_id: Uuid,
    pub old_step: WizardStep,
    pub new_step: WizardStep,
    pub transitioned_at: DateTime<Utc>,
}

/// Wizard aggregate, owned by the workflow controller
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Identifies this wizard run in events and logs
    pub session_id: Uuid,

    pub current_step: WizardStep,

    /// Step 1 form data (device id filled after registration)
    pub draft: DeviceDraft,

    /// Step 2 result
    pub upload: Option<UploadTicket>,

    /// Step 3 result
    pub extraction: Option<ExtractionRun>,

    /// Errors from the last validation attempt
    pub errors: FieldErrors,

    pub started_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            current_step: WizardStep::DeviceInfo,
            draft: DeviceDraft::default(),
            upload: None,
            extraction: None,
            errors: FieldErrors::default(),
            started_at: Utc::now(),
        }
    }

    /// Whether the current step's prerequisite for moving forward holds
    pub fn step_complete(&self) -> bool {
        match self.current_step {
            WizardStep::DeviceInfo => self.draft.device_id.is_some(),
            WizardStep::PdfUpload => self.upload.as_ref().map_or(false, |u| u.uploaded),
            WizardStep::Extraction => match (&self.extraction, self.pdf_id()) {
                (Some(run), Some(pdf_id)) => {
                    run.pdf_id == pdf_id && run.status == ExtractionStatus::Success
                }
                _ => false,
            },
            WizardStep::Editor => false,
        }
    }

    /// Move to a new step, clearing transient errors
    pub fn transition_to(&mut self, new_step: WizardStep) -> StepTransition {
        let transition = StepTransition {
            session_id: self.session_id,
            old_step: self.current_step,
            new_step,
            transitioned_at: Utc::now(),
        };
        self.current_step = new_step;
        self.errors.clear();
        transition
    }

    /// Record a finished upload
    ///
    /// Any extraction result belonged to the previous file and is dropped.
    pub fn commit_upload(&mut self, ticket: UploadTicket) {
        self.upload = Some(ticket);
        self.extraction = None;
    }

    /// Pdf id issued by the upload step, if any
    pub fn pdf_id(&self) -> Option<i64> {
        self.upload.as_ref().and_then(|u| u.pdf_id)
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

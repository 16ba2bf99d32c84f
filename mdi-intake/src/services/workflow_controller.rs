//! Intake workflow controller
//!
//! Drives the wizard through its four steps:
//! DEVICE_INFO → PDF_UPLOAD → EXTRACTION → EDITOR
//!
//! A step is never entered before its prerequisite holds:
//! - DEVICE_INFO: backend assigned a device id
//! - PDF_UPLOAD: bytes were PUT to the signed URL
//! - EXTRACTION: extraction finished with `Success`
//!
//! Backend failures halt progression and are returned to the caller; nothing
//! is retried automatically. Each network-triggering action is guarded so a
//! second submission while the first is pending fails with `Busy`.

use crate::db::{SessionKey, SessionStore};
use crate::error::{IntakeError, IntakeResult};
use crate::models::{
    Catalog, DeviceDraft, ExtractionRun, ExtractionStatus, ExtractionUpdate, FieldErrors,
    PdfFile, UploadTicket, WizardAction, WizardStep, WorkflowState,
};
use crate::services::backend::ProcessingBackend;
use crate::services::extraction::{extraction_updates, EXTRACTION_FAILED_FALLBACK};
use crate::services::in_flight::InFlight;
use crate::services::validation::{validate_device_info, validate_upload};
use chrono::Utc;
use futures::{Stream, StreamExt};
use mdi_common::config::{ProgressConfig, DEFAULT_MAX_PDF_BYTES};
use mdi_common::events::{EventBus, IntakeEvent};
use std::sync::Arc;
use tokio::sync::RwLock;

const DEVICE_LOCKED: &str = "Cannot be changed once the device is registered";

/// Tunables for the controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Upload size cap (inclusive)
    pub max_pdf_bytes: u64,
    pub progress: ProgressConfig,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_pdf_bytes: DEFAULT_MAX_PDF_BYTES,
            progress: ProgressConfig::default(),
        }
    }
}

/// Workflow controller service
pub struct WorkflowController {
    backend: Arc<dyn ProcessingBackend>,
    event_bus: EventBus,
    settings: ControllerSettings,
    state: RwLock<WorkflowState>,
    catalog: RwLock<Option<Catalog>>,
    in_flight: InFlight,
    session_store: Option<SessionStore>,
}

impl WorkflowController {
    /// Create a controller at step DEVICE_INFO
    pub fn new(
        backend: Arc<dyn ProcessingBackend>,
        event_bus: EventBus,
        settings: ControllerSettings,
    ) -> Self {
        let state = WorkflowState::new();
        tracing::info!(session_id = %state.session_id, "Intake workflow created");

        Self {
            backend,
            event_bus,
            settings,
            state: RwLock::new(state),
            catalog: RwLock::new(None),
            in_flight: InFlight::new(),
            session_store: None,
        }
    }

    /// Persist checkpoints for cross-navigation durability
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Copy of the current wizard state
    pub async fn snapshot(&self) -> WorkflowState {
        self.state.read().await.clone()
    }

    pub async fn current_step(&self) -> WizardStep {
        self.state.read().await.current_step
    }

    /// Whether the current step's prerequisite holds (the "Next" button)
    pub async fn next_step_available(&self) -> bool {
        self.state.read().await.step_complete()
    }

    /// Whether `action` is pending (its trigger should be disabled)
    pub fn is_busy(&self, action: WizardAction) -> bool {
        self.in_flight.is_active(action)
    }

    // ------------------------------------------------------------------
    // Step 1: device info
    // ------------------------------------------------------------------

    /// Fetch brands and device types, replacing any cached catalog
    pub async fn load_catalog(&self) -> IntakeResult<Catalog> {
        let _guard = self.in_flight.try_begin(WizardAction::LoadCatalog)?;

        match self.backend.get_brands_and_device_types().await {
            Ok(catalog) => {
                tracing::debug!(
                    device_types = catalog.device_types.len(),
                    brands = catalog.brands.len(),
                    "Catalog loaded"
                );
                *self.catalog.write().await = Some(catalog.clone());
                Ok(catalog)
            }
            Err(e) => {
                self.report_failure(WizardAction::LoadCatalog, &e).await;
                Err(e)
            }
        }
    }

    async fn catalog_or_load(&self) -> IntakeResult<Catalog> {
        if let Some(catalog) = self.catalog.read().await.as_ref() {
            return Ok(catalog.clone());
        }

        let catalog = self.backend.get_brands_and_device_types().await?;
        *self.catalog.write().await = Some(catalog.clone());
        Ok(catalog)
    }

    /// Register the device with the backend and return its id
    ///
    /// Does not touch wizard state; `submit_device_info` commits the result.
    pub async fn register_device(&self, draft: &DeviceDraft) -> IntakeResult<i64> {
        validate_device_info(draft)?;

        let catalog = self.catalog_or_load().await?;
        let (device_type_id, brand_id) = catalog.resolve(draft)?;

        tracing::info!(
            label = draft.label(),
            device_type_id,
            brand_id,
            "Registering device"
        );
        let device_id = self
            .backend
            .new_device(draft.label(), device_type_id, brand_id)
            .await?;

        let session_id = self.state.read().await.session_id;
        self.event_bus.emit_lossy(IntakeEvent::DeviceRegistered {
            session_id,
            device_id,
            timestamp: Utc::now(),
        });

        Ok(device_id)
    }

    /// Validate, register (once) and advance to PDF_UPLOAD
    ///
    /// A device id, once assigned, is kept: submitting again after `back()`
    /// re-validates and advances without registering a second device. The
    /// registered type, brand and name can no longer change.
    pub async fn submit_device_info(&self, draft: DeviceDraft) -> IntakeResult<i64> {
        let _guard = self.in_flight.try_begin(WizardAction::RegisterDevice)?;

        let existing_id = {
            let mut state = self.state.write().await;
            ensure_step(&state, WizardStep::DeviceInfo)?;
            if let Err(errors) = validate_device_info(&draft) {
                tracing::debug!(%errors, "Device info rejected");
                state.errors = errors.clone();
                return Err(IntakeError::Validation(errors));
            }
            state.draft.device_id
        };

        let device_id = match existing_id {
            Some(id) => {
                if let Err(e) = self.ensure_same_device(&draft).await {
                    self.report_failure(WizardAction::RegisterDevice, &e).await;
                    return Err(e);
                }
                tracing::info!(device_id = id, "Device already registered, reusing id");
                id
            }
            None => match self.register_device(&draft).await {
                Ok(id) => {
                    self.checkpoint(&[
                        (SessionKey::DeviceType, draft.device_type.clone()),
                        (SessionKey::DeviceBrand, draft.brand_name.clone()),
                        (SessionKey::DeviceName, draft.label().to_string()),
                    ])
                    .await;
                    id
                }
                Err(e) => {
                    self.report_failure(WizardAction::RegisterDevice, &e).await;
                    return Err(e);
                }
            },
        };

        let mut state = self.state.write().await;
        if state.draft.device_id.is_none() {
            state.draft = DeviceDraft {
                device_id: Some(device_id),
                ..draft
            };
        }
        if state.current_step == WizardStep::DeviceInfo {
            self.advance_locked(&mut state)?;
        }

        Ok(device_id)
    }

    /// Refuse edits to a device that is already registered
    ///
    /// Picks are compared by resolved catalog id, the name by its trimmed label.
    async fn ensure_same_device(&self, draft: &DeviceDraft) -> IntakeResult<()> {
        let registered = self.state.read().await.draft.clone();
        let catalog = self.catalog_or_load().await?;
        let (device_type_id, brand_id) = catalog.resolve(draft)?;
        let (registered_type_id, registered_brand_id) = catalog.resolve(&registered)?;

        let mut errors = FieldErrors::default();
        if device_type_id != registered_type_id {
            errors.insert("device_type", DEVICE_LOCKED);
        }
        if brand_id != registered_brand_id {
            errors.insert("brand_name", DEVICE_LOCKED);
        }
        if draft.label() != registered.label() {
            errors.insert("device_name", DEVICE_LOCKED);
        }
        errors.into_result().map_err(IntakeError::Validation)
    }

    // ------------------------------------------------------------------
    // Step 2: PDF upload
    // ------------------------------------------------------------------

    /// Obtain a signed URL for `device_id` and PUT the file bytes to it
    pub async fn request_signed_upload(
        &self,
        device_id: i64,
        file: PdfFile,
    ) -> IntakeResult<UploadTicket> {
        tracing::info!(device_id, file = %file.name, size = file.size(), "Requesting signed upload URL");
        let signed = self.backend.pdf_upload(device_id).await?;

        self.backend
            .put_signed(&signed.signed_url, &file.mime, file.bytes.clone())
            .await?;

        tracing::info!(device_id, pdf_id = ?signed.pdf_id, "PDF uploaded");
        Ok(UploadTicket {
            file,
            signed_url: signed.signed_url,
            pdf_id: signed.pdf_id,
            uploaded: true,
        })
    }

    /// Validate, upload and advance to EXTRACTION
    pub async fn submit_upload(&self, file: PdfFile) -> IntakeResult<UploadTicket> {
        let _guard = self.in_flight.try_begin(WizardAction::UploadPdf)?;

        let (session_id, device_id) = {
            let mut state = self.state.write().await;
            ensure_step(&state, WizardStep::PdfUpload)?;
            let device_id = state
                .draft
                .device_id
                .ok_or(IntakeError::StepNotReady(WizardStep::DeviceInfo))?;
            if let Err(errors) = validate_upload(&file, self.settings.max_pdf_bytes) {
                tracing::debug!(%errors, "Upload rejected");
                state.errors = errors.clone();
                return Err(IntakeError::Validation(errors));
            }
            (state.session_id, device_id)
        };

        let ticket = match self.request_signed_upload(device_id, file).await {
            Ok(ticket) => ticket,
            Err(e) => {
                self.report_failure(WizardAction::UploadPdf, &e).await;
                return Err(e);
            }
        };

        self.event_bus.emit_lossy(IntakeEvent::PdfUploaded {
            session_id,
            device_id,
            pdf_id: ticket.pdf_id,
            file_name: ticket.file.name.clone(),
            size_bytes: ticket.file.size(),
            timestamp: Utc::now(),
        });
        self.checkpoint(&[
            (SessionKey::UploadedPdfName, ticket.file.name.clone()),
            (SessionKey::UploadedPdfUrl, ticket.signed_url.clone()),
            (SessionKey::SelectedDevice, device_id.to_string()),
        ])
        .await;

        let mut state = self.state.write().await;
        state.commit_upload(ticket.clone());
        if state.current_step == WizardStep::PdfUpload {
            self.advance_locked(&mut state)?;
        }

        Ok(ticket)
    }

    // ------------------------------------------------------------------
    // Step 3: extraction
    // ------------------------------------------------------------------

    /// Progress stream for extracting `pdf_id`; does not touch wizard state
    pub fn trigger_extraction(
        &self,
        pdf_id: i64,
    ) -> impl Stream<Item = ExtractionUpdate> + Send + 'static {
        extraction_updates(
            Arc::clone(&self.backend),
            pdf_id,
            self.settings.progress.clone(),
        )
    }

    /// Run extraction for the uploaded PDF, publishing progress on the bus
    ///
    /// Does not advance: the caller moves on with `advance()` once
    /// `next_step_available()` reports true.
    pub async fn run_extraction(&self) -> IntakeResult<ExtractionRun> {
        let _guard = self.in_flight.try_begin(WizardAction::Extract)?;

        let (session_id, pdf_id) = {
            let mut state = self.state.write().await;
            ensure_step(&state, WizardStep::Extraction)?;
            let pdf_id = state.pdf_id().ok_or(IntakeError::MissingPdfId)?;
            state.extraction = Some(ExtractionRun::pending(pdf_id));
            (state.session_id, pdf_id)
        };

        let mut run = ExtractionRun::pending(pdf_id);
        let mut updates = Box::pin(self.trigger_extraction(pdf_id));

        while let Some(update) = updates.next().await {
            run.apply(&update);
            self.event_bus.emit_lossy(IntakeEvent::ExtractionProgress {
                session_id,
                pdf_id,
                progress: update.progress,
                status: update.status,
                simulated: update.simulated,
                timestamp: Utc::now(),
            });
            self.state.write().await.extraction = Some(run.clone());
        }

        self.event_bus.emit_lossy(IntakeEvent::ExtractionFinished {
            session_id,
            pdf_id,
            status: run.status,
            message: run.message.clone(),
            timestamp: Utc::now(),
        });

        if run.status == ExtractionStatus::Success {
            Ok(run)
        } else {
            let message = run
                .message
                .clone()
                .unwrap_or_else(|| EXTRACTION_FAILED_FALLBACK.to_string());
            let err = IntakeError::ExtractionFailed(message);
            self.report_failure(WizardAction::Extract, &err).await;
            Err(err)
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Move forward one step if the current step's prerequisite holds
    pub async fn advance(&self) -> IntakeResult<WizardStep> {
        let mut state = self.state.write().await;
        self.advance_locked(&mut state)
    }

    /// Move back one step (never below DEVICE_INFO), clearing errors only
    pub async fn back(&self) -> WizardStep {
        let mut state = self.state.write().await;
        match state.current_step.prev() {
            Some(prev) => {
                let transition = state.transition_to(prev);
                self.emit_step_changed(transition.session_id, transition.old_step, prev);
                prev
            }
            None => {
                state.errors.clear();
                state.current_step
            }
        }
    }

    fn advance_locked(&self, state: &mut WorkflowState) -> IntakeResult<WizardStep> {
        let next = state.current_step.next().ok_or(IntakeError::TerminalStep)?;
        if !state.step_complete() {
            return Err(IntakeError::StepNotReady(state.current_step));
        }

        let transition = state.transition_to(next);
        tracing::info!(
            session_id = %transition.session_id,
            from = %transition.old_step,
            to = %transition.new_step,
            "Wizard advanced"
        );
        self.emit_step_changed(transition.session_id, transition.old_step, next);
        Ok(next)
    }

    fn emit_step_changed(&self, session_id: uuid::Uuid, old: WizardStep, new: WizardStep) {
        self.event_bus.emit_lossy(IntakeEvent::StepChanged {
            session_id,
            old_step: old.number(),
            new_step: new.number(),
            timestamp: Utc::now(),
        });
    }

    // ------------------------------------------------------------------
    // Session store
    // ------------------------------------------------------------------

    /// Pre-fill the draft from the session store
    ///
    /// Only applies while at DEVICE_INFO with no registered device. Returns
    /// the restored draft, or None when nothing was stored.
    pub async fn restore_draft(&self) -> IntakeResult<Option<DeviceDraft>> {
        let Some(store) = &self.session_store else {
            return Ok(None);
        };

        let device_type = store.get(SessionKey::DeviceType).await?;
        let brand_name = store.get(SessionKey::DeviceBrand).await?;
        let device_name = store.get(SessionKey::DeviceName).await?;
        if device_type.is_none() && brand_name.is_none() && device_name.is_none() {
            return Ok(None);
        }

        let draft = DeviceDraft::new(
            device_type.unwrap_or_default(),
            brand_name.unwrap_or_default(),
            device_name.unwrap_or_default(),
        );

        let mut state = self.state.write().await;
        if state.current_step == WizardStep::DeviceInfo && state.draft.device_id.is_none() {
            state.draft = draft.clone();
        }
        Ok(Some(draft))
    }

    async fn checkpoint(&self, entries: &[(SessionKey, String)]) {
        let Some(store) = &self.session_store else {
            return;
        };
        for (key, value) in entries {
            if let Err(e) = store.set(*key, value).await {
                // Durability only; the controller state is authoritative
                tracing::warn!(key = key.as_str(), error = %e, "Session checkpoint failed");
            }
        }
    }

    async fn report_failure(&self, action: WizardAction, err: &IntakeError) {
        let session_id = {
            let mut state = self.state.write().await;
            if let Some(errors) = err.field_errors() {
                state.errors = errors.clone();
            }
            state.session_id
        };

        tracing::warn!(session_id = %session_id, %action, error = %err, "Action failed");
        self.event_bus.emit_lossy(IntakeEvent::ActionFailed {
            session_id: Some(session_id),
            action: action.to_string(),
            message: err.user_message(),
            timestamp: Utc::now(),
        });
    }
}

fn ensure_step(state: &WorkflowState, expected: WizardStep) -> IntakeResult<()> {
    if state.current_step == expected {
        Ok(())
    } else {
        Err(IntakeError::WrongStep {
            expected,
            actual: state.current_step,
        })
    }
}

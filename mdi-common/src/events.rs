//! Event types for the MDI event system
//!
//! Provides the shared `IntakeEvent` enum and the `EventBus` that the workflow
//! controller and editors broadcast on. Front-ends (CLI progress lines, a
//! future SSE bridge) subscribe to render progress without polling state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Status of one extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Pending,
    Success,
    Failed,
}

/// MDI event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntakeEvent {
    /// Wizard moved between steps (either direction)
    StepChanged {
        session_id: Uuid,
        /// 1-based step number before the change
        old_step: u8,
        /// 1-based step number after the change
        new_step: u8,
        timestamp: DateTime<Utc>,
    },

    /// Backend assigned a device id
    DeviceRegistered {
        session_id: Uuid,
        device_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// PDF bytes landed in object storage
    PdfUploaded {
        session_id: Uuid,
        device_id: i64,
        pdf_id: Option<i64>,
        file_name: String,
        size_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    /// Extraction progress update
    ///
    /// `simulated` is true when `progress` comes from the cosmetic ramp rather
    /// than from the backend.
    ExtractionProgress {
        session_id: Uuid,
        pdf_id: i64,
        progress: Option<u8>,
        status: ExtractionStatus,
        simulated: bool,
        timestamp: DateTime<Utc>,
    },

    /// Extraction reached a terminal status
    ExtractionFinished {
        session_id: Uuid,
        pdf_id: i64,
        status: ExtractionStatus,
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Paragraph chunk persisted and embedded
    ChunkSaved {
        pdf_id: i64,
        page: u32,
        chunk_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Paragraph chunk removed
    ChunkDeleted {
        pdf_id: i64,
        page: u32,
        /// None for an unsaved chunk (local removal only)
        chunk_id: Option<i64>,
        timestamp: DateTime<Utc>,
    },

    /// Image alt text persisted and embedded
    ImageAltSaved {
        image_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Snipped page region uploaded as a new image
    ImageSnipped {
        pdf_id: i64,
        page: u32,
        image_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// A user action failed and was not retried
    ActionFailed {
        session_id: Option<Uuid>,
        action: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl IntakeEvent {
    /// Event name, matching the serde tag
    pub fn event_type(&self) -> &str {
        match self {
            IntakeEvent::StepChanged { .. } => "StepChanged",
            IntakeEvent::DeviceRegistered { .. } => "DeviceRegistered",
            IntakeEvent::PdfUploaded { .. } => "PdfUploaded",
            IntakeEvent::ExtractionProgress { .. } => "ExtractionProgress",
            IntakeEvent::ExtractionFinished { .. } => "ExtractionFinished",
            IntakeEvent::ChunkSaved { .. } => "ChunkSaved",
            IntakeEvent::ChunkDeleted { .. } => "ChunkDeleted",
            IntakeEvent::ImageAltSaved { .. } => "ImageAltSaved",
            IntakeEvent::ImageSnipped { .. } => "ImageSnipped",
            IntakeEvent::ActionFailed { .. } => "ActionFailed",
        }
    }
}

/// Broadcast bus for `IntakeEvent`s
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers drop old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IntakeEvent,
    ) -> Result<usize, broadcast::error::SendError<IntakeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IntakeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

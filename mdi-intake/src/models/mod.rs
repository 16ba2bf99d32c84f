//! Data models for mdi-intake
//!
//! All entities are transient: they live in the workflow controller or the
//! page editor and are never owned by a persistent schema here.

pub mod chunk;
pub mod device;
pub mod extraction;
pub mod image_item;
pub mod upload;
pub mod workflow;

pub use chunk::{Chunk, ChunkSlot, EditMode};
pub use device::{Catalog, CatalogEntry, DeviceDraft};
pub use extraction::{ExtractionRun, ExtractionUpdate};
pub use image_item::ImageItem;
pub use mdi_common::events::ExtractionStatus;
pub use upload::{PdfFile, UploadTicket, PDF_MIME};
pub use workflow::{FieldErrors, StepTransition, WizardAction, WizardStep, WorkflowState};

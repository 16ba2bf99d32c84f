//! Service modules for the manual intake workflow
//!
//! The workflow controller owns wizard state; the page editor and image
//! labeler own the editor step. All of them talk to the Processing Backend
//! through the `ProcessingBackend` trait.

pub mod backend;
pub mod extraction;
pub mod http_backend;
pub mod image_labeler;
pub mod in_flight;
pub mod page_editor;
pub mod snip;
pub mod validation;
pub mod workflow_controller;

pub use backend::{
    AdminToken, InitialPdfState, NewImageTarget, PageState, ProcessingBackend,
    SaveParagraphRequest, SignedUpload, NEW_CHUNK_WIRE_ID,
};
pub use extraction::extraction_updates;
pub use http_backend::HttpProcessingBackend;
pub use image_labeler::ImageLabeler;
pub use in_flight::{InFlight, InFlightGuard};
pub use page_editor::{count_pdf_pages, PageEditor};
pub use snip::{snip_png, upload_snip, SnipRegion};
pub use validation::{validate_device_info, validate_upload};
pub use workflow_controller::{ControllerSettings, WorkflowController};

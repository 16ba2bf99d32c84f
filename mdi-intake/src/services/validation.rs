//! Step 1 and step 2 form validation
//!
//! Pure and synchronous: nothing here touches the backend.

use crate::models::{DeviceDraft, FieldErrors, PdfFile, PDF_MIME};

/// Device form check
///
/// Type and brand must be picked; the name must contain a non-space character.
pub fn validate_device_info(draft: &DeviceDraft) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    if draft.device_type.is_empty() {
        errors.insert("device_type", "Device type is required");
    }
    if draft.brand_name.is_empty() {
        errors.insert("brand_name", "Brand name is required");
    }
    if draft.device_name.trim().is_empty() {
        errors.insert("device_name", "Device name is required");
    }

    errors.into_result()
}

/// PDF picker check: MIME must be `application/pdf` and size at most `max_bytes`
pub fn validate_upload(file: &PdfFile, max_bytes: u64) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    if file.mime != PDF_MIME {
        errors.insert("pdf_file", "Only PDF files are allowed");
    } else if file.size() > max_bytes {
        errors.insert(
            "pdf_file",
            &format!("File size must not exceed {}MB", max_bytes / (1024 * 1024)),
        );
    }

    errors.into_result()
}

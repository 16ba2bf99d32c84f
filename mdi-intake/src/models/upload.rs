//! Picked PDF file and its upload ticket

use crate::error::IntakeResult;
use std::path::Path;

/// MIME type accepted by the upload step
pub const PDF_MIME: &str = "application/pdf";

/// A file picked for upload
#[derive(Clone, PartialEq, Eq)]
pub struct PdfFile {
    pub name: String,
    /// MIME type as detected when the file was picked
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl PdfFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, detecting its MIME type
    ///
    /// Content sniffing wins; the extension is only consulted when the
    /// magic bytes are unrecognized.
    pub async fn from_path(path: &Path) -> IntakeResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        let mime = detect_mime(path, &bytes);

        tracing::debug!(file = %name, mime = %mime, size = bytes.len(), "Picked file");

        Ok(Self { name, mime, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for PdfFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

fn detect_mime(path: &Path, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MIME.to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

/// Step 2 result
///
/// `pdf_id` is only meaningful once `uploaded` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub file: PdfFile,
    pub signed_url: String,
    /// Present only if the signed-URL reply carried it
    pub pdf_id: Option<i64>,
    /// Direct PUT to `signed_url` succeeded
    pub uploaded: bool,
}

//! Processing Backend contract
//!
//! One method per consumed endpoint, plus the two direct object-storage
//! operations that go through signed URLs. The workflow controller and the
//! editors only ever talk to this trait, so tests run them against fakes.

use crate::error::IntakeResult;
use crate::models::{Catalog, Chunk, ImageItem};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// `chunk_id` the backend expects for a chunk it has not stored yet
pub const NEW_CHUNK_WIRE_ID: i64 = -1;

/// Reply of `pdf_upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUpload {
    pub signed_url: String,
    #[serde(default)]
    pub pdf_id: Option<i64>,
}

/// Reply of `create_new_image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImageTarget {
    pub signed_url: String,
    pub image_id: i64,
    #[serde(default)]
    pub sequence: Option<i64>,
}

/// Chunks and images of one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    pub chunks: Vec<Chunk>,
    pub images: Vec<ImageItem>,
    /// Paragraph new chunks on this page attach to
    pub paragraph_id: Option<i64>,
}

/// Reply of `get_pdf_initial_state` (page 1 plus the document read URL)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialPdfState {
    pub read_url: String,
    pub page: PageState,
}

/// Body of `save_and_embed_paragraph`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveParagraphRequest {
    pub pdf_paragraph_id: Option<i64>,
    pub chunk_context: String,
    pub chunk_id: i64,
}

impl SaveParagraphRequest {
    pub fn for_chunk(chunk: &Chunk) -> Self {
        Self {
            pdf_paragraph_id: chunk.paragraph_id(),
            chunk_context: chunk.value().to_string(),
            chunk_id: chunk.id().unwrap_or(NEW_CHUNK_WIRE_ID),
        }
    }
}

/// Bearer token issued by `admin_login`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminToken(pub String);

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminToken(***)")
    }
}

/// Processing Backend operations
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    /// `GET get_brands_and_device_types`
    async fn get_brands_and_device_types(&self) -> IntakeResult<Catalog>;

    /// `GET new_device`, returns the assigned device id
    async fn new_device(&self, label: &str, device_type_id: i64, brand_id: i64)
        -> IntakeResult<i64>;

    /// `GET pdf_upload`
    async fn pdf_upload(&self, device_id: i64) -> IntakeResult<SignedUpload>;

    /// `GET extract_pdf`, Ok only on `success: true`
    async fn extract_pdf(&self, pdf_id: i64) -> IntakeResult<()>;

    /// `GET get_pdf_initial_state`
    async fn get_pdf_initial_state(&self, pdf_id: i64) -> IntakeResult<InitialPdfState>;

    /// `GET get_pdf_state` for pages ≥ 2
    async fn get_pdf_state(&self, pdf_id: i64, page_number: u32) -> IntakeResult<PageState>;

    /// `POST save_and_embed_paragraph`, returns the chunk id if the reply carries one
    async fn save_and_embed_paragraph(&self, request: &SaveParagraphRequest)
        -> IntakeResult<Option<i64>>;

    /// `POST delete_chunk`
    async fn delete_chunk(&self, chunk_id: i64) -> IntakeResult<()>;

    /// `POST create_new_image`
    async fn create_new_image(&self, pdf_id: i64, page_number: u32)
        -> IntakeResult<NewImageTarget>;

    /// `GET get_img_signed_url`
    async fn get_img_signed_url(&self, image_id: i64) -> IntakeResult<String>;

    /// `POST save_and_embed_img_alt`
    async fn save_and_embed_img_alt(&self, image_id: i64, alt: &str) -> IntakeResult<()>;

    /// `POST /auth/admin_login`
    async fn admin_login(&self, username: &str, password: &str) -> IntakeResult<AdminToken>;

    /// Direct `PUT` of bytes to a signed URL
    async fn put_signed(&self, url: &str, content_type: &str, bytes: Vec<u8>) -> IntakeResult<()>;

    /// Direct `GET` of a signed read URL
    async fn fetch_signed(&self, url: &str) -> IntakeResult<Vec<u8>>;
}

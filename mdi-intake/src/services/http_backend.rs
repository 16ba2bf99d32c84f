//! HTTP client for the Processing Backend
//!
//! Every backend reply is a `{success, data, message}` envelope. Decoding
//! happens in one place:
//! - transport failure → `Network`
//! - non-2xx → `Status` (backend message kept when the body has one)
//! - `success: false` → `Rejected`
//! - 2xx with the wrong shape → `Malformed`
//!
//! Nothing here retries; the caller decides whether to re-invoke.

use crate::error::{IntakeError, IntakeResult};
use crate::models::{Catalog, Chunk, ImageItem};
use crate::services::backend::{
    AdminToken, InitialPdfState, NewImageTarget, PageState, ProcessingBackend,
    SaveParagraphRequest, SignedUpload, NEW_CHUNK_WIRE_ID,
};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

const USER_AGENT: &str = concat!("MDI-Intake/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `{success, data, message}` reply envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: Option<bool>,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(alias = "id")]
    chunk_id: i64,
    #[serde(default)]
    pdf_paragraph_id: Option<i64>,
    #[serde(alias = "value", default)]
    chunk_context: Option<String>,
}

impl From<WireChunk> for Chunk {
    fn from(wire: WireChunk) -> Self {
        let value = wire.chunk_context.unwrap_or_default();
        if wire.chunk_id == NEW_CHUNK_WIRE_ID {
            Chunk::Unsaved {
                paragraph_id: wire.pdf_paragraph_id,
                value,
            }
        } else {
            Chunk::Saved {
                id: wire.chunk_id,
                paragraph_id: wire.pdf_paragraph_id,
                value,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePageState {
    #[serde(default)]
    images: Vec<ImageItem>,
    #[serde(default)]
    page_paragraph_chunks: Vec<WireChunk>,
    #[serde(default)]
    pdf_paragraph_id: Option<i64>,
}

impl From<WirePageState> for PageState {
    fn from(wire: WirePageState) -> Self {
        let chunks: Vec<Chunk> = wire.page_paragraph_chunks.into_iter().map(Chunk::from).collect();
        let paragraph_id = wire
            .pdf_paragraph_id
            .or_else(|| chunks.iter().find_map(Chunk::paragraph_id));
        PageState {
            chunks,
            images: wire.images,
            paragraph_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireInitialState {
    pdf_gcs_signed_read_url: String,
    #[serde(flatten)]
    page: WirePageState,
}

#[derive(Debug, Deserialize)]
struct WireSavedChunk {
    #[serde(default)]
    chunk_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireSignedUrl {
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct WireToken {
    token: String,
}

#[derive(Serialize)]
struct DeleteChunkBody {
    chunk_id: i64,
}

#[derive(Serialize)]
struct NewImageBody {
    pdf_id: i64,
    page_number: u32,
}

#[derive(Serialize)]
struct ImageAltBody<'a> {
    pdf_image_id: i64,
    img_alt: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// reqwest-backed `ProcessingBackend`
pub struct HttpProcessingBackend {
    http_client: reqwest::Client,
    base_url: String,
    auth_token: RwLock<Option<String>>,
}

impl HttpProcessingBackend {
    /// Create a client for `base_url` (e.g. `http://localhost:8080`)
    pub fn new(base_url: &str) -> IntakeResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> IntakeResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::network("client", e))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach `Authorization: Bearer` to subsequent backend calls
    pub fn set_auth_token(&self, token: Option<AdminToken>) {
        let mut guard = self.auth_token.write().unwrap_or_else(|p| p.into_inner());
        *guard = token.map(|t| t.0);
    }

    /// Log in as admin and authenticate every later call with the token
    pub async fn sign_in(&self, username: &str, password: &str) -> IntakeResult<()> {
        let token = self.admin_login(username, password).await?;
        self.set_auth_token(Some(token));
        tracing::info!(username, "Signed in to backend");
        Ok(())
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token: Option<String> = match self.auth_token.read() {
            Ok(guard) => (*guard).clone(),
            Err(poisoned) => (*poisoned.into_inner()).clone(),
        };
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> IntakeResult<Envelope<T>> {
        tracing::debug!(endpoint = path, ?query, "GET backend");
        let response = self
            .authorize(self.http_client.get(self.endpoint_url(path)).query(query))
            .send()
            .await
            .map_err(|e| IntakeError::network(path, e))?;
        decode_envelope(path, response).await
    }

    async fn post_envelope<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> IntakeResult<Envelope<T>> {
        tracing::debug!(endpoint = path, "POST backend");
        let response = self
            .authorize(self.http_client.post(self.endpoint_url(path)).json(body))
            .send()
            .await
            .map_err(|e| IntakeError::network(path, e))?;
        decode_envelope(path, response).await
    }
}

/// Decode a reply; bodies that are empty or not JSON count as an empty envelope
async fn decode_envelope<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> IntakeResult<Envelope<T>> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| IntakeError::network(endpoint, e))?;

    if !status.is_success() {
        let message = serde_json::from_slice::<Envelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|env| env.message);
        tracing::warn!(endpoint, status = status.as_u16(), ?message, "Backend returned error status");
        return Err(IntakeError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> = if body.iter().all(u8::is_ascii_whitespace) {
        Envelope {
            success: None,
            data: None,
            message: None,
        }
    } else {
        serde_json::from_slice(&body).map_err(|e| IntakeError::malformed(endpoint, e.to_string()))?
    };

    if envelope.success == Some(false) {
        tracing::warn!(endpoint, message = ?envelope.message, "Backend rejected request");
        return Err(IntakeError::Rejected {
            endpoint: endpoint.to_string(),
            message: envelope.message,
        });
    }

    Ok(envelope)
}

fn require_data<T>(endpoint: &str, envelope: Envelope<T>) -> IntakeResult<T> {
    envelope
        .data
        .ok_or_else(|| IntakeError::malformed(endpoint, "missing data"))
}

#[async_trait]
impl ProcessingBackend for HttpProcessingBackend {
    async fn get_brands_and_device_types(&self) -> IntakeResult<Catalog> {
        const EP: &str = "pdf_process/get_brands_and_device_types";
        let envelope = self.get_envelope::<Catalog>(EP, &[]).await?;
        require_data(EP, envelope)
    }

    async fn new_device(
        &self,
        label: &str,
        device_type_id: i64,
        brand_id: i64,
    ) -> IntakeResult<i64> {
        const EP: &str = "pdf_process/new_device";
        let query = [
            ("label", label.to_string()),
            ("device_type_id", device_type_id.to_string()),
            ("brand_id", brand_id.to_string()),
        ];
        let data: serde_json::Value = require_data(EP, self.get_envelope(EP, &query).await?)?;

        // Only a JSON number counts; strings such as "42" are a contract violation
        data.get("device_id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| IntakeError::malformed(EP, "data.device_id missing or not numeric"))
    }

    async fn pdf_upload(&self, device_id: i64) -> IntakeResult<SignedUpload> {
        const EP: &str = "pdf_process/pdf_upload";
        let query = [("device_id", device_id.to_string())];
        require_data(EP, self.get_envelope(EP, &query).await?)
    }

    async fn extract_pdf(&self, pdf_id: i64) -> IntakeResult<()> {
        const EP: &str = "pdf_process/extract_pdf";
        let query = [("pdf_id", pdf_id.to_string())];
        let envelope = self.get_envelope::<serde_json::Value>(EP, &query).await?;
        match envelope.success {
            Some(true) => Ok(()),
            _ => Err(IntakeError::Rejected {
                endpoint: EP.to_string(),
                message: envelope.message,
            }),
        }
    }

    async fn get_pdf_initial_state(&self, pdf_id: i64) -> IntakeResult<InitialPdfState> {
        const EP: &str = "pdf_process/get_pdf_initial_state";
        let query = [("pdf_id", pdf_id.to_string())];
        let wire: WireInitialState = require_data(EP, self.get_envelope(EP, &query).await?)?;
        Ok(InitialPdfState {
            read_url: wire.pdf_gcs_signed_read_url,
            page: wire.page.into(),
        })
    }

    async fn get_pdf_state(&self, pdf_id: i64, page_number: u32) -> IntakeResult<PageState> {
        const EP: &str = "pdf_process/get_pdf_state";
        let query = [
            ("pdf_id", pdf_id.to_string()),
            ("page_number", page_number.to_string()),
        ];
        let wire: WirePageState = require_data(EP, self.get_envelope(EP, &query).await?)?;
        Ok(wire.into())
    }

    async fn save_and_embed_paragraph(
        &self,
        request: &SaveParagraphRequest,
    ) -> IntakeResult<Option<i64>> {
        const EP: &str = "pdf_process/save_and_embed_paragraph";
        let envelope = self.post_envelope::<_, WireSavedChunk>(EP, request).await?;
        Ok(envelope.data.and_then(|d| d.chunk_id))
    }

    async fn delete_chunk(&self, chunk_id: i64) -> IntakeResult<()> {
        const EP: &str = "pdf_process/delete_chunk";
        self.post_envelope::<_, serde_json::Value>(EP, &DeleteChunkBody { chunk_id })
            .await?;
        Ok(())
    }

    async fn create_new_image(
        &self,
        pdf_id: i64,
        page_number: u32,
    ) -> IntakeResult<NewImageTarget> {
        const EP: &str = "pdf_process/create_new_image";
        let body = NewImageBody { pdf_id, page_number };
        require_data(EP, self.post_envelope(EP, &body).await?)
    }

    async fn get_img_signed_url(&self, image_id: i64) -> IntakeResult<String> {
        const EP: &str = "pdf_process/get_img_signed_url";
        let query = [("img_id", image_id.to_string())];
        let wire: WireSignedUrl = require_data(EP, self.get_envelope(EP, &query).await?)?;
        Ok(wire.signed_url)
    }

    async fn save_and_embed_img_alt(&self, image_id: i64, alt: &str) -> IntakeResult<()> {
        const EP: &str = "pdf_process/save_and_embed_img_alt";
        let body = ImageAltBody {
            pdf_image_id: image_id,
            img_alt: alt,
        };
        self.post_envelope::<_, serde_json::Value>(EP, &body).await?;
        Ok(())
    }

    async fn admin_login(&self, username: &str, password: &str) -> IntakeResult<AdminToken> {
        const EP: &str = "auth/admin_login";
        let body = LoginBody { username, password };
        let wire: WireToken = require_data(EP, self.post_envelope(EP, &body).await?)?;
        Ok(AdminToken(wire.token))
    }

    async fn put_signed(&self, url: &str, content_type: &str, bytes: Vec<u8>) -> IntakeResult<()> {
        let size = bytes.len();
        let response = self
            .http_client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| IntakeError::network("signed upload", e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Signed URL upload refused");
            return Err(IntakeError::UploadFailed {
                status: status.as_u16(),
            });
        }

        tracing::debug!(size, content_type, "Signed URL upload complete");
        Ok(())
    }

    async fn fetch_signed(&self, url: &str) -> IntakeResult<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| IntakeError::network("signed download", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntakeError::Status {
                endpoint: "signed download".to_string(),
                status: status.as_u16(),
                message: None,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IntakeError::network("signed download", e))?;
        Ok(bytes.to_vec())
    }
}

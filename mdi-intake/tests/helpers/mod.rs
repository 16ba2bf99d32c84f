//! Test Helper Utilities
//!
//! Scripted in-process Processing Backend for controller and editor tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mdi_intake::error::{IntakeError, IntakeResult};
use mdi_intake::models::{Catalog, CatalogEntry, Chunk, ImageItem};
use mdi_intake::services::{
    AdminToken, InitialPdfState, NewImageTarget, PageState, ProcessingBackend,
    SaveParagraphRequest, SignedUpload,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Catalog,
    NewDevice {
        label: String,
        device_type_id: i64,
        brand_id: i64,
    },
    PdfUpload(i64),
    ExtractPdf(i64),
    InitialState(i64),
    PageState { pdf_id: i64, page: u32 },
    SaveParagraph(SaveParagraphRequest),
    DeleteChunk(i64),
    CreateNewImage { pdf_id: i64, page: u32 },
    ImgSignedUrl(i64),
    SaveImgAlt { image_id: i64, alt: String },
    AdminLogin(String),
    PutSigned { url: String, content_type: String, len: usize },
    FetchSigned(String),
}

/// Canned replies; an `Some(message)` error field makes that call fail with
/// `success: false` and that message
#[derive(Debug, Clone)]
pub struct Script {
    pub catalog: Catalog,
    pub device_id: i64,
    pub new_device_error: Option<String>,
    pub signed_url: String,
    pub pdf_id: Option<i64>,
    pub put_status: Option<u16>,
    pub extract_error: Option<String>,
    pub read_url: String,
    pub pages: BTreeMap<u32, PageState>,
    pub document: Vec<u8>,
    pub saved_chunk_id: Option<i64>,
    pub save_error: Option<String>,
    pub delete_error: Option<String>,
    pub next_image_id: i64,
    pub alt_error: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            catalog: sample_catalog(),
            device_id: 42,
            new_device_error: None,
            signed_url: "https://storage.test/upload/manual.pdf?sig=abc".to_string(),
            pdf_id: Some(7),
            put_status: None,
            extract_error: None,
            read_url: "https://storage.test/read/manual.pdf?sig=def".to_string(),
            pages: BTreeMap::new(),
            document: Vec::new(),
            saved_chunk_id: Some(500),
            save_error: None,
            delete_error: None,
            next_image_id: 900,
            alt_error: None,
        }
    }
}

pub struct FakeBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    /// When set, `new_device` waits for a notification before answering
    new_device_gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            new_device_gate: None,
        })
    }

    pub fn gated(script: Script, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            new_device_gate: Some(gate),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Change the script mid-test
    pub fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    /// Wait until a recorded call satisfies `pred`
    pub async fn wait_for(&self, pred: impl Fn(&Call) -> bool) {
        for _ in 0..200 {
            if self.count(&pred) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected backend call never happened: {:?}", self.calls());
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn script(&self) -> Script {
        self.script.lock().unwrap().clone()
    }

    fn page(&self, page: u32) -> PageState {
        self.script().pages.get(&page).cloned().unwrap_or_default()
    }
}

fn rejected(endpoint: &str, message: String) -> IntakeError {
    IntakeError::Rejected {
        endpoint: endpoint.to_string(),
        message: Some(message),
    }
}

#[async_trait]
impl ProcessingBackend for FakeBackend {
    async fn get_brands_and_device_types(&self) -> IntakeResult<Catalog> {
        self.record(Call::Catalog);
        Ok(self.script().catalog)
    }

    async fn new_device(&self, label: &str, device_type_id: i64, brand_id: i64) -> IntakeResult<i64> {
        self.record(Call::NewDevice {
            label: label.to_string(),
            device_type_id,
            brand_id,
        });
        if let Some(gate) = &self.new_device_gate {
            gate.notified().await;
        }
        let script = self.script();
        match script.new_device_error {
            Some(message) => Err(rejected("new_device", message)),
            None => Ok(script.device_id),
        }
    }

    async fn pdf_upload(&self, device_id: i64) -> IntakeResult<SignedUpload> {
        self.record(Call::PdfUpload(device_id));
        let script = self.script();
        Ok(SignedUpload {
            signed_url: script.signed_url,
            pdf_id: script.pdf_id,
        })
    }

    async fn extract_pdf(&self, pdf_id: i64) -> IntakeResult<()> {
        self.record(Call::ExtractPdf(pdf_id));
        match self.script().extract_error {
            Some(message) => Err(rejected("extract_pdf", message)),
            None => Ok(()),
        }
    }

    async fn get_pdf_initial_state(&self, pdf_id: i64) -> IntakeResult<InitialPdfState> {
        self.record(Call::InitialState(pdf_id));
        Ok(InitialPdfState {
            read_url: self.script().read_url,
            page: self.page(1),
        })
    }

    async fn get_pdf_state(&self, pdf_id: i64, page_number: u32) -> IntakeResult<PageState> {
        self.record(Call::PageState {
            pdf_id,
            page: page_number,
        });
        Ok(self.page(page_number))
    }

    async fn save_and_embed_paragraph(&self, request: &SaveParagraphRequest) -> IntakeResult<Option<i64>> {
        self.record(Call::SaveParagraph(request.clone()));
        let script = self.script();
        match script.save_error {
            Some(message) => Err(rejected("save_and_embed_paragraph", message)),
            None => Ok(script.saved_chunk_id),
        }
    }

    async fn delete_chunk(&self, chunk_id: i64) -> IntakeResult<()> {
        self.record(Call::DeleteChunk(chunk_id));
        match self.script().delete_error {
            Some(message) => Err(rejected("delete_chunk", message)),
            None => Ok(()),
        }
    }

    async fn create_new_image(&self, pdf_id: i64, page_number: u32) -> IntakeResult<NewImageTarget> {
        self.record(Call::CreateNewImage {
            pdf_id,
            page: page_number,
        });
        let script = self.script();
        Ok(NewImageTarget {
            signed_url: format!("https://storage.test/img/{}.png?sig=x", script.next_image_id),
            image_id: script.next_image_id,
            sequence: Some(1),
        })
    }

    async fn get_img_signed_url(&self, image_id: i64) -> IntakeResult<String> {
        self.record(Call::ImgSignedUrl(image_id));
        Ok(format!("https://storage.test/img/{}.png?sig=read", image_id))
    }

    async fn save_and_embed_img_alt(&self, image_id: i64, alt: &str) -> IntakeResult<()> {
        self.record(Call::SaveImgAlt {
            image_id,
            alt: alt.to_string(),
        });
        match self.script().alt_error {
            Some(message) => Err(rejected("save_and_embed_img_alt", message)),
            None => Ok(()),
        }
    }

    async fn admin_login(&self, username: &str, _password: &str) -> IntakeResult<AdminToken> {
        self.record(Call::AdminLogin(username.to_string()));
        Ok(AdminToken("token".to_string()))
    }

    async fn put_signed(&self, url: &str, content_type: &str, bytes: Vec<u8>) -> IntakeResult<()> {
        self.record(Call::PutSigned {
            url: url.to_string(),
            content_type: content_type.to_string(),
            len: bytes.len(),
        });
        match self.script().put_status {
            Some(status) => Err(IntakeError::UploadFailed { status }),
            None => Ok(()),
        }
    }

    async fn fetch_signed(&self, url: &str) -> IntakeResult<Vec<u8>> {
        self.record(Call::FetchSigned(url.to_string()));
        Ok(self.script().document)
    }
}

pub fn sample_catalog() -> Catalog {
    Catalog {
        device_types: vec![
            CatalogEntry {
                id: 1,
                name: "Washing Machine".to_string(),
            },
            CatalogEntry {
                id: 2,
                name: "Dryer".to_string(),
            },
        ],
        brands: vec![
            CatalogEntry {
                id: 10,
                name: "Acme".to_string(),
            },
            CatalogEntry {
                id: 11,
                name: "Globex".to_string(),
            },
        ],
    }
}

pub fn saved_chunk(id: i64, paragraph_id: i64, value: &str) -> Chunk {
    Chunk::Saved {
        id,
        paragraph_id: Some(paragraph_id),
        value: value.to_string(),
    }
}

pub fn page_with(chunks: Vec<Chunk>, images: Vec<ImageItem>, paragraph_id: i64) -> PageState {
    PageState {
        chunks,
        images,
        paragraph_id: Some(paragraph_id),
    }
}

/// Minimal PDF: header bytes are enough for content sniffing
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n".to_vec()
}

/// Well-formed PDF with `count` empty pages
pub fn pdf_with_pages(count: i64) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..count)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

//! Per-page chunk and image editor
//!
//! Shows one PDF page at a time. Every page change refetches that page's
//! chunks and images and replaces the in-memory lists; nothing is cached
//! across pages. Page 1 comes from `get_pdf_initial_state` (which also
//! returns the document's signed read URL), later pages from `get_pdf_state`.
//!
//! Chunk invariants:
//! - at most one unsaved chunk at a time
//! - an unsaved chunk is deleted locally, a saved one only after the backend
//!   confirms
//! - a failed save leaves the chunk in edit mode with `last_error` set

use crate::error::{IntakeError, IntakeResult};
use crate::models::{Chunk, ChunkSlot, EditMode, ImageItem};
use crate::services::backend::{PageState, ProcessingBackend, SaveParagraphRequest};
use crate::services::image_labeler::ImageLabeler;
use crate::services::snip::{snip_png, upload_snip, SnipRegion};
use chrono::Utc;
use image::RgbaImage;
use mdi_common::events::{EventBus, IntakeEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Number of pages in a PDF document
pub fn count_pdf_pages(bytes: &[u8]) -> IntakeResult<u32> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| IntakeError::Document(e.to_string()))?;
    Ok(document.get_pages().len() as u32)
}

pub struct PageEditor {
    backend: Arc<dyn ProcessingBackend>,
    event_bus: EventBus,
    pdf_id: i64,
    page: u32,
    num_pages: u32,
    read_url: String,
    paragraph_id: Option<i64>,
    chunks: Vec<ChunkSlot>,
    labeler: ImageLabeler,
}

impl PageEditor {
    /// Open the editor on page 1 of `pdf_id`
    ///
    /// The page count starts at 1 until `load_document` or `set_num_pages`
    /// supplies the real value.
    pub async fn open(
        backend: Arc<dyn ProcessingBackend>,
        event_bus: EventBus,
        pdf_id: i64,
    ) -> IntakeResult<Self> {
        let initial = backend.get_pdf_initial_state(pdf_id).await?;
        tracing::info!(
            pdf_id,
            chunks = initial.page.chunks.len(),
            images = initial.page.images.len(),
            "Editor opened"
        );

        let labeler = ImageLabeler::new(Arc::clone(&backend), event_bus.clone(), Vec::new());
        let mut editor = Self {
            backend,
            event_bus,
            pdf_id,
            page: 1,
            num_pages: 1,
            read_url: initial.read_url,
            paragraph_id: None,
            chunks: Vec::new(),
            labeler,
        };
        editor.apply_page(initial.page);
        Ok(editor)
    }

    /// Download the document through its read URL and count its pages
    pub async fn load_document(&mut self) -> IntakeResult<u32> {
        let bytes = self.backend.fetch_signed(&self.read_url).await?;
        let pages = count_pdf_pages(&bytes)?;
        self.set_num_pages(pages);
        tracing::debug!(pdf_id = self.pdf_id, pages, "Document loaded");
        Ok(self.num_pages)
    }

    /// Page count supplied by whoever renders the document
    pub fn set_num_pages(&mut self, pages: u32) {
        self.num_pages = pages.max(1);
    }

    pub fn pdf_id(&self) -> i64 {
        self.pdf_id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn read_url(&self) -> &str {
        &self.read_url
    }

    pub fn chunks(&self) -> &[ChunkSlot] {
        &self.chunks
    }

    pub fn images(&self) -> &[ImageItem] {
        self.labeler.items()
    }

    pub fn labeler(&self) -> &ImageLabeler {
        &self.labeler
    }

    pub fn labeler_mut(&mut self) -> &mut ImageLabeler {
        &mut self.labeler
    }

    // ------------------------------------------------------------------
    // Page navigation
    // ------------------------------------------------------------------

    /// Show page `page` (clamped to `[1, num_pages]`)
    ///
    /// Returns false without fetching when the clamped page is the current
    /// one. On fetch failure the editor stays on the current page.
    pub async fn go_to_page(&mut self, page: u32) -> IntakeResult<bool> {
        let target = page.clamp(1, self.num_pages);
        if target == self.page {
            return Ok(false);
        }

        let state = self.fetch_page(target).await?;
        self.page = target;
        self.apply_page(state);
        Ok(true)
    }

    pub async fn go_to_prev_page(&mut self) -> IntakeResult<bool> {
        self.go_to_page(self.page.saturating_sub(1)).await
    }

    pub async fn go_to_next_page(&mut self) -> IntakeResult<bool> {
        self.go_to_page(self.page.saturating_add(1)).await
    }

    /// Refetch the current page, discarding local edits
    pub async fn reload(&mut self) -> IntakeResult<()> {
        let state = self.fetch_page(self.page).await?;
        self.apply_page(state);
        Ok(())
    }

    async fn fetch_page(&mut self, page: u32) -> IntakeResult<PageState> {
        tracing::debug!(pdf_id = self.pdf_id, page, "Fetching page state");
        if page == 1 {
            let initial = self.backend.get_pdf_initial_state(self.pdf_id).await?;
            self.read_url = initial.read_url;
            Ok(initial.page)
        } else {
            self.backend.get_pdf_state(self.pdf_id, page).await
        }
    }

    fn apply_page(&mut self, state: PageState) {
        self.paragraph_id = state.paragraph_id;
        self.chunks = state.chunks.into_iter().map(ChunkSlot::viewing).collect();
        self.labeler.replace_items(state.images);
    }

    // ------------------------------------------------------------------
    // Chunks
    // ------------------------------------------------------------------

    /// False while an unsaved chunk exists (the "add" button is disabled)
    pub fn can_add_chunk(&self) -> bool {
        !self.chunks.iter().any(|slot| slot.chunk.is_unsaved())
    }

    /// Append an empty unsaved chunk in edit mode and return its index
    pub fn add_chunk(&mut self) -> IntakeResult<usize> {
        if !self.can_add_chunk() {
            return Err(IntakeError::UnsavedChunkPending);
        }

        self.chunks.push(ChunkSlot::editing(Chunk::Unsaved {
            paragraph_id: self.paragraph_id,
            value: String::new(),
        }));
        Ok(self.chunks.len() - 1)
    }

    pub fn begin_edit(&mut self, index: usize) -> IntakeResult<()> {
        let slot = self.slot_mut(index)?;
        slot.mode = EditMode::Editing;
        Ok(())
    }

    /// Replace the text of a chunk in edit mode
    pub fn update_text(&mut self, index: usize, text: impl Into<String>) -> IntakeResult<()> {
        let slot = self.slot_mut(index)?;
        if !slot.is_editing() {
            return Err(IntakeError::NotEditing(index));
        }
        slot.chunk.set_value(text.into());
        Ok(())
    }

    /// Viewing → Editing, or Editing → save
    pub async fn toggle_edit(&mut self, index: usize) -> IntakeResult<EditMode> {
        if self.slot(index)?.is_editing() {
            self.save_chunk(index).await?;
            Ok(EditMode::Viewing)
        } else {
            self.begin_edit(index)?;
            Ok(EditMode::Editing)
        }
    }

    /// Persist and embed a chunk, adopting the id the backend returns
    ///
    /// On failure the chunk stays in edit mode with `last_error` set and the
    /// save can be retried.
    pub async fn save_chunk(&mut self, index: usize) -> IntakeResult<i64> {
        let request = SaveParagraphRequest::for_chunk(&self.slot(index)?.chunk);
        let local_id = self.slot(index)?.chunk.id();

        let result = match self.backend.save_and_embed_paragraph(&request).await {
            Ok(returned) => returned.or(local_id).ok_or_else(|| {
                IntakeError::malformed("save_and_embed_paragraph", "no chunk_id for new chunk")
            }),
            Err(e) => Err(e),
        };

        let page = self.page;
        let pdf_id = self.pdf_id;
        let slot = self.slot_mut(index)?;
        match result {
            Ok(chunk_id) => {
                slot.chunk = slot.chunk.clone().into_saved(chunk_id);
                slot.mode = EditMode::Viewing;
                slot.last_error = None;
                tracing::info!(pdf_id, page, chunk_id, "Chunk saved");
                self.event_bus.emit_lossy(IntakeEvent::ChunkSaved {
                    pdf_id,
                    page,
                    chunk_id,
                    timestamp: Utc::now(),
                });
                Ok(chunk_id)
            }
            Err(e) => {
                tracing::warn!(pdf_id, page, index, error = %e, "Chunk save failed");
                slot.mode = EditMode::Editing;
                slot.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Remove a chunk; saved chunks are deleted on the backend first
    pub async fn delete_chunk(&mut self, index: usize) -> IntakeResult<()> {
        let chunk_id = self.slot(index)?.chunk.id();

        if let Some(id) = chunk_id {
            if let Err(e) = self.backend.delete_chunk(id).await {
                tracing::warn!(pdf_id = self.pdf_id, chunk_id = id, error = %e, "Chunk delete failed");
                self.slot_mut(index)?.last_error = Some(e.user_message());
                return Err(e);
            }
        }

        self.chunks.remove(index);
        self.event_bus.emit_lossy(IntakeEvent::ChunkDeleted {
            pdf_id: self.pdf_id,
            page: self.page,
            chunk_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn slot(&self, index: usize) -> IntakeResult<&ChunkSlot> {
        let len = self.chunks.len();
        self.chunks
            .get(index)
            .ok_or(IntakeError::IndexOutOfRange { index, len })
    }

    fn slot_mut(&mut self, index: usize) -> IntakeResult<&mut ChunkSlot> {
        let len = self.chunks.len();
        self.chunks
            .get_mut(index)
            .ok_or(IntakeError::IndexOutOfRange { index, len })
    }

    // ------------------------------------------------------------------
    // Snip
    // ------------------------------------------------------------------

    /// Capture `region` of the rendered current page as a new image
    ///
    /// Returns the uploaded image; it is appended to the page's images
    /// unless an image with the same id is already listed.
    pub async fn snip_and_upload(
        &mut self,
        page_raster: &RgbaImage,
        region: SnipRegion,
        cancel: &CancellationToken,
    ) -> IntakeResult<ImageItem> {
        let png = snip_png(page_raster, &region)?;
        let item = match upload_snip(self.backend.as_ref(), self.pdf_id, self.page, png, cancel).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(pdf_id = self.pdf_id, page = self.page, error = %e, "Snip upload did not complete");
                return Err(e);
            }
        };

        if self.labeler.insert_unique(item.clone()) {
            self.event_bus.emit_lossy(IntakeEvent::ImageSnipped {
                pdf_id: self.pdf_id,
                page: self.page,
                image_id: item.id,
                timestamp: Utc::now(),
            });
        }
        Ok(item)
    }
}

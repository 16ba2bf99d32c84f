//! Image labeling sub-view
//!
//! Cycles through the page's images with wrap-around, resolves each image's
//! signed URL lazily when it becomes active, and saves alt text one image
//! at a time when edit mode is toggled off.

use crate::error::{IntakeError, IntakeResult};
use crate::models::ImageItem;
use crate::services::backend::ProcessingBackend;
use chrono::Utc;
use mdi_common::events::{EventBus, IntakeEvent};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ImageLabeler {
    backend: Arc<dyn ProcessingBackend>,
    event_bus: EventBus,
    items: Vec<ImageItem>,
    index: usize,
    /// Signed URLs resolved on the current page, by image id
    url_cache: HashMap<i64, String>,
    editing: bool,
    description: String,
}

impl ImageLabeler {
    pub fn new(backend: Arc<dyn ProcessingBackend>, event_bus: EventBus, items: Vec<ImageItem>) -> Self {
        let mut labeler = Self {
            backend,
            event_bus,
            items: Vec::new(),
            index: 0,
            url_cache: HashMap::new(),
            editing: false,
            description: String::new(),
        };
        labeler.replace_items(items);
        labeler
    }

    /// Swap in a freshly fetched page's images
    pub fn replace_items(&mut self, items: Vec<ImageItem>) {
        self.items = items;
        self.index = 0;
        self.url_cache.clear();
        self.reset_edit();
    }

    /// Append `item` unless an image with its id is already listed
    pub fn insert_unique(&mut self, item: ImageItem) -> bool {
        if self.items.iter().any(|existing| existing.id == item.id) {
            tracing::debug!(image_id = item.id, "Image already listed, not appending");
            return false;
        }
        self.items.push(item);
        if self.items.len() == 1 {
            self.reset_edit();
        }
        true
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&ImageItem> {
        self.items.get(self.index)
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Alt text being shown or edited for the active image
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Next image, wrapping to the first
    pub fn next(&mut self) -> Option<&ImageItem> {
        if self.items.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.items.len();
        self.reset_edit();
        self.current()
    }

    /// Previous image, wrapping to the last
    pub fn prev(&mut self) -> Option<&ImageItem> {
        if self.items.is_empty() {
            return None;
        }
        let len = self.items.len();
        self.index = (self.index + len - 1) % len;
        self.reset_edit();
        self.current()
    }

    /// Signed URL of the active image, fetched on first use
    pub async fn current_url(&mut self) -> IntakeResult<String> {
        let image_id = self.current().ok_or(IntakeError::NoImages)?.id;
        if let Some(url) = self.url_cache.get(&image_id) {
            return Ok(url.clone());
        }

        let url = self.backend.get_img_signed_url(image_id).await?;
        self.url_cache.insert(image_id, url.clone());
        Ok(url)
    }

    pub fn begin_edit(&mut self) -> IntakeResult<()> {
        let alt = self.current().ok_or(IntakeError::NoImages)?.alt.clone();
        self.description = alt;
        self.editing = true;
        Ok(())
    }

    pub fn set_description(&mut self, text: impl Into<String>) -> IntakeResult<()> {
        if !self.editing {
            return Err(IntakeError::NotEditing(self.index));
        }
        self.description = text.into();
        Ok(())
    }

    /// Toggle edit mode; toggling off saves the alt text
    ///
    /// Returns the new edit state. A failed save stays in edit mode so the
    /// user can retry.
    pub async fn toggle_edit(&mut self) -> IntakeResult<bool> {
        if !self.editing {
            self.begin_edit()?;
            return Ok(true);
        }

        let image_id = self.current().ok_or(IntakeError::NoImages)?.id;
        if let Err(e) = self
            .backend
            .save_and_embed_img_alt(image_id, &self.description)
            .await
        {
            tracing::warn!(image_id, error = %e, "Saving alt text failed");
            return Err(e);
        }

        if let Some(item) = self.items.get_mut(self.index) {
            item.alt = self.description.clone();
        }
        self.editing = false;
        tracing::info!(image_id, "Alt text saved");
        self.event_bus.emit_lossy(IntakeEvent::ImageAltSaved {
            image_id,
            timestamp: Utc::now(),
        });
        Ok(false)
    }

    fn reset_edit(&mut self) {
        self.editing = false;
        self.description = self.current().map(|i| i.alt.clone()).unwrap_or_default();
    }
}

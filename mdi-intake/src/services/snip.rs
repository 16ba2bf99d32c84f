//! Snip tool: capture a page region as a new image
//!
//! The caller supplies the rendered page raster; this module crops the
//! dragged rectangle, encodes it as PNG, asks the backend for a signed URL
//! scoped to `{pdf_id, page_number}` and PUTs the PNG there. The whole
//! sequence is abortable through a `CancellationToken`.

use crate::error::{IntakeError, IntakeResult};
use crate::models::ImageItem;
use crate::services::backend::ProcessingBackend;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use tokio_util::sync::CancellationToken;

pub const PNG_MIME: &str = "image/png";

/// Pixel rectangle on the page raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnipRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SnipRegion {
    /// Rectangle spanned by a pointer drag, in any direction
    ///
    /// Coordinates are clamped to `bounds` (raster width, height); a drag
    /// that covers no whole pixel is rejected.
    pub fn from_drag(start: (f64, f64), end: (f64, f64), bounds: (u32, u32)) -> IntakeResult<Self> {
        let (max_w, max_h) = (bounds.0 as f64, bounds.1 as f64);
        let clamp_x = |v: f64| v.max(0.0).min(max_w);
        let clamp_y = |v: f64| v.max(0.0).min(max_h);

        let left = clamp_x(start.0.min(end.0)).floor();
        let right = clamp_x(start.0.max(end.0)).ceil();
        let top = clamp_y(start.1.min(end.1)).floor();
        let bottom = clamp_y(start.1.max(end.1)).ceil();

        let width = (right - left) as u32;
        let height = (bottom - top) as u32;
        if width == 0 || height == 0 {
            return Err(IntakeError::Snip("selection is empty".to_string()));
        }

        Ok(Self {
            x: left as u32,
            y: top as u32,
            width,
            height,
        })
    }
}

/// Crop `region` out of `raster` and encode it as PNG
pub fn snip_png(raster: &RgbaImage, region: &SnipRegion) -> IntakeResult<Vec<u8>> {
    let (w, h) = raster.dimensions();
    if region.width == 0
        || region.height == 0
        || region.x.saturating_add(region.width) > w
        || region.y.saturating_add(region.height) > h
    {
        return Err(IntakeError::Snip(format!(
            "region {:?} outside {}x{} page",
            region, w, h
        )));
    }

    let cropped =
        image::imageops::crop_imm(raster, region.x, region.y, region.width, region.height).to_image();

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(cropped.as_raw(), region.width, region.height, ColorType::Rgba8)
        .map_err(|e| IntakeError::Snip(e.to_string()))?;

    Ok(png)
}

/// Request a signed URL for a new image on `page_number` and upload `png`
///
/// Returns the backend's new image with empty alt text. Cancellation at
/// either request yields `Cancelled` and nothing is returned.
pub async fn upload_snip(
    backend: &dyn ProcessingBackend,
    pdf_id: i64,
    page_number: u32,
    png: Vec<u8>,
    cancel: &CancellationToken,
) -> IntakeResult<ImageItem> {
    let target = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(IntakeError::Cancelled),
        result = backend.create_new_image(pdf_id, page_number) => result?,
    };

    tracing::debug!(
        pdf_id,
        page_number,
        image_id = target.image_id,
        sequence = ?target.sequence,
        "Uploading snipped image"
    );

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(IntakeError::Cancelled),
        result = backend.put_signed(&target.signed_url, PNG_MIME, png) => result?,
    }

    Ok(ImageItem::new(target.image_id, ""))
}

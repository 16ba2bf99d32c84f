//! Extracted image references

use serde::{Deserialize, Serialize};

/// Image on a PDF page with its editable alt text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    #[serde(alias = "pdf_image_id", alias = "image_id", alias = "img_id")]
    pub id: i64,
    #[serde(alias = "img_alt", default, deserialize_with = "null_as_empty")]
    pub alt: String,
}

impl ImageItem {
    pub fn new(id: i64, alt: impl Into<String>) -> Self {
        Self { id, alt: alt.into() }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

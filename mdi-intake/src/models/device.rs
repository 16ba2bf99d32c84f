//! Device draft and the brand/device-type catalog

use crate::models::FieldErrors;
use serde::{Deserialize, Serialize};

/// Step 1 form data
///
/// `device_id` is assigned by the backend and never changes afterward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDraft {
    pub device_id: Option<i64>,
    /// Device type name or id as picked in the form
    pub device_type: String,
    /// Brand name or id as picked in the form
    pub brand_name: String,
    /// Free-text device label
    pub device_name: String,
}

impl DeviceDraft {
    pub fn new(
        device_type: impl Into<String>,
        brand_name: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            device_id: None,
            device_type: device_type.into(),
            brand_name: brand_name.into(),
            device_name: device_name.into(),
        }
    }

    /// Label sent to the backend
    pub fn label(&self) -> &str {
        self.device_name.trim()
    }
}

/// One selectable brand or device type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(alias = "device_type_id", alias = "brand_id")]
    pub id: i64,
    #[serde(alias = "label", alias = "type_name", alias = "brand_name", alias = "device_type")]
    pub name: String,
}

/// Brands and device types offered by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "deviceTypes", alias = "device_types", default)]
    pub device_types: Vec<CatalogEntry>,
    #[serde(default)]
    pub brands: Vec<CatalogEntry>,
}

impl Catalog {
    /// Resolve the draft's picks to `(device_type_id, brand_id)`
    ///
    /// A pick matches an entry by numeric id or by case-insensitive name.
    pub fn resolve(&self, draft: &DeviceDraft) -> Result<(i64, i64), FieldErrors> {
        let mut errors = FieldErrors::default();

        let device_type_id = find_entry(&self.device_types, &draft.device_type);
        if device_type_id.is_none() {
            errors.insert("device_type", "Unknown device type");
        }

        let brand_id = find_entry(&self.brands, &draft.brand_name);
        if brand_id.is_none() {
            errors.insert("brand_name", "Unknown brand");
        }

        match (device_type_id, brand_id) {
            (Some(t), Some(b)) => Ok((t, b)),
            _ => Err(errors),
        }
    }
}

fn find_entry(entries: &[CatalogEntry], pick: &str) -> Option<i64> {
    let pick = pick.trim();
    if let Ok(id) = pick.parse::<i64>() {
        if entries.iter().any(|e| e.id == id) {
            return Some(id);
        }
    }
    entries
        .iter()
        .find(|e| e.name.trim().eq_ignore_ascii_case(pick))
        .map(|e| e.id)
}

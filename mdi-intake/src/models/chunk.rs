//! Paragraph chunks on a PDF page
//!
//! A chunk is either unsaved (created locally, no backend id yet) or saved.
//! The wire protocol marks unsaved chunks with `chunk_id = -1`; that marker
//! only exists at the HTTP boundary.

use serde::{Deserialize, Serialize};

/// Editable text segment tied to a page paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Chunk {
    Unsaved {
        paragraph_id: Option<i64>,
        value: String,
    },
    Saved {
        id: i64,
        paragraph_id: Option<i64>,
        value: String,
    },
}

impl Chunk {
    pub fn id(&self) -> Option<i64> {
        match self {
            Chunk::Unsaved { .. } => None,
            Chunk::Saved { id, .. } => Some(*id),
        }
    }

    pub fn paragraph_id(&self) -> Option<i64> {
        match self {
            Chunk::Unsaved { paragraph_id, .. } | Chunk::Saved { paragraph_id, .. } => *paragraph_id,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Chunk::Unsaved { value, .. } | Chunk::Saved { value, .. } => value,
        }
    }

    pub fn set_value(&mut self, text: String) {
        match self {
            Chunk::Unsaved { value, .. } | Chunk::Saved { value, .. } => *value = text,
        }
    }

    pub fn is_unsaved(&self) -> bool {
        matches!(self, Chunk::Unsaved { .. })
    }

    /// Chunk after a successful save under `id`
    pub fn into_saved(self, id: i64) -> Chunk {
        match self {
            Chunk::Unsaved { paragraph_id, value } | Chunk::Saved { paragraph_id, value, .. } => {
                Chunk::Saved { id, paragraph_id, value }
            }
        }
    }
}

/// Viewing ⇄ Editing toggle per chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditMode {
    Viewing,
    Editing,
}

/// A chunk as shown in the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSlot {
    pub chunk: Chunk,
    pub mode: EditMode,
    /// Message from the last failed save/delete; cleared on success
    pub last_error: Option<String>,
}

impl ChunkSlot {
    pub fn viewing(chunk: Chunk) -> Self {
        Self {
            chunk,
            mode: EditMode::Viewing,
            last_error: None,
        }
    }

    pub fn editing(chunk: Chunk) -> Self {
        Self {
            chunk,
            mode: EditMode::Editing,
            last_error: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.mode == EditMode::Editing
    }
}

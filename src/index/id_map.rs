//! Slot-aligned identifier list.
//!
//! `id_map[slot]` is the external identifier of the vector stored at `slot`
//! in the index of the same mode.

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};

/// Ordered external identifiers, one per index slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdMap {
    ids: Vec<String>,
}

/// Accepted on-disk entry shapes: a bare id or a readable `{"id": ...}` record.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdEntry {
    Text(String),
    Number(i64),
    Record { id: RecordId },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Number(i64),
}

impl IdMap {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    /// Parse a JSON array of ids.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let entries: Vec<IdEntry> = serde_json::from_slice(bytes)
            .map_err(|e| LensError::index(format!("invalid id map: {e}")))?;
        let ids = entries
            .into_iter()
            .map(|entry| match entry {
                IdEntry::Text(id) | IdEntry::Record { id: RecordId::Text(id) } => id,
                IdEntry::Number(id) | IdEntry::Record { id: RecordId::Number(id) } => {
                    id.to_string()
                }
            })
            .collect();
        Ok(Self { ids })
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.ids)?)
    }

    /// Identifier at `slot`. Negative or out-of-range slots yield `None`.
    pub fn get(&self, slot: i64) -> Option<&str> {
        usize::try_from(slot)
            .ok()
            .and_then(|slot| self.ids.get(slot))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

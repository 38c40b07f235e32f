//! Per-mode index registry.
//!
//! The registry owns one `(FlatIndex, IdMap)` pair per named mode. It is
//! built once at startup from a [`BlobStore`] and is immutable afterwards, so
//! request handlers share it through an `Arc` without locking. A mode whose
//! artifacts fail to fetch or parse is recorded as [`ModeState::Absent`]
//! rather than aborting startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::index::faiss::read_flat_index;
use crate::index::{FlatIndex, IdMap, Metric};
use crate::storage::BlobStore;

/// A named similarity criterion backed by its own index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMode {
    pub name: String,
    /// Queries are desaturated before encoding so only shape contributes.
    #[serde(default)]
    pub structure_sensitive: bool,
}

impl IndexMode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            structure_sensitive: false,
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            structure_sensitive: true,
        }
    }

    /// The `color`, `structure` and `combined` modes.
    pub fn defaults() -> Vec<IndexMode> {
        vec![
            IndexMode::new("color"),
            IndexMode::structure("structure"),
            IndexMode::new("combined"),
        ]
    }
}

fn default_index_key() -> String {
    "{mode}.index".to_string()
}

fn default_id_map_key() -> String {
    "id_map_{mode}.json".to_string()
}

/// Storage key templates; `{mode}` is replaced by the mode name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexKeys {
    #[serde(default = "default_index_key")]
    pub index: String,
    #[serde(default = "default_id_map_key")]
    pub id_map: String,
}

impl Default for IndexKeys {
    fn default() -> Self {
        Self {
            index: default_index_key(),
            id_map: default_id_map_key(),
        }
    }
}

impl IndexKeys {
    pub fn index_key(&self, mode: &str) -> String {
        self.index.replace("{mode}", mode)
    }

    pub fn id_map_key(&self, mode: &str) -> String {
        self.id_map.replace("{mode}", mode)
    }
}

/// A loaded index together with its slot-aligned id map.
///
/// Construction checks that both have the same length, so
/// `id_map.get(slot)` resolves every slot the index can return.
#[derive(Debug)]
pub struct ModeIndex {
    mode: IndexMode,
    index: FlatIndex,
    id_map: IdMap,
}

impl ModeIndex {
    pub fn new(mode: IndexMode, index: FlatIndex, id_map: IdMap) -> Result<Self> {
        if index.metric() != Metric::InnerProduct {
            return Err(LensError::index(format!(
                "mode '{}' index must use inner product similarity",
                mode.name
            )));
        }
        if index.len() != id_map.len() {
            return Err(LensError::index(format!(
                "mode '{}' index holds {} vectors but id map has {} entries",
                mode.name,
                index.len(),
                id_map.len()
            )));
        }
        Ok(Self {
            mode,
            index,
            id_map,
        })
    }

    pub fn mode(&self) -> &IndexMode {
        &self.mode
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }
}

/// Load outcome for a single mode.
#[derive(Debug, Clone)]
pub enum ModeState {
    Loaded(Arc<ModeIndex>),
    Absent { reason: String },
}

impl ModeState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModeState::Loaded(_))
    }
}

#[derive(Debug, Default)]
pub struct IndexRegistry {
    modes: BTreeMap<String, ModeState>,
}

impl IndexRegistry {
    /// Load every mode from `store`. Modes load concurrently and
    /// independently; failures are logged and recorded as absent.
    pub async fn load(store: &dyn BlobStore, modes: &[IndexMode], keys: &IndexKeys) -> Self {
        let loads = modes.iter().map(|mode| async move {
            let state = match Self::load_mode(store, mode, keys).await {
                Ok(loaded) => {
                    log::info!(
                        "Loaded index for mode '{}' ({} vectors, dimension {})",
                        mode.name,
                        loaded.index().len(),
                        loaded.index().dimension()
                    );
                    ModeState::Loaded(Arc::new(loaded))
                }
                Err(err) => {
                    log::warn!("Skipping index for mode '{}': {err}", mode.name);
                    ModeState::Absent {
                        reason: err.to_string(),
                    }
                }
            };
            (mode.name.clone(), state)
        });

        Self {
            modes: join_all(loads).await.into_iter().collect(),
        }
    }

    /// Fetch and parse the index and id map for one mode.
    pub async fn load_mode(
        store: &dyn BlobStore,
        mode: &IndexMode,
        keys: &IndexKeys,
    ) -> Result<ModeIndex> {
        let index_key = keys.index_key(&mode.name);
        let id_map_key = keys.id_map_key(&mode.name);

        let (index_bytes, id_map_bytes) =
            futures::try_join!(store.get(&index_key), store.get(&id_map_key))?;

        let index = read_flat_index(&index_bytes)
            .map_err(|e| LensError::index(format!("{index_key}: {e}")))?;
        let id_map = IdMap::from_json(&id_map_bytes)
            .map_err(|e| LensError::index(format!("{id_map_key}: {e}")))?;

        ModeIndex::new(mode.clone(), index, id_map)
    }

    /// Build a registry from already constructed indexes.
    pub fn from_indexes(indexes: impl IntoIterator<Item = ModeIndex>) -> Self {
        let modes = indexes
            .into_iter()
            .map(|index| {
                (
                    index.mode().name.clone(),
                    ModeState::Loaded(Arc::new(index)),
                )
            })
            .collect();
        Self { modes }
    }

    /// Record `mode` as absent.
    pub fn with_absent(mut self, mode: impl Into<String>, reason: impl Into<String>) -> Self {
        self.modes.insert(
            mode.into(),
            ModeState::Absent {
                reason: reason.into(),
            },
        );
        self
    }

    /// Resolve a loaded mode.
    pub fn get(&self, mode: &str) -> Result<Arc<ModeIndex>> {
        match self.modes.get(mode) {
            Some(ModeState::Loaded(index)) => Ok(Arc::clone(index)),
            _ => Err(LensError::index_not_found(mode)),
        }
    }

    pub fn state(&self, mode: &str) -> Option<&ModeState> {
        self.modes.get(mode)
    }

    /// All known modes in name order.
    pub fn modes(&self) -> impl Iterator<Item = (&str, &ModeState)> {
        self.modes.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn loaded_count(&self) -> usize {
        self.modes.values().filter(|s| s.is_loaded()).count()
    }
}

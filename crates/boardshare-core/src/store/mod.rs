//! Shared document substrate.
//!
//! The board never talks to a concrete sync backend. It goes through
//! [`SharedStore`], which models the replicated document as two containers:
//!
//! ```text
//! document
//! ├── "layerIds": ordered list of layer ids (back to front)
//! └── "layers":   map of layer id -> layer record
//! ```
//!
//! Writes are grouped into transactions closed by [`SharedStore::commit`].
//! [`MemoryStore`] is a local implementation; `crate::crdt::LoroStore`
//! replicates through Loro.

mod memory;

pub use memory::MemoryStore;

use crate::layers::{Layer, LayerId, LayerPatch};
use thiserror::Error;

/// Substrate errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("CRDT error: {0}")]
    Crdt(String),
}

impl From<loro::LoroError> for StoreError {
    fn from(err: loro::LoroError) -> Self {
        StoreError::Crdt(err.to_string())
    }
}

/// Result type for substrate operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The replicated document: an ordered id list plus an id-keyed layer map.
///
/// Implementations apply writes immediately to the local replica and
/// propagate them when the transaction is committed. Concurrent writes to
/// the same layer field resolve last-writer-wins.
pub trait SharedStore {
    /// Layer ids in paint order, back to front.
    fn layer_ids(&self) -> Vec<LayerId>;

    /// Number of entries in the layer map.
    fn layer_count(&self) -> usize;

    /// Keys of the layer map, in no particular order.
    fn layer_keys(&self) -> Vec<LayerId>;

    fn layer(&self, id: &LayerId) -> Option<Layer>;

    /// Insert `id` so that it ends up at `index` in the id list.
    fn insert_layer_id(&mut self, index: usize, id: LayerId) -> StoreResult<()>;

    /// Remove and return the id at `index`.
    fn remove_layer_id(&mut self, index: usize) -> StoreResult<LayerId>;

    fn clear_layer_ids(&mut self) -> StoreResult<()>;

    /// Create or replace a layer record.
    fn set_layer(&mut self, id: LayerId, layer: &Layer) -> StoreResult<()>;

    /// Merge the fields present in `patch` into an existing layer.
    ///
    /// Returns `false` when the layer does not exist.
    fn update_layer(&mut self, id: &LayerId, patch: &LayerPatch) -> StoreResult<bool>;

    /// Returns `false` when the layer did not exist.
    fn delete_layer(&mut self, id: &LayerId) -> StoreResult<bool>;

    /// Close the current transaction.
    fn commit(&mut self);

    fn push_layer_id(&mut self, id: LayerId) -> StoreResult<()> {
        let len = self.layer_ids().len();
        self.insert_layer_id(len, id)
    }

    /// Move the id at `from` so that it ends up at `to`.
    ///
    /// Replicated stores override this with a native move. Remove plus
    /// insert duplicates the id when two replicas move it concurrently.
    fn move_layer_id(&mut self, from: usize, to: usize) -> StoreResult<()> {
        let len = self.layer_ids().len();
        if to >= len {
            return Err(StoreError::IndexOutOfRange { index: to, len });
        }
        if from == to {
            return Ok(());
        }
        let id = self.remove_layer_id(from)?;
        self.insert_layer_id(to, id)
    }

    fn index_of(&self, id: &LayerId) -> Option<usize> {
        self.layer_ids().iter().position(|other| other == id)
    }

    /// All layers in paint order.
    fn layers(&self) -> Vec<(LayerId, Layer)> {
        self.layer_ids()
            .into_iter()
            .filter_map(|id| self.layer(&id).map(|layer| (id, layer)))
            .collect()
    }
}

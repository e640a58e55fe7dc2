//! In-memory substrate for tests and offline boards.

use super::{SharedStore, StoreError, StoreResult};
use crate::layers::{Layer, LayerId, LayerPatch};
use std::collections::HashMap;

/// Single-replica store with no propagation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    ids: Vec<LayerId>,
    layers: HashMap<LayerId, Layer>,
    revision: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transactions.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl SharedStore for MemoryStore {
    fn layer_ids(&self) -> Vec<LayerId> {
        self.ids.clone()
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer_keys(&self) -> Vec<LayerId> {
        self.layers.keys().copied().collect()
    }

    fn layer(&self, id: &LayerId) -> Option<Layer> {
        self.layers.get(id).cloned()
    }

    fn insert_layer_id(&mut self, index: usize, id: LayerId) -> StoreResult<()> {
        if index > self.ids.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: self.ids.len(),
            });
        }
        self.ids.insert(index, id);
        Ok(())
    }

    fn remove_layer_id(&mut self, index: usize) -> StoreResult<LayerId> {
        if index >= self.ids.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: self.ids.len(),
            });
        }
        Ok(self.ids.remove(index))
    }

    fn clear_layer_ids(&mut self) -> StoreResult<()> {
        self.ids.clear();
        Ok(())
    }

    fn set_layer(&mut self, id: LayerId, layer: &Layer) -> StoreResult<()> {
        self.layers.insert(id, layer.clone());
        Ok(())
    }

    fn update_layer(&mut self, id: &LayerId, patch: &LayerPatch) -> StoreResult<bool> {
        match self.layers.get_mut(id) {
            Some(layer) => {
                layer.apply(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_layer(&mut self, id: &LayerId) -> StoreResult<bool> {
        Ok(self.layers.remove(id).is_some())
    }

    fn commit(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::layers::{ShapeKind, new_layer_id};
    use kurbo::Point;

    fn rect() -> Layer {
        Layer::shape(ShapeKind::Rectangle, Point::ZERO, 100.0, Color::black())
    }

    #[test]
    fn test_push_and_read() {
        let mut store = MemoryStore::new();
        let id = new_layer_id();
        store.set_layer(id, &rect()).unwrap();
        store.push_layer_id(id).unwrap();
        store.commit();

        assert_eq!(store.layer_ids(), vec![id]);
        assert_eq!(store.layer_count(), 1);
        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_move_layer_id() {
        let mut store = MemoryStore::new();
        let ids: Vec<LayerId> = (0..4).map(|_| new_layer_id()).collect();
        for id in &ids {
            store.push_layer_id(*id).unwrap();
        }

        store.move_layer_id(0, 3).unwrap();
        assert_eq!(store.layer_ids(), vec![ids[1], ids[2], ids[3], ids[0]]);

        store.move_layer_id(2, 0).unwrap();
        assert_eq!(store.layer_ids(), vec![ids[3], ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_out_of_range() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.remove_layer_id(0),
            Err(StoreError::IndexOutOfRange { index: 0, len: 0 })
        ));
        assert!(store.insert_layer_id(1, new_layer_id()).is_err());
        store.push_layer_id(new_layer_id()).unwrap();
        assert!(store.move_layer_id(0, 1).is_err());
    }

    #[test]
    fn test_update_and_delete() {
        let mut store = MemoryStore::new();
        let id = new_layer_id();
        store.set_layer(id, &rect()).unwrap();

        assert!(store.update_layer(&id, &LayerPatch::fill(Color::white())).unwrap());
        assert_eq!(store.layer(&id).map(|l| l.fill), Some(Color::white()));

        assert!(store.delete_layer(&id).unwrap());
        assert!(!store.delete_layer(&id).unwrap());
        assert!(!store.update_layer(&id, &LayerPatch::default()).unwrap());
    }

    #[test]
    fn test_index_of() {
        let mut store = MemoryStore::new();
        let a = new_layer_id();
        let b = new_layer_id();
        store.push_layer_id(a).unwrap();
        store.push_layer_id(b).unwrap();
        assert_eq!(store.index_of(&b), Some(1));
        assert_eq!(store.index_of(&new_layer_id()), None);
        store.clear_layer_ids().unwrap();
        assert!(store.layer_ids().is_empty());
    }
}

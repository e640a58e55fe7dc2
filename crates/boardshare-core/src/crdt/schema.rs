//! Loro document schema and the substrate built on it.

use super::convert::{layer_from_loro, layer_to_loro, patch_to_loro};
use crate::layers::{Layer, LayerId, LayerPatch};
use crate::store::{SharedStore, StoreError, StoreResult};
use loro::{
    Container, ExportMode, LoroDoc, LoroMap, LoroMovableList, LoroResult, LoroValue,
    ValueOrContainer, VersionVector,
};
use uuid::Uuid;

/// Key for the layer map in the document.
pub const LAYERS_KEY: &str = "layers";
/// Key for the paint-order list in the document.
pub const LAYER_IDS_KEY: &str = "layerIds";

/// A [`SharedStore`] replicated through a `LoroDoc`.
///
/// Undo is not delegated to Loro: the board's history engine records inverse
/// operations and replays them through this store, so undo is itself an
/// ordinary replicated edit.
pub struct LoroStore {
    doc: LoroDoc,
}

impl LoroStore {
    pub fn new() -> Self {
        Self { doc: LoroDoc::new() }
    }

    /// Create a store from a snapshot produced by [`LoroStore::export_snapshot`].
    pub fn from_snapshot(bytes: &[u8]) -> LoroResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self { doc })
    }

    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    fn layers_map(&self) -> LoroMap {
        self.doc.get_map(LAYERS_KEY)
    }

    /// Paint order lives in a movable list so that concurrent moves of the
    /// same id resolve to a single position instead of duplicating it.
    fn layer_ids_list(&self) -> LoroMovableList {
        self.doc.get_movable_list(LAYER_IDS_KEY)
    }

    fn layer_map(&self, id: &LayerId) -> Option<LoroMap> {
        match self.layers_map().get(&id.to_string()) {
            Some(ValueOrContainer::Container(Container::Map(map))) => Some(map),
            _ => None,
        }
    }

    /// Export the full document state.
    pub fn export_snapshot(&self) -> StoreResult<Vec<u8>> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| StoreError::Crdt(e.to_string()))
    }

    /// Export the operations not covered by `since`.
    pub fn export_updates(&self, since: &VersionVector) -> StoreResult<Vec<u8>> {
        self.doc
            .export(ExportMode::updates(since))
            .map_err(|e| StoreError::Crdt(e.to_string()))
    }

    /// Merge a snapshot or update blob from another replica.
    pub fn import(&mut self, bytes: &[u8]) -> StoreResult<()> {
        self.doc.import(bytes)?;
        Ok(())
    }

    /// Current version vector of the operation log.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }
}

impl Default for LoroStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for LoroStore {
    fn layer_ids(&self) -> Vec<LayerId> {
        let list = self.layer_ids_list();
        let mut result = Vec::with_capacity(list.len());
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(LoroValue::String(s))) = list.get(i) {
                if let Ok(id) = Uuid::parse_str(&s.to_string()) {
                    result.push(id);
                }
            }
        }
        result
    }

    fn layer_count(&self) -> usize {
        self.layers_map().len()
    }

    fn layer_keys(&self) -> Vec<LayerId> {
        match self.layers_map().get_deep_value() {
            LoroValue::Map(map) => map.keys().filter_map(|k| Uuid::parse_str(k).ok()).collect(),
            _ => Vec::new(),
        }
    }

    fn layer(&self, id: &LayerId) -> Option<Layer> {
        match self.layer_map(id)?.get_deep_value() {
            LoroValue::Map(map) => layer_from_loro(&map),
            _ => None,
        }
    }

    fn insert_layer_id(&mut self, index: usize, id: LayerId) -> StoreResult<()> {
        let list = self.layer_ids_list();
        if index > list.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: list.len(),
            });
        }
        list.insert(index, LoroValue::String(id.to_string().into()))?;
        Ok(())
    }

    fn remove_layer_id(&mut self, index: usize) -> StoreResult<LayerId> {
        let list = self.layer_ids_list();
        let len = list.len();
        let id = match list.get(index) {
            Some(ValueOrContainer::Value(LoroValue::String(s))) => {
                let raw = s.to_string();
                Uuid::parse_str(&raw)
                    .map_err(|e| StoreError::Crdt(format!("Malformed layer id {raw}: {e}")))?
            }
            Some(_) => return Err(StoreError::Crdt(format!("Non-string entry at index {index}"))),
            None => return Err(StoreError::IndexOutOfRange { index, len }),
        };
        list.delete(index, 1)?;
        Ok(id)
    }

    fn move_layer_id(&mut self, from: usize, to: usize) -> StoreResult<()> {
        let list = self.layer_ids_list();
        let len = list.len();
        if from >= len || to >= len {
            return Err(StoreError::IndexOutOfRange {
                index: from.max(to),
                len,
            });
        }
        if from != to {
            list.mov(from, to)?;
        }
        Ok(())
    }

    fn clear_layer_ids(&mut self) -> StoreResult<()> {
        let list = self.layer_ids_list();
        let len = list.len();
        if len > 0 {
            list.delete(0, len)?;
        }
        Ok(())
    }

    fn set_layer(&mut self, id: LayerId, layer: &Layer) -> StoreResult<()> {
        let map = self.layers_map().insert_container(&id.to_string(), LoroMap::new())?;
        layer_to_loro(layer, &map)?;
        Ok(())
    }

    fn update_layer(&mut self, id: &LayerId, patch: &LayerPatch) -> StoreResult<bool> {
        let Some(map) = self.layer_map(id) else {
            return Ok(false);
        };
        patch_to_loro(patch, &map)?;
        Ok(true)
    }

    fn delete_layer(&mut self, id: &LayerId) -> StoreResult<bool> {
        let key = id.to_string();
        let layers = self.layers_map();
        if layers.get(&key).is_none() {
            return Ok(false);
        }
        layers.delete(&key)?;
        Ok(true)
    }

    fn commit(&mut self) {
        self.doc.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::layers::{ShapeKind, new_layer_id};
    use kurbo::Point;

    fn insert(store: &mut LoroStore, x: f64) -> LayerId {
        let id = new_layer_id();
        let layer = Layer::shape(ShapeKind::Rectangle, Point::new(x, 0.0), 100.0, Color::black());
        store.set_layer(id, &layer).unwrap();
        store.push_layer_id(id).unwrap();
        store.commit();
        id
    }

    #[test]
    fn test_insert_and_read() {
        let mut store = LoroStore::new();
        let id = insert(&mut store, 10.0);

        assert_eq!(store.layer_ids(), vec![id]);
        assert_eq!(store.layer_count(), 1);
        assert_eq!(store.layer_keys(), vec![id]);
        assert_eq!(store.layer(&id).map(|l| l.x), Some(10.0));
    }

    #[test]
    fn test_move_and_clear() {
        let mut store = LoroStore::new();
        let a = insert(&mut store, 0.0);
        let b = insert(&mut store, 1.0);
        let c = insert(&mut store, 2.0);

        store.move_layer_id(0, 2).unwrap();
        assert_eq!(store.layer_ids(), vec![b, c, a]);

        store.clear_layer_ids().unwrap();
        assert!(store.layer_ids().is_empty());
        assert_eq!(store.layer_count(), 3);
    }

    #[test]
    fn test_delete_layer() {
        let mut store = LoroStore::new();
        let id = insert(&mut store, 0.0);
        assert!(store.delete_layer(&id).unwrap());
        assert!(!store.delete_layer(&id).unwrap());
        assert!(store.layer(&id).is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut store = LoroStore::new();
        let id = insert(&mut store, 42.0);
        let bytes = store.export_snapshot().unwrap();

        let copy = LoroStore::from_snapshot(&bytes).unwrap();
        assert_eq!(copy.layer_ids(), vec![id]);
        assert_eq!(copy.layer(&id).map(|l| l.x), Some(42.0));
    }

    #[test]
    fn test_concurrent_field_edits_converge() {
        let mut a = LoroStore::new();
        let id = insert(&mut a, 0.0);
        let mut b = LoroStore::from_snapshot(&a.export_snapshot().unwrap()).unwrap();

        let a_before = a.version();
        let b_before = b.version();

        a.update_layer(&id, &LayerPatch::position(Point::new(50.0, 60.0))).unwrap();
        a.commit();
        b.update_layer(&id, &LayerPatch::fill(Color::white())).unwrap();
        b.commit();

        let from_a = a.export_updates(&a_before).unwrap();
        let from_b = b.export_updates(&b_before).unwrap();
        a.import(&from_b).unwrap();
        b.import(&from_a).unwrap();

        let on_a = a.layer(&id).unwrap();
        let on_b = b.layer(&id).unwrap();
        assert_eq!(on_a, on_b);
        assert_eq!((on_a.x, on_a.y), (50.0, 60.0));
        assert_eq!(on_a.fill, Color::white());
    }

    fn fork(store: &LoroStore) -> LoroStore {
        LoroStore::from_snapshot(&store.export_snapshot().unwrap()).unwrap()
    }

    fn exchange(a: &mut LoroStore, b: &mut LoroStore, a_before: &VersionVector, b_before: &VersionVector) {
        let from_a = a.export_updates(a_before).unwrap();
        let from_b = b.export_updates(b_before).unwrap();
        a.import(&from_b).unwrap();
        b.import(&from_a).unwrap();
    }

    #[test]
    fn test_concurrent_moves_of_same_id_keep_one_entry() {
        let mut a = LoroStore::new();
        let first = insert(&mut a, 0.0);
        insert(&mut a, 1.0);
        insert(&mut a, 2.0);
        let mut b = fork(&a);
        let (a_before, b_before) = (a.version(), b.version());

        a.move_layer_id(0, 2).unwrap();
        a.commit();
        b.move_layer_id(0, 1).unwrap();
        b.commit();
        exchange(&mut a, &mut b, &a_before, &b_before);

        let ids = a.layer_ids();
        assert_eq!(ids, b.layer_ids());
        assert_eq!(ids.len(), 3);
        assert_eq!(ids.iter().filter(|id| **id == first).count(), 1);
    }

    #[test]
    fn test_move_concurrent_with_delete_is_dropped() {
        let mut a = LoroStore::new();
        let first = insert(&mut a, 0.0);
        insert(&mut a, 1.0);
        let mut b = fork(&a);
        let (a_before, b_before) = (a.version(), b.version());

        a.move_layer_id(0, 1).unwrap();
        a.commit();
        b.remove_layer_id(0).unwrap();
        b.delete_layer(&first).unwrap();
        b.commit();
        exchange(&mut a, &mut b, &a_before, &b_before);

        assert_eq!(a.layer_ids(), b.layer_ids());
        assert!(!a.layer_ids().contains(&first));
        assert_eq!(a.layer_ids().len(), a.layer_count());
    }

    #[test]
    fn test_move_out_of_range() {
        let mut store = LoroStore::new();
        insert(&mut store, 0.0);
        assert!(matches!(
            store.move_layer_id(0, 1),
            Err(StoreError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_concurrent_inserts_keep_both() {
        let mut a = LoroStore::new();
        let mut b = LoroStore::new();
        let a_before = a.version();
        let b_before = b.version();

        let ida = insert(&mut a, 0.0);
        let idb = insert(&mut b, 5.0);

        let from_a = a.export_updates(&a_before).unwrap();
        let from_b = b.export_updates(&b_before).unwrap();
        a.import(&from_b).unwrap();
        b.import(&from_a).unwrap();

        assert_eq!(a.layer_ids(), b.layer_ids());
        assert_eq!(a.layer_count(), 2);
        assert!(a.layer_ids().contains(&ida));
        assert!(a.layer_ids().contains(&idb));
    }
}

//! The board: document mutations, undo history and local presence.
//!
//! Every mutation goes through [`Board`], which applies it to the shared
//! store, records the changes for undo, commits the transaction and then
//! re-checks the document invariants.

use crate::color::Color;
use crate::config::BoardConfig;
use crate::error::{BoardError, BoardResult};
use crate::geometry::{Bounds, Side, resize_bounds};
use crate::history::{Change, History, PauseGuard};
use crate::layers::{Layer, LayerId, LayerPatch, PenPoint, ShapeKind, new_layer_id};
use crate::presence::PresenceStore;
use crate::store::SharedStore;
use kurbo::{Point, Vec2};
use log::{debug, error, warn};
use std::collections::HashSet;

/// A collaborative board backed by a shared store.
pub struct Board<S: SharedStore> {
    store: S,
    history: History,
    presence: PresenceStore,
    /// Tool color for new layers. Local preference, never synchronized.
    last_used_color: Color,
    config: BoardConfig,
    needs_redraw: bool,
}

impl<S: SharedStore> Board<S> {
    /// Create a board over `store` with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, BoardConfig::default())
    }

    /// Create a board with an explicit configuration. The configuration is
    /// expected to have been validated already.
    pub fn with_config(store: S, config: BoardConfig) -> Self {
        Self {
            store,
            history: History::new(config.max_undo_steps),
            presence: PresenceStore::new(),
            last_used_color: config.default_color,
            config,
            needs_redraw: true,
        }
    }

    /// The shared document.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access for remote imports. Local edits must go through
    /// the board's mutation methods so they are recorded for undo.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Own and remote presence.
    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    /// Mutable presence, for the sync layer to apply remote state.
    pub fn presence_mut(&mut self) -> &mut PresenceStore {
        &mut self.presence
    }

    /// Undo/redo stacks, read-only.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Limits and defaults this board was created with.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Ids selected by the local participant, in selection order.
    pub fn selection(&self) -> &[LayerId] {
        self.presence.selection()
    }

    /// Fill applied to the next inserted layer.
    pub fn last_used_color(&self) -> Color {
        self.last_used_color
    }

    /// Get a layer record by id.
    pub fn layer(&self, id: &LayerId) -> Option<Layer> {
        self.store.layer(id)
    }

    /// Layer ids in paint order, back to front.
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.store.layer_ids()
    }

    /// All layers in paint order.
    pub fn layers(&self) -> Vec<(LayerId, Layer)> {
        self.store.layers()
    }

    /// Request a redraw, e.g. after a remote update was imported.
    pub fn invalidate(&mut self) {
        self.needs_redraw = true;
    }

    /// Whether anything changed since the last call, clearing the flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    // --- Transactions ---

    fn apply(&mut self, change: Change, batch: &mut Vec<Change>) -> BoardResult<()> {
        change.apply(&mut self.store, &mut self.presence)?;
        batch.push(change);
        Ok(())
    }

    /// Commit applied changes, check invariants and record them for undo.
    fn finish(&mut self, batch: Vec<Change>) -> BoardResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.iter().any(Change::is_document_change) {
            self.store.commit();
        }
        self.needs_redraw = true;
        self.history.record(batch);
        self.check_invariants()
    }

    fn reject(&self, err: BoardError) -> BoardError {
        warn!("Rejected mutation: {}", err);
        err
    }

    fn ensure_capacity(&self) -> BoardResult<()> {
        let max = self.config.max_layers;
        if self.store.layer_count() >= max {
            return Err(self.reject(BoardError::CapacityExceeded { max }));
        }
        Ok(())
    }

    fn selection_change(&self, after: Vec<LayerId>) -> Change {
        Change::Selection {
            before: self.presence.selection().to_vec(),
            after,
        }
    }

    // --- Layer mutations ---

    /// Insert a shape at `position` with the current tool color and select it.
    pub fn insert_layer(&mut self, kind: ShapeKind, position: Point) -> BoardResult<LayerId> {
        self.ensure_capacity()?;

        let id = new_layer_id();
        let layer = Layer::shape(kind, position, self.config.default_layer_size, self.last_used_color);
        let index = self.store.layer_ids().len();

        let mut batch = Vec::with_capacity(3);
        self.apply(
            Change::PutLayer {
                id,
                before: None,
                after: Some(layer),
            },
            &mut batch,
        )?;
        self.apply(Change::InsertId { index, id }, &mut batch)?;
        let select = self.selection_change(vec![id]);
        self.apply(select, &mut batch)?;
        self.finish(batch)?;

        debug!("Inserted {:?} layer {}", kind, id);
        Ok(id)
    }

    /// Move every selected layer by `delta`.
    pub fn translate_selected(&mut self, delta: Vec2) -> BoardResult<()> {
        let mut batch = Vec::new();
        for id in self.presence.selection().to_vec() {
            let Some(layer) = self.store.layer(&id) else {
                continue;
            };
            let after = LayerPatch::position(Point::new(layer.x + delta.x, layer.y + delta.y));
            let before = layer.revert_patch(&after);
            self.apply(Change::PatchLayer { id, before, after }, &mut batch)?;
        }
        self.finish(batch)
    }

    /// Resize `id` from `initial` by dragging the `corner` handle to `point`.
    pub fn resize_layer(&mut self, id: LayerId, initial: Bounds, corner: Side, point: Point) -> BoardResult<()> {
        let layer = self.store.layer(&id).ok_or(BoardError::LayerNotFound(id))?;
        let after = LayerPatch::bounds(resize_bounds(initial, corner, point));
        let before = layer.revert_patch(&after);

        let mut batch = Vec::with_capacity(1);
        self.apply(Change::PatchLayer { id, before, after }, &mut batch)?;
        self.finish(batch)
    }

    /// Set the fill of every selected layer and remember it for new layers.
    pub fn set_fill(&mut self, color: Color) -> BoardResult<()> {
        self.last_used_color = color;

        let mut batch = Vec::new();
        for id in self.presence.selection().to_vec() {
            let Some(layer) = self.store.layer(&id) else {
                continue;
            };
            let after = LayerPatch::fill(color);
            let before = layer.revert_patch(&after);
            self.apply(Change::PatchLayer { id, before, after }, &mut batch)?;
        }
        self.finish(batch)
    }

    /// Move the selected layers to the front or back, keeping their relative order.
    pub fn reorder(&mut self, to_front: bool) -> BoardResult<()> {
        let ids = self.store.layer_ids();
        let selection = self.presence.selection();
        let indices: Vec<usize> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| selection.contains(id))
            .map(|(i, _)| i)
            .collect();

        let mut batch = Vec::with_capacity(indices.len());
        let len = ids.len();
        let count = indices.len();

        if to_front {
            for (i, &from) in indices.iter().enumerate().rev() {
                let to = len - 1 - (count - 1 - i);
                self.apply(Change::MoveId { id: ids[from], from, to }, &mut batch)?;
            }
        } else {
            for (i, &from) in indices.iter().enumerate() {
                self.apply(Change::MoveId { id: ids[from], from, to: i }, &mut batch)?;
            }
        }
        self.finish(batch)
    }

    /// Delete the selected layers and clear the selection.
    pub fn delete_selected(&mut self) -> BoardResult<()> {
        let mut batch = Vec::new();
        for id in self.presence.selection().to_vec() {
            if let Some(layer) = self.store.layer(&id) {
                self.apply(
                    Change::PutLayer {
                        id,
                        before: Some(layer),
                        after: None,
                    },
                    &mut batch,
                )?;
            }
            if let Some(index) = self.store.index_of(&id) {
                self.apply(Change::RemoveId { index, id }, &mut batch)?;
            }
        }
        let clear = self.selection_change(Vec::new());
        self.apply(clear, &mut batch)?;
        self.finish(batch)
    }

    /// Remove every layer and clear the selection.
    pub fn delete_all(&mut self) -> BoardResult<()> {
        let mut batch = Vec::new();
        for id in self.store.layer_keys() {
            let before = self.store.layer(&id);
            self.apply(Change::PutLayer { id, before, after: None }, &mut batch)?;
        }
        let ids = self.store.layer_ids();
        for (index, id) in ids.into_iter().enumerate().rev() {
            self.apply(Change::RemoveId { index, id }, &mut batch)?;
        }
        let clear = self.selection_change(Vec::new());
        self.apply(clear, &mut batch)?;
        self.finish(batch)
    }

    // --- Freehand drawing ---

    /// Begin a freehand draft at `point` using the current tool color.
    pub fn start_drawing(&mut self, point: Point, pressure: f64) {
        self.presence
            .set_pencil_draft(Some(vec![PenPoint::new(point.x, point.y, pressure)]));
        self.presence.set_pen_color(Some(self.last_used_color));
        self.needs_redraw = true;
    }

    /// Extend the draft. A repeat of the sole existing sample is dropped.
    pub fn continue_drawing(&mut self, point: Point, pressure: f64) {
        self.presence.set_cursor(Some(point));
        let Some(draft) = self.presence.pencil_draft() else {
            return;
        };
        if let [only] = draft {
            if only.x == point.x && only.y == point.y {
                return;
            }
        }
        self.presence.push_draft_point(PenPoint::new(point.x, point.y, pressure));
        self.needs_redraw = true;
    }

    /// Turn the draft into a path layer. The draft is cleared either way.
    pub fn insert_path(&mut self) -> BoardResult<LayerId> {
        let draft = self.presence.pencil_draft().map(<[PenPoint]>::to_vec);
        let color = self.presence.me().pen_color.unwrap_or(self.last_used_color);
        self.presence.set_pencil_draft(None);
        self.needs_redraw = true;

        let draft = draft.unwrap_or_default();
        if draft.len() < 2 {
            return Err(self.reject(BoardError::InvalidGesture("stroke needs at least two points")));
        }
        self.ensure_capacity()?;

        let layer = Layer::path(&draft, color, &self.config.stroke, self.config.simplify_tolerance)
            .ok_or_else(|| self.reject(BoardError::InvalidGesture("stroke needs at least two points")))?;

        let id = new_layer_id();
        let index = self.store.layer_ids().len();
        let mut batch = Vec::with_capacity(2);
        self.apply(
            Change::PutLayer {
                id,
                before: None,
                after: Some(layer),
            },
            &mut batch,
        )?;
        self.apply(Change::InsertId { index, id }, &mut batch)?;
        self.finish(batch)?;

        debug!("Inserted path layer {} from {} samples", id, draft.len());
        Ok(id)
    }

    // --- Presence ---

    /// Replace the local selection, optionally as an undoable step.
    pub fn set_selection(&mut self, ids: Vec<LayerId>, add_to_history: bool) -> BoardResult<()> {
        if add_to_history {
            let change = self.selection_change(ids);
            let mut batch = Vec::with_capacity(1);
            self.apply(change, &mut batch)?;
            self.finish(batch)
        } else {
            self.presence.set_selection(ids);
            self.needs_redraw = true;
            Ok(())
        }
    }

    /// Clear a non-empty selection as an undoable step.
    pub fn unselect(&mut self) -> BoardResult<()> {
        if self.presence.selection().is_empty() {
            return Ok(());
        }
        self.set_selection(Vec::new(), true)
    }

    /// Publish the local cursor position in world coordinates.
    pub fn set_cursor(&mut self, point: Point) {
        self.presence.set_cursor(Some(point));
    }

    /// Hide the local cursor from other participants.
    pub fn clear_cursor(&mut self) {
        self.presence.set_cursor(None);
    }

    // --- History ---

    /// Start batching every following mutation into one undo step.
    ///
    /// The batch is closed by handing the guard back to
    /// [`Board::resume_history`].
    pub fn pause_history(&mut self) -> PauseGuard {
        self.history.pause()
    }

    /// Close the batch opened by [`Board::pause_history`].
    pub fn resume_history(&mut self, guard: PauseGuard) {
        self.history.resume(guard);
    }

    /// Revert the latest history batch. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> BoardResult<bool> {
        let Some(changes) = self.history.undo() else {
            return Ok(false);
        };
        self.replay(changes)?;
        Ok(true)
    }

    /// Reapply the latest undone batch. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> BoardResult<bool> {
        let Some(changes) = self.history.redo() else {
            return Ok(false);
        };
        self.replay(changes)?;
        Ok(true)
    }

    fn replay(&mut self, changes: Vec<Change>) -> BoardResult<()> {
        debug!("History: replaying {} changes", changes.len());
        for change in &changes {
            change.apply(&mut self.store, &mut self.presence)?;
        }
        self.store.commit();
        self.needs_redraw = true;
        self.check_invariants()
    }

    // --- Remote merges ---

    /// Restore the document invariants after remote updates were merged.
    ///
    /// Drops repeated ids (keeping the first), ids without a record and
    /// records without an id, then trims layers above the cap from the top.
    /// The repair is committed as a replicated edit so every replica agrees,
    /// but it is not recorded for undo. Ids that no longer exist leave the
    /// local selection. Returns the number of entries removed.
    pub fn reconcile(&mut self) -> BoardResult<usize> {
        let mut removed = 0;

        let ids = self.store.layer_ids();
        let mut seen = HashSet::with_capacity(ids.len());
        let stale: Vec<usize> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !seen.insert(**id) || self.store.layer(id).is_none())
            .map(|(index, _)| index)
            .collect();
        for &index in stale.iter().rev() {
            let id = self.store.remove_layer_id(index)?;
            warn!("Dropped stale layer id {} at {}", id, index);
            removed += 1;
        }

        let listed: HashSet<LayerId> = self.store.layer_ids().into_iter().collect();
        for id in self.store.layer_keys() {
            if !listed.contains(&id) && self.store.delete_layer(&id)? {
                warn!("Dropped orphan layer record {}", id);
                removed += 1;
            }
        }

        let max = self.config.max_layers;
        let len = listed.len();
        if len > max {
            warn!("Merged document has {} layers, trimming to {}", len, max);
            for index in (max..len).rev() {
                let id = self.store.remove_layer_id(index)?;
                self.store.delete_layer(&id)?;
                removed += 1;
            }
        }

        if removed > 0 {
            self.store.commit();
        }

        let remaining: HashSet<LayerId> = self.store.layer_ids().into_iter().collect();
        let selection = self.presence.selection();
        if selection.iter().any(|id| !remaining.contains(id)) {
            let kept = selection.iter().copied().filter(|id| remaining.contains(id)).collect();
            self.presence.set_selection(kept);
        }

        self.needs_redraw = true;
        self.check_invariants()?;
        Ok(removed)
    }

    // --- Invariants ---

    /// Verify that the id list and the layer map describe the same layers.
    pub fn check_invariants(&self) -> BoardResult<()> {
        match self.invariant_violation() {
            None => Ok(()),
            Some(detail) => {
                error!("Document invariant violated: {}", detail);
                debug_assert!(false, "document invariant violated: {detail}");
                Err(BoardError::InvariantViolation(detail))
            }
        }
    }

    /// Describe the first broken document invariant, if any. Unlike
    /// [`Board::check_invariants`] this never asserts.
    pub fn invariant_violation(&self) -> Option<String> {
        let ids = self.store.layer_ids();
        let unique: HashSet<LayerId> = ids.iter().copied().collect();
        if unique.len() != ids.len() {
            return Some("duplicate layer ids".to_string());
        }

        let count = self.store.layer_count();
        if count != ids.len() {
            return Some(format!("{} layers but {} layer ids", count, ids.len()));
        }

        let keys: HashSet<LayerId> = self.store.layer_keys().into_iter().collect();
        if keys != unique {
            return Some("layer ids and layer keys differ".to_string());
        }

        if count > self.config.max_layers {
            return Some(format!("{} layers exceeds limit of {}", count, self.config.max_layers));
        }
        None
    }
}

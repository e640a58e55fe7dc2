//! Undo/redo history.
//!
//! History stores batches of [`Change`]s. Undoing a batch replays the inverse
//! of each change in reverse order through the shared store, so an undo is an
//! ordinary replicated edit rather than a local state rollback.
//!
//! While paused, recorded changes accumulate into one pending batch that is
//! pushed when the last [`PauseGuard`] is handed back to [`History::resume`].

use crate::layers::{Layer, LayerId, LayerPatch};
use crate::presence::PresenceStore;
use crate::store::{SharedStore, StoreResult};
use log::debug;

/// One reversible document or selection edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert `id` into the id list at `index`.
    InsertId { index: usize, id: LayerId },
    /// Remove `id`, which sat at `index`, from the id list.
    RemoveId { index: usize, id: LayerId },
    /// Move `id` from `from` to `to` in the id list.
    MoveId { id: LayerId, from: usize, to: usize },
    /// Replace a whole layer record. `None` means absent.
    PutLayer {
        id: LayerId,
        before: Option<Layer>,
        after: Option<Layer>,
    },
    /// Change some fields of a layer.
    PatchLayer {
        id: LayerId,
        before: LayerPatch,
        after: LayerPatch,
    },
    /// Change the local participant's selection.
    Selection {
        before: Vec<LayerId>,
        after: Vec<LayerId>,
    },
}

impl Change {
    /// The change that undoes this one.
    pub fn inverse(&self) -> Change {
        match self {
            Change::InsertId { index, id } => Change::RemoveId { index: *index, id: *id },
            Change::RemoveId { index, id } => Change::InsertId { index: *index, id: *id },
            Change::MoveId { id, from, to } => Change::MoveId {
                id: *id,
                from: *to,
                to: *from,
            },
            Change::PutLayer { id, before, after } => Change::PutLayer {
                id: *id,
                before: after.clone(),
                after: before.clone(),
            },
            Change::PatchLayer { id, before, after } => Change::PatchLayer {
                id: *id,
                before: *after,
                after: *before,
            },
            Change::Selection { before, after } => Change::Selection {
                before: after.clone(),
                after: before.clone(),
            },
        }
    }

    /// Whether this change touches the shared document (as opposed to presence).
    pub fn is_document_change(&self) -> bool {
        !matches!(self, Change::Selection { .. })
    }

    /// Apply the forward direction of this change.
    ///
    /// Id list edits locate the id by value, since remote edits may have
    /// shifted indices since the change was recorded. Indices are clamped to
    /// the current list.
    pub fn apply<S: SharedStore>(&self, store: &mut S, presence: &mut PresenceStore) -> StoreResult<()> {
        match self {
            Change::InsertId { index, id } => {
                if store.index_of(id).is_none() {
                    let len = store.layer_ids().len();
                    store.insert_layer_id((*index).min(len), *id)?;
                }
            }
            Change::RemoveId { id, .. } => {
                if let Some(current) = store.index_of(id) {
                    store.remove_layer_id(current)?;
                }
            }
            Change::MoveId { id, to, .. } => {
                if let Some(current) = store.index_of(id) {
                    let last = store.layer_ids().len().saturating_sub(1);
                    store.move_layer_id(current, (*to).min(last))?;
                }
            }
            Change::PutLayer { id, after, .. } => match after {
                Some(layer) => store.set_layer(*id, layer)?,
                None => {
                    store.delete_layer(id)?;
                }
            },
            Change::PatchLayer { id, after, .. } => {
                store.update_layer(id, after)?;
            }
            Change::Selection { after, .. } => presence.set_selection(after.clone()),
        }
        Ok(())
    }
}

/// Token proving history is paused. Hand it back to [`History::resume`].
#[must_use = "history stays paused until the guard is passed to `resume`"]
#[derive(Debug)]
pub struct PauseGuard {
    _private: (),
}

/// Undo and redo stacks with pause/resume batching.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Vec<Change>>,
    redo_stack: Vec<Vec<Change>>,
    pending: Vec<Change>,
    pause_depth: usize,
    max_steps: usize,
}

impl History {
    /// Create an empty history keeping at most `max_steps` undo steps.
    /// The oldest step is dropped first.
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: Vec::new(),
            pause_depth: 0,
            max_steps: max_steps.max(1),
        }
    }

    /// Record an applied batch of changes.
    ///
    /// While paused the changes join the pending batch. Otherwise they form a
    /// new undo step and the redo stack is cleared.
    pub fn record(&mut self, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }
        if self.is_paused() {
            self.pending.extend(changes);
        } else {
            self.push(changes);
        }
    }

    fn push(&mut self, batch: Vec<Change>) {
        debug!("History: push batch of {} changes", batch.len());
        self.undo_stack.push(batch);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_steps {
            self.undo_stack.remove(0);
        }
    }

    /// Start grouping recorded changes into one batch.
    pub fn pause(&mut self) -> PauseGuard {
        self.pause_depth += 1;
        debug!("History: paused (depth {})", self.pause_depth);
        PauseGuard { _private: () }
    }

    /// Release a pause. The pending batch is pushed when the last pause ends.
    pub fn resume(&mut self, guard: PauseGuard) {
        drop(guard);
        self.pause_depth = self.pause_depth.saturating_sub(1);
        if self.pause_depth == 0 {
            self.flush();
        }
    }

    /// Whether at least one [`PauseGuard`] is outstanding.
    pub fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }

    /// Push the pending batch, if any, as one undo step.
    fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            self.push(pending);
        }
    }

    /// Pop the latest batch and return the changes that revert it, in
    /// application order. The batch moves onto the redo stack.
    pub fn undo(&mut self) -> Option<Vec<Change>> {
        self.flush();
        let batch = self.undo_stack.pop()?;
        let inverse = batch.iter().rev().map(Change::inverse).collect();
        self.redo_stack.push(batch);
        Some(inverse)
    }

    /// Pop the latest undone batch and return its changes for reapplication.
    pub fn redo(&mut self) -> Option<Vec<Change>> {
        self.flush();
        let batch = self.redo_stack.pop()?;
        let forward = batch.clone();
        self.undo_stack.push(batch);
        Some(forward)
    }

    /// Check if undo is available. A pending paused batch counts.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || !self.pending.is_empty()
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of completed undo steps, not counting a pending batch.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of undone steps available for redo.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop all steps and any pending batch. An open pause stays open.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.pending.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

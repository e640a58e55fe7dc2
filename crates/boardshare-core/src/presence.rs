//! Per-participant ephemeral state.
//!
//! Presence is broadcast to the other participants but never stored in the
//! document and never undone (except for selection changes the board tags
//! for history).

use crate::color::{Color, connection_id_to_color};
use crate::layers::{LayerId, PenPoint};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Connection identifier assigned by the relay.
pub type ConnectionId = u64;

/// What one participant is doing right now.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Presence {
    /// Pointer position in document space, absent when off-canvas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
    #[serde(default)]
    pub selection: Vec<LayerId>,
    /// In-progress freehand stroke, in document space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pencil_draft: Option<Vec<PenPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pen_color: Option<Color>,
}

/// Local presence plus the last known presence of every other participant.
#[derive(Debug, Clone, Default)]
pub struct PresenceStore {
    me: Presence,
    others: BTreeMap<ConnectionId, Presence>,
    /// Set when local presence changed since the last broadcast.
    dirty: bool,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn me(&self) -> &Presence {
        &self.me
    }

    pub fn selection(&self) -> &[LayerId] {
        &self.me.selection
    }

    pub fn set_cursor(&mut self, cursor: Option<Point>) {
        if self.me.cursor != cursor {
            self.me.cursor = cursor;
            self.dirty = true;
        }
    }

    /// Replace the selection, dropping duplicate ids but keeping first-seen order.
    pub fn set_selection(&mut self, ids: Vec<LayerId>) {
        let mut selection = Vec::with_capacity(ids.len());
        for id in ids {
            if !selection.contains(&id) {
                selection.push(id);
            }
        }
        if self.me.selection != selection {
            self.me.selection = selection;
            self.dirty = true;
        }
    }

    pub fn pencil_draft(&self) -> Option<&[PenPoint]> {
        self.me.pencil_draft.as_deref()
    }

    pub fn set_pencil_draft(&mut self, draft: Option<Vec<PenPoint>>) {
        self.me.pencil_draft = draft;
        self.dirty = true;
    }

    /// Append a sample to the draft. Returns `false` when there is no draft.
    pub fn push_draft_point(&mut self, point: PenPoint) -> bool {
        match self.me.pencil_draft.as_mut() {
            Some(draft) => {
                draft.push(point);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn set_pen_color(&mut self, color: Option<Color>) {
        if self.me.pen_color != color {
            self.me.pen_color = color;
            self.dirty = true;
        }
    }

    /// Whether local presence changed since the last call, clearing the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Store presence received from another participant.
    pub fn apply_remote(&mut self, connection_id: ConnectionId, presence: Presence) {
        self.others.insert(connection_id, presence);
    }

    /// Forget a participant that disconnected.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Presence> {
        self.others.remove(&connection_id)
    }

    pub fn clear_others(&mut self) {
        self.others.clear();
    }

    pub fn others(&self) -> impl Iterator<Item = (ConnectionId, &Presence)> {
        self.others.iter().map(|(id, presence)| (*id, presence))
    }

    pub fn other(&self, connection_id: ConnectionId) -> Option<&Presence> {
        self.others.get(&connection_id)
    }

    /// Layers selected by other participants, mapped to the selecting
    /// participant's color. When two participants select the same layer the
    /// lower connection id wins.
    pub fn others_selection_colors(&self) -> HashMap<LayerId, Color> {
        let mut colors = HashMap::new();
        for (connection_id, presence) in &self.others {
            for id in &presence.selection {
                colors
                    .entry(*id)
                    .or_insert_with(|| connection_id_to_color(*connection_id));
            }
        }
        colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PARTICIPANT_COLORS;
    use crate::layers::new_layer_id;

    #[test]
    fn test_selection_dedupes() {
        let mut store = PresenceStore::new();
        let a = new_layer_id();
        let b = new_layer_id();
        store.set_selection(vec![a, b, a]);
        assert_eq!(store.selection(), &[a, b]);
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
    }

    #[test]
    fn test_unchanged_values_do_not_dirty() {
        let mut store = PresenceStore::new();
        store.set_cursor(None);
        store.set_selection(Vec::new());
        assert!(!store.take_dirty());
        store.set_cursor(Some(Point::new(1.0, 2.0)));
        assert!(store.take_dirty());
    }

    #[test]
    fn test_draft_needs_start() {
        let mut store = PresenceStore::new();
        assert!(!store.push_draft_point(PenPoint::new(0.0, 0.0, 0.5)));
        store.set_pencil_draft(Some(vec![PenPoint::new(0.0, 0.0, 0.5)]));
        assert!(store.push_draft_point(PenPoint::new(1.0, 0.0, 0.5)));
        assert_eq!(store.pencil_draft().map(|d| d.len()), Some(2));
    }

    #[test]
    fn test_remote_lifecycle() {
        let mut store = PresenceStore::new();
        let layer = new_layer_id();
        store.apply_remote(
            3,
            Presence {
                selection: vec![layer],
                ..Presence::default()
            },
        );
        store.apply_remote(8, Presence::default());
        assert_eq!(store.others().count(), 2);

        let colors = store.others_selection_colors();
        assert_eq!(colors.get(&layer), Some(&PARTICIPANT_COLORS[3]));

        assert!(store.remove(3).is_some());
        assert!(store.others_selection_colors().is_empty());
        assert!(store.other(8).is_some());
    }

    #[test]
    fn test_serde_skips_empty_fields() {
        let json = serde_json::to_value(Presence::default()).expect("serialize");
        assert!(json.get("cursor").is_none());
        assert!(json.get("pencil_draft").is_none());
        let back: Presence = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(back, Presence::default());
    }
}

//! Interaction state machine.
//!
//! [`Canvas`] turns pointer, wheel and keyboard events into board mutations.
//! Exactly one [`CanvasState`] is active at a time. Gestures that span many
//! events (translating, resizing) hold the history [`PauseGuard`] inside their
//! state, so every way out of the gesture resumes history.

use crate::camera::Camera;
use crate::document::Board;
use crate::error::{BoardError, BoardResult};
use crate::geometry::{Bounds, Side, manhattan_distance};
use crate::history::PauseGuard;
use crate::input::{KeyInput, PointerInput, Shortcut, WheelInput};
use crate::layers::{LayerId, ShapeKind};
use crate::selection;
use crate::store::SharedStore;
use kurbo::Point;
use log::{debug, error};

/// Current interaction mode and the data it needs.
#[derive(Debug, Default)]
pub enum CanvasState {
    #[default]
    None,
    /// Pointer is down on empty canvas but has not moved far yet.
    Pressing { origin: Point },
    /// Rubber-band selection from `origin` to `current`.
    SelectionNet { origin: Point, current: Point },
    /// The next click places a shape.
    Inserting { layer_type: ShapeKind },
    /// Dragging the selection. `current` is the last pointer position.
    Translating { current: Point, guard: PauseGuard },
    /// Dragging a resize handle of the single selected layer.
    Resizing {
        initial_bounds: Bounds,
        corner: Side,
        guard: PauseGuard,
    },
    /// Freehand drawing tool.
    Pencil,
}

/// Field-less view of [`CanvasState`], for toolbars and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasMode {
    None,
    Pressing,
    SelectionNet,
    Inserting,
    Translating,
    Resizing,
    Pencil,
}

impl CanvasState {
    pub fn mode(&self) -> CanvasMode {
        match self {
            CanvasState::None => CanvasMode::None,
            CanvasState::Pressing { .. } => CanvasMode::Pressing,
            CanvasState::SelectionNet { .. } => CanvasMode::SelectionNet,
            CanvasState::Inserting { .. } => CanvasMode::Inserting,
            CanvasState::Translating { .. } => CanvasMode::Translating,
            CanvasState::Resizing { .. } => CanvasMode::Resizing,
            CanvasState::Pencil => CanvasMode::Pencil,
        }
    }

    fn into_guard(self) -> Option<PauseGuard> {
        match self {
            CanvasState::Translating { guard, .. } | CanvasState::Resizing { guard, .. } => Some(guard),
            _ => None,
        }
    }
}

/// A board plus the local interaction state and camera.
pub struct Canvas<S: SharedStore> {
    board: Board<S>,
    state: CanvasState,
    camera: Camera,
    last_rejection: Option<BoardError>,
}

impl<S: SharedStore> Canvas<S> {
    pub fn new(board: Board<S>) -> Self {
        Self {
            board,
            state: CanvasState::None,
            camera: Camera::new(),
            last_rejection: None,
        }
    }

    pub fn board(&self) -> &Board<S> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board<S> {
        &mut self.board
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn mode(&self) -> CanvasMode {
        self.state.mode()
    }

    /// The most recent mutation the board refused (layer cap, short stroke).
    pub fn last_rejection(&self) -> Option<&BoardError> {
        self.last_rejection.as_ref()
    }

    pub fn take_rejection(&mut self) -> Option<BoardError> {
        self.last_rejection.take()
    }

    /// Enter `next`, resuming history if the previous state held a pause.
    fn transition(&mut self, next: CanvasState) {
        let previous = std::mem::replace(&mut self.state, next);
        debug!("Canvas: {:?} -> {:?}", previous.mode(), self.state.mode());
        if let Some(guard) = previous.into_guard() {
            self.board.resume_history(guard);
        }
    }

    /// Swallow rejections, keeping them for the UI. Faults propagate.
    fn absorb<T>(&mut self, result: BoardResult<T>) -> BoardResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_rejection() => {
                self.last_rejection = Some(err);
                Ok(None)
            }
            Err(err) => {
                error!("Board mutation failed: {}", err);
                Err(err)
            }
        }
    }

    fn to_world(&self, input: &PointerInput) -> Point {
        self.camera.screen_to_world(input.position)
    }

    // --- Tools ---

    /// Arm the insert tool: the next click places a `kind` shape.
    pub fn start_inserting(&mut self, kind: ShapeKind) {
        self.transition(CanvasState::Inserting { layer_type: kind });
    }

    pub fn start_pencil(&mut self) {
        self.transition(CanvasState::Pencil);
    }

    /// Back to the select tool.
    pub fn reset_mode(&mut self) {
        self.transition(CanvasState::None);
    }

    // --- Pointer events ---

    /// Pointer down on empty canvas.
    pub fn pointer_down(&mut self, input: PointerInput) -> BoardResult<()> {
        let point = self.to_world(&input);

        match self.state {
            CanvasState::Inserting { layer_type } => {
                let inserted = self.board.insert_layer(layer_type, point);
                if self.absorb(inserted)?.is_some() {
                    self.transition(CanvasState::None);
                }
            }
            CanvasState::Pencil => self.board.start_drawing(point, input.pressure),
            _ => self.transition(CanvasState::Pressing { origin: point }),
        }
        Ok(())
    }

    /// Pointer down routed by what is under the pointer: resize handles of
    /// the selection first, then layers front to back, then empty canvas.
    pub fn pointer_down_at(&mut self, input: PointerInput) -> BoardResult<()> {
        if matches!(self.state, CanvasState::Inserting { .. } | CanvasState::Pencil) {
            return self.pointer_down(input);
        }

        let point = self.to_world(&input);
        let store = self.board.store();
        let current_selection = self.board.selection();

        if let Some(corner) = selection::hit_test_handles(current_selection, store, point) {
            if let Some(bounds) = selection::compute_bounds(current_selection, store) {
                self.resize_handle_pointer_down(corner, bounds);
                return Ok(());
            }
        }
        if let Some(id) = selection::layer_at_point(store, point) {
            return self.layer_pointer_down(input, id);
        }
        self.pointer_down(input)
    }

    /// Pointer down on a layer: select it (unless already selected) and start dragging.
    pub fn layer_pointer_down(&mut self, input: PointerInput, id: LayerId) -> BoardResult<()> {
        if matches!(self.state, CanvasState::Inserting { .. } | CanvasState::Pencil) {
            return Ok(());
        }

        let point = self.to_world(&input);
        let guard = self.board.pause_history();
        if !self.board.selection().contains(&id) {
            if let Err(err) = self.board.set_selection(vec![id], true) {
                self.board.resume_history(guard);
                return Err(err);
            }
        }
        self.transition(CanvasState::Translating { current: point, guard });
        Ok(())
    }

    /// Pointer down on a resize handle of the selection.
    pub fn resize_handle_pointer_down(&mut self, corner: Side, initial_bounds: Bounds) {
        let guard = self.board.pause_history();
        self.transition(CanvasState::Resizing {
            initial_bounds,
            corner,
            guard,
        });
    }

    pub fn pointer_move(&mut self, input: PointerInput) -> BoardResult<()> {
        let point = self.to_world(&input);
        let threshold = self.board.config().selection_net_threshold;

        match &mut self.state {
            CanvasState::Pressing { origin } => {
                let origin = *origin;
                if manhattan_distance(point, origin) > threshold {
                    self.transition(CanvasState::SelectionNet { origin, current: point });
                }
            }
            CanvasState::SelectionNet { origin, current } => {
                *current = point;
                let origin = *origin;
                let ids = selection::intersect(&self.board.layer_ids(), self.board.store(), origin, point);
                self.board.set_selection(ids, false)?;
            }
            CanvasState::Translating { current, .. } => {
                let delta = point - *current;
                *current = point;
                let moved = self.board.translate_selected(delta);
                self.absorb(moved)?;
            }
            CanvasState::Resizing {
                initial_bounds, corner, ..
            } => {
                let (initial, corner) = (*initial_bounds, *corner);
                if let Some(&id) = self.board.selection().first() {
                    let resized = self.board.resize_layer(id, initial, corner, point);
                    self.absorb(resized)?;
                }
            }
            CanvasState::Pencil => {
                if input.is_primary_only() {
                    self.board.continue_drawing(point, input.pressure);
                }
            }
            CanvasState::None | CanvasState::Inserting { .. } => {}
        }

        self.board.set_cursor(point);
        Ok(())
    }

    pub fn pointer_up(&mut self, input: PointerInput) -> BoardResult<()> {
        let point = self.to_world(&input);

        match self.state {
            CanvasState::None | CanvasState::Pressing { .. } => {
                self.board.unselect()?;
                self.transition(CanvasState::None);
            }
            CanvasState::Pencil => {
                let inserted = self.board.insert_path();
                self.absorb(inserted)?;
            }
            CanvasState::Inserting { layer_type } => {
                let inserted = self.board.insert_layer(layer_type, point);
                if self.absorb(inserted)?.is_some() {
                    self.transition(CanvasState::None);
                }
            }
            _ => self.transition(CanvasState::None),
        }
        Ok(())
    }

    /// The pointer was lost mid-gesture. Any draft is dropped and the machine
    /// returns to `None`.
    pub fn pointer_cancel(&mut self) {
        if self.board.presence().pencil_draft().is_some() {
            self.board.presence_mut().set_pencil_draft(None);
        }
        self.transition(CanvasState::None);
    }

    pub fn pointer_leave(&mut self) {
        self.board.clear_cursor();
    }

    /// Scroll the local camera. Nothing is synchronized.
    pub fn wheel(&mut self, input: WheelInput) {
        self.camera.apply_wheel(input.delta);
        self.board.invalidate();
    }

    pub fn key_down(&mut self, input: &KeyInput) -> BoardResult<()> {
        match Shortcut::from_key(input) {
            Some(Shortcut::Undo) => {
                self.board.undo()?;
            }
            Some(Shortcut::Redo) => {
                self.board.redo()?;
            }
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardConfig;
    use crate::input::Modifiers;
    use crate::layers::LayerType;
    use crate::store::MemoryStore;
    use kurbo::Vec2;

    fn canvas() -> Canvas<MemoryStore> {
        Canvas::new(Board::new(MemoryStore::new()))
    }

    fn at(x: f64, y: f64) -> PointerInput {
        PointerInput::new(Point::new(x, y))
    }

    fn insert(canvas: &mut Canvas<MemoryStore>, x: f64, y: f64) -> LayerId {
        canvas.board_mut().insert_layer(ShapeKind::Rectangle, Point::new(x, y)).unwrap()
    }

    #[test]
    fn test_drag_threshold() {
        let mut canvas = canvas();
        canvas.pointer_down(at(10.0, 10.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::Pressing);

        canvas.pointer_move(at(12.0, 11.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::Pressing);

        canvas.pointer_move(at(16.0, 10.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::SelectionNet);
    }

    #[test]
    fn test_selection_net_selects_overlapping() {
        let mut canvas = canvas();
        let a = insert(&mut canvas, 0.0, 0.0);
        let _far = insert(&mut canvas, 500.0, 500.0);
        let c = insert(&mut canvas, 150.0, 0.0);
        canvas.board_mut().set_selection(Vec::new(), false).unwrap();

        canvas.pointer_down(at(50.0, 50.0)).unwrap();
        canvas.pointer_move(at(60.0, 60.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::SelectionNet);
        canvas.pointer_move(at(160.0, 60.0)).unwrap();
        assert_eq!(canvas.board().selection(), &[a, c]);

        canvas.pointer_up(at(160.0, 60.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::None);
        assert_eq!(canvas.board().selection(), &[a, c]);
    }

    #[test]
    fn test_click_on_empty_canvas_clears_selection() {
        let mut canvas = canvas();
        insert(&mut canvas, 0.0, 0.0);
        assert_eq!(canvas.board().selection().len(), 1);

        canvas.pointer_down(at(400.0, 400.0)).unwrap();
        canvas.pointer_up(at(400.0, 400.0)).unwrap();
        assert!(canvas.board().selection().is_empty());
        assert_eq!(canvas.mode(), CanvasMode::None);
    }

    #[test]
    fn test_translate_gesture_is_one_undo_step() {
        let mut canvas = canvas();
        let id = insert(&mut canvas, 0.0, 0.0);
        canvas.board_mut().set_selection(Vec::new(), false).unwrap();
        let undo_before = canvas.board().history().undo_count();

        canvas.pointer_down_at(at(50.0, 50.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::Translating);
        assert_eq!(canvas.board().selection(), &[id]);

        canvas.pointer_move(at(60.0, 55.0)).unwrap();
        canvas.pointer_move(at(80.0, 70.0)).unwrap();
        canvas.pointer_up(at(80.0, 70.0)).unwrap();

        assert_eq!(canvas.mode(), CanvasMode::None);
        assert!(!canvas.board().history().is_paused());
        assert_eq!(canvas.board().layer(&id).map(|l| (l.x, l.y)), Some((30.0, 20.0)));
        assert_eq!(canvas.board().history().undo_count(), undo_before + 1);

        canvas.board_mut().undo().unwrap();
        assert_eq!(canvas.board().layer(&id).map(|l| (l.x, l.y)), Some((0.0, 0.0)));
        assert!(canvas.board().selection().is_empty());
    }

    #[test]
    fn test_layer_pointer_down_keeps_multi_selection() {
        let mut canvas = canvas();
        let a = insert(&mut canvas, 0.0, 0.0);
        let b = insert(&mut canvas, 200.0, 0.0);
        canvas.board_mut().set_selection(vec![a, b], false).unwrap();

        canvas.layer_pointer_down(at(10.0, 10.0), a).unwrap();
        assert_eq!(canvas.board().selection(), &[a, b]);
        canvas.pointer_move(at(20.0, 10.0)).unwrap();
        canvas.pointer_up(at(20.0, 10.0)).unwrap();

        assert_eq!(canvas.board().layer(&a).map(|l| l.x), Some(10.0));
        assert_eq!(canvas.board().layer(&b).map(|l| l.x), Some(210.0));
    }

    #[test]
    fn test_resize_via_handle() {
        let mut canvas = canvas();
        let id = insert(&mut canvas, 0.0, 0.0);
        let undo_before = canvas.board().history().undo_count();
        let bounds = |canvas: &Canvas<MemoryStore>| canvas.board().layer(&id).map(|l| l.bounds());

        canvas.pointer_down_at(at(100.0, 100.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::Resizing);
        canvas.pointer_move(at(120.0, 110.0)).unwrap();
        canvas.pointer_move(at(140.0, 130.0)).unwrap();
        canvas.pointer_move(at(150.0, 120.0)).unwrap();
        canvas.pointer_up(at(150.0, 120.0)).unwrap();

        assert_eq!(bounds(&canvas), Some(Bounds::new(0.0, 0.0, 150.0, 120.0)));
        assert!(!canvas.board().history().is_paused());
        assert_eq!(canvas.board().history().undo_count(), undo_before + 1);

        assert!(canvas.board_mut().undo().unwrap());
        assert_eq!(bounds(&canvas), Some(Bounds::new(0.0, 0.0, 100.0, 100.0)));
        assert!(canvas.board_mut().redo().unwrap());
        assert_eq!(bounds(&canvas), Some(Bounds::new(0.0, 0.0, 150.0, 120.0)));
        assert_eq!(canvas.board().selection(), &[id]);
    }

    #[test]
    fn test_insert_tool() {
        let mut canvas = canvas();
        canvas.start_inserting(ShapeKind::Note);
        canvas.pointer_down(at(30.0, 40.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::None);

        let layers = canvas.board().layers();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].1.layer_type(), LayerType::Note);
        assert_eq!((layers[0].1.x, layers[0].1.y), (30.0, 40.0));
    }

    #[test]
    fn test_insert_tool_full_click() {
        let mut canvas = canvas();
        canvas.start_inserting(ShapeKind::Rectangle);
        canvas.pointer_down(at(30.0, 40.0)).unwrap();
        canvas.pointer_up(at(30.0, 40.0)).unwrap();

        // The layer is placed on press; the release is an ordinary click in
        // `None` and deselects it as a separate undo step.
        let ids = canvas.board().layer_ids();
        assert_eq!(ids.len(), 1);
        assert!(canvas.board().selection().is_empty());
        assert_eq!(canvas.mode(), CanvasMode::None);
        assert_eq!(canvas.board().history().undo_count(), 2);

        canvas.board_mut().undo().unwrap();
        assert_eq!(canvas.board().selection(), &[ids[0]]);
        assert_eq!(canvas.board().layer_ids(), ids);
    }

    #[test]
    fn test_insert_tool_at_capacity_stays_armed() {
        let config = BoardConfig {
            max_layers: 1,
            ..BoardConfig::default()
        };
        let mut canvas = Canvas::new(Board::with_config(MemoryStore::new(), config));
        insert(&mut canvas, 0.0, 0.0);

        canvas.start_inserting(ShapeKind::Ellipse);
        canvas.pointer_down(at(300.0, 300.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::Inserting);
        assert_eq!(canvas.board().store().layer_count(), 1);
        assert!(matches!(
            canvas.take_rejection(),
            Some(BoardError::CapacityExceeded { max: 1 })
        ));
    }

    #[test]
    fn test_pencil_stroke() {
        let mut canvas = canvas();
        canvas.start_pencil();

        canvas.pointer_down(at(10.0, 10.0).with_pressure(0.3)).unwrap();
        canvas.pointer_move(at(10.0, 10.0)).unwrap();
        canvas.pointer_move(at(30.0, 20.0)).unwrap();
        canvas.pointer_move(PointerInput::hover(Point::new(90.0, 90.0))).unwrap();
        assert_eq!(canvas.board().presence().pencil_draft().map(|d| d.len()), Some(2));

        canvas.pointer_up(at(30.0, 20.0)).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::Pencil);
        let layers = canvas.board().layers();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].1.layer_type(), LayerType::Path);
        assert!(canvas.board().presence().pencil_draft().is_none());
    }

    #[test]
    fn test_pencil_click_is_discarded() {
        let mut canvas = canvas();
        canvas.start_pencil();
        canvas.pointer_down(at(10.0, 10.0)).unwrap();
        canvas.pointer_up(at(10.0, 10.0)).unwrap();

        assert!(canvas.board().layers().is_empty());
        assert!(matches!(canvas.last_rejection(), Some(BoardError::InvalidGesture(_))));
        assert_eq!(canvas.mode(), CanvasMode::Pencil);
    }

    #[test]
    fn test_layer_pointer_down_ignored_while_drawing() {
        let mut canvas = canvas();
        let id = insert(&mut canvas, 0.0, 0.0);
        canvas.board_mut().set_selection(Vec::new(), false).unwrap();
        canvas.start_pencil();

        canvas.layer_pointer_down(at(10.0, 10.0), id).unwrap();
        assert_eq!(canvas.mode(), CanvasMode::Pencil);
        assert!(canvas.board().selection().is_empty());
        assert!(!canvas.board().history().is_paused());
    }

    #[test]
    fn test_cancel_resumes_history() {
        let mut canvas = canvas();
        let id = insert(&mut canvas, 0.0, 0.0);
        canvas.layer_pointer_down(at(10.0, 10.0), id).unwrap();
        assert!(canvas.board().history().is_paused());

        canvas.pointer_cancel();
        assert_eq!(canvas.mode(), CanvasMode::None);
        assert!(!canvas.board().history().is_paused());
    }

    #[test]
    fn test_wheel_pans_camera() {
        let mut canvas = canvas();
        canvas.wheel(WheelInput {
            delta: Vec2::new(0.0, 100.0),
        });
        assert_eq!(canvas.camera().offset, Vec2::new(0.0, -100.0));

        canvas.start_inserting(ShapeKind::Rectangle);
        canvas.pointer_down(at(10.0, 10.0)).unwrap();
        let layers = canvas.board().layers();
        assert_eq!((layers[0].1.x, layers[0].1.y), (10.0, 110.0));
    }

    #[test]
    fn test_cursor_tracking() {
        let mut canvas = canvas();
        canvas.pointer_move(PointerInput::hover(Point::new(5.0, 6.0))).unwrap();
        assert_eq!(canvas.board().presence().me().cursor, Some(Point::new(5.0, 6.0)));
        canvas.pointer_leave();
        assert_eq!(canvas.board().presence().me().cursor, None);
    }

    #[test]
    fn test_keyboard_undo_redo() {
        let mut canvas = canvas();
        let id = insert(&mut canvas, 0.0, 0.0);
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };

        canvas.key_down(&KeyInput::new("z", ctrl)).unwrap();
        assert!(canvas.board().layer(&id).is_none());

        let redo = Modifiers { shift: true, ..ctrl };
        canvas.key_down(&KeyInput::new("Z", redo)).unwrap();
        assert!(canvas.board().layer(&id).is_some());
    }
}

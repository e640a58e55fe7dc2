//! Selection geometry: bounds, net intersection, resize handles and toolbar anchor.

use crate::camera::Camera;
use crate::geometry::{Bounds, Side};
use crate::layers::{LayerId, LayerType};
use crate::store::SharedStore;
use kurbo::Point;

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 8.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;
/// Gap between the selection box and the floating toolbar, in screen pixels.
pub const TOOLBAR_OFFSET: f64 = 16.0;

/// A resize handle with its position in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub side: Side,
    pub position: Point,
}

impl Handle {
    /// Square hit test around the handle center.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point.x - self.position.x).abs() <= tolerance && (point.y - self.position.y).abs() <= tolerance
    }
}

/// Union of the boxes of every selected layer, or `None` when nothing
/// selected exists.
pub fn compute_bounds<S: SharedStore>(selection: &[LayerId], store: &S) -> Option<Bounds> {
    selection
        .iter()
        .filter_map(|id| store.layer(id))
        .map(|layer| layer.bounds())
        .reduce(|acc, bounds| acc.union(&bounds))
}

/// Ids whose layer box overlaps the rectangle spanned by `origin` and
/// `current`, in paint order. Touching edges count as overlap.
pub fn intersect<S: SharedStore>(
    layer_ids: &[LayerId],
    store: &S,
    origin: Point,
    current: Point,
) -> Vec<LayerId> {
    let net = Bounds::from_corners(origin, current);
    layer_ids
        .iter()
        .filter(|id| {
            store
                .layer(id)
                .is_some_and(|layer| layer.bounds().overlaps(&net))
        })
        .copied()
        .collect()
}

/// Position of the handle for `side` on `bounds`.
pub fn handle_position(bounds: &Bounds, side: Side) -> Point {
    let x = if side.contains(Side::LEFT) {
        bounds.x
    } else if side.contains(Side::RIGHT) {
        bounds.right()
    } else {
        bounds.x + bounds.width / 2.0
    };
    let y = if side.contains(Side::TOP) {
        bounds.y
    } else if side.contains(Side::BOTTOM) {
        bounds.bottom()
    } else {
        bounds.y + bounds.height / 2.0
    };
    Point::new(x, y)
}

/// Resize handles for the current selection.
///
/// Only a single selected layer that is not a path can be resized; every
/// other selection has no handles.
pub fn resize_handles<S: SharedStore>(selection: &[LayerId], store: &S) -> Vec<Handle> {
    let [id] = selection else {
        return Vec::new();
    };
    let Some(layer) = store.layer(id) else {
        return Vec::new();
    };
    if layer.layer_type() == LayerType::Path {
        return Vec::new();
    }

    let bounds = layer.bounds();
    Side::HANDLES
        .iter()
        .map(|&side| Handle {
            side,
            position: handle_position(&bounds, side),
        })
        .collect()
}

/// The handle under `point` (document space), if any.
pub fn hit_test_handles<S: SharedStore>(selection: &[LayerId], store: &S, point: Point) -> Option<Side> {
    resize_handles(selection, store)
        .into_iter()
        .find(|handle| handle.hit_test(point, HANDLE_HIT_TOLERANCE))
        .map(|handle| handle.side)
}

/// Screen-space anchor for the floating toolbar: centered above the selection.
pub fn toolbar_anchor<S: SharedStore>(selection: &[LayerId], store: &S, camera: &Camera) -> Option<Point> {
    let bounds = compute_bounds(selection, store)?;
    let top_center = camera.world_to_screen(Point::new(bounds.x + bounds.width / 2.0, bounds.y));
    Some(Point::new(top_center.x, top_center.y - TOOLBAR_OFFSET))
}

/// Top-most layer containing `point`, searching front to back.
pub fn layer_at_point<S: SharedStore>(store: &S, point: Point) -> Option<LayerId> {
    store
        .layer_ids()
        .into_iter()
        .rev()
        .find(|id| store.layer(id).is_some_and(|layer| layer.bounds().contains(point)))
}

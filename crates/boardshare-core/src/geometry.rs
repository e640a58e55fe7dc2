//! Geometry helpers: boxes, resize math, overlap tests and path simplification.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// An axis-aligned box in document space, stored as origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// The box spanned by two opposite corners, in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        let rect = rect.abs();
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.right(), self.bottom())
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Closed-interval overlap: boxes that only touch along an edge overlap.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Bounds::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn translate(&self, delta: Vec2) -> Bounds {
        Bounds::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }
}

/// Edges of a box grabbed by a resize handle, combined as a bitmask.
///
/// Corners are the union of two edges, e.g. `Side::BOTTOM | Side::RIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Side(u8);

impl Side {
    pub const TOP: Side = Side(1);
    pub const BOTTOM: Side = Side(2);
    pub const LEFT: Side = Side(4);
    pub const RIGHT: Side = Side(8);

    pub const TOP_LEFT: Side = Side(1 | 4);
    pub const TOP_RIGHT: Side = Side(1 | 8);
    pub const BOTTOM_LEFT: Side = Side(2 | 4);
    pub const BOTTOM_RIGHT: Side = Side(2 | 8);

    /// All eight handle positions, clockwise from the top-left corner.
    pub const HANDLES: [Side; 8] = [
        Side::TOP_LEFT,
        Side::TOP,
        Side::TOP_RIGHT,
        Side::RIGHT,
        Side::BOTTOM_RIGHT,
        Side::BOTTOM,
        Side::BOTTOM_LEFT,
        Side::LEFT,
    ];

    /// Build from raw bits, rejecting empty or contradictory masks.
    pub fn from_bits(bits: u8) -> Option<Side> {
        let side = Side(bits);
        let valid = bits != 0
            && bits & !0b1111 == 0
            && !(side.contains(Side::TOP) && side.contains(Side::BOTTOM))
            && !(side.contains(Side::LEFT) && side.contains(Side::RIGHT));
        valid.then_some(side)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Side) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Side {
    type Output = Side;

    fn bitor(self, rhs: Side) -> Side {
        Side(self.0 | rhs.0)
    }
}

/// Recompute `bounds` while dragging the `corner` handle to `point`.
///
/// The opposite edge stays anchored. Dragging past the anchor flips the box
/// instead of producing a negative size.
pub fn resize_bounds(bounds: Bounds, corner: Side, point: Point) -> Bounds {
    let mut result = bounds;

    if corner.contains(Side::LEFT) {
        result.x = point.x.min(bounds.right());
        result.width = (bounds.right() - point.x).abs();
    }
    if corner.contains(Side::RIGHT) {
        result.x = point.x.min(bounds.x);
        result.width = (point.x - bounds.x).abs();
    }
    if corner.contains(Side::TOP) {
        result.y = point.y.min(bounds.bottom());
        result.height = (bounds.bottom() - point.y).abs();
    }
    if corner.contains(Side::BOTTOM) {
        result.y = point.y.min(bounds.y);
        result.height = (point.y - bounds.y).abs();
    }

    result
}

/// Combined absolute x and y displacement.
pub fn manhattan_distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Bounding box of a point cloud, or `None` when empty.
pub fn bounding_box<I>(points: I) -> Option<Bounds>
where
    I: IntoIterator<Item = Point>,
{
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for point in iter {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    Some(Bounds::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Ramer-Douglas-Peucker simplification.
///
/// Returns the indices of the points to keep, in order. The first and last
/// points are always kept.
pub fn simplify_indices(points: &[Point], tolerance: f64) -> Vec<usize> {
    if points.len() < 3 {
        return (0..points.len()).collect();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;
    mark_kept(points, 0, last, tolerance, &mut keep);

    keep.iter()
        .enumerate()
        .filter_map(|(i, &kept)| kept.then_some(i))
        .collect()
}

fn mark_kept(points: &[Point], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_index = first;
    for i in first + 1..last {
        let dist = perpendicular_distance(points[i], points[first], points[last]);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        keep[max_index] = true;
        mark_kept(points, first, max_index, tolerance, keep);
        mark_kept(points, max_index, last, tolerance, keep);
    }
}

/// Distance from `point` to the infinite line through `start` and `end`.
fn perpendicular_distance(point: Point, start: Point, end: Point) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;

    let len_sq = dx * dx + dy * dy;
    if len_sq < f64::EPSILON {
        // Degenerate line
        return (point - start).hypot();
    }

    let area2 = ((point.x - start.x) * dy - (point.y - start.y) * dx).abs();
    area2 / len_sq.sqrt()
}

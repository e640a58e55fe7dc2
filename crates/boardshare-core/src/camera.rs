//! Local pan camera.
//!
//! The camera is never synchronized. Each participant scrolls their own view
//! and pointer positions are converted into document space before they reach
//! the board.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Pan offset applied when rendering the board.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Camera {
    /// Translation from document space to screen space.
    pub offset: Vec2,
}

impl Camera {
    /// Create a camera at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform from document coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset)
    }

    /// Transform from screen coordinates to document coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::translate(-self.offset)
    }

    /// Convert a screen point (e.g. a pointer event) to document coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a document point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Scroll the view with a wheel delta. Content moves opposite to the wheel.
    pub fn apply_wheel(&mut self, wheel_delta: Vec2) {
        self.offset -= wheel_delta;
    }

    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
    }
}

//! Layer definitions for the board.
//!
//! A layer is one drawable object. Every layer shares a position, a bounding
//! box and a fill; the payload carries what only some layer types need.

mod stroke;

pub use stroke::{StrokeOptions, outline_to_path, stroke_outline};

use crate::color::Color;
use crate::geometry::{Bounds, bounding_box, simplify_indices};
use kurbo::{BezPath, Point, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for layers, generated client-side.
pub type LayerId = Uuid;

/// Generate a fresh layer identifier.
pub fn new_layer_id() -> LayerId {
    Uuid::new_v4()
}

/// Discriminant of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Rectangle,
    Ellipse,
    Text,
    Note,
    Path,
}

/// Layer types the insert tool can place. Paths only come from the pencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Text,
    Note,
}

impl From<ShapeKind> for LayerType {
    fn from(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Rectangle => LayerType::Rectangle,
            ShapeKind::Ellipse => LayerType::Ellipse,
            ShapeKind::Text => LayerType::Text,
            ShapeKind::Note => LayerType::Note,
        }
    }
}

/// One pen sample: position plus pressure in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenPoint {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
}

impl PenPoint {
    pub fn new(x: f64, y: f64, pressure: f64) -> Self {
        Self { x, y, pressure }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn translate(&self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.pressure)
    }
}

/// Type-specific layer data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerPayload {
    Rectangle,
    Ellipse,
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Note {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// Pen samples relative to the layer origin.
    Path { points: Vec<PenPoint> },
}

impl LayerPayload {
    pub fn layer_type(&self) -> LayerType {
        match self {
            LayerPayload::Rectangle => LayerType::Rectangle,
            LayerPayload::Ellipse => LayerType::Ellipse,
            LayerPayload::Text { .. } => LayerType::Text,
            LayerPayload::Note { .. } => LayerType::Note,
            LayerPayload::Path { .. } => LayerType::Path,
        }
    }

    fn empty(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Rectangle => LayerPayload::Rectangle,
            ShapeKind::Ellipse => LayerPayload::Ellipse,
            ShapeKind::Text => LayerPayload::Text { value: None },
            ShapeKind::Note => LayerPayload::Note { value: None },
        }
    }
}

/// A drawable object on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
    #[serde(flatten)]
    pub payload: LayerPayload,
}

impl Layer {
    /// A shape layer of `size` x `size` with its top-left corner at `position`.
    pub fn shape(kind: ShapeKind, position: Point, size: f64, fill: Color) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: size,
            height: size,
            fill,
            payload: LayerPayload::empty(kind),
        }
    }

    /// Build a path layer from absolute pen samples.
    ///
    /// The samples are simplified, the stroke outline is computed, and the
    /// layer's box is the extent of that outline. Samples are stored relative
    /// to the box origin. Returns `None` for fewer than two samples.
    pub fn path(
        points: &[PenPoint],
        fill: Color,
        options: &StrokeOptions,
        simplify_tolerance: f64,
    ) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let positions: Vec<Point> = points.iter().map(PenPoint::point).collect();
        let kept: Vec<PenPoint> = simplify_indices(&positions, simplify_tolerance)
            .into_iter()
            .map(|i| points[i])
            .collect();

        let outline = stroke_outline(&kept, options);
        let bounds = bounding_box(outline)
            .or_else(|| bounding_box(kept.iter().map(PenPoint::point)))?;
        let to_local = Vec2::new(-bounds.x, -bounds.y);

        Some(Self {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            fill,
            payload: LayerPayload::Path {
                points: kept.iter().map(|p| p.translate(to_local)).collect(),
            },
        })
    }

    pub fn layer_type(&self) -> LayerType {
        self.payload.layer_type()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }

    /// Text content for text and note layers.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            LayerPayload::Text { value } | LayerPayload::Note { value } => value.as_deref(),
            _ => None,
        }
    }

    /// Fill path for path layers, in document coordinates.
    pub fn outline_path(&self, options: &StrokeOptions) -> Option<BezPath> {
        let LayerPayload::Path { points } = &self.payload else {
            return None;
        };
        let mut path = outline_to_path(&stroke_outline(points, options));
        path.apply_affine(kurbo::Affine::translate((self.x, self.y)));
        Some(path)
    }

    /// Apply the fields set in `patch`.
    pub fn apply(&mut self, patch: &LayerPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(fill) = patch.fill {
            self.fill = fill;
        }
    }

    /// The patch that restores the current values of the fields `patch` touches.
    pub fn revert_patch(&self, patch: &LayerPatch) -> LayerPatch {
        LayerPatch {
            x: patch.x.map(|_| self.x),
            y: patch.y.map(|_| self.y),
            width: patch.width.map(|_| self.width),
            height: patch.height.map(|_| self.height),
            fill: patch.fill.map(|_| self.fill),
        }
    }
}

/// A partial update of a layer's shared fields.
///
/// The substrate merges each field independently, so concurrent patches that
/// touch different fields both survive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
}

impl LayerPatch {
    pub fn position(point: Point) -> Self {
        Self {
            x: Some(point.x),
            y: Some(point.y),
            ..Self::default()
        }
    }

    pub fn bounds(bounds: Bounds) -> Self {
        Self {
            x: Some(bounds.x),
            y: Some(bounds.y),
            width: Some(bounds.width),
            height: Some(bounds.height),
            fill: None,
        }
    }

    pub fn fill(color: Color) -> Self {
        Self {
            fill: Some(color),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_layer_defaults() {
        let layer = Layer::shape(ShapeKind::Note, Point::new(5.0, 6.0), 100.0, Color::white());
        assert_eq!(layer.layer_type(), LayerType::Note);
        assert_eq!(layer.bounds(), Bounds::new(5.0, 6.0, 100.0, 100.0));
        assert_eq!(layer.text(), None);
    }

    #[test]
    fn test_path_needs_two_points() {
        let options = StrokeOptions::default();
        let single = [PenPoint::new(1.0, 1.0, 0.5)];
        assert!(Layer::path(&single, Color::black(), &options, 0.5).is_none());
        assert!(Layer::path(&[], Color::black(), &options, 0.5).is_none());
    }

    #[test]
    fn test_path_bounds_cover_outline() {
        let options = StrokeOptions::default();
        let points = [
            PenPoint::new(100.0, 100.0, 0.5),
            PenPoint::new(200.0, 150.0, 0.5),
        ];
        let layer = Layer::path(&points, Color::black(), &options, 0.5).expect("path layer");

        assert_eq!(layer.layer_type(), LayerType::Path);
        assert!(layer.x < 100.0 && layer.y < 100.0);
        assert!(layer.bounds().right() > 200.0);
        assert!(layer.bounds().bottom() > 150.0);

        // Samples are stored relative to the layer origin.
        let LayerPayload::Path { points: local } = &layer.payload else {
            panic!("expected path payload");
        };
        assert_eq!(local.len(), 2);
        assert!((local[0].x + layer.x - 100.0).abs() < 1e-9);
        assert!((local[0].y + layer.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_path_simplification_keeps_pressure() {
        let options = StrokeOptions::default();
        let points = [
            PenPoint::new(0.0, 0.0, 0.1),
            PenPoint::new(1.0, 0.0, 0.5),
            PenPoint::new(2.0, 0.0, 0.9),
        ];
        let layer = Layer::path(&points, Color::black(), &options, 0.5).expect("path layer");
        let LayerPayload::Path { points: local } = &layer.payload else {
            panic!("expected path payload");
        };
        assert_eq!(local.len(), 2);
        assert!((local[0].pressure - 0.1).abs() < f64::EPSILON);
        assert!((local[1].pressure - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_patch_apply_and_revert() {
        let mut layer = Layer::shape(ShapeKind::Rectangle, Point::ZERO, 100.0, Color::black());
        let patch = LayerPatch::position(Point::new(10.0, 20.0));
        let revert = layer.revert_patch(&patch);

        layer.apply(&patch);
        assert_eq!((layer.x, layer.y), (10.0, 20.0));
        assert_eq!(revert.width, None);

        layer.apply(&revert);
        assert_eq!((layer.x, layer.y), (0.0, 0.0));
    }

    #[test]
    fn test_serde_layer_shape() {
        let layer = Layer::shape(ShapeKind::Text, Point::new(1.0, 2.0), 100.0, Color::black());
        let json = serde_json::to_value(&layer).expect("serialize");
        assert_eq!(json["type"], "text");
        assert_eq!(json["fill"]["r"], 0);
        let back: Layer = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, layer);
    }

    #[test]
    fn test_outline_path_in_document_space() {
        let options = StrokeOptions::default();
        let points = [
            PenPoint::new(300.0, 300.0, 0.5),
            PenPoint::new(320.0, 310.0, 0.5),
        ];
        let layer = Layer::path(&points, Color::black(), &options, 0.5).expect("path layer");
        let path = layer.outline_path(&options).expect("outline");
        let bbox = kurbo::Shape::bounding_box(&path);
        assert!(bbox.x0 > 250.0 && bbox.x1 < 350.0);

        let rect = Layer::shape(ShapeKind::Rectangle, Point::ZERO, 100.0, Color::black());
        assert!(rect.outline_path(&options).is_none());
    }
}

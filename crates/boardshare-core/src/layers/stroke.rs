//! Pressure-sensitive stroke outlines for freehand paths.
//!
//! A path layer stores the raw pen samples. The outline is the filled polygon
//! around those samples; its extent defines the layer's bounding box and the
//! renderer fills it as an SVG path.

use super::PenPoint;
use kurbo::{BezPath, Point, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of segments used to approximate each round cap.
const CAP_SEGMENTS: usize = 8;
/// Smallest radius a stroke is allowed to thin down to.
const MIN_RADIUS: f64 = 0.25;

/// Outline shaping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeOptions {
    /// Base diameter of the stroke.
    pub size: f64,
    /// How strongly pressure changes the width (0 = constant width).
    pub thinning: f64,
    /// Minimum spacing between outline samples, as a fraction of `size`.
    pub smoothing: f64,
    /// How far each sample is pulled towards the previous one (0..1).
    pub streamline: f64,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self {
            size: 16.0,
            thinning: 0.5,
            smoothing: 0.5,
            streamline: 0.5,
        }
    }
}

impl StrokeOptions {
    /// Stroke radius at the given pressure.
    pub fn radius(&self, pressure: f64) -> f64 {
        let pressure = pressure.clamp(0.0, 1.0);
        (self.size * (0.5 - self.thinning * (0.5 - pressure))).max(MIN_RADIUS)
    }
}

/// Build the outline polygon around a sequence of pen samples.
///
/// Returns an empty vector when there are no samples. A single sample yields
/// a dot.
pub fn stroke_outline(points: &[PenPoint], options: &StrokeOptions) -> Vec<Point> {
    let samples = streamline(points, options);
    let Some(&(first, first_pressure)) = samples.first() else {
        return Vec::new();
    };

    if samples.len() == 1 {
        return circle(first, options.radius(first_pressure));
    }

    let min_spacing_sq = (options.size * options.smoothing * 0.5).powi(2);
    let mut left: Vec<Point> = Vec::with_capacity(samples.len());
    let mut right: Vec<Point> = Vec::with_capacity(samples.len());

    for i in 0..samples.len() {
        let (point, pressure) = samples[i];
        let prev = samples[i.saturating_sub(1)].0;
        let next = samples[(i + 1).min(samples.len() - 1)].0;
        let normal = unit_normal(next - prev);
        let offset = normal * options.radius(pressure);

        let l = point + offset;
        let r = point - offset;
        let is_last = i == samples.len() - 1;
        let far_enough = left
            .last()
            .is_none_or(|last| (l - *last).hypot2() >= min_spacing_sq);
        if far_enough || is_last {
            left.push(l);
            right.push(r);
        }
    }

    let (last, last_pressure) = samples[samples.len() - 1];
    let end_dir = direction(&samples, samples.len() - 1);
    let start_dir = direction(&samples, 0);

    let mut outline = left;
    outline.extend(cap(last, options.radius(last_pressure), end_dir));
    outline.extend(right.into_iter().rev());
    outline.extend(cap(first, options.radius(first_pressure), -start_dir));
    outline
}

/// Convert an outline polygon into a closed path of quadratic segments
/// through the midpoints of consecutive outline points.
pub fn outline_to_path(outline: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let Some(&start) = outline.first() else {
        return path;
    };

    path.move_to(start);
    let len = outline.len();
    for i in 0..len {
        let control = outline[i];
        let next = outline[(i + 1) % len];
        path.quad_to(control, control.midpoint(next));
    }
    path.close_path();
    path
}

/// Pull each sample towards the previous one and drop samples that no longer move.
fn streamline(points: &[PenPoint], options: &StrokeOptions) -> Vec<(Point, f64)> {
    let t = 0.15 + (1.0 - options.streamline.clamp(0.0, 1.0)) * 0.85;
    let mut out: Vec<(Point, f64)> = Vec::with_capacity(points.len());

    for pen in points {
        let target = pen.point();
        match out.last() {
            None => out.push((target, pen.pressure)),
            Some(&(prev, _)) => {
                let next = prev.lerp(target, t);
                if (next - prev).hypot2() > f64::EPSILON {
                    out.push((next, pen.pressure));
                }
            }
        }
    }

    // Always end on the real last sample so the stroke reaches the pen.
    if let (Some(last_pen), Some(&(last, _))) = (points.last(), out.last()) {
        if points.len() > 1 && (last_pen.point() - last).hypot2() > f64::EPSILON {
            out.push((last_pen.point(), last_pen.pressure));
        }
    }

    out
}

fn direction(samples: &[(Point, f64)], i: usize) -> Vec2 {
    let prev = samples[i.saturating_sub(1)].0;
    let next = samples[(i + 1).min(samples.len() - 1)].0;
    let d = next - prev;
    let len = d.hypot();
    if len < f64::EPSILON {
        Vec2::new(1.0, 0.0)
    } else {
        d / len
    }
}

fn unit_normal(d: Vec2) -> Vec2 {
    let len = d.hypot();
    if len < f64::EPSILON {
        Vec2::new(0.0, 1.0)
    } else {
        Vec2::new(-d.y / len, d.x / len)
    }
}

/// Half circle around `center` bulging towards `forward`, from the left side to the right side.
fn cap(center: Point, radius: f64, forward: Vec2) -> Vec<Point> {
    let base = forward.y.atan2(forward.x) + PI / 2.0;
    (1..CAP_SEGMENTS)
        .map(|i| {
            let angle = base - PI * i as f64 / CAP_SEGMENTS as f64;
            center + Vec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

fn circle(center: Point, radius: f64) -> Vec<Point> {
    (0..CAP_SEGMENTS * 2)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / (CAP_SEGMENTS * 2) as f64;
            center + Vec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

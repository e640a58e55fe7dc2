//! Tunable board parameters.
//!
//! Every field has a default, so an empty JSON object yields the stock
//! behaviour:
//!
//! ```json
//! { "max_layers": 100, "stroke": { "size": 12 } }
//! ```

use crate::color::Color;
use crate::layers::StrokeOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of layers in a document.
pub const MAX_LAYERS: usize = 100;
/// Width and height of freshly inserted shapes.
pub const DEFAULT_LAYER_SIZE: f64 = 100.0;
/// Manhattan distance a press must travel before it becomes a selection net.
pub const SELECTION_NET_THRESHOLD: f64 = 5.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Board behaviour parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Insertions are rejected once the document holds this many layers.
    pub max_layers: usize,
    /// Side length of shapes created by the insert tool.
    pub default_layer_size: f64,
    /// Drag distance before a press turns into a selection net.
    pub selection_net_threshold: f64,
    /// Oldest undo batches are dropped past this depth.
    pub max_undo_steps: usize,
    /// Tolerance used to simplify freehand drafts before they are stored.
    pub simplify_tolerance: f64,
    /// Tool color before the user picks one.
    pub default_color: Color,
    pub stroke: StrokeOptions,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            max_layers: MAX_LAYERS,
            default_layer_size: DEFAULT_LAYER_SIZE,
            selection_net_threshold: SELECTION_NET_THRESHOLD,
            max_undo_steps: 100,
            simplify_tolerance: 0.5,
            default_color: Color::black(),
            stroke: StrokeOptions::default(),
        }
    }
}

impl BoardConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BoardConfig = serde_json::from_str(json)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Check parameter ranges. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_layers == 0 {
            errors.push("max_layers must be at least 1".to_string());
        }
        if !(self.default_layer_size >= 0.0) {
            errors.push(format!(
                "default_layer_size must be non-negative, got {}",
                self.default_layer_size
            ));
        }
        if !(self.selection_net_threshold >= 0.0) {
            errors.push(format!(
                "selection_net_threshold must be non-negative, got {}",
                self.selection_net_threshold
            ));
        }
        if !(self.simplify_tolerance >= 0.0) {
            errors.push(format!(
                "simplify_tolerance must be non-negative, got {}",
                self.simplify_tolerance
            ));
        }
        if !(self.stroke.size > 0.0) {
            errors.push(format!("stroke.size must be positive, got {}", self.stroke.size));
        }
        for (name, value) in [
            ("thinning", self.stroke.thinning),
            ("smoothing", self.stroke.smoothing),
            ("streamline", self.stroke.streamline),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("stroke.{name} must be in [0, 1], got {value}"));
            }
        }

        errors
    }
}

/// Where and how to reach the handwriting recognition service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Full URL of the calculate endpoint.
    pub endpoint: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8900/calculate".to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

//! CRDT substrate using Loro for collaborative editing.
//!
//! # Schema
//!
//! ```text
//! LoroDoc
//! ├── "layers": LoroMap<LayerId, LoroMap> (layer records)
//! └── "layerIds": LoroMovableList<String> (layer ids, back to front)
//! ```
//!
//! Each layer record is a LoroMap with:
//! - "type": String ("rectangle", "ellipse", "text", "note", "path")
//! - "x", "y", "width", "height": f64
//! - "fill_r", "fill_g", "fill_b": i64
//! - "value": String (text and note layers, optional)
//! - "points": LoroList of `[x, y, pressure]` lists (path layers)

mod convert;
mod schema;

pub use convert::{layer_from_loro, layer_to_loro, patch_to_loro};
pub use schema::{LAYER_IDS_KEY, LAYERS_KEY, LoroStore};

pub use loro::{ExportMode, VersionVector};

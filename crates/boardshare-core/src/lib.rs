//! BoardShare Core Library
//!
//! Platform-agnostic document model, undo history, presence and pointer
//! state machine for the BoardShare collaborative whiteboard.

pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod color;
pub mod config;
pub mod crdt;
pub mod document;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod layers;
pub mod presence;
pub mod recognition;
pub mod selection;
pub mod store;
pub mod sync;

pub use camera::Camera;
pub use canvas::{Canvas, CanvasMode, CanvasState};
pub use collaboration::CollaborationManager;
pub use color::Color;
pub use config::{BoardConfig, ConfigError, MAX_LAYERS, RecognitionConfig};
pub use crdt::LoroStore;
pub use document::Board;
pub use error::{BoardError, BoardResult};
pub use geometry::{Bounds, Side};
pub use history::{Change, History, PauseGuard};
pub use input::{KeyInput, Modifiers, PointerInput, Shortcut, WheelInput};
pub use layers::{Layer, LayerId, LayerPatch, LayerPayload, LayerType, PenPoint, ShapeKind};
pub use presence::{ConnectionId, Presence, PresenceStore};
pub use recognition::{RecognitionClient, RecognitionError, RecognitionSession};
pub use store::{MemoryStore, SharedStore, StoreError};
pub use sync::{ClientMessage, ConnectionState, ServerMessage, SyncEvent};

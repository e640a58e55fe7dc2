//! Pointer and keyboard input types.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Bit set in [`PointerInput::buttons`] while the primary button is held.
pub const PRIMARY_BUTTON: u8 = 1;
/// Pressure reported by devices without pressure sensing.
pub const DEFAULT_PRESSURE: f64 = 0.5;

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// One pointer sample in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub position: Point,
    /// Pen pressure in `0..=1`.
    pub pressure: f64,
    /// Bitmask of held buttons, primary = 1.
    pub buttons: u8,
}

impl PointerInput {
    /// A pointer sample with the primary button held.
    pub fn new(position: Point) -> Self {
        Self {
            position,
            pressure: DEFAULT_PRESSURE,
            buttons: PRIMARY_BUTTON,
        }
    }

    /// A hover sample with no button held.
    pub fn hover(position: Point) -> Self {
        Self {
            buttons: 0,
            ..Self::new(position)
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_buttons(mut self, buttons: u8) -> Self {
        self.buttons = buttons;
        self
    }

    /// Whether exactly the primary button is held.
    pub fn is_primary_only(&self) -> bool {
        self.buttons == PRIMARY_BUTTON
    }
}

/// A scroll sample in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelInput {
    pub delta: Vec2,
}

/// Keyboard event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }
}

/// Board-level keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
}

impl Shortcut {
    /// Map a key press to a shortcut. `z` matches regardless of case because
    /// Shift turns it into `Z` on most keyboards.
    pub fn from_key(input: &KeyInput) -> Option<Shortcut> {
        if !input.modifiers.command() || !input.key.eq_ignore_ascii_case("z") {
            return None;
        }
        if input.modifiers.shift {
            Some(Shortcut::Redo)
        } else {
            Some(Shortcut::Undo)
        }
    }
}

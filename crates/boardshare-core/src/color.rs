//! Fill colors and participant tinting.

use peniko::Color as PenikoColor;
use serde::{Deserialize, Serialize};

/// An opaque 8-bit RGB color, as stored on layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Encode as a CSS hex string (`#rrggbb`).
    pub fn to_css(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse a CSS hex string. Accepts `#rrggbb` and `#rgb`.
    pub fn from_css(css: &str) -> Option<Self> {
        let hex = css.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            6 => Some(Self::new(
                u8::from_str_radix(&hex[0..2], 16).ok()?,
                u8::from_str_radix(&hex[2..4], 16).ok()?,
                u8::from_str_radix(&hex[4..6], 16).ok()?,
            )),
            3 => {
                let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
                Some(Self::new(digit(0)?, digit(1)?, digit(2)?))
            }
            _ => None,
        }
    }
}

impl From<Color> for PenikoColor {
    fn from(color: Color) -> Self {
        PenikoColor::from_rgba8(color.r, color.g, color.b, 255)
    }
}

impl From<PenikoColor> for Color {
    fn from(color: PenikoColor) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b)
    }
}

/// Palette used to tint remote cursors and selections.
pub const PARTICIPANT_COLORS: [Color; 5] = [
    Color::new(0xDC, 0x26, 0x26),
    Color::new(0xD9, 0x77, 0x06),
    Color::new(0x05, 0x96, 0x69),
    Color::new(0x7C, 0x3A, 0xED),
    Color::new(0xDB, 0x27, 0x77),
];

/// Stable color for a connection, used for its cursor and selection outline.
pub fn connection_id_to_color(connection_id: u64) -> Color {
    PARTICIPANT_COLORS[(connection_id % PARTICIPANT_COLORS.len() as u64) as usize]
}

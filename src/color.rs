//! Stable class → color assignment.
//!
//! Colors are handed out from a fixed palette in order of first appearance
//! and never reassigned. Once the number of distinct labels exceeds the
//! palette size, colors repeat (label `n` shares the color of label
//! `n % palette.len()`).

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::fmt;

/// Default palette, in assignment order.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#FF3838", "#FF9D42", "#00C2FF", "#00D5A3", "#8B5CF6", "#EC4899", "#FBBF24", "#34D399",
    "#60A5FA", "#A78BFA",
];

/// Opaque RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(anyhow!("invalid color '{}': expected #RRGGBB", hex));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| anyhow!("invalid color '{}': expected #RRGGBB", hex))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 255])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Append-only label → color map owned by one viewer session.
#[derive(Clone, Debug)]
pub struct ColorAssignment {
    palette: Vec<Color>,
    assigned: HashMap<String, Color>,
    order: Vec<String>,
}

impl ColorAssignment {
    pub fn new() -> Self {
        Self::with_palette(default_palette())
    }

    /// Use a custom palette. An empty palette falls back to the default one.
    pub fn with_palette(palette: Vec<Color>) -> Self {
        let palette = if palette.is_empty() {
            default_palette()
        } else {
            palette
        };
        Self {
            palette,
            assigned: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Parse a palette of hex strings.
    pub fn from_hex_palette<S: AsRef<str>>(palette: &[S]) -> Result<Self> {
        let colors = palette
            .iter()
            .map(|hex| Color::from_hex(hex.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_palette(colors))
    }

    /// Color for `label`, assigning the next palette entry on first sight.
    pub fn color_for(&mut self, label: &str) -> Color {
        if let Some(color) = self.assigned.get(label) {
            return *color;
        }
        let color = self.palette[self.order.len() % self.palette.len()];
        self.assigned.insert(label.to_string(), color);
        self.order.push(label.to_string());
        color
    }

    /// Read-only lookup; `None` for labels never drawn.
    pub fn get(&self, label: &str) -> Option<Color> {
        self.assigned.get(label).copied()
    }

    /// Labels in order of first appearance.
    pub fn labels(&self) -> &[String] {
        &self.order
    }

    pub fn palette_len(&self) -> usize {
        self.palette.len()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ColorAssignment {
    fn default() -> Self {
        Self::new()
    }
}

fn default_palette() -> Vec<Color> {
    DEFAULT_PALETTE
        .iter()
        .filter_map(|hex| Color::from_hex(hex).ok())
        .collect()
}

//! RGB color with exact 24-bit hex conversion
//!
//! Colors are stored as floats in `[0, 1]` exactly as written in hex (no
//! gamma conversion), which keeps `"#rrggbb"` → [`Color`] → `"#rrggbb"`
//! lossless.

use std::fmt;

/// An opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from a packed `0xRRGGBB` value
    pub fn from_hex_u32(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Parses `#rrggbb`, `0xrrggbb` or bare `rrggbb`
    pub fn from_hex(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        u32::from_str_radix(digits, 16).ok().map(Self::from_hex_u32)
    }

    /// Packs the color into `0xRRGGBB`, rounding each channel to 8 bits
    pub fn to_hex_u32(&self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Formats the color as lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:06x}", self.to_hex_u32())
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn from_array(rgb: [f32; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }

    pub fn to_wgpu(&self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: 1.0,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        for text in ["#1e4d40", "#ded5ca", "#beaaa3", "#000000", "#ffffff"] {
            let color = Color::from_hex(text).unwrap();
            assert_eq!(color.to_hex(), text);
        }
    }

    #[test]
    fn test_every_channel_value_survives() {
        for v in 0..=255u32 {
            let packed = (v << 16) | ((255 - v) << 8) | (v / 2);
            assert_eq!(Color::from_hex_u32(packed).to_hex_u32(), packed);
        }
    }

    #[test]
    fn test_prefix_variants() {
        let expected = Color::from_hex_u32(0x1e4d40);
        assert_eq!(Color::from_hex("0x1e4d40"), Some(expected));
        assert_eq!(Color::from_hex("1E4D40"), Some(expected));
    }

    #[test]
    fn test_rejects_malformed_hex() {
        assert_eq!(Color::from_hex("#1e4d4"), None);
        assert_eq!(Color::from_hex("#1e4d4g"), None);
        assert_eq!(Color::from_hex(""), None);
        assert_eq!(Color::from_hex("#+1e4d4"), None);
    }
}

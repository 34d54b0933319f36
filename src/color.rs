use std::fmt;

/// Straight (non-premultiplied) RGBA colour. Channels are 0..255, alpha is 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0.0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parses `#RRGGBB` (leading `#` optional). Anything else yields `None`.
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let h = hex.trim();
        let h = h.strip_prefix('#').unwrap_or(h);
        if h.len() != 6 || !h.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&h[0..2], 16).ok()?;
        let g = u8::from_str_radix(&h[2..4], 16).ok()?;
        let b = u8::from_str_radix(&h[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }

    pub fn hex_with_alpha(hex: &str, alpha: f32) -> Option<Self> {
        Self::parse_hex(hex).map(|c| c.with_alpha(alpha))
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: unit(alpha),
            ..self
        }
    }

    /// Multiplies the existing alpha, the way a global alpha applies to a stroke colour.
    pub fn fade(self, factor: f32) -> Self {
        Self {
            a: unit(self.a * factor),
            ..self
        }
    }

    /// Linear interpolation towards `other`; `t` is clamped to 0..1.
    pub fn mix(self, other: Self, t: f32) -> Self {
        let t = unit(t);
        let lerp = |a: u8, b: u8| (a as f32 * (1.0 - t) + b as f32 * t).round().clamp(0.0, 255.0) as u8;
        Self {
            r: lerp(self.r, other.r),
            g: lerp(self.g, other.g),
            b: lerp(self.b, other.b),
            a: self.a * (1.0 - t) + other.a * t,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }
}

/// Clamps into 0..1, mapping NaN to 0.
pub fn unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

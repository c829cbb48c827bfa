/// 8-bit RGB color with a small predefined palette.
use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);
    pub const YELLOW: Color = Color::new(255, 255, 0);
    pub const CYAN: Color = Color::new(0, 255, 255);
    pub const MAGENTA: Color = Color::new(255, 0, 255);
    pub const GRAY: Color = Color::new(128, 128, 128);
    pub const ORANGE: Color = Color::new(255, 165, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as floats in [0, 255].
    #[inline]
    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.r as f64, self.g as f64, self.b as f64)
    }

    /// Channels normalized to [0, 1].
    #[inline]
    pub fn to_unit(self) -> DVec3 {
        self.to_dvec3() / 255.0
    }

    /// Build from channels in [0, 255]; out-of-range and NaN values clamp.
    #[inline]
    pub fn from_dvec3(v: DVec3) -> Self {
        Self {
            r: clamp_channel(v.x),
            g: clamp_channel(v.y),
            b: clamp_channel(v.z),
        }
    }

    /// Build from channels in [0, 1].
    #[inline]
    pub fn from_unit(v: DVec3) -> Self {
        Self::from_dvec3(v * 255.0)
    }

    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        Self::from_dvec3(self.to_dvec3() * factor)
    }

    /// Saturating per-channel sum.
    #[inline]
    pub fn add(self, other: Color) -> Self {
        Self {
            r: self.r.saturating_add(other.r),
            g: self.g.saturating_add(other.g),
            b: self.b.saturating_add(other.b),
        }
    }

    #[inline]
    pub fn lerp(self, other: Color, t: f64) -> Self {
        let a = self.to_dvec3();
        Self::from_dvec3(a + (other.to_dvec3() - a) * t)
    }

    /// Perceived brightness in [0, 1] (Rec. 601 weights).
    #[inline]
    pub fn luminance(self) -> f64 {
        (0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64) / 255.0
    }

    /// Pack into 0xAARRGGBB with opaque alpha.
    #[inline]
    pub const fn to_argb(self) -> u32 {
        0xFF000000 | ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }

    #[inline]
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            r: ((argb >> 16) & 0xFF) as u8,
            g: ((argb >> 8) & 0xFF) as u8,
            b: (argb & 0xFF) as u8,
        }
    }
}

#[inline]
fn clamp_channel(v: f64) -> u8 {
    if v.is_nan() {
        0
    } else {
        v.round().clamp(0.0, 255.0) as u8
    }
}

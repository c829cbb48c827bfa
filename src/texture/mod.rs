/// Immutable RGB textures with nearest/bilinear sampling and
/// repeat/clamp/mirror addressing, plus mipmap chains and
/// procedural generators.
pub mod color;
pub mod mipmap;
pub mod procedural;

pub use color::Color;
pub use mipmap::MipmapChain;

use crate::error::{RenderError, Result};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Nearest texel (pixelated).
    Nearest,
    /// Weighted average of the four nearest texels.
    #[default]
    Bilinear,
}

/// Addressing mode for coordinates outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

impl WrapMode {
    /// Map an integer texel index into [0, size).
    #[inline]
    pub fn apply(self, index: i64, size: usize) -> usize {
        let size_i = size as i64;
        match self {
            WrapMode::Repeat => index.rem_euclid(size_i) as usize,
            WrapMode::Clamp => index.clamp(0, size_i - 1) as usize,
            WrapMode::Mirror => {
                let period = 2 * size_i;
                let m = index.rem_euclid(period);
                if m >= size_i {
                    (period - 1 - m) as usize
                } else {
                    m as usize
                }
            }
        }
    }
}

/// A dense row-major RGB image. Row 0 is the top of the image and
/// texture coordinate (0, 0) addresses its top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: usize,
    height: usize,
    pixels: Vec<Color>,
}

impl Texture {
    pub fn new(width: usize, height: usize, pixels: Vec<Color>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::invalid_asset(
                "texture",
                format!("zero-sized texture {}x{}", width, height),
            ));
        }
        if pixels.len() != width * height {
            return Err(RenderError::invalid_asset(
                "texture",
                format!(
                    "expected {} pixels for {}x{}, got {}",
                    width * height,
                    width,
                    height,
                    pixels.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A texture filled with one color.
    pub fn solid(width: usize, height: usize, color: Color) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Build from a generator called once per texel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Color) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Texel at integer coordinates, or `None` when out of range.
    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    #[inline]
    fn texel(&self, x: i64, y: i64, wrap: WrapMode) -> Color {
        let xi = wrap.apply(x, self.width);
        let yi = wrap.apply(y, self.height);
        self.pixels[yi * self.width + xi]
    }

    /// Sample at (u, v) with the given filter and addressing mode.
    /// Non-finite coordinates sample the first texel.
    pub fn sample(&self, u: f64, v: f64, filter: FilterMode, wrap: WrapMode) -> Color {
        let (u, v) = if u.is_finite() && v.is_finite() {
            (u, v)
        } else {
            (0.0, 0.0)
        };
        match filter {
            FilterMode::Nearest => self.sample_nearest(u, v, wrap),
            FilterMode::Bilinear => self.sample_bilinear(u, v, wrap),
        }
    }

    #[inline]
    pub fn sample_nearest(&self, u: f64, v: f64, wrap: WrapMode) -> Color {
        let x = (u * self.width as f64).floor() as i64;
        let y = (v * self.height as f64).floor() as i64;
        self.texel(x, y, wrap)
    }

    pub fn sample_bilinear(&self, u: f64, v: f64, wrap: WrapMode) -> Color {
        // Texel centers sit at (i + 0.5) / size.
        let fx = u * self.width as f64 - 0.5;
        let fy = v * self.height as f64 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let x0 = x0 as i64;
        let y0 = y0 as i64;

        let c00 = self.texel(x0, y0, wrap).to_dvec3();
        let c10 = self.texel(x0 + 1, y0, wrap).to_dvec3();
        let c01 = self.texel(x0, y0 + 1, wrap).to_dvec3();
        let c11 = self.texel(x0 + 1, y0 + 1, wrap).to_dvec3();

        let top = c00 + (c10 - c00) * tx;
        let bottom = c01 + (c11 - c01) * tx;
        Color::from_dvec3(top + (bottom - top) * ty)
    }

    /// Sample and return channels normalized to [0, 1].
    #[inline]
    pub fn sample_unit(&self, u: f64, v: f64, filter: FilterMode, wrap: WrapMode) -> DVec3 {
        self.sample(u, v, filter, wrap).to_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Texture {
        Texture::new(
            2,
            2,
            vec![Color::RED, Color::GREEN, Color::BLUE, Color::WHITE],
        )
        .unwrap()
    }

    #[test]
    fn rejects_wrong_pixel_count() {
        assert!(Texture::new(2, 2, vec![Color::RED; 3]).is_err());
        assert!(Texture::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn nearest_addresses_corners() {
        let t = two_by_two();
        assert_eq!(t.sample(0.1, 0.1, FilterMode::Nearest, WrapMode::Clamp), Color::RED);
        assert_eq!(t.sample(0.9, 0.1, FilterMode::Nearest, WrapMode::Clamp), Color::GREEN);
        assert_eq!(t.sample(0.1, 0.9, FilterMode::Nearest, WrapMode::Clamp), Color::BLUE);
        assert_eq!(t.sample(0.9, 0.9, FilterMode::Nearest, WrapMode::Clamp), Color::WHITE);
    }

    #[test]
    fn wrap_modes_outside_unit_square() {
        let t = two_by_two();
        // u = 1.1 -> texel 2: repeat -> 0, clamp -> 1, mirror -> 1
        assert_eq!(t.sample(1.1, 0.1, FilterMode::Nearest, WrapMode::Repeat), Color::RED);
        assert_eq!(t.sample(1.1, 0.1, FilterMode::Nearest, WrapMode::Clamp), Color::GREEN);
        assert_eq!(t.sample(1.1, 0.1, FilterMode::Nearest, WrapMode::Mirror), Color::GREEN);
        // u = -0.1 -> texel -1: repeat -> 1, clamp -> 0, mirror -> 0
        assert_eq!(t.sample(-0.1, 0.1, FilterMode::Nearest, WrapMode::Repeat), Color::GREEN);
        assert_eq!(t.sample(-0.1, 0.1, FilterMode::Nearest, WrapMode::Clamp), Color::RED);
        assert_eq!(t.sample(-0.1, 0.1, FilterMode::Nearest, WrapMode::Mirror), Color::RED);
    }

    #[test]
    fn mirror_index_sequence() {
        let seq: Vec<usize> = (-4..8).map(|i| WrapMode::Mirror.apply(i, 3)).collect();
        assert_eq!(seq, vec![2, 2, 1, 0, 0, 1, 2, 2, 1, 0, 0, 1]);
    }

    #[test]
    fn bilinear_blends_between_texels() {
        let t = Texture::new(2, 1, vec![Color::BLACK, Color::WHITE]).unwrap();
        let mid = t.sample(0.5, 0.5, FilterMode::Bilinear, WrapMode::Clamp);
        assert!((mid.r as i32 - 128).abs() <= 1, "got {:?}", mid);
        // At a texel center the bilinear result equals that texel.
        let left = t.sample(0.25, 0.5, FilterMode::Bilinear, WrapMode::Clamp);
        assert_eq!(left, Color::BLACK);
    }
}

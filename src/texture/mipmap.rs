/// Mipmap chain: level 0 is the source texture, each following level
/// halves both dimensions (never below 1) until a 1x1 level is reached.
use super::{Color, FilterMode, Texture, WrapMode};
use glam::DVec3;

#[derive(Debug, Clone)]
pub struct MipmapChain {
    levels: Vec<Texture>,
}

impl MipmapChain {
    pub fn new(base: Texture) -> Self {
        let mut levels = vec![base];
        loop {
            let prev = &levels[levels.len() - 1];
            if prev.width() == 1 && prev.height() == 1 {
                break;
            }
            let next = downsample(prev);
            levels.push(next);
        }
        Self { levels }
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Level `index`, clamped to the smallest level.
    #[inline]
    pub fn level(&self, index: usize) -> &Texture {
        &self.levels[index.min(self.levels.len() - 1)]
    }

    #[inline]
    pub fn base(&self) -> &Texture {
        &self.levels[0]
    }

    /// Sample with a fractional level of detail, blending the two
    /// nearest levels (trilinear when `filter` is bilinear).
    pub fn sample(&self, u: f64, v: f64, lod: f64, filter: FilterMode, wrap: WrapMode) -> Color {
        let max_level = (self.levels.len() - 1) as f64;
        let lod = if lod.is_finite() { lod.clamp(0.0, max_level) } else { 0.0 };
        let lo = lod.floor() as usize;
        let hi = (lo + 1).min(self.levels.len() - 1);
        let t = lod - lo as f64;

        let a = self.levels[lo].sample(u, v, filter, wrap);
        if t <= 0.0 || lo == hi {
            return a;
        }
        let b = self.levels[hi].sample(u, v, filter, wrap);
        a.lerp(b, t)
    }

    /// Level of detail for a screen-space footprint of `texels_per_pixel`
    /// base-level texels.
    #[inline]
    pub fn lod_for_footprint(texels_per_pixel: f64) -> f64 {
        if texels_per_pixel <= 1.0 || !texels_per_pixel.is_finite() {
            0.0
        } else {
            texels_per_pixel.log2()
        }
    }
}

/// 2x2 box filter; odd edges reuse the last row/column.
fn downsample(src: &Texture) -> Texture {
    let w = (src.width() / 2).max(1);
    let h = (src.height() / 2).max(1);
    Texture::from_fn(w, h, |x, y| {
        let sx = x * 2;
        let sy = y * 2;
        let sx1 = (sx + 1).min(src.width() - 1);
        let sy1 = (sy + 1).min(src.height() - 1);
        let mut acc = DVec3::ZERO;
        for (px, py) in [(sx, sy), (sx1, sy), (sx, sy1), (sx1, sy1)] {
            if let Some(c) = src.get_pixel(px, py) {
                acc += c.to_dvec3();
            }
        }
        Color::from_dvec3(acc / 4.0)
    })
}

/// Procedural texture generators.
use super::{Color, Texture};
use noise::{NoiseFn, Perlin};

/// Checkerboard with square cells of `cell` texels.
pub fn checkerboard(width: usize, height: usize, cell: usize, a: Color, b: Color) -> Texture {
    let cell = cell.max(1);
    Texture::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            a
        } else {
            b
        }
    })
}

/// Horizontal gradient from `left` to `right`.
pub fn gradient(width: usize, height: usize, left: Color, right: Color) -> Texture {
    let denom = (width.max(2) - 1) as f64;
    Texture::from_fn(width, height, |x, _| left.lerp(right, x as f64 / denom))
}

/// Perlin noise blended between `dark` and `light`.
/// `scale` is the noise frequency in cycles per texel.
pub fn perlin_noise(
    width: usize,
    height: usize,
    scale: f64,
    seed: u32,
    dark: Color,
    light: Color,
) -> Texture {
    let perlin = Perlin::new(seed);
    Texture::from_fn(width, height, |x, y| {
        let n = perlin.get([x as f64 * scale, y as f64 * scale]);
        // Perlin output lies roughly in [-1, 1].
        let t = ((n + 1.0) * 0.5).clamp(0.0, 1.0);
        dark.lerp(light, t)
    })
}

/// Tangent-space normal map of a flat surface, (128, 128, 255) everywhere.
pub fn flat_normal_map(width: usize, height: usize) -> Texture {
    Texture::solid(width, height, Color::new(128, 128, 255))
}

//! Texture decoding through the `image` crate.

use crate::error::{RenderError, Result};
use crate::texture::{Color, Texture};
use std::path::Path;

/// Decode an image file into an RGB texture. Alpha is discarded.
pub fn load_texture(path: impl AsRef<Path>) -> Result<Texture> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RenderError::not_found(path));
    }
    let img = image::open(path).map_err(|err| match err {
        image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            RenderError::not_found(path)
        }
        image::ImageError::IoError(io) => RenderError::Io(io),
        other => RenderError::invalid_asset(path.display().to_string(), other.to_string()),
    })?;
    let texture = from_image(img)?;
    log::debug!(
        "loaded texture {} ({}x{})",
        path.display(),
        texture.width(),
        texture.height()
    );
    Ok(texture)
}

/// Decode an in-memory encoded image.
pub fn texture_from_bytes(bytes: &[u8], source_name: &str) -> Result<Texture> {
    let img = image::load_from_memory(bytes)
        .map_err(|err| RenderError::invalid_asset(source_name, err.to_string()))?;
    from_image(img)
}

fn from_image(img: image::DynamicImage) -> Result<Texture> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = rgb.pixels().map(|p| Color::new(p[0], p[1], p[2])).collect();
    Texture::new(width as usize, height as usize, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = load_texture("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, RenderError::ResourceNotFound { .. }));
    }

    #[test]
    fn garbage_bytes_are_invalid() {
        let err = texture_from_bytes(b"not an image", "junk").unwrap_err();
        assert!(matches!(err, RenderError::InvalidAsset { .. }));
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let mut img = image::RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let tex = texture_from_bytes(&bytes, "mem.png").unwrap();
        assert_eq!((tex.width(), tex.height()), (2, 1));
        assert_eq!(tex.get_pixel(0, 0), Some(Color::RED));
        assert_eq!(tex.get_pixel(1, 0), Some(Color::BLUE));
    }
}

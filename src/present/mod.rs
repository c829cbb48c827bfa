//! Presentation backends: consumers of a finished [`Framebuffer`].

use crate::error::{RenderError, Result};
use crate::rendering::Framebuffer;
use std::io::Write;
use std::path::PathBuf;

/// Brightness ramp for colorless output, darkest first.
pub const SHADING_RAMP: &[u8] = b" .:-=+*#@";

pub trait PresentBackend {
    fn present(&mut self, framebuffer: &Framebuffer) -> Result<()>;
}

fn ensure_presentable(framebuffer: &Framebuffer) -> Result<()> {
    if framebuffer.width == 0 || framebuffer.height == 0 {
        return Err(RenderError::InvalidConfiguration(format!(
            "cannot present a {}x{} framebuffer",
            framebuffer.width, framebuffer.height
        )));
    }
    Ok(())
}

/// Character for a luminance in [0, 1].
pub fn ramp_char(luminance: f64) -> char {
    let last = SHADING_RAMP.len() - 1;
    let i = (luminance.clamp(0.0, 1.0) * last as f64).round() as usize;
    SHADING_RAMP[i.min(last)] as char
}

/// Writes frames to a terminal as ANSI escapes, one text row per pixel row.
///
/// With color on, each pixel is a space on a 24-bit background; with color
/// off, it is a character from [`SHADING_RAMP`].
pub struct TerminalBackend<W: Write> {
    out: W,
    color: bool,
    /// Move the cursor home before each frame instead of scrolling.
    home_cursor: bool,
}

impl<W: Write> TerminalBackend<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            color: true,
            home_cursor: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_home_cursor(mut self, home: bool) -> Self {
        self.home_cursor = home;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PresentBackend for TerminalBackend<W> {
    fn present(&mut self, framebuffer: &Framebuffer) -> Result<()> {
        ensure_presentable(framebuffer)?;
        let mut buf = String::with_capacity(framebuffer.width * framebuffer.height * 20);
        if self.home_cursor {
            buf.push_str("\x1b[H");
        }
        for row in framebuffer.color_buffer.chunks_exact(framebuffer.width) {
            let mut last = None;
            for &c in row {
                if self.color {
                    // Consecutive pixels of one color share an escape.
                    if last != Some(c) {
                        buf.push_str(&format!("\x1b[48;2;{};{};{}m", c.r, c.g, c.b));
                        last = Some(c);
                    }
                    buf.push(' ');
                } else {
                    buf.push(ramp_char(c.luminance()));
                }
            }
            if self.color {
                buf.push_str("\x1b[0m");
            }
            buf.push('\n');
        }
        buf.push_str("\x1b[0m");
        self.out.write_all(buf.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Saves each frame as a numbered PNG under a directory.
pub struct ImageBackend {
    dir: PathBuf,
    prefix: String,
    frame: u64,
}

impl ImageBackend {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            frame: 0,
        }
    }

    /// Path the next frame will be written to.
    pub fn next_path(&self) -> PathBuf {
        self.dir.join(format!("{}{:05}.png", self.prefix, self.frame))
    }
}

impl PresentBackend for ImageBackend {
    fn present(&mut self, framebuffer: &Framebuffer) -> Result<()> {
        ensure_presentable(framebuffer)?;
        let path = self.next_path();
        let mut img = image::RgbImage::new(framebuffer.width as u32, framebuffer.height as u32);
        for (pixel, c) in img.pixels_mut().zip(&framebuffer.color_buffer) {
            *pixel = image::Rgb([c.r, c.g, c.b]);
        }
        img.save(&path).map_err(|err| match err {
            image::ImageError::IoError(io) => RenderError::Io(io),
            other => RenderError::invalid_asset(path.display().to_string(), other.to_string()),
        })?;
        log::trace!("wrote frame {}", path.display());
        self.frame += 1;
        Ok(())
    }
}

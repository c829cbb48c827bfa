/// Color and depth buffers the rasterizer writes into.
///
/// Buffers are stored as separate Vecs: the shadow pass and the depth
/// oracle in the tests only ever touch depth.
use crate::texture::Color;

/// View into a contiguous set of rows in the framebuffer.
/// Used for multi-core rasterization where each worker owns a disjoint slice.
pub struct FrameSlice<'a> {
    pub width: usize,
    pub full_height: usize,
    pub y0: usize,
    pub height: usize,
    pub color: &'a mut [Color],
    pub depth: &'a mut [f64],
}

impl<'a> FrameSlice<'a> {
    /// Depth test at (x, y_global). On success the depth is stored and the
    /// local color index returned; pixels outside the slice fail.
    #[inline]
    pub fn test_depth_and_get_index(&mut self, x: usize, y_global: usize, depth: f64) -> Option<usize> {
        if x >= self.width || y_global < self.y0 {
            return None;
        }
        let y_local = y_global - self.y0;
        if y_local >= self.height {
            return None;
        }

        let index = y_local * self.width + x;
        if depth < self.depth[index] {
            self.depth[index] = depth;
            Some(index)
        } else {
            None
        }
    }

    #[inline]
    pub fn write_color(&mut self, index: usize, color: Color) {
        self.color[index] = color;
    }

    /// Slice bounds: (x0, y0, x1, y1) in global framebuffer coordinates.
    #[inline]
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (0, self.y0, self.width, self.y0 + self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    /// Row-major, `width * height` entries.
    pub color_buffer: Vec<Color>,
    /// View-space depth per pixel; `f64::INFINITY` marks untouched pixels.
    pub depth_buffer: Vec<f64>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let pixel_count = width * height;
        Self {
            width,
            height,
            color_buffer: vec![Color::default(); pixel_count],
            depth_buffer: vec![f64::INFINITY; pixel_count],
        }
    }

    /// Clear color and depth buffers.
    pub fn clear(&mut self, clear_color: Color) {
        self.color_buffer.fill(clear_color);
        self.depth_buffer.fill(f64::INFINITY);
    }

    /// Reset depth only.
    pub fn clear_depth(&mut self) {
        self.depth_buffer.fill(f64::INFINITY);
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Set pixel with a strict depth test.
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color, depth: f64) -> bool {
        let Some(index) = self.index(x, y) else {
            return false;
        };
        if depth < self.depth_buffer[index] {
            self.color_buffer[index] = color;
            self.depth_buffer[index] = depth;
            true
        } else {
            false
        }
    }

    /// Set pixel without depth test.
    #[inline]
    pub fn set_pixel_no_depth(&mut self, x: usize, y: usize, color: Color) {
        if let Some(index) = self.index(x, y) {
            self.color_buffer[index] = color;
        }
    }

    #[inline]
    pub fn get_color(&self, x: usize, y: usize) -> Option<Color> {
        self.index(x, y).map(|i| self.color_buffer[i])
    }

    #[inline]
    pub fn get_depth(&self, x: usize, y: usize) -> Option<f64> {
        self.index(x, y).map(|i| self.depth_buffer[i])
    }

    /// Number of pixels whose depth is finite.
    pub fn covered_pixels(&self) -> usize {
        self.depth_buffer.iter().filter(|d| d.is_finite()).count()
    }

    /// Create a FrameSlice covering the entire framebuffer.
    pub fn as_full_slice_mut(&mut self) -> FrameSlice<'_> {
        FrameSlice {
            width: self.width,
            full_height: self.height,
            y0: 0,
            height: self.height,
            color: &mut self.color_buffer,
            depth: &mut self.depth_buffer,
        }
    }

    /// Resize and clear.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        let pixel_count = width * height;
        self.color_buffer.clear();
        self.color_buffer.resize(pixel_count, Color::default());
        self.depth_buffer.clear();
        self.depth_buffer.resize(pixel_count, f64::INFINITY);
    }

    /// Split the framebuffer into horizontal stripes for multi-core rendering.
    /// Each stripe owns a disjoint subset of rows, so they can be rendered in parallel.
    pub fn split_into_stripes(&mut self, stripes: usize) -> Vec<FrameSlice<'_>> {
        let stripes = stripes.max(1);
        let width = self.width;
        let height = self.height;

        let mut slices = Vec::with_capacity(stripes);

        let mut remaining_color: &mut [Color] = self.color_buffer.as_mut_slice();
        let mut remaining_depth: &mut [f64] = self.depth_buffer.as_mut_slice();

        let rows_per_stripe = height.div_ceil(stripes).max(1);
        let mut y0 = 0;
        while y0 < height {
            let rows = rows_per_stripe.min(height - y0);
            let (color, rest_color) = remaining_color.split_at_mut(rows * width);
            let (depth, rest_depth) = remaining_depth.split_at_mut(rows * width);
            remaining_color = rest_color;
            remaining_depth = rest_depth;
            slices.push(FrameSlice {
                width,
                full_height: height,
                y0,
                height: rows,
                color,
                depth,
            });
            y0 += rows;
        }

        slices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_framebuffer_is_empty() {
        let fb = Framebuffer::new(4, 3);
        assert_eq!(fb.color_buffer.len(), 12);
        assert!(fb.depth_buffer.iter().all(|d| *d == f64::INFINITY));
        assert_eq!(fb.covered_pixels(), 0);
    }

    #[test]
    fn set_pixel_is_depth_strict() {
        let mut fb = Framebuffer::new(2, 2);
        assert!(fb.set_pixel(1, 1, Color::RED, 5.0));
        assert!(!fb.set_pixel(1, 1, Color::GREEN, 5.0));
        assert!(fb.set_pixel(1, 1, Color::BLUE, 4.0));
        assert_eq!(fb.get_color(1, 1), Some(Color::BLUE));
        assert_eq!(fb.get_depth(1, 1), Some(4.0));
        assert!(!fb.set_pixel(2, 0, Color::RED, 1.0));
    }

    #[test]
    fn stripes_partition_rows() {
        let mut fb = Framebuffer::new(3, 10);
        let stripes = fb.split_into_stripes(4);
        assert_eq!(stripes.len(), 4);
        let rows: Vec<(usize, usize)> = stripes.iter().map(|s| (s.y0, s.height)).collect();
        assert_eq!(rows, vec![(0, 3), (3, 3), (6, 3), (9, 1)]);
        assert!(stripes.iter().all(|s| s.full_height == 10));
    }

    #[test]
    fn slice_rejects_foreign_rows() {
        let mut fb = Framebuffer::new(2, 4);
        let mut stripes = fb.split_into_stripes(2);
        let second = &mut stripes[1];
        assert!(second.test_depth_and_get_index(0, 1, 1.0).is_none());
        let idx = second.test_depth_and_get_index(1, 3, 1.0).unwrap();
        second.write_color(idx, Color::RED);
        drop(stripes);
        assert_eq!(fb.get_color(1, 3), Some(Color::RED));
    }

    #[test]
    fn clear_resets_both_buffers() {
        let mut fb = Framebuffer::new(2, 2);
        fb.set_pixel(0, 0, Color::RED, 1.0);
        fb.clear(Color::BLUE);
        assert_eq!(fb.get_color(0, 0), Some(Color::BLUE));
        assert_eq!(fb.get_depth(0, 0), Some(f64::INFINITY));
    }
}

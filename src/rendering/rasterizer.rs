/// Software rasterizer using the scanline algorithm.
///
/// Triangles are clipped against the near plane in view space, projected,
/// sorted by Y and walked as two halves along a long edge and a short
/// edge. Attributes are interpolated perspective-correctly as `a / z`
/// together with `1 / z`. Every write goes through a [`PixelTarget`], so
/// the same code fills a whole framebuffer or one stripe of it.
use super::clipper::{clip_line, clip_triangle, ClipVertex};
use super::framebuffer::{FrameSlice, Framebuffer};
use super::shading::{no_shadows, shade, Fragment, Lighting, ShadowLookup};
use crate::camera::Camera;
use crate::geometry::{face_normal, Mesh, Triangle};
use crate::material::Material;
use crate::math::{normal_matrix, safe_normalize, EPSILON};
use crate::perf::{RasterCounters, ScopeTimer};
use crate::texture::Color;
use glam::{DMat4, DVec2, DVec3};

/// Abstraction over a render target that supports depth-tested pixel writes.
pub trait PixelTarget {
    /// Full framebuffer width (stride for indexing).
    fn width(&self) -> usize;
    /// Full framebuffer height (used for NDC -> screen mapping).
    fn full_height(&self) -> usize;
    /// Rectangle covered by this target in framebuffer coordinates:
    /// (x0, y0, width, height).
    fn rect(&self) -> (usize, usize, usize, usize);
    /// Strict `<` depth test; on success stores `depth` and returns the
    /// index to pass to [`PixelTarget::write_color`].
    fn test_depth_and_get_index(&mut self, x: usize, y: usize, depth: f64) -> Option<usize>;
    fn write_color(&mut self, index: usize, color: Color);
}

impl<'a> PixelTarget for FrameSlice<'a> {
    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn full_height(&self) -> usize {
        self.full_height
    }

    #[inline]
    fn rect(&self) -> (usize, usize, usize, usize) {
        (0, self.y0, self.width, self.height)
    }

    #[inline]
    fn test_depth_and_get_index(&mut self, x: usize, y: usize, depth: f64) -> Option<usize> {
        FrameSlice::test_depth_and_get_index(self, x, y, depth)
    }

    #[inline]
    fn write_color(&mut self, index: usize, color: Color) {
        FrameSlice::write_color(self, index, color);
    }
}

impl PixelTarget for Framebuffer {
    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn full_height(&self) -> usize {
        self.height
    }

    #[inline]
    fn rect(&self) -> (usize, usize, usize, usize) {
        (0, 0, self.width, self.height)
    }

    #[inline]
    fn test_depth_and_get_index(&mut self, x: usize, y: usize, depth: f64) -> Option<usize> {
        let index = self.index(x, y)?;
        if depth < self.depth_buffer[index] {
            self.depth_buffer[index] = depth;
            Some(index)
        } else {
            None
        }
    }

    #[inline]
    fn write_color(&mut self, index: usize, color: Color) {
        self.color_buffer[index] = color;
    }
}

/// Pixel rectangle `[x0, x1) x [y0, y1)` a draw may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PixelRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelRect {
    /// Target rectangle intersected with the full framebuffer.
    pub(crate) fn of<T: PixelTarget + ?Sized>(target: &T) -> Self {
        let (x0, y0, w, h) = target.rect();
        Self {
            x0,
            y0,
            x1: (x0 + w).min(target.width()),
            y1: (y0 + h).min(target.full_height()),
        }
    }

    #[inline]
    pub(crate) fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x0 as i64 && x < self.x1 as i64 && y >= self.y0 as i64 && y < self.y1 as i64
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

/// Values interpolated linearly in screen space across a triangle.
pub(crate) trait Varying: Copy {
    fn lerp(&self, other: &Self, t: f64) -> Self;
}

impl Varying for f64 {
    #[inline]
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

/// Walk every pixel whose center lies inside the screen-space triangle,
/// clipped to `bounds`. Vertices are sorted by Y and the triangle is
/// split at the middle vertex into a top and a bottom half.
pub(crate) fn scan_triangle<V, F>(verts: [(DVec2, V); 3], bounds: PixelRect, mut visit: F)
where
    V: Varying,
    F: FnMut(usize, usize, V),
{
    if bounds.is_empty() {
        return;
    }
    let mut v = verts;
    v.sort_by(|a, b| a.0.y.total_cmp(&b.0.y));
    let [(p0, a0), (p1, a1), (p2, a2)] = v;

    let height = p2.y - p0.y;
    if !(height > EPSILON) {
        return;
    }

    let y_start = ((p0.y - 0.5).ceil() as i64).max(bounds.y0 as i64);
    let y_end = ((p2.y - 0.5).floor() as i64).min(bounds.y1 as i64 - 1);

    for y in y_start..=y_end {
        let yc = y as f64 + 0.5;

        let t_long = ((yc - p0.y) / height).clamp(0.0, 1.0);
        let long = (p0.x + (p2.x - p0.x) * t_long, a0.lerp(&a2, t_long));
        let short = if yc < p1.y {
            edge_at(p0, a0, p1, a1, yc)
        } else {
            edge_at(p1, a1, p2, a2, yc)
        };
        let ((lx, lv), (rx, rv)) = if long.0 <= short.0 {
            (long, short)
        } else {
            (short, long)
        };

        let x_start = ((lx - 0.5).ceil() as i64).max(bounds.x0 as i64);
        let x_end = ((rx - 0.5).floor() as i64).min(bounds.x1 as i64 - 1);
        let span = rx - lx;
        for x in x_start..=x_end {
            let t = if span > EPSILON {
                ((x as f64 + 0.5 - lx) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            visit(x as usize, y as usize, lv.lerp(&rv, t));
        }
    }
}

#[inline]
fn edge_at<V: Varying>(a: DVec2, va: V, b: DVec2, vb: V, yc: f64) -> (f64, V) {
    let dy = b.y - a.y;
    let t = if dy > EPSILON {
        ((yc - a.y) / dy).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (a.x + (b.x - a.x) * t, va.lerp(&vb, t))
}

/// Per-vertex values pre-divided by view depth.
#[derive(Debug, Clone, Copy)]
struct PerspectiveVarying {
    inv_z: f64,
    world: DVec3,
    uv: DVec2,
    normal: DVec3,
}

impl PerspectiveVarying {
    #[inline]
    fn from_clip(v: &ClipVertex, z: f64) -> Self {
        let inv_z = 1.0 / z;
        Self {
            inv_z,
            world: v.world * inv_z,
            uv: v.uv * inv_z,
            normal: v.normal * inv_z,
        }
    }
}

impl Varying for PerspectiveVarying {
    #[inline]
    fn lerp(&self, o: &Self, t: f64) -> Self {
        Self {
            inv_z: self.inv_z + (o.inv_z - self.inv_z) * t,
            world: self.world.lerp(o.world, t),
            uv: self.uv.lerp(o.uv, t),
            normal: self.normal.lerp(o.normal, t),
        }
    }
}

/// A world-space triangle ready to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTriangle {
    pub positions: [DVec3; 3],
    pub uvs: Option<[DVec2; 3]>,
    /// Smooth vertex normals; the face normal is used when absent.
    pub normals: Option<[DVec3; 3]>,
}

impl SurfaceTriangle {
    pub fn new(positions: [DVec3; 3]) -> Self {
        Self {
            positions,
            uvs: None,
            normals: None,
        }
    }

    /// Copy of `triangle` with its vertices moved by `world`.
    pub fn from_triangle(triangle: &Triangle, world: &DMat4) -> Self {
        Self {
            positions: triangle.vertices.map(|p| world.transform_point3(p)),
            uvs: triangle.uvs,
            normals: None,
        }
    }

    fn is_finite(&self) -> bool {
        self.positions.iter().all(|p| p.is_finite())
    }
}

/// Draws primitives for one camera and one set of lights.
///
/// The rasterizer holds only shared references, so one instance can be
/// used from several threads each owning a different stripe.
pub struct Rasterizer<'a> {
    camera: &'a Camera,
    lighting: Lighting<'a>,
    shadows: &'a (dyn ShadowLookup + Sync),
    backface_culling: bool,
}

impl<'a> Rasterizer<'a> {
    pub fn new(camera: &'a Camera, lighting: Lighting<'a>) -> Self {
        Self {
            camera,
            lighting,
            shadows: &no_shadows,
            backface_culling: true,
        }
    }

    pub fn with_shadows(mut self, shadows: &'a (dyn ShadowLookup + Sync)) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn with_backface_culling(mut self, enabled: bool) -> Self {
        self.backface_culling = enabled;
        self
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        self.camera
    }

    /// Draw every triangle of `mesh` placed by `model` (applied after the
    /// mesh's own translation). `weight` scales the output color.
    pub fn draw_mesh<T: PixelTarget>(
        &self,
        target: &mut T,
        mesh: &Mesh,
        model: &DMat4,
        weight: f64,
        counters: &mut RasterCounters,
    ) {
        let full = *model * DMat4::from_translation(mesh.position());
        let world: Vec<DVec3> = mesh
            .vertices()
            .iter()
            .map(|p| full.transform_point3(*p))
            .collect();
        let normals: Option<Vec<DVec3>> = mesh.has_normals().then(|| {
            let nm = normal_matrix(&full);
            mesh.normals().iter().map(|n| safe_normalize(nm * *n)).collect()
        });
        let uvs = mesh.has_uvs().then(|| mesh.uvs());

        for [a, b, c] in mesh.triangles() {
            let tri = SurfaceTriangle {
                positions: [world[a], world[b], world[c]],
                uvs: uvs.map(|t| [t[a], t[b], t[c]]),
                normals: normals.as_ref().map(|n| [n[a], n[b], n[c]]),
            };
            self.draw_triangle(target, &tri, mesh.material(), weight, counters);
        }
    }

    /// Cull, clip and fill one triangle. Returns whether any pixel was
    /// written.
    pub fn draw_triangle<T: PixelTarget>(
        &self,
        target: &mut T,
        tri: &SurfaceTriangle,
        material: &Material,
        weight: f64,
        counters: &mut RasterCounters,
    ) -> bool {
        if !tri.is_finite() {
            counters.triangles_skipped += 1;
            log::trace!("skipping triangle with non-finite vertex");
            return false;
        }
        let Some(mut face) = face_normal(&tri.positions) else {
            counters.triangles_skipped += 1;
            return false;
        };

        let centroid = (tri.positions[0] + tri.positions[1] + tri.positions[2]) / 3.0;
        let facing = face.dot(self.camera.view_direction(centroid));
        if facing < 0.0 {
            if self.backface_culling {
                counters.triangles_culled += 1;
                return false;
            }
            // Two-sided: shade the side the camera sees.
            face = -face;
        }

        if material.is_wireframe() {
            counters.triangles_rendered += 1;
            let color = material.wireframe_color().scale(weight);
            let [a, b, c] = tri.positions;
            let mut any = self.draw_line(target, a, b, color, counters);
            any |= self.draw_line(target, b, c, color, counters);
            any |= self.draw_line(target, c, a, color, counters);
            return any;
        }

        let flip = if facing < 0.0 { -1.0 } else { 1.0 };
        let clip_verts: [ClipVertex; 3] = std::array::from_fn(|i| ClipVertex {
            world: tri.positions[i],
            view: self.camera.view_space(tri.positions[i]),
            uv: tri.uvs.map_or(DVec2::ZERO, |uv| uv[i]),
            normal: tri.normals.map_or(face, |n| n[i] * flip),
        });

        let near = self.camera.near;
        let clipped = if clip_verts.iter().any(|v| v.view.z < near) {
            counters.triangles_clipped += 1;
            let timer = ScopeTimer::start();
            let clipped = clip_triangle(&clip_verts, near);
            timer.finish(&mut counters.clip_time);
            clipped
        } else {
            clip_triangle(&clip_verts, near)
        };
        if clipped.is_empty() {
            return false;
        }

        counters.triangles_rendered += 1;
        let mut any = false;
        for piece in clipped.as_slice() {
            any |= self.fill(target, piece, material, face, tri.uvs.is_some(), weight, counters);
        }
        any
    }

    #[allow(clippy::too_many_arguments)]
    fn fill<T: PixelTarget>(
        &self,
        target: &mut T,
        tri: &[ClipVertex; 3],
        material: &Material,
        face: DVec3,
        has_uvs: bool,
        weight: f64,
        counters: &mut RasterCounters,
    ) -> bool {
        let width = target.width();
        let height = target.full_height();
        let bounds = PixelRect::of(target);

        let verts: [(DVec2, PerspectiveVarying); 3] = std::array::from_fn(|i| {
            let s = self.camera.project_view(tri[i].view, width, height);
            (s.truncate(), PerspectiveVarying::from_clip(&tri[i], s.z))
        });

        let mut any = false;
        scan_triangle(verts, bounds, |x, y, v| {
            if !(v.inv_z > 0.0) {
                return;
            }
            let z = 1.0 / v.inv_z;
            counters.pixels_tested += 1;
            let Some(index) = target.test_depth_and_get_index(x, y, z) else {
                return;
            };

            let position = v.world * z;
            let normal = {
                let n = v.normal * z;
                if n.length_squared() > EPSILON {
                    n.normalize()
                } else {
                    face
                }
            };
            let fragment = Fragment {
                position,
                normal,
                uv: has_uvs.then(|| v.uv * z),
                view_dir: self.camera.view_direction(position),
            };
            let mut color = shade(&self.lighting, material, &fragment, self.shadows);
            if weight < 1.0 {
                color = color.scale(weight.max(0.0));
            }
            target.write_color(index, color);
            counters.pixels_written += 1;
            any = true;
        });
        any
    }

    /// Draw a world-space segment. Depth is interpolated linearly in screen
    /// space, which is adequate for overlays but can mis-occlude long lines
    /// close to the camera.
    pub fn draw_line<T: PixelTarget>(
        &self,
        target: &mut T,
        start: DVec3,
        end: DVec3,
        color: Color,
        counters: &mut RasterCounters,
    ) -> bool {
        if !(start.is_finite() && end.is_finite()) {
            return false;
        }
        let a = ClipVertex::new(start, self.camera.view_space(start));
        let b = ClipVertex::new(end, self.camera.view_space(end));
        let Some((a, b)) = clip_line(a, b, self.camera.near) else {
            return false;
        };

        let width = target.width();
        let height = target.full_height();
        let bounds = PixelRect::of(target);
        if bounds.is_empty() {
            return false;
        }
        let sa = self.camera.project_view(a.view, width, height);
        let sb = self.camera.project_view(b.view, width, height);
        let Some((sa, sb)) = clip_segment_2d(
            sa,
            sb,
            DVec2::new(bounds.x0 as f64 - 1.0, bounds.y0 as f64 - 1.0),
            DVec2::new(bounds.x1 as f64 + 1.0, bounds.y1 as f64 + 1.0),
        ) else {
            return false;
        };

        let (mut x, mut y) = (sa.x.floor() as i64, sa.y.floor() as i64);
        let (x1, y1) = (sb.x.floor() as i64, sb.y.floor() as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let step_x = if x < x1 { 1 } else { -1 };
        let step_y = if y < y1 { 1 } else { -1 };
        let steps = dx.max(-dy);
        let mut err = dx + dy;
        let mut i = 0i64;
        let mut any = false;

        loop {
            if bounds.contains(x, y) {
                let t = if steps > 0 { i as f64 / steps as f64 } else { 0.0 };
                let depth = sa.z + (sb.z - sa.z) * t;
                counters.pixels_tested += 1;
                if let Some(index) = target.test_depth_and_get_index(x as usize, y as usize, depth) {
                    target.write_color(index, color);
                    counters.pixels_written += 1;
                    any = true;
                }
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += step_x;
            }
            if e2 <= dx {
                err += dx;
                y += step_y;
            }
            i += 1;
        }
        any
    }

    /// Draw a point as a `size` x `size` square centered on its pixel.
    pub fn draw_point<T: PixelTarget>(
        &self,
        target: &mut T,
        position: DVec3,
        color: Color,
        size: u32,
        counters: &mut RasterCounters,
    ) -> bool {
        let Some((px, py, z)) = self.camera.project(position, target.width(), target.full_height())
        else {
            return false;
        };
        let bounds = PixelRect::of(target);
        let size = size.max(1) as i64;
        let half = size / 2;
        let mut any = false;
        for y in (py as i64 - half)..(py as i64 - half + size) {
            for x in (px as i64 - half)..(px as i64 - half + size) {
                if !bounds.contains(x, y) {
                    continue;
                }
                counters.pixels_tested += 1;
                if let Some(index) = target.test_depth_and_get_index(x as usize, y as usize, z) {
                    target.write_color(index, color);
                    counters.pixels_written += 1;
                    any = true;
                }
            }
        }
        any
    }
}

/// Liang–Barsky clip of a screen-space segment (z carried along) to the
/// box `[min, max]`.
fn clip_segment_2d(a: DVec3, b: DVec3, min: DVec2, max: DVec2) -> Option<(DVec3, DVec3)> {
    let d = b - a;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-d.x, a.x - min.x),
        (d.x, max.x - a.x),
        (-d.y, a.y - min.y),
        (d.y, max.y - a.y),
    ] {
        if p.abs() < EPSILON {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((a + d * t0, a + d * t1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::BasicMaterial;
    use crate::rendering::shading::ShadingConfig;

    const SIZE: usize = 64;

    fn camera() -> Camera {
        Camera::new(DVec3::ZERO, 1.0)
    }

    fn flat_white() -> Material {
        Material::Basic(BasicMaterial {
            diffuse: Color::WHITE,
            ambient_strength: 1.0,
            specular_strength: 0.0,
            ..BasicMaterial::default()
        })
    }

    /// Ambient-only white light without the occlusion heuristic, so a
    /// white material shades to exactly white.
    fn lighting() -> Lighting<'static> {
        Lighting::new(&[], Color::WHITE, 1.0).with_config(ShadingConfig {
            ambient_occlusion: false,
            ..ShadingConfig::default()
        })
    }

    /// Counter-clockwise as seen from the origin looking down +Z.
    fn facing_triangle(z: f64, half: f64) -> SurfaceTriangle {
        SurfaceTriangle::new([
            DVec3::new(-half, -half, z),
            DVec3::new(0.0, half, z),
            DVec3::new(half, -half, z),
        ])
    }

    #[test]
    fn facing_triangle_writes_pixels_at_its_depth() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        let drawn = raster.draw_triangle(&mut fb, &facing_triangle(10.0, 3.0), &flat_white(), 1.0, &mut counters);
        assert!(drawn);
        assert_eq!(counters.triangles_rendered, 1);
        assert!(counters.pixels_written > 0);
        assert_eq!(counters.pixels_written as usize, fb.covered_pixels());
        for d in fb.depth_buffer.iter().filter(|d| d.is_finite()) {
            assert!((d - 10.0).abs() < 1e-9);
        }
        assert_eq!(fb.get_color(SIZE / 2, SIZE / 2), Some(Color::WHITE));
    }

    #[test]
    fn backface_writes_nothing() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        let mut tri = facing_triangle(10.0, 3.0);
        tri.positions.swap(1, 2);
        assert!(!raster.draw_triangle(&mut fb, &tri, &flat_white(), 1.0, &mut counters));
        assert_eq!(counters.triangles_culled, 1);
        assert_eq!(fb.covered_pixels(), 0);

        let two_sided = Rasterizer::new(&cam, lighting()).with_backface_culling(false);
        assert!(two_sided.draw_triangle(&mut fb, &tri, &flat_white(), 1.0, &mut counters));
    }

    #[test]
    fn nearer_triangle_wins_in_either_order() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let red = Material::Basic(BasicMaterial {
            diffuse: Color::RED,
            ambient_strength: 1.0,
            ..BasicMaterial::default()
        });
        for near_first in [true, false] {
            let mut fb = Framebuffer::new(SIZE, SIZE);
            let mut counters = RasterCounters::default();
            let near = facing_triangle(5.0, 1.0);
            let far = facing_triangle(20.0, 8.0);
            if near_first {
                raster.draw_triangle(&mut fb, &near, &red, 1.0, &mut counters);
                raster.draw_triangle(&mut fb, &far, &flat_white(), 1.0, &mut counters);
            } else {
                raster.draw_triangle(&mut fb, &far, &flat_white(), 1.0, &mut counters);
                raster.draw_triangle(&mut fb, &near, &red, 1.0, &mut counters);
            }
            assert_eq!(fb.get_color(SIZE / 2, SIZE / 2), Some(Color::RED));
            assert!((fb.get_depth(SIZE / 2, SIZE / 2).unwrap() - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn depth_is_perspective_correct_on_tilted_plane() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting()).with_backface_culling(false);
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        let p0 = DVec3::new(-20.0, -6.0, 6.0);
        let tri = SurfaceTriangle::new([p0, DVec3::new(20.0, -6.0, 6.0), DVec3::new(0.0, 8.0, 40.0)]);
        raster.draw_triangle(&mut fb, &tri, &flat_white(), 1.0, &mut counters);
        let n = face_normal(&tri.positions).unwrap();

        let tan = cam.tan_half_fov_y();
        let mut checked = 0;
        for y in 0..SIZE {
            for x in 0..SIZE {
                let Some(depth) = fb.get_depth(x, y).filter(|d| d.is_finite()) else {
                    continue;
                };
                let x_ndc = (x as f64 + 0.5) / SIZE as f64 * 2.0 - 1.0;
                let y_ndc = 1.0 - (y as f64 + 0.5) / SIZE as f64 * 2.0;
                let dir = DVec3::new(x_ndc * tan, y_ndc * tan, 1.0);
                let expected = n.dot(p0) / n.dot(dir);
                assert!((depth - expected).abs() < 1e-6 * expected, "{x},{y}: {depth} vs {expected}");
                checked += 1;
            }
        }
        assert!(checked > 50);
    }

    #[test]
    fn crossing_near_plane_is_clipped_not_dropped() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting()).with_backface_culling(false);
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        let tri = SurfaceTriangle::new([
            DVec3::new(-5.0, -2.0, -3.0),
            DVec3::new(5.0, -2.0, -3.0),
            DVec3::new(0.0, -2.0, 30.0),
        ]);
        assert!(raster.draw_triangle(&mut fb, &tri, &flat_white(), 1.0, &mut counters));
        assert_eq!(counters.triangles_clipped, 1);
        assert!(fb.depth_buffer.iter().all(|d| *d >= cam.near - 1e-9));
    }

    #[test]
    fn degenerate_triangle_is_counted_as_skipped() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        let p = DVec3::new(0.0, 0.0, 5.0);
        raster.draw_triangle(&mut fb, &SurfaceTriangle::new([p, p, p]), &flat_white(), 1.0, &mut counters);
        let nan = SurfaceTriangle::new([DVec3::NAN, p, p + DVec3::X]);
        raster.draw_triangle(&mut fb, &nan, &flat_white(), 1.0, &mut counters);
        assert_eq!(counters.triangles_skipped, 2);
        assert_eq!(fb.covered_pixels(), 0);
    }

    #[test]
    fn wireframe_leaves_interior_empty() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        let mut material = flat_white();
        material.set_wireframe(true);
        assert!(raster.draw_triangle(&mut fb, &facing_triangle(10.0, 4.0), &material, 1.0, &mut counters));
        assert_eq!(fb.get_depth(SIZE / 2, SIZE / 2 + 4), Some(f64::INFINITY));
        assert!(fb.covered_pixels() > 0);
    }

    #[test]
    fn line_behind_surface_is_hidden() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        raster.draw_triangle(&mut fb, &facing_triangle(5.0, 10.0), &flat_white(), 1.0, &mut counters);
        let before = fb.clone();
        raster.draw_line(&mut fb, DVec3::new(-1.0, 0.0, 20.0), DVec3::new(1.0, 0.0, 20.0), Color::RED, &mut counters);
        assert_eq!(fb, before);
        raster.draw_line(&mut fb, DVec3::new(-1.0, 0.0, 2.0), DVec3::new(1.0, 0.0, 2.0), Color::RED, &mut counters);
        assert_eq!(fb.get_color(SIZE / 2, SIZE / 2), Some(Color::RED));
    }

    #[test]
    fn point_covers_a_square() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        raster.draw_point(&mut fb, DVec3::new(0.0, 0.0, 10.0), Color::GREEN, 3, &mut counters);
        assert_eq!(fb.covered_pixels(), 9);
        raster.draw_point(&mut fb, DVec3::new(0.0, 0.0, -10.0), Color::GREEN, 3, &mut counters);
        assert_eq!(fb.covered_pixels(), 9);
    }

    #[test]
    fn stripes_match_full_render() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let tris = [facing_triangle(10.0, 3.0), facing_triangle(6.0, 1.5)];

        let mut full = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        for t in &tris {
            raster.draw_triangle(&mut full, t, &flat_white(), 1.0, &mut counters);
        }

        let mut striped = Framebuffer::new(SIZE, SIZE);
        let mut stripe_counters = RasterCounters::default();
        for mut stripe in striped.split_into_stripes(5) {
            for t in &tris {
                raster.draw_triangle(&mut stripe, t, &flat_white(), 1.0, &mut stripe_counters);
            }
        }
        assert_eq!(full, striped);
        assert_eq!(counters.pixels_written, stripe_counters.pixels_written);
    }

    #[test]
    fn weight_scales_color() {
        let cam = camera();
        let raster = Rasterizer::new(&cam, lighting());
        let mut fb = Framebuffer::new(SIZE, SIZE);
        let mut counters = RasterCounters::default();
        raster.draw_triangle(&mut fb, &facing_triangle(10.0, 3.0), &flat_white(), 0.5, &mut counters);
        assert_eq!(fb.get_color(SIZE / 2, SIZE / 2), Some(Color::new(128, 128, 128)));
    }

    #[test]
    fn segment_clip_keeps_inside_part() {
        let (a, b) = clip_segment_2d(
            DVec3::new(-10.0, 5.0, 1.0),
            DVec3::new(10.0, 5.0, 3.0),
            DVec2::ZERO,
            DVec2::splat(10.0),
        )
        .unwrap();
        assert!((a.x - 0.0).abs() < 1e-12 && (a.z - 2.0).abs() < 1e-12);
        assert_eq!(b.x, 10.0);
        assert!(clip_segment_2d(DVec3::new(-5.0, -5.0, 1.0), DVec3::new(-1.0, -1.0, 1.0), DVec2::ZERO, DVec2::splat(10.0)).is_none());
    }
}

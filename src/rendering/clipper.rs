/// Near-plane clipping in view space.
///
/// Triangles are clipped against `z = near` with Sutherland–Hodgman; a
/// triangle against a single plane yields at most four vertices, so the
/// result is always zero, one or two triangles.
use glam::{DVec2, DVec3};

/// A vertex carried through clipping with everything the rasterizer
/// interpolates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipVertex {
    pub world: DVec3,
    pub view: DVec3,
    pub uv: DVec2,
    pub normal: DVec3,
}

impl ClipVertex {
    pub fn new(world: DVec3, view: DVec3) -> Self {
        Self {
            world,
            view,
            uv: DVec2::ZERO,
            normal: DVec3::ZERO,
        }
    }

    #[inline]
    fn inside(&self, near: f64) -> bool {
        self.view.z >= near
    }

    /// Point on the segment from `inside` to `outside` where view z hits
    /// `near`.
    #[inline]
    fn intersect(inside: &ClipVertex, outside: &ClipVertex, near: f64) -> ClipVertex {
        let t = (near - inside.view.z) / (outside.view.z - inside.view.z);
        let mut view = inside.view.lerp(outside.view, t);
        view.z = near;
        ClipVertex {
            world: inside.world.lerp(outside.world, t),
            view,
            uv: inside.uv.lerp(outside.uv, t),
            normal: inside.normal.lerp(outside.normal, t),
        }
    }
}

/// Up to two triangles produced by clipping one.
#[derive(Debug, Clone, Copy)]
pub struct ClippedTriangles {
    count: usize,
    tris: [[ClipVertex; 3]; 2],
}

impl ClippedTriangles {
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[[ClipVertex; 3]] {
        &self.tris[..self.count]
    }
}

/// Clip a triangle so every vertex has view z >= `near`. A triangle that
/// is entirely in front comes back unchanged.
pub fn clip_triangle(tri: &[ClipVertex; 3], near: f64) -> ClippedTriangles {
    let mut output = [tri[0]; 4];
    let mut out_len = 0usize;

    let mut prev = tri[2];
    let mut prev_inside = prev.inside(near);

    for &curr in tri.iter() {
        let curr_inside = curr.inside(near);
        match (prev_inside, curr_inside) {
            (true, true) => {
                output[out_len] = curr;
                out_len += 1;
            }
            (true, false) => {
                output[out_len] = ClipVertex::intersect(&prev, &curr, near);
                out_len += 1;
            }
            (false, true) => {
                output[out_len] = ClipVertex::intersect(&curr, &prev, near);
                out_len += 1;
                output[out_len] = curr;
                out_len += 1;
            }
            (false, false) => {}
        }
        prev = curr;
        prev_inside = curr_inside;
    }

    let mut tris = [[tri[0]; 3]; 2];
    let count = match out_len {
        3 => {
            tris[0] = [output[0], output[1], output[2]];
            1
        }
        4 => {
            tris[0] = [output[0], output[1], output[2]];
            tris[1] = [output[0], output[2], output[3]];
            2
        }
        _ => 0,
    };
    ClippedTriangles { count, tris }
}

/// Clip a segment to view z >= `near`; `None` when it lies wholly behind.
pub fn clip_line(a: ClipVertex, b: ClipVertex, near: f64) -> Option<(ClipVertex, ClipVertex)> {
    match (a.inside(near), b.inside(near)) {
        (true, true) => Some((a, b)),
        (true, false) => Some((a, ClipVertex::intersect(&a, &b, near))),
        (false, true) => Some((ClipVertex::intersect(&b, &a, near), b)),
        (false, false) => None,
    }
}

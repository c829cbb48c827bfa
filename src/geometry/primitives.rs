/// Primitives that can be attached to a scene node without building a mesh.
use crate::material::Material;
use crate::math::{any_perpendicular, safe_normalize, Point, TextureCoord, EPSILON};
use crate::spatial::Aabb;
use crate::texture::Color;
use glam::DVec3;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Point; 3],
    pub uvs: Option<[TextureCoord; 3]>,
    pub material: Arc<Material>,
}

impl Triangle {
    pub fn new(a: Point, b: Point, c: Point, material: Arc<Material>) -> Self {
        Self {
            vertices: [a, b, c],
            uvs: None,
            material,
        }
    }

    pub fn with_uvs(mut self, uvs: [TextureCoord; 3]) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Unit geometric normal `(P1 - P0) x (P2 - P0)`, or `None` for a
    /// degenerate triangle.
    pub fn normal(&self) -> Option<DVec3> {
        face_normal(&self.vertices)
    }

    pub fn centroid(&self) -> Point {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices)
    }
}

/// Unnormalized-then-normalized face normal; `None` when the area is ~0
/// or any coordinate is non-finite.
#[inline]
pub fn face_normal(v: &[Point; 3]) -> Option<DVec3> {
    let n = (v[1] - v[0]).cross(v[2] - v[0]);
    let len = n.length();
    if len > EPSILON && len.is_finite() {
        Some(n / len)
    } else {
        None
    }
}

/// Planar quad with vertices in winding order.
#[derive(Debug, Clone)]
pub struct Quad {
    pub vertices: [Point; 4],
    pub uvs: Option<[TextureCoord; 4]>,
    pub material: Arc<Material>,
}

impl Quad {
    pub fn new(vertices: [Point; 4], material: Arc<Material>) -> Self {
        Self {
            vertices,
            uvs: None,
            material,
        }
    }

    /// Split into (P0, P1, P2) and (P0, P2, P3).
    pub fn triangulate(&self) -> [Triangle; 2] {
        let [p0, p1, p2, p3] = self.vertices;
        let mut first = Triangle::new(p0, p1, p2, self.material.clone());
        let mut second = Triangle::new(p0, p2, p3, self.material.clone());
        if let Some([t0, t1, t2, t3]) = self.uvs {
            first.uvs = Some([t0, t1, t2]);
            second.uvs = Some([t0, t2, t3]);
        }
        [first, second]
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Point,
    pub end: Point,
    pub color: Color,
}

impl Line {
    pub fn new(start: Point, end: Point, color: Color) -> Self {
        Self { start, end, color }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points([self.start, self.end])
    }
}

/// A single world-space point drawn as a square of `size` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPrimitive {
    pub position: Point,
    pub color: Color,
    pub size: u32,
}

impl PointPrimitive {
    pub fn new(position: Point, color: Color) -> Self {
        Self {
            position,
            color,
            size: 1,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.position, self.position)
    }
}

/// Filled disc, rendered as a triangle fan around `center`.
#[derive(Debug, Clone)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
    pub normal: DVec3,
    pub segments: u32,
    pub material: Arc<Material>,
}

impl Circle {
    pub fn new(center: Point, radius: f64, normal: DVec3, material: Arc<Material>) -> Self {
        Self {
            center,
            radius,
            normal: safe_normalize(normal),
            segments: 32,
            material,
        }
    }

    /// Rim points in counter-clockwise order when viewed against the normal.
    pub fn rim(&self) -> Vec<Point> {
        let n = safe_normalize(self.normal);
        let u = any_perpendicular(n);
        let v = n.cross(u);
        let segments = self.segments.max(3);
        (0..segments)
            .map(|i| {
                let a = i as f64 / segments as f64 * std::f64::consts::TAU;
                self.center + (u * a.cos() + v * a.sin()) * self.radius
            })
            .collect()
    }

    pub fn triangulate(&self) -> Vec<Triangle> {
        let rim = self.rim();
        (0..rim.len())
            .map(|i| {
                let a = rim[i];
                let b = rim[(i + 1) % rim.len()];
                Triangle::new(self.center, a, b, self.material.clone())
            })
            .collect()
    }

    pub fn bounds(&self) -> Aabb {
        let n = safe_normalize(self.normal);
        // Extent of a disc along axis i is r * sqrt(1 - n_i^2).
        let ext = DVec3::new(
            (1.0 - n.x * n.x).max(0.0).sqrt(),
            (1.0 - n.y * n.y).max(0.0).sqrt(),
            (1.0 - n.z * n.z).max(0.0).sqrt(),
        ) * self.radius;
        Aabb::new(self.center - ext, self.center + ext)
    }
}

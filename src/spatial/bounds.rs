/// Axis-aligned and oriented boxes, rays.
use crate::math::{safe_normalize, EPSILON};
use glam::{DMat3, DMat4, DVec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    /// Always unit length.
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: safe_normalize(direction),
        }
    }

    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Transform into another frame. The direction is renormalized, so
    /// distances along the result are measured in the new frame's units.
    pub fn transformed(&self, m: &DMat4) -> Self {
        Self::new(m.transform_point3(self.origin), m.transform_vector3(self.direction))
    }

    /// Möller–Trumbore. Returns the distance along the ray, hitting both
    /// faces of the triangle.
    pub fn intersect_triangle(&self, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
        let e1 = b - a;
        let e2 = c - a;
        let p = self.direction.cross(e2);
        let det = e1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t > EPSILON).then_some(t)
    }
}

/// Axis-aligned bounding box. `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: DVec3::ZERO,
            max: DVec3::ZERO,
        }
    }
}

impl Aabb {
    /// Box spanning two corners given in any order.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center_half_extents(center: DVec3, half: DVec3) -> Self {
        Self::new(center - half.abs(), center + half.abs())
    }

    /// Tight bounds of the points; an empty input yields a box at the origin.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        let mut bounds = Self::new(first, first);
        for p in iter {
            bounds.expand_to(p);
        }
        bounds
    }

    #[inline]
    pub fn expand_to(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    #[inline]
    pub fn half_extents(&self) -> DVec3 {
        self.size() * 0.5
    }

    /// Index (0 = x, 1 = y, 2 = z) of the widest axis.
    pub fn longest_axis(&self) -> usize {
        let s = self.size();
        if s.x >= s.y && s.x >= s.z {
            0
        } else if s.y >= s.z {
            1
        } else {
            2
        }
    }

    /// Touching boxes count as intersecting.
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    #[inline]
    pub fn contains(&self, p: DVec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    #[inline]
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of the eight corners after `m`.
    pub fn transform_into(&self, m: &DMat4) -> Aabb {
        Aabb::from_points(self.corners().map(|c| m.transform_point3(c)))
    }

    /// Slab test. Returns the entry distance (0 when the origin is inside)
    /// if the ray reaches the box within `max_distance`.
    pub fn ray_intersection(&self, ray: &Ray, max_distance: f64) -> Option<f64> {
        let mut t_min = 0.0_f64;
        let mut t_max = max_distance;
        for axis in 0..3 {
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            if d.abs() < EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// Oriented bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: DVec3,
    /// Orthonormal local axes.
    pub axes: [DVec3; 3],
    pub half_extents: DVec3,
}

impl Obb {
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            axes: [DVec3::X, DVec3::Y, DVec3::Z],
            half_extents: aabb.half_extents(),
        }
    }

    /// The box `local` under an affine transform. Scale is folded into the
    /// half-extents so the axes stay orthonormal (shear is not supported).
    pub fn from_transformed_aabb(local: &Aabb, m: &DMat4) -> Self {
        let basis = DMat3::from_mat4(*m);
        let half = local.half_extents();
        let mut axes = [DVec3::X; 3];
        let mut half_extents = DVec3::ZERO;
        for i in 0..3 {
            let col = basis.col(i);
            let len = col.length();
            axes[i] = safe_normalize(col);
            half_extents[i] = half[i] * len;
        }
        Self {
            center: m.transform_point3(local.center()),
            axes,
            half_extents,
        }
    }

    pub fn to_aabb(&self) -> Aabb {
        let ext = self.axes[0].abs() * self.half_extents.x
            + self.axes[1].abs() * self.half_extents.y
            + self.axes[2].abs() * self.half_extents.z;
        Aabb::from_center_half_extents(self.center, ext)
    }

    pub fn contains(&self, p: DVec3) -> bool {
        let d = p - self.center;
        (0..3).all(|i| d.dot(self.axes[i]).abs() <= self.half_extents[i] + EPSILON)
    }

    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.intersects_obb(&Obb::from_aabb(aabb))
    }

    /// Separating-axis test over the 15 candidate axes.
    pub fn intersects_obb(&self, other: &Obb) -> bool {
        let a = self;
        let b = other;

        // r[i][j] = a_i . b_j, with an epsilon so parallel edges do not
        // produce a zero cross-product axis that falsely separates.
        let mut r = [[0.0; 3]; 3];
        let mut abs_r = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                r[i][j] = a.axes[i].dot(b.axes[j]);
                abs_r[i][j] = r[i][j].abs() + 1e-9;
            }
        }
        let d = b.center - a.center;
        let t = DVec3::new(d.dot(a.axes[0]), d.dot(a.axes[1]), d.dot(a.axes[2]));
        let ea = a.half_extents;
        let eb = b.half_extents;

        for i in 0..3 {
            let ra = ea[i];
            let rb = eb[0] * abs_r[i][0] + eb[1] * abs_r[i][1] + eb[2] * abs_r[i][2];
            if t[i].abs() > ra + rb {
                return false;
            }
        }
        for j in 0..3 {
            let ra = ea[0] * abs_r[0][j] + ea[1] * abs_r[1][j] + ea[2] * abs_r[2][j];
            let rb = eb[j];
            let proj = t[0] * r[0][j] + t[1] * r[1][j] + t[2] * r[2][j];
            if proj.abs() > ra + rb {
                return false;
            }
        }
        for i in 0..3 {
            let i1 = (i + 1) % 3;
            let i2 = (i + 2) % 3;
            for j in 0..3 {
                let j1 = (j + 1) % 3;
                let j2 = (j + 2) % 3;
                let ra = ea[i1] * abs_r[i2][j] + ea[i2] * abs_r[i1][j];
                let rb = eb[j1] * abs_r[i][j2] + eb[j2] * abs_r[i][j1];
                let proj = t[i2] * r[i1][j] - t[i1] * r[i2][j];
                if proj.abs() > ra + rb {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DQuat;

    fn cube_at(x: f64) -> Aabb {
        Aabb::from_center_half_extents(DVec3::new(x, 0.0, 0.0), DVec3::splat(10.0))
    }

    #[test]
    fn overlap_and_separation() {
        assert!(cube_at(0.0).intersects(&cube_at(15.0)));
        assert!(cube_at(0.0).intersects(&cube_at(20.0)));
        assert!(!cube_at(0.0).intersects(&cube_at(50.0)));
    }

    #[test]
    fn transform_into_contains_transformed_corners() {
        let b = Aabb::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(4.0, 5.0, 6.0));
        let m = DMat4::from_scale_rotation_translation(
            DVec3::new(2.0, 1.0, 0.5),
            DQuat::from_euler(glam::EulerRot::XYZ, 0.3, 1.1, -0.7),
            DVec3::new(10.0, -3.0, 2.0),
        );
        let out = b.transform_into(&m);
        for c in b.corners() {
            let p = m.transform_point3(c);
            assert!(out.min.cmple(p + 1e-9).all() && p.cmple(out.max + 1e-9).all());
        }
    }

    #[test]
    fn rotated_cube_grows() {
        let m = DMat4::from_rotation_y(45f64.to_radians());
        let w = Aabb::from_center_half_extents(DVec3::ZERO, DVec3::splat(10.0)).transform_into(&m);
        assert!(w.size().x > 20.0);
    }

    #[test]
    fn slab_test_reports_entry_distance() {
        let b = cube_at(0.0);
        let ray = Ray::new(DVec3::new(0.0, 0.0, -50.0), DVec3::Z);
        let t = b.ray_intersection(&ray, 100.0).unwrap();
        assert!((t - 40.0).abs() < 1e-9);
        assert!(b.ray_intersection(&ray, 35.0).is_none());
        let inside = Ray::new(DVec3::ZERO, DVec3::X);
        assert_eq!(b.ray_intersection(&inside, 1.0), Some(0.0));
        let miss = Ray::new(DVec3::new(30.0, 0.0, -50.0), DVec3::Z);
        assert!(b.ray_intersection(&miss, 100.0).is_none());
    }

    #[test]
    fn moller_trumbore_hits_inside_only() {
        let ray = Ray::new(DVec3::new(0.2, 0.2, -1.0), DVec3::Z);
        let t = ray.intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).unwrap();
        assert!((t - 1.0).abs() < 1e-12);
        let off = Ray::new(DVec3::new(0.8, 0.8, -1.0), DVec3::Z);
        assert!(off.intersect_triangle(DVec3::ZERO, DVec3::X, DVec3::Y).is_none());
    }

    #[test]
    fn obb_separating_axis() {
        let a = Obb::from_aabb(&Aabb::from_center_half_extents(DVec3::ZERO, DVec3::ONE));
        // Rotated 45 degrees about Z; its corner reaches sqrt(2) along X.
        let m = DMat4::from_rotation_translation(
            DQuat::from_rotation_z(std::f64::consts::FRAC_PI_4),
            DVec3::new(2.3, 0.0, 0.0),
        );
        let b = Obb::from_transformed_aabb(&Aabb::from_center_half_extents(DVec3::ZERO, DVec3::ONE), &m);
        assert!(a.intersects_obb(&b));
        let m_far = DMat4::from_rotation_translation(
            DQuat::from_rotation_z(std::f64::consts::FRAC_PI_4),
            DVec3::new(2.5, 0.0, 0.0),
        );
        let c = Obb::from_transformed_aabb(&Aabb::from_center_half_extents(DVec3::ZERO, DVec3::ONE), &m_far);
        assert!(!a.intersects_obb(&c));
        assert!(c.intersects_aabb(&Aabb::new(DVec3::new(2.0, -0.5, -0.5), DVec3::new(3.0, 0.5, 0.5))));
    }
}

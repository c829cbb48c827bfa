/// Perspective camera and its view frustum.
///
/// View space has +Z forward, +X right and +Y up; screen space has the
/// origin at the top-left pixel with Y growing downwards.
use crate::math::{look_rotation, safe_normalize, EPSILON};
use crate::spatial::Aabb;
use glam::{DMat4, DQuat, DVec3};

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    /// Unit quaternion taking view-space axes to world space.
    pub rotation: DQuat,
    /// Horizontal field of view in degrees.
    pub fov_x: f64,
    /// Vertical field of view in degrees.
    pub fov_y: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            fov_x: 60.0,
            fov_y: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(position: DVec3, aspect_ratio: f64) -> Self {
        let mut camera = Self {
            position,
            ..Self::default()
        };
        camera.set_aspect(aspect_ratio);
        camera
    }

    /// Recompute `fov_x` from `fov_y` for a `width / height` aspect ratio.
    pub fn set_aspect(&mut self, aspect_ratio: f64) {
        if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
            return;
        }
        let half_y = (self.fov_y.to_radians() * 0.5).tan();
        self.fov_x = (2.0 * (half_y * aspect_ratio).atan()).to_degrees();
    }

    pub fn set_rotation(&mut self, rotation: DQuat) {
        self.rotation = rotation.normalize();
    }

    /// Turn to face `target`, keeping `up` as close to vertical as possible.
    pub fn look_at(&mut self, target: DVec3, up: DVec3) {
        self.rotation = look_rotation(target - self.position, up);
    }

    #[inline]
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::Z
    }

    #[inline]
    pub fn right(&self) -> DVec3 {
        self.rotation * DVec3::X
    }

    #[inline]
    pub fn up(&self) -> DVec3 {
        self.rotation * DVec3::Y
    }

    /// World-to-view matrix.
    pub fn view_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    #[inline]
    pub fn view_space(&self, point: DVec3) -> DVec3 {
        self.rotation.inverse() * (point - self.position)
    }

    /// Unit vector from `point` towards the camera.
    #[inline]
    pub fn view_direction(&self, point: DVec3) -> DVec3 {
        safe_normalize(self.position - point)
    }

    #[inline]
    pub fn tan_half_fov_x(&self) -> f64 {
        (self.fov_x.to_radians() * 0.5).tan()
    }

    #[inline]
    pub fn tan_half_fov_y(&self) -> f64 {
        (self.fov_y.to_radians() * 0.5).tan()
    }

    /// Project a view-space point to sub-pixel screen coordinates, returning
    /// `(sx, sy, z)`. Depths at or below zero are clamped to a tiny positive
    /// value so the divide stays finite.
    pub fn project_view(&self, view: DVec3, width: usize, height: usize) -> DVec3 {
        let z = if view.z > EPSILON { view.z } else { EPSILON };
        let aspect = width as f64 / height.max(1) as f64;
        let tan_y = self.tan_half_fov_y();
        let x_ndc = view.x / (z * tan_y * aspect);
        let y_ndc = view.y / (z * tan_y);
        DVec3::new(
            (x_ndc + 1.0) * 0.5 * width as f64,
            (1.0 - y_ndc) * 0.5 * height as f64,
            z,
        )
    }

    /// Integer pixel plus positive view depth, or `None` at or behind the
    /// near plane.
    pub fn project(&self, point: DVec3, width: usize, height: usize) -> Option<(i32, i32, f64)> {
        let view = self.view_space(point);
        if !(view.z > self.near) {
            return None;
        }
        let s = self.project_view(view, width, height);
        Some((s.x.floor() as i32, s.y.floor() as i32, s.z))
    }

    pub fn frustum(&self) -> ViewFrustum {
        ViewFrustum::from_camera(self)
    }

    /// Corners of the view volume: the near rectangle then the far one.
    pub fn frustum_corners(&self) -> [DVec3; 8] {
        let f = self.forward();
        let r = self.right();
        let u = self.up();
        let tx = self.tan_half_fov_x();
        let ty = self.tan_half_fov_y();
        let mut corners = [DVec3::ZERO; 8];
        for (i, d) in [self.near, self.far].into_iter().enumerate() {
            let c = self.position + f * d;
            let (rx, uy) = (r * tx * d, u * ty * d);
            corners[i * 4] = c - rx - uy;
            corners[i * 4 + 1] = c + rx - uy;
            corners[i * 4 + 2] = c + rx + uy;
            corners[i * 4 + 3] = c - rx + uy;
        }
        corners
    }

    /// World AABB enclosing the whole view volume, for broad-phase queries.
    pub fn frustum_bounds(&self) -> Aabb {
        Aabb::from_points(self.frustum_corners())
    }
}

/// Plane `normal . p + d = 0` with the inside on the positive side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub d: f64,
}

impl Plane {
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        let normal = safe_normalize(normal);
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.d
    }
}

/// Six inward-facing planes: left, right, top, bottom, near, far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrustum {
    pub planes: [Plane; 6],
}

impl ViewFrustum {
    pub fn from_camera(camera: &Camera) -> Self {
        let pos = camera.position;
        let f = camera.forward();
        let r = camera.right();
        let u = camera.up();
        let tx = camera.tan_half_fov_x();
        let ty = camera.tan_half_fov_y();

        let near_center = pos + f * camera.near;
        let far_center = pos + f * camera.far;

        // Each side plane contains the eye and one frustum edge direction,
        // e.g. the left edge runs along f - r * tx.
        let planes = [
            Plane::from_point_normal(pos, r + f * tx),
            Plane::from_point_normal(pos, -r + f * tx),
            Plane::from_point_normal(pos, -u + f * ty),
            Plane::from_point_normal(pos, u + f * ty),
            Plane::from_point_normal(near_center, f),
            Plane::from_point_normal(far_center, -f),
        ];
        Self { planes }
    }

    pub fn test_point(&self, p: DVec3) -> bool {
        self.planes.iter().all(|pl| pl.signed_distance(p) >= 0.0)
    }

    pub fn test_sphere(&self, center: DVec3, radius: f64) -> bool {
        self.planes.iter().all(|pl| pl.signed_distance(center) >= -radius)
    }

    /// Conservative: rejects only when all eight corners lie outside a
    /// single plane.
    pub fn test_aabb(&self, aabb: &Aabb) -> bool {
        let corners = aabb.corners();
        !self
            .planes
            .iter()
            .any(|pl| corners.iter().all(|&c| pl.signed_distance(c) < 0.0))
    }
}

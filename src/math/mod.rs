/// Double-precision math helpers layered over glam.
/// Positions, directions and normals all use `DVec3`.
pub use glam::{DMat3, DMat4, DQuat, DVec2, DVec3, DVec4};

/// A position, direction or normal in some frame.
pub type Point = DVec3;

/// Texture coordinate; (0,0) is the top-left texel of an image.
pub type TextureCoord = DVec2;

pub const EPSILON: f64 = 1e-9;

/// Normalize `v`, falling back to +Y for zero-length or non-finite input.
#[inline]
pub fn safe_normalize(v: DVec3) -> DVec3 {
    let len_sq = v.length_squared();
    if len_sq > EPSILON * EPSILON && len_sq.is_finite() {
        v / len_sq.sqrt()
    } else {
        DVec3::Y
    }
}

#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if (edge1 - edge0).abs() < EPSILON {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Barycentric coordinates of `p` with respect to triangle (a, b, c).
/// Returns `None` for a degenerate triangle.
pub fn barycentric(p: DVec3, a: DVec3, b: DVec3, c: DVec3) -> Option<DVec3> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < EPSILON {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some(DVec3::new(1.0 - v - w, v, w))
}

/// Normal matrix (inverse transpose of the upper 3x3) for transforming normals.
#[inline]
pub fn normal_matrix(world: &DMat4) -> DMat3 {
    let m = DMat3::from_mat4(*world);
    if m.determinant().abs() < EPSILON {
        m
    } else {
        m.inverse().transpose()
    }
}

/// Build a rotation whose +Z axis points along `forward`, keeping `up`
/// as close to +Y of the result as possible.
pub fn look_rotation(forward: DVec3, up: DVec3) -> DQuat {
    let forward = safe_normalize(forward);
    let mut right = up.cross(forward);
    if right.length_squared() < 1e-12 {
        // Forward is parallel to up; pick any perpendicular axis.
        right = if forward.x.abs() < 0.9 {
            DVec3::X.cross(forward)
        } else {
            DVec3::Z.cross(forward)
        };
    }
    let right = right.normalize();
    let up = forward.cross(right);
    DQuat::from_mat3(&DMat3::from_cols(right, up, forward)).normalize()
}

/// Any unit vector perpendicular to `n`, used to build tangent frames.
pub fn any_perpendicular(n: DVec3) -> DVec3 {
    let helper = if n.y.abs() < 0.99 { DVec3::Y } else { DVec3::X };
    safe_normalize(helper.cross(n))
}

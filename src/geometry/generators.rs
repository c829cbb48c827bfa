/// Procedural mesh generators. Every generator emits counter-clockwise
/// winding as seen from outside, per-vertex normals and UVs.
use super::Mesh;
use crate::material::Material;
use glam::{DVec2, DVec3};
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

/// UV sphere centered at the origin. `rings` is clamped to >= 2 and
/// `segments` to >= 3. Pole rows collapse to one point, so their
/// zero-area triangles are not emitted.
pub fn generate_sphere(radius: f64, rings: u32, segments: u32, material: Arc<Material>) -> Mesh {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let stride = segments + 1;

    let mut vertices = Vec::with_capacity(((rings + 1) * stride) as usize);
    let mut normals = Vec::with_capacity(vertices.capacity());
    let mut uvs = Vec::with_capacity(vertices.capacity());
    for r in 0..=rings {
        let theta = PI * r as f64 / rings as f64;
        for s in 0..=segments {
            let phi = TAU * s as f64 / segments as f64;
            let n = DVec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            vertices.push(n * radius);
            normals.push(n);
            uvs.push(DVec2::new(s as f64 / segments as f64, r as f64 / rings as f64));
        }
    }

    let mut indices = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let a = r * stride + s;
            let b = a + stride;
            if r != 0 {
                indices.extend_from_slice(&[a, a + 1, b]);
            }
            if r != rings - 1 {
                indices.extend_from_slice(&[a + 1, b + 1, b]);
            }
        }
    }

    assemble("sphere", vertices, normals, uvs, indices, material)
}

/// Torus around the Y axis with tube radius `minor`.
pub fn generate_torus(major: f64, minor: f64, rings: u32, segments: u32, material: Arc<Material>) -> Mesh {
    let rings = rings.max(3);
    let segments = segments.max(3);
    let stride = segments + 1;

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    for i in 0..=rings {
        let u = TAU * i as f64 / rings as f64;
        for j in 0..=segments {
            let v = TAU * j as f64 / segments as f64;
            let n = DVec3::new(v.cos() * u.cos(), v.sin(), v.cos() * u.sin());
            let center = DVec3::new(u.cos(), 0.0, u.sin()) * major;
            vertices.push(center + n * minor);
            normals.push(n);
            uvs.push(DVec2::new(i as f64 / rings as f64, j as f64 / segments as f64));
        }
    }

    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for i in 0..rings {
        for j in 0..segments {
            let a = i * stride + j;
            let b = a + stride;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }

    assemble("torus", vertices, normals, uvs, indices, material)
}

/// Axis-aligned cube spanning `[-half_extent, half_extent]` on every axis:
/// 24 vertices so each face carries its own normal and UV square.
pub fn generate_cube(half_extent: f64, material: Arc<Material>) -> Mesh {
    // (normal, u axis, v axis) with u x v == normal.
    const FACES: [(DVec3, DVec3, DVec3); 6] = [
        (DVec3::X, DVec3::NEG_Z, DVec3::Y),
        (DVec3::NEG_X, DVec3::Z, DVec3::Y),
        (DVec3::Y, DVec3::X, DVec3::NEG_Z),
        (DVec3::NEG_Y, DVec3::X, DVec3::Z),
        (DVec3::Z, DVec3::X, DVec3::Y),
        (DVec3::NEG_Z, DVec3::NEG_X, DVec3::Y),
    ];

    let h = half_extent;
    let mut vertices = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face, (n, u, v)) in FACES.iter().enumerate() {
        let c = *n * h;
        let corners = [
            (c - *u * h - *v * h, DVec2::new(0.0, 1.0)),
            (c + *u * h - *v * h, DVec2::new(1.0, 1.0)),
            (c + *u * h + *v * h, DVec2::new(1.0, 0.0)),
            (c - *u * h + *v * h, DVec2::new(0.0, 0.0)),
        ];
        for (p, uv) in corners {
            vertices.push(p);
            normals.push(*n);
            uvs.push(uv);
        }
        let base = face as u32 * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    assemble("cube", vertices, normals, uvs, indices, material)
}

/// Square in the XZ plane at y = 0 facing +Y.
pub fn generate_plane(half_extent: f64, material: Arc<Material>) -> Mesh {
    let h = half_extent;
    let vertices = vec![
        DVec3::new(-h, 0.0, h),
        DVec3::new(h, 0.0, h),
        DVec3::new(h, 0.0, -h),
        DVec3::new(-h, 0.0, -h),
    ];
    let uvs = vec![
        DVec2::new(0.0, 1.0),
        DVec2::new(1.0, 1.0),
        DVec2::new(1.0, 0.0),
        DVec2::new(0.0, 0.0),
    ];
    assemble("plane", vertices, vec![DVec3::Y; 4], uvs, vec![0, 1, 2, 0, 2, 3], material)
}

/// Generators build indices from their own vertex counts, so the mesh
/// invariants hold by construction.
fn assemble(
    name: &str,
    vertices: Vec<DVec3>,
    normals: Vec<DVec3>,
    uvs: Vec<DVec2>,
    indices: Vec<u32>,
    material: Arc<Material>,
) -> Mesh {
    Mesh::from_parts_unchecked(name, vertices, normals, uvs, indices, material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives::face_normal;

    fn mat() -> Arc<Material> {
        Arc::new(Material::default())
    }

    /// Every face normal must point away from the origin for a closed
    /// shape centered there.
    fn assert_outward(mesh: &Mesh) {
        for i in 0..mesh.triangle_count() {
            let tri = mesh.triangle(i);
            let n = face_normal(&tri).expect("generators emit no degenerate triangles");
            let c = (tri[0] + tri[1] + tri[2]) / 3.0;
            assert!(n.dot(c) > 0.0, "triangle {} faces inward", i);
        }
    }

    #[test]
    fn cube_layout() {
        let cube = generate_cube(5.0, mat());
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        let b = cube.bounds();
        assert_eq!(b.min, DVec3::splat(-5.0));
        assert_eq!(b.max, DVec3::splat(5.0));
        assert_outward(&cube);
    }

    #[test]
    fn sphere_extents_match_radius() {
        let s = generate_sphere(5.0, 16, 32, mat());
        let size = s.bounds().size();
        for axis in 0..3 {
            assert!(size[axis] >= 9.0 && size[axis] <= 11.0, "axis {} size {}", axis, size[axis]);
        }
        assert_outward(&s);
    }

    #[test]
    fn torus_winding_is_outward_from_tube() {
        let t = generate_torus(3.0, 1.0, 12, 8, mat());
        for i in 0..t.triangle_count() {
            let tri = t.triangle(i);
            let n = face_normal(&tri).unwrap();
            let c = (tri[0] + tri[1] + tri[2]) / 3.0;
            let ring = DVec3::new(c.x, 0.0, c.z).normalize() * 3.0;
            assert!(n.dot(c - ring) > 0.0);
        }
    }

    #[test]
    fn plane_faces_up() {
        let p = generate_plane(1.0, mat());
        let n = face_normal(&p.triangle(0)).unwrap();
        assert!((n - DVec3::Y).length() < 1e-12);
    }
}

/// Indexed triangle mesh with optional per-vertex normals and UVs.
use crate::error::{RenderError, Result};
use crate::material::Material;
use crate::math::{safe_normalize, Point, TextureCoord};
use crate::spatial::Aabb;
use glam::DVec3;
use std::sync::Arc;

/// A triangle mesh sharing one material.
///
/// Invariants, checked on construction and by every setter:
/// - `indices.len() % 3 == 0`
/// - every index is `< vertices.len()`
/// - `normals` and `uvs` are either empty or parallel to `vertices`
///
/// Vertex positions are local to the mesh; `position` translates the whole
/// mesh inside its owning node's frame.
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    vertices: Vec<Point>,
    normals: Vec<DVec3>,
    uvs: Vec<TextureCoord>,
    indices: Vec<u32>,
    material: Arc<Material>,
    position: Point,
}

impl Mesh {
    pub fn new(vertices: Vec<Point>, indices: Vec<u32>, material: Arc<Material>) -> Result<Self> {
        let mesh = Self {
            name: String::from("mesh"),
            vertices,
            normals: Vec::new(),
            uvs: Vec::new(),
            indices,
            material,
            position: DVec3::ZERO,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// For builders whose indices are derived from their own vertex count.
    pub(crate) fn from_parts_unchecked(
        name: &str,
        vertices: Vec<Point>,
        normals: Vec<DVec3>,
        uvs: Vec<TextureCoord>,
        indices: Vec<u32>,
        material: Arc<Material>,
    ) -> Self {
        let mesh = Self {
            name: name.to_string(),
            vertices,
            normals,
            uvs,
            indices,
            material,
            position: DVec3::ZERO,
        };
        debug_assert!(mesh.validate().is_ok());
        mesh
    }

    pub fn with_normals(mut self, normals: Vec<DVec3>) -> Result<Self> {
        self.normals = normals;
        self.validate()?;
        Ok(self)
    }

    pub fn with_uvs(mut self, uvs: Vec<TextureCoord>) -> Result<Self> {
        self.uvs = uvs;
        self.validate()?;
        Ok(self)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = material;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(RenderError::invalid_asset(
                &self.name,
                format!("index count {} is not a multiple of 3", self.indices.len()),
            ));
        }
        let n = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(RenderError::invalid_asset(
                &self.name,
                format!("index {} out of range for {} vertices", bad, n),
            ));
        }
        if !self.normals.is_empty() && self.normals.len() != n {
            return Err(RenderError::invalid_asset(
                &self.name,
                format!("{} normals for {} vertices", self.normals.len(), n),
            ));
        }
        if !self.uvs.is_empty() && self.uvs.len() != n {
            return Err(RenderError::invalid_asset(
                &self.name,
                format!("{} uvs for {} vertices", self.uvs.len(), n),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    #[inline]
    pub fn normals(&self) -> &[DVec3] {
        &self.normals
    }

    #[inline]
    pub fn uvs(&self) -> &[TextureCoord] {
        &self.uvs
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    #[inline]
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn set_material(&mut self, material: Arc<Material>) {
        self.material = material;
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    #[inline]
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex position including the mesh translation.
    #[inline]
    pub fn vertex(&self, index: usize) -> Point {
        self.vertices[index] + self.position
    }

    /// Index triples in insertion order.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }

    /// Positions of triangle `index`, translated by the mesh position.
    pub fn triangle(&self, index: usize) -> [Point; 3] {
        let base = index * 3;
        [
            self.vertex(self.indices[base] as usize),
            self.vertex(self.indices[base + 1] as usize),
            self.vertex(self.indices[base + 2] as usize),
        ]
    }

    /// Bounds of every vertex after the mesh translation.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|&v| v + self.position))
    }

    /// Replace the normals with area-weighted smooth vertex normals.
    /// Vertices that touch no (non-degenerate) triangle get +Y.
    pub fn calculate_normals(&mut self) {
        let mut acc = vec![DVec3::ZERO; self.vertices.len()];
        for [a, b, c] in self.triangles().collect::<Vec<_>>() {
            let p0 = self.vertices[a];
            // Cross product length is twice the area, which weights the sum.
            let n = (self.vertices[b] - p0).cross(self.vertices[c] - p0);
            if !n.is_finite() {
                continue;
            }
            acc[a] += n;
            acc[b] += n;
            acc[c] += n;
        }
        self.normals = acc.into_iter().map(safe_normalize).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat() -> Arc<Material> {
        Arc::new(Material::default())
    }

    #[test]
    fn rejects_broken_invariants() {
        let v = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
        assert!(Mesh::new(v.clone(), vec![0, 1], mat()).is_err());
        assert!(Mesh::new(v.clone(), vec![0, 1, 3], mat()).is_err());
        let m = Mesh::new(v.clone(), vec![0, 1, 2], mat()).unwrap();
        assert!(m.clone().with_normals(vec![DVec3::Z; 2]).is_err());
        assert!(m.with_uvs(vec![glam::DVec2::ZERO; 3]).is_ok());
    }

    #[test]
    fn calculate_normals_single_triangle() {
        let mut m = Mesh::new(
            vec![DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 1.0, 0.0)],
            vec![0, 1, 2],
            mat(),
        )
        .unwrap();
        m.calculate_normals();
        for n in m.normals() {
            assert!((*n - DVec3::Z).length() < 1e-12);
        }
    }

    #[test]
    fn bounds_include_translation() {
        let m = Mesh::new(vec![DVec3::ZERO, DVec3::ONE, DVec3::X], vec![0, 1, 2], mat())
            .unwrap()
            .with_position(DVec3::new(10.0, 0.0, 0.0));
        let b = m.bounds();
        assert_eq!(b.min, DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(b.max, DVec3::new(11.0, 1.0, 1.0));
        assert_eq!(m.triangle(0)[1], DVec3::new(11.0, 1.0, 1.0));
    }
}

/// Vertex-clustering simplification: snap every vertex to the mean of its
/// grid cell and drop triangles that collapse.
use crate::geometry::Mesh;
use glam::{DVec2, DVec3};
use std::collections::HashMap;

pub fn simplify_clustering(mesh: &Mesh, cell_size: f64) -> Mesh {
    if !(cell_size > 0.0 && cell_size.is_finite()) || mesh.vertices().is_empty() {
        return mesh.clone();
    }
    let origin = mesh
        .vertices()
        .iter()
        .copied()
        .reduce(DVec3::min)
        .unwrap_or(DVec3::ZERO);

    // Cell index in first-seen order, accumulated sum and count per cell.
    let mut cells: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut sums: Vec<(DVec3, u32)> = Vec::new();
    let mut uvs: Vec<DVec2> = Vec::new();
    let mut remap = Vec::with_capacity(mesh.vertices().len());
    for (i, &p) in mesh.vertices().iter().enumerate() {
        let c = ((p - origin) / cell_size).floor();
        let key = (c.x as i64, c.y as i64, c.z as i64);
        let index = *cells.entry(key).or_insert_with(|| {
            sums.push((DVec3::ZERO, 0));
            if mesh.has_uvs() {
                uvs.push(mesh.uvs()[i]);
            }
            (sums.len() - 1) as u32
        });
        let slot = &mut sums[index as usize];
        slot.0 += p;
        slot.1 += 1;
        remap.push(index);
    }

    let vertices: Vec<DVec3> = sums.iter().map(|(s, n)| *s / *n as f64).collect();
    let indices: Vec<u32> = mesh
        .triangles()
        .map(|[a, b, c]| [remap[a], remap[b], remap[c]])
        .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
        .flatten()
        .collect();

    log::debug!(
        "clustering '{}' at cell {}: {} -> {} vertices, {} -> {} triangles",
        mesh.name(),
        cell_size,
        mesh.vertices().len(),
        vertices.len(),
        mesh.triangle_count(),
        indices.len() / 3
    );

    let mut out = Mesh::from_parts_unchecked(
        mesh.name(),
        vertices,
        Vec::new(),
        uvs,
        indices,
        mesh.material().clone(),
    )
    .with_position(mesh.position());
    if mesh.has_normals() {
        out.calculate_normals();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::generate_sphere;
    use crate::material::Material;
    use std::sync::Arc;

    #[test]
    fn coarser_cells_give_fewer_triangles() {
        let sphere = generate_sphere(5.0, 16, 32, Arc::new(Material::default()));
        let fine = simplify_clustering(&sphere, 0.5);
        let coarse = simplify_clustering(&sphere, 2.5);
        assert!(fine.triangle_count() <= sphere.triangle_count());
        assert!(coarse.triangle_count() < fine.triangle_count());
        assert!(coarse.vertices().len() < sphere.vertices().len());
        assert_eq!(coarse.normals().len(), coarse.vertices().len());
    }

    #[test]
    fn zero_cell_size_is_identity() {
        let sphere = generate_sphere(1.0, 4, 6, Arc::new(Material::default()));
        let same = simplify_clustering(&sphere, 0.0);
        assert_eq!(same.indices(), sphere.indices());
    }

    #[test]
    fn cells_snap_to_their_mean() {
        let mesh = Mesh::new(
            vec![
                DVec3::new(0.1, 0.0, 0.0),
                DVec3::new(0.3, 0.0, 0.0),
                DVec3::new(5.0, 0.0, 0.0),
                DVec3::new(0.0, 5.0, 0.0),
            ],
            vec![0, 2, 3, 1, 2, 3],
            Arc::new(Material::default()),
        )
        .unwrap();
        let out = simplify_clustering(&mesh, 1.0);
        assert_eq!(out.vertices().len(), 3);
        assert!((out.vertices()[0] - DVec3::new(0.2, 0.0, 0.0)).length() < 1e-12);
        // Both triangles map onto the same three cells and survive.
        assert_eq!(out.triangle_count(), 2);
    }
}

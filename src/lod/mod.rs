//! Level of detail: distance-selected mesh groups and the simplifiers that
//! produce their coarser levels.

pub mod clustering;
pub mod group;
pub mod qem;

pub use clustering::simplify_clustering;
pub use group::{LodGroup, LodLevel, LodState};
pub use qem::{simplify_qem, Quadric};

use crate::error::Result;
use crate::geometry::Mesh;
use std::sync::Arc;

/// Build a group holding `base` plus `levels - 1` simplifications at
/// triangle ratios `1 - i / levels`. Level `i` is used up to
/// `(i + 1) * distance_step`.
///
/// Clustering levels use a cell size of `i / levels` times a quarter of the
/// mesh's largest extent.
pub fn generate_lod_chain(
    base: Arc<Mesh>,
    levels: usize,
    use_qem: bool,
    distance_step: f64,
) -> Result<LodGroup> {
    let levels = levels.max(1);
    let base_triangles = base.triangle_count();
    let extent = base.bounds().size().max_element();

    let mut out = Vec::with_capacity(levels);
    out.push(LodLevel {
        mesh: base.clone(),
        max_distance: distance_step,
    });
    for i in 1..levels {
        let ratio = 1.0 - i as f64 / levels as f64;
        let mesh = if use_qem {
            let target = ((base_triangles as f64 * ratio).ceil() as usize).max(1);
            simplify_qem(&base, target)
        } else {
            simplify_clustering(&base, extent * 0.25 * (i as f64 / levels as f64))
        };
        out.push(LodLevel {
            mesh: Arc::new(mesh),
            max_distance: distance_step * (i + 1) as f64,
        });
    }
    LodGroup::new(out)
}

//! Bounding volumes and spatial acceleration structures.
//!
//! Both [`Bvh`] and [`Octree`] are generic over a small `Copy` handle (the
//! renderer stores scene node ids) and answer AABB range queries over the
//! world-space bounds they were built from. Neither is updated
//! incrementally; callers rebuild when the object set or bounds change.

pub mod bounds;
pub mod bvh;
pub mod octree;

pub use bounds::{Aabb, Obb, Ray};
pub use bvh::Bvh;
pub use octree::{Octree, OctreeConfig};

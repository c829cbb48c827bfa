/// Renderable geometry: directly-inserted primitives, indexed meshes and
/// procedural mesh generators.
pub mod generators;
pub mod mesh;
pub mod primitives;

pub use generators::{generate_cube, generate_plane, generate_sphere, generate_torus};
pub use mesh::Mesh;
pub use primitives::{face_normal, Circle, Line, PointPrimitive, Quad, Triangle};

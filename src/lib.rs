//! CPU software 3D rasterizer.
//!
//! A scene graph of meshes and primitives is culled through a BVH or
//! octree, clipped against the near plane, scan-converted with
//! perspective-correct interpolation and shaded with Blinn-Phong or PBR
//! lighting, optionally with shadow maps and distance-based LOD. The result
//! is a color buffer plus a depth buffer that a [`present::PresentBackend`]
//! hands to the outside world.
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loaders;
pub mod lod;
pub mod logging;
pub mod material;
pub mod math;
pub mod perf;
pub mod present;
pub mod rendering;
pub mod scene;
pub mod spatial;
pub mod texture;

pub use camera::{Camera, ViewFrustum};
pub use config::{RenderConfig, SpatialConfig, SpatialStructure};
pub use error::{RenderError, Result};
pub use geometry::{Circle, Line, Mesh, PointPrimitive, Quad, Triangle};
pub use lod::{LodGroup, LodLevel};
pub use logging::{init_logging, LoggingConfig};
pub use material::{Light, Material};
pub use perf::RenderStats;
pub use present::{PresentBackend, TerminalBackend};
pub use rendering::{Framebuffer, Renderer};
pub use scene::{NodeId, NodePayload, Scene, SceneNode};
pub use spatial::{Aabb, Bvh, Obb, Octree, Ray};
pub use texture::{Color, Texture};

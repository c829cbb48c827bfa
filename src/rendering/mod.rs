//! Software rasterization pipeline.
pub mod clipper;
pub mod framebuffer;
pub mod rasterizer;
pub mod renderer;
pub mod shading;
pub mod shadow;

pub use framebuffer::{FrameSlice, Framebuffer};
pub use rasterizer::{PixelTarget, Rasterizer, SurfaceTriangle};
pub use renderer::{Renderer, UpdateFn};
pub use shading::{shade, Fragment, Lighting, ShadingConfig, ShadowLookup};
pub use shadow::{ShadowConfig, ShadowMap, ShadowMaps};

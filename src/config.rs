//! Renderer configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so a JSON file only
//! needs the fields it changes.

use crate::error::{RenderError, Result};
use crate::rendering::shading::ShadingConfig;
use crate::rendering::shadow::ShadowConfig;
use crate::spatial::OctreeConfig;
use crate::texture::Color;
use serde::{Deserialize, Serialize};

/// Broad-phase structure used to find culling candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialStructure {
    /// Frustum-test every node.
    None,
    #[default]
    Bvh,
    Octree,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub structure: SpatialStructure,
    /// Rebuild at least every this many frames, even without scene edits.
    /// 0 rebuilds only when the scene changes.
    pub rebuild_interval: u64,
    pub bvh_leaf_size: usize,
    pub octree: OctreeConfig,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            structure: SpatialStructure::Bvh,
            rebuild_interval: 0,
            bvh_leaf_size: 4,
            octree: OctreeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    pub clear_color: Color,
    pub ambient_color: Color,
    pub ambient_intensity: f64,
    pub backface_culling: bool,
    pub shadows_enabled: bool,
    pub shadow: ShadowConfig,
    pub spatial: SpatialConfig,
    pub shading: ShadingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            clear_color: Color::BLACK,
            ambient_color: Color::WHITE,
            ambient_intensity: 1.0,
            backface_culling: true,
            shadows_enabled: false,
            shadow: ShadowConfig::default(),
            spatial: SpatialConfig::default(),
            shading: ShadingConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfiguration(format!(
                "framebuffer must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        if self.shadows_enabled && self.shadow.resolution == 0 {
            return Err(RenderError::InvalidConfiguration(
                "shadow map resolution must be non-zero".into(),
            ));
        }
        if !(self.shadow.extent > 0.0 && self.shadow.far > self.shadow.near) {
            return Err(RenderError::InvalidConfiguration(format!(
                "shadow frustum is empty (extent {}, near {}, far {})",
                self.shadow.extent, self.shadow.near, self.shadow.far
            )));
        }
        if self.spatial.bvh_leaf_size == 0 {
            return Err(RenderError::InvalidConfiguration(
                "BVH leaf size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RenderConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = RenderConfig::with_size(0, 10).validate().unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfiguration(_)));
    }

    #[test]
    fn empty_shadow_frustum_is_rejected() {
        let mut config = RenderConfig::default();
        config.shadow.far = config.shadow.near;
        assert!(config.validate().is_err());
    }
}

//! Surface materials and light sources.
//!
//! Three material variants share one capability set used by the shading
//! code: base and specular color, shininess, strengths, wireframe flags and
//! optional texture lookups. PBR materials answer the Blinn-Phong queries
//! too (shininess derives from roughness) so any variant can be shaded by
//! either model.

pub mod light;

pub use light::{Light, LightKind, SpotCone};

use crate::texture::{Color, FilterMode, Texture, WrapMode};
use glam::DVec3;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct BasicMaterial {
    pub diffuse: Color,
    pub specular: Color,
    pub shininess: f64,
    pub specular_strength: f64,
    pub ambient_strength: f64,
    pub wireframe: bool,
    pub wireframe_color: Color,
}

impl Default for BasicMaterial {
    fn default() -> Self {
        Self {
            diffuse: Color::new(200, 200, 200),
            specular: Color::WHITE,
            shininess: 32.0,
            specular_strength: 0.5,
            ambient_strength: 0.1,
            wireframe: false,
            wireframe_color: Color::WHITE,
        }
    }
}

impl BasicMaterial {
    pub fn with_color(diffuse: Color) -> Self {
        Self {
            diffuse,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TexturedMaterial {
    pub basic: BasicMaterial,
    pub diffuse_texture: Option<Arc<Texture>>,
    pub normal_texture: Option<Arc<Texture>>,
    pub specular_texture: Option<Arc<Texture>>,
    pub filter: FilterMode,
    pub wrap: WrapMode,
    pub use_textures: bool,
}

impl TexturedMaterial {
    pub fn new(basic: BasicMaterial, diffuse_texture: Arc<Texture>) -> Self {
        Self {
            basic,
            diffuse_texture: Some(diffuse_texture),
            normal_texture: None,
            specular_texture: None,
            filter: FilterMode::default(),
            wrap: WrapMode::default(),
            use_textures: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PbrMaterial {
    pub albedo: Color,
    /// 0 = dielectric, 1 = metal.
    pub metallic: f64,
    /// 0 = mirror-like, 1 = fully rough.
    pub roughness: f64,
    pub ao: f64,
    pub albedo_map: Option<Arc<Texture>>,
    pub metallic_map: Option<Arc<Texture>>,
    pub roughness_map: Option<Arc<Texture>>,
    pub normal_map: Option<Arc<Texture>>,
    pub ao_map: Option<Arc<Texture>>,
    pub filter: FilterMode,
    pub wrap: WrapMode,
    pub wireframe: bool,
    pub wireframe_color: Color,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            albedo: Color::new(200, 200, 200),
            metallic: 0.0,
            roughness: 0.5,
            ao: 1.0,
            albedo_map: None,
            metallic_map: None,
            roughness_map: None,
            normal_map: None,
            ao_map: None,
            filter: FilterMode::default(),
            wrap: WrapMode::default(),
            wireframe: false,
            wireframe_color: Color::WHITE,
        }
    }
}

impl PbrMaterial {
    pub fn new(albedo: Color, metallic: f64, roughness: f64) -> Self {
        Self {
            albedo,
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub enum Material {
    Basic(BasicMaterial),
    Textured(TexturedMaterial),
    Pbr(PbrMaterial),
}

impl Default for Material {
    fn default() -> Self {
        Material::Basic(BasicMaterial::default())
    }
}

#[inline]
fn sample_opt(
    tex: &Option<Arc<Texture>>,
    u: f64,
    v: f64,
    filter: FilterMode,
    wrap: WrapMode,
) -> Option<Color> {
    tex.as_ref().map(|t| t.sample(u, v, filter, wrap))
}

/// Unpack a normal-map texel from [0,255]^3 to a unit vector in [-1,1]^3.
#[inline]
pub fn unpack_normal(texel: Color) -> DVec3 {
    let n = texel.to_unit() * 2.0 - DVec3::ONE;
    crate::math::safe_normalize(n)
}

impl Material {
    pub fn basic(diffuse: Color) -> Self {
        Material::Basic(BasicMaterial::with_color(diffuse))
    }

    #[inline]
    pub fn is_pbr(&self) -> bool {
        matches!(self, Material::Pbr(_))
    }

    /// Untextured base color at (u, v). PBR maps contribute here since
    /// the albedo map replaces the albedo rather than modulating the lit
    /// result.
    pub fn diffuse_color(&self, u: f64, v: f64) -> Color {
        match self {
            Material::Basic(m) => m.diffuse,
            Material::Textured(m) => m.basic.diffuse,
            Material::Pbr(m) => match sample_opt(&m.albedo_map, u, v, m.filter, m.wrap) {
                Some(texel) => Color::from_dvec3(m.albedo.to_dvec3() * texel.to_unit()),
                None => m.albedo,
            },
        }
    }

    pub fn specular_color(&self) -> Color {
        match self {
            Material::Basic(m) => m.specular,
            Material::Textured(m) => m.basic.specular,
            Material::Pbr(m) => {
                // Metals tint their reflections with the albedo.
                Color::WHITE.lerp(m.albedo, m.metallic)
            }
        }
    }

    pub fn shininess(&self) -> f64 {
        match self {
            Material::Basic(m) => m.shininess,
            Material::Textured(m) => m.basic.shininess,
            Material::Pbr(m) => (1.0 - m.roughness) * 128.0,
        }
    }

    pub fn specular_strength(&self) -> f64 {
        match self {
            Material::Basic(m) => m.specular_strength,
            Material::Textured(m) => m.basic.specular_strength,
            Material::Pbr(m) => 1.0 - m.roughness,
        }
    }

    pub fn ambient_strength(&self) -> f64 {
        match self {
            Material::Basic(m) => m.ambient_strength,
            Material::Textured(m) => m.basic.ambient_strength,
            Material::Pbr(m) => m.ao,
        }
    }

    pub fn is_wireframe(&self) -> bool {
        match self {
            Material::Basic(m) => m.wireframe,
            Material::Textured(m) => m.basic.wireframe,
            Material::Pbr(m) => m.wireframe,
        }
    }

    pub fn wireframe_color(&self) -> Color {
        match self {
            Material::Basic(m) => m.wireframe_color,
            Material::Textured(m) => m.basic.wireframe_color,
            Material::Pbr(m) => m.wireframe_color,
        }
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        match self {
            Material::Basic(m) => m.wireframe = wireframe,
            Material::Textured(m) => m.basic.wireframe = wireframe,
            Material::Pbr(m) => m.wireframe = wireframe,
        }
    }

    /// Metallic factor at (u, v); 0 for non-PBR materials.
    pub fn metallic(&self, u: f64, v: f64) -> f64 {
        match self {
            Material::Pbr(m) => {
                let scale = sample_opt(&m.metallic_map, u, v, m.filter, m.wrap)
                    .map_or(1.0, |c| c.to_unit().x);
                (m.metallic * scale).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Roughness at (u, v); non-PBR materials derive it from shininess.
    pub fn roughness(&self, u: f64, v: f64) -> f64 {
        match self {
            Material::Pbr(m) => {
                let scale = sample_opt(&m.roughness_map, u, v, m.filter, m.wrap)
                    .map_or(1.0, |c| c.to_unit().x);
                (m.roughness * scale).clamp(0.0, 1.0)
            }
            _ => (1.0 - self.shininess() / 128.0).clamp(0.0, 1.0),
        }
    }

    /// Baked ambient occlusion at (u, v).
    pub fn ao(&self, u: f64, v: f64) -> f64 {
        match self {
            Material::Pbr(m) => {
                let scale = sample_opt(&m.ao_map, u, v, m.filter, m.wrap)
                    .map_or(1.0, |c| c.to_unit().x);
                (m.ao * scale).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    /// Diffuse texture texel that modulates the lit color, if any.
    pub fn sample_diffuse(&self, u: f64, v: f64) -> Option<Color> {
        match self {
            Material::Textured(m) if m.use_textures => {
                sample_opt(&m.diffuse_texture, u, v, m.filter, m.wrap)
            }
            _ => None,
        }
    }

    /// Tangent-space normal from the normal map, unpacked and normalized.
    pub fn sample_normal(&self, u: f64, v: f64) -> Option<DVec3> {
        let texel = match self {
            Material::Textured(m) if m.use_textures => {
                sample_opt(&m.normal_texture, u, v, m.filter, m.wrap)
            }
            Material::Pbr(m) => sample_opt(&m.normal_map, u, v, m.filter, m.wrap),
            _ => None,
        };
        texel.map(unpack_normal)
    }

    pub fn sample_specular(&self, u: f64, v: f64) -> Option<Color> {
        match self {
            Material::Textured(m) if m.use_textures => {
                sample_opt(&m.specular_texture, u, v, m.filter, m.wrap)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbr_shininess_from_roughness() {
        let m = Material::Pbr(PbrMaterial::new(Color::WHITE, 0.0, 0.25));
        assert!((m.shininess() - 96.0).abs() < 1e-9);
        assert!((m.roughness(0.0, 0.0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn textured_material_samples_only_when_enabled() {
        let tex = Arc::new(Texture::solid(2, 2, Color::RED));
        let mut m = TexturedMaterial::new(BasicMaterial::default(), tex);
        assert_eq!(Material::Textured(m.clone()).sample_diffuse(0.5, 0.5), Some(Color::RED));
        m.use_textures = false;
        assert_eq!(Material::Textured(m).sample_diffuse(0.5, 0.5), None);
    }

    #[test]
    fn flat_normal_texel_unpacks_to_plus_z() {
        let n = unpack_normal(Color::new(128, 128, 255));
        assert!((n - DVec3::Z).length() < 0.01);
    }

    #[test]
    fn basic_material_has_no_texture_lookups() {
        let m = Material::basic(Color::GREEN);
        assert_eq!(m.diffuse_color(0.3, 0.3), Color::GREEN);
        assert!(m.sample_diffuse(0.0, 0.0).is_none());
        assert!(m.sample_normal(0.0, 0.0).is_none());
        assert_eq!(m.metallic(0.0, 0.0), 0.0);
        assert_eq!(m.ao(0.0, 0.0), 1.0);
    }
}

/// Per-pixel lighting models.
/// Kept separate from the rasterizer so lighting models
/// can evolve independently of the rasterization pipeline.
use crate::material::{Light, Material};
use crate::math::{any_perpendicular, safe_normalize};
use crate::texture::Color;
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    /// Darken downward-facing surfaces with a cheap N.y occlusion term.
    pub ambient_occlusion: bool,
    /// Reinhard tone mapping on the PBR path.
    pub tone_map: bool,
    /// Display gamma applied after tone mapping.
    pub gamma: f64,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            ambient_occlusion: true,
            tone_map: true,
            gamma: 2.2,
        }
    }
}

/// Answers how much of light `light_index` reaches a world-space point,
/// from 0 (fully shadowed) to 1 (fully lit).
pub trait ShadowLookup {
    fn shadow_factor(&self, light_index: usize, point: DVec3) -> f64;
}

impl<F> ShadowLookup for F
where
    F: Fn(usize, DVec3) -> f64,
{
    #[inline]
    fn shadow_factor(&self, light_index: usize, point: DVec3) -> f64 {
        self(light_index, point)
    }
}

/// Lookup for scenes rendered without shadow maps.
#[inline]
pub fn no_shadows(_light_index: usize, _point: DVec3) -> f64 {
    1.0
}

/// Lights and ambient terms shared by every pixel of a frame.
#[derive(Debug, Clone, Copy)]
pub struct Lighting<'a> {
    pub lights: &'a [Light],
    pub ambient_color: Color,
    pub ambient_intensity: f64,
    pub config: ShadingConfig,
}

impl<'a> Lighting<'a> {
    pub fn new(lights: &'a [Light], ambient_color: Color, ambient_intensity: f64) -> Self {
        Self {
            lights,
            ambient_color,
            ambient_intensity,
            config: ShadingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ShadingConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    fn ambient(&self) -> DVec3 {
        self.ambient_color.to_unit() * self.ambient_intensity
    }
}

/// Interpolated surface data for one pixel.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub position: DVec3,
    /// Unit surface normal facing the viewer's side.
    pub normal: DVec3,
    /// Texture coordinate, when the geometry carries one.
    pub uv: Option<DVec2>,
    /// Unit vector from the surface towards the camera.
    pub view_dir: DVec3,
}

/// Shade one fragment. PBR materials take the Cook-Torrance path; the
/// rest use Blinn-Phong.
pub fn shade<S: ShadowLookup + ?Sized>(
    lighting: &Lighting<'_>,
    material: &Material,
    fragment: &Fragment,
    shadows: &S,
) -> Color {
    let (u, v) = fragment.uv.map_or((0.0, 0.0), |uv| (uv.x, uv.y));
    let normal = perturb_normal(material, fragment);
    let ao = material.ao(u, v) * occlusion(&lighting.config, normal);

    if material.is_pbr() {
        shade_pbr(lighting, material, fragment, normal, ao, shadows)
    } else {
        shade_blinn_phong(lighting, material, fragment, normal, ao, shadows)
    }
}

/// N.y heuristic: 1 facing up, 0.5 facing down.
#[inline]
fn occlusion(config: &ShadingConfig, normal: DVec3) -> f64 {
    if config.ambient_occlusion {
        0.75 + 0.25 * normal.y
    } else {
        1.0
    }
}

/// Apply the material's normal map in a tangent frame built around the
/// geometric normal.
fn perturb_normal(material: &Material, fragment: &Fragment) -> DVec3 {
    let n = fragment.normal;
    let Some(uv) = fragment.uv else {
        return n;
    };
    match material.sample_normal(uv.x, uv.y) {
        Some(tangent_space) => {
            let t = any_perpendicular(n);
            let b = n.cross(t);
            safe_normalize(t * tangent_space.x + b * tangent_space.y + n * tangent_space.z)
        }
        None => n,
    }
}

fn shade_blinn_phong<S: ShadowLookup + ?Sized>(
    lighting: &Lighting<'_>,
    material: &Material,
    fragment: &Fragment,
    n: DVec3,
    ao: f64,
    shadows: &S,
) -> Color {
    let (u, v) = fragment.uv.map_or((0.0, 0.0), |uv| (uv.x, uv.y));
    let base = material.diffuse_color(u, v).to_unit();
    let specular_tint = match fragment.uv.and_then(|uv| material.sample_specular(uv.x, uv.y)) {
        Some(texel) => material.specular_color().to_unit() * texel.to_unit(),
        None => material.specular_color().to_unit(),
    };
    let shininess = material.shininess().max(1.0);
    let specular_strength = material.specular_strength();

    let mut diffuse = DVec3::ZERO;
    let mut specular = DVec3::ZERO;
    for (index, light) in lighting.lights.iter().enumerate() {
        let Some(sample) = light.sample(fragment.position) else {
            continue;
        };
        let n_dot_l = n.dot(sample.to_light);
        if n_dot_l <= 0.0 {
            continue;
        }
        let shadow = if light.cast_shadows {
            shadows.shadow_factor(index, fragment.position)
        } else {
            1.0
        };
        if shadow <= 0.0 {
            continue;
        }
        diffuse += sample.radiance * n_dot_l * shadow;

        let h = safe_normalize(sample.to_light + fragment.view_dir);
        let spec = n.dot(h).max(0.0).powf(shininess) * specular_strength;
        specular += sample.radiance * spec * shadow;
    }

    let ambient = lighting.ambient() * ao * material.ambient_strength();
    let mut lit = base * (ambient + diffuse) + specular_tint * specular;
    if let Some(uv) = fragment.uv {
        if let Some(texel) = material.sample_diffuse(uv.x, uv.y) {
            lit *= texel.to_unit();
        }
    }
    Color::from_unit(lit)
}

/// Trowbridge-Reitz GGX normal distribution.
#[inline]
fn distribution_ggx(n_dot_h: f64, roughness: f64) -> f64 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d).max(1e-12)
}

#[inline]
fn geometry_schlick_ggx(n_dot_x: f64, k: f64) -> f64 {
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// Smith's method with the Schlick-GGX term for direct lighting.
#[inline]
fn geometry_smith(n_dot_v: f64, n_dot_l: f64, roughness: f64) -> f64 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

#[inline]
fn fresnel_schlick(cos_theta: f64, f0: DVec3) -> DVec3 {
    f0 + (DVec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

fn shade_pbr<S: ShadowLookup + ?Sized>(
    lighting: &Lighting<'_>,
    material: &Material,
    fragment: &Fragment,
    n: DVec3,
    ao: f64,
    shadows: &S,
) -> Color {
    let (u, v) = fragment.uv.map_or((0.0, 0.0), |uv| (uv.x, uv.y));
    let albedo = material.diffuse_color(u, v).to_unit();
    let metallic = material.metallic(u, v);
    // Zero roughness makes the GGX peak a delta.
    let roughness = material.roughness(u, v).max(0.04);
    let f0 = DVec3::splat(0.04).lerp(albedo, metallic);

    let view = fragment.view_dir;
    let n_dot_v = n.dot(view).max(1e-4);

    let mut lo = DVec3::ZERO;
    for (index, light) in lighting.lights.iter().enumerate() {
        let Some(sample) = light.sample(fragment.position) else {
            continue;
        };
        let n_dot_l = n.dot(sample.to_light);
        if n_dot_l <= 0.0 {
            continue;
        }
        let shadow = if light.cast_shadows {
            shadows.shadow_factor(index, fragment.position)
        } else {
            1.0
        };
        if shadow <= 0.0 {
            continue;
        }

        let h = safe_normalize(view + sample.to_light);
        let d = distribution_ggx(n.dot(h).max(0.0), roughness);
        let g = geometry_smith(n_dot_v, n_dot_l, roughness);
        let f = fresnel_schlick(h.dot(view).max(0.0), f0);

        let specular = d * g * f / (4.0 * n_dot_v * n_dot_l + 1e-4);
        let k_d = (DVec3::ONE - f) * (1.0 - metallic);
        lo += (k_d * albedo / PI + specular) * sample.radiance * n_dot_l * shadow;
    }

    let ambient = lighting.ambient() * albedo * ao;
    let mut color = ambient + lo;
    if lighting.config.tone_map {
        color = color / (DVec3::ONE + color);
    }
    if lighting.config.gamma > 0.0 {
        color = color.max(DVec3::ZERO).powf(1.0 / lighting.config.gamma);
    }
    Color::from_unit(color)
}

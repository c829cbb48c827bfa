/// Shadow maps: a depth-only render from each light, sampled with PCF.
use super::clipper::{clip_triangle, ClipVertex};
use super::rasterizer::{scan_triangle, PixelRect};
use super::shading::ShadowLookup;
use crate::error::{RenderError, Result};
use crate::geometry::Mesh;
use crate::material::{Light, LightKind};
use crate::math::safe_normalize;
use glam::{DMat4, DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// Placement and filtering of the light-space depth render.
///
/// The orthographic frustum is a box `2 * extent` wide centered on
/// `center`. Too small an extent clips casters at the edges of the map;
/// too large spreads the resolution thin and causes acne and peter-panning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Width and height of each map in texels.
    pub resolution: usize,
    /// Half-width of the orthographic light frustum in world units.
    pub extent: f64,
    pub center: DVec3,
    /// Depth slack, in world units, before a point counts as occluded.
    pub bias: f64,
    /// PCF kernel radius; 0 gives a hard binary test.
    pub pcf_radius: u32,
    pub near: f64,
    pub far: f64,
    /// How far behind `center` a directional light's eye is placed.
    pub light_distance: f64,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 512,
            extent: 40.0,
            center: DVec3::ZERO,
            bias: 0.05,
            pcf_radius: 1,
            near: 0.1,
            far: 500.0,
            light_distance: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShadowMap {
    width: usize,
    height: usize,
    depth: Vec<f64>,
    light_view: DMat4,
    view_proj: DMat4,
    /// Light-view z below which casters are clipped away.
    near: f64,
    bias: f64,
    pcf_radius: u32,
}

impl ShadowMap {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidConfiguration(format!(
                "shadow map must be at least 1x1, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            depth: vec![f64::INFINITY; width * height],
            light_view: DMat4::IDENTITY,
            view_proj: DMat4::IDENTITY,
            near: ShadowConfig::default().near,
            bias: ShadowConfig::default().bias,
            pcf_radius: 0,
        })
    }

    /// A cleared map aimed from `light` at the configured scene box.
    pub fn for_light(light: &Light, config: &ShadowConfig) -> Result<Self> {
        let mut map = Self::new(config.resolution, config.resolution)?;
        map.set_light(light, config);
        Ok(map)
    }

    /// Re-aim at `light`. Directional lights look along their direction
    /// from `light_distance` behind the center; point and spot lights look
    /// from their position at the center.
    pub fn set_light(&mut self, light: &Light, config: &ShadowConfig) {
        let (eye, dir) = match light.kind {
            LightKind::Directional { direction } => {
                let dir = safe_normalize(direction);
                (config.center - dir * config.light_distance, dir)
            }
            LightKind::Point | LightKind::Spot { .. } => {
                (light.position, safe_normalize(config.center - light.position))
            }
        };
        // LookAt degenerates when the view direction is parallel to up.
        let up = if dir.y.abs() > 0.99 { DVec3::Z } else { DVec3::Y };
        let e = config.extent;
        self.light_view = DMat4::look_at_lh(eye, eye + dir, up);
        let proj = DMat4::orthographic_lh(-e, e, -e, e, config.near, config.far);
        self.view_proj = proj * self.light_view;
        self.near = config.near;
        self.bias = config.bias;
        self.pcf_radius = config.pcf_radius;
    }

    pub fn clear(&mut self) {
        self.depth.fill(f64::INFINITY);
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn view_proj(&self) -> DMat4 {
        self.view_proj
    }

    #[inline]
    pub fn bias(&self) -> f64 {
        self.bias
    }

    #[inline]
    pub fn pcf_radius(&self) -> u32 {
        self.pcf_radius
    }

    pub fn set_pcf_radius(&mut self, radius: u32) {
        self.pcf_radius = radius;
    }

    pub fn depth_at(&self, x: usize, y: usize) -> Option<f64> {
        (x < self.width && y < self.height).then(|| self.depth[y * self.width + x])
    }

    /// Map pixel coordinates and light-view depth of a world point, or
    /// `None` when it falls outside the light frustum.
    fn to_map(&self, p: DVec3) -> Option<(DVec2, f64)> {
        let ndc = self.view_proj.project_point3(p);
        if !(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && (0.0..=1.0).contains(&ndc.z)) {
            return None;
        }
        let px = DVec2::new(
            (ndc.x + 1.0) * 0.5 * self.width as f64,
            (1.0 - ndc.y) * 0.5 * self.height as f64,
        );
        Some((px, self.light_view.transform_point3(p).z))
    }

    /// Depth-only fill of one world-space triangle. Both faces are drawn.
    /// Parts behind the light's near plane are clipped off first, so
    /// geometry behind the light never occludes anything.
    pub fn render_triangle(&mut self, tri: [DVec3; 3]) {
        if !tri.iter().all(|p| p.is_finite()) {
            return;
        }
        let clip = tri.map(|p| ClipVertex::new(p, self.light_view.transform_point3(p)));
        let bounds = PixelRect {
            x0: 0,
            y0: 0,
            x1: self.width,
            y1: self.height,
        };
        for piece in clip_triangle(&clip, self.near).as_slice() {
            let verts = piece.map(|v| {
                let ndc = self.view_proj.project_point3(v.world);
                let px = DVec2::new(
                    (ndc.x + 1.0) * 0.5 * self.width as f64,
                    (1.0 - ndc.y) * 0.5 * self.height as f64,
                );
                (px, v.view.z)
            });
            let width = self.width;
            let depth = &mut self.depth;
            scan_triangle(verts, bounds, |x, y, z| {
                let slot = &mut depth[y * width + x];
                if z < *slot {
                    *slot = z;
                }
            });
        }
    }

    pub fn render_mesh(&mut self, mesh: &Mesh, model: &DMat4) {
        let full = *model * DMat4::from_translation(mesh.position());
        let world: Vec<DVec3> = mesh
            .vertices()
            .iter()
            .map(|p| full.transform_point3(*p))
            .collect();
        for [a, b, c] in mesh.triangles() {
            self.render_triangle([world[a], world[b], world[c]]);
        }
    }

    /// Fraction of the PCF kernel around `point` that sees the light, in
    /// [0, 1]. Points outside the map are lit.
    pub fn sample(&self, point: DVec3) -> f64 {
        let Some((px, depth)) = self.to_map(point) else {
            return 1.0;
        };
        let cx = px.x.floor() as i64;
        let cy = px.y.floor() as i64;
        let r = self.pcf_radius as i64;
        let mut lit = 0u32;
        let mut total = 0u32;
        for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                total += 1;
                let stored = if x >= 0 && y >= 0 {
                    self.depth_at(x as usize, y as usize)
                } else {
                    None
                };
                match stored {
                    Some(s) if depth > s + self.bias => {}
                    _ => lit += 1,
                }
            }
        }
        lit as f64 / total as f64
    }
}

/// One optional map per light, indexed like the light list.
#[derive(Debug, Clone, Default)]
pub struct ShadowMaps {
    maps: Vec<Option<ShadowMap>>,
}

impl ShadowMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for `count` lights and clear every existing map.
    pub fn reset(&mut self, count: usize) {
        self.maps.resize_with(count, || None);
        for map in self.maps.iter_mut().flatten() {
            map.clear();
        }
    }

    pub fn get(&self, light_index: usize) -> Option<&ShadowMap> {
        self.maps.get(light_index).and_then(Option::as_ref)
    }

    pub fn slot_mut(&mut self, light_index: usize) -> Option<&mut Option<ShadowMap>> {
        self.maps.get_mut(light_index)
    }

    /// Drop the map for a light that no longer casts shadows.
    pub fn disable(&mut self, light_index: usize) {
        if let Some(slot) = self.maps.get_mut(light_index) {
            *slot = None;
        }
    }

    pub fn active(&self) -> usize {
        self.maps.iter().flatten().count()
    }
}

impl ShadowLookup for ShadowMaps {
    #[inline]
    fn shadow_factor(&self, light_index: usize, point: DVec3) -> f64 {
        self.get(light_index).map_or(1.0, |m| m.sample(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::Color;

    fn overhead() -> Light {
        Light::directional(DVec3::NEG_Y, Color::WHITE, 1.0)
    }

    fn config(pcf_radius: u32) -> ShadowConfig {
        ShadowConfig {
            resolution: 128,
            extent: 20.0,
            pcf_radius,
            ..ShadowConfig::default()
        }
    }

    /// A 10x10 horizontal square at height `y`.
    fn square(map: &mut ShadowMap, y: f64) {
        let a = DVec3::new(-5.0, y, -5.0);
        let b = DVec3::new(5.0, y, -5.0);
        let c = DVec3::new(5.0, y, 5.0);
        let d = DVec3::new(-5.0, y, 5.0);
        map.render_triangle([a, b, c]);
        map.render_triangle([a, c, d]);
    }

    #[test]
    fn occluder_shadows_the_ground_below() {
        let mut map = ShadowMap::for_light(&overhead(), &config(0)).unwrap();
        square(&mut map, 5.0);
        assert_eq!(map.sample(DVec3::new(0.0, 0.0, 0.0)), 0.0);
        assert_eq!(map.sample(DVec3::new(12.0, 0.0, 0.0)), 1.0);
        // The occluder itself is not shadowed by its own depth.
        assert_eq!(map.sample(DVec3::new(0.0, 5.0, 0.0)), 1.0);
    }

    #[test]
    fn points_outside_the_map_are_lit() {
        let mut map = ShadowMap::for_light(&overhead(), &config(1)).unwrap();
        square(&mut map, 5.0);
        assert_eq!(map.sample(DVec3::new(100.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn pcf_softens_the_edge() {
        let mut map = ShadowMap::for_light(&overhead(), &config(2)).unwrap();
        square(&mut map, 5.0);
        let edge = map.sample(DVec3::new(5.0, 0.0, 0.0));
        assert!(edge > 0.0 && edge < 1.0, "{edge}");
        for x in [-8.0, -5.0, -1.0, 0.0, 4.9, 5.1, 9.0] {
            let f = map.sample(DVec3::new(x, 0.0, 0.3));
            assert!((0.0..=1.0).contains(&f));
        }
    }

    #[test]
    fn clear_removes_casters() {
        let mut map = ShadowMap::for_light(&overhead(), &config(0)).unwrap();
        square(&mut map, 5.0);
        map.clear();
        assert_eq!(map.sample(DVec3::ZERO), 1.0);
    }

    #[test]
    fn point_light_looks_at_center() {
        let light = Light::point(DVec3::new(0.0, 30.0, 0.0), Color::WHITE, 1.0);
        let mut map = ShadowMap::for_light(&light, &config(0)).unwrap();
        assert!(map.view_proj().is_finite());
        square(&mut map, 5.0);
        assert_eq!(map.sample(DVec3::ZERO), 0.0);
    }

    #[test]
    fn casters_behind_the_light_are_ignored() {
        let light = Light::point(DVec3::new(0.0, 30.0, 0.0), Color::WHITE, 1.0);
        let mut map = ShadowMap::for_light(&light, &config(0)).unwrap();
        square(&mut map, 50.0);
        assert_eq!(map.sample(DVec3::ZERO), 1.0);
        assert!((0..map.width()).all(|x| map.depth_at(x, map.height() / 2) == Some(f64::INFINITY)));
    }

    #[test]
    fn caster_straddling_the_light_keeps_its_front_part() {
        let light = Light::point(DVec3::new(0.0, 30.0, 0.0), Color::WHITE, 1.0);
        let mut map = ShadowMap::for_light(&light, &config(0)).unwrap();
        // A slanted slab through the light's eye, reaching down to y = 10.
        let a = DVec3::new(-5.0, 40.0, -5.0);
        let b = DVec3::new(5.0, 40.0, -5.0);
        let c = DVec3::new(5.0, 10.0, 5.0);
        let d = DVec3::new(-5.0, 10.0, 5.0);
        map.render_triangle([a, b, c]);
        map.render_triangle([a, c, d]);
        let written = map.depth.iter().filter(|d| d.is_finite()).collect::<Vec<_>>();
        assert!(!written.is_empty());
        assert!(written.iter().all(|&&z| z >= map.near - 1e-9), "{written:?}");
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            ShadowMap::new(0, 4),
            Err(RenderError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn collection_defaults_to_lit() {
        let mut maps = ShadowMaps::new();
        maps.reset(2);
        assert_eq!(maps.shadow_factor(0, DVec3::ZERO), 1.0);
        let mut map = ShadowMap::for_light(&overhead(), &config(0)).unwrap();
        square(&mut map, 5.0);
        *maps.slot_mut(1).unwrap() = Some(map);
        assert_eq!(maps.shadow_factor(1, DVec3::ZERO), 0.0);
        assert_eq!(maps.active(), 1);
        maps.reset(2);
        assert_eq!(maps.shadow_factor(1, DVec3::ZERO), 1.0);
    }
}

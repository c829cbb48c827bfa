/// Per-frame pipeline: update, spatial refresh, culling, shadow pass,
/// main pass and statistics.
use super::framebuffer::Framebuffer;
use super::rasterizer::{PixelTarget, Rasterizer, SurfaceTriangle};
use super::shading::{no_shadows, Lighting, ShadowLookup};
use super::shadow::{ShadowMap, ShadowMaps};
use crate::camera::Camera;
use crate::config::{RenderConfig, SpatialStructure};
use crate::error::Result;
use crate::material::Light;
use crate::perf::{RasterCounters, RenderStats, ScopeTimer};
use crate::present::PresentBackend;
use crate::scene::{NodeId, NodePayload, RaycastHit, Scene};
use crate::spatial::{Aabb, Bvh, Octree, Ray};
use glam::DVec3;

/// Caller hook run at the start of each frame with the scene, the
/// accumulated time and the frame's time step (seconds).
pub type UpdateFn = Box<dyn FnMut(&mut Scene, f64, f64)>;

enum SpatialIndex {
    None,
    Bvh(Bvh<NodeId>),
    Octree(Octree<NodeId>),
}

/// Broad-phase structure plus what it was built from.
struct SpatialCache {
    index: SpatialIndex,
    /// Scene revision at build time; `None` before the first build.
    revision: Option<u64>,
    frames_since_build: u64,
}

impl SpatialCache {
    fn new() -> Self {
        Self {
            index: SpatialIndex::None,
            revision: None,
            frames_since_build: 0,
        }
    }

    /// Candidates whose bounds overlap `query`, or `None` when no
    /// structure is built.
    fn query(&self, query: &Aabb) -> Option<Vec<NodeId>> {
        match &self.index {
            SpatialIndex::None => None,
            SpatialIndex::Bvh(bvh) => Some(bvh.query(query)),
            SpatialIndex::Octree(octree) => Some(octree.query(query)),
        }
    }
}

pub struct Renderer {
    config: RenderConfig,
    framebuffer: Framebuffer,
    pub camera: Camera,
    pub lights: Vec<Light>,
    shadow_maps: ShadowMaps,
    spatial: SpatialCache,
    stats: RenderStats,
    time: f64,
    update_fn: Option<UpdateFn>,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let framebuffer = Framebuffer::new(config.width, config.height);
        let camera = Camera::new(DVec3::ZERO, config.width as f64 / config.height as f64);
        log::debug!(
            "renderer created: {}x{}, spatial {:?}, shadows {}",
            config.width,
            config.height,
            config.spatial.structure,
            config.shadows_enabled
        );
        Ok(Self {
            config,
            framebuffer,
            camera,
            lights: Vec::new(),
            shadow_maps: ShadowMaps::new(),
            spatial: SpatialCache::new(),
            stats: RenderStats::new(),
            time: 0.0,
            update_fn: None,
        })
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Replace the configuration. The spatial structure is rebuilt on the
    /// next frame and the framebuffer follows the new size.
    pub fn set_config(&mut self, config: RenderConfig) -> Result<()> {
        config.validate()?;
        if (config.width, config.height) != (self.config.width, self.config.height) {
            self.framebuffer.resize(config.width, config.height);
        }
        self.config = config;
        self.spatial = SpatialCache::new();
        Ok(())
    }

    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        let config = RenderConfig {
            width,
            height,
            ..self.config.clone()
        };
        self.set_config(config)
    }

    #[inline]
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    #[inline]
    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    #[inline]
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Seconds accumulated over all frames.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn set_update_fn(&mut self, f: impl FnMut(&mut Scene, f64, f64) + 'static) {
        self.update_fn = Some(Box::new(f));
    }

    pub fn clear_update_fn(&mut self) {
        self.update_fn = None;
    }

    /// Shadow map of light `index` from the last frame, if it cast one.
    pub fn shadow_map(&self, index: usize) -> Option<&ShadowMap> {
        self.shadow_maps.get(index)
    }

    /// Render one frame of `scene`, advancing time by `dt` seconds.
    pub fn render_frame(&mut self, scene: &mut Scene, dt: f64) -> &RenderStats {
        let frame_timer = ScopeTimer::start();
        self.stats.begin_frame();

        // 1. Update
        let timer = ScopeTimer::start();
        self.time += dt.max(0.0);
        if let Some(update) = self.update_fn.as_mut() {
            update(scene, self.time, dt);
        }
        timer.finish(&mut self.stats.update_time);

        let timer = ScopeTimer::start();
        scene.update_world_matrices();
        timer.finish(&mut self.stats.transform_time);

        // 2. Spatial structures
        self.refresh_spatial(scene);

        // 3-4. Camera and culling
        let timer = ScopeTimer::start();
        let mut camera = self.camera.clone();
        camera.set_aspect(self.framebuffer.width as f64 / self.framebuffer.height as f64);
        let visible = self.cull(scene, &camera);
        timer.finish(&mut self.stats.culling_time);

        let timer = ScopeTimer::start();
        self.update_lods(scene, &visible, &camera);
        timer.finish(&mut self.stats.transform_time);

        // 5. Shadows
        let timer = ScopeTimer::start();
        let shadows_on = self.render_shadows(scene, &visible);
        timer.finish(&mut self.stats.shadow_time);

        // 6. Main pass
        let render_timer = ScopeTimer::start();
        self.framebuffer.clear(self.config.clear_color);

        // Setup only; shading is timed with rasterization.
        let timer = ScopeTimer::start();
        let lighting = Lighting::new(
            &self.lights,
            self.config.ambient_color,
            self.config.ambient_intensity,
        )
        .with_config(self.config.shading);
        let shadows: &(dyn ShadowLookup + Sync) = if shadows_on {
            &self.shadow_maps
        } else {
            &no_shadows
        };
        let rasterizer = Rasterizer::new(&camera, lighting)
            .with_shadows(shadows)
            .with_backface_culling(self.config.backface_culling);
        timer.finish(&mut self.stats.lighting_time);

        let timer = ScopeTimer::start();
        let mut counters = RasterCounters::default();
        for &id in &visible {
            let (triangles, draws) =
                draw_node(scene, id, &rasterizer, &mut self.framebuffer, &mut counters);
            self.stats.triangles_total += triangles;
            self.stats.draw_calls += draws;
        }
        timer.finish(&mut self.stats.rasterization_time);
        render_timer.finish(&mut self.stats.render_time);

        self.stats.raster.merge(&counters);
        self.stats.clipping_time = self.stats.raster.clip_time;
        frame_timer.finish(&mut self.stats.frame_time);

        log::debug!(
            "frame {}: {} nodes visible of {}, {} triangles rendered, {} culled, {:.2}ms",
            self.stats.frame,
            self.stats.nodes_visible,
            self.stats.nodes_tested,
            self.stats.raster.triangles_rendered,
            self.stats.raster.triangles_culled,
            self.stats.frame_time.as_secs_f64() * 1e3
        );
        &self.stats
    }

    /// Hand the finished frame to a presentation backend.
    pub fn present<B: PresentBackend + ?Sized>(&self, backend: &mut B) -> Result<()> {
        backend.present(&self.framebuffer)
    }

    /// Closest hit along `ray`, using the spatial structure when one is
    /// configured.
    pub fn raycast(&mut self, scene: &mut Scene, ray: &Ray, max_distance: f64) -> Option<RaycastHit> {
        scene.update_world_matrices();
        self.refresh_spatial(scene);
        match &self.spatial.index {
            SpatialIndex::Bvh(bvh) => {
                let scene_ref: &Scene = scene;
                let (node, _) = bvh.raycast(ray, max_distance, |id, ray, max| {
                    scene_ref.raycast_node(id, ray, max).map(|h| h.distance)
                })?;
                scene_ref.raycast_node(node, ray, max_distance)
            }
            _ => scene.raycast(ray, max_distance),
        }
    }

    fn refresh_spatial(&mut self, scene: &Scene) {
        let spatial = &self.config.spatial;
        if spatial.structure == SpatialStructure::None {
            self.spatial.index = SpatialIndex::None;
            self.spatial.revision = None;
            return;
        }
        self.spatial.frames_since_build += 1;
        let stale = self.spatial.revision != Some(scene.revision())
            || (spatial.rebuild_interval > 0
                && self.spatial.frames_since_build >= spatial.rebuild_interval);
        if !stale {
            return;
        }

        let entries = scene.collect_bounds();
        let count = entries.len();
        self.spatial.index = match spatial.structure {
            SpatialStructure::Bvh => {
                let bvh = Bvh::build(entries, spatial.bvh_leaf_size);
                self.stats.bvh_nodes = bvh.node_count();
                SpatialIndex::Bvh(bvh)
            }
            SpatialStructure::Octree => {
                let octree = Octree::build(entries, spatial.octree);
                self.stats.octree_nodes = octree.node_count();
                SpatialIndex::Octree(octree)
            }
            SpatialStructure::None => SpatialIndex::None,
        };
        self.spatial.revision = Some(scene.revision());
        self.spatial.frames_since_build = 0;
        self.stats.spatial_rebuilds += 1;
        log::debug!(
            "rebuilt {:?} over {} nodes at scene revision {}",
            spatial.structure,
            count,
            scene.revision()
        );
    }

    /// Visible payload nodes inside the frustum, in scene order.
    /// `nodes_tested` counts frustum tests; `nodes_culled` also includes
    /// nodes the broad phase rejected.
    fn cull(&mut self, scene: &Scene, camera: &Camera) -> Vec<NodeId> {
        let frustum = camera.frustum();
        let renderable = scene
            .iter()
            .filter(|&id| scene.node(id).is_some_and(|n| n.payload.is_some()) && scene.is_visible(id))
            .count() as u64;
        let candidates: Vec<(NodeId, Aabb)> = match self.spatial.query(&camera.frustum_bounds()) {
            Some(mut ids) => {
                self.stats.spatial_queries += 1;
                ids.sort_unstable();
                ids.into_iter()
                    .filter(|&id| scene.is_visible(id))
                    .filter_map(|id| scene.world_bounds(id).map(|b| (id, b)))
                    .collect()
            }
            None => scene.collect_bounds(),
        };

        self.stats.nodes_tested = candidates.len() as u64;
        let visible: Vec<NodeId> = candidates
            .into_iter()
            .filter(|(_, bounds)| frustum.test_aabb(bounds))
            .map(|(id, _)| id)
            .collect();
        self.stats.nodes_visible = visible.len() as u64;
        self.stats.nodes_culled = renderable.saturating_sub(self.stats.nodes_visible);
        visible
    }

    fn update_lods(&mut self, scene: &mut Scene, visible: &[NodeId], camera: &Camera) {
        for &id in visible {
            let Some(world) = scene.cached_world_matrix(id) else {
                continue;
            };
            let Some(group) = scene.lod_group_mut(id) else {
                continue;
            };
            let position = world.w_axis.truncate();
            let state = group.update(position, camera.position, self.time);
            match state {
                crate::lod::LodState::Stable(index) => self.stats.record_lod(index),
                crate::lod::LodState::Transitioning { to, .. } => {
                    self.stats.record_lod(to);
                    self.stats.lod_transitions += 1;
                }
            }
        }
    }

    /// Depth-render the visible set from every shadow-casting light.
    /// Returns whether shadow lookups should be used this frame.
    fn render_shadows(&mut self, scene: &Scene, visible: &[NodeId]) -> bool {
        if !self.config.shadows_enabled {
            return false;
        }
        self.shadow_maps.reset(self.lights.len());
        for (index, light) in self.lights.iter().enumerate() {
            if !(light.enabled && light.cast_shadows) {
                self.shadow_maps.disable(index);
                continue;
            }
            let Some(slot) = self.shadow_maps.slot_mut(index) else {
                continue;
            };
            let resolution = self.config.shadow.resolution;
            match *slot {
                Some(ref mut map) if map.width() == resolution => {
                    map.set_light(light, &self.config.shadow)
                }
                _ => match ShadowMap::for_light(light, &self.config.shadow) {
                    Ok(map) => *slot = Some(map),
                    Err(err) => {
                        log::warn!("shadow map for light {index} unavailable: {err}");
                        *slot = None;
                        continue;
                    }
                },
            }
            let Some(map) = slot.as_mut() else {
                continue;
            };
            for &id in visible {
                cast_shadow(scene, id, map);
            }
            self.stats.shadow_maps_rendered += 1;
        }
        self.shadow_maps.active() > 0
    }
}

/// Draw one node's payload. Returns (triangles submitted, draw calls).
fn draw_node<T: PixelTarget>(
    scene: &Scene,
    id: NodeId,
    rasterizer: &Rasterizer<'_>,
    target: &mut T,
    counters: &mut RasterCounters,
) -> (u64, u64) {
    let Some(node) = scene.node(id) else {
        return (0, 0);
    };
    let Some(payload) = node.payload.as_ref() else {
        return (0, 0);
    };
    let world = node.transform().cached_world();

    match payload {
        NodePayload::Triangle(t) => {
            let tri = SurfaceTriangle::from_triangle(t, &world);
            rasterizer.draw_triangle(target, &tri, &t.material, 1.0, counters);
            (1, 1)
        }
        NodePayload::Quad(q) => {
            for t in q.triangulate() {
                let tri = SurfaceTriangle::from_triangle(&t, &world);
                rasterizer.draw_triangle(target, &tri, &t.material, 1.0, counters);
            }
            (2, 1)
        }
        NodePayload::Circle(c) => {
            let fan = c.triangulate();
            for t in &fan {
                let tri = SurfaceTriangle::from_triangle(t, &world);
                rasterizer.draw_triangle(target, &tri, &t.material, 1.0, counters);
            }
            (fan.len() as u64, 1)
        }
        NodePayload::Line(l) => {
            rasterizer.draw_line(
                target,
                world.transform_point3(l.start),
                world.transform_point3(l.end),
                l.color,
                counters,
            );
            (0, 1)
        }
        NodePayload::Point(p) => {
            rasterizer.draw_point(target, world.transform_point3(p.position), p.color, p.size, counters);
            (0, 1)
        }
        NodePayload::Mesh(mesh) => {
            rasterizer.draw_mesh(target, mesh, &world, 1.0, counters);
            (mesh.triangle_count() as u64, 1)
        }
        NodePayload::Lod(group) => {
            let mut triangles = 0;
            let mut draws = 0;
            for (index, weight) in group.draws() {
                let Some(level) = group.levels().get(index) else {
                    continue;
                };
                rasterizer.draw_mesh(target, &level.mesh, &world, weight, counters);
                triangles += level.mesh.triangle_count() as u64;
                draws += 1;
            }
            (triangles, draws)
        }
        NodePayload::Instanced(inst) => {
            for m in &inst.instances {
                rasterizer.draw_mesh(target, &inst.mesh, &(world * *m), 1.0, counters);
            }
            let n = inst.instances.len() as u64;
            (inst.mesh.triangle_count() as u64 * n, n)
        }
    }
}

/// Rasterize a node's surfaces into a shadow map. LOD groups cast with
/// whichever level carries the most weight this frame.
fn cast_shadow(scene: &Scene, id: NodeId, map: &mut ShadowMap) {
    let Some(node) = scene.node(id) else {
        return;
    };
    let Some(payload) = node.payload.as_ref() else {
        return;
    };
    let world = node.transform().cached_world();
    match payload {
        NodePayload::Mesh(mesh) => map.render_mesh(mesh, &world),
        NodePayload::Lod(group) => {
            let index = group
                .draws()
                .into_iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(i, _)| i);
            if let Some(level) = group.levels().get(index) {
                map.render_mesh(&level.mesh, &world);
            }
        }
        NodePayload::Instanced(inst) => {
            for m in &inst.instances {
                map.render_mesh(&inst.mesh, &(world * *m));
            }
        }
        other => other.for_each_triangle(&mut |tri: [DVec3; 3]| {
            map.render_triangle(tri.map(|p| world.transform_point3(p)));
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{generate_cube, generate_plane};
    use crate::lod::{LodGroup, LodLevel};
    use crate::material::Material;
    use crate::scene::SceneNode;
    use crate::texture::Color;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn renderer() -> Renderer {
        let mut r = Renderer::new(RenderConfig::with_size(64, 48)).unwrap();
        r.camera.position = DVec3::new(0.0, 0.0, -60.0);
        r
    }

    fn cube_scene() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let cube = Arc::new(generate_cube(10.0, Arc::new(Material::basic(Color::RED))));
        let id = scene.add_node(SceneNode::new("cube").with_mesh(cube));
        (scene, id)
    }

    #[test]
    fn empty_scene_leaves_buffers_clear() {
        let mut r = renderer();
        let mut scene = Scene::new();
        let stats = r.render_frame(&mut scene, 0.016);
        assert_eq!(stats.raster.triangles_rendered, 0);
        assert!(r.framebuffer().depth_buffer.iter().all(|d| *d == f64::INFINITY));
        assert!(r.framebuffer().color_buffer.iter().all(|c| *c == Color::BLACK));
    }

    #[test]
    fn cube_in_view_is_drawn_and_back_faces_culled() {
        let mut r = renderer();
        let (mut scene, _) = cube_scene();
        let stats = r.render_frame(&mut scene, 0.016).clone();
        assert_eq!(stats.nodes_visible, 1);
        assert_eq!(stats.triangles_total, 12);
        assert!(stats.raster.triangles_culled >= 6);
        assert!(stats.raster.pixels_written > 0);
        let center = r.framebuffer().get_depth(32, 24).unwrap();
        assert!((center - 50.0).abs() < 1e-6, "{center}");
    }

    #[test]
    fn node_behind_camera_is_culled() {
        let mut r = renderer();
        let (mut scene, id) = cube_scene();
        scene.set_position(id, DVec3::new(0.0, 0.0, -200.0)).unwrap();
        let stats = r.render_frame(&mut scene, 0.016);
        assert_eq!(stats.nodes_visible, 0);
        assert_eq!(stats.nodes_culled, 1);
    }

    #[test]
    fn spatial_rebuilds_only_when_scene_changes() {
        let mut r = renderer();
        let (mut scene, id) = cube_scene();
        r.render_frame(&mut scene, 0.016);
        assert_eq!(r.stats().spatial_rebuilds, 1);
        r.render_frame(&mut scene, 0.016);
        assert_eq!(r.stats().spatial_rebuilds, 0);
        scene.translate(id, DVec3::X).unwrap();
        r.render_frame(&mut scene, 0.016);
        assert_eq!(r.stats().spatial_rebuilds, 1);
        assert!(r.stats().bvh_nodes > 0);
    }

    #[test]
    fn update_fn_sees_accumulated_time() {
        let mut r = renderer();
        let (mut scene, _) = cube_scene();
        let seen = Rc::new(Cell::new(0.0));
        let sink = seen.clone();
        r.set_update_fn(move |_, time, _| sink.set(time));
        r.render_frame(&mut scene, 0.5);
        r.render_frame(&mut scene, 0.25);
        assert_eq!(seen.get(), 0.75);
        assert_eq!(r.time(), 0.75);
    }

    #[test]
    fn lod_group_records_selection() {
        let mut r = renderer();
        let material = Arc::new(Material::default());
        let fine = Arc::new(generate_cube(5.0, material.clone()));
        let coarse = Arc::new(generate_cube(5.0, material));
        let group = LodGroup::new(vec![
            LodLevel { mesh: fine, max_distance: 20.0 },
            LodLevel { mesh: coarse, max_distance: 200.0 },
        ])
        .unwrap();
        let mut scene = Scene::new();
        scene.add_node(SceneNode::new("lod").with_payload(NodePayload::Lod(group)));
        r.render_frame(&mut scene, 0.016);
        assert_eq!(r.stats().lod_selections, vec![0, 1]);
    }

    #[test]
    fn shadows_darken_the_floor() {
        let mut config = RenderConfig::with_size(64, 64);
        config.shadows_enabled = true;
        config.ambient_intensity = 0.0;
        config.backface_culling = false;
        let mut r = Renderer::new(config).unwrap();
        r.camera.position = DVec3::new(0.0, 40.0, -0.001);
        r.camera.look_at(DVec3::ZERO, DVec3::Z);
        r.add_light(Light::directional(DVec3::NEG_Y, Color::WHITE, 1.0));

        let mut scene = Scene::new();
        let white = Arc::new(Material::basic(Color::WHITE));
        scene.add_node(SceneNode::new("floor").with_mesh(Arc::new(generate_plane(30.0, white.clone()))));
        scene.add_node(
            SceneNode::new("blocker")
                .with_mesh(Arc::new(generate_plane(5.0, white)))
                .with_position(DVec3::new(0.0, 10.0, 0.0)),
        );
        r.render_frame(&mut scene, 0.016);
        assert_eq!(r.stats().shadow_maps_rendered, 1);
        let map = r.shadow_map(0).unwrap();
        assert_eq!(map.sample(DVec3::ZERO), 0.0);
        assert_eq!(map.sample(DVec3::new(20.0, 0.0, 20.0)), 1.0);
    }

    #[test]
    fn shadow_maps_follow_resolution_changes() {
        let mut config = RenderConfig::with_size(32, 32);
        config.shadows_enabled = true;
        config.shadow.resolution = 64;
        let mut r = Renderer::new(config.clone()).unwrap();
        r.add_light(Light::directional(DVec3::NEG_Y, Color::WHITE, 1.0));
        let (mut scene, _) = cube_scene();

        r.render_frame(&mut scene, 0.016);
        assert_eq!(r.shadow_map(0).unwrap().width(), 64);

        config.shadow.resolution = 256;
        r.set_config(config).unwrap();
        r.render_frame(&mut scene, 0.016);
        let map = r.shadow_map(0).unwrap();
        assert_eq!((map.width(), map.height()), (256, 256));
        assert_eq!(r.stats().shadow_maps_rendered, 1);
    }

    #[test]
    fn raycast_uses_bvh() {
        let mut r = renderer();
        let (mut scene, id) = cube_scene();
        let ray = Ray::new(DVec3::new(0.0, 0.0, -50.0), DVec3::Z);
        let hit = r.raycast(&mut scene, &ray, 100.0).unwrap();
        assert_eq!(hit.node, id);
        assert!((hit.distance - 40.0).abs() < 1e-9);
        let miss = Ray::new(DVec3::new(30.0, 0.0, -50.0), DVec3::Z);
        assert!(r.raycast(&mut scene, &miss, 100.0).is_none());
    }

    #[test]
    fn resize_rejects_zero() {
        let mut r = renderer();
        assert!(r.resize(0, 10).is_err());
        r.resize(10, 5).unwrap();
        assert_eq!(r.framebuffer().color_buffer.len(), 50);
    }
}

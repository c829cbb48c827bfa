/// Per-frame statistics and stage timers.
///
/// Statistics are an explicit value owned by the renderer and reset at the
/// start of every frame; nothing here is process-global.
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Measures one stage and adds the elapsed time to a `Duration` slot.
pub struct ScopeTimer {
    start: Instant,
}

impl ScopeTimer {
    #[inline]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Add the elapsed time to `slot` and return it.
    #[inline]
    pub fn finish(self, slot: &mut Duration) -> Duration {
        let elapsed = self.elapsed();
        *slot += elapsed;
        elapsed
    }
}

/// Counters the rasterizer bumps while drawing into one target. Kept apart
/// from [`RenderStats`] so parallel stripe workers each own a set and merge
/// them afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterCounters {
    pub triangles_rendered: u64,
    pub triangles_culled: u64,
    pub triangles_clipped: u64,
    /// Degenerate or non-finite triangles dropped without drawing.
    pub triangles_skipped: u64,
    pub pixels_tested: u64,
    pub pixels_written: u64,
    /// Time spent clipping triangles that crossed the near plane.
    pub clip_time: Duration,
}

impl RasterCounters {
    pub fn merge(&mut self, other: &RasterCounters) {
        self.triangles_rendered += other.triangles_rendered;
        self.triangles_culled += other.triangles_culled;
        self.triangles_clipped += other.triangles_clipped;
        self.triangles_skipped += other.triangles_skipped;
        self.pixels_tested += other.pixels_tested;
        self.pixels_written += other.pixels_written;
        self.clip_time += other.clip_time;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub frame: u64,
    pub frame_time: Duration,
    pub update_time: Duration,
    pub render_time: Duration,
    pub culling_time: Duration,
    pub transform_time: Duration,
    /// Light and rasterizer setup for the main pass. Per-pixel shading
    /// runs inside the scanline loop and is part of `rasterization_time`.
    pub lighting_time: Duration,
    pub rasterization_time: Duration,
    pub clipping_time: Duration,
    pub shadow_time: Duration,

    pub triangles_total: u64,
    pub raster: RasterCounters,
    pub draw_calls: u64,

    pub nodes_tested: u64,
    pub nodes_visible: u64,
    pub nodes_culled: u64,

    /// Selections per LOD index this frame.
    pub lod_selections: Vec<u64>,
    pub lod_transitions: u64,

    pub bvh_nodes: usize,
    pub octree_nodes: usize,
    pub spatial_rebuilds: u64,
    pub spatial_queries: u64,
    pub shadow_maps_rendered: u64,
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero everything except the frame counter and structure sizes, which
    /// describe state that outlives a frame.
    pub fn begin_frame(&mut self) {
        let frame = self.frame + 1;
        let bvh_nodes = self.bvh_nodes;
        let octree_nodes = self.octree_nodes;
        *self = Self {
            frame,
            bvh_nodes,
            octree_nodes,
            ..Self::default()
        };
    }

    pub fn record_lod(&mut self, index: usize) {
        if self.lod_selections.len() <= index {
            self.lod_selections.resize(index + 1, 0);
        }
        self.lod_selections[index] += 1;
    }

    #[inline]
    pub fn triangles_rendered(&self) -> u64 {
        self.raster.triangles_rendered
    }

    #[inline]
    pub fn triangles_culled(&self) -> u64 {
        self.raster.triangles_culled
    }

    pub fn fps(&self) -> f64 {
        let secs = self.frame_time.as_secs_f64();
        if secs > 0.0 {
            1.0 / secs
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> String {
        let total_us = self.frame_time.as_secs_f64() * 1e6;
        let pct = |d: Duration| {
            if total_us > 0.0 {
                d.as_secs_f64() * 1e6 / total_us * 100.0
            } else {
                0.0
            }
        };
        let mut s = String::new();
        let _ = writeln!(s, "========== FRAME {} ==========", self.frame);
        for (label, d) in [
            ("Update", self.update_time),
            ("Culling", self.culling_time),
            ("Transform", self.transform_time),
            ("Clipping", self.clipping_time),
            ("Shadows", self.shadow_time),
            ("Lighting setup", self.lighting_time),
            ("Rasterization", self.rasterization_time),
            ("Render", self.render_time),
        ] {
            let _ = writeln!(
                s,
                "{:<15}{:10.2}us ({:5.1}%)",
                label,
                d.as_secs_f64() * 1e6,
                pct(d)
            );
        }
        let _ = writeln!(s, "{:<15}{:10.2}us ({:.1} fps)", "Total", total_us, self.fps());
        let _ = writeln!(
            s,
            "Triangles: {} rendered / {} total, {} culled, {} clipped, {} skipped",
            self.raster.triangles_rendered,
            self.triangles_total,
            self.raster.triangles_culled,
            self.raster.triangles_clipped,
            self.raster.triangles_skipped
        );
        let _ = writeln!(
            s,
            "Pixels: {} written / {} tested, {} draw calls",
            self.raster.pixels_written, self.raster.pixels_tested, self.draw_calls
        );
        let _ = writeln!(
            s,
            "Nodes: {} visible / {} tested, {} culled",
            self.nodes_visible, self.nodes_tested, self.nodes_culled
        );
        let _ = writeln!(
            s,
            "LOD: {:?} selections, {} transitioning",
            self.lod_selections, self.lod_transitions
        );
        let _ = write!(
            s,
            "Spatial: bvh {} nodes, octree {} nodes, {} rebuilds, {} queries",
            self.bvh_nodes, self.octree_nodes, self.spatial_rebuilds, self.spatial_queries
        );
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_frame_resets_counters() {
        let mut stats = RenderStats::new();
        stats.raster.triangles_rendered = 10;
        stats.bvh_nodes = 7;
        stats.record_lod(2);
        stats.begin_frame();
        assert_eq!(stats.frame, 1);
        assert_eq!(stats.raster.triangles_rendered, 0);
        assert!(stats.lod_selections.is_empty());
        assert_eq!(stats.bvh_nodes, 7);
    }

    #[test]
    fn scope_timer_accumulates() {
        let mut slot = Duration::from_millis(5);
        let t = ScopeTimer::start();
        let elapsed = t.finish(&mut slot);
        assert_eq!(slot, Duration::from_millis(5) + elapsed);
    }

    #[test]
    fn summary_mentions_counts() {
        let mut stats = RenderStats::new();
        stats.triangles_total = 12;
        stats.raster.triangles_rendered = 6;
        stats.record_lod(1);
        let text = stats.summary();
        assert!(text.contains("6 rendered / 12 total"));
        assert!(text.contains("[0, 1]"));
        assert!(text.contains("Lighting setup"));
    }

    #[test]
    fn counters_merge() {
        let mut a = RasterCounters {
            pixels_written: 3,
            ..Default::default()
        };
        a.merge(&RasterCounters {
            pixels_written: 4,
            triangles_culled: 1,
            ..Default::default()
        });
        assert_eq!(a.pixels_written, 7);
        assert_eq!(a.triangles_culled, 1);
    }
}

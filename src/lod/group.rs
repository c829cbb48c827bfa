/// Distance-based level-of-detail selection with optional cross-fading.
use crate::error::{RenderError, Result};
use crate::geometry::Mesh;
use crate::spatial::Aabb;
use glam::DVec3;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LodLevel {
    pub mesh: Arc<Mesh>,
    /// Farthest camera distance at which this level is chosen.
    pub max_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LodState {
    Stable(usize),
    /// Blending from `from` to `to`; `alpha` is the incoming weight.
    Transitioning {
        from: usize,
        to: usize,
        start_time: f64,
        alpha: f64,
    },
}

#[derive(Debug, Clone)]
pub struct LodGroup {
    levels: Vec<LodLevel>,
    /// Cross-fade length in seconds; 0 switches instantly.
    fade_duration: f64,
    /// `None` until the first update, which snaps without fading.
    state: Option<LodState>,
}

impl LodGroup {
    /// Distances must be strictly increasing; the last level is also used
    /// beyond its own distance.
    pub fn new(levels: Vec<LodLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(RenderError::InvalidConfiguration(
                "LOD group needs at least one level".into(),
            ));
        }
        for pair in levels.windows(2) {
            if !(pair[1].max_distance > pair[0].max_distance) {
                return Err(RenderError::InvalidConfiguration(format!(
                    "LOD distances must be strictly increasing ({} then {})",
                    pair[0].max_distance, pair[1].max_distance
                )));
            }
        }
        Ok(Self {
            levels,
            fade_duration: 0.0,
            state: None,
        })
    }

    pub fn with_cross_fade(mut self, duration: f64) -> Self {
        self.fade_duration = duration.max(0.0);
        self
    }

    #[inline]
    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn fade_duration(&self) -> f64 {
        self.fade_duration
    }

    #[inline]
    pub fn state(&self) -> Option<LodState> {
        self.state
    }

    /// Smallest index whose distance covers `distance`, else the last.
    pub fn select_index(&self, distance: f64) -> usize {
        self.levels
            .iter()
            .position(|l| l.max_distance >= distance)
            .unwrap_or(self.levels.len() - 1)
    }

    pub fn select(&self, world_position: DVec3, camera_position: DVec3) -> usize {
        self.select_index(world_position.distance(camera_position))
    }

    /// Advance the transition state machine to `time` (seconds).
    pub fn update(&mut self, world_position: DVec3, camera_position: DVec3, time: f64) -> LodState {
        let target = self.select(world_position, camera_position);
        let next = match self.state {
            None => LodState::Stable(target),
            Some(LodState::Stable(current)) => {
                if current != target && self.fade_duration > 0.0 {
                    LodState::Transitioning {
                        from: current,
                        to: target,
                        start_time: time,
                        alpha: 0.0,
                    }
                } else {
                    LodState::Stable(target)
                }
            }
            Some(LodState::Transitioning {
                from,
                to,
                start_time,
                ..
            }) => {
                let alpha = (time - start_time) / self.fade_duration;
                if !(alpha < 1.0) {
                    LodState::Stable(to)
                } else {
                    LodState::Transitioning {
                        from,
                        to,
                        start_time,
                        alpha: alpha.max(0.0),
                    }
                }
            }
        };
        self.state = Some(next);
        next
    }

    /// Levels to draw with their color weights.
    pub fn draws(&self) -> Vec<(usize, f64)> {
        match self.state {
            None => vec![(0, 1.0)],
            Some(LodState::Stable(i)) => vec![(i, 1.0)],
            Some(LodState::Transitioning { from, to, alpha, .. }) => {
                vec![(from, 1.0 - alpha), (to, alpha)]
            }
        }
    }

    /// Union of every level's bounds.
    pub fn bounds(&self) -> Aabb {
        self.levels
            .iter()
            .map(|l| l.mesh.bounds())
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default()
    }
}

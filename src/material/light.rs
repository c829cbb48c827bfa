/// Point, directional and spot lights.
use crate::math::{safe_normalize, smoothstep};
use crate::texture::Color;
use glam::DVec3;

/// Cone of a spot light. Intensity is full inside
/// `half_angle * (1 - falloff)` and fades smoothly to zero at `half_angle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotCone {
    /// Half-angle of the cone in degrees.
    pub half_angle: f64,
    /// Fraction of the cone, in [0, 1], spent fading out.
    pub falloff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point,
    /// Parallel rays travelling along `direction`.
    Directional { direction: DVec3 },
    Spot { direction: DVec3, cone: SpotCone },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: DVec3,
    pub color: Color,
    pub intensity: f64,
    pub enabled: bool,
    pub cast_shadows: bool,
}

/// Incident light at a surface point.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    /// Unit vector from the surface towards the light.
    pub to_light: DVec3,
    /// Light color (0..1 per channel) times intensity, attenuation and cone.
    pub radiance: DVec3,
}

/// Below this distance point lights stop brightening, so 1/d^2 cannot blow up.
const MIN_ATTENUATION_DISTANCE: f64 = 1.0;

impl Light {
    pub fn point(position: DVec3, color: Color, intensity: f64) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            color,
            intensity,
            enabled: true,
            cast_shadows: true,
        }
    }

    pub fn directional(direction: DVec3, color: Color, intensity: f64) -> Self {
        Self {
            kind: LightKind::Directional {
                direction: safe_normalize(direction),
            },
            position: DVec3::ZERO,
            color,
            intensity,
            enabled: true,
            cast_shadows: true,
        }
    }

    pub fn spot(position: DVec3, direction: DVec3, cone: SpotCone, color: Color, intensity: f64) -> Self {
        Self {
            kind: LightKind::Spot {
                direction: safe_normalize(direction),
                cone,
            },
            position,
            color,
            intensity,
            enabled: true,
            cast_shadows: true,
        }
    }

    /// Direction the light travels, for lights that have one.
    pub fn direction(&self) -> Option<DVec3> {
        match self.kind {
            LightKind::Point => None,
            LightKind::Directional { direction } | LightKind::Spot { direction, .. } => {
                Some(direction)
            }
        }
    }

    /// Light arriving at `point`, or `None` when disabled or outside a spot cone.
    pub fn sample(&self, point: DVec3) -> Option<LightSample> {
        if !self.enabled {
            return None;
        }
        let base = self.color.to_unit() * self.intensity;
        match self.kind {
            LightKind::Directional { direction } => Some(LightSample {
                to_light: -direction,
                radiance: base,
            }),
            LightKind::Point => {
                let (to_light, attenuation) = self.attenuate(point);
                Some(LightSample {
                    to_light,
                    radiance: base * attenuation,
                })
            }
            LightKind::Spot { direction, cone } => {
                let (to_light, attenuation) = self.attenuate(point);
                let cos_angle = (-to_light).dot(direction);
                let outer = cone.half_angle.to_radians().cos();
                let inner = (cone.half_angle * (1.0 - cone.falloff.clamp(0.0, 1.0)))
                    .to_radians()
                    .cos();
                let factor = smoothstep(outer, inner, cos_angle);
                if factor <= 0.0 {
                    return None;
                }
                Some(LightSample {
                    to_light,
                    radiance: base * attenuation * factor,
                })
            }
        }
    }

    #[inline]
    fn attenuate(&self, point: DVec3) -> (DVec3, f64) {
        let delta = self.position - point;
        let d = delta.length().max(MIN_ATTENUATION_DISTANCE);
        (safe_normalize(delta), 1.0 / (d * d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_inverse_square() {
        let light = Light::point(DVec3::new(0.0, 10.0, 0.0), Color::WHITE, 100.0);
        let s = light.sample(DVec3::ZERO).unwrap();
        assert!((s.to_light - DVec3::Y).length() < 1e-12);
        assert!((s.radiance.x - 1.0).abs() < 1e-9);

        let far = light.sample(DVec3::new(0.0, -10.0, 0.0)).unwrap();
        assert!((far.radiance.x - 0.25).abs() < 1e-9);
    }

    #[test]
    fn directional_light_has_no_attenuation() {
        let light = Light::directional(DVec3::new(0.0, -2.0, 0.0), Color::WHITE, 0.5);
        let s = light.sample(DVec3::new(1000.0, 0.0, 0.0)).unwrap();
        assert!((s.to_light - DVec3::Y).length() < 1e-12);
        assert!((s.radiance.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn spot_cone_cuts_off() {
        let cone = SpotCone {
            half_angle: 30.0,
            falloff: 0.2,
        };
        let light = Light::spot(DVec3::new(0.0, 10.0, 0.0), DVec3::NEG_Y, cone, Color::WHITE, 100.0);
        assert!(light.sample(DVec3::ZERO).is_some());
        // 45 degrees off-axis is outside the cone.
        assert!(light.sample(DVec3::new(10.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn disabled_light_contributes_nothing() {
        let mut light = Light::point(DVec3::ZERO, Color::WHITE, 1.0);
        light.enabled = false;
        assert!(light.sample(DVec3::X).is_none());
    }
}

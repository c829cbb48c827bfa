/// Local TRS transform with a cached world matrix.
use glam::{DMat4, DQuat, DVec3};

#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    position: DVec3,
    rotation: DQuat,
    scale: DVec3,
    world: DMat4,
    dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
            world: DMat4::IDENTITY,
            dirty: true,
        }
    }
}

/// Non-finite or zero quaternions become the identity.
#[inline]
fn normalize_rotation(q: DQuat) -> DQuat {
    let len = q.length();
    if len.is_finite() && len > 1e-12 {
        q / len
    } else {
        DQuat::IDENTITY
    }
}

impl Transform {
    pub fn new(position: DVec3, rotation: DQuat, scale: DVec3) -> Self {
        Self {
            position,
            rotation: normalize_rotation(rotation),
            scale,
            ..Self::default()
        }
    }

    #[inline]
    pub fn position(&self) -> DVec3 {
        self.position
    }

    #[inline]
    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    #[inline]
    pub fn scale(&self) -> DVec3 {
        self.scale
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_position(&mut self, position: DVec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_rotation(&mut self, rotation: DQuat) {
        self.rotation = normalize_rotation(rotation);
        self.dirty = true;
    }

    pub fn set_scale(&mut self, scale: DVec3) {
        self.scale = scale;
        self.dirty = true;
    }

    pub fn translate(&mut self, delta: DVec3) {
        self.set_position(self.position + delta);
    }

    /// Apply `delta` after the current rotation (world-axis rotation).
    pub fn rotate(&mut self, delta: DQuat) {
        self.set_rotation(delta * self.rotation);
    }

    /// translate * rotate * scale
    pub fn local_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Cached world matrix; stale while `is_dirty()`.
    #[inline]
    pub fn cached_world(&self) -> DMat4 {
        self.world
    }

    pub(crate) fn store_world(&mut self, world: DMat4) {
        self.world = world;
        self.dirty = false;
    }
}

//! Hierarchical scene graph.
//!
//! Nodes live in an arena owned by [`Scene`] and are addressed by
//! generational [`NodeId`]s, so a removed node's id never aliases a later
//! one. The parent link is a plain id and children are listed on their
//! parent; re-parenting refuses to create cycles, keeping the graph a
//! forest.
//!
//! Transform mutations go through the scene so the dirty flag reaches every
//! descendant. World matrices are recomputed lazily by [`Scene::world_matrix`]
//! or eagerly for all nodes by [`Scene::update_world_matrices`].

pub mod node;
pub mod transform;

pub use node::{InstancedMesh, NodePayload, SceneNode};
pub use transform::Transform;

use crate::error::{RenderError, Result};
use crate::lod::LodGroup;
use crate::spatial::{Aabb, Ray};
use glam::{DMat4, DQuat, DVec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Closest surface hit of a ray against the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub node: NodeId,
    pub point: DVec3,
    /// World-space distance from the ray origin.
    pub distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
    /// Bumped whenever the node set, payloads or transforms change.
    revision: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes whenever cached spatial structures may be stale.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    /// Mutable access to name, tags and payload. Bumps the revision since
    /// the payload (and so the bounds) may change.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.revision += 1;
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    /// LOD group carried by `id`. Cross-fade state does not change bounds,
    /// so this leaves the revision alone.
    pub(crate) fn lod_group_mut(&mut self, id: NodeId) -> Option<&mut LodGroup> {
        let node = self
            .slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())?;
        match node.payload.as_mut()? {
            NodePayload::Lod(group) => Some(group),
            _ => None,
        }
    }

    fn get(&self, id: NodeId) -> Result<&SceneNode> {
        self.node(id)
            .ok_or_else(|| RenderError::InvalidHierarchy(format!("stale node id {:?}", id)))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
            .ok_or_else(|| RenderError::InvalidHierarchy(format!("stale node id {:?}", id)))
    }

    fn allocate(&mut self, mut node: SceneNode) -> NodeId {
        node.parent = None;
        node.children.clear();
        node.transform.mark_dirty();
        self.revision += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Insert a root node. Any parent/children carried by `node` are ignored.
    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        let id = self.allocate(node);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId> {
        self.get(parent)?;
        let id = self.allocate(node);
        self.link(id, parent)?;
        Ok(id)
    }

    fn link(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.get_mut(parent)?.children.push(child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn unlink(&mut self, child: NodeId) -> Result<()> {
        match self.get(child)?.parent {
            Some(parent) => {
                self.get_mut(parent)?.children.retain(|&c| c != child);
                self.get_mut(child)?.parent = None;
            }
            None => self.roots.retain(|&r| r != child),
        }
        Ok(())
    }

    /// Move `child` under `parent` (or to the root list for `None`).
    /// Fails without changes if `parent` is `child` or one of its descendants.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<()> {
        self.get(child)?;
        if let Some(p) = parent {
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == child {
                    return Err(RenderError::InvalidHierarchy(format!(
                        "re-parenting {:?} under {:?} would create a cycle",
                        child, p
                    )));
                }
                cursor = self.get(c)?.parent;
            }
        }
        self.unlink(child)?;
        match parent {
            Some(p) => self.link(child, p)?,
            None => self.roots.push(child),
        }
        self.mark_subtree_dirty(child);
        self.revision += 1;
        Ok(())
    }

    /// Remove `child` (and its subtree) from under `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.get(child)?.parent != Some(parent) {
            return Err(RenderError::InvalidHierarchy(format!(
                "{:?} is not a child of {:?}",
                child, parent
            )));
        }
        self.remove_node(child)
    }

    /// Remove a node and its whole subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.unlink(id)?;
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let slot = &mut self.slots[n.index()];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(n.index);
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// All live node ids in depth-first pre-order, roots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
            Some(id)
        })
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter()
            .find(|&id| self.node(id).is_some_and(|n| n.name == name))
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.iter()
            .filter(|&id| self.node(id).is_some_and(|n| n.has_tag(tag)))
            .collect()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[][..], |n| n.children())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<()> {
        self.get_mut(id)?.enabled = enabled;
        self.revision += 1;
        Ok(())
    }

    /// Enabled, and every ancestor enabled too.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            match self.node(c) {
                Some(n) if n.enabled => cursor = n.parent,
                _ => return false,
            }
        }
        true
    }

    fn mark_subtree_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Ok(node) = self.get_mut(n) {
                node.transform.mark_dirty();
                stack.extend(node.children.iter().copied());
            }
        }
    }

    fn mutate_transform(&mut self, id: NodeId, f: impl FnOnce(&mut Transform)) -> Result<()> {
        f(&mut self.get_mut(id)?.transform);
        self.mark_subtree_dirty(id);
        self.revision += 1;
        Ok(())
    }

    pub fn set_position(&mut self, id: NodeId, position: DVec3) -> Result<()> {
        self.mutate_transform(id, |t| t.set_position(position))
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: DQuat) -> Result<()> {
        self.mutate_transform(id, |t| t.set_rotation(rotation))
    }

    pub fn set_scale(&mut self, id: NodeId, scale: DVec3) -> Result<()> {
        self.mutate_transform(id, |t| t.set_scale(scale))
    }

    pub fn translate(&mut self, id: NodeId, delta: DVec3) -> Result<()> {
        self.mutate_transform(id, |t| t.translate(delta))
    }

    pub fn rotate(&mut self, id: NodeId, delta: DQuat) -> Result<()> {
        self.mutate_transform(id, |t| t.rotate(delta))
    }

    /// World matrix of `id`, recomputing along the dirty chain to the
    /// nearest clean ancestor. Stale ids yield the identity.
    pub fn world_matrix(&mut self, id: NodeId) -> DMat4 {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        let mut base = DMat4::IDENTITY;
        while let Some(c) = cursor {
            let Some(node) = self.node(c) else {
                break;
            };
            if !node.transform.is_dirty() {
                base = node.transform.cached_world();
                break;
            }
            chain.push(c);
            cursor = node.parent;
        }
        for c in chain.into_iter().rev() {
            if let Ok(node) = self.get_mut(c) {
                base = base * node.transform.local_matrix();
                node.transform.store_world(base);
            }
        }
        base
    }

    /// Bring every node's cached world matrix up to date.
    pub fn update_world_matrices(&mut self) {
        let ids: Vec<NodeId> = self.iter().collect();
        for id in ids {
            self.world_matrix(id);
        }
    }

    /// Cached world matrix without recomputation; valid after
    /// [`Scene::update_world_matrices`].
    pub fn cached_world_matrix(&self, id: NodeId) -> Option<DMat4> {
        self.node(id).map(|n| n.transform.cached_world())
    }

    /// World-space bounds of the node's payload, from the cached matrix.
    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        let node = self.node(id)?;
        let payload = node.payload.as_ref()?;
        Some(payload.local_bounds().transform_into(&node.transform.cached_world()))
    }

    /// Visible nodes with a payload and their world bounds, in `iter` order.
    pub fn collect_bounds(&self) -> Vec<(NodeId, Aabb)> {
        self.iter()
            .filter(|&id| self.is_visible(id))
            .filter_map(|id| self.world_bounds(id).map(|b| (id, b)))
            .collect()
    }

    /// Ray test against one node using its cached world matrix: the ray is
    /// taken into the local frame, tested against the local bounds and only
    /// then against the payload triangles.
    pub fn raycast_node(&self, id: NodeId, ray: &Ray, max_distance: f64) -> Option<RaycastHit> {
        let node = self.node(id)?;
        let payload = node.payload.as_ref()?;
        let world = node.transform.cached_world();
        let inverse = world.inverse();
        if !inverse.is_finite() {
            return None;
        }
        let local_ray = ray.transformed(&inverse);
        payload.local_bounds().ray_intersection(&local_ray, f64::INFINITY)?;

        let mut best: Option<(f64, DVec3)> = None;
        payload.for_each_triangle(&mut |[a, b, c]| {
            if let Some(t) = local_ray.intersect_triangle(a, b, c) {
                let point = world.transform_point3(local_ray.at(t));
                let distance = point.distance(ray.origin);
                if distance <= max_distance && best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, point));
                }
            }
        });
        best.map(|(distance, point)| RaycastHit {
            node: id,
            point,
            distance,
        })
    }

    /// Closest hit over every visible node. Refreshes world matrices first.
    pub fn raycast(&mut self, ray: &Ray, max_distance: f64) -> Option<RaycastHit> {
        self.update_world_matrices();
        let mut best: Option<RaycastHit> = None;
        for id in self.iter() {
            if !self.is_visible(id) {
                continue;
            }
            if let Some(hit) = self.raycast_node(id, ray, max_distance) {
                if best.map_or(true, |b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }
}

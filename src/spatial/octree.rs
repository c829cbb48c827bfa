/// Octree over AABBs. Objects straddling octant boundaries are stored in
/// every child they overlap and deduplicated on query.
use super::Aabb;
use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    pub max_depth: u32,
    /// A leaf splits once it holds more than this many objects.
    pub max_objects: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_objects: 8,
        }
    }
}

#[derive(Debug, Clone)]
struct OctreeNode {
    bounds: Aabb,
    depth: u32,
    children: Option<[usize; 8]>,
    objects: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Octree<T> {
    entries: Vec<(T, Aabb)>,
    nodes: Vec<OctreeNode>,
    config: OctreeConfig,
}

impl<T: Copy> Octree<T> {
    pub fn new(bounds: Aabb, config: OctreeConfig) -> Self {
        Self {
            entries: Vec::new(),
            nodes: vec![OctreeNode {
                bounds,
                depth: 0,
                children: None,
                objects: Vec::new(),
            }],
            config,
        }
    }

    /// Root bounds enclose every entry.
    pub fn build(entries: Vec<(T, Aabb)>, config: OctreeConfig) -> Self {
        let root = entries
            .iter()
            .map(|(_, b)| *b)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        let mut tree = Self::new(root, config);
        for (handle, bounds) in entries {
            tree.insert(handle, bounds);
        }
        log::debug!(
            "octree built: {} entries, {} nodes",
            tree.entries.len(),
            tree.nodes.len()
        );
        tree
    }

    /// Objects outside the root bounds stay in the root node.
    pub fn insert(&mut self, handle: T, bounds: Aabb) {
        let index = self.entries.len();
        self.entries.push((handle, bounds));
        self.insert_into(0, index);
    }

    fn insert_into(&mut self, node: usize, entry: usize) {
        let bounds = self.entries[entry].1;
        if let Some(children) = self.nodes[node].children {
            let mut placed = false;
            for c in children {
                if self.nodes[c].bounds.intersects(&bounds) {
                    self.insert_into(c, entry);
                    placed = true;
                }
            }
            if !placed {
                self.nodes[node].objects.push(entry);
            }
            return;
        }

        self.nodes[node].objects.push(entry);
        let n = &self.nodes[node];
        if n.objects.len() > self.config.max_objects && n.depth < self.config.max_depth {
            self.subdivide(node);
        }
    }

    fn subdivide(&mut self, node: usize) {
        let OctreeNode { bounds, depth, .. } = self.nodes[node];
        let center = bounds.center();
        let mut children = [0usize; 8];
        for (octant, slot) in children.iter_mut().enumerate() {
            let pick = |bit: usize, axis: usize| {
                if octant & bit != 0 {
                    (center[axis], bounds.max[axis])
                } else {
                    (bounds.min[axis], center[axis])
                }
            };
            let (x0, x1) = pick(1, 0);
            let (y0, y1) = pick(2, 1);
            let (z0, z1) = pick(4, 2);
            *slot = self.nodes.len();
            self.nodes.push(OctreeNode {
                bounds: Aabb::new(DVec3::new(x0, y0, z0), DVec3::new(x1, y1, z1)),
                depth: depth + 1,
                children: None,
                objects: Vec::new(),
            });
        }
        self.nodes[node].children = Some(children);
        let objects = std::mem::take(&mut self.nodes[node].objects);
        for entry in objects {
            self.insert_into(node, entry);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bounds
    }

    /// Handles whose bounds intersect `query`, each once, in insertion order.
    pub fn query(&self, query: &Aabb) -> Vec<T> {
        let mut hits = Vec::new();
        let mut stack = vec![0usize];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n];
            // Root-held objects may lie outside the root bounds.
            if n != 0 && !node.bounds.intersects(query) {
                continue;
            }
            hits.extend(
                node.objects
                    .iter()
                    .copied()
                    .filter(|&i| self.entries[i].1.intersects(query)),
            );
            if let Some(children) = node.children {
                if node.bounds.intersects(query) {
                    stack.extend(children);
                }
            }
        }
        hits.sort_unstable();
        hits.dedup();
        hits.into_iter().map(|i| self.entries[i].0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_box(p: DVec3) -> Aabb {
        Aabb::from_center_half_extents(p, DVec3::splat(0.25))
    }

    #[test]
    fn query_matches_brute_force_and_dedupes() {
        let mut entries = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                for k in 0..6 {
                    let id = (i * 36 + j * 6 + k) as u32;
                    entries.push((id, small_box(DVec3::new(i as f64, j as f64, k as f64))));
                }
            }
        }
        // One object spanning the whole volume lands in many octants.
        entries.push((999, Aabb::new(DVec3::splat(-1.0), DVec3::splat(6.0))));
        let tree = Octree::build(entries.clone(), OctreeConfig::default());
        assert!(tree.node_count() > 1);

        let q = Aabb::new(DVec3::new(0.5, 0.5, 0.5), DVec3::new(2.5, 3.5, 1.5));
        let expected: Vec<u32> = entries
            .iter()
            .filter(|(_, b)| b.intersects(&q))
            .map(|(h, _)| *h)
            .collect();
        assert_eq!(tree.query(&q), expected);
    }

    #[test]
    fn respects_max_depth() {
        let config = OctreeConfig {
            max_depth: 0,
            max_objects: 1,
        };
        let tree = Octree::build(
            (0..20u32).map(|i| (i, small_box(DVec3::splat(i as f64)))).collect(),
            config,
        );
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.query(&tree.bounds()).len(), 20);
    }

    #[test]
    fn outside_root_objects_are_kept() {
        let mut tree = Octree::new(Aabb::new(DVec3::ZERO, DVec3::ONE), OctreeConfig::default());
        tree.insert(1u32, small_box(DVec3::splat(50.0)));
        assert_eq!(tree.query(&small_box(DVec3::splat(50.0))), vec![1]);
    }
}

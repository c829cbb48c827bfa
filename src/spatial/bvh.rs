/// Bounding-volume hierarchy built top-down by median split.
use super::{Aabb, Ray};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
enum BvhNode {
    Internal { bounds: Aabb, left: usize, right: usize },
    /// `items` index into `Bvh::entries`, in insertion order.
    Leaf { bounds: Aabb, items: Vec<usize> },
}

impl BvhNode {
    #[inline]
    fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Internal { bounds, .. } | BvhNode::Leaf { bounds, .. } => bounds,
        }
    }
}

/// Static BVH over `(handle, bounds)` pairs. Every internal node's bounds
/// contain both children's bounds.
#[derive(Debug, Clone)]
pub struct Bvh<T> {
    entries: Vec<(T, Aabb)>,
    nodes: Vec<BvhNode>,
    leaf_size: usize,
}

impl<T: Copy> Bvh<T> {
    /// Build over `entries`; leaves hold at most `leaf_size` (>= 1) items.
    pub fn build(entries: Vec<(T, Aabb)>, leaf_size: usize) -> Self {
        let mut bvh = Self {
            entries,
            nodes: Vec::new(),
            leaf_size: leaf_size.max(1),
        };
        if !bvh.entries.is_empty() {
            let mut order: Vec<usize> = (0..bvh.entries.len()).collect();
            bvh.build_recursive(&mut order);
        }
        log::debug!(
            "bvh built: {} entries, {} nodes, leaf size {}",
            bvh.entries.len(),
            bvh.nodes.len(),
            bvh.leaf_size
        );
        bvh
    }

    /// Returns the index of the created node; the root is always node 0.
    fn build_recursive(&mut self, items: &mut [usize]) -> usize {
        let bounds = items
            .iter()
            .map(|&i| self.entries[i].1)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();

        let index = self.nodes.len();
        if items.len() <= self.leaf_size {
            let mut leaf_items = items.to_vec();
            leaf_items.sort_unstable();
            self.nodes.push(BvhNode::Leaf {
                bounds,
                items: leaf_items,
            });
            return index;
        }

        // Reserve the slot so the parent precedes its children.
        self.nodes.push(BvhNode::Leaf {
            bounds,
            items: Vec::new(),
        });

        let axis = bounds.longest_axis();
        let entries = &self.entries;
        let key = |i: &usize| entries[*i].1.center()[axis];
        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| {
            key(a).total_cmp(&key(b)).then_with(|| a.cmp(b))
        });

        let (lo, hi) = items.split_at_mut(mid);
        let left = self.build_recursive(lo);
        let right = self.build_recursive(hi);
        self.nodes[index] = BvhNode::Internal {
            bounds,
            left,
            right,
        };
        index
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

    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| *n.bounds())
    }

    /// Handles whose bounds intersect `query`, in insertion order.
    pub fn query(&self, query: &Aabb) -> Vec<T> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<usize> = Vec::new();
        let mut stack = vec![0usize];
        while let Some(n) = stack.pop() {
            match &self.nodes[n] {
                BvhNode::Internal {
                    bounds,
                    left,
                    right,
                } => {
                    if bounds.intersects(query) {
                        stack.push(*right);
                        stack.push(*left);
                    }
                }
                BvhNode::Leaf { bounds, items } => {
                    if bounds.intersects(query) {
                        hits.extend(items.iter().copied().filter(|&i| self.entries[i].1.intersects(query)));
                    }
                }
            }
        }
        hits.sort_unstable();
        hits.into_iter().map(|i| self.entries[i].0).collect()
    }

    /// Closest hit within `max_distance`. `hit_test` refines a candidate
    /// whose bounds the ray enters and returns its hit distance.
    /// Ties resolve to the smaller distance, then the earlier inserted entry.
    pub fn raycast<F>(&self, ray: &Ray, max_distance: f64, mut hit_test: F) -> Option<(T, f64)>
    where
        F: FnMut(T, &Ray, f64) -> Option<f64>,
    {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        let mut stack = vec![0usize];
        while let Some(n) = stack.pop() {
            let limit = best.map_or(max_distance, |(_, d)| d);
            let node = &self.nodes[n];
            if node.bounds().ray_intersection(ray, limit).is_none() {
                continue;
            }
            match node {
                BvhNode::Internal { left, right, .. } => {
                    let tl = self.nodes[*left].bounds().ray_intersection(ray, limit);
                    let tr = self.nodes[*right].bounds().ray_intersection(ray, limit);
                    // Push the farther child first so the nearer is visited first.
                    match (tl, tr) {
                        (Some(a), Some(b)) => {
                            if a <= b {
                                stack.push(*right);
                                stack.push(*left);
                            } else {
                                stack.push(*left);
                                stack.push(*right);
                            }
                        }
                        (Some(_), None) => stack.push(*left),
                        (None, Some(_)) => stack.push(*right),
                        (None, None) => {}
                    }
                }
                BvhNode::Leaf { items, .. } => {
                    for &i in items {
                        let (handle, bounds) = self.entries[i];
                        let limit = best.map_or(max_distance, |(_, d)| d);
                        if bounds.ray_intersection(ray, limit).is_none() {
                            continue;
                        }
                        let Some(d) = hit_test(handle, ray, max_distance) else {
                            continue;
                        };
                        if d > max_distance {
                            continue;
                        }
                        let better = match best {
                            None => true,
                            Some((bi, bd)) => match d.total_cmp(&bd) {
                                Ordering::Less => true,
                                Ordering::Equal => i < bi,
                                Ordering::Greater => false,
                            },
                        };
                        if better {
                            best = Some((i, d));
                        }
                    }
                }
            }
        }
        best.map(|(i, d)| (self.entries[i].0, d))
    }

    /// Checks the containment invariant over the whole tree.
    pub fn validate(&self) -> bool {
        self.nodes.iter().all(|node| match node {
            BvhNode::Internal {
                bounds,
                left,
                right,
            } => {
                bounds.contains_aabb(self.nodes[*left].bounds())
                    && bounds.contains_aabb(self.nodes[*right].bounds())
            }
            BvhNode::Leaf { bounds, items } => {
                items.iter().all(|&i| bounds.contains_aabb(&self.entries[i].1))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn unit_box(x: f64, y: f64, z: f64) -> Aabb {
        Aabb::from_center_half_extents(DVec3::new(x, y, z), DVec3::splat(0.5))
    }

    fn grid() -> Vec<(u32, Aabb)> {
        let mut out = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                out.push((i * 10 + j, unit_box(i as f64 * 3.0, j as f64 * 3.0, 0.0)));
            }
        }
        out
    }

    #[test]
    fn query_matches_brute_force() {
        let entries = grid();
        let bvh = Bvh::build(entries.clone(), 4);
        assert!(bvh.validate());
        let q = Aabb::new(DVec3::new(2.0, 2.0, -1.0), DVec3::new(10.0, 7.0, 1.0));
        let expected: Vec<u32> = entries
            .iter()
            .filter(|(_, b)| b.intersects(&q))
            .map(|(h, _)| *h)
            .collect();
        assert_eq!(bvh.query(&q), expected);
    }

    #[test]
    fn query_orders_unordered_handles_by_insertion() {
        // f64 has no total order; results are sorted by entry index.
        let entries: Vec<(f64, Aabb)> = (0..12)
            .rev()
            .map(|i| (i as f64 * 0.5, unit_box(i as f64 * 3.0, 0.0, 0.0)))
            .collect();
        let bvh = Bvh::build(entries.clone(), 2);
        let q = Aabb::new(DVec3::new(-1.0, -1.0, -1.0), DVec3::new(40.0, 1.0, 1.0));
        let expected: Vec<f64> = entries.iter().map(|(h, _)| *h).collect();
        assert_eq!(bvh.query(&q), expected);
    }

    #[test]
    fn raycast_returns_nearest() {
        let entries: Vec<(u32, Aabb)> = (0..8).map(|i| (i, unit_box(0.0, 0.0, i as f64 * 5.0))).collect();
        let bvh = Bvh::build(entries, 2);
        let ray = Ray::new(DVec3::new(0.0, 0.0, -10.0), DVec3::Z);
        let hit = bvh.raycast(&ray, 100.0, |h, r, max| {
            unit_box(0.0, 0.0, h as f64 * 5.0).ray_intersection(r, max)
        });
        let (h, d) = hit.unwrap();
        assert_eq!(h, 0);
        assert!((d - 9.5).abs() < 1e-9);
    }

    #[test]
    fn raycast_tie_prefers_insertion_order() {
        let b = unit_box(0.0, 0.0, 0.0);
        let bvh = Bvh::build(vec![(7u32, b), (3u32, b), (9u32, b)], 1);
        let ray = Ray::new(DVec3::new(0.0, 0.0, -5.0), DVec3::Z);
        let (h, _) = bvh.raycast(&ray, 10.0, |_, r, m| b.ray_intersection(r, m)).unwrap();
        assert_eq!(h, 7);
    }

    #[test]
    fn empty_tree_answers_nothing() {
        let bvh: Bvh<u32> = Bvh::build(Vec::new(), 4);
        assert!(bvh.query(&unit_box(0.0, 0.0, 0.0)).is_empty());
        assert!(bvh.bounds().is_none());
    }
}

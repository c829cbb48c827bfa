//! Edge-collapse simplification driven by quadric error metrics
//! (Garland and Heckbert, 1997).
//!
//! Every vertex carries the sum of the plane quadrics of its incident
//! triangles. Collapsing an edge moves the surviving vertex to the point that
//! minimizes the summed quadric when that 3x3 system is well conditioned, or
//! to the edge midpoint otherwise. Candidates live in a min-heap; entries are
//! stamped with the endpoint versions at push time and skipped once either
//! endpoint has changed, which stands in for decrease-key.

use crate::geometry::Mesh;
use crate::math::EPSILON;
use glam::{DVec2, DVec3};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Grid used to merge coincident positions before simplifying.
pub const WELD_EPSILON: f64 = 0.001;

/// Vertices with fewer distinct neighbours than this count as boundary.
const BOUNDARY_DEGREE: usize = 4;
const BOUNDARY_PENALTY: f64 = 1000.0;

/// Symmetric 4x4 matrix stored as its upper triangle:
///
/// ```text
/// | a b c d |
/// | b e f g |
/// | c f h i |
/// | d g i j |
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quadric {
    pub data: [f64; 10],
}

impl Quadric {
    /// `p p^T` for the plane `ax + by + cz + d = 0`.
    pub fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            data: [
                a * a,
                a * b,
                a * c,
                a * d,
                b * b,
                b * c,
                b * d,
                c * c,
                c * d,
                d * d,
            ],
        }
    }

    pub fn add(&self, other: &Quadric) -> Self {
        let mut data = self.data;
        for (lhs, rhs) in data.iter_mut().zip(other.data) {
            *lhs += rhs;
        }
        Self { data }
    }

    /// `v^T Q v` with `v = [x, y, z, 1]`.
    pub fn evaluate(&self, p: DVec3) -> f64 {
        let [a, b, c, d, e, f, g, h, i, j] = self.data;
        let (x, y, z) = (p.x, p.y, p.z);
        a * x * x + 2.0 * b * x * y + 2.0 * c * x * z + 2.0 * d * x
            + e * y * y + 2.0 * f * y * z + 2.0 * g * y
            + h * z * z + 2.0 * i * z
            + j
    }

    /// Minimizer of the quadric by Cramer's rule, or `None` when the
    /// upper-left 3x3 block is singular (flat or cylindrical neighbourhoods).
    pub fn optimal_position(&self) -> Option<DVec3> {
        let [a, b, c, d, e, f, g, h, i, _j] = self.data;

        // | a b c |   | x |   | -d |
        // | b e f | * | y | = | -g |
        // | c f h |   | z |   | -i |
        let det = a * (e * h - f * f) - b * (b * h - f * c) + c * (b * f - e * c);
        if det.abs() < 1e-10 {
            return None;
        }
        let inv_det = 1.0 / det;
        let (rd, rg, ri) = (-d, -g, -i);
        let x = inv_det * (rd * (e * h - f * f) - b * (rg * h - f * ri) + c * (rg * f - e * ri));
        let y = inv_det * (a * (rg * h - f * ri) - rd * (b * h - f * c) + c * (b * ri - rg * c));
        let z = inv_det * (a * (e * ri - rg * f) - b * (b * ri - rg * c) + rd * (b * f - e * c));
        let p = DVec3::new(x, y, z);
        p.is_finite().then_some(p)
    }
}

/// Collapse target for an edge: the quadric optimum when solvable, else
/// the midpoint.
pub fn collapse_target(q: &Quadric, p0: DVec3, p1: DVec3) -> DVec3 {
    q.optimal_position().unwrap_or((p0 + p1) * 0.5)
}

#[derive(Debug, Clone)]
struct Candidate {
    cost: f64,
    v0: u32,
    v1: u32,
    target: DVec3,
    stamp: (u32, u32),
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; vertex ids break ties deterministically.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| (other.v0, other.v1).cmp(&(self.v0, self.v1)))
    }
}

struct Simplifier {
    positions: Vec<DVec3>,
    uvs: Vec<DVec2>,
    quadrics: Vec<Quadric>,
    triangles: Vec<[u32; 3]>,
    triangle_alive: Vec<bool>,
    vertex_triangles: Vec<Vec<usize>>,
    vertex_removed: Vec<bool>,
    versions: Vec<u32>,
    heap: BinaryHeap<Candidate>,
    live_triangles: usize,
}

impl Simplifier {
    fn new(mesh: &Mesh) -> Self {
        // Weld coincident positions so seams do not become boundaries.
        let mut lookup: HashMap<(i64, i64, i64), u32> = HashMap::new();
        let mut positions = Vec::new();
        let mut uvs = Vec::new();
        let mut remap = Vec::with_capacity(mesh.vertices().len());
        for (i, &p) in mesh.vertices().iter().enumerate() {
            let key = (
                (p.x / WELD_EPSILON).round() as i64,
                (p.y / WELD_EPSILON).round() as i64,
                (p.z / WELD_EPSILON).round() as i64,
            );
            let index = *lookup.entry(key).or_insert_with(|| {
                positions.push(p);
                if mesh.has_uvs() {
                    uvs.push(mesh.uvs()[i]);
                }
                (positions.len() - 1) as u32
            });
            remap.push(index);
        }

        let mut quadrics = vec![Quadric::default(); positions.len()];
        let mut triangles = Vec::new();
        for [a, b, c] in mesh.triangles() {
            let t = [remap[a], remap[b], remap[c]];
            let [p0, p1, p2] = t.map(|v| positions[v as usize]);
            let n = (p1 - p0).cross(p2 - p0);
            let len = n.length();
            if !(len > EPSILON) {
                continue;
            }
            let n = n / len;
            let q = Quadric::from_plane(n.x, n.y, n.z, -n.dot(p0));
            for v in t {
                quadrics[v as usize] = quadrics[v as usize].add(&q);
            }
            triangles.push(t);
        }

        let mut vertex_triangles = vec![Vec::new(); positions.len()];
        for (ti, t) in triangles.iter().enumerate() {
            for &v in t {
                vertex_triangles[v as usize].push(ti);
            }
        }

        let live_triangles = triangles.len();
        let vertex_count = positions.len();
        let mut simplifier = Self {
            positions,
            uvs,
            quadrics,
            triangle_alive: vec![true; triangles.len()],
            triangles,
            vertex_triangles,
            vertex_removed: vec![false; vertex_count],
            versions: vec![0; vertex_count],
            heap: BinaryHeap::new(),
            live_triangles,
        };

        let mut edges: Vec<(u32, u32)> = simplifier
            .triangles
            .iter()
            .flat_map(|&[a, b, c]| [(a, b), (b, c), (c, a)])
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect();
        edges.sort_unstable();
        edges.dedup();
        for (a, b) in edges {
            simplifier.push_candidate(a, b);
        }
        simplifier
    }

    fn neighbours(&self, v: u32) -> Vec<u32> {
        let mut out: Vec<u32> = self.vertex_triangles[v as usize]
            .iter()
            .filter(|&&t| self.triangle_alive[t])
            .flat_map(|&t| self.triangles[t])
            .filter(|&n| n != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn push_candidate(&mut self, v0: u32, v1: u32) {
        let (p0, p1) = (self.positions[v0 as usize], self.positions[v1 as usize]);
        let q = self.quadrics[v0 as usize].add(&self.quadrics[v1 as usize]);
        let target = collapse_target(&q, p0, p1);
        let mut cost = q.evaluate(target).max(0.0);
        if self.neighbours(v0).len() < BOUNDARY_DEGREE || self.neighbours(v1).len() < BOUNDARY_DEGREE {
            cost = (cost + 1e-6) * BOUNDARY_PENALTY;
        }
        self.heap.push(Candidate {
            cost,
            v0,
            v1,
            target,
            stamp: (self.versions[v0 as usize], self.versions[v1 as usize]),
        });
    }

    fn is_stale(&self, c: &Candidate) -> bool {
        self.vertex_removed[c.v0 as usize]
            || self.vertex_removed[c.v1 as usize]
            || c.stamp != (self.versions[c.v0 as usize], self.versions[c.v1 as usize])
    }

    fn collapse(&mut self, c: &Candidate) {
        let (v0, v1) = (c.v0, c.v1);
        self.positions[v0 as usize] = c.target;
        self.quadrics[v0 as usize] = self.quadrics[v0 as usize].add(&self.quadrics[v1 as usize]);
        self.vertex_removed[v1 as usize] = true;

        let moved = std::mem::take(&mut self.vertex_triangles[v1 as usize]);
        for t in moved {
            if !self.triangle_alive[t] {
                continue;
            }
            let tri = &mut self.triangles[t];
            if tri.contains(&v0) {
                self.triangle_alive[t] = false;
                self.live_triangles -= 1;
                continue;
            }
            for v in tri.iter_mut() {
                if *v == v1 {
                    *v = v0;
                }
            }
            self.vertex_triangles[v0 as usize].push(t);
        }
        let alive = &self.triangle_alive;
        self.vertex_triangles[v0 as usize].retain(|&t| alive[t]);

        self.versions[v0 as usize] += 1;
        self.versions[v1 as usize] += 1;
        for n in self.neighbours(v0) {
            self.push_candidate(v0.min(n), v0.max(n));
        }
    }

    fn run(&mut self, target_triangles: usize) {
        while self.live_triangles > target_triangles {
            let Some(candidate) = self.heap.pop() else {
                break;
            };
            if self.is_stale(&candidate) {
                continue;
            }
            self.collapse(&candidate);
        }
    }

    /// Compact the live vertices (all of them, so the list is never empty
    /// for non-empty input) and the live triangles.
    fn finish(self, source: &Mesh) -> Mesh {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut vertices = Vec::new();
        let mut uvs = Vec::new();
        for (i, &p) in self.positions.iter().enumerate() {
            if self.vertex_removed[i] {
                continue;
            }
            remap[i] = vertices.len() as u32;
            vertices.push(p);
            if !self.uvs.is_empty() {
                uvs.push(self.uvs[i]);
            }
        }
        let indices: Vec<u32> = self
            .triangles
            .iter()
            .zip(&self.triangle_alive)
            .filter(|(_, alive)| **alive)
            .flat_map(|(t, _)| t.map(|v| remap[v as usize]))
            .collect();

        let mut mesh = Mesh::from_parts_unchecked(
            source.name(),
            vertices,
            Vec::new(),
            uvs,
            indices,
            source.material().clone(),
        )
        .with_position(source.position());
        if source.has_normals() {
            mesh.calculate_normals();
        }
        mesh
    }
}

/// Collapse edges until at most `target_triangles` remain (or no edge is
/// left). The result shares the source material and nothing else.
pub fn simplify_qem(mesh: &Mesh, target_triangles: usize) -> Mesh {
    if mesh.triangle_count() <= target_triangles {
        return mesh.clone();
    }
    let mut simplifier = Simplifier::new(mesh);
    let before = simplifier.live_triangles;
    simplifier.run(target_triangles);
    log::debug!(
        "qem '{}': {} -> {} triangles (target {})",
        mesh.name(),
        before,
        simplifier.live_triangles,
        target_triangles
    );
    simplifier.finish(mesh)
}

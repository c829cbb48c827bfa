/// Scene nodes and the payloads they carry.
use super::transform::Transform;
use super::NodeId;
use crate::geometry::{Circle, Line, Mesh, PointPrimitive, Quad, Triangle};
use crate::lod::LodGroup;
use crate::spatial::Aabb;
use glam::{DMat4, DQuat, DVec3};
use std::sync::Arc;

/// One mesh drawn once per instance matrix (applied before the node's
/// world matrix).
#[derive(Debug, Clone)]
pub struct InstancedMesh {
    pub mesh: Arc<Mesh>,
    pub instances: Vec<DMat4>,
}

impl InstancedMesh {
    pub fn new(mesh: Arc<Mesh>, instances: Vec<DMat4>) -> Self {
        Self { mesh, instances }
    }

    pub fn bounds(&self) -> Aabb {
        let local = self.mesh.bounds();
        self.instances
            .iter()
            .map(|m| local.transform_into(m))
            .reduce(|a, b| a.union(&b))
            .unwrap_or(local)
    }
}

#[derive(Debug, Clone)]
pub enum NodePayload {
    Triangle(Triangle),
    Quad(Quad),
    Line(Line),
    Point(PointPrimitive),
    Circle(Circle),
    Mesh(Arc<Mesh>),
    Lod(LodGroup),
    Instanced(InstancedMesh),
}

impl NodePayload {
    /// Bounds in the node's local frame.
    pub fn local_bounds(&self) -> Aabb {
        match self {
            NodePayload::Triangle(t) => t.bounds(),
            NodePayload::Quad(q) => q.bounds(),
            NodePayload::Line(l) => l.bounds(),
            NodePayload::Point(p) => p.bounds(),
            NodePayload::Circle(c) => c.bounds(),
            NodePayload::Mesh(m) => m.bounds(),
            NodePayload::Lod(g) => g.bounds(),
            NodePayload::Instanced(i) => i.bounds(),
        }
    }

    /// Visit every local-frame surface triangle. Lines and points have
    /// none; LOD groups expose their most detailed level.
    pub fn for_each_triangle(&self, f: &mut dyn FnMut([DVec3; 3])) {
        match self {
            NodePayload::Triangle(t) => f(t.vertices),
            NodePayload::Quad(q) => {
                for t in q.triangulate() {
                    f(t.vertices);
                }
            }
            NodePayload::Circle(c) => {
                for t in c.triangulate() {
                    f(t.vertices);
                }
            }
            NodePayload::Mesh(m) => mesh_triangles(m, &DMat4::IDENTITY, f),
            NodePayload::Lod(g) => {
                if let Some(level) = g.levels().first() {
                    mesh_triangles(&level.mesh, &DMat4::IDENTITY, f);
                }
            }
            NodePayload::Instanced(i) => {
                for m in &i.instances {
                    mesh_triangles(&i.mesh, m, f);
                }
            }
            NodePayload::Line(_) | NodePayload::Point(_) => {}
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NodePayload::Triangle(_) => "triangle",
            NodePayload::Quad(_) => "quad",
            NodePayload::Line(_) => "line",
            NodePayload::Point(_) => "point",
            NodePayload::Circle(_) => "circle",
            NodePayload::Mesh(_) => "mesh",
            NodePayload::Lod(_) => "lod",
            NodePayload::Instanced(_) => "instanced",
        }
    }
}

fn mesh_triangles(mesh: &Mesh, m: &DMat4, f: &mut dyn FnMut([DVec3; 3])) {
    for i in 0..mesh.triangle_count() {
        f(mesh.triangle(i).map(|p| m.transform_point3(p)));
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub tags: Vec<String>,
    pub(crate) enabled: bool,
    pub payload: Option<NodePayload>,
    pub(crate) transform: Transform,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            enabled: true,
            payload: None,
            transform: Transform::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: NodePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_mesh(self, mesh: Arc<Mesh>) -> Self {
        self.with_payload(NodePayload::Mesh(mesh))
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_position(mut self, position: DVec3) -> Self {
        self.transform.set_position(position);
        self
    }

    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.transform.set_rotation(rotation);
        self
    }

    pub fn with_scale(mut self, scale: DVec3) -> Self {
        self.transform.set_scale(scale);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

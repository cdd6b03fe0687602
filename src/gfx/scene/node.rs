//! Scene graph nodes
//!
//! A node owns its children, so a subtree (an imported model, for instance)
//! moves in and out of the scene as a single value.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use cgmath::{Euler, Matrix4, One, Quaternion, Rad, Vector3};

use crate::gfx::{geometry::GeometryData, resources::material::Material, scene::light::Light};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Local translation, rotation and scale relative to the parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn from_position(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            ..Default::default()
        }
    }

    /// Sets the rotation from Euler angles applied X, then Y, then Z
    pub fn set_rotation_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quaternion::from(Euler::new(Rad(x), Rad(y), Rad(z)));
    }

    /// Builder pattern: Euler rotation in radians
    pub fn with_rotation_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.set_rotation_euler(x, y, z);
        self
    }

    /// Local matrix, `T * R * S`
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

/// Drawable surface: immutable geometry plus an owned material
#[derive(Debug, Clone)]
pub struct MeshNode {
    pub geometry: Arc<GeometryData>,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl MeshNode {
    pub fn new(geometry: GeometryData, material: Material) -> Self {
        Self {
            geometry: Arc::new(geometry),
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupNode {
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Mesh(MeshNode),
    Group(GroupNode),
    Light(Light),
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            transform: Transform::default(),
            kind,
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshNode) -> Self {
        Self::new(name, NodeKind::Mesh(mesh))
    }

    pub fn group(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self::new(name, NodeKind::Group(GroupNode { children }))
    }

    pub fn light(name: impl Into<String>, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    /// Builder pattern: Set local transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Group(group) => &group.children,
            _ => &[],
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut MeshNode> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Depth-first search of this subtree
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        match &mut self.kind {
            NodeKind::Group(group) => group.children.iter_mut().find_map(|child| child.find_mut(id)),
            _ => None,
        }
    }

    /// Calls `f` for every mesh in this subtree, depth first
    pub fn for_each_mesh_mut(&mut self, f: &mut impl FnMut(&mut MeshNode)) {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => f(mesh),
            NodeKind::Group(group) => {
                for child in group.children.iter_mut() {
                    child.for_each_mesh_mut(f);
                }
            }
            NodeKind::Light(_) => {}
        }
    }

    /// Calls `f` with every node in this subtree and its world matrix
    pub fn visit(&self, parent: Matrix4<f32>, f: &mut impl FnMut(&Node, Matrix4<f32>)) {
        let world = parent * self.transform.matrix();
        f(self, world);
        for child in self.children() {
            child.visit(world, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector4};
    use std::f32::consts::PI;

    #[test]
    fn test_rotation_three_halves_pi_about_x_faces_up() {
        let transform = Transform::default().with_rotation_euler(3.0 * PI / 2.0, 0.0, 0.0);
        let normal = transform.matrix() * Vector4::new(0.0, 0.0, 1.0, 0.0);
        assert!((normal.truncate() - Vector3::unit_y()).magnitude() < 1e-5);
    }

    #[test]
    fn test_matrix_applies_scale_then_rotation_then_translation() {
        let mut transform = Transform::from_position(0.0, -1.0, 0.0);
        transform.set_rotation_euler(0.0, PI, 0.0);
        transform.scale = Vector3::new(2.0, 2.0, 2.0);
        let p = transform.matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p.x + 2.0).abs() < 1e-5);
        assert!((p.y + 1.0).abs() < 1e-5);
        assert!(p.z.abs() < 1e-5);
    }

    #[test]
    fn test_find_and_visit_nested_groups() {
        let leaf = Node::mesh(
            "leaf",
            MeshNode::new(GeometryData::new(), Material::default()),
        )
        .with_transform(Transform::from_position(0.0, 1.0, 0.0));
        let leaf_id = leaf.id();
        let root = Node::group("root", vec![Node::group("inner", vec![leaf])])
            .with_transform(Transform::from_position(0.0, 2.0, 0.0));

        assert_eq!(root.find(leaf_id).map(|n| n.name.as_str()), Some("leaf"));

        let mut leaf_world = None;
        let mut visited = 0;
        root.visit(Matrix4::identity(), &mut |node, world| {
            visited += 1;
            if node.id() == leaf_id {
                leaf_world = Some(world);
            }
        });
        assert_eq!(visited, 3);
        assert_eq!(leaf_world.unwrap().w.y, 3.0);
    }

    #[test]
    fn test_for_each_mesh_reaches_every_mesh() {
        let mesh = || Node::mesh("m", MeshNode::new(GeometryData::new(), Material::default()));
        let mut root = Node::group("root", vec![mesh(), Node::group("g", vec![mesh(), mesh()])]);
        root.for_each_mesh_mut(&mut |m| m.cast_shadow = true);

        let mut casting = 0;
        root.visit(Matrix4::identity(), &mut |node, _| {
            if node.as_mesh().is_some_and(|m| m.cast_shadow) {
                casting += 1;
            }
        });
        assert_eq!(casting, 3);
    }
}

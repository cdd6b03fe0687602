use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::gfx::{
    color::Color,
    scene::{
        light::{DirectionalState, HemisphereState, Light, LightingState},
        node::{MeshNode, Node, NodeId, NodeKind},
    },
};

/// Linear distance fog
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

/// Root container: background, fog and the top-level nodes
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Color,
    pub fog: Option<Fog>,
    nodes: Vec<Node>,
}

impl Scene {
    pub fn new(background: Color) -> Self {
        Self {
            background,
            fog: None,
            nodes: Vec::new(),
        }
    }

    /// Builder pattern: Fog in the background color
    pub fn with_fog(mut self, near: f32, far: f32) -> Self {
        self.fog = Some(Fog {
            color: self.background,
            near,
            far,
        });
        self
    }

    /// Attaches a node (and its subtree) at the root
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.push(node);
        id
    }

    pub fn roots(&self) -> &[Node] {
        &self.nodes
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find_map(|node| node.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find_map(|node| node.find_mut(id))
    }

    /// Calls `f` with every node and its world matrix
    pub fn visit(&self, mut f: impl FnMut(&Node, Matrix4<f32>)) {
        for node in &self.nodes {
            node.visit(Matrix4::identity(), &mut f);
        }
    }

    /// Calls `f` with every mesh, its id and its world matrix
    pub fn visit_meshes_mut(&mut self, mut f: impl FnMut(NodeId, Matrix4<f32>, &mut MeshNode)) {
        fn walk(
            node: &mut Node,
            parent: Matrix4<f32>,
            f: &mut impl FnMut(NodeId, Matrix4<f32>, &mut MeshNode),
        ) {
            let world = parent * node.transform.matrix();
            let id = node.id();
            match &mut node.kind {
                NodeKind::Mesh(mesh) => f(id, world, mesh),
                NodeKind::Group(group) => {
                    for child in group.children.iter_mut() {
                        walk(child, world, f);
                    }
                }
                NodeKind::Light(_) => {}
            }
        }

        for node in self.nodes.iter_mut() {
            walk(node, Matrix4::identity(), &mut f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(|node, _| {
            if node.as_mesh().is_some() {
                count += 1;
            }
        });
        count
    }

    pub fn light_count(&self) -> usize {
        let mut count = 0;
        self.visit(|node, _| {
            if node.as_light().is_some() {
                count += 1;
            }
        });
        count
    }

    /// First hemisphere and first directional light, in world space
    pub fn lighting(&self) -> LightingState {
        let mut state = LightingState::default();
        self.visit(|node, world| match node.as_light() {
            Some(Light::Hemisphere {
                sky_color,
                ground_color,
                intensity,
            }) if state.hemisphere.is_none() => {
                state.hemisphere = Some(HemisphereState {
                    sky_color: *sky_color,
                    ground_color: *ground_color,
                    intensity: *intensity,
                });
            }
            Some(Light::Directional {
                color,
                intensity,
                cast_shadow,
                shadow_map_size,
            }) if state.directional.is_none() => {
                state.directional = Some(DirectionalState {
                    position: Vector3::new(world.w.x, world.w.y, world.w.z),
                    color: *color,
                    intensity: *intensity,
                    cast_shadow: *cast_shadow,
                    shadow_map_size: *shadow_map_size,
                });
            }
            _ => {}
        });
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        geometry::GeometryData,
        resources::material::Material,
        scene::node::{MeshNode, Transform},
    };

    fn directional(intensity: f32) -> Light {
        Light::Directional {
            color: Color::WHITE,
            intensity,
            cast_shadow: true,
            shadow_map_size: 1024,
        }
    }

    #[test]
    fn test_lighting_uses_world_position_of_first_directional() {
        let mut scene = Scene::new(Color::from_hex_u32(0xf1f1f1));
        let rig = Node::group(
            "rig",
            vec![Node::light("sun", directional(0.54))
                .with_transform(Transform::from_position(-8.0, 12.0, 8.0))],
        )
        .with_transform(Transform::from_position(1.0, 0.0, 0.0));
        scene.add(rig);
        scene.add(Node::light("second sun", directional(9.0)));

        let lighting = scene.lighting();
        let sun = lighting.directional.unwrap();
        assert_eq!(sun.intensity, 0.54);
        assert_eq!(sun.position, Vector3::new(-7.0, 12.0, 8.0));
        assert!(lighting.hemisphere.is_none());
    }

    #[test]
    fn test_counts_and_lookup() {
        let mut scene = Scene::new(Color::WHITE).with_fog(20.0, 100.0);
        let mesh = scene.add(Node::mesh(
            "floor",
            MeshNode::new(GeometryData::new(), Material::default()),
        ));
        scene.add(Node::light("sun", directional(1.0)));

        assert_eq!(scene.mesh_count(), 1);
        assert_eq!(scene.light_count(), 1);
        assert_eq!(scene.roots().len(), 2);
        assert_eq!(scene.fog.unwrap().color, Color::WHITE);

        scene.find_mut(mesh).unwrap().name = "renamed".into();
        assert_eq!(scene.find(mesh).unwrap().name, "renamed");
    }

    #[test]
    fn test_visit_meshes_mut_reports_ids() {
        let mut scene = Scene::new(Color::WHITE);
        let id = scene.add(Node::mesh(
            "floor",
            MeshNode::new(GeometryData::new(), Material::default()),
        ));
        let mut seen = Vec::new();
        scene.visit_meshes_mut(|node_id, _, mesh| {
            mesh.receive_shadow = true;
            seen.push(node_id);
        });
        assert_eq!(seen, vec![id]);
        assert!(scene.find(id).unwrap().as_mesh().unwrap().receive_shadow);
    }
}

//! Garden scene composition
//!
//! [`compose_scene`] builds everything that does not depend on a model file:
//! the two sand layers, the floor and both lights. The board arrives later
//! through [`ComposedScene::on_board_loaded`], fed from the frame loop once
//! its background import finishes.

use std::f32::consts::PI;

use crate::{
    config::GardenConfig,
    gfx::{
        color::Color,
        geometry::build_surface,
        resources::{
            loader::ModelLoad,
            material::{build_material, MaterialKind, MaterialParams, TextureSet},
        },
        scene::{Light, MeshNode, Node, NodeId, Scene, Transform},
    },
};

/// Rotation about X that turns a +Z facing surface to face +Y
const SURFACE_TILT: f32 = 3.0 * PI / 2.0;

/// Ids of the nodes the garden is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GardenNodes {
    pub top_sand: NodeId,
    pub bottom_sand: NodeId,
    pub floor: NodeId,
    pub hemisphere_light: NodeId,
    pub directional_light: NodeId,
    /// Root of the imported board, once it has loaded
    pub board: Option<NodeId>,
}

/// The scene together with handles to its parts
pub struct ComposedScene {
    pub scene: Scene,
    pub nodes: GardenNodes,
    textures: TextureSet,
    board_params: MaterialParams,
    board_offset: f32,
}

/// Builds the garden without its board
pub fn compose_scene(config: &GardenConfig, textures: &TextureSet) -> ComposedScene {
    let layout = &config.layout;
    let debug = &config.debug;
    let mut scene = Scene::new(layout.background).with_fog(layout.fog_near, layout.fog_far);

    let sand_surface_color = Color::from_hex(&debug.sand_surface_color).unwrap_or_else(|| {
        log::warn!(
            "Invalid sand surface color '{}', using white",
            debug.sand_surface_color
        );
        Color::WHITE
    });
    let sand_bottom_color = Color::from_hex(&debug.sand_bottom_color).unwrap_or_else(|| {
        log::warn!(
            "Invalid sand bottom color '{}', using white",
            debug.sand_bottom_color
        );
        Color::WHITE
    });

    let top_material = build_material(
        MaterialKind::SandTop,
        &MaterialParams {
            color: Some(sand_surface_color),
            displacement_scale: Some(debug.displacement_scale),
            displacement_bias: Some(debug.displacement_bias),
            ..Default::default()
        },
        textures,
    );
    let top_sand = scene.add(
        Node::mesh(
            "sand top",
            MeshNode::new(
                build_surface(layout.sand_size, layout.sand_size, debug.verteces),
                top_material,
            ),
        )
        .with_transform(Transform::default().with_rotation_euler(SURFACE_TILT, 0.0, 0.0)),
    );

    let bottom_material = build_material(
        MaterialKind::SandBottom,
        &MaterialParams {
            color: Some(sand_bottom_color),
            ..Default::default()
        },
        textures,
    );
    let bottom_sand = scene.add(
        Node::mesh(
            "sand bottom",
            MeshNode::new(
                build_surface(layout.sand_size, layout.sand_size, debug.verteces),
                bottom_material,
            ),
        )
        .with_transform(
            Transform::from_position(0.0, -layout.bottom_sand_offset, 0.0)
                .with_rotation_euler(SURFACE_TILT, 0.0, 0.0),
        ),
    );

    let floor_material = build_material(
        MaterialKind::Floor,
        &MaterialParams {
            color: Some(layout.background),
            shininess: Some(0.0),
            ..Default::default()
        },
        textures,
    );
    let mut floor_mesh = MeshNode::new(
        build_surface(layout.floor_size, layout.floor_size, 1),
        floor_material,
    );
    floor_mesh.receive_shadow = true;
    let floor = scene.add(
        Node::mesh("floor", floor_mesh).with_transform(
            Transform::from_position(0.0, -layout.floor_offset, 0.0)
                .with_rotation_euler(-PI / 2.0, 0.0, 0.0),
        ),
    );

    let hemisphere_light = scene.add(
        Node::light(
            "hemisphere light",
            Light::Hemisphere {
                sky_color: Color::WHITE,
                ground_color: Color::WHITE,
                intensity: layout.hemisphere_intensity,
            },
        )
        .with_transform(Transform::from_position(0.0, layout.hemisphere_height, 0.0)),
    );

    let [x, y, z] = layout.directional_position;
    let directional_light = scene.add(
        Node::light(
            "directional light",
            Light::Directional {
                color: Color::WHITE,
                intensity: layout.directional_intensity,
                cast_shadow: true,
                shadow_map_size: layout.shadow_map_size,
            },
        )
        .with_transform(Transform::from_position(x, y, z)),
    );

    log::info!(
        "Composed garden: {} meshes, {} lights, sand resolution {}",
        scene.mesh_count(),
        scene.light_count(),
        debug.verteces
    );

    ComposedScene {
        scene,
        nodes: GardenNodes {
            top_sand,
            bottom_sand,
            floor,
            hemisphere_light,
            directional_light,
            board: None,
        },
        textures: textures.clone(),
        board_params: MaterialParams {
            shininess: Some(layout.board_shininess),
            normal_scale: Some([1.0, 1.0]),
            ..Default::default()
        },
        board_offset: layout.board_offset,
    }
}

impl ComposedScene {
    /// Places the imported board, or logs why it is missing
    ///
    /// Only the first successful load is inserted; later deliveries are
    /// ignored so the board never appears twice.
    pub fn on_board_loaded(&mut self, outcome: ModelLoad) {
        let mut root = match outcome {
            ModelLoad::Loaded(root) => root,
            ModelLoad::Failed(err) => {
                log::error!("Board model unavailable, continuing without it: {}", err);
                return;
            }
        };

        if self.nodes.board.is_some() {
            log::debug!("Ignoring repeated board delivery '{}'", root.name);
            return;
        }

        root.transform.position.y = -self.board_offset;
        root.transform.set_rotation_euler(0.0, PI, 0.0);

        let textures = &self.textures;
        let params = &self.board_params;
        let mut meshes = 0;
        root.for_each_mesh_mut(&mut |mesh| {
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
            mesh.material = build_material(MaterialKind::BoardSurface, params, textures);
            meshes += 1;
        });

        log::info!("Board '{}' placed ({} meshes)", root.name, meshes);
        self.nodes.board = Some(self.scene.add(root));
    }

    pub fn has_board(&self) -> bool {
        self.nodes.board.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AssetError,
        gfx::{geometry::GeometryData, resources::material::Material},
    };
    use cgmath::{Matrix4, SquareMatrix};

    fn small_config() -> GardenConfig {
        GardenConfig::default().with_verteces(8)
    }

    fn fake_board() -> Node {
        let mesh = |name: &str| {
            Node::mesh(
                name.to_string(),
                MeshNode::new(GeometryData::new(), Material::new("imported")),
            )
        };
        Node::group("zen-board", vec![mesh("frame"), Node::group("inner", vec![mesh("rake")])])
    }

    fn world_matrix(scene: &Scene, id: NodeId) -> Matrix4<f32> {
        let mut found = None;
        scene.visit(|node, world| {
            if node.id() == id {
                found = Some(world);
            }
        });
        found.unwrap()
    }

    fn world_y(scene: &Scene, id: NodeId) -> f32 {
        world_matrix(scene, id).w.y
    }

    #[test]
    fn test_compose_places_surfaces_and_lights() {
        let garden = compose_scene(&small_config(), &TextureSet::pending());
        assert_eq!(garden.scene.mesh_count(), 3);
        assert_eq!(garden.scene.light_count(), 2);
        assert!(!garden.has_board());

        let floor = garden.scene.find(garden.nodes.floor).unwrap().as_mesh().unwrap();
        assert!(floor.receive_shadow && !floor.cast_shadow);
        assert_eq!(floor.geometry.triangle_count(), 2);

        let lighting = garden.scene.lighting();
        let sun = lighting.directional.unwrap();
        assert!(sun.cast_shadow);
        assert_eq!(sun.shadow_map_size, 1024);
        assert_eq!(lighting.hemisphere.unwrap().intensity, 0.61);

        let background = Color::from_hex_u32(0xf1f1f1);
        assert_eq!(garden.scene.background, background);
        let fog = garden.scene.fog.as_ref().unwrap();
        assert_eq!(fog.color, background);
        assert_eq!((fog.near, fog.far), (20.0, 100.0));

        let floor_world = world_matrix(&garden.scene, garden.nodes.floor);
        assert!((floor_world.w.y + 0.2).abs() < 1e-6);
        let floor_normal = floor_world * cgmath::Vector4::new(0.0, 0.0, 1.0, 0.0);
        assert!((floor_normal.y - 1.0).abs() < 1e-5);
        assert!(floor_normal.x.abs() < 1e-5 && floor_normal.z.abs() < 1e-5);
    }

    #[test]
    fn test_bottom_sand_sits_below_top_sand() {
        for offset in [0.009, 0.5, 1e-4] {
            let mut config = small_config();
            config.layout.bottom_sand_offset = offset;
            let garden = compose_scene(&config, &TextureSet::pending());
            let top = world_y(&garden.scene, garden.nodes.top_sand);
            let bottom = world_y(&garden.scene, garden.nodes.bottom_sand);
            assert!(bottom < top);
        }
    }

    #[test]
    fn test_sand_faces_up_in_world_space() {
        let garden = compose_scene(&small_config(), &TextureSet::pending());
        let node = garden.scene.find(garden.nodes.top_sand).unwrap();
        let normal = node.transform.matrix() * cgmath::Vector4::new(0.0, 0.0, 1.0, 0.0);
        assert!((normal.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_board_is_placed_and_dressed() {
        let textures = TextureSet::pending();
        let mut garden = compose_scene(&small_config(), &textures);
        garden.on_board_loaded(ModelLoad::Loaded(fake_board()));

        let board_id = garden.nodes.board.unwrap();
        assert_eq!(world_y(&garden.scene, board_id), -1.0);
        assert_eq!(garden.scene.mesh_count(), 5);

        let board_world = world_matrix(&garden.scene, board_id);
        let x_axis = board_world * cgmath::Vector4::new(1.0, 0.0, 0.0, 0.0);
        assert!((x_axis.x + 1.0).abs() < 1e-5);
        assert!(x_axis.y.abs() < 1e-5 && x_axis.z.abs() < 1e-5);
        let up = board_world * cgmath::Vector4::new(0.0, 1.0, 0.0, 0.0);
        assert!((up.y - 1.0).abs() < 1e-5);

        let mut dressed = 0;
        garden.scene.find(board_id).unwrap().visit(Matrix4::identity(), &mut |node, _| {
            if let Some(mesh) = node.as_mesh() {
                assert!(mesh.cast_shadow && mesh.receive_shadow);
                assert!(mesh.material.color_map.as_ref().unwrap().ptr_eq(&textures.board_color));
                dressed += 1;
            }
        });
        assert_eq!(dressed, 2);
    }

    #[test]
    fn test_repeated_delivery_inserts_once() {
        let mut garden = compose_scene(&small_config(), &TextureSet::pending());
        garden.on_board_loaded(ModelLoad::Loaded(fake_board()));
        let first = garden.nodes.board;
        garden.on_board_loaded(ModelLoad::Loaded(fake_board()));
        assert_eq!(garden.nodes.board, first);
        assert_eq!(garden.scene.roots().len(), 6);
    }

    #[test]
    fn test_failed_load_leaves_scene_intact() {
        let mut garden = compose_scene(&small_config(), &TextureSet::pending());
        garden.on_board_loaded(ModelLoad::Failed(AssetError::UnsupportedFormat {
            path: "board.fbx".into(),
        }));
        assert!(!garden.has_board());
        assert_eq!(garden.scene.roots().len(), 5);
    }
}

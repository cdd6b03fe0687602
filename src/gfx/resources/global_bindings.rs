//! Global uniform bindings for camera, lights and fog
//!
//! Everything a frame shares across all meshes is packed into one uniform
//! buffer bound at group 0 by every pipeline, the shadow pipeline included.

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector3};

use crate::{
    gfx::{
        camera::camera_utils::{convert_matrix4_to_array, CameraUniform},
        scene::{light::DirectionalState, Fog, LightingState},
    },
    wgpu_utils::{
        binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
        binding_types,
        uniform_buffer::UniformBuffer,
    },
};

/// Half extent of the orthographic shadow frustum, in world units
const SHADOW_EXTENT: f32 = 5.0;
const SHADOW_NEAR: f32 = 0.5;
const SHADOW_FAR: f32 = 500.0;

/// Global uniform buffer content
///
/// MUST match the `Globals` struct in the shaders exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUBOContent {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    /// Hemisphere sky color, w = intensity
    sky_color: [f32; 4],
    ground_color: [f32; 4],
    /// Unit vector towards the directional light, w = intensity
    light_direction: [f32; 4],
    /// w = 1 when the directional light casts shadows
    light_color: [f32; 4],
    /// w = 1 when fog is enabled
    fog_color: [f32; 4],
    /// near, far, 1 / shadow map size, unused
    fog_range: [f32; 4],
}

impl GlobalUBOContent {
    pub fn new(camera: &CameraUniform, lighting: &LightingState, fog: Option<&Fog>) -> Self {
        let (sky_color, ground_color) = match &lighting.hemisphere {
            Some(hemi) => (
                extend(hemi.sky_color.to_array(), hemi.intensity),
                extend(hemi.ground_color.to_array(), 0.0),
            ),
            None => ([0.0; 4], [0.0; 4]),
        };

        let (light_direction, light_color, light_view_proj, shadow_texel) =
            match &lighting.directional {
                Some(sun) => {
                    let dir = sun.direction_to_light();
                    (
                        [dir.x, dir.y, dir.z, sun.intensity],
                        extend(sun.color.to_array(), if sun.cast_shadow { 1.0 } else { 0.0 }),
                        light_view_projection(sun),
                        1.0 / sun.shadow_map_size.max(1) as f32,
                    )
                }
                None => ([0.0, 1.0, 0.0, 0.0], [0.0; 4], Matrix4::identity(), 0.0),
            };

        let (fog_color, fog_range) = match fog {
            Some(fog) => (
                extend(fog.color.to_array(), 1.0),
                [fog.near, fog.far, shadow_texel, 0.0],
            ),
            None => ([0.0; 4], [0.0, 0.0, shadow_texel, 0.0]),
        };

        Self {
            view_proj: camera.view_proj,
            light_view_proj: convert_matrix4_to_array(light_view_proj),
            camera_position: camera.view_position,
            sky_color,
            ground_color,
            light_direction,
            light_color,
            fog_color,
            fog_range,
        }
    }
}

fn extend(rgb: [f32; 3], w: f32) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], w]
}

/// Orthographic projection from the light position towards the origin
pub fn light_view_projection(sun: &DirectionalState) -> Matrix4<f32> {
    let eye = Point3::from_vec(sun.position);
    let forward = -sun.direction_to_light();
    // look_at degenerates when the light sits straight above the origin
    let up = if forward.x.abs() < 1e-4 && forward.z.abs() < 1e-4 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    let view = Matrix4::look_at_rh(eye, Point3::origin(), up);
    let proj = cgmath::ortho(
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        SHADOW_NEAR,
        SHADOW_FAR,
    );
    crate::gfx::camera::orbit_camera::OPENGL_TO_WGPU_MATRIX * proj * view
}

/// Type alias for the global uniform buffer
pub type GlobalUBO = UniformBuffer<GlobalUBOContent>;

/// Writes this frame's camera, light and fog state
pub fn update_global_ubo(
    ubo: &mut GlobalUBO,
    queue: &wgpu::Queue,
    camera: &CameraUniform,
    lighting: &LightingState,
    fog: Option<&Fog>,
) {
    ubo.update_content(queue, GlobalUBOContent::new(camera, lighting, fog));
}

/// Bind group layout and bind group for global uniforms (group 0)
pub struct GlobalBindings {
    bind_group_layout: BindGroupLayoutWithDesc,
    bind_group: wgpu::BindGroup,
}

impl GlobalBindings {
    pub fn new(device: &wgpu::Device, ubo: &GlobalUBO) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .create(device, "Globals Bind Group Layout");
        let bind_group = BindGroupBuilder::new(&bind_group_layout)
            .resource(ubo.binding_resource())
            .create(device, "Global Bind Group");

        GlobalBindings {
            bind_group_layout,
            bind_group,
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{color::Color, scene::light::HemisphereState};
    use cgmath::Vector4;

    fn sun() -> DirectionalState {
        DirectionalState {
            position: Vector3::new(-8.0, 12.0, 8.0),
            color: Color::WHITE,
            intensity: 0.54,
            cast_shadow: true,
            shadow_map_size: 1024,
        }
    }

    #[test]
    fn test_globals_layout_size() {
        assert_eq!(std::mem::size_of::<GlobalUBOContent>(), 240);
    }

    #[test]
    fn test_origin_lands_in_shadow_frustum() {
        let clip = light_view_projection(&sun()) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn test_overhead_light_still_builds_a_frustum() {
        let mut overhead = sun();
        overhead.position = Vector3::new(0.0, 20.0, 0.0);
        let m = light_view_projection(&overhead);
        let clip = m * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!(clip.x.is_finite() && clip.y.is_finite());
    }

    #[test]
    fn test_content_packs_lights_and_fog() {
        let lighting = LightingState {
            hemisphere: Some(HemisphereState {
                sky_color: Color::WHITE,
                ground_color: Color::WHITE,
                intensity: 0.61,
            }),
            directional: Some(sun()),
        };
        let fog = Fog {
            color: Color::from_hex_u32(0xf1f1f1),
            near: 20.0,
            far: 100.0,
        };
        let content = GlobalUBOContent::new(&CameraUniform::default(), &lighting, Some(&fog));
        assert_eq!(content.sky_color[3], 0.61);
        assert_eq!(content.light_direction[3], 0.54);
        assert_eq!(content.light_color[3], 1.0);
        assert_eq!(content.fog_color[3], 1.0);
        assert_eq!(&content.fog_range[..2], &[20.0, 100.0]);
        assert_eq!(content.fog_range[2], 1.0 / 1024.0);

        let dark = GlobalUBOContent::new(&CameraUniform::default(), &LightingState::default(), None);
        assert_eq!(dark.light_direction[3], 0.0);
        assert_eq!(dark.fog_color[3], 0.0);
    }
}

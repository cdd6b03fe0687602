//! GPU-side mesh state
//!
//! One [`GpuMesh`] per scene mesh node: vertex and index buffers, the object
//! uniform (world transform and shadow flags) and the material uniform with
//! its bind group. Buffers are rebuilt only when the node's geometry is
//! replaced, never edited in place.

use std::{ops::Range, sync::Arc};

use cgmath::{Matrix, Matrix4, SquareMatrix};

use crate::{
    gfx::{
        camera::camera_utils::convert_matrix4_to_array,
        geometry::GeometryData,
        resources::{
            material::{Material, MaterialProgram, MaterialUniform},
            texture::TextureHandle,
        },
        scene::MeshNode,
    },
    wgpu_utils::{
        binding_builder::{BindGroupBuilder, BindGroupLayoutWithDesc},
        uniform_buffer::UniformBuffer,
    },
};

/// Per-object uniform, MUST match `Object` in the shaders
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// x = receives shadows
    pub flags: [f32; 4],
}

impl ObjectUniform {
    pub fn new(world: Matrix4<f32>, mesh: &MeshNode) -> Self {
        let normal_matrix = world
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix4::identity);
        Self {
            model: convert_matrix4_to_array(world),
            normal_matrix: convert_matrix4_to_array(normal_matrix),
            flags: [if mesh.receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// What a material bind group was built from
///
/// Any difference means the bind group is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialKey {
    /// Texture id per slot (color, normal, roughness, displacement), `None`
    /// while the slot is empty or still loading
    pub textures: [Option<u64>; 4],
    pub program_version: u64,
}

impl MaterialKey {
    pub fn new(material: &Material, maps: &[Option<&TextureHandle>; 4]) -> Self {
        Self {
            textures: maps.map(|map| map.map(TextureHandle::id)),
            program_version: material.version(),
        }
    }
}

/// Material maps in bind order, each only once its pixels have arrived
pub fn ready_maps(material: &Material) -> [Option<&TextureHandle>; 4] {
    [
        material.color_map.as_ref(),
        material.normal_map.as_ref(),
        material.roughness_map.as_ref(),
        material.displacement().map(|d| &d.map),
    ]
    .map(|slot| slot.filter(|handle| handle.is_ready()))
}

/// Shader feature bits with every map that is not ready switched off
pub fn effective_flags(program: MaterialProgram, maps: &[Option<&TextureHandle>; 4]) -> u32 {
    let slot_bits = [
        MaterialUniform::COLOR_MAP,
        MaterialUniform::NORMAL_MAP,
        MaterialUniform::ROUGHNESS_MAP,
        MaterialUniform::DISPLACEMENT,
    ];
    let mut flags = program.feature_flags();
    for (bit, map) in slot_bits.iter().zip(maps) {
        if map.is_none() {
            flags &= !bit;
        }
    }
    flags
}

pub struct GpuMesh {
    geometry: Arc<GeometryData>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    object_ubo: UniformBuffer<ObjectUniform>,
    object_bind_group: wgpu::BindGroup,
    pub material_ubo: UniformBuffer<MaterialUniform>,
    pub material_bind_group: Option<(MaterialKey, wgpu::BindGroup)>,
}

impl GpuMesh {
    pub fn new(
        device: &wgpu::Device,
        geometry: &Arc<GeometryData>,
        object_layout: &BindGroupLayoutWithDesc,
        label: &str,
    ) -> Self {
        let (vertex_buffer, index_buffer, index_count) = upload_geometry(device, geometry, label);
        let object_ubo = UniformBuffer::new(device);
        let object_bind_group = BindGroupBuilder::new(object_layout)
            .resource(object_ubo.binding_resource())
            .create(device, &format!("{} Object Bind Group", label));

        Self {
            geometry: Arc::clone(geometry),
            vertex_buffer,
            index_buffer,
            index_count,
            object_ubo,
            object_bind_group,
            material_ubo: UniformBuffer::new(device),
            material_bind_group: None,
        }
    }

    /// True while the buffers hold exactly this geometry
    pub fn holds(&self, geometry: &Arc<GeometryData>) -> bool {
        Arc::ptr_eq(&self.geometry, geometry)
    }

    pub fn replace_geometry(&mut self, device: &wgpu::Device, geometry: &Arc<GeometryData>, label: &str) {
        let (vertex_buffer, index_buffer, index_count) = upload_geometry(device, geometry, label);
        self.vertex_buffer = vertex_buffer;
        self.index_buffer = index_buffer;
        self.index_count = index_count;
        self.geometry = Arc::clone(geometry);
    }

    pub fn update_object(&mut self, queue: &wgpu::Queue, world: Matrix4<f32>, mesh: &MeshNode) {
        self.object_ubo.update_content(queue, ObjectUniform::new(world, mesh));
    }

    pub fn object_bind_group(&self) -> &wgpu::BindGroup {
        &self.object_bind_group
    }

    pub fn is_drawable(&self) -> bool {
        self.index_count > 0
    }
}

fn upload_geometry(
    device: &wgpu::Device,
    geometry: &GeometryData,
    label: &str,
) -> (wgpu::Buffer, wgpu::Buffer, u32) {
    let vertices = geometry.to_vertices();

    let vertex_buffer = wgpu::util::DeviceExt::create_buffer_init(
        device,
        &wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        },
    );

    let index_buffer = wgpu::util::DeviceExt::create_buffer_init(
        device,
        &wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        },
    );

    log::debug!(
        "Uploaded '{}': {} vertices, {} triangles",
        label,
        geometry.vertex_count(),
        geometry.triangle_count()
    );

    (vertex_buffer, index_buffer, geometry.indices.len() as u32)
}

pub trait DrawMesh<'a> {
    fn draw_mesh(&mut self, mesh: &'a GpuMesh);
    fn draw_mesh_instanced(&mut self, mesh: &'a GpuMesh, instances: Range<u32>);
}

impl<'a, 'b> DrawMesh<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh(&mut self, mesh: &'b GpuMesh) {
        self.draw_mesh_instanced(mesh, 0..1);
    }

    fn draw_mesh_instanced(&mut self, mesh: &'b GpuMesh, instances: Range<u32>) {
        if !mesh.is_drawable() {
            return;
        }
        self.set_bind_group(1, &mesh.object_bind_group, &[]);
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count, 0, instances);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::{
        material::{build_material, MaterialKind, MaterialParams, TextureSet},
        texture::TextureImage,
    };
    use cgmath::Vector3;

    #[test]
    fn test_object_uniform_layout() {
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 144);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 48);
    }

    #[test]
    fn test_object_uniform_carries_shadow_flag_and_translation() {
        let mut mesh = MeshNode::new(GeometryData::new(), Material::new("floor"));
        mesh.receive_shadow = true;
        let world = Matrix4::from_translation(Vector3::new(0.0, -0.2, 0.0));
        let uniform = ObjectUniform::new(world, &mesh);
        assert_eq!(uniform.flags[0], 1.0);
        assert_eq!(uniform.model[3], [0.0, -0.2, 0.0, 1.0]);
        assert_eq!(uniform.normal_matrix[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_degenerate_transform_falls_back_to_identity_normals() {
        let mesh = MeshNode::new(GeometryData::new(), Material::new("flat"));
        let uniform = ObjectUniform::new(Matrix4::from_scale(0.0), &mesh);
        assert_eq!(uniform.normal_matrix, convert_matrix4_to_array(Matrix4::identity()));
        assert_eq!(uniform.flags[0], 0.0);
    }

    #[test]
    fn test_unready_maps_are_masked_off() {
        let textures = TextureSet::pending();
        let params = MaterialParams {
            displacement_scale: Some(0.01),
            ..Default::default()
        };
        let mut material = build_material(MaterialKind::SandTop, &params, &textures);
        material.sync_program();

        let maps = ready_maps(&material);
        assert!(maps.iter().all(Option::is_none));
        assert_eq!(effective_flags(material.program(), &maps), 0);

        textures.displacement.fulfill(TextureImage::solid([255; 4]));
        let maps = ready_maps(&material);
        assert_eq!(
            effective_flags(material.program(), &maps),
            MaterialUniform::DISPLACEMENT
        );
    }

    #[test]
    fn test_material_key_tracks_readiness_and_program() {
        let textures = TextureSet::pending();
        let mut material = build_material(MaterialKind::BoardSurface, &MaterialParams::default(), &textures);
        material.sync_program();
        let before = MaterialKey::new(&material, &ready_maps(&material));

        textures.board_color.fulfill(TextureImage::solid([200, 150, 100, 255]));
        let after_texture = MaterialKey::new(&material, &ready_maps(&material));
        assert_ne!(before, after_texture);
        assert_eq!(after_texture.textures[0], Some(textures.board_color.id()));

        material.invalidate();
        material.sync_program();
        assert_ne!(after_texture, MaterialKey::new(&material, &ready_maps(&material)));
    }
}

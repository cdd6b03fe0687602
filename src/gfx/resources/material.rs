//! Material system
//!
//! A [`Material`] is the mutable description of how a surface is shaded. Plain
//! fields (color, displacement bias and scale, normal scale) are read by the
//! renderer every frame. The renderer also keeps a *compiled* view of the
//! material, [`MaterialProgram`], which decides the pipeline (face culling) and
//! which shader features run. The compiled view is only rebuilt when the
//! material is flagged with [`Material::invalidate`]; writing a field that
//! feeds it without invalidating leaves the previous program in use.
//!
//! [`build_material`] is the single construction entry point used by the
//! scene composer.

use crate::{
    gfx::{color::Color, resources::texture::TextureHandle},
    wgpu_utils::{
        binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
        binding_types,
    },
};

/// Which faces of a triangle are rasterised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

impl Side {
    /// Face culled by the pipeline for this side
    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        match self {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
            Side::Double => None,
        }
    }
}

/// Lighting model applied in the fragment shader
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shading {
    /// Roughness-driven specular response
    Standard { roughness: f32 },
    /// Blinn-Phong specular with an explicit exponent
    Phong { shininess: f32 },
}

impl Default for Shading {
    fn default() -> Self {
        Shading::Standard { roughness: 1.0 }
    }
}

/// Vertex displacement along the surface normal
///
/// Offset per vertex is `map(uv).r * scale + bias`.
#[derive(Debug, Clone)]
pub struct Displacement {
    pub map: TextureHandle,
    pub scale: f32,
    pub bias: f32,
}

/// Compiled, cached view of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialProgram {
    pub side: Side,
    pub color_mapped: bool,
    pub normal_mapped: bool,
    pub roughness_mapped: bool,
    pub displaced: bool,
    pub phong: bool,
}

impl MaterialProgram {
    /// Shader feature bits for this program, before texture readiness is applied
    pub fn feature_flags(&self) -> u32 {
        let mut flags = 0;
        if self.color_mapped {
            flags |= MaterialUniform::COLOR_MAP;
        }
        if self.normal_mapped {
            flags |= MaterialUniform::NORMAL_MAP;
        }
        if self.roughness_mapped {
            flags |= MaterialUniform::ROUGHNESS_MAP;
        }
        if self.displaced {
            flags |= MaterialUniform::DISPLACEMENT;
        }
        if self.phong {
            flags |= MaterialUniform::PHONG;
        }
        flags
    }
}

/// Surface description owned by a mesh node
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub color: Color,
    pub shading: Shading,
    pub color_map: Option<TextureHandle>,
    pub normal_map: Option<TextureHandle>,
    pub roughness_map: Option<TextureHandle>,
    pub normal_scale: [f32; 2],
    pub side: Side,
    displacement: Option<Displacement>,
    program: MaterialProgram,
    needs_update: bool,
    version: u64,
}

impl Default for Material {
    fn default() -> Self {
        Self::new("Default")
    }
}

impl Material {
    /// Creates a neutral material: white, rough, no maps, no displacement
    ///
    /// New materials start flagged so their first draw compiles them.
    pub fn new(name: &str) -> Self {
        let mut material = Self {
            name: name.to_string(),
            color: Color::WHITE,
            shading: Shading::default(),
            color_map: None,
            normal_map: None,
            roughness_map: None,
            normal_scale: [1.0, 1.0],
            side: Side::Front,
            displacement: None,
            program: MaterialProgram {
                side: Side::Front,
                color_mapped: false,
                normal_mapped: false,
                roughness_mapped: false,
                displaced: false,
                phong: false,
            },
            needs_update: true,
            version: 0,
        };
        material.program = material.derive_program();
        material
    }

    /// Builder pattern: Set base color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Builder pattern: Set the lighting model
    pub fn with_shading(mut self, shading: Shading) -> Self {
        self.shading = shading;
        self.with_fresh_program()
    }

    /// Builder pattern: Set the color map
    pub fn with_color_map(mut self, map: TextureHandle) -> Self {
        self.color_map = Some(map);
        self.with_fresh_program()
    }

    /// Builder pattern: Set the normal map and its per-axis strength
    pub fn with_normal_map(mut self, map: TextureHandle, normal_scale: [f32; 2]) -> Self {
        self.normal_map = Some(map);
        self.normal_scale = normal_scale;
        self.with_fresh_program()
    }

    /// Builder pattern: Set the roughness map
    pub fn with_roughness_map(mut self, map: TextureHandle) -> Self {
        self.roughness_map = Some(map);
        self.with_fresh_program()
    }

    /// Builder pattern: Enable displacement
    pub fn with_displacement(mut self, map: TextureHandle, scale: f32, bias: f32) -> Self {
        self.displacement = Some(Displacement { map, scale, bias });
        self.with_fresh_program()
    }

    /// Builders describe the program up front; it still counts as
    /// uncompiled until the first [`Material::sync_program`]
    fn with_fresh_program(mut self) -> Self {
        self.program = self.derive_program();
        self
    }

    /// Displacement settings, if this material displaces at all
    pub fn displacement(&self) -> Option<&Displacement> {
        self.displacement.as_ref()
    }

    /// Mutable displacement settings
    ///
    /// `scale` feeds the compiled program; call [`Material::invalidate`] after
    /// changing it.
    pub fn displacement_mut(&mut self) -> Option<&mut Displacement> {
        self.displacement.as_mut()
    }

    /// Flags the compiled program as stale
    pub fn invalidate(&mut self) {
        self.needs_update = true;
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// The compiled program the renderer currently uses
    pub fn program(&self) -> MaterialProgram {
        self.program
    }

    /// Number of times the program has been recompiled
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Recompiles the program if the material was invalidated
    ///
    /// Called by the renderer before a draw. Returns `true` when a rebuild
    /// happened.
    pub fn sync_program(&mut self) -> bool {
        if !self.needs_update {
            return false;
        }
        self.program = self.derive_program();
        self.needs_update = false;
        self.version += 1;
        true
    }

    fn derive_program(&self) -> MaterialProgram {
        MaterialProgram {
            side: self.side,
            color_mapped: self.color_map.is_some(),
            normal_mapped: self.normal_map.is_some(),
            roughness_mapped: self.roughness_map.is_some(),
            displaced: self
                .displacement
                .as_ref()
                .is_some_and(|d| d.scale != 0.0),
            phong: matches!(self.shading, Shading::Phong { .. }),
        }
    }
}

/// Surfaces the garden knows how to dress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    BoardSurface,
    SandTop,
    SandBottom,
    Floor,
}

/// Tunable scalars for [`build_material`]
///
/// Fields left as `None` fall back to the kind's default. Fields a kind does
/// not use are ignored.
#[derive(Debug, Clone, Default)]
pub struct MaterialParams {
    pub color: Option<Color>,
    pub roughness: Option<f32>,
    pub shininess: Option<f32>,
    pub normal_scale: Option<[f32; 2]>,
    pub displacement_scale: Option<f32>,
    pub displacement_bias: Option<f32>,
}

/// Every texture the garden's materials reference
#[derive(Debug, Clone)]
pub struct TextureSet {
    pub displacement: TextureHandle,
    pub board_color: TextureHandle,
    pub board_normal: TextureHandle,
    pub board_roughness: TextureHandle,
    pub sand_normal: TextureHandle,
    pub sand_roughness: TextureHandle,
}

impl TextureSet {
    /// A set of handles that never populate
    pub fn pending() -> Self {
        Self {
            displacement: TextureHandle::pending("displacement"),
            board_color: TextureHandle::pending("board color"),
            board_normal: TextureHandle::pending("board normal"),
            board_roughness: TextureHandle::pending("board roughness"),
            sand_normal: TextureHandle::pending("sand normal"),
            sand_roughness: TextureHandle::pending("sand roughness"),
        }
    }
}

/// Builds a fresh material for one kind of surface
///
/// Pure: no shared material is touched, so rebuilding a surface never leaks
/// state into another. The bottom sand layer never displaces, whatever the
/// parameters say.
pub fn build_material(kind: MaterialKind, params: &MaterialParams, textures: &TextureSet) -> Material {
    match kind {
        MaterialKind::BoardSurface => Material::new("board")
            .with_color(params.color.unwrap_or(Color::WHITE))
            .with_shading(Shading::Phong {
                shininess: params.shininess.unwrap_or(60.0),
            })
            .with_color_map(textures.board_color.clone())
            .with_normal_map(
                textures.board_normal.clone(),
                params.normal_scale.unwrap_or([1.0, 1.0]),
            )
            .with_roughness_map(textures.board_roughness.clone()),
        MaterialKind::SandTop => Material::new("sand top")
            .with_color(params.color.unwrap_or(Color::WHITE))
            .with_shading(Shading::Standard {
                roughness: params.roughness.unwrap_or(1.0),
            })
            .with_roughness_map(textures.sand_roughness.clone())
            .with_normal_map(
                textures.sand_normal.clone(),
                params.normal_scale.unwrap_or([1.0, 0.0]),
            )
            .with_displacement(
                textures.displacement.clone(),
                params.displacement_scale.unwrap_or(0.0),
                params.displacement_bias.unwrap_or(0.0),
            ),
        MaterialKind::SandBottom => Material::new("sand bottom")
            .with_color(params.color.unwrap_or(Color::WHITE))
            .with_shading(Shading::Standard {
                roughness: params.roughness.unwrap_or(1.0),
            })
            .with_normal_map(
                textures.sand_normal.clone(),
                params.normal_scale.unwrap_or([1.0, 0.0]),
            ),
        MaterialKind::Floor => Material::new("floor")
            .with_color(params.color.unwrap_or(Color::WHITE))
            .with_shading(Shading::Phong {
                shininess: params.shininess.unwrap_or(0.0),
            }),
    }
}

/// GPU uniform data for materials
///
/// MUST match the `MaterialUniform` struct in `standard.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub normal_scale: [f32; 2],
    pub displacement_scale: f32,
    pub displacement_bias: f32,
    pub roughness: f32,
    pub shininess: f32,
    pub flags: u32,
    _padding: u32,
}

impl MaterialUniform {
    pub const COLOR_MAP: u32 = 1 << 0;
    pub const NORMAL_MAP: u32 = 1 << 1;
    pub const ROUGHNESS_MAP: u32 = 1 << 2;
    pub const DISPLACEMENT: u32 = 1 << 3;
    pub const PHONG: u32 = 1 << 4;

    /// Packs the live fields of `material` with the given feature bits
    pub fn new(material: &Material, flags: u32) -> Self {
        let (roughness, shininess) = match material.shading {
            Shading::Standard { roughness } => (roughness, roughness_to_shininess(roughness)),
            Shading::Phong { shininess } => (1.0, shininess),
        };
        let (displacement_scale, displacement_bias) = material
            .displacement()
            .map_or((0.0, 0.0), |d| (d.scale, d.bias));

        Self {
            color: [material.color.r, material.color.g, material.color.b, 1.0],
            normal_scale: material.normal_scale,
            displacement_scale,
            displacement_bias,
            roughness,
            shininess,
            flags,
            _padding: 0,
        }
    }
}

// Blinn-Phong exponent that roughly matches a GGX lobe of the given roughness
fn roughness_to_shininess(roughness: f32) -> f32 {
    let alpha = roughness.clamp(0.04, 1.0).powi(2);
    (2.0 / (alpha * alpha) - 2.0).max(0.0)
}

/// Material bind group layout (group 2)
///
/// Binding 0 is the [`MaterialUniform`], bindings 1-4 the color, normal,
/// roughness and displacement maps, binding 5 the shared sampler. The uniform,
/// the displacement map and the sampler are visible to the vertex stage.
pub struct MaterialBindings;

impl MaterialBindings {
    pub fn layout(device: &wgpu::Device) -> BindGroupLayoutWithDesc {
        BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .next_binding_fragment(binding_types::material_map())
            .next_binding_fragment(binding_types::material_map())
            .next_binding_fragment(binding_types::material_map())
            .next_binding_rendering(binding_types::material_map())
            .next_binding_rendering(binding_types::material_sampler())
            .create(device, "Material Bind Group Layout")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_bind_group(
        device: &wgpu::Device,
        layout: &BindGroupLayoutWithDesc,
        uniform: wgpu::BindingResource,
        color: &wgpu::TextureView,
        normal: &wgpu::TextureView,
        roughness: &wgpu::TextureView,
        displacement: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new(layout)
            .resource(uniform)
            .texture(color)
            .texture(normal)
            .texture(roughness)
            .texture(displacement)
            .sampler(sampler)
            .create(device, "Material Bind Group")
    }
}

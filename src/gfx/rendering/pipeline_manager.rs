//! Named render pipelines
//!
//! Shaders are loaded and pipelines registered by name up front, then built
//! in one go with [`PipelineManager::create_all_pipelines`]. Every garden
//! pipeline draws [`Vertex3D`] triangle lists with `vs_main`/`fs_main` entry
//! points, so a [`PipelineConfig`] only carries what differs between them.

use std::{collections::HashMap, sync::Arc};
use wgpu::*;

use crate::gfx::scene::vertex::Vertex3D;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub shader: String,
    pub bind_group_layouts: Vec<BindGroupLayout>,
    pub cull_mode: Option<Face>,
    pub depth_format: Option<TextureFormat>,
    pub depth_bias: DepthBiasState,
    /// `None` builds a depth-only pipeline without a fragment stage
    pub color_format: Option<TextureFormat>,
}

impl PipelineConfig {
    pub fn default_with_shader(shader: &str) -> Self {
        Self {
            label: shader.to_string(),
            shader: shader.to_string(),
            bind_group_layouts: Vec::new(),
            cull_mode: Some(Face::Back),
            depth_format: None,
            depth_bias: DepthBiasState::default(),
            color_format: Some(TextureFormat::Bgra8Unorm),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    pub fn with_cull_mode(mut self, face: Option<Face>) -> Self {
        self.cull_mode = face;
        self
    }

    /// Drops the fragment stage; used for the shadow pass
    pub fn with_vertex_only(mut self) -> Self {
        self.color_format = None;
        self
    }

    pub fn with_bind_group_layouts(mut self, layouts: Vec<BindGroupLayout>) -> Self {
        self.bind_group_layouts = layouts;
        self
    }

    /// Enables depth testing against a target of the given format
    pub fn with_depth_stencil(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// Slope-scaled bias, keeps the shadow map from shadowing itself
    pub fn with_depth_bias(mut self, constant: i32, slope_scale: f32) -> Self {
        self.depth_bias = DepthBiasState {
            constant,
            slope_scale,
            clamp: 0.0,
        };
        self
    }

    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_format = Some(format);
        self
    }

    pub fn is_vertex_only(&self) -> bool {
        self.color_format.is_none()
    }
}

pub struct PipelineManager {
    device: Arc<Device>,
    shaders: HashMap<String, ShaderModule>,
    registered: Vec<(String, PipelineConfig)>,
    pipelines: HashMap<String, RenderPipeline>,
}

impl PipelineManager {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            shaders: HashMap::new(),
            registered: Vec::new(),
            pipelines: HashMap::new(),
        }
    }

    /// Compiles a WGSL module and stores it under `name`
    pub fn load_shader(&mut self, name: &str, source: &str) {
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });
        self.shaders.insert(name.to_string(), module);
    }

    /// Queues a pipeline for the next [`PipelineManager::create_all_pipelines`]
    pub fn register_pipeline(&mut self, name: &str, config: PipelineConfig) {
        self.registered.push((name.to_string(), config));
    }

    /// Builds every queued pipeline
    ///
    /// Returns one message per pipeline that could not be built.
    pub fn create_all_pipelines(&mut self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, config) in std::mem::take(&mut self.registered) {
            match self.build(&config) {
                Some(pipeline) => {
                    log::debug!("Created pipeline '{}'", name);
                    self.pipelines.insert(name, pipeline);
                }
                None => errors.push(format!(
                    "pipeline '{}' references unknown shader '{}'",
                    name, config.shader
                )),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn pipeline(&self, name: &str) -> Option<&RenderPipeline> {
        self.pipelines.get(name)
    }

    fn build(&self, config: &PipelineConfig) -> Option<RenderPipeline> {
        let shader = self.shaders.get(&config.shader)?;

        let layouts: Vec<&BindGroupLayout> = config.bind_group_layouts.iter().collect();
        let layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", config.label)),
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        });

        let targets = [config.color_format.map(|format| ColorTargetState {
            format,
            blend: Some(BlendState::REPLACE),
            write_mask: ColorWrites::ALL,
        })];
        let fragment = config.color_format.map(|_| FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &targets,
            compilation_options: PipelineCompilationOptions::default(),
        });

        Some(self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&config.label),
            layout: Some(&layout),
            vertex: VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex3D::desc()],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment,
            primitive: PrimitiveState {
                cull_mode: config.cull_mode,
                ..Default::default()
            },
            depth_stencil: config.depth_format.map(|format| DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: StencilState::default(),
                bias: config.depth_bias,
            }),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_config_has_no_fragment_stage() {
        let config = PipelineConfig::default_with_shader("shadow")
            .with_label("Shadow")
            .with_vertex_only()
            .with_cull_mode(None)
            .with_depth_stencil(TextureFormat::Depth32Float)
            .with_depth_bias(2, 2.0);
        assert!(config.is_vertex_only());
        assert_eq!(config.cull_mode, None);
        assert_eq!(config.depth_format, Some(TextureFormat::Depth32Float));
        assert_eq!(config.depth_bias.constant, 2);
    }

    #[test]
    fn test_color_format_follows_surface() {
        let config = PipelineConfig::default_with_shader("standard")
            .with_color_format(TextureFormat::Rgba8Unorm);
        assert!(!config.is_vertex_only());
        assert_eq!(config.color_format, Some(TextureFormat::Rgba8Unorm));
        assert_eq!(config.cull_mode, Some(Face::Back));
    }
}

//! WGPU-based renderer for the garden scene
//!
//! Each frame runs two passes: a depth-only pass from the directional light
//! into the shadow map, then the main pass into the swapchain image. Meshes,
//! their uniforms and their material bind groups live in caches keyed by node
//! id and are refreshed from the scene before drawing. An optional callback
//! records extra work (the imgui overlay) into the same encoder.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use wgpu::{Device, TextureFormat};

use crate::{
    error::RenderError,
    gfx::{
        camera::{camera_utils::CameraUniform, OrbitCamera},
        resources::{
            global_bindings::{update_global_ubo, GlobalBindings, GlobalUBO},
            material::{MaterialBindings, MaterialUniform, Side},
            texture::{TextureHandle, MAX_TEXTURE_DIMENSION},
            texture_resource::TextureResource,
        },
        scene::{NodeId, Scene},
    },
    render_loop::FrameRenderer,
    wgpu_utils::{
        binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
        binding_types,
    },
};

use super::{
    gpu_mesh::{effective_flags, ready_maps, DrawMesh, GpuMesh, MaterialKey},
    pipeline_manager::{PipelineConfig, PipelineManager},
};

const SHADOW_PIPELINE: &str = "shadow";
const FRONT_PIPELINE: &str = "garden.front";
const BACK_PIPELINE: &str = "garden.back";
const DOUBLE_PIPELINE: &str = "garden.double";

fn pipeline_for(side: Side) -> &'static str {
    match side {
        Side::Front => FRONT_PIPELINE,
        Side::Back => BACK_PIPELINE,
        Side::Double => DOUBLE_PIPELINE,
    }
}

/// One mesh queued for this frame
#[derive(Debug, Clone, Copy)]
struct DrawItem {
    id: NodeId,
    side: Side,
    cast_shadow: bool,
}

/// 1x1 textures bound in place of maps that are absent or still loading
struct FallbackTextures {
    white: TextureResource,
    flat_normal: TextureResource,
    black: TextureResource,
}

/// Core renderer owning the device, the swapchain and every GPU cache
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    depth_texture: TextureResource,
    pub pipeline_manager: PipelineManager,
    global_ubo: GlobalUBO,
    global_bindings: GlobalBindings,

    shadow_map: TextureResource,
    shadow_bind_group: wgpu::BindGroup,

    object_layout: BindGroupLayoutWithDesc,
    material_layout: BindGroupLayoutWithDesc,
    material_sampler: wgpu::Sampler,
    fallbacks: FallbackTextures,

    meshes: HashMap<NodeId, GpuMesh>,
    textures: HashMap<u64, TextureResource>,
}

impl RenderEngine {
    /// Opens a device for `window` and builds every pipeline
    ///
    /// `shadow_map_size` fixes the resolution of the directional shadow map
    /// for the lifetime of the engine.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        shadow_map_size: u32,
    ) -> Result<RenderEngine, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Garden Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: MAX_TEXTURE_DIMENSION,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .unwrap_or(surface_capabilities.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "Surface {}x{} {:?}, shadow map {}x{}",
            config.width,
            config.height,
            format,
            shadow_map_size,
            shadow_map_size
        );

        let depth_texture =
            TextureResource::create_depth_texture(&device, &config, "depth_texture");
        let shadow_map = TextureResource::create_shadow_map(&device, shadow_map_size.max(1));
        let shadow_sampler = TextureResource::create_shadow_sampler(&device);

        let shadow_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::shadow_map())
            .next_binding_fragment(binding_types::shadow_sampler())
            .create(&device, "Shadow Bind Group Layout");
        let shadow_bind_group = BindGroupBuilder::new(&shadow_layout)
            .texture(&shadow_map.view)
            .sampler(&shadow_sampler)
            .create(&device, "Shadow Bind Group");

        let global_ubo = GlobalUBO::new(&device);
        let global_bindings = GlobalBindings::new(&device, &global_ubo);

        let object_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .create(&device, "Object Bind Group Layout");
        let material_layout = MaterialBindings::layout(&device);
        let material_sampler = TextureResource::create_material_sampler(&device);

        let fallbacks = FallbackTextures {
            white: TextureResource::solid(&device, &queue, [255, 255, 255, 255], "fallback white"),
            flat_normal: TextureResource::solid(&device, &queue, [128, 128, 255, 255], "fallback normal"),
            black: TextureResource::solid(&device, &queue, [0, 0, 0, 255], "fallback black"),
        };

        let device_handle: Arc<Device> = device.into();
        let queue_handle: Arc<wgpu::Queue> = queue.into();
        let mut pipeline_manager = PipelineManager::new(device_handle.clone());

        pipeline_manager.load_shader("standard", include_str!("standard.wgsl"));
        pipeline_manager.load_shader("shadow", include_str!("shadow_pass.wgsl"));

        // Both faces go into the shadow map so thin boards do not leak light
        pipeline_manager.register_pipeline(
            SHADOW_PIPELINE,
            PipelineConfig::default_with_shader("shadow")
                .with_label("Shadow")
                .with_vertex_only()
                .with_cull_mode(None)
                .with_depth_stencil(TextureResource::DEPTH_FORMAT)
                .with_depth_bias(2, 2.0)
                .with_bind_group_layouts(vec![
                    global_bindings.bind_group_layout().clone(),
                    object_layout.layout.clone(),
                ]),
        );

        for side in [Side::Front, Side::Back, Side::Double] {
            let name = pipeline_for(side);
            pipeline_manager.register_pipeline(
                name,
                PipelineConfig::default_with_shader("standard")
                    .with_label(name)
                    .with_cull_mode(side.cull_mode())
                    .with_color_format(format)
                    .with_depth_stencil(TextureResource::DEPTH_FORMAT)
                    .with_bind_group_layouts(vec![
                        global_bindings.bind_group_layout().clone(),
                        object_layout.layout.clone(),
                        material_layout.layout.clone(),
                        shadow_layout.layout.clone(),
                    ]),
            );
        }

        pipeline_manager
            .create_all_pipelines()
            .map_err(RenderError::Pipelines)?;

        Ok(RenderEngine {
            surface,
            device: device_handle,
            queue: queue_handle,
            config,
            format,
            depth_texture,
            pipeline_manager,
            global_ubo,
            global_bindings,
            shadow_map,
            shadow_bind_group,
            object_layout,
            material_layout,
            material_sampler,
            fallbacks,
            meshes: HashMap::new(),
            textures: HashMap::new(),
        })
    }

    /// Draws the scene, then hands the encoder to `ui_callback`
    ///
    /// Invalidated materials are recompiled here, which is why the scene is
    /// borrowed mutably. A lost or outdated surface is reconfigured and the
    /// frame skipped; any other surface error is returned.
    pub fn render_frame<F>(
        &mut self,
        scene: &mut Scene,
        camera: &CameraUniform,
        ui_callback: Option<F>,
    ) -> Result<(), RenderError>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    {
        let lighting = scene.lighting();
        update_global_ubo(
            &mut self.global_ubo,
            &self.queue,
            camera,
            &lighting,
            scene.fog.as_ref(),
        );
        let draws = self.sync_scene(scene);

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("Surface {}, reconfiguring", err);
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        // PASS 1: shadow depth from the directional light
        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Depth Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let casts_shadows = lighting.directional.is_some_and(|sun| sun.cast_shadow);
            if casts_shadows {
                let pipeline = self
                    .pipeline_manager
                    .pipeline(SHADOW_PIPELINE)
                    .ok_or(RenderError::MissingPipeline(SHADOW_PIPELINE))?;
                shadow_pass.set_pipeline(pipeline);
                shadow_pass.set_bind_group(0, self.global_bindings.bind_group(), &[]);

                for draw in draws.iter().filter(|draw| draw.cast_shadow) {
                    if let Some(mesh) = self.meshes.get(&draw.id) {
                        shadow_pass.draw_mesh(mesh);
                    }
                }
            }
        }

        // PASS 2: lit scene
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(scene.background.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, self.global_bindings.bind_group(), &[]);
            render_pass.set_bind_group(3, &self.shadow_bind_group, &[]);

            for draw in &draws {
                let Some(mesh) = self.meshes.get(&draw.id) else {
                    continue;
                };
                let Some((_, material_bind_group)) = &mesh.material_bind_group else {
                    continue;
                };
                let name = pipeline_for(draw.side);
                let pipeline = self
                    .pipeline_manager
                    .pipeline(name)
                    .ok_or(RenderError::MissingPipeline(name))?;
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(2, material_bind_group, &[]);
                render_pass.draw_mesh(mesh);
            }
        }

        // PASS 3: overlay
        if let Some(ui_callback) = ui_callback {
            ui_callback(
                &self.device,
                &self.queue,
                &mut encoder,
                &surface_texture_view,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    /// Brings the GPU caches in line with the scene and lists what to draw
    fn sync_scene(&mut self, scene: &mut Scene) -> Vec<DrawItem> {
        let device: &wgpu::Device = &self.device;
        let queue: &wgpu::Queue = &self.queue;
        let meshes = &mut self.meshes;
        let textures = &mut self.textures;
        let fallbacks = &self.fallbacks;
        let object_layout = &self.object_layout;
        let material_layout = &self.material_layout;
        let material_sampler = &self.material_sampler;

        let mut draws = Vec::new();
        let mut seen = HashSet::new();

        scene.visit_meshes_mut(|id, world, mesh| {
            seen.insert(id);

            let gpu = meshes.entry(id).or_insert_with(|| {
                GpuMesh::new(device, &mesh.geometry, object_layout, &mesh.material.name)
            });
            if !gpu.holds(&mesh.geometry) {
                gpu.replace_geometry(device, &mesh.geometry, &mesh.material.name);
            }
            gpu.update_object(queue, world, mesh);

            let material = &mut mesh.material;
            if material.sync_program() {
                log::debug!(
                    "Recompiled material '{}' (version {})",
                    material.name,
                    material.version()
                );
            }

            let maps = ready_maps(material);
            for handle in maps.iter().flatten() {
                upload_texture(device, queue, textures, handle);
            }

            let flags = effective_flags(material.program(), &maps);
            gpu.material_ubo
                .update_content(queue, MaterialUniform::new(material, flags));

            let key = MaterialKey::new(material, &maps);
            let stale = gpu
                .material_bind_group
                .as_ref()
                .map_or(true, |(built, _)| *built != key);
            if stale {
                let bind_group = MaterialBindings::create_bind_group(
                    device,
                    material_layout,
                    gpu.material_ubo.binding_resource(),
                    map_view(textures, key.textures[0], &fallbacks.white),
                    map_view(textures, key.textures[1], &fallbacks.flat_normal),
                    map_view(textures, key.textures[2], &fallbacks.white),
                    map_view(textures, key.textures[3], &fallbacks.black),
                    material_sampler,
                );
                gpu.material_bind_group = Some((key, bind_group));
            }

            draws.push(DrawItem {
                id,
                side: material.program().side,
                cast_shadow: mesh.cast_shadow,
            });
        });

        let before = meshes.len();
        meshes.retain(|id, _| seen.contains(id));
        if meshes.len() != before {
            log::debug!("Released {} GPU meshes", before - meshes.len());
        }

        draws
    }

    /// Resizes the swapchain and depth buffer; zero sizes are ignored
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, &self.config, "depth_texture");
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

fn map_view<'a>(
    textures: &'a HashMap<u64, TextureResource>,
    texture_id: Option<u64>,
    fallback: &'a TextureResource,
) -> &'a wgpu::TextureView {
    texture_id
        .and_then(|id| textures.get(&id))
        .map_or(&fallback.view, |resource| &resource.view)
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    textures: &mut HashMap<u64, TextureResource>,
    handle: &TextureHandle,
) {
    if textures.contains_key(&handle.id()) {
        return;
    }
    if let Some(image) = handle.image() {
        let limit = device.limits().max_texture_dimension_2d;
        if image.width > limit || image.height > limit {
            log::debug!(
                "Texture '{}' ({}x{}) exceeds the device limit of {}",
                handle.label(),
                image.width,
                image.height,
                limit
            );
            return;
        }
        log::debug!(
            "Uploading texture '{}' ({}x{})",
            handle.label(),
            image.width,
            image.height
        );
        textures.insert(
            handle.id(),
            TextureResource::from_image(device, queue, image, handle.label()),
        );
    }
}

impl FrameRenderer for RenderEngine {
    fn render(&mut self, scene: &mut Scene, camera: &OrbitCamera) -> Result<(), RenderError> {
        self.render_frame(
            scene,
            &camera.uniform,
            None::<fn(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView)>,
        )
    }
}

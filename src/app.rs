use anyhow::Context;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::GardenConfig,
    debug::{debug_panel, DebugParameterSet},
    error::RenderError,
    gfx::{
        camera::OrbitCamera, rendering::RenderEngine, resources::loader::AssetLoader, scene::Scene,
    },
    render_loop::{FrameRenderer, LoopState, RenderLoop},
    ui::{InputCapture, UiManager},
};

/// Desktop shell around the garden: one window, one render loop, one overlay
pub struct GardenApp {
    config: GardenConfig,
}

struct AppState {
    config: GardenConfig,
    loader: AssetLoader,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    ui_manager: Option<UiManager>,
    render_loop: Option<RenderLoop>,
    params: DebugParameterSet,
    fatal: Option<RenderError>,
}

/// Draws the scene and then the imgui overlay into the same frame
struct OverlayRenderer<'a> {
    engine: &'a mut RenderEngine,
    ui: &'a mut UiManager,
}

impl FrameRenderer for OverlayRenderer<'_> {
    fn render(&mut self, scene: &mut Scene, camera: &OrbitCamera) -> Result<(), RenderError> {
        let ui = &mut *self.ui;
        self.engine.render_frame(
            scene,
            &camera.uniform,
            Some(
                |device: &wgpu::Device,
                 queue: &wgpu::Queue,
                 encoder: &mut wgpu::CommandEncoder,
                 view: &wgpu::TextureView| {
                    ui.render_overlay(device, queue, encoder, view);
                },
            ),
        )
    }
}

impl GardenApp {
    pub fn new(config: GardenConfig) -> Self {
        Self { config }
    }

    /// Opens the window and blocks until it closes
    ///
    /// A render fault ends the event loop and is returned here.
    pub fn run(self) -> anyhow::Result<()> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut state = AppState {
            config: self.config,
            loader: AssetLoader::new(),
            window: None,
            render_engine: None,
            ui_manager: None,
            render_loop: None,
            params: DebugParameterSet::new(),
            fatal: None,
        };
        event_loop
            .run_app(&mut state)
            .context("event loop terminated abnormally")?;

        match state.fatal.take() {
            Some(err) => Err(anyhow::Error::new(err).context("garden stopped on a render fault")),
            None => {
                if let Some(render_loop) = &state.render_loop {
                    log::info!("Stopped after {} frames", render_loop.frame_count());
                }
                Ok(())
            }
        }
    }
}

impl AppState {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RenderError) {
        log::error!("{}", err);
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn request_shutdown(&self) {
        if let Some(render_loop) = &self.render_loop {
            render_loop.shutdown_flag().request();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(engine), Some(ui), Some(render_loop)) = (
            self.window.as_ref(),
            self.render_engine.as_mut(),
            self.ui_manager.as_mut(),
            self.render_loop.as_mut(),
        ) else {
            return;
        };

        // Parameter edits land in the scene before this frame is drawn
        let params = &mut self.params;
        let scene = &mut render_loop.garden.scene;
        ui.build_frame(window, |frame| debug_panel(frame, params, scene));

        let mut renderer = OverlayRenderer { engine, ui };
        match render_loop.tick(&mut renderer) {
            Ok(LoopState::Running) => {}
            Ok(LoopState::Stopped) => event_loop.exit(),
            Err(err) => self.fail(event_loop, err),
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let settings = &self.config.window;
        let attributes = WindowAttributes::default()
            .with_title(settings.title.clone())
            .with_inner_size(LogicalSize::new(settings.width, settings.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        let (width, height): (u32, u32) = window.inner_size().into();
        let shadow_map_size = self.config.layout.shadow_map_size;
        let window_handle = window.clone();
        let engine = match pollster::block_on(async move {
            RenderEngine::new(window_handle, width, height, shadow_map_size).await
        }) {
            Ok(engine) => engine,
            Err(err) => return self.fail(event_loop, err),
        };

        let ui_manager = UiManager::new(
            engine.device(),
            engine.queue(),
            engine.surface_format(),
            &window,
        );

        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let render_loop = RenderLoop::start(&self.config, &self.loader, aspect);
        self.params = DebugParameterSet::for_garden(&render_loop.garden);

        self.window = Some(window);
        self.render_engine = Some(engine);
        self.ui_manager = Some(ui_manager);
        self.render_loop = Some(render_loop);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };

        let capture = match self.ui_manager.as_mut() {
            Some(ui_manager) => ui_manager.handle_window_event(&window, window_id, &event),
            None => InputCapture::default(),
        };

        match event {
            WindowEvent::CloseRequested => {
                self.request_shutdown();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.request_shutdown(),
            WindowEvent::KeyboardInput { ref event, .. } => {
                if let Some(render_loop) = self.render_loop.as_mut().filter(|_| !capture.keyboard) {
                    render_loop.camera.process_keyboard_event(event);
                }
            }
            WindowEvent::MouseInput { state, .. } => {
                // Releases always reach the camera so a drag never sticks
                let released = state == ElementState::Released;
                if let Some(render_loop) = self.render_loop.as_mut() {
                    if released || !capture.blocks(&event) {
                        render_loop.camera.process_window_event(&event);
                    }
                }
            }
            WindowEvent::MouseWheel { .. } => {
                if let Some(render_loop) = self.render_loop.as_mut().filter(|_| !capture.blocks(&event)) {
                    render_loop.camera.process_window_event(&event);
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(render_loop) = self.render_loop.as_mut() {
                    render_loop.camera.camera.resize_projection(width, height);
                }
                if let Some(engine) = self.render_engine.as_mut() {
                    engine.resize(width, height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => (),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if self.ui_manager.as_ref().is_some_and(|ui| ui.capture().mouse) {
            return;
        }
        if let Some(render_loop) = self.render_loop.as_mut() {
            render_loop.camera.process_device_event(&event);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self
            .render_loop
            .as_ref()
            .is_some_and(|render_loop| render_loop.state() == LoopState::Stopped)
        {
            event_loop.exit();
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

//! Per-frame driver
//!
//! One [`RenderLoop::tick`] per display refresh: deliver a finished board
//! import, apply camera input, then draw. The loop stops at the first tick
//! after shutdown was requested, and a render fault stops it immediately.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    composer::{compose_scene, ComposedScene},
    config::GardenConfig,
    error::RenderError,
    gfx::{
        camera::{CameraManager, OrbitCamera},
        resources::{
            loader::{AssetLoader, PendingModel},
            material::TextureSet,
        },
        scene::Scene,
    },
};

/// Anything that can turn the scene into pixels
///
/// The renderer gets mutable access so it can compile invalidated materials.
pub trait FrameRenderer {
    fn render(&mut self, scene: &mut Scene, camera: &OrbitCamera) -> Result<(), RenderError>;
}

/// Cloneable stop request, safe to set from any thread
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

pub struct RenderLoop {
    pub garden: ComposedScene,
    pub camera: CameraManager,
    board_load: Option<PendingModel>,
    shutdown: ShutdownFlag,
    state: LoopState,
    frames: u64,
}

/// Starts every texture decode in the background
pub fn request_textures(config: &GardenConfig, loader: &AssetLoader) -> TextureSet {
    let assets = &config.assets;
    TextureSet {
        displacement: loader.load_texture(assets.resolve(&assets.displacement_map), "displacement"),
        board_color: loader.load_texture(assets.resolve(&assets.board_color), "board color"),
        board_normal: loader.load_texture(assets.resolve(&assets.board_normal), "board normal"),
        board_roughness: loader
            .load_texture(assets.resolve(&assets.board_roughness), "board roughness"),
        sand_normal: loader.load_texture(assets.resolve(&assets.sand_normal), "sand normal"),
        sand_roughness: loader
            .load_texture(assets.resolve(&assets.sand_roughness), "sand roughness"),
    }
}

impl RenderLoop {
    pub fn new(garden: ComposedScene, camera: CameraManager, board_load: Option<PendingModel>) -> Self {
        Self {
            garden,
            camera,
            board_load,
            shutdown: ShutdownFlag::new(),
            state: LoopState::Running,
            frames: 0,
        }
    }

    /// Composes the garden and kicks off every asset load
    ///
    /// Returns at once; the board and the textures show up in later frames.
    pub fn start(config: &GardenConfig, loader: &AssetLoader, aspect: f32) -> Self {
        let textures = request_textures(config, loader);
        let garden = compose_scene(config, &textures);
        let board_load = loader.load_model(config.assets.resolve(&config.assets.board_model));
        let camera = CameraManager::from_settings(&config.camera, aspect);
        Self::new(garden, camera, Some(board_load))
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn is_board_pending(&self) -> bool {
        self.board_load.is_some()
    }

    /// Runs one frame
    ///
    /// Camera input is applied before drawing so the frame shows the current
    /// pose. A render error stops the loop and is handed to the caller.
    pub fn tick<R: FrameRenderer>(&mut self, renderer: &mut R) -> Result<LoopState, RenderError> {
        if self.state == LoopState::Stopped {
            return Ok(self.state);
        }

        if let Some(outcome) = self.board_load.as_mut().and_then(PendingModel::try_recv) {
            self.board_load = None;
            self.garden.on_board_loaded(outcome);
        }

        self.camera.update();

        if let Err(err) = renderer.render(&mut self.garden.scene, &self.camera.camera) {
            log::error!("Frame {} failed, stopping: {}", self.frames, err);
            self.state = LoopState::Stopped;
            return Err(err);
        }
        self.frames += 1;

        if self.shutdown.is_requested() {
            log::info!("Shutdown requested after {} frames", self.frames);
            self.state = LoopState::Stopped;
        }
        Ok(self.state)
    }
}

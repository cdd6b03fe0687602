//! Garden configuration
//!
//! Every constant the scene is built from lives here: asset locations, the
//! defaults shown in the debug panel and the fixed scene layout. The defaults
//! reproduce the reference garden; [`GardenConfig::from_env`] allows the asset
//! root and the sand resolution to be overridden without recompiling.

use std::path::{Path, PathBuf};

use crate::gfx::color::Color;

/// Environment variable overriding the asset root directory
pub const ASSET_ROOT_ENV: &str = "ZEN_GARDEN_ASSETS";
/// Environment variable overriding the sand grid resolution
pub const VERTECES_ENV: &str = "ZEN_GARDEN_VERTECES";

/// Top-level configuration for the application
#[derive(Debug, Clone)]
pub struct GardenConfig {
    pub assets: AssetPaths,
    pub debug: DebugDefaults,
    pub layout: SceneLayout,
    pub camera: CameraSettings,
    pub window: WindowSettings,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            assets: AssetPaths::default(),
            debug: DebugDefaults::default(),
            layout: SceneLayout::default(),
            camera: CameraSettings::default(),
            window: WindowSettings::default(),
        }
    }
}

impl GardenConfig {
    /// Defaults with the environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var(ASSET_ROOT_ENV) {
            log::info!("Using asset root '{}' from {}", root, ASSET_ROOT_ENV);
            config.assets.root = PathBuf::from(root);
        }

        if let Ok(raw) = std::env::var(VERTECES_ENV) {
            match parse_resolution(&raw) {
                Some(verteces) => config.debug.verteces = verteces,
                None => log::warn!(
                    "Ignoring {}='{}': expected an integer >= 1, keeping {}",
                    VERTECES_ENV,
                    raw,
                    config.debug.verteces
                ),
            }
        }

        config
    }

    /// Builder pattern: replace the asset root
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets.root = root.into();
        self
    }

    /// Builder pattern: replace the sand grid resolution
    pub fn with_verteces(mut self, verteces: u32) -> Self {
        self.debug.verteces = verteces.max(1);
        self
    }
}

fn parse_resolution(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v >= 1)
}

/// Asset file locations, relative to `root`
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub root: PathBuf,
    pub board_model: PathBuf,
    pub displacement_map: PathBuf,
    pub board_color: PathBuf,
    pub board_normal: PathBuf,
    pub board_roughness: PathBuf,
    pub sand_normal: PathBuf,
    pub sand_roughness: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            board_model: PathBuf::from("models/zen-board.glb"),
            displacement_map: PathBuf::from("drawings/corgi.png"),
            board_color: PathBuf::from("textures/Wood_BaseColor.png"),
            board_normal: PathBuf::from("textures/Wood_Normal.png"),
            board_roughness: PathBuf::from("textures/Wood_Roughness.png"),
            sand_normal: PathBuf::from("textures/Sand_Normal.png"),
            sand_roughness: PathBuf::from("textures/Sand_Roughness.png"),
        }
    }
}

impl AssetPaths {
    /// Joins a configured relative path onto the asset root
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Initial values of the live-editable parameters
#[derive(Debug, Clone)]
pub struct DebugDefaults {
    pub sand_surface_color: String,
    pub sand_bottom_color: String,
    pub displacement_scale: f32,
    pub displacement_bias: f32,
    /// Sand grid subdivisions per side
    pub verteces: u32,
}

impl Default for DebugDefaults {
    fn default() -> Self {
        Self {
            sand_surface_color: "#ded5ca".to_string(),
            sand_bottom_color: "#beaaa3".to_string(),
            displacement_scale: 0.01,
            displacement_bias: -0.01,
            verteces: 500,
        }
    }
}

/// Fixed placement of every node in the garden
#[derive(Debug, Clone)]
pub struct SceneLayout {
    pub background: Color,
    pub fog_near: f32,
    pub fog_far: f32,
    pub sand_size: f32,
    pub bottom_sand_offset: f32,
    pub floor_size: f32,
    pub floor_offset: f32,
    pub board_offset: f32,
    pub board_shininess: f32,
    pub hemisphere_height: f32,
    pub hemisphere_intensity: f32,
    pub directional_position: [f32; 3],
    pub directional_intensity: f32,
    pub shadow_map_size: u32,
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self {
            background: Color::from_hex_u32(0xf1f1f1),
            fog_near: 20.0,
            fog_far: 100.0,
            sand_size: 2.0,
            bottom_sand_offset: 0.009,
            floor_size: 5000.0,
            floor_offset: 0.2,
            board_offset: 1.0,
            board_shininess: 60.0,
            hemisphere_height: 50.0,
            hemisphere_intensity: 0.61,
            directional_position: [-8.0, 12.0, 8.0],
            directional_intensity: 0.54,
            shadow_map_size: 1024,
        }
    }
}

/// Perspective camera parameters and initial pose
#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Initial height above the origin, looking straight down
    pub height: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 20.0,
            near: 1.0,
            far: 10000.0,
            height: 10.0,
            rotate_speed: 0.005,
            zoom_speed: 1.0,
        }
    }
}

/// Window creation settings
#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Zen Garden".to_string(),
            width: 1200,
            height: 800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_garden() {
        let config = GardenConfig::default();
        assert_eq!(config.debug.verteces, 500);
        assert_eq!(config.debug.displacement_scale, 0.01);
        assert_eq!(config.debug.sand_surface_color, "#ded5ca");
        assert_eq!(config.layout.background.to_hex_u32(), 0xf1f1f1);
        assert_eq!(config.layout.shadow_map_size, 1024);
        assert_eq!(config.camera.fov_degrees, 20.0);
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!(parse_resolution("64"), Some(64));
        assert_eq!(parse_resolution(" 8 "), Some(8));
        assert_eq!(parse_resolution("0"), None);
        assert_eq!(parse_resolution("-3"), None);
        assert_eq!(parse_resolution("many"), None);
    }

    #[test]
    fn test_asset_resolution() {
        let config = GardenConfig::default().with_asset_root("/srv/garden");
        let path = config.assets.resolve(&config.assets.board_model);
        assert_eq!(path, PathBuf::from("/srv/garden/models/zen-board.glb"));
    }

    #[test]
    fn test_with_verteces_never_drops_below_one() {
        assert_eq!(GardenConfig::default().with_verteces(0).debug.verteces, 1);
    }
}

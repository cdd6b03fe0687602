//! # Graphics Module
//!
//! Everything between the scene description and pixels on screen.
//!
//! - **Camera** ([`camera`]) - orbit camera and its input controller
//! - **Geometry** ([`geometry`]) - procedural surfaces and normal generation
//! - **Scene** ([`scene`]) - node hierarchy, transforms and lights
//! - **Resources** ([`resources`]) - materials, textures, background asset loading
//! - **Rendering** ([`rendering`]) - shadow mapping and the lit main pass

pub mod camera;
pub mod color;
pub mod geometry;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::orbit_camera::OrbitCamera;
pub use color::Color;
pub use rendering::render_engine::RenderEngine;

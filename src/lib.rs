// src/lib.rs
//! Zen Garden
//!
//! A decorative sand box rendered with wgpu: a wooden board resting in two
//! displaced sand layers over a floor, lit by a sky light and a shadow casting
//! sun, with an imgui panel for live tuning.
//!
//! [`render_loop::RenderLoop`] drives the frames and can be used without a
//! window; [`app::GardenApp`] wraps it in a winit event loop.

pub mod app;
pub mod composer;
pub mod config;
pub mod debug;
pub mod error;
pub mod gfx;
pub mod render_loop;
pub mod ui;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::GardenApp;
pub use config::GardenConfig;

//! Core rendering functionality
//!
//! Handles render pipelines, GPU mesh caches, and frame rendering.

pub mod gpu_mesh;
pub mod pipeline_manager;
pub mod render_engine;

// Re-export main types
pub use pipeline_manager::{PipelineConfig, PipelineManager};
pub use render_engine::RenderEngine;

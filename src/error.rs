//! Error types shared across the garden
//!
//! Asset and parameter failures are recoverable and carry enough context to be
//! logged. Render faults are not recovered by the frame loop and end the process.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while importing a model or decoding a texture
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to import glTF '{path}': {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("failed to import OBJ '{path}': {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("failed to decode image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported model format '{path}'")]
    UnsupportedFormat { path: PathBuf },
    #[error("model '{path}' contains no triangle meshes")]
    EmptyModel { path: PathBuf },
    #[error("loader for '{path}' stopped before reporting a result")]
    Cancelled { path: PathBuf },
}

/// Rejected write through the debug parameter set
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("unknown debug parameter '{0}'")]
    UnknownParameter(String),
    #[error("parameter '{name}' expects a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },
    #[error("'{0}' is not a #rrggbb color")]
    InvalidColor(String),
    #[error("parameter '{0}' is bound to a node that is not in the scene")]
    MissingTarget(String),
    #[error("parameter '{name}' targets a material without {field}")]
    MissingField { name: String, field: &'static str },
}

/// Fault raised while setting up the GPU or drawing a frame
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to build pipelines: {}", .0.join("; "))]
    Pipelines(Vec<String>),
    #[error("pipeline '{0}' is missing")]
    MissingPipeline(&'static str),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

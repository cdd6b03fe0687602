//! CPU and GPU resources
//!
//! Materials and shared textures on the CPU side, background asset loading,
//! and the GPU buffers, textures and bind groups they are uploaded into.

pub mod global_bindings;
pub mod loader;
pub mod material;
pub mod texture;
pub mod texture_resource;

pub use global_bindings::{update_global_ubo, GlobalBindings, GlobalUBO};
pub use loader::{AssetLoader, ModelLoad, PendingModel};
pub use material::{build_material, Material, MaterialKind, MaterialParams, TextureSet};
pub use texture::{TextureHandle, TextureImage};
pub use texture_resource::TextureResource;

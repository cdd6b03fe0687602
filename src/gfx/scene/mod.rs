//! # Scene Graph
//!
//! A [`Scene`] is a forest of [`Node`]s. Each node has a local [`Transform`]
//! and is either a mesh, a group of children, or a light.

pub mod light;
pub mod node;
pub mod scene;
pub mod vertex;

pub use light::{Light, LightingState};
pub use node::{GroupNode, MeshNode, Node, NodeId, NodeKind, Transform};
pub use scene::{Fog, Scene};
pub use vertex::Vertex3D;

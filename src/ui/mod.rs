//! # User Interface Module
//!
//! Dear ImGui overlay on top of the rendered garden. [`UiManager`] owns the
//! imgui context and renderer; the panel contents live in
//! [`crate::debug::panel`].
//!
//! When the overlay has focus, camera input is suppressed so dragging a
//! slider never also orbits the view.

pub mod manager;

pub use manager::{InputCapture, UiManager};

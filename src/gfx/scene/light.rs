//! Scene lights
//!
//! Lights are ordinary nodes; their position comes from the node transform.
//! A directional light always points from its position at the world origin.

use cgmath::{InnerSpace, Vector3};

use crate::gfx::color::Color;

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    /// Ambient term blended between a sky and a ground color by normal.y
    Hemisphere {
        sky_color: Color,
        ground_color: Color,
        intensity: f32,
    },
    /// Parallel light aimed at the origin, optionally casting shadows
    Directional {
        color: Color,
        intensity: f32,
        cast_shadow: bool,
        shadow_map_size: u32,
    },
}

impl Light {
    pub fn intensity(&self) -> f32 {
        match self {
            Light::Hemisphere { intensity, .. } | Light::Directional { intensity, .. } => *intensity,
        }
    }

    pub fn set_intensity(&mut self, value: f32) {
        match self {
            Light::Hemisphere { intensity, .. } | Light::Directional { intensity, .. } => {
                *intensity = value
            }
        }
    }
}

/// Hemisphere light as seen by the shader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereState {
    pub sky_color: Color,
    pub ground_color: Color,
    pub intensity: f32,
}

/// Directional light resolved to world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalState {
    pub position: Vector3<f32>,
    pub color: Color,
    pub intensity: f32,
    pub cast_shadow: bool,
    pub shadow_map_size: u32,
}

impl DirectionalState {
    /// Unit vector from the lit surface towards the light
    pub fn direction_to_light(&self) -> Vector3<f32> {
        if self.position.magnitude2() > f32::EPSILON {
            self.position.normalize()
        } else {
            Vector3::unit_y()
        }
    }
}

/// The lights a frame is shaded with
///
/// The shader supports one light of each kind; extra lights are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightingState {
    pub hemisphere: Option<HemisphereState>,
    pub directional: Option<DirectionalState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_accessors_cover_both_kinds() {
        let mut lights = [
            Light::Hemisphere {
                sky_color: Color::WHITE,
                ground_color: Color::WHITE,
                intensity: 0.61,
            },
            Light::Directional {
                color: Color::WHITE,
                intensity: 0.54,
                cast_shadow: true,
                shadow_map_size: 1024,
            },
        ];
        assert_eq!(lights[0].intensity(), 0.61);
        for light in lights.iter_mut() {
            light.set_intensity(2.5);
            assert_eq!(light.intensity(), 2.5);
        }
    }

    #[test]
    fn test_direction_at_origin_falls_back_to_up() {
        let state = DirectionalState {
            position: Vector3::new(0.0, 0.0, 0.0),
            color: Color::WHITE,
            intensity: 1.0,
            cast_shadow: false,
            shadow_map_size: 1024,
        };
        assert_eq!(state.direction_to_light(), Vector3::unit_y());
    }
}

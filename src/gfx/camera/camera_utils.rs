use cgmath::{Matrix4, SquareMatrix};
use winit::event::{DeviceEvent, KeyEvent, WindowEvent};

use super::{camera_controller::CameraController, orbit_camera::OrbitCamera};
use crate::config::CameraSettings;

pub struct CameraManager {
    pub camera: OrbitCamera,
    pub controller: CameraController,
}

impl CameraManager {
    pub fn new(camera: OrbitCamera, controller: CameraController) -> Self {
        Self { camera, controller }
    }

    /// Top-down camera and controls built from the configured settings
    pub fn from_settings(settings: &CameraSettings, aspect: f32) -> Self {
        let camera = OrbitCamera::looking_at(
            cgmath::Vector3::new(0.0, settings.height, 0.0),
            cgmath::Vector3::new(0.0, 0.0, 0.0),
            aspect,
        )
        .with_projection(cgmath::Deg(settings.fov_degrees), settings.near, settings.far);
        let controller = CameraController::new(settings.rotate_speed, settings.zoom_speed);
        Self::new(camera, controller)
    }

    pub fn process_window_event(&mut self, event: &WindowEvent) {
        self.controller.process_window_event(event);
    }

    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        self.controller.process_device_event(event);
    }

    pub fn process_keyboard_event(&mut self, event: &KeyEvent) {
        self.controller.process_keyed_events(event);
    }

    /// Applies accumulated input; runs once per frame before drawing
    pub fn update(&mut self) {
        self.controller.update(&mut self.camera);
        self.camera.update_view_proj();
    }
}

pub trait Camera: Sized {
    fn build_view_projection_matrix(&self) -> Matrix4<f32>;
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct CameraUniform {
    /// The eye position of the camera in homogenous coordinates.
    ///
    /// Homogenous coordinates are used to fulfill the 16 byte alignment requirement.
    pub view_position: [f32; 4],

    /// Contains the view projection matrix.
    pub view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: convert_matrix4_to_array(Matrix4::identity()),
        }
    }
}

pub fn convert_matrix4_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    matrix4.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_from_settings_uses_configured_projection() {
        let settings = CameraSettings::default();
        let mut manager = CameraManager::from_settings(&settings, 1.5);
        assert!((manager.camera.fovy.0 - 20f32.to_radians()).abs() < 1e-6);
        assert_eq!(manager.camera.znear, 1.0);
        assert_eq!(manager.camera.zfar, 10000.0);

        manager.update();
        assert!((manager.camera.uniform.view_position[1] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_matrix_conversion_is_column_major() {
        let m = Matrix4::from_translation(cgmath::Vector3::new(1.0, 2.0, 3.0));
        let array = convert_matrix4_to_array(m);
        assert_eq!(array[3], [1.0, 2.0, 3.0, 1.0]);
    }
}

use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::orbit_camera::OrbitCamera;

/// Orbit controls
///
/// Input events only accumulate; nothing touches the camera until
/// [`CameraController::update`] runs at the start of a frame.
pub struct CameraController {
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    is_shift_held: bool,
    is_mouse_pressed: bool,
    pending_rotate: (f32, f32),
    pending_pan: (f32, f32),
    pending_zoom: f32,
    reset_requested: bool,
}

impl CameraController {
    pub fn new(rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            zoom_speed,
            pan_speed: 0.01,
            is_shift_held: false,
            is_mouse_pressed: false,
            pending_rotate: (0.0, 0.0),
            pending_pan: (0.0, 0.0),
            pending_zoom: 0.0,
            reset_requested: false,
        }
    }

    /// Mouse button and wheel input delivered to the window
    pub fn process_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => self.set_mouse_pressed(*state == ElementState::Pressed),
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, scroll) => *scroll,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 50.0,
                };
                self.scroll(steps);
            }
            _ => (),
        }
    }

    /// Raw pointer motion, which keeps flowing while dragging outside the window
    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.drag(delta.0 as f32, delta.1 as f32);
        }
    }

    pub fn process_keyed_events(&mut self, event: &KeyEvent) {
        match event {
            KeyEvent {
                physical_key: PhysicalKey::Code(KeyCode::ShiftLeft | KeyCode::ShiftRight),
                state,
                ..
            } => self.set_shift_held(*state == ElementState::Pressed),
            KeyEvent {
                physical_key: PhysicalKey::Code(KeyCode::KeyC),
                state: ElementState::Pressed,
                ..
            } if self.is_shift_held => self.request_reset(),
            _ => (),
        }
    }

    pub fn set_mouse_pressed(&mut self, pressed: bool) {
        self.is_mouse_pressed = pressed;
    }

    pub fn set_shift_held(&mut self, held: bool) {
        if held != self.is_shift_held {
            log::debug!("Shift state changed: {}", held);
        }
        self.is_shift_held = held;
    }

    /// Pointer movement in pixels; ignored unless the left button is down
    pub fn drag(&mut self, dx: f32, dy: f32) {
        if !self.is_mouse_pressed {
            return;
        }
        if self.is_shift_held {
            self.pending_pan.0 -= dx * self.pan_speed;
            self.pending_pan.1 += dy * self.pan_speed;
        } else {
            self.pending_rotate.0 -= dx * self.rotate_speed;
            self.pending_rotate.1 += dy * self.rotate_speed;
        }
    }

    /// Wheel steps; positive scrolls zoom in
    pub fn scroll(&mut self, steps: f32) {
        self.pending_zoom += steps * self.zoom_speed;
    }

    pub fn request_reset(&mut self) {
        log::info!("Resetting camera to its initial pose");
        self.reset_requested = true;
    }

    /// True if input is waiting to be applied
    pub fn has_pending_input(&self) -> bool {
        self.reset_requested
            || self.pending_zoom != 0.0
            || self.pending_rotate != (0.0, 0.0)
            || self.pending_pan != (0.0, 0.0)
    }

    /// Applies and clears everything accumulated since the last frame
    pub fn update(&mut self, camera: &mut OrbitCamera) {
        if std::mem::take(&mut self.reset_requested) {
            camera.reset_to_default();
        }

        let (yaw, pitch) = std::mem::take(&mut self.pending_rotate);
        if yaw != 0.0 {
            camera.add_yaw(yaw);
        }
        if pitch != 0.0 {
            camera.add_pitch(pitch);
        }

        let pan = std::mem::take(&mut self.pending_pan);
        if pan != (0.0, 0.0) {
            camera.pan(pan);
        }

        let zoom = std::mem::take(&mut self.pending_zoom);
        if zoom != 0.0 {
            camera.zoom(zoom);
        }
    }

    /// Returns true if currently panning
    pub fn is_panning(&self) -> bool {
        self.is_mouse_pressed && self.is_shift_held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3, Zero};

    fn camera() -> OrbitCamera {
        OrbitCamera::looking_at(Vector3::new(0.0, 10.0, 0.0), Vector3::zero(), 1.0)
    }

    #[test]
    fn test_input_is_deferred_until_update() {
        let mut camera = camera();
        let mut controller = CameraController::new(0.005, 1.0);
        let before = camera.eye;

        controller.set_mouse_pressed(true);
        controller.drag(40.0, 0.0);
        controller.scroll(3.0);
        assert_eq!(camera.eye, before);
        assert!(controller.has_pending_input());

        controller.update(&mut camera);
        assert_ne!(camera.eye, before);
        assert!(camera.distance < 10.0);
        assert!(!controller.has_pending_input());
    }

    #[test]
    fn test_drag_without_button_does_nothing() {
        let mut controller = CameraController::new(0.005, 1.0);
        controller.drag(100.0, 100.0);
        assert!(!controller.has_pending_input());
    }

    #[test]
    fn test_shift_drag_pans_focus() {
        let mut camera = camera();
        let mut controller = CameraController::new(0.005, 1.0);
        controller.set_shift_held(true);
        controller.set_mouse_pressed(true);
        assert!(controller.is_panning());
        controller.drag(10.0, 0.0);
        controller.update(&mut camera);
        assert!(camera.target.magnitude() > 0.0);
        assert!((camera.distance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_reset_request_restores_pose() {
        let mut camera = camera();
        let mut controller = CameraController::new(0.005, 1.0);
        controller.scroll(10.0);
        controller.update(&mut camera);
        controller.request_reset();
        controller.update(&mut camera);
        assert!((camera.distance - 10.0).abs() < 1e-4);
    }
}

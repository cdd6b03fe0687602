use super::camera_utils::{convert_matrix4_to_array, Camera, CameraUniform};
use cgmath::*;
use std::f32::consts::{PI, TAU};

/// Remaps OpenGL clip depth (-1..1) onto the 0..1 range wgpu expects
///
/// cgmath matrices are column-major, so each row below is one column.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Distance lost per scroll step when zooming in
const ZOOM_STEP: f32 = 0.95;

/// Perspective camera orbiting a focus point, Y up
///
/// `pitch` is the elevation above the XZ plane and `yaw` the angle around Y,
/// measured from +Z. The eye position is derived from them on every change.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub distance: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub eye: Vector3<f32>,
    pub target: Vector3<f32>,
    pub up: Vector3<f32>,
    pub bounds: OrbitCameraBounds,
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub uniform: CameraUniform,
    home: OrbitPose,
}

#[derive(Debug, Clone, Copy)]
struct OrbitPose {
    distance: f32,
    pitch: f32,
    yaw: f32,
    target: Vector3<f32>,
}

impl Camera for OrbitCamera {
    fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from_vec(self.eye);
        let target = Point3::from_vec(self.target);
        let view = Matrix4::look_at_rh(eye, target, self.up);
        let proj =
            OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar);
        proj * view
    }
}

impl OrbitCamera {
    pub fn new(distance: f32, pitch: f32, yaw: f32, target: Vector3<f32>, aspect: f32) -> Self {
        let bounds = OrbitCameraBounds::default();
        let mut camera = Self {
            distance,
            pitch: pitch.clamp(bounds.min_pitch, bounds.max_pitch),
            yaw,
            eye: target,
            target,
            up: Vector3::unit_y(),
            bounds,
            aspect,
            fovy: Rad(std::f32::consts::FRAC_PI_4),
            znear: 0.1,
            zfar: 1000.0,
            uniform: CameraUniform::default(),
            home: OrbitPose {
                distance,
                pitch,
                yaw,
                target,
            },
        };
        camera.update();
        camera.home.pitch = camera.pitch;
        camera
    }

    /// Camera placed at `eye`, looking at `target`
    ///
    /// Looking straight down is clamped to just short of vertical so the view
    /// basis stays well defined.
    pub fn looking_at(eye: Vector3<f32>, target: Vector3<f32>, aspect: f32) -> Self {
        let offset = eye - target;
        let distance = offset.magnitude().max(f32::EPSILON);
        let pitch = (offset.y / distance).clamp(-1.0, 1.0).asin();
        let yaw = offset.x.atan2(offset.z);
        Self::new(distance, pitch, yaw, target, aspect)
    }

    /// Builder pattern: Set projection parameters
    ///
    /// Zooming out is bounded by half the far plane so the focus point is
    /// never clipped.
    pub fn with_projection(mut self, fovy: impl Into<Rad<f32>>, znear: f32, zfar: f32) -> Self {
        self.fovy = fovy.into();
        self.znear = znear;
        self.zfar = zfar;
        self.bounds.max_distance = Some(zfar * 0.5);
        self.set_distance(self.distance);
        self.home.distance = self.distance;
        self
    }

    /// Returns to the pose the camera was created with
    pub fn reset_to_default(&mut self) {
        self.distance = self.home.distance;
        self.pitch = self.home.pitch;
        self.yaw = self.home.yaw;
        self.target = self.home.target;
        self.update();
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.clamp(
            self.bounds.min_distance.unwrap_or(f32::EPSILON),
            self.bounds.max_distance.unwrap_or(f32::MAX),
        );
        self.update();
    }

    /// Moves along the view vector; positive steps zoom in
    pub fn zoom(&mut self, steps: f32) {
        self.set_distance(self.distance * ZOOM_STEP.powf(steps));
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(self.bounds.min_pitch, self.bounds.max_pitch);
        self.update();
    }

    pub fn add_pitch(&mut self, delta: f32) {
        self.set_pitch(self.pitch + delta);
    }

    /// Yaw is unbounded; it is kept in (-pi, pi] so it never loses precision
    pub fn set_yaw(&mut self, yaw: f32) {
        let wrapped = yaw.rem_euclid(TAU);
        self.yaw = if wrapped > PI { wrapped - TAU } else { wrapped };
        self.update();
    }

    pub fn add_yaw(&mut self, delta: f32) {
        self.set_yaw(self.yaw + delta);
    }

    /// Pans the focus point relative to the current view direction
    ///
    /// `delta.0` moves right, `delta.1` moves up, both in view space and
    /// scaled by the orbit distance.
    pub fn pan(&mut self, delta: (f32, f32)) {
        let forward = (self.target - self.eye).normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward).normalize();

        let pan_scale = self.distance * 0.1;
        let movement = right * delta.0 * pan_scale + up * delta.1 * pan_scale;

        self.target += movement;
        self.update();
    }

    /// Updates the camera after changing `distance`, `pitch`, `yaw` or `target`.
    fn update(&mut self) {
        self.eye =
            calculate_cartesian_eye_position(self.pitch, self.yaw, self.distance, self.target);
    }

    pub fn resize_projection(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn update_view_proj(&mut self) {
        self.uniform.view_position = [self.eye.x, self.eye.y, self.eye.z, 1.0];
        self.uniform.view_proj = convert_matrix4_to_array(self.build_view_projection_matrix());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrbitCameraBounds {
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub min_pitch: f32,
    pub max_pitch: f32,
}

impl Default for OrbitCameraBounds {
    fn default() -> Self {
        Self {
            min_distance: Some(1.5),
            max_distance: Some(200.0),
            min_pitch: -std::f32::consts::FRAC_PI_2 + 1e-4,
            max_pitch: std::f32::consts::FRAC_PI_2 - 1e-4,
        }
    }
}

fn calculate_cartesian_eye_position(
    pitch: f32,
    yaw: f32,
    distance: f32,
    target: Vector3<f32>,
) -> Vector3<f32> {
    Vector3::new(
        distance * yaw.sin() * pitch.cos(),
        distance * pitch.sin(),
        distance * yaw.cos() * pitch.cos(),
    ) + target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_down() -> OrbitCamera {
        OrbitCamera::looking_at(Vector3::new(0.0, 10.0, 0.0), Vector3::zero(), 1.5)
            .with_projection(Deg(20.0), 1.0, 10000.0)
    }

    #[test]
    fn test_top_down_pose_sits_above_origin() {
        let camera = top_down();
        assert!((camera.distance - 10.0).abs() < 1e-5);
        assert!((camera.eye - Vector3::new(0.0, 10.0, 0.0)).magnitude() < 1e-2);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_origin_projects_to_screen_center() {
        let camera = top_down();
        let clip = camera.build_view_projection_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((clip.x / clip.w).abs() < 1e-3);
        assert!((clip.y / clip.w).abs() < 1e-3);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_zoom_moves_along_view_vector() {
        let mut camera = top_down();
        let direction = (camera.eye - camera.target).normalize();
        camera.zoom(2.0);
        assert!(camera.distance < 10.0);
        let new_direction = (camera.eye - camera.target).normalize();
        assert!((direction - new_direction).magnitude() < 1e-5);

        camera.zoom(-1000.0);
        assert_eq!(camera.distance, 5000.0);
    }

    #[test]
    fn test_zoom_out_reaches_past_the_fog() {
        let mut camera = top_down();
        camera.zoom(-100.0);
        assert!(camera.distance > 100.0);
        let clip = camera.build_view_projection_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((0.0..=1.0).contains(&(clip.z / clip.w)));
    }

    #[test]
    fn test_half_fov_edge_lands_on_screen_edge() {
        let camera = top_down();
        let forward = (camera.target - camera.eye).normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward).normalize();
        let half_fov = Deg(10.0f32).tan();
        let view_proj = camera.build_view_projection_matrix();

        for depth in [5.0f32, 10.0] {
            let edge = camera.eye + forward * depth + up * depth * half_fov;
            let clip = view_proj * edge.extend(1.0);
            assert!((clip.y / clip.w - 1.0).abs() < 1e-3, "depth {depth}: {}", clip.y / clip.w);
            let ndc_z = clip.z / clip.w;
            assert!((0.0..=1.0).contains(&ndc_z));

            let low = camera.eye + forward * depth - up * depth * half_fov;
            let clip = view_proj * low.extend(1.0);
            assert!((clip.y / clip.w + 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_depth_spans_near_to_far() {
        let camera = top_down();
        let forward = (camera.target - camera.eye).normalize();
        let view_proj = camera.build_view_projection_matrix();
        let near = view_proj * (camera.eye + forward * camera.znear).extend(1.0);
        let far = view_proj * (camera.eye + forward * camera.zfar).extend(1.0);
        assert!((near.z / near.w).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_pitch_is_clamped_and_reset_restores_pose() {
        let mut camera = top_down();
        camera.add_pitch(5.0);
        assert!(camera.pitch <= camera.bounds.max_pitch);
        camera.add_yaw(1.0);
        camera.pan((1.0, 0.0));
        camera.reset_to_default();
        assert!((camera.eye - Vector3::new(0.0, 10.0, 0.0)).magnitude() < 1e-2);
        assert_eq!(camera.target, Vector3::zero());
    }

    #[test]
    fn test_yaw_wraps_without_moving_the_eye() {
        let mut camera = top_down();
        camera.set_pitch(0.3);
        let eye = camera.eye;
        camera.add_yaw(2.0 * PI);
        assert!(camera.yaw.abs() <= PI);
        assert!((camera.eye - eye).magnitude() < 1e-3);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut camera = top_down();
        camera.resize_projection(1920, 1080);
        assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
        camera.resize_projection(800, 0);
        assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
    }
}

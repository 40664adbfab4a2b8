use crate::{Mat4, Vec3};

const DEFAULT_YAW_DEG: f32 = -90.0;
const DEFAULT_PITCH_DEG: f32 = 0.0;
const DEFAULT_SPEED: f32 = 2.5;
const DEFAULT_SENSITIVITY: f32 = 0.1;
const PITCH_LIMIT_DEG: f32 = 89.0;

/// Direction of a keyboard-driven camera move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// First-person fly camera driven by raw keyboard and cursor input.
///
/// Orientation is stored as yaw/pitch in degrees; the front/right/up basis is
/// derived from them whenever they change. The view matrix is only rebuilt by
/// [`Camera::update`], once per frame.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub speed: f32,
    pub sensitivity: f32,

    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,

    yaw: f32,
    pitch: f32,

    last_cursor: Option<(f32, f32)>,
    view: Mat4,
}

impl Camera {
    pub fn new(position: Vec3, world_up: Vec3) -> Self {
        let mut camera = Self {
            position,
            speed: DEFAULT_SPEED,
            sensitivity: DEFAULT_SENSITIVITY,
            front: Vec3::NEG_Z,
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw: DEFAULT_YAW_DEG,
            pitch: DEFAULT_PITCH_DEG,
            last_cursor: None,
            view: Mat4::IDENTITY,
        };
        camera.update_basis();
        camera.update();
        camera
    }

    /// Moves along the front/right vectors, `speed * dt` world units.
    pub fn handle_keyboard_input(&mut self, direction: CameraMovement, dt: f32) {
        let distance = self.speed * dt;
        match direction {
            CameraMovement::Forward => self.position += self.front * distance,
            CameraMovement::Backward => self.position -= self.front * distance,
            CameraMovement::Left => self.position -= self.right * distance,
            CameraMovement::Right => self.position += self.right * distance,
        }
    }

    /// Feeds an absolute cursor position. The first call only records the
    /// baseline; later calls turn the delta into yaw/pitch.
    ///
    /// Screen y grows downward, so moving the cursor up pitches the camera up.
    pub fn handle_mouse_input(&mut self, x: f32, y: f32) {
        let Some((last_x, last_y)) = self.last_cursor.replace((x, y)) else {
            return;
        };

        let dx = x - last_x;
        let dy = last_y - y;
        if dx == 0.0 && dy == 0.0 {
            return;
        }

        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch + dy * self.sensitivity).clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
        self.update_basis();
    }

    /// Rebuilds the view matrix from the current position and basis.
    pub fn update(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.position + self.front, self.up);
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    #[inline]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Yaw in degrees.
    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees, always within ±89°.
    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    fn update_basis(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

/// Perspective projection parameters (right-handed, depth in [0, 1]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub fov_y_rad: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Projection {
    pub fn new(fov_y_rad: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            fov_y_rad,
            aspect,
            z_near,
            z_far,
        }
    }

    /// Updates the aspect ratio from a new viewport size. Zero-sized
    /// viewports (minimised windows) keep the previous ratio.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 7.0), Vec3::Y)
    }

    #[test]
    fn default_orientation_looks_down_negative_z() {
        let cam = camera();
        assert!((cam.front() - Vec3::NEG_Z).length() < 1e-5);
        assert!((cam.right() - Vec3::X).length() < 1e-5);
        assert!((cam.up() - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn first_mouse_input_only_sets_baseline() {
        let mut cam = camera();
        let (yaw, pitch, front) = (cam.yaw(), cam.pitch(), cam.front());
        cam.handle_mouse_input(400.0, 300.0);
        assert_eq!(cam.yaw(), yaw);
        assert_eq!(cam.pitch(), pitch);
        assert_eq!(cam.front(), front);
    }

    #[test]
    fn second_mouse_input_applies_scaled_delta() {
        let mut cam = camera();
        cam.handle_mouse_input(100.0, 100.0);
        cam.handle_mouse_input(110.0, 90.0);
        assert!((cam.yaw() - (DEFAULT_YAW_DEG + 10.0 * cam.sensitivity)).abs() < 1e-5);
        assert!((cam.pitch() - 10.0 * cam.sensitivity).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = camera();
        cam.handle_mouse_input(0.0, 0.0);
        cam.handle_mouse_input(0.0, -10_000.0);
        assert_eq!(cam.pitch(), PITCH_LIMIT_DEG);
        cam.handle_mouse_input(0.0, 10_000.0);
        assert_eq!(cam.pitch(), -PITCH_LIMIT_DEG);
        assert!(cam.front().is_finite());
    }

    #[test]
    fn forward_moves_along_front_scaled_by_speed_and_dt() {
        let mut cam = camera();
        let start = cam.position;
        let expected = start + cam.front() * cam.speed * 0.5;
        cam.handle_keyboard_input(CameraMovement::Forward, 0.5);
        assert!((cam.position - expected).length() < 1e-5);
    }

    #[test]
    fn zero_dt_leaves_position_unchanged() {
        let mut cam = camera();
        let start = cam.position;
        for dir in [
            CameraMovement::Forward,
            CameraMovement::Backward,
            CameraMovement::Left,
            CameraMovement::Right,
        ] {
            cam.handle_keyboard_input(dir, 0.0);
        }
        assert_eq!(cam.position, start);
    }

    #[test]
    fn strafing_uses_right_vector() {
        let mut cam = camera();
        cam.handle_keyboard_input(CameraMovement::Right, 1.0);
        assert!((cam.position - Vec3::new(cam.speed, 0.0, 7.0)).length() < 1e-5);
    }

    #[test]
    fn view_only_changes_on_update() {
        let mut cam = camera();
        let before = cam.view();
        cam.handle_keyboard_input(CameraMovement::Forward, 1.0);
        assert_eq!(cam.view(), before);
        cam.update();
        let expected = Mat4::look_at_rh(cam.position, cam.position + cam.front(), cam.up());
        assert_eq!(cam.view(), expected);
    }

    #[test]
    fn projection_tracks_viewport() {
        let mut proj = Projection::new(45f32.to_radians(), 800.0 / 600.0, 0.1, 100.0);
        proj.set_viewport(1920, 1080);
        assert!((proj.aspect - 1920.0 / 1080.0).abs() < 1e-6);
        proj.set_viewport(0, 1080);
        assert!((proj.aspect - 1920.0 / 1080.0).abs() < 1e-6);
    }
}

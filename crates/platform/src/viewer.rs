//! Application context: everything one frame needs, owned in one place.

use corelib::{
    Vec3,
    camera::{Camera, CameraMovement, Projection},
    light::Light,
    transform::Transform,
};
use renderer::{GpuDevice, Model, ShaderContext};
use winit::keyboard::KeyCode;

use crate::input::InputState;

const CAMERA_START: Vec3 = Vec3::new(0.0, 0.0, 7.0);
const FOV_Y_DEG: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

const MOVEMENT_KEYS: [(KeyCode, CameraMovement); 4] = [
    (KeyCode::KeyW, CameraMovement::Forward),
    (KeyCode::KeyS, CameraMovement::Backward),
    (KeyCode::KeyA, CameraMovement::Left),
    (KeyCode::KeyD, CameraMovement::Right),
];

pub struct Viewer {
    camera: Camera,
    projection: Projection,
    light: Light,
    transform: Transform,
    model: Model,
    input: InputState,
    close_requested: bool,
}

impl Viewer {
    pub fn new(model: Model, width: u32, height: u32) -> Self {
        let mut projection = Projection::new(FOV_Y_DEG.to_radians(), 1.0, Z_NEAR, Z_FAR);
        projection.set_viewport(width, height);
        Self {
            camera: Camera::new(CAMERA_START, Vec3::Y),
            projection,
            light: Light::default(),
            transform: Transform::identity(),
            model,
            input: InputState::default(),
            close_requested: false,
        }
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.set_viewport(width, height);
    }

    /// Applies the current input to the camera, then rebuilds its view.
    pub fn step(&mut self, dt: f32) {
        if self.input.is_pressed(KeyCode::Escape) {
            self.request_close();
        }
        for (key, movement) in MOVEMENT_KEYS {
            if self.input.is_pressed(key) {
                self.camera.handle_keyboard_input(movement, dt);
            }
        }
        if let Some(cursor) = self.input.cursor() {
            self.camera.handle_mouse_input(cursor.x, cursor.y);
        }
        self.camera.update();
    }

    /// Binds the model program, uploads the frame uniforms and draws the model.
    pub fn record_frame(&self, shader: &mut dyn ShaderContext) {
        shader.use_program();
        shader.set_mat4("projection", self.projection.matrix());
        shader.set_mat4("view", self.camera.view());
        shader.set_mat4("model", self.transform.matrix());
        shader.set_vec3("viewPos", self.camera.position);
        shader.set_vec3("lightPos", self.light.position);
        shader.set_vec3("lightColor", self.light.color);
        self.model.draw(shader);
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn release(self, device: &mut dyn GpuDevice) {
        self.model.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::Mat4;
    use renderer::headless::{Command, RecordingDevice, RecordingShader, UniformValue};

    fn viewer() -> Viewer {
        Viewer::new(Model::empty(), 800, 600)
    }

    #[test]
    fn frame_uploads_uniforms_before_drawing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mut device = RecordingDevice::new();
        let viewer = Viewer::new(Model::from_path(&mut device, &path), 800, 600);

        let mut shader = RecordingShader::new();
        viewer.record_frame(&mut shader);

        assert_eq!(shader.commands.first(), Some(&Command::UseProgram));
        assert_eq!(shader.uniform("model"), Some(UniformValue::Mat4(Mat4::IDENTITY)));
        assert_eq!(
            shader.uniform("viewPos"),
            Some(UniformValue::Vec3(Vec3::new(0.0, 0.0, 7.0)))
        );
        assert_eq!(
            shader.uniform("projection"),
            Some(UniformValue::Mat4(Mat4::perspective_rh(
                45f32.to_radians(),
                800.0 / 600.0,
                0.1,
                100.0
            )))
        );
        assert_eq!(shader.draw_calls().map(|(_, n)| n).collect::<Vec<_>>(), [3]);
        assert_eq!(shader.texture_bindings().count(), 0);

        viewer.release(&mut device);
        assert_eq!(device.live_meshes(), 0);
    }

    #[test]
    fn escape_requests_close() {
        let mut viewer = viewer();
        viewer.step(0.016);
        assert!(!viewer.close_requested());
        viewer.input_mut().set_pressed(KeyCode::Escape, true);
        viewer.step(0.016);
        assert!(viewer.close_requested());
    }

    #[test]
    fn w_moves_forward() {
        let mut viewer = viewer();
        viewer.input_mut().set_pressed(KeyCode::KeyW, true);
        viewer.step(1.0);
        assert!((viewer.camera().position - Vec3::new(0.0, 0.0, 4.5)).length() < 1e-5);
    }

    #[test]
    fn first_mouse_motion_is_only_a_baseline() {
        let mut viewer = viewer();
        viewer.input_mut().on_mouse_motion(100.0, 100.0);
        viewer.step(0.0);
        assert_eq!(viewer.camera().yaw(), -90.0);

        viewer.input_mut().on_mouse_motion(10.0, 0.0);
        viewer.step(0.0);
        assert!((viewer.camera().yaw() - -89.0).abs() < 1e-4);
    }

    #[test]
    fn resize_updates_aspect() {
        let mut viewer = viewer();
        viewer.resize(1000, 500);
        assert_eq!(viewer.projection().aspect, 2.0);
        viewer.resize(0, 0);
        assert_eq!(viewer.projection().aspect, 2.0);
    }
}

//! Platform layer: window, event loop and the per-frame driver.
//! winit = 0.30.x (ApplicationHandler)

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use renderer::{
    GpuState, Model,
    headless::{RecordingDevice, RecordingShader},
};
use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window, WindowId},
};

pub mod input;
pub mod time;
pub mod viewer;

pub use viewer::Viewer;

use time::{FpsCounter, FrameClock};

pub const DEFAULT_MODEL: &str = "resources/models/wood_cylinder/wood_cylinder.obj";

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub model_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub backends: wgpu::Backends,
    pub show_fps: bool,
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL),
            width: 800,
            height: 600,
            backends: wgpu::Backends::all(),
            show_fps: false,
            title: "Svarog Viewer".to_owned(),
        }
    }
}

/// Opens the window and runs the viewer until it is closed.
/// Window or GPU initialisation failures are returned as errors.
pub fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Loads the model on the headless backend, records a single frame and logs
/// what would be drawn. No window or GPU is created.
pub fn inspect(config: ViewerConfig) -> Result<()> {
    let mut device = RecordingDevice::new();
    let model = Model::from_path(&mut device, &config.model_path);
    if model.is_empty() {
        bail!("No meshes loaded from {}", config.model_path.display());
    }

    for (i, mesh) in model.meshes().iter().enumerate() {
        let textures: Vec<_> = mesh
            .textures()
            .iter()
            .map(|t| format!("{}:{}", t.kind, t.path))
            .collect();
        log::info!(
            "Mesh {}: {} vertices, {} indices, textures [{}]",
            i,
            mesh.vertices().len(),
            mesh.indices().len(),
            textures.join(", ")
        );
    }

    let mut viewer = Viewer::new(model, config.width, config.height);
    viewer.step(0.0);
    let mut shader = RecordingShader::new();
    viewer.record_frame(&mut shader);

    log::info!(
        "Model {}: {} meshes, {} textures ({} uploads), {} draw calls, {} texture bindings, {} indices",
        config.model_path.display(),
        viewer.model().meshes().len(),
        viewer.model().textures().len(),
        device.texture_uploads(),
        shader.draw_calls().count(),
        shader.texture_bindings().count(),
        viewer.model().index_count()
    );

    viewer.release(&mut device);
    log::debug!(
        "After release: {} textures, {} meshes live",
        device.live_textures(),
        device.live_meshes()
    );
    Ok(())
}

struct RunningState {
    window: Arc<Window>,
    gpu: GpuState,
    viewer: Viewer,
}

impl RunningState {
    fn shutdown(self) {
        let RunningState {
            window,
            mut gpu,
            viewer,
        } = self;
        viewer.release(&mut gpu);
        drop(gpu);
        drop(window);
        log::info!("GPU resources released.");
    }
}

struct App {
    config: ViewerConfig,
    state: Option<RunningState>,
    fatal: Option<anyhow::Error>,
    clock: FrameClock,
    fps: FpsCounter,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            state: None,
            fatal: None,
            clock: FrameClock::default(),
            fps: FpsCounter::default(),
        }
    }

    fn init(&self, event_loop: &ActiveEventLoop) -> Result<RunningState> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        if let Err(e) = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
        {
            log::warn!("Cursor grab unavailable: {e}");
        }
        window.set_cursor_visible(false);

        let mut gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends))
            .context("Failed to initialise GPU")?;

        let model = Model::from_path(&mut gpu, &self.config.model_path);
        let (width, height) = gpu.size();
        let viewer = Viewer::new(model, width, height);

        window.request_redraw();
        Ok(RunningState {
            window,
            gpu,
            viewer,
        })
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.viewer.close_requested() {
            event_loop.exit();
            return;
        }

        let dt = self.clock.tick();
        state.viewer.step(dt);

        let mut frame = match state.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface {e:?}; reconfiguring");
                state.gpu.recreate_surface();
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory; exiting");
                event_loop.exit();
                return;
            }
            Err(e) => {
                log::warn!("Surface error: {e:?}; skipping frame");
                return;
            }
        };

        state.viewer.record_frame(&mut frame);
        log::trace!("Recorded {} draws", frame.draw_count());
        state.gpu.end_frame(frame);

        if self.config.show_fps {
            if let Some(stats) = self.fps.on_frame() {
                log::info!("FPS: {} ({:.2?} per frame)", stats.fps, stats.frame_time);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                log::error!("{e:#}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(state) = self.state.as_mut() {
                    if new_size.width > 0 && new_size.height > 0 {
                        state.gpu.resize(new_size.width, new_size.height);
                    }
                    state.viewer.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                if let Some(state) = self.state.as_mut() {
                    state.viewer.input_mut().set_pressed(code, key_state.is_pressed());
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if let Some(state) = self.state.as_mut() {
                state.viewer.input_mut().on_mouse_motion(dx as f32, dy as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_ref() {
            state.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.shutdown();
        }
    }
}

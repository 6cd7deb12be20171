//! The winit host: one window, one [`Viewer`], driven by redraw requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowId};

use crate::assets::{AssetLoader, LoaderConfig};
use crate::driver::FrameDriver;
use crate::gpu::GpuContext;
use crate::input::{Input, InputFrame};
use crate::pipeline::{EffectChain, PipelineConfig, RenderError};
use crate::stages::GpuStageFactory;
use crate::surface::{RenderSurface, SurfaceOptions, ViewportSize};
use crate::viewer::{Viewer, ViewerError};

/// Step applied by the tuning keys.
const TUNING_STEP: f32 = 0.1;

/// Keys that nudge a tunable, with the direction of the nudge.
const TUNING_KEYS: [(KeyCode, &str, f32); 4] = [
    (KeyCode::BracketLeft, "ssr.intensity", -TUNING_STEP),
    (KeyCode::BracketRight, "ssr.intensity", TUNING_STEP),
    (KeyCode::Minus, "bloom.intensity", -TUNING_STEP),
    (KeyCode::Equal, "bloom.intensity", TUNING_STEP),
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub model_path: PathBuf,
    pub surface: SurfaceOptions,
    pub effects: EffectChain,
    pub loader: LoaderConfig,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "loftview".to_string(),
            width: 1280,
            height: 720,
            model_path: PathBuf::from("assets/loft-v1.glb"),
            surface: SurfaceOptions::default(),
            effects: EffectChain::default(),
            loader: LoaderConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn surface(mut self, options: SurfaceOptions) -> Self {
        self.surface = options;
        self
    }

    pub fn effects(mut self, chain: EffectChain) -> Self {
        self.effects = chain;
        self
    }

    pub fn loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn pipeline(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

/// Everything that exists once the window does.
struct Running {
    window: Arc<Window>,
    viewer: Viewer<GpuContext, GpuStageFactory>,
    driver: FrameDriver<Arc<Window>>,
    input: Input,
    last_frame: Instant,
}

impl Running {
    fn start(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self, AppError> {
        let attributes = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let size = window.inner_size();
        let viewport = ViewportSize::from_physical(size.width, size.height, window.scale_factor());

        let gpu = GpuContext::new(window.clone(), config.surface.power_preference)?;
        let surface = RenderSurface::configure(gpu, config.surface.clone(), viewport);

        let pending = AssetLoader::new(config.loader.clone()).load(&config.model_path);
        let viewer = Viewer::new(
            surface,
            GpuStageFactory::new(config.surface.clear_color),
            config.effects,
            config.pipeline.clone(),
            pending,
        )?;

        let mut driver = FrameDriver::new(window.clone());
        driver.start();

        Ok(Self {
            window,
            viewer,
            driver,
            input: Input::new(),
            last_frame: Instant::now(),
        })
    }

    fn viewport(&self, scale_factor: f64) -> ViewportSize {
        let size = self.window.inner_size();
        ViewportSize::from_physical(size.width, size.height, scale_factor)
    }

    fn frame(&mut self) -> Result<(), ViewerError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let input = self.input.take_frame();
        self.handle_tuning_keys(&input);

        let viewer = &mut self.viewer;
        self.driver.tick(|| viewer.tick(&input, dt))?;
        Ok(())
    }

    fn handle_tuning_keys(&self, input: &InputFrame) {
        let config = self.viewer.config();

        for (key, name, delta) in TUNING_KEYS {
            if !input.key_pressed(key) {
                continue;
            }
            match config.borrow_mut().nudge(name, delta) {
                Ok(value) => log::info!("{name} = {value:.2}"),
                Err(err) => log::warn!("cannot adjust {name}: {err}"),
            }
        }

        if input.key_pressed(KeyCode::F1) {
            for (name, value) in config.borrow().entries() {
                log::info!("{name} = {value}");
            }
        }
    }
}

enum AppState {
    Pending(AppConfig),
    Running(Box<Running>),
    /// Startup or a frame failed; the loop is exiting.
    Failed,
}

struct LoftApp {
    state: AppState,
    error: Option<AppError>,
}

impl LoftApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{err}");
        self.state = AppState::Failed;
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for LoftApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending(config) = &self.state else {
            return;
        };

        match Running::start(event_loop, config) {
            Ok(running) => self.state = AppState::Running(Box::new(running)),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(running) = &mut self.state else {
            return;
        };

        running.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                running.driver.halt();
                event_loop.exit();
            }
            WindowEvent::Resized(_) => {
                let viewport = running.viewport(running.window.scale_factor());
                running.viewer.on_resize(viewport);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let viewport = running.viewport(scale_factor);
                running.viewer.on_resize(viewport);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = running.frame() {
                    self.fail(event_loop, err.into());
                }
            }
            _ => (),
        }
    }
}

/// Opens the window and runs the viewer until it is closed or a frame fails.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = LoftApp {
        state: AppState::Pending(config),
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

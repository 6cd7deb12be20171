//! # loftview
//!
//! A real-time viewer for a single glTF (or STL) model, lit as a loft interior
//! and composited through screen-space reflections, bloom, vignette and FXAA.
//!
//! ```no_run
//! use loftview::{AppConfig, EffectChain, run};
//!
//! fn main() -> Result<(), loftview::AppError> {
//!     run(AppConfig::new()
//!         .model("assets/loft-v1.glb")
//!         .effects(EffectChain::default()))
//! }
//! ```
//!
//! The frame loop is split so everything above the GPU can run headless:
//!
//! - [`RenderSurface`] owns the output options and viewport size on top of a
//!   [`Backend`],
//! - [`EffectPipeline`] runs its [`Stage`]s in order every frame against a
//!   per-frame snapshot of the shared [`PipelineConfig`],
//! - [`Viewer`] ties scene, loader, controls and pipeline together and applies
//!   resizes at tick boundaries,
//! - [`FrameDriver`] decides when a tick runs.

mod app;
pub mod assets;
mod backend;
mod camera;
mod controls;
mod driver;
mod gpu;
mod input;
mod logging;
mod materials;
pub mod pipeline;
mod present_pass;
mod resize;
pub mod scene;
pub mod stages;
mod surface;
mod viewer;

#[cfg(test)]
mod test_support;

pub use app::{AppConfig, AppError, run};
pub use assets::{AssetLoader, LoadError, LoadStatus, LoaderConfig, MeshDecoder, PendingLoad};
pub use backend::{Backend, TargetDesc, TargetFormat};
pub use camera::{CameraMatrices, PerspectiveCamera};
pub use controls::OrbitControls;
pub use driver::{DriverState, FrameDriver, FrameScheduler, TickOutcome};
pub use gpu::{GpuContext, GpuFrame, RenderTarget};
pub use input::{Input, InputFrame};
pub use logging::{LoggingConfig, init_logging};
pub use materials::{MaterialMatch, MaterialPatcher, MaterialRule, MaterialWrite, PatchReport};
pub use pipeline::{
    BufferSet, ConfigError, Diagnostics, EffectChain, EffectPipeline, KernelSize, PipelineConfig,
    PipelineError, RenderError, SharedConfig, Stage, StageDescriptor, Tunable,
};
pub use resize::{ResizeError, ViewportResizeHandler};
pub use scene::SceneGraph;
pub use surface::{
    OutputEncoding, PhysicalSize, RenderSurface, SurfaceOptions, ToneMapping, ViewportSize,
};
pub use viewer::{StageFactory, Viewer, ViewerError};

pub use glam::{Mat4, Quat, Vec2, Vec3};

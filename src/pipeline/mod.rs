//! Ordered composition of the scene pass and its post-processing effects.

mod config;
mod diagnostics;
mod effect_pipeline;
mod error;
mod stage;
mod targets;

pub use config::{
    BloomSettings, ConfigError, EffectChain, FxaaSettings, KernelSize, PipelineConfig,
    SharedConfig, SsrSettings, Tunable, VignetteSettings,
};
pub use diagnostics::{Diagnostics, DiagnosticsState};
pub use effect_pipeline::EffectPipeline;
pub use error::{PipelineError, RenderError};
pub use stage::{
    BufferSet, FrameView, Stage, StageContext, StageDescriptor, StageIo, StageKind,
    validate_chain,
};
pub use targets::FrameTargets;

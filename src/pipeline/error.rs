use thiserror::Error;

use super::stage::BufferSet;

/// Why an effect pipeline could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,
    #[error("first stage `{first}` is not a scene stage")]
    MissingSceneStage { first: &'static str },
    #[error("scene stage `{stage}` appears after the first position")]
    DuplicateSceneStage { stage: &'static str },
    #[error("stage `{stage}` reads {buffer:?} before any earlier stage writes it")]
    MissingInput {
        stage: &'static str,
        buffer: BufferSet,
    },
}

/// A failure while rendering or presenting a frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("gpu initialization failed: {0}")]
    Init(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error("out of gpu memory")]
    OutOfMemory,
    #[error("stage `{stage}` failed: {reason}")]
    Stage { stage: &'static str, reason: String },
}

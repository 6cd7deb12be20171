use std::path::PathBuf;

use thiserror::Error;

/// Why a model could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to read `{}`: {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("unknown model format `{0}`")]
    UnknownFormat(String),
    #[error("failed to decode model: {0}")]
    Decode(String),
    #[error("model requires `{0}`, which is not supported")]
    UnsupportedCompression(String),
    #[error("unsupported url scheme in `{0}`")]
    UnsupportedScheme(String),
    #[error("asset loader thread exited without a result")]
    LoaderGone,
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop a scan before a result can be emitted.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0}")]
    Usage(String),

    #[error("cannot read image: {}: {message}", path.display())]
    ImageDecode { path: PathBuf, message: String },

    #[error("cannot load model {}: {message}", path.display())]
    ModelLoad { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid class catalog {}: {message}", path.display())]
    Catalog { path: PathBuf, message: String },

    #[error("debug output failed: {0}")]
    Debug(String),
}

impl ScanError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScanError::Usage(_) | ScanError::ImageDecode { .. } | ScanError::Catalog { .. } => 2,
            ScanError::ModelLoad { .. } | ScanError::Inference(_) | ScanError::Debug(_) => 1,
        }
    }
}

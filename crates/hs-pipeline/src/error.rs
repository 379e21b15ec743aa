use hs_format::{Format, FormatError};
use hs_index::IndexError;
use hs_pack::PackError;

/// Errors from scheduling and processing files.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The scheduled file is not in the file store.
    #[error("file not found: {0}")]
    NotFound(String),

    /// A task names a format other than the one the pipeline encodes.
    #[error("task format {task} does not match pipeline format {pipeline}")]
    FormatMismatch { task: Format, pipeline: Format },

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("pack error: {0}")]
    Pack(#[from] PackError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// The scheduler's backing log could not be read or written.
    #[error("scheduler unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A background encoding task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_integrity(&self) -> bool {
        match self {
            Self::Pack(e) => e.is_integrity(),
            Self::Index(e) => e.is_integrity(),
            Self::Format(FormatError::Integrity { .. }) => true,
            _ => false,
        }
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

use hs_types::{ContentId, TypeError};

/// Errors from encoding or decoding block DAGs.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The format name is not one of the supported formats.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// Encoder options are out of range.
    #[error("invalid format options: {0}")]
    InvalidOptions(String),

    /// A block could not be decoded as the format expects.
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    /// A block's bytes do not hash to its identifier, or the DAG is inconsistent.
    #[error("integrity violation at {cid}: {reason}")]
    Integrity { cid: ContentId, reason: String },

    /// A block referenced by the DAG was not available.
    #[error("block not available: {0}")]
    MissingBlock(ContentId),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl FormatError {
    pub(crate) fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            reason: reason.into(),
        }
    }
}

/// Result alias for format operations.
pub type FormatResult<T> = Result<T, FormatError>;

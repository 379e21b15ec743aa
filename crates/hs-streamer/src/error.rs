use hs_index::IndexError;
use hs_pack::PackError;
use hs_types::{Codec, ContentId};

/// Errors from retrieval.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The requested identifier was never indexed.
    #[error("content not found: {0}")]
    NotFound(ContentId),

    /// The identifier was found but part of its content is missing or corrupt.
    #[error("integrity violation at {cid}: {reason}")]
    Integrity { cid: ContentId, reason: String },

    /// A backing store could not be read.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    /// Classify an index error raised while resolving `at`.
    pub(crate) fn from_index(err: IndexError, at: &ContentId) -> Self {
        match err {
            IndexError::NotFound(_) => Self::NotFound(at.clone()),
            IndexError::Integrity { cid, reason } => Self::Integrity { cid, reason },
            IndexError::CorruptRecord { name, reason } => Self::Integrity {
                cid: at.clone(),
                reason: format!("index record {name}: {reason}"),
            },
            IndexError::Serialization(reason) => Self::Integrity {
                cid: at.clone(),
                reason,
            },
            IndexError::Unavailable(io) => Self::Unavailable(io.to_string()),
        }
    }

    /// Classify a pack error raised while reading the block `at`.
    pub(crate) fn from_pack(err: PackError, at: &ContentId) -> Self {
        match err {
            PackError::Integrity { key, reason } => Self::Integrity {
                cid: if at.multihash() == &key {
                    at.clone()
                } else {
                    ContentId::new(Codec::Raw, key)
                },
                reason,
            },
            PackError::OutOfRange { .. } | PackError::InvalidPath(_) => Self::Integrity {
                cid: at.clone(),
                reason: err.to_string(),
            },
            PackError::Unavailable(io) => Self::Unavailable(io.to_string()),
        }
    }
}

/// Result alias for retrieval operations.
pub type StreamResult<T> = Result<T, StreamError>;

//! Error types for the index crate.

use hs_types::{ContentId, Multihash};

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// No index record exists for the identifier.
    #[error("no index record for {0}")]
    NotFound(Multihash),

    /// A record exists but references something that does not resolve.
    #[error("integrity violation at {cid}: {reason}")]
    Integrity { cid: ContentId, reason: String },

    /// A stored record could not be decoded or does not match its name.
    #[error("corrupt index record {name}: {reason}")]
    CorruptRecord { name: String, reason: String },

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("index store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
}

impl IndexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. } | Self::CorruptRecord { .. })
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;

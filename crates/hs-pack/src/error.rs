use hs_types::Multihash;

/// Errors from pack and file store operations.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// Bytes do not hash to their key, or conflict with bytes already stored.
    #[error("integrity violation for {key}: {reason}")]
    Integrity { key: Multihash, reason: String },

    /// A file store path is empty, absolute, or escapes the store root.
    #[error("invalid file path: {0}")]
    InvalidPath(String),

    /// A byte range extends past the end of a stored file.
    #[error("range {offset}+{length} out of bounds for {path} ({size} bytes)")]
    OutOfRange {
        path: String,
        offset: u64,
        length: u64,
        size: u64,
    },

    /// I/O error from the underlying storage backend.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
}

impl PackError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    pub(crate) fn mismatch(key: &Multihash) -> Self {
        Self::Integrity {
            key: key.clone(),
            reason: "bytes do not hash to key".into(),
        }
    }
}

/// Result alias for pack operations.
pub type PackResult<T> = Result<T, PackError>;

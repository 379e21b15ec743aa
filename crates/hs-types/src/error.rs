use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("invalid multihash: {0}")]
    InvalidMultihash(String),

    #[error("unsupported hash function code: {0:#x}")]
    UnsupportedHash(u64),

    #[error("invalid digest length for {algorithm}: expected {expected}, got {actual}")]
    InvalidDigestLength {
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("identity payload of {0} bytes does not fit in a multihash")]
    IdentityTooLarge(usize),

    #[error("unsupported CID version: {0}")]
    UnsupportedVersion(u64),

    #[error("trailing bytes after {0}")]
    TrailingBytes(&'static str),
}

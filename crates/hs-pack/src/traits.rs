use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use hs_types::Multihash;

use crate::error::{PackError, PackResult};

/// Lazy listing of file store paths.
pub type PathStream = BoxStream<'static, PackResult<String>>;

/// Content-addressed block store keyed by multihash.
///
/// All implementations must satisfy these invariants:
/// - `put` rejects bytes that do not hash to the key.
/// - Writing identical bytes under an existing key is a no-op.
/// - Writing different bytes under an existing key is an integrity error and
///   never overwrites what is stored.
/// - The store never interprets block contents or DAG structure.
#[async_trait]
pub trait PackStore: Send + Sync {
    /// Store `bytes` under `key`.
    async fn put(&self, key: &Multihash, bytes: Bytes) -> PackResult<()>;

    /// Read the bytes stored under `key`, or `Ok(None)` if absent.
    ///
    /// Returned bytes are not re-verified; see [`crate::PackReader`].
    async fn get(&self, key: &Multihash) -> PackResult<Option<Bytes>>;

    async fn has(&self, key: &Multihash) -> PackResult<bool>;
}

/// Store of raw, un-chunked source files keyed by relative path.
///
/// Paths are `/`-separated and relative to the store root. Empty, absolute,
/// and `..` paths are rejected with [`PackError::InvalidPath`].
#[async_trait]
pub trait FileStore: Send + Sync {
    /// All stored file paths, depth-first in sorted order.
    ///
    /// The listing is produced lazily; dropping the stream stops the scan.
    fn list(&self) -> PathStream;

    /// Whole file contents, or `Ok(None)` if the file does not exist.
    async fn get(&self, path: &str) -> PackResult<Option<Bytes>>;

    /// `length` bytes starting at `offset`, or `Ok(None)` if the file does
    /// not exist. A range past the end of the file is [`PackError::OutOfRange`].
    async fn get_range(&self, path: &str, offset: u64, length: u64) -> PackResult<Option<Bytes>>;

    /// Create or replace a file.
    async fn put(&self, path: &str, bytes: Bytes) -> PackResult<()>;
}

/// Reject bytes that do not hash to their key.
pub(crate) fn verify_put(key: &Multihash, bytes: &[u8]) -> PackResult<()> {
    if key.verify(bytes) {
        Ok(())
    } else {
        Err(PackError::mismatch(key))
    }
}

/// Resolve an existing entry against an incoming put of the same key.
pub(crate) fn check_existing(key: &Multihash, existing: &[u8], incoming: &[u8]) -> PackResult<()> {
    if existing == incoming {
        Ok(())
    } else {
        Err(PackError::Integrity {
            key: key.clone(),
            reason: "different bytes already stored under key".into(),
        })
    }
}

/// Normalize a file store path into its components.
pub(crate) fn normalize_path(path: &str) -> PackResult<Vec<&str>> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(PackError::InvalidPath(path.to_string()));
    }
    let parts: Vec<&str> = path.split('/').collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || *p == "." || *p == "..")
    {
        return Err(PackError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Check a requested range against a file of `size` bytes.
pub(crate) fn check_range(path: &str, offset: u64, length: u64, size: u64) -> PackResult<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(PackError::OutOfRange {
            path: path.to_string(),
            offset,
            length,
            size,
        }),
    }
}

use std::sync::Arc;

use hs_format::FormatEncoder;
use hs_types::{Block, BlockRef};

use crate::error::{PackError, PackResult};
use crate::traits::{FileStore, PackStore};

/// Raw files plus the encoder that produced their blocks.
struct Fallback {
    files: Arc<dyn FileStore>,
    encoder: FormatEncoder,
}

/// Fetches verified block bytes for resolved block locations.
///
/// The pack store is consulted first. Blocks that have not been packed yet
/// are rebuilt from the raw file span named by the location hint, using the
/// same encoder that indexed them, and then persisted opportunistically.
pub struct PackReader {
    packs: Arc<dyn PackStore>,
    fallback: Option<Fallback>,
    persist_derived: bool,
}

impl PackReader {
    pub fn new(packs: Arc<dyn PackStore>) -> Self {
        Self {
            packs,
            fallback: None,
            persist_derived: true,
        }
    }

    /// Serve unpacked blocks from `files` by re-deriving them with `encoder`.
    pub fn with_fallback(mut self, files: Arc<dyn FileStore>, encoder: FormatEncoder) -> Self {
        self.fallback = Some(Fallback { files, encoder });
        self
    }

    /// Whether derived blocks are written back to the pack store.
    pub fn persist_derived(mut self, persist: bool) -> Self {
        self.persist_derived = persist;
        self
    }

    pub fn pack_store(&self) -> &Arc<dyn PackStore> {
        &self.packs
    }

    /// Read the block at `location`.
    ///
    /// Returns `Ok(None)` when neither the pack store nor the fallback can
    /// produce it. Packed bytes that fail verification are an integrity error.
    /// The block is returned under the CID named by `location`.
    pub async fn read_block(&self, location: &BlockRef) -> PackResult<Option<Block>> {
        let cid = &location.cid;
        if let Some(block) = Block::from_identity(cid) {
            return Ok(Some(block));
        }

        let key = cid.multihash();
        if let Some(bytes) = self.packs.get(key).await? {
            if !key.verify(&bytes) {
                return Err(PackError::Integrity {
                    key: key.clone(),
                    reason: "packed bytes do not match multihash".into(),
                });
            }
            return Ok(Some(Block::new(cid.clone(), bytes)));
        }

        let (Some(fallback), Some(span)) = (&self.fallback, &location.source) else {
            return Ok(None);
        };

        let bytes = match fallback
            .files
            .get_range(&span.path, span.offset, span.length)
            .await
        {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::warn!(%cid, path = %span.path, "source file missing for unpacked block");
                return Ok(None);
            }
            Err(err @ PackError::OutOfRange { .. }) => {
                tracing::warn!(%cid, error = %err, "source file shorter than indexed span");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        // Re-encoding hashes the whole span; keep it off the async workers.
        let encoder = fallback.encoder.clone();
        let target = key.clone();
        let derived = tokio::task::spawn_blocking(move || encoder.derive_block(&bytes, &target))
            .await
            .map_err(|e| PackError::Unavailable(std::io::Error::other(e)))?;
        let Some(derived) = derived else {
            tracing::warn!(%cid, source = %span, "source bytes no longer produce block");
            return Ok(None);
        };
        tracing::debug!(%cid, source = %span, "derived block from source file");

        let block = Block::new(cid.clone(), derived.into_bytes());
        if self.persist_derived {
            if let Err(err) = self.packs.put(key, block.bytes().clone()).await {
                tracing::warn!(%cid, error = %err, "failed to persist derived block");
            }
        }
        Ok(Some(block))
    }
}

impl std::fmt::Debug for PackReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackReader")
            .field("fallback", &self.fallback.is_some())
            .field("persist_derived", &self.persist_derived)
            .finish()
    }
}

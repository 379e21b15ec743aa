use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use hs_index::IndexReader;
use hs_pack::PackReader;
use hs_types::{Block, BlockRef, ContentId};

use crate::error::{StreamError, StreamResult};

/// Lazily produced blocks of one retrieval.
pub type BlockStream = BoxStream<'static, StreamResult<Block>>;

/// What a retrieval returns for an identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    /// Only the block the identifier names.
    Block,
    /// Every block of the identifier's DAG, root first, depth-first.
    #[default]
    Tree,
}

#[derive(Clone, Debug, Default)]
pub struct StreamOptions {
    pub representation: Representation,
}

impl StreamOptions {
    pub fn new(representation: Representation) -> Self {
        Self { representation }
    }
}

/// Outcome of [`HashStreamer::get`].
pub struct Retrieval {
    pub found: bool,
    pub blocks: BlockStream,
}

impl std::fmt::Debug for Retrieval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrieval")
            .field("found", &self.found)
            .finish_non_exhaustive()
    }
}

/// Streams the blocks for an identifier by composing the index and pack readers.
///
/// Each call starts an independent traversal. Nothing is shared between
/// streams except the read-only stores.
#[derive(Clone)]
pub struct HashStreamer {
    index: IndexReader,
    packs: Arc<PackReader>,
}

impl HashStreamer {
    pub fn new(index: IndexReader, packs: Arc<PackReader>) -> Self {
        Self { index, packs }
    }

    /// Stream the blocks for `cid`.
    ///
    /// A `Tree` stream is the whole DAG in pre-order, so dag-pb interior
    /// nodes are interleaved with the raw leaves. Concatenating the block
    /// bytes does not reproduce the file: keep only blocks where
    /// [`Block::is_raw`] holds, or hand the stream to [`collect_content`].
    ///
    /// The root is looked up before returning: an identifier that was never
    /// indexed is `Err(NotFound)`. Once streaming, a block that cannot be read
    /// yields an integrity error and ends the stream.
    pub async fn stream(&self, cid: &ContentId, options: StreamOptions) -> StreamResult<BlockStream> {
        if let Some(block) = Block::from_identity(cid) {
            tracing::debug!(%cid, "serving identity block");
            return Ok(stream::once(future::ready(Ok(block))).boxed());
        }

        let packs = self.packs.clone();
        match options.representation {
            Representation::Block => {
                let location = self
                    .index
                    .locate(cid.multihash())
                    .await
                    .map_err(|e| StreamError::from_index(e, cid))?;
                let location = BlockRef::new(cid.clone(), location.source);
                tracing::debug!(%cid, "streaming single block");
                Ok(stream::once(async move { fetch(&packs, location).await }).boxed())
            }
            Representation::Tree => {
                let refs = self
                    .index
                    .resolve(cid.multihash())
                    .await
                    .map_err(|e| StreamError::from_index(e, cid))?;
                tracing::debug!(%cid, "streaming block tree");

                let root = cid.clone();
                let mut requested = Some(cid.clone());
                let blocks = refs
                    .map_err(move |e| StreamError::from_index(e, &root))
                    .map_ok(move |mut location| {
                        // The root is served under the identifier it was asked for.
                        if let Some(cid) = requested.take() {
                            location.cid = cid;
                        }
                        location
                    })
                    .and_then(move |location| {
                        let packs = packs.clone();
                        async move { fetch(&packs, location).await }
                    });
                Ok(stop_after_error(blocks))
            }
        }
    }

    /// Retrieval entry point: `found` is false, with no blocks, for
    /// identifiers that were never indexed.
    pub async fn get(&self, cid: &ContentId, representation: Representation) -> StreamResult<Retrieval> {
        match self.stream(cid, StreamOptions::new(representation)).await {
            Ok(blocks) => Ok(Retrieval {
                found: true,
                blocks,
            }),
            Err(StreamError::NotFound(_)) => {
                tracing::debug!(%cid, "not found");
                Ok(Retrieval {
                    found: false,
                    blocks: stream::empty().boxed(),
                })
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for HashStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStreamer")
            .field("packs", &self.packs)
            .finish_non_exhaustive()
    }
}

async fn fetch(packs: &PackReader, location: BlockRef) -> StreamResult<Block> {
    match packs.read_block(&location).await {
        Ok(Some(block)) => Ok(block),
        Ok(None) => {
            tracing::warn!(cid = %location.cid, "indexed block not available");
            Err(StreamError::Integrity {
                cid: location.cid,
                reason: "indexed block not available".into(),
            })
        }
        Err(err) => Err(StreamError::from_pack(err, &location.cid)),
    }
}

/// Yield the first error and then end, so a failure never looks like a
/// shorter but complete response.
fn stop_after_error<S>(blocks: S) -> BlockStream
where
    S: futures::Stream<Item = StreamResult<Block>> + Send + 'static,
{
    let mut failed = false;
    blocks
        .take_while(move |item| {
            let keep = !failed;
            failed |= item.is_err();
            future::ready(keep)
        })
        .boxed()
}

/// Concatenate the raw data blocks of a tree stream into file content.
pub async fn collect_content(blocks: BlockStream) -> StreamResult<Vec<u8>> {
    blocks
        .try_fold(Vec::new(), |mut out, block| {
            if block.is_raw() {
                out.extend_from_slice(block.bytes());
            }
            future::ready(Ok(out))
        })
        .await
}

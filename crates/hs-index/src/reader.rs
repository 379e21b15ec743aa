use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use hs_types::{BlockRef, Codec, ContentId, Multihash};

use crate::error::{IndexError, IndexResult};
use crate::record::{IndexRecord, Link};
use crate::store::IndexStore;

/// Lazily resolved block locations.
pub type BlockRefStream = BoxStream<'static, IndexResult<BlockRef>>;

/// Pending work for a lazy depth-first walk.
enum Step {
    Yield(BlockRef),
    Expand(ContentId),
}

/// Push a record's children so they pop in pre-order; returns the record's own block.
fn expand(record: IndexRecord, stack: &mut Vec<Step>) -> BlockRef {
    match record {
        IndexRecord::Blob { block } => block,
        IndexRecord::Flat { root, blocks } => {
            stack.extend(blocks.into_iter().rev().map(Step::Yield));
            root
        }
        IndexRecord::Node { block, links } => {
            stack.extend(links.into_iter().rev().map(|link| match link {
                Link::Leaf(block) => Step::Yield(block),
                Link::Subtree(cid) => Step::Expand(cid),
            }));
            block
        }
    }
}

/// Pick the most structured record, or `None` if there are none.
fn preferred(records: Vec<IndexRecord>) -> Option<IndexRecord> {
    records.into_iter().min_by_key(IndexRecord::rank)
}

/// Resolves identifiers to the block locations needed to rebuild them.
///
/// Works over records from either writer scheme without the caller knowing
/// which one produced them.
#[derive(Clone)]
pub struct IndexReader {
    store: Arc<dyn IndexStore>,
}

impl IndexReader {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    /// Location of the single block named by `key`.
    pub async fn locate(&self, key: &Multihash) -> IndexResult<BlockRef> {
        let records = self.store.get(key).await?;
        records
            .into_iter()
            .max_by_key(IndexRecord::rank)
            .map(|record| record.block().clone())
            .ok_or_else(|| IndexError::NotFound(key.clone()))
    }

    /// Every block of the DAG under `key`, depth-first in pre-order.
    ///
    /// The root record is looked up before returning, so an unknown key is
    /// `Err(NotFound)`. Subtree records are fetched only as the stream is
    /// polled; a missing one ends the stream with an integrity error.
    pub async fn resolve(&self, key: &Multihash) -> IndexResult<BlockRefStream> {
        let record = preferred(self.store.get(key).await?)
            .ok_or_else(|| IndexError::NotFound(key.clone()))?;
        tracing::debug!(key = %key.short_hex(), kind = record.kind(), "resolving index");

        let mut stack = Vec::new();
        let root = expand(record, &mut stack);
        stack.push(Step::Yield(root));

        let store = self.store.clone();
        let walk = stream::try_unfold((store, stack), |(store, mut stack)| async move {
            let Some(step) = stack.pop() else {
                return Ok(None);
            };
            let block = match step {
                Step::Yield(block) => block,
                Step::Expand(cid) => {
                    let records = store.get(cid.multihash()).await?;
                    let Some(record) = preferred(records).filter(|r| r.rank() < 2) else {
                        return Err(IndexError::Integrity {
                            cid,
                            reason: "subtree has no index record".into(),
                        });
                    };
                    let mut block = expand(record, &mut stack);
                    block.cid = cid;
                    block
                }
            };
            Ok(Some((block, (store, stack))))
        });
        Ok(walk.boxed())
    }

    /// Only the data leaves under `key`, in file order.
    pub async fn resolve_leaves(&self, key: &Multihash) -> IndexResult<BlockRefStream> {
        Ok(self
            .resolve(key)
            .await?
            .try_filter(|block| future::ready(block.cid.codec() == Codec::Raw))
            .boxed())
    }
}

impl std::fmt::Debug for IndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexReader").finish_non_exhaustive()
    }
}

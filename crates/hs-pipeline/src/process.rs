//! Processing phase: turn one queued file into packed blocks and index records.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use hs_format::{BlockDag, DagNode, FormatEncoder};
use hs_index::IndexWriter;
use hs_pack::{FileStore, PackStore};
use hs_types::Multihash;

use crate::error::{PipelineError, PipelineResult};
use crate::task::QueuedIndexTask;

/// Which blocks of an encoded file are written to the pack store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackingMode {
    /// Every block, including the root.
    #[default]
    Eager,
    /// Internal nodes only. Leaves are served from the file store on read.
    Lazy,
}

impl PackingMode {
    fn packs(&self, node: &DagNode) -> bool {
        match self {
            Self::Eager => true,
            Self::Lazy => !node.is_leaf(),
        }
    }
}

/// Everything the processing phase writes to and reads from.
#[derive(Clone)]
pub struct PipelineContext {
    pub files: Arc<dyn FileStore>,
    pub packs: Arc<dyn PackStore>,
    pub writers: Vec<Arc<dyn IndexWriter>>,
    pub encoder: FormatEncoder,
    pub packing: PackingMode,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("format", &self.encoder.format())
            .field("packing", &self.packing)
            .field("writers", &self.writers.iter().map(|w| w.scheme()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Encode, pack and index the file named by `task`. Returns the root digest;
/// the caller chooses the codec it is exposed under.
pub async fn process_file(ctx: &PipelineContext, task: &QueuedIndexTask) -> PipelineResult<Multihash> {
    if task.format != ctx.encoder.format() {
        return Err(PipelineError::FormatMismatch {
            task: task.format,
            pipeline: ctx.encoder.format(),
        });
    }

    let bytes = ctx
        .files
        .get(&task.path)
        .await?
        .ok_or_else(|| PipelineError::NotFound(task.path.clone()))?;

    let encoder = ctx.encoder.clone();
    let dag = tokio::task::spawn_blocking(move || encoder.encode(&bytes))
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?;

    let packed = pack_blocks(ctx.packs.as_ref(), &dag, ctx.packing).await?;
    debug!(path = %task.path, blocks = dag.len(), packed, "packed blocks");

    for writer in &ctx.writers {
        writer.write(dag.root_cid(), &dag, Some(&task.path)).await?;
    }

    Ok(dag.root_cid().multihash().clone())
}

/// Write the blocks `mode` selects, once each. Returns how many were written.
async fn pack_blocks(packs: &dyn PackStore, dag: &BlockDag, mode: PackingMode) -> PipelineResult<usize> {
    let mut seen = HashSet::new();
    for node in dag.walk().filter(|n| mode.packs(n)) {
        let key = node.cid().multihash();
        if !seen.insert(key.clone()) {
            continue;
        }
        packs.put(key, node.block.bytes().clone()).await?;
    }
    Ok(seen.len())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use hs_format::{Format, UnixFsOptions};
    use hs_index::{writer_for, IndexReader, IndexScheme, IndexStore, MemoryIndexStore};
    use hs_pack::{MemoryFileStore, MemoryPackStore};
    use hs_types::HashAlgorithm;

    use super::*;

    struct Harness {
        ctx: PipelineContext,
        files: Arc<MemoryFileStore>,
        packs: Arc<MemoryPackStore>,
        index: Arc<MemoryIndexStore>,
    }

    fn harness(packing: PackingMode) -> Harness {
        let files = Arc::new(MemoryFileStore::new());
        let packs = Arc::new(MemoryPackStore::new());
        let index = Arc::new(MemoryIndexStore::new());
        let store: Arc<dyn IndexStore> = index.clone();
        let ctx = PipelineContext {
            files: files.clone(),
            packs: packs.clone(),
            writers: vec![
                writer_for(IndexScheme::SingleLevel, store.clone()),
                writer_for(IndexScheme::MultipleLevel, store),
            ],
            encoder: FormatEncoder::unixfs(UnixFsOptions {
                chunk_size: 16,
                max_children: 3,
                hash: HashAlgorithm::Sha2_256,
            })
            .unwrap(),
            packing,
        };
        Harness {
            ctx,
            files,
            packs,
            index,
        }
    }

    #[tokio::test]
    async fn eager_packs_every_distinct_block() {
        let h = harness(PackingMode::Eager);
        let data: Vec<u8> = (0..200u8).collect();
        h.files.put("a.bin", Bytes::from(data.clone())).await.unwrap();

        let root = process_file(&h.ctx, &QueuedIndexTask::new("a.bin", Format::UnixFs))
            .await
            .unwrap();

        let dag = h.ctx.encoder.encode(&data);
        assert_eq!(&root, dag.root_cid().multihash());
        for node in dag.walk() {
            assert!(h.packs.has(node.cid().multihash()).await.unwrap());
        }
        let resolved = IndexReader::new(h.index.clone()).locate(&root).await.unwrap();
        assert_eq!(&resolved.cid, dag.root_cid());
    }

    #[tokio::test]
    async fn lazy_skips_leaves() {
        let h = harness(PackingMode::Lazy);
        let data: Vec<u8> = (0..200u8).collect();
        h.files.put("a.bin", Bytes::from(data.clone())).await.unwrap();

        process_file(&h.ctx, &QueuedIndexTask::new("a.bin", Format::UnixFs))
            .await
            .unwrap();

        let dag = h.ctx.encoder.encode(&data);
        for node in dag.walk() {
            let packed = h.packs.has(node.cid().multihash()).await.unwrap();
            assert_eq!(packed, !node.is_leaf());
        }
    }

    #[tokio::test]
    async fn duplicate_chunks_packed_once() {
        let h = harness(PackingMode::Eager);
        h.files.put("zeros.bin", Bytes::from(vec![0u8; 160])).await.unwrap();

        process_file(&h.ctx, &QueuedIndexTask::new("zeros.bin", Format::UnixFs))
            .await
            .unwrap();
        let dag = h.ctx.encoder.encode(&[0u8; 160]);
        let distinct: HashSet<_> = dag.walk().map(|n| n.cid().multihash().clone()).collect();
        assert_eq!(h.packs.len(), distinct.len());
    }

    #[tokio::test]
    async fn reprocessing_is_idempotent() {
        let h = harness(PackingMode::Eager);
        h.files.put("a.bin", Bytes::from_static(b"same bytes every time"))
            .await
            .unwrap();
        let task = QueuedIndexTask::new("a.bin", Format::UnixFs);

        let first = process_file(&h.ctx, &task).await.unwrap();
        let records = h.index.record_count();
        let second = process_file(&h.ctx, &task).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.index.record_count(), records);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let h = harness(PackingMode::Eager);
        let err = process_file(&h.ctx, &QueuedIndexTask::new("gone.bin", Format::UnixFs))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(h.packs.is_empty());
    }
}

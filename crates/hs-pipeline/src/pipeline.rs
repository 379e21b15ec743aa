use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use hs_types::{ContentId, Multihash};

use crate::error::PipelineResult;
use crate::process::{process_file, PipelineContext};
use crate::registry::IndexedFiles;
use crate::schedule::{schedule_files, ScheduledStream};
use crate::scheduler::IndexScheduler;

/// A file that was indexed during a sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexedFile {
    pub path: String,
    pub cid: ContentId,
}

/// A scheduling or processing failure. `path` is absent when the failure
/// is not tied to one file, such as a broken listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub path: Option<String>,
    pub error: String,
}

/// Outcome of one [`IndexPipeline::sync_all`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub indexed: Vec<IndexedFile>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Scheduling and processing wired together over one set of stores.
#[derive(Clone)]
pub struct IndexPipeline {
    ctx: PipelineContext,
    scheduler: Arc<dyn IndexScheduler>,
    registry: Arc<dyn IndexedFiles>,
}

impl IndexPipeline {
    pub fn new(
        ctx: PipelineContext,
        scheduler: Arc<dyn IndexScheduler>,
        registry: Arc<dyn IndexedFiles>,
    ) -> Self {
        Self {
            ctx,
            scheduler,
            registry,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn scheduler(&self) -> &Arc<dyn IndexScheduler> {
        &self.scheduler
    }

    /// Start the scheduling phase on its own.
    pub fn schedule(&self) -> ScheduledStream {
        schedule_files(
            self.ctx.files.clone(),
            self.scheduler.clone(),
            self.registry.clone(),
            self.ctx.encoder.format(),
        )
    }

    /// Schedule every new file and index everything queued.
    ///
    /// Processing starts with the first scheduled file while the scan goes on.
    /// Tasks left in a durable queue by an earlier run are picked up too. A
    /// file that fails is recorded in the report and its siblings still run.
    pub async fn sync_all(&self) -> SyncReport {
        let mut report = SyncReport::default();
        let mut scheduled = self.schedule();
        while let Some(item) = scheduled.next().await {
            if let Err(err) = item {
                report.failed.push(SyncFailure {
                    path: None,
                    error: err.to_string(),
                });
            }
            self.drain(&mut report).await;
        }
        self.drain(&mut report).await;

        info!(
            indexed = report.indexed.len(),
            failed = report.failed.len(),
            "sync finished"
        );
        report
    }

    /// Process queued tasks until the scheduler is empty.
    ///
    /// A path is recorded as indexed only after it was processed, so a task
    /// lost with a non-durable queue, or one that failed, is scheduled again
    /// by the next scan. A task whose path was indexed in the meantime, for
    /// example a duplicate left in a durable queue, is skipped.
    async fn drain(&self, report: &mut SyncReport) {
        loop {
            let task = match self.scheduler.dequeue().await {
                Ok(Some(task)) => task,
                Ok(None) => return,
                Err(err) => {
                    warn!(error = %err, "failed to dequeue index task");
                    report.failed.push(SyncFailure {
                        path: None,
                        error: err.to_string(),
                    });
                    return;
                }
            };
            match self.registry.is_indexed(&task.path).await {
                Ok(true) => {
                    debug!(path = %task.path, "skipping already indexed file");
                    continue;
                }
                Ok(false) => {}
                Err(err) => warn!(path = %task.path, error = %err, "indexed-file lookup failed"),
            }
            match outcome(&task.path, process_file(&self.ctx, &task).await) {
                Ok(file) => {
                    if let Err(err) = self.registry.mark_indexed(&file.path).await {
                        warn!(path = %file.path, error = %err, "failed to record indexed file");
                    }
                    report.indexed.push(file);
                }
                Err(failure) => report.failed.push(failure),
            }
        }
    }
}

fn outcome(path: &str, result: PipelineResult<Multihash>) -> Result<IndexedFile, SyncFailure> {
    match result {
        Ok(root) => {
            let cid = ContentId::dag_pb(root);
            info!(%path, %cid, "file was indexed with CID");
            Ok(IndexedFile {
                path: path.to_string(),
                cid,
            })
        }
        Err(err) => {
            warn!(%path, error = %err, "failed to index file");
            Err(SyncFailure {
                path: Some(path.to_string()),
                error: err.to_string(),
            })
        }
    }
}

impl std::fmt::Debug for IndexPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexPipeline")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::TryStreamExt;
    use hs_format::{Format, FormatEncoder, UnixFsOptions};
    use hs_index::{writer_for, IndexReader, IndexScheme, IndexStore, MemoryIndexStore};
    use std::sync::atomic::{AtomicBool, Ordering};

    use hs_pack::{
        FileStore, FsFileStore, FsPackStore, MemoryFileStore, MemoryPackStore, PackError, PackReader,
        PackResult, PackStore, PathStream,
    };
    use hs_streamer::{collect_content, HashStreamer, StreamOptions};
    use hs_types::{Block, HashAlgorithm};
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::log::LogIndexScheduler;
    use crate::process::PackingMode;
    use crate::registry::{FsIndexedFiles, IndexedFiles, MemoryIndexedFiles};
    use crate::scheduler::MemoryIndexScheduler;
    use crate::task::QueuedIndexTask;

    const SCHEMES: [IndexScheme; 2] = [IndexScheme::SingleLevel, IndexScheme::MultipleLevel];

    fn random(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut data = vec![0u8; len];
        rng.fill(&mut data[..]);
        data
    }

    struct Node {
        files: Arc<MemoryFileStore>,
        packs: Arc<MemoryPackStore>,
        index: Arc<MemoryIndexStore>,
        pipeline: IndexPipeline,
    }

    impl Node {
        fn new(scheme: IndexScheme, encoder: FormatEncoder, packing: PackingMode) -> Self {
            let files = Arc::new(MemoryFileStore::new());
            let packs = Arc::new(MemoryPackStore::new());
            let index = Arc::new(MemoryIndexStore::new());
            let store: Arc<dyn IndexStore> = index.clone();
            let ctx = PipelineContext {
                files: files.clone(),
                packs: packs.clone(),
                writers: vec![writer_for(scheme, store)],
                encoder,
                packing,
            };
            let pipeline = IndexPipeline::new(
                ctx,
                Arc::new(MemoryIndexScheduler::new()),
                Arc::new(MemoryIndexedFiles::new()),
            );
            Self {
                files,
                packs,
                index,
                pipeline,
            }
        }

        fn small(scheme: IndexScheme, packing: PackingMode) -> Self {
            Self::new(scheme, small_encoder(), packing)
        }

        fn streamer(&self) -> HashStreamer {
            let packs = PackReader::new(self.packs.clone())
                .with_fallback(self.files.clone(), self.pipeline.context().encoder.clone());
            HashStreamer::new(IndexReader::new(self.index.clone()), Arc::new(packs))
        }
    }

    fn small_encoder() -> FormatEncoder {
        FormatEncoder::unixfs(UnixFsOptions {
            chunk_size: 64,
            max_children: 4,
            hash: HashAlgorithm::Sha2_256,
        })
        .unwrap()
    }

    fn memory_context(
        files: Arc<dyn FileStore>,
        packs: Arc<MemoryPackStore>,
        index: Arc<MemoryIndexStore>,
    ) -> PipelineContext {
        let store: Arc<dyn IndexStore> = index;
        PipelineContext {
            files,
            packs,
            writers: vec![writer_for(IndexScheme::MultipleLevel, store)],
            encoder: small_encoder(),
            packing: PackingMode::Eager,
        }
    }

    /// File store whose first read fails.
    struct FlakyFiles {
        inner: MemoryFileStore,
        failed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl FileStore for FlakyFiles {
        fn list(&self) -> PathStream {
            self.inner.list()
        }

        async fn get(&self, path: &str) -> PackResult<Option<Bytes>> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(PackError::Unavailable(std::io::Error::other("transient")));
            }
            self.inner.get(path).await
        }

        async fn get_range(&self, path: &str, offset: u64, length: u64) -> PackResult<Option<Bytes>> {
            self.inner.get_range(path, offset, length).await
        }

        async fn put(&self, path: &str, bytes: Bytes) -> PackResult<()> {
            self.inner.put(path, bytes).await
        }
    }

    async fn content(streamer: &HashStreamer, cid: &ContentId) -> Vec<u8> {
        let blocks = streamer.stream(cid, StreamOptions::default()).await.unwrap();
        collect_content(blocks).await.unwrap()
    }

    fn flip_bit(cid: &ContentId) -> ContentId {
        let mh = cid.multihash();
        let mut digest = mh.digest().to_vec();
        digest[0] ^= 0x01;
        ContentId::dag_pb(Multihash::new(mh.algorithm().unwrap(), digest).unwrap())
    }

    #[tokio::test]
    async fn five_megabyte_file_round_trips() {
        for scheme in SCHEMES {
            let node = Node::new(scheme, FormatEncoder::for_format(Format::UnixFs), PackingMode::Eager);
            let data = random(5_000_000, 7);
            node.files.put("big.bin", Bytes::from(data.clone())).await.unwrap();

            let report = node.pipeline.sync_all().await;
            assert!(report.is_clean(), "{scheme}: {:?}", report.failed);
            assert_eq!(report.indexed.len(), 1);
            assert_eq!(report.indexed[0].path, "big.bin");

            let streamer = node.streamer();
            let cid = &report.indexed[0].cid;
            assert_eq!(content(&streamer, cid).await, data, "{scheme}");

            let err = streamer
                .stream(&flip_bit(cid), StreamOptions::default())
                .await
                .err()
                .unwrap();
            assert!(err.is_not_found(), "{scheme}: {err}");
        }
    }

    #[tokio::test]
    async fn lazy_packing_serves_leaves_from_files() {
        for scheme in SCHEMES {
            let node = Node::small(scheme, PackingMode::Lazy);
            let data = random(3000, 11);
            node.files.put("a.bin", Bytes::from(data.clone())).await.unwrap();

            let report = node.pipeline.sync_all().await;
            let cid = &report.indexed[0].cid;
            assert_eq!(content(&node.streamer(), cid).await, data, "{scheme}");
        }
    }

    #[tokio::test]
    async fn resync_only_indexes_new_files() {
        let node = Node::small(IndexScheme::MultipleLevel, PackingMode::Eager);
        node.files.put("a.bin", Bytes::from(random(500, 1))).await.unwrap();
        node.files.put("b.bin", Bytes::from(random(500, 2))).await.unwrap();

        let first = node.pipeline.sync_all().await;
        let paths: Vec<&str> = first.indexed.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.bin", "b.bin"]);

        assert!(node.pipeline.sync_all().await.indexed.is_empty());

        node.files.put("c.bin", Bytes::from(random(500, 3))).await.unwrap();
        let third = node.pipeline.sync_all().await;
        assert_eq!(third.indexed.len(), 1);
        assert_eq!(third.indexed[0].path, "c.bin");
    }

    #[tokio::test]
    async fn identical_files_share_a_root() {
        let node = Node::small(IndexScheme::SingleLevel, PackingMode::Eager);
        let data = Bytes::from(random(900, 4));
        node.files.put("one.bin", data.clone()).await.unwrap();
        node.files.put("two.bin", data).await.unwrap();

        let report = node.pipeline.sync_all().await;
        assert!(report.is_clean());
        assert_eq!(report.indexed[0].cid, report.indexed[1].cid);
    }

    #[tokio::test]
    async fn failing_file_does_not_stop_siblings() {
        let node = Node::small(IndexScheme::MultipleLevel, PackingMode::Eager);
        node.files.put("a.bin", Bytes::from(random(200, 5))).await.unwrap();
        node.files.put("b.bin", Bytes::from(random(200, 6))).await.unwrap();
        // Queued but absent from the file store.
        node.pipeline
            .scheduler()
            .enqueue(QueuedIndexTask::new("gone.bin", Format::UnixFs))
            .await
            .unwrap();

        let report = node.pipeline.sync_all().await;
        assert_eq!(report.indexed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path.as_deref(), Some("gone.bin"));
    }

    #[tokio::test]
    async fn empty_file_gets_a_retrievable_root() {
        let node = Node::small(IndexScheme::MultipleLevel, PackingMode::Eager);
        node.files.put("empty.bin", Bytes::new()).await.unwrap();

        let report = node.pipeline.sync_all().await;
        let cid = &report.indexed[0].cid;
        let blocks: Vec<Block> = node
            .streamer()
            .stream(cid, StreamOptions::default())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].cid(), cid);
    }

    #[tokio::test]
    async fn durable_stores_resume_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let data = random(4000, 9);
        let encoder = FormatEncoder::unixfs(UnixFsOptions {
            chunk_size: 256,
            max_children: 8,
            hash: HashAlgorithm::Sha2_256,
        })
        .unwrap();

        let open = |dir: std::path::PathBuf, encoder: FormatEncoder| async move {
            let files = Arc::new(FsFileStore::open(dir.join("raw")).await.unwrap());
            let packs: Arc<dyn PackStore> = Arc::new(FsPackStore::open(dir.join("pack")).await.unwrap());
            let index: Arc<dyn IndexStore> =
                Arc::new(hs_index::FsIndexStore::open(dir.join("index")).await.unwrap());
            let ctx = PipelineContext {
                files: files.clone(),
                packs: packs.clone(),
                writers: vec![writer_for(IndexScheme::MultipleLevel, index.clone())],
                encoder,
                packing: PackingMode::Eager,
            };
            let pipeline = IndexPipeline::new(
                ctx,
                Arc::new(LogIndexScheduler::open(dir.join("queue.log")).await.unwrap()),
                Arc::new(FsIndexedFiles::open(dir.join("file-synced")).await.unwrap()),
            );
            (files, packs, index, pipeline)
        };

        let cid = {
            let (files, _, _, pipeline) = open(dir.path().to_path_buf(), encoder.clone()).await;
            files.put("doc.bin", Bytes::from(data.clone())).await.unwrap();
            let report = pipeline.sync_all().await;
            assert!(report.is_clean());
            report.indexed[0].cid.clone()
        };

        let (_, packs, index, pipeline) = open(dir.path().to_path_buf(), encoder).await;
        assert!(pipeline.sync_all().await.indexed.is_empty());
        let streamer = HashStreamer::new(IndexReader::new(index), Arc::new(PackReader::new(packs)));
        assert_eq!(content(&streamer, &cid).await, data);
    }

    #[tokio::test]
    async fn file_queued_before_a_crash_is_indexed_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(MemoryFileStore::new());
        let packs = Arc::new(MemoryPackStore::new());
        let index = Arc::new(MemoryIndexStore::new());
        files.put("a.bin", Bytes::from(random(700, 12))).await.unwrap();

        {
            let pipeline = IndexPipeline::new(
                memory_context(files.clone(), packs.clone(), index.clone()),
                Arc::new(MemoryIndexScheduler::new()),
                Arc::new(FsIndexedFiles::open(dir.path()).await.unwrap()),
            );
            let mut scheduled = pipeline.schedule();
            assert_eq!(scheduled.next().await.unwrap().unwrap(), "a.bin");
            assert_eq!(pipeline.scheduler().len().await.unwrap(), 1);
            // Stops here: the in-memory queue goes away undrained.
        }

        let registry = Arc::new(FsIndexedFiles::open(dir.path()).await.unwrap());
        let pipeline = IndexPipeline::new(
            memory_context(files, packs, index),
            Arc::new(MemoryIndexScheduler::new()),
            registry.clone(),
        );
        let report = pipeline.sync_all().await;
        assert!(report.is_clean(), "{:?}", report.failed);
        assert_eq!(report.indexed.len(), 1);
        assert_eq!(report.indexed[0].path, "a.bin");
        assert!(registry.is_indexed("a.bin").await.unwrap());
    }

    #[tokio::test]
    async fn transient_failure_is_retried_on_next_sync() {
        let files = Arc::new(FlakyFiles {
            inner: MemoryFileStore::new(),
            failed: AtomicBool::new(false),
        });
        files.put("a.bin", Bytes::from(random(700, 13))).await.unwrap();
        let pipeline = IndexPipeline::new(
            memory_context(files, Arc::new(MemoryPackStore::new()), Arc::new(MemoryIndexStore::new())),
            Arc::new(MemoryIndexScheduler::new()),
            Arc::new(MemoryIndexedFiles::new()),
        );

        let first = pipeline.sync_all().await;
        assert!(first.indexed.is_empty());
        assert_eq!(first.failed.len(), 1);
        assert_eq!(first.failed[0].path.as_deref(), Some("a.bin"));

        let second = pipeline.sync_all().await;
        assert!(second.is_clean(), "{:?}", second.failed);
        assert_eq!(second.indexed.len(), 1);
        assert_eq!(second.indexed[0].path, "a.bin");
    }

    #[tokio::test]
    async fn duplicate_tasks_index_a_file_once() {
        let node = Node::small(IndexScheme::MultipleLevel, PackingMode::Eager);
        node.files.put("a.bin", Bytes::from(random(300, 14))).await.unwrap();
        for _ in 0..2 {
            node.pipeline
                .scheduler()
                .enqueue(QueuedIndexTask::new("a.bin", Format::UnixFs))
                .await
                .unwrap();
        }

        let report = node.pipeline.sync_all().await;
        assert!(report.is_clean());
        assert_eq!(report.indexed.len(), 1);
        assert!(node.pipeline.sync_all().await.indexed.is_empty());
    }
}

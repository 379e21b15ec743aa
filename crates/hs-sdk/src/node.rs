use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use hs_index::{writer_for, FsIndexStore, IndexReader, IndexStore, IndexWriter};
use hs_pack::{FsFileStore, FsPackStore, PackReader, PackStore};
use hs_pipeline::{
    FsIndexedFiles, IndexPipeline, IndexScheduler, LogIndexScheduler, MemoryIndexScheduler,
    PackingMode, PipelineContext, SyncReport,
};
use hs_streamer::{collect_content, HashStreamer, Representation, Retrieval, StreamOptions};
use hs_types::ContentId;

use crate::config::{HashStreamConfig, SchedulerKind};
use crate::error::{SdkError, SdkResult};

/// A hash stream node over filesystem stores: serves indexed content and
/// indexes new files from the raw content directory.
#[derive(Clone, Debug)]
pub struct HashStreamNode {
    config: HashStreamConfig,
    streamer: HashStreamer,
    pipeline: IndexPipeline,
}

impl HashStreamNode {
    /// Open the stores described by `config`, creating missing directories
    /// under the store path. The raw content directory must already exist.
    pub async fn open(config: HashStreamConfig) -> SdkResult<Self> {
        config.validate()?;
        let config = config.resolved()?;
        if !tokio::fs::try_exists(&config.raw_content_path).await? {
            return Err(SdkError::MissingRawContent(
                config.raw_content_path.display().to_string(),
            ));
        }

        let files = Arc::new(FsFileStore::open(config.raw_content_path.clone()).await?);
        let packs: Arc<dyn PackStore> = Arc::new(FsPackStore::open(config.pack_path()).await?);
        let index: Arc<dyn IndexStore> = Arc::new(FsIndexStore::open(config.index_path()).await?);
        let encoder = config.encoder()?;

        // Lazy packing keeps leaves out of the pack store on reads as well.
        let reader = PackReader::new(packs.clone())
            .with_fallback(files.clone(), encoder.clone())
            .persist_derived(config.packing == PackingMode::Eager);
        let streamer = HashStreamer::new(IndexReader::new(index.clone()), Arc::new(reader));

        let mut seen = HashSet::new();
        let writers: Vec<Arc<dyn IndexWriter>> = config
            .index_writers
            .iter()
            .filter(|scheme| seen.insert(**scheme))
            .map(|scheme| writer_for(*scheme, index.clone()))
            .collect();

        let scheduler: Arc<dyn IndexScheduler> = match config.scheduler {
            SchedulerKind::Memory => Arc::new(MemoryIndexScheduler::new()),
            SchedulerKind::Durable => Arc::new(LogIndexScheduler::open(config.queue_path()).await?),
        };
        let registry = Arc::new(FsIndexedFiles::open(config.synced_path()).await?);

        let ctx = PipelineContext {
            files,
            packs,
            writers,
            encoder,
            packing: config.packing,
        };
        let pipeline = IndexPipeline::new(ctx, scheduler, registry);

        info!(
            store = %config.store_path.display(),
            raw = %config.raw_content_path.display(),
            format = %config.format,
            scheduler = %config.scheduler,
            "opened hash stream node"
        );
        Ok(Self {
            config,
            streamer,
            pipeline,
        })
    }

    /// The resolved configuration.
    pub fn config(&self) -> &HashStreamConfig {
        &self.config
    }

    pub fn streamer(&self) -> &HashStreamer {
        &self.streamer
    }

    pub fn pipeline(&self) -> &IndexPipeline {
        &self.pipeline
    }

    pub async fn get(&self, cid: &ContentId, representation: Representation) -> SdkResult<Retrieval> {
        Ok(self.streamer.get(cid, representation).await?)
    }

    /// File content for `cid`, or `None` if it was never indexed.
    pub async fn cat(&self, cid: &ContentId) -> SdkResult<Option<Vec<u8>>> {
        match self.streamer.stream(cid, StreamOptions::default()).await {
            Ok(blocks) => Ok(Some(collect_content(blocks).await?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn sync_all(&self) -> SyncReport {
        self.pipeline.sync_all().await
    }
}

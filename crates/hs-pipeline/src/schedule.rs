//! Scheduling phase: discover new files and queue them for indexing.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use hs_format::Format;
use hs_pack::FileStore;

use crate::error::PipelineResult;
use crate::registry::IndexedFiles;
use crate::scheduler::IndexScheduler;
use crate::task::QueuedIndexTask;

/// Paths scheduled by one scan, in discovery order.
pub type ScheduledStream = BoxStream<'static, PipelineResult<String>>;

/// How many scheduled paths may wait for the consumer before the scan pauses.
const SCHEDULE_BUFFER: usize = 16;

/// Scan `files` and enqueue every path `registry` does not record as indexed.
///
/// The scan runs in a background task and each path is sent as soon as it is
/// queued, so a consumer can start processing before the scan finishes.
/// Dropping the stream stops the scan at the next path. A listing error ends
/// the scan; a failure to queue one path is reported and the scan goes on.
pub fn schedule_files(
    files: Arc<dyn FileStore>,
    scheduler: Arc<dyn IndexScheduler>,
    registry: Arc<dyn IndexedFiles>,
    format: Format,
) -> ScheduledStream {
    let (tx, rx) = mpsc::channel::<PipelineResult<String>>(SCHEDULE_BUFFER);

    tokio::spawn(async move {
        let mut listing = files.list();
        while let Some(entry) = listing.next().await {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    let _ = tx.send(Err(err.into())).await;
                    return;
                }
            };
            let outcome = schedule_one(&path, scheduler.as_ref(), registry.as_ref(), format).await;
            let item = match outcome {
                Ok(true) => Ok(path),
                Ok(false) => continue,
                Err(err) => {
                    tracing::warn!(%path, error = %err, "failed to schedule file");
                    Err(err)
                }
            };
            if tx.send(item).await.is_err() {
                tracing::debug!("schedule consumer dropped; stopping scan");
                return;
            }
        }
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

/// Queue `path` unless it is already indexed. Returns whether it was queued.
///
/// Nothing is recorded here: the registry only learns about a path once the
/// processing phase has indexed it.
async fn schedule_one(
    path: &str,
    scheduler: &dyn IndexScheduler,
    registry: &dyn IndexedFiles,
    format: Format,
) -> PipelineResult<bool> {
    if registry.is_indexed(path).await? {
        return Ok(false);
    }
    scheduler.enqueue(QueuedIndexTask::new(path, format)).await?;
    tracing::info!(%path, "Scheduled file");
    Ok(true)
}

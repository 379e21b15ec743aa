use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::PipelineResult;
use crate::task::QueuedIndexTask;

/// Queue of files waiting to be indexed.
///
/// `dequeue` removes the task it returns, so no two callers ever receive the
/// same task. Tasks are never requeued automatically.
#[async_trait]
pub trait IndexScheduler: Send + Sync {
    async fn enqueue(&self, task: QueuedIndexTask) -> PipelineResult<()>;

    /// The oldest pending task, or `None` when the queue is empty.
    async fn dequeue(&self) -> PipelineResult<Option<QueuedIndexTask>>;

    /// Number of pending tasks.
    async fn len(&self) -> PipelineResult<usize>;

    async fn is_empty(&self) -> PipelineResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// FIFO scheduler held in memory. Pending tasks are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryIndexScheduler {
    queue: Mutex<VecDeque<QueuedIndexTask>>,
}

impl MemoryIndexScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexScheduler for MemoryIndexScheduler {
    async fn enqueue(&self, task: QueuedIndexTask) -> PipelineResult<()> {
        self.queue.lock().await.push_back(task);
        Ok(())
    }

    async fn dequeue(&self) -> PipelineResult<Option<QueuedIndexTask>> {
        Ok(self.queue.lock().await.pop_front())
    }

    async fn len(&self) -> PipelineResult<usize> {
        Ok(self.queue.lock().await.len())
    }
}

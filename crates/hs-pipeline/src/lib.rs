//! Indexing pipeline for Hash Stream.
//!
//! Indexing runs in two phases:
//!
//! - **Scheduling** scans the file store for paths not seen before, queues an
//!   [`QueuedIndexTask`] for each through an [`IndexScheduler`], and streams
//!   the scheduled paths back as they are found.
//! - **Processing** takes a task, encodes the file into a block DAG, writes
//!   the blocks to the pack store and the records to every index writer, and
//!   returns the root digest.
//!
//! [`IndexPipeline::sync_all`] runs both until the scan is exhausted and the
//! queue is empty. A file that fails is reported and the rest carry on.
//!
//! Two schedulers are provided: [`MemoryIndexScheduler`] and the durable
//! [`LogIndexScheduler`], which keeps its queue in an append-only log.

pub mod error;
pub mod log;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod task;

pub use error::{PipelineError, PipelineResult};
pub use log::LogIndexScheduler;
pub use pipeline::{IndexPipeline, IndexedFile, SyncFailure, SyncReport};
pub use process::{process_file, PackingMode, PipelineContext};
pub use registry::{FsIndexedFiles, MemoryIndexedFiles, IndexedFiles};
pub use schedule::{schedule_files, ScheduledStream};
pub use scheduler::{IndexScheduler, MemoryIndexScheduler};
pub use task::QueuedIndexTask;

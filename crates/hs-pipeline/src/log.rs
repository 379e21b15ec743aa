//! Durable index scheduler backed by an append-only event log.
//!
//! On-disk format, one frame per event:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized LogEvent)]
//! ```
//!
//! Replaying the log yields the pending queue. Frames that fail the CRC check
//! are skipped; a torn frame at the tail ends recovery. The log is compacted
//! to just the pending tasks on open and truncated whenever the queue drains.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::scheduler::IndexScheduler;
use crate::task::QueuedIndexTask;

const HEADER_SIZE: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum LogEvent {
    Enqueued { seq: u64, task: QueuedIndexTask },
    Dequeued { seq: u64 },
}

fn frame(event: &LogEvent) -> PipelineResult<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| PipelineError::Serialization(e.to_string()))?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Read every intact event from `data`.
fn replay(data: &[u8]) -> Vec<LogEvent> {
    let mut events = Vec::new();
    let mut offset = 0usize;
    while offset + HEADER_SIZE <= data.len() {
        let length = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let expected_crc = u32::from_le_bytes([
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ]);
        let start = offset + HEADER_SIZE;
        if length == 0 || start + length > data.len() {
            warn!(offset, length, "torn scheduler log entry; stopping recovery");
            break;
        }
        let payload = &data[start..start + length];
        offset = start + length;

        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(offset = start - HEADER_SIZE, "CRC mismatch in scheduler log; skipping entry");
            continue;
        }
        match bincode::deserialize::<LogEvent>(payload) {
            Ok(event) => events.push(event),
            Err(e) => warn!(error = %e, "undecodable scheduler log entry; skipping"),
        }
    }
    events
}

struct LogState {
    file: File,
    pending: VecDeque<(u64, QueuedIndexTask)>,
    next_seq: u64,
}

impl LogState {
    async fn append(&mut self, event: &LogEvent) -> PipelineResult<()> {
        self.file.write_all(&frame(event)?).await?;
        self.file.sync_data().await?;
        Ok(())
    }
}

/// FIFO scheduler whose queue survives restarts.
///
/// A dequeued task is recorded as taken before it is returned, so a crash
/// mid-processing does not redeliver it.
pub struct LogIndexScheduler {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl LogIndexScheduler {
    /// Open (or create) the log at `path` and restore its pending tasks.
    pub async fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut pending: VecDeque<(u64, QueuedIndexTask)> = VecDeque::new();
        let mut next_seq = 0u64;
        for event in replay(&data) {
            match event {
                LogEvent::Enqueued { seq, task } => {
                    next_seq = next_seq.max(seq + 1);
                    pending.push_back((seq, task));
                }
                LogEvent::Dequeued { seq } => pending.retain(|(s, _)| *s != seq),
            }
        }

        // Compact: rewrite the log with only the pending tasks.
        let tmp = path.with_extension("compact");
        {
            let mut out = File::create(&tmp).await?;
            for (seq, task) in &pending {
                out.write_all(&frame(&LogEvent::Enqueued {
                    seq: *seq,
                    task: task.clone(),
                })?)
                .await?;
            }
            out.sync_all().await?;
        }
        fs::rename(&tmp, &path).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(path = %path.display(), pending = pending.len(), "opened scheduler log");
        Ok(Self {
            path,
            state: Mutex::new(LogState {
                file,
                pending,
                next_seq,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IndexScheduler for LogIndexScheduler {
    async fn enqueue(&self, task: QueuedIndexTask) -> PipelineResult<()> {
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state
            .append(&LogEvent::Enqueued {
                seq,
                task: task.clone(),
            })
            .await?;
        state.next_seq += 1;
        state.pending.push_back((seq, task));
        Ok(())
    }

    async fn dequeue(&self) -> PipelineResult<Option<QueuedIndexTask>> {
        let mut state = self.state.lock().await;
        let Some((seq, _)) = state.pending.front() else {
            return Ok(None);
        };
        let seq = *seq;
        if state.pending.len() == 1 {
            // Draining the queue: nothing left worth replaying.
            state.file.set_len(0).await?;
            state.file.sync_data().await?;
        } else {
            state.append(&LogEvent::Dequeued { seq }).await?;
        }
        Ok(state.pending.pop_front().map(|(_, task)| task))
    }

    async fn len(&self) -> PipelineResult<usize> {
        Ok(self.state.lock().await.pending.len())
    }
}

impl std::fmt::Debug for LogIndexScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogIndexScheduler")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

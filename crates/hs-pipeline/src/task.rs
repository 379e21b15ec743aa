use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hs_format::Format;

/// A file waiting to be indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedIndexTask {
    /// File store path of the file.
    pub path: String,
    pub format: Format,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedIndexTask {
    pub fn new(path: impl Into<String>, format: Format) -> Self {
        Self {
            path: path.into(),
            format,
            enqueued_at: Utc::now(),
        }
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cid::ContentId;

/// A byte range of a raw source file in the file store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// File store path, `/`-separated and relative to the store root.
    pub path: String,
    pub offset: u64,
    pub length: u64,
}

impl SourceSpan {
    pub fn new(path: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            length,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{}]", self.path, self.offset, self.end())
    }
}

/// A block identifier plus a hint for where its bytes can be re-derived.
///
/// The pack store is always consulted first (by multihash). The source span,
/// when present, names the slice of a raw file the block was encoded from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub cid: ContentId,
    pub source: Option<SourceSpan>,
}

impl BlockRef {
    pub fn new(cid: ContentId, source: Option<SourceSpan>) -> Self {
        Self { cid, source }
    }

    pub fn packed(cid: ContentId) -> Self {
        Self { cid, source: None }
    }
}

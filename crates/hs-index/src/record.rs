use serde::{Deserialize, Serialize};

use hs_types::{BlockRef, ContentId};

use crate::error::{IndexError, IndexResult};

/// One child of a multiple-level [`IndexRecord::Node`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Link {
    /// A data block, located directly.
    Leaf(BlockRef),
    /// An internal node, resolved through its own `Node` record.
    Subtree(ContentId),
}

impl Link {
    pub fn cid(&self) -> &ContentId {
        match self {
            Self::Leaf(block) => &block.cid,
            Self::Subtree(cid) => cid,
        }
    }
}

/// A persisted record describing where blocks live and how they compose.
///
/// Records are keyed by the multihash of the block they describe. Several
/// records can share a key, for example when both index schemes are in use.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexRecord {
    /// Where a single block lives.
    Blob { block: BlockRef },
    /// Single-level: the root plus every other block of its DAG in pre-order.
    Flat { root: BlockRef, blocks: Vec<BlockRef> },
    /// Multiple-level: one DAG node and its children in link order.
    Node { block: BlockRef, links: Vec<Link> },
}

impl IndexRecord {
    /// The block this record is stored under.
    pub fn block(&self) -> &BlockRef {
        match self {
            Self::Blob { block } | Self::Node { block, .. } => block,
            Self::Flat { root, .. } => root,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Blob { .. } => "blob",
            Self::Flat { .. } => "flat",
            Self::Node { .. } => "node",
        }
    }

    /// Resolution preference: DAG-shaped records first.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Node { .. } => 0,
            Self::Flat { .. } => 1,
            Self::Blob { .. } => 2,
        }
    }

    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> IndexResult<Self> {
        bincode::deserialize(bytes).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    /// Encode and name the record by the BLAKE3 hash of its encoding.
    ///
    /// Identical records get identical names, which makes adds idempotent.
    pub fn encode_named(&self) -> IndexResult<(String, Vec<u8>)> {
        let bytes = self.encode()?;
        let name = blake3::hash(&bytes).to_hex().to_string();
        Ok((name, bytes))
    }
}

//! dag-pb nodes and the UnixFS `Data` message, as prost messages.
//!
//! ```text
//! PBNode { Links = 2 (repeated PBLink), Data = 1 (bytes) }     // Links written first
//! PBLink { Hash = 1 (bytes), Name = 2 (string), Tsize = 3 (uint64) }
//! Data   { Type = 1, Data = 2, filesize = 3, blocksizes = 4 (repeated), hashType = 5, fanout = 6 }
//! ```
//!
//! prost writes fields in tag order, which would put `Data` before `Links`.
//! [`PbNode::to_bytes`] produces the canonical dag-pb order instead.

use hs_types::ContentId;
use prost::Message;

use crate::error::{FormatError, FormatResult};

/// A named, sized link from a dag-pb node to a child block.
#[derive(Clone, PartialEq, Message)]
pub struct PbLink {
    /// Binary CID of the child.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    pub name: Option<String>,
    /// Cumulative encoded size of the child and everything below it.
    #[prost(uint64, optional, tag = "3")]
    pub tsize: Option<u64>,
}

impl PbLink {
    /// An unnamed file link, as UnixFS writes them.
    pub fn new(cid: &ContentId, tsize: u64) -> Self {
        Self {
            hash: Some(cid.to_bytes()),
            name: Some(String::new()),
            tsize: Some(tsize),
        }
    }

    pub fn cid(&self) -> FormatResult<ContentId> {
        let bytes = self
            .hash
            .as_deref()
            .ok_or_else(|| FormatError::malformed("PBLink", "missing Hash"))?;
        Ok(ContentId::from_bytes(bytes)?)
    }
}

/// A dag-pb node: ordered links plus an opaque data payload.
#[derive(Clone, PartialEq, Message)]
pub struct PbNode {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub data: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<PbLink>,
}

impl PbNode {
    /// Canonical encoding: all links, then data.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        for link in &self.links {
            prost::encoding::message::encode(2, link, &mut buf);
        }
        if let Some(data) = &self.data {
            prost::encoding::bytes::encode(1, data, &mut buf);
        }
        buf
    }

    /// Decode a node, requiring every link to carry a hash.
    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        let node =
            Self::decode(data).map_err(|e| FormatError::malformed("PBNode", e.to_string()))?;
        if node.links.iter().any(|link| link.hash.is_none()) {
            return Err(FormatError::malformed("PBLink", "missing Hash"));
        }
        Ok(node)
    }

    /// Child identifiers, in link order.
    pub fn link_cids(&self) -> FormatResult<Vec<ContentId>> {
        self.links.iter().map(PbLink::cid).collect()
    }
}

/// UnixFS node type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum DataType {
    Raw = 0,
    Directory = 1,
    File = 2,
    Metadata = 3,
    Symlink = 4,
    HamtShard = 5,
}

/// The UnixFS `Data` message carried in a dag-pb node's data field.
///
/// `mode` and `mtime` are not modelled; prost skips them on decode.
#[derive(Clone, PartialEq, Message)]
pub struct UnixFsData {
    #[prost(enumeration = "DataType", required, tag = "1")]
    pub data_type: i32,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "3")]
    pub filesize: Option<u64>,
    #[prost(uint64, repeated, packed = "false", tag = "4")]
    pub blocksizes: Vec<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub hash_type: Option<u64>,
    #[prost(uint64, optional, tag = "6")]
    pub fanout: Option<u64>,
}

impl UnixFsData {
    /// A file node whose content lives entirely in its children.
    pub fn file(blocksizes: Vec<u64>) -> Self {
        Self {
            data_type: DataType::File as i32,
            data: None,
            filesize: Some(blocksizes.iter().sum()),
            blocksizes,
            hash_type: None,
            fanout: None,
        }
    }

    pub fn kind(&self) -> FormatResult<DataType> {
        DataType::try_from(self.data_type).map_err(|_| {
            FormatError::malformed("UnixFS Data", format!("unknown type {}", self.data_type))
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        let decoded =
            Self::decode(data).map_err(|e| FormatError::malformed("UnixFS Data", e.to_string()))?;
        decoded.kind()?;
        Ok(decoded)
    }
}

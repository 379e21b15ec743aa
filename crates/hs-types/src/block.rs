use bytes::Bytes;

use crate::cid::{Codec, ContentId};

/// The smallest content-addressed unit: an identifier and the bytes it names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    cid: ContentId,
    bytes: Bytes,
}

impl Block {
    pub fn new(cid: ContentId, bytes: impl Into<Bytes>) -> Self {
        Self {
            cid,
            bytes: bytes.into(),
        }
    }

    /// The synthetic block an identity CID stands for.
    pub fn from_identity(cid: &ContentId) -> Option<Self> {
        if !cid.is_identity() {
            return None;
        }
        let payload = Bytes::copy_from_slice(cid.multihash().digest());
        Some(Self::new(cid.clone(), payload))
    }

    pub fn cid(&self) -> &ContentId {
        &self.cid
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether this block carries file data rather than DAG structure.
    pub fn is_raw(&self) -> bool {
        self.cid.codec() == Codec::Raw
    }

    /// Check that the bytes hash to the identifier.
    pub fn verify(&self) -> bool {
        self.cid.multihash().verify(&self.bytes)
    }
}

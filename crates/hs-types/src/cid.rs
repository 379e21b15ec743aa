use std::fmt;
use std::str::FromStr;

use ::cid::{Cid, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::multihash::Multihash;

/// IPLD codec of a block: how its bytes are to be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Codec {
    /// Opaque bytes.
    Raw,
    /// Protobuf-encoded DAG node (UnixFS).
    DagPb,
    /// Any other multicodec.
    Other(u64),
}

impl Codec {
    pub const RAW_CODE: u64 = 0x55;
    pub const DAG_PB_CODE: u64 = 0x70;

    pub const fn code(&self) -> u64 {
        match self {
            Self::Raw => Self::RAW_CODE,
            Self::DagPb => Self::DAG_PB_CODE,
            Self::Other(code) => *code,
        }
    }

    pub const fn from_code(code: u64) -> Self {
        match code {
            Self::RAW_CODE => Self::Raw,
            Self::DAG_PB_CODE => Self::DagPb,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::DagPb => f.write_str("dag-pb"),
            Self::Other(code) => write!(f, "codec-{code:#x}"),
        }
    }
}

/// Content identifier: a CIDv1 whose multihash uses a supported hash.
///
/// Two identifiers are equal iff codec, hash function, and digest all match.
/// The same multihash may be exposed under different codecs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentId {
    cid: Cid,
    multihash: Multihash,
}

impl ContentId {
    pub fn new(codec: Codec, multihash: Multihash) -> Self {
        Self {
            cid: Cid::new_v1(codec.code(), *multihash.as_raw()),
            multihash,
        }
    }

    /// CID for opaque bytes.
    pub fn raw(multihash: Multihash) -> Self {
        Self::new(Codec::Raw, multihash)
    }

    /// CID for a dag-pb node.
    pub fn dag_pb(multihash: Multihash) -> Self {
        Self::new(Codec::DagPb, multihash)
    }

    /// Raw CID whose digest embeds `payload`.
    pub fn identity(payload: &[u8]) -> Result<Self, TypeError> {
        Ok(Self::raw(Multihash::identity(payload)?))
    }

    pub fn codec(&self) -> Codec {
        Codec::from_code(self.cid.codec())
    }

    pub fn multihash(&self) -> &Multihash {
        &self.multihash
    }

    /// The underlying `cid` crate value, for CAR and wire encoders.
    pub fn as_cid(&self) -> &Cid {
        &self.cid
    }

    pub fn is_identity(&self) -> bool {
        self.multihash.is_identity()
    }

    /// Same multihash under a different codec.
    pub fn with_codec(&self, codec: Codec) -> Self {
        Self::new(codec, self.multihash.clone())
    }

    /// Binary form: `varint(1) varint(codec) multihash`.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.cid.to_bytes()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        let mut rest = data;
        let cid = Cid::read_bytes(&mut rest).map_err(|e| TypeError::InvalidCid(e.to_string()))?;
        if !rest.is_empty() {
            return Err(TypeError::TrailingBytes("CID"));
        }
        Self::try_from(cid)
    }
}

impl TryFrom<Cid> for ContentId {
    type Error = TypeError;

    fn try_from(cid: Cid) -> Result<Self, Self::Error> {
        if cid.version() != Version::V1 {
            return Err(TypeError::UnsupportedVersion(cid.version().into()));
        }
        let multihash = Multihash::from_raw(*cid.hash())?;
        Ok(Self { cid, multihash })
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({self})")
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cid, f)
    }
}

impl FromStr for ContentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cid = Cid::from_str(s).map_err(|e| TypeError::InvalidCid(e.to_string()))?;
        Self::try_from(cid)
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = serde::de::Deserialize::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

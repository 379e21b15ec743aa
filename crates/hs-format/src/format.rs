use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use hs_types::{Block, Multihash};

use crate::dag::BlockDag;
use crate::error::{FormatError, FormatResult};
use crate::unixfs::{UnixFsEncoder, UnixFsOptions};

/// Named file encoding formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    UnixFs,
}

impl Format {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UnixFs => "unixfs",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unixfs" => Ok(Self::UnixFs),
            other => Err(FormatError::UnknownFormat(other.to_string())),
        }
    }
}

/// A configured encoder for one [`Format`].
#[derive(Clone, Debug)]
pub enum FormatEncoder {
    UnixFs(UnixFsEncoder),
}

impl FormatEncoder {
    /// The encoder for `format` with default options.
    pub fn for_format(format: Format) -> Self {
        match format {
            Format::UnixFs => Self::UnixFs(UnixFsEncoder::default()),
        }
    }

    pub fn unixfs(options: UnixFsOptions) -> FormatResult<Self> {
        Ok(Self::UnixFs(UnixFsEncoder::new(options)?))
    }

    pub fn format(&self) -> Format {
        match self {
            Self::UnixFs(_) => Format::UnixFs,
        }
    }

    pub fn encode(&self, data: &[u8]) -> BlockDag {
        match self {
            Self::UnixFs(e) => e.encode(data),
        }
    }

    pub fn derive_block(&self, bytes: &[u8], multihash: &Multihash) -> Option<Block> {
        match self {
            Self::UnixFs(e) => e.derive_block(bytes, multihash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!("unixfs".parse::<Format>().unwrap(), Format::UnixFs);
        assert_eq!(Format::UnixFs.to_string(), "unixfs");
        assert!(matches!(
            "car".parse::<Format>(),
            Err(FormatError::UnknownFormat(name)) if name == "car"
        ));
    }

    #[test]
    fn format_serde_uses_name() {
        assert_eq!(serde_json::to_string(&Format::UnixFs).unwrap(), "\"unixfs\"");
        let parsed: Format = serde_json::from_str("\"unixfs\"").unwrap();
        assert_eq!(parsed, Format::UnixFs);
    }

    #[test]
    fn encoder_dispatch() {
        let encoder = FormatEncoder::for_format(Format::UnixFs);
        assert_eq!(encoder.format(), Format::UnixFs);
        let dag = encoder.encode(b"payload");
        let root = dag.root();
        let derived = encoder
            .derive_block(b"payload", root.cid().multihash())
            .unwrap();
        assert_eq!(derived.cid(), root.cid());
    }
}

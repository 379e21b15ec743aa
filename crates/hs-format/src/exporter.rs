//! Reassemble file content from a UnixFS DAG, verifying every block.

use hs_types::{Block, Codec, ContentId};

use crate::error::{FormatError, FormatResult};
use crate::pb::{DataType, PbNode, UnixFsData};

/// Child links of a block, in order. Raw blocks have none.
pub fn block_links(block: &Block) -> FormatResult<Vec<ContentId>> {
    match block.cid().codec() {
        Codec::Raw => Ok(Vec::new()),
        Codec::DagPb => {
            PbNode::from_bytes(block.bytes())?.link_cids()
        }
        Codec::Other(code) => Err(FormatError::malformed(
            "block",
            format!("unsupported codec 0x{code:x}"),
        )),
    }
}

/// Walks a UnixFS file DAG depth-first and concatenates its content.
pub struct UnixFsExporter<F> {
    fetch: F,
}

impl<F> UnixFsExporter<F>
where
    F: FnMut(&ContentId) -> Option<Block>,
{
    /// `fetch` supplies blocks by CID; identity CIDs never reach it.
    pub fn new(fetch: F) -> Self {
        Self { fetch }
    }

    pub fn export(&mut self, root: &ContentId) -> FormatResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut stack = vec![root.clone()];
        let mut expected_size = None;

        while let Some(cid) = stack.pop() {
            let block = self.load(&cid)?;
            match cid.codec() {
                Codec::Raw => out.extend_from_slice(block.bytes()),
                Codec::DagPb => {
                    let node = PbNode::from_bytes(block.bytes())?;
                    let data = node
                        .data
                        .as_deref()
                        .map(UnixFsData::from_bytes)
                        .transpose()?
                        .ok_or_else(|| FormatError::malformed("UnixFS node", "missing data"))?;
                    let kind = data.kind()?;
                    if !matches!(kind, DataType::File | DataType::Raw) {
                        return Err(FormatError::malformed(
                            "UnixFS node",
                            format!("{kind:?} is not file content"),
                        ));
                    }
                    if &cid == root {
                        expected_size = data.filesize;
                    }
                    if let Some(inline) = &data.data {
                        out.extend_from_slice(inline);
                    }
                    for child in node.link_cids()?.into_iter().rev() {
                        stack.push(child);
                    }
                }
                Codec::Other(code) => {
                    return Err(FormatError::malformed(
                        "block",
                        format!("unsupported codec 0x{code:x}"),
                    ))
                }
            }
        }

        if let Some(size) = expected_size {
            if size != out.len() as u64 {
                return Err(FormatError::Integrity {
                    cid: root.clone(),
                    reason: format!("filesize {size} but content has {} bytes", out.len()),
                });
            }
        }
        Ok(out)
    }

    fn load(&mut self, cid: &ContentId) -> FormatResult<Block> {
        if let Some(block) = Block::from_identity(cid) {
            return Ok(block);
        }
        let block = (self.fetch)(cid).ok_or_else(|| FormatError::MissingBlock(cid.clone()))?;
        if !cid.multihash().verify(block.bytes()) {
            return Err(FormatError::Integrity {
                cid: cid.clone(),
                reason: "bytes do not match multihash".into(),
            });
        }
        Ok(block)
    }
}

//! UnixFS file encoding.
//!
//! Files are split into fixed-size raw leaves which are then grouped, level
//! by level, into dag-pb parents of at most `max_children` links. This is
//! the balanced layout of the ipfs-unixfs-importer with raw leaves: every
//! group gets a parent, a group of one included, and levels are built until
//! a single node remains.
//!
//! The root is always a dag-pb node. A file that fits in a single chunk gets a
//! root with one link, and an empty file gets a root with no links. The
//! importer's default instead reduces a single-chunk file to its raw leaf, so
//! single-chunk root CIDs differ from it while multi-chunk files match.
//!
//! Every internal node's span starts on a group boundary, so encoding exactly
//! the bytes a node covers reproduces that node, or a descendant of it when
//! the node only has single-link parents above one subtree.
//! [`UnixFsEncoder::derive_block`] relies on this to rebuild blocks from the
//! original file.

use serde::{Deserialize, Serialize};

use hs_types::{Block, ContentId, HashAlgorithm, Multihash};

use crate::dag::{BlockDag, DagNode};
use crate::error::{FormatError, FormatResult};
use crate::pb::{PbLink, PbNode, UnixFsData};

/// Default leaf size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 262_144;

/// Default maximum number of links per internal node.
pub const DEFAULT_MAX_CHILDREN: usize = 174;

/// Deeper than any tree a file addressable by `u64` offsets can produce.
const MAX_DEPTH: usize = 64;

/// Tunables for the UnixFS encoder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnixFsOptions {
    pub chunk_size: usize,
    pub max_children: usize,
    pub hash: HashAlgorithm,
}

impl Default for UnixFsOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_children: DEFAULT_MAX_CHILDREN,
            hash: HashAlgorithm::Sha2_256,
        }
    }
}

impl UnixFsOptions {
    pub fn validate(&self) -> FormatResult<()> {
        if self.chunk_size == 0 {
            return Err(FormatError::InvalidOptions("chunk_size must be positive".into()));
        }
        if self.max_children < 2 {
            return Err(FormatError::InvalidOptions(
                "max_children must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// A node under construction. Children are indices into the build arena.
struct Pending {
    block: Block,
    offset: u64,
    length: u64,
    tsize: u64,
    children: Vec<usize>,
}

/// Deterministic UnixFS encoder.
#[derive(Clone, Debug, Default)]
pub struct UnixFsEncoder {
    options: UnixFsOptions,
}

impl UnixFsEncoder {
    pub fn new(options: UnixFsOptions) -> FormatResult<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &UnixFsOptions {
        &self.options
    }

    /// Encode a whole file into its block DAG.
    pub fn encode(&self, data: &[u8]) -> BlockDag {
        let mut arena: Vec<Pending> = Vec::new();

        let mut level: Vec<usize> = Vec::new();
        let mut offset = 0u64;
        for chunk in data.chunks(self.options.chunk_size) {
            let mh = self.options.hash.digest(chunk);
            let length = chunk.len() as u64;
            arena.push(Pending {
                block: Block::new(ContentId::raw(mh), chunk.to_vec()),
                offset,
                length,
                tsize: length,
                children: Vec::new(),
            });
            level.push(arena.len() - 1);
            offset += length;
        }

        let root = if level.is_empty() {
            let node = self.link(&arena, &[]);
            arena.push(node);
            arena.len() - 1
        } else {
            loop {
                let mut next = Vec::with_capacity(level.len().div_ceil(self.options.max_children));
                for group in level.chunks(self.options.max_children) {
                    let node = self.link(&arena, group);
                    arena.push(node);
                    next.push(arena.len() - 1);
                }
                level = next;
                if let [only] = level[..] {
                    break only;
                }
            }
        };

        let mut nodes = Vec::with_capacity(arena.len());
        flatten(&arena, root, &mut nodes);
        tracing::debug!(
            root = %nodes[0].block.cid(),
            bytes = data.len(),
            blocks = nodes.len(),
            "encoded unixfs file"
        );
        BlockDag::from_preorder(nodes)
    }

    /// Rebuild the block named by `multihash` from exactly the source bytes it
    /// covers. Returns `None` when those bytes do not produce that block.
    pub fn derive_block(&self, bytes: &[u8], multihash: &Multihash) -> Option<Block> {
        if multihash.algorithm() != Some(self.options.hash) {
            return None;
        }
        if bytes.len() <= self.options.chunk_size && multihash.verify(bytes) {
            return Some(Block::new(ContentId::raw(multihash.clone()), bytes.to_vec()));
        }

        let dag = self.encode(bytes);
        let length = bytes.len() as u64;
        let mut block = dag.root().block.clone();
        let mut tsize: u64 = dag.walk().map(|n| n.block.len() as u64).sum();
        // A tail node may sit above its subtree through single-link parents.
        for _ in 0..MAX_DEPTH {
            if block.cid().multihash() == multihash {
                return Some(block);
            }
            let (parent, parent_tsize) = self.file_node([(block.cid(), tsize, length)]);
            block = parent;
            tsize = parent_tsize;
        }
        None
    }

    /// Build a dag-pb parent over `children` (arena indices).
    fn link(&self, arena: &[Pending], children: &[usize]) -> Pending {
        let (block, tsize) = self.file_node(
            children
                .iter()
                .map(|&i| (arena[i].block.cid(), arena[i].tsize, arena[i].length)),
        );
        Pending {
            block,
            offset: children.first().map(|&i| arena[i].offset).unwrap_or(0),
            length: children.iter().map(|&i| arena[i].length).sum(),
            tsize,
            children: children.to_vec(),
        }
    }

    /// Encode a file node over `(cid, tsize, length)` children. Returns the
    /// block and its own tsize.
    fn file_node<'a>(
        &self,
        children: impl IntoIterator<Item = (&'a ContentId, u64, u64)>,
    ) -> (Block, u64) {
        let mut links = Vec::new();
        let mut sizes = Vec::new();
        let mut below = 0u64;
        for (cid, tsize, length) in children {
            links.push(PbLink::new(cid, tsize));
            sizes.push(length);
            below += tsize;
        }
        let bytes = PbNode {
            links,
            data: Some(UnixFsData::file(sizes).to_bytes()),
        }
        .to_bytes();

        let tsize = bytes.len() as u64 + below;
        let mh = self.options.hash.digest(&bytes);
        (Block::new(ContentId::dag_pb(mh), bytes), tsize)
    }
}

fn flatten(arena: &[Pending], index: usize, out: &mut Vec<DagNode>) -> usize {
    let position = out.len();
    let pending = &arena[index];
    out.push(DagNode {
        block: pending.block.clone(),
        offset: pending.offset,
        length: pending.length,
        links: Vec::new(),
    });
    let links = pending
        .children
        .iter()
        .map(|&child| flatten(arena, child, out))
        .collect();
    out[position].links = links;
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_types::Codec;
    use rand::{Rng, SeedableRng};

    fn small_encoder() -> UnixFsEncoder {
        UnixFsEncoder::new(UnixFsOptions {
            chunk_size: 4,
            max_children: 3,
            hash: HashAlgorithm::Sha2_256,
        })
        .unwrap()
    }

    fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut data = vec![0u8; len];
        rng.fill(&mut data[..]);
        data
    }

    fn concat_leaves(dag: &BlockDag) -> Vec<u8> {
        dag.leaves().flat_map(|n| n.block.bytes().to_vec()).collect()
    }

    #[test]
    fn empty_file_has_linkless_root() {
        let dag = small_encoder().encode(&[]);
        assert_eq!(dag.len(), 1);
        let root = dag.root();
        assert_eq!(root.cid().codec(), Codec::DagPb);
        assert!(root.links.is_empty());
        assert_eq!(root.length, 0);
        let node = PbNode::from_bytes(root.block.bytes()).unwrap();
        assert!(node.links.is_empty());
        let data = UnixFsData::from_bytes(node.data.as_deref().unwrap()).unwrap();
        assert_eq!(data.filesize, Some(0));
    }

    #[test]
    fn single_chunk_is_wrapped() {
        let dag = small_encoder().encode(b"abc");
        assert_eq!(dag.len(), 2);
        assert_eq!(dag.root().cid().codec(), Codec::DagPb);
        let leaf = dag.get(1).unwrap();
        assert!(leaf.is_leaf());
        assert_eq!(leaf.block.bytes().as_ref(), b"abc");
    }

    #[test]
    fn default_single_chunk_root_is_stable() {
        let encoder = UnixFsEncoder::new(UnixFsOptions::default()).unwrap();
        let a = encoder.encode(b"hello world");
        let b = encoder.encode(b"hello world");
        assert_eq!(a.root_cid(), b.root_cid());
        assert!(a.root_cid().to_string().starts_with("bafybei"));
    }

    #[test]
    fn lone_group_gets_its_own_parent() {
        // 4 chunks, fan-out 3: [l0 l1 l2] -> n0, [l3] -> n1, root [n0, n1]
        let dag = small_encoder().encode(&random_bytes(16, 1));
        let root = dag.root();
        assert_eq!(root.links.len(), 2);
        let children: Vec<_> = dag.children(root).collect();
        assert_eq!(children[0].links.len(), 3);
        assert!(!children[1].is_leaf());
        assert_eq!(children[1].links.len(), 1);
        assert_eq!((children[1].offset, children[1].length), (12, 4));
        let tail: Vec<_> = dag.children(children[1]).collect();
        assert!(tail[0].is_leaf());
        assert_eq!(dag.len(), 7);
    }

    #[test]
    fn single_link_chain_rederives() {
        // 10 chunks, fan-out 3: level 1 is [3 3 3 1], level 2 is [m0, m1(n3)].
        let data = random_bytes(40, 13);
        let encoder = small_encoder();
        let dag = encoder.encode(&data);
        let root = dag.root();
        let m1 = dag.children(root).nth(1).unwrap();
        assert_eq!(m1.links.len(), 1);
        let n3 = dag.children(m1).next().unwrap();
        assert_eq!(n3.links.len(), 1);
        assert_eq!((m1.offset, m1.length), (n3.offset, n3.length));

        for node in [m1, n3] {
            let span = &data[node.offset as usize..(node.offset + node.length) as usize];
            let derived = encoder.derive_block(span, node.cid().multihash()).unwrap();
            assert_eq!(derived.bytes(), node.block.bytes());
        }
    }

    #[test]
    fn leaves_concatenate_to_file() {
        let data = random_bytes(103, 7);
        let dag = small_encoder().encode(&data);
        assert_eq!(concat_leaves(&dag), data);
        assert_eq!(dag.content_len(), 103);
    }

    #[test]
    fn preorder_puts_root_first_and_parents_before_children() {
        let dag = small_encoder().encode(&random_bytes(50, 3));
        for (i, node) in dag.walk().enumerate() {
            for child in &node.links {
                assert!(*child > i);
            }
        }
    }

    #[test]
    fn spans_are_contiguous_within_parents() {
        let dag = small_encoder().encode(&random_bytes(77, 9));
        for node in dag.internal_nodes() {
            let mut cursor = node.offset;
            for child in dag.children(node) {
                assert_eq!(child.offset, cursor);
                cursor += child.length;
            }
            assert_eq!(cursor, node.offset + node.length);
        }
    }

    #[test]
    fn every_block_rederives_from_its_span() {
        let data = random_bytes(97, 11);
        let encoder = small_encoder();
        let dag = encoder.encode(&data);
        for node in dag.walk() {
            let span = &data[node.offset as usize..(node.offset + node.length) as usize];
            let derived = encoder
                .derive_block(span, node.cid().multihash())
                .expect("block derives from its span");
            assert_eq!(derived.cid(), node.cid());
            assert_eq!(derived.bytes(), node.block.bytes());
        }
    }

    #[test]
    fn derive_rejects_wrong_bytes() {
        let encoder = small_encoder();
        let dag = encoder.encode(b"abcdefgh");
        assert!(encoder
            .derive_block(b"abcdefgX", dag.root_cid().multihash())
            .is_none());
    }

    #[test]
    fn tsize_accounts_for_subtree() {
        let dag = small_encoder().encode(&random_bytes(10, 5));
        let root = PbNode::from_bytes(dag.root().block.bytes()).unwrap();
        let total: u64 = root.links.iter().map(|l| l.tsize.unwrap()).sum();
        let leaf_bytes: u64 = dag.leaves().map(|n| n.block.len() as u64).sum();
        let inner_bytes: u64 = dag
            .internal_nodes()
            .skip(1)
            .map(|n| n.block.len() as u64)
            .sum();
        assert_eq!(total, leaf_bytes + inner_bytes);
    }

    #[test]
    fn invalid_options_rejected() {
        let zero = UnixFsOptions {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            UnixFsEncoder::new(zero),
            Err(FormatError::InvalidOptions(_))
        ));
        let narrow = UnixFsOptions {
            max_children: 1,
            ..Default::default()
        };
        assert!(UnixFsEncoder::new(narrow).is_err());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: UnixFsOptions = serde_json::from_str(r#"{"chunk_size": 1024}"#).unwrap();
        assert_eq!(opts.chunk_size, 1024);
        assert_eq!(opts.max_children, DEFAULT_MAX_CHILDREN);
        assert_eq!(opts.hash, HashAlgorithm::Sha2_256);
    }
}

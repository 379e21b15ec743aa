//! In-memory result of encoding a file: every block of the DAG plus the
//! byte range of the source each block covers.

use hs_types::{Block, ContentId, SourceSpan};

/// One block of an encoded DAG.
#[derive(Clone, Debug)]
pub struct DagNode {
    pub block: Block,
    /// Offset of the first source byte this block covers.
    pub offset: u64,
    /// Number of source bytes this block covers.
    pub length: u64,
    /// Indices of child nodes, in link order. Empty for leaves.
    pub links: Vec<usize>,
}

impl DagNode {
    pub fn cid(&self) -> &ContentId {
        self.block.cid()
    }

    pub fn is_leaf(&self) -> bool {
        self.links.is_empty() && self.block.is_raw()
    }

    /// The source span of this block within the file at `path`.
    pub fn span(&self, path: &str) -> SourceSpan {
        SourceSpan::new(path, self.offset, self.length)
    }
}

/// A block DAG stored in depth-first pre-order, root at index 0.
///
/// Duplicate content (for example two identical chunks) appears once per
/// position in the tree, so `len()` counts positions, not distinct blocks.
#[derive(Clone, Debug)]
pub struct BlockDag {
    nodes: Vec<DagNode>,
}

impl BlockDag {
    pub(crate) fn from_preorder(nodes: Vec<DagNode>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self { nodes }
    }

    pub fn root(&self) -> &DagNode {
        &self.nodes[0]
    }

    pub fn root_cid(&self) -> &ContentId {
        self.root().cid()
    }

    pub fn get(&self, index: usize) -> Option<&DagNode> {
        self.nodes.get(index)
    }

    /// Children of `node`, in link order.
    pub fn children<'a>(&'a self, node: &'a DagNode) -> impl Iterator<Item = &'a DagNode> + 'a {
        node.links.iter().map(move |i| &self.nodes[*i])
    }

    /// All nodes in pre-order.
    pub fn walk(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.iter()
    }

    /// Raw leaves in file order.
    pub fn leaves(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Internal (dag-pb) nodes in pre-order.
    pub fn internal_nodes(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.iter().filter(|n| !n.is_leaf())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total source bytes covered by the root.
    pub fn content_len(&self) -> u64 {
        self.root().length
    }
}

//! In-memory storage of the search tree's internal nodes.
//!
//! The tree file starts with a little-endian `u32` node count followed by
//! the fixed-size node records, root first. Two storages implement random
//! access over that array: one that owns a vector read from the file, and
//! one that borrows a caller-provided memory-mapped region for indexes
//! shared across processes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::rtree_constants::BRANCHING_FACTOR;
use super::rtree_types::{RTreeError, RTreeResult, TreeNode};

/// Random access to the packed tree-node array. Root is at index 0; the
/// array is immutable once constructed.
pub trait NodeStorage {
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, id: u32) -> &TreeNode;
}

/// Node array owned by the index, read in full from the tree file.
pub struct OwnedNodes {
    nodes: Vec<TreeNode>,
}

impl OwnedNodes {
    /// Reads and decodes the whole tree file.
    pub fn from_file(path: &Path) -> RTreeResult<Self> {
        if !path.exists() {
            return Err(RTreeError::MissingFile(path.to_path_buf()));
        }
        let file_len = std::fs::metadata(path)?.len();
        if file_len == 0 {
            return Err(RTreeError::EmptyFile(path.to_path_buf()));
        }

        let mut reader = BufReader::new(File::open(path)?);
        let node_count = reader.read_u32::<LittleEndian>()?;
        let expected_len = 4 + node_count as u64 * TreeNode::ENCODED_SIZE as u64;
        if node_count == 0 || file_len != expected_len {
            return Err(RTreeError::Corruption(format!(
                "tree file is {} bytes, {} declared nodes require {}",
                file_len, node_count, expected_len
            )));
        }

        let mut nodes = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            nodes.push(TreeNode::from_reader(&mut reader)?);
        }
        Ok(OwnedNodes { nodes })
    }

    pub(crate) fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        OwnedNodes { nodes }
    }

    pub(crate) fn as_slice(&self) -> &[TreeNode] {
        &self.nodes
    }
}

impl NodeStorage for OwnedNodes {
    fn len(&self) -> u32 {
        self.nodes.len() as u32
    }

    fn node(&self, id: u32) -> &TreeNode {
        &self.nodes[id as usize]
    }
}

/// Node array borrowed from a caller-provided memory-mapped region; the
/// storage lives no longer than the mapping.
pub struct MappedNodes<'a> {
    nodes: &'a [TreeNode],
}

impl<'a> MappedNodes<'a> {
    /// Borrows an already-decoded node slice.
    pub fn from_slice(nodes: &'a [TreeNode]) -> Self {
        MappedNodes { nodes }
    }

    /// Borrows `len` nodes starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` properly aligned `TreeNode` records that
    /// stay valid and unmodified for `'a`. The record layout equals the tree
    /// file's byte layout, which is little-endian; on a big-endian host use
    /// [`OwnedNodes::from_file`] instead.
    pub unsafe fn from_raw_parts(ptr: *const TreeNode, len: usize) -> Self {
        MappedNodes {
            nodes: std::slice::from_raw_parts(ptr, len),
        }
    }
}

impl NodeStorage for MappedNodes<'_> {
    fn len(&self) -> u32 {
        self.nodes.len() as u32
    }

    fn node(&self, id: u32) -> &TreeNode {
        &self.nodes[id as usize]
    }
}

/// Persists the node array: `u32` count, then the records.
pub(crate) fn write_node_file(path: &Path, nodes: &[TreeNode]) -> RTreeResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_u32::<LittleEndian>(nodes.len() as u32)?;
    for node in nodes {
        node.write_to(&mut writer)?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Structural validation of a freshly opened tree against its leaf file.
///
/// Checks that every child reference stays in range: page indices within the
/// leaf file, node indices within the array and strictly below their parent
/// (the build lays the array out root first, so references always point
/// forward).
pub(crate) fn validate_tree(nodes: &[TreeNode], page_count: u64) -> RTreeResult<()> {
    for (id, node) in nodes.iter().enumerate() {
        let child_count = node.child_count() as usize;
        if child_count == 0 || child_count > BRANCHING_FACTOR {
            return Err(RTreeError::Corruption(format!(
                "node {} declares {} children, fan-out is {}",
                id, child_count, BRANCHING_FACTOR
            )));
        }
        if node.child_is_on_disk() {
            if child_count != 1 {
                return Err(RTreeError::Corruption(format!(
                    "leaf node {} declares {} children",
                    id, child_count
                )));
            }
            if node.children[0] as u64 >= page_count {
                return Err(RTreeError::Corruption(format!(
                    "node {} references leaf page {} of {}",
                    id, node.children[0], page_count
                )));
            }
        } else {
            for &child in &node.children[..child_count] {
                if child as usize >= nodes.len() || child as usize <= id {
                    return Err(RTreeError::Corruption(format!(
                        "node {} references node {} in a tree of {}",
                        id, child, nodes.len()
                    )));
                }
            }
        }
    }
    Ok(())
}

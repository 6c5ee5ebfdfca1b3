//! Core types for the static R-tree: error kinds, the packed tree-node
//! record, the fixed-size leaf page, and the priority-queue candidates used
//! by the best-first searches.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use super::rectangle::RectangleInt2D;
use super::rtree_constants::{BRANCHING_FACTOR, LEAF_NODE_SIZE};
use crate::edge::EdgeData;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building, opening, or querying the index.
#[derive(Debug, Error)]
pub enum RTreeError {
    #[error("index file {} does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("index file {} is empty", .0.display())]
    EmptyFile(PathBuf),

    #[error("leaf read failed after retry: {0}")]
    ReadFailure(io::Error),

    #[error("corrupt index: {0}")]
    Corruption(String),

    #[error("cannot build an r-tree over zero segments")]
    EmptyTree,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for R-tree operations.
pub type RTreeResult<T> = Result<T, RTreeError>;

// ============================================================================
// Tree Nodes
// ============================================================================

/// One fixed-size record of the in-memory search tree.
///
/// The `packed` word carries `child_is_on_disk` in its most significant bit
/// and `child_count` in the low 31 bits, exactly as stored on disk. When the
/// flag is set the node references a leaf page and `children[0]` is a page
/// index into the leaf file; otherwise `children[..child_count]` index into
/// the tree-node array itself.
///
/// The struct layout mirrors the on-disk record byte for byte so that a
/// memory-mapped tree file can be used directly on little-endian hosts.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TreeNode {
    pub minimum_bounding_rectangle: RectangleInt2D,
    packed: u32,
    pub children: [u32; BRANCHING_FACTOR],
}

const CHILD_COUNT_MASK: u32 = 0x7FFF_FFFF;
const ON_DISK_FLAG: u32 = 0x8000_0000;

impl Default for TreeNode {
    fn default() -> Self {
        TreeNode {
            minimum_bounding_rectangle: RectangleInt2D::default(),
            packed: 0,
            children: [0; BRANCHING_FACTOR],
        }
    }
}

impl TreeNode {
    /// Size of one record on the wire, in bytes.
    pub const ENCODED_SIZE: usize = RectangleInt2D::ENCODED_SIZE + 4 + 4 * BRANCHING_FACTOR;

    /// Number of children stored in this node.
    pub fn child_count(&self) -> u32 {
        self.packed & CHILD_COUNT_MASK
    }

    /// Whether this node references a leaf page instead of tree nodes.
    pub fn child_is_on_disk(&self) -> bool {
        self.packed & ON_DISK_FLAG != 0
    }

    pub(crate) fn set_child_count(&mut self, count: u32) {
        debug_assert!(count <= CHILD_COUNT_MASK);
        self.packed = (self.packed & ON_DISK_FLAG) | (count & CHILD_COUNT_MASK);
    }

    pub(crate) fn set_child_is_on_disk(&mut self, on_disk: bool) {
        if on_disk {
            self.packed |= ON_DISK_FLAG;
        } else {
            self.packed &= !ON_DISK_FLAG;
        }
    }

    pub(crate) fn write_to(&self, mut wtr: impl Write) -> io::Result<()> {
        self.minimum_bounding_rectangle.write_to(&mut wtr)?;
        wtr.write_u32::<LittleEndian>(self.packed)?;
        for child in &self.children {
            wtr.write_u32::<LittleEndian>(*child)?;
        }
        Ok(())
    }

    pub(crate) fn from_reader(mut rdr: impl Read) -> io::Result<Self> {
        let minimum_bounding_rectangle = RectangleInt2D::from_reader(&mut rdr)?;
        let packed = rdr.read_u32::<LittleEndian>()?;
        let mut children = [0u32; BRANCHING_FACTOR];
        for child in children.iter_mut() {
            *child = rdr.read_u32::<LittleEndian>()?;
        }
        Ok(TreeNode {
            minimum_bounding_rectangle,
            packed,
            children,
        })
    }
}

// ============================================================================
// Leaf Pages
// ============================================================================

/// One leaf page holding up to [`LEAF_NODE_SIZE`] segment records.
///
/// On disk a page always occupies [`LeafPage::ENCODED_SIZE`] bytes; slots
/// past `object_count` are padding whose content is indeterminate and never
/// read back. In memory only the populated records are kept.
#[derive(Debug, Clone, Default)]
pub struct LeafPage {
    pub object_count: u32,
    pub objects: Vec<EdgeData>,
}

impl LeafPage {
    /// On-disk stride of one page, in bytes.
    pub const ENCODED_SIZE: usize = 4 + LEAF_NODE_SIZE * EdgeData::ENCODED_SIZE;

    pub(crate) fn write_to(&self, mut wtr: impl Write) -> io::Result<()> {
        debug_assert!(self.objects.len() == self.object_count as usize);
        wtr.write_u32::<LittleEndian>(self.object_count)?;
        for edge in &self.objects {
            edge.write_to(&mut wtr)?;
        }
        // Pad unused slots so every page has the same stride.
        let padding = (LEAF_NODE_SIZE - self.objects.len()) * EdgeData::ENCODED_SIZE;
        wtr.write_all(&vec![0u8; padding])?;
        Ok(())
    }

    /// Decodes a page, reading only the populated records.
    pub(crate) fn from_slice(buffer: &[u8]) -> RTreeResult<Self> {
        let mut rdr = buffer;
        let object_count = rdr.read_u32::<LittleEndian>()?;
        if object_count as usize > LEAF_NODE_SIZE {
            return Err(RTreeError::Corruption(format!(
                "leaf page declares {} objects, page capacity is {}",
                object_count, LEAF_NODE_SIZE
            )));
        }
        let mut objects = Vec::with_capacity(object_count as usize);
        for _ in 0..object_count {
            objects.push(EdgeData::from_reader(&mut rdr)?);
        }
        Ok(LeafPage {
            object_count,
            objects,
        })
    }
}

// ============================================================================
// Queue Candidates
// ============================================================================

/// Tree-node candidate for the branch-and-bound queries, keyed by the MBR
/// lower bound to the query location.
///
/// `std::collections::BinaryHeap` is a max-heap, so the ordering is inverted
/// to pop the smallest bound first. Distances are finite by construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueryCandidate {
    pub min_dist: f32,
    pub node_id: u32,
}

impl QueryCandidate {
    pub fn new(min_dist: f32, node_id: u32) -> Self {
        QueryCandidate { min_dist, node_id }
    }
}

impl PartialEq for QueryCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.min_dist == other.min_dist
    }
}

impl Eq for QueryCandidate {}

impl PartialOrd for QueryCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueryCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .min_dist
            .partial_cmp(&self.min_dist)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Heterogeneous entry of the incremental query queue: either a tree node
/// keyed by its MBR lower bound, or a segment keyed by its exact
/// perpendicular distance.
///
/// Keeping both in one queue is what yields results in true nearest-first
/// order: any undiscovered object is at least as far as every un-popped
/// entry's key.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CandidateEntry {
    Node(u32),
    Segment(EdgeData),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IncrementalCandidate {
    pub min_dist: f32,
    pub entry: CandidateEntry,
}

impl IncrementalCandidate {
    pub fn new(min_dist: f32, entry: CandidateEntry) -> Self {
        IncrementalCandidate { min_dist, entry }
    }
}

impl PartialEq for IncrementalCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.min_dist == other.min_dist
    }
}

impl Eq for IncrementalCandidate {}

impl PartialOrd for IncrementalCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IncrementalCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .min_dist
            .partial_cmp(&self.min_dist)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

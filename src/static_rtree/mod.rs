//! Static packed Hilbert R-tree.
//!
//! The index is laid out in two files: a compact array of internal tree
//! nodes that stays resident (or memory-mapped), and fixed-size leaf pages
//! of segment records read from disk on demand. Construction packs the tree
//! bottom-up over a Hilbert ordering of the input; queries run best-first
//! traversals over the node rectangles' distance bounds.

pub mod builder;
pub mod leaf_storage;
pub mod node_storage;
pub mod rectangle;
pub mod rtree_constants;
pub mod rtree_impl;
pub mod rtree_types;

pub use leaf_storage::{LeafStorage, LeafWriter};
pub use node_storage::{MappedNodes, NodeStorage, OwnedNodes};
pub use rectangle::RectangleInt2D;
pub use rtree_constants::{
    BRANCHING_FACTOR, DEFAULT_MAX_CHECKED_SEGMENTS, LEAF_NODE_SIZE, TINY_COMPONENT_ZOOM,
};
pub use rtree_impl::StaticRTree;
pub use rtree_types::{LeafPage, RTreeError, RTreeResult, TreeNode};

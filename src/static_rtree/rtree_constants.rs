//! Constants for the static packed R-tree.

/// Fan-out of internal tree nodes.
pub const BRANCHING_FACTOR: usize = 64;

/// Maximum number of segment records per leaf page.
pub const LEAF_NODE_SIZE: usize = 1024;

/// Zoom levels at or below this filter out tiny-component segments.
pub const TINY_COMPONENT_ZOOM: u32 = 14;

/// Default fuse for the incremental queries: stop after inspecting this many
/// candidate segments.
pub const DEFAULT_MAX_CHECKED_SEGMENTS: usize = 4 * LEAF_NODE_SIZE;

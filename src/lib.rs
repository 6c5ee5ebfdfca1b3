//! # roadtree - static packed Hilbert R-tree for road networks
//!
//! A read-only geospatial index over directed road segments. The tree is
//! bulk-loaded once with the Kamel–Faloutsos packing algorithm (sort by
//! Hilbert index, pack bottom-up with a fixed fan-out) and then serves
//! nearest-neighbour queries: the closest segment endpoint, the nearest
//! segment as a routable phantom node, and the incremental k-nearest
//! segments via Hjaltason–Samet distance browsing.
//!
//! ## Layout
//!
//! - **Internal nodes** live in a compact in-memory array (root at index 0),
//!   loaded from the tree file or borrowed from a memory mapping shared
//!   across processes.
//! - **Leaf pages** hold the segment records in fixed-size on-disk pages,
//!   read on demand with one file handle per querying thread.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roadtree::{EdgeData, FixedPointCoordinate, StaticRTree};
//!
//! # fn main() -> roadtree::RTreeResult<()> {
//! let coordinates = Arc::new(vec![
//!     FixedPointCoordinate::new(0, 0),
//!     FixedPointCoordinate::new(0, 10_000_000),
//! ]);
//! let segments = vec![EdgeData { u: 0, v: 1, ..EdgeData::default() }];
//!
//! let tree = StaticRTree::build(
//!     &segments,
//!     coordinates.clone(),
//!     "map.ramIndex".as_ref(),
//!     "map.fileIndex".as_ref(),
//! )?;
//!
//! let nearest = tree.find_phantom_nodes_incremental(
//!     FixedPointCoordinate::new(500_000, 5_000_000),
//!     18,
//!     3,
//!     None,
//! )?;
//! println!("{} segments nearby", nearest.len());
//! # Ok(())
//! # }
//! ```

pub mod coordinate;
pub mod edge;
pub mod hilbert;
pub mod phantom;
pub mod static_rtree;

pub use coordinate::{
    epsilon_equal, lat_to_mercator_y, mercator_y_to_lat, perpendicular_distance,
    FixedPointCoordinate, Projection, COORDINATE_PRECISION,
};
pub use edge::{EdgeData, TravelMode, SPECIAL_NODEID, TRAVEL_MODE_INACCESSIBLE};
pub use hilbert::hilbert_index;
pub use phantom::PhantomNode;
pub use static_rtree::{
    MappedNodes, NodeStorage, OwnedNodes, RTreeError, RTreeResult, RectangleInt2D, StaticRTree,
    TreeNode, BRANCHING_FACTOR, DEFAULT_MAX_CHECKED_SEGMENTS, LEAF_NODE_SIZE,
    TINY_COMPONENT_ZOOM,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

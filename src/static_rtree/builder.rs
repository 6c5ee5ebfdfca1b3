//! Bulk loading: packs a static R-tree with the Kamel–Faloutsos algorithm.
//!
//! Segments are ordered along a Hilbert curve over their Mercator-projected
//! centroids, packed into full leaf pages in that order, and the tree is
//! then grown bottom-up with a fixed fan-out. The result is balanced by
//! construction: all leaves sit at the same depth and only the trailing node
//! of each level may be under-full.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;

use super::leaf_storage::LeafWriter;
use super::node_storage::write_node_file;
use super::rectangle::RectangleInt2D;
use super::rtree_constants::{BRANCHING_FACTOR, LEAF_NODE_SIZE};
use super::rtree_types::{LeafPage, RTreeError, RTreeResult, TreeNode};
use crate::coordinate::{lat_to_mercator_y, FixedPointCoordinate, COORDINATE_PRECISION};
use crate::edge::EdgeData;
use crate::hilbert::hilbert_index;

#[derive(Debug, Clone, Copy)]
struct WrappedInputElement {
    hilbert_value: u64,
    array_index: u32,
}

/// Builds the tree over `segments`, writing the leaf file and the tree file,
/// and returns the finished node array (root at index 0).
pub(crate) fn build_tree(
    segments: &[EdgeData],
    coordinates: &[FixedPointCoordinate],
    tree_path: &Path,
    leaf_path: &Path,
) -> RTreeResult<Vec<TreeNode>> {
    if segments.is_empty() {
        return Err(RTreeError::EmptyTree);
    }

    log::debug!(
        "constructing r-tree over {} segments on top of {} coordinates",
        segments.len(),
        coordinates.len()
    );
    let construction_start = Instant::now();

    // Hilbert value of every segment's Mercator-projected centroid.
    let mut wrapped: Vec<WrappedInputElement> = segments
        .par_iter()
        .enumerate()
        .map(|(index, edge)| {
            let mut centroid = EdgeData::centroid(
                coordinates[edge.u as usize],
                coordinates[edge.v as usize],
            );
            centroid.lat = (COORDINATE_PRECISION
                * lat_to_mercator_y(centroid.lat as f64 / COORDINATE_PRECISION))
                as i32;
            WrappedInputElement {
                hilbert_value: hilbert_index(centroid),
                array_index: index as u32,
            }
        })
        .collect();

    wrapped.par_sort_unstable_by_key(|element| element.hilbert_value);

    // Pack sorted segments into leaf pages, one placeholder tree node per
    // page carrying the page's bounding rectangle.
    let mut writer = LeafWriter::create(leaf_path, segments.len() as u64)?;
    let mut tree_nodes_in_level: Vec<TreeNode> =
        Vec::with_capacity(segments.len().div_ceil(LEAF_NODE_SIZE));

    for chunk in wrapped.chunks(LEAF_NODE_SIZE) {
        let mut page = LeafPage {
            object_count: chunk.len() as u32,
            objects: Vec::with_capacity(chunk.len()),
        };
        let mut rectangle = RectangleInt2D::default();
        for element in chunk {
            let edge = segments[element.array_index as usize];
            rectangle.extend_with(coordinates[edge.u as usize]);
            rectangle.extend_with(coordinates[edge.v as usize]);
            page.objects.push(edge);
        }

        let mut node = TreeNode::default();
        node.minimum_bounding_rectangle = rectangle;
        node.set_child_is_on_disk(true);
        node.set_child_count(1);
        node.children[0] = tree_nodes_in_level.len() as u32;

        writer.append(&page)?;
        tree_nodes_in_level.push(node);
    }
    let page_count = writer.finish()?;

    // Grow the tree bottom-up: group consecutive level-k nodes under
    // level-k+1 parents until a single root remains.
    let mut search_tree: Vec<TreeNode> = Vec::new();
    while tree_nodes_in_level.len() > 1 {
        let mut next_level =
            Vec::with_capacity(tree_nodes_in_level.len().div_ceil(BRANCHING_FACTOR));
        for group in tree_nodes_in_level.chunks(BRANCHING_FACTOR) {
            let mut parent = TreeNode::default();
            for (slot, child) in group.iter().enumerate() {
                parent.children[slot] = search_tree.len() as u32;
                search_tree.push(*child);
                parent
                    .minimum_bounding_rectangle
                    .merge(&child.minimum_bounding_rectangle);
            }
            parent.set_child_count(group.len() as u32);
            next_level.push(parent);
        }
        tree_nodes_in_level = next_level;
    }
    search_tree.push(tree_nodes_in_level[0]);

    // Reverse so the root lands at index 0, then renumber the node-to-node
    // references. Page references are left alone.
    search_tree.reverse();
    let tree_size = search_tree.len() as u32;
    search_tree.par_iter_mut().for_each(|node| {
        if node.child_is_on_disk() {
            return;
        }
        for slot in 0..node.child_count() as usize {
            node.children[slot] = tree_size - 1 - node.children[slot];
        }
    });

    write_node_file(tree_path, &search_tree)?;

    log::debug!(
        "finished r-tree construction: {} nodes over {} leaf pages in {:.3}s",
        search_tree.len(),
        page_count,
        construction_start.elapsed().as_secs_f64()
    );

    Ok(search_tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_rtree::node_storage::validate_tree;
    use tempfile::tempdir;

    /// Segments laid out on a coarse grid, one segment per grid cell.
    fn grid_fixture(count: usize) -> (Vec<EdgeData>, Vec<FixedPointCoordinate>) {
        let mut coordinates = Vec::with_capacity(count * 2);
        let mut segments = Vec::with_capacity(count);
        let columns = (count as f64).sqrt().ceil() as usize;
        for i in 0..count {
            let lat = ((i / columns) as i32) * 20_000;
            let lon = ((i % columns) as i32) * 20_000;
            let u = coordinates.len() as u32;
            coordinates.push(FixedPointCoordinate::new(lat, lon));
            coordinates.push(FixedPointCoordinate::new(lat + 10_000, lon + 10_000));
            segments.push(EdgeData {
                u,
                v: u + 1,
                name_id: i as u32,
                ..EdgeData::default()
            });
        }
        (segments, coordinates)
    }

    fn build_fixture(count: usize) -> (Vec<TreeNode>, Vec<EdgeData>, Vec<FixedPointCoordinate>) {
        let dir = tempdir().unwrap();
        let (segments, coordinates) = grid_fixture(count);
        let tree = build_tree(
            &segments,
            &coordinates,
            &dir.path().join("tree.ramIndex"),
            &dir.path().join("tree.fileIndex"),
        )
        .unwrap();
        (tree, segments, coordinates)
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let dir = tempdir().unwrap();
        let result = build_tree(
            &[],
            &[],
            &dir.path().join("tree.ramIndex"),
            &dir.path().join("tree.fileIndex"),
        );
        assert!(matches!(result, Err(RTreeError::EmptyTree)));
        assert!(!dir.path().join("tree.fileIndex").exists());
    }

    #[test]
    fn test_single_page_tree_is_one_leaf_root() {
        let (tree, _, _) = build_fixture(10);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].child_is_on_disk());
        assert_eq!(tree[0].child_count(), 1);
        assert_eq!(tree[0].children[0], 0);
    }

    #[test]
    fn test_root_rectangle_covers_every_endpoint() {
        let (tree, segments, coordinates) = build_fixture(5_000);
        let root = &tree[0].minimum_bounding_rectangle;
        for edge in &segments {
            assert!(root.contains(coordinates[edge.u as usize]));
            assert!(root.contains(coordinates[edge.v as usize]));
        }
    }

    #[test]
    fn test_internal_rectangles_are_exact_child_unions() {
        let (tree, _, _) = build_fixture(5_000);
        for node in &tree {
            if node.child_is_on_disk() {
                continue;
            }
            let mut union = RectangleInt2D::default();
            for &child in &node.children[..node.child_count() as usize] {
                union.merge(&tree[child as usize].minimum_bounding_rectangle);
            }
            assert_eq!(union, node.minimum_bounding_rectangle);
        }
    }

    #[test]
    fn test_children_point_forward_after_renumbering() {
        let (tree, _, _) = build_fixture(5_000);
        for (id, node) in tree.iter().enumerate() {
            if node.child_is_on_disk() {
                continue;
            }
            for &child in &node.children[..node.child_count() as usize] {
                assert!(child as usize > id);
            }
        }
        assert!(validate_tree(&tree, 5_000u64.div_ceil(LEAF_NODE_SIZE as u64)).is_ok());
    }

    #[test]
    fn test_leaf_pages_cover_all_segments_once() {
        use crate::static_rtree::leaf_storage::LeafStorage;

        let dir = tempdir().unwrap();
        let (segments, coordinates) = grid_fixture(3_000);
        build_tree(
            &segments,
            &coordinates,
            &dir.path().join("tree.ramIndex"),
            &dir.path().join("tree.fileIndex"),
        )
        .unwrap();

        let storage = LeafStorage::open(&dir.path().join("tree.fileIndex")).unwrap();
        assert_eq!(storage.element_count(), 3_000);

        let mut seen = vec![false; 3_000];
        let mut total = 0u64;
        for page_index in 0..storage.page_count() {
            let page = storage.load_leaf(page_index as u32).unwrap();
            total += page.object_count as u64;
            for edge in &page.objects {
                assert!(!seen[edge.name_id as usize]);
                seen[edge.name_id as usize] = true;
            }
        }
        assert_eq!(total, storage.element_count());
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_fan_out_boundary_grows_two_levels_above_leaves() {
        // One segment more than a single full level of full leaves.
        let count = BRANCHING_FACTOR * LEAF_NODE_SIZE + 1;
        let (tree, _, _) = build_fixture(count);

        let leaf_count = count.div_ceil(LEAF_NODE_SIZE);
        let mid_count = leaf_count.div_ceil(BRANCHING_FACTOR);
        assert_eq!(tree.len(), 1 + mid_count + leaf_count);

        // Root fans out over the intermediate level, which fans out over
        // leaf-referencing nodes.
        assert!(!tree[0].child_is_on_disk());
        assert_eq!(tree[0].child_count() as usize, mid_count);
        for &mid in &tree[0].children[..tree[0].child_count() as usize] {
            let mid_node = &tree[mid as usize];
            assert!(!mid_node.child_is_on_disk());
            for &leaf in &mid_node.children[..mid_node.child_count() as usize] {
                assert!(tree[leaf as usize].child_is_on_disk());
            }
        }
        assert!(validate_tree(&tree, leaf_count as u64).is_ok());
    }
}

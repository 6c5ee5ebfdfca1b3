//! The static R-tree: construction entry points and the best-first queries.
//!
//! All traversals are driven by a min-ordered priority queue of lower
//! bounds. The single-result queries use branch-and-bound with
//! MINDIST/MINMAXDIST pruning; the incremental queries use Hjaltason–Samet
//! distance browsing over a queue that mixes tree nodes and segments.

use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::Arc;

use super::builder::build_tree;
use super::leaf_storage::LeafStorage;
use super::node_storage::{validate_tree, MappedNodes, NodeStorage, OwnedNodes};
use super::rtree_constants::{DEFAULT_MAX_CHECKED_SEGMENTS, TINY_COMPONENT_ZOOM};
use super::rtree_types::{
    CandidateEntry, IncrementalCandidate, QueryCandidate, RTreeResult, TreeNode,
};
use crate::coordinate::{epsilon_equal, perpendicular_distance, FixedPointCoordinate};
use crate::edge::EdgeData;
use crate::phantom::PhantomNode;

/// A static, packed Hilbert R-tree over directed road segments.
///
/// Built once from a full dataset, then served read-only: internal nodes
/// stay resident in memory (owned or memory-mapped), leaf pages are read
/// from disk on demand. The coordinate table is shared with the caller and
/// never mutated.
///
/// Multiple threads may query one shared instance concurrently; each thread
/// uses its own leaf-file handle and no locks are taken on the query path.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use roadtree::{EdgeData, FixedPointCoordinate, StaticRTree};
///
/// # fn main() -> roadtree::RTreeResult<()> {
/// let coordinates = Arc::new(vec![
///     FixedPointCoordinate::new(0, 0),
///     FixedPointCoordinate::new(0, 10_000_000),
/// ]);
/// let segments = vec![EdgeData { u: 0, v: 1, ..EdgeData::default() }];
///
/// let tree = StaticRTree::build(
///     &segments,
///     coordinates,
///     "map.ramIndex".as_ref(),
///     "map.fileIndex".as_ref(),
/// )?;
///
/// let query = FixedPointCoordinate::new(1_000_000, 5_000_000);
/// let phantom = tree.find_phantom_node(query, 18)?;
/// assert!(phantom.is_some());
/// # Ok(())
/// # }
/// ```
pub struct StaticRTree<S: NodeStorage = OwnedNodes> {
    search_tree: S,
    leaf_storage: LeafStorage,
    coordinates: Arc<Vec<FixedPointCoordinate>>,
}

impl StaticRTree<OwnedNodes> {
    /// Builds the index from scratch, writing the tree file and the leaf
    /// file, and returns the ready-to-query instance.
    pub fn build(
        segments: &[EdgeData],
        coordinates: Arc<Vec<FixedPointCoordinate>>,
        tree_path: &Path,
        leaf_path: &Path,
    ) -> RTreeResult<Self> {
        let nodes = build_tree(segments, &coordinates, tree_path, leaf_path)?;
        let leaf_storage = LeafStorage::open(leaf_path)?;
        Ok(StaticRTree {
            search_tree: OwnedNodes::from_nodes(nodes),
            leaf_storage,
            coordinates,
        })
    }

    /// Opens a previously built index, loading the tree file into memory.
    pub fn open(
        tree_path: &Path,
        leaf_path: &Path,
        coordinates: Arc<Vec<FixedPointCoordinate>>,
    ) -> RTreeResult<Self> {
        let nodes = OwnedNodes::from_file(tree_path)?;
        let leaf_storage = LeafStorage::open(leaf_path)?;
        validate_tree(nodes.as_slice(), leaf_storage.page_count())?;
        Ok(StaticRTree {
            search_tree: nodes,
            leaf_storage,
            coordinates,
        })
    }
}

impl<'a> StaticRTree<MappedNodes<'a>> {
    /// Attaches to a tree-node array borrowed from a memory mapping shared
    /// across processes. The leaf file is still read per thread.
    pub fn from_mapped(
        nodes: &'a [TreeNode],
        leaf_path: &Path,
        coordinates: Arc<Vec<FixedPointCoordinate>>,
    ) -> RTreeResult<Self> {
        let leaf_storage = LeafStorage::open(leaf_path)?;
        validate_tree(nodes, leaf_storage.page_count())?;
        Ok(StaticRTree {
            search_tree: MappedNodes::from_slice(nodes),
            leaf_storage,
            coordinates,
        })
    }
}

impl<S: NodeStorage> StaticRTree<S> {
    /// Number of segments in the index.
    pub fn element_count(&self) -> u64 {
        self.leaf_storage.element_count()
    }

    /// Finds the endpoint of the segment closest to `input_coordinate` by
    /// endpoint distance.
    ///
    /// At zoom levels of [`TINY_COMPONENT_ZOOM`] and below, segments in tiny
    /// connected components are ignored.
    pub fn locate_closest_endpoint(
        &self,
        input_coordinate: FixedPointCoordinate,
        zoom_level: u32,
    ) -> RTreeResult<Option<FixedPointCoordinate>> {
        let ignore_tiny_components = zoom_level <= TINY_COMPONENT_ZOOM;

        let mut min_dist = f32::MAX;
        let mut min_max_dist = f32::MAX;
        let mut result_coordinate = None;

        let mut traversal_queue = BinaryHeap::new();
        traversal_queue.push(QueryCandidate::new(0.0, 0));

        while let Some(current_query_node) = traversal_queue.pop() {
            let prune_downward = current_query_node.min_dist >= min_max_dist;
            let prune_upward = current_query_node.min_dist >= min_dist;
            if prune_downward || prune_upward {
                continue;
            }

            let current_tree_node = self.search_tree.node(current_query_node.node_id);
            if current_tree_node.child_is_on_disk() {
                let leaf = self.leaf_storage.load_leaf(current_tree_node.children[0])?;
                for current_edge in &leaf.objects {
                    if ignore_tiny_components && current_edge.is_in_tiny_cc {
                        continue;
                    }
                    for endpoint in [current_edge.u, current_edge.v] {
                        let coordinate = self.coordinates[endpoint as usize];
                        let distance = FixedPointCoordinate::approx_euclidean_distance(
                            input_coordinate,
                            coordinate,
                        );
                        if distance < min_dist {
                            min_dist = distance;
                            result_coordinate = Some(coordinate);
                        }
                    }
                }
            } else {
                min_max_dist = self.explore_tree_node(
                    current_tree_node,
                    input_coordinate,
                    min_dist,
                    min_max_dist,
                    &mut traversal_queue,
                );
            }
        }

        Ok(result_coordinate)
    }

    /// Finds the segment nearest to `input_coordinate` by perpendicular
    /// distance and returns its phantom node at the foot point.
    pub fn find_phantom_node(
        &self,
        input_coordinate: FixedPointCoordinate,
        zoom_level: u32,
    ) -> RTreeResult<Option<PhantomNode>> {
        let ignore_tiny_components = zoom_level <= TINY_COMPONENT_ZOOM;

        let mut min_dist = f32::MAX;
        let mut min_max_dist = f32::MAX;
        let mut result: Option<(PhantomNode, EdgeData)> = None;

        let mut traversal_queue = BinaryHeap::new();
        traversal_queue.push(QueryCandidate::new(0.0, 0));

        while let Some(current_query_node) = traversal_queue.pop() {
            let prune_downward = current_query_node.min_dist > min_max_dist;
            let prune_upward = current_query_node.min_dist > min_dist;
            if prune_downward || prune_upward {
                continue;
            }

            let current_tree_node = self.search_tree.node(current_query_node.node_id);
            if current_tree_node.child_is_on_disk() {
                let leaf = self.leaf_storage.load_leaf(current_tree_node.children[0])?;
                for current_edge in &leaf.objects {
                    if ignore_tiny_components && current_edge.is_in_tiny_cc {
                        continue;
                    }
                    let projection = perpendicular_distance(
                        self.coordinates[current_edge.u as usize],
                        self.coordinates[current_edge.v as usize],
                        input_coordinate,
                    );
                    // A new candidate wins only on a strict, non-epsilon
                    // improvement, so effectively equal segments cannot make
                    // the result oscillate between runs.
                    if projection.distance < min_dist
                        && !epsilon_equal(projection.distance, min_dist)
                    {
                        min_dist = projection.distance;
                        result = Some((
                            PhantomNode::from_segment(current_edge, projection.foot),
                            *current_edge,
                        ));
                    }
                }
            } else {
                min_max_dist = self.explore_tree_node(
                    current_tree_node,
                    input_coordinate,
                    min_dist,
                    min_max_dist,
                    &mut traversal_queue,
                );
            }
        }

        Ok(result.map(|(mut phantom, nearest_edge)| {
            phantom.snap_to_input(input_coordinate);
            phantom.split_weights(
                self.coordinates[nearest_edge.u as usize],
                self.coordinates[nearest_edge.v as usize],
            );
            phantom
        }))
    }

    /// Returns up to `number_of_results` phantom nodes in nearest-first
    /// order.
    ///
    /// Results are balanced between component classes: each class stops
    /// contributing once it has produced `number_of_results` entries. The
    /// search gives up after `max_checked_segments` candidate segments
    /// (default [`DEFAULT_MAX_CHECKED_SEGMENTS`]), which bounds latency on
    /// adversarial inputs. The zoom level is accepted for symmetry with the
    /// single-result queries and not otherwise consulted.
    pub fn find_phantom_nodes_incremental(
        &self,
        input_coordinate: FixedPointCoordinate,
        _zoom_level: u32,
        number_of_results: usize,
        max_checked_segments: Option<usize>,
    ) -> RTreeResult<Vec<PhantomNode>> {
        Ok(self
            .incremental_search(input_coordinate, number_of_results, max_checked_segments)?
            .into_iter()
            .map(|(phantom, _)| phantom)
            .collect())
    }

    /// Like [`StaticRTree::find_phantom_nodes_incremental`], additionally
    /// carrying each result's perpendicular distance.
    pub fn find_phantom_nodes_with_distance(
        &self,
        input_coordinate: FixedPointCoordinate,
        _zoom_level: u32,
        number_of_results: usize,
        max_checked_segments: Option<usize>,
    ) -> RTreeResult<Vec<(PhantomNode, f64)>> {
        Ok(self
            .incremental_search(input_coordinate, number_of_results, max_checked_segments)?
            .into_iter()
            .map(|(phantom, distance)| (phantom, distance as f64))
            .collect())
    }

    /// Hjaltason–Samet distance browsing.
    ///
    /// The queue mixes tree nodes (keyed by their rectangle's MINDIST, a
    /// lower bound on anything inside) and segments (keyed by their exact
    /// perpendicular distance). Popping in key order therefore yields
    /// segments in true nearest-first order: any undiscovered object is at
    /// least as far as every un-popped entry.
    fn incremental_search(
        &self,
        input_coordinate: FixedPointCoordinate,
        number_of_results: usize,
        max_checked_segments: Option<usize>,
    ) -> RTreeResult<Vec<(PhantomNode, f32)>> {
        let max_checked_segments =
            max_checked_segments.unwrap_or(DEFAULT_MAX_CHECKED_SEGMENTS);

        let mut results = Vec::new();
        if number_of_results == 0 {
            return Ok(results);
        }

        let mut min_found_distances = vec![f32::MAX; number_of_results];
        let mut results_found_in_big_cc = 0usize;
        let mut results_found_in_tiny_cc = 0usize;
        let mut inspected_segments = 0usize;

        let mut traversal_queue = BinaryHeap::new();
        traversal_queue.push(IncrementalCandidate::new(0.0, CandidateEntry::Node(0)));

        while let Some(current_query_node) = traversal_queue.pop() {
            let current_min_dist = min_found_distances[number_of_results - 1];
            if current_query_node.min_dist > current_min_dist {
                continue;
            }

            match current_query_node.entry {
                CandidateEntry::Node(node_id) => {
                    let current_tree_node = self.search_tree.node(node_id);
                    if current_tree_node.child_is_on_disk() {
                        let leaf =
                            self.leaf_storage.load_leaf(current_tree_node.children[0])?;
                        // Every object enters the queue with its exact
                        // distance; upper bounds here would break the
                        // nearest-first ordering.
                        for current_edge in &leaf.objects {
                            let projection = perpendicular_distance(
                                self.coordinates[current_edge.u as usize],
                                self.coordinates[current_edge.v as usize],
                                input_coordinate,
                            );
                            if projection.distance < current_min_dist {
                                traversal_queue.push(IncrementalCandidate::new(
                                    projection.distance,
                                    CandidateEntry::Segment(*current_edge),
                                ));
                            }
                        }
                    } else {
                        for slot in 0..current_tree_node.child_count() as usize {
                            let child_id = current_tree_node.children[slot];
                            let child_rectangle =
                                &self.search_tree.node(child_id).minimum_bounding_rectangle;
                            let lower_bound = child_rectangle.min_dist(input_coordinate);
                            if lower_bound < current_min_dist {
                                traversal_queue.push(IncrementalCandidate::new(
                                    lower_bound,
                                    CandidateEntry::Node(child_id),
                                ));
                            }
                        }
                    }
                }
                CandidateEntry::Segment(current_segment) => {
                    inspected_segments += 1;

                    // Neither component class may contribute more than the
                    // requested number of results.
                    if results_found_in_big_cc == number_of_results
                        && !current_segment.is_in_tiny_cc
                    {
                        continue;
                    }
                    if results_found_in_tiny_cc == number_of_results
                        && current_segment.is_in_tiny_cc
                    {
                        continue;
                    }

                    let projection = perpendicular_distance(
                        self.coordinates[current_segment.u as usize],
                        self.coordinates[current_segment.v as usize],
                        input_coordinate,
                    );
                    if projection.distance < current_min_dist
                        && !epsilon_equal(projection.distance, current_min_dist)
                    {
                        let mut phantom =
                            PhantomNode::from_segment(&current_segment, projection.foot);
                        phantom.snap_to_input(input_coordinate);
                        phantom.split_weights(
                            self.coordinates[current_segment.u as usize],
                            self.coordinates[current_segment.v as usize],
                        );
                        results.push((phantom, projection.distance));

                        if current_segment.is_in_tiny_cc {
                            results_found_in_tiny_cc += 1;
                        } else {
                            min_found_distances[results_found_in_big_cc] =
                                projection.distance;
                            results_found_in_big_cc += 1;
                        }
                    }
                }
            }

            if results_found_in_big_cc == number_of_results
                || inspected_segments >= max_checked_segments
            {
                traversal_queue.clear();
            }
        }

        Ok(results)
    }

    /// Expands one internal node: pushes every child whose lower bound can
    /// still beat both the best object seen and the tightest MINMAXDIST,
    /// and returns the tightened MINMAXDIST.
    fn explore_tree_node(
        &self,
        parent: &TreeNode,
        input_coordinate: FixedPointCoordinate,
        min_dist: f32,
        min_max_dist: f32,
        traversal_queue: &mut BinaryHeap<QueryCandidate>,
    ) -> f32 {
        let mut new_min_max_dist = min_max_dist;
        for slot in 0..parent.child_count() as usize {
            let child_id = parent.children[slot];
            let child_rectangle = &self.search_tree.node(child_id).minimum_bounding_rectangle;
            let lower_bound = child_rectangle.min_dist(input_coordinate);
            let upper_bound = child_rectangle.min_max_dist(input_coordinate);
            new_min_max_dist = new_min_max_dist.min(upper_bound);
            if lower_bound > new_min_max_dist {
                continue;
            }
            if lower_bound > min_dist {
                continue;
            }
            traversal_queue.push(QueryCandidate::new(lower_bound, child_id));
        }
        new_min_max_dist
    }
}

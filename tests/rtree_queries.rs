//! End-to-end query scenarios over small hand-built road networks.

use std::sync::Arc;

use roadtree::{
    EdgeData, FixedPointCoordinate, StaticRTree, COORDINATE_PRECISION, SPECIAL_NODEID,
};
use tempfile::{tempdir, TempDir};

fn coord(lat: f64, lon: f64) -> FixedPointCoordinate {
    FixedPointCoordinate::new(
        (lat * COORDINATE_PRECISION) as i32,
        (lon * COORDINATE_PRECISION) as i32,
    )
}

fn build(
    segments: &[EdgeData],
    coordinates: Arc<Vec<FixedPointCoordinate>>,
) -> (StaticRTree, TempDir) {
    let dir = tempdir().unwrap();
    let tree = StaticRTree::build(
        segments,
        coordinates,
        &dir.path().join("net.ramIndex"),
        &dir.path().join("net.fileIndex"),
    )
    .unwrap();
    (tree, dir)
}

/// One segment along the equator from lon 0 to lon 10; both weights 100.
fn single_segment() -> (Vec<EdgeData>, Arc<Vec<FixedPointCoordinate>>) {
    let coordinates = Arc::new(vec![coord(0.0, 0.0), coord(0.0, 10.0)]);
    let segments = vec![EdgeData {
        u: 0,
        v: 1,
        forward_edge_based_node_id: 1,
        reverse_edge_based_node_id: 2,
        forward_weight: 100,
        reverse_weight: 100,
        ..EdgeData::default()
    }];
    (segments, coordinates)
}

#[test]
fn projects_onto_segment_midpoint_and_halves_weights() {
    let (segments, coordinates) = single_segment();
    let (tree, _dir) = build(&segments, coordinates);

    // One degree north of the segment's midpoint.
    let query = FixedPointCoordinate::new(1_000_000, 5_000_000);
    let phantom = tree.find_phantom_node(query, 18).unwrap().unwrap();

    assert_eq!(phantom.location, FixedPointCoordinate::new(0, 5_000_000));
    assert_eq!(phantom.forward_weight, 50);
    assert_eq!(phantom.reverse_weight, 50);
}

#[test]
fn exact_endpoint_hit_keeps_sentinel_weight() {
    let coordinates = Arc::new(vec![coord(0.0, 0.0), coord(0.0, 10.0)]);
    let segments = vec![EdgeData {
        u: 0,
        v: 1,
        forward_edge_based_node_id: SPECIAL_NODEID,
        reverse_edge_based_node_id: 2,
        forward_weight: 100,
        reverse_weight: 100,
        ..EdgeData::default()
    }];
    let (tree, _dir) = build(&segments, coordinates);

    let query = FixedPointCoordinate::new(0, 0);
    let phantom = tree.find_phantom_node(query, 18).unwrap().unwrap();

    // The foot point is the start endpoint itself. The sentinel forward id
    // keeps its weight; the reverse weight is scaled by 1 - ratio = 1.
    assert_eq!(phantom.location, FixedPointCoordinate::new(0, 0));
    assert_eq!(phantom.forward_weight, 100);
    assert_eq!(phantom.reverse_weight, 100);
}

/// Four parallel segments at increasing latitudes, lon 0 to 10 each.
fn parallel_segments() -> (Vec<EdgeData>, Arc<Vec<FixedPointCoordinate>>) {
    let mut coordinates = Vec::new();
    let mut segments = Vec::new();
    for (i, lat) in [0, 1_000_000, 2_000_000, 3_000_000].into_iter().enumerate() {
        let u = coordinates.len() as u32;
        coordinates.push(FixedPointCoordinate::new(lat, 0));
        coordinates.push(FixedPointCoordinate::new(lat, 10_000_000));
        segments.push(EdgeData {
            u,
            v: u + 1,
            name_id: i as u32,
            forward_edge_based_node_id: i as u32,
            reverse_edge_based_node_id: i as u32,
            forward_weight: 100,
            reverse_weight: 100,
            ..EdgeData::default()
        });
    }
    (segments, Arc::new(coordinates))
}

#[test]
fn k_nearest_returns_closest_segments_in_distance_order() {
    let (segments, coordinates) = parallel_segments();
    let (tree, _dir) = build(&segments, coordinates);

    let query = FixedPointCoordinate::new(500_000, 5_000_000);
    let results = tree
        .find_phantom_nodes_with_distance(query, 18, 3, None)
        .unwrap();

    assert_eq!(results.len(), 3);
    let mut names: Vec<u32> = results.iter().map(|(p, _)| p.name_id).collect();
    names.sort_unstable();
    assert_eq!(names, vec![0, 1, 2]);
    for pair in results.windows(2) {
        assert!(pair[0].1 <= pair[1].1);
    }
    // The farthest segment never makes it into the result set.
    assert!(results.iter().all(|(p, _)| p.name_id != 3));
}

#[test]
fn tiny_component_filter_follows_zoom_level() {
    let coordinates = Arc::new(vec![
        FixedPointCoordinate::new(100, 0),
        FixedPointCoordinate::new(100, 10_000_000),
        FixedPointCoordinate::new(500, 0),
        FixedPointCoordinate::new(500, 10_000_000),
    ]);
    let segments = vec![
        EdgeData {
            u: 0,
            v: 1,
            name_id: 0,
            is_in_tiny_cc: true,
            ..EdgeData::default()
        },
        EdgeData {
            u: 2,
            v: 3,
            name_id: 1,
            ..EdgeData::default()
        },
    ];
    let (tree, _dir) = build(&segments, coordinates);

    let query = FixedPointCoordinate::new(0, 0);

    // At low zoom the tiny component is filtered out despite being closer.
    let low = tree.find_phantom_node(query, 10).unwrap().unwrap();
    assert_eq!(low.name_id, 1);

    let high = tree.find_phantom_node(query, 18).unwrap().unwrap();
    assert_eq!(high.name_id, 0);

    // The endpoint query applies the same filter.
    let endpoint = tree.locate_closest_endpoint(query, 10).unwrap().unwrap();
    assert_eq!(endpoint.lat, 500);
    let endpoint = tree.locate_closest_endpoint(query, 18).unwrap().unwrap();
    assert_eq!(endpoint.lat, 100);
}

#[test]
fn incremental_balances_component_classes() {
    let mut coordinates = Vec::new();
    let mut segments = Vec::new();
    // Three tiny-component segments close to the query, three big ones
    // farther out.
    for (i, (lat, tiny)) in [
        (100, true),
        (200, true),
        (300, true),
        (10_000, false),
        (20_000, false),
        (30_000, false),
    ]
    .into_iter()
    .enumerate()
    {
        let u = coordinates.len() as u32;
        coordinates.push(FixedPointCoordinate::new(lat, 0));
        coordinates.push(FixedPointCoordinate::new(lat, 1_000_000));
        segments.push(EdgeData {
            u,
            v: u + 1,
            name_id: i as u32,
            is_in_tiny_cc: tiny,
            ..EdgeData::default()
        });
    }
    let (tree, _dir) = build(&segments, Arc::new(coordinates));

    let results = tree
        .find_phantom_nodes_incremental(FixedPointCoordinate::new(0, 500_000), 18, 2, None)
        .unwrap();

    // Each component class contributes at most k results, and the search
    // runs until it has k from the big class.
    let tiny = results
        .iter()
        .filter(|p| p.name_id < 3)
        .count();
    let big = results.len() - tiny;
    assert_eq!(tiny, 2);
    assert_eq!(big, 2);
}

#[test]
fn reopened_index_returns_identical_results() {
    let (segments, coordinates) = parallel_segments();
    let dir = tempdir().unwrap();
    let tree_path = dir.path().join("net.ramIndex");
    let leaf_path = dir.path().join("net.fileIndex");

    let query = FixedPointCoordinate::new(500_000, 5_000_000);

    let built =
        StaticRTree::build(&segments, coordinates.clone(), &tree_path, &leaf_path).unwrap();
    let fresh = built
        .find_phantom_nodes_with_distance(query, 18, 3, None)
        .unwrap();
    drop(built);

    let reopened = StaticRTree::open(&tree_path, &leaf_path, coordinates).unwrap();
    assert_eq!(reopened.element_count(), 4);
    let replayed = reopened
        .find_phantom_nodes_with_distance(query, 18, 3, None)
        .unwrap();

    assert_eq!(fresh.len(), replayed.len());
    for ((a, da), (b, db)) in fresh.iter().zip(replayed.iter()) {
        assert_eq!(a, b);
        assert_eq!(da, db);
    }
}

#[test]
fn queries_straddling_leaf_pages() {
    // Enough segments to span several leaf pages, laid out on a line so the
    // expected winner is unambiguous.
    let count = 3 * roadtree::LEAF_NODE_SIZE + 17;
    let mut coordinates = Vec::new();
    let mut segments = Vec::new();
    for i in 0..count {
        let lon = (i as i32) * 10_000;
        let u = coordinates.len() as u32;
        coordinates.push(FixedPointCoordinate::new(0, lon));
        coordinates.push(FixedPointCoordinate::new(0, lon + 8_000));
        segments.push(EdgeData {
            u,
            v: u + 1,
            name_id: i as u32,
            ..EdgeData::default()
        });
    }
    let (tree, _dir) = build(&segments, Arc::new(coordinates));

    // Right above the middle of segment 2000.
    let target = 2_000;
    let query = FixedPointCoordinate::new(50_000, target as i32 * 10_000 + 4_000);
    let phantom = tree.find_phantom_node(query, 18).unwrap().unwrap();
    assert_eq!(phantom.name_id, target as u32);
}

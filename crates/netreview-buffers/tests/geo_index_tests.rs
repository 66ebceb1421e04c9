//! Spatial index tests

use netreview_buffers::{Bounds, BufferType, GeoIndex, GeoIndexBuilder, Position, Segment};
use proptest::prelude::*;

fn build_points(points: &[(f64, f64)]) -> Vec<u8> {
    let mut builder = GeoIndexBuilder::new(points.len());
    for &(x, y) in points {
        builder.add_point(Position::new(x, y));
    }
    builder.finalize(BufferType::Array).as_bytes().to_vec()
}

fn build_boxes(boxes: &[Bounds]) -> Vec<u8> {
    let mut builder = GeoIndexBuilder::new(boxes.len());
    for b in boxes {
        builder.add(*b);
    }
    builder.finalize(BufferType::Array).as_bytes().to_vec()
}

fn grid(n: usize) -> Vec<(f64, f64)> {
    (0..n * n).map(|i| ((i % n) as f64, (i / n) as f64)).collect()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_empty_index_is_queryable() {
    let bytes = build_points(&[]);
    assert_eq!(bytes.len(), 8);

    let index = GeoIndex::from_bytes(&bytes).unwrap();
    assert!(index.is_empty());
    assert!(index.extent().is_none());
    assert!(index
        .search(&Bounds::new(f64::MIN, f64::MIN, f64::MAX, f64::MAX))
        .is_empty());
    assert!(index.neighbors(Position::new(0.0, 0.0), 5, f64::INFINITY).is_empty());
}

#[test]
fn test_zero_length_buffer_reads_as_empty_index() {
    let index = GeoIndex::from_bytes(&[]).unwrap();
    assert_eq!(index.len(), 0);
}

#[test]
fn test_truncated_payload_is_rejected() {
    let bytes = build_points(&grid(5));
    assert!(GeoIndex::from_bytes(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn test_extent_covers_all_items() {
    let bytes = build_points(&grid(10));
    let index = GeoIndex::from_bytes(&bytes).unwrap();
    assert_eq!(index.len(), 100);
    assert_eq!(index.extent(), Some(Bounds::new(0.0, 0.0, 9.0, 9.0)));
}

// ============================================================================
// Range Search
// ============================================================================

#[test]
fn test_search_returns_items_in_box() {
    let bytes = build_points(&grid(10));
    let index = GeoIndex::from_bytes(&bytes).unwrap();

    let mut found = index.search(&Bounds::new(2.0, 3.0, 3.0, 4.0));
    found.sort_unstable();
    // (2,3) (3,3) (2,4) (3,4)
    assert_eq!(found, vec![32, 33, 42, 43]);
}

#[test]
fn test_search_filter_is_applied_per_candidate() {
    let bytes = build_points(&grid(10));
    let index = GeoIndex::from_bytes(&bytes).unwrap();

    let mut found = index.search_with(&Bounds::new(0.0, 0.0, 9.0, 0.0), |i| i % 2 == 0);
    found.sort_unstable();
    assert_eq!(found, vec![0, 2, 4, 6, 8]);
}

#[test]
fn test_search_segments_by_bbox() {
    let segments = [
        Segment::new(Position::new(0.0, 0.0), Position::new(0.0, 10.0)),
        Segment::new(Position::new(-5.0, 5.0), Position::new(5.0, 5.0)),
        Segment::new(Position::new(20.0, 20.0), Position::new(30.0, 20.0)),
    ];
    let mut builder = GeoIndexBuilder::new(segments.len());
    for s in &segments {
        builder.add_segment(s);
    }
    let data = builder.finalize(BufferType::Shared);
    let index = GeoIndex::from_bytes(&data).unwrap();

    let mut found = index.search(&segments[0].bounds());
    found.sort_unstable();
    assert_eq!(found, vec![0, 1]);
}

// ============================================================================
// Nearest Neighbors
// ============================================================================

#[test]
fn test_neighbors_sorted_by_distance() {
    let bytes = build_points(&grid(10));
    let index = GeoIndex::from_bytes(&bytes).unwrap();

    let found = index.neighbors(Position::new(4.1, 4.0), 3, f64::INFINITY);
    assert_eq!(found.len(), 3);
    assert_eq!(found[0], 44);
    assert_eq!(found[1], 45);
    // (4,3) and (4,5) tie for third
    assert!(found[2] == 34 || found[2] == 54);
}

#[test]
fn test_neighbors_respects_max_distance() {
    let bytes = build_points(&[(0.0, 0.0), (1.0, 0.0), (5.0, 5.0)]);
    let index = GeoIndex::from_bytes(&bytes).unwrap();

    assert_eq!(index.neighbors(Position::new(0.2, 0.0), 10, 0.5), vec![0]);
    assert!(index.neighbors(Position::new(3.0, 3.0), 1, 0.5).is_empty());
    // Boundary distance is inclusive.
    assert_eq!(index.neighbors(Position::new(0.0, 0.5), 1, 0.5), vec![0]);
}

#[test]
fn test_neighbors_zero_results_requested() {
    let bytes = build_points(&grid(3));
    let index = GeoIndex::from_bytes(&bytes).unwrap();
    assert!(index.neighbors(Position::new(0.0, 0.0), 0, f64::INFINITY).is_empty());
}

// ============================================================================
// Properties
// ============================================================================

fn box_strategy() -> impl Strategy<Value = Bounds> {
    (-100.0f64..100.0, -100.0f64..100.0, 0.0f64..10.0, 0.0f64..10.0)
        .prop_map(|(x, y, w, h)| Bounds::new(x, y, x + w, y + h))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn search_matches_brute_force(
        boxes in prop::collection::vec(box_strategy(), 0..300),
        query in box_strategy(),
    ) {
        let bytes = build_boxes(&boxes);
        let index = GeoIndex::from_bytes(&bytes).unwrap();

        let mut actual = index.search(&query);
        actual.sort_unstable();
        let expected: Vec<u32> = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(&query))
            .map(|(i, _)| i as u32)
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn nearest_neighbor_is_the_closest_point(
        points in prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0), 1..200),
        probe in (-60.0f64..60.0, -60.0f64..60.0),
    ) {
        let bytes = build_points(&points);
        let index = GeoIndex::from_bytes(&bytes).unwrap();

        let found = index.neighbors(Position::new(probe.0, probe.1), 1, f64::INFINITY);
        prop_assert_eq!(found.len(), 1);

        let dist = |&(x, y): &(f64, f64)| (x - probe.0).powi(2) + (y - probe.1).powi(2);
        let best = points.iter().map(dist).fold(f64::INFINITY, f64::min);
        prop_assert_eq!(dist(&points[found[0] as usize]), best);
    }
}

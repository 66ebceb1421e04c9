//! Buffer builder/view tests

use approx::assert_relative_eq;
use netreview_buffers::*;

// ============================================================================
// Fixed-Size Buffers
// ============================================================================

#[test]
fn test_positions_buffer() {
    let positions = [
        Position::new(-3.7038, 40.4168),
        Position::new(2.1734, 41.3851),
        Position::new(-0.3763, 39.4699),
    ];

    let mut builder = FixedSizeBufferBuilder::<PositionCodec>::new(3, BufferType::Array);
    for p in &positions {
        builder.add(p);
    }
    let data = builder.finalize();
    assert_eq!(data.len(), 4 + 3 * 16);
    assert_eq!(data.buffer_type(), BufferType::Array);

    let view = FixedSizeBufferView::<PositionCodec>::new(&data);
    assert_eq!(view.len(), 3);
    assert_eq!(view.get(1), positions[1]);
    assert_relative_eq!(view.get(2).lat, 39.4699);
}

#[test]
fn test_bounds_and_connections_buffers() {
    let mut bounds = FixedSizeBufferBuilder::<BoundsCodec>::new(1, BufferType::Shared);
    bounds.add(&Bounds::new(-1.0, -2.0, 3.0, 4.0));
    let bounds = bounds.finalize();
    assert_eq!(bounds.buffer_type(), BufferType::Shared);
    assert_eq!(
        FixedSizeBufferView::<BoundsCodec>::new(&bounds).get(0),
        Bounds::new(-1.0, -2.0, 3.0, 4.0)
    );

    let mut connections = FixedSizeBufferBuilder::<LinkConnectionsCodec>::new(2, BufferType::Array);
    connections.add(&[0, 1]);
    connections.add(&[1, 2]);
    let connections = connections.finalize();
    assert_eq!(connections.len(), 4 + 2 * 8);

    let view = FixedSizeBufferView::<LinkConnectionsCodec>::new(&connections);
    assert_eq!(view.iter().collect::<Vec<_>>(), vec![[0, 1], [1, 2]]);
}

#[test]
fn test_enumerate_yields_index_value_pairs() {
    let mut builder = FixedSizeBufferBuilder::<TypeCodec>::new(3, BufferType::Array);
    builder.add(&2);
    builder.add(&0);
    builder.add(&1);
    let data = builder.finalize();

    let view = FixedSizeBufferView::<TypeCodec>::new(&data);
    let pairs: Vec<(usize, u8)> = view.enumerate().collect();
    assert_eq!(pairs, vec![(0, 2), (1, 0), (2, 1)]);
}

#[test]
fn test_zero_capacity_buffer_has_header_only() {
    let data = FixedSizeBufferBuilder::<IdCodec>::new(0, BufferType::Array).finalize();
    assert_eq!(data.len(), 4);
    assert_eq!(decode_count(&data), 0);
    assert!(FixedSizeBufferView::<IdCodec>::new(&data).is_empty());
}

#[test]
#[should_panic(expected = "out of bounds")]
fn test_view_get_out_of_range_panics() {
    let mut builder = FixedSizeBufferBuilder::<IdCodec>::new(1, BufferType::Array);
    builder.add(&5);
    let data = builder.finalize();
    FixedSizeBufferView::<IdCodec>::new(&data).get(1);
}

// ============================================================================
// Variable-Size Buffers
// ============================================================================

#[test]
fn test_ids_list_buffer_random_access() {
    let lists: Vec<Vec<u32>> = vec![vec![0, 1], vec![], vec![4, 5, 6]];
    let total: usize = lists.iter().map(|l| IdsListCodec::encoded_size(l)).sum();

    let mut builder = VariableSizeBufferBuilder::<IdsListCodec>::new(3, total, BufferType::Array);
    for list in &lists {
        builder.add(list);
    }
    let buffer = builder.finalize();

    // header + (4+8) + 4 + (4+12)
    assert_eq!(buffer.data.len(), 4 + 12 + 4 + 16);
    assert_eq!(buffer.index.len(), 3 * 4);

    let view = VariableSizeBufferView::<IdsListCodec>::new(&buffer);
    assert_eq!(view.len(), 3);
    assert_eq!(view.get(2).to_vec(), vec![4, 5, 6]);
    assert!(view.get(1).is_empty());
    assert_eq!(view.get(0).to_vec(), vec![0, 1]);
    assert!(view.try_get(3).is_none());

    let collected: Vec<Vec<u32>> = view.iter().map(|l| l.to_vec()).collect();
    assert_eq!(collected, lists);
}

#[test]
fn test_unrequested_variable_buffer_is_empty() {
    let buffer = VariableSizeBufferBuilder::<IdsListCodec>::new(0, 0, BufferType::Shared).finalize();
    let view = VariableSizeBufferView::<IdsListCodec>::new(&buffer);
    assert!(view.is_empty());
    assert_eq!(view.iter().count(), 0);
}

#[test]
#[should_panic(expected = "exceeds buffer capacity")]
fn test_variable_builder_rejects_extra_records() {
    let mut builder = VariableSizeBufferBuilder::<IdsListCodec>::new(1, 8, BufferType::Array);
    builder.add(&[1]);
    builder.add(&[2]);
}

// ============================================================================
// Id Mapper
// ============================================================================

#[test]
fn test_id_mapper_assigns_dense_indices() {
    let mut mapper = IdMapper::new();
    assert_eq!(mapper.get_or_assign_idx(42u64), 0);
    assert_eq!(mapper.get_or_assign_idx(7u64), 1);
    assert_eq!(mapper.get_or_assign_idx(42u64), 0);

    assert_eq!(mapper.count(), 2);
    assert_eq!(mapper.get_idx(&7), Some(1));
    assert_eq!(mapper.get_idx(&8), None);
    assert_eq!(mapper.get_id(1), Some(7));
    assert_eq!(mapper.into_lookup(), vec![42, 7]);
}

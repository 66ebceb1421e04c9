//! Typed read-only accessors over encoded review buffers.

use netreview_buffers::{
    Bounds, BoundsCodec, FixedSizeBufferView, GeoIndex, IdCodec, IdList, IdsListCodec,
    LinkConnectionsCodec, Position, PositionCodec, Segment, SegmentCodec, TypeCodec,
    VariableSizeBufferView,
};

use crate::encoder::{HydraulicModelBuffers, UNASSIGNED_INDEX};
use crate::error::Result;
use crate::model::{LinkType, NodeType};

/// Views over every buffer of one bundle. Spatial indices are parsed up front
/// so a malformed bundle fails before any check starts.
pub struct HydraulicModelBuffersView<'a> {
    pub node_positions: FixedSizeBufferView<'a, PositionCodec>,
    pub node_types: FixedSizeBufferView<'a, TypeCodec>,
    pub node_connections: VariableSizeBufferView<'a, IdsListCodec>,
    pub node_geo_index: GeoIndex<'a>,
    pub link_connections: FixedSizeBufferView<'a, LinkConnectionsCodec>,
    pub link_bounds: FixedSizeBufferView<'a, BoundsCodec>,
    pub link_types: FixedSizeBufferView<'a, TypeCodec>,
    pub pipe_segment_ids: FixedSizeBufferView<'a, IdCodec>,
    pub pipe_segment_coordinates: FixedSizeBufferView<'a, SegmentCodec>,
    pub pipe_segments_geo_index: GeoIndex<'a>,
}

impl<'a> HydraulicModelBuffersView<'a> {
    pub fn new(buffers: &'a HydraulicModelBuffers) -> Result<Self> {
        Ok(Self {
            node_positions: FixedSizeBufferView::new(&buffers.nodes.positions),
            node_types: FixedSizeBufferView::new(&buffers.nodes.types),
            node_connections: VariableSizeBufferView::new(&buffers.nodes.connections),
            node_geo_index: GeoIndex::from_bytes(&buffers.nodes.geo_index)?,
            link_connections: FixedSizeBufferView::new(&buffers.links.connections),
            link_bounds: FixedSizeBufferView::new(&buffers.links.bounds),
            link_types: FixedSizeBufferView::new(&buffers.links.types),
            pipe_segment_ids: FixedSizeBufferView::new(&buffers.pipe_segments.ids),
            pipe_segment_coordinates: FixedSizeBufferView::new(&buffers.pipe_segments.coordinates),
            pipe_segments_geo_index: GeoIndex::from_bytes(&buffers.pipe_segments.geo_index)?,
        })
    }

    /// Number of encoded nodes, whichever node buffers were requested.
    pub fn node_count(&self) -> usize {
        self.node_positions
            .len()
            .max(self.node_types.len())
            .max(self.node_connections.len())
            .max(self.node_geo_index.len())
    }

    pub fn link_count(&self) -> usize {
        self.link_connections
            .len()
            .max(self.link_bounds.len())
            .max(self.link_types.len())
    }

    pub fn node_type(&self, idx: u32) -> NodeType {
        NodeType::from_code(self.node_types.try_get(idx as usize).unwrap_or_default())
    }

    pub fn link_type(&self, idx: u32) -> LinkType {
        LinkType::from_code(self.link_types.try_get(idx as usize).unwrap_or_default())
    }

    pub fn node_position(&self, idx: u32) -> Option<Position> {
        self.node_positions.try_get(idx as usize)
    }

    /// Links incident to a node, `None` when adjacency was not encoded.
    pub fn connected_links(&self, idx: u32) -> Option<IdList<'a>> {
        self.node_connections.try_get(idx as usize)
    }

    pub fn link_endpoints(&self, idx: u32) -> Option<[u32; 2]> {
        self.link_connections.try_get(idx as usize)
    }

    pub fn link_bbox(&self, idx: u32) -> Option<Bounds> {
        self.link_bounds.try_get(idx as usize)
    }

    /// Owning link of a pipe segment.
    pub fn segment_link(&self, segment_idx: u32) -> u32 {
        self.pipe_segment_ids.get(segment_idx as usize)
    }

    pub fn segment(&self, segment_idx: u32) -> Segment {
        self.pipe_segment_coordinates.get(segment_idx as usize)
    }

    /// Whether two links share an endpoint node.
    pub fn links_connected(&self, a: u32, b: u32) -> bool {
        match (self.link_endpoints(a), self.link_endpoints(b)) {
            (Some([a_start, a_end]), Some([b_start, b_end])) => {
                let shared = |x: u32, y: u32| x == y && x != UNASSIGNED_INDEX;
                shared(a_start, b_start)
                    || shared(a_start, b_end)
                    || shared(a_end, b_start)
                    || shared(a_end, b_end)
            }
            _ => false,
        }
    }
}

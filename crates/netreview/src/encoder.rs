//! Model encoder: flattens a network into review buffers.
//!
//! Encoding runs two passes over the model:
//!
//! 1. assign dense node and link indices and collect whatever is needed to
//!    size variable-length buffers (adjacency lists, pipe segments)
//! 2. allocate every buffer at its final size and encode the requested fields
//!
//! Unrequested buffers are still produced, holding zero records, so every
//! bundle has the same shape.

use std::collections::BTreeSet;

use netreview_buffers::{
    BinaryData, Bounds, BoundsCodec, BufferType, BufferWithIndex, FixedSizeBufferBuilder,
    GeoIndexBuilder, IdCodec, IdMapper, IdsListCodec, LinkConnectionsCodec, Position, PositionCodec,
    Segment, SegmentCodec, TypeCodec, VariableRecordCodec, VariableSizeBufferBuilder,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Asset, AssetId, AssetKind, LinkType, NetworkModel};

/// Dense index written for a link endpoint that names no known node.
pub const UNASSIGNED_INDEX: u32 = u32::MAX;

// ============================================================================
// Encoding Request
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    Positions,
    Types,
    Connections,
    GeoIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkField {
    Connections,
    Bounds,
    Types,
    /// Pipe segment ids, coordinates and their spatial index.
    Segments,
}

/// Names the optional buffers one encoding pass produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingRequest {
    pub nodes: BTreeSet<NodeField>,
    pub links: BTreeSet<LinkField>,
}

impl EncodingRequest {
    pub fn new(
        nodes: impl IntoIterator<Item = NodeField>,
        links: impl IntoIterator<Item = LinkField>,
    ) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
            links: links.into_iter().collect(),
        }
    }

    pub fn has_node(&self, field: NodeField) -> bool {
        self.nodes.contains(&field)
    }

    pub fn has_link(&self, field: LinkField) -> bool {
        self.links.contains(&field)
    }

    /// Fields requested by either side.
    pub fn union(&self, other: &EncodingRequest) -> EncodingRequest {
        EncodingRequest {
            nodes: self.nodes.union(&other.nodes).copied().collect(),
            links: self.links.union(&other.links).copied().collect(),
        }
    }
}

// ============================================================================
// Encoded Bundle
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct NodeBuffers {
    pub positions: BinaryData,
    pub types: BinaryData,
    pub connections: BufferWithIndex,
    pub geo_index: BinaryData,
}

#[derive(Debug, Clone, Default)]
pub struct LinkBuffers {
    pub connections: BinaryData,
    pub bounds: BinaryData,
    pub types: BinaryData,
}

#[derive(Debug, Clone, Default)]
pub struct PipeSegmentBuffers {
    /// Owning link index per segment.
    pub ids: BinaryData,
    pub coordinates: BinaryData,
    pub geo_index: BinaryData,
}

/// The buffers a check computes over. Contains no domain objects, so it is
/// the only thing handed to a worker.
#[derive(Debug, Clone, Default)]
pub struct HydraulicModelBuffers {
    pub nodes: NodeBuffers,
    pub links: LinkBuffers,
    pub pipe_segments: PipeSegmentBuffers,
}

#[derive(Debug, Clone, Default)]
pub struct EncodedHydraulicModel {
    pub buffers: HydraulicModelBuffers,
    /// Node ids by dense index.
    pub node_ids_lookup: Vec<AssetId>,
    /// Link ids by dense index.
    pub link_ids_lookup: Vec<AssetId>,
}

impl EncodedHydraulicModel {
    pub fn node_id(&self, idx: u32) -> Option<AssetId> {
        self.node_ids_lookup.get(idx as usize).copied()
    }

    pub fn link_id(&self, idx: u32) -> Option<AssetId> {
        self.link_ids_lookup.get(idx as usize).copied()
    }
}

// ============================================================================
// Encoder
// ============================================================================

pub struct HydraulicModelEncoder<'m, M: NetworkModel> {
    model: &'m M,
    request: EncodingRequest,
    buffer_type: BufferType,
}

/// State of one `build_buffers` call, dropped when it returns.
struct EncodingPass<'m> {
    node_ids: IdMapper<AssetId>,
    link_ids: IdMapper<AssetId>,
    nodes: Vec<&'m Asset>,
    links: Vec<&'m Asset>,
    node_connections: Vec<Vec<AssetId>>,
    connections_size: usize,
    pipe_segments: Vec<Vec<Segment>>,
    segment_count: usize,
}

impl<'m, M: NetworkModel> HydraulicModelEncoder<'m, M> {
    pub fn new(model: &'m M, request: EncodingRequest, buffer_type: BufferType) -> Self {
        Self {
            model,
            request,
            buffer_type,
        }
    }

    pub fn request(&self) -> &EncodingRequest {
        &self.request
    }

    pub fn build_buffers(&self) -> EncodedHydraulicModel {
        let pass = self.prepare_mappings();

        let links = self.encode_links(&pass);
        let pipe_segments = self.encode_pipe_segments(&pass);
        let nodes = self.encode_nodes(&pass);

        debug!(
            nodes = pass.nodes.len(),
            links = pass.links.len(),
            pipe_segments = pass.segment_count,
            buffer_type = ?self.buffer_type,
            "encoded hydraulic model"
        );

        EncodedHydraulicModel {
            buffers: HydraulicModelBuffers {
                nodes,
                links,
                pipe_segments,
            },
            node_ids_lookup: pass.node_ids.into_lookup(),
            link_ids_lookup: pass.link_ids.into_lookup(),
        }
    }

    // ------------------------------------------------------------------------
    // Pass 1: index assignment and sizing
    // ------------------------------------------------------------------------

    fn prepare_mappings(&self) -> EncodingPass<'m> {
        let mut pass = EncodingPass {
            node_ids: IdMapper::new(),
            link_ids: IdMapper::new(),
            nodes: Vec::new(),
            links: Vec::new(),
            node_connections: Vec::new(),
            connections_size: 0,
            pipe_segments: Vec::new(),
            segment_count: 0,
        };
        let want_connections = self.request.has_node(NodeField::Connections);
        let want_segments = self.request.has_link(LinkField::Segments);

        let model: &'m M = self.model;
        for asset in model.assets() {
            match &asset.kind {
                AssetKind::Link(link) => {
                    let before = pass.link_ids.count();
                    pass.link_ids.get_or_assign_idx(asset.id);
                    if pass.link_ids.count() == before {
                        continue;
                    }
                    pass.links.push(asset);
                    if want_segments {
                        let segments = pipe_segments(link.link_type, &link.coordinates);
                        pass.segment_count += segments.len();
                        pass.pipe_segments.push(segments);
                    }
                }
                AssetKind::Node(_) => {
                    let before = pass.node_ids.count();
                    pass.node_ids.get_or_assign_idx(asset.id);
                    if pass.node_ids.count() == before {
                        continue;
                    }
                    pass.nodes.push(asset);
                    if want_connections {
                        let connected = self.known_links(asset.id);
                        pass.connections_size += IdsListCodec::size_of(connected.len());
                        pass.node_connections.push(connected);
                    }
                }
            }
        }
        pass
    }

    fn known_links(&self, node: AssetId) -> Vec<AssetId> {
        self.model
            .connected_links(node)
            .iter()
            .copied()
            .filter(|&link_id| {
                let known = self.model.asset(link_id).is_some_and(Asset::is_link);
                if !known {
                    warn!(node = %node, link = %link_id, "skipping unknown link in node adjacency");
                }
                known
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Pass 2: encoding
    // ------------------------------------------------------------------------

    fn count_if(&self, requested: bool, count: usize) -> usize {
        if requested {
            count
        } else {
            0
        }
    }

    fn encode_links(&self, pass: &EncodingPass<'_>) -> LinkBuffers {
        let count = pass.links.len();
        let want_connections = self.request.has_link(LinkField::Connections);
        let want_bounds = self.request.has_link(LinkField::Bounds);
        let want_types = self.request.has_link(LinkField::Types);

        let mut connections = FixedSizeBufferBuilder::<LinkConnectionsCodec>::new(
            self.count_if(want_connections, count),
            self.buffer_type,
        );
        let mut bounds =
            FixedSizeBufferBuilder::<BoundsCodec>::new(self.count_if(want_bounds, count), self.buffer_type);
        let mut types =
            FixedSizeBufferBuilder::<TypeCodec>::new(self.count_if(want_types, count), self.buffer_type);

        for asset in &pass.links {
            let Some(link) = asset.as_link() else {
                continue;
            };
            if want_connections {
                let [start, end] = link.connections.map(|node| {
                    pass.node_ids.get_idx(&node).unwrap_or_else(|| {
                        warn!(link = %asset.id, node = %node, "link endpoint references unknown node");
                        UNASSIGNED_INDEX
                    })
                });
                connections.add(&[start, end]);
            }
            if want_types {
                types.add(&link.link_type.code());
            }
            if want_bounds {
                bounds.add(&Bounds::from_positions(&link.coordinates));
            }
        }

        LinkBuffers {
            connections: connections.finalize(),
            bounds: bounds.finalize(),
            types: types.finalize(),
        }
    }

    fn encode_pipe_segments(&self, pass: &EncodingPass<'_>) -> PipeSegmentBuffers {
        let count = pass.segment_count;
        let mut ids = FixedSizeBufferBuilder::<IdCodec>::new(count, self.buffer_type);
        let mut coordinates = FixedSizeBufferBuilder::<SegmentCodec>::new(count, self.buffer_type);
        let mut geo_index = GeoIndexBuilder::new(count);

        for (link_idx, segments) in pass.pipe_segments.iter().enumerate() {
            for segment in segments {
                ids.add(&(link_idx as u32));
                coordinates.add(segment);
                geo_index.add_segment(segment);
            }
        }

        PipeSegmentBuffers {
            ids: ids.finalize(),
            coordinates: coordinates.finalize(),
            geo_index: geo_index.finalize(self.buffer_type),
        }
    }

    fn encode_nodes(&self, pass: &EncodingPass<'_>) -> NodeBuffers {
        let count = pass.nodes.len();
        let want_positions = self.request.has_node(NodeField::Positions);
        let want_types = self.request.has_node(NodeField::Types);
        let want_connections = self.request.has_node(NodeField::Connections);
        let want_geo_index = self.request.has_node(NodeField::GeoIndex);

        let mut positions =
            FixedSizeBufferBuilder::<PositionCodec>::new(self.count_if(want_positions, count), self.buffer_type);
        let mut types =
            FixedSizeBufferBuilder::<TypeCodec>::new(self.count_if(want_types, count), self.buffer_type);
        let mut connections = VariableSizeBufferBuilder::<IdsListCodec>::new(
            self.count_if(want_connections, count),
            pass.connections_size,
            self.buffer_type,
        );
        let mut geo_index = GeoIndexBuilder::new(self.count_if(want_geo_index, count));

        for (node_idx, asset) in pass.nodes.iter().enumerate() {
            let Some(node) = asset.as_node() else {
                continue;
            };
            if want_types {
                types.add(&node.node_type.code());
            }
            if want_connections {
                let link_indices: Vec<u32> = pass.node_connections[node_idx]
                    .iter()
                    .filter_map(|id| pass.link_ids.get_idx(id))
                    .collect();
                debug_assert_eq!(
                    IdsListCodec::encoded_size(&link_indices),
                    IdsListCodec::size_of(pass.node_connections[node_idx].len())
                );
                connections.add(&link_indices);
            }
            if want_positions {
                positions.add(&node.position);
            }
            if want_geo_index {
                geo_index.add_point(node.position);
            }
        }

        NodeBuffers {
            positions: positions.finalize(),
            types: types.finalize(),
            connections: connections.finalize(),
            geo_index: geo_index.finalize(self.buffer_type),
        }
    }
}

/// Straight sub-spans of a pipe polyline; other link types yield none.
fn pipe_segments(link_type: LinkType, coordinates: &[Position]) -> Vec<Segment> {
    if link_type != LinkType::Pipe {
        return Vec::new();
    }
    coordinates
        .windows(2)
        .map(|pair| Segment::new(pair[0], pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polyline_with_n_vertices_gives_n_minus_one_segments() {
        let line = [
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
        ];
        assert_eq!(pipe_segments(LinkType::Pipe, &line).len(), 2);
        assert!(pipe_segments(LinkType::Valve, &line).is_empty());
        assert!(pipe_segments(LinkType::Pipe, &line[..1]).is_empty());
    }

    #[test]
    fn request_union_merges_fields() {
        let a = EncodingRequest::new([NodeField::Types], [LinkField::Bounds]);
        let b = EncodingRequest::new([NodeField::Positions, NodeField::Types], []);
        let u = a.union(&b);
        assert!(u.has_node(NodeField::Types));
        assert!(u.has_node(NodeField::Positions));
        assert!(u.has_link(LinkField::Bounds));
        assert!(!u.has_link(LinkField::Segments));
    }
}

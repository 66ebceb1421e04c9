//! Subnetwork detection by iterative depth-first traversal.

use netreview_buffers::Bounds;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::NetworkCheck;
use crate::encoder::{
    EncodedHydraulicModel, EncodingRequest, HydraulicModelBuffers, LinkField, NodeField,
};
use crate::error::Result;
use crate::model::{AssetId, LinkType, NetworkModel};
use crate::views::HydraulicModelBuffersView;

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSubNetwork {
    /// Discovery sequence number; isolated nodes consume one too.
    pub subnetwork_id: u32,
    pub node_indices: Vec<u32>,
    pub link_indices: Vec<u32>,
    /// Tanks plus reservoirs.
    pub supply_source_count: u32,
    pub pipe_count: u32,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubNetwork {
    pub subnetwork_id: u32,
    pub node_ids: Vec<AssetId>,
    pub link_ids: Vec<AssetId>,
    pub supply_source_count: u32,
    pub pipe_count: u32,
    pub bounds: Bounds,
}

/// Connected components with at least one link, largest first.
pub fn find_subnetworks(buffers: &HydraulicModelBuffers) -> Result<Vec<EncodedSubNetwork>> {
    let views = HydraulicModelBuffersView::new(buffers)?;
    let node_count = views.node_connections.len() as u32;

    let mut visited_nodes = RoaringBitmap::new();
    let mut visited_links = RoaringBitmap::new();
    let mut subnetworks = Vec::new();
    let mut next_id = 0u32;

    for start in 0..node_count {
        if visited_nodes.contains(start) {
            continue;
        }
        let subnetwork = traverse(
            &views,
            start,
            next_id,
            node_count,
            &mut visited_nodes,
            &mut visited_links,
        );
        next_id += 1;

        if subnetwork.node_indices.len() > 1 {
            subnetworks.push(subnetwork);
        }
    }

    // Stable: equal sizes keep discovery order.
    subnetworks.sort_by(|a, b| b.node_indices.len().cmp(&a.node_indices.len()));
    Ok(subnetworks)
}

fn traverse(
    views: &HydraulicModelBuffersView<'_>,
    start: u32,
    subnetwork_id: u32,
    node_count: u32,
    visited_nodes: &mut RoaringBitmap,
    visited_links: &mut RoaringBitmap,
) -> EncodedSubNetwork {
    let mut subnetwork = EncodedSubNetwork {
        subnetwork_id,
        node_indices: Vec::new(),
        link_indices: Vec::new(),
        supply_source_count: 0,
        pipe_count: 0,
        bounds: Bounds::EMPTY,
    };

    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !visited_nodes.insert(node) {
            continue;
        }
        subnetwork.node_indices.push(node);
        if views.node_type(node).is_supply_source() {
            subnetwork.supply_source_count += 1;
        }

        let Some(links) = views.connected_links(node) else {
            continue;
        };
        for link in links.iter() {
            if !visited_links.insert(link) {
                continue;
            }
            subnetwork.link_indices.push(link);
            if views.link_type(link) == LinkType::Pipe {
                subnetwork.pipe_count += 1;
            }
            if let Some(bounds) = views.link_bbox(link) {
                subnetwork.bounds = subnetwork.bounds.expand(&bounds);
            }

            let Some([link_start, link_end]) = views.link_endpoints(link) else {
                continue;
            };
            let neighbor = if link_start == node { link_end } else { link_start };
            if neighbor < node_count && !visited_nodes.contains(neighbor) {
                stack.push(neighbor);
            }
        }
    }
    subnetwork
}

/// Maps dense indices back to asset ids. Indices outside the lookup tables
/// are dropped.
pub fn decode_subnetworks(
    encoded: &EncodedHydraulicModel,
    raw: Vec<EncodedSubNetwork>,
) -> Vec<SubNetwork> {
    raw.into_iter()
        .map(|sub| SubNetwork {
            subnetwork_id: sub.subnetwork_id,
            node_ids: sub
                .node_indices
                .iter()
                .filter_map(|&i| encoded.node_id(i))
                .collect(),
            link_ids: sub
                .link_indices
                .iter()
                .filter_map(|&i| encoded.link_id(i))
                .collect(),
            supply_source_count: sub.supply_source_count,
            pipe_count: sub.pipe_count,
            bounds: sub.bounds,
        })
        .collect()
}

pub struct ConnectivityTrace;

impl NetworkCheck for ConnectivityTrace {
    const NAME: &'static str = "connectivity_trace";

    type Params = ();
    type Encoded = Vec<EncodedSubNetwork>;
    type Output = SubNetwork;

    fn encoding_request() -> EncodingRequest {
        EncodingRequest::new(
            [NodeField::Types, NodeField::Connections],
            [LinkField::Types, LinkField::Connections, LinkField::Bounds],
        )
    }

    fn compute(buffers: &HydraulicModelBuffers, _params: &()) -> Result<Self::Encoded> {
        find_subnetworks(buffers)
    }

    fn decode<M: NetworkModel>(
        _model: &M,
        encoded: &EncodedHydraulicModel,
        raw: Self::Encoded,
    ) -> Vec<SubNetwork> {
        let subnetworks = decode_subnetworks(encoded, raw);
        debug!(subnetworks = subnetworks.len(), "decoded subnetworks");
        subnetworks
    }

    fn raw_len(raw: &Self::Encoded) -> usize {
        raw.len()
    }
}

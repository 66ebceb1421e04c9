//! Nodes sitting suspiciously close to a pipe they are not connected to.

use netreview_buffers::Position;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ensure_non_negative, NetworkCheck};
use crate::encoder::{
    EncodedHydraulicModel, EncodingRequest, HydraulicModelBuffers, LinkField, NodeField,
};
use crate::error::Result;
use crate::geometry::{haversine_distance, nearest_point_on_segment, search_bounds};
use crate::model::{AssetId, NetworkModel};
use crate::views::HydraulicModelBuffersView;

pub const DEFAULT_DISTANCE_IN_METERS: f64 = 0.5;
pub const DEFAULT_CONNECTED_JUNCTION_TOLERANCE: f64 = 0.1;

/// Floor for the spatial search radius.
const MIN_SEARCH_RADIUS_IN_METERS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityParams {
    /// Report threshold between a node and a foreign pipe.
    pub distance_in_meters: f64,
    /// Nearest points closer than this to one of the node's own neighbours
    /// are not anomalies.
    pub connected_junction_tolerance: f64,
}

impl ProximityParams {
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("proximity.distance_in_meters", self.distance_in_meters)?;
        ensure_non_negative(
            "proximity.connected_junction_tolerance",
            self.connected_junction_tolerance,
        )
    }
}

impl Default for ProximityParams {
    fn default() -> Self {
        Self {
            distance_in_meters: DEFAULT_DISTANCE_IN_METERS,
            connected_junction_tolerance: DEFAULT_CONNECTED_JUNCTION_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedProximityAnomaly {
    pub node_idx: u32,
    pub pipe_idx: u32,
    pub distance: f64,
    pub nearest_point: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityAnomaly {
    pub node_id: AssetId,
    pub pipe_id: AssetId,
    /// Metres.
    pub distance: f64,
    pub nearest_point: Position,
}

/// For every connected node, the closest unconnected pipe within
/// `params.distance_in_meters`, if any.
pub fn find_proximity_anomalies(
    buffers: &HydraulicModelBuffers,
    params: &ProximityParams,
) -> Result<Vec<EncodedProximityAnomaly>> {
    let views = HydraulicModelBuffersView::new(buffers)?;
    let search_radius = params.distance_in_meters.max(MIN_SEARCH_RADIUS_IN_METERS);

    let mut results = Vec::new();
    for (node_idx, position) in views.node_positions.enumerate() {
        let node_idx = node_idx as u32;
        let Some(connected_links) = views.connected_links(node_idx) else {
            continue;
        };
        if connected_links.is_empty() {
            continue;
        }

        let connected_nodes: Vec<Position> = connected_links
            .iter()
            .filter_map(|link| views.link_endpoints(link))
            .filter_map(|[start, end]| {
                if start == node_idx {
                    Some(end)
                } else if end == node_idx {
                    Some(start)
                } else {
                    None
                }
            })
            .filter_map(|neighbor| views.node_position(neighbor))
            .collect();

        let candidates = views
            .pipe_segments_geo_index
            .search(&search_bounds(position, search_radius));

        let mut best: Option<EncodedProximityAnomaly> = None;
        for segment_idx in candidates {
            let pipe_idx = views.segment_link(segment_idx);
            if connected_links.contains(pipe_idx) {
                continue;
            }
            let nearest = nearest_point_on_segment(position, &views.segment(segment_idx));
            if nearest.distance > params.distance_in_meters {
                continue;
            }
            let near_own_neighbor = connected_nodes.iter().any(|&neighbor| {
                haversine_distance(nearest.position, neighbor) < params.connected_junction_tolerance
            });
            if near_own_neighbor {
                continue;
            }
            if best.map_or(true, |b| nearest.distance < b.distance) {
                best = Some(EncodedProximityAnomaly {
                    node_idx,
                    pipe_idx,
                    distance: nearest.distance,
                    nearest_point: nearest.position,
                });
            }
        }

        results.extend(best);
    }

    Ok(results)
}

/// Resolves ids and sorts by distance, then node label. Anomalies naming a
/// missing node, or a pipe that no longer is one, are dropped.
pub fn decode_proximity_anomalies<M: NetworkModel>(
    model: &M,
    encoded: &EncodedHydraulicModel,
    raw: Vec<EncodedProximityAnomaly>,
) -> Vec<ProximityAnomaly> {
    let mut decoded = Vec::with_capacity(raw.len());
    for anomaly in raw {
        let node = encoded.node_id(anomaly.node_idx).and_then(|id| model.asset(id));
        let pipe = encoded
            .link_id(anomaly.pipe_idx)
            .and_then(|id| model.asset(id))
            .filter(|asset| asset.as_pipe().is_some());
        let (Some(node), Some(pipe)) = (node, pipe) else {
            debug!(
                node = anomaly.node_idx,
                pipe = anomaly.pipe_idx,
                "dropping proximity anomaly with stale reference"
            );
            continue;
        };
        decoded.push((node.sort_label(), ProximityAnomaly {
            node_id: node.id,
            pipe_id: pipe.id,
            distance: anomaly.distance,
            nearest_point: anomaly.nearest_point,
        }));
    }

    decoded.sort_by(|(label_a, a), (label_b, b)| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| label_a.cmp(label_b))
    });
    decoded.into_iter().map(|(_, anomaly)| anomaly).collect()
}

pub struct ProximityAnomalies;

impl NetworkCheck for ProximityAnomalies {
    const NAME: &'static str = "proximity_anomalies";

    type Params = ProximityParams;
    type Encoded = Vec<EncodedProximityAnomaly>;
    type Output = ProximityAnomaly;

    fn validate(params: &ProximityParams) -> Result<()> {
        params.validate()
    }

    fn encoding_request() -> EncodingRequest {
        EncodingRequest::new(
            [NodeField::Positions, NodeField::Connections],
            [LinkField::Connections, LinkField::Segments],
        )
    }

    fn compute(buffers: &HydraulicModelBuffers, params: &ProximityParams) -> Result<Self::Encoded> {
        find_proximity_anomalies(buffers, params)
    }

    fn decode<M: NetworkModel>(
        model: &M,
        encoded: &EncodedHydraulicModel,
        raw: Self::Encoded,
    ) -> Vec<ProximityAnomaly> {
        decode_proximity_anomalies(model, encoded, raw)
    }

    fn raw_len(raw: &Self::Encoded) -> usize {
        raw.len()
    }
}

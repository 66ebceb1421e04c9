//! Pipes whose geometries cross away from any modelled junction.

use std::cmp::Ordering;

use ahash::AHashSet;
use netreview_buffers::Position;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ensure_non_negative, NetworkCheck};
use crate::encoder::{
    EncodedHydraulicModel, EncodingRequest, HydraulicModelBuffers, LinkField, NodeField,
};
use crate::error::Result;
use crate::geometry::segment_intersection;
use crate::model::{Asset, AssetId, Link, NetworkModel};
use crate::views::HydraulicModelBuffersView;

/// Default junction tolerance in degrees, roughly half a metre.
pub const DEFAULT_JUNCTION_TOLERANCE: f64 = 0.000_004_5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossingParams {
    /// Intersections closer than this (in degrees) to any node are treated
    /// as junctions.
    pub junction_tolerance: f64,
}

impl CrossingParams {
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("crossing.junction_tolerance", self.junction_tolerance)
    }
}

impl Default for CrossingParams {
    fn default() -> Self {
        Self {
            junction_tolerance: DEFAULT_JUNCTION_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedCrossingPipe {
    pub pipe1_idx: u32,
    pub pipe2_idx: u32,
    pub intersection_point: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingPipe {
    /// Smaller diameter of the pair.
    pub pipe1_id: AssetId,
    pub pipe2_id: AssetId,
    pub intersection_point: Position,
}

/// At most one crossing per unordered pair of unconnected pipes.
pub fn find_crossing_pipes(
    buffers: &HydraulicModelBuffers,
    junction_tolerance: f64,
) -> Result<Vec<EncodedCrossingPipe>> {
    let views = HydraulicModelBuffersView::new(buffers)?;
    let segments_index = &views.pipe_segments_geo_index;

    let mut results = Vec::new();
    let mut searched = RoaringBitmap::new();
    let mut reported: AHashSet<(u32, u32)> = AHashSet::new();

    for current in 0..views.link_connections.len() as u32 {
        let Some(current_bounds) = views.link_bbox(current) else {
            continue;
        };

        let candidates = segments_index.search_with(&current_bounds, |segment| {
            let other = views.segment_link(segment);
            other != current && !searched.contains(other) && !views.links_connected(current, other)
        });

        for other_segment_idx in candidates {
            let other = views.segment_link(other_segment_idx);
            let pair = (current.min(other), current.max(other));
            if reported.contains(&pair) {
                continue;
            }

            let other_segment = views.segment(other_segment_idx);
            let current_segments = segments_index
                .search_with(&other_segment.bounds(), |segment| views.segment_link(segment) == current);

            for current_segment_idx in current_segments {
                let Some(point) = segment_intersection(&other_segment, &views.segment(current_segment_idx))
                else {
                    continue;
                };
                if is_near_junction(&views, point, junction_tolerance) {
                    continue;
                }
                reported.insert(pair);
                results.push(EncodedCrossingPipe {
                    pipe1_idx: current,
                    pipe2_idx: other,
                    intersection_point: point,
                });
                break;
            }
        }
        searched.insert(current);
    }

    Ok(results)
}

fn is_near_junction(views: &HydraulicModelBuffersView<'_>, point: Position, tolerance: f64) -> bool {
    !views.node_geo_index.neighbors(point, 1, tolerance).is_empty()
}

// ============================================================================
// Decoding
// ============================================================================

fn compare_labels(a: &Asset, b: &Asset) -> Ordering {
    a.sort_label().cmp(&b.sort_label())
}

/// Smaller diameter first, then case-insensitive label.
fn compare_pipes(a: (&Asset, &Link), b: (&Asset, &Link)) -> Ordering {
    a.1.diameter
        .total_cmp(&b.1.diameter)
        .then_with(|| compare_labels(a.0, b.0))
}

fn resolve_pipe<'m, M: NetworkModel>(
    model: &'m M,
    encoded: &EncodedHydraulicModel,
    idx: u32,
) -> Option<(&'m Asset, &'m Link)> {
    let asset = model.asset(encoded.link_id(idx)?)?;
    asset.as_pipe().map(|pipe| (asset, pipe))
}

/// Resolves pipe ids, orders each pair, and sorts by (pipe1 diameter,
/// pipe2 diameter, pipe1 label). Pairs naming a missing asset or a non-pipe
/// are dropped.
pub fn decode_crossing_pipes<M: NetworkModel>(
    model: &M,
    encoded: &EncodedHydraulicModel,
    raw: Vec<EncodedCrossingPipe>,
) -> Vec<CrossingPipe> {
    let resolve = |idx: u32| resolve_pipe(model, encoded, idx);

    let mut decoded = Vec::with_capacity(raw.len());
    for crossing in raw {
        let (Some(a), Some(b)) = (resolve(crossing.pipe1_idx), resolve(crossing.pipe2_idx)) else {
            debug!(
                pipe1 = crossing.pipe1_idx,
                pipe2 = crossing.pipe2_idx,
                "dropping crossing with stale pipe reference"
            );
            continue;
        };
        let (first, second) = if compare_pipes(a, b) == Ordering::Greater {
            (b, a)
        } else {
            (a, b)
        };
        decoded.push((first, second, crossing.intersection_point));
    }

    decoded.sort_by(|(a1, a2, _), (b1, b2, _)| {
        a1.1.diameter
            .total_cmp(&b1.1.diameter)
            .then_with(|| a2.1.diameter.total_cmp(&b2.1.diameter))
            .then_with(|| compare_labels(a1.0, b1.0))
    });

    decoded
        .into_iter()
        .map(|(first, second, point)| CrossingPipe {
            pipe1_id: first.0.id,
            pipe2_id: second.0.id,
            intersection_point: point,
        })
        .collect()
}

pub struct CrossingPipes;

impl NetworkCheck for CrossingPipes {
    const NAME: &'static str = "crossing_pipes";

    type Params = CrossingParams;
    type Encoded = Vec<EncodedCrossingPipe>;
    type Output = CrossingPipe;

    fn validate(params: &CrossingParams) -> Result<()> {
        params.validate()
    }

    fn encoding_request() -> EncodingRequest {
        EncodingRequest::new(
            [NodeField::GeoIndex],
            [LinkField::Connections, LinkField::Bounds, LinkField::Segments],
        )
    }

    fn compute(buffers: &HydraulicModelBuffers, params: &CrossingParams) -> Result<Self::Encoded> {
        find_crossing_pipes(buffers, params.junction_tolerance)
    }

    fn decode<M: NetworkModel>(
        model: &M,
        encoded: &EncodedHydraulicModel,
        raw: Self::Encoded,
    ) -> Vec<CrossingPipe> {
        decode_crossing_pipes(model, encoded, raw)
    }

    fn raw_len(raw: &Self::Encoded) -> usize {
        raw.len()
    }
}

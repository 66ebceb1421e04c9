//! Assets that are not tied into the network.
//!
//! An orphan node has no incident link. An orphan link is a valve or pump
//! neither of whose endpoints carries any other link. Pipes are never
//! orphans: an isolated pipe is a subnetwork of its own.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::NetworkCheck;
use crate::encoder::{
    EncodedHydraulicModel, EncodingRequest, HydraulicModelBuffers, LinkField, NodeField,
};
use crate::error::Result;
use crate::model::{AssetId, AssetType, LinkType, NetworkModel};
use crate::views::HydraulicModelBuffersView;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedOrphanAssets {
    pub orphan_nodes: Vec<u32>,
    pub orphan_links: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanAsset {
    pub asset_id: AssetId,
    pub asset_type: AssetType,
    pub label: String,
}

pub fn find_orphan_assets(buffers: &HydraulicModelBuffers) -> Result<EncodedOrphanAssets> {
    let views = HydraulicModelBuffersView::new(buffers)?;
    let mut orphans = EncodedOrphanAssets::default();

    for (node_idx, links) in views.node_connections.enumerate() {
        if links.is_empty() {
            orphans.orphan_nodes.push(node_idx as u32);
        }
    }

    let has_other_link = |node: u32, link: u32| {
        views
            .connected_links(node)
            .is_some_and(|links| links.iter().any(|other| other != link))
    };

    for link_idx in 0..views.link_count() as u32 {
        if views.link_type(link_idx) == LinkType::Pipe {
            continue;
        }
        let Some([start, end]) = views.link_endpoints(link_idx) else {
            continue;
        };
        if !has_other_link(start, link_idx) && !has_other_link(end, link_idx) {
            orphans.orphan_links.push(link_idx);
        }
    }

    Ok(orphans)
}

/// Reservoirs first, pipes last.
fn type_rank(asset_type: AssetType) -> u8 {
    match asset_type {
        AssetType::Reservoir => 0,
        AssetType::Tank => 1,
        AssetType::Valve => 2,
        AssetType::Pump => 3,
        AssetType::Junction => 4,
        AssetType::Pipe => 5,
    }
}

/// Resolves ids, drops stale ones, and orders by type rank then
/// case-insensitive label.
pub fn decode_orphan_assets<M: NetworkModel>(
    model: &M,
    encoded: &EncodedHydraulicModel,
    raw: EncodedOrphanAssets,
) -> Vec<OrphanAsset> {
    let links = raw.orphan_links.iter().map(|&i| encoded.link_id(i));
    let nodes = raw.orphan_nodes.iter().map(|&i| encoded.node_id(i));

    let mut decoded = Vec::new();
    for id in links.chain(nodes) {
        let Some(asset) = id.and_then(|id| model.asset(id)) else {
            debug!(asset = ?id, "dropping stale orphan asset");
            continue;
        };
        decoded.push((
            asset.sort_label(),
            OrphanAsset {
                asset_id: asset.id,
                asset_type: asset.asset_type(),
                label: asset.label.clone(),
            },
        ));
    }

    decoded.sort_by(|(label_a, a), (label_b, b)| {
        type_rank(a.asset_type)
            .cmp(&type_rank(b.asset_type))
            .then_with(|| label_a.cmp(label_b))
    });
    decoded.into_iter().map(|(_, orphan)| orphan).collect()
}

pub struct OrphanAssets;

impl NetworkCheck for OrphanAssets {
    const NAME: &'static str = "orphan_assets";

    type Params = ();
    type Encoded = EncodedOrphanAssets;
    type Output = OrphanAsset;

    fn encoding_request() -> EncodingRequest {
        EncodingRequest::new(
            [NodeField::Types, NodeField::Connections],
            [LinkField::Types, LinkField::Connections],
        )
    }

    fn compute(buffers: &HydraulicModelBuffers, _params: &()) -> Result<Self::Encoded> {
        find_orphan_assets(buffers)
    }

    fn decode<M: NetworkModel>(
        model: &M,
        encoded: &EncodedHydraulicModel,
        raw: Self::Encoded,
    ) -> Vec<OrphanAsset> {
        decode_orphan_assets(model, encoded, raw)
    }

    fn raw_len(raw: &Self::Encoded) -> usize {
        raw.orphan_nodes.len() + raw.orphan_links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_rank_orders_supply_sources_first() {
        let mut types = vec![
            AssetType::Pipe,
            AssetType::Junction,
            AssetType::Pump,
            AssetType::Valve,
            AssetType::Tank,
            AssetType::Reservoir,
        ];
        types.sort_by_key(|t| type_rank(*t));
        assert_eq!(
            types,
            vec![
                AssetType::Reservoir,
                AssetType::Tank,
                AssetType::Valve,
                AssetType::Pump,
                AssetType::Junction,
                AssetType::Pipe,
            ]
        );
    }
}

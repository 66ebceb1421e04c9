//! Whole-network review: every check over a single encoding.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};

use crate::abort::AbortSignal;
use crate::checks::{
    ConnectivityTrace, CrossingPipe, CrossingPipes, NetworkCheck, OrphanAsset, OrphanAssets,
    ProximityAnomalies, ProximityAnomaly, SubNetwork,
};
use crate::config::ReviewConfig;
use crate::encoder::{EncodingRequest, HydraulicModelEncoder};
use crate::error::Result;
use crate::model::NetworkModel;
use crate::runner::{compute, ensure_not_aborted};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub subnetworks: Vec<SubNetwork>,
    pub crossing_pipes: Vec<CrossingPipe>,
    pub proximity_anomalies: Vec<ProximityAnomaly>,
    pub orphan_assets: Vec<OrphanAsset>,
}

impl NetworkReport {
    pub fn issue_count(&self) -> usize {
        self.crossing_pipes.len() + self.proximity_anomalies.len() + self.orphan_assets.len()
    }
}

/// Union of every check's encoding request.
pub fn review_encoding_request() -> EncodingRequest {
    ConnectivityTrace::encoding_request()
        .union(&CrossingPipes::encoding_request())
        .union(&ProximityAnomalies::encoding_request())
        .union(&OrphanAssets::encoding_request())
}

/// Runs all four checks concurrently over one encoding: on rayon when
/// in-process, or one worker per check sharing the buffers.
pub async fn review_network<M: NetworkModel>(
    model: &M,
    config: &ReviewConfig,
    signal: Option<&AbortSignal>,
) -> Result<NetworkReport> {
    config.validate()?;
    let span = info_span!("network_review", check = "all");
    async move {
        ensure_not_aborted(signal)?;
        let started = Instant::now();

        let encoded =
            HydraulicModelEncoder::new(model, review_encoding_request(), config.buffer_type).build_buffers();
        let buffers = &encoded.buffers;

        let (subnetworks, crossings, proximity, orphans) = if config.execution.offloads() {
            tokio::try_join!(
                compute::<ConnectivityTrace>(buffers, (), true, signal),
                compute::<CrossingPipes>(buffers, config.crossing, true, signal),
                compute::<ProximityAnomalies>(buffers, config.proximity, true, signal),
                compute::<OrphanAssets>(buffers, (), true, signal),
            )?
        } else {
            let ((subnetworks, crossings), (proximity, orphans)) = rayon::join(
                || {
                    rayon::join(
                        || ConnectivityTrace::compute(buffers, &()),
                        || CrossingPipes::compute(buffers, &config.crossing),
                    )
                },
                || {
                    rayon::join(
                        || ProximityAnomalies::compute(buffers, &config.proximity),
                        || OrphanAssets::compute(buffers, &()),
                    )
                },
            );
            (subnetworks?, crossings?, proximity?, orphans?)
        };
        debug!(
            subnetworks = subnetworks.len(),
            crossings = crossings.len(),
            proximity_anomalies = proximity.len(),
            orphans = OrphanAssets::raw_len(&orphans),
            "review computed"
        );

        let report = NetworkReport {
            subnetworks: ConnectivityTrace::decode(model, &encoded, subnetworks),
            crossing_pipes: CrossingPipes::decode(model, &encoded, crossings),
            proximity_anomalies: ProximityAnomalies::decode(model, &encoded, proximity),
            orphan_assets: OrphanAssets::decode(model, &encoded, orphans),
        };
        info!(
            issues = report.issue_count(),
            subnetworks = report.subnetworks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "network review finished"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

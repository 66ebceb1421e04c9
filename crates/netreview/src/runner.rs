//! Check runner: encode, compute in-process or on a worker, decode.
//!
//! Each run is strictly sequential: encoding finishes before compute starts,
//! compute finishes before decoding starts. Cancellation is honoured before
//! encoding and, for offloaded runs, while waiting on the worker. An
//! in-process compute always runs to completion.

use std::time::Instant;

use netreview_buffers::BufferType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};

use crate::abort::AbortSignal;
use crate::checks::{
    ConnectivityTrace, CrossingParams, CrossingPipe, CrossingPipes, NetworkCheck, OrphanAsset,
    OrphanAssets, ProximityAnomalies, ProximityAnomaly, ProximityParams, SubNetwork,
};
use crate::encoder::{HydraulicModelBuffers, HydraulicModelEncoder};
use crate::error::{Result, ReviewError};
use crate::model::NetworkModel;
use crate::worker::CheckWorker;

/// Where a check computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    InProcess,
    Worker,
    /// Worker when more than one CPU is available.
    #[default]
    Auto,
}

impl Execution {
    pub fn offloads(self) -> bool {
        match self {
            Execution::InProcess => false,
            Execution::Worker => true,
            Execution::Auto => std::thread::available_parallelism()
                .map(|n| n.get() > 1)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunOptions {
    pub buffer_type: BufferType,
    pub execution: Execution,
}

impl RunOptions {
    pub fn in_process() -> Self {
        Self {
            buffer_type: BufferType::Array,
            execution: Execution::InProcess,
        }
    }

    pub fn worker(buffer_type: BufferType) -> Self {
        Self {
            buffer_type,
            execution: Execution::Worker,
        }
    }
}

pub(crate) fn ensure_not_aborted(signal: Option<&AbortSignal>) -> Result<()> {
    if signal.is_some_and(AbortSignal::is_aborted) {
        debug!("review cancelled before encoding");
        return Err(ReviewError::Cancelled);
    }
    Ok(())
}

/// Runs `C::compute` over `buffers`, on a worker thread when `offload` is set.
/// The worker receives its own clone of the buffers: shared buffers are
/// reference counted, array buffers are copied.
pub(crate) async fn compute<C: NetworkCheck>(
    buffers: &HydraulicModelBuffers,
    params: C::Params,
    offload: bool,
    signal: Option<&AbortSignal>,
) -> Result<C::Encoded> {
    if !offload {
        debug!(check = C::NAME, execution = "in_process", "computing check");
        return C::compute(buffers, &params);
    }

    debug!(check = C::NAME, execution = "worker", "computing check");
    let buffers = buffers.clone();
    let worker = CheckWorker::spawn(C::NAME, move || C::compute(&buffers, &params))?;
    worker.join(signal).await?
}

/// Encodes the minimal buffers for `C`, computes, and decodes.
pub async fn run_check<C: NetworkCheck, M: NetworkModel>(
    model: &M,
    params: C::Params,
    options: RunOptions,
    signal: Option<&AbortSignal>,
) -> Result<Vec<C::Output>> {
    let span = info_span!("network_review", check = C::NAME);
    async move {
        C::validate(&params)?;
        ensure_not_aborted(signal)?;
        let started = Instant::now();

        let encoded =
            HydraulicModelEncoder::new(model, C::encoding_request(), options.buffer_type).build_buffers();
        let raw = compute::<C>(&encoded.buffers, params, options.execution.offloads(), signal).await?;
        debug!(raw_results = C::raw_len(&raw), "check computed");

        let results = C::decode(model, &encoded, raw);
        info!(
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "check finished"
        );
        Ok(results)
    }
    .instrument(span)
    .await
}

// ============================================================================
// Per-Check Entry Points
// ============================================================================

/// Connected components with at least one link, largest first.
pub async fn run_connectivity_trace<M: NetworkModel>(
    model: &M,
    options: RunOptions,
    signal: Option<&AbortSignal>,
) -> Result<Vec<SubNetwork>> {
    run_check::<ConnectivityTrace, M>(model, (), options, signal).await
}

pub async fn run_crossing_pipes<M: NetworkModel>(
    model: &M,
    params: CrossingParams,
    options: RunOptions,
    signal: Option<&AbortSignal>,
) -> Result<Vec<CrossingPipe>> {
    run_check::<CrossingPipes, M>(model, params, options, signal).await
}

pub async fn run_proximity_anomalies<M: NetworkModel>(
    model: &M,
    params: ProximityParams,
    options: RunOptions,
    signal: Option<&AbortSignal>,
) -> Result<Vec<ProximityAnomaly>> {
    run_check::<ProximityAnomalies, M>(model, params, options, signal).await
}

pub async fn run_orphan_assets<M: NetworkModel>(
    model: &M,
    options: RunOptions,
    signal: Option<&AbortSignal>,
) -> Result<Vec<OrphanAsset>> {
    run_check::<OrphanAssets, M>(model, (), options, signal).await
}

//! Review checks.
//!
//! Each check is a pure function from encoded buffers to index-space results,
//! plus a decoder that maps those results back to asset ids and orders them.
//! `NetworkCheck` ties the pieces together for the runner.

pub mod connectivity_trace;
pub mod crossing_pipes;
pub mod orphan_assets;
pub mod proximity_anomalies;

use crate::encoder::{EncodedHydraulicModel, EncodingRequest, HydraulicModelBuffers};
use crate::error::{Result, ReviewError};
use crate::model::NetworkModel;

pub use connectivity_trace::{ConnectivityTrace, EncodedSubNetwork, SubNetwork};
pub use crossing_pipes::{CrossingParams, CrossingPipe, CrossingPipes, EncodedCrossingPipe};
pub use orphan_assets::{EncodedOrphanAssets, OrphanAsset, OrphanAssets};
pub use proximity_anomalies::{
    EncodedProximityAnomaly, ProximityAnomalies, ProximityAnomaly, ProximityParams,
};

/// One review check: what it needs encoded, how it computes, how it decodes.
pub trait NetworkCheck: 'static {
    /// Name used in logs and worker thread names.
    const NAME: &'static str;

    type Params: Clone + Send + 'static;

    /// Index-space result, the only thing a worker sends back.
    type Encoded: Send + 'static;

    type Output;

    /// Rejects parameters `compute` cannot honour. Runs before encoding.
    fn validate(_params: &Self::Params) -> Result<()> {
        Ok(())
    }

    /// Minimal set of buffers `compute` reads.
    fn encoding_request() -> EncodingRequest;

    fn compute(buffers: &HydraulicModelBuffers, params: &Self::Params) -> Result<Self::Encoded>;

    fn decode<M: NetworkModel>(
        model: &M,
        encoded: &EncodedHydraulicModel,
        raw: Self::Encoded,
    ) -> Vec<Self::Output>;

    /// Number of raw records, for logging.
    fn raw_len(raw: &Self::Encoded) -> usize;
}

/// Tolerances and thresholds must be finite and non-negative.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ReviewError::InvalidConfig(format!(
            "{name} must be a finite non-negative number, got {value}"
        )));
    }
    Ok(())
}

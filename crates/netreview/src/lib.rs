//! Netreview: structural review of water distribution networks
//!
//! The engine flattens a network into binary buffers (see `netreview_buffers`)
//! and runs independent checks over them:
//!
//! 1. **Connectivity trace**: connected subnetworks and their supply sources
//! 2. **Crossing pipes**: unconnected pipes whose geometries intersect
//! 3. **Proximity anomalies**: nodes close to a pipe they are not connected to
//! 4. **Orphan assets**: nodes with no links, isolated valves and pumps
//!
//! ## Data flow
//!
//! ```text
//! NetworkModel -> HydraulicModelEncoder -> HydraulicModelBuffers
//!     -> [in-process | worker thread] -> NetworkCheck::compute
//!     -> NetworkCheck::decode -> typed results
//! ```
//!
//! Only the encoded buffers cross a thread boundary. Results come back in
//! dense-index space and are mapped to asset ids by the decoders, which also
//! drop references that no longer resolve against the model.
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod abort;
pub mod checks;
pub mod config;
pub mod encoder;
pub mod error;
pub mod geometry;
pub mod model;
pub mod review;
pub mod runner;
pub mod views;
pub mod worker;

// Re-export key types
pub use abort::{AbortController, AbortSignal};
pub use checks::{
    CrossingParams, CrossingPipe, NetworkCheck, OrphanAsset, ProximityAnomaly, ProximityParams,
    SubNetwork,
};
pub use config::ReviewConfig;
pub use encoder::{
    EncodedHydraulicModel, EncodingRequest, HydraulicModelBuffers, HydraulicModelEncoder,
    LinkField, NodeField,
};
pub use error::{Result, ReviewError};
pub use model::{
    Asset, AssetId, AssetKind, AssetType, HydraulicModel, HydraulicModelBuilder, Link, LinkType,
    NetworkModel, Node, NodeType,
};
pub use netreview_buffers::{BufferType, Position};
pub use review::{review_network, NetworkReport};
pub use runner::{
    run_check, run_connectivity_trace, run_crossing_pipes, run_orphan_assets,
    run_proximity_anomalies, Execution, RunOptions,
};
pub use views::HydraulicModelBuffersView;

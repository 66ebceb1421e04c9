//! Integration tests for the complete review pipeline
//!
//! These tests drive the public entry points end to end:
//! - Model → Encoder → Check → Decoder, in-process and on workers
//! - Combined review over one shared encoding
//! - Cancellation before dispatch
//!
//! Run with: cargo test --test integration_tests

use approx::assert_relative_eq;
use netreview::{
    review_network, run_connectivity_trace, run_crossing_pipes, run_proximity_anomalies,
    AbortController, AssetType, BufferType, CrossingParams, Execution, HydraulicModel,
    HydraulicModelBuilder, NetworkReport, ProximityParams, ReviewConfig, RunOptions,
};

fn all_options() -> [RunOptions; 3] {
    [
        RunOptions::in_process(),
        RunOptions::worker(BufferType::Array),
        RunOptions::worker(BufferType::Shared),
    ]
}

// ============================================================================
// Crossing Pipes
// ============================================================================

#[tokio::test]
async fn test_simple_cross() {
    let mut b = HydraulicModelBuilder::new();
    let n1 = b.junction("N1", (0.0, 0.0));
    let n2 = b.junction("N2", (0.0, 10.0));
    b.pipe("VERTICAL", n1, n2);
    let n3 = b.junction("N3", (-5.0, 5.0));
    let n4 = b.junction("N4", (5.0, 5.0));
    b.pipe("HORIZONTAL", n3, n4);
    let model = b.build();

    let params = CrossingParams {
        junction_tolerance: 0.5,
    };
    for options in all_options() {
        let crossings = run_crossing_pipes(&model, params, options, None).await.unwrap();
        assert_eq!(crossings.len(), 1);
        assert_relative_eq!(crossings[0].intersection_point.lon, 0.0, epsilon = 1e-9);
        assert_relative_eq!(crossings[0].intersection_point.lat, 5.0, epsilon = 1e-9);
    }
}

#[tokio::test]
async fn test_t_junction_not_a_crossing() {
    let mut b = HydraulicModelBuilder::new();
    let n1 = b.junction("N1", (0.0, 0.0));
    let shared = b.junction("SHARED", (0.0, 10.0));
    let n3 = b.junction("N3", (10.0, 10.0));
    b.pipe("A", n1, shared);
    b.pipe("B", shared, n3);
    let model = b.build();

    let params = CrossingParams {
        junction_tolerance: 0.5,
    };
    for options in all_options() {
        let crossings = run_crossing_pipes(&model, params, options, None).await.unwrap();
        assert!(crossings.is_empty());
    }
}

// ============================================================================
// Subnetworks
// ============================================================================

#[tokio::test]
async fn test_disconnected_components() {
    let mut b = HydraulicModelBuilder::new();
    let reservoir = b.reservoir("R1", (0.0, 0.0));
    let j1 = b.junction("J1", (0.001, 0.0));
    b.pipe("P1", reservoir, j1);
    let j2 = b.junction("J2", (0.01, 0.01));
    let j3 = b.junction("J3", (0.011, 0.01));
    b.pipe("P2", j2, j3);
    let isolated = b.junction("ISOLATED", (0.05, 0.05));
    let model = b.build();

    for options in all_options() {
        let subnetworks = run_connectivity_trace(&model, options, None).await.unwrap();
        assert_eq!(subnetworks.len(), 2);

        let mut supply_counts: Vec<u32> = subnetworks.iter().map(|s| s.supply_source_count).collect();
        supply_counts.sort_unstable();
        assert_eq!(supply_counts, vec![0, 1]);

        assert!(subnetworks.iter().all(|s| !s.node_ids.contains(&isolated)));
    }
}

// ============================================================================
// Proximity Anomalies
// ============================================================================

fn proximity_network() -> HydraulicModel {
    let mut b = HydraulicModelBuilder::new();
    let a = b.junction("A", (0.0, 0.0));
    let bb = b.junction("B", (0.001, 0.0));
    b.pipe("P1", a, bb);
    let c = b.junction("C", (0.0005, 0.0001));
    let d = b.junction("D", (0.0005, 0.01));
    b.pipe("P2", c, d);
    b.build()
}

#[tokio::test]
async fn test_proximity_anomaly() {
    let model = proximity_network();
    let params = ProximityParams {
        distance_in_meters: 50.0,
        ..ProximityParams::default()
    };

    for options in all_options() {
        let anomalies = run_proximity_anomalies(&model, params, options, None).await.unwrap();
        assert_eq!(anomalies.len(), 1);

        let anomaly = &anomalies[0];
        assert_eq!(anomaly.node_id.raw(), 4);
        assert_eq!(anomaly.pipe_id.raw(), 3);
        assert!(anomaly.distance < 50.0);
        assert_relative_eq!(anomaly.distance, 11.12, epsilon = 0.05);
        assert_relative_eq!(anomaly.nearest_point.lon, 0.0005, epsilon = 1e-7);
        assert_relative_eq!(anomaly.nearest_point.lat, 0.0, epsilon = 1e-7);
    }
}

// ============================================================================
// Combined Review
// ============================================================================

#[tokio::test]
async fn test_full_review_report() {
    let mut b = HydraulicModelBuilder::new();
    let r = b.reservoir("R1", (0.0, 0.0));
    let a = b.junction("A", (0.001, 0.0));
    let c = b.junction("C", (0.002, 0.0));
    b.pipe("P1", r, a);
    b.pipe("P2", a, c);
    let top = b.junction("TOP", (0.0015, 0.001));
    let bottom = b.junction("BOTTOM", (0.0015, -0.001));
    b.pipe("P3", top, bottom);
    let near = b.junction("NEAR", (0.0005, 0.000002));
    let far = b.junction("FAR", (0.0005, 0.005));
    b.pipe("P4", near, far);
    b.tank("LONELY_TANK", (1.0, 1.0));
    let model = b.build();

    let config = ReviewConfig {
        execution: Execution::Worker,
        buffer_type: BufferType::Shared,
        ..ReviewConfig::default()
    };
    let report = review_network(&model, &config, None).await.unwrap();

    assert_eq!(report.subnetworks.len(), 3);
    assert_eq!(report.subnetworks[0].supply_source_count, 1);
    assert_eq!(report.crossing_pipes.len(), 1);
    assert_eq!(report.proximity_anomalies.len(), 1);
    assert_eq!(report.proximity_anomalies[0].node_id, near);
    assert_eq!(report.orphan_assets.len(), 1);
    assert_eq!(report.orphan_assets[0].asset_type, AssetType::Tank);

    let json = serde_json::to_string(&report).unwrap();
    let back: NetworkReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.subnetworks.len(), 3);
    assert_eq!(back.crossing_pipes[0].pipe1_id, report.crossing_pipes[0].pipe1_id);
    assert_eq!(back.orphan_assets, report.orphan_assets);

    let in_process = review_network(
        &model,
        &ReviewConfig {
            execution: Execution::InProcess,
            ..config
        },
        None,
    )
    .await
    .unwrap();
    assert_eq!(in_process, report);
}

#[tokio::test]
async fn test_cancelled_review_returns_cancelled() {
    let model = proximity_network();
    let controller = AbortController::new();
    let signal = controller.signal();
    controller.abort();

    let err = review_network(&model, &ReviewConfig::default(), Some(&signal))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.to_string(), "Operation cancelled");
}

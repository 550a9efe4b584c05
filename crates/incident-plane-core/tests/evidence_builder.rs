// crates/incident-plane-core/tests/evidence_builder.rs
// ============================================================================
// Module: Evidence Builder Tests
// Description: Graph determinism, shared-signal edges, and bundle roll-ups.
// ============================================================================
//! ## Overview
//! Exercises the pure evidence builder: content-addressed graph identity over
//! sorted member sets, edges between detections sharing a signal, conditional
//! graph storage, and the rolled-up bundle summary.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

mod common;

use incident_plane_core::EvidenceBuilder;
use incident_plane_core::EvidenceStore;
use incident_plane_core::Severity;
use incident_plane_core::runtime::EvidenceError;
use incident_plane_core::runtime::InMemoryEvidenceStore;

use common::detection;
use common::ts;

// ============================================================================
// SECTION: Graph Construction
// ============================================================================

/// Tests that member ordering does not change the graph identity.
#[test]
fn test_graph_identity_ignores_member_order() {
    let builder = EvidenceBuilder::new();
    let det_a = detection("det-a", "sig-1", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let det_b = detection("det-b", "sig-2", Severity::Sev2, "2026-01-16T10:05:00.000Z");

    let forward = builder
        .build_graph(&det_a.detection_id, &[det_a.clone(), det_b.clone()])
        .unwrap();
    let reversed = builder
        .build_graph(&det_a.detection_id.clone(), &[det_b, det_a])
        .unwrap();

    assert_eq!(forward.graph_id, reversed.graph_id);
    assert_eq!(forward.detection_ids, reversed.detection_ids);
    assert_eq!(forward.signal_ids, reversed.signal_ids);
}

/// Tests that detections sharing a signal are linked by an edge.
#[test]
fn test_edges_link_shared_signals() {
    let builder = EvidenceBuilder::new();
    let det_a = detection("det-a", "sig-shared", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let det_b = detection("det-b", "sig-shared", Severity::Sev2, "2026-01-16T10:05:00.000Z");
    let det_c = detection("det-c", "sig-other", Severity::Sev2, "2026-01-16T10:10:00.000Z");

    let graph = builder
        .build_graph(&det_a.detection_id.clone(), &[det_a, det_b, det_c])
        .unwrap();

    // Duplicate signals collapse in the member set.
    assert_eq!(graph.signal_ids.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].from_detection_id.as_str(), "det-a");
    assert_eq!(graph.edges[0].to_detection_id.as_str(), "det-b");
    assert_eq!(graph.edges[0].shared_signal_ids[0].as_str(), "sig-shared");
}

/// Tests that an empty member set is rejected.
#[test]
fn test_empty_member_set_rejected() {
    let builder = EvidenceBuilder::new();
    let det = detection("det-a", "sig-1", Severity::Sev2, "2026-01-16T10:00:00.000Z");

    assert!(matches!(
        builder.build_graph(&det.detection_id, &[]),
        Err(EvidenceError::Empty)
    ));
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Tests the conditional graph write contract.
#[test]
fn test_store_graph_converges() {
    let builder = EvidenceBuilder::new();
    let store = InMemoryEvidenceStore::new();
    let det = detection("det-a", "sig-1", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let graph = builder
        .build_graph(&det.detection_id, std::slice::from_ref(&det))
        .unwrap();

    let first = builder.store_graph(graph.clone(), &store).unwrap();
    let second = builder.store_graph(graph.clone(), &store).unwrap();

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(
        store.get_graph_for_detection(&det.detection_id).unwrap(),
        Some(graph)
    );
}

// ============================================================================
// SECTION: Bundles
// ============================================================================

/// Tests the rolled-up bundle summary and its single exposed timestamp.
#[test]
fn test_bundle_summary_rolls_up_members() {
    let builder = EvidenceBuilder::new();
    let store = InMemoryEvidenceStore::new();
    let det_a = detection("det-a", "sig-1", Severity::Sev1, "2026-01-16T10:00:00.000Z");
    let mut det_b = detection("det-b", "sig-2", Severity::Sev2, "2026-01-16T10:20:00.000Z");
    det_b.rule_id = "queue-depth".into();

    let graph = builder
        .build_graph(&det_a.detection_id, &[det_a.clone(), det_b.clone()])
        .unwrap();
    let bundled_at = ts("2026-01-16T10:21:00.000Z");
    let bundle = builder.build_bundle(graph, &[det_a, det_b], bundled_at).unwrap();

    assert_eq!(bundle.summary.detection_count, 2);
    assert_eq!(bundle.summary.signal_count, 2);
    assert_eq!(bundle.summary.severity_distribution.get("SEV1"), Some(&1));
    assert_eq!(bundle.summary.severity_distribution.get("SEV2"), Some(&1));
    assert_eq!(bundle.summary.earliest_observation, ts("2026-01-16T10:00:00.000Z"));
    assert_eq!(bundle.summary.latest_observation, ts("2026-01-16T10:20:00.000Z"));
    assert_eq!(bundle.summary.unique_rules, 2);
    assert_eq!(bundle.bundled_at, bundled_at);

    // Bundles store conditionally like every other record.
    assert!(store.put_bundle(&bundle).unwrap());
    assert!(!store.put_bundle(&bundle).unwrap());
    assert_eq!(store.get_bundle(&bundle.graph.graph_id).unwrap(), Some(bundle));
}

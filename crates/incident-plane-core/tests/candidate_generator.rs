// crates/incident-plane-core/tests/candidate_generator.rs
// ============================================================================
// Module: Candidate Generator Tests
// Description: Window semantics, primary selection, and identity determinism.
// ============================================================================
//! ## Overview
//! Exercises correlation over seeded detection stores: inclusive-start
//! exclusive-end windows, the integrity gate, min/max thresholds, the
//! severity-then-earliest-then-lexical tiebreak chain, key-field resolution
//! with window truncation, and convergence of repeated generation.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

mod common;

use incident_plane_core::CandidateGenerator;
use incident_plane_core::Detection;
use incident_plane_core::DetectionStore;
use incident_plane_core::EvidenceBuilder;
use incident_plane_core::EvidenceStore;
use incident_plane_core::NormalizedSignal;
use incident_plane_core::Severity;
use incident_plane_core::core::detection::DetectionMetadata;
use incident_plane_core::runtime::InMemoryCandidateStore;
use incident_plane_core::runtime::InMemoryDetectionStore;
use incident_plane_core::runtime::InMemoryEvidenceStore;
use incident_plane_core::runtime::InMemorySignalStore;

use common::correlation_rule;
use common::detection;
use common::signal;
use common::ts;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Seeded store bundle for one generation run.
struct Harness {
    signals: InMemorySignalStore,
    detections: InMemoryDetectionStore,
    evidence: InMemoryEvidenceStore,
    candidates: InMemoryCandidateStore,
}

impl Harness {
    fn new() -> Self {
        Self {
            signals: InMemorySignalStore::new(),
            detections: InMemoryDetectionStore::new(),
            evidence: InMemoryEvidenceStore::new(),
            candidates: InMemoryCandidateStore::new(),
        }
    }

    /// Seeds one detection with its signal and evidence graph.
    fn seed(&self, det: &Detection, sig: &NormalizedSignal) {
        self.signals.insert(sig.clone()).unwrap();
        let metadata = DetectionMetadata {
            detection_id: det.detection_id.clone(),
            detected_at: det.signal_timestamp,
        };
        self.detections.put_detection(det, &metadata).unwrap();
        let graph = EvidenceBuilder::new()
            .build_graph(&det.detection_id, std::slice::from_ref(det))
            .unwrap();
        self.evidence.put_graph(&graph).unwrap();
    }

    /// Seeds a detection without its evidence graph.
    fn seed_without_graph(&self, det: &Detection, sig: &NormalizedSignal) {
        self.signals.insert(sig.clone()).unwrap();
        let metadata = DetectionMetadata {
            detection_id: det.detection_id.clone(),
            detected_at: det.signal_timestamp,
        };
        self.detections.put_detection(det, &metadata).unwrap();
    }
}

// ============================================================================
// SECTION: Primary Selection
// ============================================================================

/// Tests that the highest severity wins primary selection.
#[test]
fn test_primary_selection_highest_severity_wins() {
    let harness = Harness::new();
    let det_1 = detection("det-1", "sig-1", Severity::Sev3, "2026-01-16T10:00:00.000Z");
    let det_2 = detection("det-2", "sig-2", Severity::Sev1, "2026-01-16T10:30:00.000Z");
    let det_3 = detection("det-3", "sig-3", Severity::Sev2, "2026-01-16T10:15:00.000Z");
    harness.seed(&det_1, &signal("sig-1", "2026-01-16T10:00:00.000Z"));
    harness.seed(&det_2, &signal("sig-2", "2026-01-16T10:30:00.000Z"));
    harness.seed(&det_3, &signal("sig-3", "2026-01-16T10:15:00.000Z"));

    let generated = CandidateGenerator::new()
        .generate(
            &det_2,
            &signal("sig-2", "2026-01-16T10:30:00.000Z"),
            &correlation_rule(),
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:31:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    assert_eq!(generated.candidate.primary_detection_id.as_str(), "det-2");
    assert_eq!(generated.candidate.suggested_severity, Severity::Sev1);
    assert_eq!(generated.candidate.detection_ids.len(), 3);
}

/// Tests the lexical tiebreak at equal severity and time.
#[test]
fn test_primary_selection_lexical_tiebreak() {
    let harness = Harness::new();
    let det_b = detection("det-b", "sig-b", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let det_a = detection("det-a", "sig-a", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let trigger = detection("det-z", "sig-z", Severity::Sev3, "2026-01-16T10:30:00.000Z");
    harness.seed(&det_b, &signal("sig-b", "2026-01-16T10:00:00.000Z"));
    harness.seed(&det_a, &signal("sig-a", "2026-01-16T10:00:00.000Z"));
    harness.seed(&trigger, &signal("sig-z", "2026-01-16T10:30:00.000Z"));

    let generated = CandidateGenerator::new()
        .generate(
            &trigger,
            &signal("sig-z", "2026-01-16T10:30:00.000Z"),
            &correlation_rule(),
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:31:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    assert_eq!(generated.candidate.primary_detection_id.as_str(), "det-a");
}

// ============================================================================
// SECTION: Window Semantics
// ============================================================================

/// Tests the inclusive-start exclusive-end window contract.
#[test]
fn test_window_is_inclusive_start_exclusive_end() {
    let harness = Harness::new();
    // Window for a 10:30 trigger with 60 minutes: [09:30, 10:30).
    let at_start = detection("det-start", "sig-s", Severity::Sev2, "2026-01-16T09:30:00.000Z");
    let at_end = detection("det-end", "sig-e", Severity::Sev2, "2026-01-16T10:30:00.000Z");
    let trigger = detection("det-t", "sig-t", Severity::Sev2, "2026-01-16T10:30:00.000Z");
    harness.seed(&at_start, &signal("sig-s", "2026-01-16T09:30:00.000Z"));
    harness.seed(&at_end, &signal("sig-e", "2026-01-16T10:30:00.000Z"));
    harness.seed(&trigger, &signal("sig-t", "2026-01-16T10:30:00.000Z"));

    let generated = CandidateGenerator::new()
        .generate(
            &trigger,
            &signal("sig-t", "2026-01-16T10:30:00.000Z"),
            &correlation_rule(),
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:31:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    let ids: Vec<&str> = generated
        .candidate
        .detection_ids
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert!(ids.contains(&"det-start"));
    assert!(ids.contains(&"det-t"));
    assert!(!ids.contains(&"det-end"));
}

/// Tests the hour truncation of the window key field.
#[test]
fn test_window_truncation_key_field() {
    let harness = Harness::new();
    let trigger = detection("det-t", "sig-t", Severity::Sev2, "2026-01-16T10:35:45.123Z");
    harness.seed(&trigger, &signal("sig-t", "2026-01-16T10:35:45.123Z"));

    let generated = CandidateGenerator::new()
        .generate(
            &trigger,
            &signal("sig-t", "2026-01-16T10:35:45.123Z"),
            &correlation_rule(),
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:36:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    assert_eq!(
        generated.candidate.resolved_key_fields.get("windowTruncated"),
        Some(&"2026-01-16T10:00:00.000Z".to_string())
    );
}

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Tests that exactly min detections emits and one below does not.
#[test]
fn test_min_detections_boundary() {
    let harness = Harness::new();
    let det_1 = detection("det-1", "sig-1", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let det_2 = detection("det-2", "sig-2", Severity::Sev2, "2026-01-16T10:10:00.000Z");
    harness.seed(&det_1, &signal("sig-1", "2026-01-16T10:00:00.000Z"));
    harness.seed(&det_2, &signal("sig-2", "2026-01-16T10:10:00.000Z"));

    let mut rule = correlation_rule();
    rule.min_detections = 2;

    let at_threshold = CandidateGenerator::new()
        .generate(
            &det_2,
            &signal("sig-2", "2026-01-16T10:10:00.000Z"),
            &rule,
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:11:00.000Z"),
        )
        .unwrap();
    assert!(at_threshold.is_some());

    rule.min_detections = 3;
    let below_threshold = CandidateGenerator::new()
        .generate(
            &det_2,
            &signal("sig-2", "2026-01-16T10:10:00.000Z"),
            &rule,
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:11:00.000Z"),
        )
        .unwrap();
    assert!(below_threshold.is_none());
}

/// Tests that truncation applies the deterministic sort before cutting.
#[test]
fn test_max_detections_truncates_after_sort() {
    let harness = Harness::new();
    let low = detection("det-low", "sig-1", Severity::Sev4, "2026-01-16T10:00:00.000Z");
    let mid = detection("det-mid", "sig-2", Severity::Sev2, "2026-01-16T10:05:00.000Z");
    let high = detection("det-high", "sig-3", Severity::Sev1, "2026-01-16T10:10:00.000Z");
    harness.seed(&low, &signal("sig-1", "2026-01-16T10:00:00.000Z"));
    harness.seed(&mid, &signal("sig-2", "2026-01-16T10:05:00.000Z"));
    harness.seed(&high, &signal("sig-3", "2026-01-16T10:10:00.000Z"));

    let mut rule = correlation_rule();
    rule.max_detections = 2;

    let generated = CandidateGenerator::new()
        .generate(
            &high,
            &signal("sig-3", "2026-01-16T10:10:00.000Z"),
            &rule,
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:11:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    // The SEV4 member is the one cut.
    let ids: Vec<&str> = generated
        .candidate
        .detection_ids
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"det-high"));
    assert!(ids.contains(&"det-mid"));
}

// ============================================================================
// SECTION: Integrity Gate
// ============================================================================

/// Tests that members without a bound evidence graph are rejected.
#[test]
fn test_integrity_gate_rejects_unbound_members() {
    let harness = Harness::new();
    let verified = detection("det-ok", "sig-1", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let unverified = detection("det-bad", "sig-2", Severity::Sev2, "2026-01-16T10:05:00.000Z");
    harness.seed(&verified, &signal("sig-1", "2026-01-16T10:00:00.000Z"));
    harness.seed_without_graph(&unverified, &signal("sig-2", "2026-01-16T10:05:00.000Z"));

    let generated = CandidateGenerator::new()
        .generate(
            &verified,
            &signal("sig-1", "2026-01-16T10:00:00.000Z"),
            &correlation_rule(),
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:06:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    let ids: Vec<&str> = generated
        .candidate
        .detection_ids
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(ids, vec!["det-ok"]);
}

// ============================================================================
// SECTION: Determinism
// ============================================================================

/// Tests that repeated generation converges on one candidate identity.
#[test]
fn test_repeated_generation_converges() {
    let harness = Harness::new();
    let trigger = detection("det-t", "sig-t", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    harness.seed(&trigger, &signal("sig-t", "2026-01-16T10:00:00.000Z"));

    let generator = CandidateGenerator::new();
    let first = generator
        .generate(
            &trigger,
            &signal("sig-t", "2026-01-16T10:00:00.000Z"),
            &correlation_rule(),
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:01:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");
    let second = generator
        .generate(
            &trigger,
            &signal("sig-t", "2026-01-16T10:00:00.000Z"),
            &correlation_rule(),
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:02:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.candidate.candidate_id, second.candidate.candidate_id);
}

/// Tests that seeding order does not affect candidate identity.
#[test]
fn test_seeding_order_does_not_affect_identity() {
    let det_1 = detection("det-1", "sig-1", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    let det_2 = detection("det-2", "sig-2", Severity::Sev2, "2026-01-16T10:05:00.000Z");
    let sig_1 = signal("sig-1", "2026-01-16T10:00:00.000Z");
    let sig_2 = signal("sig-2", "2026-01-16T10:05:00.000Z");

    let forward = Harness::new();
    forward.seed(&det_1, &sig_1);
    forward.seed(&det_2, &sig_2);
    let reversed = Harness::new();
    reversed.seed(&det_2, &sig_2);
    reversed.seed(&det_1, &sig_1);

    let generator = CandidateGenerator::new();
    let left = generator
        .generate(
            &det_2,
            &sig_2,
            &correlation_rule(),
            &forward.detections,
            &forward.signals,
            &forward.evidence,
            &forward.candidates,
            ts("2026-01-16T10:06:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");
    let right = generator
        .generate(
            &det_2,
            &sig_2,
            &correlation_rule(),
            &reversed.detections,
            &reversed.signals,
            &reversed.evidence,
            &reversed.candidates,
            ts("2026-01-16T10:06:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    assert_eq!(left.candidate.candidate_id, right.candidate.candidate_id);
    assert_eq!(left.candidate.correlation_key, right.candidate.correlation_key);
}

/// Tests that distinct key-field sets produce distinct candidates.
#[test]
fn test_key_fields_fold_into_identity() {
    let harness = Harness::new();
    let trigger = detection("det-t", "sig-t", Severity::Sev2, "2026-01-16T10:00:00.000Z");
    harness.seed(&trigger, &signal("sig-t", "2026-01-16T10:00:00.000Z"));

    let by_service = correlation_rule();
    let mut by_rule = correlation_rule();
    by_rule.key_fields =
        vec![incident_plane_core::KeyField::RuleId, incident_plane_core::KeyField::WindowTruncated];

    let generator = CandidateGenerator::new();
    let left = generator
        .generate(
            &trigger,
            &signal("sig-t", "2026-01-16T10:00:00.000Z"),
            &by_service,
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:01:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");
    let right = generator
        .generate(
            &trigger,
            &signal("sig-t", "2026-01-16T10:00:00.000Z"),
            &by_rule,
            &harness.detections,
            &harness.signals,
            &harness.evidence,
            &harness.candidates,
            ts("2026-01-16T10:01:00.000Z"),
        )
        .unwrap()
        .expect("candidate expected");

    assert_ne!(left.candidate.candidate_id, right.candidate.candidate_id);
}

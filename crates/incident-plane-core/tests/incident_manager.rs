// crates/incident-plane-core/tests/incident_manager.rs
// ============================================================================
// Module: Incident Manager Tests
// Description: State machine, authority matrix, locking, and hash chain.
// ============================================================================
//! ## Overview
//! Drives incidents through their lifecycle: idempotent creation from a
//! promotion decision, legal and illegal transitions, the authority matrix
//! at both severity columns, optimistic-concurrency conflicts, and
//! byte-for-byte hash chain replay.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

mod common;

use incident_plane_core::AuthorityType;
use incident_plane_core::BlastRadius;
use incident_plane_core::BlastScope;
use incident_plane_core::Candidate;
use incident_plane_core::CandidateId;
use incident_plane_core::ConfidenceBand;
use incident_plane_core::GraphId;
use incident_plane_core::ImpactBand;
use incident_plane_core::Incident;
use incident_plane_core::IncidentAction;
use incident_plane_core::IncidentManager;
use incident_plane_core::IncidentState;
use incident_plane_core::PolicyId;
use incident_plane_core::PolicyVersion;
use incident_plane_core::PromotionDecision;
use incident_plane_core::PromotionVerdict;
use incident_plane_core::Resolution;
use incident_plane_core::RuleId;
use incident_plane_core::RuleVersion;
use incident_plane_core::ServiceName;
use incident_plane_core::Severity;
use incident_plane_core::StoreError;
use incident_plane_core::TransitionRequest;
use incident_plane_core::interfaces::IncidentStore;
use incident_plane_core::runtime::CollectingEmitter;
use incident_plane_core::runtime::IncidentError;
use incident_plane_core::runtime::InMemoryIncidentStore;
use incident_plane_core::runtime::permitted_authorities;
use incident_plane_core::sha256_hex;

use common::authority;
use common::ts;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a candidate suggesting the given severity.
fn candidate(severity: Severity) -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(sha256_hex(b"candidate-incident-fixture")),
        correlation_key: sha256_hex(b"correlation-incident-fixture"),
        correlation_rule_id: RuleId::new("checkout-correlation"),
        correlation_rule_version: RuleVersion::new("1.0.0"),
        detection_ids: vec!["det-a".into()],
        resolved_key_fields: std::collections::BTreeMap::new(),
        primary_detection_id: "det-a".into(),
        suggested_severity: severity,
        suggested_service: ServiceName::new("checkout"),
        suggested_title: "checkout: 1 correlated detection".to_string(),
        confidence_score: 0.7,
        confidence_band: ConfidenceBand::High,
        confidence_factors: Vec::new(),
        blast_radius: BlastRadius {
            scope: BlastScope::SingleService,
            affected_services: vec![ServiceName::new("checkout")],
            estimated_impact: ImpactBand::Major,
        },
        generation_trace: Vec::new(),
        window_start: ts("2026-01-19T11:00:00.000Z"),
        window_end: ts("2026-01-19T11:30:00.000Z"),
        created_at: ts("2026-01-19T11:30:00.000Z"),
    }
}

/// Builds a PROMOTE decision for the fixture candidate.
fn promote_decision() -> PromotionDecision {
    let candidate = candidate(Severity::Sev2);
    PromotionDecision {
        decision_id: sha256_hex(b"decision-incident-fixture").into(),
        candidate_id: candidate.candidate_id,
        decision: PromotionVerdict::Promote,
        reason: "all policy gates passed".to_string(),
        policy_id: PolicyId::new("default"),
        policy_version: PolicyVersion::new("1.0.0"),
        request_context_hash: sha256_hex(b"context"),
        decision_hash: sha256_hex(b"decision-hash"),
        evaluation_trace: Vec::new(),
        decided_at: ts("2026-01-19T12:00:00.000Z"),
    }
}

/// Creates an incident of the given severity and returns it with its store.
fn created(severity: Severity) -> (Incident, InMemoryIncidentStore, IncidentManager) {
    let store = InMemoryIncidentStore::new();
    let manager = IncidentManager::new();
    let created = manager
        .create_from_decision(
            &promote_decision(),
            &candidate(severity),
            &GraphId::new(sha256_hex(b"graph-incident-fixture")),
            &authority("engine:auto", AuthorityType::AutoEngine),
            ts("2026-01-19T12:00:00.000Z"),
            &store,
        )
        .unwrap();
    (created.incident, store, manager)
}

/// Applies one action through the manager.
fn act(
    manager: &IncidentManager,
    store: &InMemoryIncidentStore,
    incident: &Incident,
    action: IncidentAction,
    kind: AuthorityType,
    at: &str,
    resolution: Option<Resolution>,
) -> Result<Incident, IncidentError> {
    let emitter = CollectingEmitter::new();
    manager.transition(
        &TransitionRequest {
            incident_id: incident.incident_id.clone(),
            action,
            authority: authority("user:oncall@example.com", kind),
            note: None,
            resolution,
            current_time: ts(at),
        },
        store,
        &emitter,
    )
}

/// Standard resolution block.
fn resolution() -> Resolution {
    Resolution {
        root_cause: "bad deploy".to_string(),
        action_taken: "rolled back".to_string(),
        follow_ups: Vec::new(),
    }
}

// ============================================================================
// SECTION: Creation
// ============================================================================

/// Tests that creation from one decision is idempotent.
#[test]
fn test_creation_converges_on_evidence_identity() {
    let store = InMemoryIncidentStore::new();
    let manager = IncidentManager::new();
    let evidence = GraphId::new(sha256_hex(b"graph-incident-fixture"));

    let first = manager
        .create_from_decision(
            &promote_decision(),
            &candidate(Severity::Sev2),
            &evidence,
            &authority("engine:auto", AuthorityType::AutoEngine),
            ts("2026-01-19T12:00:00.000Z"),
            &store,
        )
        .unwrap();
    // A later retry at a different wall-clock time still converges.
    let second = manager
        .create_from_decision(
            &promote_decision(),
            &candidate(Severity::Sev2),
            &evidence,
            &authority("engine:auto", AuthorityType::AutoEngine),
            ts("2026-01-19T12:05:00.000Z"),
            &store,
        )
        .unwrap();

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.incident.incident_id, second.incident.incident_id);
    assert_eq!(first.incident.state, IncidentState::Pending);
}

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Tests the full forward lifecycle with ordered timestamps.
#[test]
fn test_full_lifecycle() {
    let (incident, store, manager) = created(Severity::Sev2);

    let opened = act(
        &manager,
        &store,
        &incident,
        IncidentAction::Open,
        AuthorityType::AutoEngine,
        "2026-01-19T12:01:00.000Z",
        None,
    )
    .unwrap();
    let acked = act(
        &manager,
        &store,
        &opened,
        IncidentAction::Acknowledge,
        AuthorityType::HumanOperator,
        "2026-01-19T12:05:00.000Z",
        None,
    )
    .unwrap();
    let mitigated = act(
        &manager,
        &store,
        &acked,
        IncidentAction::Mitigate,
        AuthorityType::HumanOperator,
        "2026-01-19T12:20:00.000Z",
        None,
    )
    .unwrap();
    let resolved = act(
        &manager,
        &store,
        &mitigated,
        IncidentAction::Resolve,
        AuthorityType::HumanOperator,
        "2026-01-19T12:40:00.000Z",
        Some(resolution()),
    )
    .unwrap();
    let closed = act(
        &manager,
        &store,
        &resolved,
        IncidentAction::Close,
        AuthorityType::HumanOperator,
        "2026-01-19T13:00:00.000Z",
        None,
    )
    .unwrap();

    assert_eq!(closed.state, IncidentState::Closed);
    assert!(closed.opened_at <= closed.acknowledged_at);
    assert!(closed.acknowledged_at <= closed.mitigated_at);
    assert!(closed.mitigated_at <= closed.resolved_at);
    assert!(closed.resolved_at <= closed.closed_at);
    assert_eq!(closed.version, 6);
}

/// Tests that skipping states is rejected with both states named.
#[test]
fn test_illegal_transition_is_rejected() {
    let (incident, store, manager) = created(Severity::Sev2);

    let outcome = act(
        &manager,
        &store,
        &incident,
        IncidentAction::Mitigate,
        AuthorityType::HumanOperator,
        "2026-01-19T12:01:00.000Z",
        None,
    );

    assert!(matches!(
        outcome,
        Err(IncidentError::IllegalTransition {
            current: "PENDING",
            attempted: "MITIGATED",
        })
    ));
}

/// Tests that a closed incident accepts nothing further.
#[test]
fn test_closed_is_terminal() {
    let (incident, store, manager) = created(Severity::Sev2);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:01:00.000Z", None).unwrap();
    let acked = act(&manager, &store, &opened, IncidentAction::Acknowledge, AuthorityType::HumanOperator, "2026-01-19T12:02:00.000Z", None).unwrap();
    let mitigated = act(&manager, &store, &acked, IncidentAction::Mitigate, AuthorityType::HumanOperator, "2026-01-19T12:03:00.000Z", None).unwrap();
    let resolved = act(&manager, &store, &mitigated, IncidentAction::Resolve, AuthorityType::HumanOperator, "2026-01-19T12:04:00.000Z", Some(resolution())).unwrap();
    let closed = act(&manager, &store, &resolved, IncidentAction::Close, AuthorityType::HumanOperator, "2026-01-19T12:05:00.000Z", None).unwrap();

    let annotate = act(
        &manager,
        &store,
        &closed,
        IncidentAction::Annotate,
        AuthorityType::HumanOperator,
        "2026-01-19T12:06:00.000Z",
        None,
    );
    assert!(matches!(annotate, Err(IncidentError::IllegalTransition { .. })));
}

/// Tests self-transition annotations and resolution immutability.
#[test]
fn test_annotations_and_resolution_immutability() {
    let (incident, store, manager) = created(Severity::Sev2);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:01:00.000Z", None).unwrap();

    // A state may re-enter itself via an annotation event.
    let annotated = act(
        &manager,
        &store,
        &opened,
        IncidentAction::Annotate,
        AuthorityType::HumanOperator,
        "2026-01-19T12:02:00.000Z",
        None,
    )
    .unwrap();
    assert_eq!(annotated.state, IncidentState::Open);
    assert_eq!(annotated.version, opened.version + 1);

    let acked = act(&manager, &store, &annotated, IncidentAction::Acknowledge, AuthorityType::HumanOperator, "2026-01-19T12:03:00.000Z", None).unwrap();
    let mitigated = act(&manager, &store, &acked, IncidentAction::Mitigate, AuthorityType::HumanOperator, "2026-01-19T12:04:00.000Z", None).unwrap();
    let resolved = act(&manager, &store, &mitigated, IncidentAction::Resolve, AuthorityType::HumanOperator, "2026-01-19T12:05:00.000Z", Some(resolution())).unwrap();

    // Re-resolving with different metadata is refused.
    let tampered = act(
        &manager,
        &store,
        &resolved,
        IncidentAction::Resolve,
        AuthorityType::HumanOperator,
        "2026-01-19T12:06:00.000Z",
        Some(Resolution {
            root_cause: "different".to_string(),
            action_taken: "different".to_string(),
            follow_ups: Vec::new(),
        }),
    );
    assert!(matches!(tampered, Err(IncidentError::ResolutionImmutable)));
}

/// Tests that RESOLVE without a resolution block is refused.
#[test]
fn test_resolve_requires_resolution() {
    let (incident, store, manager) = created(Severity::Sev2);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:01:00.000Z", None).unwrap();
    let acked = act(&manager, &store, &opened, IncidentAction::Acknowledge, AuthorityType::HumanOperator, "2026-01-19T12:02:00.000Z", None).unwrap();
    let mitigated = act(&manager, &store, &acked, IncidentAction::Mitigate, AuthorityType::HumanOperator, "2026-01-19T12:03:00.000Z", None).unwrap();

    let outcome = act(
        &manager,
        &store,
        &mitigated,
        IncidentAction::Resolve,
        AuthorityType::HumanOperator,
        "2026-01-19T12:04:00.000Z",
        None,
    );
    assert!(matches!(outcome, Err(IncidentError::MissingResolution)));
}

/// Tests that a transition time before a set timestamp is refused.
#[test]
fn test_temporal_ordering_is_enforced() {
    let (incident, store, manager) = created(Severity::Sev2);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:10:00.000Z", None).unwrap();

    let backwards = act(
        &manager,
        &store,
        &opened,
        IncidentAction::Acknowledge,
        AuthorityType::HumanOperator,
        "2026-01-19T12:05:00.000Z",
        None,
    );
    assert!(matches!(backwards, Err(IncidentError::TemporalOrder { .. })));
}

// ============================================================================
// SECTION: Authority Matrix
// ============================================================================

/// Tests that the engine can open but never resolve or close.
#[test]
fn test_auto_engine_limits() {
    let (incident, store, manager) = created(Severity::Sev2);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:01:00.000Z", None).unwrap();
    let acked = act(&manager, &store, &opened, IncidentAction::Acknowledge, AuthorityType::HumanOperator, "2026-01-19T12:02:00.000Z", None).unwrap();
    let mitigated = act(&manager, &store, &acked, IncidentAction::Mitigate, AuthorityType::HumanOperator, "2026-01-19T12:03:00.000Z", None).unwrap();

    let resolve = act(
        &manager,
        &store,
        &mitigated,
        IncidentAction::Resolve,
        AuthorityType::AutoEngine,
        "2026-01-19T12:04:00.000Z",
        Some(resolution()),
    );
    assert!(matches!(resolve, Err(IncidentError::Authority { .. })));

    let resolved = act(&manager, &store, &mitigated, IncidentAction::Resolve, AuthorityType::HumanOperator, "2026-01-19T12:04:00.000Z", Some(resolution())).unwrap();
    let close = act(
        &manager,
        &store,
        &resolved,
        IncidentAction::Close,
        AuthorityType::AutoEngine,
        "2026-01-19T12:05:00.000Z",
        None,
    );
    assert!(matches!(close, Err(IncidentError::Authority { .. })));
}

/// Tests the SEV1 resolve column of the authority matrix.
#[test]
fn test_sev1_resolve_requires_oncall_or_override() {
    let (incident, store, manager) = created(Severity::Sev1);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:01:00.000Z", None).unwrap();
    let acked = act(&manager, &store, &opened, IncidentAction::Acknowledge, AuthorityType::HumanOperator, "2026-01-19T12:02:00.000Z", None).unwrap();
    let mitigated = act(&manager, &store, &acked, IncidentAction::Mitigate, AuthorityType::HumanOperator, "2026-01-19T12:03:00.000Z", None).unwrap();

    let operator = act(
        &manager,
        &store,
        &mitigated,
        IncidentAction::Resolve,
        AuthorityType::HumanOperator,
        "2026-01-19T12:04:00.000Z",
        Some(resolution()),
    );
    assert!(matches!(operator, Err(IncidentError::Authority { .. })));

    let oncall = act(
        &manager,
        &store,
        &mitigated,
        IncidentAction::Resolve,
        AuthorityType::OnCallSre,
        "2026-01-19T12:04:00.000Z",
        Some(resolution()),
    );
    assert!(oncall.is_ok());

    // The matrix itself names the permitted set.
    let permitted = permitted_authorities(IncidentAction::Resolve, Severity::Sev1);
    assert_eq!(permitted, vec![AuthorityType::OnCallSre, AuthorityType::EmergencyOverride]);
}

// ============================================================================
// SECTION: Optimistic Locking
// ============================================================================

/// Tests that a stale version surfaces as a conflict, not an overwrite.
#[test]
fn test_version_conflict_surfaces() {
    let (incident, store, manager) = created(Severity::Sev2);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:01:00.000Z", None).unwrap();

    // Simulate a concurrent writer by updating with a stale expected version.
    let mut stale = opened.clone();
    stale.version += 1;
    stale.event_seq += 1;
    let event = store.get_events(&opened.incident_id).unwrap().pop().unwrap();
    let conflict = store.update_incident(&stale, &event, opened.version - 1);

    assert!(matches!(conflict, Err(StoreError::VersionConflict { .. })));
    // The stored record is untouched.
    assert_eq!(
        store.get_incident(&opened.incident_id).unwrap().unwrap().version,
        opened.version
    );
}

// ============================================================================
// SECTION: Hash Chain
// ============================================================================

/// Tests byte-for-byte hash chain replay across the full lifecycle.
#[test]
fn test_hash_chain_replays_byte_identically() {
    let (incident, store, manager) = created(Severity::Sev2);
    let opened = act(&manager, &store, &incident, IncidentAction::Open, AuthorityType::AutoEngine, "2026-01-19T12:01:00.000Z", None).unwrap();
    let acked = act(&manager, &store, &opened, IncidentAction::Acknowledge, AuthorityType::HumanOperator, "2026-01-19T12:02:00.000Z", None).unwrap();
    let mitigated = act(&manager, &store, &acked, IncidentAction::Mitigate, AuthorityType::HumanOperator, "2026-01-19T12:03:00.000Z", None).unwrap();
    let resolved = act(&manager, &store, &mitigated, IncidentAction::Resolve, AuthorityType::HumanOperator, "2026-01-19T12:04:00.000Z", Some(resolution())).unwrap();
    let _closed = act(&manager, &store, &resolved, IncidentAction::Close, AuthorityType::HumanOperator, "2026-01-19T12:05:00.000Z", None).unwrap();

    manager.verify_chain(&incident.incident_id, &store).unwrap();

    // Every stored event carries a well-formed chain hash.
    let events = store.get_events(&incident.incident_id).unwrap();
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|event| event.state_hash_after.len() == 64));
}

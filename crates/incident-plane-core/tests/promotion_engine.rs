// crates/incident-plane-core/tests/promotion_engine.rs
// ============================================================================
// Module: Promotion Engine Tests
// Description: Policy gating, authority convergence, and audit behavior.
// ============================================================================
//! ## Overview
//! Exercises the four promotion substages over seeded candidates: request
//! validation, exact-version policy loading, deterministic evaluation, and
//! the converging conditional commit with best-effort audit.

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
use incident_plane_core::CandidateStore;
use incident_plane_core::ConfidenceBand;
use incident_plane_core::ImpactBand;
use incident_plane_core::PolicyId;
use incident_plane_core::PolicyVersion;
use incident_plane_core::PromotionAuditRecord;
use incident_plane_core::PromotionPolicy;
use incident_plane_core::PromotionRequest;
use incident_plane_core::PromotionVerdict;
use incident_plane_core::RuleId;
use incident_plane_core::RuleVersion;
use incident_plane_core::ServiceName;
use incident_plane_core::Severity;
use incident_plane_core::StoreError;
use incident_plane_core::interfaces::AuditStore;
use incident_plane_core::interfaces::DecisionStore as _;
use incident_plane_core::interfaces::PolicyCatalog;
use incident_plane_core::runtime::CollectingEmitter;
use incident_plane_core::runtime::InMemoryAuditStore;
use incident_plane_core::runtime::InMemoryCandidateStore;
use incident_plane_core::runtime::InMemoryDecisionStore;
use incident_plane_core::runtime::PromotionContext;
use incident_plane_core::runtime::PromotionEngine;
use incident_plane_core::runtime::PromotionError;
use incident_plane_core::sha256_hex;

use common::authority;
use common::policy;
use common::ts;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Single-policy catalog for tests.
struct OnePolicy(PromotionPolicy);

impl PolicyCatalog for OnePolicy {
    fn load_policy(
        &self,
        policy_id: &PolicyId,
        policy_version: &PolicyVersion,
    ) -> Result<Option<PromotionPolicy>, StoreError> {
        if policy_id == &self.0.policy_id && policy_version == &self.0.policy_version {
            Ok(Some(self.0.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Audit store that always fails.
struct FailingAuditStore;

impl AuditStore for FailingAuditStore {
    fn put_audit(&self, _record: &PromotionAuditRecord) -> Result<(), StoreError> {
        Err(StoreError::Io("audit table unavailable".to_string()))
    }
}

/// Builds a stored candidate with a hex identity.
fn candidate() -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(sha256_hex(b"candidate-fixture")),
        correlation_key: sha256_hex(b"correlation-fixture"),
        correlation_rule_id: RuleId::new("checkout-correlation"),
        correlation_rule_version: RuleVersion::new("1.0.0"),
        detection_ids: vec!["det-a".into(), "det-b".into()],
        resolved_key_fields: std::collections::BTreeMap::new(),
        primary_detection_id: "det-a".into(),
        suggested_severity: Severity::Sev2,
        suggested_service: ServiceName::new("checkout"),
        suggested_title: "checkout: 2 correlated detections".to_string(),
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

/// Builds a promotion request for the fixture candidate.
fn request(authority_id: &str, kind: AuthorityType) -> PromotionRequest {
    PromotionRequest {
        candidate_id: candidate().candidate_id,
        policy_id: PolicyId::new("default"),
        policy_version: PolicyVersion::new("1.0.0"),
        authority: authority(authority_id, kind),
        current_time: ts("2026-01-19T12:00:00.000Z"),
    }
}

/// Runs one promotion through fresh stores, returning the outcome and stores.
fn run(
    request: &PromotionRequest,
    policy: PromotionPolicy,
    context: &PromotionContext,
) -> (
    Result<incident_plane_core::runtime::PromotionOutcome, PromotionError>,
    InMemoryDecisionStore,
    InMemoryAuditStore,
) {
    let candidates = InMemoryCandidateStore::new();
    candidates.put_candidate(&candidate()).unwrap();
    let decisions = InMemoryDecisionStore::new();
    let audit = InMemoryAuditStore::new();
    let emitter = CollectingEmitter::new();

    let outcome = PromotionEngine::new().process(
        request,
        context,
        &candidates,
        &OnePolicy(policy),
        &decisions,
        &audit,
        &emitter,
    );
    (outcome, decisions, audit)
}

// ============================================================================
// SECTION: Convergence
// ============================================================================

/// Tests that two authorities with identical requests converge on one id.
#[test]
fn test_decision_id_converges_across_authorities() {
    let context = PromotionContext::default();
    let (alice, _, _) = run(
        &request("user:alice@example.com", AuthorityType::HumanOperator),
        policy(),
        &context,
    );
    let (bob, _, _) = run(
        &request("user:bob@example.com", AuthorityType::HumanOperator),
        policy(),
        &context,
    );

    let alice = alice.unwrap();
    let bob = bob.unwrap();
    assert_eq!(alice.decision.decision_id, bob.decision.decision_id);
    assert_eq!(alice.decision.decision_hash, bob.decision.decision_hash);
}

/// Tests that a repeated request converges instead of duplicating.
#[test]
fn test_repeated_request_converges() {
    let candidates = InMemoryCandidateStore::new();
    candidates.put_candidate(&candidate()).unwrap();
    let decisions = InMemoryDecisionStore::new();
    let audit = InMemoryAuditStore::new();
    let emitter = CollectingEmitter::new();
    let engine = PromotionEngine::new();
    let req = request("user:alice@example.com", AuthorityType::HumanOperator);
    let context = PromotionContext::default();

    let first = engine
        .process(&req, &context, &candidates, &OnePolicy(policy()), &decisions, &audit, &emitter)
        .unwrap();
    let second = engine
        .process(&req, &context, &candidates, &OnePolicy(policy()), &decisions, &audit, &emitter)
        .unwrap();

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.decision.decision_id, second.decision.decision_id);
    // One audit record and one event: emission happens only for first writes.
    assert_eq!(audit.snapshot().unwrap().len(), 1);
    assert_eq!(emitter.snapshot().unwrap().len(), 1);
}

// ============================================================================
// SECTION: Policy Gates
// ============================================================================

/// Tests the confidence eligibility floor.
#[test]
fn test_low_confidence_rejects() {
    let mut strict = policy();
    strict.eligibility.min_confidence = 0.9;

    let (outcome, _, _) = run(
        &request("user:alice@example.com", AuthorityType::HumanOperator),
        strict,
        &PromotionContext::default(),
    );

    let outcome = outcome.unwrap();
    assert_eq!(outcome.decision.decision, PromotionVerdict::Reject);
    assert!(outcome
        .decision
        .evaluation_trace
        .iter()
        .any(|check| check.check == "eligibility.minConfidence" && !check.passed));
}

/// Tests the candidate freshness window.
#[test]
fn test_stale_candidate_rejects() {
    let mut strict = policy();
    strict.eligibility.max_age_minutes = 10;

    let (outcome, _, _) = run(
        &request("user:alice@example.com", AuthorityType::HumanOperator),
        strict,
        &PromotionContext::default(),
    );

    // The fixture candidate is 30 minutes old at evaluation time.
    assert_eq!(outcome.unwrap().decision.decision, PromotionVerdict::Reject);
}

/// Tests that a disallowed authority type rejects.
#[test]
fn test_disallowed_authority_rejects() {
    let mut humans_only = policy();
    humans_only.allowed_authorities =
        vec![AuthorityType::HumanOperator, AuthorityType::OnCallSre];

    let (outcome, _, _) = run(
        &request("engine:auto", AuthorityType::AutoEngine),
        humans_only,
        &PromotionContext::default(),
    );

    assert_eq!(outcome.unwrap().decision.decision, PromotionVerdict::Reject);
}

/// Tests deferral while an incident for the service is active.
#[test]
fn test_active_incident_defers() {
    let mut deferring = policy();
    deferring.deferral.active_incident_same_service = true;

    let active = incident_plane_core::Incident {
        incident_id: incident_plane_core::IncidentId::new(sha256_hex(b"incident")),
        service: ServiceName::new("checkout"),
        evidence_id: incident_plane_core::GraphId::new(sha256_hex(b"graph")),
        candidate_id: CandidateId::new(sha256_hex(b"other-candidate")),
        decision_id: incident_plane_core::PromotionDecisionId::new(sha256_hex(b"other-decision")),
        state: incident_plane_core::IncidentState::Open,
        severity: Severity::Sev2,
        title: "checkout incident".to_string(),
        resolution: None,
        created_at: ts("2026-01-19T11:00:00.000Z"),
        opened_at: Some(ts("2026-01-19T11:05:00.000Z")),
        acknowledged_at: None,
        mitigated_at: None,
        resolved_at: None,
        closed_at: None,
        updated_at: ts("2026-01-19T11:05:00.000Z"),
        version: 2,
        event_seq: 2,
        timeline: Vec::new(),
    };
    let context = PromotionContext {
        existing_decisions: Vec::new(),
        active_incidents: vec![active],
    };

    let (outcome, _, _) = run(
        &request("user:alice@example.com", AuthorityType::HumanOperator),
        deferring,
        &context,
    );

    assert_eq!(outcome.unwrap().decision.decision, PromotionVerdict::Defer);
}

// ============================================================================
// SECTION: Request Validation
// ============================================================================

/// Tests that an emergency override demands a substantive justification.
#[test]
fn test_emergency_override_requires_justification() {
    let mut req = request("user:root@example.com", AuthorityType::EmergencyOverride);
    req.authority.justification = Some("short".to_string());

    let (outcome, _, _) = run(&req, policy(), &PromotionContext::default());

    assert!(matches!(
        outcome,
        Err(PromotionError::Validation {
            field: "authority.justification",
            ..
        })
    ));
}

/// Tests the not-found paths for candidate and policy.
#[test]
fn test_missing_records_fail_closed() {
    let candidates = InMemoryCandidateStore::new();
    let decisions = InMemoryDecisionStore::new();
    let audit = InMemoryAuditStore::new();
    let emitter = CollectingEmitter::new();
    let engine = PromotionEngine::new();
    let req = request("user:alice@example.com", AuthorityType::HumanOperator);

    // Candidate missing entirely.
    let missing_candidate = engine.process(
        &req,
        &PromotionContext::default(),
        &candidates,
        &OnePolicy(policy()),
        &decisions,
        &audit,
        &emitter,
    );
    assert!(matches!(missing_candidate, Err(PromotionError::CandidateNotFound(_))));

    // Candidate present, policy version absent.
    candidates.put_candidate(&candidate()).unwrap();
    let mut req = req;
    req.policy_version = PolicyVersion::new("9.9.9");
    let missing_policy = engine.process(
        &req,
        &PromotionContext::default(),
        &candidates,
        &OnePolicy(policy()),
        &decisions,
        &audit,
        &emitter,
    );
    assert!(matches!(missing_policy, Err(PromotionError::PolicyNotFound { .. })));
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Tests that audit failure never blocks decision persistence.
#[test]
fn test_audit_failure_does_not_block_decision() {
    let candidates = InMemoryCandidateStore::new();
    candidates.put_candidate(&candidate()).unwrap();
    let decisions = InMemoryDecisionStore::new();
    let emitter = CollectingEmitter::new();
    let req = request("user:alice@example.com", AuthorityType::HumanOperator);

    let outcome = PromotionEngine::new()
        .process(
            &req,
            &PromotionContext::default(),
            &candidates,
            &OnePolicy(policy()),
            &decisions,
            &FailingAuditStore,
            &emitter,
        )
        .unwrap();

    assert!(outcome.is_new);
    assert_eq!(
        decisions.get_decision(&outcome.decision.decision_id).unwrap(),
        Some(outcome.decision)
    );
}

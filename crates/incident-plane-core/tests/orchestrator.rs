// crates/incident-plane-core/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator Tests
// Description: End-to-end convergence of the promotion path.
// ============================================================================
//! ## Overview
//! Runs the full `candidate -> decision -> incident` path under idempotency
//! claims: repeated identical attempts converge on one decision and one
//! incident, verdicts other than PROMOTE create nothing, and the kill switch
//! refuses automated attempts.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

mod common;

use incident_plane_core::AuthorityType;
use incident_plane_core::CandidateGenerator;
use incident_plane_core::DetectionStore;
use incident_plane_core::EvidenceBuilder;
use incident_plane_core::EvidenceStore;
use incident_plane_core::IncidentManager;
use incident_plane_core::IncidentState;
use incident_plane_core::Orchestrator;
use incident_plane_core::OrchestratorDeps;
use incident_plane_core::PolicyId;
use incident_plane_core::PolicyVersion;
use incident_plane_core::PromotionPolicy;
use incident_plane_core::PromotionRequest;
use incident_plane_core::PromotionVerdict;
use incident_plane_core::Severity;
use incident_plane_core::StoreError;
use incident_plane_core::core::detection::DetectionMetadata;
use incident_plane_core::interfaces::PolicyCatalog;
use incident_plane_core::runtime::CollectingEmitter;
use incident_plane_core::runtime::InMemoryAttemptLog;
use incident_plane_core::runtime::InMemoryAuditStore;
use incident_plane_core::runtime::InMemoryCandidateStore;
use incident_plane_core::runtime::InMemoryDecisionStore;
use incident_plane_core::runtime::InMemoryDetectionStore;
use incident_plane_core::runtime::InMemoryEvidenceStore;
use incident_plane_core::runtime::InMemoryIdempotencyStore;
use incident_plane_core::runtime::InMemoryIncidentStore;
use incident_plane_core::runtime::InMemorySignalStore;
use incident_plane_core::runtime::OrchestratorError;
use incident_plane_core::runtime::StaticAutomationConfig;

use common::authority;
use common::correlation_rule;
use common::detection;
use common::policy;
use common::signal;
use common::ts;

// ============================================================================
// SECTION: Harness
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

/// Full store bundle for end-to-end runs.
struct Harness {
    signals: InMemorySignalStore,
    detections: InMemoryDetectionStore,
    evidence: InMemoryEvidenceStore,
    candidates: InMemoryCandidateStore,
    decisions: InMemoryDecisionStore,
    audit: InMemoryAuditStore,
    incidents: InMemoryIncidentStore,
    idempotency: InMemoryIdempotencyStore,
    attempts: InMemoryAttemptLog,
    automation: StaticAutomationConfig,
    emitter: CollectingEmitter,
    policies: OnePolicy,
}

impl Harness {
    /// Seeds a detection, its signal, its graph, and a candidate over them.
    fn with_candidate() -> (Self, incident_plane_core::CandidateId) {
        let harness = Self {
            signals: InMemorySignalStore::new(),
            detections: InMemoryDetectionStore::new(),
            evidence: InMemoryEvidenceStore::new(),
            candidates: InMemoryCandidateStore::new(),
            decisions: InMemoryDecisionStore::new(),
            audit: InMemoryAuditStore::new(),
            incidents: InMemoryIncidentStore::new(),
            idempotency: InMemoryIdempotencyStore::new(),
            attempts: InMemoryAttemptLog::new(),
            automation: StaticAutomationConfig::enabled(),
            emitter: CollectingEmitter::new(),
            policies: OnePolicy(policy()),
        };

        let det = detection("det-e2e", "sig-e2e", Severity::Sev2, "2026-01-19T11:45:00.000Z");
        let sig = signal("sig-e2e", "2026-01-19T11:45:00.000Z");
        harness.signals.insert(sig.clone()).unwrap();
        harness
            .detections
            .put_detection(
                &det,
                &DetectionMetadata {
                    detection_id: det.detection_id.clone(),
                    detected_at: det.signal_timestamp,
                },
            )
            .unwrap();
        let graph = EvidenceBuilder::new()
            .build_graph(&det.detection_id, std::slice::from_ref(&det))
            .unwrap();
        harness.evidence.put_graph(&graph).unwrap();

        let generated = CandidateGenerator::new()
            .generate(
                &det,
                &sig,
                &correlation_rule(),
                &harness.detections,
                &harness.signals,
                &harness.evidence,
                &harness.candidates,
                ts("2026-01-19T11:46:00.000Z"),
            )
            .unwrap()
            .expect("candidate expected");
        let candidate_id = generated.candidate.candidate_id;
        (harness, candidate_id)
    }

    /// Borrows the capability bundle.
    fn deps(&self) -> OrchestratorDeps<'_> {
        OrchestratorDeps {
            candidates: &self.candidates,
            evidence: &self.evidence,
            policies: &self.policies,
            decisions: &self.decisions,
            audit: &self.audit,
            incidents: &self.incidents,
            idempotency: &self.idempotency,
            attempts: &self.attempts,
            automation: &self.automation,
            emitter: &self.emitter,
        }
    }
}

/// Builds the shared promotion request.
fn request(
    candidate_id: &incident_plane_core::CandidateId,
    kind: AuthorityType,
) -> PromotionRequest {
    PromotionRequest {
        candidate_id: candidate_id.clone(),
        policy_id: PolicyId::new("default"),
        policy_version: PolicyVersion::new("1.0.0"),
        authority: authority("user:oncall@example.com", kind),
        current_time: ts("2026-01-19T12:00:00.000Z"),
    }
}

// ============================================================================
// SECTION: Convergence
// ============================================================================

/// Tests that five identical attempts converge on one incident.
#[test]
fn test_replay_convergence_across_attempts() {
    let (harness, candidate_id) = Harness::with_candidate();
    let orchestrator = Orchestrator::new(IncidentManager::new());
    let req = request(&candidate_id, AuthorityType::OnCallSre);

    let mut decision_ids = Vec::new();
    let mut incident_ids = Vec::new();
    for _ in 0..5 {
        let result = orchestrator.process_candidate(&req, None, &harness.deps()).unwrap();
        assert_eq!(result.decision.decision, PromotionVerdict::Promote);
        decision_ids.push(result.decision.decision_id);
        incident_ids.push(result.incident.expect("incident expected").incident_id);
    }

    decision_ids.dedup();
    incident_ids.dedup();
    assert_eq!(decision_ids.len(), 1);
    assert_eq!(incident_ids.len(), 1);

    // The store shows a single incident in PENDING.
    use incident_plane_core::interfaces::IncidentStore;
    let stored = harness.incidents.get_incident(&incident_ids[0]).unwrap().unwrap();
    assert_eq!(stored.state, IncidentState::Pending);
}

/// Tests that the second attempt is served from the completed claim.
#[test]
fn test_completed_claim_short_circuits() {
    let (harness, candidate_id) = Harness::with_candidate();
    let orchestrator = Orchestrator::new(IncidentManager::new());
    let req = request(&candidate_id, AuthorityType::OnCallSre);

    let first = orchestrator.process_candidate(&req, Some("client-key-1"), &harness.deps()).unwrap();
    let second =
        orchestrator.process_candidate(&req, Some("client-key-1"), &harness.deps()).unwrap();

    assert!(!first.converged);
    assert!(second.converged);
    assert_eq!(first.decision.decision_id, second.decision.decision_id);
}

/// Tests that a REJECT verdict creates no incident.
#[test]
fn test_reject_creates_no_incident() {
    let (mut harness, candidate_id) = Harness::with_candidate();
    let mut strict = policy();
    strict.eligibility.min_confidence = 0.99;
    harness.policies = OnePolicy(strict);
    let orchestrator = Orchestrator::new(IncidentManager::new());

    let result = orchestrator
        .process_candidate(&request(&candidate_id, AuthorityType::OnCallSre), None, &harness.deps())
        .unwrap();

    assert_eq!(result.decision.decision, PromotionVerdict::Reject);
    assert!(result.incident.is_none());
}

// ============================================================================
// SECTION: Kill Switch
// ============================================================================

/// Tests that the kill switch refuses automated attempts only.
#[test]
fn test_kill_switch_halts_automation() {
    let (harness, candidate_id) = Harness::with_candidate();
    harness.automation.set_halted(true);
    let orchestrator = Orchestrator::new(IncidentManager::new());

    let automated = orchestrator.process_candidate(
        &request(&candidate_id, AuthorityType::AutoEngine),
        None,
        &harness.deps(),
    );
    assert!(matches!(automated, Err(OrchestratorError::AutomationHalted)));

    // Humans proceed while the switch is engaged.
    let human = orchestrator
        .process_candidate(&request(&candidate_id, AuthorityType::OnCallSre), None, &harness.deps())
        .unwrap();
    assert_eq!(human.decision.decision, PromotionVerdict::Promote);
}

// ============================================================================
// SECTION: Attempt Log
// ============================================================================

/// Tests that completed attempts land in the write-only log.
#[test]
fn test_attempts_are_logged() {
    let (harness, candidate_id) = Harness::with_candidate();
    let orchestrator = Orchestrator::new(IncidentManager::new());

    orchestrator
        .process_candidate(&request(&candidate_id, AuthorityType::OnCallSre), None, &harness.deps())
        .unwrap();

    let attempts = harness.attempts.snapshot().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].candidate_id, candidate_id);
    assert_eq!(attempts[0].stage, "completed");
    assert!(attempts[0].incident_id.is_some());
}

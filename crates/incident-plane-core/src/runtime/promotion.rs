// crates/incident-plane-core/src/runtime/promotion.rs
// ============================================================================
// Module: Incident Plane Promotion Engine
// Description: Policy-gated evaluation of candidates into promotion decisions.
// Purpose: Produce deterministic PROMOTE/REJECT/DEFER verdicts with audit trail.
// Dependencies: serde, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The promotion engine composes four substages: request validation, load,
//! policy evaluation, and commit. Evaluation is a deterministic function of
//! the candidate, the policy, the authority context, the injected
//! `current_time`, and the caller-gathered promotion/incident context.
//! Decision identity excludes the requesting authority so identical requests
//! converge, and an unexpected failure inside the evaluation path fails
//! closed as a REJECT — never open. Audit emission is best-effort and cannot
//! block decision persistence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::core::Candidate;
use crate::core::CandidateId;
use crate::core::Incident;
use crate::core::IncidentState;
use crate::core::MIN_OVERRIDE_JUSTIFICATION_CHARS;
use crate::core::PolicyCheck;
use crate::core::PolicyId;
use crate::core::PolicyVersion;
use crate::core::PromotionAuditRecord;
use crate::core::PromotionDecision;
use crate::core::PromotionPolicy;
use crate::core::PromotionRequest;
use crate::core::PromotionVerdict;
use crate::core::Timestamp;
use crate::core::compute_decision_hash;
use crate::core::compute_decision_id;
use crate::core::compute_request_context_hash;
use crate::core::is_sha256_hex;
use crate::core::rule::AuthorityType;
use crate::interfaces::AuditStore;
use crate::interfaces::CandidateStore;
use crate::interfaces::DecisionStore;
use crate::interfaces::EventEmitter;
use crate::interfaces::PipelineEvent;
use crate::interfaces::PolicyCatalog;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Promotion engine errors surfaced to callers.
///
/// Policy verdicts (REJECT, DEFER) are results, not errors; only request
/// defects and infrastructure failures surface here.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Request failed validation before evaluation.
    #[error("invalid promotion request: {field}: {reason}")]
    Validation {
        /// Field path that failed validation.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// Candidate does not exist.
    #[error("candidate not found: {0}")]
    CandidateNotFound(CandidateId),
    /// Policy coordinates do not exist.
    #[error("policy not found: {id}@{version}")]
    PolicyNotFound {
        /// Requested policy identifier.
        id: PolicyId,
        /// Requested policy version.
        version: PolicyVersion,
    },
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Evaluation Context
// ============================================================================

/// Caller-gathered context for deterministic policy evaluation.
///
/// Evaluation never queries storage itself; the caller supplies the prior
/// decisions and incidents the policy conditions range over.
#[derive(Debug, Clone, Default)]
pub struct PromotionContext {
    /// Prior decisions relevant to the request (the candidate's own, plus
    /// any recent ones for its service when cooldowns apply).
    pub existing_decisions: Vec<PromotionDecision>,
    /// Incidents currently known for the candidate's service.
    pub active_incidents: Vec<Incident>,
}

/// Identity view folded into the request-context hash.
///
/// Deliberately excludes the requesting authority so that identical requests
/// from different authorities converge on one decision.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestContextView<'a> {
    /// Candidate under evaluation.
    candidate_id: &'a CandidateId,
    /// Policy identifier evaluated.
    policy_id: &'a PolicyId,
    /// Policy version evaluated.
    policy_version: &'a PolicyVersion,
    /// Injected evaluation time.
    current_time: Timestamp,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Outcome of a promotion request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    /// Persisted (or converged) decision.
    pub decision: PromotionDecision,
    /// True when this call persisted the decision first.
    pub is_new: bool,
}

/// Deterministic, policy-gated promotion engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromotionEngine;

impl PromotionEngine {
    /// Creates a new promotion engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Processes a promotion request end to end.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError`] for request defects, missing records, or
    /// storage failures. Policy verdicts are returned as outcomes.
    #[allow(
        clippy::too_many_arguments,
        reason = "The engine composes injected capabilities without owning them."
    )]
    pub fn process(
        &self,
        request: &PromotionRequest,
        context: &PromotionContext,
        candidates: &dyn CandidateStore,
        policies: &dyn PolicyCatalog,
        decisions: &dyn DecisionStore,
        audit: &dyn AuditStore,
        emitter: &dyn EventEmitter,
    ) -> Result<PromotionOutcome, PromotionError> {
        // Substage 1: request validation.
        validate_request(request)?;

        // Substage 2: load candidate and exact policy version.
        let candidate = candidates
            .get_candidate(&request.candidate_id)?
            .ok_or_else(|| PromotionError::CandidateNotFound(request.candidate_id.clone()))?;
        let policy = policies
            .load_policy(&request.policy_id, &request.policy_version)?
            .ok_or_else(|| PromotionError::PolicyNotFound {
                id: request.policy_id.clone(),
                version: request.policy_version.clone(),
            })?;

        // Substage 3: deterministic policy evaluation, failing closed.
        let evaluation = evaluate_policy(&candidate, &policy, request, context);

        // Substage 4: commit.
        let context_view = RequestContextView {
            candidate_id: &request.candidate_id,
            policy_id: &request.policy_id,
            policy_version: &request.policy_version,
            current_time: request.current_time,
        };
        let request_context_hash = compute_request_context_hash(&context_view)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let decision_id = compute_decision_id(
            &request.candidate_id,
            &request.policy_id,
            &request.policy_version,
            &request_context_hash,
        );
        let decision_hash = compute_decision_hash(
            evaluation.verdict,
            &evaluation.reason,
            &request.policy_version,
            &request.candidate_id,
        );

        let decision = PromotionDecision {
            decision_id: decision_id.clone(),
            candidate_id: request.candidate_id.clone(),
            decision: evaluation.verdict,
            reason: evaluation.reason,
            policy_id: request.policy_id.clone(),
            policy_version: request.policy_version.clone(),
            request_context_hash,
            decision_hash,
            evaluation_trace: evaluation.trace,
            decided_at: request.current_time,
        };

        let is_new = decisions.put_decision(&decision)?;
        let decision = if is_new {
            decision
        } else {
            // A concurrent identical request converged first; its record is
            // authoritative.
            decisions.get_decision(&decision_id)?.unwrap_or(decision)
        };

        if is_new {
            let event = PipelineEvent::PromotionDecided {
                decision_id: decision.decision_id.clone(),
                candidate_id: decision.candidate_id.clone(),
                decision: decision.decision,
                decided_at: decision.decided_at,
            };
            let emitted = emitter.emit(&event);
            drop(emitted);

            // Audit is observability; the decision is the source of truth.
            let audit_record = PromotionAuditRecord {
                decision_id: decision.decision_id.clone(),
                authority: request.authority.clone(),
                policy_snapshot: policy,
                request_snapshot: request.clone(),
                decision: decision.decision,
                decided_at: decision.decided_at,
            };
            let audited = audit.put_audit(&audit_record);
            drop(audited);
        }

        Ok(PromotionOutcome {
            decision,
            is_new,
        })
    }
}

// ============================================================================
// SECTION: Request Validation
// ============================================================================

/// Validates a promotion request before any load.
fn validate_request(request: &PromotionRequest) -> Result<(), PromotionError> {
    if !is_sha256_hex(request.candidate_id.as_str()) {
        return Err(PromotionError::Validation {
            field: "candidateId",
            reason: "must be a 64-character lowercase hex digest".to_string(),
        });
    }
    if request.policy_id.as_str().is_empty() {
        return Err(PromotionError::Validation {
            field: "policyId",
            reason: "must not be empty".to_string(),
        });
    }
    if request.authority.authority_type == AuthorityType::EmergencyOverride {
        let justification_len =
            request.authority.justification.as_deref().map_or(0, |text| text.chars().count());
        if justification_len < MIN_OVERRIDE_JUSTIFICATION_CHARS {
            return Err(PromotionError::Validation {
                field: "authority.justification",
                reason: format!(
                    "emergency override requires at least {MIN_OVERRIDE_JUSTIFICATION_CHARS} characters"
                ),
            });
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Policy Evaluation
// ============================================================================

/// Internal evaluation result.
struct Evaluation {
    /// Verdict reached.
    verdict: PromotionVerdict,
    /// Human-readable reason.
    reason: String,
    /// Ordered checks.
    trace: Vec<PolicyCheck>,
}

/// Evaluates the policy deterministically, failing closed on internal faults.
fn evaluate_policy(
    candidate: &Candidate,
    policy: &PromotionPolicy,
    request: &PromotionRequest,
    context: &PromotionContext,
) -> Evaluation {
    let mut trace = Vec::new();

    // Eligibility: confidence floor.
    let confidence_ok = candidate.confidence_score >= policy.eligibility.min_confidence;
    trace.push(check(
        "eligibility.minConfidence",
        confidence_ok,
        format!(
            "score {:.2}, required {:.2}",
            candidate.confidence_score, policy.eligibility.min_confidence
        ),
    ));
    if !confidence_ok {
        return rejected("candidate confidence below policy floor", trace);
    }

    // Eligibility: severity allow-list.
    let severity_ok =
        policy.eligibility.allowed_severities.contains(&candidate.suggested_severity);
    trace.push(check(
        "eligibility.allowedSeverities",
        severity_ok,
        format!("suggested {}", candidate.suggested_severity.as_str()),
    ));
    if !severity_ok {
        return rejected("candidate severity not allowed by policy", trace);
    }

    // Eligibility: detection floor.
    let detections_ok = candidate.detection_ids.len()
        >= usize::try_from(policy.eligibility.min_detections).unwrap_or(usize::MAX);
    trace.push(check(
        "eligibility.minDetections",
        detections_ok,
        format!(
            "{} detections, required {}",
            candidate.detection_ids.len(),
            policy.eligibility.min_detections
        ),
    ));
    if !detections_ok {
        return rejected("candidate has too few detections", trace);
    }

    // Eligibility: freshness.
    let age_minutes = request.current_time.minutes_since(candidate.created_at);
    let age_ok = age_minutes >= 0 && age_minutes <= i64::from(policy.eligibility.max_age_minutes);
    trace.push(check(
        "eligibility.maxAgeMinutes",
        age_ok,
        format!("age {age_minutes}m, limit {}m", policy.eligibility.max_age_minutes),
    ));
    if !age_ok {
        return rejected("candidate age outside policy freshness window", trace);
    }

    // Authority restriction.
    let authority_ok = policy.allowed_authorities.contains(&request.authority.authority_type);
    trace.push(check(
        "authority.allowed",
        authority_ok,
        format!("authority type {}", request.authority.authority_type.as_str()),
    ));
    if !authority_ok {
        return rejected("authority type not permitted by policy", trace);
    }

    // Deferral: pending incident for the same service.
    if policy.deferral.active_incident_same_service {
        let active = context.active_incidents.iter().any(|incident| {
            incident.service == candidate.suggested_service
                && !matches!(incident.state, IncidentState::Resolved | IncidentState::Closed)
        });
        trace.push(check(
            "deferral.activeIncidentSameService",
            !active,
            format!("service {}", candidate.suggested_service),
        ));
        if active {
            return Evaluation {
                verdict: PromotionVerdict::Defer,
                reason: "an incident for this service is still active".to_string(),
                trace,
            };
        }
    }

    // Deferral: service cooldown.
    if policy.deferral.service_cooldown_minutes > 0 {
        let cooling = context.existing_decisions.iter().any(|decision| {
            let since = request.current_time.minutes_since(decision.decided_at);
            since >= 0 && since < i64::from(policy.deferral.service_cooldown_minutes)
        });
        trace.push(check(
            "deferral.serviceCooldown",
            !cooling,
            format!("{}m cooldown", policy.deferral.service_cooldown_minutes),
        ));
        if cooling {
            return Evaluation {
                verdict: PromotionVerdict::Defer,
                reason: "service is inside the promotion cooldown".to_string(),
                trace,
            };
        }
    }

    // Rejection: duplicate candidate.
    if policy.rejection.duplicate_candidate {
        let duplicate = context
            .existing_decisions
            .iter()
            .any(|decision| {
                decision.candidate_id == candidate.candidate_id
                    && decision.decision == PromotionVerdict::Promote
            });
        trace.push(check("rejection.duplicateCandidate", !duplicate, String::new()));
        if duplicate {
            return rejected("candidate was already promoted", trace);
        }
    }

    // Rejection: staleness.
    if policy.rejection.stale_after_minutes > 0
        && age_minutes > i64::from(policy.rejection.stale_after_minutes)
    {
        trace.push(check(
            "rejection.staleAfterMinutes",
            false,
            format!("age {age_minutes}m"),
        ));
        return rejected("candidate is stale", trace);
    }

    // Rejection: insufficient evidence.
    if policy.rejection.min_evidence_detections > 0
        && candidate.detection_ids.len()
            < usize::try_from(policy.rejection.min_evidence_detections).unwrap_or(usize::MAX)
    {
        trace.push(check(
            "rejection.minEvidenceDetections",
            false,
            format!("{} detections", candidate.detection_ids.len()),
        ));
        return rejected("candidate evidence is insufficient", trace);
    }

    Evaluation {
        verdict: PromotionVerdict::Promote,
        reason: "all policy gates passed".to_string(),
        trace,
    }
}

/// Builds a named policy check entry.
fn check(name: &str, passed: bool, detail: String) -> PolicyCheck {
    PolicyCheck {
        check: name.to_string(),
        passed,
        detail,
    }
}

/// Builds a REJECT evaluation.
fn rejected(reason: &str, trace: Vec<PolicyCheck>) -> Evaluation {
    Evaluation {
        verdict: PromotionVerdict::Reject,
        reason: reason.to_string(),
        trace,
    }
}

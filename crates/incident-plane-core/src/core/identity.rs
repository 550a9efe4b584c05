// crates/incident-plane-core/src/core/identity.rs
// ============================================================================
// Module: Incident Plane Identity Derivation
// Description: Deterministic SHA-256 identity functions for every record kind.
// Purpose: Document and centralize the exact input concatenation behind each ID.
// Dependencies: crate::core::{hashing, identifiers, incident, time}
// ============================================================================

//! ## Overview
//! Every identifier in the pipeline derives from record content. Each function
//! below documents its exact input concatenation; any two implementations that
//! canonicalize and hash these inputs identically produce identical IDs across
//! languages. No randomness and no wall-clock reads occur anywhere in this
//! module — timestamps that participate (for example an outcome's closure
//! time) are fixed record fields rendered in the canonical millisecond form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::sha256_hex;
use crate::core::identifiers::CandidateId;
use crate::core::identifiers::DetectionId;
use crate::core::identifiers::GraphId;
use crate::core::identifiers::IncidentId;
use crate::core::identifiers::OutcomeId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::PolicyVersion;
use crate::core::identifiers::PromotionDecisionId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::RuleVersion;
use crate::core::identifiers::ServiceName;
use crate::core::identifiers::SignalId;
use crate::core::identifiers::SummaryId;
use crate::core::incident::Incident;
use crate::core::promotion::PromotionVerdict;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Separator
// ============================================================================

/// Field separator for pipe-joined identity inputs.
const SEP: &str = "|";

/// Joins identity inputs with the pipe separator and hashes the result.
fn hash_joined(parts: &[&str]) -> String {
    sha256_hex(parts.join(SEP).as_bytes())
}

// ============================================================================
// SECTION: Detection Identity
// ============================================================================

/// Computes a detection identifier.
///
/// Input: `ruleId | ruleVersion | normalizedSignalId`, UTF-8, pipe-joined.
#[must_use]
pub fn compute_detection_id(
    rule_id: &RuleId,
    rule_version: &RuleVersion,
    signal_id: &SignalId,
) -> DetectionId {
    DetectionId::new(hash_joined(&[rule_id.as_str(), rule_version.as_str(), signal_id.as_str()]))
}

/// Computes a combined-detection identifier over sorted member signals.
///
/// Input: `ruleId | ruleVersion | signalId_1,signalId_2,...` where signal ids
/// are sorted ascending and comma-joined. Callers must pass the sorted set.
#[must_use]
pub fn compute_combined_detection_id(
    rule_id: &RuleId,
    rule_version: &RuleVersion,
    sorted_signal_ids: &[SignalId],
) -> DetectionId {
    let joined: Vec<&str> = sorted_signal_ids.iter().map(SignalId::as_str).collect();
    DetectionId::new(hash_joined(&[
        rule_id.as_str(),
        rule_version.as_str(),
        &joined.join(","),
    ]))
}

// ============================================================================
// SECTION: Evidence Identity
// ============================================================================

/// Computes an evidence graph identifier.
///
/// Input: `detectionId_1,... | signalId_1,...` where detection ids are sorted
/// ascending and signal ids are deduplicated and sorted ascending.
#[must_use]
pub fn compute_graph_id(
    sorted_detection_ids: &[DetectionId],
    sorted_signal_ids: &[SignalId],
) -> GraphId {
    let detections: Vec<&str> = sorted_detection_ids.iter().map(DetectionId::as_str).collect();
    let signals: Vec<&str> = sorted_signal_ids.iter().map(SignalId::as_str).collect();
    GraphId::new(hash_joined(&[&detections.join(","), &signals.join(",")]))
}

// ============================================================================
// SECTION: Candidate Identity
// ============================================================================

/// Computes the correlation grouping key.
///
/// Input: `ruleId | ruleVersion | JCS(resolvedKeyFields)` where the key-field
/// map canonicalizes with recursively sorted keys.
///
/// # Errors
///
/// Returns [`HashError`] when the key-field map fails canonicalization.
pub fn compute_correlation_key(
    rule_id: &RuleId,
    rule_version: &RuleVersion,
    resolved_key_fields: &BTreeMap<String, String>,
) -> Result<String, HashError> {
    let fields = canonical_json_bytes(resolved_key_fields)?;
    let fields_utf8 = String::from_utf8_lossy(&fields).into_owned();
    Ok(hash_joined(&[rule_id.as_str(), rule_version.as_str(), &fields_utf8]))
}

/// Computes a candidate identifier.
///
/// Input: `detectionId_1,... | ruleId | ruleVersion | JCS(resolvedKeyFields)`
/// where detection ids are sorted ascending. Key fields participate in the
/// hash, so distinct key-field sets over the same detections yield distinct
/// candidates.
///
/// # Errors
///
/// Returns [`HashError`] when the key-field map fails canonicalization.
pub fn compute_candidate_id(
    sorted_detection_ids: &[DetectionId],
    rule_id: &RuleId,
    rule_version: &RuleVersion,
    resolved_key_fields: &BTreeMap<String, String>,
) -> Result<CandidateId, HashError> {
    let detections: Vec<&str> = sorted_detection_ids.iter().map(DetectionId::as_str).collect();
    let fields = canonical_json_bytes(resolved_key_fields)?;
    let fields_utf8 = String::from_utf8_lossy(&fields).into_owned();
    Ok(CandidateId::new(hash_joined(&[
        &detections.join(","),
        rule_id.as_str(),
        rule_version.as_str(),
        &fields_utf8,
    ])))
}

// ============================================================================
// SECTION: Promotion Identity
// ============================================================================

/// Computes the request-context hash folded into a decision identity.
///
/// Input: JCS of the serializable context value. The context must exclude the
/// requesting authority so that identical requests from different authorities
/// converge.
///
/// # Errors
///
/// Returns [`HashError`] when the context fails canonicalization.
pub fn compute_request_context_hash<T: Serialize>(context: &T) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(context)?;
    Ok(sha256_hex(&bytes))
}

/// Computes a promotion decision identifier.
///
/// Input: `candidateId | policyId | policyVersion | requestContextHash`.
/// The authority id is deliberately excluded.
#[must_use]
pub fn compute_decision_id(
    candidate_id: &CandidateId,
    policy_id: &PolicyId,
    policy_version: &PolicyVersion,
    request_context_hash: &str,
) -> PromotionDecisionId {
    PromotionDecisionId::new(hash_joined(&[
        candidate_id.as_str(),
        policy_id.as_str(),
        policy_version.as_str(),
        request_context_hash,
    ]))
}

/// Computes the integrity hash stored beside a promotion decision.
///
/// Input: `decision | reason | policyVersion | candidateId`.
#[must_use]
pub fn compute_decision_hash(
    decision: PromotionVerdict,
    reason: &str,
    policy_version: &PolicyVersion,
    candidate_id: &CandidateId,
) -> String {
    hash_joined(&[decision.as_str(), reason, policy_version.as_str(), candidate_id.as_str()])
}

// ============================================================================
// SECTION: Incident Identity
// ============================================================================

/// Computes an incident identifier.
///
/// Input: `service | evidenceId`. Evidence-derived; stable regardless of the
/// wall-clock time of promotion.
#[must_use]
pub fn compute_incident_id(service: &ServiceName, evidence_id: &GraphId) -> IncidentId {
    IncidentId::new(hash_joined(&[service.as_str(), evidence_id.as_str()]))
}

/// Computes the chained state hash for an incident.
///
/// Input: JCS of the authoritative state view, which excludes `updatedAt`,
/// `version`, `eventSeq`, and `timeline`.
///
/// # Errors
///
/// Returns [`HashError`] when the view fails canonicalization.
pub fn compute_state_hash(incident: &Incident) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(&incident.state_view())?;
    Ok(sha256_hex(&bytes))
}

// ============================================================================
// SECTION: Outcome Identity
// ============================================================================

/// Computes an outcome identifier.
///
/// Input: `incidentId | closedAt` with the closure time rendered in the
/// canonical millisecond RFC 3339 form.
#[must_use]
pub fn compute_outcome_id(incident_id: &IncidentId, closed_at: Timestamp) -> OutcomeId {
    OutcomeId::new(hash_joined(&[incident_id.as_str(), &closed_at.to_rfc3339_millis()]))
}

/// Computes a resolution summary identifier.
///
/// Input: `service | windowStart | windowEnd` with both bounds rendered in
/// the canonical millisecond RFC 3339 form.
#[must_use]
pub fn compute_summary_id(
    service: &ServiceName,
    window_start: Timestamp,
    window_end: Timestamp,
) -> SummaryId {
    SummaryId::new(hash_joined(&[
        service.as_str(),
        &window_start.to_rfc3339_millis(),
        &window_end.to_rfc3339_millis(),
    ]))
}

// ============================================================================
// SECTION: Idempotency Identity
// ============================================================================

/// Derives an idempotency key for a mutating request.
///
/// Input: `principal | operation | JCS(request)`. Used only when the caller
/// did not supply a client key.
///
/// # Errors
///
/// Returns [`HashError`] when the request fails canonicalization.
pub fn derive_idempotency_key<T: Serialize>(
    principal: &str,
    operation: &str,
    request: &T,
) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(request)?;
    let request_utf8 = String::from_utf8_lossy(&bytes).into_owned();
    Ok(hash_joined(&[principal, operation, &request_utf8]))
}

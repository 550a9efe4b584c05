// crates/incident-plane-core/src/core/promotion.rs
// ============================================================================
// Module: Incident Plane Promotion Types
// Description: Promotion requests, decisions, and audit snapshots.
// Purpose: Provide the policy-gated decision records bridging candidates and incidents.
// Dependencies: serde, crate::core::{identifiers, rule, time}
// ============================================================================

//! ## Overview
//! A promotion decision is the policy-gated verdict turning a candidate into
//! an incident. Decision identity deliberately excludes the requesting
//! authority so that two authorities submitting identical requests converge
//! on the same decision; the authority is retained only in the audit
//! snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AuthorityId;
use crate::core::identifiers::CandidateId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::PolicyVersion;
use crate::core::identifiers::PromotionDecisionId;
use crate::core::rule::AuthorityType;
use crate::core::rule::PromotionPolicy;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Authority Context
// ============================================================================

/// Principal submitting a control-plane action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityContext {
    /// Authority identifier (for example `user:alice@example.com`).
    pub authority_id: AuthorityId,
    /// Authority type.
    pub authority_type: AuthorityType,
    /// Justification text, required for emergency overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

// ============================================================================
// SECTION: Promotion Request
// ============================================================================

/// Request to evaluate a candidate for promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    /// Candidate under evaluation.
    pub candidate_id: CandidateId,
    /// Policy coordinates to evaluate against.
    pub policy_id: PolicyId,
    /// Policy version; production paths never resolve "latest".
    pub policy_version: PolicyVersion,
    /// Requesting authority.
    pub authority: AuthorityContext,
    /// Evaluation time injected by the caller.
    pub current_time: Timestamp,
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Verdict of a promotion evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionVerdict {
    /// Promote the candidate into an incident.
    Promote,
    /// Refuse the candidate outright.
    Reject,
    /// Postpone the decision.
    Defer,
}

impl PromotionVerdict {
    /// Returns the stable wire label for the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Promote => "PROMOTE",
            Self::Reject => "REJECT",
            Self::Defer => "DEFER",
        }
    }
}

/// Single named check in the policy evaluation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCheck {
    /// Check name (for example `eligibility.minConfidence`).
    pub check: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Check detail, such as observed vs. required values.
    pub detail: String,
}

/// Persisted promotion decision.
///
/// # Invariants
/// - `decision_id` excludes the authority; identical requests from different
///   authorities converge on one record.
/// - `decided_at` is injected by the caller, never read from a clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionDecision {
    /// Decision identifier.
    pub decision_id: PromotionDecisionId,
    /// Candidate the decision covers.
    pub candidate_id: CandidateId,
    /// Verdict.
    pub decision: PromotionVerdict,
    /// Human-readable reason for the verdict.
    pub reason: String,
    /// Policy coordinates evaluated.
    pub policy_id: PolicyId,
    /// Policy version evaluated.
    pub policy_version: PolicyVersion,
    /// Hash of the request context folded into the identity.
    pub request_context_hash: String,
    /// Integrity hash over (decision, reason, policy version, candidate id).
    pub decision_hash: String,
    /// Ordered policy checks.
    pub evaluation_trace: Vec<PolicyCheck>,
    /// Decision timestamp injected by the caller.
    pub decided_at: Timestamp,
}

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// Audit companion for a promotion decision.
///
/// Stored separately from the decision; emission is best-effort and its
/// failure never blocks decision persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionAuditRecord {
    /// Decision identifier the audit covers.
    pub decision_id: PromotionDecisionId,
    /// Requesting authority snapshot, audit-only.
    pub authority: AuthorityContext,
    /// Full policy snapshot at evaluation time.
    pub policy_snapshot: PromotionPolicy,
    /// Canonicalized request snapshot.
    pub request_snapshot: PromotionRequest,
    /// Verdict recorded for quick scanning.
    pub decision: PromotionVerdict,
    /// Decision timestamp.
    pub decided_at: Timestamp,
}

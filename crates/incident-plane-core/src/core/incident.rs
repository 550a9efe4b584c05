// crates/incident-plane-core/src/core/incident.rs
// ============================================================================
// Module: Incident Plane Incident Types
// Description: Event-sourced incident records and the lifecycle state machine.
// Purpose: Provide the authoritative incident state shape and its hash view.
// Dependencies: serde, crate::core::{identifiers, promotion, signal, time}
// ============================================================================

//! ## Overview
//! An incident is an event-sourced state machine. The record is materialized
//! from an ordered event log; every persisted event carries the hash of the
//! authoritative state after it applied, forming a verifiable chain. The
//! hashed view excludes bookkeeping fields (`updated_at`, `version`,
//! `event_seq`, `timeline`) so that replaying the event log reproduces every
//! chain entry byte-for-byte.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AuthorityId;
use crate::core::identifiers::CandidateId;
use crate::core::identifiers::GraphId;
use crate::core::identifiers::IncidentId;
use crate::core::identifiers::PromotionDecisionId;
use crate::core::identifiers::ServiceName;
use crate::core::rule::AuthorityType;
use crate::core::signal::Severity;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Lifecycle states of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentState {
    /// Created but not yet actively worked.
    Pending,
    /// Actively worked.
    Open,
    /// A responder has acknowledged ownership.
    Acknowledged,
    /// Impact has been mitigated.
    Mitigated,
    /// Root cause addressed; resolution metadata frozen.
    Resolved,
    /// Closed; no further transitions accepted.
    Closed,
}

impl IncidentState {
    /// Returns the stable wire label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Open => "OPEN",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Mitigated => "MITIGATED",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }

    /// Returns true when `next` is a legal forward transition from `self`.
    ///
    /// Self-transitions are handled separately as annotations and are legal
    /// from every state except `Closed`.
    #[must_use]
    pub const fn allows_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Open)
                | (Self::Open, Self::Acknowledged)
                | (Self::Acknowledged, Self::Mitigated)
                | (Self::Mitigated, Self::Resolved)
                | (Self::Resolved, Self::Closed)
        )
    }
}

/// Actions a principal can take against an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentAction {
    /// Open a pending incident.
    Open,
    /// Acknowledge an open incident.
    Acknowledge,
    /// Mitigate an acknowledged incident.
    Mitigate,
    /// Resolve a mitigated incident.
    Resolve,
    /// Close a resolved incident.
    Close,
    /// Attach an annotation without changing state.
    Annotate,
    /// Read the incident.
    Read,
}

impl IncidentAction {
    /// Returns the stable wire label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Acknowledge => "ACKNOWLEDGE",
            Self::Mitigate => "MITIGATE",
            Self::Resolve => "RESOLVE",
            Self::Close => "CLOSE",
            Self::Annotate => "ANNOTATE",
            Self::Read => "READ",
        }
    }

    /// Returns the target state for state-changing actions.
    #[must_use]
    pub const fn target_state(self) -> Option<IncidentState> {
        match self {
            Self::Open => Some(IncidentState::Open),
            Self::Acknowledge => Some(IncidentState::Acknowledged),
            Self::Mitigate => Some(IncidentState::Mitigated),
            Self::Resolve => Some(IncidentState::Resolved),
            Self::Close => Some(IncidentState::Closed),
            Self::Annotate | Self::Read => None,
        }
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolution metadata required by the RESOLVE transition.
///
/// Immutable once the incident reaches `Resolved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Root cause statement.
    pub root_cause: String,
    /// Resolution action taken.
    pub action_taken: String,
    /// Follow-up items, possibly empty.
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

// ============================================================================
// SECTION: Transition Records
// ============================================================================

/// Authority reference recorded for each applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionAuthority {
    /// Action performed.
    pub action: IncidentAction,
    /// Acting principal.
    pub authority_id: AuthorityId,
    /// Acting principal type.
    pub authority_type: AuthorityType,
    /// Transition time injected by the caller.
    pub acted_at: Timestamp,
}

/// Persisted incident event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentEvent {
    /// Incident the event belongs to.
    pub incident_id: IncidentId,
    /// Monotonic sequence number, starting at 1.
    pub event_seq: u64,
    /// Action that produced the event.
    pub action: IncidentAction,
    /// State before the event applied.
    pub from_state: IncidentState,
    /// State after the event applied.
    pub to_state: IncidentState,
    /// Acting principal.
    pub authority_id: AuthorityId,
    /// Acting principal type.
    pub authority_type: AuthorityType,
    /// Optional annotation text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Resolution block carried by RESOLVE events so replay can rebuild the
    /// frozen metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Event time injected by the caller.
    pub occurred_at: Timestamp,
    /// Hash of the authoritative state after this event applied.
    pub state_hash_after: String,
}

// ============================================================================
// SECTION: Incident Record
// ============================================================================

/// Materialized incident record.
///
/// # Invariants
/// - `incident_id` derives from (service, evidence id); wall-clock time never
///   enters the identity.
/// - `version` is the optimistic-concurrency counter; every applied event
///   increments it.
/// - Transition timestamps obey `opened_at <= acknowledged_at <= mitigated_at
///   <= resolved_at <= closed_at` whenever each is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Incident identifier.
    pub incident_id: IncidentId,
    /// Owning service.
    pub service: ServiceName,
    /// Evidence graph backing the incident.
    pub evidence_id: GraphId,
    /// Candidate promoted into this incident.
    pub candidate_id: CandidateId,
    /// Promotion decision that created this incident.
    pub decision_id: PromotionDecisionId,
    /// Current lifecycle state.
    pub state: IncidentState,
    /// Operational severity.
    pub severity: Severity,
    /// Incident title.
    pub title: String,
    /// Resolution metadata, present from `Resolved` onward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Creation time injected at promotion.
    pub created_at: Timestamp,
    /// Opened transition time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<Timestamp>,
    /// Acknowledged transition time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<Timestamp>,
    /// Mitigated transition time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigated_at: Option<Timestamp>,
    /// Resolved transition time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    /// Closed transition time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<Timestamp>,
    /// Last update time, bookkeeping only.
    pub updated_at: Timestamp,
    /// Optimistic-concurrency version counter.
    pub version: u64,
    /// Last applied event sequence, bookkeeping only.
    pub event_seq: u64,
    /// Authority references for applied transitions, bookkeeping only.
    #[serde(default)]
    pub timeline: Vec<TransitionAuthority>,
}

// ============================================================================
// SECTION: Hash View
// ============================================================================

/// Authoritative state view folded into `state_hash_after`.
///
/// Excludes `updated_at`, `version`, `event_seq`, and `timeline` so that a
/// replay of the event log reproduces each chained hash byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentStateView<'a> {
    /// Incident identifier.
    pub incident_id: &'a IncidentId,
    /// Owning service.
    pub service: &'a ServiceName,
    /// Evidence graph backing the incident.
    pub evidence_id: &'a GraphId,
    /// Candidate promoted into this incident.
    pub candidate_id: &'a CandidateId,
    /// Promotion decision that created this incident.
    pub decision_id: &'a PromotionDecisionId,
    /// Current lifecycle state.
    pub state: IncidentState,
    /// Operational severity.
    pub severity: Severity,
    /// Incident title.
    pub title: &'a str,
    /// Resolution metadata when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<&'a Resolution>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Opened transition time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<Timestamp>,
    /// Acknowledged transition time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<Timestamp>,
    /// Mitigated transition time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigated_at: Option<Timestamp>,
    /// Resolved transition time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    /// Closed transition time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<Timestamp>,
}

impl Incident {
    /// Returns the authoritative state view used for chain hashing.
    #[must_use]
    pub fn state_view(&self) -> IncidentStateView<'_> {
        IncidentStateView {
            incident_id: &self.incident_id,
            service: &self.service,
            evidence_id: &self.evidence_id,
            candidate_id: &self.candidate_id,
            decision_id: &self.decision_id,
            state: self.state,
            severity: self.severity,
            title: &self.title,
            resolution: self.resolution.as_ref(),
            created_at: self.created_at,
            opened_at: self.opened_at,
            acknowledged_at: self.acknowledged_at,
            mitigated_at: self.mitigated_at,
            resolved_at: self.resolved_at,
            closed_at: self.closed_at,
        }
    }
}

// crates/incident-plane-core/src/runtime/incident.rs
// ============================================================================
// Module: Incident Plane Incident Manager
// Description: Event-sourced incident lifecycle with optimistic locking.
// Purpose: Enforce the state machine, authority matrix, and hash chain.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The incident manager materializes incidents from an ordered event log and
//! serializes writes per incident with an optimistic version counter: a lost
//! update surfaces as a conflict for the caller to retry, never a silent
//! overwrite. Creation from a PROMOTE decision is idempotent because the
//! incident identity derives from (service, evidence id). Every persisted
//! event stores the hash of the authoritative state after it applied, and
//! replaying the log must reproduce each hash byte-for-byte.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::Candidate;
use crate::core::GraphId;
use crate::core::HashError;
use crate::core::Incident;
use crate::core::IncidentAction;
use crate::core::IncidentEvent;
use crate::core::IncidentId;
use crate::core::IncidentState;
use crate::core::PromotionDecision;
use crate::core::PromotionVerdict;
use crate::core::Resolution;
use crate::core::Severity;
use crate::core::Timestamp;
use crate::core::TransitionAuthority;
use crate::core::compute_incident_id;
use crate::core::compute_state_hash;
use crate::core::promotion::AuthorityContext;
use crate::core::rule::AuthorityType;
use crate::interfaces::EventEmitter;
use crate::interfaces::IncidentStore;
use crate::interfaces::PipelineEvent;
use crate::interfaces::StoreError;
use crate::runtime::ratelimit::AuthorityRateLimiter;
use crate::runtime::ratelimit::RateLimitDecision;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Incident manager errors.
#[derive(Debug, Error)]
pub enum IncidentError {
    /// The promotion decision did not carry a PROMOTE verdict.
    #[error("decision {0} is not a promotion")]
    NotPromoted(String),
    /// The authority exceeded its action budget.
    #[error("rate limit exceeded; retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds before retrying.
        retry_after_ms: u64,
    },
    /// Incident does not exist.
    #[error("incident not found: {0}")]
    NotFound(IncidentId),
    /// The authority type is not permitted for this action and severity.
    #[error("authority {actual} may not {action} a {severity} incident; requires one of {required:?}")]
    Authority {
        /// Action attempted.
        action: &'static str,
        /// Incident severity.
        severity: &'static str,
        /// Authority type that attempted the action.
        actual: &'static str,
        /// Authority types that are permitted.
        required: Vec<&'static str>,
    },
    /// The state machine rejected the transition.
    #[error("illegal transition from {current} to {attempted}")]
    IllegalTransition {
        /// Current lifecycle state.
        current: &'static str,
        /// Attempted target state.
        attempted: &'static str,
    },
    /// RESOLVE was submitted without a resolution block.
    #[error("resolve requires a resolution block")]
    MissingResolution,
    /// Resolution metadata is immutable once the incident resolved.
    #[error("resolution metadata is immutable after resolve")]
    ResolutionImmutable,
    /// The transition time precedes an earlier lifecycle timestamp.
    #[error("transition time {attempted} precedes {prior} set at {prior_at}")]
    TemporalOrder {
        /// Attempted transition time.
        attempted: String,
        /// Name of the earlier timestamp violated.
        prior: &'static str,
        /// Value of the earlier timestamp.
        prior_at: String,
    },
    /// A concurrent writer advanced the incident first; retry from a fresh read.
    #[error("incident version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the caller based its update on.
        expected: u64,
        /// Version observed in the store.
        actual: u64,
    },
    /// The replayed hash chain diverged from the stored chain.
    #[error("state hash chain mismatch at event {event_seq}")]
    ChainMismatch {
        /// Event sequence where the chain diverged.
        event_seq: u64,
    },
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(StoreError),
    /// State canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl From<StoreError> for IncidentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                expected,
                actual,
            } => Self::Conflict {
                expected,
                actual,
            },
            other => Self::Store(other),
        }
    }
}

// ============================================================================
// SECTION: Transition Request
// ============================================================================

/// Request to apply one action to an incident.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    /// Target incident.
    pub incident_id: IncidentId,
    /// Action to apply.
    pub action: IncidentAction,
    /// Acting principal.
    pub authority: AuthorityContext,
    /// Annotation text for self-transitions.
    pub note: Option<String>,
    /// Resolution block, required by RESOLVE.
    pub resolution: Option<Resolution>,
    /// Transition time injected by the caller.
    pub current_time: Timestamp,
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Outcome of creating an incident from a promotion decision.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedIncident {
    /// The created or converged incident.
    pub incident: Incident,
    /// True when this call created the incident.
    pub is_new: bool,
}

/// Event-sourced incident manager.
pub struct IncidentManager {
    /// Optional authority-scoped rate limiter.
    limiter: Option<AuthorityRateLimiter>,
}

impl IncidentManager {
    /// Creates a manager without rate limiting.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            limiter: None,
        }
    }

    /// Creates a manager with an authority-scoped rate limiter.
    #[must_use]
    pub const fn with_limiter(limiter: AuthorityRateLimiter) -> Self {
        Self {
            limiter: Some(limiter),
        }
    }

    /// Creates or looks up the incident for a PROMOTE decision.
    ///
    /// The identity derives from (service, evidence id), so repeated
    /// submissions of the same decision converge on one incident.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError`] when the decision is not a promotion or the
    /// store fails.
    pub fn create_from_decision(
        &self,
        decision: &PromotionDecision,
        candidate: &Candidate,
        evidence_id: &GraphId,
        authority: &AuthorityContext,
        current_time: Timestamp,
        store: &dyn IncidentStore,
    ) -> Result<CreatedIncident, IncidentError> {
        if decision.decision != PromotionVerdict::Promote {
            return Err(IncidentError::NotPromoted(decision.decision_id.to_string()));
        }

        let incident_id = compute_incident_id(&candidate.suggested_service, evidence_id);
        if let Some(existing) = store.get_incident(&incident_id)? {
            return Ok(CreatedIncident {
                incident: existing,
                is_new: false,
            });
        }

        let mut incident = Incident {
            incident_id: incident_id.clone(),
            service: candidate.suggested_service.clone(),
            evidence_id: evidence_id.clone(),
            candidate_id: candidate.candidate_id.clone(),
            decision_id: decision.decision_id.clone(),
            state: IncidentState::Pending,
            severity: candidate.suggested_severity,
            title: candidate.suggested_title.clone(),
            resolution: None,
            created_at: current_time,
            opened_at: None,
            acknowledged_at: None,
            mitigated_at: None,
            resolved_at: None,
            closed_at: None,
            updated_at: current_time,
            version: 1,
            event_seq: 1,
            timeline: vec![TransitionAuthority {
                action: IncidentAction::Annotate,
                authority_id: authority.authority_id.clone(),
                authority_type: authority.authority_type,
                acted_at: current_time,
            }],
        };

        let state_hash_after = compute_state_hash(&incident)?;
        let event = IncidentEvent {
            incident_id: incident_id.clone(),
            event_seq: 1,
            action: IncidentAction::Annotate,
            from_state: IncidentState::Pending,
            to_state: IncidentState::Pending,
            authority_id: authority.authority_id.clone(),
            authority_type: authority.authority_type,
            note: Some("created from promotion decision".to_string()),
            resolution: None,
            occurred_at: current_time,
            state_hash_after,
        };

        let is_new = store.create_incident(&incident, &event)?;
        if !is_new {
            // A concurrent creator converged first; read its record back.
            incident = store
                .get_incident(&incident_id)?
                .ok_or_else(|| IncidentError::NotFound(incident_id.clone()))?;
        }
        Ok(CreatedIncident {
            incident,
            is_new,
        })
    }

    /// Applies one lifecycle action to an incident.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError`] when the authority matrix, state machine,
    /// temporal ordering, or optimistic lock rejects the transition.
    pub fn transition(
        &self,
        request: &TransitionRequest,
        store: &dyn IncidentStore,
        emitter: &dyn EventEmitter,
    ) -> Result<Incident, IncidentError> {
        if let Some(limiter) = &self.limiter {
            let decision = limiter.check(
                &request.authority.authority_id,
                request.authority.authority_type,
                request.action,
            );
            if let RateLimitDecision::Limited {
                retry_after_ms,
            } = decision
            {
                return Err(IncidentError::RateLimited {
                    retry_after_ms,
                });
            }
        }

        let mut incident = store
            .get_incident(&request.incident_id)?
            .ok_or_else(|| IncidentError::NotFound(request.incident_id.clone()))?;

        authority_allows(request.action, incident.severity, request.authority.authority_type)?;

        let from_state = incident.state;
        let to_state = resolve_target_state(from_state, request.action)?;

        if request.action == IncidentAction::Resolve {
            if from_state == IncidentState::Resolved {
                // Re-resolving may not alter the frozen resolution block.
                if request.resolution.is_some() && request.resolution != incident.resolution {
                    return Err(IncidentError::ResolutionImmutable);
                }
            } else if request.resolution.is_none() {
                return Err(IncidentError::MissingResolution);
            }
        }

        check_temporal_order(&incident, request.current_time)?;

        let expected_version = incident.version;
        apply_transition(&mut incident, request, from_state, to_state);

        let state_hash_after = compute_state_hash(&incident)?;
        let event = IncidentEvent {
            incident_id: incident.incident_id.clone(),
            event_seq: incident.event_seq,
            action: request.action,
            from_state,
            to_state,
            authority_id: request.authority.authority_id.clone(),
            authority_type: request.authority.authority_type,
            note: request.note.clone(),
            resolution: incident.resolution.clone().filter(|_| to_state == IncidentState::Resolved),
            occurred_at: request.current_time,
            state_hash_after,
        };

        store.update_incident(&incident, &event, expected_version)?;

        if from_state != to_state {
            let emitted = emitter.emit(&PipelineEvent::IncidentTransitioned {
                incident_id: incident.incident_id.clone(),
                from_state,
                to_state,
                occurred_at: request.current_time,
            });
            drop(emitted);
        }

        Ok(incident)
    }

    /// Replays the event log and verifies the stored hash chain.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::ChainMismatch`] at the first divergent event,
    /// or a store error when the log cannot be read.
    pub fn verify_chain(
        &self,
        incident_id: &IncidentId,
        store: &dyn IncidentStore,
    ) -> Result<(), IncidentError> {
        let incident = store
            .get_incident(incident_id)?
            .ok_or_else(|| IncidentError::NotFound(incident_id.clone()))?;
        let events = store.get_events(incident_id)?;

        let mut replayed = seed_from(&incident);
        for event in &events {
            if event.event_seq > 1 {
                replay_event(&mut replayed, event);
            }
            let recomputed = compute_state_hash(&replayed)?;
            if recomputed != event.state_hash_after {
                return Err(IncidentError::ChainMismatch {
                    event_seq: event.event_seq,
                });
            }
        }
        Ok(())
    }
}

impl Default for IncidentManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Authority Matrix
// ============================================================================

/// Authority types permitted for an action at a severity.
#[must_use]
pub fn permitted_authorities(action: IncidentAction, severity: Severity) -> Vec<AuthorityType> {
    match action {
        IncidentAction::Open | IncidentAction::Read | IncidentAction::Annotate => vec![
            AuthorityType::AutoEngine,
            AuthorityType::HumanOperator,
            AuthorityType::OnCallSre,
            AuthorityType::EmergencyOverride,
        ],
        IncidentAction::Acknowledge | IncidentAction::Mitigate | IncidentAction::Close => vec![
            AuthorityType::HumanOperator,
            AuthorityType::OnCallSre,
            AuthorityType::EmergencyOverride,
        ],
        IncidentAction::Resolve => {
            if severity == Severity::Sev1 {
                vec![AuthorityType::OnCallSre, AuthorityType::EmergencyOverride]
            } else {
                vec![
                    AuthorityType::HumanOperator,
                    AuthorityType::OnCallSre,
                    AuthorityType::EmergencyOverride,
                ]
            }
        }
    }
}

/// Checks the authority matrix for one action.
fn authority_allows(
    action: IncidentAction,
    severity: Severity,
    authority_type: AuthorityType,
) -> Result<(), IncidentError> {
    let permitted = permitted_authorities(action, severity);
    if permitted.contains(&authority_type) {
        Ok(())
    } else {
        Err(IncidentError::Authority {
            action: action.as_str(),
            severity: severity.as_str(),
            actual: authority_type.as_str(),
            required: permitted.iter().map(|kind| kind.as_str()).collect(),
        })
    }
}

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Resolves the target state, honoring self-transition annotations.
fn resolve_target_state(
    current: IncidentState,
    action: IncidentAction,
) -> Result<IncidentState, IncidentError> {
    if current == IncidentState::Closed {
        return Err(IncidentError::IllegalTransition {
            current: current.as_str(),
            attempted: action
                .target_state()
                .map_or(current.as_str(), IncidentState::as_str),
        });
    }
    match action.target_state() {
        None => Ok(current),
        Some(next) if next == current => Ok(current),
        Some(next) if current.allows_transition_to(next) => Ok(next),
        Some(next) => Err(IncidentError::IllegalTransition {
            current: current.as_str(),
            attempted: next.as_str(),
        }),
    }
}

/// Enforces the monotonic transition-timestamp invariant.
fn check_temporal_order(incident: &Incident, attempted: Timestamp) -> Result<(), IncidentError> {
    let checks: [(&'static str, Option<Timestamp>); 5] = [
        ("openedAt", incident.opened_at),
        ("acknowledgedAt", incident.acknowledged_at),
        ("mitigatedAt", incident.mitigated_at),
        ("resolvedAt", incident.resolved_at),
        ("closedAt", incident.closed_at),
    ];
    for (name, prior) in checks {
        if let Some(prior_at) = prior {
            if attempted < prior_at {
                return Err(IncidentError::TemporalOrder {
                    attempted: attempted.to_rfc3339_millis(),
                    prior: name,
                    prior_at: prior_at.to_rfc3339_millis(),
                });
            }
        }
    }
    Ok(())
}

/// Applies a validated transition to the materialized record.
fn apply_transition(
    incident: &mut Incident,
    request: &TransitionRequest,
    from_state: IncidentState,
    to_state: IncidentState,
) {
    incident.state = to_state;
    if from_state != to_state {
        match to_state {
            IncidentState::Open => incident.opened_at = Some(request.current_time),
            IncidentState::Acknowledged => {
                incident.acknowledged_at = Some(request.current_time);
            }
            IncidentState::Mitigated => incident.mitigated_at = Some(request.current_time),
            IncidentState::Resolved => incident.resolved_at = Some(request.current_time),
            IncidentState::Closed => incident.closed_at = Some(request.current_time),
            IncidentState::Pending => {}
        }
    }
    if request.action == IncidentAction::Resolve && incident.resolution.is_none() {
        incident.resolution = request.resolution.clone();
    }
    incident.updated_at = request.current_time;
    incident.version += 1;
    incident.event_seq += 1;
    incident.timeline.push(TransitionAuthority {
        action: request.action,
        authority_id: request.authority.authority_id.clone(),
        authority_type: request.authority.authority_type,
        acted_at: request.current_time,
    });
}

// ============================================================================
// SECTION: Replay
// ============================================================================

/// Rebuilds the creation-time incident from its immutable fields.
fn seed_from(incident: &Incident) -> Incident {
    Incident {
        incident_id: incident.incident_id.clone(),
        service: incident.service.clone(),
        evidence_id: incident.evidence_id.clone(),
        candidate_id: incident.candidate_id.clone(),
        decision_id: incident.decision_id.clone(),
        state: IncidentState::Pending,
        severity: incident.severity,
        title: incident.title.clone(),
        resolution: None,
        created_at: incident.created_at,
        opened_at: None,
        acknowledged_at: None,
        mitigated_at: None,
        resolved_at: None,
        closed_at: None,
        updated_at: incident.created_at,
        version: 1,
        event_seq: 1,
        timeline: Vec::new(),
    }
}

/// Replays one event onto the materialized record.
///
/// The replay touches only fields inside the hashed state view; bookkeeping
/// fields are excluded from the chain by construction.
fn replay_event(incident: &mut Incident, event: &IncidentEvent) {
    incident.state = event.to_state;
    if incident.resolution.is_none() {
        incident.resolution = event.resolution.clone();
    }
    if event.from_state != event.to_state {
        match event.to_state {
            IncidentState::Open => incident.opened_at = Some(event.occurred_at),
            IncidentState::Acknowledged => incident.acknowledged_at = Some(event.occurred_at),
            IncidentState::Mitigated => incident.mitigated_at = Some(event.occurred_at),
            IncidentState::Resolved => incident.resolved_at = Some(event.occurred_at),
            IncidentState::Closed => incident.closed_at = Some(event.occurred_at),
            IncidentState::Pending => {}
        }
    }
    incident.event_seq = event.event_seq;
    incident.version += 1;
}

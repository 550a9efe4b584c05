// crates/incident-plane-http/src/server.rs
// ============================================================================
// Module: HTTP Controller Surface
// Description: Axum routes for promotion, incident actions, and outcomes.
// Purpose: Adapt wire requests onto the deterministic core with injected time.
// Dependencies: axum, incident-plane-core, incident-plane-rules, incident-plane-store-sqlite
// ============================================================================

//! ## Overview
//! The controller is a thin adaptor: it resolves the idempotency key from
//! the `Idempotency-Key` header (deriving one deterministically when the
//! header is absent), injects the wall-clock `current_time` that the core
//! itself never reads, and maps every failure onto the wire error taxonomy.
//! No business decision lives here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::routing::post;
use incident_plane_core::AuthorityId;
use incident_plane_core::AuthorityType;
use incident_plane_core::CandidateId;
use incident_plane_core::HumanAssessment;
use incident_plane_core::Incident;
use incident_plane_core::IncidentAction;
use incident_plane_core::IncidentId;
use incident_plane_core::IncidentManager;
use incident_plane_core::Orchestrator;
use incident_plane_core::OrchestratorDeps;
use incident_plane_core::OutcomeClassification;
use incident_plane_core::OutcomeRecorder;
use incident_plane_core::PolicyId;
use incident_plane_core::PolicyVersion;
use incident_plane_core::PromotionDecision;
use incident_plane_core::PromotionRequest;
use incident_plane_core::Resolution;
use incident_plane_core::Timestamp;
use incident_plane_core::TransitionRequest;
use incident_plane_core::core::promotion::AuthorityContext;
use incident_plane_core::runtime::OutcomeSubmission;
use incident_plane_broker::EventBus;
use incident_plane_rules::RuleCatalog;
use incident_plane_store_sqlite::SqliteStore;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ApiError;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared controller state.
pub struct AppState {
    /// Durable record store implementing every capability.
    pub store: Arc<SqliteStore>,
    /// Frozen rule catalog.
    pub catalog: Arc<RuleCatalog>,
    /// Best-effort event bus.
    pub bus: Arc<EventBus>,
    /// End-to-end promotion orchestrator.
    pub orchestrator: Orchestrator,
    /// Incident manager used for lifecycle actions.
    pub manager: IncidentManager,
    /// Outcome recorder.
    pub recorder: OutcomeRecorder,
}

/// Builds the controller router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/promotions", post(promote))
        .route("/v1/incidents/{incident_id}", get(get_incident))
        .route("/v1/incidents/{incident_id}/actions", post(transition))
        .route("/v1/outcomes", post(record_outcome))
        .with_state(state)
}

/// Reads the host wall clock; the only place time originates.
fn now() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
    Timestamp::from_unix_millis(millis)
}

/// Extracts the idempotency key header when present.
fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("Idempotency-Key").and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Authority block shared by mutating requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AuthorityBody {
    /// Authority identifier.
    authority_id: String,
    /// Authority type.
    authority_type: AuthorityType,
    /// Justification, required for emergency overrides.
    #[serde(default)]
    justification: Option<String>,
}

impl AuthorityBody {
    /// Converts into the core authority context.
    fn into_context(self) -> AuthorityContext {
        AuthorityContext {
            authority_id: AuthorityId::new(self.authority_id),
            authority_type: self.authority_type,
            justification: self.justification,
        }
    }
}

/// Request body for `POST /v1/promotions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PromoteBody {
    /// Wire schema version.
    #[serde(rename = "schemaVersion")]
    _schema_version: String,
    /// Candidate identifier.
    candidate_id: String,
    /// Policy identifier.
    policy_id: String,
    /// Policy version.
    policy_version: String,
    /// Requesting authority.
    authority: AuthorityBody,
}

/// Response body for `POST /v1/promotions`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromoteResponse {
    /// Persisted or converged decision.
    decision: PromotionDecision,
    /// Incident created or joined for PROMOTE verdicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    incident: Option<Incident>,
    /// True when a prior completed attempt satisfied this call.
    converged: bool,
}

/// Request body for `POST /v1/incidents/{id}/actions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ActionBody {
    /// Wire schema version.
    #[serde(rename = "schemaVersion")]
    _schema_version: String,
    /// Lifecycle action.
    action: IncidentAction,
    /// Acting authority.
    authority: AuthorityBody,
    /// Annotation text.
    #[serde(default)]
    note: Option<String>,
    /// Resolution block, required by RESOLVE.
    #[serde(default)]
    resolution: Option<Resolution>,
}

/// Request body for `POST /v1/outcomes`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OutcomeBody {
    /// Wire schema version.
    #[serde(rename = "schemaVersion")]
    _schema_version: String,
    /// Incident the outcome covers.
    incident_id: String,
    /// Validated classification.
    classification: OutcomeClassification,
    /// Assessing authority and notes.
    assessment: AssessmentBody,
}

/// Assessment block of an outcome submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AssessmentBody {
    /// Assessing principal.
    assessed_by: String,
    /// Assessing principal type.
    authority_type: AuthorityType,
    /// Assessment notes.
    notes: String,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Processes a promotion request end to end.
async fn promote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PromoteBody>,
) -> Result<Json<PromoteResponse>, ApiError> {
    let request = PromotionRequest {
        candidate_id: CandidateId::new(body.candidate_id),
        policy_id: PolicyId::new(body.policy_id),
        policy_version: PolicyVersion::new(body.policy_version),
        authority: body.authority.into_context(),
        current_time: now(),
    };

    let deps = OrchestratorDeps {
        candidates: &*state.store,
        evidence: &*state.store,
        policies: &*state.catalog,
        decisions: &*state.store,
        audit: &*state.store,
        incidents: &*state.store,
        idempotency: &*state.store,
        attempts: &*state.store,
        automation: &*state.store,
        emitter: &*state.bus,
    };

    let result = state
        .orchestrator
        .process_candidate(&request, idempotency_key(&headers), &deps)?;

    Ok(Json(PromoteResponse {
        decision: result.decision,
        incident: result.incident,
        converged: result.converged,
    }))
}

/// Returns an incident record.
async fn get_incident(
    State(state): State<Arc<AppState>>,
    Path(incident_id): Path<String>,
) -> Result<Json<Incident>, ApiError> {
    use incident_plane_core::interfaces::IncidentStore;

    let incident_id = IncidentId::new(incident_id);
    let incident = state
        .store
        .get_incident(&incident_id)
        .map_err(|_| ApiError::internal())?
        .ok_or_else(|| ApiError::not_found(format!("incident not found: {incident_id}")))?;
    Ok(Json(incident))
}

/// Applies a lifecycle action to an incident.
async fn transition(
    State(state): State<Arc<AppState>>,
    Path(incident_id): Path<String>,
    Json(body): Json<ActionBody>,
) -> Result<Json<Incident>, ApiError> {
    if body.action == IncidentAction::Read {
        return Err(ApiError::invalid_request(
            "READ is not a mutating action".to_string(),
        ));
    }

    let request = TransitionRequest {
        incident_id: IncidentId::new(incident_id),
        action: body.action,
        authority: body.authority.into_context(),
        note: body.note,
        resolution: body.resolution,
        current_time: now(),
    };

    let incident = state.manager.transition(&request, &*state.store, &*state.bus)?;
    Ok(Json(incident))
}

/// Records a human-validated outcome for a closed incident.
async fn record_outcome(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OutcomeBody>,
) -> Result<Json<incident_plane_core::Outcome>, ApiError> {
    let submission = OutcomeSubmission {
        incident_id: IncidentId::new(body.incident_id),
        classification: body.classification,
        human_assessment: HumanAssessment {
            assessed_by: AuthorityId::new(body.assessment.assessed_by),
            authority_type: body.assessment.authority_type,
            notes: body.assessment.notes,
        },
        recorded_at: now(),
    };

    let recorded = state.recorder.record(
        &submission,
        &*state.store,
        &*state.store,
        &*state.store,
        &*state.store,
        &*state.store,
    )?;
    Ok(Json(recorded.outcome))
}

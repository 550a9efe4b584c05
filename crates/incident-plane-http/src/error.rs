// crates/incident-plane-http/src/error.rs
// ============================================================================
// Module: HTTP Error Taxonomy
// Description: Mapping from core errors onto the wire error contract.
// Purpose: Keep raw internal error text away from clients.
// Dependencies: axum, serde, incident-plane-core
// ============================================================================

//! ## Overview
//! Every handler failure maps onto the small wire taxonomy: 400
//! INVALID_REQUEST / MISSING_RESOLUTION, 404 NOT_FOUND, 409
//! ILLEGAL_TRANSITION / RESOLUTION_IMMUTABLE / CONFLICT, 429
//! RATE_LIMIT_EXCEEDED with `Retry-After`, and 500 INTERNAL_ERROR. Internal
//! error text is logged server-side and never echoed to clients.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::IntoResponse;
use axum::response::Response;
use incident_plane_core::runtime::IncidentError;
use incident_plane_core::runtime::OrchestratorError;
use incident_plane_core::runtime::OutcomeError;
use incident_plane_core::runtime::PromotionError;
use serde::Serialize;

// ============================================================================
// SECTION: Wire Error
// ============================================================================

/// Wire-level error body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable error code.
    pub code: &'static str,
    /// Client-safe message.
    pub message: String,
}

/// API error carrying its HTTP mapping.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Wire body.
    pub body: ErrorBody,
    /// Retry hint in seconds for rate-limit responses.
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    /// Builds an error from its parts.
    #[must_use]
    pub const fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message,
            },
            retry_after_seconds: None,
        }
    }

    /// Builds a 400 INVALID_REQUEST error.
    #[must_use]
    pub const fn invalid_request(message: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    /// Builds a 404 NOT_FOUND error.
    #[must_use]
    pub const fn not_found(message: String) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Builds a 500 INTERNAL_ERROR error with a client-safe message.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal error".to_string(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(seconds) = self.retry_after_seconds {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

// ============================================================================
// SECTION: Core Error Mapping
// ============================================================================

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::AutomationHalted => Self::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                "automated promotion is halted".to_string(),
            ),
            OrchestratorError::CandidateNotFound(id) => {
                Self::not_found(format!("candidate not found: {id}"))
            }
            OrchestratorError::EvidenceMissing(id) => {
                Self::not_found(format!("evidence missing for candidate: {id}"))
            }
            OrchestratorError::Promotion(inner) => inner.into(),
            OrchestratorError::Incident(inner) => inner.into(),
            OrchestratorError::Idempotency(_) | OrchestratorError::Store(_) => Self::internal(),
        }
    }
}

impl From<PromotionError> for ApiError {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::Validation {
                field,
                reason,
            } => Self::invalid_request(format!("{field}: {reason}")),
            PromotionError::CandidateNotFound(id) => {
                Self::not_found(format!("candidate not found: {id}"))
            }
            PromotionError::PolicyNotFound {
                id,
                version,
            } => Self::not_found(format!("policy not found: {id}@{version}")),
            PromotionError::Store(_) => Self::internal(),
        }
    }
}

impl From<IncidentError> for ApiError {
    fn from(err: IncidentError) -> Self {
        match err {
            IncidentError::RateLimited {
                retry_after_ms,
            } => {
                let mut error = Self::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMIT_EXCEEDED",
                    "rate limit exceeded".to_string(),
                );
                error.retry_after_seconds = Some(retry_after_ms.div_ceil(1_000).max(1));
                error
            }
            IncidentError::NotFound(id) => Self::not_found(format!("incident not found: {id}")),
            IncidentError::Authority {
                action,
                severity,
                required,
                ..
            } => Self::new(
                StatusCode::CONFLICT,
                "ILLEGAL_TRANSITION",
                format!(
                    "{action} on a {severity} incident requires one of {}",
                    required.join(", ")
                ),
            ),
            IncidentError::IllegalTransition {
                current,
                attempted,
            } => Self::new(
                StatusCode::CONFLICT,
                "ILLEGAL_TRANSITION",
                format!("cannot transition from {current} to {attempted}"),
            ),
            IncidentError::MissingResolution => Self::new(
                StatusCode::BAD_REQUEST,
                "MISSING_RESOLUTION",
                "resolve requires a resolution block".to_string(),
            ),
            IncidentError::ResolutionImmutable => Self::new(
                StatusCode::CONFLICT,
                "RESOLUTION_IMMUTABLE",
                "resolution metadata is immutable".to_string(),
            ),
            IncidentError::TemporalOrder {
                ..
            } => Self::invalid_request("transition time violates temporal ordering".to_string()),
            IncidentError::Conflict {
                ..
            } => Self::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                "concurrent update; retry from a fresh read".to_string(),
            ),
            IncidentError::NotPromoted(_)
            | IncidentError::ChainMismatch {
                ..
            }
            | IncidentError::Store(_)
            | IncidentError::Hash(_) => Self::internal(),
        }
    }
}

impl From<OutcomeError> for ApiError {
    fn from(err: OutcomeError) -> Self {
        match err {
            OutcomeError::IncidentNotFound(id) => {
                Self::not_found(format!("incident not found: {id}"))
            }
            OutcomeError::IncidentNotClosed {
                state,
            } => Self::new(
                StatusCode::CONFLICT,
                "ILLEGAL_TRANSITION",
                format!("outcome requires a closed incident; state is {state}"),
            ),
            OutcomeError::AutomatedAuthority => Self::invalid_request(
                "AUTO_ENGINE_FORBIDDEN: outcomes require a human authority".to_string(),
            ),
            OutcomeError::Validation {
                field,
                reason,
            } => Self::invalid_request(format!("{field}: {reason}")),
            OutcomeError::ClassificationContradiction => Self::invalid_request(
                "classification must assert exactly one of truePositive or falsePositive"
                    .to_string(),
            ),
            OutcomeError::TemporalInconsistency {
                missing,
            } => Self::invalid_request(format!("incident timeline is missing {missing}")),
            OutcomeError::Store(_) => Self::internal(),
        }
    }
}

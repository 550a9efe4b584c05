// crates/incident-plane-http/tests/error_taxonomy.rs
// ============================================================================
// Module: Error Taxonomy Tests
// Description: Mapping of core errors onto the wire contract.
// ============================================================================
//! ## Overview
//! Verifies that every core failure maps to its documented status and code,
//! that rate limits carry a retry hint, and that internal failures never leak
//! their text to clients.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use axum::http::StatusCode;
use incident_plane_core::CandidateId;
use incident_plane_core::IncidentId;
use incident_plane_core::interfaces::StoreError;
use incident_plane_core::runtime::IncidentError;
use incident_plane_core::runtime::OrchestratorError;
use incident_plane_core::runtime::OutcomeError;
use incident_plane_core::runtime::PromotionError;
use incident_plane_http::ApiError;

// ============================================================================
// SECTION: Promotion Errors
// ============================================================================

/// Tests the 400 and 404 promotion mappings.
#[test]
fn test_promotion_error_mapping() {
    let invalid: ApiError = PromotionError::Validation {
        field: "candidateId",
        reason: "must be a digest".to_string(),
    }
    .into();
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body.code, "INVALID_REQUEST");

    let missing: ApiError =
        PromotionError::CandidateNotFound(CandidateId::new("c".repeat(64))).into();
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body.code, "NOT_FOUND");
}

// ============================================================================
// SECTION: Incident Errors
// ============================================================================

/// Tests the 409 family and the 429 retry hint.
#[test]
fn test_incident_error_mapping() {
    let illegal: ApiError = IncidentError::IllegalTransition {
        current: "PENDING",
        attempted: "MITIGATED",
    }
    .into();
    assert_eq!(illegal.status, StatusCode::CONFLICT);
    assert_eq!(illegal.body.code, "ILLEGAL_TRANSITION");

    let missing_resolution: ApiError = IncidentError::MissingResolution.into();
    assert_eq!(missing_resolution.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing_resolution.body.code, "MISSING_RESOLUTION");

    let immutable: ApiError = IncidentError::ResolutionImmutable.into();
    assert_eq!(immutable.status, StatusCode::CONFLICT);
    assert_eq!(immutable.body.code, "RESOLUTION_IMMUTABLE");

    let conflict: ApiError = IncidentError::Conflict {
        expected: 3,
        actual: 4,
    }
    .into();
    assert_eq!(conflict.status, StatusCode::CONFLICT);
    assert_eq!(conflict.body.code, "CONFLICT");

    let limited: ApiError = IncidentError::RateLimited {
        retry_after_ms: 1_500,
    }
    .into();
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body.code, "RATE_LIMIT_EXCEEDED");
    assert_eq!(limited.retry_after_seconds, Some(2));

    let not_found: ApiError = IncidentError::NotFound(IncidentId::new("i".repeat(64))).into();
    assert_eq!(not_found.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// SECTION: Internal Errors
// ============================================================================

/// Tests that internal error text never reaches the client.
#[test]
fn test_internal_errors_are_redacted() {
    let secret = "connection string postgres://user:hunter2@db";
    let internal: ApiError =
        OrchestratorError::Store(StoreError::Io(secret.to_string())).into();

    assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(internal.body.code, "INTERNAL_ERROR");
    assert!(!internal.body.message.contains("hunter2"));
    assert_eq!(internal.body.message, "internal error");
}

// ============================================================================
// SECTION: Outcome Errors
// ============================================================================

/// Tests the outcome acceptance-gate mappings.
#[test]
fn test_outcome_error_mapping() {
    let automated: ApiError = OutcomeError::AutomatedAuthority.into();
    assert_eq!(automated.status, StatusCode::BAD_REQUEST);
    assert!(automated.body.message.contains("AUTO_ENGINE_FORBIDDEN"));

    let not_closed: ApiError = OutcomeError::IncidentNotClosed {
        state: "OPEN",
    }
    .into();
    assert_eq!(not_closed.status, StatusCode::CONFLICT);

    let contradiction: ApiError = OutcomeError::ClassificationContradiction.into();
    assert_eq!(contradiction.status, StatusCode::BAD_REQUEST);
}

// crates/incident-plane-core/src/core/idempotency.rs
// ============================================================================
// Module: Incident Plane Idempotency Types
// Description: Permanent claim records for mutating entry points.
// Purpose: Provide the record shape behind end-to-end duplicate suppression.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Every mutating entry point presents an idempotency key before executing.
//! Claim records are permanent audit artifacts, not caches: they carry no TTL
//! and are never deleted. A completed record stores the canonical response so
//! retried callers observe the original result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::IdempotencyKey;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Record
// ============================================================================

/// Claim status of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    /// The operation is executing.
    InProgress,
    /// The operation completed and its response is attached.
    Completed,
}

/// Permanent idempotency claim record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    /// Claimed key.
    pub idempotency_key: IdempotencyKey,
    /// Hash of the canonicalized request that claimed the key.
    pub request_hash: String,
    /// Claim status.
    pub status: IdempotencyStatus,
    /// Response attached at completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Claim time injected by the caller.
    pub claimed_at: Timestamp,
    /// Completion time injected by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

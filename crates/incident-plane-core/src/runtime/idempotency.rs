// crates/incident-plane-core/src/runtime/idempotency.rs
// ============================================================================
// Module: Incident Plane Idempotency Service
// Description: Key derivation, claiming, and completion for mutating calls.
// Purpose: Guarantee at most one side-effect per idempotency key.
// Dependencies: serde, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Every mutating entry point presents a key before executing: the client's
//! own key when supplied, otherwise a deterministic derivation from the
//! principal, the operation, and the canonicalized request. Claiming is a
//! conditional write; the loser of a race observes the winner's record and
//! converges on its result instead of re-executing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::HashError;
use crate::core::IdempotencyKey;
use crate::core::IdempotencyRecord;
use crate::core::IdempotencyStatus;
use crate::core::Timestamp;
use crate::core::canonical_json_bytes;
use crate::core::derive_idempotency_key;
use crate::core::sha256_hex;
use crate::interfaces::IdempotencyStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Idempotency service errors.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// Request canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Claim Outcome
// ============================================================================

/// Outcome of attempting to claim a key.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// This caller holds the claim and must execute the operation.
    Claimed,
    /// Another caller completed the operation; its response is authoritative.
    Completed {
        /// Response attached by the completing caller.
        response: Option<Value>,
    },
    /// Another caller is still executing; retry later.
    InFlight,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Idempotency service over a permanent claim store.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyService;

impl IdempotencyService {
    /// Creates a new idempotency service.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves the key for a request: client key wins, else derived.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Hash`] when derivation fails.
    pub fn key_for<T: Serialize>(
        &self,
        principal: &str,
        operation: &str,
        request: &T,
        client_key: Option<&str>,
    ) -> Result<IdempotencyKey, IdempotencyError> {
        if let Some(key) = client_key {
            return Ok(IdempotencyKey::new(key));
        }
        Ok(IdempotencyKey::new(derive_idempotency_key(principal, operation, request)?))
    }

    /// Hashes the canonicalized request for claim verification.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Hash`] when canonicalization fails.
    pub fn request_hash<T: Serialize>(&self, request: &T) -> Result<String, IdempotencyError> {
        let bytes = canonical_json_bytes(request)?;
        Ok(sha256_hex(&bytes))
    }

    /// Attempts to claim a key for execution.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Store`] when the store fails.
    pub fn claim(
        &self,
        key: &IdempotencyKey,
        request_hash: &str,
        claimed_at: Timestamp,
        store: &dyn IdempotencyStore,
    ) -> Result<ClaimOutcome, IdempotencyError> {
        let record = IdempotencyRecord {
            idempotency_key: key.clone(),
            request_hash: request_hash.to_string(),
            status: IdempotencyStatus::InProgress,
            response: None,
            claimed_at,
            completed_at: None,
        };
        if store.claim(&record)? {
            return Ok(ClaimOutcome::Claimed);
        }

        // The key is held; converge on the holder's state.
        match store.get(key)? {
            Some(existing) if existing.status == IdempotencyStatus::Completed => {
                Ok(ClaimOutcome::Completed {
                    response: existing.response,
                })
            }
            _ => Ok(ClaimOutcome::InFlight),
        }
    }

    /// Marks a claim completed with its canonical response.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Store`] when the update fails.
    pub fn complete(
        &self,
        key: &IdempotencyKey,
        response: Value,
        completed_at: Timestamp,
        store: &dyn IdempotencyStore,
    ) -> Result<(), IdempotencyError> {
        store.complete(key, response, completed_at)?;
        Ok(())
    }
}

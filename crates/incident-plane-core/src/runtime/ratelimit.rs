// crates/incident-plane-core/src/runtime/ratelimit.rs
// ============================================================================
// Module: Incident Plane Authority Rate Limiter
// Description: Token-bucket limiting keyed by authority and action.
// Purpose: Throttle principals without ever touching identity computation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Rate limiting is authority-scoped only: buckets key on
//! `{authority_id, authority_type, action}`. Per-incident throttling is
//! forbidden — write contention on a single incident is handled by the
//! optimistic-concurrency version counter instead. The limiter refills
//! tokens from the wall clock, which is acceptable because rate limiting is
//! not part of replay determinism; its state must never leak into any
//! identity computation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use crate::core::AuthorityId;
use crate::core::IncidentAction;
use crate::core::rule::AuthorityType;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Token-bucket configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Maximum tokens a bucket can hold.
    pub burst: u32,
    /// Tokens refilled per second.
    pub refill_per_second: f64,
    /// Maximum tracked buckets before eviction kicks in.
    pub max_entries: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 10,
            refill_per_second: 1.0,
            max_entries: 10_000,
        }
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Decision returned by the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Allow the request.
    Allow,
    /// Limit the request with a retry delay.
    Limited {
        /// Milliseconds before retrying the request.
        retry_after_ms: u64,
    },
}

// ============================================================================
// SECTION: Limiter
// ============================================================================

/// Rolling state for a single bucket.
struct Bucket {
    /// Tokens currently available.
    tokens: f64,
    /// Last refill instant.
    refilled_at: Instant,
}

/// Token-bucket rate limiter keyed by authority and action.
pub struct AuthorityRateLimiter {
    /// Limiter configuration.
    config: RateLimitConfig,
    /// Per-key buckets.
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl AuthorityRateLimiter {
    /// Creates a new limiter from configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Checks and debits the bucket for one request.
    #[must_use]
    pub fn check(
        &self,
        authority_id: &AuthorityId,
        authority_type: AuthorityType,
        action: IncidentAction,
    ) -> RateLimitDecision {
        let key = format!("{authority_id}#{}#{}", authority_type.as_str(), action.as_str());
        let now = Instant::now();

        let Ok(mut buckets) = self.buckets.lock() else {
            // A poisoned limiter must not take the control plane down with it.
            return RateLimitDecision::Allow;
        };

        if buckets.len() > self.config.max_entries {
            let horizon = Duration::from_secs(300);
            buckets.retain(|_, bucket| now.duration_since(bucket.refilled_at) <= horizon);
        }

        let bucket = buckets.entry(key).or_insert(Bucket {
            tokens: f64::from(self.config.burst),
            refilled_at: now,
        });

        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = f64::from(self.config.burst)
            .min(bucket.tokens + elapsed * self.config.refill_per_second);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allow
        } else {
            let deficit = 1.0 - bucket.tokens;
            let wait_seconds = if self.config.refill_per_second > 0.0 {
                deficit / self.config.refill_per_second
            } else {
                f64::from(u32::MAX)
            };
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "Wait is clamped non-negative and far below u64::MAX millis."
            )]
            let retry_after_ms = (wait_seconds.max(0.0) * 1_000.0).ceil() as u64;
            RateLimitDecision::Limited {
                retry_after_ms,
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use super::AuthorityRateLimiter;
    use super::RateLimitConfig;
    use super::RateLimitDecision;
    use crate::core::AuthorityId;
    use crate::core::IncidentAction;
    use crate::core::rule::AuthorityType;

    /// Tests that the burst drains and then limits.
    #[test]
    fn test_burst_then_limited() {
        let limiter = AuthorityRateLimiter::new(RateLimitConfig {
            burst: 2,
            refill_per_second: 0.0,
            max_entries: 16,
        });
        let alice = AuthorityId::new("user:alice@example.com");

        assert_eq!(
            limiter.check(&alice, AuthorityType::HumanOperator, IncidentAction::Open),
            RateLimitDecision::Allow
        );
        assert_eq!(
            limiter.check(&alice, AuthorityType::HumanOperator, IncidentAction::Open),
            RateLimitDecision::Allow
        );
        assert!(matches!(
            limiter.check(&alice, AuthorityType::HumanOperator, IncidentAction::Open),
            RateLimitDecision::Limited { .. }
        ));
    }

    /// Tests that buckets are scoped per authority and action.
    #[test]
    fn test_buckets_are_authority_scoped() {
        let limiter = AuthorityRateLimiter::new(RateLimitConfig {
            burst: 1,
            refill_per_second: 0.0,
            max_entries: 16,
        });
        let alice = AuthorityId::new("user:alice@example.com");
        let bob = AuthorityId::new("user:bob@example.com");

        assert_eq!(
            limiter.check(&alice, AuthorityType::HumanOperator, IncidentAction::Close),
            RateLimitDecision::Allow
        );
        // A different authority has its own bucket.
        assert_eq!(
            limiter.check(&bob, AuthorityType::HumanOperator, IncidentAction::Close),
            RateLimitDecision::Allow
        );
        // A different action has its own bucket too.
        assert_eq!(
            limiter.check(&alice, AuthorityType::HumanOperator, IncidentAction::Annotate),
            RateLimitDecision::Allow
        );
    }
}

// crates/incident-plane-core/src/core/rule.rs
// ============================================================================
// Module: Incident Plane Rule Types
// Description: Detection rules, correlation rules, and promotion policies.
// Purpose: Provide the immutable, versioned rule shapes evaluated by the core.
// Dependencies: serde, regex, crate::core::{identifiers, signal, time}
// ============================================================================

//! ## Overview
//! Rules are static data: once loaded into a catalog they are never mutated,
//! and behavioral changes require a new version. Each rule kind carries a
//! `validate` method used by the loader to fail fast on schema violations,
//! including regex patterns that do not compile.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::PolicyId;
use crate::core::identifiers::PolicyVersion;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::RuleVersion;
use crate::core::signal::ConfidenceGrade;
use crate::core::signal::Severity;
use crate::core::time::WindowTruncation;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum correlation window in minutes (24 hours).
pub const MAX_WINDOW_MINUTES: u32 = 1_440;
/// Maximum detections a correlation rule may bundle into one candidate.
pub const MAX_DETECTIONS_PER_CANDIDATE: u32 = 100;
/// Minimum justification length required for an emergency override.
pub const MIN_OVERRIDE_JUSTIFICATION_CHARS: usize = 20;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rule schema violations detected at load time.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A required field is empty or missing.
    #[error("rule {rule}: field {field} is invalid: {reason}")]
    InvalidField {
        /// Rule identifier under validation.
        rule: String,
        /// Field path that failed validation.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// A regex pattern failed to compile.
    #[error("rule {rule}: pattern {pattern:?} failed to compile: {reason}")]
    InvalidPattern {
        /// Rule identifier under validation.
        rule: String,
        /// Offending pattern text.
        pattern: String,
        /// Compiler error message.
        reason: String,
    },
}

/// Builds an invalid-field error for the given rule.
fn invalid_field(rule: &RuleId, field: &'static str, reason: impl Into<String>) -> RuleError {
    RuleError::InvalidField {
        rule: rule.to_string(),
        field,
        reason: reason.into(),
    }
}

/// Validates a semver-shaped version string (`major.minor.patch`).
fn validate_semver(rule: &RuleId, field: &'static str, version: &str) -> Result<(), RuleError> {
    let mut parts = 0usize;
    for part in version.split('.') {
        if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid_field(rule, field, format!("not semver: {version}")));
        }
        parts += 1;
    }
    if parts == 3 {
        Ok(())
    } else {
        Err(invalid_field(rule, field, format!("not semver: {version}")))
    }
}

// ============================================================================
// SECTION: Signal Matcher
// ============================================================================

/// Dimension filter applied before conditions are evaluated.
///
/// # Invariants
/// - Dimensions that are specified are joined by AND.
/// - Values within a dimension are joined by OR.
/// - An unspecified (empty) dimension matches every signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalMatcher {
    /// Accepted signal types.
    pub signal_types: Vec<String>,
    /// Accepted source services.
    pub sources: Vec<String>,
    /// Accepted severities.
    pub severities: Vec<Severity>,
    /// Accepted confidence grades.
    pub confidences: Vec<ConfidenceGrade>,
}

// ============================================================================
// SECTION: Conditions
// ============================================================================

/// Operator applied by a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    /// Value equals the expected value.
    Eq,
    /// Value differs from the expected value.
    Neq,
    /// Value is a member of the expected array.
    In,
    /// Value is not a member of the expected array.
    NotIn,
    /// Numeric value is greater than expected.
    Gt,
    /// Numeric value is greater than or equal to expected.
    Ge,
    /// Numeric value is less than expected.
    Lt,
    /// Numeric value is less than or equal to expected.
    Le,
    /// Field resolves to a present value.
    Exists,
    /// String value matches the expected regex.
    Regex,
    /// String value starts with the expected prefix.
    StartsWith,
    /// String value ends with the expected suffix.
    EndsWith,
}

impl ConditionOperator {
    /// Returns the stable wire label for the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Exists => "exists",
            Self::Regex => "regex",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }

    /// Returns true when the operator requires an expected value.
    #[must_use]
    pub const fn requires_expected(self) -> bool {
        !matches!(self, Self::Exists)
    }
}

/// Single ordered condition evaluated against a signal field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// Field path into the signal (`prop`, `prop.nested`, `prop[index]`).
    pub field: String,
    /// Operator applied to the resolved value.
    pub operator: ConditionOperator,
    /// Expected value, absent for `exists`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
}

// ============================================================================
// SECTION: Detection Rule
// ============================================================================

/// Versioned rule grading a single signal into a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRule {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Rule version (semver).
    pub rule_version: RuleVersion,
    /// Dimension filter applied before conditions.
    #[serde(default)]
    pub signal_matcher: SignalMatcher,
    /// Ordered conditions; the first failure short-circuits evaluation.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// Severity assigned to matching detections.
    pub output_severity: Severity,
    /// Confidence grade assigned to matching detections.
    pub output_confidence: ConfidenceGrade,
}

impl DetectionRule {
    /// Validates the rule shape, failing fast on the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when a field is malformed or a pattern does not
    /// compile.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.rule_id.as_str().is_empty() {
            return Err(invalid_field(&self.rule_id, "ruleId", "empty"));
        }
        validate_semver(&self.rule_id, "ruleVersion", self.rule_version.as_str())?;
        for condition in &self.conditions {
            if condition.field.is_empty() {
                return Err(invalid_field(&self.rule_id, "conditions.field", "empty path"));
            }
            if condition.operator.requires_expected() && condition.expected.is_none() {
                return Err(invalid_field(
                    &self.rule_id,
                    "conditions.expected",
                    format!("operator {} requires an expected value", condition.operator.as_str()),
                ));
            }
            if condition.operator == ConditionOperator::Regex {
                let pattern = condition.expected.as_ref().and_then(Value::as_str).ok_or_else(
                    || invalid_field(&self.rule_id, "conditions.expected", "regex expects string"),
                )?;
                regex::Regex::new(pattern).map_err(|err| RuleError::InvalidPattern {
                    rule: self.rule_id.to_string(),
                    pattern: pattern.to_string(),
                    reason: err.to_string(),
                })?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Correlation Rule
// ============================================================================

/// Key field substituted into the correlation identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyField {
    /// Owning service of the trigger detection.
    Service,
    /// Source service of the trigger signal.
    Source,
    /// Detection rule identifier.
    RuleId,
    /// Correlation window truncated to the configured boundary.
    WindowTruncated,
    /// Signal type of the trigger signal.
    SignalType,
    /// Environment name of the trigger signal, empty when absent.
    Environment,
}

impl KeyField {
    /// Returns the stable wire label for the key field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Source => "source",
            Self::RuleId => "ruleId",
            Self::WindowTruncated => "windowTruncated",
            Self::SignalType => "signalType",
            Self::Environment => "environment",
        }
    }
}

/// Matcher constraining which detections join a correlation window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorrelationMatcher {
    /// Require the trigger's service.
    pub same_service: bool,
    /// Require the trigger's source signal service.
    pub same_source: bool,
    /// Require the trigger's detection rule.
    pub same_rule_id: bool,
    /// Accepted signal types; empty accepts all.
    pub signal_types: Vec<String>,
    /// Accepted severities; empty accepts all.
    pub severities: Vec<Severity>,
}

/// Additive confidence boost applied during candidate generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfidenceBoost {
    /// Boost applied when the candidate has more than one detection.
    pub multiple_detections: f64,
    /// Boost applied when the maximum severity is SEV1.
    pub max_severity_sev1: f64,
    /// Boost applied when detections span more than one rule.
    pub rule_diversity: f64,
}

/// Versioned rule correlating detections into candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationRule {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Rule version (semver).
    pub rule_version: RuleVersion,
    /// Whether the rule participates in generation.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Matcher constraining window membership.
    #[serde(default)]
    pub matcher: CorrelationMatcher,
    /// Correlation window length in minutes.
    pub window_minutes: u32,
    /// Truncation boundary used for the `windowTruncated` key field.
    pub window_truncation: WindowTruncation,
    /// Minimum surviving detections required to emit a candidate.
    pub min_detections: u32,
    /// Maximum detections bundled into one candidate.
    pub max_detections: u32,
    /// Key fields folded into the correlation identity.
    pub key_fields: Vec<KeyField>,
    /// Confidence boost weights.
    #[serde(default)]
    pub confidence_boost: ConfidenceBoost,
}

/// Serde default for rule enablement.
const fn default_enabled() -> bool {
    true
}

impl CorrelationRule {
    /// Validates the rule shape, failing fast on the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when a bound or field is out of range.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.rule_id.as_str().is_empty() {
            return Err(invalid_field(&self.rule_id, "ruleId", "empty"));
        }
        validate_semver(&self.rule_id, "ruleVersion", self.rule_version.as_str())?;
        if self.window_minutes == 0 || self.window_minutes > MAX_WINDOW_MINUTES {
            return Err(invalid_field(
                &self.rule_id,
                "windowMinutes",
                format!("must be in 1..={MAX_WINDOW_MINUTES}"),
            ));
        }
        if self.min_detections == 0 {
            return Err(invalid_field(&self.rule_id, "minDetections", "must be >= 1"));
        }
        if self.max_detections < self.min_detections
            || self.max_detections > MAX_DETECTIONS_PER_CANDIDATE
        {
            return Err(invalid_field(
                &self.rule_id,
                "maxDetections",
                format!("must be in minDetections..={MAX_DETECTIONS_PER_CANDIDATE}"),
            ));
        }
        if self.key_fields.is_empty() {
            return Err(invalid_field(&self.rule_id, "keyFields", "at least one required"));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Promotion Policy
// ============================================================================

/// Authority types recognized by the control plane.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorityType {
    /// Automated promotion engine.
    AutoEngine,
    /// Human operator.
    HumanOperator,
    /// On-call site reliability engineer.
    OnCallSre,
    /// Emergency override principal.
    EmergencyOverride,
}

impl AuthorityType {
    /// Returns the stable wire label for the authority type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AutoEngine => "AUTO_ENGINE",
            Self::HumanOperator => "HUMAN_OPERATOR",
            Self::OnCallSre => "ON_CALL_SRE",
            Self::EmergencyOverride => "EMERGENCY_OVERRIDE",
        }
    }

    /// Returns true for human-backed authority types.
    #[must_use]
    pub const fn is_human(self) -> bool {
        !matches!(self, Self::AutoEngine)
    }
}

/// Eligibility gates a candidate must clear before promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEligibility {
    /// Minimum candidate confidence score.
    pub min_confidence: f64,
    /// Allowed suggested severities.
    pub allowed_severities: Vec<Severity>,
    /// Minimum detections in the candidate.
    pub min_detections: u32,
    /// Maximum candidate age in minutes at evaluation time.
    pub max_age_minutes: u32,
}

/// Deferral conditions that postpone a promotion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyDeferral {
    /// Defer while an incident for the same service is still pending or open.
    pub active_incident_same_service: bool,
    /// Cooldown in minutes after a prior decision for the same service.
    pub service_cooldown_minutes: u32,
}

/// Rejection conditions that refuse a promotion outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyRejection {
    /// Reject when the candidate already has a promotion decision.
    pub duplicate_candidate: bool,
    /// Reject candidates older than this bound in minutes (0 disables).
    pub stale_after_minutes: u32,
    /// Reject candidates with fewer detections than this floor (0 disables).
    pub min_evidence_detections: u32,
}

/// Versioned policy gating candidate promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPolicy {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Policy version (semver).
    pub policy_version: PolicyVersion,
    /// Eligibility gates.
    pub eligibility: PolicyEligibility,
    /// Authority types permitted to request promotion.
    pub allowed_authorities: Vec<AuthorityType>,
    /// Deferral conditions.
    #[serde(default)]
    pub deferral: PolicyDeferral,
    /// Rejection conditions.
    #[serde(default)]
    pub rejection: PolicyRejection,
}

impl PromotionPolicy {
    /// Validates the policy shape, failing fast on the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when a bound or field is out of range.
    pub fn validate(&self) -> Result<(), RuleError> {
        let rule = RuleId::new(self.policy_id.as_str());
        if self.policy_id.as_str().is_empty() {
            return Err(invalid_field(&rule, "policyId", "empty"));
        }
        validate_semver(&rule, "policyVersion", self.policy_version.as_str())?;
        if !(0.0..=1.0).contains(&self.eligibility.min_confidence) {
            return Err(invalid_field(&rule, "eligibility.minConfidence", "must be in [0, 1]"));
        }
        if self.eligibility.allowed_severities.is_empty() {
            return Err(invalid_field(
                &rule,
                "eligibility.allowedSeverities",
                "at least one required",
            ));
        }
        if self.allowed_authorities.is_empty() {
            return Err(invalid_field(&rule, "allowedAuthorities", "at least one required"));
        }
        Ok(())
    }
}

// crates/incident-plane-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Fixtures
// Description: Shared builders for signals, detections, rules, and policies.
// ============================================================================
//! ## Overview
//! Builders for the record shapes the core tests exercise. Values are fixed
//! and deterministic so identity assertions stay byte-stable.

#![allow(
    dead_code,
    clippy::unwrap_used,
    reason = "Fixtures are shared across test binaries that each use a subset."
)]

use incident_plane_core::AuthorityContext;
use incident_plane_core::AuthorityId;
use incident_plane_core::AuthorityType;
use incident_plane_core::ConfidenceGrade;
use incident_plane_core::CorrelationMatcher;
use incident_plane_core::CorrelationRule;
use incident_plane_core::Detection;
use incident_plane_core::DetectionDecision;
use incident_plane_core::DetectionId;
use incident_plane_core::DetectionRule;
use incident_plane_core::KeyField;
use incident_plane_core::NormalizedSignal;
use incident_plane_core::PolicyEligibility;
use incident_plane_core::PolicyId;
use incident_plane_core::PolicyVersion;
use incident_plane_core::PromotionPolicy;
use incident_plane_core::ResourceRef;
use incident_plane_core::RuleId;
use incident_plane_core::RuleVersion;
use incident_plane_core::ServiceName;
use incident_plane_core::Severity;
use incident_plane_core::SignalId;
use incident_plane_core::SignalMatcher;
use incident_plane_core::Timestamp;
use incident_plane_core::WindowTruncation;
use incident_plane_core::rule::PolicyDeferral;
use incident_plane_core::rule::PolicyRejection;

/// Parses a fixed RFC 3339 timestamp.
pub fn ts(value: &str) -> Timestamp {
    Timestamp::parse(value).unwrap()
}

/// Builds a normalized signal for the checkout service.
pub fn signal(id: &str, at: &str) -> NormalizedSignal {
    NormalizedSignal {
        normalized_signal_id: SignalId::new(id),
        source_signal_id: format!("src-{id}"),
        signal_type: "metric-alarm".to_string(),
        source: ServiceName::new("checkout"),
        severity: Severity::Sev2,
        confidence: ConfidenceGrade::High,
        timestamp: ts(at),
        resource_refs: vec![ResourceRef {
            ref_type: "lambda-function".to_string(),
            ref_value: "checkout-fn".to_string(),
        }],
        environment_refs: Vec::new(),
        evidence_refs: Vec::new(),
        normalization_version: "1.0.0".to_string(),
    }
}

/// Builds a MATCH detection with explicit identity and grading.
pub fn detection(id: &str, signal_id: &str, severity: Severity, at: &str) -> Detection {
    Detection {
        detection_id: DetectionId::new(id),
        rule_id: RuleId::new("lambda-error-rate"),
        rule_version: RuleVersion::new("1.0.0"),
        normalized_signal_id: SignalId::new(signal_id),
        service: ServiceName::new("checkout"),
        signal_timestamp: ts(at),
        decision: DetectionDecision::Match,
        severity,
        confidence: ConfidenceGrade::High,
        evaluation_trace: Vec::new(),
        detection_version: "1.0.0".to_string(),
    }
}

/// Builds a detection rule matching metric alarms for checkout.
pub fn detection_rule() -> DetectionRule {
    DetectionRule {
        rule_id: RuleId::new("lambda-error-rate"),
        rule_version: RuleVersion::new("1.0.0"),
        signal_matcher: SignalMatcher {
            signal_types: vec!["metric-alarm".to_string()],
            sources: Vec::new(),
            severities: Vec::new(),
            confidences: Vec::new(),
        },
        conditions: Vec::new(),
        output_severity: Severity::Sev2,
        output_confidence: ConfidenceGrade::High,
    }
}

/// Builds a same-service correlation rule with a 60-minute window.
pub fn correlation_rule() -> CorrelationRule {
    CorrelationRule {
        rule_id: RuleId::new("checkout-correlation"),
        rule_version: RuleVersion::new("1.0.0"),
        enabled: true,
        matcher: CorrelationMatcher {
            same_service: true,
            same_source: false,
            same_rule_id: false,
            signal_types: Vec::new(),
            severities: Vec::new(),
        },
        window_minutes: 60,
        window_truncation: WindowTruncation::Hour,
        min_detections: 1,
        max_detections: 10,
        key_fields: vec![KeyField::Service, KeyField::WindowTruncated],
        confidence_boost: incident_plane_core::ConfidenceBoost {
            multiple_detections: 0.2,
            max_severity_sev1: 0.3,
            rule_diversity: 0.0,
        },
    }
}

/// Builds a permissive default promotion policy.
pub fn policy() -> PromotionPolicy {
    PromotionPolicy {
        policy_id: PolicyId::new("default"),
        policy_version: PolicyVersion::new("1.0.0"),
        eligibility: PolicyEligibility {
            min_confidence: 0.3,
            allowed_severities: vec![Severity::Sev1, Severity::Sev2, Severity::Sev3],
            min_detections: 1,
            max_age_minutes: 120,
        },
        allowed_authorities: vec![
            AuthorityType::AutoEngine,
            AuthorityType::HumanOperator,
            AuthorityType::OnCallSre,
            AuthorityType::EmergencyOverride,
        ],
        deferral: PolicyDeferral::default(),
        rejection: PolicyRejection::default(),
    }
}

/// Builds an authority context of the given type.
pub fn authority(id: &str, kind: AuthorityType) -> AuthorityContext {
    AuthorityContext {
        authority_id: AuthorityId::new(id),
        authority_type: kind,
        justification: None,
    }
}

// crates/incident-plane-core/src/core/detection.rs
// ============================================================================
// Module: Incident Plane Detection Types
// Description: Detection results, evaluation traces, and metadata records.
// Purpose: Provide the immutable evidence unit produced by rule evaluation.
// Dependencies: serde, crate::core::{identifiers, signal, time}
// ============================================================================

//! ## Overview
//! A detection is a rule-graded signal, the smallest evidence unit in the
//! pipeline. The detection *result* body is content-addressed and excludes
//! any non-deterministic metadata; `detected_at` lives in a separate
//! [`DetectionMetadata`] record so that hash comparisons cover only the
//! replayable result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::DetectionId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::RuleVersion;
use crate::core::identifiers::ServiceName;
use crate::core::identifiers::SignalId;
use crate::core::signal::ConfidenceGrade;
use crate::core::signal::Severity;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome of evaluating one rule against one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionDecision {
    /// All matcher dimensions and conditions passed.
    Match,
    /// The matcher or a condition failed.
    NoMatch,
}

// ============================================================================
// SECTION: Evaluation Trace
// ============================================================================

/// Single step in the ordered condition evaluation trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionEvaluation {
    /// Field path evaluated.
    pub field: String,
    /// Operator label.
    pub operator: String,
    /// Expected value, absent for existence checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Actual value resolved from the signal, absent when the path was missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// Whether the condition passed.
    pub passed: bool,
}

// ============================================================================
// SECTION: Detection Result
// ============================================================================

/// Immutable, content-addressed detection result.
///
/// # Invariants
/// - `detection_id` is derived from (rule id, rule version, signal id) only.
/// - The body excludes non-deterministic metadata; see [`DetectionMetadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Detection identifier.
    pub detection_id: DetectionId,
    /// Rule that produced this detection.
    pub rule_id: RuleId,
    /// Version of the producing rule.
    pub rule_version: RuleVersion,
    /// Normalized signal graded by the rule.
    pub normalized_signal_id: SignalId,
    /// Service owning the graded signal.
    pub service: ServiceName,
    /// Observation timestamp copied from the signal.
    pub signal_timestamp: Timestamp,
    /// Match decision.
    pub decision: DetectionDecision,
    /// Severity derived from the rule output.
    pub severity: Severity,
    /// Confidence grade derived from the rule output.
    pub confidence: ConfidenceGrade,
    /// Ordered condition evaluations.
    pub evaluation_trace: Vec<ConditionEvaluation>,
    /// Version of the detection schema.
    pub detection_version: String,
}

/// Non-deterministic companion record for a detection.
///
/// Stored beside the result but never folded into any hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionMetadata {
    /// Detection identifier this metadata belongs to.
    pub detection_id: DetectionId,
    /// Wall-clock time the detection was stored, supplied by the host.
    pub detected_at: Timestamp,
}

// ============================================================================
// SECTION: Multi-Signal Detection
// ============================================================================

/// Aggregated detection built from several signals of one service.
///
/// # Invariants
/// - All member signals share service and severity.
/// - Signal ids are sorted prior to identity derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedDetection {
    /// Detection identifier derived from the sorted signal set.
    pub detection_id: DetectionId,
    /// Rule that requested the combination.
    pub rule_id: RuleId,
    /// Version of the requesting rule.
    pub rule_version: RuleVersion,
    /// Sorted member signal identifiers.
    pub signal_ids: Vec<SignalId>,
    /// Shared service of the member signals.
    pub service: ServiceName,
    /// Shared severity of the member signals.
    pub severity: Severity,
    /// Combination confidence, `min(1.0, n / 10)`.
    pub confidence_score: f64,
    /// Earliest member observation timestamp.
    pub earliest_signal: Timestamp,
}

// crates/incident-plane-core/src/runtime/detection.rs
// ============================================================================
// Module: Incident Plane Detection Engine
// Description: Rule evaluation over normalized signals and idempotent storage.
// Purpose: Produce content-addressed detections with full evaluation traces.
// Dependencies: regex, serde_json, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The detection engine grades one normalized signal against one rule. The
//! signal matcher is evaluated first (AND across dimensions, OR within); on
//! failure the engine returns a NO_MATCH detection with an empty trace.
//! Conditions then evaluate in declared order through the safe field
//! accessor; the first failure short-circuits with its trace step recorded.
//! Storage is a conditional write keyed by the detection identifier, and the
//! `DetectionCreated` event is emitted best-effort only for first writes —
//! emission failure never blocks storage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::CombinedDetection;
use crate::core::ConditionEvaluation;
use crate::core::Detection;
use crate::core::DetectionDecision;
use crate::core::DetectionId;
use crate::core::DetectionMetadata;
use crate::core::DetectionRule;
use crate::core::NormalizedSignal;
use crate::core::RuleCondition;
use crate::core::SignalId;
use crate::core::SignalMatcher;
use crate::core::Timestamp;
use crate::core::compute_combined_detection_id;
use crate::core::compute_detection_id;
use crate::core::rule::ConditionOperator;
use crate::interfaces::DetectionStore;
use crate::interfaces::EventEmitter;
use crate::interfaces::PipelineEvent;
use crate::interfaces::StoreError;
use crate::runtime::accessor::resolve_path;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version of the detection record schema.
pub const DETECTION_VERSION: &str = "1.0.0";

/// Divisor mapping member count to combination confidence.
const COMBINE_CONFIDENCE_DIVISOR: f64 = 10.0;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Detection engine errors.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The signal could not be rendered for field access.
    #[error("signal serialization failed: {0}")]
    SignalShape(String),
    /// Multi-signal combination invariants were violated.
    #[error("combination rejected: {0}")]
    CombinationRejected(String),
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Result of storing a detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDetection {
    /// Stored detection identifier.
    pub detection_id: DetectionId,
    /// True when this call created the record.
    pub is_new: bool,
}

/// Deterministic detection engine.
///
/// The engine holds no mutable state; every evaluation is a pure function of
/// its inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionEngine;

impl DetectionEngine {
    /// Creates a new detection engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluates one rule against one signal.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::SignalShape`] when the signal cannot be
    /// rendered for field access.
    pub fn evaluate(
        &self,
        rule: &DetectionRule,
        signal: &NormalizedSignal,
    ) -> Result<Detection, DetectionError> {
        let detection_id =
            compute_detection_id(&rule.rule_id, &rule.rule_version, &signal.normalized_signal_id);

        if !matcher_accepts(&rule.signal_matcher, signal) {
            return Ok(self.build(rule, signal, detection_id, DetectionDecision::NoMatch, Vec::new()));
        }

        let payload = serde_json::to_value(signal)
            .map_err(|err| DetectionError::SignalShape(err.to_string()))?;

        let mut trace = Vec::with_capacity(rule.conditions.len());
        for condition in &rule.conditions {
            let actual = resolve_path(&payload, &condition.field).cloned();
            let passed = evaluate_condition(condition, actual.as_ref());
            trace.push(ConditionEvaluation {
                field: condition.field.clone(),
                operator: condition.operator.as_str().to_string(),
                expected: condition.expected.clone(),
                actual,
                passed,
            });
            if !passed {
                return Ok(self.build(rule, signal, detection_id, DetectionDecision::NoMatch, trace));
            }
        }

        Ok(self.build(rule, signal, detection_id, DetectionDecision::Match, trace))
    }

    /// Stores a matching detection idempotently and emits its event.
    ///
    /// The event is emitted only when this call created the record; emission
    /// failure is swallowed because storage is the source of truth.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::Store`] when the conditional write fails.
    pub fn store(
        &self,
        detection: &Detection,
        detected_at: Timestamp,
        store: &dyn DetectionStore,
        emitter: &dyn EventEmitter,
    ) -> Result<StoredDetection, DetectionError> {
        let metadata = DetectionMetadata {
            detection_id: detection.detection_id.clone(),
            detected_at,
        };
        let is_new = store.put_detection(detection, &metadata)?;
        if is_new {
            let event = PipelineEvent::DetectionCreated {
                detection_id: detection.detection_id.clone(),
                rule_id: detection.rule_id.clone(),
                signal_id: detection.normalized_signal_id.clone(),
                detected_at,
            };
            // Best-effort: consumers must tolerate missing events.
            let emitted = emitter.emit(&event);
            drop(emitted);
        }
        Ok(StoredDetection {
            detection_id: detection.detection_id.clone(),
            is_new,
        })
    }

    /// Combines several signals of one service into a single detection.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::CombinationRejected`] when the input is
    /// empty or the signals disagree on service or severity.
    pub fn combine(
        &self,
        rule: &DetectionRule,
        signals: &[NormalizedSignal],
    ) -> Result<CombinedDetection, DetectionError> {
        let first = signals
            .first()
            .ok_or_else(|| DetectionError::CombinationRejected("empty signal set".to_string()))?;
        for signal in signals {
            if signal.source != first.source {
                return Err(DetectionError::CombinationRejected(format!(
                    "service mismatch: {} vs {}",
                    signal.source, first.source
                )));
            }
            if signal.severity != first.severity {
                return Err(DetectionError::CombinationRejected(format!(
                    "severity mismatch: {} vs {}",
                    signal.severity.as_str(),
                    first.severity.as_str()
                )));
            }
        }

        let mut signal_ids: Vec<SignalId> =
            signals.iter().map(|signal| signal.normalized_signal_id.clone()).collect();
        signal_ids.sort();
        signal_ids.dedup();

        let earliest = signals
            .iter()
            .map(|signal| signal.timestamp)
            .min()
            .unwrap_or(first.timestamp);

        #[allow(clippy::cast_precision_loss, reason = "Member counts are far below 2^52.")]
        let confidence_score =
            (signal_ids.len() as f64 / COMBINE_CONFIDENCE_DIVISOR).min(1.0);

        Ok(CombinedDetection {
            detection_id: compute_combined_detection_id(
                &rule.rule_id,
                &rule.rule_version,
                &signal_ids,
            ),
            rule_id: rule.rule_id.clone(),
            rule_version: rule.rule_version.clone(),
            signal_ids,
            service: first.source.clone(),
            severity: first.severity,
            confidence_score,
            earliest_signal: earliest,
        })
    }

    /// Builds a detection record from an evaluation.
    fn build(
        &self,
        rule: &DetectionRule,
        signal: &NormalizedSignal,
        detection_id: DetectionId,
        decision: DetectionDecision,
        trace: Vec<ConditionEvaluation>,
    ) -> Detection {
        Detection {
            detection_id,
            rule_id: rule.rule_id.clone(),
            rule_version: rule.rule_version.clone(),
            normalized_signal_id: signal.normalized_signal_id.clone(),
            service: signal.source.clone(),
            signal_timestamp: signal.timestamp,
            decision,
            severity: rule.output_severity,
            confidence: rule.output_confidence,
            evaluation_trace: trace,
            detection_version: DETECTION_VERSION.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Matcher Evaluation
// ============================================================================

/// Evaluates the dimension matcher: AND across dimensions, OR within.
#[must_use]
pub fn matcher_accepts(matcher: &SignalMatcher, signal: &NormalizedSignal) -> bool {
    if !matcher.signal_types.is_empty() && !matcher.signal_types.contains(&signal.signal_type) {
        return false;
    }
    if !matcher.sources.is_empty()
        && !matcher.sources.iter().any(|source| source == signal.source.as_str())
    {
        return false;
    }
    if !matcher.severities.is_empty() && !matcher.severities.contains(&signal.severity) {
        return false;
    }
    if !matcher.confidences.is_empty() && !matcher.confidences.contains(&signal.confidence) {
        return false;
    }
    true
}

// ============================================================================
// SECTION: Condition Evaluation
// ============================================================================

/// Evaluates one condition against a resolved value.
///
/// A missing value fails every operator except `exists`, which reports the
/// absence itself.
fn evaluate_condition(condition: &RuleCondition, actual: Option<&Value>) -> bool {
    if condition.operator == ConditionOperator::Exists {
        return actual.is_some();
    }
    let Some(actual) = actual else {
        return false;
    };
    let Some(expected) = condition.expected.as_ref() else {
        return false;
    };

    match condition.operator {
        ConditionOperator::Eq => actual == expected,
        ConditionOperator::Neq => actual != expected,
        ConditionOperator::In => expected.as_array().is_some_and(|set| set.contains(actual)),
        ConditionOperator::NotIn => {
            expected.as_array().is_some_and(|set| !set.contains(actual))
        }
        ConditionOperator::Gt => compare_numbers(actual, expected).is_some_and(|ord| ord.is_gt()),
        ConditionOperator::Ge => compare_numbers(actual, expected).is_some_and(|ord| ord.is_ge()),
        ConditionOperator::Lt => compare_numbers(actual, expected).is_some_and(|ord| ord.is_lt()),
        ConditionOperator::Le => compare_numbers(actual, expected).is_some_and(|ord| ord.is_le()),
        ConditionOperator::Regex => match (actual.as_str(), expected.as_str()) {
            (Some(text), Some(pattern)) => regex::Regex::new(pattern)
                .map(|compiled| compiled.is_match(text))
                .unwrap_or(false),
            _ => false,
        },
        ConditionOperator::StartsWith => match (actual.as_str(), expected.as_str()) {
            (Some(text), Some(prefix)) => text.starts_with(prefix),
            _ => false,
        },
        ConditionOperator::EndsWith => match (actual.as_str(), expected.as_str()) {
            (Some(text), Some(suffix)) => text.ends_with(suffix),
            _ => false,
        },
        ConditionOperator::Exists => actual != &Value::Null,
    }
}

/// Compares two JSON numbers, returning `None` for non-numeric operands.
fn compare_numbers(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    let left_num = left.as_f64()?;
    let right_num = right.as_f64()?;
    left_num.partial_cmp(&right_num)
}

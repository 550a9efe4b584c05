// crates/incident-plane-core/src/runtime/candidate.rs
// ============================================================================
// Module: Incident Plane Candidate Generator
// Description: Window-based correlation of detections into candidates.
// Purpose: Produce deterministic, content-addressed promotion candidates.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Generation is triggered by a new detection. For each enabled correlation
//! rule the generator queries the rule's window (inclusive start, exclusive
//! end) with mandatory partition narrowing, filters members against the
//! rule matcher and the evidence-graph integrity gate, applies the
//! min/max thresholds, resolves key fields, and derives the correlation key
//! and candidate identity. The generator is stateless across calls and the
//! ordering of queried detections never affects the candidate identifier.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::BlastRadius;
use crate::core::BlastScope;
use crate::core::Candidate;
use crate::core::ConfidenceBand;
use crate::core::ConfidenceFactor;
use crate::core::CorrelationRule;
use crate::core::Detection;
use crate::core::GenerationStep;
use crate::core::HashError;
use crate::core::ImpactBand;
use crate::core::KeyField;
use crate::core::NormalizedSignal;
use crate::core::ServiceName;
use crate::core::Severity;
use crate::core::Timestamp;
use crate::core::compute_candidate_id;
use crate::core::compute_correlation_key;
use crate::interfaces::CandidateStore;
use crate::interfaces::DetectionStore;
use crate::interfaces::EvidenceStore;
use crate::interfaces::PartitionFilter;
use crate::interfaces::SignalStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Base confidence score before rule boosts apply.
const BASE_CONFIDENCE: f64 = 0.5;

/// Resource-ref type prefix classifying a signal as infrastructure.
const INFRASTRUCTURE_PREFIX: &str = "infra";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Candidate generator errors.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Key-field canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Outcome of a generation attempt that produced a candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCandidate {
    /// The produced candidate.
    pub candidate: Candidate,
    /// True when this call stored the candidate first. A `false` value means
    /// a concurrent producer already converged; it is not an error.
    pub is_new: bool,
}

/// Stateless window-based candidate generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateGenerator;

impl CandidateGenerator {
    /// Creates a new candidate generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs one correlation rule for a trigger detection.
    ///
    /// Returns `Ok(None)` when fewer than `min_detections` members survive
    /// filtering.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError`] on storage or canonicalization failure.
    #[allow(
        clippy::too_many_arguments,
        clippy::too_many_lines,
        reason = "Generation is a single linear pipeline over injected capabilities."
    )]
    pub fn generate(
        &self,
        trigger: &Detection,
        trigger_signal: &NormalizedSignal,
        rule: &CorrelationRule,
        detections: &dyn DetectionStore,
        signals: &dyn SignalStore,
        evidence: &dyn EvidenceStore,
        candidates: &dyn CandidateStore,
        created_at: Timestamp,
    ) -> Result<Option<GeneratedCandidate>, CandidateError> {
        if !rule.enabled {
            return Ok(None);
        }

        let mut trace = Vec::new();

        // Window bounds: inclusive start, exclusive end.
        let window_end = trigger.signal_timestamp;
        let window_start = window_end.minus_minutes(rule.window_minutes);

        // Partition narrowing is mandatory when the matcher pins a dimension.
        let filter = PartitionFilter {
            rule_id: rule.matcher.same_rule_id.then(|| trigger.rule_id.clone()),
            service: rule.matcher.same_service.then(|| trigger.service.clone()),
        };
        let member_cap = usize::try_from(rule.max_detections).unwrap_or(usize::MAX);
        let member_floor = usize::try_from(rule.min_detections).unwrap_or(usize::MAX);
        let mut members =
            detections.query_by_time_range(window_start, window_end, &filter, member_cap)?;
        // The trigger itself belongs to its own window even if the query
        // backend has not indexed it yet.
        if !members.iter().any(|member| member.detection_id == trigger.detection_id) {
            members.push(trigger.clone());
        }
        trace.push(step("windowQuery", format!("{} detections in window", members.len())));

        // Matcher filter against the trigger's values and allow-lists.
        let mut matched = Vec::with_capacity(members.len());
        let mut member_signals = Vec::with_capacity(members.len());
        for member in members {
            let Some(signal) = signals.get_signal(&member.normalized_signal_id)? else {
                continue;
            };
            if !member_matches(rule, trigger, trigger_signal, &member, &signal) {
                continue;
            }
            matched.push(member);
            member_signals.push(signal);
        }
        trace.push(step("matcherFilter", format!("{} detections matched", matched.len())));

        // Integrity gate: every member must have a graph bound to it.
        let mut survivors = Vec::with_capacity(matched.len());
        let mut survivor_signals = Vec::with_capacity(matched.len());
        for (member, signal) in matched.into_iter().zip(member_signals) {
            let Some(graph) = evidence.get_graph_for_detection(&member.detection_id)? else {
                continue;
            };
            if graph.detection_id != member.detection_id {
                continue;
            }
            survivors.push(member);
            survivor_signals.push(signal);
        }
        trace.push(step("integrityGate", format!("{} detections verified", survivors.len())));

        // Threshold before truncation.
        if survivors.len() < member_floor {
            return Ok(None);
        }

        // Deterministic order: severity desc, timestamp asc, detection id asc.
        let mut ordered: Vec<usize> = (0..survivors.len()).collect();
        ordered.sort_by(|&left, &right| {
            detection_order(&survivors[left], &survivors[right])
        });
        if ordered.len() > member_cap {
            ordered.truncate(member_cap);
            trace.push(step("truncation", format!("truncated to {}", ordered.len())));
        }
        let survivors: Vec<Detection> =
            ordered.iter().map(|&index| survivors[index].clone()).collect();
        let survivor_signals: Vec<NormalizedSignal> =
            ordered.iter().map(|&index| survivor_signals[index].clone()).collect();

        // Key fields resolved from the trigger and the truncated window.
        let resolved_key_fields =
            resolve_key_fields(rule, trigger, trigger_signal, window_end);
        trace.push(step("keyFields", format!("{} fields resolved", resolved_key_fields.len())));

        let mut detection_ids: Vec<_> =
            survivors.iter().map(|member| member.detection_id.clone()).collect();
        detection_ids.sort();

        let correlation_key =
            compute_correlation_key(&rule.rule_id, &rule.rule_version, &resolved_key_fields)?;
        let candidate_id = compute_candidate_id(
            &detection_ids,
            &rule.rule_id,
            &rule.rule_version,
            &resolved_key_fields,
        )?;

        // Primary selection: HIGHEST_SEVERITY_THEN_EARLIEST_THEN_LEXICAL.
        let Some(primary) = select_primary(&survivors) else {
            return Ok(None);
        };
        trace.push(step("primarySelection", primary.detection_id.to_string()));

        let suggested_severity =
            survivors.iter().map(|member| member.severity).min().unwrap_or(trigger.severity);

        let (confidence_score, confidence_factors) = score_confidence(rule, &survivors);
        trace.push(step("confidence", format!("score {confidence_score:.2}")));

        let blast_radius = estimate_blast_radius(&survivor_signals, suggested_severity);
        trace.push(step(
            "blastRadius",
            format!("{} services affected", blast_radius.affected_services.len()),
        ));

        let candidate = Candidate {
            candidate_id,
            correlation_key,
            correlation_rule_id: rule.rule_id.clone(),
            correlation_rule_version: rule.rule_version.clone(),
            detection_ids,
            resolved_key_fields,
            primary_detection_id: primary.detection_id.clone(),
            suggested_severity,
            suggested_service: trigger.service.clone(),
            suggested_title: format!(
                "{}: {} correlated detections ({})",
                trigger.service,
                survivors.len(),
                rule.rule_id
            ),
            confidence_score,
            confidence_band: ConfidenceBand::from_score(confidence_score),
            confidence_factors,
            blast_radius,
            generation_trace: trace,
            window_start,
            window_end,
            created_at,
        };

        let is_new = candidates.put_candidate(&candidate)?;
        Ok(Some(GeneratedCandidate {
            candidate,
            is_new,
        }))
    }
}

// ============================================================================
// SECTION: Member Filtering
// ============================================================================

/// Builds a named generation step.
fn step(name: &str, detail: String) -> GenerationStep {
    GenerationStep {
        step: name.to_string(),
        detail,
    }
}

/// Applies the correlation matcher to one window member.
fn member_matches(
    rule: &CorrelationRule,
    trigger: &Detection,
    trigger_signal: &NormalizedSignal,
    member: &Detection,
    signal: &NormalizedSignal,
) -> bool {
    if rule.matcher.same_service && member.service != trigger.service {
        return false;
    }
    if rule.matcher.same_source && signal.source != trigger_signal.source {
        return false;
    }
    if rule.matcher.same_rule_id && member.rule_id != trigger.rule_id {
        return false;
    }
    if !rule.matcher.signal_types.is_empty()
        && !rule.matcher.signal_types.contains(&signal.signal_type)
    {
        return false;
    }
    if !rule.matcher.severities.is_empty() && !rule.matcher.severities.contains(&signal.severity) {
        return false;
    }
    true
}

/// Total order used for truncation and primary selection: severity most
/// severe first, then earliest observation, then lexical detection id.
fn detection_order(left: &Detection, right: &Detection) -> std::cmp::Ordering {
    left.severity
        .cmp(&right.severity)
        .then_with(|| left.signal_timestamp.cmp(&right.signal_timestamp))
        .then_with(|| left.detection_id.cmp(&right.detection_id))
}

/// Selects the primary detection by the tiebreak chain.
fn select_primary(survivors: &[Detection]) -> Option<&Detection> {
    survivors.iter().min_by(|left, right| detection_order(left, right))
}

// ============================================================================
// SECTION: Key Fields
// ============================================================================

/// Resolves the rule's declared key fields from the trigger context.
fn resolve_key_fields(
    rule: &CorrelationRule,
    trigger: &Detection,
    trigger_signal: &NormalizedSignal,
    window_end: Timestamp,
) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for key_field in &rule.key_fields {
        let value = match key_field {
            KeyField::Service => trigger.service.to_string(),
            KeyField::Source => trigger_signal.source.to_string(),
            KeyField::RuleId => trigger.rule_id.to_string(),
            KeyField::WindowTruncated => {
                window_end.truncate(rule.window_truncation).to_rfc3339_millis()
            }
            KeyField::SignalType => trigger_signal.signal_type.clone(),
            KeyField::Environment => trigger_signal
                .environment_refs
                .first()
                .map(|env| env.name.clone())
                .unwrap_or_default(),
        };
        fields.insert(key_field.as_str().to_string(), value);
    }
    fields
}

// ============================================================================
// SECTION: Confidence
// ============================================================================

/// Scores candidate confidence from the base and rule boost weights.
fn score_confidence(
    rule: &CorrelationRule,
    survivors: &[Detection],
) -> (f64, Vec<ConfidenceFactor>) {
    let mut score = BASE_CONFIDENCE;
    let mut factors = vec![ConfidenceFactor {
        factor: "base".to_string(),
        weight: BASE_CONFIDENCE,
    }];

    if survivors.len() > 1 && rule.confidence_boost.multiple_detections > 0.0 {
        score += rule.confidence_boost.multiple_detections;
        factors.push(ConfidenceFactor {
            factor: "multipleDetections".to_string(),
            weight: rule.confidence_boost.multiple_detections,
        });
    }
    if survivors.iter().any(|member| member.severity == Severity::Sev1)
        && rule.confidence_boost.max_severity_sev1 > 0.0
    {
        score += rule.confidence_boost.max_severity_sev1;
        factors.push(ConfidenceFactor {
            factor: "maxSeveritySev1".to_string(),
            weight: rule.confidence_boost.max_severity_sev1,
        });
    }
    let mut rule_ids: Vec<&str> =
        survivors.iter().map(|member| member.rule_id.as_str()).collect();
    rule_ids.sort_unstable();
    rule_ids.dedup();
    if rule_ids.len() > 1 && rule.confidence_boost.rule_diversity > 0.0 {
        score += rule.confidence_boost.rule_diversity;
        factors.push(ConfidenceFactor {
            factor: "ruleDiversity".to_string(),
            weight: rule.confidence_boost.rule_diversity,
        });
    }

    (score.clamp(0.0, 1.0), factors)
}

// ============================================================================
// SECTION: Blast Radius
// ============================================================================

/// Estimates the blast radius from member signals.
fn estimate_blast_radius(signals: &[NormalizedSignal], max_severity: Severity) -> BlastRadius {
    let mut affected: Vec<ServiceName> =
        signals.iter().map(|signal| signal.source.clone()).collect();
    affected.sort();
    affected.dedup();

    let targets_infrastructure = signals.iter().any(|signal| {
        signal
            .resource_refs
            .iter()
            .any(|resource| resource.ref_type.starts_with(INFRASTRUCTURE_PREFIX))
    });

    let scope = if targets_infrastructure {
        BlastScope::Infrastructure
    } else if affected.len() <= 1 {
        BlastScope::SingleService
    } else {
        BlastScope::MultiService
    };

    BlastRadius {
        scope,
        affected_services: affected,
        estimated_impact: ImpactBand::from_severity(max_severity),
    }
}

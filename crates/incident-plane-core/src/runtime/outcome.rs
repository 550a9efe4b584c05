// crates/incident-plane-core/src/runtime/outcome.rs
// ============================================================================
// Module: Incident Plane Outcome Recorder
// Description: Outcome capture, pattern extraction, and confidence calibration.
// Purpose: Feed human-validated ground truth into the learning pipeline.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The recorder accepts an outcome only for a CLOSED incident, from a human
//! authority, with a classification that is exactly one of true-positive or
//! false-positive. Time-to-detect derives from the earliest member signal
//! observation looked up through the evidence store, falling back to the
//! incident's own creation time when no member carries a timestamp — never a
//! hard-coded zero. Aggregations store raw counts; downstream consumers
//! compute percentages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::CalibrationBin;
use crate::core::CalibrationFlag;
use crate::core::CalibrationReport;
use crate::core::ConfidenceBand;
use crate::core::HumanAssessment;
use crate::core::IncidentId;
use crate::core::IncidentState;
use crate::core::Outcome;
use crate::core::OutcomeClassification;
use crate::core::OutcomeTiming;
use crate::core::ResolutionSummary;
use crate::core::RootCauseCount;
use crate::core::ServiceName;
use crate::core::Timestamp;
use crate::core::compute_outcome_id;
use crate::core::compute_summary_id;
use crate::interfaces::CandidateStore;
use crate::interfaces::DetectionStore;
use crate::interfaces::EvidenceStore;
use crate::interfaces::IncidentStore;
use crate::interfaces::OutcomeStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// False-positive rate above which a detection warning is raised.
const FP_WARNING_RATE: f64 = 0.30;
/// Minimum outcomes before the false-positive warning may fire.
const FP_WARNING_MIN_SAMPLE: usize = 10;
/// Root causes retained in a summary.
const TOP_ROOT_CAUSES: usize = 10;
/// Minimum outcomes per band before calibration judges it.
const CALIBRATION_MIN_SAMPLE: usize = 5;
/// Absolute drift tolerated before a band is flagged.
const CALIBRATION_TOLERANCE: f64 = 0.10;

/// Expected accuracy per confidence band.
const fn expected_accuracy(band: ConfidenceBand) -> f64 {
    match band {
        ConfidenceBand::Low => 0.20,
        ConfidenceBand::Medium => 0.55,
        ConfidenceBand::High => 0.85,
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Outcome recorder errors.
#[derive(Debug, Error)]
pub enum OutcomeError {
    /// Incident does not exist.
    #[error("incident not found: {0}")]
    IncidentNotFound(IncidentId),
    /// Incident has not reached CLOSED.
    #[error("outcome requires a closed incident; state is {state}")]
    IncidentNotClosed {
        /// Observed lifecycle state.
        state: &'static str,
    },
    /// Automated authorities may not record outcomes.
    #[error("AUTO_ENGINE_FORBIDDEN: outcomes require a human authority")]
    AutomatedAuthority,
    /// A required field is empty or malformed.
    #[error("invalid outcome submission: {field}: {reason}")]
    Validation {
        /// Field path that failed validation.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// Classification must be exactly one of true/false positive.
    #[error("classification must assert exactly one of truePositive or falsePositive")]
    ClassificationContradiction,
    /// Incident timestamps are inconsistent with closure.
    #[error("incident timeline is temporally inconsistent: missing {missing}")]
    TemporalInconsistency {
        /// Timestamp that should have been set.
        missing: &'static str,
    },
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Submission
// ============================================================================

/// Outcome submission presented by a human authority.
#[derive(Debug, Clone)]
pub struct OutcomeSubmission {
    /// Incident the outcome covers.
    pub incident_id: IncidentId,
    /// Validated classification.
    pub classification: OutcomeClassification,
    /// Human assessment.
    pub human_assessment: HumanAssessment,
    /// Recording time injected by the caller.
    pub recorded_at: Timestamp,
}

/// Result of recording an outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOutcome {
    /// The recorded (or converged) outcome.
    pub outcome: Outcome,
    /// True when this call created the record.
    pub created: bool,
}

// ============================================================================
// SECTION: Recorder
// ============================================================================

/// Outcome recorder and learning aggregator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeRecorder;

impl OutcomeRecorder {
    /// Creates a new outcome recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records a human-validated outcome for a closed incident.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError`] when any acceptance gate fails.
    #[allow(
        clippy::too_many_arguments,
        reason = "The recorder composes injected capabilities without owning them."
    )]
    pub fn record(
        &self,
        submission: &OutcomeSubmission,
        incidents: &dyn IncidentStore,
        candidates: &dyn CandidateStore,
        evidence: &dyn EvidenceStore,
        detections: &dyn DetectionStore,
        outcomes: &dyn OutcomeStore,
    ) -> Result<RecordedOutcome, OutcomeError> {
        let incident = incidents
            .get_incident(&submission.incident_id)?
            .ok_or_else(|| OutcomeError::IncidentNotFound(submission.incident_id.clone()))?;

        if incident.state != IncidentState::Closed {
            return Err(OutcomeError::IncidentNotClosed {
                state: incident.state.as_str(),
            });
        }
        if !submission.human_assessment.authority_type.is_human() {
            return Err(OutcomeError::AutomatedAuthority);
        }
        if submission.classification.true_positive == submission.classification.false_positive {
            return Err(OutcomeError::ClassificationContradiction);
        }
        if submission.classification.root_cause.trim().is_empty() {
            return Err(OutcomeError::Validation {
                field: "classification.rootCause",
                reason: "must not be empty".to_string(),
            });
        }

        let opened_at = incident.opened_at.ok_or(OutcomeError::TemporalInconsistency {
            missing: "openedAt",
        })?;
        let resolved_at = incident.resolved_at.ok_or(OutcomeError::TemporalInconsistency {
            missing: "resolvedAt",
        })?;
        let closed_at = incident.closed_at.ok_or(OutcomeError::TemporalInconsistency {
            missing: "closedAt",
        })?;

        // Earliest member observation via the evidence store; the incident's
        // own creation time is the documented fallback.
        let earliest_signal = earliest_member_observation(&incident.evidence_id, evidence, detections)?;
        let ttd_millis = earliest_signal.map_or_else(
            || opened_at.millis_since(incident.created_at),
            |earliest| opened_at.millis_since(earliest),
        );
        let ttr_millis = resolved_at.millis_since(opened_at);

        let confidence_band = candidates
            .get_candidate(&incident.candidate_id)?
            .map_or(ConfidenceBand::Medium, |candidate| candidate.confidence_band);

        let outcome = Outcome {
            outcome_id: compute_outcome_id(&incident.incident_id, closed_at),
            incident_id: incident.incident_id.clone(),
            service: incident.service.clone(),
            classification: submission.classification.clone(),
            confidence_band,
            timing: OutcomeTiming {
                ttd_millis,
                ttr_millis,
            },
            human_assessment: submission.human_assessment.clone(),
            closed_at,
            recorded_at: submission.recorded_at,
        };

        let created = outcomes.put_outcome(&outcome)?;
        let outcome = if created {
            outcome
        } else {
            outcomes.get_outcome(&outcome.outcome_id)?.unwrap_or(outcome)
        };

        Ok(RecordedOutcome {
            outcome,
            created,
        })
    }

    /// Aggregates outcomes for a service and window into a summary.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError::Store`] when the query or write fails.
    pub fn extract_patterns(
        &self,
        service: &ServiceName,
        window_start: Timestamp,
        window_end: Timestamp,
        outcomes: &dyn OutcomeStore,
    ) -> Result<ResolutionSummary, OutcomeError> {
        let records = outcomes.query_by_service_window(service, window_start, window_end)?;

        let total = records.len();
        let true_positives =
            records.iter().filter(|record| record.classification.true_positive).count();
        let false_positives = total - true_positives;

        let (average_ttd_millis, average_ttr_millis) = if total == 0 {
            (0, 0)
        } else {
            let divisor = i64::try_from(total).unwrap_or(i64::MAX);
            let ttd_sum: i64 = records.iter().map(|record| record.timing.ttd_millis).sum();
            let ttr_sum: i64 = records.iter().map(|record| record.timing.ttr_millis).sum();
            (ttd_sum / divisor, ttr_sum / divisor)
        };

        let mut cause_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &records {
            *cause_counts.entry(record.classification.root_cause.as_str()).or_insert(0) += 1;
        }
        let mut top_root_causes: Vec<RootCauseCount> = cause_counts
            .into_iter()
            .map(|(root_cause, count)| RootCauseCount {
                root_cause: root_cause.to_string(),
                count,
            })
            .collect();
        top_root_causes
            .sort_by(|left, right| right.count.cmp(&left.count).then_with(|| left.root_cause.cmp(&right.root_cause)));
        top_root_causes.truncate(TOP_ROOT_CAUSES);

        #[allow(clippy::cast_precision_loss, reason = "Outcome counts are far below 2^52.")]
        let detection_warning = if total >= FP_WARNING_MIN_SAMPLE
            && (false_positives as f64) / (total as f64) > FP_WARNING_RATE
        {
            Some(format!(
                "false-positive rate above {:.0}% across {total} outcomes",
                FP_WARNING_RATE * 100.0
            ))
        } else {
            None
        };

        let summary = ResolutionSummary {
            summary_id: compute_summary_id(service, window_start, window_end),
            service: service.clone(),
            window_start,
            window_end,
            total_outcomes: total,
            true_positives,
            false_positives,
            average_ttd_millis,
            average_ttr_millis,
            top_root_causes,
            detection_warning,
        };

        let stored = outcomes.put_summary(&summary);
        drop(stored);
        Ok(summary)
    }

    /// Measures actual vs. expected accuracy per confidence band.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError::Store`] when the query fails.
    pub fn calibrate(
        &self,
        service: Option<&ServiceName>,
        window_start: Timestamp,
        window_end: Timestamp,
        records: &[Outcome],
    ) -> Result<CalibrationReport, OutcomeError> {
        let bands = [ConfidenceBand::Low, ConfidenceBand::Medium, ConfidenceBand::High];
        let mut bins = Vec::with_capacity(bands.len());
        for band in bands {
            let members: Vec<&Outcome> =
                records.iter().filter(|record| record.confidence_band == band).collect();
            let sample_count = members.len();
            let true_positives =
                members.iter().filter(|record| record.classification.true_positive).count();
            let expected = expected_accuracy(band);
            #[allow(clippy::cast_precision_loss, reason = "Outcome counts are far below 2^52.")]
            let actual = if sample_count == 0 {
                0.0
            } else {
                true_positives as f64 / sample_count as f64
            };
            let drift = actual - expected;
            let flag = if sample_count < CALIBRATION_MIN_SAMPLE {
                CalibrationFlag::InsufficientSample
            } else if drift < -CALIBRATION_TOLERANCE {
                CalibrationFlag::Overconfident
            } else if drift > CALIBRATION_TOLERANCE {
                CalibrationFlag::Underconfident
            } else {
                CalibrationFlag::Calibrated
            };
            bins.push(CalibrationBin {
                band,
                sample_count,
                true_positives,
                expected_accuracy: expected,
                actual_accuracy: actual,
                drift,
                flag,
            });
        }

        Ok(CalibrationReport {
            service: service.cloned(),
            window_start,
            window_end,
            bins,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Finds the earliest member signal observation through the evidence store.
fn earliest_member_observation(
    evidence_id: &crate::core::GraphId,
    evidence: &dyn EvidenceStore,
    detections: &dyn DetectionStore,
) -> Result<Option<Timestamp>, OutcomeError> {
    let Some(graph) = evidence.get_graph(evidence_id)? else {
        return Ok(None);
    };
    let mut earliest: Option<Timestamp> = None;
    for detection_id in &graph.detection_ids {
        if let Some(detection) = detections.get_detection(detection_id)? {
            earliest = Some(earliest.map_or(detection.signal_timestamp, |current| {
                current.min(detection.signal_timestamp)
            }));
        }
    }
    Ok(earliest)
}

// crates/incident-plane-core/src/core/outcome.rs
// ============================================================================
// Module: Incident Plane Outcome Types
// Description: Human-validated outcomes, pattern summaries, and calibration.
// Purpose: Provide the learning-pipeline record shapes captured after closure.
// Dependencies: serde, crate::core::{identifiers, signal, time}
// ============================================================================

//! ## Overview
//! Outcomes are append-only, human-validated classifications recorded after
//! an incident closes. Aggregations derived from outcomes (resolution
//! summaries, confidence calibrations) store raw counts rather than
//! percentages; downstream consumers compute rates themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::candidate::ConfidenceBand;
use crate::core::identifiers::AuthorityId;
use crate::core::identifiers::IncidentId;
use crate::core::identifiers::OutcomeId;
use crate::core::identifiers::ServiceName;
use crate::core::identifiers::SummaryId;
use crate::core::rule::AuthorityType;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Resolution type of an incident, as validated by a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionType {
    /// A code or configuration change fixed the fault.
    Fix,
    /// A rollback restored service.
    Rollback,
    /// The fault cleared without intervention.
    SelfHealed,
    /// A dependency owner resolved the fault.
    External,
    /// The incident was noise; no fault existed.
    NoAction,
}

/// Human-validated classification of an incident outcome.
///
/// # Invariants
/// - Exactly one of `true_positive` / `false_positive` holds; the recorder
///   rejects contradictory submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeClassification {
    /// The incident reflected a real fault.
    pub true_positive: bool,
    /// The incident was noise.
    pub false_positive: bool,
    /// Validated root cause statement.
    pub root_cause: String,
    /// Resolution type.
    pub resolution_type: ResolutionType,
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Derived response-timing measurements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeTiming {
    /// Time to detect in milliseconds (opened minus earliest signal).
    pub ttd_millis: i64,
    /// Time to resolve in milliseconds (resolved minus opened).
    pub ttr_millis: i64,
}

/// Free-form human assessment attached to an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanAssessment {
    /// Assessing principal.
    pub assessed_by: AuthorityId,
    /// Assessing principal type; must be human.
    pub authority_type: AuthorityType,
    /// Assessment notes.
    pub notes: String,
}

/// Append-only, human-validated incident outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Outcome identifier derived from incident id and closure time.
    pub outcome_id: OutcomeId,
    /// Incident the outcome covers.
    pub incident_id: IncidentId,
    /// Owning service copied from the incident.
    pub service: ServiceName,
    /// Validated classification.
    pub classification: OutcomeClassification,
    /// Confidence band of the promoted candidate, used by calibration.
    pub confidence_band: ConfidenceBand,
    /// Derived timing measurements.
    pub timing: OutcomeTiming,
    /// Human assessment.
    pub human_assessment: HumanAssessment,
    /// Closure time copied from the incident.
    pub closed_at: Timestamp,
    /// Recording time injected by the caller.
    pub recorded_at: Timestamp,
}

// ============================================================================
// SECTION: Resolution Summary
// ============================================================================

/// Root cause tally inside a resolution summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootCauseCount {
    /// Root cause statement.
    pub root_cause: String,
    /// Occurrences within the window.
    pub count: usize,
}

/// Aggregated outcome summary for a service and date window.
///
/// Stores raw counts only; downstream consumers compute percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    /// Summary identifier derived from (service, window start, window end).
    pub summary_id: SummaryId,
    /// Service covered.
    pub service: ServiceName,
    /// Window start (inclusive).
    pub window_start: Timestamp,
    /// Window end (exclusive).
    pub window_end: Timestamp,
    /// Total outcomes within the window.
    pub total_outcomes: usize,
    /// True-positive count.
    pub true_positives: usize,
    /// False-positive count.
    pub false_positives: usize,
    /// Average time to detect in milliseconds.
    pub average_ttd_millis: i64,
    /// Average time to resolve in milliseconds.
    pub average_ttr_millis: i64,
    /// Top root causes by count, at most ten.
    pub top_root_causes: Vec<RootCauseCount>,
    /// Warning raised when the false-positive rate exceeds the threshold
    /// over a sufficient sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_warning: Option<String>,
}

// ============================================================================
// SECTION: Confidence Calibration
// ============================================================================

/// Calibration flag for a single confidence band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationFlag {
    /// Actual accuracy tracks expected accuracy within tolerance.
    Calibrated,
    /// Actual accuracy falls short of expected accuracy.
    Overconfident,
    /// Actual accuracy exceeds expected accuracy.
    Underconfident,
    /// Too few samples to judge.
    InsufficientSample,
}

/// Calibration measurement for one confidence band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationBin {
    /// Confidence band measured.
    pub band: ConfidenceBand,
    /// Outcomes observed in the band.
    pub sample_count: usize,
    /// True positives observed in the band.
    pub true_positives: usize,
    /// Expected accuracy for the band.
    pub expected_accuracy: f64,
    /// Observed accuracy, 0 when the sample is empty.
    pub actual_accuracy: f64,
    /// Signed drift (actual minus expected).
    pub drift: f64,
    /// Calibration flag.
    pub flag: CalibrationFlag,
}

/// Calibration report across all confidence bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    /// Service covered, or absent for a global report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceName>,
    /// Window start (inclusive).
    pub window_start: Timestamp,
    /// Window end (exclusive).
    pub window_end: Timestamp,
    /// Per-band measurements.
    pub bins: Vec<CalibrationBin>,
}

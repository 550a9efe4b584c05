// crates/incident-plane-core/src/core/candidate.rs
// ============================================================================
// Module: Incident Plane Candidate Types
// Description: Correlated detection groups nominated for promotion.
// Purpose: Provide the candidate record shape emitted by the generator.
// Dependencies: serde, crate::core::{identifiers, signal, time}
// ============================================================================

//! ## Overview
//! A candidate is a correlated group of detections under one correlation
//! rule. Its identity folds the sorted detection set, the rule coordinates,
//! and the resolved key fields, so two rules sharing detections still produce
//! distinct candidates. Input detection ordering never affects the identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CandidateId;
use crate::core::identifiers::DetectionId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::RuleVersion;
use crate::core::identifiers::ServiceName;
use crate::core::signal::Severity;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Confidence
// ============================================================================

/// Coarse confidence band derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    /// Score below 0.4.
    Low,
    /// Score in [0.4, 0.7).
    Medium,
    /// Score of 0.7 or above.
    High,
}

impl ConfidenceBand {
    /// Maps a clamped score into its band.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Returns the stable wire label for the band.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Named contribution to the candidate confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceFactor {
    /// Factor label (for example `multipleDetections`).
    pub factor: String,
    /// Additive weight applied to the base score.
    pub weight: f64,
}

// ============================================================================
// SECTION: Blast Radius
// ============================================================================

/// Scope classification of the affected surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlastScope {
    /// All member signals target one service.
    SingleService,
    /// Member signals span several services.
    MultiService,
    /// At least one member signal targets shared infrastructure.
    Infrastructure,
}

/// Impact band derived from the maximum member severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactBand {
    /// SEV1 present.
    Critical,
    /// SEV2 present.
    Major,
    /// SEV3 present.
    Moderate,
    /// SEV4 or SEV5 only.
    Minor,
}

impl ImpactBand {
    /// Derives the impact band from a maximum severity.
    #[must_use]
    pub const fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Sev1 => Self::Critical,
            Severity::Sev2 => Self::Major,
            Severity::Sev3 => Self::Moderate,
            Severity::Sev4 | Severity::Sev5 => Self::Minor,
        }
    }
}

/// Estimated blast radius of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRadius {
    /// Scope classification.
    pub scope: BlastScope,
    /// Affected services, sorted and deduplicated.
    pub affected_services: Vec<ServiceName>,
    /// Impact band from the maximum member severity.
    pub estimated_impact: ImpactBand,
}

// ============================================================================
// SECTION: Generation Trace
// ============================================================================

/// Named step recorded during candidate generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStep {
    /// Step name (for example `windowQuery`).
    pub step: String,
    /// Step detail, such as counts in and out.
    pub detail: String,
}

// ============================================================================
// SECTION: Candidate
// ============================================================================

/// Correlated detection group nominated for promotion.
///
/// # Invariants
/// - `detection_ids` are sorted; input ordering never affects `candidate_id`.
/// - `resolved_key_fields` participate in the identity hash, so distinct key
///   field sets over the same detections yield distinct candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Candidate identifier.
    pub candidate_id: CandidateId,
    /// Grouping hash over rule coordinates and resolved key fields.
    pub correlation_key: String,
    /// Correlation rule that produced the candidate.
    pub correlation_rule_id: RuleId,
    /// Version of the producing rule.
    pub correlation_rule_version: RuleVersion,
    /// Sorted member detection identifiers.
    pub detection_ids: Vec<DetectionId>,
    /// Key field names resolved to member values.
    pub resolved_key_fields: BTreeMap<String, String>,
    /// Primary detection selected by the tiebreak chain.
    pub primary_detection_id: DetectionId,
    /// Suggested incident severity (maximum member severity).
    pub suggested_severity: Severity,
    /// Suggested owning service.
    pub suggested_service: ServiceName,
    /// Suggested incident title.
    pub suggested_title: String,
    /// Numeric confidence score in [0, 1].
    pub confidence_score: f64,
    /// Coarse confidence band.
    pub confidence_band: ConfidenceBand,
    /// Named confidence contributions.
    pub confidence_factors: Vec<ConfidenceFactor>,
    /// Estimated blast radius.
    pub blast_radius: BlastRadius,
    /// Ordered generation steps.
    pub generation_trace: Vec<GenerationStep>,
    /// Window start (inclusive).
    pub window_start: Timestamp,
    /// Window end (exclusive).
    pub window_end: Timestamp,
    /// Generation timestamp supplied by the host, excluded from identity.
    pub created_at: Timestamp,
}

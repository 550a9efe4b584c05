// crates/incident-plane-core/src/core/signal.rs
// ============================================================================
// Module: Incident Plane Signal Types
// Description: Normalized signal records and their grading dimensions.
// Purpose: Provide the immutable input shape consumed by the detection engine.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Normalized signals are produced upstream by the ingestion layer and are
//! consumed read-only by the core. The pipeline never mutates a signal; every
//! derived record references signals by identifier. Wire field names are
//! camelCase because signal payloads cross language boundaries and participate
//! in rule field paths (`resourceRefs[0].refValue`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ServiceName;
use crate::core::identifiers::SignalId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Grading Dimensions
// ============================================================================

/// Operational severity, SEV1 most severe.
///
/// # Invariants
/// - Variant declaration order makes the derived `Ord` sort SEV1 first, so an
///   ascending sort yields "severity descending" in operational terms.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Severity {
    /// Full outage or critical customer impact.
    #[serde(rename = "SEV1")]
    Sev1,
    /// Major degradation.
    #[serde(rename = "SEV2")]
    Sev2,
    /// Partial degradation.
    #[serde(rename = "SEV3")]
    Sev3,
    /// Minor impact.
    #[serde(rename = "SEV4")]
    Sev4,
    /// Informational.
    #[serde(rename = "SEV5")]
    Sev5,
}

impl Severity {
    /// Returns the stable wire label for the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sev1 => "SEV1",
            Self::Sev2 => "SEV2",
            Self::Sev3 => "SEV3",
            Self::Sev4 => "SEV4",
            Self::Sev5 => "SEV5",
        }
    }

    /// Returns true when `self` is at least as severe as `other`.
    #[must_use]
    pub fn at_least(self, other: Self) -> bool {
        self <= other
    }
}

/// Confidence grade attached to signals and detections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceGrade {
    /// Weak supporting evidence.
    Low,
    /// Moderate supporting evidence.
    Medium,
    /// Strong supporting evidence.
    High,
    /// Direct, unambiguous evidence.
    Definitive,
}

impl ConfidenceGrade {
    /// Returns the stable wire label for the grade.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Definitive => "DEFINITIVE",
        }
    }
}

// ============================================================================
// SECTION: Signal References
// ============================================================================

/// Reference from a signal to an affected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// Resource type label (for example `lambda-function`).
    pub ref_type: String,
    /// Resource identifier or ARN-like value.
    pub ref_value: String,
}

/// Reference from a signal to an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRef {
    /// Environment name (for example `prod`).
    pub name: String,
    /// Region or partition qualifier, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Reference from a signal to raw supporting evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvidenceRef {
    /// Evidence kind label (for example `log-group`).
    pub ref_type: String,
    /// Locator for the raw evidence.
    pub uri: String,
}

// ============================================================================
// SECTION: Normalized Signal
// ============================================================================

/// Immutable normalized signal consumed by the detection engine.
///
/// # Invariants
/// - The core never mutates a signal; derived records reference it by id.
/// - `timestamp` is the observation time assigned upstream, not ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSignal {
    /// Normalized signal identifier.
    pub normalized_signal_id: SignalId,
    /// Upstream source signal identifier.
    pub source_signal_id: String,
    /// Signal type label (for example `metric-alarm`).
    pub signal_type: String,
    /// Service that emitted the signal.
    pub source: ServiceName,
    /// Operational severity.
    pub severity: Severity,
    /// Confidence grade assigned by normalization.
    pub confidence: ConfidenceGrade,
    /// Observation timestamp.
    pub timestamp: Timestamp,
    /// Affected resources.
    #[serde(default)]
    pub resource_refs: Vec<ResourceRef>,
    /// Affected environments.
    #[serde(default)]
    pub environment_refs: Vec<EnvironmentRef>,
    /// Raw evidence references.
    #[serde(default)]
    pub evidence_refs: Vec<SignalEvidenceRef>,
    /// Version of the normalization pipeline that produced this record.
    pub normalization_version: String,
}

// crates/incident-plane-core/src/runtime/validation.rs
// ============================================================================
// Module: Incident Plane Output Validation
// Description: Three-layer validation of advisory producer output.
// Purpose: Bound retries, summarize feedback, and fall back honestly.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Advisory recommendations produced downstream are validated in three
//! layers: structural schema, business rules on specific fields, and
//! best-effort semantic checks that log warnings but never block. The
//! producer is retried at most three times with *summarized* feedback — raw
//! error detail is never echoed back. When every attempt fails the validator
//! returns an honest fallback: confidence exactly 0.0, an explanation naming
//! the attempt count, and empty collections — never a false positive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum producer attempts before the fallback is returned.
pub const MAX_VALIDATION_ATTEMPTS: u32 = 3;
/// Minimum reasoning length accepted by the business layer.
const MIN_REASONING_CHARS: usize = 10;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Producer invocation errors.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The producer failed to yield output.
    #[error("producer failed: {0}")]
    Failed(String),
}

// ============================================================================
// SECTION: Recommendation
// ============================================================================

/// Advisory recommendation shape accepted from downstream producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Recommendation {
    /// Producer confidence in [0, 1].
    pub confidence: f64,
    /// Reasoning text supporting the recommendation.
    pub reasoning: String,
    /// Evidence citations backing the reasoning.
    pub citations: Vec<String>,
    /// Suggested follow-up actions, possibly empty.
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

/// Attempt bucket recorded for metrics dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptBucket {
    /// Accepted on the first attempt.
    First,
    /// Accepted on a retry.
    Second,
    /// Every attempt failed; the honest fallback was returned.
    Fallback,
}

impl AttemptBucket {
    /// Returns the stable metrics label for the bucket.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Fallback => "fallback",
        }
    }
}

/// Validated recommendation with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecommendation {
    /// Accepted or fallback recommendation.
    pub recommendation: Recommendation,
    /// Attempt bucket for metrics.
    pub attempt_bucket: AttemptBucket,
    /// Best-effort semantic warnings; advisory only.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Producer Seam
// ============================================================================

/// Producer of advisory output, retried with summarized feedback.
pub trait RecommendationProducer {
    /// Produces one output attempt.
    ///
    /// `feedback` summarizes the prior attempt's defects by field and code
    /// only; raw values are never included.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError`] when production fails outright.
    fn produce(&self, feedback: Option<&str>) -> Result<Value, ProducerError>;
}

/// Best-effort citation existence index.
pub trait CitationIndex {
    /// Returns true when the citation resolves to known evidence.
    fn exists(&self, citation: &str) -> bool;
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Three-layer output validator with bounded retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputValidator;

impl OutputValidator {
    /// Creates a new output validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates producer output, retrying up to the attempt bound.
    ///
    /// Never returns an error for producer or validation failures: the
    /// honest fallback is the terminal answer.
    #[must_use]
    pub fn validate(
        &self,
        producer: &dyn RecommendationProducer,
        citations: &dyn CitationIndex,
    ) -> ValidatedRecommendation {
        let mut feedback: Option<String> = None;

        for attempt in 1..=MAX_VALIDATION_ATTEMPTS {
            let output = match producer.produce(feedback.as_deref()) {
                Ok(output) => output,
                Err(_) => {
                    feedback = Some("producer returned no output".to_string());
                    continue;
                }
            };

            match check_layers(&output) {
                Ok(recommendation) => {
                    let warnings = semantic_warnings(&recommendation, citations);
                    let attempt_bucket = if attempt == 1 {
                        AttemptBucket::First
                    } else {
                        AttemptBucket::Second
                    };
                    return ValidatedRecommendation {
                        recommendation,
                        attempt_bucket,
                        warnings,
                    };
                }
                Err(defects) => {
                    // Summarized feedback only: field and code, no raw detail.
                    feedback = Some(defects.join("; "));
                }
            }
        }

        ValidatedRecommendation {
            recommendation: fallback(MAX_VALIDATION_ATTEMPTS),
            attempt_bucket: AttemptBucket::Fallback,
            warnings: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Layers
// ============================================================================

/// Runs the structural and business layers, returning defect summaries.
fn check_layers(output: &Value) -> Result<Recommendation, Vec<String>> {
    // Layer 1: structural schema.
    let recommendation: Recommendation = serde_json::from_value(output.clone())
        .map_err(|_| vec!["structure: output does not match the recommendation schema".to_string()])?;

    // Layer 2: business rules on specific fields.
    let mut defects = Vec::new();
    if !(0.0..=1.0).contains(&recommendation.confidence) {
        defects.push("confidence: out_of_range".to_string());
    }
    if recommendation.reasoning.chars().count() < MIN_REASONING_CHARS {
        defects.push("reasoning: too_short".to_string());
    }
    if recommendation.citations.is_empty() {
        defects.push("citations: empty".to_string());
    }
    if defects.is_empty() {
        Ok(recommendation)
    } else {
        Err(defects)
    }
}

/// Layer 3: best-effort semantic checks; warnings never block acceptance.
fn semantic_warnings(
    recommendation: &Recommendation,
    citations: &dyn CitationIndex,
) -> Vec<String> {
    recommendation
        .citations
        .iter()
        .filter(|citation| !citations.exists(citation))
        .map(|citation| format!("citation not found: {citation}"))
        .collect()
}

/// Builds the honest fallback recommendation.
fn fallback(attempts: u32) -> Recommendation {
    Recommendation {
        confidence: 0.0,
        reasoning: format!("validation failed after {attempts} attempts; no recommendation"),
        citations: Vec::new(),
        suggested_actions: Vec::new(),
    }
}

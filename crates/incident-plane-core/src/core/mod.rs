// crates/incident-plane-core/src/core/mod.rs
// ============================================================================
// Module: Incident Plane Core Types
// Description: Canonical record shapes for every pipeline stage.
// Purpose: Provide stable, serializable types for signals through outcomes.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Core types define the canonical record shapes flowing through the
//! deterministic pipeline: signal, detection, evidence graph, candidate,
//! promotion decision, incident, and outcome. These types are the source of
//! truth for any derived API surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod candidate;
pub mod detection;
pub mod evidence;
pub mod hashing;
pub mod idempotency;
pub mod identifiers;
pub mod identity;
pub mod incident;
pub mod outcome;
pub mod promotion;
pub mod rule;
pub mod signal;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use candidate::BlastRadius;
pub use candidate::BlastScope;
pub use candidate::Candidate;
pub use candidate::ConfidenceBand;
pub use candidate::ConfidenceFactor;
pub use candidate::GenerationStep;
pub use candidate::ImpactBand;
pub use detection::CombinedDetection;
pub use detection::ConditionEvaluation;
pub use detection::Detection;
pub use detection::DetectionDecision;
pub use detection::DetectionMetadata;
pub use evidence::EvidenceBundle;
pub use evidence::EvidenceEdge;
pub use evidence::EvidenceGraph;
pub use evidence::EvidenceNode;
pub use evidence::SignalSummary;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::is_sha256_hex;
pub use hashing::sha256_canonical_json;
pub use hashing::sha256_hex;
pub use idempotency::IdempotencyRecord;
pub use idempotency::IdempotencyStatus;
pub use identifiers::AuthorityId;
pub use identifiers::CandidateId;
pub use identifiers::DetectionId;
pub use identifiers::GraphId;
pub use identifiers::IdempotencyKey;
pub use identifiers::IncidentId;
pub use identifiers::OutcomeId;
pub use identifiers::PolicyId;
pub use identifiers::PolicyVersion;
pub use identifiers::PromotionDecisionId;
pub use identifiers::RuleId;
pub use identifiers::RuleVersion;
pub use identifiers::ServiceName;
pub use identifiers::SignalId;
pub use identifiers::SummaryId;
pub use identity::compute_candidate_id;
pub use identity::compute_combined_detection_id;
pub use identity::compute_correlation_key;
pub use identity::compute_decision_hash;
pub use identity::compute_decision_id;
pub use identity::compute_detection_id;
pub use identity::compute_graph_id;
pub use identity::compute_incident_id;
pub use identity::compute_outcome_id;
pub use identity::compute_request_context_hash;
pub use identity::compute_state_hash;
pub use identity::compute_summary_id;
pub use identity::derive_idempotency_key;
pub use incident::Incident;
pub use incident::IncidentAction;
pub use incident::IncidentEvent;
pub use incident::IncidentState;
pub use incident::IncidentStateView;
pub use incident::Resolution;
pub use incident::TransitionAuthority;
pub use outcome::CalibrationBin;
pub use outcome::CalibrationFlag;
pub use outcome::CalibrationReport;
pub use outcome::HumanAssessment;
pub use outcome::Outcome;
pub use outcome::OutcomeClassification;
pub use outcome::OutcomeTiming;
pub use outcome::ResolutionSummary;
pub use outcome::ResolutionType;
pub use outcome::RootCauseCount;
pub use promotion::AuthorityContext;
pub use promotion::PolicyCheck;
pub use promotion::PromotionAuditRecord;
pub use promotion::PromotionDecision;
pub use promotion::PromotionRequest;
pub use promotion::PromotionVerdict;
pub use rule::AuthorityType;
pub use rule::ConditionOperator;
pub use rule::ConfidenceBoost;
pub use rule::CorrelationMatcher;
pub use rule::CorrelationRule;
pub use rule::DetectionRule;
pub use rule::KeyField;
pub use rule::MAX_DETECTIONS_PER_CANDIDATE;
pub use rule::MAX_WINDOW_MINUTES;
pub use rule::MIN_OVERRIDE_JUSTIFICATION_CHARS;
pub use rule::PolicyDeferral;
pub use rule::PolicyEligibility;
pub use rule::PolicyRejection;
pub use rule::PromotionPolicy;
pub use rule::RuleCondition;
pub use rule::RuleError;
pub use rule::SignalMatcher;
pub use signal::ConfidenceGrade;
pub use signal::EnvironmentRef;
pub use signal::NormalizedSignal;
pub use signal::ResourceRef;
pub use signal::Severity;
pub use signal::SignalEvidenceRef;
pub use time::TimeError;
pub use time::Timestamp;
pub use time::WindowTruncation;

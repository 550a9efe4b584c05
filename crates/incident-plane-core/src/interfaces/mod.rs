// crates/incident-plane-core/src/interfaces/mod.rs
// ============================================================================
// Module: Incident Plane Interfaces
// Description: Backend-agnostic capability sets for storage and eventing.
// Purpose: Define the contract surfaces the deterministic core depends on.
// Dependencies: serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! The core depends only on small capability sets; storage-specific adaptors
//! live outside. Every mutation is either a conditional put keyed on record
//! non-existence (returning whether the caller was first) or a version-checked
//! update. Event emission is best-effort at-most-once: consumers must tolerate
//! missing events, storage is the source of truth.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::Candidate;
use crate::core::CandidateId;
use crate::core::Detection;
use crate::core::DetectionId;
use crate::core::DetectionMetadata;
use crate::core::EvidenceBundle;
use crate::core::EvidenceGraph;
use crate::core::GraphId;
use crate::core::IdempotencyKey;
use crate::core::IdempotencyRecord;
use crate::core::Incident;
use crate::core::IncidentEvent;
use crate::core::IncidentId;
use crate::core::IncidentState;
use crate::core::NormalizedSignal;
use crate::core::Outcome;
use crate::core::OutcomeId;
use crate::core::PolicyId;
use crate::core::PolicyVersion;
use crate::core::PromotionAuditRecord;
use crate::core::PromotionDecision;
use crate::core::PromotionDecisionId;
use crate::core::PromotionPolicy;
use crate::core::PromotionVerdict;
use crate::core::ResolutionSummary;
use crate::core::RuleId;
use crate::core::ServiceName;
use crate::core::SignalId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O failure; retryable upstream.
    #[error("record store io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails integrity checks.
    #[error("record store corruption: {0}")]
    Corrupt(String),
    /// Version-checked update lost to a concurrent writer.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the caller based its update on.
        expected: u64,
        /// Version observed in the store.
        actual: u64,
    },
    /// Store rejected invalid data.
    #[error("record store invalid data: {0}")]
    Invalid(String),
}

/// Event emission errors. Emission is best-effort; callers log and continue.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The bus rejected or dropped the event.
    #[error("event emission failed: {0}")]
    Emit(String),
}

// ============================================================================
// SECTION: Pipeline Events
// ============================================================================

/// Best-effort observability events published to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineEvent {
    /// A detection was stored for the first time.
    #[serde(rename_all = "camelCase")]
    DetectionCreated {
        /// Stored detection identifier.
        detection_id: DetectionId,
        /// Producing rule identifier.
        rule_id: RuleId,
        /// Graded signal identifier.
        signal_id: SignalId,
        /// Storage time supplied by the host.
        detected_at: Timestamp,
    },
    /// A promotion decision was persisted for the first time.
    #[serde(rename_all = "camelCase")]
    PromotionDecided {
        /// Persisted decision identifier.
        decision_id: PromotionDecisionId,
        /// Candidate the decision covers.
        candidate_id: CandidateId,
        /// Verdict recorded.
        decision: PromotionVerdict,
        /// Decision time.
        decided_at: Timestamp,
    },
    /// An incident transitioned between lifecycle states.
    #[serde(rename_all = "camelCase")]
    IncidentTransitioned {
        /// Incident identifier.
        incident_id: IncidentId,
        /// State before the transition.
        from_state: IncidentState,
        /// State after the transition.
        to_state: IncidentState,
        /// Transition time.
        occurred_at: Timestamp,
    },
}

/// Best-effort event emitter.
pub trait EventEmitter {
    /// Publishes an event to the bus.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] when the bus rejects the event. Callers treat
    /// failures as observability loss, never as pipeline failure.
    fn emit(&self, event: &PipelineEvent) -> Result<(), EmitError>;
}

// ============================================================================
// SECTION: Signal Store
// ============================================================================

/// Read-only access to normalized signals.
pub trait SignalStore {
    /// Loads a signal by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_signal(&self, signal_id: &SignalId) -> Result<Option<NormalizedSignal>, StoreError>;
}

// ============================================================================
// SECTION: Detection Store
// ============================================================================

/// Secondary-index filter for detection time-range queries.
///
/// Partition narrowing is mandatory for correlation queries: rules that pin
/// the trigger's rule or service set the matching field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionFilter {
    /// Restrict to detections of one rule.
    pub rule_id: Option<RuleId>,
    /// Restrict to detections of one service.
    pub service: Option<ServiceName>,
}

/// Capability set for detection persistence.
pub trait DetectionStore {
    /// Conditionally stores a detection and its metadata.
    ///
    /// Returns `true` when this call created the record, `false` when a prior
    /// writer already converged on the same identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_detection(
        &self,
        detection: &Detection,
        metadata: &DetectionMetadata,
    ) -> Result<bool, StoreError>;

    /// Loads a detection by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_detection(&self, detection_id: &DetectionId) -> Result<Option<Detection>, StoreError>;

    /// Returns true when a detection exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn exists(&self, detection_id: &DetectionId) -> Result<bool, StoreError>;

    /// Loads detections referencing any of the given signals.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_detections_by_signal_ids(
        &self,
        signal_ids: &[SignalId],
    ) -> Result<Vec<Detection>, StoreError>;

    /// Queries detections by signal-timestamp range, `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn query_by_time_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        filter: &PartitionFilter,
        limit: usize,
    ) -> Result<Vec<Detection>, StoreError>;
}

// ============================================================================
// SECTION: Evidence Store
// ============================================================================

/// Capability set for evidence graph persistence.
pub trait EvidenceStore {
    /// Conditionally stores a graph; returns `true` when newly created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_graph(&self, graph: &EvidenceGraph) -> Result<bool, StoreError>;

    /// Loads a graph by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_graph(&self, graph_id: &GraphId) -> Result<Option<EvidenceGraph>, StoreError>;

    /// Loads the graph built for a specific detection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_graph_for_detection(
        &self,
        detection_id: &DetectionId,
    ) -> Result<Option<EvidenceGraph>, StoreError>;

    /// Conditionally stores a bundle; returns `true` when newly created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_bundle(&self, bundle: &EvidenceBundle) -> Result<bool, StoreError>;

    /// Loads a bundle by its graph identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_bundle(&self, graph_id: &GraphId) -> Result<Option<EvidenceBundle>, StoreError>;
}

// ============================================================================
// SECTION: Candidate Store
// ============================================================================

/// Capability set for candidate persistence.
pub trait CandidateStore {
    /// Conditionally stores a candidate; returns `true` when newly created.
    ///
    /// A `false` return means a concurrent producer already converged on the
    /// same identity; callers treat it as success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_candidate(&self, candidate: &Candidate) -> Result<bool, StoreError>;

    /// Loads a candidate by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_candidate(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>, StoreError>;
}

// ============================================================================
// SECTION: Decision Store
// ============================================================================

/// Capability set for promotion decision persistence.
pub trait DecisionStore {
    /// Conditionally stores a decision; returns `true` when newly created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_decision(&self, decision: &PromotionDecision) -> Result<bool, StoreError>;

    /// Loads a decision by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_decision(
        &self,
        decision_id: &PromotionDecisionId,
    ) -> Result<Option<PromotionDecision>, StoreError>;

    /// Loads every decision recorded for a candidate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_decisions_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<PromotionDecision>, StoreError>;
}

/// Capability set for the promotion audit trail.
///
/// Audit writes are best-effort: failures are logged and never block decision
/// persistence.
pub trait AuditStore {
    /// Appends an audit record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_audit(&self, record: &PromotionAuditRecord) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Policy Catalog
// ============================================================================

/// Read-only access to versioned promotion policies.
///
/// Production evaluation paths always load an exact `{id, version}` pair;
/// resolving "latest" is a tooling concern and deliberately absent here.
pub trait PolicyCatalog {
    /// Loads a policy by exact coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    fn load_policy(
        &self,
        policy_id: &PolicyId,
        policy_version: &PolicyVersion,
    ) -> Result<Option<PromotionPolicy>, StoreError>;
}

// ============================================================================
// SECTION: Incident Store
// ============================================================================

/// Capability set for event-sourced incident persistence.
pub trait IncidentStore {
    /// Conditionally creates an incident with its first event.
    ///
    /// Returns `true` when this call created the incident, `false` when the
    /// evidence-derived identifier already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn create_incident(
        &self,
        incident: &Incident,
        event: &IncidentEvent,
    ) -> Result<bool, StoreError>;

    /// Loads an incident by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_incident(&self, incident_id: &IncidentId) -> Result<Option<Incident>, StoreError>;

    /// Applies a version-checked update, appending one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] when a concurrent writer
    /// advanced the incident first; callers retry from a fresh read.
    fn update_incident(
        &self,
        incident: &Incident,
        event: &IncidentEvent,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    /// Loads the ordered event log for an incident.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_events(&self, incident_id: &IncidentId) -> Result<Vec<IncidentEvent>, StoreError>;

    /// Queries incidents owned by a service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn query_by_service(&self, service: &ServiceName) -> Result<Vec<Incident>, StoreError>;
}

// ============================================================================
// SECTION: Outcome Store
// ============================================================================

/// Capability set for append-only outcome persistence.
pub trait OutcomeStore {
    /// Conditionally stores an outcome; returns `true` when newly created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_outcome(&self, outcome: &Outcome) -> Result<bool, StoreError>;

    /// Loads an outcome by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_outcome(&self, outcome_id: &OutcomeId) -> Result<Option<Outcome>, StoreError>;

    /// Queries outcomes for a service within `[start, end)` of closure time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn query_by_service_window(
        &self,
        service: &ServiceName,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Outcome>, StoreError>;

    /// Conditionally stores a resolution summary; returns `true` when new.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_summary(&self, summary: &ResolutionSummary) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Idempotency Store
// ============================================================================

/// Capability set for permanent idempotency claims.
pub trait IdempotencyStore {
    /// Conditionally claims a key; returns `true` when this caller was first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn claim(&self, record: &IdempotencyRecord) -> Result<bool, StoreError>;

    /// Loads a claim record by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Marks a claim completed and attaches the canonical response.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn complete(
        &self,
        key: &IdempotencyKey,
        response: Value,
        completed_at: Timestamp,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Orchestration Attempt Log
// ============================================================================

/// Write-only orchestration attempt record (observability, 90-day retention).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationAttempt {
    /// Idempotency key the attempt executed under.
    pub idempotency_key: IdempotencyKey,
    /// Candidate processed.
    pub candidate_id: CandidateId,
    /// Decision reached, when the attempt got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<PromotionDecisionId>,
    /// Incident created or joined, when the attempt got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<IncidentId>,
    /// Stage label the attempt finished at.
    pub stage: String,
    /// Attempt time.
    pub attempted_at: Timestamp,
}

/// Best-effort attempt log.
pub trait AttemptLog {
    /// Records an orchestration attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails. Callers log and continue.
    fn record_attempt(&self, attempt: &OrchestrationAttempt) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Automation Config
// ============================================================================

/// Storage-held automation switches consulted by the orchestrator.
pub trait AutomationConfig {
    /// Returns true when automated promotion is halted by the kill switch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails; callers fail closed.
    fn automation_halted(&self) -> Result<bool, StoreError>;
}

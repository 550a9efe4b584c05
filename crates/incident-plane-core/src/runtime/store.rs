// crates/incident-plane-core/src/runtime/store.rs
// ============================================================================
// Module: Incident Plane In-Memory Stores
// Description: In-memory capability implementations for tests and demos.
// Purpose: Provide deterministic store behavior without external backends.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! These stores implement every storage capability over mutex-guarded
//! `BTreeMap`s. Conditional puts mirror the production contract exactly:
//! the first writer wins, subsequent writers observe "already exists" and
//! converge. They are intended for tests and local demos, not production.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde_json::Value;

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
use crate::core::IdempotencyStatus;
use crate::core::Incident;
use crate::core::IncidentEvent;
use crate::core::IncidentId;
use crate::core::NormalizedSignal;
use crate::core::Outcome;
use crate::core::OutcomeId;
use crate::core::PromotionAuditRecord;
use crate::core::PromotionDecision;
use crate::core::PromotionDecisionId;
use crate::core::ResolutionSummary;
use crate::core::ServiceName;
use crate::core::SignalId;
use crate::core::Timestamp;
use crate::interfaces::AttemptLog;
use crate::interfaces::AuditStore;
use crate::interfaces::AutomationConfig;
use crate::interfaces::CandidateStore;
use crate::interfaces::DecisionStore;
use crate::interfaces::DetectionStore;
use crate::interfaces::EmitError;
use crate::interfaces::EventEmitter;
use crate::interfaces::EvidenceStore;
use crate::interfaces::IdempotencyStore;
use crate::interfaces::IncidentStore;
use crate::interfaces::OrchestrationAttempt;
use crate::interfaces::OutcomeStore;
use crate::interfaces::PartitionFilter;
use crate::interfaces::PipelineEvent;
use crate::interfaces::SignalStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Lock Helper
// ============================================================================

/// Locks a store mutex, mapping poisoning to a store error.
fn locked<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<std::sync::MutexGuard<'a, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Io(format!("{name} store mutex poisoned")))
}

// ============================================================================
// SECTION: Signal Store
// ============================================================================

/// In-memory signal store.
#[derive(Debug, Default, Clone)]
pub struct InMemorySignalStore {
    /// Signals keyed by identifier.
    signals: Arc<Mutex<BTreeMap<String, NormalizedSignal>>>,
}

impl InMemorySignalStore {
    /// Creates a new signal store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a signal for tests and demos.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn insert(&self, signal: NormalizedSignal) -> Result<(), StoreError> {
        locked(&self.signals, "signal")?
            .insert(signal.normalized_signal_id.as_str().to_string(), signal);
        Ok(())
    }
}

impl SignalStore for InMemorySignalStore {
    fn get_signal(&self, signal_id: &SignalId) -> Result<Option<NormalizedSignal>, StoreError> {
        Ok(locked(&self.signals, "signal")?.get(signal_id.as_str()).cloned())
    }
}

// ============================================================================
// SECTION: Detection Store
// ============================================================================

/// In-memory detection store with a time-range scan.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDetectionStore {
    /// Detections keyed by identifier.
    detections: Arc<Mutex<BTreeMap<String, (Detection, DetectionMetadata)>>>,
}

impl InMemoryDetectionStore {
    /// Creates a new detection store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetectionStore for InMemoryDetectionStore {
    fn put_detection(
        &self,
        detection: &Detection,
        metadata: &DetectionMetadata,
    ) -> Result<bool, StoreError> {
        let mut guard = locked(&self.detections, "detection")?;
        let key = detection.detection_id.as_str().to_string();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, (detection.clone(), metadata.clone()));
        Ok(true)
    }

    fn get_detection(&self, detection_id: &DetectionId) -> Result<Option<Detection>, StoreError> {
        Ok(locked(&self.detections, "detection")?
            .get(detection_id.as_str())
            .map(|(detection, _)| detection.clone()))
    }

    fn exists(&self, detection_id: &DetectionId) -> Result<bool, StoreError> {
        Ok(locked(&self.detections, "detection")?.contains_key(detection_id.as_str()))
    }

    fn get_detections_by_signal_ids(
        &self,
        signal_ids: &[SignalId],
    ) -> Result<Vec<Detection>, StoreError> {
        let guard = locked(&self.detections, "detection")?;
        Ok(guard
            .values()
            .filter(|(detection, _)| signal_ids.contains(&detection.normalized_signal_id))
            .map(|(detection, _)| detection.clone())
            .collect())
    }

    fn query_by_time_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        filter: &PartitionFilter,
        limit: usize,
    ) -> Result<Vec<Detection>, StoreError> {
        let guard = locked(&self.detections, "detection")?;
        let mut matches: Vec<Detection> = guard
            .values()
            .filter(|(detection, _)| {
                detection.signal_timestamp >= start && detection.signal_timestamp < end
            })
            .filter(|(detection, _)| {
                filter.rule_id.as_ref().is_none_or(|rule_id| &detection.rule_id == rule_id)
            })
            .filter(|(detection, _)| {
                filter.service.as_ref().is_none_or(|service| &detection.service == service)
            })
            .map(|(detection, _)| detection.clone())
            .collect();
        matches.sort_by(|left, right| {
            left.signal_timestamp
                .cmp(&right.signal_timestamp)
                .then_with(|| left.detection_id.cmp(&right.detection_id))
        });
        matches.truncate(limit);
        Ok(matches)
    }
}

// ============================================================================
// SECTION: Evidence Store
// ============================================================================

/// In-memory evidence store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEvidenceStore {
    /// Graphs keyed by graph identifier.
    graphs: Arc<Mutex<BTreeMap<String, EvidenceGraph>>>,
    /// Graph identifiers keyed by owning detection.
    by_detection: Arc<Mutex<BTreeMap<String, String>>>,
    /// Bundles keyed by graph identifier.
    bundles: Arc<Mutex<BTreeMap<String, EvidenceBundle>>>,
}

impl InMemoryEvidenceStore {
    /// Creates a new evidence store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvidenceStore for InMemoryEvidenceStore {
    fn put_graph(&self, graph: &EvidenceGraph) -> Result<bool, StoreError> {
        let mut graphs = locked(&self.graphs, "evidence")?;
        let key = graph.graph_id.as_str().to_string();
        if graphs.contains_key(&key) {
            return Ok(false);
        }
        graphs.insert(key.clone(), graph.clone());
        locked(&self.by_detection, "evidence")?
            .insert(graph.detection_id.as_str().to_string(), key);
        Ok(true)
    }

    fn get_graph(&self, graph_id: &GraphId) -> Result<Option<EvidenceGraph>, StoreError> {
        Ok(locked(&self.graphs, "evidence")?.get(graph_id.as_str()).cloned())
    }

    fn get_graph_for_detection(
        &self,
        detection_id: &DetectionId,
    ) -> Result<Option<EvidenceGraph>, StoreError> {
        let graph_id = locked(&self.by_detection, "evidence")?
            .get(detection_id.as_str())
            .cloned();
        match graph_id {
            Some(graph_id) => Ok(locked(&self.graphs, "evidence")?.get(&graph_id).cloned()),
            None => Ok(None),
        }
    }

    fn put_bundle(&self, bundle: &EvidenceBundle) -> Result<bool, StoreError> {
        let mut bundles = locked(&self.bundles, "evidence")?;
        let key = bundle.graph.graph_id.as_str().to_string();
        if bundles.contains_key(&key) {
            return Ok(false);
        }
        bundles.insert(key, bundle.clone());
        Ok(true)
    }

    fn get_bundle(&self, graph_id: &GraphId) -> Result<Option<EvidenceBundle>, StoreError> {
        Ok(locked(&self.bundles, "evidence")?.get(graph_id.as_str()).cloned())
    }
}

// ============================================================================
// SECTION: Candidate Store
// ============================================================================

/// In-memory candidate store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCandidateStore {
    /// Candidates keyed by identifier.
    candidates: Arc<Mutex<BTreeMap<String, Candidate>>>,
}

impl InMemoryCandidateStore {
    /// Creates a new candidate store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CandidateStore for InMemoryCandidateStore {
    fn put_candidate(&self, candidate: &Candidate) -> Result<bool, StoreError> {
        let mut guard = locked(&self.candidates, "candidate")?;
        let key = candidate.candidate_id.as_str().to_string();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, candidate.clone());
        Ok(true)
    }

    fn get_candidate(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>, StoreError> {
        Ok(locked(&self.candidates, "candidate")?.get(candidate_id.as_str()).cloned())
    }
}

// ============================================================================
// SECTION: Decision and Audit Stores
// ============================================================================

/// In-memory promotion decision store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDecisionStore {
    /// Decisions keyed by identifier.
    decisions: Arc<Mutex<BTreeMap<String, PromotionDecision>>>,
}

impl InMemoryDecisionStore {
    /// Creates a new decision store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecisionStore for InMemoryDecisionStore {
    fn put_decision(&self, decision: &PromotionDecision) -> Result<bool, StoreError> {
        let mut guard = locked(&self.decisions, "decision")?;
        let key = decision.decision_id.as_str().to_string();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, decision.clone());
        Ok(true)
    }

    fn get_decision(
        &self,
        decision_id: &PromotionDecisionId,
    ) -> Result<Option<PromotionDecision>, StoreError> {
        Ok(locked(&self.decisions, "decision")?.get(decision_id.as_str()).cloned())
    }

    fn get_decisions_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<PromotionDecision>, StoreError> {
        Ok(locked(&self.decisions, "decision")?
            .values()
            .filter(|decision| &decision.candidate_id == candidate_id)
            .cloned()
            .collect())
    }
}

/// In-memory promotion audit store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditStore {
    /// Audit records in append order.
    records: Arc<Mutex<Vec<PromotionAuditRecord>>>,
}

impl InMemoryAuditStore {
    /// Creates a new audit store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded audits.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<PromotionAuditRecord>, StoreError> {
        Ok(locked(&self.records, "audit")?.clone())
    }
}

impl AuditStore for InMemoryAuditStore {
    fn put_audit(&self, record: &PromotionAuditRecord) -> Result<(), StoreError> {
        locked(&self.records, "audit")?.push(record.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Incident Store
// ============================================================================

/// In-memory event-sourced incident store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIncidentStore {
    /// Incidents keyed by identifier.
    incidents: Arc<Mutex<BTreeMap<String, Incident>>>,
    /// Ordered events keyed by incident identifier.
    events: Arc<Mutex<BTreeMap<String, Vec<IncidentEvent>>>>,
}

impl InMemoryIncidentStore {
    /// Creates a new incident store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IncidentStore for InMemoryIncidentStore {
    fn create_incident(
        &self,
        incident: &Incident,
        event: &IncidentEvent,
    ) -> Result<bool, StoreError> {
        let mut incidents = locked(&self.incidents, "incident")?;
        let key = incident.incident_id.as_str().to_string();
        if incidents.contains_key(&key) {
            return Ok(false);
        }
        incidents.insert(key.clone(), incident.clone());
        locked(&self.events, "incident")?.insert(key, vec![event.clone()]);
        Ok(true)
    }

    fn get_incident(&self, incident_id: &IncidentId) -> Result<Option<Incident>, StoreError> {
        Ok(locked(&self.incidents, "incident")?.get(incident_id.as_str()).cloned())
    }

    fn update_incident(
        &self,
        incident: &Incident,
        event: &IncidentEvent,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut incidents = locked(&self.incidents, "incident")?;
        let key = incident.incident_id.as_str().to_string();
        let current = incidents
            .get(&key)
            .ok_or_else(|| StoreError::Invalid(format!("unknown incident: {key}")))?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: current.version,
            });
        }
        incidents.insert(key.clone(), incident.clone());
        locked(&self.events, "incident")?
            .entry(key)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    fn get_events(&self, incident_id: &IncidentId) -> Result<Vec<IncidentEvent>, StoreError> {
        Ok(locked(&self.events, "incident")?
            .get(incident_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn query_by_service(&self, service: &ServiceName) -> Result<Vec<Incident>, StoreError> {
        Ok(locked(&self.incidents, "incident")?
            .values()
            .filter(|incident| &incident.service == service)
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Outcome Store
// ============================================================================

/// In-memory outcome store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOutcomeStore {
    /// Outcomes keyed by identifier.
    outcomes: Arc<Mutex<BTreeMap<String, Outcome>>>,
    /// Summaries keyed by identifier.
    summaries: Arc<Mutex<BTreeMap<String, ResolutionSummary>>>,
}

impl InMemoryOutcomeStore {
    /// Creates a new outcome store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutcomeStore for InMemoryOutcomeStore {
    fn put_outcome(&self, outcome: &Outcome) -> Result<bool, StoreError> {
        let mut guard = locked(&self.outcomes, "outcome")?;
        let key = outcome.outcome_id.as_str().to_string();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, outcome.clone());
        Ok(true)
    }

    fn get_outcome(&self, outcome_id: &OutcomeId) -> Result<Option<Outcome>, StoreError> {
        Ok(locked(&self.outcomes, "outcome")?.get(outcome_id.as_str()).cloned())
    }

    fn query_by_service_window(
        &self,
        service: &ServiceName,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Outcome>, StoreError> {
        Ok(locked(&self.outcomes, "outcome")?
            .values()
            .filter(|outcome| &outcome.service == service)
            .filter(|outcome| outcome.closed_at >= start && outcome.closed_at < end)
            .cloned()
            .collect())
    }

    fn put_summary(&self, summary: &ResolutionSummary) -> Result<bool, StoreError> {
        let mut guard = locked(&self.summaries, "outcome")?;
        let key = summary.summary_id.as_str().to_string();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, summary.clone());
        Ok(true)
    }
}

// ============================================================================
// SECTION: Idempotency Store
// ============================================================================

/// In-memory idempotency claim store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdempotencyStore {
    /// Records keyed by idempotency key.
    records: Arc<Mutex<BTreeMap<String, IdempotencyRecord>>>,
}

impl InMemoryIdempotencyStore {
    /// Creates a new idempotency store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdempotencyStore for InMemoryIdempotencyStore {
    fn claim(&self, record: &IdempotencyRecord) -> Result<bool, StoreError> {
        let mut guard = locked(&self.records, "idempotency")?;
        let key = record.idempotency_key.as_str().to_string();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, record.clone());
        Ok(true)
    }

    fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(locked(&self.records, "idempotency")?.get(key.as_str()).cloned())
    }

    fn complete(
        &self,
        key: &IdempotencyKey,
        response: Value,
        completed_at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut guard = locked(&self.records, "idempotency")?;
        let record = guard
            .get_mut(key.as_str())
            .ok_or_else(|| StoreError::Invalid(format!("unclaimed key: {key}")))?;
        record.status = IdempotencyStatus::Completed;
        record.response = Some(response);
        record.completed_at = Some(completed_at);
        Ok(())
    }
}

// ============================================================================
// SECTION: Attempt Log and Automation Config
// ============================================================================

/// In-memory orchestration attempt log.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAttemptLog {
    /// Attempts in append order.
    attempts: Arc<Mutex<Vec<OrchestrationAttempt>>>,
}

impl InMemoryAttemptLog {
    /// Creates a new attempt log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded attempts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<OrchestrationAttempt>, StoreError> {
        Ok(locked(&self.attempts, "attempt")?.clone())
    }
}

impl AttemptLog for InMemoryAttemptLog {
    fn record_attempt(&self, attempt: &OrchestrationAttempt) -> Result<(), StoreError> {
        locked(&self.attempts, "attempt")?.push(attempt.clone());
        Ok(())
    }
}

/// Static automation config flag.
#[derive(Debug, Default)]
pub struct StaticAutomationConfig {
    /// True when automation is halted.
    halted: AtomicBool,
}

impl StaticAutomationConfig {
    /// Creates a config with automation enabled.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            halted: AtomicBool::new(false),
        }
    }

    /// Creates a config with automation halted.
    #[must_use]
    pub fn halted() -> Self {
        Self {
            halted: AtomicBool::new(true),
        }
    }

    /// Flips the kill switch.
    pub fn set_halted(&self, halted: bool) {
        self.halted.store(halted, Ordering::SeqCst);
    }
}

impl AutomationConfig for StaticAutomationConfig {
    fn automation_halted(&self) -> Result<bool, StoreError> {
        Ok(self.halted.load(Ordering::SeqCst))
    }
}

// ============================================================================
// SECTION: Event Emitters
// ============================================================================

/// Emitter that records events for assertions.
#[derive(Debug, Default, Clone)]
pub struct CollectingEmitter {
    /// Events in emission order.
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl CollectingEmitter {
    /// Creates a new collecting emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of emitted events.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] when the emitter lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<PipelineEvent>, EmitError> {
        Ok(self
            .events
            .lock()
            .map_err(|_| EmitError::Emit("emitter mutex poisoned".to_string()))?
            .clone())
    }
}

impl EventEmitter for CollectingEmitter {
    fn emit(&self, event: &PipelineEvent) -> Result<(), EmitError> {
        self.events
            .lock()
            .map_err(|_| EmitError::Emit("emitter mutex poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Emitter that always fails, for exercising best-effort paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingEmitter;

impl EventEmitter for FailingEmitter {
    fn emit(&self, _event: &PipelineEvent) -> Result<(), EmitError> {
        Err(EmitError::Emit("bus unavailable".to_string()))
    }
}

// crates/incident-plane-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Incident Plane Orchestrator
// Description: End-to-end coordination of candidate, decision, and incident.
// Purpose: Wrap the promotion path with idempotency claims and attempt logging.
// Dependencies: serde_json, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The orchestrator drives `candidate -> decision -> incident` under an
//! idempotency claim: claim, promote, create-or-look-up the incident, log the
//! attempt (best-effort), complete. Concurrent identical attempts converge
//! because every stage identity is deterministic and every write is
//! conditional; a caller that loses the claim either returns the winner's
//! completed result or safely re-executes into the same records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::CandidateId;
use crate::core::Incident;
use crate::core::PromotionDecision;
use crate::core::PromotionRequest;
use crate::core::PromotionVerdict;
use crate::core::rule::AuthorityType;
use crate::interfaces::AttemptLog;
use crate::interfaces::AuditStore;
use crate::interfaces::AutomationConfig;
use crate::interfaces::CandidateStore;
use crate::interfaces::DecisionStore;
use crate::interfaces::EventEmitter;
use crate::interfaces::EvidenceStore;
use crate::interfaces::IdempotencyStore;
use crate::interfaces::IncidentStore;
use crate::interfaces::OrchestrationAttempt;
use crate::interfaces::PolicyCatalog;
use crate::interfaces::StoreError;
use crate::runtime::idempotency::ClaimOutcome;
use crate::runtime::idempotency::IdempotencyError;
use crate::runtime::idempotency::IdempotencyService;
use crate::runtime::incident::IncidentError;
use crate::runtime::incident::IncidentManager;
use crate::runtime::promotion::PromotionContext;
use crate::runtime::promotion::PromotionEngine;
use crate::runtime::promotion::PromotionError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Orchestrator errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Automated promotion is halted by the kill switch.
    #[error("AUTOMATION_HALTED: the automation kill switch is engaged")]
    AutomationHalted,
    /// Candidate does not exist.
    #[error("candidate not found: {0}")]
    CandidateNotFound(CandidateId),
    /// The promoted candidate's evidence graph is missing.
    #[error("evidence graph missing for candidate {0}")]
    EvidenceMissing(CandidateId),
    /// Idempotency claim failure.
    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),
    /// Promotion engine failure.
    #[error(transparent)]
    Promotion(#[from] PromotionError),
    /// Incident manager failure.
    #[error(transparent)]
    Incident(#[from] IncidentError),
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Dependencies
// ============================================================================

/// Capability bundle the orchestrator executes against.
pub struct OrchestratorDeps<'a> {
    /// Candidate store.
    pub candidates: &'a dyn CandidateStore,
    /// Evidence store.
    pub evidence: &'a dyn EvidenceStore,
    /// Policy catalog.
    pub policies: &'a dyn PolicyCatalog,
    /// Decision store.
    pub decisions: &'a dyn DecisionStore,
    /// Promotion audit store.
    pub audit: &'a dyn AuditStore,
    /// Incident store.
    pub incidents: &'a dyn IncidentStore,
    /// Idempotency claim store.
    pub idempotency: &'a dyn IdempotencyStore,
    /// Orchestration attempt log.
    pub attempts: &'a dyn AttemptLog,
    /// Automation switches.
    pub automation: &'a dyn AutomationConfig,
    /// Event emitter.
    pub emitter: &'a dyn EventEmitter,
}

// ============================================================================
// SECTION: Result
// ============================================================================

/// Result of processing a candidate end to end.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    /// The promotion decision reached or converged on.
    pub decision: PromotionDecision,
    /// The incident created or joined, present for PROMOTE verdicts.
    pub incident: Option<Incident>,
    /// True when a prior attempt's completed claim satisfied this call.
    pub converged: bool,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// End-to-end coordinator for the promotion path.
pub struct Orchestrator {
    /// Idempotency service.
    idempotency: IdempotencyService,
    /// Promotion engine.
    engine: PromotionEngine,
    /// Incident manager.
    manager: IncidentManager,
}

impl Orchestrator {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(manager: IncidentManager) -> Self {
        Self {
            idempotency: IdempotencyService::new(),
            engine: PromotionEngine::new(),
            manager,
        }
    }

    /// Processes a promotion request end to end under an idempotency claim.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] for request defects, missing records,
    /// the engaged kill switch, or storage failures.
    #[allow(
        clippy::too_many_lines,
        reason = "The attempt pipeline is a single linear flow for auditability."
    )]
    pub fn process_candidate(
        &self,
        request: &PromotionRequest,
        client_key: Option<&str>,
        deps: &OrchestratorDeps<'_>,
    ) -> Result<ProcessResult, OrchestratorError> {
        // Kill switch: automated attempts are refused while engaged. A switch
        // read failure fails closed for automation.
        if request.authority.authority_type == AuthorityType::AutoEngine
            && deps.automation.automation_halted().unwrap_or(true)
        {
            return Err(OrchestratorError::AutomationHalted);
        }

        let key = self.idempotency.key_for(
            request.authority.authority_id.as_str(),
            "processCandidate",
            request,
            client_key,
        )?;
        let request_hash = self.idempotency.request_hash(request)?;

        let claim =
            self.idempotency.claim(&key, &request_hash, request.current_time, deps.idempotency)?;
        if let ClaimOutcome::Completed {
            response: Some(response),
        } = &claim
        {
            if let Some(result) = self.rehydrate(response, deps)? {
                return Ok(result);
            }
            // A malformed response is not trusted; deterministic identities
            // make re-execution safe.
        }

        let candidate = deps
            .candidates
            .get_candidate(&request.candidate_id)?
            .ok_or_else(|| OrchestratorError::CandidateNotFound(request.candidate_id.clone()))?;

        let context = PromotionContext {
            existing_decisions: deps
                .decisions
                .get_decisions_for_candidate(&request.candidate_id)?,
            active_incidents: deps.incidents.query_by_service(&candidate.suggested_service)?,
        };

        let outcome = self.engine.process(
            request,
            &context,
            deps.candidates,
            deps.policies,
            deps.decisions,
            deps.audit,
            deps.emitter,
        )?;

        let incident = if outcome.decision.decision == PromotionVerdict::Promote {
            let graph = deps
                .evidence
                .get_graph_for_detection(&candidate.primary_detection_id)?
                .ok_or_else(|| OrchestratorError::EvidenceMissing(candidate.candidate_id.clone()))?;
            let created = self.manager.create_from_decision(
                &outcome.decision,
                &candidate,
                &graph.graph_id,
                &request.authority,
                request.current_time,
                deps.incidents,
            )?;
            Some(created.incident)
        } else {
            None
        };

        // Attempt logging is observability; failures never block completion.
        let attempt = OrchestrationAttempt {
            idempotency_key: key.clone(),
            candidate_id: request.candidate_id.clone(),
            decision_id: Some(outcome.decision.decision_id.clone()),
            incident_id: incident.as_ref().map(|record| record.incident_id.clone()),
            stage: "completed".to_string(),
            attempted_at: request.current_time,
        };
        let logged = deps.attempts.record_attempt(&attempt);
        drop(logged);

        let response = json!({
            "decisionId": outcome.decision.decision_id,
            "incidentId": incident.as_ref().map(|record| record.incident_id.clone()),
        });
        self.idempotency.complete(&key, response, request.current_time, deps.idempotency)?;

        Ok(ProcessResult {
            decision: outcome.decision,
            incident,
            converged: false,
        })
    }

    /// Rebuilds a completed attempt's result from its stored response.
    fn rehydrate(
        &self,
        response: &Value,
        deps: &OrchestratorDeps<'_>,
    ) -> Result<Option<ProcessResult>, OrchestratorError> {
        let Some(decision_id) = response.get("decisionId").and_then(Value::as_str) else {
            return Ok(None);
        };
        let Some(decision) =
            deps.decisions.get_decision(&crate::core::PromotionDecisionId::new(decision_id))?
        else {
            return Ok(None);
        };
        let incident = match response.get("incidentId").and_then(Value::as_str) {
            Some(incident_id) => {
                deps.incidents.get_incident(&crate::core::IncidentId::new(incident_id))?
            }
            None => None,
        };
        Ok(Some(ProcessResult {
            decision,
            incident,
            converged: true,
        }))
    }
}

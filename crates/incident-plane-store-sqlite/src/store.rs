// crates/incident-plane-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Durable capability implementation backed by SQLite WAL.
// Purpose: Persist pipeline records with conditional and version-checked writes.
// Dependencies: incident-plane-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One store instance owns one `SQLite` connection behind a mutex. Every
//! record kind gets a table holding its JSON snapshot plus the columns the
//! secondary-index queries need. Conditional puts rely on primary-key
//! `INSERT OR IGNORE`; the affected-row count distinguishes the first writer
//! from converging retries. Incident updates run inside a transaction that
//! re-checks the version counter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Mutex;

use incident_plane_core::Candidate;
use incident_plane_core::CandidateId;
use incident_plane_core::Detection;
use incident_plane_core::DetectionId;
use incident_plane_core::DetectionMetadata;
use incident_plane_core::EvidenceBundle;
use incident_plane_core::EvidenceGraph;
use incident_plane_core::GraphId;
use incident_plane_core::IdempotencyKey;
use incident_plane_core::IdempotencyRecord;
use incident_plane_core::IdempotencyStatus;
use incident_plane_core::Incident;
use incident_plane_core::IncidentEvent;
use incident_plane_core::IncidentId;
use incident_plane_core::NormalizedSignal;
use incident_plane_core::Outcome;
use incident_plane_core::OutcomeId;
use incident_plane_core::PromotionAuditRecord;
use incident_plane_core::PromotionDecision;
use incident_plane_core::PromotionDecisionId;
use incident_plane_core::ResolutionSummary;
use incident_plane_core::ServiceName;
use incident_plane_core::SignalId;
use incident_plane_core::Timestamp;
use incident_plane_core::interfaces::AttemptLog;
use incident_plane_core::interfaces::AuditStore;
use incident_plane_core::interfaces::AutomationConfig;
use incident_plane_core::interfaces::CandidateStore;
use incident_plane_core::interfaces::DecisionStore;
use incident_plane_core::interfaces::DetectionStore;
use incident_plane_core::interfaces::EvidenceStore;
use incident_plane_core::interfaces::IdempotencyStore;
use incident_plane_core::interfaces::IncidentStore;
use incident_plane_core::interfaces::OrchestrationAttempt;
use incident_plane_core::interfaces::OutcomeStore;
use incident_plane_core::interfaces::PartitionFilter;
use incident_plane_core::interfaces::SignalStore;
use incident_plane_core::interfaces::StoreError;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Automation kill-switch row name.
const KILL_SWITCH_KEY: &str = "automation_halted";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Store configuration.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Busy timeout applied to the connection.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Store construction errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Opening or migrating the database failed.
    #[error("sqlite open failed: {0}")]
    Open(String),
}

/// Maps a rusqlite error onto the capability error kind.
fn io(err: &rusqlite::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

/// Maps a serialization error onto the capability error kind.
fn invalid(err: &serde_json::Error) -> StoreError {
    StoreError::Invalid(err.to_string())
}

/// Serializes a record snapshot.
fn snapshot<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| invalid(&err))
}

/// Deserializes a record snapshot.
fn restore<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|err| StoreError::Corrupt(err.to_string()))
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable record store over one `SQLite` database.
pub struct SqliteStore {
    /// Connection guarded for interior mutability.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (and migrates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Open`] when the database cannot be opened
    /// or the schema cannot be created.
    pub fn open(path: &Path, config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let conn = Connection::open(path).map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        Self::initialize(conn, config)
    }

    /// Opens an in-memory store for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Open`] when initialization fails.
    pub fn open_in_memory(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        Self::initialize(conn, config)
    }

    /// Applies pragmas and the schema.
    fn initialize(
        conn: Connection,
        config: &SqliteStoreConfig,
    ) -> Result<Self, SqliteStoreError> {
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.pragma_update(None, "journal_mode", "wal")
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.pragma_update(None, "synchronous", "full")
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection, mapping poisoning to a store error.
    fn locked(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Seeds a normalized signal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn insert_signal(&self, signal: &NormalizedSignal) -> Result<(), StoreError> {
        let conn = self.locked()?;
        conn.execute(
            "INSERT OR REPLACE INTO signals (signal_id, body) VALUES (?1, ?2)",
            params![signal.normalized_signal_id.as_str(), snapshot(signal)?],
        )
        .map_err(|err| io(&err))?;
        Ok(())
    }

    /// Flips the automation kill switch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn set_automation_halted(&self, halted: bool) -> Result<(), StoreError> {
        let conn = self.locked()?;
        conn.execute(
            "INSERT OR REPLACE INTO automation_config (name, value) VALUES (?1, ?2)",
            params![KILL_SWITCH_KEY, i64::from(halted)],
        )
        .map_err(|err| io(&err))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Table definitions for every record kind.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS signals (
    signal_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS detections (
    detection_id TEXT PRIMARY KEY,
    rule_id TEXT NOT NULL,
    service TEXT NOT NULL,
    signal_id TEXT NOT NULL,
    signal_ts INTEGER NOT NULL,
    body TEXT NOT NULL,
    metadata TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_detections_ts ON detections (signal_ts);
CREATE TABLE IF NOT EXISTS evidence_graphs (
    graph_id TEXT PRIMARY KEY,
    detection_id TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_graphs_detection ON evidence_graphs (detection_id);
CREATE TABLE IF NOT EXISTS evidence_bundles (
    graph_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS candidates (
    candidate_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS promotion_decisions (
    decision_id TEXT PRIMARY KEY,
    candidate_id TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_decisions_candidate ON promotion_decisions (candidate_id);
CREATE TABLE IF NOT EXISTS promotion_audit (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    decision_id TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS incidents (
    incident_id TEXT PRIMARY KEY,
    service TEXT NOT NULL,
    version INTEGER NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_service ON incidents (service);
CREATE TABLE IF NOT EXISTS incident_events (
    incident_id TEXT NOT NULL,
    event_seq INTEGER NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (incident_id, event_seq)
);
CREATE TABLE IF NOT EXISTS outcomes (
    outcome_id TEXT PRIMARY KEY,
    service TEXT NOT NULL,
    closed_at INTEGER NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_outcomes_service ON outcomes (service, closed_at);
CREATE TABLE IF NOT EXISTS resolution_summaries (
    summary_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS idempotency (
    idempotency_key TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS orchestration_attempts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    attempted_at INTEGER NOT NULL,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS automation_config (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
";

// ============================================================================
// SECTION: Signal Store
// ============================================================================

impl SignalStore for SqliteStore {
    fn get_signal(&self, signal_id: &SignalId) -> Result<Option<NormalizedSignal>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM signals WHERE signal_id = ?1",
                params![signal_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }
}

// ============================================================================
// SECTION: Detection Store
// ============================================================================

impl DetectionStore for SqliteStore {
    fn put_detection(
        &self,
        detection: &Detection,
        metadata: &DetectionMetadata,
    ) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO detections \
                 (detection_id, rule_id, service, signal_id, signal_ts, body, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    detection.detection_id.as_str(),
                    detection.rule_id.as_str(),
                    detection.service.as_str(),
                    detection.normalized_signal_id.as_str(),
                    detection.signal_timestamp.as_unix_millis(),
                    snapshot(detection)?,
                    snapshot(metadata)?,
                ],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get_detection(&self, detection_id: &DetectionId) -> Result<Option<Detection>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM detections WHERE detection_id = ?1",
                params![detection_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }

    fn exists(&self, detection_id: &DetectionId) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM detections WHERE detection_id = ?1",
                params![detection_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| io(&err))?;
        Ok(count > 0)
    }

    fn get_detections_by_signal_ids(
        &self,
        signal_ids: &[SignalId],
    ) -> Result<Vec<Detection>, StoreError> {
        let conn = self.locked()?;
        let mut statement = conn
            .prepare("SELECT body FROM detections WHERE signal_id = ?1")
            .map_err(|err| io(&err))?;
        let mut detections = Vec::new();
        for signal_id in signal_ids {
            let rows = statement
                .query_map(params![signal_id.as_str()], |row| row.get::<_, String>(0))
                .map_err(|err| io(&err))?;
            for raw in rows {
                let raw = raw.map_err(|err| io(&err))?;
                detections.push(restore(&raw)?);
            }
        }
        Ok(detections)
    }

    fn query_by_time_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        filter: &PartitionFilter,
        limit: usize,
    ) -> Result<Vec<Detection>, StoreError> {
        let conn = self.locked()?;
        let mut statement = conn
            .prepare(
                "SELECT body FROM detections \
                 WHERE signal_ts >= ?1 AND signal_ts < ?2 \
                 AND (?3 IS NULL OR rule_id = ?3) \
                 AND (?4 IS NULL OR service = ?4) \
                 ORDER BY signal_ts ASC, detection_id ASC \
                 LIMIT ?5",
            )
            .map_err(|err| io(&err))?;
        let rule_id = filter.rule_id.as_ref().map(|rule_id| rule_id.as_str().to_string());
        let service = filter.service.as_ref().map(|service| service.as_str().to_string());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = statement
            .query_map(
                params![start.as_unix_millis(), end.as_unix_millis(), rule_id, service, limit],
                |row| row.get::<_, String>(0),
            )
            .map_err(|err| io(&err))?;
        let mut detections = Vec::new();
        for raw in rows {
            let raw = raw.map_err(|err| io(&err))?;
            detections.push(restore(&raw)?);
        }
        Ok(detections)
    }
}

// ============================================================================
// SECTION: Evidence Store
// ============================================================================

impl EvidenceStore for SqliteStore {
    fn put_graph(&self, graph: &EvidenceGraph) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO evidence_graphs (graph_id, detection_id, body) \
                 VALUES (?1, ?2, ?3)",
                params![graph.graph_id.as_str(), graph.detection_id.as_str(), snapshot(graph)?],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get_graph(&self, graph_id: &GraphId) -> Result<Option<EvidenceGraph>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM evidence_graphs WHERE graph_id = ?1",
                params![graph_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }

    fn get_graph_for_detection(
        &self,
        detection_id: &DetectionId,
    ) -> Result<Option<EvidenceGraph>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM evidence_graphs WHERE detection_id = ?1 \
                 ORDER BY graph_id ASC LIMIT 1",
                params![detection_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }

    fn put_bundle(&self, bundle: &EvidenceBundle) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO evidence_bundles (graph_id, body) VALUES (?1, ?2)",
                params![bundle.graph.graph_id.as_str(), snapshot(bundle)?],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get_bundle(&self, graph_id: &GraphId) -> Result<Option<EvidenceBundle>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM evidence_bundles WHERE graph_id = ?1",
                params![graph_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }
}

// ============================================================================
// SECTION: Candidate Store
// ============================================================================

impl CandidateStore for SqliteStore {
    fn put_candidate(&self, candidate: &Candidate) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO candidates (candidate_id, body) VALUES (?1, ?2)",
                params![candidate.candidate_id.as_str(), snapshot(candidate)?],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get_candidate(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM candidates WHERE candidate_id = ?1",
                params![candidate_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }
}

// ============================================================================
// SECTION: Decision and Audit Stores
// ============================================================================

impl DecisionStore for SqliteStore {
    fn put_decision(&self, decision: &PromotionDecision) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO promotion_decisions (decision_id, candidate_id, body) \
                 VALUES (?1, ?2, ?3)",
                params![
                    decision.decision_id.as_str(),
                    decision.candidate_id.as_str(),
                    snapshot(decision)?,
                ],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get_decision(
        &self,
        decision_id: &PromotionDecisionId,
    ) -> Result<Option<PromotionDecision>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM promotion_decisions WHERE decision_id = ?1",
                params![decision_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }

    fn get_decisions_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<PromotionDecision>, StoreError> {
        let conn = self.locked()?;
        let mut statement = conn
            .prepare(
                "SELECT body FROM promotion_decisions WHERE candidate_id = ?1 \
                 ORDER BY decision_id ASC",
            )
            .map_err(|err| io(&err))?;
        let rows = statement
            .query_map(params![candidate_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| io(&err))?;
        let mut decisions = Vec::new();
        for raw in rows {
            let raw = raw.map_err(|err| io(&err))?;
            decisions.push(restore(&raw)?);
        }
        Ok(decisions)
    }
}

impl AuditStore for SqliteStore {
    fn put_audit(&self, record: &PromotionAuditRecord) -> Result<(), StoreError> {
        let conn = self.locked()?;
        conn.execute(
            "INSERT INTO promotion_audit (decision_id, body) VALUES (?1, ?2)",
            params![record.decision_id.as_str(), snapshot(record)?],
        )
        .map_err(|err| io(&err))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Incident Store
// ============================================================================

impl IncidentStore for SqliteStore {
    fn create_incident(
        &self,
        incident: &Incident,
        event: &IncidentEvent,
    ) -> Result<bool, StoreError> {
        let mut conn = self.locked()?;
        let tx = conn.transaction().map_err(|err| io(&err))?;
        let changed = tx
            .execute(
                "INSERT OR IGNORE INTO incidents (incident_id, service, version, body) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    incident.incident_id.as_str(),
                    incident.service.as_str(),
                    i64::try_from(incident.version).unwrap_or(i64::MAX),
                    snapshot(incident)?,
                ],
            )
            .map_err(|err| io(&err))?;
        if changed > 0 {
            tx.execute(
                "INSERT INTO incident_events (incident_id, event_seq, body) VALUES (?1, ?2, ?3)",
                params![
                    event.incident_id.as_str(),
                    i64::try_from(event.event_seq).unwrap_or(i64::MAX),
                    snapshot(event)?,
                ],
            )
            .map_err(|err| io(&err))?;
        }
        tx.commit().map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get_incident(&self, incident_id: &IncidentId) -> Result<Option<Incident>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM incidents WHERE incident_id = ?1",
                params![incident_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }

    fn update_incident(
        &self,
        incident: &Incident,
        event: &IncidentEvent,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.locked()?;
        let tx = conn.transaction().map_err(|err| io(&err))?;
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);
        let changed = tx
            .execute(
                "UPDATE incidents SET version = ?1, body = ?2 \
                 WHERE incident_id = ?3 AND version = ?4",
                params![
                    i64::try_from(incident.version).unwrap_or(i64::MAX),
                    snapshot(incident)?,
                    incident.incident_id.as_str(),
                    expected,
                ],
            )
            .map_err(|err| io(&err))?;
        if changed == 0 {
            let actual: Option<i64> = tx
                .query_row(
                    "SELECT version FROM incidents WHERE incident_id = ?1",
                    params![incident.incident_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| io(&err))?;
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: actual.and_then(|version| u64::try_from(version).ok()).unwrap_or(0),
            });
        }
        tx.execute(
            "INSERT INTO incident_events (incident_id, event_seq, body) VALUES (?1, ?2, ?3)",
            params![
                event.incident_id.as_str(),
                i64::try_from(event.event_seq).unwrap_or(i64::MAX),
                snapshot(event)?,
            ],
        )
        .map_err(|err| io(&err))?;
        tx.commit().map_err(|err| io(&err))?;
        Ok(())
    }

    fn get_events(&self, incident_id: &IncidentId) -> Result<Vec<IncidentEvent>, StoreError> {
        let conn = self.locked()?;
        let mut statement = conn
            .prepare(
                "SELECT body FROM incident_events WHERE incident_id = ?1 ORDER BY event_seq ASC",
            )
            .map_err(|err| io(&err))?;
        let rows = statement
            .query_map(params![incident_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| io(&err))?;
        let mut events = Vec::new();
        for raw in rows {
            let raw = raw.map_err(|err| io(&err))?;
            events.push(restore(&raw)?);
        }
        Ok(events)
    }

    fn query_by_service(&self, service: &ServiceName) -> Result<Vec<Incident>, StoreError> {
        let conn = self.locked()?;
        let mut statement = conn
            .prepare("SELECT body FROM incidents WHERE service = ?1 ORDER BY incident_id ASC")
            .map_err(|err| io(&err))?;
        let rows = statement
            .query_map(params![service.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| io(&err))?;
        let mut incidents = Vec::new();
        for raw in rows {
            let raw = raw.map_err(|err| io(&err))?;
            incidents.push(restore(&raw)?);
        }
        Ok(incidents)
    }
}

// ============================================================================
// SECTION: Outcome Store
// ============================================================================

impl OutcomeStore for SqliteStore {
    fn put_outcome(&self, outcome: &Outcome) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO outcomes (outcome_id, service, closed_at, body) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    outcome.outcome_id.as_str(),
                    outcome.service.as_str(),
                    outcome.closed_at.as_unix_millis(),
                    snapshot(outcome)?,
                ],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get_outcome(&self, outcome_id: &OutcomeId) -> Result<Option<Outcome>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM outcomes WHERE outcome_id = ?1",
                params![outcome_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }

    fn query_by_service_window(
        &self,
        service: &ServiceName,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Outcome>, StoreError> {
        let conn = self.locked()?;
        let mut statement = conn
            .prepare(
                "SELECT body FROM outcomes \
                 WHERE service = ?1 AND closed_at >= ?2 AND closed_at < ?3 \
                 ORDER BY closed_at ASC, outcome_id ASC",
            )
            .map_err(|err| io(&err))?;
        let rows = statement
            .query_map(
                params![service.as_str(), start.as_unix_millis(), end.as_unix_millis()],
                |row| row.get::<_, String>(0),
            )
            .map_err(|err| io(&err))?;
        let mut outcomes = Vec::new();
        for raw in rows {
            let raw = raw.map_err(|err| io(&err))?;
            outcomes.push(restore(&raw)?);
        }
        Ok(outcomes)
    }

    fn put_summary(&self, summary: &ResolutionSummary) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO resolution_summaries (summary_id, body) VALUES (?1, ?2)",
                params![summary.summary_id.as_str(), snapshot(summary)?],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }
}

// ============================================================================
// SECTION: Idempotency Store
// ============================================================================

impl IdempotencyStore for SqliteStore {
    fn claim(&self, record: &IdempotencyRecord) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO idempotency (idempotency_key, status, body) \
                 VALUES (?1, ?2, ?3)",
                params![
                    record.idempotency_key.as_str(),
                    "IN_PROGRESS",
                    snapshot(record)?,
                ],
            )
            .map_err(|err| io(&err))?;
        Ok(changed > 0)
    }

    fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM idempotency WHERE idempotency_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        raw.map(|raw| restore(&raw)).transpose()
    }

    fn complete(
        &self,
        key: &IdempotencyKey,
        response: serde_json::Value,
        completed_at: Timestamp,
    ) -> Result<(), StoreError> {
        let conn = self.locked()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM idempotency WHERE idempotency_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        let mut record: IdempotencyRecord = restore(
            &raw.ok_or_else(|| StoreError::Invalid(format!("unclaimed key: {key}")))?,
        )?;
        record.status = IdempotencyStatus::Completed;
        record.response = Some(response);
        record.completed_at = Some(completed_at);
        conn.execute(
            "UPDATE idempotency SET status = ?1, body = ?2 WHERE idempotency_key = ?3",
            params!["COMPLETED", snapshot(&record)?, key.as_str()],
        )
        .map_err(|err| io(&err))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Attempt Log and Automation Config
// ============================================================================

impl AttemptLog for SqliteStore {
    fn record_attempt(&self, attempt: &OrchestrationAttempt) -> Result<(), StoreError> {
        let conn = self.locked()?;
        conn.execute(
            "INSERT INTO orchestration_attempts (attempted_at, body) VALUES (?1, ?2)",
            params![attempt.attempted_at.as_unix_millis(), snapshot(attempt)?],
        )
        .map_err(|err| io(&err))?;
        Ok(())
    }
}

impl AutomationConfig for SqliteStore {
    fn automation_halted(&self) -> Result<bool, StoreError> {
        let conn = self.locked()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM automation_config WHERE name = ?1",
                params![KILL_SWITCH_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| io(&err))?;
        Ok(value.unwrap_or(0) != 0)
    }
}

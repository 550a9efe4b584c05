// crates/incident-plane-core/src/core/evidence.rs
// ============================================================================
// Module: Incident Plane Evidence Types
// Description: Content-addressed evidence graphs and rolled-up bundles.
// Purpose: Provide by-reference evidence collections for candidates and gates.
// Dependencies: serde, crate::core::{identifiers, signal, time}
// ============================================================================

//! ## Overview
//! Evidence graphs bundle detections and signals by reference, never by copy.
//! Identity is derived from the sorted member id sets, so two builders
//! observing the same members always converge on the same graph. The bundle
//! adds a rolled-up summary safe to hand to downstream consumers; its
//! `bundled_at` is the only timestamp the bundle exposes and doubles as the
//! promotion gate's `evaluated_at` to keep replay stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DetectionId;
use crate::core::identifiers::GraphId;
use crate::core::identifiers::SignalId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Graph
// ============================================================================

/// Node referencing one detection in an evidence graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceNode {
    /// Referenced detection.
    pub detection_id: DetectionId,
    /// Signals referenced by the detection, sorted.
    pub signal_ids: Vec<SignalId>,
}

/// Edge linking two detections that share at least one signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEdge {
    /// Lexically smaller detection of the pair.
    pub from_detection_id: DetectionId,
    /// Lexically larger detection of the pair.
    pub to_detection_id: DetectionId,
    /// Shared signals justifying the edge, sorted.
    pub shared_signal_ids: Vec<SignalId>,
}

/// Content-addressed evidence graph.
///
/// # Invariants
/// - `detection_ids` are sorted; `signal_ids` are deduplicated and sorted.
/// - Ownership is by-reference; the graph never embeds record bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceGraph {
    /// Graph identifier derived from the sorted member sets.
    pub graph_id: GraphId,
    /// Primary detection the graph was built for.
    pub detection_id: DetectionId,
    /// Sorted member detection identifiers.
    pub detection_ids: Vec<DetectionId>,
    /// Sorted unique member signal identifiers.
    pub signal_ids: Vec<SignalId>,
    /// One node per member detection.
    pub nodes: Vec<EvidenceNode>,
    /// Edges between detections sharing a signal.
    pub edges: Vec<EvidenceEdge>,
}

// ============================================================================
// SECTION: Bundle Summary
// ============================================================================

/// Rolled-up summary of a bundle's members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSummary {
    /// Total member detections.
    pub detection_count: usize,
    /// Total unique member signals.
    pub signal_count: usize,
    /// Count of detections per severity label.
    pub severity_distribution: BTreeMap<String, usize>,
    /// Earliest member observation.
    pub earliest_observation: Timestamp,
    /// Latest member observation.
    pub latest_observation: Timestamp,
    /// Distinct rules contributing detections.
    pub unique_rules: usize,
}

/// Evidence graph plus rolled-up summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    /// Underlying graph.
    pub graph: EvidenceGraph,
    /// Rolled-up member summary.
    pub summary: SignalSummary,
    /// Bundling timestamp, the only time the bundle exposes downstream.
    pub bundled_at: Timestamp,
}

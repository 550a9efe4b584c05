// crates/incident-plane-core/src/runtime/evidence.rs
// ============================================================================
// Module: Incident Plane Evidence Builder
// Description: Deterministic construction of evidence graphs and bundles.
// Purpose: Bundle detections and signals into content-addressed collections.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The builder is pure: member detection ids are sorted, signal ids are
//! deduplicated and sorted, and edges link detections sharing a signal with
//! the lexically smaller detection first. Two builders observing the same
//! members always produce the same graph identifier. Storage is a conditional
//! write returning whether this builder was first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::Detection;
use crate::core::DetectionId;
use crate::core::EvidenceBundle;
use crate::core::EvidenceEdge;
use crate::core::EvidenceGraph;
use crate::core::EvidenceNode;
use crate::core::SignalId;
use crate::core::SignalSummary;
use crate::core::Timestamp;
use crate::core::compute_graph_id;
use crate::interfaces::EvidenceStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Evidence builder errors.
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// The builder received no detections.
    #[error("evidence graph requires at least one detection")]
    Empty,
    /// Storage failure; retryable upstream.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Result of storing an evidence graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGraph {
    /// Stored graph.
    pub graph: EvidenceGraph,
    /// True when this call created the record.
    pub is_new: bool,
}

/// Deterministic evidence graph builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceBuilder;

impl EvidenceBuilder {
    /// Creates a new evidence builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds a graph over the given detections for a primary detection.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceError::Empty`] when `detections` is empty.
    pub fn build_graph(
        &self,
        primary: &DetectionId,
        detections: &[Detection],
    ) -> Result<EvidenceGraph, EvidenceError> {
        if detections.is_empty() {
            return Err(EvidenceError::Empty);
        }

        let mut nodes: Vec<EvidenceNode> = detections
            .iter()
            .map(|detection| EvidenceNode {
                detection_id: detection.detection_id.clone(),
                signal_ids: vec![detection.normalized_signal_id.clone()],
            })
            .collect();
        nodes.sort_by(|left, right| left.detection_id.cmp(&right.detection_id));
        nodes.dedup_by(|left, right| left.detection_id == right.detection_id);

        let mut detection_ids: Vec<DetectionId> =
            nodes.iter().map(|node| node.detection_id.clone()).collect();
        detection_ids.sort();

        let mut signal_ids: Vec<SignalId> =
            nodes.iter().flat_map(|node| node.signal_ids.clone()).collect();
        signal_ids.sort();
        signal_ids.dedup();

        let edges = build_edges(&nodes);
        let graph_id = compute_graph_id(&detection_ids, &signal_ids);

        Ok(EvidenceGraph {
            graph_id,
            detection_id: primary.clone(),
            detection_ids,
            signal_ids,
            nodes,
            edges,
        })
    }

    /// Builds a bundle over a graph, rolling up the member summary.
    ///
    /// `bundled_at` is the only timestamp the bundle exposes downstream; the
    /// promotion gate reuses it as its `evaluated_at` to keep replay stable.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceError::Empty`] when `detections` is empty.
    pub fn build_bundle(
        &self,
        graph: EvidenceGraph,
        detections: &[Detection],
        bundled_at: Timestamp,
    ) -> Result<EvidenceBundle, EvidenceError> {
        let first = detections.first().ok_or(EvidenceError::Empty)?;

        let mut severity_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut earliest = first.signal_timestamp;
        let mut latest = first.signal_timestamp;
        let mut rules: Vec<&str> = Vec::new();
        for detection in detections {
            *severity_distribution
                .entry(detection.severity.as_str().to_string())
                .or_insert(0) += 1;
            earliest = earliest.min(detection.signal_timestamp);
            latest = latest.max(detection.signal_timestamp);
            if !rules.contains(&detection.rule_id.as_str()) {
                rules.push(detection.rule_id.as_str());
            }
        }

        let summary = SignalSummary {
            detection_count: graph.detection_ids.len(),
            signal_count: graph.signal_ids.len(),
            severity_distribution,
            earliest_observation: earliest,
            latest_observation: latest,
            unique_rules: rules.len(),
        };

        Ok(EvidenceBundle {
            graph,
            summary,
            bundled_at,
        })
    }

    /// Stores a graph conditionally.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceError::Store`] when the write fails.
    pub fn store_graph(
        &self,
        graph: EvidenceGraph,
        store: &dyn EvidenceStore,
    ) -> Result<StoredGraph, EvidenceError> {
        let is_new = store.put_graph(&graph)?;
        Ok(StoredGraph {
            graph,
            is_new,
        })
    }
}

// ============================================================================
// SECTION: Edge Construction
// ============================================================================

/// Builds edges between detections sharing at least one signal.
fn build_edges(nodes: &[EvidenceNode]) -> Vec<EvidenceEdge> {
    let mut edges = Vec::new();
    for (index, left) in nodes.iter().enumerate() {
        for right in nodes.iter().skip(index + 1) {
            let shared: Vec<SignalId> = left
                .signal_ids
                .iter()
                .filter(|signal| right.signal_ids.contains(signal))
                .cloned()
                .collect();
            if !shared.is_empty() {
                edges.push(EvidenceEdge {
                    from_detection_id: left.detection_id.clone(),
                    to_detection_id: right.detection_id.clone(),
                    shared_signal_ids: shared,
                });
            }
        }
    }
    edges
}

// crates/incident-plane-broker/src/broker.rs
// ============================================================================
// Module: Incident Plane Event Bus
// Description: Fan-out of pipeline events across configured sinks.
// Purpose: Implement the core emitter seam with at-most-once best-effort.
// Dependencies: incident-plane-core, crate::sink
// ============================================================================

//! ## Overview
//! The bus implements [`EventEmitter`] by fanning each event out to every
//! configured sink. A failing sink never prevents delivery to the others.
//! `emit` reports an error only when every sink failed, and even that error
//! is advisory: the pipeline logs and continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use incident_plane_core::EmitError;
use incident_plane_core::EventEmitter;
use incident_plane_core::PipelineEvent;

use crate::sink::Sink;

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// Best-effort event bus over a fixed sink set.
pub struct EventBus {
    /// Configured delivery sinks.
    sinks: Vec<Box<dyn Sink>>,
}

impl EventBus {
    /// Creates a bus with no sinks; every emit becomes a no-op.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
        }
    }

    /// Adds a sink to the fan-out set.
    #[must_use]
    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Returns the number of configured sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: &PipelineEvent) -> Result<(), EmitError> {
        if self.sinks.is_empty() {
            return Ok(());
        }
        let mut delivered = 0usize;
        let mut last_error = None;
        for sink in &self.sinks {
            match sink.deliver(event) {
                Ok(()) => delivered += 1,
                Err(err) => last_error = Some(err.to_string()),
            }
        }
        if delivered == 0 {
            Err(EmitError::Emit(
                last_error.unwrap_or_else(|| "all sinks failed".to_string()),
            ))
        } else {
            Ok(())
        }
    }
}

// crates/incident-plane-broker/src/sink/mod.rs
// ============================================================================
// Module: Incident Plane Event Sinks
// Description: Delivery sinks for pipeline events.
// Purpose: Route events to logs, channels, or callbacks without hard deps.
// Dependencies: incident-plane-core, serde_json, std
// ============================================================================

//! ## Overview
//! Sinks are the delivery edge of the broker. Each sink receives a fully
//! serializable event and either delivers it or reports a sink error; the
//! broker treats sink failure as observability loss, never as pipeline
//! failure. The log sink writes one JSON record per line, the channel sink
//! feeds an in-process consumer, and the callback sink adapts arbitrary
//! handlers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::sync::mpsc::SyncSender;

use incident_plane_core::PipelineEvent;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sink delivery errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing a log record failed.
    #[error("log write failed: {0}")]
    LogWriteFailed(String),
    /// The channel consumer is gone or saturated.
    #[error("channel delivery failed: {0}")]
    ChannelClosed(String),
    /// A callback handler reported failure.
    #[error("callback delivery failed: {0}")]
    CallbackFailed(String),
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Delivery sink for pipeline events.
pub trait Sink: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when delivery fails; the broker logs and moves on.
    fn deliver(&self, event: &PipelineEvent) -> Result<(), SinkError>;
}

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// JSON-lines log sink.
pub struct LogSink<W: Write + Send> {
    /// Output writer for log records.
    writer: Mutex<W>,
    /// Emitting component name stamped on each record.
    component: String,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a log sink with the default component name.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            component: "incident-plane".to_string(),
        }
    }

    /// Creates a log sink with a custom component name.
    pub fn with_component(writer: W, component: impl Into<String>) -> Self {
        Self {
            writer: Mutex::new(writer),
            component: component.into(),
        }
    }
}

impl<W: Write + Send> Sink for LogSink<W> {
    fn deliver(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        let record = json!({
            "component": self.component,
            "event": event,
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::LogWriteFailed("log writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        guard.write_all(b"\n").map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}

// ============================================================================
// SECTION: Channel Sink
// ============================================================================

/// Bounded channel sink for in-process consumers.
pub struct ChannelSink {
    /// Sending half of the consumer channel.
    sender: SyncSender<PipelineEvent>,
}

impl ChannelSink {
    /// Creates a channel sink over a bounded sender.
    #[must_use]
    pub const fn new(sender: SyncSender<PipelineEvent>) -> Self {
        Self {
            sender,
        }
    }
}

impl Sink for ChannelSink {
    fn deliver(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        self.sender
            .try_send(event.clone())
            .map_err(|err| SinkError::ChannelClosed(err.to_string()))
    }
}

// ============================================================================
// SECTION: Callback Sink
// ============================================================================

/// Callback adapter sink.
pub struct CallbackSink {
    /// Handler invoked per event.
    handler: Box<dyn Fn(&PipelineEvent) -> Result<(), String> + Send + Sync>,
}

impl CallbackSink {
    /// Creates a callback sink from a handler.
    pub fn new(
        handler: impl Fn(&PipelineEvent) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }
}

impl Sink for CallbackSink {
    fn deliver(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        (self.handler)(event).map_err(SinkError::CallbackFailed)
    }
}

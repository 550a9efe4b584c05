// crates/incident-plane-broker/src/lib.rs
// ============================================================================
// Module: Incident Plane Broker Library
// Description: Best-effort pub/sub fan-out for pipeline events.
// Purpose: Deliver observability events without ever gating the pipeline.
// Dependencies: incident-plane-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The broker fans pipeline events out to configured sinks. Delivery is
//! at-most-once best-effort: a failing sink is skipped, the rest still
//! receive the event, and the pipeline never reads events back for
//! correctness — storage is the source of truth.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broker;
pub mod sink;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::EventBus;
pub use sink::CallbackSink;
pub use sink::ChannelSink;
pub use sink::LogSink;
pub use sink::Sink;
pub use sink::SinkError;

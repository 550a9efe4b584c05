// crates/incident-plane-http/src/lib.rs
// ============================================================================
// Module: Incident Plane HTTP Library
// Description: Thin controller surface over the deterministic core.
// Purpose: Expose routing, configuration, and the wire error taxonomy.
// Dependencies: axum, incident-plane-core, incident-plane-rules
// ============================================================================

//! ## Overview
//! The HTTP crate adapts wire requests onto the core: idempotency keys come
//! from the `Idempotency-Key` header or deterministic derivation, the wall
//! clock is injected here and only here, and failures map onto a small,
//! stable error taxonomy that never leaks internal error text.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod error;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::ServerConfig;
pub use error::ApiError;
pub use error::ErrorBody;
pub use server::AppState;
pub use server::router;

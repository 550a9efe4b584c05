// crates/incident-plane-http/src/main.rs
// ============================================================================
// Module: Incident Plane Server Binary
// Description: Startup wiring for the controller surface.
// Purpose: Load config, freeze the catalog, open storage, and serve.
// Dependencies: incident-plane-http, tokio
// ============================================================================

//! ## Overview
//! The binary wires the frozen rule catalog, the SQLite store, and the event
//! bus into the controller router and serves it. Configuration comes from a
//! TOML path passed as the first argument.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use incident_plane_broker::EventBus;
use incident_plane_broker::LogSink;
use incident_plane_core::AuthorityRateLimiter;
use incident_plane_core::IncidentManager;
use incident_plane_core::Orchestrator;
use incident_plane_core::OutcomeRecorder;
use incident_plane_core::runtime::RateLimitConfig;
use incident_plane_http::AppState;
use incident_plane_http::ServerConfig;
use incident_plane_http::router;
use incident_plane_rules::load_catalog;
use incident_plane_store_sqlite::SqliteStore;
use incident_plane_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Loads configuration and serves the controller surface.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: incident-plane-http <config.toml>")?;
    let config = ServerConfig::load(&config_path)?;

    let catalog = Arc::new(load_catalog(&config.catalog_dir)?);
    let store = Arc::new(SqliteStore::open(&config.database, &SqliteStoreConfig::default())?);

    let mut bus = EventBus::new();
    if let Some(event_log) = &config.event_log {
        let writer = OpenOptions::new().create(true).append(true).open(event_log)?;
        bus = bus.with_sink(LogSink::new(writer));
    }
    let bus = Arc::new(bus);

    let manager = match &config.rate_limit {
        Some(settings) => IncidentManager::with_limiter(AuthorityRateLimiter::new(RateLimitConfig {
            burst: settings.burst,
            refill_per_second: settings.refill_per_second,
            ..RateLimitConfig::default()
        })),
        None => IncidentManager::new(),
    };

    let state = Arc::new(AppState {
        store,
        catalog,
        bus,
        orchestrator: Orchestrator::new(IncidentManager::new()),
        manager,
        recorder: OutcomeRecorder::new(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

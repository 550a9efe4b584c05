// crates/incident-plane-store-sqlite/src/lib.rs
// ============================================================================
// Module: Incident Plane SQLite Store Library
// Description: Durable storage adaptor over SQLite WAL.
// Purpose: Implement the core storage capabilities for single-node deployments.
// Dependencies: incident-plane-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate adapts the core storage capability set onto `SQLite`. Records
//! persist as canonical JSON snapshots beside indexed key columns; conditional
//! puts map to `INSERT OR IGNORE`, and incident updates are version-checked
//! inside a transaction so a lost update surfaces as a conflict, never a
//! silent overwrite.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;

// crates/incident-plane-http/src/config.rs
// ============================================================================
// Module: HTTP Server Configuration
// Description: Strict TOML configuration for the controller surface.
// Purpose: Fail fast on unknown or malformed configuration at startup.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Server configuration loads from a TOML file with unknown fields rejected.
//! The catalog directory and database path are required; rate limiting is
//! optional and defaults to off.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("config read failed at {path}: {reason}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// Parsing or validating the file failed.
    #[error("config invalid at {path}: {reason}")]
    Invalid {
        /// Offending path.
        path: PathBuf,
        /// Parser or validation message.
        reason: String,
    },
}

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Rate limiter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSettings {
    /// Maximum tokens a bucket can hold.
    pub burst: u32,
    /// Tokens refilled per second.
    pub refill_per_second: f64,
}

/// Controller surface configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address, for example `127.0.0.1:8080`.
    pub bind: String,
    /// Rule catalog directory.
    pub catalog_dir: PathBuf,
    /// SQLite database path.
    pub database: PathBuf,
    /// Optional event log path for the JSON-lines sink.
    #[serde(default)]
    pub event_log: Option<PathBuf>,
    /// Optional authority rate limiting.
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

impl ServerConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|err| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        if config.bind.is_empty() {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "bind must not be empty".to_string(),
            });
        }
        Ok(config)
    }
}

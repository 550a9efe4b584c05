// crates/incident-plane-rules/src/loader.rs
// ============================================================================
// Module: Incident Plane Catalog Loader
// Description: Filesystem loading of versioned rule documents.
// Purpose: Fail fast on any schema violation before the catalog freezes.
// Dependencies: incident-plane-core, serde_json
// ============================================================================

//! ## Overview
//! A catalog directory holds one JSON document per rule under three
//! subdirectories: `detection/`, `correlation/`, and `policy/`. Filenames
//! encode identity as `{id}.v{version}.json` and must agree with the
//! document body; any parse failure, identity mismatch, duplicate, or rule
//! validation error aborts the load. The returned catalog is frozen for the
//! process lifetime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use incident_plane_core::CorrelationRule;
use incident_plane_core::DetectionRule;
use incident_plane_core::PromotionPolicy;
use incident_plane_core::RuleError;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::catalog::RuleCatalog;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Subdirectory holding detection rules.
const DETECTION_DIR: &str = "detection";
/// Subdirectory holding correlation rules.
const CORRELATION_DIR: &str = "correlation";
/// Subdirectory holding promotion policies.
const POLICY_DIR: &str = "policy";
/// Required rule document extension.
const RULE_EXTENSION: &str = "json";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Catalog loading errors; any of these aborts startup.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Filesystem failure while reading the catalog.
    #[error("catalog io error at {path}: {reason}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// Filename does not follow `{id}.v{version}.json`.
    #[error("malformed rule filename: {path}")]
    Filename {
        /// Offending path.
        path: PathBuf,
    },
    /// Document body failed to parse.
    #[error("malformed rule document at {path}: {reason}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Parser error message.
        reason: String,
    },
    /// Filename identity disagrees with the document body.
    #[error("rule identity mismatch at {path}: filename says {expected}, body says {actual}")]
    IdentityMismatch {
        /// Offending path.
        path: PathBuf,
        /// Identity encoded in the filename.
        expected: String,
        /// Identity found in the body.
        actual: String,
    },
    /// Two documents share an `id@version`.
    #[error("duplicate rule: {key}")]
    Duplicate {
        /// Duplicated `id@version` key.
        key: String,
    },
    /// Rule failed schema validation.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Loads and validates a rule catalog from a directory.
///
/// # Errors
///
/// Returns [`CatalogError`] on the first violation; a partially valid
/// catalog is never returned.
pub fn load_catalog(root: &Path) -> Result<RuleCatalog, CatalogError> {
    let mut detection_rules: Vec<DetectionRule> = Vec::new();
    let mut seen = Vec::new();
    for (path, rule) in load_kind::<DetectionRule>(&root.join(DETECTION_DIR))? {
        let (file_id, file_version) = parse_filename(&path)?;
        check_identity(&path, &file_id, &file_version, rule.rule_id.as_str(), rule.rule_version.as_str())?;
        rule.validate()?;
        push_unique(&mut seen, file_id, file_version)?;
        detection_rules.push(rule);
    }

    let mut correlation_rules: Vec<CorrelationRule> = Vec::new();
    let mut seen = Vec::new();
    for (path, rule) in load_kind::<CorrelationRule>(&root.join(CORRELATION_DIR))? {
        let (file_id, file_version) = parse_filename(&path)?;
        check_identity(&path, &file_id, &file_version, rule.rule_id.as_str(), rule.rule_version.as_str())?;
        rule.validate()?;
        push_unique(&mut seen, file_id, file_version)?;
        correlation_rules.push(rule);
    }

    let mut policies: Vec<PromotionPolicy> = Vec::new();
    let mut seen = Vec::new();
    for (path, policy) in load_kind::<PromotionPolicy>(&root.join(POLICY_DIR))? {
        let (file_id, file_version) = parse_filename(&path)?;
        check_identity(
            &path,
            &file_id,
            &file_version,
            policy.policy_id.as_str(),
            policy.policy_version.as_str(),
        )?;
        policy.validate()?;
        push_unique(&mut seen, file_id, file_version)?;
        policies.push(policy);
    }

    Ok(RuleCatalog::new(detection_rules, correlation_rules, policies))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads every rule document of one kind from a directory.
///
/// A missing directory yields an empty set; deployments may omit kinds.
fn load_kind<T: DeserializeOwned>(dir: &Path) -> Result<Vec<(PathBuf, T)>, CatalogError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|err| CatalogError::Io {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| CatalogError::Io {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == RULE_EXTENSION) {
            paths.push(path);
        }
    }
    // Deterministic load order regardless of directory iteration order.
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = fs::read_to_string(&path).map_err(|err| CatalogError::Io {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        let document: T = serde_json::from_str(&raw).map_err(|err| CatalogError::Parse {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        documents.push((path, document));
    }
    Ok(documents)
}

/// Parses `{id}.v{version}.json` into its identity components.
fn parse_filename(path: &Path) -> Result<(String, String), CatalogError> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| CatalogError::Filename {
            path: path.to_path_buf(),
        })?;
    let Some((id, version)) = stem.rsplit_once(".v") else {
        return Err(CatalogError::Filename {
            path: path.to_path_buf(),
        });
    };
    if id.is_empty() || version.is_empty() {
        return Err(CatalogError::Filename {
            path: path.to_path_buf(),
        });
    }
    Ok((id.to_string(), version.to_string()))
}

/// Verifies filename identity against the document body.
fn check_identity(
    path: &Path,
    file_id: &str,
    file_version: &str,
    body_id: &str,
    body_version: &str,
) -> Result<(), CatalogError> {
    if file_id == body_id && file_version == body_version {
        Ok(())
    } else {
        Err(CatalogError::IdentityMismatch {
            path: path.to_path_buf(),
            expected: format!("{file_id}@{file_version}"),
            actual: format!("{body_id}@{body_version}"),
        })
    }
}

/// Tracks seen identities and rejects duplicates.
fn push_unique(
    seen: &mut Vec<String>,
    id: String,
    version: String,
) -> Result<(), CatalogError> {
    let key = format!("{id}@{version}");
    if seen.contains(&key) {
        return Err(CatalogError::Duplicate {
            key,
        });
    }
    seen.push(key);
    Ok(())
}

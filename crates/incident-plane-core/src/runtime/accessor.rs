// crates/incident-plane-core/src/runtime/accessor.rs
// ============================================================================
// Module: Incident Plane Field Accessor
// Description: Safe path navigation over dynamic JSON signal payloads.
// Purpose: Resolve rule field paths without ever raising on missing data.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Rule conditions address signal fields by string path: `prop`,
//! `prop.nested`, and `prop[index]` in any combination. The accessor is a
//! fold over the JSON value tree returning `None` for any missing or
//! mistyped step; a missing path is an ordinary evaluation outcome, never an
//! error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// SECTION: Path Segments
// ============================================================================

/// Single parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Object key lookup.
    Key(String),
    /// Array index lookup.
    Index(usize),
}

/// Parses a path string into segments, or `None` when malformed.
fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }
        let mut rest = part;
        // Leading identifier before any bracket.
        if let Some(bracket) = rest.find('[') {
            let head = &rest[..bracket];
            if head.is_empty() {
                return None;
            }
            segments.push(Segment::Key(head.to_string()));
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']')?;
                let index: usize = stripped[..close].parse().ok()?;
                segments.push(Segment::Index(index));
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                return None;
            }
        } else {
            segments.push(Segment::Key(rest.to_string()));
        }
    }
    Some(segments)
}

// ============================================================================
// SECTION: Accessor
// ============================================================================

/// Resolves a field path against a JSON value.
///
/// Returns `None` when the path is malformed, a step is missing, or a step
/// type does not match (index into an object, key into an array).
#[must_use]
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path)?;
    let mut current = value;
    for segment in &segments {
        current = match segment {
            Segment::Key(key) => current.as_object()?.get(key)?,
            Segment::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

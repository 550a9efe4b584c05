// crates/incident-plane-rules/src/catalog.rs
// ============================================================================
// Module: Incident Plane Rule Catalog
// Description: Frozen in-memory rule maps with a signal-type pre-index.
// Purpose: Serve versioned rules without mutation after startup.
// Dependencies: incident-plane-core
// ============================================================================

//! ## Overview
//! The catalog keys every rule by `ruleId@version`. A signal-type pre-index
//! accelerates detection applicability pruning, but it is a filter only:
//! final applicability is always decided by evaluating the full signal
//! matcher. The catalog implements [`PolicyCatalog`] so the promotion engine
//! can load exact policy versions through the core capability seam.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use incident_plane_core::CorrelationRule;
use incident_plane_core::DetectionRule;
use incident_plane_core::PolicyId;
use incident_plane_core::PolicyVersion;
use incident_plane_core::PromotionPolicy;
use incident_plane_core::RuleId;
use incident_plane_core::RuleVersion;
use incident_plane_core::StoreError;
use incident_plane_core::interfaces::PolicyCatalog;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Builds the `ruleId@version` map key.
fn versioned_key(id: &str, version: &str) -> String {
    format!("{id}@{version}")
}

/// Frozen rule catalog loaded once at startup.
#[derive(Debug, Default)]
pub struct RuleCatalog {
    /// Detection rules keyed by `ruleId@version`.
    detection_rules: BTreeMap<String, DetectionRule>,
    /// Correlation rules keyed by `ruleId@version`.
    correlation_rules: BTreeMap<String, CorrelationRule>,
    /// Promotion policies keyed by `policyId@version`.
    policies: BTreeMap<String, PromotionPolicy>,
    /// Detection rule keys grouped by accepted signal type. Rules with an
    /// unconstrained matcher appear under the empty string.
    by_signal_type: BTreeMap<String, Vec<String>>,
}

impl RuleCatalog {
    /// Builds a catalog from validated rules.
    #[must_use]
    pub fn new(
        detection_rules: Vec<DetectionRule>,
        correlation_rules: Vec<CorrelationRule>,
        policies: Vec<PromotionPolicy>,
    ) -> Self {
        let mut catalog = Self::default();
        for rule in detection_rules {
            let key = versioned_key(rule.rule_id.as_str(), rule.rule_version.as_str());
            if rule.signal_matcher.signal_types.is_empty() {
                catalog.by_signal_type.entry(String::new()).or_default().push(key.clone());
            } else {
                for signal_type in &rule.signal_matcher.signal_types {
                    catalog
                        .by_signal_type
                        .entry(signal_type.clone())
                        .or_default()
                        .push(key.clone());
                }
            }
            catalog.detection_rules.insert(key, rule);
        }
        for rule in correlation_rules {
            let key = versioned_key(rule.rule_id.as_str(), rule.rule_version.as_str());
            catalog.correlation_rules.insert(key, rule);
        }
        for policy in policies {
            let key = versioned_key(policy.policy_id.as_str(), policy.policy_version.as_str());
            catalog.policies.insert(key, policy);
        }
        catalog
    }

    /// Loads a detection rule by exact coordinates.
    #[must_use]
    pub fn load_rule(&self, rule_id: &RuleId, version: &RuleVersion) -> Option<&DetectionRule> {
        self.detection_rules.get(&versioned_key(rule_id.as_str(), version.as_str()))
    }

    /// Returns the newest version of a detection rule.
    ///
    /// Tooling only: evaluation paths must load exact versions or replay
    /// determinism breaks.
    #[must_use]
    pub fn load_latest(&self, rule_id: &RuleId) -> Option<&DetectionRule> {
        self.detection_rules
            .values()
            .filter(|rule| &rule.rule_id == rule_id)
            .max_by(|left, right| {
                semver_order(left.rule_version.as_str(), right.rule_version.as_str())
            })
    }

    /// Returns candidate detection rules for a signal type.
    ///
    /// This is the pre-index filter: callers must still evaluate the full
    /// signal matcher before treating a rule as applicable.
    #[must_use]
    pub fn detection_rules_for_signal_type(&self, signal_type: &str) -> Vec<&DetectionRule> {
        let mut keys: Vec<&String> = Vec::new();
        if let Some(exact) = self.by_signal_type.get(signal_type) {
            keys.extend(exact);
        }
        if let Some(unconstrained) = self.by_signal_type.get("") {
            keys.extend(unconstrained);
        }
        keys.sort();
        keys.dedup();
        keys.into_iter().filter_map(|key| self.detection_rules.get(key)).collect()
    }

    /// Loads a correlation rule by exact coordinates.
    #[must_use]
    pub fn load_correlation_rule(
        &self,
        rule_id: &RuleId,
        version: &RuleVersion,
    ) -> Option<&CorrelationRule> {
        self.correlation_rules.get(&versioned_key(rule_id.as_str(), version.as_str()))
    }

    /// Returns every enabled correlation rule in key order.
    #[must_use]
    pub fn enabled_correlation_rules(&self) -> Vec<&CorrelationRule> {
        self.correlation_rules.values().filter(|rule| rule.enabled).collect()
    }

    /// Returns the number of loaded rules across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detection_rules.len() + self.correlation_rules.len() + self.policies.len()
    }

    /// Returns true when the catalog holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PolicyCatalog for RuleCatalog {
    fn load_policy(
        &self,
        policy_id: &PolicyId,
        policy_version: &PolicyVersion,
    ) -> Result<Option<PromotionPolicy>, StoreError> {
        Ok(self
            .policies
            .get(&versioned_key(policy_id.as_str(), policy_version.as_str()))
            .cloned())
    }
}

// ============================================================================
// SECTION: Version Ordering
// ============================================================================

/// Orders semver strings numerically by component.
fn semver_order(left: &str, right: &str) -> std::cmp::Ordering {
    let parse = |version: &str| -> Vec<u64> {
        version.split('.').map(|part| part.parse().unwrap_or(0)).collect()
    };
    parse(left).cmp(&parse(right))
}

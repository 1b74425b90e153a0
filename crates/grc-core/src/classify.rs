//! Scope classification: which types are snapshotted, and under whom.
//!
//! All predicates are total: unknown or empty type names classify as `false`.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::object::GovernedObject;

/// Types whose mappings into an audit scope are captured as snapshots.
const SNAPSHOT_MODELS: &[&str] = &[
  "AccessGroup",
  "Clause",
  "Contract",
  "Control",
  "DataAsset",
  "Facility",
  "Market",
  "Objective",
  "OrgGroup",
  "Policy",
  "Process",
  "Product",
  "Project",
  "Regulation",
  "Requirement",
  "Risk",
  "Standard",
  "System",
  "Threat",
  "Vendor",
];

/// Scope containers that own snapshots rather than live mappings.
const SNAPSHOT_PARENTS: &[&str] = &["Audit"];

/// Types that only exist inside an audit's scope and are never snapshotted.
const AUDIT_SCOPE_MODELS: &[&str] = &["Assessment", "AssessmentTemplate"];

/// Type sets driving [`ScopeClassifier`]; every field falls back to the
/// built-in list when omitted from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
  pub snapshot_models:    Vec<String>,
  pub snapshot_parents:   Vec<String>,
  pub audit_scope_models: Vec<String>,
}

impl Default for ScopeConfig {
  fn default() -> Self {
    let owned = |names: &[&str]| names.iter().map(|s| (*s).to_owned()).collect();
    Self {
      snapshot_models:    owned(SNAPSHOT_MODELS),
      snapshot_parents:   owned(SNAPSHOT_PARENTS),
      audit_scope_models: owned(AUDIT_SCOPE_MODELS),
    }
  }
}

#[derive(Debug, Clone)]
pub struct ScopeClassifier {
  snapshot_models:    BTreeSet<String>,
  snapshot_parents:   BTreeSet<String>,
  audit_scope_models: BTreeSet<String>,
}

impl Default for ScopeClassifier {
  fn default() -> Self { Self::new(ScopeConfig::default()) }
}

impl ScopeClassifier {
  pub fn new(config: ScopeConfig) -> Self {
    Self {
      snapshot_models:    config.snapshot_models.into_iter().collect(),
      snapshot_parents:   config.snapshot_parents.into_iter().collect(),
      audit_scope_models: config.audit_scope_models.into_iter().collect(),
    }
  }

  pub fn is_snapshot_model(&self, type_name: &str) -> bool {
    self.snapshot_models.contains(type_name)
  }

  pub fn is_snapshot_parent(&self, type_name: &str) -> bool {
    self.snapshot_parents.contains(type_name)
  }

  pub fn is_audit_scope_model(&self, type_name: &str) -> bool {
    self.audit_scope_models.contains(type_name)
  }

  /// Whether mapping `child_type` under `parent_type` must go through a
  /// snapshot instead of a live mapping.
  pub fn is_snapshot_related(&self, parent_type: &str, child_type: &str) -> bool {
    (self.is_snapshot_parent(parent_type) || self.is_audit_scope_model(parent_type))
      && self.is_snapshot_model(child_type)
  }

  /// Snapshots and bare revisions are both frozen captures.
  pub fn is_snapshot(&self, instance: &GovernedObject) -> bool {
    matches!(instance, GovernedObject::Snapshot(_) | GovernedObject::Revision(_))
  }
}

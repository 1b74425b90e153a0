//! Model registry and parent-URL resolution.

use std::collections::HashMap;

use serde::Serialize;

use crate::snapshot::Snapshot;

/// What the core needs to know about a model type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
  pub name:                         String,
  /// URL segment, e.g. `controls` for `Control`. Empty when unregistered.
  pub plural:                       String,
  /// Whether instances expose a `last_assessment_date`.
  pub supports_related_assessments: bool,
}

impl ModelInfo {
  pub fn new(name: impl Into<String>, plural: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      plural: plural.into(),
      supports_related_assessments: false,
    }
  }

  pub fn with_related_assessments(mut self) -> Self {
    self.supports_related_assessments = true;
    self
  }

  /// Placeholder for a type nobody registered.
  pub fn unregistered(name: impl Into<String>) -> Self {
    Self::new(name, String::new())
  }
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
  models: HashMap<String, ModelInfo>,
}

impl ModelRegistry {
  pub fn new() -> Self { Self::default() }

  /// The registry of every model type the application ships with.
  pub fn standard() -> Self {
    let mut registry = Self::new();
    let plain = [
      ("AccessGroup", "access_groups"),
      ("Assessment", "assessments"),
      ("AssessmentTemplate", "assessment_templates"),
      ("Audit", "audits"),
      ("Clause", "clauses"),
      ("Contract", "contracts"),
      ("DataAsset", "data_assets"),
      ("Facility", "facilities"),
      ("Issue", "issues"),
      ("Market", "markets"),
      ("OrgGroup", "org_groups"),
      ("Person", "people"),
      ("Policy", "policies"),
      ("Process", "processes"),
      ("Product", "products"),
      ("Program", "programs"),
      ("Project", "projects"),
      ("Regulation", "regulations"),
      ("Requirement", "requirements"),
      ("Risk", "risks"),
      ("Standard", "standards"),
      ("System", "systems"),
      ("Threat", "threats"),
      ("Vendor", "vendors"),
    ];
    for (name, plural) in plain {
      registry.register(ModelInfo::new(name, plural));
    }
    registry.register(ModelInfo::new("Control", "controls").with_related_assessments());
    registry
      .register(ModelInfo::new("Objective", "objectives").with_related_assessments());
    registry
  }

  pub fn register(&mut self, info: ModelInfo) {
    self.models.insert(info.name.clone(), info);
  }

  pub fn resolve(&self, type_name: &str) -> Option<&ModelInfo> {
    self.models.get(type_name)
  }

  /// Like [`resolve`](Self::resolve), but never fails.
  pub fn resolve_or_unregistered(&self, type_name: &str) -> ModelInfo {
    self
      .resolve(type_name)
      .cloned()
      .unwrap_or_else(|| ModelInfo::unregistered(type_name))
  }

  /// `/{plural}/{id}` for an object of `type_name`.
  ///
  /// An unregistered type yields `//{id}`; callers render that as "no link"
  /// rather than treating it as an error.
  pub fn url_for(&self, type_name: &str, id: i64) -> String {
    let plural = self.resolve(type_name).map_or("", |m| m.plural.as_str());
    format!("/{plural}/{id}")
  }

  /// Canonical view URL of the original object behind `snapshot`.
  pub fn parent_url(&self, snapshot: &Snapshot) -> String {
    self.url_for(&snapshot.child_type, snapshot.child_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_for_registered_type() {
    let registry = ModelRegistry::standard();
    assert_eq!(registry.url_for("Control", 55), "/controls/55");
    assert_eq!(registry.url_for("Control", 55), registry.url_for("Control", 55));
    assert_eq!(registry.url_for("Policy", 3), "/policies/3");
  }

  #[test]
  fn url_for_unregistered_type_is_malformed_not_fatal() {
    let registry = ModelRegistry::new();
    assert_eq!(registry.url_for("Control", 55), "//55");
  }

  #[test]
  fn related_assessment_support() {
    let registry = ModelRegistry::standard();
    assert!(registry.resolve("Control").unwrap().supports_related_assessments);
    assert!(!registry.resolve("Risk").unwrap().supports_related_assessments);
    assert_eq!(registry.resolve_or_unregistered("Gadget").plural, "");
  }
}

//! The permission predicate consumed by the core.
//!
//! The core never fails on a denied permission; it degrades the affordances it
//! computes (`can_read`, `can_get_latest_revision`, ...).

use serde::Deserialize;
use strum::{Display, EnumString};

use crate::object::ObjectRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Read,
  Update,
}

/// Synchronous, side-effect-free permission check for the current user.
pub trait Permissions: Send + Sync {
  fn is_allowed(&self, action: Action, resource: &ObjectRef) -> bool;
}

impl<P: Permissions + ?Sized> Permissions for &P {
  fn is_allowed(&self, action: Action, resource: &ObjectRef) -> bool {
    (**self).is_allowed(action, resource)
  }
}

impl<P: Permissions + ?Sized> Permissions for std::sync::Arc<P> {
  fn is_allowed(&self, action: Action, resource: &ObjectRef) -> bool {
    (**self).is_allowed(action, resource)
  }
}

/// Grants everything except the listed types.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TypePolicy {
  /// Types the user may not read (and therefore not update).
  pub unreadable_types: Vec<String>,
  /// Types the user may read but not update.
  pub read_only_types:  Vec<String>,
}

impl Permissions for TypePolicy {
  fn is_allowed(&self, action: Action, resource: &ObjectRef) -> bool {
    let listed = |types: &[String]| types.iter().any(|t| *t == resource.type_name);
    match action {
      Action::Read => !listed(&self.unreadable_types),
      Action::Update => {
        !listed(&self.unreadable_types) && !listed(&self.read_only_types)
      }
    }
  }
}

//! Role catalog and role-group derivation.
//!
//! A role group is the UI-level aggregate of every ACL entry sharing a role,
//! resolved against the role catalog for the object's type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::object::{Governed, PersonRef};

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A role definition scoped to an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub id:          i64,
  pub name:        String,
  pub object_type: String,
  #[serde(default)]
  pub mandatory:   bool,
}

/// Input to [`crate::store::ObjectStore::add_role`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
  pub name:        String,
  pub object_type: String,
  #[serde(default)]
  pub mandatory:   bool,
}

/// The global role catalog, fully loaded before any grouping runs.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
  roles: Vec<Role>,
}

impl RoleCatalog {
  pub fn new(roles: Vec<Role>) -> Self { Self { roles } }

  /// Roles defined for `type_name`, in catalog order.
  pub fn roles_for_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Role> {
    self.roles.iter().filter(move |r| r.object_type == type_name)
  }

  pub fn find(&self, role_id: i64) -> Option<&Role> {
    self.roles.iter().find(|r| r.id == role_id)
  }

  pub fn roles(&self) -> &[Role] { &self.roles }
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleGroup {
  pub title:            String,
  pub group_id:         i64,
  pub people:           Vec<PersonRef>,
  pub required:         bool,
  pub single_user_role: bool,
}

impl RoleGroup {
  pub fn contains(&self, person_id: i64) -> bool {
    self.people.iter().any(|p| p.id == person_id)
  }
}

/// Role-name filters and ordering hint for [`RoleGroupBuilder::get_role_list`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleListOptions {
  pub include: Vec<String>,
  pub exclude: Vec<String>,
  pub order:   Vec<String>,
}

impl RoleListOptions {
  fn keeps(&self, name: &str) -> bool {
    let listed = |names: &[String]| names.iter().any(|n| n == name);
    match (self.include.is_empty(), self.exclude.is_empty()) {
      (false, false) => listed(&self.include) && !listed(&self.exclude),
      (false, true) => listed(&self.include),
      (true, false) => !listed(&self.exclude),
      (true, true) => true,
    }
  }
}

/// Role-name sets that change assignment semantics.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AclConfig {
  /// Roles holding at most one person; assigning replaces.
  pub single_user_roles: Vec<String>,
  /// Roles that must never share a person on one object.
  pub conflict_roles:    Vec<String>,
}

impl Default for AclConfig {
  fn default() -> Self {
    Self {
      single_user_roles: vec!["Assignee".into(), "Verifier".into()],
      conflict_roles:    vec!["Assignees".into(), "Verifiers".into()],
    }
  }
}

pub struct RoleGroupBuilder<'a> {
  catalog:           &'a RoleCatalog,
  single_user_roles: &'a [String],
}

impl<'a> RoleGroupBuilder<'a> {
  pub fn new(catalog: &'a RoleCatalog, config: &'a AclConfig) -> Self {
    Self { catalog, single_user_roles: &config.single_user_roles }
  }

  /// Derive the ordered role groups of `instance`.
  ///
  /// Required groups sort first, preserving catalog order among equals. A
  /// non-empty `order` hint then runs a positional swap pass: the role named
  /// at index `i` trades places with whatever sits at `i`. Earlier swaps can
  /// displace roles placed by later entries; that is the established
  /// behaviour and callers rely on it.
  pub fn get_role_list<G: Governed + ?Sized>(
    &self,
    instance: Option<&G>,
    options: &RoleListOptions,
  ) -> Vec<RoleGroup> {
    let Some(instance) = instance else {
      return Vec::new();
    };
    let by_role = people_by_role(instance);

    let mut groups: Vec<RoleGroup> = self
      .catalog
      .roles_for_type(instance.type_name())
      .filter(|role| options.keeps(&role.name))
      .map(|role| RoleGroup {
        title:            role.name.clone(),
        group_id:         role.id,
        people:           by_role.get(&role.id).cloned().unwrap_or_default(),
        required:         role.mandatory,
        single_user_role: self.single_user_roles.iter().any(|n| *n == role.name),
      })
      .collect();

    groups.sort_by_key(|g| !g.required);

    for (index, name) in options.order.iter().enumerate() {
      if index >= groups.len() {
        break;
      }
      if let Some(current) = groups.iter().position(|g| g.title == *name)
        && current != index
      {
        groups.swap(index, current);
      }
    }

    groups
  }
}

/// Re-derive each group's `people` from `instance`'s current ACL without
/// rebuilding the groups.
pub fn refresh_people_in_groups<G: Governed + ?Sized>(instance: &G, groups: &mut [RoleGroup]) {
  let mut by_role = people_by_role(instance);
  for group in groups {
    group.people = by_role.remove(&group.group_id).unwrap_or_default();
  }
}

fn people_by_role<G: Governed + ?Sized>(instance: &G) -> HashMap<i64, Vec<PersonRef>> {
  let mut by_role: HashMap<i64, Vec<PersonRef>> = HashMap::new();
  for entry in instance.access_control_list() {
    by_role
      .entry(entry.ac_role_id)
      .or_default()
      .push(entry.person.clone());
  }
  by_role
}

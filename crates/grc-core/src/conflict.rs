//! Role-conflict detection.
//!
//! Conflict-designated roles (e.g. Assignees and Verifiers) must never share
//! a person on the same object.

use std::collections::HashSet;

use crate::{
  event::{EventSink, RoleEvent},
  object::ObjectRef,
  roles::RoleGroup,
};

#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
  conflict_roles: Vec<String>,
}

impl ConflictDetector {
  pub fn new(conflict_roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      conflict_roles: conflict_roles.into_iter().map(Into::into).collect(),
    }
  }

  pub fn is_conflict_role(&self, title: &str) -> bool {
    self.conflict_roles.iter().any(|r| r == title)
  }

  /// Check `groups` for a person shared between conflict roles.
  ///
  /// With `changed` set, only the changed group is tested against the union
  /// of the other conflict groups; a change to a role outside the conflict
  /// set cannot introduce a conflict and returns `None`. Without it every
  /// pair of conflict groups is tested.
  pub fn check(&self, groups: &[RoleGroup], changed: Option<&str>) -> Option<bool> {
    let conflicting: Vec<&RoleGroup> = groups
      .iter()
      .filter(|g| self.is_conflict_role(&g.title))
      .collect();

    match changed {
      Some(title) if !self.is_conflict_role(title) => None,
      Some(title) => {
        let changed_ids = person_ids(conflicting.iter().copied().filter(|g| g.title == title));
        let other_ids = person_ids(conflicting.iter().copied().filter(|g| g.title != title));
        Some(!changed_ids.is_disjoint(&other_ids))
      }
      None => {
        let sets: Vec<HashSet<i64>> = conflicting
          .iter()
          .map(|g| person_ids(std::iter::once(*g)))
          .collect();
        let has_conflict = sets.iter().enumerate().any(|(i, a)| {
          sets[i + 1..].iter().any(|b| !a.is_disjoint(b))
        });
        Some(has_conflict)
      }
    }
  }

  /// [`check`](Self::check), then tell `object`'s owners about the verdict.
  /// Nothing is dispatched when the check is skipped.
  pub fn check_and_dispatch<E: EventSink + ?Sized>(
    &self,
    object: &ObjectRef,
    groups: &[RoleGroup],
    changed: Option<&str>,
    sink: &E,
  ) -> Option<bool> {
    let verdict = self.check(groups, changed)?;
    if verdict {
      tracing::info!(%object, ?changed, "role conflict detected");
    }
    sink.dispatch(RoleEvent::RolesConflict {
      object:        object.clone(),
      has_conflicts: verdict,
    });
    Some(verdict)
  }
}

fn person_ids<'a>(groups: impl Iterator<Item = &'a RoleGroup>) -> HashSet<i64> {
  groups.flat_map(|g| g.people.iter().map(|p| p.id)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{event::EventLog, object::PersonRef};

  fn group(id: i64, title: &str, people: &[i64]) -> RoleGroup {
    RoleGroup {
      title:            title.into(),
      group_id:         id,
      people:           people.iter().copied().map(PersonRef::new).collect(),
      required:         false,
      single_user_role: false,
    }
  }

  fn detector() -> ConflictDetector { ConflictDetector::new(["Assignees", "Verifiers"]) }

  #[test]
  fn shared_person_is_a_conflict_until_removed() {
    let d = detector();
    let mut groups = vec![
      group(1, "Assignees", &[7, 1]),
      group(2, "Verifiers", &[7]),
      group(3, "Creators", &[7]),
    ];
    assert_eq!(d.check(&groups, None), Some(true));

    groups[1].people.clear();
    assert_eq!(d.check(&groups, Some("Verifiers")), Some(false));
    assert_eq!(d.check(&groups, None), Some(false));
  }

  #[test]
  fn non_conflict_roles_are_ignored() {
    let d = detector();
    let groups = vec![group(1, "Assignees", &[7]), group(3, "Creators", &[7])];
    assert_eq!(d.check(&groups, None), Some(false));
    assert_eq!(d.check(&groups, Some("Creators")), None);
  }

  #[test]
  fn targeted_check_only_tests_the_changed_group() {
    let d = ConflictDetector::new(["A", "B", "C"]);
    let groups = vec![group(1, "A", &[1]), group(2, "B", &[2]), group(3, "C", &[2])];
    // B and C share person 2, but A did not introduce that.
    assert_eq!(d.check(&groups, Some("A")), Some(false));
    assert_eq!(d.check(&groups, Some("B")), Some(true));
    assert_eq!(d.check(&groups, None), Some(true));
  }

  #[test]
  fn changed_group_missing_from_list_has_no_people() {
    let d = detector();
    let groups = vec![group(2, "Verifiers", &[7])];
    assert_eq!(d.check(&groups, Some("Assignees")), Some(false));
  }

  #[test]
  fn repeated_checks_are_idempotent() {
    let d = detector();
    let groups = vec![group(1, "Assignees", &[7]), group(2, "Verifiers", &[7])];
    let first = d.check(&groups, Some("Assignees"));
    assert_eq!(first, d.check(&groups, Some("Assignees")));
    assert_eq!(first, Some(true));
  }

  #[test]
  fn dispatch_only_when_checked() {
    let d = detector();
    let log = EventLog::new();
    let object = ObjectRef::new("Assessment", 1);
    let groups = vec![group(1, "Assignees", &[7]), group(2, "Verifiers", &[7])];

    assert_eq!(d.check_and_dispatch(&object, &groups, Some("Creators"), &log), None);
    assert!(log.events().is_empty());

    assert_eq!(d.check_and_dispatch(&object, &groups, None, &log), Some(true));
    assert_eq!(log.events(), vec![RoleEvent::RolesConflict {
      object,
      has_conflicts: true,
    }]);
  }
}

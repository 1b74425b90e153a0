//! The role-assignment engine.
//!
//! One [`RoleAssignment`] owns one governed object and its role groups. Every
//! mutation goes through `&mut self`, so edits to a single object are
//! serialised by ownership. Per group the engine tracks
//! `Idle → Dirty → Saving → Idle`; a failed save returns the group to `Dirty`
//! with its local edits intact.

use serde::Deserialize;

use crate::{
  Error, Result,
  conflict::ConflictDetector,
  event::{EventSink, RoleEvent},
  object::{AccessControlEntry, Governed, LiveObject, PersonRef},
  roles::{RoleGroup, refresh_people_in_groups},
  store::ObjectStore,
};

/// Where merged ACL changes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
  /// Save the object through the store.
  #[default]
  Persist,
  /// Merge locally and let the owning form persist the object.
  Owner,
}

/// What to do with the group being edited when another group enters edit
/// mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
  #[default]
  CancelOther,
  SaveOther,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssignmentOptions {
  /// Save immediately after every add/remove outside an edit session.
  pub auto_update: bool,
  pub mode:        SaveMode,
}

impl Default for AssignmentOptions {
  fn default() -> Self { Self { auto_update: true, mode: SaveMode::Persist } }
}

/// Outcome of an add/remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
  Applied,
  /// The request was already satisfied; nothing was marked dirty.
  Unchanged,
}

#[derive(Debug)]
struct Slot {
  group: RoleGroup,
  dirty: bool,
}

#[derive(Debug)]
struct EditSession {
  group_id: i64,
  restore:  Vec<PersonRef>,
}

pub struct RoleAssignment<'a, S, E> {
  store:         &'a S,
  events:        E,
  detector:      ConflictDetector,
  options:       AssignmentOptions,
  object:        LiveObject,
  slots:         Vec<Slot>,
  editing:       Option<EditSession>,
  has_conflicts: bool,
}

impl<'a, S, E> RoleAssignment<'a, S, E>
where
  S: ObjectStore,
  E: EventSink,
{
  /// Take ownership of `object` and its `groups`, running the full conflict
  /// check once.
  pub fn new(
    store: &'a S,
    events: E,
    detector: ConflictDetector,
    options: AssignmentOptions,
    object: LiveObject,
    groups: Vec<RoleGroup>,
  ) -> Self {
    let mut engine = Self {
      store,
      events,
      detector,
      options,
      object,
      slots: groups.into_iter().map(|group| Slot { group, dirty: false }).collect(),
      editing: None,
      has_conflicts: false,
    };
    engine.check_conflicts(None);
    engine
  }

  pub fn object(&self) -> &LiveObject { &self.object }

  pub fn into_object(self) -> LiveObject { self.object }

  pub fn groups(&self) -> impl Iterator<Item = &RoleGroup> {
    self.slots.iter().map(|s| &s.group)
  }

  pub fn group(&self, group_id: i64) -> Option<&RoleGroup> {
    self.groups().find(|g| g.group_id == group_id)
  }

  pub fn is_dirty(&self, group_id: i64) -> bool {
    self.slots.iter().any(|s| s.group.group_id == group_id && s.dirty)
  }

  pub fn has_conflicts(&self) -> bool { self.has_conflicts }

  /// The group currently in edit mode, if any.
  pub fn editing(&self) -> Option<i64> { self.editing.as_ref().map(|e| e.group_id) }

  fn index_of(&self, group_id: i64) -> Result<usize> {
    self
      .slots
      .iter()
      .position(|s| s.group.group_id == group_id)
      .ok_or(Error::GroupNotFound(group_id))
  }

  /// Edits to the group in edit mode wait for [`finish_edit`](Self::finish_edit).
  fn saves_immediately(&self, group_id: i64) -> bool {
    self.options.auto_update && self.editing() != Some(group_id)
  }

  // ── Mutations ─────────────────────────────────────────────────────────

  pub async fn add_person(&mut self, group_id: i64, person: PersonRef) -> Result<Change> {
    let index = self.index_of(group_id)?;
    let slot = &mut self.slots[index];

    if slot.group.contains(person.id) {
      tracing::warn!(
        group = %slot.group.title,
        person_id = person.id,
        "person is already assigned to role"
      );
      return Ok(Change::Unchanged);
    }

    if slot.group.single_user_role {
      slot.group.people = vec![person];
    } else {
      slot.group.people.push(person);
    }
    slot.dirty = true;

    if self.saves_immediately(group_id) {
      self.save_changes(group_id).await?;
    }
    Ok(Change::Applied)
  }

  pub async fn remove_person(&mut self, group_id: i64, person_id: i64) -> Result<Change> {
    let index = self.index_of(group_id)?;
    let slot = &mut self.slots[index];

    if !slot.group.contains(person_id) {
      tracing::warn!(
        group = %slot.group.title,
        person_id,
        "person is not assigned to role"
      );
      return Ok(Change::Unchanged);
    }

    slot.group.people.retain(|p| p.id != person_id);
    slot.dirty = true;

    if self.saves_immediately(group_id) {
      self.save_changes(group_id).await?;
    }
    Ok(Change::Applied)
  }

  /// Merge a dirty group back into the object's ACL and persist it.
  pub async fn save_changes(&mut self, group_id: i64) -> Result<()> {
    let index = self.index_of(group_id)?;
    if !self.slots[index].dirty {
      return Ok(());
    }
    self.slots[index].dirty = false;

    let group = self.slots[index].group.clone();
    let object = self.object.object_ref();

    self.events.dispatch(RoleEvent::UpdateRoles {
      object:     object.clone(),
      role_id:    group.group_id,
      role_title: group.title.clone(),
      people:     group.people.clone(),
    });
    // The owned object only takes the merged ACL once the save is accepted.
    let mut next = self.object.clone();
    merge_group_into_acl(&mut next.access_control_list, &group);

    match self.options.mode {
      SaveMode::Owner => {
        self.object = next;
        self.events.dispatch(RoleEvent::SaveCustomRole {
          object,
          group_id: group.group_id,
        });
      }
      SaveMode::Persist => {
        let saved = self.store.save(&next).await;
        match saved {
          Ok(saved) => {
            self.object = saved;
            self.events.dispatch(RoleEvent::RefetchOnce { object });
          }
          Err(err) => {
            let err: Error = err.into();
            self.slots[index].dirty = true;
            tracing::error!(%object, role = %group.title, error = %err, "failed to save roles");
            self.events.dispatch(RoleEvent::SaveFailed {
              object,
              message: err.to_string(),
            });
            return Err(err);
          }
        }
      }
    }

    self.check_conflicts(Some(&group.title));
    Ok(())
  }

  // ── Edit sessions ─────────────────────────────────────────────────────

  /// Put `group_id` into edit mode, taking a restore point of its people.
  ///
  /// Only one group edits at a time; a group already in edit mode is
  /// resolved according to `policy` first.
  pub async fn begin_edit(&mut self, group_id: i64, policy: EditPolicy) -> Result<()> {
    let index = self.index_of(group_id)?;
    match self.editing() {
      Some(current) if current == group_id => return Ok(()),
      Some(_) => match policy {
        EditPolicy::CancelOther => self.cancel_edit()?,
        EditPolicy::SaveOther => self.finish_edit().await?,
      },
      None => {}
    }
    self.editing = Some(EditSession {
      group_id,
      restore: self.slots[index].group.people.clone(),
    });
    Ok(())
  }

  /// Leave edit mode, restoring the group verbatim without persisting.
  pub fn cancel_edit(&mut self) -> Result<()> {
    let session = self.editing.take().ok_or(Error::NoEditSession)?;
    let index = self.index_of(session.group_id)?;
    let slot = &mut self.slots[index];
    slot.group.people = session.restore;
    slot.dirty = false;
    Ok(())
  }

  /// Leave edit mode, saving the group. On failure the session stays open.
  pub async fn finish_edit(&mut self) -> Result<()> {
    let session = self.editing.take().ok_or(Error::NoEditSession)?;
    let group_id = session.group_id;
    if let Err(err) = self.save_changes(group_id).await {
      self.editing = Some(session);
      return Err(err);
    }
    Ok(())
  }

  // ── Reloading ─────────────────────────────────────────────────────────

  /// Re-read the object and re-derive people for every group without
  /// pending local edits.
  pub async fn refresh(&mut self) -> Result<()> {
    let object_ref = self.object.object_ref();
    let fresh = self
      .store
      .refresh(&object_ref)
      .await
      .map_err(Into::<Error>::into)?
      .ok_or(Error::ObjectNotFound(object_ref))?;

    let mut groups: Vec<RoleGroup> = self.slots.iter().map(|s| s.group.clone()).collect();
    refresh_people_in_groups(&fresh, &mut groups);
    let editing = self.editing();
    for (slot, group) in self.slots.iter_mut().zip(groups) {
      if !slot.dirty && editing != Some(slot.group.group_id) {
        slot.group = group;
      }
    }
    self.object = fresh;
    self.check_conflicts(None);
    Ok(())
  }

  fn check_conflicts(&mut self, changed: Option<&str>) {
    let groups: Vec<RoleGroup> = self.slots.iter().map(|s| s.group.clone()).collect();
    if let Some(verdict) = self.detector.check_and_dispatch(
      &self.object.object_ref(),
      &groups,
      changed,
      &self.events,
    ) {
      self.has_conflicts = verdict;
    }
  }
}

/// Replace every ACL entry of `group`'s role with its current people.
pub fn merge_group_into_acl(acl: &mut Vec<AccessControlEntry>, group: &RoleGroup) {
  acl.retain(|entry| entry.ac_role_id != group.group_id);
  acl.extend(
    group
      .people
      .iter()
      .map(|p| AccessControlEntry::new(group.group_id, p.clone())),
  );
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
  };

  use chrono::Utc;
  use serde_json::Map;

  use super::*;
  use crate::{
    event::EventLog,
    object::{NewObject, ObjectRef},
    roles::{NewRole, Role},
    snapshot::Snapshot,
  };

  // ── In-memory store ───────────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  enum MemError {
    #[error("backend offline")]
    Offline,
    #[error("stale version")]
    Stale(ObjectRef, i64),
  }

  impl From<MemError> for Error {
    fn from(err: MemError) -> Self {
      match err {
        MemError::Stale(object, expected) => Error::VersionConflict { object, expected },
        other => Error::store(other),
      }
    }
  }

  #[derive(Default)]
  struct MemStore {
    object:  Mutex<Option<LiveObject>>,
    offline: AtomicBool,
  }

  impl MemStore {
    fn holding(object: &LiveObject) -> Self {
      Self { object: Mutex::new(Some(object.clone())), ..Default::default() }
    }

    fn stored(&self) -> LiveObject { self.object.lock().unwrap().clone().unwrap() }
  }

  impl ObjectStore for MemStore {
    type Error = MemError;

    async fn add_object(&self, _input: NewObject) -> Result<LiveObject, MemError> {
      Err(MemError::Offline)
    }

    async fn save(&self, object: &LiveObject) -> Result<LiveObject, MemError> {
      if self.offline.load(Ordering::SeqCst) {
        return Err(MemError::Offline);
      }
      let mut slot = self.object.lock().unwrap();
      let current = slot.as_ref().map_or(0, |o| o.version);
      if current != object.version {
        return Err(MemError::Stale(object.object_ref(), object.version));
      }
      let mut saved = object.clone();
      saved.version += 1;
      *slot = Some(saved.clone());
      Ok(saved)
    }

    async fn refresh(&self, _object: &ObjectRef) -> Result<Option<LiveObject>, MemError> {
      Ok(self.object.lock().unwrap().clone())
    }

    async fn delete_object(&self, _object: &ObjectRef) -> Result<(), MemError> {
      *self.object.lock().unwrap() = None;
      Ok(())
    }

    async fn list_objects(&self, _type_name: Option<&str>) -> Result<Vec<LiveObject>, MemError> {
      Ok(self.object.lock().unwrap().iter().cloned().collect())
    }

    async fn capture_snapshots(
      &self,
      _parent: &ObjectRef,
      _children: &[ObjectRef],
    ) -> Result<Vec<Snapshot>, MemError> {
      Ok(vec![])
    }

    async fn get_snapshot(&self, _id: i64) -> Result<Option<Snapshot>, MemError> { Ok(None) }

    async fn list_snapshots(&self, _parent: &ObjectRef) -> Result<Vec<Snapshot>, MemError> {
      Ok(vec![])
    }

    async fn update_snapshot_to_latest(&self, _id: i64) -> Result<Snapshot, MemError> {
      Err(MemError::Offline)
    }

    async fn add_role(&self, _input: NewRole) -> Result<Role, MemError> { Err(MemError::Offline) }

    async fn list_roles(&self) -> Result<Vec<Role>, MemError> { Ok(vec![]) }
  }

  // ── Fixtures ──────────────────────────────────────────────────────────

  const ASSIGNEE: i64 = 1;
  const ASSIGNEES: i64 = 2;
  const VERIFIERS: i64 = 3;

  fn assessment(acl: &[(i64, i64)]) -> LiveObject {
    LiveObject {
      id: 10,
      type_name: "Assessment".into(),
      title: "Q3 access review".into(),
      description: None,
      archived: false,
      access_control_list: acl
        .iter()
        .map(|(role, person)| AccessControlEntry::new(*role, PersonRef::new(*person)))
        .collect(),
      attributes: Map::new(),
      last_assessment_date: None,
      version: 1,
      updated_at: Utc::now(),
    }
  }

  fn group(id: i64, title: &str, single: bool, people: &[i64]) -> RoleGroup {
    RoleGroup {
      title:            title.into(),
      group_id:         id,
      people:           people.iter().copied().map(PersonRef::new).collect(),
      required:         false,
      single_user_role: single,
    }
  }

  fn groups_for(object: &LiveObject) -> Vec<RoleGroup> {
    let people = |role: i64| -> Vec<i64> {
      object
        .access_control_list
        .iter()
        .filter(|e| e.ac_role_id == role)
        .map(|e| e.person.id)
        .collect()
    };
    vec![
      group(ASSIGNEE, "Assignee", true, &people(ASSIGNEE)),
      group(ASSIGNEES, "Assignees", false, &people(ASSIGNEES)),
      group(VERIFIERS, "Verifiers", false, &people(VERIFIERS)),
    ]
  }

  fn engine<'a>(
    store: &'a MemStore,
    log: &EventLog,
    options: AssignmentOptions,
  ) -> RoleAssignment<'a, MemStore, EventLog> {
    let object = store.stored();
    let groups = groups_for(&object);
    RoleAssignment::new(
      store,
      log.clone(),
      ConflictDetector::new(["Assignees", "Verifiers"]),
      options,
      object,
      groups,
    )
  }

  fn deferred() -> AssignmentOptions {
    AssignmentOptions { auto_update: false, ..Default::default() }
  }

  fn ids(group: &RoleGroup) -> Vec<i64> { group.people.iter().map(|p| p.id).collect() }

  // ── Tests ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn load_runs_full_conflict_check() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 7), (VERIFIERS, 7)]));
    let log = EventLog::new();
    let e = engine(&store, &log, deferred());
    assert!(e.has_conflicts());
    assert_eq!(log.last_conflict(), Some(true));
  }

  #[tokio::test]
  async fn single_user_role_replaces() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEE, 1)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, deferred());

    let change = e.add_person(ASSIGNEE, PersonRef::new(2)).await.unwrap();
    assert_eq!(change, Change::Applied);
    assert_eq!(ids(e.group(ASSIGNEE).unwrap()), vec![2]);
    assert!(e.is_dirty(ASSIGNEE));
  }

  #[tokio::test]
  async fn multi_user_role_appends() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 1)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, deferred());

    e.add_person(ASSIGNEES, PersonRef::new(2)).await.unwrap();
    assert_eq!(ids(e.group(ASSIGNEES).unwrap()), vec![1, 2]);
  }

  #[tokio::test]
  async fn duplicate_add_is_a_clean_no_op() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 1)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());
    log.drain();

    let change = e.add_person(ASSIGNEES, PersonRef::new(1)).await.unwrap();
    assert_eq!(change, Change::Unchanged);
    assert_eq!(e.group(ASSIGNEES).unwrap().people.len(), 1);
    assert!(!e.is_dirty(ASSIGNEES));
    assert!(log.events().is_empty());
    assert_eq!(store.stored().version, 1);
  }

  #[tokio::test]
  async fn removing_an_absent_person_is_a_no_op() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 1)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, deferred());

    assert_eq!(e.remove_person(ASSIGNEES, 99).await.unwrap(), Change::Unchanged);
    assert!(!e.is_dirty(ASSIGNEES));
  }

  #[tokio::test]
  async fn unknown_group_is_an_error() {
    let store = MemStore::holding(&assessment(&[]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, deferred());
    let err = e.add_person(42, PersonRef::new(1)).await.unwrap_err();
    assert!(matches!(err, Error::GroupNotFound(42)));
  }

  #[tokio::test]
  async fn auto_update_persists_merged_acl() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 1), (VERIFIERS, 5)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());
    log.drain();

    e.add_person(ASSIGNEES, PersonRef::new(2)).await.unwrap();

    assert!(!e.is_dirty(ASSIGNEES));
    let stored = store.stored();
    assert_eq!(stored.version, 2);
    assert_eq!(e.object().version, 2);
    assert_eq!(stored.access_control_list, vec![
      AccessControlEntry::new(VERIFIERS, PersonRef::new(5)),
      AccessControlEntry::new(ASSIGNEES, PersonRef::new(1)),
      AccessControlEntry::new(ASSIGNEES, PersonRef::new(2)),
    ]);

    let object = stored.object_ref();
    assert_eq!(log.events(), vec![
      RoleEvent::UpdateRoles {
        object:     object.clone(),
        role_id:    ASSIGNEES,
        role_title: "Assignees".into(),
        people:     vec![PersonRef::new(1), PersonRef::new(2)],
      },
      RoleEvent::RefetchOnce { object: object.clone() },
      RoleEvent::RolesConflict { object, has_conflicts: false },
    ]);
  }

  #[tokio::test]
  async fn deferred_edits_wait_for_save() {
    let store = MemStore::holding(&assessment(&[]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, deferred());

    e.add_person(VERIFIERS, PersonRef::new(3)).await.unwrap();
    assert_eq!(store.stored().version, 1);

    e.save_changes(VERIFIERS).await.unwrap();
    assert_eq!(store.stored().version, 2);
    assert!(!e.is_dirty(VERIFIERS));

    // Saving a clean group does nothing.
    e.save_changes(VERIFIERS).await.unwrap();
    assert_eq!(store.stored().version, 2);
  }

  #[tokio::test]
  async fn conflict_introduced_and_cleared() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 7)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());
    assert!(!e.has_conflicts());

    e.add_person(VERIFIERS, PersonRef::new(7)).await.unwrap();
    assert!(e.has_conflicts());
    assert_eq!(log.last_conflict(), Some(true));

    e.remove_person(VERIFIERS, 7).await.unwrap();
    assert!(!e.has_conflicts());
    assert_eq!(log.last_conflict(), Some(false));
  }

  #[tokio::test]
  async fn failed_save_keeps_edits_dirty() {
    let store = MemStore::holding(&assessment(&[]));
    store.offline.store(true, Ordering::SeqCst);
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());
    log.drain();

    let err = e.add_person(VERIFIERS, PersonRef::new(7)).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert!(e.is_dirty(VERIFIERS));
    assert_eq!(ids(e.group(VERIFIERS).unwrap()), vec![7]);
    assert!(log.events().iter().any(|ev| matches!(ev, RoleEvent::SaveFailed { .. })));
    assert!(!log.events().iter().any(|ev| matches!(ev, RoleEvent::RolesConflict { .. })));

    store.offline.store(false, Ordering::SeqCst);
    e.save_changes(VERIFIERS).await.unwrap();
    assert!(!e.is_dirty(VERIFIERS));
    assert_eq!(store.stored().access_control_list, vec![AccessControlEntry::new(
      VERIFIERS,
      PersonRef::new(7)
    )]);
  }

  #[tokio::test]
  async fn stale_version_is_a_conflict() {
    let store = MemStore::holding(&assessment(&[]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());

    // Someone else saves first.
    let mut other = store.stored();
    other.title = "Renamed".into();
    store.save(&other).await.unwrap();

    let err = e.add_person(VERIFIERS, PersonRef::new(7)).await.unwrap_err();
    assert!(matches!(err, Error::VersionConflict { expected: 1, .. }));
    assert!(e.is_dirty(VERIFIERS));
  }

  #[tokio::test]
  async fn owner_mode_merges_without_persisting() {
    let store = MemStore::holding(&assessment(&[]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions {
      auto_update: true,
      mode:        SaveMode::Owner,
    });
    log.drain();

    e.add_person(ASSIGNEES, PersonRef::new(4)).await.unwrap();
    assert_eq!(store.stored().version, 1);
    assert_eq!(e.object().access_control_list, vec![AccessControlEntry::new(
      ASSIGNEES,
      PersonRef::new(4)
    )]);
    assert!(log.events().contains(&RoleEvent::SaveCustomRole {
      object:   e.object().object_ref(),
      group_id: ASSIGNEES,
    }));
  }

  #[tokio::test]
  async fn cancel_edit_restores_people() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 1)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());

    e.begin_edit(ASSIGNEES, EditPolicy::CancelOther).await.unwrap();
    e.add_person(ASSIGNEES, PersonRef::new(2)).await.unwrap();
    e.remove_person(ASSIGNEES, 1).await.unwrap();
    assert_eq!(ids(e.group(ASSIGNEES).unwrap()), vec![2]);
    assert_eq!(store.stored().version, 1, "edit session defers saving");

    e.cancel_edit().unwrap();
    assert_eq!(ids(e.group(ASSIGNEES).unwrap()), vec![1]);
    assert!(!e.is_dirty(ASSIGNEES));
    assert_eq!(e.editing(), None);
    assert_eq!(store.stored().version, 1);
    assert!(matches!(e.cancel_edit(), Err(Error::NoEditSession)));
  }

  #[tokio::test]
  async fn finish_edit_saves() {
    let store = MemStore::holding(&assessment(&[]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());

    e.begin_edit(VERIFIERS, EditPolicy::CancelOther).await.unwrap();
    e.add_person(VERIFIERS, PersonRef::new(3)).await.unwrap();
    e.finish_edit().await.unwrap();
    assert_eq!(e.editing(), None);
    assert_eq!(store.stored().version, 2);
  }

  #[tokio::test]
  async fn cancelled_edit_after_failed_finish_is_never_saved() {
    let store = MemStore::holding(&assessment(&[]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());

    e.begin_edit(VERIFIERS, EditPolicy::CancelOther).await.unwrap();
    e.add_person(VERIFIERS, PersonRef::new(7)).await.unwrap();

    store.offline.store(true, Ordering::SeqCst);
    assert!(e.finish_edit().await.is_err());
    assert_eq!(e.editing(), Some(VERIFIERS));
    assert!(e.object().access_control_list.is_empty());

    e.cancel_edit().unwrap();
    store.offline.store(false, Ordering::SeqCst);
    e.add_person(ASSIGNEES, PersonRef::new(1)).await.unwrap();

    assert_eq!(store.stored().access_control_list, vec![AccessControlEntry::new(
      ASSIGNEES,
      PersonRef::new(1)
    )]);
    assert!(e.group(VERIFIERS).unwrap().people.is_empty());
  }

  #[tokio::test]
  async fn one_group_edits_at_a_time() {
    let store = MemStore::holding(&assessment(&[]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, AssignmentOptions::default());

    e.begin_edit(ASSIGNEES, EditPolicy::CancelOther).await.unwrap();
    e.add_person(ASSIGNEES, PersonRef::new(1)).await.unwrap();
    e.begin_edit(VERIFIERS, EditPolicy::CancelOther).await.unwrap();
    assert_eq!(e.editing(), Some(VERIFIERS));
    assert!(e.group(ASSIGNEES).unwrap().people.is_empty());

    e.add_person(VERIFIERS, PersonRef::new(2)).await.unwrap();
    e.begin_edit(ASSIGNEES, EditPolicy::SaveOther).await.unwrap();
    assert_eq!(e.editing(), Some(ASSIGNEES));
    assert_eq!(store.stored().access_control_list, vec![AccessControlEntry::new(
      VERIFIERS,
      PersonRef::new(2)
    )]);
  }

  #[tokio::test]
  async fn refresh_keeps_dirty_groups() {
    let store = MemStore::holding(&assessment(&[(ASSIGNEES, 1)]));
    let log = EventLog::new();
    let mut e = engine(&store, &log, deferred());
    e.add_person(VERIFIERS, PersonRef::new(9)).await.unwrap();

    let mut pushed = store.stored();
    pushed.access_control_list = vec![
      AccessControlEntry::new(ASSIGNEES, PersonRef::new(5)),
      AccessControlEntry::new(VERIFIERS, PersonRef::new(6)),
    ];
    store.save(&pushed).await.unwrap();

    e.refresh().await.unwrap();
    assert_eq!(ids(e.group(ASSIGNEES).unwrap()), vec![5]);
    assert_eq!(ids(e.group(VERIFIERS).unwrap()), vec![9]);
    assert_eq!(e.object().version, 2);
  }

  #[test]
  fn merge_replaces_only_that_role() {
    let mut acl = vec![
      AccessControlEntry::new(1, PersonRef::new(1)),
      AccessControlEntry::new(2, PersonRef::new(2)),
      AccessControlEntry::new(1, PersonRef::new(3)),
    ];
    merge_group_into_acl(&mut acl, &group(1, "Assignees", false, &[4]));
    assert_eq!(acl, vec![
      AccessControlEntry::new(2, PersonRef::new(2)),
      AccessControlEntry::new(1, PersonRef::new(4)),
    ]);
  }
}

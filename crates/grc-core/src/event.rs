//! Signals emitted by the core for UI-owning collaborators.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::object::{ObjectRef, PersonRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoleEvent {
  /// Result of a conflict check on `object`.
  RolesConflict { object: ObjectRef, has_conflicts: bool },
  /// A role group's people must replace that role's ACL entries.
  UpdateRoles {
    object:     ObjectRef,
    role_id:    i64,
    role_title: String,
    people:     Vec<PersonRef>,
  },
  /// The owning form is responsible for persisting the merged ACL.
  SaveCustomRole { object: ObjectRef, group_id: i64 },
  /// The object was persisted; dependent views should refetch it once.
  RefetchOnce { object: ObjectRef },
  /// Persisting failed; local edits are kept for a retry.
  SaveFailed { object: ObjectRef, message: String },
}

pub trait EventSink: Send + Sync {
  fn dispatch(&self, event: RoleEvent);
}

impl<E: EventSink + ?Sized> EventSink for &E {
  fn dispatch(&self, event: RoleEvent) { (**self).dispatch(event) }
}

impl<E: EventSink + ?Sized> EventSink for Arc<E> {
  fn dispatch(&self, event: RoleEvent) { (**self).dispatch(event) }
}

/// An in-memory sink that records every event in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
  events: Arc<Mutex<Vec<RoleEvent>>>,
}

impl EventLog {
  pub fn new() -> Self { Self::default() }

  pub fn events(&self) -> Vec<RoleEvent> {
    self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Remove and return everything recorded so far.
  pub fn drain(&self) -> Vec<RoleEvent> {
    std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
  }

  /// The most recent conflict verdict, if any check has run.
  pub fn last_conflict(&self) -> Option<bool> {
    self.events().iter().rev().find_map(|e| match e {
      RoleEvent::RolesConflict { has_conflicts, .. } => Some(*has_conflicts),
      _ => None,
    })
  }
}

impl EventSink for EventLog {
  fn dispatch(&self, event: RoleEvent) {
    tracing::debug!(?event, "dispatch");
    self
      .events
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(event);
  }
}

//! The `ObjectStore` trait: the persistence collaborator.
//!
//! The trait is implemented by storage backends (e.g. `grc-store-sqlite`).
//! The assignment engine and the HTTP layer depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use crate::{
  object::{LiveObject, NewObject, ObjectRef},
  roles::{NewRole, Role},
  snapshot::Snapshot,
};

/// Abstraction over a backend holding live objects, their append-only
/// revision history, snapshots, and the role catalog.
///
/// Backend errors convert into [`crate::Error`] so that callers can tell a
/// version conflict or a missing object apart from an I/O failure.
pub trait ObjectStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Live objects ──────────────────────────────────────────────────────

  /// Persist a new object and record its first revision.
  fn add_object(
    &self,
    input: NewObject,
  ) -> impl Future<Output = Result<LiveObject, Self::Error>> + Send + '_;

  /// Persist `object` and record a revision of it.
  ///
  /// Fails with a version conflict if the stored version differs from
  /// `object.version`; the returned object carries the bumped version.
  fn save<'a>(
    &'a self,
    object: &'a LiveObject,
  ) -> impl Future<Output = Result<LiveObject, Self::Error>> + Send + 'a;

  /// Re-read an object. Returns `None` if it does not exist (any more).
  fn refresh<'a>(
    &'a self,
    object: &'a ObjectRef,
  ) -> impl Future<Output = Result<Option<LiveObject>, Self::Error>> + Send + 'a;

  /// Delete an object. Its revisions and any snapshots of it are kept.
  fn delete_object<'a>(
    &'a self,
    object: &'a ObjectRef,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// List live objects, optionally restricted to one type.
  fn list_objects<'a>(
    &'a self,
    type_name: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<LiveObject>, Self::Error>> + Send + 'a;

  // ── Snapshots ─────────────────────────────────────────────────────────

  /// Snapshot each child's latest revision under `parent`. Children already
  /// snapshotted under `parent` keep their existing snapshot.
  fn capture_snapshots<'a>(
    &'a self,
    parent: &'a ObjectRef,
    children: &'a [ObjectRef],
  ) -> impl Future<Output = Result<Vec<Snapshot>, Self::Error>> + Send + 'a;

  /// Retrieve a snapshot with its freshness flags resolved.
  fn get_snapshot(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send + '_;

  /// All snapshots owned by `parent`, in creation order.
  fn list_snapshots<'a>(
    &'a self,
    parent: &'a ObjectRef,
  ) -> impl Future<Output = Result<Vec<Snapshot>, Self::Error>> + Send + 'a;

  /// Re-pin a snapshot to its original's latest revision. The previously
  /// pinned revision is left untouched.
  fn update_snapshot_to_latest(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + '_;

  // ── Role catalog ──────────────────────────────────────────────────────

  fn add_role(
    &self,
    input: NewRole,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  fn list_roles(&self) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;
}

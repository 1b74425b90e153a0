//! Error types for `grc-core`.

use thiserror::Error;

use crate::object::ObjectRef;

#[derive(Debug, Error)]
pub enum Error {
  #[error("snapshot {0} has no revision content")]
  MissingRevisionContent(i64),

  #[error("role group not found: {0}")]
  GroupNotFound(i64),

  #[error("no role group is being edited")]
  NoEditSession,

  #[error("object not found: {0}")]
  ObjectNotFound(ObjectRef),

  #[error("snapshot not found: {0}")]
  SnapshotNotFound(i64),

  #[error("{object} was modified concurrently (expected version {expected})")]
  VersionConflict { object: ObjectRef, expected: i64 },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a backend error returned by an [`ObjectStore`](crate::store::ObjectStore).
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

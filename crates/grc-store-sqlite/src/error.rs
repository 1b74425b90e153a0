//! Error type for `grc-store-sqlite`.

use grc_core::object::ObjectRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] grc_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("object not found: {0}")]
  ObjectNotFound(ObjectRef),

  #[error("snapshot not found: {0}")]
  SnapshotNotFound(i64),

  #[error("{object} was modified concurrently (expected version {expected})")]
  VersionConflict { object: ObjectRef, expected: i64 },
}

impl From<Error> for grc_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(inner) => inner,
      Error::ObjectNotFound(object) => Self::ObjectNotFound(object),
      Error::SnapshotNotFound(id) => Self::SnapshotNotFound(id),
      Error::VersionConflict { object, expected } => {
        Self::VersionConflict { object, expected }
      }
      other => Self::store(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

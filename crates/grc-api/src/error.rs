//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use grc_core::event::RoleEvent;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("precondition failed: {0}")]
  PreconditionFailed(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<grc_core::Error> for ApiError {
  fn from(err: grc_core::Error) -> Self {
    use grc_core::Error as E;
    match err {
      E::ObjectNotFound(_) | E::SnapshotNotFound(_) | E::GroupNotFound(_) => {
        ApiError::NotFound(err.to_string())
      }
      E::VersionConflict { .. } => ApiError::Conflict(err.to_string()),
      E::MissingRevisionContent(_) => ApiError::Unprocessable(err.to_string()),
      E::NoEditSession => ApiError::BadRequest(err.to_string()),
      other => ApiError::Store(Box::new(other)),
    }
  }
}

/// Route a backend error through the core error so that version conflicts
/// and missing rows keep their status codes.
pub fn store_error<E: Into<grc_core::Error>>(err: E) -> ApiError { ApiError::from(err.into()) }

impl ApiError {
  fn parts(&self) -> (StatusCode, String) {
    match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::PreconditionFailed(m) => (StatusCode::PRECONDITION_FAILED, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    }
  }

  /// Render the error together with the events dispatched before it, so a
  /// failed assignment still reports its `saveFailed` event.
  pub fn with_events(self, events: Vec<RoleEvent>) -> Response {
    let (status, message) = self.parts();
    (status, Json(json!({ "error": message, "events": events }))).into_response()
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = self.parts();
    (status, Json(json!({ "error": message }))).into_response()
  }
}

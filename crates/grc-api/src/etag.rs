//! ETag computation and `If-Match` checks for live objects.
//!
//! An object's ETag is a SHA-256 hash over its type, id and store version, so
//! it changes exactly when a save succeeds.

use axum::http::{HeaderMap, header};
use grc_core::object::LiveObject;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Compute the quoted ETag for `object`.
pub fn compute_etag(object: &LiveObject) -> String {
  let mut hasher = Sha256::new();
  hasher.update(object.type_name.as_bytes());
  hasher.update([0u8]);
  hasher.update(object.id.to_le_bytes());
  hasher.update(object.version.to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Reject the request with 412 unless `If-Match` is absent, `*`, or lists
/// the current ETag of `object`.
pub fn check_if_match(headers: &HeaderMap, object: &LiveObject) -> Result<(), ApiError> {
  let Some(value) = headers.get(header::IF_MATCH) else {
    return Ok(());
  };
  let value = value
    .to_str()
    .map_err(|_| ApiError::BadRequest("malformed If-Match header".into()))?;

  let current = compute_etag(object);
  let matches = value
    .split(',')
    .map(str::trim)
    .any(|tag| tag == "*" || tag == current);

  if matches {
    Ok(())
  } else {
    Err(ApiError::PreconditionFailed(format!(
      "{} {} has changed",
      object.type_name, object.id
    )))
  }
}

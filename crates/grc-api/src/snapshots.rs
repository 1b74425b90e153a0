//! Handlers for snapshot endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/objects/:type/:id/snapshots` | Body: `{"children":[{"type":..,"id":..}]}`; 400 unless snapshot-related |
//! | `GET`  | `/objects/:type/:id/snapshots` | Materialised snapshots of a scope parent |
//! | `GET`  | `/snapshots/:id` | 404 if missing, 422 if its revision has no content |
//! | `POST` | `/snapshots/:id/latest` | 403 unless `can_get_latest_revision` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use grc_core::{
  materialize::MaterializedObject,
  object::ObjectRef,
  permission::Action,
  snapshot::Snapshot,
  store::ObjectStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  error::{ApiError, store_error},
  objects::{load, require},
};

async fn load_snapshot<S: ObjectStore>(state: &AppState<S>, id: i64) -> Result<Snapshot, ApiError> {
  state
    .store
    .get_snapshot(id)
    .await
    .map_err(store_error)?
    .ok_or_else(|| ApiError::NotFound(format!("snapshot {id} not found")))
}

/// Make sure the parent is cached so materialised snapshots observe its
/// archival state.
async fn bind_parent<S: ObjectStore>(state: &AppState<S>, parent: &ObjectRef) -> Result<(), ApiError> {
  if !state.cache.contains(parent) {
    let object = load(state, parent).await?;
    state.cache.insert(object);
  }
  Ok(())
}

// ─── Capture ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CaptureBody {
  pub children: Vec<ObjectRef>,
}

/// `POST /objects/:type/:id/snapshots`
pub async fn capture<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id)): Path<(String, i64)>,
  Json(body): Json<CaptureBody>,
) -> Result<impl IntoResponse, ApiError> {
  let parent = ObjectRef::new(type_name, id);
  require(&state, Action::Update, &parent)?;

  if let Some(child) = body
    .children
    .iter()
    .find(|c| !state.classifier.is_snapshot_related(&parent.type_name, &c.type_name))
  {
    return Err(ApiError::BadRequest(format!(
      "{} cannot be snapshotted under {}",
      child.type_name, parent.type_name
    )));
  }

  bind_parent(&state, &parent).await?;
  let snapshots = state
    .store
    .capture_snapshots(&parent, &body.children)
    .await
    .map_err(store_error)?;
  tracing::info!(%parent, count = snapshots.len(), "snapshots captured");

  let objects = state.materializer().to_objects(&snapshots)?;
  Ok((StatusCode::CREATED, Json(objects)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /objects/:type/:id/snapshots`
pub async fn list<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id)): Path<(String, i64)>,
) -> Result<Json<Vec<MaterializedObject>>, ApiError> {
  let parent = ObjectRef::new(type_name, id);
  require(&state, Action::Read, &parent)?;
  if !state.classifier.is_snapshot_parent(&parent.type_name) {
    return Err(ApiError::BadRequest(format!(
      "{} does not own snapshots",
      parent.type_name
    )));
  }

  bind_parent(&state, &parent).await?;
  let snapshots = state.store.list_snapshots(&parent).await.map_err(store_error)?;
  Ok(Json(state.materializer().to_objects(&snapshots)?))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /snapshots/:id`
pub async fn get_one<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<MaterializedObject>, ApiError> {
  let snapshot = load_snapshot(&state, id).await?;
  Ok(Json(state.materializer().to_object(&snapshot)?))
}

// ─── Update to latest ─────────────────────────────────────────────────────────

/// `POST /snapshots/:id/latest`
pub async fn update_to_latest<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<MaterializedObject>, ApiError> {
  let snapshot = load_snapshot(&state, id).await?;
  let current = state.materializer().to_object(&snapshot)?;
  if !current.can_get_latest_revision() {
    return Err(ApiError::Forbidden(format!(
      "snapshot {id} cannot be updated to the latest revision"
    )));
  }

  let updated = state
    .store
    .update_snapshot_to_latest(id)
    .await
    .map_err(store_error)?;
  tracing::info!(snapshot = id, original = %updated.child_ref(), "snapshot updated to latest");
  Ok(Json(state.materializer().to_object(&updated)?))
}

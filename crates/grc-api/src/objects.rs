//! Handlers for `/objects` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/objects` | Optional `?type=<type>` |
//! | `POST`   | `/objects` | Body: a new object; 201 with `ETag` |
//! | `GET`    | `/objects/:type/:id` | 404 if not found, 403 if unreadable |
//! | `PUT`    | `/objects/:type/:id` | Partial update; honours `If-Match` |
//! | `DELETE` | `/objects/:type/:id` | Snapshots of the object survive |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use chrono::NaiveDate;
use grc_core::{
  object::{LiveObject, NewObject, ObjectRef},
  permission::{Action, Permissions as _},
  store::ObjectStore,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
  AppState,
  error::{ApiError, store_error},
  etag::{check_if_match, compute_etag},
};

/// Load a live object or fail with 404.
pub(crate) async fn load<S: ObjectStore>(
  state: &AppState<S>,
  object: &ObjectRef,
) -> Result<LiveObject, ApiError> {
  state
    .store
    .refresh(object)
    .await
    .map_err(store_error)?
    .ok_or_else(|| ApiError::NotFound(format!("{object} not found")))
}

pub(crate) fn require<S: ObjectStore>(
  state: &AppState<S>,
  action: Action,
  object: &ObjectRef,
) -> Result<(), ApiError> {
  if state.policy.is_allowed(action, object) {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!("{action} not allowed on {object}")))
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub type_name: Option<String>,
}

/// `GET /objects[?type=<type>]`
pub async fn list<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<LiveObject>>, ApiError> {
  let objects = state
    .store
    .list_objects(params.type_name.as_deref())
    .await
    .map_err(store_error)?
    .into_iter()
    .filter(|o| state.policy.is_allowed(Action::Read, &ObjectRef::new(&o.type_name, o.id)))
    .collect();
  Ok(Json(objects))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /objects`
pub async fn create<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewObject>,
) -> Result<impl IntoResponse, ApiError> {
  if body.type_name.is_empty() {
    return Err(ApiError::BadRequest("object type must not be empty".into()));
  }
  let object = state.store.add_object(body).await.map_err(store_error)?;
  tracing::info!(object = %ObjectRef::new(&object.type_name, object.id), "object created");
  let etag = compute_etag(&object);
  Ok((StatusCode::CREATED, [(header::ETAG, etag)], Json(object)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /objects/:type/:id`
pub async fn get_one<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
  let key = ObjectRef::new(type_name, id);
  require(&state, Action::Read, &key)?;
  let object = load(&state, &key).await?;
  let etag = compute_etag(&object);
  Ok(([(header::ETAG, etag)], Json(object)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// Fields of a live object a client may change. Absent fields are kept.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBody {
  pub title:                Option<String>,
  pub description:          Option<String>,
  pub archived:             Option<bool>,
  pub attributes:           Option<Map<String, Value>>,
  pub last_assessment_date: Option<NaiveDate>,
}

/// `PUT /objects/:type/:id`
///
/// A changed `archived` flag reaches every materialised snapshot bound to this
/// object through the object cache. Only snapshot parents are cached, so other
/// objects are not added here.
pub async fn update<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id)): Path<(String, i64)>,
  headers: HeaderMap,
  Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let key = ObjectRef::new(type_name, id);
  require(&state, Action::Update, &key)?;
  let mut object = load(&state, &key).await?;
  check_if_match(&headers, &object)?;

  if let Some(title) = body.title {
    object.title = title;
  }
  if let Some(description) = body.description {
    object.description = Some(description);
  }
  if let Some(archived) = body.archived {
    object.archived = archived;
  }
  if let Some(attributes) = body.attributes {
    object.attributes = attributes;
  }
  if let Some(date) = body.last_assessment_date {
    object.last_assessment_date = Some(date);
  }

  let saved = state.store.save(&object).await.map_err(store_error)?;
  state.cache.update(saved.clone());
  let etag = compute_etag(&saved);
  Ok(([(header::ETAG, etag)], Json(saved)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /objects/:type/:id`
pub async fn delete_one<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
  let key = ObjectRef::new(type_name, id);
  require(&state, Action::Update, &key)?;
  state.store.delete_object(&key).await.map_err(store_error)?;
  state.cache.evict(&key);
  tracing::info!(object = %key, "object deleted");
  Ok(StatusCode::NO_CONTENT)
}

//! Handlers for role groups and the role catalog.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/objects/:type/:id/roles` | `?include=a,b&exclude=c&order=d,e` |
//! | `POST`   | `/objects/:type/:id/roles/:role_id/people` | Body: `{"id": 7}`; honours `If-Match` |
//! | `DELETE` | `/objects/:type/:id/roles/:role_id/people/:person_id` | Honours `If-Match` |
//! | `GET`    | `/roles` | The full catalog |
//! | `POST`   | `/roles` | Body: `{"name":..,"object_type":..,"mandatory":..}` |
//!
//! Mutations report every event the assignment engine dispatched, so a
//! client learns about conflicts and refetch hints from the response. A
//! failed mutation carries its events next to the error message.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use grc_core::{
  assignment::{AssignmentOptions, Change, RoleAssignment},
  conflict::ConflictDetector,
  event::{EventLog, RoleEvent},
  object::{LiveObject, ObjectRef, PersonRef},
  permission::Action,
  roles::{NewRole, Role, RoleCatalog, RoleGroup, RoleGroupBuilder, RoleListOptions},
  store::ObjectStore,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::{ApiError, store_error},
  etag::{check_if_match, compute_etag},
  objects::{load, require},
};

async fn catalog_of<S: ObjectStore>(state: &AppState<S>) -> Result<RoleCatalog, ApiError> {
  let roles = state.store.list_roles().await.map_err(store_error)?;
  Ok(RoleCatalog::new(roles))
}

fn detector<S: ObjectStore>(state: &AppState<S>) -> ConflictDetector {
  ConflictDetector::new(state.acl.conflict_roles.iter().cloned())
}

// ─── Role groups ──────────────────────────────────────────────────────────────

/// Comma-separated role names, as accepted in query strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GroupParams {
  pub include: Option<String>,
  pub exclude: Option<String>,
  pub order:   Option<String>,
}

fn split_names(names: Option<String>) -> Vec<String> {
  names
    .map(|s| {
      s.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .collect()
    })
    .unwrap_or_default()
}

impl From<GroupParams> for RoleListOptions {
  fn from(params: GroupParams) -> Self {
    Self {
      include: split_names(params.include),
      exclude: split_names(params.exclude),
      order:   split_names(params.order),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
  pub groups:        Vec<RoleGroup>,
  pub has_conflicts: bool,
}

/// `GET /objects/:type/:id/roles`
pub async fn list_groups<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id)): Path<(String, i64)>,
  Query(params): Query<GroupParams>,
) -> Result<Json<GroupsResponse>, ApiError> {
  let key = ObjectRef::new(type_name, id);
  require(&state, Action::Read, &key)?;
  let object = load(&state, &key).await?;
  let catalog = catalog_of(&state).await?;

  let groups = RoleGroupBuilder::new(&catalog, &state.acl)
    .get_role_list(Some(&object), &params.into());
  let has_conflicts = detector(&state).check(&groups, None).unwrap_or(false);

  Ok(Json(GroupsResponse { groups, has_conflicts }))
}

// ─── Assignment ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
  pub changed:       bool,
  pub group:         Option<RoleGroup>,
  pub has_conflicts: bool,
  pub events:        Vec<RoleEvent>,
}

enum Edit {
  Add(PersonRef),
  Remove(i64),
}

/// Run one add/remove through the assignment engine with immediate saving.
async fn assign<S: ObjectStore>(
  state: &AppState<S>,
  key: ObjectRef,
  role_id: i64,
  headers: &HeaderMap,
  edit: Edit,
) -> Result<Response, ApiError> {
  require(state, Action::Update, &key)?;
  let object = load(state, &key).await?;
  check_if_match(headers, &object)?;

  let catalog = catalog_of(state).await?;
  let groups = RoleGroupBuilder::new(&catalog, &state.acl)
    .get_role_list(Some(&object), &RoleListOptions::default());

  let events = EventLog::new();
  let mut engine = RoleAssignment::new(
    state.store.as_ref(),
    &events,
    detector(state),
    AssignmentOptions::default(),
    object,
    groups,
  );
  // Construction runs a full check; only report what this edit caused.
  events.drain();

  let change = match edit {
    Edit::Add(person) => engine.add_person(role_id, person).await,
    Edit::Remove(person_id) => engine.remove_person(role_id, person_id).await,
  };
  let change = match change {
    Ok(change) => change,
    Err(err) => return Ok(ApiError::from(err).with_events(events.drain())),
  };

  let group = engine.group(role_id).cloned();
  let has_conflicts = engine.has_conflicts();
  let saved: LiveObject = engine.into_object();
  state.cache.update(saved.clone());

  let etag = compute_etag(&saved);
  Ok(([(header::ETAG, etag)], Json(AssignmentResponse {
    changed: change == Change::Applied,
    group,
    has_conflicts,
    events: events.drain(),
  }))
  .into_response())
}

/// `POST /objects/:type/:id/roles/:role_id/people`
pub async fn add_person<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id, role_id)): Path<(String, i64, i64)>,
  headers: HeaderMap,
  Json(person): Json<PersonRef>,
) -> Result<Response, ApiError> {
  assign(&state, ObjectRef::new(type_name, id), role_id, &headers, Edit::Add(person)).await
}

/// `DELETE /objects/:type/:id/roles/:role_id/people/:person_id`
pub async fn remove_person<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Path((type_name, id, role_id, person_id)): Path<(String, i64, i64, i64)>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  assign(&state, ObjectRef::new(type_name, id), role_id, &headers, Edit::Remove(person_id)).await
}

// ─── Catalog ──────────────────────────────────────────────────────────────────

/// `GET /roles`
pub async fn catalog<S: ObjectStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Role>>, ApiError> {
  let roles = state.store.list_roles().await.map_err(store_error)?;
  Ok(Json(roles))
}

/// `POST /roles`
pub async fn create<S: ObjectStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewRole>,
) -> Result<impl IntoResponse, ApiError> {
  if body.name.is_empty() || body.object_type.is_empty() {
    return Err(ApiError::BadRequest("role name and object type are required".into()));
  }
  let role = state.store.add_role(body).await.map_err(store_error)?;
  Ok((StatusCode::CREATED, Json(role)))
}

//! JSON REST API over the GRC snapshot and role-assignment core.
//!
//! Exposes an axum [`Router`] backed by any [`grc_core::store::ObjectStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", grc_api::router(state))
//! ```

pub mod error;
pub mod etag;
pub mod objects;
pub mod roles;
pub mod snapshots;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post},
};
use grc_core::{
  cache::ObjectCache,
  classify::{ScopeClassifier, ScopeConfig},
  materialize::Materializer,
  permission::TypePolicy,
  registry::ModelRegistry,
  roles::AclConfig,
  store::ObjectStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `GRC_`-prefixed environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  pub store_path:  PathBuf,
  #[serde(default)]
  pub scope:       ScopeConfig,
  #[serde(default)]
  pub acl:         AclConfig,
  /// Permission policy applied to every request.
  #[serde(default)]
  pub permissions: TypePolicy,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ObjectStore> {
  pub store:      Arc<S>,
  pub registry:   Arc<ModelRegistry>,
  pub classifier: Arc<ScopeClassifier>,
  pub acl:        Arc<AclConfig>,
  pub policy:     Arc<TypePolicy>,
  /// Live objects read through the API; snapshot parents found here drive
  /// archival state of materialised snapshots.
  pub cache:      Arc<ObjectCache>,
}

impl<S: ObjectStore> AppState<S> {
  /// State over `store` with the standard model registry.
  pub fn new(store: Arc<S>, config: &ServerConfig) -> Self {
    Self {
      store,
      registry: Arc::new(ModelRegistry::standard()),
      classifier: Arc::new(ScopeClassifier::new(config.scope.clone())),
      acl: Arc::new(config.acl.clone()),
      policy: Arc::new(config.permissions.clone()),
      cache: Arc::new(ObjectCache::new()),
    }
  }

  pub(crate) fn materializer(&self) -> Materializer<'_, Arc<TypePolicy>> {
    Materializer::new(&self.registry, self.policy.clone()).with_cache(&self.cache)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<S>(state: AppState<S>) -> Router<()>
where
  S: ObjectStore + Clone + 'static,
{
  Router::new()
    // Live objects
    .route("/objects", get(objects::list::<S>).post(objects::create::<S>))
    .route(
      "/objects/{type}/{id}",
      get(objects::get_one::<S>)
        .put(objects::update::<S>)
        .delete(objects::delete_one::<S>),
    )
    // Role assignment
    .route("/objects/{type}/{id}/roles", get(roles::list_groups::<S>))
    .route("/objects/{type}/{id}/roles/{role_id}/people", post(roles::add_person::<S>))
    .route(
      "/objects/{type}/{id}/roles/{role_id}/people/{person_id}",
      delete(roles::remove_person::<S>),
    )
    // Snapshots
    .route(
      "/objects/{type}/{id}/snapshots",
      get(snapshots::list::<S>).post(snapshots::capture::<S>),
    )
    .route("/snapshots/{id}", get(snapshots::get_one::<S>))
    .route("/snapshots/{id}/latest", post(snapshots::update_to_latest::<S>))
    // Role catalog
    .route("/roles", get(roles::catalog::<S>).post(roles::create::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

//! Snapshot materialisation.
//!
//! Turns a raw [`Snapshot`] into a [`MaterializedObject`]: a typed,
//! display-ready projection that behaves like an instance of the original's
//! model while addressing the snapshot row.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  cache::{ArchiveWatch, ObjectCache},
  object::{AccessControlEntry, Governed, ObjectRef, PersonRef},
  permission::{Action, Permissions},
  registry::{ModelInfo, ModelRegistry},
  snapshot::Snapshot,
};

/// A snapshot projected into the shape of its original's model.
///
/// The scope parent's archival state is read through the watch on every
/// access, so [`can_get_latest_revision`](Self::can_get_latest_revision) and
/// the serialised `snapshot.archived` follow the parent after materialisation.
#[derive(Debug, Clone)]
pub struct MaterializedObject {
  /// The snapshot id, not the original's id.
  pub id:                   i64,
  pub type_name:            String,
  pub title:                String,
  pub description:          Option<String>,
  pub view_link:            String,
  pub self_link:            String,
  /// Canonical view URL of the live original.
  pub original_link:        String,
  pub can_read:             bool,
  pub last_assessment_date: Option<NaiveDate>,
  pub access_control_list:  Vec<AccessControlEntry>,
  /// The revision content this object was composed from.
  pub content:              Map<String, Value>,
  pub model:                ModelInfo,
  snapshot:                 Snapshot,
  /// Stale, updatable and with a live original.
  refreshable:              bool,
  archive:                  Option<ArchiveWatch>,
}

impl MaterializedObject {
  /// The scope parent's archival state: live while the parent is cached,
  /// otherwise the value captured when the snapshot was read.
  pub fn is_archived(&self) -> bool {
    self
      .archive
      .as_ref()
      .map_or(self.snapshot.archived, ArchiveWatch::is_archived)
  }

  pub fn can_get_latest_revision(&self) -> bool { self.refreshable && !self.is_archived() }

  /// Whether this object is observing its parent's archival state.
  pub fn is_bound_to_parent(&self) -> bool {
    self.archive.as_ref().is_some_and(|w| !w.is_detached())
  }

  /// The underlying snapshot, with `archived` as currently observed.
  pub fn snapshot(&self) -> Snapshot {
    Snapshot { archived: self.is_archived(), ..self.snapshot.clone() }
  }

  pub fn original(&self) -> ObjectRef { self.snapshot.child_ref() }
}

impl Serialize for MaterializedObject {
  fn serialize<Ser: Serializer>(&self, serializer: Ser) -> std::result::Result<Ser::Ok, Ser::Error> {
    #[derive(Serialize)]
    struct Wire<'a> {
      id:                      i64,
      #[serde(rename = "type")]
      type_name:               &'a str,
      title:                   &'a str,
      description:             Option<&'a str>,
      view_link:               &'a str,
      self_link:               &'a str,
      original_link:           &'a str,
      can_read:                bool,
      can_get_latest_revision: bool,
      last_assessment_date:    Option<NaiveDate>,
      access_control_list:     &'a [AccessControlEntry],
      content:                 &'a Map<String, Value>,
      snapshot:                Snapshot,
      model:                   &'a ModelInfo,
    }

    Wire {
      id:                      self.id,
      type_name:               &self.type_name,
      title:                   &self.title,
      description:             self.description.as_deref(),
      view_link:               &self.view_link,
      self_link:               &self.self_link,
      original_link:           &self.original_link,
      can_read:                self.can_read,
      can_get_latest_revision: self.can_get_latest_revision(),
      last_assessment_date:    self.last_assessment_date,
      access_control_list:     &self.access_control_list,
      content:                 &self.content,
      snapshot:                self.snapshot(),
      model:                   &self.model,
    }
    .serialize(serializer)
  }
}

impl Governed for MaterializedObject {
  fn object_ref(&self) -> ObjectRef { ObjectRef::new(&self.type_name, self.id) }

  fn type_name(&self) -> &str { &self.type_name }

  fn title(&self) -> &str { &self.title }

  fn description(&self) -> Option<&str> { self.description.as_deref() }

  fn access_control_list(&self) -> &[AccessControlEntry] {
    &self.access_control_list
  }
}

/// Materialises snapshots against a model registry, a permission predicate
/// and (optionally) the local object cache.
pub struct Materializer<'a, P> {
  registry:    &'a ModelRegistry,
  permissions: P,
  cache:       Option<&'a ObjectCache>,
}

impl<'a, P: Permissions> Materializer<'a, P> {
  pub fn new(registry: &'a ModelRegistry, permissions: P) -> Self {
    Self { registry, permissions, cache: None }
  }

  pub fn with_cache(mut self, cache: &'a ObjectCache) -> Self {
    self.cache = Some(cache);
    self
  }

  pub fn to_object(&self, snapshot: &Snapshot) -> Result<MaterializedObject> {
    let mut content = snapshot
      .revision
      .content
      .clone()
      .ok_or(Error::MissingRevisionContent(snapshot.id))?;

    let original = snapshot.child_ref();
    let original_link = self.registry.parent_url(snapshot);
    let view_link = snapshot.view_link();
    let self_link = snapshot.self_link();

    content.insert("id".into(), Value::from(snapshot.id));
    content.insert("type".into(), Value::from(snapshot.child_type.clone()));
    content.insert("originalLink".into(), Value::from(original_link.clone()));
    content.insert("viewLink".into(), Value::from(view_link.clone()));
    content.insert("selfLink".into(), Value::from(self_link.clone()));

    let can_read = self.permissions.is_allowed(Action::Read, &original);

    let model = self.registry.resolve_or_unregistered(&snapshot.child_type);
    let last_assessment_date = if model.supports_related_assessments {
      snapshot.last_assessment_date.or_else(|| {
        content
          .get("last_assessment_date")
          .and_then(Value::as_str)
          .and_then(|s| s.parse().ok())
      })
    } else {
      None
    };

    let access_control_list = rehydrate_acl(snapshot.id, content.get("access_control_list"));
    content.insert(
      "access_control_list".into(),
      serde_json::to_value(&access_control_list)?,
    );

    let archive = self
      .cache
      .and_then(|cache| cache.watch_archived(&snapshot.parent));

    let refreshable = snapshot.is_stale()
      && self.permissions.is_allowed(Action::Update, &original)
      && !snapshot.original_object_deleted;

    let title = text_field(&content, &["title", "name", "email"]).unwrap_or_default();
    let description = text_field(&content, &["description"]);

    if let Some(cache) = self.cache {
      cache.evict(&ObjectRef::new(&snapshot.child_type, snapshot.id));
    }

    Ok(MaterializedObject {
      id: snapshot.id,
      type_name: snapshot.child_type.clone(),
      title,
      description,
      view_link,
      self_link,
      original_link,
      can_read,
      last_assessment_date,
      access_control_list,
      content,
      model,
      snapshot: snapshot.clone(),
      refreshable,
      archive,
    })
  }

  /// Materialise every snapshot, preserving order.
  pub fn to_objects(&self, snapshots: &[Snapshot]) -> Result<Vec<MaterializedObject>> {
    snapshots.iter().map(|s| self.to_object(s)).collect()
  }
}

/// Rebuild typed ACL entries from frozen revision content.
fn rehydrate_acl(snapshot_id: i64, raw: Option<&Value>) -> Vec<AccessControlEntry> {
  let Some(entries) = raw.and_then(Value::as_array) else {
    return Vec::new();
  };
  entries
    .iter()
    .filter_map(|entry| {
      let role = entry.get("ac_role_id").and_then(Value::as_i64);
      let person = entry.get("person").and_then(PersonRef::from_value);
      match (role, person) {
        (Some(role), Some(person)) => Some(AccessControlEntry::new(role, person)),
        _ => {
          tracing::warn!(snapshot_id, ?entry, "dropping malformed ACL entry");
          None
        }
      }
    })
    .collect()
}

fn text_field(content: &Map<String, Value>, keys: &[&str]) -> Option<String> {
  keys
    .iter()
    .find_map(|k| content.get(*k).and_then(Value::as_str))
    .map(str::to_owned)
}

//! Governed objects: the live side of the object graph.
//!
//! A live object carries an access-control list and is versioned by the store.
//! Snapshots of it (see [`crate::snapshot`]) are frozen copies of its revision
//! content at capture time.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::snapshot::{Revision, Snapshot};

// ─── References ──────────────────────────────────────────────────────────────

/// A `{type, id}` pointer to any object in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
  #[serde(rename = "type")]
  pub type_name: String,
  pub id:        i64,
}

impl ObjectRef {
  pub fn new(type_name: impl Into<String>, id: i64) -> Self {
    Self { type_name: type_name.into(), id }
  }
}

impl fmt::Display for ObjectRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.type_name, self.id)
  }
}

/// The type name carried by every person stub.
pub const PERSON_TYPE: &str = "Person";

fn person_type() -> String { PERSON_TYPE.to_owned() }

/// Typed stub for a person assigned to a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonRef {
  pub id:   i64,
  #[serde(rename = "type", default = "person_type")]
  pub kind: String,
}

impl PersonRef {
  pub fn new(id: i64) -> Self { Self { id, kind: person_type() } }

  /// Rebuild a stub from an arbitrary JSON person payload.
  ///
  /// Only the numeric `id` is kept; everything else the payload carried
  /// (name, email, ...) is dropped. Returns `None` if no id is present.
  pub fn from_value(value: &Value) -> Option<Self> {
    value.get("id").and_then(Value::as_i64).map(Self::new)
  }
}

/// One `{role, person}` assignment on a governed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
  pub ac_role_id: i64,
  pub person:     PersonRef,
}

impl AccessControlEntry {
  pub fn new(ac_role_id: i64, person: PersonRef) -> Self {
    Self { ac_role_id, person }
  }
}

// ─── Governed trait ──────────────────────────────────────────────────────────

/// Anything that can be rendered and dispatched on as an instance of a model:
/// live objects and materialised snapshots alike.
pub trait Governed {
  fn object_ref(&self) -> ObjectRef;
  fn type_name(&self) -> &str;
  fn title(&self) -> &str;
  fn description(&self) -> Option<&str>;
  fn access_control_list(&self) -> &[AccessControlEntry];
}

// ─── Live objects ────────────────────────────────────────────────────────────

/// A live, editable object (a Control, an Audit, an Assessment, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveObject {
  pub id:                   i64,
  #[serde(rename = "type")]
  pub type_name:            String,
  pub title:                String,
  #[serde(default)]
  pub description:          Option<String>,
  #[serde(default)]
  pub archived:             bool,
  #[serde(default)]
  pub access_control_list:  Vec<AccessControlEntry>,
  /// Model-specific fields that the core does not interpret.
  #[serde(default)]
  pub attributes:           Map<String, Value>,
  #[serde(default)]
  pub last_assessment_date: Option<NaiveDate>,
  /// Store-assigned; bumped on every successful save.
  pub version:              i64,
  pub updated_at:           DateTime<Utc>,
}

impl LiveObject {
  /// The content recorded in a revision of this object.
  ///
  /// Bookkeeping fields (`version`, `updated_at`, `archived`) are excluded so
  /// that two revisions with the same user-visible state compare equal.
  pub fn revision_content(&self) -> Map<String, Value> {
    let mut content = self.attributes.clone();
    content.insert("id".into(), Value::from(self.id));
    content.insert("type".into(), Value::from(self.type_name.clone()));
    content.insert("title".into(), Value::from(self.title.clone()));
    content.insert(
      "description".into(),
      self.description.clone().map_or(Value::Null, Value::from),
    );
    content.insert(
      "access_control_list".into(),
      serde_json::to_value(&self.access_control_list).unwrap_or(Value::Null),
    );
    if let Some(date) = self.last_assessment_date {
      content.insert("last_assessment_date".into(), Value::from(date.to_string()));
    }
    content
  }
}

impl Governed for LiveObject {
  fn object_ref(&self) -> ObjectRef { ObjectRef::new(&self.type_name, self.id) }

  fn type_name(&self) -> &str { &self.type_name }

  fn title(&self) -> &str { &self.title }

  fn description(&self) -> Option<&str> { self.description.as_deref() }

  fn access_control_list(&self) -> &[AccessControlEntry] {
    &self.access_control_list
  }
}

/// Input to [`crate::store::ObjectStore::add_object`]. `id`, `version` and
/// `updated_at` are assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewObject {
  #[serde(rename = "type")]
  pub type_name:            String,
  pub title:                String,
  #[serde(default)]
  pub description:          Option<String>,
  #[serde(default)]
  pub archived:             bool,
  #[serde(default)]
  pub access_control_list:  Vec<AccessControlEntry>,
  #[serde(default)]
  pub attributes:           Map<String, Value>,
  #[serde(default)]
  pub last_assessment_date: Option<NaiveDate>,
}

impl NewObject {
  pub fn new(type_name: impl Into<String>, title: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      title: title.into(),
      ..Default::default()
    }
  }
}

// ─── GovernedObject ──────────────────────────────────────────────────────────

/// An instance entering the core, classified once at construction.
#[derive(Debug, Clone)]
pub enum GovernedObject {
  Live(LiveObject),
  Snapshot(Snapshot),
  Revision(Revision),
}

impl GovernedObject {
  /// The type name of the object this instance describes. For snapshots and
  /// revisions this is the original's type.
  pub fn type_name(&self) -> &str {
    match self {
      Self::Live(o) => &o.type_name,
      Self::Snapshot(s) => &s.child_type,
      Self::Revision(r) => &r.resource_type,
    }
  }
}

impl From<LiveObject> for GovernedObject {
  fn from(o: LiveObject) -> Self { Self::Live(o) }
}

impl From<Snapshot> for GovernedObject {
  fn from(s: Snapshot) -> Self { Self::Snapshot(s) }
}

impl From<Revision> for GovernedObject {
  fn from(r: Revision) -> Self { Self::Revision(r) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn control() -> LiveObject {
    LiveObject {
      id:                   55,
      type_name:            "Control".into(),
      title:                "Access reviews".into(),
      description:          None,
      archived:             false,
      access_control_list:  vec![AccessControlEntry::new(3, PersonRef::new(7))],
      attributes:           Map::new(),
      last_assessment_date: None,
      version:              4,
      updated_at:           Utc::now(),
    }
  }

  #[test]
  fn person_stub_drops_extra_fields() {
    let person = PersonRef::from_value(&json!({
      "id": 7, "type": "Person", "email": "user@example.com"
    }))
    .unwrap();
    assert_eq!(person, PersonRef::new(7));
    assert!(PersonRef::from_value(&json!({ "email": "x" })).is_none());
  }

  #[test]
  fn person_type_defaults_when_absent() {
    let person: PersonRef = serde_json::from_value(json!({ "id": 1 })).unwrap();
    assert_eq!(person.kind, PERSON_TYPE);
  }

  #[test]
  fn revision_content_ignores_bookkeeping() {
    let a = control();
    let mut b = control();
    b.version = 9;
    b.archived = true;
    b.updated_at = a.updated_at + chrono::Duration::hours(1);
    assert_eq!(a.revision_content(), b.revision_content());

    b.title = "Quarterly access reviews".into();
    assert_ne!(a.revision_content(), b.revision_content());
  }

  #[test]
  fn revision_content_carries_acl() {
    let content = control().revision_content();
    assert_eq!(
      content["access_control_list"],
      json!([{ "ac_role_id": 3, "person": { "id": 7, "type": "Person" } }])
    );
  }
}

//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`. Access-control lists, free-form attributes and revision
//! content are stored as compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use grc_core::{
  object::{AccessControlEntry, LiveObject, ObjectRef},
  roles::Role,
  snapshot::{Revision, Snapshot, freshness},
};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_acl(acl: &[AccessControlEntry]) -> Result<String> {
  Ok(serde_json::to_string(acl)?)
}

pub fn decode_acl(s: &str) -> Result<Vec<AccessControlEntry>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_attributes(attributes: &Map<String, Value>) -> Result<String> {
  Ok(serde_json::to_string(attributes)?)
}

pub fn decode_attributes(s: &str) -> Result<Map<String, Value>> {
  Ok(serde_json::from_str(s)?)
}

/// Revision content is only meaningful as a JSON object. Anything else
/// (including SQL `NULL`) decodes to `None` and fails later, at
/// materialisation.
pub fn decode_content(s: Option<&str>) -> Result<Option<Map<String, Value>>> {
  let Some(s) = s else { return Ok(None) };
  match serde_json::from_str::<Value>(s)? {
    Value::Object(map) => Ok(Some(map)),
    _ => Ok(None),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `objects` row.
pub struct RawObject {
  pub id:                   i64,
  pub type_name:            String,
  pub title:                String,
  pub description:          Option<String>,
  pub archived:             bool,
  pub acl_json:             String,
  pub attributes_json:      String,
  pub last_assessment_date: Option<String>,
  pub version:              i64,
  pub updated_at:           String,
}

/// Column list matching [`RawObject::from_row`].
pub const OBJECT_COLUMNS: &str = "id, type, title, description, archived, acl_json, \
                                  attributes_json, last_assessment_date, version, updated_at";

impl RawObject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(0)?,
      type_name:            row.get(1)?,
      title:                row.get(2)?,
      description:          row.get(3)?,
      archived:             row.get(4)?,
      acl_json:             row.get(5)?,
      attributes_json:      row.get(6)?,
      last_assessment_date: row.get(7)?,
      version:              row.get(8)?,
      updated_at:           row.get(9)?,
    })
  }

  pub fn into_object(self) -> Result<LiveObject> {
    Ok(LiveObject {
      id:                   self.id,
      type_name:            self.type_name,
      title:                self.title,
      description:          self.description,
      archived:             self.archived,
      access_control_list:  decode_acl(&self.acl_json)?,
      attributes:           decode_attributes(&self.attributes_json)?,
      last_assessment_date: self
        .last_assessment_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      version:              self.version,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read by [`crate::schema::SNAPSHOT_SELECT`].
pub struct RawSnapshot {
  pub id:                   i64,
  pub parent_type:          String,
  pub parent_id:            i64,
  pub child_type:           String,
  pub child_id:             i64,
  pub updated_at:           String,
  // pinned revision
  pub revision_id:          i64,
  pub revision_content:     Option<String>,
  pub revision_created_at:  String,
  // the original's latest revision
  pub latest_id:            Option<i64>,
  pub latest_content:       Option<String>,
  pub latest_created_at:    Option<String>,
  // objects joins
  pub original_exists:      bool,
  pub last_assessment_date: Option<String>,
  pub parent_archived:      bool,
}

impl RawSnapshot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(0)?,
      parent_type:          row.get(1)?,
      parent_id:            row.get(2)?,
      child_type:           row.get(3)?,
      child_id:             row.get(4)?,
      updated_at:           row.get(5)?,
      revision_id:          row.get(6)?,
      revision_content:     row.get(7)?,
      revision_created_at:  row.get(8)?,
      latest_id:            row.get(9)?,
      latest_content:       row.get(10)?,
      latest_created_at:    row.get(11)?,
      original_exists:      row.get(12)?,
      last_assessment_date: row.get(13)?,
      parent_archived:      row.get(14)?,
    })
  }

  pub fn into_snapshot(self) -> Result<Snapshot> {
    let revision = Revision {
      id:            self.revision_id,
      resource_type: self.child_type.clone(),
      resource_id:   self.child_id,
      content:       decode_content(self.revision_content.as_deref())?,
      created_at:    decode_dt(&self.revision_created_at)?,
    };

    let latest = match (self.latest_id, self.latest_created_at) {
      (Some(id), Some(created_at)) => Some(Revision {
        id,
        resource_type: self.child_type.clone(),
        resource_id: self.child_id,
        content: decode_content(self.latest_content.as_deref())?,
        created_at: decode_dt(&created_at)?,
      }),
      _ => None,
    };

    let (is_latest_revision, is_identical_revision) = freshness(&revision, latest.as_ref());

    Ok(Snapshot {
      id: self.id,
      child_type: self.child_type,
      child_id: self.child_id,
      parent: ObjectRef::new(self.parent_type, self.parent_id),
      revision,
      is_latest_revision,
      is_identical_revision,
      original_object_deleted: !self.original_exists,
      archived: self.parent_archived,
      updated_at: decode_dt(&self.updated_at)?,
      last_assessment_date: self
        .last_assessment_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
    })
  }
}

pub fn role_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Role> {
  Ok(Role {
    id:          row.get(0)?,
    name:        row.get(1)?,
    object_type: row.get(2)?,
    mandatory:   row.get(3)?,
  })
}

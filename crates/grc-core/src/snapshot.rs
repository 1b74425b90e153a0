//! Revisions and snapshots.
//!
//! Revisions are immutable. Each save of a live object appends one; nothing
//! ever rewrites its content. A snapshot pins one revision of an original
//! object under a scope parent (usually an Audit). Whether that revision is
//! still current is computed at read time by comparing it with the original's
//! latest revision, never by editing the snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::object::ObjectRef;

/// One immutable captured state of a live object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
  pub id:            i64,
  pub resource_type: String,
  pub resource_id:   i64,
  /// `None` only for malformed records; materialising such a snapshot fails.
  pub content:       Option<Map<String, Value>>,
  pub created_at:    DateTime<Utc>,
}

/// A snapshot of `child_type`/`child_id` owned by `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub id:                      i64,
  pub child_type:              String,
  pub child_id:                i64,
  pub parent:                  ObjectRef,
  pub revision:                Revision,
  pub is_latest_revision:      bool,
  pub is_identical_revision:   bool,
  pub original_object_deleted: bool,
  /// The scope parent's archival state at read time.
  #[serde(default)]
  pub archived:                bool,
  pub updated_at:              DateTime<Utc>,
  #[serde(default)]
  pub last_assessment_date:    Option<NaiveDate>,
}

impl Snapshot {
  /// The original object this snapshot was taken of.
  pub fn child_ref(&self) -> ObjectRef {
    ObjectRef::new(&self.child_type, self.child_id)
  }

  /// UI link addressing the snapshot row itself.
  pub fn view_link(&self) -> String { format!("/snapshots/{}", self.id) }

  /// API link addressing the snapshot row itself.
  pub fn self_link(&self) -> String { format!("/api/snapshots/{}", self.id) }

  /// Whether a newer, different revision of the original exists.
  pub fn is_stale(&self) -> bool {
    !self.is_latest_revision && !self.is_identical_revision
  }
}

/// Compute the freshness flags of a snapshot pinned to `pinned` given the
/// original's `latest` revision.
///
/// Returns `(is_latest_revision, is_identical_revision)`. When the original
/// has no revision at all the pinned one is considered latest.
pub fn freshness(pinned: &Revision, latest: Option<&Revision>) -> (bool, bool) {
  match latest {
    None => (true, true),
    Some(latest) => {
      let is_latest = latest.id == pinned.id;
      let is_identical = is_latest
        || (pinned.content.is_some() && pinned.content == latest.content);
      (is_latest, is_identical)
    }
  }
}

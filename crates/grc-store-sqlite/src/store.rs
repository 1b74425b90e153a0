//! [`SqliteStore`]: the SQLite implementation of [`ObjectStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value as SqlValue};
use serde_json::Value;

use grc_core::{
  object::{Governed as _, LiveObject, NewObject, ObjectRef},
  roles::{NewRole, Role},
  snapshot::Snapshot,
  store::ObjectStore,
};

use crate::{
  encode::{
    OBJECT_COLUMNS, RawObject, RawSnapshot, encode_acl, encode_attributes, encode_date,
    encode_dt, role_from_row,
  },
  schema::{SCHEMA, SNAPSHOT_SELECT},
  Error, Result,
};

/// Outcome of the version-checked update inside [`SqliteStore::save`].
enum SaveOutcome {
  Saved,
  Missing,
  Stale,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A GRC object store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run [`SNAPSHOT_SELECT`] with an extra `WHERE` clause bound to `params`.
  async fn query_snapshots(
    &self,
    filter: &'static str,
    params: Vec<SqlValue>,
  ) -> Result<Vec<Snapshot>> {
    let raws: Vec<RawSnapshot> = self
      .conn
      .call(move |conn| {
        let sql = format!("{SNAPSHOT_SELECT} WHERE {filter} ORDER BY s.id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawSnapshot::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSnapshot::into_snapshot).collect()
  }
}

// ─── ObjectStore impl ────────────────────────────────────────────────────────

impl ObjectStore for SqliteStore {
  type Error = Error;

  // ── Live objects ──────────────────────────────────────────────────────────

  async fn add_object(&self, input: NewObject) -> Result<LiveObject> {
    let mut object = LiveObject {
      id:                   0,
      type_name:            input.type_name,
      title:                input.title,
      description:          input.description,
      archived:             input.archived,
      access_control_list:  input.access_control_list,
      attributes:           input.attributes,
      last_assessment_date: input.last_assessment_date,
      version:              1,
      updated_at:           Utc::now(),
    };

    let type_name   = object.type_name.clone();
    let title       = object.title.clone();
    let description = object.description.clone();
    let archived    = object.archived;
    let acl_str     = encode_acl(&object.access_control_list)?;
    let attrs_str   = encode_attributes(&object.attributes)?;
    let date_str    = object.last_assessment_date.map(encode_date);
    let at_str      = encode_dt(object.updated_at);
    let mut content = object.revision_content();

    object.id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO objects (
             type, title, description, archived, acl_json, attributes_json,
             last_assessment_date, version, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
          rusqlite::params![
            type_name, title, description, archived, acl_str, attrs_str, date_str, at_str,
          ],
        )?;
        let id = tx.last_insert_rowid();

        content.insert("id".into(), Value::from(id));
        tx.execute(
          "INSERT INTO revisions (resource_type, resource_id, content, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![type_name, id, Value::Object(content).to_string(), at_str],
        )?;
        tx.commit()?;
        Ok(id)
      })
      .await?;

    tracing::debug!(object = %object.object_ref(), "object created");
    Ok(object)
  }

  async fn save(&self, object: &LiveObject) -> Result<LiveObject> {
    let mut saved = object.clone();
    saved.version = object.version + 1;
    saved.updated_at = Utc::now();

    let type_name   = saved.type_name.clone();
    let id          = saved.id;
    let expected    = object.version;
    let title       = saved.title.clone();
    let description = saved.description.clone();
    let archived    = saved.archived;
    let acl_str     = encode_acl(&saved.access_control_list)?;
    let attrs_str   = encode_attributes(&saved.attributes)?;
    let date_str    = saved.last_assessment_date.map(encode_date);
    let at_str      = encode_dt(saved.updated_at);
    let content     = Value::Object(saved.revision_content()).to_string();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<i64> = tx
          .query_row(
            "SELECT version FROM objects WHERE type = ?1 AND id = ?2",
            rusqlite::params![type_name, id],
            |r| r.get(0),
          )
          .optional()?;

        match current {
          None => return Ok(SaveOutcome::Missing),
          Some(v) if v != expected => return Ok(SaveOutcome::Stale),
          Some(_) => {}
        }

        tx.execute(
          "UPDATE objects SET
             title = ?3, description = ?4, archived = ?5, acl_json = ?6,
             attributes_json = ?7, last_assessment_date = ?8,
             version = version + 1, updated_at = ?9
           WHERE type = ?1 AND id = ?2",
          rusqlite::params![
            type_name, id, title, description, archived, acl_str, attrs_str, date_str, at_str,
          ],
        )?;
        tx.execute(
          "INSERT INTO revisions (resource_type, resource_id, content, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![type_name, id, content, at_str],
        )?;
        tx.commit()?;
        Ok(SaveOutcome::Saved)
      })
      .await?;

    match outcome {
      SaveOutcome::Saved => {
        tracing::debug!(object = %saved.object_ref(), version = saved.version, "object saved");
        Ok(saved)
      }
      SaveOutcome::Missing => Err(Error::ObjectNotFound(saved.object_ref())),
      SaveOutcome::Stale => Err(Error::VersionConflict {
        object: saved.object_ref(),
        expected,
      }),
    }
  }

  async fn refresh(&self, object: &ObjectRef) -> Result<Option<LiveObject>> {
    let type_name = object.type_name.clone();
    let id = object.id;

    let raw: Option<RawObject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {OBJECT_COLUMNS} FROM objects WHERE type = ?1 AND id = ?2"),
            rusqlite::params![type_name, id],
            RawObject::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawObject::into_object).transpose()
  }

  async fn delete_object(&self, object: &ObjectRef) -> Result<()> {
    let type_name = object.type_name.clone();
    let id = object.id;

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM objects WHERE type = ?1 AND id = ?2",
          rusqlite::params![type_name, id],
        )?)
      })
      .await?;

    if deleted == 0 {
      return Err(Error::ObjectNotFound(object.clone()));
    }
    tracing::debug!(%object, "object deleted");
    Ok(())
  }

  async fn list_objects(&self, type_name: Option<&str>) -> Result<Vec<LiveObject>> {
    let type_name = type_name.map(str::to_owned);

    let raws: Vec<RawObject> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(t) = type_name {
          let mut stmt = conn.prepare(&format!(
            "SELECT {OBJECT_COLUMNS} FROM objects WHERE type = ?1 ORDER BY id"
          ))?;
          stmt
            .query_map(rusqlite::params![t], RawObject::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt =
            conn.prepare(&format!("SELECT {OBJECT_COLUMNS} FROM objects ORDER BY id"))?;
          stmt
            .query_map([], RawObject::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawObject::into_object).collect()
  }

  // ── Snapshots ─────────────────────────────────────────────────────────────

  async fn capture_snapshots(
    &self,
    parent: &ObjectRef,
    children: &[ObjectRef],
  ) -> Result<Vec<Snapshot>> {
    if self.refresh(parent).await?.is_none() {
      return Err(Error::ObjectNotFound(parent.clone()));
    }

    let parent_type = parent.type_name.clone();
    let parent_id = parent.id;
    let targets: Vec<ObjectRef> = children.to_vec();
    let at_str = encode_dt(Utc::now());

    // Either the ids of the snapshots covering `children`, or the first child
    // that has no revision to pin.
    let captured: std::result::Result<Vec<i64>, ObjectRef> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(targets.len());
        for child in targets {
          let latest: Option<i64> = tx.query_row(
            "SELECT MAX(id) FROM revisions WHERE resource_type = ?1 AND resource_id = ?2",
            rusqlite::params![child.type_name, child.id],
            |r| r.get(0),
          )?;
          let Some(revision_id) = latest else {
            return Ok(Err(child));
          };

          tx.execute(
            "INSERT OR IGNORE INTO snapshots
               (parent_type, parent_id, child_type, child_id, revision_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              parent_type, parent_id, child.type_name, child.id, revision_id, at_str,
            ],
          )?;
          let id: i64 = tx.query_row(
            "SELECT id FROM snapshots
             WHERE parent_type = ?1 AND parent_id = ?2 AND child_type = ?3 AND child_id = ?4",
            rusqlite::params![parent_type, parent_id, child.type_name, child.id],
            |r| r.get(0),
          )?;
          ids.push(id);
        }
        tx.commit()?;
        Ok(Ok(ids))
      })
      .await?;

    let ids = captured.map_err(Error::ObjectNotFound)?;
    tracing::debug!(%parent, count = ids.len(), "snapshots captured");

    let mut snapshots = Vec::with_capacity(ids.len());
    for id in ids {
      let snapshot = self.get_snapshot(id).await?.ok_or(Error::SnapshotNotFound(id))?;
      snapshots.push(snapshot);
    }
    Ok(snapshots)
  }

  async fn get_snapshot(&self, id: i64) -> Result<Option<Snapshot>> {
    let mut found = self.query_snapshots("s.id = ?1", vec![SqlValue::Integer(id)]).await?;
    Ok(found.pop())
  }

  async fn list_snapshots(&self, parent: &ObjectRef) -> Result<Vec<Snapshot>> {
    self
      .query_snapshots("s.parent_type = ?1 AND s.parent_id = ?2", vec![
        SqlValue::Text(parent.type_name.clone()),
        SqlValue::Integer(parent.id),
      ])
      .await
  }

  async fn update_snapshot_to_latest(&self, id: i64) -> Result<Snapshot> {
    let at_str = encode_dt(Utc::now());

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE snapshots SET
             revision_id = (
               SELECT MAX(r.id) FROM revisions r
               WHERE r.resource_type = snapshots.child_type
                 AND r.resource_id = snapshots.child_id
             ),
             updated_at = ?2
           WHERE id = ?1",
          rusqlite::params![id, at_str],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::SnapshotNotFound(id));
    }
    tracing::debug!(snapshot = id, "snapshot re-pinned to latest revision");
    self.get_snapshot(id).await?.ok_or(Error::SnapshotNotFound(id))
  }

  // ── Role catalog ──────────────────────────────────────────────────────────

  async fn add_role(&self, input: NewRole) -> Result<Role> {
    let name = input.name.clone();
    let object_type = input.object_type.clone();
    let mandatory = input.mandatory;

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO roles (name, object_type, mandatory) VALUES (?1, ?2, ?3)",
          rusqlite::params![name, object_type, mandatory],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Role {
      id,
      name: input.name,
      object_type: input.object_type,
      mandatory,
    })
  }

  async fn list_roles(&self) -> Result<Vec<Role>> {
    let roles = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT id, name, object_type, mandatory FROM roles ORDER BY id")?;
        let rows = stmt
          .query_map([], role_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(roles)
  }
}

//! SQL schema for the GRC SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Live objects. `version` is bumped on every save and checked by the next one.
CREATE TABLE IF NOT EXISTS objects (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    type                 TEXT    NOT NULL,
    title                TEXT    NOT NULL,
    description          TEXT,
    archived             INTEGER NOT NULL DEFAULT 0,
    acl_json             TEXT    NOT NULL DEFAULT '[]',
    attributes_json      TEXT    NOT NULL DEFAULT '{}',
    last_assessment_date TEXT,             -- YYYY-MM-DD or NULL
    version              INTEGER NOT NULL,
    updated_at           TEXT    NOT NULL  -- ISO 8601 UTC
);

-- Revisions are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS revisions (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_type TEXT    NOT NULL,
    resource_id   INTEGER NOT NULL,
    content       TEXT,                    -- JSON object
    created_at    TEXT    NOT NULL
);

-- A snapshot pins one revision of a child under a scope parent. Only
-- `revision_id` and `updated_at` ever change (re-pinning to a newer revision).
CREATE TABLE IF NOT EXISTS snapshots (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_type TEXT    NOT NULL,
    parent_id   INTEGER NOT NULL,
    child_type  TEXT    NOT NULL,
    child_id    INTEGER NOT NULL,
    revision_id INTEGER NOT NULL REFERENCES revisions(id),
    updated_at  TEXT    NOT NULL,
    UNIQUE (parent_type, parent_id, child_type, child_id)
);

CREATE TABLE IF NOT EXISTS roles (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL,
    object_type TEXT    NOT NULL,
    mandatory   INTEGER NOT NULL DEFAULT 0,
    UNIQUE (name, object_type)
);

CREATE INDEX IF NOT EXISTS objects_type_idx       ON objects(type, id);
CREATE INDEX IF NOT EXISTS revisions_resource_idx ON revisions(resource_type, resource_id);
CREATE INDEX IF NOT EXISTS snapshots_parent_idx   ON snapshots(parent_type, parent_id);

PRAGMA user_version = 1;
";

/// Column list shared by every snapshot read. The pinned revision, the
/// original's latest revision, the original itself and the scope parent are
/// joined so that freshness and archival state resolve in one query.
pub const SNAPSHOT_SELECT: &str = "
SELECT
    s.id, s.parent_type, s.parent_id, s.child_type, s.child_id, s.updated_at,
    r.id, r.content, r.created_at,
    l.id, l.content, l.created_at,
    o.id IS NOT NULL         AS original_exists,
    o.last_assessment_date,
    COALESCE(p.archived, 0)  AS parent_archived
FROM snapshots s
JOIN revisions r      ON r.id = s.revision_id
LEFT JOIN revisions l ON l.id = (
    SELECT MAX(id) FROM revisions
    WHERE resource_type = s.child_type AND resource_id = s.child_id
)
LEFT JOIN objects o   ON o.type = s.child_type  AND o.id = s.child_id
LEFT JOIN objects p   ON p.type = s.parent_type AND p.id = s.parent_id
";

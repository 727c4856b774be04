//! SQLite schema for the orbit store.
//!
//! - `events` is the append-only log; `sequence_number` is the storage order
//!   used for pagination
//! - `entities` holds the latest snapshot per entity; `row_id` is stable
//!   across upserts so entity pagination order never changes
//! - `derived_task_components` is the due-time index, one row per component
//!   of each live task
//! - `metadata` holds small top-level key/value pairs
//! - `store_meta` records the schema version

/// Migration v1: tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS events (
    sequence_number INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    timestamp_millis INTEGER NOT NULL,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entities (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    entity_type TEXT NOT NULL CHECK (entity_type IN ('task', 'attachmentReference')),
    last_event_id TEXT NOT NULL,
    last_event_timestamp_millis INTEGER NOT NULL,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS derived_task_components (
    task_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    component_id TEXT NOT NULL,
    due_timestamp_millis INTEGER NOT NULL,
    PRIMARY KEY (task_id, component_id)
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_entity_sequence
    ON events(entity_id, sequence_number);

CREATE INDEX IF NOT EXISTS idx_entities_type_row
    ON entities(entity_type, row_id);

CREATE INDEX IF NOT EXISTS idx_derived_task_components_due
    ON derived_task_components(due_timestamp_millis, task_id);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by the list query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_events_entity_sequence",
    "idx_entities_type_row",
    "idx_derived_task_components_due",
];

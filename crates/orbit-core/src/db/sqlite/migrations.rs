//! Schema migrations tracked with `PRAGMA user_version`.
//!
//! `store_meta.schema_version` mirrors the pragma so the version survives
//! tools that rewrite the file header. Stores written by a newer build are
//! refused rather than opened with a schema this build doesn't know.

use super::schema;
use crate::db::StoreError;
use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this build.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// One forward step: the version it produces and the SQL that gets there.
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        sql: schema::MIGRATION_V1_SQL,
    },
    Migration {
        version: 2,
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Schema version recorded in the file header.
///
/// # Errors
///
/// Returns an error if the pragma can't be read or is negative.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error)))
}

/// Bring the store up to [`LATEST_SCHEMA_VERSION`] and return the version
/// it ends at.
///
/// Each pending step runs in its own transaction together with the version
/// bump, so an interrupted upgrade resumes from the last finished step.
///
/// # Errors
///
/// Returns [`StoreError::SchemaTooNew`] when the store is ahead of this
/// build, or the SQLite error of the failing step.
pub fn migrate(conn: &mut Connection) -> Result<u32, StoreError> {
    let found = current_schema_version(conn)?;
    if found > LATEST_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: LATEST_SCHEMA_VERSION,
        });
    }

    let pending = MIGRATIONS.iter().filter(|step| step.version > found);
    for step in pending {
        let version = i64::from(step.version);
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.execute("UPDATE store_meta SET schema_version = ?1 WHERE id = 1", [version])?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!(from = found, to = step.version, "upgraded orbit store schema");
    }

    Ok(LATEST_SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use crate::db::StoreError;
    use crate::db::sqlite::schema;
    use crate::error::ErrorCode;
    use rusqlite::{Connection, params};

    fn sqlite_object_exists(
        conn: &Connection,
        object_type: &str,
        object_name: &str,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            )",
            params![object_type, object_name],
            |row| row.get(0),
        )
    }

    #[test]
    fn migrate_empty_db_to_latest() -> Result<(), StoreError> {
        let mut conn = Connection::open_in_memory()?;

        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        for table in [
            "events",
            "entities",
            "derived_task_components",
            "metadata",
            "store_meta",
        ] {
            assert!(sqlite_object_exists(&conn, "table", table)?, "missing table {table}");
        }
        for index in schema::REQUIRED_INDEXES {
            assert!(
                sqlite_object_exists(&conn, "index", index)?,
                "missing expected index {index}"
            );
        }

        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> Result<(), StoreError> {
        let mut conn = Connection::open_in_memory()?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);

        let meta_rows: i64 = conn.query_row("SELECT COUNT(*) FROM store_meta", [], |row| row.get(0))?;
        assert_eq!(meta_rows, 1);

        let schema_version: i64 = conn.query_row(
            "SELECT schema_version FROM store_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(schema_version, i64::from(LATEST_SCHEMA_VERSION));

        Ok(())
    }

    #[test]
    fn migrate_upgrades_from_v1_keeping_rows() -> Result<(), StoreError> {
        let mut conn = Connection::open_in_memory()?;

        conn.execute_batch(schema::MIGRATION_V1_SQL)?;
        conn.pragma_update(None, "user_version", 1_i64)?;
        conn.execute(
            "INSERT INTO events (id, entity_id, event_type, timestamp_millis, data)
             VALUES ('e1', 't1', 'taskIngest', 5, '{}')",
            [],
        )?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        assert_eq!(count, 1);
        assert!(sqlite_object_exists(&conn, "index", "idx_events_entity_sequence")?);
        Ok(())
    }

    #[test]
    fn store_from_newer_build_is_refused() -> Result<(), StoreError> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        conn.pragma_update(None, "user_version", i64::from(LATEST_SCHEMA_VERSION + 1))?;

        let err = migrate(&mut conn).expect_err("newer schema must be refused");
        assert!(matches!(
            err,
            StoreError::SchemaTooNew { found, supported }
                if found == LATEST_SCHEMA_VERSION + 1 && supported == LATEST_SCHEMA_VERSION
        ));
        assert_eq!(err.code(), ErrorCode::UnsupportedSchemaVersion);
        // Nothing was rewritten.
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION + 1);
        Ok(())
    }
}

//! [`DatabaseBackend`] for [`SqliteBackend`].
//!
//! Events and entities are stored as their JSON wire form in `data`, with
//! the columns the queries filter on copied out beside it.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use std::collections::{BTreeMap, HashMap};

use super::{SqliteBackend, open};
use crate::db::StoreError;
use crate::db::backend::{
    DatabaseBackend, EntityRecord, EntityTransformer, EntityUpdate, EventHistory,
    distinct_entity_ids,
};
use crate::db::derived::task_component_rows;
use crate::db::query::{EntityPredicate, EntityQuery, EventPredicate, EventQuery};
use crate::event::Event;
use crate::model::{Entity, EntityId, EventId};

/// Upper bound on bound parameters per `IN (...)` list.
const IN_CHUNK_SIZE: usize = 500;

const EVENT_COLUMNS: &str = "id, data";
const ENTITY_COLUMNS: &str = "id, last_event_id, last_event_timestamp_millis, data";

// ---------------------------------------------------------------------------
// Row codecs
// ---------------------------------------------------------------------------

struct EventRow {
    id: String,
    data: String,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            data: row.get(1)?,
        })
    }

    fn decode(self) -> Result<Event, StoreError> {
        serde_json::from_str(&self.data).map_err(|source| StoreError::Corrupt {
            what: "event",
            id: self.id,
            source,
        })
    }
}

struct EntityRow {
    id: String,
    last_event_id: String,
    last_event_timestamp_millis: i64,
    data: String,
}

impl EntityRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            last_event_id: row.get(1)?,
            last_event_timestamp_millis: row.get(2)?,
            data: row.get(3)?,
        })
    }

    fn decode(self) -> Result<EntityRecord, StoreError> {
        let entity: Entity =
            serde_json::from_str(&self.data).map_err(|source| StoreError::Corrupt {
                what: "entity",
                id: self.id,
                source,
            })?;
        Ok(EntityRecord {
            entity,
            last_event_id: EventId::from(self.last_event_id),
            last_event_timestamp_millis: self.last_event_timestamp_millis,
        })
    }
}

fn encode<T: serde::Serialize>(what: &'static str, id: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode {
        what,
        id: id.to_string(),
        source,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn sql_limit(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded.
    limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn load_events(conn: &Connection, ids: &[EventId]) -> Result<HashMap<EventId, Event>, StoreError> {
    let mut events = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(IN_CHUNK_SIZE) {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter().map(EventId::as_str)), EventRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for row in rows {
            let event = row.decode()?;
            events.insert(event.id.clone(), event);
        }
    }
    Ok(events)
}

fn load_records(
    conn: &Connection,
    ids: &[EntityId],
) -> Result<HashMap<EntityId, EntityRecord>, StoreError> {
    let mut records = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(IN_CHUNK_SIZE) {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter().map(EntityId::as_str)), EntityRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for row in rows {
            let record = row.decode()?;
            records.insert(record.entity.id().clone(), record);
        }
    }
    Ok(records)
}

fn unstored_events(conn: &Connection, events: &[Event]) -> Result<Vec<Event>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)")?;
    let mut pending = Vec::with_capacity(events.len());
    for event in events {
        let stored: bool = stmt.query_row([event.id.as_str()], |row| row.get(0))?;
        if !stored {
            pending.push(event.clone());
        }
    }
    Ok(pending)
}

struct TransactionHistory<'conn> {
    conn: &'conn Connection,
}

impl EventHistory for TransactionHistory<'_> {
    fn events_for_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, data FROM events WHERE entity_id = ?1 ORDER BY sequence_number",
        )?;
        let rows = stmt
            .query_map([entity_id.as_str()], EventRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EventRow::decode).collect()
    }
}

fn cursor_position(
    conn: &Connection,
    table: &str,
    position_column: &str,
    after_id: Option<&str>,
) -> Result<i64, StoreError> {
    let Some(after_id) = after_id else {
        return Ok(0);
    };
    let sql = format!("SELECT {position_column} FROM {table} WHERE id = ?1");
    conn.query_row(&sql, [after_id], |row| row.get(0))
        .optional()?
        .ok_or_else(|| StoreError::UnknownAfterId {
            id: after_id.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

fn write_update(conn: &Connection, update: &EntityUpdate) -> Result<(), StoreError> {
    let mut insert_event = conn.prepare_cached(
        "INSERT INTO events (id, entity_id, event_type, timestamp_millis, data)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO NOTHING",
    )?;
    for event in &update.events {
        let data = encode("event", event.id.as_str(), event)?;
        insert_event.execute(params![
            event.id.as_str(),
            event.entity_id.as_str(),
            event.event_type().as_str(),
            event.timestamp_millis,
            data,
        ])?;
    }

    let record = &update.record;
    let entity_id = record.entity.id();
    let data = encode("entity", entity_id.as_str(), &record.entity)?;
    conn.prepare_cached(
        "INSERT INTO entities (id, entity_type, last_event_id, last_event_timestamp_millis, data)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             entity_type = excluded.entity_type,
             last_event_id = excluded.last_event_id,
             last_event_timestamp_millis = excluded.last_event_timestamp_millis,
             data = excluded.data",
    )?
    .execute(params![
        entity_id.as_str(),
        record.entity.entity_type().as_str(),
        record.last_event_id.as_str(),
        record.last_event_timestamp_millis,
        data,
    ])?;

    conn.prepare_cached("DELETE FROM derived_task_components WHERE task_id = ?1")?
        .execute([entity_id.as_str()])?;
    let mut insert_row = conn.prepare_cached(
        "INSERT INTO derived_task_components (task_id, component_id, due_timestamp_millis)
         VALUES (?1, ?2, ?3)",
    )?;
    for row in task_component_rows(&record.entity) {
        insert_row.execute(params![
            row.task_id.as_str(),
            row.component_id,
            row.due_timestamp_millis,
        ])?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// DatabaseBackend
// ---------------------------------------------------------------------------

impl DatabaseBackend for SqliteBackend {
    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let conn = guard.take().ok_or(StoreError::Closed)?;
        conn.close().map_err(|(_, error)| StoreError::Sqlite(error))
    }

    fn get_events(&self, ids: &[EventId]) -> Result<HashMap<EventId, Event>, StoreError> {
        let mut guard = self.lock()?;
        load_events(open(&mut guard)?, ids)
    }

    fn get_entities(
        &self,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityRecord>, StoreError> {
        let mut guard = self.lock()?;
        load_records(open(&mut guard)?, ids)
    }

    fn update_entities(
        &self,
        new_events: &[Event],
        transformer: &mut EntityTransformer<'_>,
    ) -> Result<Vec<EntityUpdate>, StoreError> {
        let mut guard = self.lock()?;
        let conn = open(&mut guard)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending = unstored_events(&tx, new_events)?;
        let records = load_records(&tx, &distinct_entity_ids(&pending))?;
        let history = TransactionHistory { conn: &tx };

        // Dropping `tx` on error rolls back.
        let updates = transformer(&pending, &records, &history)?;
        for update in &updates {
            write_update(&tx, update)?;
        }
        tx.commit()?;

        tracing::trace!(
            events = pending.len(),
            entities = updates.len(),
            "committed entity updates"
        );
        Ok(updates)
    }

    fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        let mut guard = self.lock()?;
        let conn = open(&mut guard)?;
        let start = cursor_position(
            conn,
            "events",
            "sequence_number",
            query.after_id.as_ref().map(EventId::as_str),
        )?;

        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE sequence_number > ?");
        let mut values = vec![Value::Integer(start)];
        if let Some(EventPredicate::EntityId(entity_id)) = &query.predicate {
            sql.push_str(" AND entity_id = ?");
            values.push(Value::Text(entity_id.to_string()));
        }
        sql.push_str(" ORDER BY sequence_number LIMIT ?");
        values.push(Value::Integer(sql_limit(query.limit)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), EventRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EventRow::decode).collect()
    }

    fn list_entities(&self, query: &EntityQuery) -> Result<Vec<EntityRecord>, StoreError> {
        query.validate()?;
        let mut guard = self.lock()?;
        let conn = open(&mut guard)?;
        let start = cursor_position(
            conn,
            "entities",
            "row_id",
            query.after_id.as_ref().map(EntityId::as_str),
        )?;

        let mut sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_type = ? AND row_id > ?"
        );
        let mut values = vec![
            Value::Text(query.entity_type.as_str().to_string()),
            Value::Integer(start),
        ];
        if let Some(EntityPredicate::DueTimestampMillis(relation, due)) = query.predicate {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM derived_task_components d
                              WHERE d.task_id = entities.id
                                AND d.due_timestamp_millis {} ?)",
                relation.sql_op()
            ));
            values.push(Value::Integer(due));
        }
        sql.push_str(" ORDER BY row_id LIMIT ?");
        values.push(Value::Integer(sql_limit(query.limit)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), EntityRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EntityRow::decode).collect()
    }

    fn get_metadata_values(&self, keys: &[String]) -> Result<HashMap<String, String>, StoreError> {
        let mut guard = self.lock()?;
        let conn = open(&mut guard)?;
        let mut values = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(IN_CHUNK_SIZE) {
            let sql = format!(
                "SELECT key, value FROM metadata WHERE key IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            values.extend(rows);
        }
        Ok(values)
    }

    fn set_metadata_values(
        &self,
        values: &BTreeMap<String, Option<String>>,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let conn = open(&mut guard)?;
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            let mut delete = tx.prepare_cached("DELETE FROM metadata WHERE key = ?1")?;
            for (key, value) in values {
                match value {
                    Some(value) => upsert.execute(params![key, value])?,
                    None => delete.execute([key])?,
                };
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventData, TaskIngestData, TaskUpdateDeletedData};
    use crate::model::{TaskContent, TaskContentField, TaskSpec};
    use crate::reducer::{EventReducer, OrbitEventReducer};
    use crate::scheduler::SpacedRepetitionScheduler;

    fn ingest(event_id: &str, entity_id: &str, timestamp_millis: i64) -> Event {
        Event::new(
            event_id,
            entity_id,
            timestamp_millis,
            EventData::TaskIngest(TaskIngestData {
                spec: TaskSpec::memory(TaskContent::Plain {
                    body: TaskContentField::text("body"),
                }),
                provenance: None,
                metadata: None,
            }),
        )
    }

    #[test]
    fn corrupt_entity_row_surfaces_decode_error() {
        let backend = SqliteBackend::open_in_memory().expect("open");
        {
            let mut guard = backend.lock().expect("lock");
            let conn = open(&mut guard).expect("conn");
            conn.execute(
                "INSERT INTO entities (id, entity_type, last_event_id, last_event_timestamp_millis, data)
                 VALUES ('t', 'task', 'e', 1, '{not json')",
                [],
            )
            .expect("insert");
        }
        let err = backend
            .get_entities(&[EntityId::from("t")])
            .expect_err("corrupt row");
        assert!(matches!(err, StoreError::Corrupt { what: "entity", .. }));
    }

    #[test]
    fn history_sees_only_committed_rows_for_entity() {
        let backend = SqliteBackend::open_in_memory().expect("open");
        let first = ingest("e1", "t", 10);
        let other = ingest("e2", "u", 11);
        backend
            .update_entities(&[first.clone(), other], &mut |events, _, _| {
                Ok(events
                    .iter()
                    .map(|event| EntityUpdate {
                        record: EntityRecord {
                            entity: OrbitEventReducer::<SpacedRepetitionScheduler>::default()
                                .reduce(None, event)
                                .expect("reduce"),
                            last_event_id: event.id.clone(),
                            last_event_timestamp_millis: event.timestamp_millis,
                        },
                        events: vec![event.clone()],
                    })
                    .collect())
            })
            .expect("seed");

        let delete = Event::new(
            "e3",
            "t",
            12,
            EventData::TaskUpdateDeleted(TaskUpdateDeletedData { is_deleted: true }),
        );
        let mut seen = Vec::new();
        backend
            .update_entities(&[delete, first], &mut |events, records, history| {
                assert_eq!(events.len(), 1, "stored event filtered out");
                assert!(records.contains_key("t"));
                seen = history.events_for_entity(&EntityId::from("t"))?;
                Ok(Vec::new())
            })
            .expect("update");
        assert_eq!(
            seen.iter().map(|event| event.id.as_str()).collect::<Vec<_>>(),
            vec!["e1"]
        );
    }
}

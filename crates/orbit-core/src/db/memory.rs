//! In-memory backend, used by tests and short-lived tools.
//!
//! Storage order is insertion order: events and entities live in vectors and
//! a map from ID to position serves point lookups and cursors. The derived
//! due-time index is an ordered map from due time to `(task, component)`
//! pairs. It can answer a range scan but not in entity order, so due-time
//! queries collect every matching task, sort by storage position, then
//! apply the cursor and limit.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::StoreError;
use super::backend::{DatabaseBackend, EntityRecord, EntityTransformer, EntityUpdate, EventHistory};
use super::derived::{DueIndexRow, task_component_rows};
use super::query::{EntityPredicate, EntityQuery, EventPredicate, EventQuery};
use crate::event::Event;
use crate::model::{ComponentId, EntityId, EventId, TaskId};

#[derive(Debug, Default)]
struct MemoryState {
    events: Vec<Event>,
    event_positions: HashMap<EventId, usize>,
    entities: Vec<EntityRecord>,
    entity_positions: HashMap<EntityId, usize>,
    due_index: BTreeMap<i64, BTreeSet<(TaskId, ComponentId)>>,
    task_rows: HashMap<TaskId, Vec<DueIndexRow>>,
    metadata: HashMap<String, String>,
}

impl MemoryState {
    fn put_event(&mut self, event: &Event) {
        if self.event_positions.contains_key(&event.id) {
            return;
        }
        self.event_positions.insert(event.id.clone(), self.events.len());
        self.events.push(event.clone());
    }

    fn put_record(&mut self, record: EntityRecord) {
        let id = record.entity.id().clone();
        self.replace_index_rows(&id, task_component_rows(&record.entity));
        if let Some(&position) = self.entity_positions.get(&id) {
            self.entities[position] = record;
        } else {
            self.entity_positions.insert(id, self.entities.len());
            self.entities.push(record);
        }
    }

    fn replace_index_rows(&mut self, task_id: &TaskId, rows: Vec<DueIndexRow>) {
        for old in self.task_rows.remove(task_id).unwrap_or_default() {
            if let Some(bucket) = self.due_index.get_mut(&old.due_timestamp_millis) {
                bucket.remove(&(old.task_id, old.component_id));
                if bucket.is_empty() {
                    self.due_index.remove(&old.due_timestamp_millis);
                }
            }
        }
        if rows.is_empty() {
            return;
        }
        for row in &rows {
            self.due_index
                .entry(row.due_timestamp_millis)
                .or_default()
                .insert((row.task_id.clone(), row.component_id.clone()));
        }
        self.task_rows.insert(task_id.clone(), rows);
    }

    fn entity_cursor(&self, after_id: Option<&EntityId>) -> Result<Option<usize>, StoreError> {
        after_id
            .map(|id| {
                self.entity_positions
                    .get(id)
                    .copied()
                    .ok_or_else(|| StoreError::UnknownAfterId { id: id.to_string() })
            })
            .transpose()
    }

    fn event_cursor(&self, after_id: Option<&EventId>) -> Result<Option<usize>, StoreError> {
        after_id
            .map(|id| {
                self.event_positions
                    .get(id)
                    .copied()
                    .ok_or_else(|| StoreError::UnknownAfterId { id: id.to_string() })
            })
            .transpose()
    }
}

impl EventHistory for MemoryState {
    fn events_for_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>, StoreError> {
        Ok(self
            .events
            .iter()
            .filter(|event| &event.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

/// In-memory [`DatabaseBackend`].
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<Option<MemoryState>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Some(MemoryState::default())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<MemoryState>>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn open(guard: &mut Option<MemoryState>) -> Result<&mut MemoryState, StoreError> {
    guard.as_mut().ok_or(StoreError::Closed)
}

impl DatabaseBackend for MemoryBackend {
    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.take().map(|_| ()).ok_or(StoreError::Closed)
    }

    fn get_events(&self, ids: &[EventId]) -> Result<HashMap<EventId, Event>, StoreError> {
        let mut guard = self.lock()?;
        let state = open(&mut guard)?;
        Ok(ids
            .iter()
            .filter_map(|id| state.event_positions.get(id))
            .map(|&position| {
                let event = &state.events[position];
                (event.id.clone(), event.clone())
            })
            .collect())
    }

    fn get_entities(
        &self,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityRecord>, StoreError> {
        let mut guard = self.lock()?;
        let state = open(&mut guard)?;
        Ok(ids
            .iter()
            .filter_map(|id| state.entity_positions.get(id))
            .map(|&position| {
                let record = &state.entities[position];
                (record.entity.id().clone(), record.clone())
            })
            .collect())
    }

    fn update_entities(
        &self,
        new_events: &[Event],
        transformer: &mut EntityTransformer<'_>,
    ) -> Result<Vec<EntityUpdate>, StoreError> {
        let mut guard = self.lock()?;
        let state = open(&mut guard)?;

        let pending: Vec<Event> = new_events
            .iter()
            .filter(|event| !state.event_positions.contains_key(&event.id))
            .cloned()
            .collect();
        let entity_ids: HashSet<&EntityId> = pending.iter().map(|event| &event.entity_id).collect();
        let records: HashMap<EntityId, EntityRecord> = entity_ids
            .into_iter()
            .filter_map(|id| state.entity_positions.get(id))
            .map(|&position| {
                let record = &state.entities[position];
                (record.entity.id().clone(), record.clone())
            })
            .collect();

        // Nothing is written unless the transformer succeeds.
        let updates = transformer(&pending, &records, &*state)?;

        for update in &updates {
            for event in &update.events {
                state.put_event(event);
            }
            state.put_record(update.record.clone());
        }
        Ok(updates)
    }

    fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        let mut guard = self.lock()?;
        let state = open(&mut guard)?;
        let start = state
            .event_cursor(query.after_id.as_ref())?
            .map_or(0, |position| position + 1);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(state.events[start.min(state.events.len())..]
            .iter()
            .filter(|event| match &query.predicate {
                Some(EventPredicate::EntityId(id)) => &event.entity_id == id,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn list_entities(&self, query: &EntityQuery) -> Result<Vec<EntityRecord>, StoreError> {
        query.validate()?;
        let mut guard = self.lock()?;
        let state = open(&mut guard)?;
        let start = state
            .entity_cursor(query.after_id.as_ref())?
            .map_or(0, |position| position + 1);
        let limit = query.limit.unwrap_or(usize::MAX);

        let positions: Vec<usize> = match query.predicate {
            None => (start..state.entities.len())
                .filter(|&position| state.entities[position].entity.entity_type() == query.entity_type)
                .take(limit)
                .collect(),
            Some(EntityPredicate::DueTimestampMillis(relation, value)) => {
                let mut matching: Vec<usize> = state
                    .due_index
                    .range(relation.range_bounds(value))
                    .flat_map(|(_, bucket)| bucket.iter().map(|(task_id, _)| task_id))
                    .filter_map(|task_id| state.entity_positions.get(task_id).copied())
                    .collect::<BTreeSet<usize>>()
                    .into_iter()
                    .filter(|&position| position >= start)
                    .collect();
                matching.truncate(limit);
                matching
            }
        };

        Ok(positions
            .into_iter()
            .map(|position| state.entities[position].clone())
            .collect())
    }

    fn get_metadata_values(&self, keys: &[String]) -> Result<HashMap<String, String>, StoreError> {
        let mut guard = self.lock()?;
        let state = open(&mut guard)?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                state
                    .metadata
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect())
    }

    fn set_metadata_values(
        &self,
        values: &BTreeMap<String, Option<String>>,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let state = open(&mut guard)?;
        for (key, value) in values {
            match value {
                Some(value) => {
                    state.metadata.insert(key.clone(), value.clone());
                }
                None => {
                    state.metadata.remove(key);
                }
            }
        }
        Ok(())
    }
}

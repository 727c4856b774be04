//! Database orchestration: merges new events into entity snapshots.
//!
//! [`Database::put_events`] groups incoming events by entity and hands each
//! batch of entities to [`DatabaseBackend::update_entities`]. Inside that
//! transaction every entity takes one of two paths:
//!
//! - **fast path**: no stored snapshot yet, or every new event is strictly
//!   newer than the stored `last_event_timestamp_millis`. New events are
//!   sorted and folded onto the stored snapshot.
//! - **slow path**: at least one new event is not newer than the snapshot.
//!   The full stored history plus the new events is sorted and folded from
//!   scratch.
//!
//! Both paths sort with [`sort_events`], so they agree on the result.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use super::StoreError;
use super::backend::{DatabaseBackend, EntityRecord, EntityUpdate, EventHistory, distinct_entity_ids};
use super::query::{EntityQuery, EventQuery};
use crate::event::{Event, sort_events};
use crate::model::{Entity, EntityId, EventId};
use crate::reducer::{EventReducer, OrbitEventReducer, ReduceError, fold_events};

/// Entities per `update_entities` transaction.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A newly applied event and the snapshot it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEvent {
    pub event: Event,
    pub entity: Entity,
}

/// An entity whose new events could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub entity_id: EntityId,
    pub error: ReduceError,
}

// ---------------------------------------------------------------------------
// RebuildReport
// ---------------------------------------------------------------------------

/// Report returned after recomputing snapshots from the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Entities whose snapshot was rewritten.
    pub entity_count: usize,
    /// Events replayed across those entities.
    pub event_count: usize,
    /// Entities whose history no longer reduces; their old snapshot is kept.
    pub failures: Vec<EntityFailure>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Merge strategies
// ---------------------------------------------------------------------------

/// Result of merging one entity's new events.
enum Merge {
    Updated {
        update: EntityUpdate,
        applied: Vec<AppliedEvent>,
    },
    Rejected(ReduceError),
    Unchanged,
}

fn record_for(snapshots: &[Entity], events: &[Event]) -> Option<EntityRecord> {
    let entity = snapshots.last()?.clone();
    let last = events.last()?;
    Some(EntityRecord {
        entity,
        last_event_id: last.id.clone(),
        last_event_timestamp_millis: last.timestamp_millis,
    })
}

/// Fold sorted new events onto the stored snapshot.
fn merge_fast<R: EventReducer + ?Sized>(
    reducer: &R,
    current: Option<&EntityRecord>,
    mut new_events: Vec<Event>,
) -> Merge {
    sort_events(&mut new_events);
    let seed = current.map(|record| record.entity.clone());
    let snapshots = match fold_events(reducer, seed, &new_events) {
        Ok(snapshots) => snapshots,
        Err(error) => return Merge::Rejected(error),
    };
    let Some(record) = record_for(&snapshots, &new_events) else {
        return Merge::Unchanged;
    };
    let applied = new_events
        .iter()
        .cloned()
        .zip(snapshots)
        .map(|(event, entity)| AppliedEvent { event, entity })
        .collect();
    Merge::Updated {
        update: EntityUpdate {
            record,
            events: new_events,
        },
        applied,
    }
}

/// Recompute the snapshot from the full history plus the new events.
fn merge_slow<R: EventReducer + ?Sized>(
    reducer: &R,
    entity_id: &EntityId,
    history: Vec<Event>,
    new_events: Vec<Event>,
) -> Result<Merge, StoreError> {
    let stored: HashSet<EventId> = history.iter().map(|event| event.id.clone()).collect();
    let fresh: Vec<Event> = new_events
        .into_iter()
        .filter(|event| !stored.contains(&event.id))
        .collect();
    if fresh.is_empty() && !history.is_empty() {
        return Ok(Merge::Unchanged);
    }
    let fresh_ids: HashSet<EventId> = fresh.iter().map(|event| event.id.clone()).collect();

    let mut all_events = history;
    all_events.extend(fresh.iter().cloned());
    if all_events.is_empty() {
        return Err(StoreError::EmptyHistory {
            entity_id: entity_id.clone(),
        });
    }
    sort_events(&mut all_events);

    let snapshots = match fold_events(reducer, None, &all_events) {
        Ok(snapshots) => snapshots,
        Err(error) => return Ok(Merge::Rejected(error)),
    };
    let Some(record) = record_for(&snapshots, &all_events) else {
        return Ok(Merge::Unchanged);
    };
    let applied = all_events
        .into_iter()
        .zip(snapshots)
        .filter(|(event, _)| fresh_ids.contains(&event.id))
        .map(|(event, entity)| AppliedEvent { event, entity })
        .collect();
    Ok(Merge::Updated {
        update: EntityUpdate {
            record,
            events: fresh,
        },
        applied,
    })
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Event store: persists events and keeps entity snapshots up to date.
///
/// The database owns no state beyond its backend and reducer; all data lives
/// in the backend.
pub struct Database<B, R = OrbitEventReducer> {
    backend: B,
    reducer: R,
    batch_size: usize,
}

impl<B: DatabaseBackend> Database<B> {
    /// A database using the default reducer and scheduler.
    pub fn new(backend: B) -> Self {
        Self::with_reducer(backend, OrbitEventReducer::default())
    }
}

impl<B: DatabaseBackend, R: EventReducer> Database<B, R> {
    pub const fn with_reducer(backend: B, reducer: R) -> Self {
        Self {
            backend,
            reducer,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of entities merged per backend transaction.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Close the backend; the database is unusable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] if already closed.
    pub fn close(&self) -> Result<(), StoreError> {
        self.backend.close()
    }

    /// Store `events` and update the snapshots of the entities they address.
    ///
    /// Events whose IDs are already stored (or repeated within `events`) are
    /// ignored. Returns every newly applied event with the snapshot it
    /// produced.
    ///
    /// Entities are merged independently in batches. If some entity's events
    /// fail to reduce, none of that entity's events are stored, every other
    /// entity is still committed, and the call returns
    /// [`StoreError::EntityUpdatesRejected`] carrying both the failures and
    /// the applied events.
    ///
    /// # Errors
    ///
    /// Backend errors abort the call immediately; batches committed before
    /// the error stay committed.
    pub fn put_events(&self, events: Vec<Event>) -> Result<Vec<AppliedEvent>, StoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let events: Vec<Event> = events
            .into_iter()
            .filter(|event| seen.insert(event.id.clone()))
            .collect();

        let entity_ids = distinct_entity_ids(&events);
        let mut by_entity: HashMap<EntityId, Vec<Event>> = HashMap::new();
        for event in events {
            by_entity.entry(event.entity_id.clone()).or_default().push(event);
        }

        let mut applied = Vec::new();
        let mut failures = Vec::new();
        for chunk in entity_ids.chunks(self.batch_size) {
            let chunk_events: Vec<Event> = chunk
                .iter()
                .filter_map(|id| by_entity.remove(id))
                .flatten()
                .collect();
            self.backend
                .update_entities(&chunk_events, &mut |pending, records, history| {
                    self.merge_batch(pending, records, history, &mut applied, &mut failures)
                })?;
        }

        if failures.is_empty() {
            Ok(applied)
        } else {
            for failure in &failures {
                tracing::warn!(
                    entity_id = %failure.entity_id,
                    event_id = %failure.error.event_id(),
                    error = %failure.error,
                    "rejected entity update"
                );
            }
            Err(StoreError::EntityUpdatesRejected { failures, applied })
        }
    }

    fn merge_batch(
        &self,
        pending: &[Event],
        records: &HashMap<EntityId, EntityRecord>,
        history: &dyn EventHistory,
        applied: &mut Vec<AppliedEvent>,
        failures: &mut Vec<EntityFailure>,
    ) -> Result<Vec<EntityUpdate>, StoreError> {
        let mut grouped: BTreeMap<usize, (EntityId, Vec<Event>)> = BTreeMap::new();
        let mut position: HashMap<&EntityId, usize> = HashMap::new();
        for event in pending {
            let next = position.len();
            let slot = *position.entry(&event.entity_id).or_insert(next);
            grouped
                .entry(slot)
                .or_insert_with(|| (event.entity_id.clone(), Vec::new()))
                .1
                .push(event.clone());
        }

        let mut updates = Vec::with_capacity(grouped.len());
        for (entity_id, new_events) in grouped.into_values() {
            let current = records.get(&entity_id);
            let in_order = current.is_none_or(|record| {
                new_events
                    .iter()
                    .all(|event| event.timestamp_millis > record.last_event_timestamp_millis)
            });

            let merge = if in_order {
                tracing::debug!(entity_id = %entity_id, events = new_events.len(), "fast-path merge");
                merge_fast(&self.reducer, current, new_events)
            } else {
                tracing::debug!(entity_id = %entity_id, events = new_events.len(), "slow-path merge");
                let stored = history.events_for_entity(&entity_id)?;
                merge_slow(&self.reducer, &entity_id, stored, new_events)?
            };

            match merge {
                Merge::Updated {
                    update,
                    applied: entity_applied,
                } => {
                    applied.extend(entity_applied);
                    updates.push(update);
                }
                Merge::Rejected(error) => failures.push(EntityFailure { entity_id, error }),
                Merge::Unchanged => {}
            }
        }
        Ok(updates)
    }

    /// Point lookup of events. Missing IDs are absent.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn get_events(&self, ids: &[EventId]) -> Result<HashMap<EventId, Event>, StoreError> {
        self.backend.get_events(ids)
    }

    /// Point lookup of entity snapshots. Missing IDs are absent.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn get_entities(&self, ids: &[EntityId]) -> Result<HashMap<EntityId, Entity>, StoreError> {
        Ok(self
            .backend
            .get_entities(ids)?
            .into_iter()
            .map(|(id, record)| (id, record.entity))
            .collect())
    }

    /// Events in stable storage order; see [`EventQuery`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAfterId`] for an unknown cursor.
    pub fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        self.backend.list_events(query)
    }

    /// Entity snapshots in stable storage order; see [`EntityQuery`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAfterId`] for an unknown cursor or
    /// [`StoreError::UnsupportedPredicate`] for an unindexed predicate.
    pub fn list_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>, StoreError> {
        query.validate()?;
        Ok(self
            .backend
            .list_entities(query)?
            .into_iter()
            .map(|record| record.entity)
            .collect())
    }

    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn get_metadata_values(&self, keys: &[String]) -> Result<HashMap<String, String>, StoreError> {
        self.backend.get_metadata_values(keys)
    }

    /// `None` values delete their key.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn set_metadata_values(
        &self,
        values: &BTreeMap<String, Option<String>>,
    ) -> Result<(), StoreError> {
        self.backend.set_metadata_values(values)
    }

    // -----------------------------------------------------------------------
    // Rebuild
    // -----------------------------------------------------------------------

    /// Recompute the snapshots of `ids` from their full event history.
    ///
    /// Use after changing the reducer or scheduler configuration. IDs with
    /// no stored events are skipped.
    ///
    /// # Errors
    ///
    /// Propagates backend errors. Entities that no longer reduce are
    /// reported in [`RebuildReport::failures`], not as an error.
    pub fn rebuild_entities(&self, ids: &[EntityId]) -> Result<RebuildReport, StoreError> {
        let start = Instant::now();
        let mut report = RebuildReport {
            entity_count: 0,
            event_count: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        };

        for chunk in ids.chunks(self.batch_size) {
            let updates = self
                .backend
                .update_entities(&[], &mut |_pending, _records, history| {
                    let mut updates = Vec::new();
                    for entity_id in chunk {
                        let mut events = history.events_for_entity(entity_id)?;
                        if events.is_empty() {
                            continue;
                        }
                        sort_events(&mut events);
                        match fold_events(&self.reducer, None, &events) {
                            Ok(snapshots) => {
                                report.event_count += events.len();
                                if let Some(record) = record_for(&snapshots, &events) {
                                    updates.push(EntityUpdate {
                                        record,
                                        events: Vec::new(),
                                    });
                                }
                            }
                            Err(error) => report.failures.push(EntityFailure {
                                entity_id: entity_id.clone(),
                                error,
                            }),
                        }
                    }
                    Ok(updates)
                })?;
            report.entity_count += updates.len();
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            entity_count = report.entity_count,
            event_count = report.event_count,
            failures = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "rebuilt entity snapshots"
        );
        Ok(report)
    }

    /// Recompute every entity that appears in the event log.
    ///
    /// # Errors
    ///
    /// Same as [`Self::rebuild_entities`].
    pub fn rebuild_all_entities(&self) -> Result<RebuildReport, StoreError> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut query = EventQuery {
            limit: Some(self.batch_size.saturating_mul(10)),
            ..EventQuery::default()
        };
        loop {
            let page = self.backend.list_events(&query)?;
            let Some(last) = page.last() else {
                break;
            };
            query.after_id = Some(last.id.clone());
            for event in page {
                if seen.insert(event.entity_id.clone()) {
                    ids.push(event.entity_id);
                }
            }
        }
        self.rebuild_entities(&ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryBackend;
    use crate::error::ErrorCode;
    use crate::event::{EventData, TaskIngestData, TaskRescheduleData, TaskUpdateDeletedData};
    use crate::model::{TaskContent, TaskContentField, TaskSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ingest(id: &str, entity: &str, ts: i64) -> Event {
        Event::new(
            id,
            entity,
            ts,
            EventData::TaskIngest(TaskIngestData {
                spec: TaskSpec::memory(TaskContent::Plain {
                    body: TaskContentField::text(entity),
                }),
                provenance: None,
                metadata: None,
            }),
        )
    }

    fn reschedule(id: &str, entity: &str, ts: i64, due: i64) -> Event {
        Event::new(
            id,
            entity,
            ts,
            EventData::TaskReschedule(TaskRescheduleData {
                component_id: "main".to_string(),
                new_due_timestamp_millis: due,
            }),
        )
    }

    fn due_of(entity: &Entity) -> i64 {
        entity.as_task().expect("task").component_states["main"].due_timestamp_millis
    }

    #[test]
    fn fast_and_slow_paths_agree() {
        let reducer = OrbitEventReducer::<crate::scheduler::SpacedRepetitionScheduler>::default();
        let events = vec![
            ingest("e1", "t", 10),
            reschedule("e3", "t", 30, 300),
            reschedule("e2", "t", 20, 200),
        ];
        let Merge::Updated { update: fast, .. } = merge_fast(&reducer, None, events.clone())
        else {
            panic!("fast path should update");
        };
        let Merge::Updated { update: slow, .. } =
            merge_slow(&reducer, &EntityId::from("t"), Vec::new(), events).expect("slow merge")
        else {
            panic!("slow path should update");
        };
        assert_eq!(fast.record, slow.record);
        assert_eq!(fast.record.last_event_id.as_str(), "e3");
        assert_eq!(due_of(&fast.record.entity), 300);
    }

    #[test]
    fn slow_path_with_nothing_new_is_unchanged() {
        let reducer = OrbitEventReducer::<crate::scheduler::SpacedRepetitionScheduler>::default();
        let history = vec![ingest("e1", "t", 10)];
        let merge = merge_slow(&reducer, &EntityId::from("t"), history.clone(), history)
            .expect("merge");
        assert!(matches!(merge, Merge::Unchanged));
    }

    #[test]
    fn slow_path_with_no_events_is_inconsistent() {
        let reducer = OrbitEventReducer::<crate::scheduler::SpacedRepetitionScheduler>::default();
        let err = merge_slow(&reducer, &EntityId::from("t"), Vec::new(), Vec::new())
            .err()
            .expect("empty history must fail");
        assert_eq!(err.code(), ErrorCode::InconsistentHistory);
    }

    #[test]
    fn out_of_order_event_recomputes_from_history() {
        let db = Database::new(MemoryBackend::new());
        db.put_events(vec![ingest("e0", "t", 0), reschedule("e1", "t", 100, 1000)])
            .expect("first put");
        let applied = db
            .put_events(vec![reschedule("e2", "t", 90, 900)])
            .expect("late event");
        assert_eq!(applied.len(), 1);
        // e2 sorts before e1, so e1's due time still wins.
        assert_eq!(due_of(&applied[0].entity), 900);
        let stored = db.get_entities(&[EntityId::from("t")]).expect("get");
        assert_eq!(due_of(&stored[&EntityId::from("t")]), 1000);
    }

    #[test]
    fn applied_events_report_their_own_snapshot() {
        let db = Database::new(MemoryBackend::new());
        let applied = db
            .put_events(vec![
                reschedule("e2", "t", 20, 222),
                ingest("e1", "t", 10),
            ])
            .expect("put");
        let ids: Vec<&str> = applied.iter().map(|a| a.event.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
        assert_eq!(due_of(&applied[0].entity), 10);
        assert_eq!(due_of(&applied[1].entity), 222);
    }

    #[test]
    fn duplicates_within_and_across_calls_are_ignored() {
        let db = Database::new(MemoryBackend::new());
        let applied = db
            .put_events(vec![ingest("e1", "t", 10), ingest("e1", "t", 10)])
            .expect("put");
        assert_eq!(applied.len(), 1);
        let again = db.put_events(vec![ingest("e1", "t", 10)]).expect("re-put");
        assert!(again.is_empty());
        assert_eq!(
            db.list_events(&EventQuery::default()).expect("list").len(),
            1
        );
    }

    #[test]
    fn rejected_entity_does_not_block_others() {
        let db = Database::new(MemoryBackend::new()).with_batch_size(1);
        let err = db
            .put_events(vec![
                reschedule("bad", "orphan", 5, 50),
                ingest("good", "t", 10),
            ])
            .expect_err("orphan reschedule must fail");
        let StoreError::EntityUpdatesRejected { failures, applied } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].entity_id.as_str(), "orphan");
        assert_eq!(failures[0].error.code(), ErrorCode::MissingSnapshot);
        assert_eq!(applied.len(), 1);

        let events = db.get_events(&[EventId::from("bad"), EventId::from("good")]).expect("get");
        assert!(!events.contains_key(&EventId::from("bad")));
        assert!(events.contains_key(&EventId::from("good")));
    }

    #[test]
    fn custom_reducer_is_used() {
        let calls = AtomicUsize::new(0);
        let reducer = |prior: Option<&Entity>, event: &Event| {
            calls.fetch_add(1, Ordering::SeqCst);
            OrbitEventReducer::<crate::scheduler::SpacedRepetitionScheduler>::default()
                .reduce(prior, event)
        };
        let db = Database::with_reducer(MemoryBackend::new(), reducer);
        db.put_events(vec![ingest("e1", "t", 1), reschedule("e2", "t", 2, 3)])
            .expect("put");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Reducer calls spent delivering `late` after `seed` is stored.
    fn reduce_calls_for(seed: Vec<Event>, late: Vec<Event>) -> usize {
        let calls = AtomicUsize::new(0);
        let reducer = |prior: Option<&Entity>, event: &Event| {
            calls.fetch_add(1, Ordering::SeqCst);
            OrbitEventReducer::<crate::scheduler::SpacedRepetitionScheduler>::default()
                .reduce(prior, event)
        };
        let db = Database::with_reducer(MemoryBackend::new(), reducer);
        db.put_events(seed).expect("seed");
        let before = calls.load(Ordering::SeqCst);
        let applied = db.put_events(late).expect("deliver");
        assert_eq!(applied.len(), 3);
        calls.load(Ordering::SeqCst) - before
    }

    #[test]
    fn newer_events_fold_and_older_events_replay_history() {
        let newer = reduce_calls_for(
            vec![ingest("e0", "t", 0), reschedule("e1", "t", 1_000, 1)],
            vec![
                reschedule("e2", "t", 2_000, 2),
                reschedule("e3", "t", 3_000, 3),
                reschedule("e4", "t", 4_000, 4),
            ],
        );
        assert_eq!(newer, 3);

        let older = reduce_calls_for(
            vec![ingest("e0", "t", 0), reschedule("e4", "t", 4_000, 4)],
            vec![
                reschedule("e1", "t", 1_000, 1),
                reschedule("e2", "t", 2_000, 2),
                reschedule("e3", "t", 3_000, 3),
            ],
        );
        assert_eq!(older, 5);
    }

    #[test]
    fn rebuild_recomputes_from_log() {
        let db = Database::new(MemoryBackend::new());
        db.put_events(vec![
            ingest("e1", "a", 1),
            ingest("e2", "b", 1),
            Event::new(
                "e3",
                "b",
                2,
                EventData::TaskUpdateDeleted(TaskUpdateDeletedData { is_deleted: true }),
            ),
        ])
        .expect("put");
        let report = db.rebuild_all_entities().expect("rebuild");
        assert_eq!(report.entity_count, 2);
        assert_eq!(report.event_count, 3);
        assert!(report.failures.is_empty());

        let report = db
            .rebuild_entities(&[EntityId::from("missing")])
            .expect("rebuild unknown");
        assert_eq!(report.entity_count, 0);
    }
}

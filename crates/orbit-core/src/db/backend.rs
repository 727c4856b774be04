//! The storage contract.
//!
//! A backend persists three things: the append-only event log (keyed by
//! event ID, with an insertion-order column), the latest snapshot of each
//! entity with its last-event bookkeeping, and the derived due-time index
//! for tasks (see [`super::derived`]). [`super::Database`] is written only
//! against [`DatabaseBackend`], so backends are interchangeable.

use std::collections::{BTreeMap, HashMap};

use super::StoreError;
use super::query::{EntityQuery, EventQuery};
use crate::event::Event;
use crate::model::{Entity, EntityId, EventId};

/// A stored snapshot plus the bookkeeping used by the fast merge path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub entity: Entity,
    /// Last event in canonical order that produced `entity`.
    pub last_event_id: EventId,
    pub last_event_timestamp_millis: i64,
}

/// One entity's write set produced by a transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUpdate {
    pub record: EntityRecord,
    /// New events to append for this entity. Events already stored are
    /// skipped by the backend.
    pub events: Vec<Event>,
}

/// Read access to the event log from inside an `update_entities` call.
pub trait EventHistory {
    /// Every stored event for `entity_id`, in storage order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on I/O or decode failure.
    fn events_for_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>, StoreError>;
}

/// Callback run by [`DatabaseBackend::update_entities`].
///
/// Receives the new events not yet stored, the current records of the
/// entities they address, and the event history; returns the writes to
/// apply.
pub type EntityTransformer<'a> = dyn FnMut(
        &[Event],
        &HashMap<EntityId, EntityRecord>,
        &dyn EventHistory,
    ) -> Result<Vec<EntityUpdate>, StoreError>
    + 'a;

/// Storage engine contract.
pub trait DatabaseBackend: Send + Sync {
    /// Release the backend. Every later call fails with
    /// [`StoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] if already closed.
    fn close(&self) -> Result<(), StoreError>;

    /// Point lookup. Missing IDs are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on I/O or decode failure.
    fn get_events(&self, ids: &[EventId]) -> Result<HashMap<EventId, Event>, StoreError>;

    /// Point lookup. Missing IDs are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on I/O or decode failure.
    fn get_entities(&self, ids: &[EntityId])
    -> Result<HashMap<EntityId, EntityRecord>, StoreError>;

    /// Atomic fetch-transform-write.
    ///
    /// Within one transaction: drop `new_events` that are already stored,
    /// load the records of the entities the remaining events address, run
    /// `transformer`, then append each update's events, upsert its record
    /// and refresh its derived index rows. The transformer is called even
    /// when no events remain. If the transformer fails nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the transformer's error, or a [`StoreError`] on I/O failure.
    fn update_entities(
        &self,
        new_events: &[Event],
        transformer: &mut EntityTransformer<'_>,
    ) -> Result<Vec<EntityUpdate>, StoreError>;

    /// Range query over the event log in storage order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAfterId`] if the cursor isn't stored.
    fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError>;

    /// Range query over entity snapshots in storage order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAfterId`] if the cursor isn't stored,
    /// or [`StoreError::UnsupportedPredicate`] for an unindexed predicate.
    fn list_entities(&self, query: &EntityQuery) -> Result<Vec<EntityRecord>, StoreError>;

    /// Read small top-level values. Missing keys are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on I/O failure.
    fn get_metadata_values(&self, keys: &[String]) -> Result<HashMap<String, String>, StoreError>;

    /// Write small top-level values; `None` deletes the key.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on I/O failure.
    fn set_metadata_values(&self, values: &BTreeMap<String, Option<String>>)
    -> Result<(), StoreError>;
}

/// IDs of the entities addressed by `events`, in first-seen order.
#[must_use]
pub fn distinct_entity_ids(events: &[Event]) -> Vec<EntityId> {
    let mut seen = std::collections::HashSet::new();
    events
        .iter()
        .filter(|event| seen.insert(&event.entity_id))
        .map(|event| event.entity_id.clone())
        .collect()
}

//! Event data model for the orbit event log.
//!
//! Events are immutable facts addressed to one entity. Entity snapshots are
//! derived by folding an entity's events, in canonical order, through the
//! reducer. Canonical order is `(timestamp_millis, id)` ascending; every
//! code path that folds events must use [`sort_events`] (or
//! [`Event::ordering_key`]) so replay is deterministic.

pub mod data;
pub mod types;

pub use data::{
    AttachmentIngestData, DataParseError, EventData, TaskIngestData, TaskRepetitionData,
    TaskRepetitionOutcome, TaskRescheduleData, TaskUpdateDeletedData, TaskUpdateMetadataData,
    TaskUpdateProvenanceData, TaskUpdateSpecData,
};
pub use types::{EventType, UnknownEventType};

use serde::{Deserialize, Serialize};

use crate::model::{EntityId, EventId};

/// A single event in the orbit event log.
///
/// # Serde
///
/// The wire form is one flat object with the payload fields next to the
/// envelope fields. `Deserialize` reads `type` first and uses it to drive
/// typed deserialization of the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Globally unique event identifier.
    pub id: EventId,
    /// The entity this event mutates.
    pub entity_id: EntityId,
    /// Client-local creation time. Used for scheduling arithmetic and
    /// canonical ordering; not trusted as a causal clock.
    pub timestamp_millis: i64,
    /// Typed payload; its variant determines the event type.
    pub data: EventData,
}

impl Event {
    pub fn new(
        id: impl Into<EventId>,
        entity_id: impl Into<EntityId>,
        timestamp_millis: i64,
        data: EventData,
    ) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            timestamp_millis,
            data,
        }
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.data.event_type()
    }

    /// Canonical sort key: timestamp first, event ID breaks ties.
    #[must_use]
    pub fn ordering_key(&self) -> (i64, &str) {
        (self.timestamp_millis, self.id.as_str())
    }
}

/// Sort events into canonical fold order.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
}

#[derive(Serialize)]
struct EventWire<'a> {
    id: &'a EventId,
    #[serde(rename = "entityID")]
    entity_id: &'a EntityId,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(rename = "timestampMillis")]
    timestamp_millis: i64,
    #[serde(flatten)]
    data: &'a EventData,
}

impl Serialize for Event {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EventWire {
            id: &self.id,
            entity_id: &self.entity_id,
            event_type: self.event_type(),
            timestamp_millis: self.timestamp_millis,
            data: &self.data,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        /// Envelope fields plus the untyped remainder of the object.
        #[derive(Deserialize)]
        struct EventRaw {
            id: EventId,
            #[serde(rename = "entityID")]
            entity_id: EntityId,
            #[serde(rename = "type")]
            event_type: EventType,
            #[serde(rename = "timestampMillis")]
            timestamp_millis: i64,
            #[serde(flatten)]
            rest: serde_json::Map<String, serde_json::Value>,
        }

        let raw = EventRaw::deserialize(deserializer)?;
        let data = EventData::deserialize_for(raw.event_type, serde_json::Value::Object(raw.rest))
            .map_err(serde::de::Error::custom)?;

        Ok(Self {
            id: raw.id,
            entity_id: raw.entity_id,
            timestamp_millis: raw.timestamp_millis,
            data,
        })
    }
}

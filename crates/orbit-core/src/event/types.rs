//! Event type discriminants.
//!
//! The string form is the `type` tag carried by every event on the wire and
//! in the `event_type` storage column.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::EntityType;

/// The event catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Create a task, or merge provenance/metadata into an existing one.
    TaskIngest,
    /// Record a review of one task component.
    TaskRepetition,
    /// Move one component's due time without touching its interval.
    TaskReschedule,
    /// Set or clear the soft-delete flag.
    TaskUpdateDeleted,
    /// Replace the task spec, keeping the same components.
    TaskUpdateSpec,
    /// Replace the task provenance.
    TaskUpdateProvenance,
    /// Shallow-merge task metadata.
    TaskUpdateMetadata,
    /// Register an attachment reference.
    AttachmentIngest,
}

/// Error returned when parsing an unknown event type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType {
    pub raw: String,
}

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event type '{}': expected one of taskIngest, taskRepetition, \
             taskReschedule, taskUpdatedDeleted, taskUpdateSpec, \
             taskUpdateProvenanceEvent, taskUpdateMetadata, attachmentIngest",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventType {}

impl EventType {
    /// All known event types in catalog order.
    pub const ALL: [Self; 8] = [
        Self::TaskIngest,
        Self::TaskRepetition,
        Self::TaskReschedule,
        Self::TaskUpdateDeleted,
        Self::TaskUpdateSpec,
        Self::TaskUpdateProvenance,
        Self::TaskUpdateMetadata,
        Self::AttachmentIngest,
    ];

    /// Wire tag for this event type.
    ///
    /// Two tags keep historical spellings (`taskUpdatedDeleted`,
    /// `taskUpdateProvenanceEvent`) so logs from older clients still parse.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskIngest => "taskIngest",
            Self::TaskRepetition => "taskRepetition",
            Self::TaskReschedule => "taskReschedule",
            Self::TaskUpdateDeleted => "taskUpdatedDeleted",
            Self::TaskUpdateSpec => "taskUpdateSpec",
            Self::TaskUpdateProvenance => "taskUpdateProvenanceEvent",
            Self::TaskUpdateMetadata => "taskUpdateMetadata",
            Self::AttachmentIngest => "attachmentIngest",
        }
    }

    /// Type of entity events of this type are addressed to.
    #[must_use]
    pub const fn entity_type(self) -> EntityType {
        match self {
            Self::AttachmentIngest => EntityType::AttachmentReference,
            _ => EntityType::Task,
        }
    }

    /// Whether this event may create its entity.
    #[must_use]
    pub const fn is_ingest(self) -> bool {
        matches!(self, Self::TaskIngest | Self::AttachmentIngest)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| UnknownEventType { raw: s.to_string() })
    }
}

// Custom serde: serialize as the wire tag.
impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

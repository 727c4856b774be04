//! Typed payload data structs for each event type.
//!
//! On the wire an event is one flat JSON object: the shared envelope fields
//! (`id`, `entityID`, `type`, `timestampMillis`) sit next to the payload
//! fields defined here. [`EventData`] therefore serializes its inner struct
//! directly and is deserialized with [`EventData::deserialize_for`] once the
//! `type` tag is known.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::types::EventType;
use crate::model::{AttachmentMimeType, ComponentId, TaskProvenance, TaskSpec};

// ---------------------------------------------------------------------------
// EventData — the unified payload enum
// ---------------------------------------------------------------------------

/// Typed payload for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    TaskIngest(TaskIngestData),
    TaskRepetition(TaskRepetitionData),
    TaskReschedule(TaskRescheduleData),
    TaskUpdateDeleted(TaskUpdateDeletedData),
    TaskUpdateSpec(TaskUpdateSpecData),
    TaskUpdateProvenance(TaskUpdateProvenanceData),
    TaskUpdateMetadata(TaskUpdateMetadataData),
    AttachmentIngest(AttachmentIngestData),
}

impl EventData {
    /// Deserialize payload fields into the variant selected by `event_type`.
    ///
    /// Envelope fields left in `value` are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`DataParseError`] if the fields do not match the schema for
    /// the given event type.
    pub fn deserialize_for(
        event_type: EventType,
        value: serde_json::Value,
    ) -> Result<Self, DataParseError> {
        let result = match event_type {
            EventType::TaskIngest => serde_json::from_value(value).map(Self::TaskIngest),
            EventType::TaskRepetition => serde_json::from_value(value).map(Self::TaskRepetition),
            EventType::TaskReschedule => serde_json::from_value(value).map(Self::TaskReschedule),
            EventType::TaskUpdateDeleted => {
                serde_json::from_value(value).map(Self::TaskUpdateDeleted)
            }
            EventType::TaskUpdateSpec => serde_json::from_value(value).map(Self::TaskUpdateSpec),
            EventType::TaskUpdateProvenance => {
                serde_json::from_value(value).map(Self::TaskUpdateProvenance)
            }
            EventType::TaskUpdateMetadata => {
                serde_json::from_value(value).map(Self::TaskUpdateMetadata)
            }
            EventType::AttachmentIngest => {
                serde_json::from_value(value).map(Self::AttachmentIngest)
            }
        };
        result.map_err(|source| DataParseError {
            event_type,
            source,
        })
    }

    /// The event type this payload belongs to.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::TaskIngest(_) => EventType::TaskIngest,
            Self::TaskRepetition(_) => EventType::TaskRepetition,
            Self::TaskReschedule(_) => EventType::TaskReschedule,
            Self::TaskUpdateDeleted(_) => EventType::TaskUpdateDeleted,
            Self::TaskUpdateSpec(_) => EventType::TaskUpdateSpec,
            Self::TaskUpdateProvenance(_) => EventType::TaskUpdateProvenance,
            Self::TaskUpdateMetadata(_) => EventType::TaskUpdateMetadata,
            Self::AttachmentIngest(_) => EventType::AttachmentIngest,
        }
    }
}

impl Serialize for EventData {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::TaskIngest(d) => d.serialize(serializer),
            Self::TaskRepetition(d) => d.serialize(serializer),
            Self::TaskReschedule(d) => d.serialize(serializer),
            Self::TaskUpdateDeleted(d) => d.serialize(serializer),
            Self::TaskUpdateSpec(d) => d.serialize(serializer),
            Self::TaskUpdateProvenance(d) => d.serialize(serializer),
            Self::TaskUpdateMetadata(d) => d.serialize(serializer),
            Self::AttachmentIngest(d) => d.serialize(serializer),
        }
    }
}

/// Error deserializing an event payload for a known event type.
#[derive(Debug)]
pub struct DataParseError {
    pub event_type: EventType,
    pub source: serde_json::Error,
}

impl fmt::Display for DataParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid payload for {} event: {}",
            self.event_type, self.source
        )
    }
}

impl std::error::Error for DataParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Task payloads
// ---------------------------------------------------------------------------

/// Payload for `taskIngest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIngestData {
    pub spec: TaskSpec,
    #[serde(default)]
    pub provenance: Option<TaskProvenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Payload for `taskRepetition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRepetitionData {
    #[serde(rename = "componentID")]
    pub component_id: ComponentId,
    /// Shared by repetitions in the same logical review session.
    #[serde(rename = "reviewSessionID")]
    pub review_session_id: String,
    pub outcome: TaskRepetitionOutcome,
}

/// How a review went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRepetitionOutcome {
    Remembered,
    Forgotten,
    /// The user passed on the prompt; scheduled like a successful review.
    Skipped,
}

impl TaskRepetitionOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remembered => "remembered",
            Self::Forgotten => "forgotten",
            Self::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for TaskRepetitionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remembered" => Ok(Self::Remembered),
            "forgotten" => Ok(Self::Forgotten),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!(
                "unknown outcome '{other}': expected remembered, forgotten or skipped"
            )),
        }
    }
}

/// Payload for `taskReschedule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRescheduleData {
    #[serde(rename = "componentID")]
    pub component_id: ComponentId,
    pub new_due_timestamp_millis: i64,
}

/// Payload for `taskUpdatedDeleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateDeletedData {
    pub is_deleted: bool,
}

/// Payload for `taskUpdateSpec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdateSpecData {
    pub spec: TaskSpec,
}

/// Payload for `taskUpdateProvenanceEvent`. `None` clears the provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdateProvenanceData {
    pub provenance: Option<TaskProvenance>,
}

/// Payload for `taskUpdateMetadata`; merged key by key into the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdateMetadataData {
    pub metadata: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Attachment payloads
// ---------------------------------------------------------------------------

/// Payload for `attachmentIngest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentIngestData {
    pub mime_type: AttachmentMimeType,
}

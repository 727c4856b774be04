//! Entity data model.
//!
//! Entities are snapshots derived from the event log. Two variants exist:
//! [`Task`] (a schedulable prompt) and [`AttachmentReference`] (a pointer to
//! an externally stored blob). Both are plain values; every state change is
//! produced by the reducer returning a new value.

pub mod attachment;
pub mod ids;
pub mod task;

pub use attachment::{AttachmentMimeType, AttachmentReference};
pub use ids::{AttachmentId, ComponentId, EntityId, EventId, TaskId};
pub use task::{
    ClozeRange, ClozeTaskContentComponent, MAIN_COMPONENT_ID, Task, TaskComponentState,
    TaskContent, TaskContentField, TaskProvenance, TaskSpec, TaskSpecType,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discriminant of an [`Entity`]; used as the entity-type filter in queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Task,
    AttachmentReference,
}

impl EntityType {
    pub const ALL: [Self; 2] = [Self::Task, Self::AttachmentReference];

    /// Wire/storage name of the entity type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::AttachmentReference => "attachmentReference",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "attachmentReference" => Ok(Self::AttachmentReference),
            other => Err(format!(
                "unknown entity type '{other}': expected task or attachmentReference"
            )),
        }
    }
}

/// An entity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Entity {
    Task(Task),
    AttachmentReference(AttachmentReference),
}

impl Entity {
    #[must_use]
    pub const fn id(&self) -> &EntityId {
        match self {
            Self::Task(task) => &task.id,
            Self::AttachmentReference(attachment) => &attachment.id,
        }
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Task(_) => EntityType::Task,
            Self::AttachmentReference(_) => EntityType::AttachmentReference,
        }
    }

    #[must_use]
    pub const fn created_at_timestamp_millis(&self) -> i64 {
        match self {
            Self::Task(task) => task.created_at_timestamp_millis,
            Self::AttachmentReference(attachment) => attachment.created_at_timestamp_millis,
        }
    }

    #[must_use]
    pub const fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(task) => Some(task),
            Self::AttachmentReference(_) => None,
        }
    }

    #[must_use]
    pub fn into_task(self) -> Option<Task> {
        match self {
            Self::Task(task) => Some(task),
            Self::AttachmentReference(_) => None,
        }
    }
}

impl From<Task> for Entity {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<AttachmentReference> for Entity {
    fn from(attachment: AttachmentReference) -> Self {
        Self::AttachmentReference(attachment)
    }
}

//! The task entity: spec, provenance, and per-component scheduling state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{AttachmentId, ComponentId, TaskId};

/// Component ID used by task content with a single schedulable unit.
pub const MAIN_COMPONENT_ID: &str = "main";

/// A task's content, provenance, and ongoing scheduling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub created_at_timestamp_millis: i64,
    pub spec: TaskSpec,
    pub provenance: Option<TaskProvenance>,
    /// One entry per component declared by `spec.content`, fixed at ingest.
    pub component_states: BTreeMap<ComponentId, TaskComponentState>,
    pub is_deleted: bool,
    /// Free-form key/value pairs owned by applications.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Task {
    /// Declared order of a component, used to break review-queue ties.
    ///
    /// Returns `None` when the component is not part of this task's content.
    #[must_use]
    pub fn component_order(&self, component_id: &str) -> Option<u32> {
        self.spec.content.component_order(component_id)
    }
}

/// Scheduling state for one component of a task.
///
/// `due_timestamp_millis` and `interval_millis` change independently: a
/// reschedule moves the due time without touching the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskComponentState {
    pub created_at_timestamp_millis: i64,
    pub last_repetition_timestamp_millis: Option<i64>,
    pub interval_millis: i64,
    pub due_timestamp_millis: i64,
}

impl TaskComponentState {
    /// Fresh state for a component created at `timestamp_millis`: due
    /// immediately, no interval, never repeated.
    #[must_use]
    pub const fn new(timestamp_millis: i64) -> Self {
        Self {
            created_at_timestamp_millis: timestamp_millis,
            last_repetition_timestamp_millis: None,
            interval_millis: 0,
            due_timestamp_millis: timestamp_millis,
        }
    }
}

/// Describes a task's content and how it should be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(rename = "type")]
    pub spec_type: TaskSpecType,
    pub content: TaskContent,
}

impl TaskSpec {
    /// A memory task wrapping `content`.
    #[must_use]
    pub const fn memory(content: TaskContent) -> Self {
        Self {
            spec_type: TaskSpecType::Memory,
            content,
        }
    }
}

/// Scheduling family of a task spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSpecType {
    Memory,
}

/// Content shown to the user during review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskContent {
    Qa {
        body: TaskContentField,
        answer: TaskContentField,
    },
    Cloze {
        body: TaskContentField,
        components: BTreeMap<ComponentId, ClozeTaskContentComponent>,
    },
    Plain {
        body: TaskContentField,
    },
}

impl TaskContent {
    /// Component IDs this content declares, in ID order.
    ///
    /// QA and plain content always have exactly [`MAIN_COMPONENT_ID`].
    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        match self {
            Self::Cloze { components, .. } => components.keys().cloned().collect(),
            Self::Qa { .. } | Self::Plain { .. } => vec![MAIN_COMPONENT_ID.to_string()],
        }
    }

    /// Declared order number of `component_id`, if the content has it.
    #[must_use]
    pub fn component_order(&self, component_id: &str) -> Option<u32> {
        match self {
            Self::Cloze { components, .. } => components.get(component_id).map(|c| c.order),
            Self::Qa { .. } | Self::Plain { .. } => {
                (component_id == MAIN_COMPONENT_ID).then_some(0)
            }
        }
    }

    #[must_use]
    pub const fn body(&self) -> &TaskContentField {
        match self {
            Self::Qa { body, .. } | Self::Cloze { body, .. } | Self::Plain { body } => body,
        }
    }
}

/// Text plus the attachments it references.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskContentField {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentId>,
}

impl TaskContentField {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// One cloze deletion group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClozeTaskContentComponent {
    pub order: u32,
    #[serde(default)]
    pub ranges: Vec<ClozeRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClozeRange {
    pub start_index: usize,
    pub length: usize,
    pub hint: Option<String>,
}

/// Where a task came from (web page, note, deck...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProvenance {
    /// Shared by tasks from the same source; a URL or arbitrary unique ID.
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_palette_name: Option<String>,
}

impl TaskProvenance {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            url: None,
            title: None,
            container_title: None,
            color_palette_name: None,
        }
    }
}

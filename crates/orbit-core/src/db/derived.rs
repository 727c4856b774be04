//! Derived due-time index.
//!
//! Every backend keeps one row per component of every live (non-deleted)
//! task: `(task_id, component_id, due_timestamp_millis)`. Whenever a task
//! snapshot is written, the backend replaces all of that task's rows with
//! [`task_component_rows`] of the new snapshot. Deleted tasks and
//! attachments have no rows, so due-time queries never return them.

use crate::model::{ComponentId, Entity, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueIndexRow {
    pub task_id: TaskId,
    pub component_id: ComponentId,
    pub due_timestamp_millis: i64,
}

/// Index rows for one entity snapshot.
#[must_use]
pub fn task_component_rows(entity: &Entity) -> Vec<DueIndexRow> {
    match entity {
        Entity::Task(task) if !task.is_deleted => task
            .component_states
            .iter()
            .map(|(component_id, state)| DueIndexRow {
                task_id: task.id.clone(),
                component_id: component_id.clone(),
                due_timestamp_millis: state.due_timestamp_millis,
            })
            .collect(),
        Entity::Task(_) | Entity::AttachmentReference(_) => Vec::new(),
    }
}

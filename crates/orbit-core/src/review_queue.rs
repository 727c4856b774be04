//! Review queue construction.
//!
//! Turns task snapshots into an ordered list of components to review. Pure:
//! input tasks are never modified.

use serde::Serialize;

use crate::model::{ComponentId, Task, TaskId};

/// Default cap on a bounded review session.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;

/// Default look-ahead: components due within the next 16 hours are reviewed
/// now rather than in a separate session later today.
pub const DEFAULT_LOOKAHEAD_MILLIS: i64 = 16 * 60 * 60 * 1000;

/// One component to review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    #[serde(rename = "taskID")]
    pub task_id: TaskId,
    #[serde(rename = "componentID")]
    pub component_id: ComponentId,
    pub due_timestamp_millis: i64,
}

/// Sort key: due time, then the task's input position, then the
/// component's declared order, then component ID. Total, so the output is
/// fully determined by the input.
type QueueKey = (i64, usize, u32, ComponentId);

/// Flatten every component of every non-deleted task, earliest due first.
///
/// Within one task, simultaneously due components come out in declared
/// order. Across tasks with equal due times, earlier input tasks come first.
#[must_use]
pub fn create_review_queue(tasks: &[Task]) -> Vec<ReviewItem> {
    let mut keyed: Vec<(QueueKey, ReviewItem)> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| !task.is_deleted)
        .flat_map(|(position, task)| {
            task.component_states.iter().map(move |(component_id, state)| {
                let order = task.component_order(component_id).unwrap_or(u32::MAX);
                (
                    (
                        state.due_timestamp_millis,
                        position,
                        order,
                        component_id.clone(),
                    ),
                    ReviewItem {
                        task_id: task.id.clone(),
                        component_id: component_id.clone(),
                        due_timestamp_millis: state.due_timestamp_millis,
                    },
                )
            })
        })
        .collect();

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Due-time threshold for a session starting at `now_millis`.
#[must_use]
pub const fn review_queue_due_threshold(now_millis: i64, lookahead_millis: i64) -> i64 {
    now_millis.saturating_add(lookahead_millis)
}

/// A review session: at most one component per task, only components due
/// at or before `threshold_millis`, capped at `max_size` items.
///
/// When several components of a task are due, the earliest due one is
/// chosen, with declared order breaking ties. Tasks with nothing due are
/// skipped.
#[must_use]
pub fn create_bounded_review_queue(
    tasks: &[Task],
    threshold_millis: i64,
    max_size: usize,
) -> Vec<ReviewItem> {
    let mut keyed: Vec<((i64, usize), ReviewItem)> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| !task.is_deleted)
        .filter_map(|(position, task)| {
            task.component_states
                .iter()
                .filter(|(_, state)| state.due_timestamp_millis <= threshold_millis)
                .min_by_key(|(component_id, state)| {
                    (
                        state.due_timestamp_millis,
                        task.component_order(component_id).unwrap_or(u32::MAX),
                        (*component_id).clone(),
                    )
                })
                .map(|(component_id, state)| {
                    (
                        (state.due_timestamp_millis, position),
                        ReviewItem {
                            task_id: task.id.clone(),
                            component_id: component_id.clone(),
                            due_timestamp_millis: state.due_timestamp_millis,
                        },
                    )
                })
        })
        .collect();

    keyed.sort_by_key(|(key, _)| *key);
    keyed.truncate(max_size);
    keyed.into_iter().map(|(_, item)| item).collect()
}

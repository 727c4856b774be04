//! `orbit queue` — list components due for review.
//!
//! Due tasks come from the derived due-time index; the bounded review
//! queue then picks at most one component per task.

use super::now_millis;
use crate::output::{OutputMode, fail_with_store_error, millis_to_local_datetime, render};
use clap::Args;
use orbit_core::config::ReviewConfig;
use orbit_core::db::{Database, EntityQuery, Relation, SqliteBackend, StoreError};
use orbit_core::model::Task;
use orbit_core::review_queue::{create_bounded_review_queue, review_queue_due_threshold};
use std::io::Write;

const PAGE_SIZE: usize = 500;

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Session start, epoch milliseconds. Defaults to now.
    #[arg(long)]
    pub at: Option<i64>,

    /// Maximum queue length. Defaults to `review.max_queue_size`.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Every live task with a component due at or before `threshold_millis`.
///
/// # Errors
///
/// Propagates store errors.
pub fn due_tasks(db: &Database<SqliteBackend>, threshold_millis: i64) -> Result<Vec<Task>, StoreError> {
    let mut tasks = Vec::new();
    let mut query = EntityQuery::tasks_due(Relation::Le, threshold_millis).limit(PAGE_SIZE);
    loop {
        let page = db.list_entities(&query)?;
        let Some(last) = page.last() else {
            break;
        };
        query = EntityQuery::tasks_due(Relation::Le, threshold_millis)
            .limit(PAGE_SIZE)
            .after(last.id().clone());
        let full = page.len() == PAGE_SIZE;
        tasks.extend(page.into_iter().filter_map(orbit_core::model::Entity::into_task));
        if !full {
            break;
        }
    }
    Ok(tasks)
}

/// Execute `orbit queue`.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn run_queue(
    args: &QueueArgs,
    review: &ReviewConfig,
    db: &Database<SqliteBackend>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let threshold =
        review_queue_due_threshold(args.at.unwrap_or_else(now_millis), review.lookahead_millis);
    let tasks = due_tasks(db, threshold).map_err(|err| fail_with_store_error(output, err))?;
    let queue = create_bounded_review_queue(
        &tasks,
        threshold,
        args.limit.unwrap_or(review.max_queue_size),
    );
    tracing::debug!(due_tasks = tasks.len(), queued = queue.len(), "built review queue");

    render(output, &queue, |queue, w| {
        if queue.is_empty() {
            return writeln!(w, "nothing due");
        }
        for item in queue {
            writeln!(
                w,
                "{}  {:<34} {}",
                millis_to_local_datetime(item.due_timestamp_millis),
                item.task_id,
                item.component_id
            )?;
        }
        Ok(())
    })
}

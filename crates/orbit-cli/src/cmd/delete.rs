//! `orbit delete` / `orbit restore` — toggle a task's deleted flag.

use super::{now_millis, put_event};
use crate::output::OutputMode;
use clap::Args;
use orbit_core::db::{Database, SqliteBackend};
use orbit_core::event::{Event, EventData, TaskUpdateDeletedData};
use orbit_core::model::EventId;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Task ID.
    pub task: String,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Task ID.
    pub task: String,
}

fn set_deleted(
    task: &str,
    is_deleted: bool,
    db: &Database<SqliteBackend>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let event = Event::new(
        EventId::generate(),
        task,
        now_millis(),
        EventData::TaskUpdateDeleted(TaskUpdateDeletedData { is_deleted }),
    );
    put_event(db, event, output)
}

/// Execute `orbit delete`.
///
/// # Errors
///
/// Returns an error if the task does not exist.
pub fn run_delete(args: &DeleteArgs, db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    set_deleted(&args.task, true, db, output)
}

/// Execute `orbit restore`.
///
/// # Errors
///
/// Returns an error if the task does not exist.
pub fn run_restore(args: &RestoreArgs, db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    set_deleted(&args.task, false, db, output)
}

//! `orbit reschedule` — move one component's due time.

use super::{now_millis, put_event};
use crate::output::OutputMode;
use clap::Args;
use orbit_core::db::{Database, SqliteBackend};
use orbit_core::event::{Event, EventData, TaskRescheduleData};
use orbit_core::model::{EventId, MAIN_COMPONENT_ID};

#[derive(Args, Debug)]
pub struct RescheduleArgs {
    /// Task ID.
    pub task: String,

    #[arg(long, default_value = MAIN_COMPONENT_ID)]
    pub component: String,

    /// New due time, epoch milliseconds.
    #[arg(long, allow_negative_numbers = true)]
    pub due: i64,
}

/// Execute `orbit reschedule`. The interval is left unchanged.
///
/// # Errors
///
/// Returns an error if the store rejects the event.
pub fn run_reschedule(
    args: &RescheduleArgs,
    db: &Database<SqliteBackend>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let event = Event::new(
        EventId::generate(),
        args.task.as_str(),
        now_millis(),
        EventData::TaskReschedule(TaskRescheduleData {
            component_id: args.component.clone(),
            new_due_timestamp_millis: args.due,
        }),
    );
    put_event(db, event, output)
}

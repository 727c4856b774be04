//! `orbit repeat` — record a review of one task component.

use super::{now_millis, put_event};
use crate::output::OutputMode;
use clap::{Args, ValueEnum};
use orbit_core::db::{Database, SqliteBackend};
use orbit_core::event::{Event, EventData, TaskRepetitionData, TaskRepetitionOutcome};
use orbit_core::model::{EventId, MAIN_COMPONENT_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutcomeArg {
    Remembered,
    Forgotten,
    Skipped,
}

impl From<OutcomeArg> for TaskRepetitionOutcome {
    fn from(value: OutcomeArg) -> Self {
        match value {
            OutcomeArg::Remembered => Self::Remembered,
            OutcomeArg::Forgotten => Self::Forgotten,
            OutcomeArg::Skipped => Self::Skipped,
        }
    }
}

#[derive(Args, Debug)]
pub struct RepeatArgs {
    /// Task ID.
    pub task: String,

    /// Component that was reviewed.
    #[arg(long, default_value = MAIN_COMPONENT_ID)]
    pub component: String,

    #[arg(long, value_enum)]
    pub outcome: OutcomeArg,

    /// Groups repetitions from one sitting.
    #[arg(long, default_value = "cli")]
    pub session: String,
}

/// Execute `orbit repeat`.
///
/// # Errors
///
/// Returns an error if the store rejects the event (unknown task or
/// component).
pub fn run_repeat(args: &RepeatArgs, db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    let event = Event::new(
        EventId::generate(),
        args.task.as_str(),
        now_millis(),
        EventData::TaskRepetition(TaskRepetitionData {
            component_id: args.component.clone(),
            review_session_id: args.session.clone(),
            outcome: args.outcome.into(),
        }),
    );
    put_event(db, event, output)
}

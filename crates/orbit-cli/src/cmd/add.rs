//! `orbit add` — ingest a new QA or plain task.

use super::{now_millis, put_event};
use crate::output::OutputMode;
use clap::Args;
use orbit_core::db::{Database, SqliteBackend};
use orbit_core::event::{Event, EventData, TaskIngestData};
use orbit_core::model::{EntityId, EventId, TaskContent, TaskContentField, TaskProvenance, TaskSpec};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Prompt text.
    #[arg(long)]
    pub body: String,

    /// Answer text. Without it the task is a plain prompt.
    #[arg(long)]
    pub answer: Option<String>,

    /// Task ID to use instead of a generated one.
    #[arg(long)]
    pub id: Option<String>,

    /// Provenance identifier (URL or source ID).
    #[arg(long)]
    pub source: Option<String>,
}

/// Build the `taskIngest` event for `args` at `timestamp_millis`.
pub fn ingest_event(args: &AddArgs, timestamp_millis: i64) -> Event {
    let body = TaskContentField::text(args.body.as_str());
    let content = match &args.answer {
        Some(answer) => TaskContent::Qa {
            body,
            answer: TaskContentField::text(answer.as_str()),
        },
        None => TaskContent::Plain { body },
    };
    let task_id = args
        .id
        .as_deref()
        .map_or_else(EntityId::generate, EntityId::from);

    Event::new(
        EventId::generate(),
        task_id,
        timestamp_millis,
        EventData::TaskIngest(TaskIngestData {
            spec: TaskSpec::memory(content),
            provenance: args.source.as_deref().map(TaskProvenance::new),
            metadata: None,
        }),
    )
}

/// Execute `orbit add`.
///
/// # Errors
///
/// Returns an error if the store rejects the event.
pub fn run_add(args: &AddArgs, db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    put_event(db, ingest_event(args, now_millis()), output)
}

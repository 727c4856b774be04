//! `orbit events` — page through the event log.

use crate::output::{OutputMode, fail_with_store_error, millis_to_local_datetime, render};
use clap::Args;
use orbit_core::db::{Database, EventQuery, SqliteBackend};
use orbit_core::model::{EntityId, EventId};
use std::io::Write;

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Only events addressed to this entity.
    #[arg(long)]
    pub entity: Option<String>,

    /// Resume after this event ID (from a previous page).
    #[arg(long)]
    pub after: Option<String>,

    /// Maximum number of events to print.
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}

impl EventsArgs {
    pub fn query(&self) -> EventQuery {
        let mut query = self
            .entity
            .as_deref()
            .map_or_else(EventQuery::default, |entity| {
                EventQuery::for_entity(EntityId::from(entity))
            });
        query.after_id = self.after.as_deref().map(EventId::from);
        query.limit = Some(self.limit);
        query
    }
}

/// Execute `orbit events`.
///
/// # Errors
///
/// Returns an error for an unknown `--after` cursor or a store failure.
pub fn run_events(args: &EventsArgs, db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    let events = db
        .list_events(&args.query())
        .map_err(|err| fail_with_store_error(output, err))?;

    render(output, &events, |events, w| {
        if events.is_empty() {
            return writeln!(w, "no events");
        }
        for event in events {
            writeln!(
                w,
                "{}  {:<26} {:<34} {}",
                millis_to_local_datetime(event.timestamp_millis),
                event.event_type(),
                event.entity_id,
                event.id
            )?;
        }
        Ok(())
    })
}

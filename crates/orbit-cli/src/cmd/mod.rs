//! Subcommand handlers. Each module owns its clap `Args` struct and a
//! `run_*` function.

pub mod add;
pub mod completions;
pub mod delete;
pub mod events;
pub mod import;
pub mod queue;
pub mod rebuild;
pub mod repeat;
pub mod reschedule;
pub mod show;

use crate::output::{OutputMode, fail_with_store_error, millis_to_local_datetime, render};
use anyhow::Context;
use orbit_core::config::OrbitConfig;
use orbit_core::db::{Database, SqliteBackend};
use orbit_core::event::Event;
use orbit_core::model::Entity;
use orbit_core::reducer::OrbitEventReducer;
use orbit_core::scheduler::SpacedRepetitionScheduler;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Open the SQLite store named by `--db` or the config, with the
/// configured scheduler and batch size.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub fn open_database(config: &OrbitConfig, db_override: Option<&Path>) -> anyhow::Result<Database<SqliteBackend>> {
    let path = db_override.map_or_else(|| config.store.resolved_path(), Path::to_path_buf);
    let backend = SqliteBackend::open(
        &path,
        Duration::from_millis(config.store.busy_timeout_millis),
    )
    .with_context(|| format!("open orbit store {}", path.display()))?;

    let scheduler =
        SpacedRepetitionScheduler::new(config.scheduler).context("invalid scheduler config")?;
    let reducer = OrbitEventReducer::new(scheduler);
    Ok(Database::with_reducer(backend, reducer).with_batch_size(config.store.batch_size))
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Result of a command that appends one event.
#[derive(Debug, Serialize)]
pub struct EventOutcome {
    pub event: Event,
    /// `None` when the event was already stored.
    pub entity: Option<Entity>,
}

/// Append one event and print the snapshot it produced.
///
/// # Errors
///
/// Returns an error if the event is rejected or the store fails.
pub fn put_event(db: &Database<SqliteBackend>, event: Event, output: OutputMode) -> anyhow::Result<()> {
    let applied = db
        .put_events(vec![event.clone()])
        .map_err(|err| fail_with_store_error(output, err))?;
    let outcome = EventOutcome {
        entity: applied.into_iter().next().map(|applied| applied.entity),
        event,
    };

    render(output, &outcome, |outcome, w| {
        match &outcome.entity {
            Some(entity) => {
                writeln!(
                    w,
                    "✓ {} {} -> {}",
                    outcome.event.event_type(),
                    outcome.event.id,
                    entity.id()
                )?;
                write_component_summary(w, entity)
            }
            None => writeln!(w, "event {} already stored; nothing to do", outcome.event.id),
        }
    })
}

/// One line per component: ID, due time and interval.
pub fn write_component_summary(w: &mut dyn Write, entity: &Entity) -> std::io::Result<()> {
    let Some(task) = entity.as_task() else {
        return Ok(());
    };
    if task.is_deleted {
        writeln!(w, "  (deleted)")?;
    }
    for (component_id, state) in &task.component_states {
        writeln!(
            w,
            "  {component_id:<10} due {}  interval {}",
            millis_to_local_datetime(state.due_timestamp_millis),
            format_interval(state.interval_millis)
        )?;
    }
    Ok(())
}

/// Compact human duration: `0s`, `10m`, `5d 3h`.
pub fn format_interval(millis: i64) -> String {
    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    if millis < MINUTE {
        return format!("{}s", millis / 1000);
    }
    if millis < HOUR {
        return format!("{}m", millis / MINUTE);
    }
    if millis < DAY {
        return format!("{}h", millis / HOUR);
    }
    let days = millis / DAY;
    let hours = (millis % DAY) / HOUR;
    if hours == 0 {
        format!("{days}d")
    } else {
        format!("{days}d {hours}h")
    }
}

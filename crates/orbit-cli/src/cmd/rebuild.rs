//! `orbit rebuild` — recompute every snapshot from the event log.

use crate::output::{OutputMode, fail_with_store_error, render};
use orbit_core::db::{Database, SqliteBackend};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct RebuildSummary {
    pub entity_count: usize,
    pub event_count: usize,
    pub failures: Vec<RebuildFailure>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct RebuildFailure {
    pub entity_id: String,
    pub event_id: String,
    pub message: String,
}

/// Execute `orbit rebuild`.
///
/// # Errors
///
/// Returns an error if the store fails. Entities whose history no longer
/// reduces are listed in the output and keep their old snapshot.
pub fn run_rebuild(db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    let report = db
        .rebuild_all_entities()
        .map_err(|err| fail_with_store_error(output, err))?;
    let summary = RebuildSummary {
        entity_count: report.entity_count,
        event_count: report.event_count,
        failures: report
            .failures
            .iter()
            .map(|failure| RebuildFailure {
                entity_id: failure.entity_id.to_string(),
                event_id: failure.error.event_id().to_string(),
                message: failure.error.to_string(),
            })
            .collect(),
        elapsed_ms: report.elapsed.as_millis(),
    };

    render(output, &summary, |summary, w| {
        writeln!(
            w,
            "rebuilt {} entities from {} events in {}ms",
            summary.entity_count, summary.event_count, summary.elapsed_ms
        )?;
        for failure in &summary.failures {
            writeln!(
                w,
                "  {} failed at {}: {}",
                failure.entity_id, failure.event_id, failure.message
            )?;
        }
        Ok(())
    })
}

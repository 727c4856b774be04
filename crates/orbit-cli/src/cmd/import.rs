//! `orbit import` — load JSON-lines events into the store.
//!
//! Each non-empty line is one event in the wire format. All events go to
//! the store in one `put_events` call, so order within the file does not
//! matter.

use crate::output::{OutputMode, fail_with_store_error, render};
use anyhow::Context;
use clap::Args;
use orbit_core::db::{Database, SqliteBackend, StoreError};
use orbit_core::event::Event;
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON-lines file of events.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub read: usize,
    pub applied: usize,
    pub rejected: Vec<RejectedEntity>,
}

#[derive(Debug, Serialize)]
pub struct RejectedEntity {
    pub entity_id: String,
    pub error_code: String,
    pub message: String,
}

/// Parse every non-empty line of `reader` as an event.
///
/// # Errors
///
/// Returns an error naming the first line that is not a valid event.
pub fn parse_events(reader: impl BufRead, source: &Path) -> anyhow::Result<Vec<Event>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read {}", source.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid event", source.display(), index + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Execute `orbit import <file>`.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, the store fails, or any
/// entity is rejected (the others are still committed).
pub fn run_import(args: &ImportArgs, db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    let file = std::fs::File::open(&args.file)
        .with_context(|| format!("open {}", args.file.display()))?;
    let events = parse_events(BufReader::new(file), &args.file)?;
    let read = events.len();
    tracing::info!(path = %args.file.display(), events = read, "importing events");

    let report = match db.put_events(events) {
        Ok(applied) => ImportReport {
            read,
            applied: applied.len(),
            rejected: Vec::new(),
        },
        Err(StoreError::EntityUpdatesRejected { failures, applied }) => ImportReport {
            read,
            applied: applied.len(),
            rejected: failures
                .into_iter()
                .map(|failure| RejectedEntity {
                    entity_id: failure.entity_id.to_string(),
                    error_code: failure.error.code().code().to_string(),
                    message: failure.error.to_string(),
                })
                .collect(),
        },
        Err(err) => return Err(fail_with_store_error(output, err)),
    };

    render(output, &report, |report, w| {
        writeln!(
            w,
            "read {} events, applied {}, rejected {} entities",
            report.read,
            report.applied,
            report.rejected.len()
        )?;
        for rejected in &report.rejected {
            writeln!(
                w,
                "  {} [{}] {}",
                rejected.entity_id, rejected.error_code, rejected.message
            )?;
        }
        Ok(())
    })?;

    if report.rejected.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} entities rejected", report.rejected.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let input = concat!(
            r#"{"id":"e1","entityID":"t1","type":"taskUpdatedDeleted","timestampMillis":5,"isDeleted":true}"#,
            "\n\n",
            r#"{"id":"e2","entityID":"a1","type":"attachmentIngest","timestampMillis":6,"mimeType":"image/png"}"#,
            "\n",
        );
        let events = parse_events(input.as_bytes(), Path::new("events.jsonl")).expect("parse");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].entity_id.as_str(), "a1");
    }

    #[test]
    fn reports_bad_line_number() {
        let input = "\n{not json}\n";
        let err = parse_events(input.as_bytes(), Path::new("events.jsonl")).expect_err("bad line");
        assert!(err.to_string().contains("events.jsonl:2"));
    }
}

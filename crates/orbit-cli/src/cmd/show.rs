//! `orbit show` — print one entity snapshot.

use super::{format_interval, write_component_summary};
use crate::output::{
    CliError, OutputMode, fail_with_store_error, millis_to_local_datetime, pretty_kv,
    pretty_section, render, render_error,
};
use clap::Args;
use orbit_core::db::{Database, SqliteBackend};
use orbit_core::model::{Entity, EntityId, Task};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task or attachment ID.
    pub id: String,
}

/// Execute `orbit show <id>`.
///
/// # Errors
///
/// Returns an error if the entity does not exist or the store fails.
pub fn run_show(args: &ShowArgs, db: &Database<SqliteBackend>, output: OutputMode) -> anyhow::Result<()> {
    let mut entities = db
        .get_entities(&[EntityId::from(args.id.as_str())])
        .map_err(|err| fail_with_store_error(output, err))?;
    let Some(entity) = entities.remove(args.id.as_str()) else {
        render_error(
            output,
            &CliError::with_details(
                format!("entity '{}' not found", args.id),
                "use `orbit events` to see stored entity IDs",
                "not_found",
            ),
        )?;
        anyhow::bail!("entity '{}' not found", args.id);
    };

    render(output, &entity, |entity, w| render_entity_human(entity, w))
}

fn render_entity_human(entity: &Entity, w: &mut dyn Write) -> io::Result<()> {
    match entity {
        Entity::Task(task) => render_task_human(task, entity, w),
        Entity::AttachmentReference(attachment) => {
            pretty_section(w, &format!("Attachment {}", attachment.id))?;
            pretty_kv(w, "Created", millis_to_local_datetime(attachment.created_at_timestamp_millis))?;
            pretty_kv(w, "MIME type", attachment.mime_type.as_str())
        }
    }
}

fn render_task_human(task: &Task, entity: &Entity, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Task {}", task.id))?;
    pretty_kv(w, "Created", millis_to_local_datetime(task.created_at_timestamp_millis))?;
    pretty_kv(w, "Prompt", &task.spec.content.body().text)?;
    if let orbit_core::model::TaskContent::Qa { answer, .. } = &task.spec.content {
        pretty_kv(w, "Answer", &answer.text)?;
    }
    if let Some(provenance) = &task.provenance {
        pretty_kv(w, "Source", &provenance.identifier)?;
    }
    for (key, value) in &task.metadata {
        pretty_kv(w, key, value)?;
    }
    writeln!(w)?;

    let repeated = task
        .component_states
        .values()
        .filter(|state| state.last_repetition_timestamp_millis.is_some())
        .count();
    writeln!(
        w,
        "Components ({} total, {repeated} reviewed, longest interval {})",
        task.component_states.len(),
        format_interval(
            task.component_states
                .values()
                .map(|state| state.interval_millis)
                .max()
                .unwrap_or(0)
        )
    )?;
    write_component_summary(w, entity)
}

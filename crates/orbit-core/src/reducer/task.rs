//! Task state transitions.

use std::collections::BTreeSet;

use super::ReduceError;
use crate::event::{Event, EventData, TaskIngestData};
use crate::model::{ComponentId, Task, TaskComponentState};
use crate::scheduler::Scheduler;

/// Create a task from its first ingest event.
pub(super) fn ingest(event: &Event, data: &TaskIngestData) -> Task {
    let component_states = data
        .spec
        .content
        .component_ids()
        .into_iter()
        .map(|id| (id, TaskComponentState::new(event.timestamp_millis)))
        .collect();

    Task {
        id: event.entity_id.clone(),
        created_at_timestamp_millis: event.timestamp_millis,
        spec: data.spec.clone(),
        provenance: data.provenance.clone(),
        component_states,
        is_deleted: false,
        metadata: data.metadata.clone().unwrap_or_default(),
    }
}

/// Ingest of an already-known task: spec and components stay, provenance is
/// replaced when supplied, metadata is merged with the event's keys winning.
pub(super) fn reingest(existing: &Task, data: &TaskIngestData) -> Task {
    let mut task = existing.clone();
    if let Some(provenance) = &data.provenance {
        task.provenance = Some(provenance.clone());
    }
    if let Some(metadata) = &data.metadata {
        task.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    task
}

/// Apply a non-ingest task event.
pub(super) fn apply<S: Scheduler>(
    existing: &Task,
    event: &Event,
    scheduler: &S,
) -> Result<Task, ReduceError> {
    match &event.data {
        EventData::TaskRepetition(data) => {
            modify_component(existing, event, &data.component_id, |state| {
                let next = scheduler.compute_next_due_interval_millis_for_repetition(
                    state,
                    event.timestamp_millis,
                    data.outcome,
                );
                TaskComponentState {
                    created_at_timestamp_millis: state.created_at_timestamp_millis,
                    last_repetition_timestamp_millis: Some(event.timestamp_millis),
                    interval_millis: next.interval_millis,
                    due_timestamp_millis: next.due_timestamp_millis,
                }
            })
        }
        EventData::TaskReschedule(data) => {
            modify_component(existing, event, &data.component_id, |state| TaskComponentState {
                due_timestamp_millis: data.new_due_timestamp_millis,
                ..*state
            })
        }
        EventData::TaskUpdateDeleted(data) => Ok(Task {
            is_deleted: data.is_deleted,
            ..existing.clone()
        }),
        EventData::TaskUpdateSpec(data) => {
            let current: BTreeSet<&ComponentId> = existing.component_states.keys().collect();
            let proposed = data.spec.content.component_ids();
            if proposed.len() != current.len() || !proposed.iter().all(|id| current.contains(id))
            {
                return Err(ReduceError::ComponentSetChanged {
                    event_id: event.id.clone(),
                    task_id: existing.id.clone(),
                });
            }
            Ok(Task {
                spec: data.spec.clone(),
                ..existing.clone()
            })
        }
        EventData::TaskUpdateProvenance(data) => Ok(Task {
            provenance: data.provenance.clone(),
            ..existing.clone()
        }),
        EventData::TaskUpdateMetadata(data) => {
            let mut task = existing.clone();
            task.metadata
                .extend(data.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(task)
        }
        EventData::TaskIngest(data) => Ok(reingest(existing, data)),
        EventData::AttachmentIngest(_) => Err(ReduceError::EntityTypeMismatch {
            event_id: event.id.clone(),
            entity_id: event.entity_id.clone(),
            event_type: event.event_type(),
            entity_type: crate::model::EntityType::Task,
        }),
    }
}

fn modify_component(
    existing: &Task,
    event: &Event,
    component_id: &str,
    transform: impl FnOnce(&TaskComponentState) -> TaskComponentState,
) -> Result<Task, ReduceError> {
    let Some(state) = existing.component_states.get(component_id) else {
        return Err(ReduceError::UnknownComponent {
            event_id: event.id.clone(),
            task_id: existing.id.clone(),
            component_id: component_id.to_string(),
        });
    };
    let next = transform(state);
    let mut task = existing.clone();
    task.component_states.insert(component_id.to_string(), next);
    Ok(task)
}

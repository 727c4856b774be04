#![allow(dead_code)]

use orbit_core::event::{
    AttachmentIngestData, Event, EventData, TaskIngestData, TaskRepetitionData,
    TaskRepetitionOutcome, TaskRescheduleData, TaskUpdateDeletedData,
};
use orbit_core::model::{
    AttachmentMimeType, ClozeTaskContentComponent, Entity, Task, TaskContent, TaskContentField,
    TaskSpec,
};

pub fn plain_spec(text: &str) -> TaskSpec {
    TaskSpec::memory(TaskContent::Plain {
        body: TaskContentField::text(text),
    })
}

pub fn cloze_spec(component_ids: &[&str]) -> TaskSpec {
    TaskSpec::memory(TaskContent::Cloze {
        body: TaskContentField::text("cloze body"),
        components: component_ids
            .iter()
            .zip(0u32..)
            .map(|(id, order)| {
                (
                    (*id).to_string(),
                    ClozeTaskContentComponent {
                        order,
                        ranges: vec![],
                    },
                )
            })
            .collect(),
    })
}

pub fn ingest_spec(event_id: &str, task_id: &str, timestamp_millis: i64, spec: TaskSpec) -> Event {
    Event::new(
        event_id,
        task_id,
        timestamp_millis,
        EventData::TaskIngest(TaskIngestData {
            spec,
            provenance: None,
            metadata: None,
        }),
    )
}

pub fn ingest(event_id: &str, task_id: &str, timestamp_millis: i64) -> Event {
    ingest_spec(event_id, task_id, timestamp_millis, plain_spec(task_id))
}

pub fn ingest_cloze(
    event_id: &str,
    task_id: &str,
    timestamp_millis: i64,
    component_ids: &[&str],
) -> Event {
    ingest_spec(event_id, task_id, timestamp_millis, cloze_spec(component_ids))
}

pub fn repetition(
    event_id: &str,
    task_id: &str,
    timestamp_millis: i64,
    component_id: &str,
    outcome: TaskRepetitionOutcome,
) -> Event {
    Event::new(
        event_id,
        task_id,
        timestamp_millis,
        EventData::TaskRepetition(TaskRepetitionData {
            component_id: component_id.to_string(),
            review_session_id: "session".to_string(),
            outcome,
        }),
    )
}

pub fn reschedule(
    event_id: &str,
    task_id: &str,
    timestamp_millis: i64,
    component_id: &str,
    new_due_timestamp_millis: i64,
) -> Event {
    Event::new(
        event_id,
        task_id,
        timestamp_millis,
        EventData::TaskReschedule(TaskRescheduleData {
            component_id: component_id.to_string(),
            new_due_timestamp_millis,
        }),
    )
}

pub fn delete(event_id: &str, task_id: &str, timestamp_millis: i64) -> Event {
    Event::new(
        event_id,
        task_id,
        timestamp_millis,
        EventData::TaskUpdateDeleted(TaskUpdateDeletedData { is_deleted: true }),
    )
}

pub fn attachment(event_id: &str, attachment_id: &str, timestamp_millis: i64) -> Event {
    Event::new(
        event_id,
        attachment_id,
        timestamp_millis,
        EventData::AttachmentIngest(AttachmentIngestData {
            mime_type: AttachmentMimeType::Png,
        }),
    )
}

pub fn as_task(entity: &Entity) -> &Task {
    entity.as_task().expect("entity is a task")
}

pub fn entity_ids(entities: &[Entity]) -> Vec<&str> {
    entities.iter().map(|entity| entity.id().as_str()).collect()
}

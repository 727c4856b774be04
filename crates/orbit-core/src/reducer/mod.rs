//! Event reducers: `(prior snapshot, event) -> new snapshot`.
//!
//! The [`Database`](crate::db::Database) is agnostic to entity semantics; it
//! folds events through whatever [`EventReducer`] it was built with. The
//! default [`OrbitEventReducer`] implements the task and attachment state
//! machines and consults a [`Scheduler`] for repetitions.
//!
//! Reducers never mutate their input: each call returns a fresh [`Entity`].

mod attachment;
mod task;

use thiserror::Error;

use crate::error::ErrorCode;
use crate::event::{Event, EventData, EventType};
use crate::model::{ComponentId, Entity, EntityId, EntityType, EventId};
use crate::scheduler::{Scheduler, SpacedRepetitionScheduler};

/// Why an event could not be applied to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("can't apply {event_type} event {event_id} to entity {entity_id} without a prior snapshot")]
    MissingSnapshot {
        event_id: EventId,
        entity_id: EntityId,
        event_type: EventType,
    },

    #[error("event {event_id} references unknown component '{component_id}' of task {task_id}")]
    UnknownComponent {
        event_id: EventId,
        task_id: EntityId,
        component_id: ComponentId,
    },

    #[error("{event_type} event {event_id} can't apply to {entity_type} entity {entity_id}")]
    EntityTypeMismatch {
        event_id: EventId,
        entity_id: EntityId,
        event_type: EventType,
        entity_type: EntityType,
    },

    #[error("spec update {event_id} would change the component set of task {task_id}")]
    ComponentSetChanged { event_id: EventId, task_id: EntityId },
}

impl ReduceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingSnapshot { .. } => ErrorCode::MissingSnapshot,
            Self::UnknownComponent { .. } => ErrorCode::UnknownComponent,
            Self::EntityTypeMismatch { .. } => ErrorCode::EntityTypeMismatch,
            Self::ComponentSetChanged { .. } => ErrorCode::ComponentSetChanged,
        }
    }

    /// The event that failed to apply.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        match self {
            Self::MissingSnapshot { event_id, .. }
            | Self::UnknownComponent { event_id, .. }
            | Self::EntityTypeMismatch { event_id, .. }
            | Self::ComponentSetChanged { event_id, .. } => event_id,
        }
    }
}

/// Deterministic snapshot transition function.
pub trait EventReducer: Send + Sync {
    /// Apply `event` on top of `prior`, returning the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`ReduceError`] if the event's preconditions don't hold for
    /// `prior`.
    fn reduce(&self, prior: Option<&Entity>, event: &Event) -> Result<Entity, ReduceError>;
}

impl<F> EventReducer for F
where
    F: Fn(Option<&Entity>, &Event) -> Result<Entity, ReduceError> + Send + Sync,
{
    fn reduce(&self, prior: Option<&Entity>, event: &Event) -> Result<Entity, ReduceError> {
        self(prior, event)
    }
}

/// Fold `events` (already in canonical order) onto `seed`.
///
/// Returns one snapshot per event, in event order; the last element is the
/// final snapshot.
///
/// # Errors
///
/// Stops at the first event the reducer rejects.
pub fn fold_events<R: EventReducer + ?Sized>(
    reducer: &R,
    seed: Option<Entity>,
    events: &[Event],
) -> Result<Vec<Entity>, ReduceError> {
    let mut snapshots: Vec<Entity> = Vec::with_capacity(events.len());
    let mut current = seed;
    for event in events {
        let next = reducer.reduce(current.as_ref(), event)?;
        snapshots.push(next.clone());
        current = Some(next);
    }
    Ok(snapshots)
}

/// The default reducer for orbit entities.
#[derive(Debug, Clone, Default)]
pub struct OrbitEventReducer<S = SpacedRepetitionScheduler> {
    scheduler: S,
}

impl<S: Scheduler> OrbitEventReducer<S> {
    pub const fn new(scheduler: S) -> Self {
        Self { scheduler }
    }

    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

impl<S: Scheduler> EventReducer for OrbitEventReducer<S> {
    fn reduce(&self, prior: Option<&Entity>, event: &Event) -> Result<Entity, ReduceError> {
        let expected = event.event_type().entity_type();
        if let Some(entity) = prior.filter(|entity| entity.entity_type() != expected) {
            return Err(ReduceError::EntityTypeMismatch {
                event_id: event.id.clone(),
                entity_id: event.entity_id.clone(),
                event_type: event.event_type(),
                entity_type: entity.entity_type(),
            });
        }

        match (&event.data, prior) {
            (EventData::AttachmentIngest(data), Some(Entity::AttachmentReference(existing))) => {
                Ok(attachment::ingest(Some(existing), event, data).into())
            }
            (EventData::AttachmentIngest(data), _) => {
                Ok(attachment::ingest(None, event, data).into())
            }
            (EventData::TaskIngest(data), Some(Entity::Task(existing))) => {
                Ok(task::reingest(existing, data).into())
            }
            (EventData::TaskIngest(data), _) => Ok(task::ingest(event, data).into()),
            (_, Some(Entity::Task(existing))) => {
                task::apply(existing, event, &self.scheduler).map(Entity::from)
            }
            (_, _) => Err(ReduceError::MissingSnapshot {
                event_id: event.id.clone(),
                entity_id: event.entity_id.clone(),
                event_type: event.event_type(),
            }),
        }
    }
}

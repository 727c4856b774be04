//! Scheduling strategies for task components.
//!
//! A [`Scheduler`] is a pure function from a component's current state and a
//! review outcome to its next due time and interval. The reducer consults it
//! for every `taskRepetition` event, so implementations must be
//! deterministic: the same inputs always produce the same output.

pub mod spaced;

pub use spaced::{SpacedRepetitionScheduler, SpacedRepetitionSchedulerConfig};

use crate::event::TaskRepetitionOutcome;
use crate::model::TaskComponentState;

/// Next scheduling state for a component after one repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOutput {
    pub due_timestamp_millis: i64,
    pub interval_millis: i64,
}

/// A scheduling strategy.
pub trait Scheduler: Send + Sync {
    /// Compute the next due time and interval for a component reviewed at
    /// `timestamp_millis` with the given outcome.
    fn compute_next_due_interval_millis_for_repetition(
        &self,
        component_state: &TaskComponentState,
        timestamp_millis: i64,
        outcome: TaskRepetitionOutcome,
    ) -> SchedulerOutput;
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn compute_next_due_interval_millis_for_repetition(
        &self,
        component_state: &TaskComponentState,
        timestamp_millis: i64,
        outcome: TaskRepetitionOutcome,
    ) -> SchedulerOutput {
        (**self).compute_next_due_interval_millis_for_repetition(
            component_state,
            timestamp_millis,
            outcome,
        )
    }
}

//! Default spaced-repetition strategy: geometric interval growth on success,
//! geometric decay (floored at the initial interval) on failure.

use serde::{Deserialize, Serialize};

use super::{Scheduler, SchedulerOutput};
use crate::config::ConfigError;
use crate::event::TaskRepetitionOutcome;
use crate::model::TaskComponentState;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Tuning knobs for [`SpacedRepetitionScheduler`].
///
/// Loaded from the `[scheduler]` table of the config file. A growth factor
/// below 1.0 would let a successful review shrink the interval, so
/// [`SpacedRepetitionScheduler::new`] rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacedRepetitionSchedulerConfig {
    /// Multiplier applied to the interval after a successful review.
    pub interval_growth_factor: f64,
    /// Interval granted on the first successful review, and the floor for
    /// every later interval.
    pub initial_review_interval_millis: i64,
    /// Delay before a forgotten component is due again.
    pub forgotten_retry_delay_millis: i64,
}

impl Default for SpacedRepetitionSchedulerConfig {
    fn default() -> Self {
        Self {
            interval_growth_factor: 2.3,
            initial_review_interval_millis: 5 * DAY_MILLIS,
            forgotten_retry_delay_millis: 10 * 60 * 1000,
        }
    }
}

impl SpacedRepetitionSchedulerConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let factor = self.interval_growth_factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.interval_growth_factor",
                reason: format!("must be a finite number >= 1.0, got {factor}"),
            });
        }
        if self.initial_review_interval_millis <= 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.initial_review_interval_millis",
                reason: "must be positive".to_string(),
            });
        }
        if self.forgotten_retry_delay_millis <= 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.forgotten_retry_delay_millis",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// The default scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpacedRepetitionScheduler {
    config: SpacedRepetitionSchedulerConfig,
}

impl SpacedRepetitionScheduler {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails
    /// [`SpacedRepetitionSchedulerConfig::validate`].
    pub fn new(config: SpacedRepetitionSchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &SpacedRepetitionSchedulerConfig {
        &self.config
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn grown_interval(&self, interval_millis: i64) -> i64 {
        // Float-to-int `as` saturates, so huge intervals clamp to i64::MAX.
        let grown = (interval_millis as f64 * self.config.interval_growth_factor).floor() as i64;
        grown.max(self.config.initial_review_interval_millis)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn decayed_interval(&self, interval_millis: i64) -> i64 {
        let initial = self.config.initial_review_interval_millis;
        if interval_millis < initial {
            return interval_millis;
        }
        let decayed = (interval_millis as f64 / self.config.interval_growth_factor).floor() as i64;
        decayed.max(initial)
    }
}

impl Scheduler for SpacedRepetitionScheduler {
    fn compute_next_due_interval_millis_for_repetition(
        &self,
        component_state: &TaskComponentState,
        timestamp_millis: i64,
        outcome: TaskRepetitionOutcome,
    ) -> SchedulerOutput {
        match outcome {
            TaskRepetitionOutcome::Remembered | TaskRepetitionOutcome::Skipped => {
                let interval_millis = if component_state.last_repetition_timestamp_millis.is_none()
                {
                    self.config.initial_review_interval_millis
                } else {
                    self.grown_interval(component_state.interval_millis)
                };
                SchedulerOutput {
                    due_timestamp_millis: timestamp_millis.saturating_add(interval_millis),
                    interval_millis,
                }
            }
            TaskRepetitionOutcome::Forgotten => SchedulerOutput {
                due_timestamp_millis: timestamp_millis
                    .saturating_add(self.config.forgotten_retry_delay_millis),
                interval_millis: self.decayed_interval(component_state.interval_millis),
            },
        }
    }
}

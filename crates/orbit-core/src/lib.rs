//! orbit-core library.
//!
//! An event-sourced store for spaced-repetition tasks. Applications append
//! immutable [`Event`]s; the [`Database`] folds them through an
//! [`EventReducer`] into entity snapshots and persists both through a
//! [`DatabaseBackend`].
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums per layer, each mapping to an
//!   [`ErrorCode`].
//! - **Logging**: `tracing` macros; the binary installs the subscriber.

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod model;
pub mod reducer;
pub mod review_queue;
pub mod scheduler;

pub use db::{Database, DatabaseBackend, MemoryBackend, SqliteBackend, StoreError};
pub use error::ErrorCode;
pub use event::{Event, EventData, EventType};
pub use model::{Entity, EntityId, EntityType, EventId, Task};
pub use reducer::{EventReducer, OrbitEventReducer, ReduceError};
pub use scheduler::{Scheduler, SpacedRepetitionScheduler};

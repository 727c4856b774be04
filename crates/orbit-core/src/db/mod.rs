//! Event-sourced entity storage.
//!
//! - [`backend`] defines the storage contract every engine implements.
//! - [`derived`] defines the due-time index rows backends maintain for tasks.
//! - [`database`] orchestrates a backend and a reducer: it merges new events
//!   into entity snapshots and serves queries.
//! - [`memory`] and [`sqlite`] are the two shipped backends.

pub mod backend;
pub mod database;
pub mod derived;
pub mod memory;
pub mod query;
pub mod sqlite;

pub use backend::{DatabaseBackend, EntityRecord, EntityTransformer, EntityUpdate, EventHistory};
pub use database::{AppliedEvent, Database, DEFAULT_BATCH_SIZE, EntityFailure, RebuildReport};
pub use derived::{DueIndexRow, task_component_rows};
pub use memory::MemoryBackend;
pub use query::{EntityPredicate, EntityQuery, EventPredicate, EventQuery, Relation};
pub use sqlite::SqliteBackend;

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCode;
use crate::model::{EntityId, EntityType};

/// Errors surfaced by backends and the [`Database`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("stored {what} '{id}' could not be decoded: {source}")]
    Corrupt {
        what: &'static str,
        id: String,
        source: serde_json::Error,
    },

    #[error("{what} '{id}' could not be encoded: {source}")]
    Encode {
        what: &'static str,
        id: String,
        source: serde_json::Error,
    },

    #[error("afterID '{id}' does not exist")]
    UnknownAfterId { id: String },

    #[error("predicate not supported for {entity_type} queries: {reason}")]
    UnsupportedPredicate {
        entity_type: EntityType,
        reason: &'static str,
    },

    #[error("entity {entity_id} has no events to rebuild its snapshot from")]
    EmptyHistory { entity_id: EntityId },

    #[error("{} entity update(s) rejected (first: {})", failures.len(), first_failure(failures))]
    EntityUpdatesRejected {
        /// Entities whose events failed to reduce; none of their events
        /// were stored.
        failures: Vec<EntityFailure>,
        /// Everything that was committed despite the failures.
        applied: Vec<AppliedEvent>,
    },

    #[error("store schema version {found} is newer than this build supports ({supported})")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("database backend is closed")]
    Closed,

    #[error("database backend lock poisoned")]
    Poisoned,
}

fn first_failure(failures: &[EntityFailure]) -> String {
    failures
        .first()
        .map_or_else(String::new, |failure| failure.error.to_string())
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Sqlite(_) | Self::Io { .. } => ErrorCode::StorageFailure,
            Self::Corrupt { .. } => ErrorCode::CorruptRecord,
            Self::Encode { .. } | Self::Poisoned => ErrorCode::InternalUnexpected,
            Self::UnknownAfterId { .. } => ErrorCode::UnknownCursor,
            Self::UnsupportedPredicate { .. } => ErrorCode::UnsupportedPredicate,
            Self::EmptyHistory { .. } => ErrorCode::InconsistentHistory,
            Self::SchemaTooNew { .. } => ErrorCode::UnsupportedSchemaVersion,
            Self::EntityUpdatesRejected { .. } => ErrorCode::EntityUpdatesRejected,
            Self::Closed => ErrorCode::BackendClosed,
        }
    }
}

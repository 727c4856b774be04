use std::fmt;

/// Machine-readable error codes shared by every error type in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidConfigValue,
    MissingSnapshot,
    UnknownComponent,
    EntityTypeMismatch,
    ComponentSetChanged,
    UnknownCursor,
    UnsupportedPredicate,
    EntityUpdatesRejected,
    InconsistentHistory,
    CorruptRecord,
    UnsupportedSchemaVersion,
    StorageFailure,
    BackendClosed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidConfigValue => "E1002",
            Self::MissingSnapshot => "E2001",
            Self::UnknownComponent => "E2002",
            Self::EntityTypeMismatch => "E2003",
            Self::ComponentSetChanged => "E2004",
            Self::UnknownCursor => "E3001",
            Self::UnsupportedPredicate => "E3002",
            Self::EntityUpdatesRejected => "E3003",
            Self::InconsistentHistory => "E4001",
            Self::CorruptRecord => "E4002",
            Self::UnsupportedSchemaVersion => "E4003",
            Self::StorageFailure => "E5001",
            Self::BackendClosed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfigValue => "Invalid configuration value",
            Self::MissingSnapshot => "Event applied before its entity was ingested",
            Self::UnknownComponent => "Event references an unknown task component",
            Self::EntityTypeMismatch => "Event addressed to an entity of another type",
            Self::ComponentSetChanged => "Spec update would change the task's components",
            Self::UnknownCursor => "Pagination cursor does not exist",
            Self::UnsupportedPredicate => "Query predicate not supported",
            Self::EntityUpdatesRejected => "Some entity updates were rejected",
            Self::InconsistentHistory => "Stored event history is inconsistent",
            Self::CorruptRecord => "Stored record could not be decoded",
            Self::UnsupportedSchemaVersion => "Store was written by a newer orbit",
            Self::StorageFailure => "Storage backend failure",
            Self::BackendClosed => "Storage backend is closed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in the orbit config.toml and retry."),
            Self::InvalidConfigValue => {
                Some("Growth factor must be >= 1.0; intervals and batch size must be positive.")
            }
            Self::MissingSnapshot => {
                Some("Deliver the entity's ingest event first, or resend its full history.")
            }
            Self::UnknownComponent | Self::ComponentSetChanged => {
                Some("Check the component IDs against the task's spec content.")
            }
            Self::EntityTypeMismatch => Some("Check the event's entityID."),
            Self::UnknownCursor => Some("Restart pagination without an afterID."),
            Self::UnsupportedPredicate => {
                Some("Only dueTimestampMillis predicates on task queries are indexed.")
            }
            Self::EntityUpdatesRejected => {
                Some("Inspect the per-entity failures; the other entities were committed.")
            }
            Self::InconsistentHistory | Self::CorruptRecord => {
                Some("Run `orbit rebuild`. If persistent, report a bug with logs.")
            }
            Self::UnsupportedSchemaVersion => Some("Upgrade orbit before opening this store."),
            Self::StorageFailure => Some("Check disk space and write permissions."),
            Self::BackendClosed => Some("Open a new database handle."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

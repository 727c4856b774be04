//! Opaque identifiers for entities and events.
//!
//! IDs are plain strings on the wire. Generated IDs are UUIDv7 in simple
//! (hyphen-free) hex form, so freshly generated IDs sort lexicographically
//! in creation order and can be used directly as storage index keys.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a new globally unique, time-ordered identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().simple().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of an entity (task or attachment reference).
    EntityId
);

string_id!(
    /// Identifier of a single immutable event.
    EventId
);

/// Task entities are addressed by their entity ID.
pub type TaskId = EntityId;

/// Attachment references are addressed by their entity ID.
pub type AttachmentId = EntityId;

/// Identifier of a schedulable component within one task.
pub type ComponentId = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_hex() {
        let first = EventId::generate();
        let second = EventId::generate();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 32);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = EntityId::from("task-a");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"task-a\"");
        let back: EntityId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn borrows_as_str_for_map_lookups() {
        let mut map = std::collections::HashMap::new();
        map.insert(EntityId::from("x"), 1);
        assert_eq!(map.get("x"), Some(&1));
    }
}

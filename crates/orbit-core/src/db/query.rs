//! Query types for `list_events` / `list_entities`.
//!
//! Results come back in a backend-internal order (insertion order for both
//! shipped backends) that is stable for one store, so `after_id` pagination
//! is safe. The order is not comparable across backends or devices.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

use crate::model::{EntityId, EntityType, EventId};

/// Comparison operator of a query predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn sql_op(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Whether `lhs <relation> rhs` holds.
    #[must_use]
    pub fn matches<T: Ord>(self, lhs: &T, rhs: &T) -> bool {
        let ordering = lhs.cmp(rhs);
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }

    /// Range of keys `k` satisfying `k <relation> value`, for ordered-map
    /// scans.
    #[must_use]
    pub const fn range_bounds(self, value: i64) -> (Bound<i64>, Bound<i64>) {
        match self {
            Self::Eq => (Bound::Included(value), Bound::Included(value)),
            Self::Lt => (Bound::Unbounded, Bound::Excluded(value)),
            Self::Le => (Bound::Unbounded, Bound::Included(value)),
            Self::Gt => (Bound::Excluded(value), Bound::Unbounded),
            Self::Ge => (Bound::Included(value), Bound::Unbounded),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_op())
    }
}

impl std::str::FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Self::Eq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            other => Err(format!("unknown relation '{other}': expected =, <, <=, > or >=")),
        }
    }
}

/// Filter for event queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPredicate {
    /// Events addressed to one entity.
    EntityId(EntityId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub predicate: Option<EventPredicate>,
    /// Return only events stored after this one.
    pub after_id: Option<EventId>,
    pub limit: Option<usize>,
}

impl EventQuery {
    #[must_use]
    pub fn for_entity(entity_id: impl Into<EntityId>) -> Self {
        Self {
            predicate: Some(EventPredicate::EntityId(entity_id.into())),
            ..Self::default()
        }
    }
}

/// Filter for entity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPredicate {
    /// Tasks with at least one live component whose due time satisfies the
    /// relation. Served from the derived due-time index.
    DueTimestampMillis(Relation, i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    pub entity_type: EntityType,
    pub predicate: Option<EntityPredicate>,
    /// Return only entities stored after this one.
    pub after_id: Option<EntityId>,
    pub limit: Option<usize>,
}

impl EntityQuery {
    #[must_use]
    pub const fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            predicate: None,
            after_id: None,
            limit: None,
        }
    }

    /// Tasks with a component due `relation` `timestamp_millis`.
    #[must_use]
    pub const fn tasks_due(relation: Relation, timestamp_millis: i64) -> Self {
        Self {
            entity_type: EntityType::Task,
            predicate: Some(EntityPredicate::DueTimestampMillis(relation, timestamp_millis)),
            after_id: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn after(mut self, id: impl Into<EntityId>) -> Self {
        self.after_id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject predicates the entity type has no index for.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedPredicate`](super::StoreError::UnsupportedPredicate)
    /// for a due-time predicate on a non-task query.
    pub fn validate(&self) -> Result<(), super::StoreError> {
        match (self.predicate, self.entity_type) {
            (Some(EntityPredicate::DueTimestampMillis(..)), EntityType::Task) | (None, _) => Ok(()),
            (Some(EntityPredicate::DueTimestampMillis(..)), entity_type) => {
                Err(super::StoreError::UnsupportedPredicate {
                    entity_type,
                    reason: "dueTimestampMillis only applies to tasks",
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn relation_matches_agrees_with_range_bounds() {
        let keys: BTreeMap<i64, ()> = (0..10).map(|k| (k, ())).collect();
        for relation in [
            Relation::Eq,
            Relation::Lt,
            Relation::Le,
            Relation::Gt,
            Relation::Ge,
        ] {
            let scanned: Vec<i64> = keys.range(relation.range_bounds(5)).map(|(k, ())| *k).collect();
            let filtered: Vec<i64> = (0..10).filter(|k| relation.matches(k, &5)).collect();
            assert_eq!(scanned, filtered, "{relation}");
        }
    }

    #[test]
    fn relation_parses_sql_ops() {
        for op in ["=", "<", "<=", ">", ">="] {
            let relation: Relation = op.parse().expect("parse");
            assert_eq!(relation.sql_op(), op);
        }
        assert!("!=".parse::<Relation>().is_err());
    }

    #[test]
    fn due_predicate_requires_task_query() {
        assert!(EntityQuery::tasks_due(Relation::Le, 5).validate().is_ok());
        let bad = EntityQuery {
            entity_type: EntityType::AttachmentReference,
            ..EntityQuery::tasks_due(Relation::Le, 5)
        };
        assert!(bad.validate().is_err());
        assert!(EntityQuery::new(EntityType::AttachmentReference)
            .validate()
            .is_ok());
    }
}

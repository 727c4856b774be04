//! Property tests: delivery order never changes the resulting snapshot.

mod common;

use common::{cloze_spec, ingest_spec, repetition, reschedule};
use orbit_core::db::{Database, DatabaseBackend, MemoryBackend, SqliteBackend};
use orbit_core::event::{
    Event, EventData, TaskRepetitionOutcome, TaskUpdateDeletedData, TaskUpdateMetadataData,
    sort_events,
};
use orbit_core::model::{Entity, EntityId, TaskComponentState};
use orbit_core::reducer::{EventReducer, OrbitEventReducer, fold_events};
use orbit_core::scheduler::{Scheduler, SpacedRepetitionScheduler};
use proptest::prelude::*;
use std::collections::BTreeMap;

const TASK_ID: &str = "task";
const COMPONENTS: [&str; 3] = ["a", "b", "c"];

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_outcome() -> impl Strategy<Value = TaskRepetitionOutcome> {
    prop_oneof![
        Just(TaskRepetitionOutcome::Remembered),
        Just(TaskRepetitionOutcome::Forgotten),
        Just(TaskRepetitionOutcome::Skipped),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Repeat(usize, TaskRepetitionOutcome),
    Reschedule(usize, i64),
    Delete(bool),
    Metadata(String),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..COMPONENTS.len(), arb_outcome()).prop_map(|(c, o)| Op::Repeat(c, o)),
        2 => (0..COMPONENTS.len(), 0i64..1_000_000).prop_map(|(c, due)| Op::Reschedule(c, due)),
        1 => any::<bool>().prop_map(Op::Delete),
        1 => "[a-z]{1,6}".prop_map(Op::Metadata),
    ]
}

/// An ingest at the earliest timestamp plus follow-up events for one task.
fn arb_history() -> impl Strategy<Value = (Event, Vec<Event>)> {
    prop::collection::vec((1i64..5_000, arb_op()), 1..24).prop_map(|ops| {
        let ingest = ingest_spec("op-000", TASK_ID, 0, cloze_spec(&COMPONENTS));
        let rest = ops
            .into_iter()
            .enumerate()
            .map(|(index, (timestamp_millis, op))| {
                let id = format!("op-{:03}", index + 1);
                match op {
                    Op::Repeat(c, outcome) => {
                        repetition(&id, TASK_ID, timestamp_millis, COMPONENTS[c], outcome)
                    }
                    Op::Reschedule(c, due) => {
                        reschedule(&id, TASK_ID, timestamp_millis, COMPONENTS[c], due)
                    }
                    Op::Delete(is_deleted) => Event::new(
                        id,
                        TASK_ID,
                        timestamp_millis,
                        EventData::TaskUpdateDeleted(TaskUpdateDeletedData { is_deleted }),
                    ),
                    Op::Metadata(value) => Event::new(
                        id,
                        TASK_ID,
                        timestamp_millis,
                        EventData::TaskUpdateMetadata(TaskUpdateMetadataData {
                            metadata: BTreeMap::from([("tag".to_string(), value)]),
                        }),
                    ),
                }
            })
            .collect();
        (ingest, rest)
    })
}

fn arb_delivery() -> impl Strategy<Value = (Event, Vec<Event>, Vec<usize>)> {
    arb_history().prop_flat_map(|(ingest, rest)| {
        (
            Just(ingest),
            Just(rest).prop_shuffle(),
            prop::collection::vec(1usize..6, 0..8),
        )
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sorted_fold(ingest: &Event, rest: &[Event]) -> Entity {
    let mut all = vec![ingest.clone()];
    all.extend_from_slice(rest);
    sort_events(&mut all);
    fold_events(&OrbitEventReducer::<SpacedRepetitionScheduler>::default(), None, &all)
        .expect("history reduces")
        .pop()
        .expect("at least one snapshot")
}

/// Deliver `ingest` first, then `rest` in chunks of `chunk_sizes` (the
/// remainder goes in a final call).
fn deliver<B: DatabaseBackend>(
    db: &Database<B>,
    ingest: &Event,
    rest: &[Event],
    chunk_sizes: &[usize],
) -> Entity {
    let mut remaining = rest;
    let mut first = vec![ingest.clone()];
    let mut calls: Vec<Vec<Event>> = Vec::new();
    for &size in chunk_sizes {
        let take = size.min(remaining.len());
        let (head, tail) = remaining.split_at(take);
        remaining = tail;
        if calls.is_empty() {
            first.extend_from_slice(head);
            calls.push(std::mem::take(&mut first));
        } else {
            calls.push(head.to_vec());
        }
    }
    if calls.is_empty() {
        first.extend_from_slice(remaining);
        calls.push(first);
    } else {
        calls.push(remaining.to_vec());
    }

    for call in calls {
        db.put_events(call).expect("put events");
    }
    db.get_entities(&[EntityId::from(TASK_ID)])
        .expect("get entities")
        .remove(TASK_ID)
        .expect("task stored")
}

fn repeated_state() -> impl Strategy<Value = TaskComponentState> {
    (0i64..1_000_000_000_000, 0i64..1_000_000_000_000, any::<bool>()).prop_map(
        |(interval_millis, last, repeated)| TaskComponentState {
            created_at_timestamp_millis: 0,
            last_repetition_timestamp_millis: repeated.then_some(last),
            // A component that was never repeated has no interval yet.
            interval_millis: if repeated { interval_millis } else { 0 },
            due_timestamp_millis: last,
        },
    )
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn shuffled_split_delivery_matches_sorted_fold((ingest, rest, chunks) in arb_delivery()) {
        let db = Database::new(MemoryBackend::new());
        let delivered = deliver(&db, &ingest, &rest, &chunks);
        prop_assert_eq!(delivered, sorted_fold(&ingest, &rest));
    }

    #[test]
    fn one_event_per_call_matches_sorted_fold((ingest, rest, _chunks) in arb_delivery()) {
        let db = Database::new(MemoryBackend::new());
        let sizes = vec![1; rest.len()];
        let delivered = deliver(&db, &ingest, &rest, &sizes);
        prop_assert_eq!(delivered, sorted_fold(&ingest, &rest));
    }

    #[test]
    fn fast_and_slow_paths_agree((ingest, mut rest) in arb_history()) {
        // Ascending delivery takes the fast path whenever timestamps are
        // strictly increasing; descending delivery forces the slow path.
        sort_events(&mut rest);
        let ascending = Database::new(MemoryBackend::new());
        let fast = deliver(&ascending, &ingest, &rest, &vec![1; rest.len()]);

        rest.reverse();
        let descending = Database::new(MemoryBackend::new());
        let slow = deliver(&descending, &ingest, &rest, &vec![1; rest.len()]);

        prop_assert_eq!(fast, slow);
    }

    #[test]
    fn redelivery_changes_nothing((ingest, rest, chunks) in arb_delivery()) {
        let db = Database::new(MemoryBackend::new());
        let first = deliver(&db, &ingest, &rest, &chunks);
        let second = deliver(&db, &ingest, &rest, &[]);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn remembered_never_shrinks_interval(
        state in repeated_state(),
        at in 0i64..1_000_000_000_000,
        outcome in prop_oneof![
            Just(TaskRepetitionOutcome::Remembered),
            Just(TaskRepetitionOutcome::Skipped),
        ],
    ) {
        let output = SpacedRepetitionScheduler::default()
            .compute_next_due_interval_millis_for_repetition(&state, at, outcome);
        prop_assert!(output.interval_millis >= state.interval_millis);
        prop_assert!(output.due_timestamp_millis > at);
    }

    #[test]
    fn forgotten_never_grows_interval(
        state in repeated_state(),
        at in 0i64..1_000_000_000_000,
    ) {
        let scheduler = SpacedRepetitionScheduler::default();
        let output = scheduler.compute_next_due_interval_millis_for_repetition(
            &state,
            at,
            TaskRepetitionOutcome::Forgotten,
        );
        let initial = scheduler.config().initial_review_interval_millis;
        prop_assert!(output.interval_millis <= state.interval_millis || output.interval_millis == initial);
        prop_assert_eq!(
            output.due_timestamp_millis,
            at + scheduler.config().forgotten_retry_delay_millis
        );
    }

    #[test]
    fn cloze_component_count_is_fixed(
        keys in prop::collection::btree_set("[a-z]{1,4}", 1..8),
        picks in prop::collection::vec((any::<prop::sample::Index>(), arb_outcome(), 1i64..5_000), 0..16),
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let mut events = vec![ingest_spec("op-000", TASK_ID, 0, cloze_spec(&key_refs))];
        for (n, (pick, outcome, at)) in picks.into_iter().enumerate() {
            let component = pick.get(&key_refs);
            events.push(repetition(&format!("op-{:03}", n + 1), TASK_ID, at, component, outcome));
        }
        sort_events(&mut events);

        let reducer = OrbitEventReducer::<SpacedRepetitionScheduler>::default();
        for snapshot in fold_events(&reducer, None, &events).expect("reduces") {
            let task = snapshot.into_task().expect("task");
            prop_assert_eq!(task.component_states.len(), keys.len());
        }
    }

    #[test]
    fn reschedule_touches_only_its_component(
        target in 0..COMPONENTS.len(),
        due in any::<i64>(),
    ) {
        let reducer = OrbitEventReducer::<SpacedRepetitionScheduler>::default();
        let ingested = reducer
            .reduce(None, &ingest_spec("e1", TASK_ID, 10, cloze_spec(&COMPONENTS)))
            .expect("ingest");
        let repeated = reducer
            .reduce(
                Some(&ingested),
                &repetition("e2", TASK_ID, 20, COMPONENTS[target], TaskRepetitionOutcome::Remembered),
            )
            .expect("repeat");
        let moved = reducer
            .reduce(Some(&repeated), &reschedule("e3", TASK_ID, 30, COMPONENTS[target], due))
            .expect("reschedule");

        let before = repeated.as_task().expect("task");
        let after = moved.as_task().expect("task");
        for component in COMPONENTS {
            let old = before.component_states[component];
            let new = after.component_states[component];
            if component == COMPONENTS[target] {
                prop_assert_eq!(new.due_timestamp_millis, due);
                prop_assert_eq!(new.interval_millis, old.interval_millis);
                prop_assert_eq!(new.last_repetition_timestamp_millis, old.last_repetition_timestamp_millis);
            } else {
                prop_assert_eq!(new, old);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn sqlite_delivery_matches_sorted_fold((ingest, rest, chunks) in arb_delivery()) {
        let db = Database::new(SqliteBackend::open_in_memory().expect("open sqlite"));
        let delivered = deliver(&db, &ingest, &rest, &chunks);
        prop_assert_eq!(delivered, sorted_fold(&ingest, &rest));
    }
}

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use orbit_core::db::{Database, DatabaseBackend, MemoryBackend, SqliteBackend};
use orbit_core::event::{
    Event, EventData, TaskIngestData, TaskRepetitionData, TaskRepetitionOutcome,
};
use orbit_core::model::{TaskContent, TaskContentField, TaskSpec};

const TASK_COUNTS: [usize; 3] = [10, 100, 1_000];
const REPETITIONS_PER_TASK: i64 = 4;

/// How the timed delivery relates to what the store already holds.
#[derive(Clone, Copy)]
enum Arrival {
    /// Store holds the ingest and the first repetition; the timed call
    /// brings the newer ones, so every entity folds on its snapshot.
    InOrder,
    /// Store holds the ingest and the newest repetition; the timed call
    /// brings older ones, so every entity replays its full history.
    Late,
}

impl Arrival {
    const fn label(self) -> &'static str {
        match self {
            Self::InOrder => "fast_path",
            Self::Late => "slow_path",
        }
    }

    const fn stored_repetition(self) -> i64 {
        match self {
            Self::InOrder => 1,
            Self::Late => REPETITIONS_PER_TASK,
        }
    }
}

fn repetition(task_id: &str, n: i64) -> Event {
    Event::new(
        format!("{task_id}-{n}"),
        task_id.to_string(),
        n * 1_000,
        EventData::TaskRepetition(TaskRepetitionData {
            component_id: "main".to_string(),
            review_session_id: "bench".to_string(),
            outcome: TaskRepetitionOutcome::Remembered,
        }),
    )
}

/// Events loaded before timing, and the events whose delivery is timed.
fn corpus(task_count: usize, arrival: Arrival) -> (Vec<Event>, Vec<Event>) {
    let mut stored = Vec::with_capacity(task_count * 2);
    let mut timed = Vec::new();
    for task in 0..task_count {
        let task_id = format!("task-{task:05}");
        stored.push(Event::new(
            format!("{task_id}-0"),
            task_id.clone(),
            0,
            EventData::TaskIngest(TaskIngestData {
                spec: TaskSpec::memory(TaskContent::Plain {
                    body: TaskContentField::text(task_id.clone()),
                }),
                provenance: None,
                metadata: None,
            }),
        ));
        for n in 1..=REPETITIONS_PER_TASK {
            if n == arrival.stored_repetition() {
                stored.push(repetition(&task_id, n));
            } else {
                timed.push(repetition(&task_id, n));
            }
        }
    }
    (stored, timed)
}

fn bench_backend<B: DatabaseBackend>(
    c: &mut Criterion,
    name: &str,
    open: impl Fn() -> B + Copy,
) {
    let mut group = c.benchmark_group(format!("put_events.{name}"));

    for task_count in TASK_COUNTS {
        for arrival in [Arrival::InOrder, Arrival::Late] {
            let (stored, timed) = corpus(task_count, arrival);
            group.throughput(Throughput::Elements(timed.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(arrival.label(), task_count),
                &(stored, timed),
                |b, (stored, timed)| {
                    b.iter_batched(
                        || {
                            let db = Database::new(open());
                            db.put_events(stored.clone())
                                .unwrap_or_else(|error| panic!("seed store: {error}"));
                            (db, timed.clone())
                        },
                        |(db, events)| black_box(db.put_events(events).map(|applied| applied.len())),
                        BatchSize::LargeInput,
                    );
                },
            );
        }
    }

    group.finish();
}

fn bench_put_events(c: &mut Criterion) {
    bench_backend(c, "memory", MemoryBackend::new);
    bench_backend(c, "sqlite", || {
        SqliteBackend::open_in_memory().unwrap_or_else(|error| panic!("open sqlite: {error}"))
    });
}

criterion_group!(benches, bench_put_events);
criterion_main!(benches);

//! Authority signal benchmarks.
//!
//! Measures the cost of applying transitions and of polling/waiting on the
//! granted and lost signals, with and without contending waiter threads.
//!
//! Run with: cargo bench --bench control_events
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use behavior_control::{AuthorityTransition, ControlEventSet};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const WAITER_COUNTS: &[usize] = &[0, 4, 16];

// ============================================================================
// Benchmark: Transitions
// ============================================================================

fn bench_transitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitions");

    for &waiters in WAITER_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("grant_lose", waiters),
            &waiters,
            |b, &waiter_count| {
                let events = ControlEventSet::new();
                let running = Arc::new(AtomicBool::new(true));
                let handles = spawn_waiters(&events, &running, waiter_count);

                b.iter(|| {
                    events.apply(AuthorityTransition::Granted);
                    events.apply(AuthorityTransition::Lost);
                });

                running.store(false, Ordering::SeqCst);
                events.apply(AuthorityTransition::Granted);
                for handle in handles {
                    let _ = handle.join();
                }
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Polling
// ============================================================================

fn bench_polling(c: &mut Criterion) {
    let events = ControlEventSet::new();
    events.apply(AuthorityTransition::Granted);
    let granted = events.granted_event();

    c.bench_function("granted_is_set", |b| b.iter(|| granted.is_set()));
    c.bench_function("granted_wait_already_set", |b| {
        b.iter(|| granted.wait(Duration::from_millis(1)))
    });
}

// ============================================================================
// Helpers
// ============================================================================

fn spawn_waiters(
    events: &ControlEventSet,
    running: &Arc<AtomicBool>,
    count: usize,
) -> Vec<thread::JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let granted = events.granted_event();
            let running = Arc::clone(running);
            thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    granted.wait(Duration::from_millis(5));
                }
            })
        })
        .collect()
}

criterion_group!(benches, bench_transitions, bench_polling);
criterion_main!(benches);

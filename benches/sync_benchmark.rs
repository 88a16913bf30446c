/*!
 * Synchronization Primitives Benchmarks
 *
 * Lock round-trips, contended wake-ups, wait-group cycles, and
 * context-tree cancellation fan-out.
 */

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ctx_sync::{background, Cause, ContextExt, Mutex, WaitGroup};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_mutex_uncontended(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("mutex_uncontended_roundtrip", |b| {
        let mutex = Mutex::new();
        b.iter(|| {
            rt.block_on(async {
                mutex.lock().await;
                mutex.unlock();
            });
        });
    });
}

fn bench_mutex_contended(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("mutex_contended");

    for tasks in [2_usize, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                rt.block_on(async {
                    let mutex = Arc::new(Mutex::new());
                    let workers: Vec<_> = (0..tasks)
                        .map(|_| {
                            let mutex = Arc::clone(&mutex);
                            tokio::spawn(async move {
                                for _ in 0..20 {
                                    mutex.lock().await;
                                    tokio::task::yield_now().await;
                                    mutex.unlock();
                                }
                            })
                        })
                        .collect();
                    for worker in workers {
                        worker.await.unwrap();
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_waitgroup_cycle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("waitgroup_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let group = Arc::new(WaitGroup::new());
                for _ in 0..8 {
                    let group = Arc::clone(&group);
                    group.add(1);
                    tokio::spawn(async move {
                        group.done();
                    });
                }
                group.wait().await;
            });
        });
    });
}

fn bench_cancel_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cancel_fanout");

    for children in [4_usize, 32] {
        group.bench_with_input(
            BenchmarkId::from_parameter(children),
            &children,
            |b, &children| {
                b.iter(|| {
                    rt.block_on(async {
                        let root = background().with_cancel();
                        let leaves: Vec<_> = (0..children).map(|_| root.with_cancel()).collect();
                        root.cancel_with(Cause::with_reason("bench"));
                        for leaf in &leaves {
                            assert!(leaf.is_cancelled());
                        }
                    });
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mutex_uncontended,
    bench_mutex_contended,
    bench_waitgroup_cycle,
    bench_cancel_fanout
);
criterion_main!(benches);

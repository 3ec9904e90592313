//! Throughput of the acquire/release hot path.

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{Criterion, criterion_group, criterion_main};
use lifecycle_pool::{ObjectPool, PoolConfiguration};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn buffers(initial_size: usize, max_size: usize) -> PoolConfiguration<Vec<u8>> {
    PoolConfiguration::new(|| Ok(Vec::with_capacity(1024)))
        .with_initial_size(initial_size)
        .with_max_size(max_size)
        .with_reset(|buf| {
            buf.clear();
            Ok(())
        })
}

fn entrypoint(c: &mut Criterion) {
    // The pool spawns its maintenance task on the ambient runtime.
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let _guard = runtime.enter();

    let mut group = c.benchmark_group("acquire_release");

    let pool = ObjectPool::new(buffers(16, 16)).unwrap();
    group.bench_function("warm_single_thread", |b| {
        b.iter(|| {
            let mut buf = pool.acquire().unwrap();
            buf.push(black_box(1));
        });
    });

    group.bench_function("cold_create_and_destroy", |b| {
        b.iter(|| {
            let obj = pool.acquire().unwrap().detach();
            black_box(obj);
        });
    });

    let shared = Arc::new(ObjectPool::new(buffers(8, 8)).unwrap());
    group.bench_function("contended_4_threads", |b| {
        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..4 {
                    let pool = Arc::clone(&shared);
                    scope.spawn(move || {
                        for _ in 0..64 {
                            if let Ok(buf) = pool.acquire() {
                                black_box(buf.capacity());
                            }
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

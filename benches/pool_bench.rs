use std::sync::atomic::{AtomicU64, Ordering};

use batchpool::BatchPool;
use criterion::{criterion_group, criterion_main, Criterion};
use rand::prelude::*;

fn fan_out_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for &threads in &[1usize, 2, 4, 8] {
        group.bench_function(format!("{threads}-threads"), |b| {
            let mut pool = BatchPool::new();
            let job = |_: usize, _: usize| {};
            b.iter(|| pool.run(&job, threads).unwrap());
        });
    }

    group.finish();
}

fn parallel_for_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_for");

    let values: Vec<u64> = {
        let mut rng = thread_rng();
        (0..50_000).map(|_| rng.gen_range(0..100)).collect()
    };

    for &threads in &[1usize, 2, 4, 8] {
        group.bench_function(format!("{threads}-threads"), |b| {
            let mut pool = BatchPool::new();
            let total = AtomicU64::new(0);
            let body = |i: usize, _: usize, _: usize| {
                total.fetch_add(values[i], Ordering::Relaxed);
            };
            b.iter(|| pool.run_for(&body, values.len(), threads).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, fan_out_bench, parallel_for_bench);
criterion_main!(benches);

//! Scheduler benchmarks using criterion.
//!
//! Measures the three costs that matter for a shared-stack scheduler: the
//! create/reclaim cycle, the copy-based suspend/resume switch, and the
//! timeout sweep scan.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use weft::SchedulerConfig;

fn bench_spawn_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    group.throughput(Throughput::Elements(1));
    group.bench_function("spawn_resume_reclaim", |b| {
        let mut sched = weft::open();
        b.iter(|| {
            let id = sched.spawn_fn(|_cx| {}).unwrap();
            sched.resume(id);
            black_box(id);
        });
    });
    group.finish();
}

fn bench_switch(c: &mut Criterion) {
    let mut group = c.benchmark_group("switch");
    for pauses in [1usize, 8, 64] {
        group.throughput(Throughput::Elements(pauses as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pauses), &pauses, |b, &pauses| {
            let mut sched = weft::open();
            b.iter(|| {
                let id = sched
                    .spawn_fn(move |cx| {
                        for _ in 0..pauses {
                            cx.pause();
                        }
                    })
                    .unwrap();
                for _ in 0..=pauses {
                    sched.resume(id);
                }
            });
        });
    }
    group.finish();
}

fn bench_sweep_idle(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    group.bench_function("idle_half_full_scan", |b| {
        let config = SchedulerConfig::builder()
            .initial_slots(1024)
            .max_slots(1024)
            .build()
            .unwrap();
        let mut sched = weft::open_with(config).unwrap();
        for _ in 0..512 {
            sched.spawn_fn(|_cx| {}).unwrap();
        }
        b.iter(|| black_box(sched.sweep(1024, Duration::from_secs(3600))));
    });
    group.finish();
}

criterion_group!(benches, bench_spawn_complete, bench_switch, bench_sweep_idle);
criterion_main!(benches);

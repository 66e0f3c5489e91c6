//! Kernel benchmarks: scheduler throughput and routed runs.
//!
//! Run with: cargo criterion

#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use simloom::prelude::*;

struct Counter {
    dt: SimTime,
    steps: u64,
    now: SimTime,
}

impl Counter {
    fn new(dt_secs: f64) -> Self {
        Self {
            dt: SimTime::from_secs(dt_secs),
            steps: 0,
            now: SimTime::ZERO,
        }
    }
}

impl Component for Counter {
    fn min_dt(&self) -> SimTime {
        self.dt
    }

    fn advance_to(&mut self, t: SimTime) -> SimResult<()> {
        self.now = t;
        self.steps += 1;
        Ok(())
    }

    fn outputs(&self) -> Vec<Signal> {
        vec![Signal::state("counter", "steps", self.steps as f64, self.now)]
    }
}

/// Heap churn with many components on slightly different rates.
fn bench_multi_rate_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_rate_run");
    group.sample_size(50);

    for n in [4usize, 16, 64].iter() {
        group.bench_with_input(BenchmarkId::new("components", n), n, |b, &n| {
            b.iter(|| {
                let mut kernel = SimKernel::new();
                for i in 0..n {
                    let dt = 0.01 + 0.001 * i as f64;
                    kernel
                        .register(format!("c{i}"), Box::new(Counter::new(dt)), 0)
                        .unwrap();
                }
                kernel.setup(&SimConfig::default()).unwrap();
                let report = kernel.run(SimTime::from_secs(1.0)).unwrap();
                black_box(report.advances)
            });
        });
    }

    group.finish();
}

/// Signal routing overhead along a chain of connected components.
fn bench_routed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("routed_chain");
    group.sample_size(50);

    for depth in [2usize, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, &depth| {
            b.iter(|| {
                let mut kernel = SimKernel::new();
                for i in 0..depth {
                    // Descending priority keeps upstream stages first.
                    kernel
                        .register(
                            format!("stage{i}"),
                            Box::new(Counter::new(0.01)),
                            (depth - i) as i32,
                        )
                        .unwrap();
                }
                for i in 1..depth {
                    let prev = i - 1;
                    kernel
                        .connect(&format!("stage{prev}.steps"), &format!("stage{i}.drive"))
                        .unwrap();
                }
                kernel.setup(&SimConfig::default()).unwrap();
                let report = kernel.run(SimTime::from_secs(0.5)).unwrap();
                black_box(report.advances)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_multi_rate_run, bench_routed_chain);
criterion_main!(benches);

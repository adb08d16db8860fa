// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::Duration;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::Point;
use understory_velocity::lsq::LeastSquaresSolver;
use understory_velocity::tracker::VelocityTracker;

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// A pointer sweeping right at about 1200 px/s with a little jitter, sampled every 8 ms.
fn gen_samples(count: usize) -> Vec<(Duration, Point)> {
    let mut rng = Rng::new(0x5EED_0F_F1E5_u64);
    (0..count)
        .map(|i| {
            let t = i as f64 * 8.0;
            let jitter = (rng.next_f64() - 0.5) * 2.0;
            (
                Duration::from_micros((t * 1000.0) as u64),
                Point::new(t * 1.2 + jitter, 40.0 + jitter),
            )
        })
        .collect()
}

fn bench_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("velocity_tracker");
    for &n in &[3usize, 8, 20, 64] {
        let samples = gen_samples(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("add_then_estimate_n{}", n), |b| {
            b.iter_batched(
                VelocityTracker::new,
                |mut tracker| {
                    for &(t, p) in &samples {
                        tracker.add_position(t, p);
                    }
                    black_box(tracker.velocity_estimate());
                },
                BatchSize::SmallInput,
            )
        });
    }
    let samples = gen_samples(20);
    let mut tracker = VelocityTracker::new();
    for &(t, p) in &samples {
        tracker.add_position(t, p);
    }
    group.bench_function("estimate_full_ring", |b| {
        b.iter(|| black_box(tracker.velocity_estimate()))
    });
    group.finish();
}

fn bench_solver(c: &mut Criterion) {
    let mut group = c.benchmark_group("least_squares");
    for &n in &[4usize, 12, 20] {
        let samples = gen_samples(n);
        let x: Vec<f64> = samples.iter().map(|(t, _)| -t.as_secs_f64() * 1000.0).collect();
        let y: Vec<f64> = samples.iter().map(|(_, p)| p.x).collect();
        let w = vec![1.0; n];
        group.bench_function(format!("quadratic_n{}", n), |b| {
            b.iter(|| black_box(LeastSquaresSolver::new(&x, &y, &w).solve(2)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tracker, bench_solver);
criterion_main!(benches);

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;
use std::time::Duration;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Vec2};
use understory_gesture::arena::{GestureArenaManager, GestureArenaMember};
use understory_gesture::binding::{GestureBinding, HitTestResult, HitTestable, RecognizerTarget};
use understory_gesture::events::{PointerEvent, PointerId};
use understory_gesture::monodrag::DragGestureRecognizer;
use understory_gesture::recognizer::GestureRecognizer;
use understory_gesture::scheduler::Scheduler;
use understory_gesture::settings::GestureSettings;
use understory_gesture::tap::TapGestureRecognizer;

#[derive(Debug)]
struct Quiet;

impl GestureArenaMember for Quiet {
    fn accept_gesture(&self, pointer: PointerId) {
        black_box(pointer);
    }

    fn reject_gesture(&self, pointer: PointerId) {
        black_box(pointer);
    }
}

struct Everywhere(Rc<RecognizerTarget>);

impl HitTestable for Everywhere {
    fn hit_test(&self, result: &mut HitTestResult, _position: Point) {
        result.add(self.0.clone());
    }
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena");
    for &n in &[2usize, 8, 32] {
        let members: Vec<Rc<dyn GestureArenaMember>> =
            (0..n).map(|_| Rc::new(Quiet) as Rc<dyn GestureArenaMember>).collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("add_close_sweep_n{}", n), |b| {
            b.iter_batched(
                || GestureArenaManager::new(Scheduler::new()),
                |arena| {
                    let pointer = PointerId(11);
                    for member in &members {
                        let _ = arena.add(pointer, member.clone());
                    }
                    arena.close(pointer);
                    arena.sweep(pointer);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

/// A binding with a tap and a horizontal drag competing for the whole surface.
fn tap_and_drag() -> Rc<GestureBinding> {
    let binding = GestureBinding::new(GestureSettings::default());
    let tap = TapGestureRecognizer::new(&binding);
    tap.set_on_tap(|| {
        black_box(());
    });
    let drag = DragGestureRecognizer::horizontal(&binding);
    drag.set_on_update(|d| {
        black_box(d.delta);
    });
    let recognizers: [Rc<dyn GestureRecognizer>; 2] = [tap, drag];
    let target = RecognizerTarget::new(recognizers);
    binding.set_hit_testable(Some(Rc::new(Everywhere(target))));
    binding
}

fn bench_binding(c: &mut Criterion) {
    let mut group = c.benchmark_group("binding");
    let binding = tap_and_drag();
    let mut next = PointerId::FIRST_DYNAMIC;
    group.bench_function("tap", |b| {
        b.iter(|| {
            next += 1;
            let pointer = PointerId(next);
            binding.handle_pointer_event(PointerEvent::down(pointer, Point::new(5.0, 5.0)));
            binding.handle_pointer_event(PointerEvent::up(pointer, Point::new(5.0, 5.0)));
        })
    });
    let steps = 32;
    group.throughput(Throughput::Elements(steps));
    group.bench_function("drag_32_moves", |b| {
        b.iter(|| {
            next += 1;
            let pointer = PointerId(next);
            let mut position = Point::new(5.0, 5.0);
            binding.handle_pointer_event(PointerEvent::down(pointer, position));
            for _ in 0..steps {
                binding.advance_by(Duration::from_millis(8));
                let delta = Vec2::new(6.0, 0.5);
                position += delta;
                let event = PointerEvent::moved(pointer, position, delta)
                    .with_time_stamp(binding.scheduler().now());
                binding.handle_pointer_event(event);
            }
            binding.handle_pointer_event(PointerEvent::up(pointer, position));
        })
    });
    group.finish();
}

criterion_group!(benches, bench_sweep, bench_binding);
criterion_main!(benches);

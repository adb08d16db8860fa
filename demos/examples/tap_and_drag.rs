// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Taps, long presses and drags on two regions of one surface.
//!
//! The left half is a button that recognizes taps and long presses; the right half is a
//! canvas that pans. A scripted pointer stream plays a tap, a long press and a flung pan,
//! advancing the binding's clock between events.
//!
//! Run:
//! - `cargo run -p understory_gesture_demos --example tap_and_drag`

use std::rc::Rc;
use std::time::Duration;

use kurbo::{Point, Rect, Vec2};
use understory_gesture::binding::{GestureBinding, HitTestResult, HitTestable, RecognizerTarget};
use understory_gesture::events::{PointerEvent, PointerId};
use understory_gesture::long_press::LongPressGestureRecognizer;
use understory_gesture::monodrag::DragGestureRecognizer;
use understory_gesture::recognizer::GestureRecognizer;
use understory_gesture::settings::GestureSettings;
use understory_gesture::tap::TapGestureRecognizer;

struct Surface {
    button: (Rect, Rc<RecognizerTarget>),
    canvas: (Rect, Rc<RecognizerTarget>),
}

impl HitTestable for Surface {
    fn hit_test(&self, result: &mut HitTestResult, position: Point) {
        for (rect, target) in [&self.button, &self.canvas] {
            if rect.contains(position) {
                result.add(target.clone());
            }
        }
    }
}

fn main() {
    let binding = GestureBinding::new(GestureSettings::default());

    let tap = TapGestureRecognizer::new(&binding);
    tap.set_on_tap_down(|d| println!("button: tap down at {:?}", d.global_position));
    tap.set_on_tap(|| println!("button: tap"));
    tap.set_on_tap_cancel(|reason| println!("button: tap cancelled ({reason:?})"));

    let press = LongPressGestureRecognizer::new(&binding);
    press.set_on_long_press(|| println!("button: long press"));
    press.set_on_long_press_up(|| println!("button: long press released"));

    let pan = DragGestureRecognizer::pan(&binding);
    pan.set_on_start(|d| println!("canvas: pan start at {:?}", d.global_position));
    pan.set_on_update(|d| println!("canvas: pan by {:?}", d.delta));
    pan.set_on_end(|d| println!("canvas: pan end, velocity {}", d.velocity));

    let button: [Rc<dyn GestureRecognizer>; 2] = [tap, press];
    let canvas: [Rc<dyn GestureRecognizer>; 1] = [pan];
    let surface = Surface {
        button: (
            Rect::new(0.0, 0.0, 100.0, 100.0),
            RecognizerTarget::new(button),
        ),
        canvas: (
            Rect::new(100.0, 0.0, 400.0, 100.0),
            RecognizerTarget::new(canvas),
        ),
    };
    binding.set_hit_testable(Some(Rc::new(surface)));

    let at = |event: PointerEvent| event.with_time_stamp(binding.scheduler().now());
    let wait = |ms: u64| binding.advance_by(Duration::from_millis(ms));

    println!("-- tap");
    let finger = PointerId(11);
    binding.handle_pointer_event(at(PointerEvent::down(finger, Point::new(50.0, 50.0))));
    wait(40);
    binding.handle_pointer_event(at(PointerEvent::up(finger, Point::new(50.0, 50.0))));

    println!("-- long press");
    let finger = PointerId(12);
    binding.handle_pointer_event(at(PointerEvent::down(finger, Point::new(50.0, 50.0))));
    wait(600);
    binding.handle_pointer_event(at(PointerEvent::up(finger, Point::new(50.0, 50.0))));

    println!("-- fling");
    let finger = PointerId(13);
    let mut position = Point::new(150.0, 50.0);
    binding.handle_pointer_event(at(PointerEvent::down(finger, position)));
    let step = Vec2::new(15.0, 0.0);
    for _ in 0..8 {
        wait(8);
        position += step;
        binding.handle_pointer_event(at(PointerEvent::moved(finger, position, step)));
    }
    binding.handle_pointer_event(at(PointerEvent::up(finger, position)));
}

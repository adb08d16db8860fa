// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A tap and a double tap competing for the same surface, fed raw device samples.
//!
//! Samples arrive in physical pixels at a device pixel ratio of 2 and go through the
//! binding's converter. The first pair of taps lands within the double-tap timeout; the
//! lone tap afterwards only reports once that timeout has passed.
//!
//! Run:
//! - `cargo run -p understory_gesture_demos --example double_tap`

use std::rc::Rc;
use std::time::Duration;

use kurbo::Point;
use understory_gesture::binding::{GestureBinding, HitTestResult, HitTestable, RecognizerTarget};
use understory_gesture::converter::{PointerChange, PointerData};
use understory_gesture::multitap::DoubleTapGestureRecognizer;
use understory_gesture::recognizer::GestureRecognizer;
use understory_gesture::settings::GestureSettings;
use understory_gesture::tap::TapGestureRecognizer;

struct Everywhere(Rc<RecognizerTarget>);

impl HitTestable for Everywhere {
    fn hit_test(&self, result: &mut HitTestResult, _position: Point) {
        result.add(self.0.clone());
    }
}

const RATIO: f64 = 2.0;
const DEVICE: u32 = 7;

fn main() {
    let binding = GestureBinding::new(GestureSettings::default());

    let tap = TapGestureRecognizer::new(&binding);
    tap.set_on_tap_up(|d| println!("tap at {:?}", d.global_position));
    let double = DoubleTapGestureRecognizer::new(&binding);
    double.set_on_double_tap(|d| println!("double tap at {:?}", d.global_position));

    let recognizers: [Rc<dyn GestureRecognizer>; 2] = [tap, double];
    let target = RecognizerTarget::new(recognizers);
    binding.set_hit_testable(Some(Rc::new(Everywhere(target))));

    let sample = |change: PointerChange, x: f64, y: f64| {
        PointerData::new(change, DEVICE, Point::new(x, y))
            .with_time_stamp(binding.scheduler().now())
    };
    let tap_at = |x: f64, y: f64| {
        binding.handle_pointer_data(&[sample(PointerChange::Down, x, y)], RATIO);
        binding.advance_by(Duration::from_millis(30));
        binding.handle_pointer_data(&[sample(PointerChange::Up, x, y)], RATIO);
    };

    binding.handle_pointer_data(&[sample(PointerChange::Add, 0.0, 0.0)], RATIO);

    println!("-- two quick taps");
    tap_at(200.0, 200.0);
    binding.advance_by(Duration::from_millis(120));
    tap_at(210.0, 204.0);

    println!("-- one tap, then waiting");
    binding.advance_by(Duration::from_millis(500));
    tap_at(400.0, 120.0);
    println!("(up handled, nothing reported yet)");
    binding.advance_by(Duration::from_millis(300));

    binding.handle_pointer_data(&[sample(PointerChange::Remove, 400.0, 120.0)], RATIO);
}

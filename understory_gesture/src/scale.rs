// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multi-pointer scale and rotation.
//!
//! ## Overview
//!
//! [`ScaleGestureRecognizer`] follows every pointer that goes down on it and tracks:
//!
//! - the focal point, the mean of all pointer positions;
//! - the span, the mean distance from the focal point, plus its horizontal and vertical
//!   components;
//! - the rotation of the line between the two earliest pointers still down.
//!
//! Whenever a pointer joins or leaves, the gesture is reconfigured: the current values
//! become the new baseline, and a started scale ends (reporting a fling velocity when the
//! leaving pointer was moving fast enough) and restarts on the next move.
//!
//! The gesture is claimed once the span changes by more than the scale slop or the focal
//! point drifts by more than the pan slop.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use kurbo::{Point, Vec2};
use understory_velocity::tracker::{Velocity, VelocityTracker};

use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::binding::GestureBinding;
use crate::events::{PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::recognizer::{
    Callback, GestureRecognizer, OneSequenceGestureRecognizer, SequenceTracker, invoke_callback,
};

/// A scale started.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScaleStartDetails {
    /// Mean position of the pointers in contact.
    pub focal_point: Point,
}

/// A scale changed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScaleUpdateDetails {
    /// Mean position of the pointers in contact.
    pub focal_point: Point,
    /// Span relative to the span at the start; `1.0` when there is no span.
    pub scale: f64,
    /// Horizontal span relative to the start.
    pub horizontal_scale: f64,
    /// Vertical span relative to the start.
    pub vertical_scale: f64,
    /// Rotation in radians of the line between the two earliest pointers.
    pub rotation: f64,
}

/// A scale ended.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScaleEndDetails {
    /// Velocity of the pointer that left; zero unless it was a fling.
    pub velocity: Velocity,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ScaleState {
    Ready,
    Possible,
    Accepted,
    Started,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Line {
    start_id: PointerId,
    start: Point,
    end_id: PointerId,
    end: Point,
}

impl Line {
    fn angle(&self) -> f64 {
        let d = self.start - self.end;
        d.y.atan2(d.x)
    }
}

#[derive(Clone, Debug, Default)]
struct Spans {
    focal_point: Point,
    span: f64,
    horizontal: f64,
    vertical: f64,
}

fn ratio(current: f64, initial: f64) -> f64 {
    if initial > 0.0 { current / initial } else { 1.0 }
}

#[derive(Debug, Default)]
struct Geometry {
    locations: BTreeMap<PointerId, Point>,
    queue: Vec<PointerId>,
    initial: Spans,
    current: Spans,
    initial_line: Option<Line>,
    current_line: Option<Line>,
}

impl Geometry {
    fn update_lines(&mut self) {
        let count = self.locations.len();
        debug_assert!(self.queue.len() >= count, "pointer queue out of sync");
        if count < 2 {
            self.initial_line = self.current_line;
            return;
        }
        let (Some(&a), Some(&b)) = (self.queue.first(), self.queue.get(1)) else {
            return;
        };
        let (Some(&start), Some(&end)) = (self.locations.get(&a), self.locations.get(&b)) else {
            return;
        };
        let line = Line {
            start_id: a,
            start,
            end_id: b,
            end,
        };
        let same_pair = self
            .initial_line
            .is_some_and(|l| l.start_id == a && l.end_id == b);
        if same_pair {
            self.current_line = Some(line);
        } else {
            self.initial_line = Some(line);
            self.current_line = Some(line);
        }
    }

    fn update(&mut self) {
        let count = self.locations.len();
        if count == 0 {
            self.current = Spans::default();
            return;
        }
        let n = count as f64;
        let sum = self
            .locations
            .values()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        let focal_point = (sum / n).to_point();
        let (mut span, mut horizontal, mut vertical) = (0.0, 0.0, 0.0);
        for p in self.locations.values() {
            let d = focal_point - *p;
            span += d.hypot();
            horizontal += d.x.abs();
            vertical += d.y.abs();
        }
        self.current = Spans {
            focal_point,
            span: span / n,
            horizontal: horizontal / n,
            vertical: vertical / n,
        };
    }

    fn rebase(&mut self) {
        self.initial = self.current.clone();
        self.initial_line = self.current_line;
    }

    fn rotation(&self) -> f64 {
        match (self.initial_line, self.current_line) {
            (Some(initial), Some(current)) => current.angle() - initial.angle(),
            _ => 0.0,
        }
    }

    fn update_details(&self) -> ScaleUpdateDetails {
        ScaleUpdateDetails {
            focal_point: self.current.focal_point,
            scale: ratio(self.current.span, self.initial.span),
            horizontal_scale: ratio(self.current.horizontal, self.initial.horizontal),
            vertical_scale: ratio(self.current.vertical, self.initial.vertical),
            rotation: self.rotation(),
        }
    }
}

/// Recognizes pinch-to-scale and two-finger rotation.
pub struct ScaleGestureRecognizer {
    sequence: SequenceTracker,
    state: Cell<ScaleState>,
    geometry: RefCell<Geometry>,
    velocity_trackers: RefCell<BTreeMap<PointerId, VelocityTracker>>,
    on_start: Callback<dyn Fn(&ScaleStartDetails)>,
    on_update: Callback<dyn Fn(&ScaleUpdateDetails)>,
    on_end: Callback<dyn Fn(&ScaleEndDetails)>,
}

impl fmt::Debug for ScaleGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaleGestureRecognizer")
            .field("state", &self.state.get())
            .field(
                "pointers",
                &self.geometry.try_borrow().map(|g| g.queue.clone()).ok(),
            )
            .finish_non_exhaustive()
    }
}

impl ScaleGestureRecognizer {
    /// Create a scale recognizer.
    pub fn new(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            sequence: SequenceTracker::new(binding, me),
            state: Cell::new(ScaleState::Ready),
            geometry: RefCell::new(Geometry::default()),
            velocity_trackers: RefCell::new(BTreeMap::new()),
            on_start: Callback::default(),
            on_update: Callback::default(),
            on_end: Callback::default(),
        })
    }

    /// The pointers in contact established a focal point.
    pub fn set_on_start(&self, f: impl Fn(&ScaleStartDetails) + 'static) {
        self.on_start.set(Rc::new(f));
    }

    /// The pointers in contact moved.
    pub fn set_on_update(&self, f: impl Fn(&ScaleUpdateDetails) + 'static) {
        self.on_update.set(Rc::new(f));
    }

    /// The set of pointers in contact changed or the last one lifted.
    pub fn set_on_end(&self, f: impl Fn(&ScaleEndDetails) + 'static) {
        self.on_end.set(Rc::new(f));
    }

    fn dispatch_start(&self) {
        debug_assert_eq!(self.state.get(), ScaleState::Started, "start outside a scale");
        if let Some(cb) = self.on_start.get() {
            let details = ScaleStartDetails {
                focal_point: self.geometry.borrow().current.focal_point,
            };
            invoke_callback("on_start", self.debug_description(), || cb(&details));
        }
    }

    fn release_velocity(&self, pointer: PointerId) -> Velocity {
        let settings = self.sequence.binding().settings();
        let velocity = self
            .velocity_trackers
            .borrow()
            .get(&pointer)
            .map(VelocityTracker::velocity)
            .unwrap_or_default();
        let speed_squared = velocity.pixels_per_second.hypot2();
        let min = settings.min_fling_velocity;
        if speed_squared > min * min {
            velocity.clamp_magnitude(0.0, settings.max_fling_velocity)
        } else {
            Velocity::ZERO
        }
    }

    /// Returns whether the state machine should advance for this event.
    fn reconfigure(&self, pointer: PointerId) -> bool {
        self.geometry.borrow_mut().rebase();
        if self.state.get() != ScaleState::Started {
            return true;
        }
        if let Some(cb) = self.on_end.get() {
            let details = ScaleEndDetails {
                velocity: self.release_velocity(pointer),
            };
            invoke_callback("on_end", self.debug_description(), || cb(&details));
        }
        self.state.set(ScaleState::Accepted);
        false
    }

    fn advance_state_machine(&self, should_start_if_accepted: bool) {
        if self.state.get() == ScaleState::Ready {
            self.state.set(ScaleState::Possible);
        }
        match self.state.get() {
            ScaleState::Possible => {
                let settings = self.sequence.binding().settings();
                let (span_delta, focal_delta) = {
                    let g = self.geometry.borrow();
                    (
                        (g.current.span - g.initial.span).abs(),
                        (g.current.focal_point - g.initial.focal_point).hypot(),
                    )
                };
                if span_delta > settings.scale_slop || focal_delta > settings.pan_slop {
                    self.resolve(GestureDisposition::Accepted);
                }
            }
            ScaleState::Accepted | ScaleState::Started => {
                self.resolve(GestureDisposition::Accepted);
            }
            ScaleState::Ready => {}
        }
        if self.state.get() == ScaleState::Accepted && should_start_if_accepted {
            self.state.set(ScaleState::Started);
            self.dispatch_start();
        }
        if self.state.get() == ScaleState::Started
            && let Some(cb) = self.on_update.get()
        {
            let details = self.geometry.borrow().update_details();
            invoke_callback("on_update", self.debug_description(), || cb(&details));
        }
    }
}

impl GestureArenaMember for ScaleGestureRecognizer {
    fn accept_gesture(&self, _pointer: PointerId) {
        if self.state.get() == ScaleState::Possible {
            self.state.set(ScaleState::Started);
            self.dispatch_start();
        }
    }

    fn reject_gesture(&self, pointer: PointerId) {
        self.stop_tracking_pointer(pointer);
    }
}

impl GestureRecognizer for ScaleGestureRecognizer {
    fn add_allowed_pointer(&self, event: &PointerEvent) {
        self.start_tracking_pointer(event.pointer);
        self.velocity_trackers
            .borrow_mut()
            .insert(event.pointer, VelocityTracker::new());
        if self.state.get() == ScaleState::Ready {
            self.state.set(ScaleState::Possible);
            *self.geometry.borrow_mut() = Geometry::default();
        }
    }

    fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.sequence.device_kind()
    }

    fn dispose(&self) {
        self.velocity_trackers.borrow_mut().clear();
        self.sequence.dispose();
    }

    fn debug_description(&self) -> &'static str {
        "scale"
    }
}

impl OneSequenceGestureRecognizer for ScaleGestureRecognizer {
    fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    fn handle_event(&self, event: &PointerEvent) {
        debug_assert_ne!(self.state.get(), ScaleState::Ready, "event while ready");
        let mut did_change_configuration = false;
        let mut should_start_if_accepted = false;
        {
            let mut g = self.geometry.borrow_mut();
            match event.kind {
                PointerEventKind::Move => {
                    if !event.synthesized
                        && let Some(t) = self.velocity_trackers.borrow_mut().get_mut(&event.pointer)
                    {
                        t.add_position(event.time_stamp, event.position);
                    }
                    g.locations.insert(event.pointer, event.position);
                    should_start_if_accepted = true;
                }
                PointerEventKind::Down => {
                    g.locations.insert(event.pointer, event.position);
                    g.queue.push(event.pointer);
                    did_change_configuration = true;
                    should_start_if_accepted = true;
                }
                PointerEventKind::Up | PointerEventKind::Cancel => {
                    g.locations.remove(&event.pointer);
                    g.queue.retain(|p| *p != event.pointer);
                    did_change_configuration = true;
                }
                _ => {}
            }
            g.update_lines();
            g.update();
        }
        if !did_change_configuration || self.reconfigure(event.pointer) {
            self.advance_state_machine(should_start_if_accepted);
        }
        self.stop_tracking_if_pointer_no_longer_down(event);
    }

    fn did_stop_tracking_last_pointer(&self, _pointer: PointerId) {
        if self.state.get() == ScaleState::Possible {
            self.resolve(GestureDisposition::Rejected);
        }
        self.state.set(ScaleState::Ready);
        self.velocity_trackers.borrow_mut().clear();
    }
}

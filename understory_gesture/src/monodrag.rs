// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-pointer drags: vertical, horizontal, and free (pan).
//!
//! A [`DragGestureRecognizer`] joins the arena on every pointer down and accumulates the
//! pointer's movement while the arena is undecided. Once the movement along its
//! [`DragAxis`] passes the slop it claims the pointer, reports the start, and streams
//! updates until the last pointer lifts. On release the velocity estimate decides whether
//! the drag ended in a fling.
//!
//! Mouse-wheel scroll signals offered through
//! [`add_scroll_pointer`](GestureRecognizer::add_scroll_pointer) are reported as a
//! start, one update with [`is_scroll`](DragUpdateDetails::is_scroll) set, and an end,
//! without joining an arena.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use kurbo::{Point, Vec2};
use understory_velocity::tracker::{Velocity, VelocityEstimate, VelocityTracker};

use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::binding::GestureBinding;
use crate::drag_details::{
    DragDownDetails, DragEndDetails, DragStartBehavior, DragStartDetails, DragUpdateDetails,
};
use crate::events::{PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::recognizer::{
    Callback, GestureRecognizer, OneSequenceGestureRecognizer, SequenceTracker, invoke_callback,
};
use crate::settings::GestureSettings;

/// The direction a [`DragGestureRecognizer`] follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DragAxis {
    /// Only vertical movement counts.
    Vertical,
    /// Only horizontal movement counts.
    Horizontal,
    /// Movement in any direction counts (a pan).
    Free,
}

impl DragAxis {
    fn delta_for_details(self, delta: Vec2) -> Vec2 {
        match self {
            Self::Vertical => Vec2::new(0.0, delta.y),
            Self::Horizontal => Vec2::new(delta.x, 0.0),
            Self::Free => delta,
        }
    }

    fn primary_value(self, value: Vec2) -> Option<f64> {
        match self {
            Self::Vertical => Some(value.y),
            Self::Horizontal => Some(value.x),
            Self::Free => None,
        }
    }

    fn has_sufficient_delta(self, pending: Vec2, settings: &GestureSettings) -> bool {
        match self {
            Self::Vertical => pending.y.abs() > settings.touch_slop,
            Self::Horizontal => pending.x.abs() > settings.touch_slop,
            Self::Free => pending.hypot() > settings.pan_slop,
        }
    }

    fn is_fling(self, estimate: &VelocityEstimate, min_velocity: f64, min_distance: f64) -> bool {
        let v = estimate.pixels_per_second;
        let d = estimate.offset;
        match self {
            Self::Vertical => v.y.abs() > min_velocity && d.y.abs() > min_distance,
            Self::Horizontal => v.x.abs() > min_velocity && d.x.abs() > min_distance,
            Self::Free => {
                v.hypot2() > min_velocity * min_velocity && d.hypot2() > min_distance * min_distance
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DragState {
    Ready,
    Possible,
    Accepted,
}

/// Recognizes a drag along a [`DragAxis`].
pub struct DragGestureRecognizer {
    sequence: SequenceTracker,
    axis: DragAxis,
    start_behavior: Cell<DragStartBehavior>,
    state: Cell<DragState>,
    initial_position: Cell<Point>,
    pending_delta: Cell<Vec2>,
    last_pending_time_stamp: Cell<Duration>,
    velocity_trackers: RefCell<BTreeMap<PointerId, VelocityTracker>>,
    min_fling_distance: Cell<Option<f64>>,
    min_fling_velocity: Cell<Option<f64>>,
    max_fling_velocity: Cell<Option<f64>>,
    on_down: Callback<dyn Fn(&DragDownDetails)>,
    on_start: Callback<dyn Fn(&DragStartDetails)>,
    on_update: Callback<dyn Fn(&DragUpdateDetails)>,
    on_end: Callback<dyn Fn(&DragEndDetails)>,
    on_cancel: Callback<dyn Fn()>,
}

impl fmt::Debug for DragGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragGestureRecognizer")
            .field("axis", &self.axis)
            .field("state", &self.state.get())
            .field("start_behavior", &self.start_behavior.get())
            .finish_non_exhaustive()
    }
}

impl DragGestureRecognizer {
    /// Create a drag recognizer following `axis`.
    pub fn new(binding: &Rc<GestureBinding>, axis: DragAxis) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            sequence: SequenceTracker::new(binding, me),
            axis,
            start_behavior: Cell::new(DragStartBehavior::default()),
            state: Cell::new(DragState::Ready),
            initial_position: Cell::new(Point::ORIGIN),
            pending_delta: Cell::new(Vec2::ZERO),
            last_pending_time_stamp: Cell::new(Duration::ZERO),
            velocity_trackers: RefCell::new(BTreeMap::new()),
            min_fling_distance: Cell::new(None),
            min_fling_velocity: Cell::new(None),
            max_fling_velocity: Cell::new(None),
            on_down: Callback::default(),
            on_start: Callback::default(),
            on_update: Callback::default(),
            on_end: Callback::default(),
            on_cancel: Callback::default(),
        })
    }

    /// A vertical drag recognizer.
    pub fn vertical(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Self::new(binding, DragAxis::Vertical)
    }

    /// A horizontal drag recognizer.
    pub fn horizontal(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Self::new(binding, DragAxis::Horizontal)
    }

    /// A pan recognizer.
    pub fn pan(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Self::new(binding, DragAxis::Free)
    }

    /// The followed axis.
    pub fn axis(&self) -> DragAxis {
        self.axis
    }

    /// Where drags report their start.
    pub fn start_behavior(&self) -> DragStartBehavior {
        self.start_behavior.get()
    }

    /// Set where drags report their start.
    pub fn set_start_behavior(&self, behavior: DragStartBehavior) {
        self.start_behavior.set(behavior);
    }

    /// Override the minimum fling distance from the settings.
    pub fn set_min_fling_distance(&self, distance: Option<f64>) {
        self.min_fling_distance.set(distance);
    }

    /// Override the minimum fling velocity from the settings.
    pub fn set_min_fling_velocity(&self, velocity: Option<f64>) {
        self.min_fling_velocity.set(velocity);
    }

    /// Override the maximum fling velocity from the settings.
    pub fn set_max_fling_velocity(&self, velocity: Option<f64>) {
        self.max_fling_velocity.set(velocity);
    }

    /// A pointer that may start a drag went down.
    pub fn set_on_down(&self, f: impl Fn(&DragDownDetails) + 'static) {
        self.on_down.set(Rc::new(f));
    }

    /// The drag was recognized.
    pub fn set_on_start(&self, f: impl Fn(&DragStartDetails) + 'static) {
        self.on_start.set(Rc::new(f));
    }

    /// The drag moved.
    pub fn set_on_update(&self, f: impl Fn(&DragUpdateDetails) + 'static) {
        self.on_update.set(Rc::new(f));
    }

    /// The drag ended.
    pub fn set_on_end(&self, f: impl Fn(&DragEndDetails) + 'static) {
        self.on_end.set(Rc::new(f));
    }

    /// The pointer that went down never became a drag.
    pub fn set_on_cancel(&self, f: impl Fn() + 'static) {
        self.on_cancel.set(Rc::new(f));
    }

    fn settings(&self) -> GestureSettings {
        self.sequence.binding().settings()
    }

    fn start(&self, details: DragStartDetails) {
        if let Some(cb) = self.on_start.get() {
            invoke_callback("on_start", self.debug_description(), || cb(&details));
        }
    }

    fn update(&self, details: DragUpdateDetails) {
        if let Some(cb) = self.on_update.get() {
            invoke_callback("on_update", self.debug_description(), || cb(&details));
        }
    }

    fn end(&self, details: DragEndDetails) {
        if let Some(cb) = self.on_end.get() {
            invoke_callback("on_end", self.debug_description(), || cb(&details));
        }
    }

    fn update_details(&self, event: &PointerEvent, delta: Vec2) -> DragUpdateDetails {
        DragUpdateDetails {
            source_time_stamp: Some(event.time_stamp),
            delta: self.axis.delta_for_details(delta),
            primary_delta: self.axis.primary_value(delta),
            global_position: event.position,
            is_scroll: false,
        }
    }

    fn end_details(&self, pointer: PointerId) -> DragEndDetails {
        let settings = self.settings();
        let estimate = self
            .velocity_trackers
            .borrow()
            .get(&pointer)
            .and_then(VelocityTracker::velocity_estimate);
        let min_velocity = self
            .min_fling_velocity
            .get()
            .unwrap_or(settings.min_fling_velocity);
        let max_velocity = self
            .max_fling_velocity
            .get()
            .unwrap_or(settings.max_fling_velocity);
        let min_distance = self
            .min_fling_distance
            .get()
            .unwrap_or(settings.min_fling_distance);
        match estimate {
            Some(estimate) if self.axis.is_fling(&estimate, min_velocity, min_distance) => {
                let velocity = Velocity::new(estimate.pixels_per_second)
                    .clamp_magnitude(min_velocity, max_velocity);
                log::trace!("{estimate}; fling at {velocity}.");
                DragEndDetails {
                    velocity,
                    primary_velocity: self.axis.primary_value(velocity.pixels_per_second),
                }
            }
            Some(estimate) => {
                log::trace!("{estimate}; judged to not be a fling.");
                self.zero_end_details()
            }
            None => {
                log::trace!("Could not estimate velocity.");
                self.zero_end_details()
            }
        }
    }

    fn zero_end_details(&self) -> DragEndDetails {
        DragEndDetails {
            velocity: Velocity::ZERO,
            primary_velocity: self.axis.primary_value(Vec2::ZERO),
        }
    }
}

impl GestureArenaMember for DragGestureRecognizer {
    fn accept_gesture(&self, _pointer: PointerId) {
        if self.state.get() == DragState::Accepted {
            return;
        }
        self.state.set(DragState::Accepted);
        let delta = self.pending_delta.replace(Vec2::ZERO);
        let time_stamp = self.last_pending_time_stamp.replace(Duration::ZERO);
        let update_delta = match self.start_behavior.get() {
            DragStartBehavior::Start => {
                self.initial_position.set(self.initial_position.get() + delta);
                Vec2::ZERO
            }
            DragStartBehavior::Down => self.axis.delta_for_details(delta),
        };
        let initial_position = self.initial_position.get();
        self.start(DragStartDetails {
            source_time_stamp: Some(time_stamp),
            global_position: initial_position,
        });
        if update_delta != Vec2::ZERO {
            self.update(DragUpdateDetails {
                source_time_stamp: Some(time_stamp),
                delta: update_delta,
                primary_delta: self.axis.primary_value(update_delta),
                global_position: initial_position + update_delta,
                is_scroll: false,
            });
        }
    }

    fn reject_gesture(&self, pointer: PointerId) {
        self.stop_tracking_pointer(pointer);
    }
}

impl GestureRecognizer for DragGestureRecognizer {
    fn add_allowed_pointer(&self, event: &PointerEvent) {
        self.start_tracking_pointer(event.pointer);
        self.velocity_trackers
            .borrow_mut()
            .insert(event.pointer, VelocityTracker::new());
        match self.state.get() {
            DragState::Ready => {
                self.state.set(DragState::Possible);
                self.initial_position.set(event.position);
                self.pending_delta.set(Vec2::ZERO);
                self.last_pending_time_stamp.set(event.time_stamp);
                if let Some(cb) = self.on_down.get() {
                    let details = DragDownDetails {
                        global_position: event.position,
                    };
                    invoke_callback("on_down", self.debug_description(), || cb(&details));
                }
            }
            DragState::Accepted => self.resolve(GestureDisposition::Accepted),
            DragState::Possible => {}
        }
    }

    fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.sequence.device_kind()
    }

    fn add_scroll_pointer(&self, event: &PointerEvent) {
        self.sequence.start_tracking_scroll_pointer(event.pointer);
        if self.state.get() == DragState::Ready {
            self.state.set(DragState::Possible);
            self.initial_position.set(event.position);
            self.start(DragStartDetails {
                source_time_stamp: Some(event.time_stamp),
                global_position: event.position,
            });
        }
    }

    fn dispose(&self) {
        self.velocity_trackers.borrow_mut().clear();
        self.sequence.dispose();
    }

    fn debug_description(&self) -> &'static str {
        match self.axis {
            DragAxis::Vertical => "vertical drag",
            DragAxis::Horizontal => "horizontal drag",
            DragAxis::Free => "pan",
        }
    }
}

impl OneSequenceGestureRecognizer for DragGestureRecognizer {
    fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    fn handle_event(&self, event: &PointerEvent) {
        if let PointerEventKind::Scroll { scroll_delta } = event.kind {
            let mut details = self.update_details(event, scroll_delta);
            details.is_scroll = true;
            self.update(details);
            self.stop_tracking_scroll_pointer(event.pointer);
            return;
        }
        let samples = matches!(event.kind, PointerEventKind::Down | PointerEventKind::Move);
        if samples
            && !event.synthesized
            && let Some(tracker) = self.velocity_trackers.borrow_mut().get_mut(&event.pointer)
        {
            tracker.add_position(event.time_stamp, event.position);
        }
        if event.kind == PointerEventKind::Move {
            if self.state.get() == DragState::Accepted {
                self.update(self.update_details(event, event.delta));
            } else {
                let pending = self.pending_delta.get() + event.delta;
                self.pending_delta.set(pending);
                self.last_pending_time_stamp.set(event.time_stamp);
                if self.axis.has_sufficient_delta(pending, &self.settings()) {
                    self.resolve(GestureDisposition::Accepted);
                }
            }
        }
        self.stop_tracking_if_pointer_no_longer_down(event);
    }

    fn did_stop_tracking_last_pointer(&self, pointer: PointerId) {
        match self.state.replace(DragState::Ready) {
            DragState::Possible => {
                self.resolve(GestureDisposition::Rejected);
                if let Some(cb) = self.on_cancel.get() {
                    invoke_callback("on_cancel", self.debug_description(), || cb());
                }
            }
            DragState::Accepted => {
                if self.on_end.is_set() {
                    let details = self.end_details(pointer);
                    self.end(details);
                }
            }
            DragState::Ready => {}
        }
        self.velocity_trackers.borrow_mut().clear();
    }

    fn did_stop_tracking_last_scroll_pointer(&self, _pointer: PointerId) {
        self.state.set(DragState::Ready);
        self.end(DragEndDetails {
            velocity: Velocity::ZERO,
            primary_velocity: Some(0.0),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::GestureArenaManager;

    const P: PointerId = PointerId(11);

    fn recorder(
        binding: &Rc<GestureBinding>,
        axis: DragAxis,
    ) -> (Rc<DragGestureRecognizer>, Rc<RefCell<Vec<String>>>) {
        let drag = DragGestureRecognizer::new(binding, axis);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        drag.set_on_down(move |d| l.borrow_mut().push(format!("down {:?}", d.global_position)));
        let l = log.clone();
        drag.set_on_start(move |d| l.borrow_mut().push(format!("start {:?}", d.global_position)));
        let l = log.clone();
        drag.set_on_update(move |d| {
            l.borrow_mut()
                .push(format!("update {:?} {:?}", d.delta, d.primary_delta));
        });
        let l = log.clone();
        drag.set_on_end(move |d| {
            let fling = d.velocity != Velocity::ZERO;
            l.borrow_mut().push(format!("end fling={fling}"));
        });
        let l = log.clone();
        drag.set_on_cancel(move || l.borrow_mut().push("cancel".into()));
        (drag, log)
    }

    fn take(log: &RefCell<Vec<String>>) -> Vec<String> {
        core::mem::take(&mut *log.borrow_mut())
    }

    fn down(binding: &GestureBinding, arena: &GestureArenaManager, drag: &DragGestureRecognizer) {
        let event = PointerEvent::down(P, Point::ORIGIN);
        drag.add_pointer(&event);
        binding.router().route(&event);
        arena.close(P);
    }

    fn move_to(binding: &GestureBinding, from: Point, to: Point, ms: u64) {
        binding.router().route(
            &PointerEvent::moved(P, to, to - from).with_time_stamp(Duration::from_millis(ms)),
        );
    }

    fn competitor(binding: &Rc<GestureBinding>) -> Rc<DragGestureRecognizer> {
        DragGestureRecognizer::vertical(binding)
    }

    #[test]
    fn horizontal_drag_accepts_past_touch_slop() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, log) = recorder(&binding, DragAxis::Horizontal);
        let other = competitor(&binding);
        other.add_pointer(&PointerEvent::down(P, Point::ORIGIN));
        down(&binding, binding.arena(), &drag);
        move_to(&binding, Point::ORIGIN, Point::new(10.0, 0.0), 10);
        assert_eq!(drag.state.get(), DragState::Possible);
        move_to(&binding, Point::new(10.0, 0.0), Point::new(20.0, 0.0), 20);
        assert_eq!(drag.state.get(), DragState::Accepted);
        assert_eq!(
            take(&log),
            [
                "down (0.0, 0.0)",
                "start (0.0, 0.0)",
                "update (20.0, 0.0) Some(20.0)",
            ]
        );
        assert!(!other.sequence().is_tracking(P), "vertical drag lost");
    }

    #[test]
    fn start_behavior_start_reports_recognition_point() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, log) = recorder(&binding, DragAxis::Horizontal);
        drag.set_start_behavior(DragStartBehavior::Start);
        let other = competitor(&binding);
        other.add_pointer(&PointerEvent::down(P, Point::ORIGIN));
        down(&binding, binding.arena(), &drag);
        take(&log);
        move_to(&binding, Point::ORIGIN, Point::new(20.0, 0.0), 10);
        assert_eq!(take(&log), ["start (20.0, 0.0)"]);
    }

    #[test]
    fn pan_uses_pan_slop() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, _log) = recorder(&binding, DragAxis::Free);
        let other = competitor(&binding);
        other.add_pointer(&PointerEvent::down(P, Point::ORIGIN));
        down(&binding, binding.arena(), &drag);
        move_to(&binding, Point::ORIGIN, Point::new(30.0, 0.0), 10);
        assert_eq!(drag.state.get(), DragState::Possible, "30 px is within pan slop");
        move_to(&binding, Point::new(30.0, 0.0), Point::new(30.0, 21.0), 20);
        assert_eq!(drag.state.get(), DragState::Accepted);
    }

    #[test]
    fn release_before_slop_cancels() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, log) = recorder(&binding, DragAxis::Vertical);
        let other = competitor(&binding);
        other.add_pointer(&PointerEvent::down(P, Point::ORIGIN));
        down(&binding, binding.arena(), &drag);
        binding.router().route(&PointerEvent::up(P, Point::ORIGIN));
        assert_eq!(take(&log), ["down (0.0, 0.0)", "cancel"]);
        assert_eq!(drag.state.get(), DragState::Ready);
    }

    #[test]
    fn fast_release_is_a_clamped_fling() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, log) = recorder(&binding, DragAxis::Horizontal);
        let velocity = Rc::new(Cell::new(Velocity::ZERO));
        let v = velocity.clone();
        drag.set_on_end(move |d| v.set(d.velocity));
        drag.set_max_fling_velocity(Some(1000.0));
        down(&binding, binding.arena(), &drag);
        binding.scheduler().flush_microtasks();
        let mut last = Point::ORIGIN;
        for i in 1..=5_u32 {
            let next = Point::new(f64::from(i) * 20.0, 0.0);
            move_to(&binding, last, next, u64::from(i) * 10);
            last = next;
        }
        take(&log);
        binding
            .router()
            .route(&PointerEvent::up(P, last).with_time_stamp(Duration::from_millis(50)));
        let v = velocity.get().pixels_per_second;
        assert!((v.x - 1000.0).abs() < 1e-6, "clamped to max, got {v:?}");
        assert!(v.y.abs() < 1e-6, "no vertical component, got {v:?}");
    }

    #[test]
    fn slow_release_is_not_a_fling() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, log) = recorder(&binding, DragAxis::Horizontal);
        down(&binding, binding.arena(), &drag);
        binding.scheduler().flush_microtasks();
        move_to(&binding, Point::ORIGIN, Point::new(1.0, 0.0), 10);
        move_to(&binding, Point::new(1.0, 0.0), Point::new(2.0, 0.0), 20);
        take(&log);
        binding
            .router()
            .route(&PointerEvent::up(P, Point::new(2.0, 0.0)));
        assert_eq!(take(&log), ["end fling=false"]);
    }

    #[test]
    fn scroll_pointer_reports_start_update_end() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, log) = recorder(&binding, DragAxis::Vertical);
        let event = PointerEvent::scroll(Point::new(5.0, 5.0), Vec2::new(3.0, 40.0));
        drag.add_scroll_pointer(&event);
        binding.router().route(&event);
        assert_eq!(
            take(&log),
            [
                "start (5.0, 5.0)",
                "update (0.0, 40.0) Some(40.0)",
                "end fling=false",
            ]
        );
        assert!(!binding.router().has_routes(PointerId::SCROLL), "route removed");
        assert!(!binding.arena().has_arena(PointerId::SCROLL), "no arena joined");
    }

    #[test]
    fn panicking_update_does_not_stop_the_drag() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (drag, log) = recorder(&binding, DragAxis::Horizontal);
        drag.set_on_update(|_| panic!("update failure"));
        down(&binding, binding.arena(), &drag);
        binding.scheduler().flush_microtasks();
        move_to(&binding, Point::ORIGIN, Point::new(30.0, 0.0), 10);
        binding
            .router()
            .route(&PointerEvent::up(P, Point::new(30.0, 0.0)));
        let log = take(&log);
        assert_eq!(log.first().map(String::as_str), Some("down (0.0, 0.0)"));
        assert!(
            log.iter().any(|l| l.starts_with("end")),
            "end still delivered: {log:?}"
        );
    }
}

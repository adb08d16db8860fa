// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recognizers that follow several taps at once.
//!
//! - [`DoubleTapGestureRecognizer`] waits for two taps in quick succession. The first tap's
//!   arena is held open past its pointer up so that a single-tap recognizer competing for
//!   the same pointer only wins once a second tap has become impossible.
//! - [`MultiTapGestureRecognizer`] treats every pointer as its own tap, reporting each by
//!   pointer id, with an optional long-tap notification.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use kurbo::Point;

use crate::arena::{GestureArenaEntry, GestureArenaMember, GestureDisposition};
use crate::binding::GestureBinding;
use crate::events::{PointerButtons, PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::recognizer::{Callback, GestureRecognizer, invoke_callback, weak_hook};
use crate::router::PointerRoute;
use crate::scheduler::TimerHandle;
use crate::tap::{TapDownDetails, TapUpDetails};

/// A double tap was recognized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DoubleTapDetails {
    /// Where the second tap went down.
    pub global_position: Point,
}

fn route_for<R: 'static>(me: &Weak<R>, handle: fn(&R, &PointerEvent)) -> PointerRoute {
    let me = me.clone();
    Rc::new(move |event: &PointerEvent| {
        if let Some(recognizer) = me.upgrade() {
            handle(&recognizer, event);
        }
    })
}

fn cancel_timer(timer: &RefCell<Option<TimerHandle>>) {
    let timer = timer.borrow_mut().take();
    if let Some(timer) = timer {
        timer.cancel();
    }
}

#[derive(Clone, Debug)]
struct TapTracker {
    pointer: PointerId,
    entry: GestureArenaEntry,
    initial_position: Point,
}

impl TapTracker {
    fn is_within_tolerance(&self, position: Point, tolerance: f64) -> bool {
        (position - self.initial_position).hypot() <= tolerance
    }
}

/// Recognizes two taps in quick succession at about the same place.
pub struct DoubleTapGestureRecognizer {
    binding: Rc<GestureBinding>,
    me: Weak<Self>,
    route: PointerRoute,
    device_kind: Cell<Option<PointerDeviceKind>>,
    timer: RefCell<Option<TimerHandle>>,
    first_tap: RefCell<Option<TapTracker>>,
    trackers: RefCell<BTreeMap<PointerId, TapTracker>>,
    on_double_tap: Callback<dyn Fn(&DoubleTapDetails)>,
}

impl fmt::Debug for DoubleTapGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoubleTapGestureRecognizer")
            .field(
                "first_tap",
                &self
                    .first_tap
                    .try_borrow()
                    .ok()
                    .and_then(|t| t.as_ref().map(|t| t.pointer)),
            )
            .field(
                "trackers",
                &self.trackers.try_borrow().map(|t| t.len()).ok(),
            )
            .finish_non_exhaustive()
    }
}

impl DoubleTapGestureRecognizer {
    /// Create a double-tap recognizer.
    pub fn new(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            binding: binding.clone(),
            me: me.clone(),
            route: route_for(me, Self::handle_event),
            device_kind: Cell::new(None),
            timer: RefCell::new(None),
            first_tap: RefCell::new(None),
            trackers: RefCell::new(BTreeMap::new()),
            on_double_tap: Callback::default(),
        })
    }

    /// Only consider pointers from devices of `kind`.
    pub fn set_device_kind(&self, kind: Option<PointerDeviceKind>) {
        self.device_kind.set(kind);
    }

    /// The second tap lifted.
    pub fn set_on_double_tap(&self, f: impl Fn(&DoubleTapDetails) + 'static) {
        self.on_double_tap.set(Rc::new(f));
    }

    /// Whether a first tap is waiting for its second.
    pub fn is_waiting_for_second_tap(&self) -> bool {
        self.first_tap.borrow().is_some()
    }

    fn track_tap(&self, event: &PointerEvent) {
        let Some(member) = self.me.upgrade() else {
            return;
        };
        let entry = self.binding.arena().add(event.pointer, member);
        let tracker = TapTracker {
            pointer: event.pointer,
            entry,
            initial_position: event.position,
        };
        self.trackers.borrow_mut().insert(event.pointer, tracker);
        self.binding.router().add_route(event.pointer, self.route.clone());
    }

    fn handle_event(&self, event: &PointerEvent) {
        let Some(tracker) = self.trackers.borrow().get(&event.pointer).cloned() else {
            return;
        };
        match event.kind {
            PointerEventKind::Up => {
                if self.first_tap.borrow().is_none() {
                    self.register_first_tap(tracker);
                } else {
                    self.register_second_tap(tracker);
                }
            }
            PointerEventKind::Move => {
                let slop = self.binding.settings().double_tap_touch_slop;
                if !tracker.is_within_tolerance(event.position, slop) {
                    self.reject(tracker);
                }
            }
            PointerEventKind::Cancel => self.reject(tracker),
            _ => {}
        }
    }

    fn reject(&self, tracker: TapTracker) {
        self.trackers.borrow_mut().remove(&tracker.pointer);
        tracker.entry.resolve(GestureDisposition::Rejected);
        self.freeze(&tracker);
        let reset = self.first_tap.borrow().as_ref().is_some_and(|first| {
            first.pointer == tracker.pointer || self.trackers.borrow().is_empty()
        });
        if reset {
            self.reset();
        }
    }

    fn reset(&self) {
        cancel_timer(&self.timer);
        let first = self.first_tap.borrow_mut().take();
        if let Some(first) = first {
            let pointer = first.pointer;
            self.reject(first);
            self.binding.arena().release(pointer);
        }
        self.clear_trackers();
    }

    fn register_first_tap(&self, tracker: TapTracker) {
        self.start_timer();
        self.binding.arena().hold(tracker.pointer);
        self.freeze(&tracker);
        self.trackers.borrow_mut().remove(&tracker.pointer);
        self.clear_trackers();
        *self.first_tap.borrow_mut() = Some(tracker);
    }

    fn register_second_tap(&self, tracker: TapTracker) {
        let first = self.first_tap.borrow().clone();
        if let Some(first) = first {
            first.entry.resolve(GestureDisposition::Accepted);
        }
        tracker.entry.resolve(GestureDisposition::Accepted);
        self.freeze(&tracker);
        self.trackers.borrow_mut().remove(&tracker.pointer);
        if let Some(cb) = self.on_double_tap.get() {
            let details = DoubleTapDetails {
                global_position: tracker.initial_position,
            };
            invoke_callback("on_double_tap", self.debug_description(), || cb(&details));
        }
        self.reset();
    }

    fn clear_trackers(&self) {
        let trackers: Vec<_> = self.trackers.borrow().values().cloned().collect();
        for tracker in trackers {
            self.reject(tracker);
        }
        debug_assert!(self.trackers.borrow().is_empty(), "trackers left after clearing");
    }

    fn freeze(&self, tracker: &TapTracker) {
        self.binding.router().remove_route(tracker.pointer, &self.route);
    }

    fn start_timer(&self) {
        if self.timer.borrow().is_some() {
            return;
        }
        let hook = weak_hook(&self.me, Self::reset);
        let timeout = self.binding.settings().double_tap_timeout;
        let timer = self.binding.scheduler().run_after(timeout, move || hook());
        *self.timer.borrow_mut() = Some(timer);
    }
}

impl GestureArenaMember for DoubleTapGestureRecognizer {
    fn accept_gesture(&self, _pointer: PointerId) {}

    fn reject_gesture(&self, pointer: PointerId) {
        let tracker = self.trackers.borrow().get(&pointer).cloned().or_else(|| {
            self.first_tap
                .borrow()
                .as_ref()
                .filter(|first| first.pointer == pointer)
                .cloned()
        });
        if let Some(tracker) = tracker {
            self.reject(tracker);
        }
    }
}

impl GestureRecognizer for DoubleTapGestureRecognizer {
    fn add_allowed_pointer(&self, event: &PointerEvent) {
        let slop = self.binding.settings().double_tap_slop;
        let too_far = self
            .first_tap
            .borrow()
            .as_ref()
            .is_some_and(|first| !first.is_within_tolerance(event.position, slop));
        if too_far {
            self.reset();
        }
        cancel_timer(&self.timer);
        self.track_tap(event);
    }

    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool {
        event.buttons == PointerButtons::PRIMARY
            && self
                .device_kind()
                .is_none_or(|kind| kind == event.device_kind)
    }

    fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.device_kind.get()
    }

    fn dispose(&self) {
        self.reset();
    }

    fn debug_description(&self) -> &'static str {
        "double tap"
    }
}

#[derive(Debug)]
struct TapGesture {
    entry: GestureArenaEntry,
    kind: PointerDeviceKind,
    initial_position: Point,
    last_position: Cell<Point>,
    final_position: Cell<Option<Point>>,
    won_arena: Cell<bool>,
    timer: RefCell<Option<TimerHandle>>,
}

/// Recognizes taps on many pointers at once, each reported by its pointer id.
pub struct MultiTapGestureRecognizer {
    binding: Rc<GestureBinding>,
    me: Weak<Self>,
    route: PointerRoute,
    device_kind: Cell<Option<PointerDeviceKind>>,
    long_tap_delay: Cell<Option<Duration>>,
    gestures: RefCell<BTreeMap<PointerId, Rc<TapGesture>>>,
    on_tap_down: Callback<dyn Fn(PointerId, &TapDownDetails)>,
    on_tap_up: Callback<dyn Fn(PointerId, &TapUpDetails)>,
    on_tap: Callback<dyn Fn(PointerId)>,
    on_tap_cancel: Callback<dyn Fn(PointerId)>,
    on_long_tap_down: Callback<dyn Fn(PointerId, &TapDownDetails)>,
}

impl fmt::Debug for MultiTapGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiTapGestureRecognizer")
            .field(
                "pointers",
                &self
                    .gestures
                    .try_borrow()
                    .map(|g| g.keys().copied().collect::<Vec<_>>())
                    .ok(),
            )
            .field("long_tap_delay", &self.long_tap_delay.get())
            .finish_non_exhaustive()
    }
}

impl MultiTapGestureRecognizer {
    /// Create a multi-tap recognizer without a long-tap delay.
    pub fn new(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            binding: binding.clone(),
            me: me.clone(),
            route: route_for(me, Self::handle_event),
            device_kind: Cell::new(None),
            long_tap_delay: Cell::new(None),
            gestures: RefCell::new(BTreeMap::new()),
            on_tap_down: Callback::default(),
            on_tap_up: Callback::default(),
            on_tap: Callback::default(),
            on_tap_cancel: Callback::default(),
            on_long_tap_down: Callback::default(),
        })
    }

    /// Report a long tap once a pointer has been down for `delay`; `None` disables it.
    pub fn set_long_tap_delay(&self, delay: Option<Duration>) {
        self.long_tap_delay.set(delay);
    }

    /// Only consider pointers from devices of `kind`.
    pub fn set_device_kind(&self, kind: Option<PointerDeviceKind>) {
        self.device_kind.set(kind);
    }

    /// A pointer went down.
    pub fn set_on_tap_down(&self, f: impl Fn(PointerId, &TapDownDetails) + 'static) {
        self.on_tap_down.set(Rc::new(f));
    }

    /// A pointer that won its arena lifted.
    pub fn set_on_tap_up(&self, f: impl Fn(PointerId, &TapUpDetails) + 'static) {
        self.on_tap_up.set(Rc::new(f));
    }

    /// A pointer completed a tap.
    pub fn set_on_tap(&self, f: impl Fn(PointerId) + 'static) {
        self.on_tap.set(Rc::new(f));
    }

    /// A pointer will not complete a tap.
    pub fn set_on_tap_cancel(&self, f: impl Fn(PointerId) + 'static) {
        self.on_tap_cancel.set(Rc::new(f));
    }

    /// A pointer has been down for the long-tap delay.
    pub fn set_on_long_tap_down(&self, f: impl Fn(PointerId, &TapDownDetails) + 'static) {
        self.on_long_tap_down.set(Rc::new(f));
    }

    /// Pointers currently followed, in id order.
    pub fn pointers(&self) -> Vec<PointerId> {
        self.gestures.borrow().keys().copied().collect()
    }

    fn gesture(&self, pointer: PointerId) -> Option<Rc<TapGesture>> {
        self.gestures.borrow().get(&pointer).cloned()
    }

    fn handle_event(&self, event: &PointerEvent) {
        let Some(gesture) = self.gesture(event.pointer) else {
            return;
        };
        match event.kind {
            PointerEventKind::Move => {
                let slop = self.binding.settings().touch_slop;
                if (event.position - gesture.initial_position).hypot() > slop {
                    self.cancel(event.pointer, &gesture);
                } else {
                    gesture.last_position.set(event.position);
                }
            }
            PointerEventKind::Cancel => self.cancel(event.pointer, &gesture),
            PointerEventKind::Up => {
                self.stop_tracking(event.pointer, &gesture);
                gesture.final_position.set(Some(event.position));
                self.check(event.pointer, &gesture);
            }
            _ => {}
        }
    }

    fn stop_tracking(&self, pointer: PointerId, gesture: &TapGesture) {
        cancel_timer(&gesture.timer);
        self.binding.router().remove_route(pointer, &self.route);
    }

    fn cancel(&self, pointer: PointerId, gesture: &TapGesture) {
        if gesture.won_arena.get() {
            self.reject_tap(pointer, gesture);
        } else {
            gesture.entry.resolve(GestureDisposition::Rejected);
        }
    }

    fn reject_tap(&self, pointer: PointerId, gesture: &TapGesture) {
        self.stop_tracking(pointer, gesture);
        let removed = self.gestures.borrow_mut().remove(&pointer);
        if removed.is_some()
            && let Some(cb) = self.on_tap_cancel.get()
        {
            invoke_callback("on_tap_cancel", self.debug_description(), || cb(pointer));
        }
    }

    fn check(&self, pointer: PointerId, gesture: &TapGesture) {
        if !gesture.won_arena.get() {
            return;
        }
        let Some(position) = gesture.final_position.get() else {
            return;
        };
        self.gestures.borrow_mut().remove(&pointer);
        if let Some(cb) = self.on_tap_up.get() {
            let details = TapUpDetails {
                global_position: position,
                kind: gesture.kind,
            };
            invoke_callback("on_tap_up", self.debug_description(), || cb(pointer, &details));
        }
        if let Some(cb) = self.on_tap.get() {
            invoke_callback("on_tap", self.debug_description(), || cb(pointer));
        }
    }

    fn dispatch_long_tap(&self, pointer: PointerId) {
        let Some(gesture) = self.gesture(pointer) else {
            return;
        };
        gesture.timer.borrow_mut().take();
        if let Some(cb) = self.on_long_tap_down.get() {
            let details = TapDownDetails {
                global_position: gesture.last_position.get(),
                kind: gesture.kind,
            };
            invoke_callback("on_long_tap_down", self.debug_description(), || {
                cb(pointer, &details);
            });
        }
    }
}

impl GestureArenaMember for MultiTapGestureRecognizer {
    fn accept_gesture(&self, pointer: PointerId) {
        if let Some(gesture) = self.gesture(pointer) {
            gesture.won_arena.set(true);
            self.check(pointer, &gesture);
        }
    }

    fn reject_gesture(&self, pointer: PointerId) {
        if let Some(gesture) = self.gesture(pointer) {
            self.reject_tap(pointer, &gesture);
        }
    }
}

impl GestureRecognizer for MultiTapGestureRecognizer {
    fn add_allowed_pointer(&self, event: &PointerEvent) {
        let Some(member) = self.me.upgrade() else {
            return;
        };
        let pointer = event.pointer;
        let entry = self.binding.arena().add(pointer, member);
        let timer = self.long_tap_delay.get().map(|delay| {
            let me = self.me.clone();
            self.binding.scheduler().run_after(delay, move || {
                if let Some(recognizer) = me.upgrade() {
                    recognizer.dispatch_long_tap(pointer);
                }
            })
        });
        let gesture = Rc::new(TapGesture {
            entry,
            kind: event.device_kind,
            initial_position: event.position,
            last_position: Cell::new(event.position),
            final_position: Cell::new(None),
            won_arena: Cell::new(false),
            timer: RefCell::new(timer),
        });
        self.gestures.borrow_mut().insert(pointer, gesture);
        self.binding.router().add_route(pointer, self.route.clone());
        if let Some(cb) = self.on_tap_down.get() {
            let details = TapDownDetails {
                global_position: event.position,
                kind: event.device_kind,
            };
            invoke_callback("on_tap_down", self.debug_description(), || cb(pointer, &details));
        }
    }

    fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.device_kind.get()
    }

    fn dispose(&self) {
        let gestures: Vec<_> = self
            .gestures
            .borrow()
            .iter()
            .map(|(p, g)| (*p, g.clone()))
            .collect();
        for (pointer, gesture) in gestures {
            self.cancel(pointer, &gesture);
        }
        self.gestures.borrow_mut().clear();
    }

    fn debug_description(&self) -> &'static str {
        "multitap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GestureSettings;

    const P1: PointerId = PointerId(11);
    const P2: PointerId = PointerId(12);

    fn deliver(binding: &GestureBinding, recognizer: &dyn GestureRecognizer, event: PointerEvent) {
        if event.kind == PointerEventKind::Down {
            recognizer.add_pointer(&event);
        }
        binding.router().route(&event);
        match event.kind {
            PointerEventKind::Down => binding.arena().close(event.pointer),
            PointerEventKind::Up => binding.arena().sweep(event.pointer),
            _ => {}
        }
        binding.scheduler().flush_microtasks();
    }

    fn tap(
        binding: &GestureBinding,
        recognizer: &dyn GestureRecognizer,
        pointer: PointerId,
        at: Point,
    ) {
        deliver(binding, recognizer, PointerEvent::down(pointer, at));
        deliver(binding, recognizer, PointerEvent::up(pointer, at));
    }

    fn double_tap_counter(
        binding: &Rc<GestureBinding>,
    ) -> (Rc<DoubleTapGestureRecognizer>, Rc<Cell<u32>>) {
        let recognizer = DoubleTapGestureRecognizer::new(binding);
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        recognizer.set_on_double_tap(move |_| c.set(c.get() + 1));
        (recognizer, count)
    }

    #[test]
    fn two_quick_taps_make_a_double_tap() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (double, count) = double_tap_counter(&binding);
        tap(&binding, &*double, P1, Point::ORIGIN);
        assert!(double.is_waiting_for_second_tap(), "first tap registered");
        binding.advance_by(Duration::from_millis(200));
        tap(&binding, &*double, P2, Point::new(10.0, 10.0));
        assert_eq!(count.get(), 1);
        assert!(!double.is_waiting_for_second_tap(), "reset afterwards");
    }

    #[test]
    fn slow_second_tap_starts_over() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (double, count) = double_tap_counter(&binding);
        tap(&binding, &*double, P1, Point::ORIGIN);
        binding.advance_by(Duration::from_millis(300));
        assert!(!double.is_waiting_for_second_tap(), "timed out");
        tap(&binding, &*double, P2, Point::ORIGIN);
        assert_eq!(count.get(), 0);
        assert!(double.is_waiting_for_second_tap(), "second tap is a new first tap");
    }

    #[test]
    fn distant_second_tap_starts_over() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (double, count) = double_tap_counter(&binding);
        tap(&binding, &*double, P1, Point::ORIGIN);
        tap(&binding, &*double, P2, Point::new(150.0, 0.0));
        assert_eq!(count.get(), 0);
        assert!(double.is_waiting_for_second_tap(), "waiting on the distant tap");
    }

    #[test]
    fn moving_during_a_tap_rejects_it() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (double, count) = double_tap_counter(&binding);
        tap(&binding, &*double, P1, Point::ORIGIN);
        deliver(&binding, &*double, PointerEvent::down(P2, Point::ORIGIN));
        deliver(
            &binding,
            &*double,
            PointerEvent::moved(P2, Point::new(30.0, 0.0), kurbo::Vec2::new(30.0, 0.0)),
        );
        deliver(&binding, &*double, PointerEvent::up(P2, Point::new(30.0, 0.0)));
        assert_eq!(count.get(), 0);
        assert!(!double.is_waiting_for_second_tap(), "everything reset");
        assert!(!binding.arena().has_arena(P1), "hold released");
    }

    #[test]
    fn multitap_reports_each_pointer() {
        let binding = GestureBinding::new(GestureSettings::default());
        let multi = MultiTapGestureRecognizer::new(&binding);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        multi.set_on_tap_down(move |p, _| l.borrow_mut().push(format!("down {p}")));
        let l = log.clone();
        multi.set_on_tap(move |p| l.borrow_mut().push(format!("tap {p}")));
        let l = log.clone();
        multi.set_on_tap_cancel(move |p| l.borrow_mut().push(format!("cancel {p}")));
        deliver(&binding, &*multi, PointerEvent::down(P1, Point::ORIGIN));
        deliver(&binding, &*multi, PointerEvent::down(P2, Point::new(50.0, 0.0)));
        deliver(
            &binding,
            &*multi,
            PointerEvent::moved(P2, Point::new(80.0, 0.0), kurbo::Vec2::new(30.0, 0.0)),
        );
        deliver(&binding, &*multi, PointerEvent::up(P1, Point::ORIGIN));
        assert_eq!(*log.borrow(), ["down 11", "down 12", "cancel 12", "tap 11"]);
        assert!(multi.pointers().is_empty(), "nothing left");
    }

    #[test]
    fn multitap_long_tap() {
        let binding = GestureBinding::new(GestureSettings::default());
        let multi = MultiTapGestureRecognizer::new(&binding);
        multi.set_long_tap_delay(Some(Duration::from_millis(400)));
        let long = Rc::new(Cell::new(None));
        let l = long.clone();
        multi.set_on_long_tap_down(move |p, _| l.set(Some(p)));
        deliver(&binding, &*multi, PointerEvent::down(P1, Point::ORIGIN));
        binding.advance_by(Duration::from_millis(400));
        assert_eq!(long.get(), Some(P1));
    }
}

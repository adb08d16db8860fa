// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Long presses: a pointer held in place for the long-press timeout.
//!
//! Winning the arena does not make a long press; a sweep or a default win can hand the
//! pointer over early. Only the timeout elapsing while the pointer is within the touch
//! slop declares the gesture, at which point the recognizer claims the arena. After that
//! the pointer may move freely and its moves are reported until it lifts.

use core::cell::Cell;
use core::fmt;
use std::rc::{Rc, Weak};

use kurbo::{Point, Vec2};

use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::binding::GestureBinding;
use crate::events::{PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::recognizer::{
    Callback, GestureRecognizer, OneSequenceGestureRecognizer, PrimaryPointerCore,
    PrimaryPointerGestureRecognizer, SequenceTracker, invoke_callback, weak_hook,
};

/// A long press was recognized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LongPressStartDetails {
    /// Where the pointer went down.
    pub global_position: Point,
}

/// The pointer moved after a long press was recognized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LongPressMoveUpdateDetails {
    /// Current pointer position.
    pub global_position: Point,
    /// Displacement from where the pointer went down.
    pub offset_from_origin: Vec2,
}

/// The pointer lifted after a long press was recognized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LongPressEndDetails {
    /// Where the pointer lifted.
    pub global_position: Point,
}

/// Recognizes a long press.
pub struct LongPressGestureRecognizer {
    sequence: SequenceTracker,
    primary: PrimaryPointerCore,
    accepted: Cell<bool>,
    on_long_press_start: Callback<dyn Fn(&LongPressStartDetails)>,
    on_long_press: Callback<dyn Fn()>,
    on_long_press_move_update: Callback<dyn Fn(&LongPressMoveUpdateDetails)>,
    on_long_press_up: Callback<dyn Fn()>,
    on_long_press_end: Callback<dyn Fn(&LongPressEndDetails)>,
}

impl fmt::Debug for LongPressGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongPressGestureRecognizer")
            .field("state", &self.primary.state())
            .field("accepted", &self.accepted.get())
            .finish_non_exhaustive()
    }
}

impl LongPressGestureRecognizer {
    /// Create a long-press recognizer using the binding's long-press timeout.
    ///
    /// The pointer may travel up to the touch slop before the timeout and anywhere after.
    pub fn new(binding: &Rc<GestureBinding>) -> Rc<Self> {
        let settings = binding.settings();
        let recognizer = Rc::new_cyclic(|me: &Weak<Self>| Self {
            sequence: SequenceTracker::new(binding, me),
            primary: PrimaryPointerCore::new(
                Some(settings.long_press_timeout),
                Some(settings.touch_slop),
                weak_hook(me, |r: &Self| r.did_exceed_deadline()),
            ),
            accepted: Cell::new(false),
            on_long_press_start: Callback::default(),
            on_long_press: Callback::default(),
            on_long_press_move_update: Callback::default(),
            on_long_press_up: Callback::default(),
            on_long_press_end: Callback::default(),
        });
        recognizer.primary.set_post_acceptance_slop_tolerance(None);
        recognizer
    }

    /// The primary pointer's core, for adjusting the deadline or tolerances.
    pub fn core(&self) -> &PrimaryPointerCore {
        &self.primary
    }

    /// The press was recognized; reports where it started.
    pub fn set_on_long_press_start(&self, f: impl Fn(&LongPressStartDetails) + 'static) {
        self.on_long_press_start.set(Rc::new(f));
    }

    /// The press was recognized.
    pub fn set_on_long_press(&self, f: impl Fn() + 'static) {
        self.on_long_press.set(Rc::new(f));
    }

    /// The pointer moved after recognition.
    pub fn set_on_long_press_move_update(
        &self,
        f: impl Fn(&LongPressMoveUpdateDetails) + 'static,
    ) {
        self.on_long_press_move_update.set(Rc::new(f));
    }

    /// The pointer lifted after recognition.
    pub fn set_on_long_press_up(&self, f: impl Fn() + 'static) {
        self.on_long_press_up.set(Rc::new(f));
    }

    /// The pointer lifted after recognition; reports where.
    pub fn set_on_long_press_end(&self, f: impl Fn(&LongPressEndDetails) + 'static) {
        self.on_long_press_end.set(Rc::new(f));
    }
}

impl GestureArenaMember for LongPressGestureRecognizer {
    // Only the deadline declares the gesture.
    fn accept_gesture(&self, _pointer: PointerId) {}

    fn reject_gesture(&self, pointer: PointerId) {
        self.primary_reject_gesture(pointer);
        if self.primary.primary_pointer() == Some(pointer) {
            self.accepted.set(false);
        }
    }
}

impl GestureRecognizer for LongPressGestureRecognizer {
    fn add_allowed_pointer(&self, event: &PointerEvent) {
        self.primary_add_allowed_pointer(event);
    }

    fn handle_non_allowed_pointer(&self, event: &PointerEvent) {
        self.primary_handle_non_allowed_pointer(event);
    }

    fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.sequence.device_kind()
    }

    fn dispose(&self) {
        self.primary_dispose();
    }

    fn debug_description(&self) -> &'static str {
        "long press"
    }
}

impl OneSequenceGestureRecognizer for LongPressGestureRecognizer {
    fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    fn handle_event(&self, event: &PointerEvent) {
        self.primary_handle_event(event);
    }

    fn did_stop_tracking_last_pointer(&self, pointer: PointerId) {
        self.accepted.set(false);
        self.primary_did_stop_tracking_last_pointer(pointer);
    }
}

impl PrimaryPointerGestureRecognizer for LongPressGestureRecognizer {
    fn primary(&self) -> &PrimaryPointerCore {
        &self.primary
    }

    fn handle_primary_pointer(&self, event: &PointerEvent) {
        match event.kind {
            PointerEventKind::Up => {
                if self.accepted.replace(false) {
                    if let Some(cb) = self.on_long_press_up.get() {
                        invoke_callback("on_long_press_up", self.debug_description(), || cb());
                    }
                    if let Some(cb) = self.on_long_press_end.get() {
                        let details = LongPressEndDetails {
                            global_position: event.position,
                        };
                        invoke_callback("on_long_press_end", self.debug_description(), || {
                            cb(&details);
                        });
                    }
                } else {
                    self.resolve(GestureDisposition::Rejected);
                }
            }
            PointerEventKind::Move if self.accepted.get() => {
                if let Some(cb) = self.on_long_press_move_update.get() {
                    let details = LongPressMoveUpdateDetails {
                        global_position: event.position,
                        offset_from_origin: event.position - self.primary.initial_position(),
                    };
                    invoke_callback(
                        "on_long_press_move_update",
                        self.debug_description(),
                        || cb(&details),
                    );
                }
            }
            PointerEventKind::Cancel => self.accepted.set(false),
            _ => {}
        }
    }

    fn did_exceed_deadline(&self) {
        self.resolve(GestureDisposition::Accepted);
        self.primary.mark_accepted();
        self.accepted.set(true);
        if let Some(cb) = self.on_long_press_start.get() {
            let details = LongPressStartDetails {
                global_position: self.primary.initial_position(),
            };
            invoke_callback("on_long_press_start", self.debug_description(), || {
                cb(&details);
            });
        }
        if let Some(cb) = self.on_long_press.get() {
            invoke_callback("on_long_press", self.debug_description(), || cb());
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use core::time::Duration;

    use super::*;
    use crate::settings::GestureSettings;
    use crate::tap::TapGestureRecognizer;

    const P: PointerId = PointerId(11);

    fn recorder(
        binding: &Rc<GestureBinding>,
    ) -> (Rc<LongPressGestureRecognizer>, Rc<RefCell<Vec<String>>>) {
        let press = LongPressGestureRecognizer::new(binding);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        press.set_on_long_press(move || l.borrow_mut().push("long press".into()));
        let l = log.clone();
        press.set_on_long_press_move_update(move |d| {
            l.borrow_mut()
                .push(format!("move {:?}", d.offset_from_origin));
        });
        let l = log.clone();
        press.set_on_long_press_up(move || l.borrow_mut().push("up".into()));
        (press, log)
    }

    fn take(log: &RefCell<Vec<String>>) -> Vec<String> {
        core::mem::take(&mut *log.borrow_mut())
    }

    fn down(binding: &GestureBinding, recognizers: &[&dyn GestureRecognizer]) {
        let event = PointerEvent::down(P, Point::ORIGIN);
        for r in recognizers {
            r.add_pointer(&event);
        }
        binding.router().route(&event);
        binding.arena().close(P);
        binding.scheduler().flush_microtasks();
    }

    #[test]
    fn holding_past_the_timeout_fires() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (press, log) = recorder(&binding);
        down(&binding, &[&*press]);
        binding.advance_by(Duration::from_millis(499));
        assert!(take(&log).is_empty(), "default win alone does not fire");
        binding.advance_by(Duration::from_millis(1));
        assert_eq!(take(&log), ["long press"]);
        binding.router().route(&PointerEvent::moved(
            P,
            Point::new(50.0, 0.0),
            Vec2::new(50.0, 0.0),
        ));
        binding.router().route(&PointerEvent::up(P, Point::new(50.0, 0.0)));
        assert_eq!(take(&log), ["move (50.0, 0.0)", "up"]);
    }

    #[test]
    fn early_release_rejects() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (press, log) = recorder(&binding);
        let (other, _) = recorder(&binding);
        down(&binding, &[&*press, &*other]);
        binding.advance_by(Duration::from_millis(200));
        binding.router().route(&PointerEvent::up(P, Point::ORIGIN));
        binding.advance_by(Duration::from_millis(500));
        assert!(take(&log).is_empty(), "no callbacks");
        assert!(!press.core().has_active_timer(), "timer stopped");
    }

    #[test]
    fn long_press_beats_a_tap() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (press, log) = recorder(&binding);
        let tap = TapGestureRecognizer::new(&binding);
        let tapped = Rc::new(Cell::new(false));
        let t = tapped.clone();
        tap.set_on_tap(move || t.set(true));
        down(&binding, &[&*tap, &*press]);
        binding.advance_by(Duration::from_millis(500));
        assert_eq!(take(&log), ["long press"]);
        binding.router().route(&PointerEvent::up(P, Point::ORIGIN));
        binding.arena().sweep(P);
        assert!(!tapped.get(), "tap lost");
        assert_eq!(take(&log), ["up"]);
    }

    #[test]
    fn moving_before_the_timeout_gives_up() {
        let binding = GestureBinding::new(GestureSettings::default());
        let (press, log) = recorder(&binding);
        down(&binding, &[&*press]);
        binding.router().route(&PointerEvent::moved(
            P,
            Point::new(19.0, 0.0),
            Vec2::new(19.0, 0.0),
        ));
        binding.advance_by(Duration::from_millis(600));
        assert!(take(&log).is_empty(), "beyond touch slop");
        assert!(!press.sequence().is_tracking(P), "untracked");
    }
}

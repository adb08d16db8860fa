// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single taps with the primary or secondary button.
//!
//! ## Callback order
//!
//! A [`TapGestureRecognizer`] reports, for the button the press started with:
//!
//! - `tap down` once the press outlives the press timeout or the arena is won, whichever
//!   comes first;
//! - `tap up` followed by `tap` (primary button only) when the pointer lifts and the arena
//!   has been won, in either order;
//! - `tap cancel` instead, if a tap down was reported but the tap was lost. The
//!   [`CancelReason`] says whether the pointer was cancelled, the recognizer gave up by
//!   itself (moved beyond the touch slop), or another recognizer won.
//!
//! The tap is abandoned without a cancel when the pointer moves beyond the touch slop or
//! changes its buttons before any tap down was reported.

use core::cell::Cell;
use core::fmt;
use std::rc::{Rc, Weak};

use kurbo::Point;

use crate::arena::{GestureArenaMember, GestureDisposition};
use crate::binding::GestureBinding;
use crate::events::{PointerButtons, PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::recognizer::{
    Callback, GestureRecognizer, GestureRecognizerState, OneSequenceGestureRecognizer,
    PrimaryPointerCore, PrimaryPointerGestureRecognizer, SequenceTracker, invoke_callback,
    weak_hook,
};

/// Why a reported tap down did not become a tap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The pointer was cancelled.
    Cancelled,
    /// The recognizer gave the gesture up itself.
    Spontaneous,
    /// Another recognizer won the arena.
    Forced,
}

/// A pointer that may become a tap went down.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TapDownDetails {
    /// Where the pointer went down.
    pub global_position: Point,
    /// Kind of device that went down.
    pub kind: PointerDeviceKind,
}

/// A pointer that became a tap lifted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TapUpDetails {
    /// Where the pointer lifted.
    pub global_position: Point,
    /// Kind of device that lifted.
    pub kind: PointerDeviceKind,
}

#[derive(Debug, Default)]
struct ButtonCallbacks {
    on_tap_down: Callback<dyn Fn(&TapDownDetails)>,
    on_tap_up: Callback<dyn Fn(&TapUpDetails)>,
    on_tap: Callback<dyn Fn()>,
    on_tap_cancel: Callback<dyn Fn(CancelReason)>,
}

impl ButtonCallbacks {
    fn any(&self) -> bool {
        self.on_tap_down.is_set()
            || self.on_tap_up.is_set()
            || self.on_tap.is_set()
            || self.on_tap_cancel.is_set()
    }
}

/// Recognizes a tap.
pub struct TapGestureRecognizer {
    sequence: SequenceTracker,
    primary: PrimaryPointerCore,
    sent_tap_down: Cell<bool>,
    won_arena: Cell<bool>,
    final_position: Cell<Option<Point>>,
    initial_buttons: Cell<PointerButtons>,
    device_kind_down: Cell<PointerDeviceKind>,
    primary_button: ButtonCallbacks,
    secondary_button: ButtonCallbacks,
}

impl fmt::Debug for TapGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapGestureRecognizer")
            .field("state", &self.primary.state())
            .field("sent_tap_down", &self.sent_tap_down.get())
            .field("won_arena", &self.won_arena.get())
            .field("final_position", &self.final_position.get())
            .finish_non_exhaustive()
    }
}

impl TapGestureRecognizer {
    /// Create a tap recognizer using the binding's press timeout and touch slop.
    pub fn new(binding: &Rc<GestureBinding>) -> Rc<Self> {
        let settings = binding.settings();
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            sequence: SequenceTracker::new(binding, me),
            primary: PrimaryPointerCore::new(
                Some(settings.press_timeout),
                Some(settings.touch_slop),
                weak_hook(me, |tap: &Self| tap.did_exceed_deadline()),
            ),
            sent_tap_down: Cell::new(false),
            won_arena: Cell::new(false),
            final_position: Cell::new(None),
            initial_buttons: Cell::new(PointerButtons::empty()),
            device_kind_down: Cell::new(PointerDeviceKind::default()),
            primary_button: ButtonCallbacks::default(),
            secondary_button: ButtonCallbacks::default(),
        })
    }

    /// A primary-button press may become a tap.
    pub fn set_on_tap_down(&self, f: impl Fn(&TapDownDetails) + 'static) {
        self.primary_button.on_tap_down.set(Rc::new(f));
    }

    /// A primary-button tap lifted.
    pub fn set_on_tap_up(&self, f: impl Fn(&TapUpDetails) + 'static) {
        self.primary_button.on_tap_up.set(Rc::new(f));
    }

    /// A primary-button tap completed.
    pub fn set_on_tap(&self, f: impl Fn() + 'static) {
        self.primary_button.on_tap.set(Rc::new(f));
    }

    /// A reported primary-button tap down will not become a tap.
    pub fn set_on_tap_cancel(&self, f: impl Fn(CancelReason) + 'static) {
        self.primary_button.on_tap_cancel.set(Rc::new(f));
    }

    /// A secondary-button press may become a tap.
    pub fn set_on_secondary_tap_down(&self, f: impl Fn(&TapDownDetails) + 'static) {
        self.secondary_button.on_tap_down.set(Rc::new(f));
    }

    /// A secondary-button tap lifted.
    pub fn set_on_secondary_tap_up(&self, f: impl Fn(&TapUpDetails) + 'static) {
        self.secondary_button.on_tap_up.set(Rc::new(f));
    }

    /// A reported secondary-button tap down will not become a tap.
    pub fn set_on_secondary_tap_cancel(&self, f: impl Fn(CancelReason) + 'static) {
        self.secondary_button.on_tap_cancel.set(Rc::new(f));
    }

    fn callbacks(&self) -> Option<&ButtonCallbacks> {
        let buttons = self.initial_buttons.get();
        if buttons == PointerButtons::PRIMARY {
            Some(&self.primary_button)
        } else if buttons == PointerButtons::SECONDARY {
            Some(&self.secondary_button)
        } else {
            None
        }
    }

    fn check_down(&self) {
        if self.sent_tap_down.get() {
            return;
        }
        self.sent_tap_down.set(true);
        if let Some(cb) = self.callbacks().and_then(|c| c.on_tap_down.get()) {
            let details = TapDownDetails {
                global_position: self.primary.initial_position(),
                kind: self.device_kind_down.get(),
            };
            invoke_callback("on_tap_down", self.debug_description(), || cb(&details));
        }
    }

    fn check_up(&self) {
        if !self.won_arena.get() {
            return;
        }
        let Some(position) = self.final_position.get() else {
            return;
        };
        if let Some(callbacks) = self.callbacks() {
            if let Some(cb) = callbacks.on_tap_up.get() {
                let details = TapUpDetails {
                    global_position: position,
                    kind: self.device_kind_down.get(),
                };
                invoke_callback("on_tap_up", self.debug_description(), || cb(&details));
            }
            if let Some(cb) = callbacks.on_tap.get() {
                invoke_callback("on_tap", self.debug_description(), || cb());
            }
        }
        self.reset();
    }

    fn cancel(&self, reason: CancelReason) {
        if !self.sent_tap_down.get() {
            return;
        }
        if let Some(cb) = self.callbacks().and_then(|c| c.on_tap_cancel.get()) {
            let name = match reason {
                CancelReason::Cancelled => "on_tap_cancel",
                CancelReason::Spontaneous => "spontaneous on_tap_cancel",
                CancelReason::Forced => "forced on_tap_cancel",
            };
            invoke_callback(name, self.debug_description(), || cb(reason));
        }
    }

    fn reset(&self) {
        self.sent_tap_down.set(false);
        self.won_arena.set(false);
        self.final_position.set(None);
    }
}

impl GestureArenaMember for TapGestureRecognizer {
    fn accept_gesture(&self, pointer: PointerId) {
        self.primary_accept_gesture(pointer);
        if self.primary.primary_pointer() == Some(pointer) {
            self.check_down();
            self.won_arena.set(true);
            self.check_up();
        }
    }

    fn reject_gesture(&self, pointer: PointerId) {
        self.primary_reject_gesture(pointer);
        if self.primary.primary_pointer() == Some(pointer) {
            self.cancel(CancelReason::Forced);
            self.reset();
        }
    }
}

impl GestureRecognizer for TapGestureRecognizer {
    fn add_allowed_pointer(&self, event: &PointerEvent) {
        if self.primary.state() == GestureRecognizerState::Ready {
            self.initial_buttons.set(event.buttons);
            self.device_kind_down.set(event.device_kind);
        }
        self.primary_add_allowed_pointer(event);
    }

    fn handle_non_allowed_pointer(&self, event: &PointerEvent) {
        self.primary_handle_non_allowed_pointer(event);
    }

    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool {
        let wanted = if event.buttons == PointerButtons::PRIMARY {
            self.primary_button.any()
        } else if event.buttons == PointerButtons::SECONDARY {
            self.secondary_button.any()
        } else {
            false
        };
        wanted
            && self
                .device_kind()
                .is_none_or(|kind| kind == event.device_kind)
    }

    fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.sequence.device_kind()
    }

    fn dispose(&self) {
        self.primary_dispose();
    }

    fn debug_description(&self) -> &'static str {
        "tap"
    }
}

impl OneSequenceGestureRecognizer for TapGestureRecognizer {
    fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    fn handle_event(&self, event: &PointerEvent) {
        self.primary_handle_event(event);
    }

    fn did_stop_tracking_last_pointer(&self, pointer: PointerId) {
        self.primary_did_stop_tracking_last_pointer(pointer);
    }

    fn resolve(&self, disposition: GestureDisposition) {
        if self.won_arena.get() && disposition == GestureDisposition::Rejected {
            debug_assert!(self.sent_tap_down.get(), "won the arena without a tap down");
            self.cancel(CancelReason::Spontaneous);
            self.reset();
        }
        self.sequence.resolve(disposition);
    }
}

impl PrimaryPointerGestureRecognizer for TapGestureRecognizer {
    fn primary(&self) -> &PrimaryPointerCore {
        &self.primary
    }

    fn handle_primary_pointer(&self, event: &PointerEvent) {
        match event.kind {
            PointerEventKind::Up => {
                self.final_position.set(Some(event.position));
                if self.won_arena.get() {
                    self.resolve(GestureDisposition::Accepted);
                }
                self.check_up();
            }
            PointerEventKind::Cancel => {
                self.cancel(CancelReason::Cancelled);
                self.reset();
            }
            _ if event.buttons != self.initial_buttons.get() => {
                self.resolve(GestureDisposition::Rejected);
                self.stop_tracking_pointer(event.pointer);
            }
            _ => {}
        }
    }

    fn did_exceed_deadline(&self) {
        self.check_down();
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drags on many pointers at once, each driving its own [`Drag`] client.
//!
//! Every pointer that goes down joins the arena on its own. While its arena is undecided the
//! pointer's movement is buffered. When the pointer is won, `on_start` is asked for a client;
//! the buffered movement is delivered as the client's first update and later moves go
//! straight to it. Returning `None` from `on_start` drops the pointer.
//!
//! [`MultiDragKind`] decides when a pointer claims its arena:
//!
//! - `Immediate`: once it has moved beyond the touch slop in any direction.
//! - `Horizontal` / `Vertical`: once it has moved beyond the touch slop along that axis.
//! - `Delayed`: once it has stayed within the touch slop for the delay. Moving further
//!   before then gives the pointer up.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use kurbo::{Point, Vec2};
use understory_velocity::tracker::VelocityTracker;

use crate::arena::{GestureArenaEntry, GestureArenaMember, GestureDisposition};
use crate::binding::GestureBinding;
use crate::drag_details::{DragEndDetails, DragUpdateDetails};
use crate::events::{PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::recognizer::{Callback, GestureRecognizer, invoke_callback};
use crate::router::PointerRoute;
use crate::scheduler::TimerHandle;

/// The receiving end of one pointer's drag.
///
/// Every method defaults to doing nothing.
pub trait Drag {
    /// The pointer moved.
    fn update(&self, details: &DragUpdateDetails) {
        let _ = details;
    }

    /// The pointer lifted.
    fn end(&self, details: &DragEndDetails) {
        let _ = details;
    }

    /// The pointer was cancelled before it lifted.
    fn cancel(&self) {}
}

/// When a [`MultiDragGestureRecognizer`] claims a pointer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MultiDragKind {
    /// After moving beyond the touch slop.
    Immediate,
    /// After moving horizontally beyond the touch slop.
    Horizontal,
    /// After moving vertically beyond the touch slop.
    Vertical,
    /// After staying within the touch slop for the given time.
    Delayed(Duration),
}

impl MultiDragKind {
    fn description(self) -> &'static str {
        match self {
            Self::Immediate => "multidrag",
            Self::Horizontal => "horizontal multidrag",
            Self::Vertical => "vertical multidrag",
            Self::Delayed(_) => "long multidrag",
        }
    }
}

struct MultiDragPointerState {
    initial_position: Point,
    velocity_tracker: RefCell<VelocityTracker>,
    client: RefCell<Option<Rc<dyn Drag>>>,
    // `None` once the pointer has started or been given up.
    pending_delta: Cell<Option<Vec2>>,
    last_pending_time_stamp: Cell<Option<Duration>>,
    entry: RefCell<Option<GestureArenaEntry>>,
    timer: RefCell<Option<TimerHandle>>,
    start_when_delay_passes: Cell<bool>,
}

impl fmt::Debug for MultiDragPointerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiDragPointerState")
            .field("initial_position", &self.initial_position)
            .field("pending_delta", &self.pending_delta.get())
            .field(
                "started",
                &self.client.try_borrow().map(|c| c.is_some()).ok(),
            )
            .finish_non_exhaustive()
    }
}

impl MultiDragPointerState {
    fn new(initial_position: Point) -> Self {
        Self {
            initial_position,
            velocity_tracker: RefCell::new(VelocityTracker::new()),
            client: RefCell::new(None),
            pending_delta: Cell::new(Some(Vec2::ZERO)),
            last_pending_time_stamp: Cell::new(None),
            entry: RefCell::new(None),
            timer: RefCell::new(None),
            start_when_delay_passes: Cell::new(false),
        }
    }

    fn client(&self) -> Option<Rc<dyn Drag>> {
        self.client.borrow().clone()
    }

    fn resolve(&self, disposition: GestureDisposition) {
        let entry = self.entry.borrow().clone();
        if let Some(entry) = entry {
            entry.resolve(disposition);
        }
    }

    fn has_active_timer(&self) -> bool {
        self.timer.borrow().is_some()
    }

    fn stop_timer(&self) {
        let timer = self.timer.borrow_mut().take();
        if let Some(timer) = timer {
            timer.cancel();
        }
    }

    fn clear_pending(&self) {
        self.pending_delta.set(None);
        self.last_pending_time_stamp.set(None);
    }

    fn rejected(&self) {
        debug_assert!(self.client().is_none(), "rejected after the drag started");
        self.clear_pending();
        self.entry.borrow_mut().take();
    }

    fn dispose(&self) {
        self.stop_timer();
        let entry = self.entry.borrow_mut().take();
        if let Some(entry) = entry {
            entry.resolve(GestureDisposition::Rejected);
        }
    }
}

/// Follows a drag on every pointer that goes down, independently of the others.
pub struct MultiDragGestureRecognizer {
    binding: Rc<GestureBinding>,
    me: Weak<Self>,
    kind: MultiDragKind,
    route: PointerRoute,
    device_kind: Cell<Option<PointerDeviceKind>>,
    pointers: RefCell<BTreeMap<PointerId, Rc<MultiDragPointerState>>>,
    on_start: Callback<dyn Fn(Point) -> Option<Rc<dyn Drag>>>,
}

impl fmt::Debug for MultiDragGestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiDragGestureRecognizer")
            .field("kind", &self.kind)
            .field("pointers", &self.pointers.try_borrow().ok())
            .finish_non_exhaustive()
    }
}

impl MultiDragGestureRecognizer {
    /// Create a multi-drag recognizer of `kind`.
    pub fn new(binding: &Rc<GestureBinding>, kind: MultiDragKind) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let weak = me.clone();
            let route: PointerRoute = Rc::new(move |event: &PointerEvent| {
                if let Some(recognizer) = weak.upgrade() {
                    recognizer.handle_event(event);
                }
            });
            Self {
                binding: binding.clone(),
                me: me.clone(),
                kind,
                route,
                device_kind: Cell::new(None),
                pointers: RefCell::new(BTreeMap::new()),
                on_start: Callback::default(),
            }
        })
    }

    /// Claim pointers once they move beyond the touch slop.
    pub fn immediate(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Self::new(binding, MultiDragKind::Immediate)
    }

    /// Claim pointers once they move horizontally beyond the touch slop.
    pub fn horizontal(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Self::new(binding, MultiDragKind::Horizontal)
    }

    /// Claim pointers once they move vertically beyond the touch slop.
    pub fn vertical(binding: &Rc<GestureBinding>) -> Rc<Self> {
        Self::new(binding, MultiDragKind::Vertical)
    }

    /// Claim pointers held still for the binding's long-press timeout.
    pub fn delayed(binding: &Rc<GestureBinding>) -> Rc<Self> {
        let delay = binding.settings().long_press_timeout;
        Self::new(binding, MultiDragKind::Delayed(delay))
    }

    /// When pointers are claimed.
    pub fn kind(&self) -> MultiDragKind {
        self.kind
    }

    /// Only consider pointers from devices of `kind`.
    pub fn set_device_kind(&self, kind: Option<PointerDeviceKind>) {
        self.device_kind.set(kind);
    }

    /// A pointer was claimed; return its client, or `None` to drop the pointer.
    ///
    /// The callback receives the position where the pointer went down.
    pub fn set_on_start(&self, f: impl Fn(Point) -> Option<Rc<dyn Drag>> + 'static) {
        self.on_start.set(Rc::new(f));
    }

    /// Pointers currently followed, in id order.
    pub fn pointers(&self) -> Vec<PointerId> {
        self.pointers.borrow().keys().copied().collect()
    }

    fn state(&self, pointer: PointerId) -> Option<Rc<MultiDragPointerState>> {
        self.pointers.borrow().get(&pointer).cloned()
    }

    fn handle_event(&self, event: &PointerEvent) {
        let Some(state) = self.state(event.pointer) else {
            return;
        };
        match event.kind {
            PointerEventKind::Move => self.handle_move(&state, event),
            PointerEventKind::Up => {
                let client = state.client.borrow_mut().take();
                if let Some(client) = client {
                    let details = DragEndDetails {
                        velocity: state.velocity_tracker.borrow().velocity(),
                        primary_velocity: None,
                    };
                    invoke_callback("end", self.debug_description(), || client.end(&details));
                } else {
                    state.clear_pending();
                }
                self.remove_state(event.pointer);
            }
            PointerEventKind::Cancel => {
                let client = state.client.borrow_mut().take();
                if let Some(client) = client {
                    invoke_callback("cancel", self.debug_description(), || client.cancel());
                } else {
                    state.clear_pending();
                }
                self.remove_state(event.pointer);
            }
            _ => {}
        }
    }

    fn handle_move(&self, state: &MultiDragPointerState, event: &PointerEvent) {
        if !event.synthesized {
            state
                .velocity_tracker
                .borrow_mut()
                .add_position(event.time_stamp, event.position);
        }
        if let Some(client) = state.client() {
            let details = DragUpdateDetails {
                source_time_stamp: Some(event.time_stamp),
                ..DragUpdateDetails::new(event.delta, event.position)
            };
            invoke_callback("update", self.debug_description(), || {
                client.update(&details);
            });
        } else if let Some(pending) = state.pending_delta.get() {
            state.pending_delta.set(Some(pending + event.delta));
            state.last_pending_time_stamp.set(Some(event.time_stamp));
            self.check_for_resolution_after_move(state);
        }
    }

    fn check_for_resolution_after_move(&self, state: &MultiDragPointerState) {
        let Some(pending) = state.pending_delta.get() else {
            return;
        };
        let slop = self.binding.settings().touch_slop;
        match self.kind {
            MultiDragKind::Immediate if pending.hypot() > slop => {
                state.resolve(GestureDisposition::Accepted);
            }
            MultiDragKind::Horizontal if pending.x.abs() > slop => {
                state.resolve(GestureDisposition::Accepted);
            }
            MultiDragKind::Vertical if pending.y.abs() > slop => {
                state.resolve(GestureDisposition::Accepted);
            }
            MultiDragKind::Delayed(_) if state.has_active_timer() && pending.hypot() > slop => {
                state.resolve(GestureDisposition::Rejected);
                state.stop_timer();
            }
            _ => {}
        }
    }

    fn delay_passed(&self, pointer: PointerId) {
        let Some(state) = self.state(pointer) else {
            return;
        };
        state.timer.borrow_mut().take();
        if state.start_when_delay_passes.replace(false) {
            self.start_drag(pointer);
        } else {
            state.resolve(GestureDisposition::Accepted);
        }
    }

    fn start_drag(&self, pointer: PointerId) {
        let Some(state) = self.state(pointer) else {
            return;
        };
        let drag = self.on_start.get().and_then(|cb| {
            invoke_callback("on_start", self.debug_description(), || {
                cb(state.initial_position)
            })
            .flatten()
        });
        let Some(drag) = drag else {
            self.remove_state(pointer);
            return;
        };
        debug_assert!(state.client().is_none(), "pointer {pointer} started twice");
        let details = DragUpdateDetails {
            source_time_stamp: state.last_pending_time_stamp.get(),
            ..DragUpdateDetails::new(
                state.pending_delta.get().unwrap_or(Vec2::ZERO),
                state.initial_position,
            )
        };
        state.clear_pending();
        *state.client.borrow_mut() = Some(drag.clone());
        invoke_callback("update", self.debug_description(), || drag.update(&details));
    }

    fn remove_state(&self, pointer: PointerId) {
        self.binding.router().remove_route(pointer, &self.route);
        let state = self.pointers.borrow_mut().remove(&pointer);
        if let Some(state) = state {
            state.dispose();
        }
    }
}

impl GestureArenaMember for MultiDragGestureRecognizer {
    fn accept_gesture(&self, pointer: PointerId) {
        let Some(state) = self.state(pointer) else {
            return;
        };
        if state.has_active_timer() {
            state.start_when_delay_passes.set(true);
        } else {
            self.start_drag(pointer);
        }
    }

    fn reject_gesture(&self, pointer: PointerId) {
        if let Some(state) = self.state(pointer) {
            state.rejected();
            self.remove_state(pointer);
        }
    }
}

impl GestureRecognizer for MultiDragGestureRecognizer {
    fn add_allowed_pointer(&self, event: &PointerEvent) {
        let Some(member) = self.me.upgrade() else {
            return;
        };
        let pointer = event.pointer;
        debug_assert!(
            self.state(pointer).is_none(),
            "pointer {pointer} is already followed"
        );
        let state = Rc::new(MultiDragPointerState::new(event.position));
        if let MultiDragKind::Delayed(delay) = self.kind {
            let me = self.me.clone();
            let timer = self.binding.scheduler().run_after(delay, move || {
                if let Some(recognizer) = me.upgrade() {
                    recognizer.delay_passed(pointer);
                }
            });
            *state.timer.borrow_mut() = Some(timer);
        }
        self.pointers.borrow_mut().insert(pointer, state.clone());
        self.binding.router().add_route(pointer, self.route.clone());
        let entry = self.binding.arena().add(pointer, member);
        *state.entry.borrow_mut() = Some(entry);
    }

    fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.device_kind.get()
    }

    fn dispose(&self) {
        for pointer in self.pointers() {
            self.remove_state(pointer);
        }
    }

    fn debug_description(&self) -> &'static str {
        self.kind.description()
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recognizer base state machines.
//!
//! ## Overview
//!
//! A recognizer is an `Rc`-shared object that competes in gesture arenas and turns the
//! pointer events it receives into application callbacks. This module provides the
//! pieces concrete recognizers are assembled from:
//!
//! - [`GestureRecognizer`]: the interface hit targets use to hand pointers to a recognizer.
//! - [`SequenceTracker`]: bookkeeping for recognizers that follow one gesture at a time. It
//!   owns the tracked pointer set, one arena entry per tracked pointer, and the router
//!   registrations.
//! - [`OneSequenceGestureRecognizer`]: provided methods over a [`SequenceTracker`].
//! - [`PrimaryPointerCore`] and [`PrimaryPointerGestureRecognizer`]: the
//!   `Ready → Possible → Accepted | Defunct` machine anchored on the first pointer, with an
//!   optional deadline timer and movement tolerances.
//!
//! Every application callback runs behind a catch boundary: a panicking callback is
//! logged with `log::error!` and the recognizer carries on.
//!
//! ## Writing a recognizer
//!
//! Build the recognizer with `Rc::new_cyclic`, construct its [`SequenceTracker`] from the
//! weak self reference, and implement [`GestureArenaMember`], [`GestureRecognizer`], and
//! [`OneSequenceGestureRecognizer`]. Trait methods on the supertraits forward to the
//! provided `primary_*` helpers when the recognizer embeds a [`PrimaryPointerCore`].

use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use kurbo::Point;

use crate::arena::{GestureArenaEntry, GestureArenaMember, GestureDisposition};
use crate::binding::GestureBinding;
use crate::events::{PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};
use crate::report::guard;
use crate::router::PointerRoute;
use crate::scheduler::TimerHandle;
use crate::team::GestureArenaTeam;

/// A settable application callback.
pub(crate) struct Callback<F: ?Sized>(RefCell<Option<Rc<F>>>);

impl<F: ?Sized> Default for Callback<F> {
    fn default() -> Self {
        Self(RefCell::new(None))
    }
}

impl<F: ?Sized> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_set() { "set" } else { "unset" })
    }
}

impl<F: ?Sized> Callback<F> {
    pub(crate) fn set(&self, callback: Rc<F>) {
        *self.0.borrow_mut() = Some(callback);
    }

    pub(crate) fn clear(&self) {
        let old = self.0.borrow_mut().take();
        drop(old);
    }

    pub(crate) fn get(&self) -> Option<Rc<F>> {
        self.0.borrow().clone()
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

/// Run an application callback behind a catch boundary.
///
/// `name` is the handler name (`"on_tap"`), `recognizer` the
/// [`debug_description`](GestureRecognizer::debug_description) of the caller. Returns
/// `None` if the callback panicked.
pub(crate) fn invoke_callback<R>(
    name: &str,
    recognizer: &str,
    callback: impl FnOnce() -> R,
) -> Option<R> {
    log::trace!("{recognizer} calling {name} callback.");
    guard(
        format_args!("while handling a gesture (handler: {name}, recognizer: {recognizer})"),
        callback,
    )
}

/// A hook that calls `f` on the recognizer behind `me`, if it is still alive.
pub fn weak_hook<R: 'static>(me: &Weak<R>, f: impl Fn(&R) + 'static) -> Rc<dyn Fn()> {
    let me = me.clone();
    Rc::new(move || {
        if let Some(recognizer) = me.upgrade() {
            f(&recognizer);
        }
    })
}

/// A pointer route that forwards events to the recognizer behind `me`.
pub fn route_to<R: OneSequenceGestureRecognizer + 'static>(me: &Weak<R>) -> PointerRoute {
    let me = me.clone();
    Rc::new(move |event: &PointerEvent| {
        if let Some(recognizer) = me.upgrade() {
            recognizer.handle_event(event);
        }
    })
}

/// The interface hit targets use to hand pointers to a recognizer.
pub trait GestureRecognizer: GestureArenaMember {
    /// Offer a new pointer, typically from its down event.
    ///
    /// Allowed pointers go to [`add_allowed_pointer`](Self::add_allowed_pointer), the rest to
    /// [`handle_non_allowed_pointer`](Self::handle_non_allowed_pointer).
    fn add_pointer(&self, event: &PointerEvent) {
        if self.is_pointer_allowed(event) {
            self.add_allowed_pointer(event);
        } else {
            self.handle_non_allowed_pointer(event);
        }
    }

    /// Start following an allowed pointer.
    fn add_allowed_pointer(&self, event: &PointerEvent);

    /// React to a pointer that was not allowed.
    fn handle_non_allowed_pointer(&self, _event: &PointerEvent) {}

    /// Whether the recognizer wants `event`'s pointer.
    ///
    /// The default honors [`device_kind`](Self::device_kind).
    fn is_pointer_allowed(&self, event: &PointerEvent) -> bool {
        self.device_kind()
            .is_none_or(|kind| kind == event.device_kind)
    }

    /// Only pointers from this kind of device are considered, if set.
    fn device_kind(&self) -> Option<PointerDeviceKind> {
        None
    }

    /// Offer a mouse-wheel scroll signal.
    fn add_scroll_pointer(&self, _event: &PointerEvent) {}

    /// Release every arena entry, route, and timer the recognizer holds.
    fn dispose(&self);

    /// Short lowercase name used in diagnostics, such as `"tap"`.
    fn debug_description(&self) -> &'static str;
}

/// Pointer and arena bookkeeping for a recognizer that follows one gesture at a time.
pub struct SequenceTracker {
    binding: Rc<GestureBinding>,
    member: Weak<dyn GestureArenaMember>,
    route: PointerRoute,
    entries: RefCell<BTreeMap<PointerId, GestureArenaEntry>>,
    tracked: RefCell<BTreeSet<PointerId>>,
    scroll_pointers: RefCell<BTreeSet<PointerId>>,
    team: RefCell<Option<Rc<GestureArenaTeam>>>,
    device_kind: Cell<Option<PointerDeviceKind>>,
}

impl fmt::Debug for SequenceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceTracker")
            .field("tracked", &self.tracked.try_borrow().map(|t| t.len()).ok())
            .field("device_kind", &self.device_kind.get())
            .finish_non_exhaustive()
    }
}

impl SequenceTracker {
    /// Create the tracker for the recognizer behind `me`.
    ///
    /// Call this from inside `Rc::new_cyclic`.
    pub fn new<R: OneSequenceGestureRecognizer + 'static>(
        binding: &Rc<GestureBinding>,
        me: &Weak<R>,
    ) -> Self {
        let member: Weak<dyn GestureArenaMember> = me.clone();
        Self {
            binding: binding.clone(),
            member,
            route: route_to(me),
            entries: RefCell::new(BTreeMap::new()),
            tracked: RefCell::new(BTreeSet::new()),
            scroll_pointers: RefCell::new(BTreeSet::new()),
            team: RefCell::new(None),
            device_kind: Cell::new(None),
        }
    }

    /// The binding this recognizer belongs to.
    pub fn binding(&self) -> &Rc<GestureBinding> {
        &self.binding
    }

    /// The device kind filter.
    pub fn device_kind(&self) -> Option<PointerDeviceKind> {
        self.device_kind.get()
    }

    /// Set the device kind filter.
    pub fn set_device_kind(&self, kind: Option<PointerDeviceKind>) {
        self.device_kind.set(kind);
    }

    /// The team the recognizer competes in, if any.
    pub fn team(&self) -> Option<Rc<GestureArenaTeam>> {
        self.team.borrow().clone()
    }

    /// Join `team`.
    ///
    /// Only valid while no pointer is tracked.
    pub fn set_team(&self, team: Rc<GestureArenaTeam>) {
        debug_assert!(
            self.entries.borrow().is_empty() && self.tracked.borrow().is_empty(),
            "a team can only be assigned while idle"
        );
        debug_assert!(self.team.borrow().is_none(), "team already assigned");
        *self.team.borrow_mut() = Some(team);
    }

    /// Whether `pointer` is tracked.
    pub fn is_tracking(&self, pointer: PointerId) -> bool {
        self.tracked.borrow().contains(&pointer)
    }

    /// The tracked pointers, in id order.
    pub fn tracked_pointers(&self) -> Vec<PointerId> {
        self.tracked.borrow().iter().copied().collect()
    }

    /// Whether an arena entry is held for `pointer`.
    pub fn has_entry(&self, pointer: PointerId) -> bool {
        self.entries.borrow().contains_key(&pointer)
    }

    /// Route `pointer`'s events to the recognizer and join its arena.
    pub fn start_tracking_pointer(&self, pointer: PointerId) {
        self.binding.router().add_route(pointer, self.route.clone());
        self.tracked.borrow_mut().insert(pointer);
        debug_assert!(
            !self.has_entry(pointer),
            "pointer {pointer} already has an arena entry"
        );
        let Some(member) = self.member.upgrade() else {
            return;
        };
        let team = self.team();
        let entry = match team {
            Some(team) => team.add(pointer, member),
            None => self.binding.arena().add(pointer, member),
        };
        self.entries.borrow_mut().insert(pointer, entry);
    }

    /// Stop routing `pointer`'s events to the recognizer.
    ///
    /// Returns `true` if `pointer` was the last tracked pointer. The arena entry is kept
    /// until [`forget_entries`](Self::forget_entries) so the caller can still resolve it.
    pub fn stop_tracking_pointer(&self, pointer: PointerId) -> bool {
        if !self.tracked.borrow_mut().remove(&pointer) {
            return false;
        }
        self.binding.router().remove_route(pointer, &self.route);
        self.tracked.borrow().is_empty()
    }

    /// Drop every arena entry without resolving it.
    ///
    /// Runs once the last tracked pointer is gone; until then, entries of pointers that
    /// already lifted stay reachable from [`resolve`](Self::resolve).
    pub fn forget_entries(&self) {
        let entries = core::mem::take(&mut *self.entries.borrow_mut());
        drop(entries);
    }

    /// Route a mouse-wheel pointer's events to the recognizer without joining an arena.
    pub fn start_tracking_scroll_pointer(&self, pointer: PointerId) {
        if self.scroll_pointers.borrow_mut().insert(pointer) {
            self.binding.router().add_route(pointer, self.route.clone());
        }
    }

    /// Stop routing a mouse-wheel pointer's events.
    ///
    /// Returns `true` if it was the last scroll pointer.
    pub fn stop_tracking_scroll_pointer(&self, pointer: PointerId) -> bool {
        if !self.scroll_pointers.borrow_mut().remove(&pointer) {
            return false;
        }
        self.binding.router().remove_route(pointer, &self.route);
        self.scroll_pointers.borrow().is_empty()
    }

    /// Resolve every held entry with `disposition`, dropping them.
    pub fn resolve(&self, disposition: GestureDisposition) {
        let entries = core::mem::take(&mut *self.entries.borrow_mut());
        for entry in entries.into_values() {
            entry.resolve(disposition);
        }
    }

    /// Resolve the entry for `pointer` with `disposition`, dropping it.
    pub fn resolve_pointer(&self, pointer: PointerId, disposition: GestureDisposition) {
        let entry = self.entries.borrow_mut().remove(&pointer);
        if let Some(entry) = entry {
            entry.resolve(disposition);
        }
    }

    /// Reject every entry and remove every route.
    pub fn dispose(&self) {
        self.resolve(GestureDisposition::Rejected);
        let tracked = core::mem::take(&mut *self.tracked.borrow_mut());
        let scroll = core::mem::take(&mut *self.scroll_pointers.borrow_mut());
        for pointer in tracked.into_iter().chain(scroll) {
            self.binding.router().remove_route(pointer, &self.route);
        }
    }
}

/// A recognizer that follows one gesture at a time through a [`SequenceTracker`].
pub trait OneSequenceGestureRecognizer: GestureRecognizer {
    /// The recognizer's tracker.
    fn sequence(&self) -> &SequenceTracker;

    /// Handle an event for a tracked pointer.
    fn handle_event(&self, event: &PointerEvent);

    /// The last tracked pointer went away.
    fn did_stop_tracking_last_pointer(&self, pointer: PointerId);

    /// The last mouse-wheel pointer went away.
    fn did_stop_tracking_last_scroll_pointer(&self, _pointer: PointerId) {}

    /// Resolve every held entry.
    fn resolve(&self, disposition: GestureDisposition) {
        self.sequence().resolve(disposition);
    }

    /// Resolve the entry held for `pointer`.
    fn resolve_pointer(&self, pointer: PointerId, disposition: GestureDisposition) {
        self.sequence().resolve_pointer(pointer, disposition);
    }

    /// Start following `pointer`.
    fn start_tracking_pointer(&self, pointer: PointerId) {
        self.sequence().start_tracking_pointer(pointer);
    }

    /// Stop following `pointer`, running
    /// [`did_stop_tracking_last_pointer`](Self::did_stop_tracking_last_pointer) when it was
    /// the last one.
    fn stop_tracking_pointer(&self, pointer: PointerId) {
        if self.sequence().stop_tracking_pointer(pointer) {
            self.did_stop_tracking_last_pointer(pointer);
            self.sequence().forget_entries();
        }
    }

    /// Stop following a mouse-wheel pointer.
    fn stop_tracking_scroll_pointer(&self, pointer: PointerId) {
        if self.sequence().stop_tracking_scroll_pointer(pointer) {
            self.did_stop_tracking_last_scroll_pointer(pointer);
        }
    }

    /// Stop following the event's pointer if it went up or was cancelled.
    ///
    /// A cancelled pointer's entry is rejected first.
    fn stop_tracking_if_pointer_no_longer_down(&self, event: &PointerEvent) {
        match event.kind {
            PointerEventKind::Up => self.stop_tracking_pointer(event.pointer),
            PointerEventKind::Cancel => {
                self.resolve_pointer(event.pointer, GestureDisposition::Rejected);
                self.stop_tracking_pointer(event.pointer);
            }
            _ => {}
        }
    }

    /// Compete as part of `team`. Only valid while idle.
    fn set_team(&self, team: Rc<GestureArenaTeam>) {
        self.sequence().set_team(team);
    }

    /// Only consider pointers from devices of `kind`.
    fn set_device_kind(&self, kind: Option<PointerDeviceKind>) {
        self.sequence().set_device_kind(kind);
    }
}

/// Progress of a [`PrimaryPointerGestureRecognizer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GestureRecognizerState {
    /// No primary pointer.
    Ready,
    /// Following a primary pointer; the gesture may still be recognized.
    Possible,
    /// The arena was won for the primary pointer.
    Accepted,
    /// The gesture can no longer be recognized for the current primary pointer.
    Defunct,
}

/// State shared by recognizers that anchor on one primary pointer.
pub struct PrimaryPointerCore {
    deadline: Cell<Option<Duration>>,
    pre_acceptance_slop_tolerance: Cell<Option<f64>>,
    post_acceptance_slop_tolerance: Cell<Option<f64>>,
    state: Cell<GestureRecognizerState>,
    primary_pointer: Cell<Option<PointerId>>,
    initial_position: Cell<Point>,
    timer: RefCell<Option<TimerHandle>>,
    on_deadline: Rc<dyn Fn()>,
}

impl fmt::Debug for PrimaryPointerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryPointerCore")
            .field("state", &self.state.get())
            .field("primary_pointer", &self.primary_pointer.get())
            .field("deadline", &self.deadline.get())
            .finish_non_exhaustive()
    }
}

impl PrimaryPointerCore {
    /// Create the core.
    ///
    /// `on_deadline` runs when `deadline` elapses while the primary pointer is still
    /// possible; build it with a weak reference to the recognizer. Both tolerances start
    /// at `slop_tolerance`.
    pub fn new(
        deadline: Option<Duration>,
        slop_tolerance: Option<f64>,
        on_deadline: Rc<dyn Fn()>,
    ) -> Self {
        Self {
            deadline: Cell::new(deadline),
            pre_acceptance_slop_tolerance: Cell::new(slop_tolerance),
            post_acceptance_slop_tolerance: Cell::new(slop_tolerance),
            state: Cell::new(GestureRecognizerState::Ready),
            primary_pointer: Cell::new(None),
            initial_position: Cell::new(Point::ORIGIN),
            timer: RefCell::new(None),
            on_deadline,
        }
    }

    /// Current state.
    pub fn state(&self) -> GestureRecognizerState {
        self.state.get()
    }

    /// The pointer the current gesture is anchored on.
    ///
    /// Kept after the gesture ends so late arena decisions can be matched.
    pub fn primary_pointer(&self) -> Option<PointerId> {
        self.primary_pointer.get()
    }

    /// Where the primary pointer went down.
    pub fn initial_position(&self) -> Point {
        self.initial_position.get()
    }

    /// Delay before [`did_exceed_deadline`](PrimaryPointerGestureRecognizer::did_exceed_deadline).
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline.get()
    }

    /// Set the deadline used by the next gesture.
    pub fn set_deadline(&self, deadline: Option<Duration>) {
        self.deadline.set(deadline);
    }

    /// Travel allowed before the arena is won.
    pub fn pre_acceptance_slop_tolerance(&self) -> Option<f64> {
        self.pre_acceptance_slop_tolerance.get()
    }

    /// Set the travel allowed before the arena is won; `None` allows any travel.
    pub fn set_pre_acceptance_slop_tolerance(&self, tolerance: Option<f64>) {
        self.pre_acceptance_slop_tolerance.set(tolerance);
    }

    /// Travel allowed after the arena is won.
    pub fn post_acceptance_slop_tolerance(&self) -> Option<f64> {
        self.post_acceptance_slop_tolerance.get()
    }

    /// Set the travel allowed after the arena is won; `None` allows any travel.
    pub fn set_post_acceptance_slop_tolerance(&self, tolerance: Option<f64>) {
        self.post_acceptance_slop_tolerance.set(tolerance);
    }

    /// Whether the deadline timer is armed.
    pub fn has_active_timer(&self) -> bool {
        self.timer.borrow().as_ref().is_some_and(TimerHandle::is_active)
    }

    fn begin(&self, event: &PointerEvent, binding: &GestureBinding) {
        self.state.set(GestureRecognizerState::Possible);
        self.primary_pointer.set(Some(event.pointer));
        self.initial_position.set(event.position);
        if let Some(deadline) = self.deadline.get() {
            let hook = self.on_deadline.clone();
            let timer = binding.scheduler().run_after(deadline, move || hook());
            let old = self.timer.borrow_mut().replace(timer);
            if let Some(old) = old {
                old.cancel();
            }
        }
    }

    fn is_primary(&self, pointer: PointerId) -> bool {
        self.primary_pointer.get() == Some(pointer)
    }

    fn exceeds_tolerance(&self, event: &PointerEvent) -> bool {
        let tolerance = match self.state.get() {
            GestureRecognizerState::Accepted => self.post_acceptance_slop_tolerance.get(),
            _ => self.pre_acceptance_slop_tolerance.get(),
        };
        tolerance.is_some_and(|t| (event.position - self.initial_position.get()).hypot() > t)
    }

    /// Stop the deadline timer.
    pub(crate) fn stop_timer(&self) {
        let timer = self.timer.borrow_mut().take();
        if let Some(timer) = timer {
            timer.cancel();
        }
    }

    /// `Possible → Accepted`.
    pub(crate) fn mark_accepted(&self) {
        if self.state.get() == GestureRecognizerState::Possible {
            self.stop_timer();
            self.state.set(GestureRecognizerState::Accepted);
        }
    }

    /// `Possible | Accepted → Defunct`.
    pub(crate) fn mark_defunct(&self) {
        if matches!(
            self.state.get(),
            GestureRecognizerState::Possible | GestureRecognizerState::Accepted
        ) {
            self.stop_timer();
            self.state.set(GestureRecognizerState::Defunct);
        }
    }

    fn reset(&self) {
        self.stop_timer();
        self.state.set(GestureRecognizerState::Ready);
    }
}

/// A recognizer anchored on its first pointer, with a deadline and slop tolerances.
///
/// Implementors forward the supertrait hooks to the provided `primary_*` methods:
///
/// | Hook | Forward to |
/// |---|---|
/// | `add_allowed_pointer` | [`primary_add_allowed_pointer`](Self::primary_add_allowed_pointer) |
/// | `handle_non_allowed_pointer` | [`primary_handle_non_allowed_pointer`](Self::primary_handle_non_allowed_pointer) |
/// | `handle_event` | [`primary_handle_event`](Self::primary_handle_event) |
/// | `accept_gesture` | [`primary_accept_gesture`](Self::primary_accept_gesture) |
/// | `reject_gesture` | [`primary_reject_gesture`](Self::primary_reject_gesture) |
/// | `did_stop_tracking_last_pointer` | [`primary_did_stop_tracking_last_pointer`](Self::primary_did_stop_tracking_last_pointer) |
/// | `dispose` | [`primary_dispose`](Self::primary_dispose) |
pub trait PrimaryPointerGestureRecognizer: OneSequenceGestureRecognizer {
    /// The recognizer's primary-pointer state.
    fn primary(&self) -> &PrimaryPointerCore;

    /// Handle an event for the primary pointer while the gesture is possible or accepted.
    fn handle_primary_pointer(&self, event: &PointerEvent);

    /// The deadline elapsed while the primary pointer was still possible.
    fn did_exceed_deadline(&self) {}

    /// Track the pointer; the first pointer seen while ready becomes primary and arms the
    /// deadline.
    fn primary_add_allowed_pointer(&self, event: &PointerEvent) {
        self.start_tracking_pointer(event.pointer);
        let core = self.primary();
        if core.state() == GestureRecognizerState::Ready {
            core.begin(event, self.sequence().binding());
        }
    }

    /// Give up on a pointer that was not allowed, unless the gesture is already won.
    fn primary_handle_non_allowed_pointer(&self, _event: &PointerEvent) {
        if self.primary().state() != GestureRecognizerState::Accepted {
            self.resolve(GestureDisposition::Rejected);
        }
    }

    /// Apply the slop tolerance, hand primary events to
    /// [`handle_primary_pointer`](Self::handle_primary_pointer), and untrack ended pointers.
    fn primary_handle_event(&self, event: &PointerEvent) {
        let core = self.primary();
        let live = matches!(
            core.state(),
            GestureRecognizerState::Possible | GestureRecognizerState::Accepted
        );
        if live && core.is_primary(event.pointer) {
            if event.kind == PointerEventKind::Move && core.exceeds_tolerance(event) {
                self.resolve(GestureDisposition::Rejected);
                self.stop_tracking_pointer(event.pointer);
            } else {
                self.handle_primary_pointer(event);
            }
        }
        self.stop_tracking_if_pointer_no_longer_down(event);
    }

    /// Mark the gesture accepted when the primary pointer's arena is won.
    fn primary_accept_gesture(&self, pointer: PointerId) {
        let core = self.primary();
        if core.is_primary(pointer) {
            core.mark_accepted();
        }
    }

    /// Mark the gesture defunct when the primary pointer's arena is lost.
    fn primary_reject_gesture(&self, pointer: PointerId) {
        let core = self.primary();
        if core.is_primary(pointer) {
            core.mark_defunct();
        }
    }

    /// Stop the deadline timer and get ready for the next gesture.
    fn primary_did_stop_tracking_last_pointer(&self, _pointer: PointerId) {
        self.primary().reset();
    }

    /// Stop the deadline timer, reject every entry, and remove every route.
    fn primary_dispose(&self) {
        self.primary().stop_timer();
        self.sequence().dispose();
    }
}

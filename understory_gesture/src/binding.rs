// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture binding: the event-processing context.
//!
//! ## Overview
//!
//! A [`GestureBinding`] owns everything one input surface needs to recognize gestures: the
//! [`PointerRouter`], the [`GestureArenaManager`], the [`Scheduler`], the
//! [`GestureSettings`], and a [`PointerDataConverter`] for raw samples. Recognizers hold an
//! `Rc` to the binding they were created for.
//!
//! ## Event flow
//!
//! For each pointer event, in order:
//!
//! 1. Hit testing. A down is hit-tested through the [`HitTestable`] root and the result is
//!    remembered until the pointer's up or cancel; moves reuse it. Hover and scroll
//!    events are hit-tested individually.
//!
//!    Each hover is compared with the previous hover of the same device. Targets that
//!    dropped off the path receive [`Exit`](PointerEventKind::Exit) from the innermost
//!    out, then targets that joined it receive [`Enter`](PointerEventKind::Enter) from
//!    the outermost in. Removing the device exits
//!    everything it was over.
//! 2. Dispatch. Every [`HitTestTarget`] on the path receives the event, front to back.
//!    [`RecognizerTarget`] hands downs to its recognizers, which start tracking them.
//! 3. Routing. The router delivers the event to every recognizer tracking the pointer.
//! 4. Arena bookkeeping. A down closes the pointer's arena; an up sweeps it.
//! 5. Microtasks queued along the way run before the next event is handled.
//!
//! Wheel signals are only dispatched while no contact pointer is being followed, so a
//! wheel turned mid-drag does not start a competing scroll.
//!
//! Events delivered while another event is being handled are queued and processed
//! afterwards, in order.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};

use kurbo::Point;

use crate::arena::GestureArenaManager;
use crate::converter::{PointerData, PointerDataConverter};
use crate::events::{PointerEvent, PointerEventKind, PointerId};
use crate::recognizer::GestureRecognizer;
use crate::report::guard;
use crate::router::PointerRouter;
use crate::scheduler::Scheduler;
use crate::settings::GestureSettings;

/// Something that can report which targets lie under a position.
pub trait HitTestable {
    /// Add the targets under `position` to `result`, front to back.
    fn hit_test(&self, result: &mut HitTestResult, position: Point);
}

/// Something that receives the pointer events of the interactions it was hit by.
pub trait HitTestTarget {
    /// Handle `event`; `entry` is the path entry the target was reached through.
    fn handle_event(&self, event: &PointerEvent, entry: &HitTestEntry);
}

/// One target on a hit-test path.
#[derive(Clone)]
pub struct HitTestEntry {
    target: Rc<dyn HitTestTarget>,
}

impl fmt::Debug for HitTestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HitTestEntry").finish_non_exhaustive()
    }
}

impl HitTestEntry {
    /// Wrap `target`.
    pub fn new(target: Rc<dyn HitTestTarget>) -> Self {
        Self { target }
    }

    /// The target.
    pub fn target(&self) -> &Rc<dyn HitTestTarget> {
        &self.target
    }
}

fn same_target(a: &HitTestEntry, b: &HitTestEntry) -> bool {
    core::ptr::addr_eq(Rc::as_ptr(&a.target), Rc::as_ptr(&b.target))
}

/// The targets under a position, front to back.
#[derive(Clone, Debug, Default)]
pub struct HitTestResult {
    path: Vec<HitTestEntry>,
}

impl HitTestResult {
    /// An empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `target` to the path.
    pub fn add(&mut self, target: Rc<dyn HitTestTarget>) {
        self.path.push(HitTestEntry::new(target));
    }

    /// The path, front to back.
    pub fn path(&self) -> &[HitTestEntry] {
        &self.path
    }

    /// Whether nothing was hit.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// A hit target that offers new pointers to a set of recognizers.
///
/// Downs go to [`GestureRecognizer::add_pointer`] and wheel signals to
/// [`GestureRecognizer::add_scroll_pointer`], in insertion order.
#[derive(Default)]
pub struct RecognizerTarget {
    recognizers: RefCell<Vec<Rc<dyn GestureRecognizer>>>,
}

impl fmt::Debug for RecognizerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.recognizers
                    .borrow()
                    .iter()
                    .map(|r| r.debug_description()),
            )
            .finish()
    }
}

impl RecognizerTarget {
    /// A target offering pointers to `recognizers`.
    pub fn new(recognizers: impl IntoIterator<Item = Rc<dyn GestureRecognizer>>) -> Rc<Self> {
        Rc::new(Self {
            recognizers: RefCell::new(recognizers.into_iter().collect()),
        })
    }

    /// Offer future pointers to `recognizer` too.
    pub fn push(&self, recognizer: Rc<dyn GestureRecognizer>) {
        self.recognizers.borrow_mut().push(recognizer);
    }

    /// Dispose every recognizer and forget them.
    pub fn dispose(&self) {
        let recognizers = core::mem::take(&mut *self.recognizers.borrow_mut());
        for recognizer in recognizers {
            recognizer.dispose();
        }
    }
}

impl HitTestTarget for RecognizerTarget {
    fn handle_event(&self, event: &PointerEvent, _entry: &HitTestEntry) {
        let recognizers = self.recognizers.borrow().clone();
        match event.kind {
            PointerEventKind::Down => {
                for recognizer in recognizers {
                    recognizer.add_pointer(event);
                }
            }
            PointerEventKind::Scroll { .. } => {
                for recognizer in recognizers {
                    recognizer.add_scroll_pointer(event);
                }
            }
            _ => {}
        }
    }
}

/// The event-processing context shared by a set of recognizers.
pub struct GestureBinding {
    settings: Cell<GestureSettings>,
    scheduler: Rc<Scheduler>,
    router: PointerRouter,
    arena: Rc<GestureArenaManager>,
    hit_testable: RefCell<Option<Rc<dyn HitTestable>>>,
    hit_tests: RefCell<BTreeMap<PointerId, HitTestResult>>,
    hover_paths: RefCell<BTreeMap<u32, HitTestResult>>,
    pending: RefCell<VecDeque<PointerEvent>>,
    flushing: Cell<bool>,
    converter: RefCell<PointerDataConverter>,
    me: Weak<Self>,
}

impl fmt::Debug for GestureBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureBinding")
            .field("settings", &self.settings.get())
            .field("scheduler", &self.scheduler)
            .field("router", &self.router)
            .field("arena", &self.arena)
            .field(
                "down_pointers",
                &self.hit_tests.borrow().keys().collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl GestureBinding {
    /// Create a binding with its own scheduler.
    pub fn new(settings: GestureSettings) -> Rc<Self> {
        Self::with_scheduler(settings, Scheduler::new())
    }

    /// Create a binding driven by an existing scheduler.
    pub fn with_scheduler(settings: GestureSettings, scheduler: Rc<Scheduler>) -> Rc<Self> {
        debug_assert!(
            settings.validate().is_ok(),
            "invalid gesture settings: {:?}",
            settings.validate()
        );
        Rc::new_cyclic(|me| Self {
            settings: Cell::new(settings),
            arena: GestureArenaManager::new(scheduler.clone()),
            scheduler,
            router: PointerRouter::new(),
            hit_testable: RefCell::new(None),
            hit_tests: RefCell::new(BTreeMap::new()),
            hover_paths: RefCell::new(BTreeMap::new()),
            pending: RefCell::new(VecDeque::new()),
            flushing: Cell::new(false),
            converter: RefCell::new(PointerDataConverter::new()),
            me: me.clone(),
        })
    }

    /// The thresholds recognizers read.
    pub fn settings(&self) -> GestureSettings {
        self.settings.get()
    }

    /// Replace the thresholds.
    ///
    /// Slops and fling limits are read as events arrive. Recognizers that anchor on a
    /// primary pointer copy their deadline and tolerances when they are created.
    pub fn set_settings(&self, settings: GestureSettings) {
        debug_assert!(
            settings.validate().is_ok(),
            "invalid gesture settings: {:?}",
            settings.validate()
        );
        self.settings.set(settings);
    }

    /// The scheduler driving timers and microtasks.
    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    /// The pointer router.
    pub fn router(&self) -> &PointerRouter {
        &self.router
    }

    /// The gesture arena manager.
    pub fn arena(&self) -> &Rc<GestureArenaManager> {
        &self.arena
    }

    /// Set the root that pointer positions are hit-tested against.
    pub fn set_hit_testable(&self, root: Option<Rc<dyn HitTestable>>) {
        *self.hit_testable.borrow_mut() = root;
    }

    /// Hit-test `position` against the root.
    pub fn hit_test(&self, position: Point) -> HitTestResult {
        let mut result = HitTestResult::new();
        let root = self.hit_testable.borrow().clone();
        if let Some(root) = root {
            guard("while hit testing", || root.hit_test(&mut result, position));
        }
        result
    }

    /// Advance the clock to `time`, firing due timers.
    pub fn advance_to(&self, time: Duration) {
        self.scheduler.advance_to(time);
    }

    /// Advance the clock by `delta`, firing due timers.
    pub fn advance_by(&self, delta: Duration) {
        self.scheduler.advance_by(delta);
    }

    /// Convert raw samples and handle the resulting events.
    pub fn handle_pointer_data(&self, data: &[PointerData], device_pixel_ratio: f64) {
        let events = self
            .converter
            .borrow_mut()
            .expand(data, device_pixel_ratio);
        self.handle_pointer_events(events);
    }

    /// Handle `event` and everything it causes.
    pub fn handle_pointer_event(&self, event: PointerEvent) {
        self.handle_pointer_events([event]);
    }

    /// Handle `events` in order.
    pub fn handle_pointer_events(&self, events: impl IntoIterator<Item = PointerEvent>) {
        self.pending.borrow_mut().extend(events);
        self.flush_pointer_event_queue();
    }

    /// Cancel the interaction of `pointer`.
    ///
    /// The cancel is queued; it is handled after the current event or, outside event
    /// handling, on the next microtask flush.
    pub fn cancel_pointer(&self, pointer: PointerId) {
        let was_empty = self.pending.borrow().is_empty();
        let event =
            PointerEvent::cancel(pointer, Point::ORIGIN).with_time_stamp(self.scheduler.now());
        self.pending.borrow_mut().push_back(event);
        if was_empty && !self.flushing.get() {
            let me = self.me.clone();
            self.scheduler.schedule_microtask(move || {
                if let Some(binding) = me.upgrade() {
                    binding.flush_pointer_event_queue();
                }
            });
        }
    }

    fn flush_pointer_event_queue(&self) {
        if self.flushing.replace(true) {
            return;
        }
        loop {
            let Some(event) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            self.handle_one(&event);
            self.scheduler.flush_microtasks();
        }
        self.flushing.set(false);
    }

    fn handle_one(&self, event: &PointerEvent) {
        let result = match event.kind {
            PointerEventKind::Hover => {
                let result = self.hit_test(event.position);
                self.update_hover_path(event, Some(&result));
                result
            }
            PointerEventKind::Removed => {
                self.update_hover_path(event, None);
                return;
            }
            PointerEventKind::ScrollStart
            | PointerEventKind::Scrolling
            | PointerEventKind::ScrollEnd => self.hit_test(event.position),
            PointerEventKind::Scroll { .. } => {
                self.router.clear_scroll_route(event.pointer);
                if !self.router.accept_scroll() {
                    return;
                }
                self.hit_test(event.position)
            }
            PointerEventKind::Down => {
                debug_assert!(
                    !self.hit_tests.borrow().contains_key(&event.pointer),
                    "pointer {} went down twice",
                    event.pointer
                );
                let result = self.hit_test(event.position);
                self.hit_tests
                    .borrow_mut()
                    .insert(event.pointer, result.clone());
                result
            }
            PointerEventKind::Up | PointerEventKind::Cancel => {
                let Some(result) = self.hit_tests.borrow_mut().remove(&event.pointer) else {
                    return;
                };
                result
            }
            PointerEventKind::Move if event.down => {
                let Some(result) = self.hit_tests.borrow().get(&event.pointer).cloned() else {
                    return;
                };
                result
            }
            _ => return,
        };
        self.dispatch_event(event, &result);
    }

    /// Send exits and enters for the change from the device's previous hover path to `path`.
    ///
    /// Exits run inner to outer, then enters outer to inner. `None` forgets the device.
    fn update_hover_path(&self, event: &PointerEvent, path: Option<&HitTestResult>) {
        let previous = match path {
            Some(path) => self
                .hover_paths
                .borrow_mut()
                .insert(event.device, path.clone()),
            None => self.hover_paths.borrow_mut().remove(&event.device),
        };
        let previous = previous.unwrap_or_default();
        let current = path.map(HitTestResult::path).unwrap_or_default();
        let exit = PointerEvent {
            kind: PointerEventKind::Exit,
            ..*event
        };
        for entry in previous.path() {
            if !current.iter().any(|e| same_target(e, entry)) {
                guard("while dispatching a pointer exit", || {
                    entry.target().handle_event(&exit, entry);
                });
            }
        }
        let enter = PointerEvent {
            kind: PointerEventKind::Enter,
            ..*event
        };
        for entry in current.iter().rev() {
            if !previous.path().iter().any(|e| same_target(e, entry)) {
                guard("while dispatching a pointer enter", || {
                    entry.target().handle_event(&enter, entry);
                });
            }
        }
    }

    /// Deliver `event` to every target in `result`, then route it and update its arena.
    pub fn dispatch_event(&self, event: &PointerEvent, result: &HitTestResult) {
        for entry in result.path() {
            guard(
                format_args!("while dispatching a pointer event ({event})"),
                || entry.target().handle_event(event, entry),
            );
        }
        self.router.route(event);
        match event.kind {
            PointerEventKind::Down => self.arena.close(event.pointer),
            PointerEventKind::Up => self.arena.sweep(event.pointer),
            _ => {}
        }
    }
}

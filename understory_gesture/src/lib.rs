// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_gesture --heading-base-level=0

//! Understory Gesture: gesture disambiguation for a single pointer stream.
//!
//! ## Overview
//!
//! Several recognizers often want the same pointer: a tap, a double tap, a drag and a long
//! press on one widget. This crate lets each of them follow the pointer independently and
//! settles, per pointer, which one gets it.
//!
//! - [`GestureArenaManager`](crate::arena::GestureArenaManager) runs one arena per pointer.
//!   Members declare victory or defeat; when the pointer lifts, the first remaining member
//!   wins the sweep.
//! - [`GestureArenaTeam`](crate::team::GestureArenaTeam) lets several recognizers compete as
//!   one member.
//! - [`PointerRouter`](crate::router::PointerRouter) delivers each pointer's events to the
//!   recognizers following it.
//! - [`GestureBinding`](crate::binding::GestureBinding) ties these together with a
//!   [`Scheduler`](crate::scheduler::Scheduler), hit testing, and the
//!   [`GestureSettings`](crate::settings::GestureSettings) every recognizer reads.
//!
//! ## Recognizers
//!
//! - [`TapGestureRecognizer`](crate::tap::TapGestureRecognizer): primary and secondary taps.
//! - [`DoubleTapGestureRecognizer`](crate::multitap::DoubleTapGestureRecognizer) and
//!   [`MultiTapGestureRecognizer`](crate::multitap::MultiTapGestureRecognizer).
//! - [`LongPressGestureRecognizer`](crate::long_press::LongPressGestureRecognizer).
//! - [`DragGestureRecognizer`](crate::monodrag::DragGestureRecognizer): vertical,
//!   horizontal and pan drags with fling detection.
//! - [`MultiDragGestureRecognizer`](crate::multidrag::MultiDragGestureRecognizer): one drag
//!   per pointer.
//! - [`ScaleGestureRecognizer`](crate::scale::ScaleGestureRecognizer): pinch, zoom and
//!   rotation.
//!
//! Custom recognizers build on the traits in [`recognizer`](crate::recognizer).
//!
//! ## Time
//!
//! Nothing here reads a clock. Deadlines run on the binding's scheduler, which the host
//! advances, and deferred arena resolution runs as microtasks drained after every event.
//! This keeps recognition deterministic and testable.
//!
//! Application callbacks that panic are logged through [`log`] and do not disturb the
//! engine.
//!
//! ## Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use kurbo::Point;
//! use understory_gesture::binding::{
//!     GestureBinding, HitTestResult, HitTestable, RecognizerTarget,
//! };
//! use understory_gesture::events::{PointerEvent, PointerId};
//! use understory_gesture::recognizer::GestureRecognizer;
//! use understory_gesture::settings::GestureSettings;
//! use understory_gesture::tap::TapGestureRecognizer;
//!
//! struct Everywhere(Rc<RecognizerTarget>);
//!
//! impl HitTestable for Everywhere {
//!     fn hit_test(&self, result: &mut HitTestResult, _position: Point) {
//!         result.add(self.0.clone());
//!     }
//! }
//!
//! let binding = GestureBinding::new(GestureSettings::default());
//! let tap = TapGestureRecognizer::new(&binding);
//! let taps = Rc::new(Cell::new(0));
//! let t = taps.clone();
//! tap.set_on_tap(move || t.set(t.get() + 1));
//!
//! let tap: Rc<dyn GestureRecognizer> = tap;
//! let target = RecognizerTarget::new([tap]);
//! binding.set_hit_testable(Some(Rc::new(Everywhere(target))));
//!
//! let pointer = PointerId(11);
//! binding.handle_pointer_event(PointerEvent::down(pointer, Point::new(5.0, 5.0)));
//! binding.handle_pointer_event(PointerEvent::up(pointer, Point::new(5.0, 5.0)));
//! assert_eq!(taps.get(), 1);
//! ```

pub mod arena;
pub mod binding;
pub mod converter;
pub mod drag_details;
pub mod events;
pub mod listeners;
pub mod long_press;
pub mod monodrag;
pub mod multidrag;
pub mod multitap;
pub mod recognizer;
pub(crate) mod report;
pub mod router;
pub mod scale;
pub mod scheduler;
pub mod settings;
pub mod tap;
pub mod team;

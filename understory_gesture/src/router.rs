// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer router: delivers pointer events to the recognizers tracking them.
//!
//! ## Overview
//!
//! Recognizers register a [`PointerRoute`] for each pointer they track. When the
//! [`GestureBinding`](crate::binding::GestureBinding) handles an event it calls
//! [`PointerRouter::route`], which delivers the event to every route registered for that
//! pointer, then to every global route.
//!
//! ## Delivery
//!
//! - Delivery works on a snapshot taken when routing starts. A route removed by an earlier
//!   route during the same delivery is skipped; a route added during the delivery first sees
//!   the next event.
//! - A panicking route is caught and reported with `log::error!`; the remaining routes still
//!   receive the event.
//! - Routes are compared by `Rc` identity, so keep the `Rc` you registered to remove it.
//!
//! ## Scroll claims
//!
//! Mouse-wheel signals arrive on the reserved [`PointerId::SCROLL`]. The binding only treats
//! a wheel signal as a scroll when [`PointerRouter::accept_scroll`] reports that no
//! contact pointer is being tracked, and drops stale scroll routes with
//! [`PointerRouter::clear_scroll_route`] before dispatching it.

use core::cell::RefCell;
use core::fmt;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::events::{PointerEvent, PointerId};
use crate::listeners::ListenerRegistry;
use crate::report::guard;

/// A callback that receives pointer events.
pub type PointerRoute = Rc<dyn Fn(&PointerEvent)>;

type RouteSet = ListenerRegistry<dyn Fn(&PointerEvent)>;

/// Table of pointer routes.
///
/// ## Usage
///
/// - [`add_route`](Self::add_route) / [`remove_route`](Self::remove_route) for a tracked
///   pointer.
/// - [`add_global_route`](Self::add_global_route) /
///   [`remove_global_route`](Self::remove_global_route) to observe every event.
/// - [`route`](Self::route) to deliver an event.
#[derive(Default)]
pub struct PointerRouter {
    routes: RefCell<BTreeMap<PointerId, Rc<RouteSet>>>,
    global_routes: RouteSet,
}

impl fmt::Debug for PointerRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerRouter")
            .field("pointers", &self.routes.borrow().keys().collect::<Vec<_>>())
            .field("global_routes", &self.global_routes.len())
            .finish()
    }
}

impl PointerRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver events for `pointer` to `route`.
    pub fn add_route(&self, pointer: PointerId, route: PointerRoute) {
        let set = self
            .routes
            .borrow_mut()
            .entry(pointer)
            .or_insert_with(|| Rc::new(RouteSet::new()))
            .clone();
        debug_assert!(
            !set.contains(&route),
            "route added twice for pointer {pointer}"
        );
        set.add(route);
    }

    /// Stop delivering events for `pointer` to `route`.
    ///
    /// Returns `false` if the route was not registered.
    pub fn remove_route(&self, pointer: PointerId, route: &PointerRoute) -> bool {
        let Some(set) = self.routes.borrow().get(&pointer).cloned() else {
            return false;
        };
        if !set.contains(route) {
            return false;
        }
        if set.remove(route) {
            self.routes.borrow_mut().remove(&pointer);
        }
        true
    }

    /// Whether any route is registered for `pointer`.
    pub fn has_routes(&self, pointer: PointerId) -> bool {
        self.routes.borrow().contains_key(&pointer)
    }

    /// Deliver every event, regardless of pointer, to `route`.
    pub fn add_global_route(&self, route: PointerRoute) {
        debug_assert!(
            !self.global_routes.contains(&route),
            "global route added twice"
        );
        self.global_routes.add(route);
    }

    /// Stop delivering every event to `route`.
    pub fn remove_global_route(&self, route: &PointerRoute) -> bool {
        if !self.global_routes.contains(route) {
            return false;
        }
        self.global_routes.remove(route);
        true
    }

    /// Whether a wheel signal may start a scroll: no contact pointer has routes.
    pub fn accept_scroll(&self) -> bool {
        self.routes
            .borrow()
            .keys()
            .all(|pointer| *pointer == PointerId::SCROLL)
    }

    /// Drop every route registered for the scroll `pointer`.
    pub fn clear_scroll_route(&self, pointer: PointerId) {
        let removed = self.routes.borrow_mut().remove(&pointer);
        if let Some(set) = removed {
            set.clear();
        }
    }

    /// Deliver `event` to the routes for its pointer, then to the global routes.
    pub fn route(&self, event: &PointerEvent) {
        let set = self.routes.borrow().get(&event.pointer).cloned();
        if let Some(set) = set {
            set.notify(|route| Self::dispatch(route, event));
        }
        self.global_routes
            .notify(|route| Self::dispatch(route, event));
    }

    fn dispatch(route: &dyn Fn(&PointerEvent), event: &PointerEvent) {
        guard(
            format_args!("while routing a pointer event ({event})"),
            || route(event),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use kurbo::Point;

    fn counter() -> (Rc<Cell<u32>>, PointerRoute) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, Rc::new(move |_: &PointerEvent| c.set(c.get() + 1)))
    }

    fn down(pointer: u32) -> PointerEvent {
        PointerEvent::down(PointerId(pointer), Point::ORIGIN)
    }

    #[test]
    fn routes_only_matching_pointer_then_global() {
        let router = PointerRouter::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());
        let global: PointerRoute = Rc::new(move |_: &PointerEvent| o1.borrow_mut().push("global"));
        let local: PointerRoute = Rc::new(move |_: &PointerEvent| o2.borrow_mut().push("local"));
        router.add_global_route(global.clone());
        router.add_route(PointerId(11), local);

        router.route(&down(11));
        assert_eq!(*order.borrow(), ["local", "global"]);
        router.route(&down(12));
        assert_eq!(*order.borrow(), ["local", "global", "global"]);
        assert!(router.remove_global_route(&global), "global removed");
        assert!(!router.remove_global_route(&global), "already removed");
    }

    #[test]
    fn removing_last_route_forgets_pointer() {
        let router = PointerRouter::new();
        let (_, route) = counter();
        router.add_route(PointerId(11), route.clone());
        assert!(router.has_routes(PointerId(11)), "registered");
        assert!(router.remove_route(PointerId(11), &route), "removed");
        assert!(!router.has_routes(PointerId(11)), "pointer forgotten");
        assert!(!router.remove_route(PointerId(11), &route), "second removal reports false");
    }

    #[test]
    fn route_removed_mid_dispatch_is_skipped() {
        let router = Rc::new(PointerRouter::new());
        let (victim_count, victim) = counter();
        let (r, v) = (router.clone(), victim.clone());
        let remover: PointerRoute = Rc::new(move |e: &PointerEvent| {
            r.remove_route(e.pointer, &v);
        });
        router.add_route(PointerId(11), remover.clone());
        router.add_route(PointerId(11), victim);
        router.route(&down(11));
        assert_eq!(victim_count.get(), 0, "victim removed before its turn");
        router.remove_route(PointerId(11), &remover);
    }

    #[test]
    fn route_added_mid_dispatch_sees_next_event() {
        let router = Rc::new(PointerRouter::new());
        let (late_count, late) = counter();
        let r = router.clone();
        let adder: PointerRoute = Rc::new(move |e: &PointerEvent| {
            if !r.has_routes(PointerId(99)) {
                r.add_route(e.pointer, late.clone());
                r.add_route(PointerId(99), Rc::new(|_: &PointerEvent| {}));
            }
        });
        router.add_route(PointerId(11), adder.clone());
        router.route(&down(11));
        assert_eq!(late_count.get(), 0, "not delivered during the same dispatch");
        router.route(&down(11));
        assert_eq!(late_count.get(), 1, "delivered on the next event");
        router.clear_scroll_route(PointerId(11));
    }

    #[test]
    fn panicking_route_does_not_stop_delivery() {
        let router = PointerRouter::new();
        let (count, route) = counter();
        router.add_route(
            PointerId(11),
            Rc::new(|_: &PointerEvent| panic!("route failure")),
        );
        router.add_route(PointerId(11), route);
        router.route(&down(11));
        assert_eq!(count.get(), 1, "later route still receives the event");
    }

    #[test]
    fn scroll_acceptance_ignores_scroll_routes() {
        let router = PointerRouter::new();
        assert!(router.accept_scroll(), "nothing tracked");
        let (_, scroll_route) = counter();
        router.add_route(PointerId::SCROLL, scroll_route);
        assert!(router.accept_scroll(), "scroll routes do not block scrolling");
        let (_, contact) = counter();
        router.add_route(PointerId(11), contact.clone());
        assert!(!router.accept_scroll(), "a tracked contact blocks scrolling");
        router.remove_route(PointerId(11), &contact);
        router.clear_scroll_route(PointerId::SCROLL);
        assert!(!router.has_routes(PointerId::SCROLL), "scroll routes cleared");
    }
}

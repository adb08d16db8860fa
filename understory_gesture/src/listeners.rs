// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered listener sets with snapshot delivery.
//!
//! ## Overview
//!
//! [`ListenerRegistry`] is the bookkeeping value behind every "add listener / remove listener
//! / notify" surface in this crate. Listeners are `Rc` values compared by pointer identity,
//! kept in insertion order, and never duplicated.
//!
//! ## Usage
//!
//! - [`add`](ListenerRegistry::add) returns `true` when the registry goes from empty to
//!   non-empty, so owners can start upstream work lazily.
//! - [`remove`](ListenerRegistry::remove) returns `true` when the registry becomes empty, so
//!   owners can stop that work again.
//! - [`notify`](ListenerRegistry::notify) delivers to a snapshot taken when the call starts.
//!   A listener removed by an earlier listener during the same delivery is skipped when its
//!   turn comes; a listener added during the delivery waits for the next one.
//!
//! ```
//! use core::cell::Cell;
//! use std::rc::Rc;
//! use understory_gesture::listeners::ListenerRegistry;
//!
//! let hits = Rc::new(Cell::new(0));
//! let registry: ListenerRegistry<dyn Fn(u32)> = ListenerRegistry::new();
//! let h = hits.clone();
//! let listener: Rc<dyn Fn(u32)> = Rc::new(move |n| h.set(h.get() + n));
//! assert!(registry.add(listener.clone()), "first listener activates the registry");
//! registry.notify(|l| l(2));
//! assert_eq!(hits.get(), 2);
//! assert!(registry.remove(&listener), "last listener deactivates the registry");
//! ```

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Snapshot of a registry's listeners.
pub type ListenerSnapshot<T> = SmallVec<[Rc<T>; 4]>;

/// Insertion-ordered set of `Rc` listeners.
pub struct ListenerRegistry<T: ?Sized> {
    listeners: RefCell<Vec<Rc<T>>>,
}

impl<T: ?Sized> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: ?Sized> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ListenerRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Add `listener`.
    ///
    /// Returns `true` if it is the first listener. Adding a listener that is already present
    /// changes nothing and returns `false`.
    pub fn add(&self, listener: Rc<T>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        if listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        listeners.len() == 1
    }

    /// Remove `listener`.
    ///
    /// Returns `true` if this removal left the registry empty.
    pub fn remove(&self, listener: &Rc<T>) -> bool {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            listeners
                .iter()
                .position(|l| Rc::ptr_eq(l, listener))
                .map(|index| listeners.remove(index))
        };
        // The removed listener may own other registries; drop it outside the borrow.
        removed.is_some() && self.is_empty()
    }

    /// Whether `listener` is present.
    pub fn contains(&self, listener: &Rc<T>) -> bool {
        self.listeners
            .borrow()
            .iter()
            .any(|l| Rc::ptr_eq(l, listener))
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Whether there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        let old = core::mem::take(&mut *self.listeners.borrow_mut());
        drop(old);
    }

    /// The current listeners, in insertion order.
    pub fn snapshot(&self) -> ListenerSnapshot<T> {
        self.listeners.borrow().iter().cloned().collect()
    }

    /// Call `deliver` for each listener present when the call starts and still present when
    /// its turn comes.
    pub fn notify(&self, mut deliver: impl FnMut(&T)) {
        for listener in self.snapshot() {
            if self.contains(&listener) {
                deliver(&listener);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    type Listener = dyn Fn(&str);

    fn recorder(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Rc<Listener> {
        let log = log.clone();
        Rc::new(move |msg: &str| log.borrow_mut().push(format!("{name}:{msg}")))
    }

    #[test]
    fn add_and_remove_report_activation() {
        let registry: ListenerRegistry<Listener> = ListenerRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        assert!(registry.add(a.clone()), "first add activates");
        assert!(!registry.add(b.clone()), "second add does not");
        assert!(!registry.add(a.clone()), "duplicate add is ignored");
        assert_eq!(registry.len(), 2);
        assert!(!registry.remove(&a), "one listener remains");
        assert!(!registry.remove(&a), "second remove is a no-op");
        assert!(registry.remove(&b), "last removal deactivates");
        assert!(registry.is_empty(), "empty after removals");
    }

    #[test]
    fn notify_preserves_insertion_order() {
        let registry: ListenerRegistry<Listener> = ListenerRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        registry.add(recorder(&log, "a"));
        registry.add(recorder(&log, "b"));
        registry.add(recorder(&log, "c"));
        registry.notify(|l| l("x"));
        assert_eq!(*log.borrow(), ["a:x", "b:x", "c:x"]);
    }

    #[test]
    fn listener_removed_during_notify_is_skipped() {
        let registry: Rc<ListenerRegistry<Listener>> = Rc::new(ListenerRegistry::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim = recorder(&log, "victim");
        let (r, v, l) = (registry.clone(), victim.clone(), log.clone());
        let remover: Rc<Listener> = Rc::new(move |msg: &str| {
            l.borrow_mut().push(format!("remover:{msg}"));
            r.remove(&v);
        });
        registry.add(remover);
        registry.add(victim);
        registry.notify(|l| l("x"));
        assert_eq!(*log.borrow(), ["remover:x"]);
        registry.clear();
    }

    #[test]
    fn listener_added_during_notify_waits_for_next_delivery() {
        let registry: Rc<ListenerRegistry<Listener>> = Rc::new(ListenerRegistry::new());
        let calls = Rc::new(Cell::new(0));
        let late_calls = calls.clone();
        let late: Rc<Listener> = Rc::new(move |_: &str| late_calls.set(late_calls.get() + 1));
        let r = registry.clone();
        let adder: Rc<Listener> = Rc::new(move |_: &str| {
            r.add(late.clone());
        });
        registry.add(adder);
        registry.notify(|l| l("first"));
        assert_eq!(calls.get(), 0, "not delivered to the listener added mid-delivery");
        registry.notify(|l| l("second"));
        assert_eq!(calls.get(), 1, "delivered on the next notify");
        registry.clear();
    }
}

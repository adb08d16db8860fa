// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative task queue with a host-driven clock.
//!
//! ## Overview
//!
//! The gesture engine never blocks and never spawns threads. Anything that must happen
//! "later" goes through a [`Scheduler`]:
//!
//! - Microtasks run after the current dispatch finishes and before the next pointer event
//!   is handled. The arena uses one to declare a lone surviving member the winner.
//! - Timers run once the clock reaches their deadline. Recognizers use them for press,
//!   long-press, and double-tap timeouts.
//!
//! The clock is virtual. The host advances it with [`Scheduler::advance_to`] or
//! [`Scheduler::advance_by`], typically from its frame or event loop, which makes timing
//! fully deterministic in tests.
//!
//! ## Ordering
//!
//! Timers fire in deadline order, ties in scheduling order. Microtasks queued by a timer
//! callback run before the next timer fires.
//!
//! ```
//! use core::cell::Cell;
//! use core::time::Duration;
//! use std::rc::Rc;
//! use understory_gesture::scheduler::Scheduler;
//!
//! let scheduler = Scheduler::new();
//! let fired = Rc::new(Cell::new(false));
//! let flag = fired.clone();
//! let handle = scheduler.run_after(Duration::from_millis(100), move || flag.set(true));
//! scheduler.advance_by(Duration::from_millis(99));
//! assert!(!fired.get() && handle.is_active());
//! scheduler.advance_by(Duration::from_millis(1));
//! assert!(fired.get() && !handle.is_active());
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

type Task = Box<dyn FnOnce()>;

struct TimerEntry {
    id: u64,
    deadline: Duration,
    callback: Task,
}

/// Single-threaded microtask queue and timer wheel over a virtual clock.
pub struct Scheduler {
    now: Cell<Duration>,
    microtasks: RefCell<VecDeque<Task>>,
    timers: RefCell<Vec<TimerEntry>>,
    next_timer_id: Cell<u64>,
    me: Weak<Self>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now.get())
            .field("microtasks", &self.microtasks.borrow().len())
            .field("timers", &self.timers.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler whose clock starts at zero.
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            now: Cell::new(Duration::ZERO),
            microtasks: RefCell::new(VecDeque::new()),
            timers: RefCell::new(Vec::new()),
            next_timer_id: Cell::new(0),
            me: me.clone(),
        })
    }

    /// Current time on the virtual clock.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Queue `task` to run at the next [`flush_microtasks`](Self::flush_microtasks).
    pub fn schedule_microtask(&self, task: impl FnOnce() + 'static) {
        self.microtasks.borrow_mut().push_back(Box::new(task));
    }

    /// Number of queued microtasks.
    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    /// Run queued microtasks until the queue is empty, including ones queued while flushing.
    pub fn flush_microtasks(&self) {
        loop {
            let Some(task) = self.microtasks.borrow_mut().pop_front() else {
                break;
            };
            task();
        }
    }

    /// Run `callback` once `delay` has elapsed on the clock.
    pub fn run_after(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
        let id = self.next_timer_id.get();
        self.next_timer_id.set(id + 1);
        self.timers.borrow_mut().push(TimerEntry {
            id,
            deadline: self.now.get() + delay,
            callback: Box::new(callback),
        });
        TimerHandle {
            id,
            scheduler: self.me.clone(),
        }
    }

    /// Number of armed timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Deadline of the earliest armed timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.borrow().iter().map(|t| t.deadline).min()
    }

    /// Advance the clock by `delta`, firing due timers.
    pub fn advance_by(&self, delta: Duration) {
        self.advance_to(self.now.get() + delta);
    }

    /// Advance the clock to `time`, firing due timers in order.
    ///
    /// The clock never moves backwards; an earlier `time` only flushes microtasks.
    pub fn advance_to(&self, time: Duration) {
        self.flush_microtasks();
        while let Some(timer) = self.take_due_timer(time) {
            if timer.deadline > self.now.get() {
                self.now.set(timer.deadline);
            }
            (timer.callback)();
            self.flush_microtasks();
        }
        if time > self.now.get() {
            self.now.set(time);
        }
    }

    fn take_due_timer(&self, time: Duration) -> Option<TimerEntry> {
        let mut timers = self.timers.borrow_mut();
        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= time)
            .min_by_key(|(_, t)| (t.deadline, t.id))
            .map(|(i, _)| i)?;
        Some(timers.swap_remove(index))
    }

    fn cancel_timer(&self, id: u64) -> bool {
        let mut timers = self.timers.borrow_mut();
        match timers.iter().position(|t| t.id == id) {
            Some(index) => {
                // Dropping the callback may drop captured recognizers; do it outside the borrow.
                let entry = timers.swap_remove(index);
                drop(timers);
                drop(entry);
                true
            }
            None => false,
        }
    }

    fn is_armed(&self, id: u64) -> bool {
        self.timers.borrow().iter().any(|t| t.id == id)
    }
}

/// Handle to a timer armed with [`Scheduler::run_after`].
///
/// Dropping the handle does not cancel the timer.
pub struct TimerHandle {
    id: u64,
    scheduler: Weak<Scheduler>,
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl TimerHandle {
    /// Cancel the timer.
    ///
    /// Cancelling a timer that already fired or was already cancelled does nothing.
    pub fn cancel(&self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.cancel_timer(self.id);
        }
    }

    /// Whether the timer is still waiting to fire.
    pub fn is_active(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|scheduler| scheduler.is_armed(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn microtasks_run_in_order_including_nested() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = log.clone();
        let inner = s.clone();
        s.schedule_microtask(move || {
            l1.borrow_mut().push(1);
            let l3 = l1.clone();
            inner.schedule_microtask(move || l3.borrow_mut().push(3));
        });
        let l2 = log.clone();
        s.schedule_microtask(move || l2.borrow_mut().push(2));
        assert_eq!(s.pending_microtasks(), 2);
        s.flush_microtasks();
        assert_eq!(*log.borrow(), [1, 2, 3]);
        assert_eq!(s.pending_microtasks(), 0);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30, 'c'), (10, 'a'), (20, 'b'), (10, 'd')] {
            let l = log.clone();
            s.run_after(ms(delay), move || l.borrow_mut().push(tag));
        }
        assert_eq!(s.next_deadline(), Some(ms(10)));
        s.advance_by(ms(25));
        assert_eq!(*log.borrow(), ['a', 'd', 'b']);
        assert_eq!(s.now(), ms(25));
        s.advance_to(ms(100));
        assert_eq!(*log.borrow(), ['a', 'd', 'b', 'c']);
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn timer_sees_its_deadline_as_now() {
        let s = Scheduler::new();
        let seen = Rc::new(Cell::new(Duration::ZERO));
        let (seen2, s2) = (seen.clone(), s.clone());
        s.run_after(ms(40), move || seen2.set(s2.now()));
        s.advance_by(ms(100));
        assert_eq!(seen.get(), ms(40));
        assert_eq!(s.now(), ms(100));
    }

    #[test]
    fn cancel_is_idempotent() {
        let s = Scheduler::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let handle = s.run_after(ms(10), move || f.set(f.get() + 1));
        assert!(handle.is_active(), "armed");
        handle.cancel();
        handle.cancel();
        assert!(!handle.is_active(), "cancelled");
        s.advance_by(ms(20));
        assert_eq!(fired.get(), 0);

        let f = fired.clone();
        let handle = s.run_after(ms(10), move || f.set(f.get() + 1));
        s.advance_by(ms(10));
        handle.cancel();
        assert_eq!(fired.get(), 1, "cancel after firing is a no-op");
    }

    #[test]
    fn microtasks_from_timers_run_before_next_timer() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, s1) = (log.clone(), s.clone());
        s.run_after(ms(5), move || {
            l1.borrow_mut().push("timer 1");
            let l = l1.clone();
            s1.schedule_microtask(move || l.borrow_mut().push("microtask"));
        });
        let l2 = log.clone();
        s.run_after(ms(5), move || l2.borrow_mut().push("timer 2"));
        s.advance_by(ms(5));
        assert_eq!(*log.borrow(), ["timer 1", "microtask", "timer 2"]);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let s = Scheduler::new();
        s.advance_to(ms(50));
        s.advance_to(ms(20));
        assert_eq!(s.now(), ms(50));
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture arena: decides which recognizer owns a pointer.
//!
//! ## Overview
//!
//! Every live pointer gets one arena. Recognizers interested in the pointer join it with
//! [`GestureArenaManager::add`] while it is open, and keep the returned
//! [`GestureArenaEntry`] to later accept or reject the pointer for themselves. The arena
//! converges on exactly one winner, or none:
//!
//! - A member that accepts while the arena is open becomes the eager winner. Only the first
//!   such member is remembered.
//! - Once the arena is closed (after the pointer-down dispatch), a member that accepts wins
//!   immediately and every other member is rejected.
//! - Rejecting members leave. If a single member remains in a closed arena it wins by
//!   default on the next microtask; an empty arena is discarded.
//! - Sweeping (on pointer up) forces a decision: the first remaining member wins.
//!
//! A held arena postpones its sweep until [`GestureArenaManager::release`]. Double-tap
//! recognizers use this to keep the pointer alive between the first and second tap.
//!
//! ## Diagnostics
//!
//! Each transition logs one line at `debug` level, for example
//! `Gesture arena 12   ❙ Closing with 2 members.`.
//!
//! ```
//! use core::cell::RefCell;
//! use std::rc::Rc;
//! use understory_gesture::arena::{GestureArenaManager, GestureArenaMember, GestureDisposition};
//! use understory_gesture::events::PointerId;
//! use understory_gesture::scheduler::Scheduler;
//!
//! #[derive(Debug)]
//! struct Member(&'static str, Rc<RefCell<Vec<String>>>);
//!
//! impl GestureArenaMember for Member {
//!     fn accept_gesture(&self, _: PointerId) {
//!         self.1.borrow_mut().push(format!("{} accepted", self.0));
//!     }
//!     fn reject_gesture(&self, _: PointerId) {
//!         self.1.borrow_mut().push(format!("{} rejected", self.0));
//!     }
//! }
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let arena = GestureArenaManager::new(Scheduler::new());
//! let pointer = PointerId(11);
//! let a = arena.add(pointer, Rc::new(Member("a", log.clone())));
//! let _b = arena.add(pointer, Rc::new(Member("b", log.clone())));
//! arena.close(pointer);
//! a.resolve(GestureDisposition::Accepted);
//! assert_eq!(*log.borrow(), ["b rejected", "a accepted"]);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::events::PointerId;
use crate::scheduler::Scheduler;
use crate::team::CombiningMember;

/// Whether a member wants the pointer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GestureDisposition {
    /// The member claims the pointer.
    Accepted,
    /// The member gives the pointer up.
    Rejected,
}

/// Something that competes in a gesture arena.
///
/// The arena calls exactly one of these methods per pointer the member joined for.
pub trait GestureArenaMember: fmt::Debug {
    /// The member won the arena for `pointer`.
    fn accept_gesture(&self, pointer: PointerId);

    /// The member lost the arena for `pointer`.
    fn reject_gesture(&self, pointer: PointerId);
}

pub(crate) fn same_member(a: &Rc<dyn GestureArenaMember>, b: &Rc<dyn GestureArenaMember>) -> bool {
    core::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

#[derive(Clone)]
enum EntryTarget {
    Arena(Weak<GestureArenaManager>),
    Team(Weak<CombiningMember>),
}

/// A member's handle on the arena for one pointer.
///
/// Entries are cheap to clone and hold only weak references, so keeping one past the
/// arena's resolution is harmless: resolving it then does nothing.
#[derive(Clone)]
pub struct GestureArenaEntry {
    target: EntryTarget,
    pointer: PointerId,
    member: Weak<dyn GestureArenaMember>,
}

impl fmt::Debug for GestureArenaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let via = match self.target {
            EntryTarget::Arena(_) => "arena",
            EntryTarget::Team(_) => "team",
        };
        f.debug_struct("GestureArenaEntry")
            .field("pointer", &self.pointer)
            .field("via", &via)
            .finish()
    }
}

impl GestureArenaEntry {
    pub(crate) fn for_team(
        combiner: &Rc<CombiningMember>,
        pointer: PointerId,
        member: &Rc<dyn GestureArenaMember>,
    ) -> Self {
        Self {
            target: EntryTarget::Team(Rc::downgrade(combiner)),
            pointer,
            member: Rc::downgrade(member),
        }
    }

    /// The pointer this entry is for.
    pub fn pointer(&self) -> PointerId {
        self.pointer
    }

    /// Accept or reject the pointer on behalf of the member that joined.
    pub fn resolve(&self, disposition: GestureDisposition) {
        let Some(member) = self.member.upgrade() else {
            return;
        };
        match &self.target {
            EntryTarget::Arena(manager) => {
                if let Some(manager) = manager.upgrade() {
                    manager.resolve(self.pointer, &member, disposition);
                }
            }
            EntryTarget::Team(combiner) => {
                if let Some(combiner) = combiner.upgrade() {
                    combiner.resolve(&member, disposition);
                }
            }
        }
    }
}

struct Arena {
    members: Vec<Rc<dyn GestureArenaMember>>,
    is_open: bool,
    is_held: bool,
    has_pending_sweep: bool,
    eager_winner: Option<Rc<dyn GestureArenaMember>>,
    serial: u64,
}

impl fmt::Display for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.members.is_empty() {
            f.write_str("<empty>")?;
        }
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{member:?}")?;
            if self
                .eager_winner
                .as_ref()
                .is_some_and(|w| same_member(w, member))
            {
                f.write_str(" (eager winner)")?;
            }
        }
        if self.is_open {
            f.write_str(" [open]")?;
        }
        if self.is_held {
            f.write_str(" [held]")?;
        }
        if self.has_pending_sweep {
            f.write_str(" [pending sweep]")?;
        }
        Ok(())
    }
}

/// The set of arenas for every live pointer.
pub struct GestureArenaManager {
    arenas: RefCell<BTreeMap<PointerId, Arena>>,
    next_serial: Cell<u64>,
    scheduler: Rc<Scheduler>,
    me: Weak<Self>,
}

impl fmt::Debug for GestureArenaManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arenas = self.arenas.borrow();
        let mut map = f.debug_map();
        for (pointer, arena) in arenas.iter() {
            map.entry(pointer, &format_args!("{arena}"));
        }
        map.finish()
    }
}

fn diagnostic(pointer: PointerId, message: fmt::Arguments<'_>, members: Option<usize>) {
    match members {
        Some(count) => {
            let s = if count == 1 { "" } else { "s" };
            log::debug!("Gesture arena {pointer:<4} ❙ {message} with {count} member{s}.");
        }
        None => log::debug!("Gesture arena {pointer:<4} ❙ {message}"),
    }
}

impl GestureArenaManager {
    /// Create a manager whose default resolutions run as microtasks on `scheduler`.
    pub fn new(scheduler: Rc<Scheduler>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            arenas: RefCell::new(BTreeMap::new()),
            next_serial: Cell::new(0),
            scheduler,
            me: me.clone(),
        })
    }

    /// Add `member` to the arena for `pointer`, opening the arena if needed.
    pub fn add(&self, pointer: PointerId, member: Rc<dyn GestureArenaMember>) -> GestureArenaEntry {
        let entry = GestureArenaEntry {
            target: EntryTarget::Arena(self.me.clone()),
            pointer,
            member: Rc::downgrade(&member),
        };
        let mut arenas = self.arenas.borrow_mut();
        let arena = arenas.entry(pointer).or_insert_with(|| {
            diagnostic(pointer, format_args!("★ Opening new gesture arena."), None);
            let serial = self.next_serial.get();
            self.next_serial.set(serial + 1);
            Arena {
                members: Vec::new(),
                is_open: true,
                is_held: false,
                has_pending_sweep: false,
                eager_winner: None,
                serial,
            }
        });
        debug_assert!(arena.is_open, "cannot add a member to the closed arena {pointer}");
        diagnostic(pointer, format_args!("Adding: {member:?}"), None);
        arena.members.push(member);
        entry
    }

    /// Prevent further members from joining the arena for `pointer`, then try to resolve it.
    pub fn close(&self, pointer: PointerId) {
        {
            let mut arenas = self.arenas.borrow_mut();
            let Some(arena) = arenas.get_mut(&pointer) else {
                return;
            };
            arena.is_open = false;
            diagnostic(pointer, format_args!("Closing"), Some(arena.members.len()));
        }
        self.try_to_resolve(pointer);
    }

    /// Force resolution of the arena for `pointer`: the first member wins.
    ///
    /// A held arena records the sweep and performs it on [`release`](Self::release).
    pub fn sweep(&self, pointer: PointerId) {
        let arena = {
            let mut arenas = self.arenas.borrow_mut();
            let Some(arena) = arenas.get_mut(&pointer) else {
                return;
            };
            debug_assert!(!arena.is_open, "sweeping the open arena {pointer}");
            if arena.is_held {
                arena.has_pending_sweep = true;
                diagnostic(pointer, format_args!("Delaying sweep"), Some(arena.members.len()));
                return;
            }
            diagnostic(pointer, format_args!("Sweeping"), Some(arena.members.len()));
            arenas.remove(&pointer)
        };
        let Some(arena) = arena else {
            return;
        };
        let mut members = arena.members.into_iter();
        if let Some(winner) = members.next() {
            diagnostic(pointer, format_args!("Winner: {winner:?}"), None);
            winner.accept_gesture(pointer);
            for member in members {
                member.reject_gesture(pointer);
            }
        }
    }

    /// Postpone any sweep of the arena for `pointer` until [`release`](Self::release).
    pub fn hold(&self, pointer: PointerId) {
        let mut arenas = self.arenas.borrow_mut();
        let Some(arena) = arenas.get_mut(&pointer) else {
            return;
        };
        debug_assert!(!arena.is_held, "arena {pointer} is already held");
        arena.is_held = true;
        diagnostic(pointer, format_args!("Holding"), Some(arena.members.len()));
    }

    /// Undo [`hold`](Self::hold), performing a sweep that was postponed meanwhile.
    pub fn release(&self, pointer: PointerId) {
        let pending_sweep = {
            let mut arenas = self.arenas.borrow_mut();
            let Some(arena) = arenas.get_mut(&pointer) else {
                return;
            };
            arena.is_held = false;
            diagnostic(pointer, format_args!("Releasing"), Some(arena.members.len()));
            arena.has_pending_sweep
        };
        if pending_sweep {
            self.sweep(pointer);
        }
    }

    /// Whether an arena exists for `pointer`.
    pub fn has_arena(&self, pointer: PointerId) -> bool {
        self.arenas.borrow().contains_key(&pointer)
    }

    /// Number of members in the arena for `pointer`, or `None` if there is no arena.
    pub fn member_count(&self, pointer: PointerId) -> Option<usize> {
        self.arenas.borrow().get(&pointer).map(|a| a.members.len())
    }

    /// Render the arena for `pointer`, such as `"Tap, Drag (eager winner) [open]"`.
    pub fn debug_describe(&self, pointer: PointerId) -> Option<String> {
        self.arenas.borrow().get(&pointer).map(|a| a.to_string())
    }

    fn resolve(
        &self,
        pointer: PointerId,
        member: &Rc<dyn GestureArenaMember>,
        disposition: GestureDisposition,
    ) {
        let accepted = disposition == GestureDisposition::Accepted;
        let resolve_now = {
            let mut arenas = self.arenas.borrow_mut();
            let Some(arena) = arenas.get_mut(&pointer) else {
                return;
            };
            let verb = if accepted { "Accepting" } else { "Rejecting" };
            diagnostic(pointer, format_args!("{verb}: {member:?}"), None);
            let Some(index) = arena.members.iter().position(|m| same_member(m, member)) else {
                diagnostic(pointer, format_args!("Ignoring non-member: {member:?}"), None);
                return;
            };
            if accepted {
                if arena.is_open {
                    if arena.eager_winner.is_none() {
                        arena.eager_winner = Some(member.clone());
                    }
                    false
                } else {
                    diagnostic(pointer, format_args!("Self-declared winner: {member:?}"), None);
                    true
                }
            } else {
                arena.members.remove(index);
                if arena
                    .eager_winner
                    .as_ref()
                    .is_some_and(|w| same_member(w, member))
                {
                    arena.eager_winner = None;
                }
                !arena.is_open
            }
        };
        if accepted {
            if resolve_now {
                self.resolve_in_favor_of(pointer, member);
            }
        } else {
            member.reject_gesture(pointer);
            if resolve_now {
                self.try_to_resolve(pointer);
            }
        }
    }

    fn try_to_resolve(&self, pointer: PointerId) {
        let eager_winner = {
            let mut arenas = self.arenas.borrow_mut();
            let Some(arena) = arenas.get(&pointer) else {
                return;
            };
            debug_assert!(!arena.is_open, "resolving the open arena {pointer}");
            match arena.members.len() {
                0 => {
                    arenas.remove(&pointer);
                    diagnostic(pointer, format_args!("Arena empty."), None);
                    return;
                }
                1 => {
                    let serial = arena.serial;
                    let me = self.me.clone();
                    self.scheduler.schedule_microtask(move || {
                        if let Some(manager) = me.upgrade() {
                            manager.resolve_by_default(pointer, serial);
                        }
                    });
                    return;
                }
                _ => arena.eager_winner.clone(),
            }
        };
        if let Some(winner) = eager_winner {
            diagnostic(pointer, format_args!("Eager winner: {winner:?}"), None);
            self.resolve_in_favor_of(pointer, &winner);
        }
    }

    fn resolve_by_default(&self, pointer: PointerId, serial: u64) {
        let winner = {
            let mut arenas = self.arenas.borrow_mut();
            let still_pending = arenas
                .get(&pointer)
                .is_some_and(|a| a.serial == serial && !a.is_open && a.members.len() == 1);
            if !still_pending {
                return;
            }
            arenas.remove(&pointer).and_then(|a| a.members.into_iter().next())
        };
        if let Some(winner) = winner {
            diagnostic(pointer, format_args!("Default winner: {winner:?}"), None);
            winner.accept_gesture(pointer);
        }
    }

    fn resolve_in_favor_of(&self, pointer: PointerId, winner: &Rc<dyn GestureArenaMember>) {
        let Some(arena) = self.arenas.borrow_mut().remove(&pointer) else {
            return;
        };
        debug_assert!(
            arena
                .eager_winner
                .as_ref()
                .is_none_or(|w| same_member(w, winner)),
            "arena {pointer} resolved against its eager winner"
        );
        for member in &arena.members {
            if !same_member(member, winner) {
                member.reject_gesture(pointer);
            }
        }
        winner.accept_gesture(pointer);
    }
}

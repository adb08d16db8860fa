// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture arena teams: several recognizers that compete as one.
//!
//! ## Overview
//!
//! Recognizers on the same team join a pointer's arena through one shared combining
//! member. Against the rest of the arena the team wins or loses as a unit; inside the
//! team the winner is, in order of precedence:
//!
//! 1. the [captain](GestureArenaTeam::set_captain), if one is set;
//! 2. the first member that accepted for itself;
//! 3. the first member that joined.
//!
//! When every member of the team has rejected for itself, the team rejects upstream.
//!
//! A typical use is a horizontal and a vertical drag recognizer on the same widget: on
//! a team, the first one to pass its slop wins without the other being able to block it.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::arena::{
    GestureArenaEntry, GestureArenaManager, GestureArenaMember, GestureDisposition, same_member,
};
use crate::events::PointerId;

/// The single arena member that stands in for a whole team on one pointer.
pub(crate) struct CombiningMember {
    owner: Weak<GestureArenaTeam>,
    pointer: PointerId,
    members: RefCell<Vec<Rc<dyn GestureArenaMember>>>,
    resolved: Cell<bool>,
    winner: RefCell<Option<Rc<dyn GestureArenaMember>>>,
    entry: RefCell<Option<GestureArenaEntry>>,
}

impl fmt::Debug for CombiningMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.try_borrow().map(|m| m.len()).ok();
        f.debug_struct("CombiningGestureArenaMember")
            .field("pointer", &self.pointer)
            .field("members", &members)
            .field("resolved", &self.resolved.get())
            .finish_non_exhaustive()
    }
}

impl GestureArenaMember for CombiningMember {
    fn accept_gesture(&self, pointer: PointerId) {
        debug_assert_eq!(self.pointer, pointer, "combiner accepted for another pointer");
        self.close();
        let members = self.members.borrow().clone();
        let winner = {
            let mut winner = self.winner.borrow_mut();
            if winner.is_none() {
                *winner = self
                    .captain()
                    .or_else(|| members.first().cloned());
            }
            winner.clone()
        };
        let Some(winner) = winner else {
            return;
        };
        for member in &members {
            if !same_member(member, &winner) {
                member.reject_gesture(pointer);
            }
        }
        winner.accept_gesture(pointer);
    }

    fn reject_gesture(&self, pointer: PointerId) {
        debug_assert_eq!(self.pointer, pointer, "combiner rejected for another pointer");
        self.close();
        let members = self.members.borrow().clone();
        for member in &members {
            member.reject_gesture(pointer);
        }
    }
}

impl CombiningMember {
    fn captain(&self) -> Option<Rc<dyn GestureArenaMember>> {
        self.owner.upgrade().and_then(|team| team.captain())
    }

    fn close(&self) {
        debug_assert!(!self.resolved.get(), "combiner resolved twice");
        self.resolved.set(true);
        if let Some(team) = self.owner.upgrade() {
            let removed = team.combiners.borrow_mut().remove(&self.pointer);
            drop(removed);
        }
    }

    pub(crate) fn resolve(
        &self,
        member: &Rc<dyn GestureArenaMember>,
        disposition: GestureDisposition,
    ) {
        if self.resolved.get() {
            return;
        }
        match disposition {
            GestureDisposition::Rejected => {
                let now_empty = {
                    let mut members = self.members.borrow_mut();
                    let Some(index) = members.iter().position(|m| same_member(m, member)) else {
                        return;
                    };
                    members.remove(index);
                    members.is_empty()
                };
                member.reject_gesture(self.pointer);
                if now_empty {
                    self.resolve_upstream(disposition);
                }
            }
            GestureDisposition::Accepted => {
                {
                    let mut winner = self.winner.borrow_mut();
                    if winner.is_none() {
                        *winner = Some(self.captain().unwrap_or_else(|| member.clone()));
                    }
                }
                self.resolve_upstream(disposition);
            }
        }
    }

    fn resolve_upstream(&self, disposition: GestureDisposition) {
        let entry = self.entry.borrow().clone();
        if let Some(entry) = entry {
            entry.resolve(disposition);
        }
    }
}

/// A group of recognizers that compete in the arena as one member.
pub struct GestureArenaTeam {
    arena: Rc<GestureArenaManager>,
    combiners: RefCell<BTreeMap<PointerId, Rc<CombiningMember>>>,
    captain: RefCell<Option<Weak<dyn GestureArenaMember>>>,
    me: Weak<Self>,
}

impl fmt::Debug for GestureArenaTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureArenaTeam")
            .field(
                "pointers",
                &self.combiners.borrow().keys().collect::<Vec<_>>(),
            )
            .field("has_captain", &self.captain().is_some())
            .finish_non_exhaustive()
    }
}

impl GestureArenaTeam {
    /// Create a team that joins arenas managed by `arena`.
    pub fn new(arena: &Rc<GestureArenaManager>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            arena: arena.clone(),
            combiners: RefCell::new(BTreeMap::new()),
            captain: RefCell::new(None),
            me: me.clone(),
        })
    }

    /// The member that wins whenever the team wins, if any.
    pub fn captain(&self) -> Option<Rc<dyn GestureArenaMember>> {
        self.captain.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Set or clear the captain.
    ///
    /// The team keeps only a weak reference; a dropped captain counts as no captain.
    pub fn set_captain(&self, captain: Option<Rc<dyn GestureArenaMember>>) {
        *self.captain.borrow_mut() = captain.as_ref().map(Rc::downgrade);
    }

    /// Add `member` to the team's combined entry for `pointer`.
    ///
    /// The first member added for a pointer registers the team with the arena.
    pub fn add(&self, pointer: PointerId, member: Rc<dyn GestureArenaMember>) -> GestureArenaEntry {
        let existing = self.combiners.borrow().get(&pointer).cloned();
        let combiner = existing.unwrap_or_else(|| {
            let combiner = Rc::new(CombiningMember {
                owner: self.me.clone(),
                pointer,
                members: RefCell::new(Vec::new()),
                resolved: Cell::new(false),
                winner: RefCell::new(None),
                entry: RefCell::new(None),
            });
            self.combiners.borrow_mut().insert(pointer, combiner.clone());
            combiner
        });
        debug_assert!(!combiner.resolved.get(), "adding to a resolved team entry");
        combiner.members.borrow_mut().push(member.clone());
        if combiner.entry.borrow().is_none() {
            let upstream = self.arena.add(pointer, combiner.clone());
            *combiner.entry.borrow_mut() = Some(upstream);
        }
        GestureArenaEntry::for_team(&combiner, pointer, &member)
    }
}

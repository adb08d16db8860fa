// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Normalized pointer events.
//!
//! ## Overview
//!
//! Every event the engine sees is a [`PointerEvent`] in logical pixels. The
//! [`PointerEventKind`] says what changed; the remaining fields describe where, when, and on
//! which device. Events are usually produced by the
//! [`PointerDataConverter`](crate::converter::PointerDataConverter) from raw device samples,
//! but tests and hosts with their own normalization can build them directly:
//!
//! ```
//! use core::time::Duration;
//! use kurbo::{Point, Vec2};
//! use understory_gesture::events::{PointerEvent, PointerEventKind, PointerId};
//!
//! let down = PointerEvent::down(PointerId(11), Point::new(10.0, 10.0));
//! let moved = PointerEvent::moved(PointerId(11), Point::new(14.0, 10.0), Vec2::new(4.0, 0.0))
//!     .with_time_stamp(Duration::from_millis(16));
//! assert!(down.down && moved.down);
//! assert_eq!(moved.kind, PointerEventKind::Move);
//! ```
//!
//! ## Pointer ids
//!
//! Pointer ids are scoped to one continuous interaction, from down to up or cancel. Ids
//! below [`PointerId::FIRST_DYNAMIC`] are reserved for synthetic pointers; the mouse wheel
//! always uses [`PointerId::SCROLL`].

use core::fmt;
use core::time::Duration;

use kurbo::{Point, Vec2};

/// Identifier of one pointer interaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PointerId(pub u32);

impl PointerId {
    /// Synthetic pointer used for mouse-wheel scroll signals.
    pub const SCROLL: Self = Self(5);

    /// First id handed out for real pointer interactions; lower ids are reserved.
    pub const FIRST_DYNAMIC: u32 = 10;

    /// Whether this id lies in the reserved synthetic range.
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }
}

impl fmt::Display for PointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The kind of input device behind a pointer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerDeviceKind {
    /// A touch-based pointer device.
    #[default]
    Touch,
    /// A mouse-based pointer device.
    Mouse,
    /// A pointer device with a stylus.
    Stylus,
    /// A pointer device with a stylus that has been inverted.
    InvertedStylus,
    /// An unknown pointer device.
    Unknown,
}

bitflags::bitflags! {
    /// Buttons pressed while a pointer event was generated.
    ///
    /// Touch contacts and pen tips report [`PRIMARY`](Self::PRIMARY).
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PointerButtons: u8 {
        /// Primary mouse button, touch contact, or stylus tip.
        const PRIMARY = 1 << 0;
        /// Secondary mouse button or stylus barrel button.
        const SECONDARY = 1 << 1;
        /// Middle mouse button.
        const MIDDLE = 1 << 2;
        /// Back navigation button.
        const BACK = 1 << 3;
        /// Forward navigation button.
        const FORWARD = 1 << 4;
    }
}

/// What changed for the pointer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PointerEventKind {
    /// The device became known to the system.
    Added,
    /// The device is no longer tracked.
    Removed,
    /// The pointer moved without being in contact.
    Hover,
    /// A hovering pointer arrived over a hit target.
    Enter,
    /// A hovering pointer left a hit target, or its device went away.
    Exit,
    /// The pointer made contact.
    Down,
    /// The pointer moved while in contact.
    Move,
    /// The pointer stopped making contact.
    Up,
    /// The input from the pointer is no longer directed at this receiver.
    Cancel,
    /// A discrete scroll signal, such as one mouse-wheel notch.
    Scroll {
        /// Scroll amount in logical pixels.
        scroll_delta: Vec2,
    },
    /// A continuous scroll sequence started.
    ScrollStart,
    /// A continuous scroll sequence progressed.
    Scrolling,
    /// A continuous scroll sequence ended.
    ScrollEnd,
}

/// A normalized pointer event in logical pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerEvent {
    /// What changed.
    pub kind: PointerEventKind,
    /// Time the event was generated, relative to an arbitrary epoch.
    pub time_stamp: Duration,
    /// The interaction this event belongs to.
    pub pointer: PointerId,
    /// Device that generated the event.
    pub device: u32,
    /// Kind of device that generated the event.
    pub device_kind: PointerDeviceKind,
    /// Position in logical pixels.
    pub position: Point,
    /// Movement since the previous event for this pointer.
    pub delta: Vec2,
    /// Buttons pressed at the time of the event.
    pub buttons: PointerButtons,
    /// Whether the pointer is in contact.
    pub down: bool,
    /// Whether the event was synthesized rather than reported by the device.
    ///
    /// Synthesized moves are excluded from velocity tracking.
    pub synthesized: bool,
}

impl PointerEvent {
    /// Create an event of `kind` for `pointer` at `position`.
    ///
    /// `down` and `buttons` follow the kind: contact kinds report
    /// [`PointerButtons::PRIMARY`] while in contact.
    pub fn new(kind: PointerEventKind, pointer: PointerId, position: Point) -> Self {
        let down = matches!(kind, PointerEventKind::Down | PointerEventKind::Move);
        Self {
            kind,
            time_stamp: Duration::ZERO,
            pointer,
            device: 0,
            device_kind: PointerDeviceKind::Touch,
            position,
            delta: Vec2::ZERO,
            buttons: if down {
                PointerButtons::PRIMARY
            } else {
                PointerButtons::empty()
            },
            down,
            synthesized: false,
        }
    }

    /// A pointer down.
    pub fn down(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Down, pointer, position)
    }

    /// A pointer move while in contact.
    pub fn moved(pointer: PointerId, position: Point, delta: Vec2) -> Self {
        Self::new(PointerEventKind::Move, pointer, position).with_delta(delta)
    }

    /// A pointer up.
    pub fn up(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Up, pointer, position)
    }

    /// A pointer cancel.
    pub fn cancel(pointer: PointerId, position: Point) -> Self {
        Self::new(PointerEventKind::Cancel, pointer, position)
    }

    /// A hover at `position`.
    pub fn hover(position: Point) -> Self {
        Self::new(PointerEventKind::Hover, PointerId::default(), position)
            .with_device_kind(PointerDeviceKind::Mouse)
    }

    /// A mouse-wheel scroll signal on the reserved scroll pointer.
    pub fn scroll(position: Point, scroll_delta: Vec2) -> Self {
        Self::new(
            PointerEventKind::Scroll { scroll_delta },
            PointerId::SCROLL,
            position,
        )
        .with_device_kind(PointerDeviceKind::Mouse)
    }

    /// Set the time stamp.
    #[must_use]
    pub fn with_time_stamp(mut self, time_stamp: Duration) -> Self {
        self.time_stamp = time_stamp;
        self
    }

    /// Set the device id.
    #[must_use]
    pub fn with_device(mut self, device: u32) -> Self {
        self.device = device;
        self
    }

    /// Set the device kind.
    #[must_use]
    pub fn with_device_kind(mut self, device_kind: PointerDeviceKind) -> Self {
        self.device_kind = device_kind;
        self
    }

    /// Set the movement delta.
    #[must_use]
    pub fn with_delta(mut self, delta: Vec2) -> Self {
        self.delta = delta;
        self
    }

    /// Set the pressed buttons.
    #[must_use]
    pub fn with_buttons(mut self, buttons: PointerButtons) -> Self {
        self.buttons = buttons;
        self
    }

    /// Mark the event as synthesized.
    #[must_use]
    pub fn synthesized(mut self) -> Self {
        self.synthesized = true;
        self
    }

    /// Whether this is an up or cancel event, after which the pointer id is dead.
    pub fn ends_pointer(&self) -> bool {
        matches!(self.kind, PointerEventKind::Up | PointerEventKind::Cancel)
    }

    /// Whether this is one of the continuous scroll kinds.
    pub fn is_scroll_sequence(&self) -> bool {
        matches!(
            self.kind,
            PointerEventKind::ScrollStart | PointerEventKind::Scrolling | PointerEventKind::ScrollEnd
        )
    }

    /// The scroll amount of a [`PointerEventKind::Scroll`] event.
    pub fn scroll_delta(&self) -> Option<Vec2> {
        match self.kind {
            PointerEventKind::Scroll { scroll_delta } => Some(scroll_delta),
            _ => None,
        }
    }
}

impl fmt::Display for PointerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}(pointer: {}, position: ({:.1}, {:.1}))",
            self.kind, self.pointer, self.position.x, self.position.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_kinds_default_to_primary_button() {
        let down = PointerEvent::down(PointerId(11), Point::ORIGIN);
        assert!(down.down, "down events are in contact");
        assert_eq!(down.buttons, PointerButtons::PRIMARY);

        let up = PointerEvent::up(PointerId(11), Point::ORIGIN);
        assert!(!up.down, "up events are not in contact");
        assert!(up.buttons.is_empty(), "up events report no buttons");
        assert!(up.ends_pointer(), "up ends the pointer");
    }

    #[test]
    fn scroll_uses_reserved_pointer() {
        let e = PointerEvent::scroll(Point::new(3.0, 4.0), Vec2::new(0.0, 20.0));
        assert_eq!(e.pointer, PointerId::SCROLL);
        assert!(e.pointer.is_reserved(), "scroll pointer is in the reserved range");
        assert_eq!(e.scroll_delta(), Some(Vec2::new(0.0, 20.0)));
        assert_eq!(e.device_kind, PointerDeviceKind::Mouse);
        assert!(!PointerId(PointerId::FIRST_DYNAMIC).is_reserved(), "first dynamic id");
    }

    #[test]
    fn builders_set_fields() {
        let e = PointerEvent::moved(PointerId(12), Point::new(1.0, 2.0), Vec2::new(1.0, 0.0))
            .with_time_stamp(Duration::from_millis(5))
            .with_device(3)
            .with_buttons(PointerButtons::SECONDARY)
            .synthesized();
        assert_eq!(e.time_stamp, Duration::from_millis(5));
        assert_eq!(e.device, 3);
        assert_eq!(e.buttons, PointerButtons::SECONDARY);
        assert!(e.synthesized, "marked synthesized");
        assert_eq!(e.to_string(), "Move(pointer: 12, position: (1.0, 2.0))");
    }
}

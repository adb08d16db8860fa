// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raw device samples to logical-pixel pointer events.
//!
//! ## Overview
//!
//! Platforms report input per device, in physical pixels, with no notion of an
//! interaction. [`PointerDataConverter`] keeps a little state per device and turns a batch
//! of [`PointerData`] samples into [`PointerEvent`]s:
//!
//! - Positions and scroll deltas are divided by the device pixel ratio.
//! - Every down starts a new interaction with a fresh [`PointerId`], counting up from
//!   [`PointerId::FIRST_DYNAMIC`]. Wheel signals use the reserved [`PointerId::SCROLL`].
//! - Moves report the delta since the previous sample; moves of a device that is not down
//!   are dropped.
//! - An up or cancel at a new position is preceded by a synthesized move, so recognizers
//!   see the final position before the pointer ends.
//! - Removing a device that is still down cancels its interaction first.
//!
//! ```
//! use kurbo::Point;
//! use understory_gesture::converter::{PointerChange, PointerData, PointerDataConverter};
//! use understory_gesture::events::{PointerEventKind, PointerId};
//!
//! let mut converter = PointerDataConverter::new();
//! let events = converter.expand(
//!     &[
//!         PointerData::new(PointerChange::Down, 0, Point::new(20.0, 20.0)),
//!         PointerData::new(PointerChange::Up, 0, Point::new(24.0, 20.0)),
//!     ],
//!     2.0,
//! );
//! let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
//! assert_eq!(kinds, [PointerEventKind::Down, PointerEventKind::Move, PointerEventKind::Up]);
//! assert_eq!(events[0].pointer, PointerId(11));
//! assert_eq!(events[2].position, Point::new(12.0, 10.0));
//! ```

use core::time::Duration;
use std::collections::BTreeMap;

use kurbo::{Point, Vec2};

use crate::events::{PointerButtons, PointerDeviceKind, PointerEvent, PointerEventKind, PointerId};

/// What a device reported.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PointerChange {
    /// The device became available.
    Add,
    /// The device went away.
    Remove,
    /// The device moved without contact.
    Hover,
    /// The device made contact.
    Down,
    /// The device moved while in contact.
    Move,
    /// The device stopped making contact.
    Up,
    /// The platform abandoned the interaction.
    Cancel,
    /// A discrete wheel signal.
    Scroll {
        /// Scroll amount in physical pixels.
        scroll_delta: Vec2,
    },
    /// A continuous scroll sequence started.
    ScrollStart,
    /// A continuous scroll sequence progressed.
    Scrolling,
    /// A continuous scroll sequence ended.
    ScrollEnd,
}

/// One raw sample from a device.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerData {
    /// Time the sample was taken.
    pub time_stamp: Duration,
    /// What changed.
    pub change: PointerChange,
    /// Kind of device.
    pub device_kind: PointerDeviceKind,
    /// Platform device id.
    pub device: u32,
    /// Position in physical pixels.
    pub physical_position: Point,
    /// Buttons pressed; empty means the device default.
    pub buttons: PointerButtons,
}

impl PointerData {
    /// A touch sample with no time stamp and default buttons.
    pub fn new(change: PointerChange, device: u32, physical_position: Point) -> Self {
        Self {
            time_stamp: Duration::ZERO,
            change,
            device_kind: PointerDeviceKind::Touch,
            device,
            physical_position,
            buttons: PointerButtons::empty(),
        }
    }

    /// Set the time stamp.
    #[must_use]
    pub fn with_time_stamp(mut self, time_stamp: Duration) -> Self {
        self.time_stamp = time_stamp;
        self
    }

    /// Set the device kind.
    #[must_use]
    pub fn with_device_kind(mut self, device_kind: PointerDeviceKind) -> Self {
        self.device_kind = device_kind;
        self
    }

    /// Set the pressed buttons.
    #[must_use]
    pub fn with_buttons(mut self, buttons: PointerButtons) -> Self {
        self.buttons = buttons;
        self
    }
}

#[derive(Debug)]
struct DeviceState {
    pointer: PointerId,
    down: bool,
    last_position: Point,
    buttons: PointerButtons,
}

impl DeviceState {
    fn new(position: Point) -> Self {
        Self {
            pointer: PointerId::default(),
            down: false,
            last_position: position,
            buttons: PointerButtons::empty(),
        }
    }
}

/// Per-device state for turning [`PointerData`] into [`PointerEvent`]s.
#[derive(Debug)]
pub struct PointerDataConverter {
    devices: BTreeMap<u32, DeviceState>,
    pointer_count: u32,
}

impl Default for PointerDataConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerDataConverter {
    /// Create a converter with no known devices.
    pub fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
            pointer_count: PointerId::FIRST_DYNAMIC,
        }
    }

    /// Forget every device.
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Whether `device` is currently in contact.
    pub fn is_down(&self, device: u32) -> bool {
        self.devices.get(&device).is_some_and(|s| s.down)
    }

    /// Convert a batch of samples taken at `device_pixel_ratio`.
    pub fn expand(&mut self, data: &[PointerData], device_pixel_ratio: f64) -> Vec<PointerEvent> {
        debug_assert!(
            device_pixel_ratio > 0.0,
            "device pixel ratio must be positive, got {device_pixel_ratio}"
        );
        let mut events = Vec::with_capacity(data.len());
        for datum in data {
            self.expand_one(datum, device_pixel_ratio, &mut events);
        }
        events
    }

    fn expand_one(&mut self, datum: &PointerData, ratio: f64, out: &mut Vec<PointerEvent>) {
        let position = (datum.physical_position.to_vec2() / ratio).to_point();
        let event = |kind, pointer| {
            PointerEvent::new(kind, pointer, position)
                .with_time_stamp(datum.time_stamp)
                .with_device(datum.device)
                .with_device_kind(datum.device_kind)
        };
        match datum.change {
            PointerChange::Add => {
                debug_assert!(
                    !self.devices.contains_key(&datum.device),
                    "device {} added twice",
                    datum.device
                );
                let state = self
                    .devices
                    .entry(datum.device)
                    .or_insert_with(|| DeviceState::new(position));
                out.push(event(PointerEventKind::Added, state.pointer));
            }
            PointerChange::Remove => {
                let Some(state) = self.devices.remove(&datum.device) else {
                    return;
                };
                if state.down {
                    out.push(event(PointerEventKind::Cancel, state.pointer).synthesized());
                }
                out.push(event(PointerEventKind::Removed, state.pointer));
            }
            PointerChange::Hover => {
                let state = self
                    .devices
                    .entry(datum.device)
                    .or_insert_with(|| DeviceState::new(position));
                let delta = position - state.last_position;
                state.last_position = position;
                out.push(event(PointerEventKind::Hover, state.pointer).with_delta(delta));
            }
            PointerChange::Down => {
                let state = self
                    .devices
                    .entry(datum.device)
                    .or_insert_with(|| DeviceState::new(position));
                if state.down {
                    return;
                }
                state.last_position = position;
                self.pointer_count += 1;
                state.pointer = PointerId(self.pointer_count);
                state.down = true;
                state.buttons = if datum.buttons.is_empty() {
                    PointerButtons::PRIMARY
                } else {
                    datum.buttons
                };
                out.push(event(PointerEventKind::Down, state.pointer).with_buttons(state.buttons));
            }
            PointerChange::Move => {
                let Some(state) = self.devices.get_mut(&datum.device) else {
                    return;
                };
                if !state.down {
                    return;
                }
                let delta = position - state.last_position;
                state.last_position = position;
                if !datum.buttons.is_empty() {
                    state.buttons = datum.buttons;
                }
                out.push(
                    event(PointerEventKind::Move, state.pointer)
                        .with_delta(delta)
                        .with_buttons(state.buttons),
                );
            }
            PointerChange::Up | PointerChange::Cancel => {
                let Some(state) = self.devices.get_mut(&datum.device) else {
                    return;
                };
                if !state.down {
                    return;
                }
                if position != state.last_position {
                    let delta = position - state.last_position;
                    state.last_position = position;
                    out.push(
                        event(PointerEventKind::Move, state.pointer)
                            .with_delta(delta)
                            .with_buttons(state.buttons)
                            .synthesized(),
                    );
                }
                state.down = false;
                let kind = if datum.change == PointerChange::Up {
                    PointerEventKind::Up
                } else {
                    PointerEventKind::Cancel
                };
                out.push(event(kind, state.pointer));
            }
            PointerChange::Scroll { scroll_delta } => {
                let state = self
                    .devices
                    .entry(datum.device)
                    .or_insert_with(|| DeviceState::new(position));
                state.last_position = position;
                let scroll_delta = scroll_delta / ratio;
                out.push(event(PointerEventKind::Scroll { scroll_delta }, PointerId::SCROLL));
            }
            PointerChange::ScrollStart | PointerChange::Scrolling | PointerChange::ScrollEnd => {
                let state = self
                    .devices
                    .entry(datum.device)
                    .or_insert_with(|| DeviceState::new(position));
                let delta = position - state.last_position;
                state.last_position = position;
                let kind = match datum.change {
                    PointerChange::ScrollStart => PointerEventKind::ScrollStart,
                    PointerChange::Scrolling => PointerEventKind::Scrolling,
                    _ => PointerEventKind::ScrollEnd,
                };
                out.push(event(kind, PointerId::SCROLL).with_delta(delta));
            }
        }
    }
}

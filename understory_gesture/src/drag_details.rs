// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Details passed to drag callbacks.

use core::time::Duration;

use kurbo::{Point, Vec2};
use understory_velocity::tracker::Velocity;

/// Where a drag reports its start.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DragStartBehavior {
    /// Start at the down position. Movement made while the arena was undecided is
    /// reported as the first update.
    #[default]
    Down,
    /// Start at the position where the drag was recognized.
    Start,
}

/// A pointer that may start a drag went down.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DragDownDetails {
    /// Down position.
    pub global_position: Point,
}

/// A drag started.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DragStartDetails {
    /// Time stamp of the event that started the drag.
    pub source_time_stamp: Option<Duration>,
    /// Where the drag started.
    pub global_position: Point,
}

/// A drag moved.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DragUpdateDetails {
    /// Time stamp of the event that moved the drag.
    pub source_time_stamp: Option<Duration>,
    /// Movement since the previous update, restricted to the drag axis.
    pub delta: Vec2,
    /// Signed movement along the drag axis, for single-axis drags.
    pub primary_delta: Option<f64>,
    /// Current pointer position.
    pub global_position: Point,
    /// Whether the movement came from a mouse wheel.
    pub is_scroll: bool,
}

impl DragUpdateDetails {
    /// An update moving by `delta` to `global_position`.
    pub fn new(delta: Vec2, global_position: Point) -> Self {
        Self {
            source_time_stamp: None,
            delta,
            primary_delta: None,
            global_position,
            is_scroll: false,
        }
    }
}

/// A drag ended.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DragEndDetails {
    /// Release velocity; zero unless the release was a fling.
    pub velocity: Velocity,
    /// Signed release velocity along the drag axis, for single-axis drags.
    pub primary_velocity: Option<f64>,
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_velocity --heading-base-level=0

//! Understory Velocity: pointer velocity estimation for fling detection.
//!
//! ## Overview
//!
//! Gesture recognizers need to know how fast a pointer was moving when it was released,
//! to tell a fling from a drag that simply stopped. This crate answers that from a short
//! history of `(time, position)` samples.
//!
//! - [`VelocityTracker`](crate::tracker::VelocityTracker) keeps a fixed ring of the most
//!   recent samples for one pointer and produces a
//!   [`VelocityEstimate`](crate::tracker::VelocityEstimate).
//! - [`LeastSquaresSolver`](crate::lsq::LeastSquaresSolver) fits the weighted polynomials
//!   the tracker uses, and is usable on its own.
//!
//! ## Estimates
//!
//! An estimate carries a velocity in logical pixels per second, a confidence in `[0, 1]`,
//! and the duration and offset of the samples it was derived from. Only samples from the
//! last 100 ms of continuous motion are considered. When there are too few samples to fit,
//! the estimate is a zero velocity with full confidence rather than an error.
//!
//! ## Example
//!
//! ```
//! use core::time::Duration;
//! use kurbo::Point;
//! use understory_velocity::tracker::VelocityTracker;
//!
//! let mut tracker = VelocityTracker::new();
//! for i in 0..6_u32 {
//!     let t = Duration::from_millis(u64::from(i) * 16);
//!     tracker.add_position(t, Point::new(0.0, f64::from(i) * 8.0));
//! }
//! let estimate = tracker.velocity_estimate().unwrap();
//! assert!((estimate.pixels_per_second.y - 500.0).abs() < 1e-6);
//! assert!(estimate.pixels_per_second.x.abs() < 1e-6);
//! ```

pub mod lsq;
pub mod tracker;

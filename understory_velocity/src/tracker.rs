// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ring-buffered velocity tracking for a single pointer.
//!
//! ## Sampling window
//!
//! [`VelocityTracker`] keeps the last 20 `(time, position)` samples. An estimate walks
//! backward from the newest sample and stops at the first sample that is either older than
//! 100 ms relative to the newest, or separated from its successor by more than 40 ms. The
//! latter means the pointer stopped moving before it resumed, so older history says nothing
//! about the current motion.
//!
//! ## Fitting
//!
//! With at least three usable samples, x and y are fitted independently by degree-2
//! weighted least squares over time in milliseconds. The linear coefficient is the
//! instantaneous velocity at the newest sample, scaled to pixels per second. Fewer samples,
//! or a degenerate fit, produce a zero-velocity estimate with confidence `1.0`.

use core::fmt;
use core::ops::{Add, Neg, Sub};
use core::time::Duration;

use kurbo::{Point, Vec2};

use crate::lsq::LeastSquaresSolver;

const ASSUME_POINTER_MOVE_STOPPED_MILLISECONDS: f64 = 40.0;
const HISTORY_SIZE: usize = 20;
const HORIZON_MILLISECONDS: f64 = 100.0;
const MIN_SAMPLE_SIZE: usize = 3;

/// A two-dimensional velocity in logical pixels per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// The velocity vector, in logical pixels per second.
    pub pixels_per_second: Vec2,
}

impl Velocity {
    /// No motion.
    pub const ZERO: Self = Self {
        pixels_per_second: Vec2::ZERO,
    };

    /// Create a velocity from a pixels-per-second vector.
    pub const fn new(pixels_per_second: Vec2) -> Self {
        Self { pixels_per_second }
    }

    /// Rescale the velocity so its magnitude lies within `[min, max]`.
    ///
    /// The direction is preserved. A zero velocity stays zero since it has no direction.
    pub fn clamp_magnitude(self, min: f64, max: f64) -> Self {
        debug_assert!(min >= 0.0, "minimum magnitude must be non-negative");
        debug_assert!(max >= 0.0, "maximum magnitude must be non-negative");
        debug_assert!(max >= min, "maximum magnitude must not be below the minimum");
        let v = self.pixels_per_second;
        let squared = v.hypot2();
        if squared == 0.0 {
            return self;
        }
        if squared > max * max {
            Self::new(v / v.hypot() * max)
        } else if squared < min * min {
            Self::new(v / v.hypot() * min)
        } else {
            self
        }
    }
}

impl Add for Velocity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.pixels_per_second + rhs.pixels_per_second)
    }
}

impl Sub for Velocity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.pixels_per_second - rhs.pixels_per_second)
    }
}

impl Neg for Velocity {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.pixels_per_second)
    }
}

impl fmt::Display for Velocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Velocity({:.1}, {:.1})",
            self.pixels_per_second.x, self.pixels_per_second.y
        )
    }
}

/// A velocity together with how it was derived.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityEstimate {
    /// Estimated velocity in logical pixels per second.
    pub pixels_per_second: Vec2,
    /// Quality of the fit in `[0, 1]`; product of the x and y coefficients of determination.
    pub confidence: f64,
    /// Time between the oldest and newest samples used.
    pub duration: Duration,
    /// Displacement between the oldest and newest samples used.
    pub offset: Vec2,
}

impl fmt::Display for VelocityEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VelocityEstimate({:.1}, {:.1}; offset: ({:.1}, {:.1}), duration: {:?}, confidence: {:.1})",
            self.pixels_per_second.x,
            self.pixels_per_second.y,
            self.offset.x,
            self.offset.y,
            self.duration,
            self.confidence,
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct PointAtTime {
    point: Point,
    time: Duration,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Estimates pointer velocity from recent position samples.
///
/// ## Usage
///
/// - Call [`add_position`](Self::add_position) for every move of the tracked pointer.
/// - At release, call [`velocity_estimate`](Self::velocity_estimate) or
///   [`velocity`](Self::velocity).
///
/// Timestamps only need to be monotonic relative to each other; any epoch works.
#[derive(Clone, Debug)]
pub struct VelocityTracker {
    samples: [Option<PointAtTime>; HISTORY_SIZE],
    index: usize,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            samples: [None; HISTORY_SIZE],
            index: 0,
        }
    }

    /// Record the pointer at `position` at time `time`.
    pub fn add_position(&mut self, time: Duration, position: Point) {
        self.index += 1;
        if self.index == HISTORY_SIZE {
            self.index = 0;
        }
        self.samples[self.index] = Some(PointAtTime {
            point: position,
            time,
        });
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Estimate the current velocity.
    ///
    /// Returns `None` only when no sample has been recorded.
    pub fn velocity_estimate(&self) -> Option<VelocityEstimate> {
        let newest = self.samples[self.index]?;

        let mut x = [0.0; HISTORY_SIZE];
        let mut y = [0.0; HISTORY_SIZE];
        let mut w = [0.0; HISTORY_SIZE];
        let mut time = [0.0; HISTORY_SIZE];
        let mut sample_count = 0;
        let mut index = self.index;

        let mut previous = newest;
        let mut oldest = newest;

        loop {
            let Some(sample) = self.samples[index] else {
                break;
            };

            let age = millis(newest.time) - millis(sample.time);
            let delta = (millis(sample.time) - millis(previous.time)).abs();
            previous = sample;
            if age > HORIZON_MILLISECONDS || delta > ASSUME_POINTER_MOVE_STOPPED_MILLISECONDS {
                break;
            }

            oldest = sample;
            x[sample_count] = sample.point.x;
            y[sample_count] = sample.point.y;
            w[sample_count] = 1.0;
            time[sample_count] = -age;

            index = (if index == 0 { HISTORY_SIZE } else { index }) - 1;
            sample_count += 1;
            if sample_count >= HISTORY_SIZE {
                break;
            }
        }

        let duration = newest.time.saturating_sub(oldest.time);
        let offset = newest.point - oldest.point;

        if sample_count >= MIN_SAMPLE_SIZE {
            let n = sample_count;
            let x_fit = LeastSquaresSolver::new(&time[..n], &x[..n], &w[..n]).solve(2);
            let y_fit = LeastSquaresSolver::new(&time[..n], &y[..n], &w[..n]).solve(2);
            if let (Some(x_fit), Some(y_fit)) = (x_fit, y_fit) {
                return Some(VelocityEstimate {
                    pixels_per_second: Vec2::new(
                        x_fit.coefficients[1] * 1000.0,
                        y_fit.coefficients[1] * 1000.0,
                    ),
                    confidence: x_fit.confidence * y_fit.confidence,
                    duration,
                    offset,
                });
            }
        }

        // Too few samples, or a fit that collapsed: report no motion.
        Some(VelocityEstimate {
            pixels_per_second: Vec2::ZERO,
            confidence: 1.0,
            duration,
            offset,
        })
    }

    /// The estimated velocity, or [`Velocity::ZERO`] when nothing has been recorded.
    pub fn velocity(&self) -> Velocity {
        self.velocity_estimate()
            .map_or(Velocity::ZERO, |e| Velocity::new(e.pixels_per_second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn empty_tracker_has_no_estimate() {
        let tracker = VelocityTracker::new();
        assert!(tracker.velocity_estimate().is_none(), "no samples recorded");
        assert_eq!(tracker.velocity(), Velocity::ZERO);
    }

    #[test]
    fn straight_line_at_constant_speed() {
        let mut tracker = VelocityTracker::new();
        // 200 px/s along x: 2 px every 10 ms.
        for i in 0..8_u32 {
            tracker.add_position(ms(u64::from(i) * 10), Point::new(f64::from(i) * 2.0, 50.0));
        }
        let estimate = tracker.velocity_estimate().unwrap();
        assert!(
            (estimate.pixels_per_second.x - 200.0).abs() < 1e-3,
            "{estimate}"
        );
        assert!(estimate.pixels_per_second.y.abs() < 1e-3, "{estimate}");
        assert!((estimate.confidence - 1.0).abs() < 1e-6, "{estimate}");
        assert_eq!(estimate.duration, ms(70));
        assert_eq!(estimate.offset, Vec2::new(14.0, 0.0));
    }

    #[test]
    fn one_or_two_samples_report_zero_velocity() {
        let mut tracker = VelocityTracker::new();
        tracker.add_position(ms(0), Point::new(0.0, 0.0));
        let one = tracker.velocity_estimate().unwrap();
        assert_eq!(one.pixels_per_second, Vec2::ZERO);
        assert_eq!(one.confidence, 1.0);
        assert_eq!(one.duration, Duration::ZERO);

        tracker.add_position(ms(10), Point::new(30.0, 0.0));
        let two = tracker.velocity_estimate().unwrap();
        assert_eq!(two.pixels_per_second, Vec2::ZERO);
        assert_eq!(two.confidence, 1.0);
        assert_eq!(two.duration, ms(10));
        assert_eq!(two.offset, Vec2::new(30.0, 0.0));
    }

    #[test]
    fn pause_longer_than_stop_threshold_cuts_history() {
        let mut tracker = VelocityTracker::new();
        for i in 0..5_u32 {
            tracker.add_position(ms(u64::from(i) * 10), Point::new(f64::from(i) * 10.0, 0.0));
        }
        // 50 ms gap: the pointer was considered stopped.
        tracker.add_position(ms(90), Point::new(40.0, 0.0));
        tracker.add_position(ms(95), Point::new(41.0, 0.0));
        let estimate = tracker.velocity_estimate().unwrap();
        assert_eq!(
            estimate.pixels_per_second,
            Vec2::ZERO,
            "only two samples after the pause"
        );
        assert_eq!(estimate.duration, ms(5));
    }

    #[test]
    fn samples_beyond_horizon_are_ignored() {
        let mut tracker = VelocityTracker::new();
        // Slow motion long ago, then fast recent motion; horizon keeps only recent samples.
        for i in 0..20_u32 {
            let t = u64::from(i) * 10;
            let x = if t < 90 {
                f64::from(i)
            } else {
                9.0 + (f64::from(i) - 9.0) * 5.0
            };
            tracker.add_position(ms(t), Point::new(x, 0.0));
        }
        let estimate = tracker.velocity_estimate().unwrap();
        assert!(estimate.duration <= ms(100), "{estimate}");
        assert!(
            (estimate.pixels_per_second.x - 500.0).abs() < 1.0,
            "{estimate}"
        );
    }

    #[test]
    fn ring_wraps_without_losing_newest_samples() {
        let mut tracker = VelocityTracker::new();
        for i in 0..45_u32 {
            tracker.add_position(ms(u64::from(i) * 4), Point::new(0.0, -f64::from(i)));
        }
        let estimate = tracker.velocity_estimate().unwrap();
        assert!(
            (estimate.pixels_per_second.y + 250.0).abs() < 1e-3,
            "{estimate}"
        );
        assert_eq!(estimate.duration, ms(76), "20 samples, 4 ms apart");
    }

    #[test]
    fn reset_forgets_samples() {
        let mut tracker = VelocityTracker::new();
        tracker.add_position(ms(0), Point::ORIGIN);
        tracker.reset();
        assert!(tracker.velocity_estimate().is_none(), "reset clears the ring");
    }

    #[test]
    fn clamp_magnitude_preserves_direction() {
        let v = Velocity::new(Vec2::new(3000.0, 4000.0));
        let clamped = v.clamp_magnitude(50.0, 1000.0);
        assert!(
            (clamped.pixels_per_second - Vec2::new(600.0, 800.0)).hypot() < 1e-9,
            "{clamped}"
        );

        let slow = Velocity::new(Vec2::new(0.0, -10.0)).clamp_magnitude(50.0, 1000.0);
        assert!(
            (slow.pixels_per_second - Vec2::new(0.0, -50.0)).hypot() < 1e-9,
            "{slow}"
        );

        let within = Velocity::new(Vec2::new(100.0, 0.0));
        assert_eq!(within.clamp_magnitude(50.0, 1000.0), within);
        assert_eq!(Velocity::ZERO.clamp_magnitude(50.0, 1000.0), Velocity::ZERO);
    }
}

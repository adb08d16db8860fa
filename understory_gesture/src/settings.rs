// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture tolerances, timeouts, and fling limits.
//!
//! [`GestureSettings`] is a plain copyable value owned by the
//! [`GestureBinding`](crate::binding::GestureBinding). Recognizers read it when they need a
//! threshold; individual recognizers can override fling limits and tolerances on top.
//!
//! ```
//! use core::time::Duration;
//! use understory_gesture::settings::GestureSettings;
//!
//! let settings = GestureSettings::default()
//!     .with_touch_slop(8.0)
//!     .with_long_press_timeout(Duration::from_millis(400));
//! assert!(settings.validate().is_ok());
//! assert_eq!(settings.min_fling_distance, 8.0);
//! ```

use core::fmt;
use core::time::Duration;

/// Thresholds shared by all recognizers.
///
/// Distances are in logical pixels, velocities in logical pixels per second.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GestureSettings {
    /// Distance a touch can travel before it is no longer a tap.
    pub touch_slop: f64,
    /// Distance a pointer must travel before a pan is recognized.
    pub pan_slop: f64,
    /// Change in span before a scale is recognized.
    pub scale_slop: f64,
    /// Distance a touch can travel during either tap of a double tap.
    pub double_tap_touch_slop: f64,
    /// Maximum distance between the first and second tap of a double tap.
    pub double_tap_slop: f64,
    /// Delay before a press is reported as a tap down.
    pub press_timeout: Duration,
    /// Maximum time between the first tap up and the second tap down.
    pub double_tap_timeout: Duration,
    /// Dwell time before a press becomes a long press.
    pub long_press_timeout: Duration,
    /// Minimum release velocity for a fling.
    pub min_fling_velocity: f64,
    /// Release velocities are clamped to this magnitude.
    pub max_fling_velocity: f64,
    /// Minimum travel during the sampled window for a fling.
    pub min_fling_distance: f64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        const TOUCH_SLOP: f64 = 18.0;
        Self {
            touch_slop: TOUCH_SLOP,
            pan_slop: TOUCH_SLOP * 2.0,
            scale_slop: TOUCH_SLOP,
            double_tap_touch_slop: TOUCH_SLOP,
            double_tap_slop: 100.0,
            press_timeout: Duration::from_millis(100),
            double_tap_timeout: Duration::from_millis(300),
            long_press_timeout: Duration::from_millis(500),
            min_fling_velocity: 50.0,
            max_fling_velocity: 8000.0,
            min_fling_distance: TOUCH_SLOP,
        }
    }
}

impl GestureSettings {
    /// Set the touch slop.
    ///
    /// The minimum fling distance follows the touch slop; set it afterwards to override.
    #[must_use]
    pub fn with_touch_slop(mut self, slop: f64) -> Self {
        self.touch_slop = slop;
        self.min_fling_distance = slop;
        self
    }

    /// Set the pan slop.
    #[must_use]
    pub fn with_pan_slop(mut self, slop: f64) -> Self {
        self.pan_slop = slop;
        self
    }

    /// Set the scale slop.
    #[must_use]
    pub fn with_scale_slop(mut self, slop: f64) -> Self {
        self.scale_slop = slop;
        self
    }

    /// Set the double-tap touch slop and the distance allowed between taps.
    #[must_use]
    pub fn with_double_tap_slops(mut self, touch_slop: f64, slop: f64) -> Self {
        self.double_tap_touch_slop = touch_slop;
        self.double_tap_slop = slop;
        self
    }

    /// Set the press timeout.
    #[must_use]
    pub fn with_press_timeout(mut self, timeout: Duration) -> Self {
        self.press_timeout = timeout;
        self
    }

    /// Set the double-tap timeout.
    #[must_use]
    pub fn with_double_tap_timeout(mut self, timeout: Duration) -> Self {
        self.double_tap_timeout = timeout;
        self
    }

    /// Set the long-press timeout.
    #[must_use]
    pub fn with_long_press_timeout(mut self, timeout: Duration) -> Self {
        self.long_press_timeout = timeout;
        self
    }

    /// Set the fling velocity range.
    #[must_use]
    pub fn with_fling_velocity(mut self, min: f64, max: f64) -> Self {
        self.min_fling_velocity = min;
        self.max_fling_velocity = max;
        self
    }

    /// Set the minimum fling distance.
    #[must_use]
    pub fn with_min_fling_distance(mut self, distance: f64) -> Self {
        self.min_fling_distance = distance;
        self
    }

    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let distances = [
            ("touch_slop", self.touch_slop),
            ("pan_slop", self.pan_slop),
            ("scale_slop", self.scale_slop),
            ("double_tap_touch_slop", self.double_tap_touch_slop),
            ("double_tap_slop", self.double_tap_slop),
            ("min_fling_distance", self.min_fling_distance),
            ("min_fling_velocity", self.min_fling_velocity),
            ("max_fling_velocity", self.max_fling_velocity),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(SettingsError::InvalidThreshold { name, value });
            }
        }
        let timeouts = [
            ("press_timeout", self.press_timeout),
            ("double_tap_timeout", self.double_tap_timeout),
            ("long_press_timeout", self.long_press_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(SettingsError::ZeroTimeout { name });
            }
        }
        if self.min_fling_velocity > self.max_fling_velocity {
            return Err(SettingsError::FlingVelocityRange {
                min: self.min_fling_velocity,
                max: self.max_fling_velocity,
            });
        }
        Ok(())
    }
}

/// A [`GestureSettings`] value that recognizers cannot work with.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SettingsError {
    /// A distance or velocity is negative or not finite.
    InvalidThreshold {
        /// Field name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A timeout is zero.
    ZeroTimeout {
        /// Field name.
        name: &'static str,
    },
    /// The minimum fling velocity exceeds the maximum.
    FlingVelocityRange {
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreshold { name, value } => {
                write!(f, "`{name}` must be finite and non-negative, got {value}")
            }
            Self::ZeroTimeout { name } => write!(f, "`{name}` must be greater than zero"),
            Self::FlingVelocityRange { min, max } => write!(
                f,
                "minimum fling velocity {min} exceeds maximum fling velocity {max}"
            ),
        }
    }
}

impl core::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conventional() {
        let s = GestureSettings::default();
        assert_eq!(s.touch_slop, 18.0);
        assert_eq!(s.pan_slop, 36.0);
        assert_eq!(s.scale_slop, 18.0);
        assert_eq!(s.double_tap_touch_slop, 18.0);
        assert_eq!(s.double_tap_slop, 100.0);
        assert_eq!(s.press_timeout, Duration::from_millis(100));
        assert_eq!(s.double_tap_timeout, Duration::from_millis(300));
        assert_eq!(s.long_press_timeout, Duration::from_millis(500));
        assert_eq!(s.min_fling_velocity, 50.0);
        assert_eq!(s.max_fling_velocity, 8000.0);
        assert_eq!(s.min_fling_distance, 18.0);
        assert!(s.validate().is_ok(), "defaults validate");
    }

    #[test]
    fn negative_slop_is_rejected() {
        let err = GestureSettings::default()
            .with_pan_slop(-1.0)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            SettingsError::InvalidThreshold {
                name: "pan_slop",
                value: -1.0
            }
        );
        assert_eq!(err.to_string(), "`pan_slop` must be finite and non-negative, got -1");
    }

    #[test]
    fn inverted_fling_range_is_rejected() {
        let err = GestureSettings::default()
            .with_fling_velocity(500.0, 100.0)
            .validate()
            .unwrap_err();
        assert!(
            matches!(err, SettingsError::FlingVelocityRange { .. }),
            "{err}"
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = GestureSettings::default()
            .with_double_tap_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            SettingsError::ZeroTimeout {
                name: "double_tap_timeout"
            }
        );
    }
}

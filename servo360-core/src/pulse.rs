//! Speed to pulse-width mapping
//!
//! A continuous-rotation servo reads the pulse width as a velocity: the
//! stop width holds it still, wider pulses spin it forward and narrower
//! pulses spin it in reverse. Speeds are signed percentages in
//! `[-100, 100]`.
//!
//! All arithmetic is integer with truncating division so that the same
//! speed always produces the same compare value.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fastest forward speed
pub const SPEED_MAX: i32 = 100;

/// Fastest reverse speed
pub const SPEED_MIN: i32 = -100;

/// Minimum speed change that triggers a new compare write
pub const SPEED_DEADBAND: i32 = 3;

/// Slowest speed that still turns the horn in a timed run
pub const MIN_RUN_SPEED: i32 = 5;

/// Lowest pulse width accepted for raw calibration writes
pub const RAW_PULSE_MIN_US: u32 = 1000;

/// Highest pulse width accepted for raw calibration writes
pub const RAW_PULSE_MAX_US: u32 = 2000;

/// Inverse mapping failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseRangeError {
    /// The span on the requested side of the stop width is zero
    Degenerate,
}

/// Characteristic pulse widths of a servo model
///
/// Direction mapping expects `max_reverse_us < stop_us < max_forward_us`.
/// The ordering is not enforced; a servo wired backwards is handled with
/// the channel's reverse flag instead of swapping these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PulseRange {
    /// Pulse width that holds the servo still (µs)
    pub stop_us: u32,
    /// Pulse width for full forward speed (µs)
    pub max_forward_us: u32,
    /// Pulse width for full reverse speed (µs)
    pub max_reverse_us: u32,
}

impl PulseRange {
    /// SG90 360° continuous-rotation servo
    pub const SG90_360: Self = Self::new(1500, 2000, 1000);

    /// Create a pulse range
    pub const fn new(stop_us: u32, max_forward_us: u32, max_reverse_us: u32) -> Self {
        Self {
            stop_us,
            max_forward_us,
            max_reverse_us,
        }
    }

    /// Check the `reverse < stop < forward` ordering
    pub const fn is_ordered(&self) -> bool {
        self.max_reverse_us < self.stop_us && self.stop_us < self.max_forward_us
    }

    /// Pulse width for a speed
    ///
    /// The speed is clamped to `[-100, 100]` first. With an ordered range
    /// the result lies in `[max_reverse_us, max_forward_us]`.
    pub fn pulse_width(&self, speed: i32) -> u32 {
        let speed = clamp_speed(speed) as i64;
        let stop = self.stop_us as i64;

        let width = if speed == 0 {
            stop
        } else if speed > 0 {
            stop + (self.max_forward_us as i64 - stop) * speed / 100
        } else {
            stop - (stop - self.max_reverse_us as i64) * (-speed) / 100
        };

        width.clamp(0, u32::MAX as i64) as u32
    }

    /// Estimate the speed a pulse width corresponds to
    ///
    /// Inverse of [`pulse_width`](Self::pulse_width), up to truncation.
    /// Fails when the span on the pulse's side of the stop width is zero.
    pub fn estimate_speed(&self, pulse_us: u32) -> Result<i32, PulseRangeError> {
        let pulse = pulse_us as i64;
        let stop = self.stop_us as i64;

        let speed = if pulse == stop {
            0
        } else if pulse > stop {
            let span = self.max_forward_us as i64 - stop;
            if span == 0 {
                return Err(PulseRangeError::Degenerate);
            }
            (pulse - stop) * 100 / span
        } else {
            let span = stop - self.max_reverse_us as i64;
            if span == 0 {
                return Err(PulseRangeError::Degenerate);
            }
            -((stop - pulse) * 100 / span)
        };

        Ok(speed.clamp(SPEED_MIN as i64, SPEED_MAX as i64) as i32)
    }
}

impl Default for PulseRange {
    fn default() -> Self {
        Self::SG90_360
    }
}

/// Clamp a speed to `[-100, 100]`
pub fn clamp_speed(speed: i32) -> i32 {
    speed.clamp(SPEED_MIN, SPEED_MAX)
}

/// Clamp a speed for a timed run and lift it out of the stall zone
///
/// Speeds with magnitude below [`MIN_RUN_SPEED`] become `5` when positive
/// and `-5` otherwise.
pub fn run_speed(speed: i32) -> i32 {
    let speed = clamp_speed(speed);
    if speed.abs() < MIN_RUN_SPEED {
        if speed > 0 {
            MIN_RUN_SPEED
        } else {
            -MIN_RUN_SPEED
        }
    } else {
        speed
    }
}

/// Check whether moving from `current` to `requested` clears the deadband
pub fn exceeds_deadband(current: i32, requested: i32) -> bool {
    requested.abs_diff(current) >= SPEED_DEADBAND.unsigned_abs()
}

/// Check a pulse width against the raw calibration window
pub const fn is_raw_pulse_valid(pulse_us: u32) -> bool {
    pulse_us >= RAW_PULSE_MIN_US && pulse_us <= RAW_PULSE_MAX_US
}

//! Degree to motion calibration
//!
//! A continuous-rotation servo has no position feedback, so "turn 90°"
//! is approximated as "run at the calibrated speed for a measured time".
//! Measured durations for specific angles live in a small table; other
//! angles scale linearly from the time a full circle takes.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of measured degree entries
pub const MAX_DEGREE_ENTRIES: usize = 16;

/// Default calibrated speed (percent)
pub const DEFAULT_CALIBRATED_SPEED: i32 = 50;

/// Default time for a full 360° turn at the calibrated speed
pub const DEFAULT_FULL_CIRCLE_MS: u32 = 2000;

/// A measured duration for a specific angle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DegreeDuration {
    /// Angle magnitude in degrees
    pub degree: u32,
    /// Time to turn that far at the calibrated speed
    pub duration_ms: u32,
}

/// Calibration data for degree-based moves
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServoCalibration {
    /// Speed used for degree moves (percent, positive)
    pub speed: i32,
    /// Time for a full circle at `speed`
    pub full_circle_time_ms: u32,
    /// Measured durations, keyed by angle magnitude
    pub degree_table: Vec<DegreeDuration, MAX_DEGREE_ENTRIES>,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            speed: DEFAULT_CALIBRATED_SPEED,
            full_circle_time_ms: DEFAULT_FULL_CIRCLE_MS,
            degree_table: Vec::new(),
        }
    }
}

impl ServoCalibration {
    /// Create calibration data with an empty table
    pub fn new(speed: i32, full_circle_time_ms: u32) -> Self {
        Self {
            speed,
            full_circle_time_ms,
            degree_table: Vec::new(),
        }
    }

    /// Record a measured duration, replacing any entry for the same angle
    ///
    /// Returns the entry back if the table is full.
    pub fn insert(&mut self, degree: u32, duration_ms: u32) -> Result<(), DegreeDuration> {
        if let Some(entry) = self.degree_table.iter_mut().find(|e| e.degree == degree) {
            entry.duration_ms = duration_ms;
            return Ok(());
        }
        self.degree_table.push(DegreeDuration {
            degree,
            duration_ms,
        })
    }

    /// Look up a measured duration
    pub fn measured(&self, degree: u32) -> Option<u32> {
        self.degree_table
            .iter()
            .find(|e| e.degree == degree)
            .map(|e| e.duration_ms)
    }
}

/// Duration for turning `degree` degrees (sign ignored)
pub fn lookup_duration(degree: i32, calibration: &ServoCalibration) -> u32 {
    let magnitude = degree.unsigned_abs();
    if let Some(duration) = calibration.measured(magnitude) {
        return duration;
    }
    let scaled = magnitude as u64 * calibration.full_circle_time_ms as u64 / 360;
    scaled.min(u32::MAX as u64) as u32
}

/// Map a signed angle to a `(speed, duration_ms)` pair
///
/// Non-negative angles turn forward at the calibrated speed, negative
/// angles turn in reverse.
pub fn degree_to_motion(degree: i32, calibration: &ServoCalibration) -> (i32, u32) {
    let speed = if degree >= 0 {
        calibration.speed
    } else {
        calibration.speed.saturating_neg()
    };
    (speed, lookup_duration(degree, calibration))
}

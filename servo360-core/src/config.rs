//! Servo arm configuration
//!
//! These types describe how the two arms are wired and calibrated. They
//! derive serde traits behind the `serde` feature so a board crate can load
//! them from whatever format it stores configuration in.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::calibration::ServoCalibration;
use crate::pulse::PulseRange;
use crate::target::Arm;

/// One arm's output wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArmConfig {
    /// Output GPIO, `None` when the arm is not connected
    pub gpio: Option<u8>,
    /// Pulse widths of the fitted servo
    pub pulse_range: PulseRange,
    /// Servo is mounted mirrored; every speed is negated
    pub reverse: bool,
}

impl ArmConfig {
    /// An SG90-360 on `gpio`
    pub const fn new(gpio: u8) -> Self {
        Self {
            gpio: Some(gpio),
            pulse_range: PulseRange::SG90_360,
            reverse: false,
        }
    }

    /// Same wiring with the direction flipped
    pub const fn reversed(self) -> Self {
        Self {
            reverse: true,
            ..self
        }
    }
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            gpio: None,
            pulse_range: PulseRange::SG90_360,
            reverse: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Both arms are wired to this GPIO
    SharedGpio(u8),
    /// Calibrated speed outside `1..=100`
    CalibrationSpeed(i32),
    /// Full-circle time is zero
    FullCircleTime,
    /// Degree table entry with a zero duration
    DegreeTableDuration(u32),
    /// Shared timer lives in this group instead of `timer_group`
    TimerGroup(u8),
}

/// Both arms plus the shared timer and calibration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServoArmsConfig {
    /// PWM group the shared timer is allocated in
    pub timer_group: u8,
    pub left: ArmConfig,
    pub right: ArmConfig,
    pub calibration: ServoCalibration,
}

impl ServoArmsConfig {
    /// Configuration for arms on the given GPIOs
    pub fn new(left_gpio: u8, right_gpio: u8) -> Self {
        Self {
            left: ArmConfig::new(left_gpio),
            right: ArmConfig::new(right_gpio),
            ..Self::default()
        }
    }

    pub fn arm(&self, arm: Arm) -> &ArmConfig {
        match arm {
            Arm::Left => &self.left,
            Arm::Right => &self.right,
        }
    }

    /// Check wiring and calibration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(left), Some(right)) = (self.left.gpio, self.right.gpio) {
            if left == right {
                return Err(ConfigError::SharedGpio(left));
            }
        }

        let cal = &self.calibration;
        if !(1..=100).contains(&cal.speed) {
            return Err(ConfigError::CalibrationSpeed(cal.speed));
        }
        if cal.full_circle_time_ms == 0 {
            return Err(ConfigError::FullCircleTime);
        }
        if let Some(entry) = cal.degree_table.iter().find(|e| e.duration_ms == 0) {
            return Err(ConfigError::DegreeTableDuration(entry.degree));
        }

        Ok(())
    }
}

//! Board-agnostic core logic for dual continuous-rotation servo arms
//!
//! This crate contains everything that does not touch the PWM peripheral:
//!
//! - Speed to pulse-width mapping with clamping and deadband constants
//! - Degree to (speed, duration) mapping from calibration data
//! - Arm/target resolution for the left/right/both vocabulary
//! - The closed command vocabulary resolved at the dispatch boundary
//! - Per-arm motion and diagnostic requests
//! - Configuration type definitions and validation

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod calibration;
pub mod command;
pub mod config;
pub mod motion;
pub mod pulse;
pub mod target;

pub use calibration::{degree_to_motion, lookup_duration, DegreeDuration, ServoCalibration};
pub use command::{
    AlternateAction, ComboAction, CommandArgs, CommandError, GestureCommand, MirrorAction,
    Operation, Request,
};
pub use config::{ArmConfig, ConfigError, ServoArmsConfig};
pub use motion::{Diagnostic, Motion, Step};
pub use pulse::{PulseRange, PulseRangeError};
pub use target::{Arm, Target};

//! Servo drivers for dual continuous-rotation arms
//!
//! This crate drives servos through the [`servo360_hal::McpwmHal`] traits:
//!
//! - [`Timebase`]: shared 50 Hz timer lifecycle
//! - [`ServoChannel`]: speed to compare value, deadband, raw calibration
//!   pulses, plus the timed motion primitives and bench routines
//! - [`ArmWorker`]: per-arm execution unit fed through an [`ArmMailbox`]
//! - [`DualChannelCoordinator`]: left/right/both fan-out of commands
//!
//! Logging goes through `defmt` or `log`, selected by crate feature.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod coordinator;
pub mod servo;
pub mod timebase;
pub mod worker;

#[cfg(test)]
mod mock;

pub use coordinator::{ArmStatus, DualChannelCoordinator, Reply, ServoArms};
pub use servo::{PendingStop, ServoChannel, ServoError, SpeedChange};
pub use timebase::Timebase;
pub use worker::{ArmMailbox, ArmMailboxes, ArmWorker, MotionRequest, MAILBOX_DEPTH};

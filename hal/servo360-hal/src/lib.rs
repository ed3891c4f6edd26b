//! servo360 Hardware Abstraction Layer
//!
//! This crate defines the PWM peripheral traits that chip-specific HALs
//! implement so the servo engine can drive continuous-rotation servos on
//! any motor-control PWM block with a shared timer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  servo360-drivers (channels, workers)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  servo360-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  chip MCPWM driver (timer, operators,   │
//! │  comparators, generators)               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`mcpwm::McpwmHal`] - timer, operator, comparator and generator allocation

#![no_std]
#![deny(unsafe_code)]

pub mod mcpwm;

pub use mcpwm::{
    McpwmError, McpwmHal, TimerConfig, SERVO_PERIOD_TICKS, SERVO_RESOLUTION_HZ,
};

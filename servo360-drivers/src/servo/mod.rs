//! Continuous-rotation servo channel
//!
//! A [`ServoChannel`] owns one operator, comparator and generator on the
//! shared timer and turns a signed speed into a compare value.
//!
//! Setup order is fixed: operator, timer connection, comparator,
//! generator, initial stop compare value, generator actions. Any failure
//! releases what was already allocated in reverse order and leaves the
//! channel inert. An inert channel accepts every call and does nothing.
//!
//! # Usage
//!
//! ```ignore
//! let timebase = Timebase::new(&pwm, TimerConfig::servo(0));
//! let mut servo = ServoChannel::new(&timebase, &ArmConfig::new(10));
//! servo.set_speed(50)?; // 1750 µs
//! servo.stop()?;
//! ```

mod diagnostics;
mod motion;

pub use motion::PendingStop;

use servo360_core::pulse::{clamp_speed, exceeds_deadband, is_raw_pulse_valid};
use servo360_core::{ArmConfig, PulseRange};
use servo360_hal::{McpwmError, McpwmHal};

use crate::timebase::Timebase;

/// Servo channel errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoError {
    /// Setup never succeeded
    NotInitialized,
    /// Raw pulse width outside 1000..=2000 µs
    PulseOutOfRange(u32),
    /// Speed cannot be derived from the pulse range
    Degenerate,
    /// Peripheral call failed
    Hardware(McpwmError),
}

impl From<McpwmError> for ServoError {
    fn from(e: McpwmError) -> Self {
        ServoError::Hardware(e)
    }
}

/// Outcome of a speed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeedChange {
    /// New compare value written
    Applied { pulse_us: u32 },
    /// Within the deadband of the current speed; nothing written
    Deadband,
}

struct Handles<H: McpwmHal> {
    operator: H::Operator,
    comparator: H::Comparator,
    generator: H::Generator,
}

/// One servo output
pub struct ServoChannel<'a, H: McpwmHal> {
    timebase: &'a Timebase<'a, H>,
    gpio: Option<u8>,
    range: PulseRange,
    reverse: bool,
    handles: Option<Handles<H>>,
    /// Signed speed after the reverse flag, -100..=100
    current_speed: i32,
    pulse_width_us: u32,
}

impl<'a, H: McpwmHal> ServoChannel<'a, H> {
    /// Bind a channel to the shared timer and command the stop pulse
    pub fn new(timebase: &'a Timebase<'a, H>, config: &ArmConfig) -> Self {
        let mut channel = Self {
            timebase,
            gpio: config.gpio,
            range: config.pulse_range,
            reverse: config.reverse,
            handles: None,
            current_speed: 0,
            pulse_width_us: config.pulse_range.stop_us,
        };

        let (Some(gpio), Some(timer)) = (config.gpio, timebase.timer()) else {
            warn!(
                "servo: invalid setup (gpio {:?}, timer running {})",
                config.gpio,
                timebase.is_running()
            );
            return channel;
        };

        if !channel.range.is_ordered() {
            warn!(
                "servo: gpio {} pulse range {} / {} / {} us is not ordered",
                gpio,
                channel.range.max_reverse_us,
                channel.range.stop_us,
                channel.range.max_forward_us
            );
        }

        match channel.setup(timer, gpio) {
            Ok(handles) => {
                channel.handles = Some(handles);
                info!(
                    "servo: gpio {} ready, stop {} us, reverse {}",
                    gpio, channel.range.stop_us, channel.reverse
                );
            }
            Err(e) => error!("servo: gpio {} setup failed: {:?}", gpio, e),
        }

        channel
    }

    fn setup(&self, timer: &H::Timer, gpio: u8) -> Result<Handles<H>, McpwmError> {
        let hal = self.timebase.hal();
        let stop_ticks = self.ticks(self.range.stop_us);

        let operator = hal.new_operator(self.timebase.config().group_id)?;

        let comparator = match hal
            .connect_timer(&operator, timer)
            .and_then(|()| hal.new_comparator(&operator))
        {
            Ok(comparator) => comparator,
            Err(e) => {
                let _ = hal.del_operator(operator);
                return Err(e);
            }
        };

        let generator = match hal.new_generator(&operator, gpio) {
            Ok(generator) => generator,
            Err(e) => {
                let _ = hal.del_comparator(comparator);
                let _ = hal.del_operator(operator);
                return Err(e);
            }
        };

        let configured = hal
            .set_compare_value(&comparator, stop_ticks)
            .and_then(|()| hal.set_generator_actions(&generator, &comparator));
        if let Err(e) = configured {
            let _ = hal.del_generator(generator);
            let _ = hal.del_comparator(comparator);
            let _ = hal.del_operator(operator);
            return Err(e);
        }

        Ok(Handles {
            operator,
            comparator,
            generator,
        })
    }

    fn ticks(&self, pulse_us: u32) -> u32 {
        self.timebase.config().ticks_for_us(pulse_us)
    }

    fn write_pulse(&mut self, pulse_us: u32) -> Result<(), ServoError> {
        let Some(handles) = &self.handles else {
            return Err(ServoError::NotInitialized);
        };
        let ticks = self.ticks(pulse_us);
        if let Err(e) = self
            .timebase
            .hal()
            .set_compare_value(&handles.comparator, ticks)
        {
            error!("servo: gpio {:?} compare write failed: {:?}", self.gpio, e);
            return Err(e.into());
        }
        self.pulse_width_us = pulse_us;
        Ok(())
    }

    fn require_initialized(&self) -> Result<(), ServoError> {
        if self.handles.is_some() {
            Ok(())
        } else {
            warn!("servo: gpio {:?} not initialized", self.gpio);
            Err(ServoError::NotInitialized)
        }
    }

    /// Request a speed in percent
    ///
    /// The reverse flag is applied, the result clamped to `-100..=100` and
    /// dropped if it is within the deadband of the current speed. On a
    /// peripheral failure the current speed is left unchanged.
    pub fn set_speed(&mut self, speed: i32) -> Result<SpeedChange, ServoError> {
        self.require_initialized()?;

        let requested = if self.reverse {
            speed.saturating_neg()
        } else {
            speed
        };
        let effective = clamp_speed(requested);

        if !exceeds_deadband(self.current_speed, effective) {
            debug!(
                "servo: gpio {:?} speed {} within deadband of {}",
                self.gpio, effective, self.current_speed
            );
            return Ok(SpeedChange::Deadband);
        }

        let pulse_us = self.range.pulse_width(effective);
        self.write_pulse(pulse_us)?;
        self.current_speed = effective;
        trace!("servo: gpio {:?} speed {} -> {} us", self.gpio, effective, pulse_us);
        Ok(SpeedChange::Applied { pulse_us })
    }

    /// Command the stop pulse width
    ///
    /// Does nothing when already stopped. A small residual speed inside the
    /// deadband is still stopped.
    pub fn stop(&mut self) -> Result<SpeedChange, ServoError> {
        self.require_initialized()?;

        if self.current_speed == 0 {
            return Ok(SpeedChange::Deadband);
        }

        let pulse_us = self.range.stop_us;
        self.write_pulse(pulse_us)?;
        self.current_speed = 0;
        Ok(SpeedChange::Applied { pulse_us })
    }

    /// Write a pulse width directly, for calibration
    ///
    /// Accepts `1000..=2000` µs. Returns the speed estimated from the pulse
    /// range, which also becomes the current speed.
    pub fn set_raw_pulse_width(&mut self, pulse_us: u32) -> Result<i32, ServoError> {
        self.require_initialized()?;

        if !is_raw_pulse_valid(pulse_us) {
            warn!("servo: gpio {:?} raw pulse {} us out of range", self.gpio, pulse_us);
            return Err(ServoError::PulseOutOfRange(pulse_us));
        }

        let estimate = self.range.estimate_speed(pulse_us).map_err(|_| {
            warn!("servo: gpio {:?} degenerate pulse range", self.gpio);
            ServoError::Degenerate
        })?;

        self.write_pulse(pulse_us)?;
        self.current_speed = estimate;
        info!(
            "servo: gpio {:?} raw pulse {} us, estimated speed {}",
            self.gpio, pulse_us, estimate
        );
        Ok(estimate)
    }

    pub fn is_initialized(&self) -> bool {
        self.handles.is_some()
    }

    /// Current signed speed after the reverse flag
    pub fn current_speed(&self) -> i32 {
        self.current_speed
    }

    /// Last pulse width written
    pub fn pulse_width_us(&self) -> u32 {
        self.pulse_width_us
    }

    pub fn gpio(&self) -> Option<u8> {
        self.gpio
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn pulse_range(&self) -> &PulseRange {
        &self.range
    }
}

impl<H: McpwmHal> Drop for ServoChannel<'_, H> {
    fn drop(&mut self) {
        let Some(handles) = self.handles.take() else {
            return;
        };
        let hal = self.timebase.hal();

        // Leave the output at the stop width even if the deadband would skip it
        let stop_ticks = self.ticks(self.range.stop_us);
        if let Err(e) = hal.set_compare_value(&handles.comparator, stop_ticks) {
            warn!("servo: gpio {:?} stop on release failed: {:?}", self.gpio, e);
        }

        let released = [
            hal.del_generator(handles.generator),
            hal.del_comparator(handles.comparator),
            hal.del_operator(handles.operator),
        ];
        if released.iter().any(Result::is_err) {
            warn!("servo: gpio {:?} release incomplete", self.gpio);
        }
    }
}

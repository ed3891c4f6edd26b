//! Shared PWM timer
//!
//! Every servo channel in a PWM group runs off one timer. The timer is
//! created, enabled and started once, then only read by the channels that
//! borrow it. Channels hold a reference to the [`Timebase`], so it cannot
//! be dropped while any of them still drives an output.

use servo360_core::ServoArmsConfig;
use servo360_hal::{McpwmError, McpwmHal, TimerConfig};

/// Running shared timer
pub struct Timebase<'h, H: McpwmHal> {
    hal: &'h H,
    config: TimerConfig,
    timer: Option<H::Timer>,
}

impl<'h, H: McpwmHal> Timebase<'h, H> {
    /// Create, enable and start the timer
    ///
    /// On failure the partially set up timer is released and the timebase
    /// stays stopped; channels built on it never initialize.
    pub fn new(hal: &'h H, config: TimerConfig) -> Self {
        let timer = match Self::start(hal, &config) {
            Ok(timer) => {
                info!(
                    "timebase: group {} running at {} Hz",
                    config.group_id,
                    config.frequency_hz()
                );
                Some(timer)
            }
            Err(e) => {
                error!("timebase: group {} failed to start: {:?}", config.group_id, e);
                None
            }
        };

        Self { hal, config, timer }
    }

    /// Servo timer in the arms' configured timer group
    pub fn for_arms(hal: &'h H, config: &ServoArmsConfig) -> Self {
        Self::new(hal, TimerConfig::servo(config.timer_group))
    }

    fn start(hal: &H, config: &TimerConfig) -> Result<H::Timer, McpwmError> {
        let timer = hal.new_timer(config)?;

        if let Err(e) = hal.enable_timer(&timer) {
            let _ = hal.del_timer(timer);
            return Err(e);
        }

        if let Err(e) = hal.start_timer(&timer) {
            let _ = hal.disable_timer(&timer);
            let _ = hal.del_timer(timer);
            return Err(e);
        }

        Ok(timer)
    }

    /// The peripheral the timer lives on
    pub fn hal(&self) -> &'h H {
        self.hal
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// The timer handle, if it started
    pub fn timer(&self) -> Option<&H::Timer> {
        self.timer.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }
}

impl<H: McpwmHal> Drop for Timebase<'_, H> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            if let Err(e) = self.hal.disable_timer(&timer) {
                warn!("timebase: disable failed: {:?}", e);
            }
            if let Err(e) = self.hal.del_timer(timer) {
                warn!("timebase: release failed: {:?}", e);
            }
        }
    }
}

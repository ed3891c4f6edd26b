//! Bench routines
//!
//! Routines are generated step by step from [`Diagnostic`] and executed on
//! the calling task like any other motion.

use embedded_hal_async::delay::DelayNs;
use servo360_core::{Diagnostic, Step};
use servo360_hal::McpwmHal;

use super::ServoChannel;

impl<H: McpwmHal> ServoChannel<'_, H> {
    /// Run a diagnostic routine to completion
    pub async fn run_diagnostic<D: DelayNs>(&mut self, routine: Diagnostic, delay: &mut D) {
        if !self.is_initialized() {
            warn!("diagnostic: gpio {:?} not initialized", self.gpio);
            return;
        }
        if !routine.pulses_in_range() {
            warn!("diagnostic: {:?} writes pulses outside the raw window", routine);
            return;
        }

        info!("diagnostic: gpio {:?} starting {:?}", self.gpio, routine);
        for step in routine.steps() {
            match step {
                Step::Run { speed, duration_ms } => self.run_for(speed, duration_ms, delay).await,
                Step::Pause { duration_ms } => delay.delay_ms(duration_ms).await,
                Step::Pulse { pulse_us, hold_ms } => {
                    let _ = self.set_raw_pulse_width(pulse_us);
                    delay.delay_ms(hold_ms).await;
                }
                Step::Stop => {
                    let _ = self.stop();
                }
            }
        }
        info!("diagnostic: gpio {:?} done", self.gpio);
    }
}

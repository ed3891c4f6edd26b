//! Timed motion primitives
//!
//! Every primitive suspends only the task that calls it. Hardware errors
//! are logged by the channel and the primitive keeps its timing, so a
//! failed write never shortens or aborts a gesture.

use embedded_hal_async::delay::DelayNs;
use servo360_core::motion::{QUICK_STOP_DELAY_MS, STEP_SLICE_MS, WAVE_PAUSE_MS};
use servo360_core::pulse::run_speed;
use servo360_core::Motion;
use servo360_hal::McpwmHal;

use super::ServoChannel;

/// Sleep in fixed slices plus a remainder
async fn sleep_sliced<D: DelayNs>(delay: &mut D, duration_ms: u32) {
    for _ in 0..duration_ms / STEP_SLICE_MS {
        delay.delay_ms(STEP_SLICE_MS).await;
    }
    let remainder = duration_ms % STEP_SLICE_MS;
    if remainder > 0 {
        delay.delay_ms(remainder).await;
    }
}

/// Stop owed by a quick action
///
/// The servo keeps turning until [`complete`](Self::complete) runs.
#[must_use = "the servo keeps turning until the pending stop completes"]
#[derive(Debug)]
pub struct PendingStop {
    delay_ms: u32,
}

impl PendingStop {
    /// Wait out the fixed delay, then stop
    pub async fn complete<H: McpwmHal, D: DelayNs>(
        self,
        servo: &mut ServoChannel<'_, H>,
        delay: &mut D,
    ) {
        delay.delay_ms(self.delay_ms).await;
        let _ = servo.stop();
    }
}

impl<H: McpwmHal> ServoChannel<'_, H> {
    fn gesture_ready(&self, name: &str, speed: i32, duration_ms: i32, count: i32) -> bool {
        if !self.is_initialized() || speed == 0 || duration_ms <= 0 || count <= 0 {
            warn!(
                "{}: ignored on gpio {:?} (speed {}, duration {} ms, count {})",
                name, self.gpio, speed, duration_ms, count
            );
            return false;
        }
        true
    }

    /// Run at `speed` for `duration_ms`, then stop
    ///
    /// Speeds below 5% in magnitude are lifted to ±5%. A non-positive
    /// duration does nothing.
    pub async fn run_for<D: DelayNs>(&mut self, speed: i32, duration_ms: i32, delay: &mut D) {
        if !self.is_initialized() {
            warn!("run_for: gpio {:?} not initialized", self.gpio);
            return;
        }
        if duration_ms <= 0 {
            warn!("run_for: invalid duration {} ms", duration_ms);
            return;
        }

        let speed = run_speed(speed);
        debug!("run_for: gpio {:?} speed {} for {} ms", self.gpio, speed, duration_ms);
        let _ = self.set_speed(speed);
        sleep_sliced(delay, duration_ms as u32).await;
        let _ = self.stop();
    }

    /// Set the speed now and hand back the stop that must follow
    ///
    /// `duration_ms` only gates the call; the stop always follows after a
    /// short fixed delay.
    pub fn quick_action(&mut self, speed: i32, duration_ms: i32) -> Option<PendingStop> {
        if !self.is_initialized() {
            warn!("quick_action: gpio {:?} not initialized", self.gpio);
            return None;
        }
        if duration_ms <= 0 {
            warn!("quick_action: invalid duration {} ms", duration_ms);
            return None;
        }

        let _ = self.set_speed(speed);
        Some(PendingStop {
            delay_ms: QUICK_STOP_DELAY_MS,
        })
    }

    /// Oscillate `count` times with a short pause after each half
    pub async fn wave<D: DelayNs>(
        &mut self,
        speed: i32,
        duration_ms: i32,
        count: i32,
        delay: &mut D,
    ) {
        if !self.gesture_ready("wave", speed, duration_ms, count) {
            return;
        }
        for _ in 0..count {
            self.run_for(speed, duration_ms, delay).await;
            delay.delay_ms(WAVE_PAUSE_MS).await;
            self.run_for(speed.saturating_neg(), duration_ms, delay).await;
            delay.delay_ms(WAVE_PAUSE_MS).await;
        }
        let _ = self.stop();
    }

    /// Oscillate `count` times with direct speed changes and no pauses
    pub async fn back_and_forth<D: DelayNs>(
        &mut self,
        speed: i32,
        duration_ms: i32,
        count: i32,
        delay: &mut D,
    ) {
        if !self.gesture_ready("back_and_forth", speed, duration_ms, count) {
            return;
        }
        'cycles: for _ in 0..count {
            for leg in [speed, speed.saturating_neg()] {
                if let Err(e) = self.set_speed(leg) {
                    warn!("back_and_forth: gpio {:?} aborted: {:?}", self.gpio, e);
                    break 'cycles;
                }
                delay.delay_ms(duration_ms as u32).await;
            }
        }
        let _ = self.stop();
    }

    pub async fn raise_arm<D: DelayNs>(&mut self, speed: i32, duration_ms: i32, delay: &mut D) {
        if !self.is_initialized() {
            warn!("raise_arm: gpio {:?} not initialized", self.gpio);
            return;
        }
        self.run_for(speed, duration_ms, delay).await;
    }

    pub async fn salute<D: DelayNs>(&mut self, speed: i32, duration_ms: i32, delay: &mut D) {
        if !self.is_initialized() {
            warn!("salute: gpio {:?} not initialized", self.gpio);
            return;
        }
        self.run_for(speed, duration_ms, delay).await;
        let _ = self.stop();
    }

    /// Forward then reverse runs, `cycles` times, without pauses
    pub async fn swing<D: DelayNs>(
        &mut self,
        speed: i32,
        duration_ms: i32,
        cycles: u32,
        delay: &mut D,
    ) {
        for _ in 0..cycles {
            self.run_for(speed, duration_ms, delay).await;
            self.run_for(speed.saturating_neg(), duration_ms, delay).await;
        }
    }

    /// Execute one queued motion to completion
    ///
    /// A quick action is completed here as well; callers that need to
    /// report before the deferred stop use [`quick_action`](Self::quick_action)
    /// directly.
    pub async fn perform<D: DelayNs>(&mut self, motion: Motion, delay: &mut D) {
        match motion {
            Motion::Run { speed, duration_ms } => self.run_for(speed, duration_ms, delay).await,
            Motion::Quick { speed, duration_ms } => {
                if let Some(pending) = self.quick_action(speed, duration_ms) {
                    pending.complete(self, delay).await;
                }
            }
            Motion::Wave {
                speed,
                duration_ms,
                count,
            } => self.wave(speed, duration_ms, count, delay).await,
            Motion::BackAndForth {
                speed,
                duration_ms,
                count,
            } => self.back_and_forth(speed, duration_ms, count, delay).await,
            Motion::Raise { speed, duration_ms } => self.raise_arm(speed, duration_ms, delay).await,
            Motion::Salute { speed, duration_ms } => self.salute(speed, duration_ms, delay).await,
            Motion::Swing {
                speed,
                duration_ms,
                cycles,
            } => self.swing(speed, duration_ms, cycles, delay).await,
            Motion::Pause { duration_ms } => sleep_sliced(delay, duration_ms).await,
            Motion::RawPulse { pulse_us } => {
                let _ = self.set_raw_pulse_width(pulse_us);
            }
            Motion::Stop => {
                let _ = self.stop();
            }
            Motion::Diagnostic(routine) => self.run_diagnostic(routine, delay).await,
        }
    }
}

//! Per-arm worker loop
//!
//! Each arm owns its [`ServoChannel`] inside an [`ArmWorker`]. The
//! coordinator never touches a channel directly: it posts
//! [`MotionRequest`]s into the arm's [`ArmMailbox`] and the worker executes
//! them strictly in order. Two commands for the same arm are therefore
//! serialized instead of racing on the compare register.
//!
//! On a board the mailboxes live in statics and each worker runs as its
//! own task:
//!
//! ```ignore
//! static MAILBOXES: ArmMailboxes<CriticalSectionRawMutex> = ArmMailboxes::new();
//!
//! #[embassy_executor::task(pool_size = 2)]
//! async fn arm_task(worker: ArmWorker<'static, Pwm, CriticalSectionRawMutex>) -> ! {
//!     worker.run(Delay).await
//! }
//! ```

use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use servo360_core::{Arm, CommandError, Motion};
use servo360_hal::McpwmHal;

use crate::servo::ServoChannel;

/// Requests an arm can hold before the coordinator reports busy
pub const MAILBOX_DEPTH: usize = 4;

/// A motion tagged with the ticket reported on completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionRequest {
    pub ticket: u32,
    pub motion: Motion,
}

/// Queue and completion state shared between one arm's worker and the
/// coordinator
pub struct ArmMailbox<M: RawMutex> {
    requests: Channel<M, MotionRequest, MAILBOX_DEPTH>,
    /// Ticket of the last completed request
    completed: Signal<M, u32>,
    speed: AtomicI32,
    ready: AtomicBool,
}

impl<M: RawMutex> ArmMailbox<M> {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            completed: Signal::new(),
            speed: AtomicI32::new(0),
            ready: AtomicBool::new(false),
        }
    }

    /// Queue a request without waiting
    pub fn post(&self, request: MotionRequest) -> Result<(), CommandError> {
        self.requests
            .try_send(request)
            .map_err(|_| CommandError::Busy)
    }

    /// Free request slots
    pub fn free_slots(&self) -> usize {
        self.requests.free_capacity()
    }

    /// Wait until the request with `ticket`, or a later one, has completed
    pub async fn wait_for(&self, ticket: u32) {
        loop {
            let done = self.completed.wait().await;
            if done.wrapping_sub(ticket) as i32 >= 0 {
                return;
            }
        }
    }

    /// Speed after the last completed request
    pub fn speed(&self) -> i32 {
        self.speed.load(Ordering::Relaxed)
    }

    /// Whether the arm's channel finished setup
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn publish<H: McpwmHal>(&self, servo: &ServoChannel<'_, H>) {
        self.speed.store(servo.current_speed(), Ordering::Relaxed);
        self.ready.store(servo.is_initialized(), Ordering::Relaxed);
    }
}

impl<M: RawMutex> Default for ArmMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Mailboxes for both arms
pub struct ArmMailboxes<M: RawMutex> {
    pub left: ArmMailbox<M>,
    pub right: ArmMailbox<M>,
}

impl<M: RawMutex> ArmMailboxes<M> {
    pub const fn new() -> Self {
        Self {
            left: ArmMailbox::new(),
            right: ArmMailbox::new(),
        }
    }

    pub fn get(&self, arm: Arm) -> &ArmMailbox<M> {
        match arm {
            Arm::Left => &self.left,
            Arm::Right => &self.right,
        }
    }
}

impl<M: RawMutex> Default for ArmMailboxes<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Execution unit for one arm
pub struct ArmWorker<'a, H: McpwmHal, M: RawMutex> {
    arm: Arm,
    servo: ServoChannel<'a, H>,
    mailbox: &'a ArmMailbox<M>,
}

impl<'a, H: McpwmHal, M: RawMutex> ArmWorker<'a, H, M> {
    pub fn new(arm: Arm, servo: ServoChannel<'a, H>, mailbox: &'a ArmMailbox<M>) -> Self {
        mailbox.publish(&servo);
        Self {
            arm,
            servo,
            mailbox,
        }
    }

    pub fn arm(&self) -> Arm {
        self.arm
    }

    pub fn servo(&self) -> &ServoChannel<'a, H> {
        &self.servo
    }

    /// Take the next request and execute it
    pub async fn process_next<D: DelayNs>(&mut self, delay: &mut D) {
        let request = self.mailbox.requests.receive().await;
        trace!(
            "{} arm: ticket {} {:?} (~{} ms)",
            self.arm.name(),
            request.ticket,
            request.motion,
            request.motion.nominal_duration_ms()
        );

        match request.motion {
            // Report right away; the stop still runs before the next request
            Motion::Quick { speed, duration_ms } => {
                let pending = self.servo.quick_action(speed, duration_ms);
                self.complete(request.ticket);
                if let Some(pending) = pending {
                    pending.complete(&mut self.servo, delay).await;
                    self.mailbox.publish(&self.servo);
                }
            }
            motion => {
                self.servo.perform(motion, delay).await;
                self.complete(request.ticket);
            }
        }
    }

    fn complete(&self, ticket: u32) {
        self.mailbox.publish(&self.servo);
        self.mailbox.completed.signal(ticket);
    }

    /// Serve the mailbox forever
    pub async fn run<D: DelayNs>(mut self, mut delay: D) -> ! {
        info!("{} arm: worker started", self.arm.name());
        loop {
            self.process_next(&mut delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockMcpwm};
    use crate::timebase::Timebase;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use servo360_core::ArmConfig;
    use servo360_hal::TimerConfig;

    const GPIO: u8 = 12;

    #[test]
    fn test_requests_run_in_order() {
        let hal = MockMcpwm::new();
        let timebase = Timebase::new(&hal, TimerConfig::servo(0));
        let mailbox = ArmMailbox::<NoopRawMutex>::new();
        let servo = ServoChannel::new(&timebase, &ArmConfig::new(GPIO));
        let mut worker = ArmWorker::new(Arm::Left, servo, &mailbox);
        let mut delay = MockDelay::new();

        mailbox
            .post(MotionRequest {
                ticket: 1,
                motion: Motion::RawPulse { pulse_us: 1800 },
            })
            .unwrap();
        mailbox
            .post(MotionRequest {
                ticket: 2,
                motion: Motion::Stop,
            })
            .unwrap();

        block_on(worker.process_next(&mut delay));
        assert_eq!(mailbox.speed(), 60);
        block_on(mailbox.wait_for(1));

        block_on(worker.process_next(&mut delay));
        assert_eq!(mailbox.speed(), 0);
        block_on(mailbox.wait_for(2));
        assert_eq!(hal.compare_writes(GPIO), vec![1500, 1800, 1500]);
    }

    #[test]
    fn test_full_mailbox_is_busy() {
        let mailbox = ArmMailbox::<NoopRawMutex>::new();
        for ticket in 0..MAILBOX_DEPTH as u32 {
            mailbox
                .post(MotionRequest {
                    ticket,
                    motion: Motion::Stop,
                })
                .unwrap();
        }
        assert_eq!(mailbox.free_slots(), 0);
        assert_eq!(
            mailbox.post(MotionRequest {
                ticket: 99,
                motion: Motion::Stop
            }),
            Err(CommandError::Busy)
        );
    }

    #[test]
    fn test_wait_skips_older_tickets() {
        let mailbox = ArmMailbox::<NoopRawMutex>::new();
        mailbox.completed.signal(4);
        let mut waited = false;
        block_on(join(
            async {
                mailbox.wait_for(5).await;
                waited = true;
            },
            async {
                embassy_futures::yield_now().await;
                mailbox.completed.signal(5);
            },
        ));
        assert!(waited);
    }

    #[test]
    fn test_wait_handles_ticket_wrap() {
        let mailbox = ArmMailbox::<NoopRawMutex>::new();
        mailbox.completed.signal(2);
        // 2 comes after u32::MAX once the counter wraps
        block_on(mailbox.wait_for(u32::MAX));
    }

    #[test]
    fn test_quick_reports_before_stop() {
        let hal = MockMcpwm::new();
        let timebase = Timebase::new(&hal, TimerConfig::servo(0));
        let mailbox = ArmMailbox::<NoopRawMutex>::new();
        let servo = ServoChannel::new(&timebase, &ArmConfig::new(GPIO));
        let mut worker = ArmWorker::new(Arm::Right, servo, &mailbox);
        let mut delay = MockDelay::new();

        mailbox
            .post(MotionRequest {
                ticket: 1,
                motion: Motion::Quick {
                    speed: 50,
                    duration_ms: 100,
                },
            })
            .unwrap();

        let mut speed_at_report = None;
        block_on(join(worker.process_next(&mut delay), async {
            mailbox.wait_for(1).await;
            speed_at_report = Some(mailbox.speed());
        }));

        assert_eq!(speed_at_report, Some(50));
        assert_eq!(mailbox.speed(), 0);
        assert_eq!(delay.sleeps, vec![100]);
        assert_eq!(hal.compare_writes(GPIO), vec![1500, 1750, 1500]);
    }

    #[test]
    fn test_uninitialized_arm_not_ready() {
        let hal = MockMcpwm::new();
        let timebase = Timebase::new(&hal, TimerConfig::servo(0));
        let mailbox = ArmMailbox::<NoopRawMutex>::new();
        let servo = ServoChannel::new(&timebase, &ArmConfig::default());
        let worker = ArmWorker::new(Arm::Left, servo, &mailbox);

        assert!(!mailbox.is_ready());
        assert!(!worker.servo().is_initialized());
    }
}

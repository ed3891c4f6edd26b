//! Dual-arm command coordinator
//!
//! Resolves commands to per-arm motions and posts them to the arm
//! workers. Single-arm commands wait for their motion to finish; commands
//! for both arms return as soon as both motions are queued, so each arm
//! runs its own copy independently of the other.

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;
use servo360_core::{
    Arm, ArmConfig, CommandArgs, CommandError, ConfigError, GestureCommand, Motion, Request,
    ServoArmsConfig, ServoCalibration, Target,
};
use servo360_hal::McpwmHal;

use crate::servo::ServoChannel;
use crate::timebase::Timebase;
use crate::worker::{ArmMailbox, ArmMailboxes, ArmWorker, MotionRequest};

/// Status snapshot of one arm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArmStatus {
    pub arm: Arm,
    pub gpio: Option<u8>,
    /// Speed after the arm's last completed motion
    pub speed: i32,
    pub initialized: bool,
}

/// Result of a handled request
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// Motion completed (single arm) or launched (both arms)
    Done,
    Status(Vec<ArmStatus, 2>),
}

/// Coordinator plus the two workers it feeds
///
/// The workers must be run as separate tasks for queued motions to make
/// progress.
pub struct ServoArms<'a, H: McpwmHal, M: RawMutex> {
    pub coordinator: DualChannelCoordinator<'a, M>,
    pub left: ArmWorker<'a, H, M>,
    pub right: ArmWorker<'a, H, M>,
}

/// Fans commands out to the left and right arm workers
pub struct DualChannelCoordinator<'a, M: RawMutex> {
    mailboxes: &'a ArmMailboxes<M>,
    gpios: [Option<u8>; 2],
    calibration: ServoCalibration,
    initialized: bool,
    next_ticket: u32,
}

impl<'a, M: RawMutex> DualChannelCoordinator<'a, M> {
    /// Set up both arms on a shared timebase
    ///
    /// The configuration is validated first and the timebase must belong
    /// to the configured timer group; nothing is allocated otherwise. The
    /// coordinator only accepts commands when the timebase is running. An
    /// arm whose channel failed setup still gets a worker; it ignores
    /// every motion.
    pub fn build<H: McpwmHal>(
        timebase: &'a Timebase<'a, H>,
        config: &ServoArmsConfig,
        mailboxes: &'a ArmMailboxes<M>,
    ) -> Result<ServoArms<'a, H, M>, ConfigError> {
        if let Err(e) = config.validate() {
            error!("arms: invalid config: {:?}", e);
            return Err(e);
        }
        let group = timebase.config().group_id;
        if group != config.timer_group {
            error!(
                "arms: timebase in group {}, config expects {}",
                group, config.timer_group
            );
            return Err(ConfigError::TimerGroup(group));
        }

        let worker = |arm: Arm| {
            let arm_config: &ArmConfig = config.arm(arm);
            let servo = ServoChannel::new(timebase, arm_config);
            ArmWorker::new(arm, servo, mailboxes.get(arm))
        };
        let left = worker(Arm::Left);
        let right = worker(Arm::Right);

        let initialized = timebase.is_running();
        if initialized {
            info!(
                "arms: left gpio {:?}, right gpio {:?}",
                config.left.gpio, config.right.gpio
            );
        } else {
            error!("arms: timebase not running, commands will be rejected");
        }

        Ok(ServoArms {
            coordinator: Self {
                mailboxes,
                gpios: [config.left.gpio, config.right.gpio],
                calibration: config.calibration.clone(),
                initialized,
                next_ticket: 0,
            },
            left,
            right,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Calibration used for degree commands
    pub fn calibration(&self) -> &ServoCalibration {
        &self.calibration
    }

    fn mailbox(&self, arm: Arm) -> &'a ArmMailbox<M> {
        self.mailboxes.get(arm)
    }

    /// Check that every arm in `arms` can take `slots` more requests
    fn reserve(&self, arms: &[Arm], slots: usize) -> Result<(), CommandError> {
        match arms.iter().find(|&&arm| self.mailbox(arm).free_slots() < slots) {
            Some(arm) => {
                warn!("arms: {} arm busy", arm.name());
                Err(CommandError::Busy)
            }
            None => Ok(()),
        }
    }

    fn post(&mut self, arm: Arm, motion: Motion) -> Result<u32, CommandError> {
        self.next_ticket = self.next_ticket.wrapping_add(1);
        let ticket = self.next_ticket;
        self.mailbox(arm).post(MotionRequest { ticket, motion })?;
        Ok(ticket)
    }

    /// Post one motion per arm, left then right, without waiting
    fn launch(&mut self, motions: [Motion; 2]) -> Result<(), CommandError> {
        self.reserve(&Arm::ALL, 1)?;
        for (arm, motion) in Arm::ALL.into_iter().zip(motions) {
            self.post(arm, motion)?;
        }
        Ok(())
    }

    /// Post motions to one arm and wait for the last of them
    async fn run_on(&mut self, arm: Arm, motions: &[Motion]) -> Result<(), CommandError> {
        self.reserve(&[arm], motions.len())?;
        let mut last = None;
        for &motion in motions {
            last = Some(self.post(arm, motion)?);
        }
        if let Some(ticket) = last {
            self.mailbox(arm).wait_for(ticket).await;
        }
        Ok(())
    }

    /// Execute a resolved gesture
    pub async fn execute(&mut self, command: GestureCommand) -> Result<(), CommandError> {
        if !self.initialized {
            warn!("arms: not initialized");
            return Err(CommandError::NotInitialized);
        }
        debug!("arms: {:?}", command);

        match command {
            GestureCommand::Move { target, motion } => match target.single() {
                Some(arm) => self.run_on(arm, &[motion]).await,
                None => self.launch([motion, motion]),
            },
            GestureCommand::Combo {
                action,
                speed,
                duration_ms,
            } => self.launch(action.motions(speed, duration_ms)),
            GestureCommand::Mirror {
                action,
                speed,
                duration_ms,
            } => self.launch(action.motions(speed, duration_ms)),
            GestureCommand::Alternate {
                action,
                count,
                speed,
                duration_ms,
            } => {
                let turn = action.turn(speed, duration_ms);
                // Later turns reuse the slots freed by earlier ones
                self.reserve(&Arm::ALL, turn.len())?;
                for _ in 0..count {
                    for arm in Arm::ALL {
                        self.run_on(arm, &turn).await?;
                    }
                }
                Ok(())
            }
            GestureCommand::Diagnose { target, routine } => {
                self.reserve(target.arms(), 1)?;
                for &arm in target.arms() {
                    self.post(arm, Motion::Diagnostic(routine))?;
                }
                Ok(())
            }
        }
    }

    /// Status of the addressed arms, left first
    pub fn status(&self, target: Target) -> Result<Vec<ArmStatus, 2>, CommandError> {
        if !self.initialized {
            return Err(CommandError::NotInitialized);
        }
        let mut report = Vec::new();
        for &arm in target.arms() {
            let mailbox = self.mailbox(arm);
            let status = ArmStatus {
                arm,
                gpio: self.gpios[arm.index()],
                speed: mailbox.speed(),
                initialized: mailbox.is_ready(),
            };
            info!(
                "{} arm: gpio {:?}, speed {}, initialized {}",
                arm.name(),
                status.gpio,
                status.speed,
                status.initialized
            );
            // At most two arms
            let _ = report.push(status);
        }
        Ok(report)
    }

    /// Handle a resolved request
    pub async fn handle(&mut self, request: Request) -> Result<Reply, CommandError> {
        match request {
            Request::Query(target) => self.status(target).map(Reply::Status),
            Request::Gesture(command) => self.execute(command).await.map(|()| Reply::Done),
        }
    }

    /// Resolve a named operation against the configured calibration and
    /// handle it
    pub async fn dispatch(
        &mut self,
        operation: &str,
        args: &CommandArgs<'_>,
    ) -> Result<Reply, CommandError> {
        let request = Request::parse(operation, args, &self.calibration).map_err(|e| {
            warn!("arms: rejected {}: {:?}", operation, e);
            e
        })?;
        self.handle(request).await
    }
}

//! Command vocabulary
//!
//! The dispatch layer hands over an operation name plus loosely typed
//! arguments. [`Request::resolve`] turns them into a closed [`Request`]
//! once, applying per-operation defaults and rejecting bad input before
//! anything reaches an arm.

use crate::calibration::{degree_to_motion, ServoCalibration};
use crate::motion::{Diagnostic, Motion, COMBO_WAVE_COUNT};
use crate::pulse::{clamp_speed, is_raw_pulse_valid};
use crate::target::Target;

/// Command rejection reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Operation name not in the vocabulary
    UnknownOperation,
    /// Target name not recognised
    InvalidTarget,
    /// Action or test type not recognised
    UnknownAction,
    /// A required argument is absent
    MissingArgument,
    /// An argument is out of range
    InvalidArgument,
    /// The arms were never set up
    NotInitialized,
    /// An arm's queue is full
    Busy,
}

/// Named operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    Set,
    QuickSet,
    Wave,
    Raise,
    Salute,
    BackAndForth,
    Combo,
    Alternate,
    Mirror,
    Query,
    TestDirection,
    Calibrate,
    AntiVibrationTest,
    PowerCheck,
    FineTune,
    ContinuousRotationTest,
    Stop,
    Degree,
}

impl Operation {
    const PREFIX: &'static str = "self.servo360.";

    /// Parse an operation name, with or without the tool prefix
    pub fn parse(name: &str) -> Result<Self, CommandError> {
        let name = name.strip_prefix(Self::PREFIX).unwrap_or(name);
        Ok(match name {
            "set" => Operation::Set,
            "quick_set" => Operation::QuickSet,
            "wave" => Operation::Wave,
            "raise" => Operation::Raise,
            "salute" => Operation::Salute,
            "back_and_forth" => Operation::BackAndForth,
            "combo" => Operation::Combo,
            "alternate" => Operation::Alternate,
            "mirror" => Operation::Mirror,
            "query" => Operation::Query,
            "test_direction" => Operation::TestDirection,
            "calibrate" => Operation::Calibrate,
            "anti_vibration_test" => Operation::AntiVibrationTest,
            "power_check" => Operation::PowerCheck,
            "fine_tune" => Operation::FineTune,
            "continuous_rotation_test" => Operation::ContinuousRotationTest,
            "stop" => Operation::Stop,
            "degree" => Operation::Degree,
            _ => return Err(CommandError::UnknownOperation),
        })
    }
}

/// Raw arguments from the dispatch layer
///
/// Every field is optional; absent fields take the operation's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandArgs<'a> {
    pub target: Option<&'a str>,
    pub action: Option<&'a str>,
    pub speed: Option<i32>,
    pub duration_ms: Option<i32>,
    pub count: Option<i32>,
    pub pulse_width_us: Option<i32>,
    pub test_type: Option<&'a str>,
    pub direction: Option<&'a str>,
    pub start_pulse_us: Option<i32>,
    pub end_pulse_us: Option<i32>,
    pub step_us: Option<i32>,
    pub degree: Option<i32>,
}

impl<'a> CommandArgs<'a> {
    /// Arguments addressed at a target
    pub fn for_target(target: &'a str) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    fn target(&self) -> Result<Target, CommandError> {
        let name = self.target.ok_or(CommandError::MissingArgument)?;
        Target::parse(name).ok_or(CommandError::InvalidTarget)
    }

    fn speed(&self) -> Result<i32, CommandError> {
        self.speed.map(clamp_speed).ok_or(CommandError::MissingArgument)
    }

    fn speed_or(&self, default: i32) -> i32 {
        clamp_speed(self.speed.unwrap_or(default))
    }

    fn positive_duration_or(&self, default: i32) -> Result<i32, CommandError> {
        positive(self.duration_ms.unwrap_or(default))
    }

    fn action(&self) -> Result<&'a str, CommandError> {
        self.action.ok_or(CommandError::MissingArgument)
    }
}

fn positive(value: i32) -> Result<i32, CommandError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(CommandError::InvalidArgument)
    }
}

/// Two-arm combination gestures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComboAction {
    /// Left raises while right waves
    RaiseWave,
    /// Left waves while right raises
    WaveRaise,
    Wave,
    Raise,
    Salute,
}

impl ComboAction {
    pub fn parse(name: &str) -> Result<Self, CommandError> {
        match name {
            "raise_wave" | "举手挥手" | "combo" => Ok(ComboAction::RaiseWave),
            "wave_raise" | "挥手举手" => Ok(ComboAction::WaveRaise),
            "wave" | "挥手" => Ok(ComboAction::Wave),
            "raise" | "举手" => Ok(ComboAction::Raise),
            "salute" | "敬礼" => Ok(ComboAction::Salute),
            _ => Err(CommandError::UnknownAction),
        }
    }

    /// Per-arm motions, left then right
    pub fn motions(self, speed: i32, duration_ms: i32) -> [Motion; 2] {
        let raise = Motion::Raise { speed, duration_ms };
        let wave = Motion::Wave {
            speed,
            duration_ms: duration_ms / 2,
            count: COMBO_WAVE_COUNT,
        };
        match self {
            ComboAction::RaiseWave => [raise, wave],
            ComboAction::WaveRaise => [wave, raise],
            ComboAction::Wave => [wave, wave],
            ComboAction::Raise => [raise, raise],
            ComboAction::Salute => {
                let salute = Motion::Salute { speed, duration_ms };
                [salute, salute]
            }
        }
    }
}

/// Gestures that take turns between the arms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlternateAction {
    Wave,
    Raise,
}

impl AlternateAction {
    pub fn parse(name: &str) -> Result<Self, CommandError> {
        match name {
            "wave" | "挥手" => Ok(AlternateAction::Wave),
            "raise" | "举手" => Ok(AlternateAction::Raise),
            _ => Err(CommandError::UnknownAction),
        }
    }

    /// Motions one arm performs on its turn
    ///
    /// An arm's turn ends when all of them have completed.
    pub fn turn(self, speed: i32, duration_ms: i32) -> [Motion; 2] {
        match self {
            AlternateAction::Wave => [
                Motion::Run { speed, duration_ms },
                Motion::Run {
                    speed: speed.saturating_neg(),
                    duration_ms,
                },
            ],
            AlternateAction::Raise => [
                Motion::Raise { speed, duration_ms },
                Motion::Pause {
                    duration_ms: duration_ms.max(0) as u32,
                },
            ],
        }
    }
}

/// Symmetric two-arm gestures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MirrorAction {
    Wave,
    Raise,
    Salute,
}

impl MirrorAction {
    pub fn parse(name: &str) -> Result<Self, CommandError> {
        match name {
            "wave" | "挥手" => Ok(MirrorAction::Wave),
            "raise" | "举手" => Ok(MirrorAction::Raise),
            "salute" | "敬礼" => Ok(MirrorAction::Salute),
            _ => Err(CommandError::UnknownAction),
        }
    }

    /// Per-arm motions, left then right
    pub fn motions(self, speed: i32, duration_ms: i32) -> [Motion; 2] {
        match self {
            MirrorAction::Wave => {
                let swing = |speed| Motion::Swing {
                    speed,
                    duration_ms,
                    cycles: crate::motion::MIRROR_WAVE_CYCLES,
                };
                [swing(speed), swing(speed.saturating_neg())]
            }
            MirrorAction::Raise => [Motion::Raise { speed, duration_ms }; 2],
            MirrorAction::Salute => [Motion::Salute { speed, duration_ms }; 2],
        }
    }
}

/// A resolved motion command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GestureCommand {
    /// The same motion on every addressed arm
    Move { target: Target, motion: Motion },
    /// A different motion per arm, launched together
    Combo {
        action: ComboAction,
        speed: i32,
        duration_ms: i32,
    },
    /// Arms take turns, one waiting for the other
    Alternate {
        action: AlternateAction,
        count: i32,
        speed: i32,
        duration_ms: i32,
    },
    /// Symmetric motions launched together
    Mirror {
        action: MirrorAction,
        speed: i32,
        duration_ms: i32,
    },
    /// A bench routine, launched without waiting
    Diagnose { target: Target, routine: Diagnostic },
}

/// Anything the coordinator can be asked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    Gesture(GestureCommand),
    /// Status snapshot of the addressed arms
    Query(Target),
}

impl Request {
    /// Resolve an operation and its arguments
    pub fn resolve(
        op: Operation,
        args: &CommandArgs<'_>,
        calibration: &ServoCalibration,
    ) -> Result<Self, CommandError> {
        use GestureCommand::*;

        let gesture = match op {
            Operation::Query => return Ok(Request::Query(args.target()?)),
            Operation::Set => {
                let target = args.target()?;
                let speed = args.speed()?;
                let duration_ms = positive(args.duration_ms.ok_or(CommandError::MissingArgument)?)?;
                Move {
                    target,
                    motion: Motion::Run { speed, duration_ms },
                }
            }
            Operation::QuickSet => Move {
                target: args.target()?,
                motion: Motion::Quick {
                    speed: args.speed()?,
                    duration_ms: args.positive_duration_or(100)?,
                },
            },
            Operation::Wave => Move {
                target: args.target()?,
                motion: Motion::Wave {
                    speed: args.speed_or(80),
                    duration_ms: args.positive_duration_or(400)?,
                    count: positive(args.count.unwrap_or(3))?,
                },
            },
            Operation::Raise => Move {
                target: args.target()?,
                motion: Motion::Raise {
                    speed: args.speed_or(80),
                    duration_ms: args.positive_duration_or(600)?,
                },
            },
            Operation::Salute => Move {
                target: args.target()?,
                motion: Motion::Salute {
                    speed: args.speed_or(80),
                    duration_ms: args.positive_duration_or(500)?,
                },
            },
            // Non-positive values reach the primitive, which ignores them
            Operation::BackAndForth => Move {
                target: args.target()?,
                motion: Motion::BackAndForth {
                    speed: args.speed_or(80),
                    duration_ms: args.duration_ms.unwrap_or(300),
                    count: args.count.unwrap_or(2),
                },
            },
            Operation::Combo => Combo {
                action: ComboAction::parse(args.action()?)?,
                speed: args.speed_or(80),
                duration_ms: args.positive_duration_or(500)?,
            },
            Operation::Alternate => Alternate {
                action: AlternateAction::parse(args.action()?)?,
                count: positive(args.count.unwrap_or(3))?,
                speed: args.speed_or(80),
                duration_ms: args.positive_duration_or(300)?,
            },
            Operation::Mirror => Mirror {
                action: MirrorAction::parse(args.action()?)?,
                speed: args.speed_or(80),
                duration_ms: args.positive_duration_or(500)?,
            },
            Operation::TestDirection => Diagnose {
                target: args.target()?,
                routine: Diagnostic::DirectionTest {
                    speed: args.speed_or(50),
                    duration_ms: args.positive_duration_or(500)?,
                },
            },
            Operation::Calibrate => {
                let target = args.target()?;
                let pulse = args.pulse_width_us.unwrap_or(1500);
                let pulse_us = u32::try_from(pulse).map_err(|_| CommandError::InvalidArgument)?;
                if !is_raw_pulse_valid(pulse_us) {
                    return Err(CommandError::InvalidArgument);
                }
                Move {
                    target,
                    motion: Motion::RawPulse { pulse_us },
                }
            }
            Operation::AntiVibrationTest => Diagnose {
                target: args.target()?,
                routine: Diagnostic::anti_vibration(args.test_type.unwrap_or("gradual"))?,
            },
            Operation::PowerCheck => Diagnose {
                target: args.target()?,
                routine: Diagnostic::PowerCheck,
            },
            Operation::FineTune => {
                let target = args.target()?;
                let reverse = match args.direction.unwrap_or("forward") {
                    "forward" => false,
                    "reverse" => true,
                    _ => return Err(CommandError::UnknownAction),
                };
                Diagnose {
                    target,
                    routine: Diagnostic::fine_tune(
                        reverse,
                        args.start_pulse_us.unwrap_or(1500),
                        args.end_pulse_us.unwrap_or(1700),
                        args.step_us.unwrap_or(25),
                    )?,
                }
            }
            Operation::ContinuousRotationTest => Diagnose {
                target: args.target()?,
                routine: Diagnostic::continuous_rotation(
                    args.test_type.unwrap_or("speed_test"),
                )?,
            },
            Operation::Stop => Move {
                target: args.target()?,
                motion: Motion::Stop,
            },
            Operation::Degree => {
                let target = args.target()?;
                let degree = args.degree.ok_or(CommandError::MissingArgument)?;
                let (speed, duration) = degree_to_motion(degree, calibration);
                let duration_ms = positive(i32::try_from(duration).unwrap_or(i32::MAX))?;
                Move {
                    target,
                    motion: Motion::Run { speed, duration_ms },
                }
            }
        };

        Ok(Request::Gesture(gesture))
    }

    /// Parse an operation name and resolve it in one go
    pub fn parse(
        name: &str,
        args: &CommandArgs<'_>,
        calibration: &ServoCalibration,
    ) -> Result<Self, CommandError> {
        Self::resolve(Operation::parse(name)?, args, calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str, args: CommandArgs<'_>) -> Result<Request, CommandError> {
        Request::parse(name, &args, &ServoCalibration::default())
    }

    fn gesture(name: &str, args: CommandArgs<'_>) -> GestureCommand {
        match resolve(name, args).unwrap() {
            Request::Gesture(g) => g,
            other => panic!("expected a gesture, got {other:?}"),
        }
    }

    #[test]
    fn test_operation_prefix() {
        assert_eq!(Operation::parse("self.servo360.wave"), Ok(Operation::Wave));
        assert_eq!(Operation::parse("fine_tune"), Ok(Operation::FineTune));
        assert_eq!(
            Operation::parse("self.servo360.dance"),
            Err(CommandError::UnknownOperation)
        );
    }

    #[test]
    fn test_set_requires_duration() {
        let args = CommandArgs {
            speed: Some(40),
            ..CommandArgs::for_target("left")
        };
        assert_eq!(resolve("set", args), Err(CommandError::MissingArgument));

        let zero = CommandArgs {
            duration_ms: Some(0),
            ..args
        };
        assert_eq!(resolve("set", zero), Err(CommandError::InvalidArgument));

        let ok = CommandArgs {
            duration_ms: Some(1000),
            ..args
        };
        assert_eq!(
            gesture("set", ok),
            GestureCommand::Move {
                target: Target::Left,
                motion: Motion::Run {
                    speed: 40,
                    duration_ms: 1000
                }
            }
        );
    }

    #[test]
    fn test_wave_defaults() {
        assert_eq!(
            gesture("wave", CommandArgs::for_target("both_hands")),
            GestureCommand::Move {
                target: Target::Both,
                motion: Motion::Wave {
                    speed: 80,
                    duration_ms: 400,
                    count: 3
                }
            }
        );
    }

    #[test]
    fn test_wave_rejects_zero_count() {
        let args = CommandArgs {
            count: Some(0),
            ..CommandArgs::for_target("left")
        };
        assert_eq!(resolve("wave", args), Err(CommandError::InvalidArgument));
    }

    #[test]
    fn test_extreme_speeds_are_clamped() {
        let slowest = CommandArgs {
            speed: Some(i32::MIN),
            ..CommandArgs::for_target("left")
        };
        assert_eq!(
            gesture("wave", slowest),
            GestureCommand::Move {
                target: Target::Left,
                motion: Motion::Wave {
                    speed: -100,
                    duration_ms: 400,
                    count: 3
                }
            }
        );

        let fastest = CommandArgs {
            speed: Some(i32::MAX),
            ..CommandArgs::for_target("right")
        };
        assert_eq!(
            gesture("quick_set", fastest),
            GestureCommand::Move {
                target: Target::Right,
                motion: Motion::Quick {
                    speed: 100,
                    duration_ms: 100
                }
            }
        );

        let alternate = CommandArgs {
            action: Some("wave"),
            ..slowest
        };
        assert_eq!(
            gesture("alternate", alternate),
            GestureCommand::Alternate {
                action: AlternateAction::Wave,
                count: 3,
                speed: -100,
                duration_ms: 300
            }
        );
    }

    #[test]
    fn test_reverse_legs_saturate() {
        let [_, back] = AlternateAction::Wave.turn(i32::MIN, 100);
        assert_eq!(
            back,
            Motion::Run {
                speed: i32::MAX,
                duration_ms: 100
            }
        );

        let [left, right] = MirrorAction::Wave.motions(i32::MIN, 100);
        assert!(matches!(left, Motion::Swing { speed: i32::MIN, .. }));
        assert!(matches!(right, Motion::Swing { speed: i32::MAX, .. }));
    }

    #[test]
    fn test_target_errors() {
        assert_eq!(
            resolve("raise", CommandArgs::default()),
            Err(CommandError::MissingArgument)
        );
        assert_eq!(
            resolve("raise", CommandArgs::for_target("tail")),
            Err(CommandError::InvalidTarget)
        );
    }

    #[test]
    fn test_query() {
        assert_eq!(
            resolve("query", CommandArgs::for_target("RIGHT_ARM")),
            Ok(Request::Query(Target::Right))
        );
    }

    #[test]
    fn test_combo_actions() {
        let args = CommandArgs {
            action: Some("举手挥手"),
            ..CommandArgs::default()
        };
        let GestureCommand::Combo {
            action,
            speed,
            duration_ms,
        } = gesture("combo", args)
        else {
            panic!("expected combo");
        };
        assert_eq!(action, ComboAction::RaiseWave);
        assert_eq!(
            action.motions(speed, duration_ms),
            [
                Motion::Raise {
                    speed: 80,
                    duration_ms: 500
                },
                Motion::Wave {
                    speed: 80,
                    duration_ms: 250,
                    count: 2
                }
            ]
        );
        assert_eq!(
            resolve("combo", CommandArgs::default()),
            Err(CommandError::MissingArgument)
        );
        let unknown = CommandArgs {
            action: Some("dance"),
            ..CommandArgs::default()
        };
        assert_eq!(resolve("combo", unknown), Err(CommandError::UnknownAction));
    }

    #[test]
    fn test_mirror_wave_is_opposed() {
        let [left, right] = MirrorAction::Wave.motions(80, 500);
        assert_eq!(
            left,
            Motion::Swing {
                speed: 80,
                duration_ms: 500,
                cycles: 3
            }
        );
        assert_eq!(
            right,
            Motion::Swing {
                speed: -80,
                duration_ms: 500,
                cycles: 3
            }
        );
    }

    #[test]
    fn test_alternate_raise_turn_pauses() {
        assert_eq!(
            AlternateAction::Raise.turn(80, 300),
            [
                Motion::Raise {
                    speed: 80,
                    duration_ms: 300
                },
                Motion::Pause { duration_ms: 300 }
            ]
        );
    }

    #[test]
    fn test_calibrate_window() {
        let args = |pulse| CommandArgs {
            pulse_width_us: Some(pulse),
            ..CommandArgs::for_target("left")
        };
        assert_eq!(resolve("calibrate", args(999)), Err(CommandError::InvalidArgument));
        assert_eq!(resolve("calibrate", args(-1)), Err(CommandError::InvalidArgument));
        assert_eq!(
            gesture("calibrate", args(2000)),
            GestureCommand::Move {
                target: Target::Left,
                motion: Motion::RawPulse { pulse_us: 2000 }
            }
        );
        assert_eq!(
            gesture("calibrate", CommandArgs::for_target("left")),
            GestureCommand::Move {
                target: Target::Left,
                motion: Motion::RawPulse { pulse_us: 1500 }
            }
        );
    }

    #[test]
    fn test_fine_tune_direction() {
        let args = CommandArgs {
            direction: Some("reverse"),
            ..CommandArgs::for_target("right")
        };
        assert_eq!(
            gesture("fine_tune", args),
            GestureCommand::Diagnose {
                target: Target::Right,
                routine: Diagnostic::FineTune {
                    from_us: 1700,
                    to_us: 1500,
                    step_us: 25
                }
            }
        );
        let sideways = CommandArgs {
            direction: Some("sideways"),
            ..CommandArgs::for_target("right")
        };
        assert_eq!(resolve("fine_tune", sideways), Err(CommandError::UnknownAction));
    }

    #[test]
    fn test_diagnostic_defaults() {
        assert_eq!(
            gesture("anti_vibration_test", CommandArgs::for_target("left")),
            GestureCommand::Diagnose {
                target: Target::Left,
                routine: Diagnostic::Gradual
            }
        );
        assert_eq!(
            gesture("continuous_rotation_test", CommandArgs::for_target("both")),
            GestureCommand::Diagnose {
                target: Target::Both,
                routine: Diagnostic::SpeedTest
            }
        );
        assert_eq!(
            gesture("test_direction", CommandArgs::for_target("hand")),
            GestureCommand::Diagnose {
                target: Target::Both,
                routine: Diagnostic::DirectionTest {
                    speed: 50,
                    duration_ms: 500
                }
            }
        );
    }

    #[test]
    fn test_degree_uses_calibration() {
        let mut calibration = ServoCalibration::new(60, 3000);
        calibration.insert(90, 700).unwrap();
        let args = CommandArgs {
            degree: Some(-90),
            ..CommandArgs::for_target("left_hand")
        };
        assert_eq!(
            Request::parse("degree", &args, &calibration),
            Ok(Request::Gesture(GestureCommand::Move {
                target: Target::Left,
                motion: Motion::Run {
                    speed: -60,
                    duration_ms: 700
                }
            }))
        );

        let zero = CommandArgs {
            degree: Some(0),
            ..args
        };
        assert_eq!(
            Request::parse("degree", &zero, &calibration),
            Err(CommandError::InvalidArgument)
        );
    }

    #[test]
    fn test_back_and_forth_passes_values_through() {
        let args = CommandArgs {
            count: Some(0),
            ..CommandArgs::for_target("left")
        };
        assert_eq!(
            gesture("back_and_forth", args),
            GestureCommand::Move {
                target: Target::Left,
                motion: Motion::BackAndForth {
                    speed: 80,
                    duration_ms: 300,
                    count: 0
                }
            }
        );
    }
}

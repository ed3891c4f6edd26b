//! Per-arm motion requests
//!
//! A [`Motion`] is what one arm's worker executes. Gestures that involve
//! both arms are split into one motion per arm before they reach a worker.
//!
//! Diagnostic routines are described here as a lazily generated sequence
//! of [`Step`]s so their timing can be checked without hardware.

use crate::command::CommandError;
use crate::pulse::is_raw_pulse_valid;

/// Sleep slice used by timed runs
pub const STEP_SLICE_MS: u32 = 100;

/// Pause after each half of a wave
pub const WAVE_PAUSE_MS: u32 = 100;

/// Delay before a quick action's deferred stop
pub const QUICK_STOP_DELAY_MS: u32 = 100;

/// Pause between the two halves of a direction test
pub const DIRECTION_TEST_PAUSE_MS: u32 = 200;

/// Forward/reverse cycles in a mirrored wave
pub const MIRROR_WAVE_CYCLES: u32 = 3;

/// Repetitions of a wave inside a combo gesture
pub const COMBO_WAVE_COUNT: i32 = 2;

/// Time each pulse width is held during a fine-tune sweep
pub const FINE_TUNE_HOLD_MS: u32 = 2000;

/// One arm's share of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Motion {
    /// Timed run with stall-zone snapping
    Run { speed: i32, duration_ms: i32 },
    /// Set the speed now, stop shortly after
    Quick { speed: i32, duration_ms: i32 },
    /// Forward/reverse oscillation with pauses
    Wave {
        speed: i32,
        duration_ms: i32,
        count: i32,
    },
    /// Forward/reverse oscillation using raw speed changes
    BackAndForth {
        speed: i32,
        duration_ms: i32,
        count: i32,
    },
    Raise { speed: i32, duration_ms: i32 },
    Salute { speed: i32, duration_ms: i32 },
    /// Back-to-back forward/reverse runs without pauses
    Swing {
        speed: i32,
        duration_ms: i32,
        cycles: u32,
    },
    /// Hold the arm's queue without moving
    Pause { duration_ms: u32 },
    /// Write a pulse width directly
    RawPulse { pulse_us: u32 },
    Stop,
    Diagnostic(Diagnostic),
}

impl Motion {
    /// Approximate time the motion keeps its arm busy
    pub fn nominal_duration_ms(&self) -> u64 {
        let ms = |d: i32| d.max(0) as u64;
        match *self {
            Motion::Run { duration_ms, .. }
            | Motion::Raise { duration_ms, .. }
            | Motion::Salute { duration_ms, .. } => ms(duration_ms),
            Motion::Quick { .. } => QUICK_STOP_DELAY_MS as u64,
            Motion::Wave {
                duration_ms, count, ..
            } => (2 * ms(duration_ms) + 2 * WAVE_PAUSE_MS as u64) * count.max(0) as u64,
            Motion::BackAndForth {
                duration_ms, count, ..
            } => 2 * ms(duration_ms) * count.max(0) as u64,
            Motion::Swing {
                duration_ms,
                cycles,
                ..
            } => 2 * ms(duration_ms) * cycles as u64,
            Motion::Pause { duration_ms } => duration_ms as u64,
            Motion::RawPulse { .. } | Motion::Stop => 0,
            Motion::Diagnostic(routine) => routine.steps().map(|s| s.duration_ms()).sum(),
        }
    }
}

/// One step of a diagnostic routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Timed run, stops on exit
    Run { speed: i32, duration_ms: i32 },
    /// Idle wait
    Pause { duration_ms: u32 },
    /// Raw pulse width held for a while
    Pulse { pulse_us: u32, hold_ms: u32 },
    Stop,
}

impl Step {
    fn duration_ms(&self) -> u64 {
        match *self {
            Step::Run { duration_ms, .. } => duration_ms.max(0) as u64,
            Step::Pause { duration_ms } => duration_ms as u64,
            Step::Pulse { hold_ms, .. } => hold_ms as u64,
            Step::Stop => 0,
        }
    }
}

const GRADUAL_SPEEDS: [i32; 5] = [10, 20, 30, 40, 50];
const SWEEP_PULSES: [u32; 13] = [
    1500, 1550, 1600, 1650, 1700, 1750, 1800, 1450, 1400, 1350, 1300, 1250, 1200,
];
const SPEED_TEST_SPEEDS: [i32; 6] = [10, 20, 30, 50, 70, 100];
const RANGE_TEST_PULSES: [u32; 11] = [
    1500, 1600, 1700, 1800, 1900, 2000, 1400, 1300, 1200, 1100, 1000,
];
const POWER_LOADS: [i32; 3] = [10, 30, 50];

/// Bench routines for tuning a servo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    /// Run forward, pause, run reverse
    DirectionTest { speed: i32, duration_ms: i32 },
    /// Speeds 10..=50 in both directions, 1 s each
    Gradual,
    /// Fixed pulse widths around the stop point, 1 s each
    PulseSweep,
    /// Five long runs at a moderate speed
    Stability,
    /// Increasing load followed by a raw pulse hold
    PowerCheck,
    /// Raw pulse sweep from `from_us` toward `to_us`
    FineTune { from_us: u32, to_us: u32, step_us: u32 },
    /// Speeds 10..=100 in both directions, 2 s each
    SpeedTest,
    /// The full pulse range, 2 s each
    PulseRangeTest,
    /// Three 5 s runs
    Endurance,
}

impl Diagnostic {
    /// Resolve an anti-vibration test type
    pub fn anti_vibration(test_type: &str) -> Result<Self, CommandError> {
        match test_type {
            "gradual" => Ok(Diagnostic::Gradual),
            "pulse_width" => Ok(Diagnostic::PulseSweep),
            "stability" => Ok(Diagnostic::Stability),
            _ => Err(CommandError::UnknownAction),
        }
    }

    /// Resolve a continuous-rotation test type
    pub fn continuous_rotation(test_type: &str) -> Result<Self, CommandError> {
        match test_type {
            "speed_test" => Ok(Diagnostic::SpeedTest),
            "pulse_test" => Ok(Diagnostic::PulseRangeTest),
            "continuous_test" => Ok(Diagnostic::Endurance),
            _ => Err(CommandError::UnknownAction),
        }
    }

    /// Build a fine-tune sweep
    ///
    /// `start_us` must be at least 1000 µs, `end_us` at most 2000 µs and
    /// `step_us` positive. A reverse sweep runs from `end_us` down to
    /// `start_us`.
    pub fn fine_tune(
        reverse: bool,
        start_us: i32,
        end_us: i32,
        step_us: i32,
    ) -> Result<Self, CommandError> {
        if start_us < 1000 || end_us > 2000 || step_us <= 0 || start_us > end_us {
            return Err(CommandError::InvalidArgument);
        }
        let (start, end) = (start_us as u32, end_us as u32);
        let (from_us, to_us) = if reverse { (end, start) } else { (start, end) };
        Ok(Diagnostic::FineTune {
            from_us,
            to_us,
            step_us: step_us as u32,
        })
    }

    /// The step at `index`, or `None` past the end of the routine
    pub fn step(&self, index: usize) -> Option<Step> {
        match *self {
            Diagnostic::DirectionTest { speed, duration_ms } => match index {
                0 => Some(Step::Run { speed, duration_ms }),
                1 => Some(Step::Pause {
                    duration_ms: DIRECTION_TEST_PAUSE_MS,
                }),
                2 => Some(Step::Run {
                    speed: speed.saturating_neg(),
                    duration_ms,
                }),
                _ => None,
            },
            Diagnostic::Gradual => {
                let speed = *GRADUAL_SPEEDS.get(index / 4)?;
                Some(match index % 4 {
                    0 => Step::Run {
                        speed,
                        duration_ms: 1000,
                    },
                    2 => Step::Run {
                        speed: speed.saturating_neg(),
                        duration_ms: 1000,
                    },
                    _ => Step::Pause { duration_ms: 500 },
                })
            }
            Diagnostic::PulseSweep => pulses_then_stop(&SWEEP_PULSES, 1000, index),
            Diagnostic::Stability => {
                if index >= 10 {
                    return None;
                }
                Some(if index % 2 == 0 {
                    Step::Run {
                        speed: 30,
                        duration_ms: 2000,
                    }
                } else {
                    Step::Pause { duration_ms: 1000 }
                })
            }
            Diagnostic::PowerCheck => match index {
                0..=5 => Some(if index % 2 == 0 {
                    Step::Run {
                        speed: POWER_LOADS[index / 2],
                        duration_ms: 500,
                    }
                } else {
                    Step::Pause { duration_ms: 1000 }
                }),
                6 => Some(Step::Pulse {
                    pulse_us: 1600,
                    hold_ms: 2000,
                }),
                7 => Some(Step::Stop),
                _ => None,
            },
            Diagnostic::FineTune {
                from_us,
                to_us,
                step_us,
            } => {
                let count = (from_us.abs_diff(to_us) / step_us.max(1)) as usize + 1;
                if index < count {
                    let offset = step_us.saturating_mul(index as u32);
                    let pulse_us = if from_us <= to_us {
                        from_us + offset
                    } else {
                        from_us - offset
                    };
                    Some(Step::Pulse {
                        pulse_us,
                        hold_ms: FINE_TUNE_HOLD_MS,
                    })
                } else if index == count {
                    Some(Step::Stop)
                } else {
                    None
                }
            }
            Diagnostic::SpeedTest => {
                if index == SPEED_TEST_SPEEDS.len() * 4 {
                    return Some(Step::Stop);
                }
                let speed = *SPEED_TEST_SPEEDS.get(index / 4)?;
                Some(match index % 4 {
                    0 => Step::Run {
                        speed,
                        duration_ms: 2000,
                    },
                    2 => Step::Run {
                        speed: speed.saturating_neg(),
                        duration_ms: 2000,
                    },
                    _ => Step::Pause { duration_ms: 1000 },
                })
            }
            Diagnostic::PulseRangeTest => pulses_then_stop(&RANGE_TEST_PULSES, 2000, index),
            Diagnostic::Endurance => match index {
                0..=5 => Some(if index % 2 == 0 {
                    Step::Run {
                        speed: 50,
                        duration_ms: 5000,
                    }
                } else {
                    Step::Pause { duration_ms: 2000 }
                }),
                6 => Some(Step::Stop),
                _ => None,
            },
        }
    }

    /// Iterate over the routine's steps
    pub fn steps(&self) -> Steps {
        Steps {
            routine: *self,
            index: 0,
        }
    }

    /// Check that every raw pulse the routine writes is in range
    pub fn pulses_in_range(&self) -> bool {
        self.steps().all(|step| match step {
            Step::Pulse { pulse_us, .. } => is_raw_pulse_valid(pulse_us),
            _ => true,
        })
    }
}

fn pulses_then_stop(pulses: &[u32], hold_ms: u32, index: usize) -> Option<Step> {
    match pulses.get(index) {
        Some(&pulse_us) => Some(Step::Pulse { pulse_us, hold_ms }),
        None if index == pulses.len() => Some(Step::Stop),
        None => None,
    }
}

/// Iterator over a diagnostic routine
#[derive(Debug, Clone)]
pub struct Steps {
    routine: Diagnostic,
    index: usize,
}

impl Iterator for Steps {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        let step = self.routine.step(self.index)?;
        self.index += 1;
        Some(step)
    }
}

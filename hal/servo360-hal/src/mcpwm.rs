//! Motor-control PWM abstractions
//!
//! The peripheral model is the one used by motor-control PWM blocks: a
//! timer provides the time base, an operator connects to a timer, a
//! comparator belongs to an operator and a generator drives one GPIO from
//! the operator's events.
//!
//! All methods take `&self`. Implementations own the register access and
//! are expected to be shared by reference between every channel that uses
//! the same PWM group.

/// Timer tick rate used for servos: 1 MHz, so one tick is one microsecond
pub const SERVO_RESOLUTION_HZ: u32 = 1_000_000;

/// Timer period for servos: 20 000 ticks = 20 ms (50 Hz)
pub const SERVO_PERIOD_TICKS: u32 = 20_000;

/// Errors reported by the PWM peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McpwmError {
    /// An argument was rejected by the driver
    InvalidArgument,
    /// No free operator, comparator, generator or timer in the group
    NoFreeResource,
    /// The resource is in the wrong state for this call
    InvalidState,
    /// Chip-specific error code
    Hardware(i32),
}

/// Shared timer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    /// PWM group the timer belongs to
    pub group_id: u8,
    /// Tick rate in Hz
    pub resolution_hz: u32,
    /// Ticks per period (count-up mode)
    pub period_ticks: u32,
}

impl TimerConfig {
    /// 50 Hz servo timer with one-microsecond ticks
    pub const fn servo(group_id: u8) -> Self {
        Self {
            group_id,
            resolution_hz: SERVO_RESOLUTION_HZ,
            period_ticks: SERVO_PERIOD_TICKS,
        }
    }

    /// PWM frequency in Hz
    pub const fn frequency_hz(&self) -> u32 {
        if self.period_ticks == 0 {
            0
        } else {
            self.resolution_hz / self.period_ticks
        }
    }

    /// Convert a pulse width in microseconds to timer ticks
    pub const fn ticks_for_us(&self, pulse_us: u32) -> u32 {
        ((pulse_us as u64 * self.resolution_hz as u64) / 1_000_000) as u32
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::servo(0)
    }
}

/// Motor-control PWM group
///
/// Handles are opaque to the caller. Deleting a handle consumes it, so a
/// released resource cannot be used again.
pub trait McpwmHal {
    /// Timer handle
    type Timer;
    /// Operator handle
    type Operator;
    /// Comparator handle
    type Comparator;
    /// Generator handle
    type Generator;

    /// Allocate a timer in count-up mode
    fn new_timer(&self, config: &TimerConfig) -> Result<Self::Timer, McpwmError>;

    /// Enable the timer's clock
    fn enable_timer(&self, timer: &Self::Timer) -> Result<(), McpwmError>;

    /// Start the timer running without a stop condition
    fn start_timer(&self, timer: &Self::Timer) -> Result<(), McpwmError>;

    /// Stop and disable the timer
    fn disable_timer(&self, timer: &Self::Timer) -> Result<(), McpwmError>;

    /// Release the timer
    fn del_timer(&self, timer: Self::Timer) -> Result<(), McpwmError>;

    /// Allocate an operator in the given group
    fn new_operator(&self, group_id: u8) -> Result<Self::Operator, McpwmError>;

    /// Bind an operator to a timer
    fn connect_timer(
        &self,
        operator: &Self::Operator,
        timer: &Self::Timer,
    ) -> Result<(), McpwmError>;

    /// Allocate a comparator on an operator
    ///
    /// The compare value must only be latched when the timer counts to zero,
    /// so a new pulse width never truncates the current period.
    fn new_comparator(&self, operator: &Self::Operator) -> Result<Self::Comparator, McpwmError>;

    /// Allocate a generator on an operator, driving `gpio`
    fn new_generator(
        &self,
        operator: &Self::Operator,
        gpio: u8,
    ) -> Result<Self::Generator, McpwmError>;

    /// Set the comparator's compare value in timer ticks
    fn set_compare_value(&self, comparator: &Self::Comparator, ticks: u32)
        -> Result<(), McpwmError>;

    /// Configure the generator waveform
    ///
    /// Output goes high when the timer is empty (counting up) and low when
    /// the timer reaches `comparator`'s value.
    fn set_generator_actions(
        &self,
        generator: &Self::Generator,
        comparator: &Self::Comparator,
    ) -> Result<(), McpwmError>;

    /// Release a generator
    fn del_generator(&self, generator: Self::Generator) -> Result<(), McpwmError>;

    /// Release a comparator
    fn del_comparator(&self, comparator: Self::Comparator) -> Result<(), McpwmError>;

    /// Release an operator
    fn del_operator(&self, operator: Self::Operator) -> Result<(), McpwmError>;
}

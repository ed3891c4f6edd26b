//! Test doubles for the PWM peripheral and the delay source

use core::cell::{Cell, RefCell};

use embassy_futures::yield_now;
use embedded_hal_async::delay::DelayNs;
use servo360_hal::{McpwmError, McpwmHal, TimerConfig};

/// A peripheral call that succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    NewTimer { id: u32 },
    EnableTimer(u32),
    StartTimer(u32),
    DisableTimer(u32),
    DelTimer(u32),
    NewOperator { id: u32, group: u8 },
    ConnectTimer { operator: u32, timer: u32 },
    NewComparator { id: u32, operator: u32 },
    NewGenerator { id: u32, operator: u32, gpio: u8 },
    SetCompare { comparator: u32, ticks: u32 },
    SetActions { generator: u32, comparator: u32 },
    DelGenerator(u32),
    DelComparator(u32),
    DelOperator(u32),
}

/// Where to inject a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    NewTimer,
    EnableTimer,
    StartTimer,
    NewOperator,
    ConnectTimer,
    NewComparator,
    NewGenerator,
    SetCompare,
    SetActions,
}

/// Recording PWM peripheral
pub struct MockMcpwm {
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u32>,
    fail: Cell<Option<FailPoint>>,
}

impl MockMcpwm {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            fail: Cell::new(None),
        }
    }

    /// Fail every call at `point` until cleared
    pub fn fail_at(&self, point: FailPoint) {
        self.fail.set(Some(point));
    }

    pub fn clear_failure(&self) {
        self.fail.set(None);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Handles allocated and not yet released
    pub fn live_handles(&self) -> usize {
        let calls = self.calls.borrow();
        let allocated = calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::NewTimer { .. }
                        | Call::NewOperator { .. }
                        | Call::NewComparator { .. }
                        | Call::NewGenerator { .. }
                )
            })
            .count();
        let released = calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::DelTimer(_)
                        | Call::DelOperator(_)
                        | Call::DelComparator(_)
                        | Call::DelGenerator(_)
                )
            })
            .count();
        allocated - released
    }

    /// Comparator driving `gpio`
    pub fn comparator_for(&self, gpio: u8) -> Option<u32> {
        let calls = self.calls.borrow();
        let operator = calls.iter().find_map(|c| match *c {
            Call::NewGenerator { operator, gpio: g, .. } if g == gpio => Some(operator),
            _ => None,
        })?;
        calls.iter().find_map(|c| match *c {
            Call::NewComparator { id, operator: o } if o == operator => Some(id),
            _ => None,
        })
    }

    /// Compare values written for the output on `gpio`, in order
    pub fn compare_writes(&self, gpio: u8) -> Vec<u32> {
        let Some(comparator) = self.comparator_for(gpio) else {
            return Vec::new();
        };
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match *c {
                Call::SetCompare { comparator: id, ticks } if id == comparator => Some(ticks),
                _ => None,
            })
            .collect()
    }

    /// Last compare value written for `gpio`
    pub fn last_compare(&self, gpio: u8) -> Option<u32> {
        self.compare_writes(gpio).last().copied()
    }

    fn check(&self, point: FailPoint) -> Result<(), McpwmError> {
        if self.fail.get() == Some(point) {
            Err(McpwmError::Hardware(-1))
        } else {
            Ok(())
        }
    }

    fn allocate(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl McpwmHal for MockMcpwm {
    type Timer = u32;
    type Operator = u32;
    type Comparator = u32;
    type Generator = u32;

    fn new_timer(&self, _config: &TimerConfig) -> Result<u32, McpwmError> {
        self.check(FailPoint::NewTimer)?;
        let id = self.allocate();
        self.record(Call::NewTimer { id });
        Ok(id)
    }

    fn enable_timer(&self, timer: &u32) -> Result<(), McpwmError> {
        self.check(FailPoint::EnableTimer)?;
        self.record(Call::EnableTimer(*timer));
        Ok(())
    }

    fn start_timer(&self, timer: &u32) -> Result<(), McpwmError> {
        self.check(FailPoint::StartTimer)?;
        self.record(Call::StartTimer(*timer));
        Ok(())
    }

    fn disable_timer(&self, timer: &u32) -> Result<(), McpwmError> {
        self.record(Call::DisableTimer(*timer));
        Ok(())
    }

    fn del_timer(&self, timer: u32) -> Result<(), McpwmError> {
        self.record(Call::DelTimer(timer));
        Ok(())
    }

    fn new_operator(&self, group_id: u8) -> Result<u32, McpwmError> {
        self.check(FailPoint::NewOperator)?;
        let id = self.allocate();
        self.record(Call::NewOperator { id, group: group_id });
        Ok(id)
    }

    fn connect_timer(&self, operator: &u32, timer: &u32) -> Result<(), McpwmError> {
        self.check(FailPoint::ConnectTimer)?;
        self.record(Call::ConnectTimer {
            operator: *operator,
            timer: *timer,
        });
        Ok(())
    }

    fn new_comparator(&self, operator: &u32) -> Result<u32, McpwmError> {
        self.check(FailPoint::NewComparator)?;
        let id = self.allocate();
        self.record(Call::NewComparator {
            id,
            operator: *operator,
        });
        Ok(id)
    }

    fn new_generator(&self, operator: &u32, gpio: u8) -> Result<u32, McpwmError> {
        self.check(FailPoint::NewGenerator)?;
        let id = self.allocate();
        self.record(Call::NewGenerator {
            id,
            operator: *operator,
            gpio,
        });
        Ok(id)
    }

    fn set_compare_value(&self, comparator: &u32, ticks: u32) -> Result<(), McpwmError> {
        self.check(FailPoint::SetCompare)?;
        self.record(Call::SetCompare {
            comparator: *comparator,
            ticks,
        });
        Ok(())
    }

    fn set_generator_actions(&self, generator: &u32, comparator: &u32) -> Result<(), McpwmError> {
        self.check(FailPoint::SetActions)?;
        self.record(Call::SetActions {
            generator: *generator,
            comparator: *comparator,
        });
        Ok(())
    }

    fn del_generator(&self, generator: u32) -> Result<(), McpwmError> {
        self.record(Call::DelGenerator(generator));
        Ok(())
    }

    fn del_comparator(&self, comparator: u32) -> Result<(), McpwmError> {
        self.record(Call::DelComparator(comparator));
        Ok(())
    }

    fn del_operator(&self, operator: u32) -> Result<(), McpwmError> {
        self.record(Call::DelOperator(operator));
        Ok(())
    }
}

/// Delay source on a virtual clock
///
/// Every sleep is recorded and yields once, so concurrently joined futures
/// interleave.
#[derive(Debug, Default)]
pub struct MockDelay {
    pub sleeps: Vec<u32>,
    pub elapsed_ms: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.sleeps.push(ms);
        self.elapsed_ms += ms as u64;
        yield_now().await;
    }
}

//! A plotter that only records what it was asked to do.
//!
//! Used for `--dry-run` (unrecorded) and as the device double in tests.
//! Faults and pauses can be scripted to exercise the driver's
//! interruption paths.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::device::{DeviceError, Plotter, Units};

/// One call made on a [`SimulatedPlotter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// [`Plotter::connect`].
    Connect,
    /// [`Plotter::disconnect`].
    Disconnect,
    /// [`Plotter::set_units`].
    SetUnits(Units),
    /// [`Plotter::move_to`].
    MoveTo(f64, f64),
    /// [`Plotter::pen_down`].
    PenDown,
    /// [`Plotter::pen_up`].
    PenUp,
}

/// Shared view of the calls a [`SimulatedPlotter`] received.
///
/// Stays readable after the plotter itself has been handed to the driver.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    /// Snapshot of all calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    /// Number of calls equal to `call`.
    #[must_use]
    pub fn count(&self, call: &Call) -> usize {
        self.0.borrow().iter().filter(|c| *c == call).count()
    }

    /// Every position the pen was lowered at, in order.
    #[must_use]
    pub fn pen_down_positions(&self) -> Vec<(f64, f64)> {
        let calls = self.0.borrow();
        let mut at = (0.0, 0.0);
        let mut marks = Vec::new();
        for call in calls.iter() {
            match call {
                Call::MoveTo(x, y) => at = (*x, *y),
                Call::PenDown => marks.push(at),
                _ => {}
            }
        }
        marks
    }
}

/// A plotter without hardware.
#[derive(Debug, Default)]
pub struct SimulatedPlotter {
    log: CallLog,
    unrecorded: bool,
    refuse_connection: bool,
    fail_on_pen_down: Option<usize>,
    pause_after: Option<usize>,
    pen_downs: usize,
}

impl SimulatedPlotter {
    /// A plotter that accepts every command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop recording calls, keeping memory flat over long runs. The log
    /// stays empty; calls are still traced.
    #[must_use]
    pub fn unrecorded(mut self) -> Self {
        self.unrecorded = true;
        self
    }

    /// Make [`Plotter::connect`] report that no device is present.
    #[must_use]
    pub fn refuse_connection(mut self) -> Self {
        self.refuse_connection = true;
        self
    }

    /// Fail the `n`th pen-down (1-based) with a device error.
    #[must_use]
    pub fn fail_on_pen_down(mut self, n: usize) -> Self {
        self.fail_on_pen_down = Some(n);
        self
    }

    /// Report the pause button as pressed once `n` pen-downs are done.
    #[must_use]
    pub fn pause_after(mut self, n: usize) -> Self {
        self.pause_after = Some(n);
        self
    }

    /// A handle on the call log.
    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn record(&self, call: Call) {
        trace!(?call, "simulated plotter");
        if !self.unrecorded {
            self.log.0.borrow_mut().push(call);
        }
    }
}

impl Plotter for SimulatedPlotter {
    fn connect(&mut self) -> Result<bool, DeviceError> {
        self.record(Call::Connect);
        Ok(!self.refuse_connection)
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.record(Call::Disconnect);
        Ok(())
    }

    fn set_units(&mut self, units: Units) -> Result<(), DeviceError> {
        self.record(Call::SetUnits(units));
        Ok(())
    }

    fn move_to(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        self.record(Call::MoveTo(x, y));
        Ok(())
    }

    fn pen_down(&mut self) -> Result<(), DeviceError> {
        if self.fail_on_pen_down == Some(self.pen_downs + 1) {
            return Err(DeviceError::Simulated(format!(
                "pen-down {} failed",
                self.pen_downs + 1
            )));
        }
        self.pen_downs += 1;
        self.record(Call::PenDown);
        Ok(())
    }

    fn pen_up(&mut self) -> Result<(), DeviceError> {
        self.record(Call::PenUp);
        Ok(())
    }

    fn is_paused(&mut self) -> Result<bool, DeviceError> {
        Ok(self.pause_after.is_some_and(|n| self.pen_downs >= n))
    }
}

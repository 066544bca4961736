//! pixplot-plotter: Drive a pen plotter through a plot plan.
//!
//! Holds everything that touches the outside world on the plotting side:
//! the [`Plotter`] device interface and its backends, the
//! [`PlotDriver`] that sequences pen-downs, the [`RecoveryStore`] that
//! persists unplotted work, and the [`CancellationToken`] an interrupt
//! handler uses to stop a run between positions.

pub mod cancel;
pub mod device;
pub mod driver;
pub mod ebb;
pub mod recovery;
pub mod simulated;

pub use cancel::CancellationToken;
pub use device::{DeviceError, Plotter, Units};
pub use driver::{DriverError, PlotDriver, PlotOutcome, Progress};
pub use ebb::{EbbPlotter, EbbSettings};
pub use recovery::{RecoveryError, RecoveryStore};
pub use simulated::{Call, CallLog, SimulatedPlotter};

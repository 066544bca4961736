//! The plot driver: sequences pen-downs against a device.
//!
//! A [`PlotDriver`] exists only while its device is connected. Running a
//! plan consumes the driver, and however the run ends the device is sent
//! home and disconnected exactly once.
//!
//! Progress is tracked as a working remainder of positions not yet
//! plotted. A position leaves the remainder only after its pen-down and
//! pen-up both succeeded. When the loop ends with anything left, whether
//! by cancellation, a device pause, or a device error, the remainder is
//! written to the [`RecoveryStore`] before cleanup.

use std::collections::VecDeque;

use pixplot_pipeline::{PlotPlan, Position};
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::device::{DeviceError, Plotter, Units};
use crate::recovery::{RecoveryError, RecoveryStore};

/// Progress after one completed pen-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Positions completed in this run.
    pub completed: usize,
    /// Positions in this run's plan.
    pub total: usize,
    /// The position just plotted.
    pub position: Position,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotOutcome {
    /// Every position was plotted. No snapshot was written.
    Completed,
    /// The operator interrupted the run; the remainder was saved.
    Cancelled {
        /// Positions left in the snapshot.
        remaining: usize,
    },
    /// The device stopped early (pause button); the remainder was saved.
    Paused {
        /// Positions left in the snapshot.
        remaining: usize,
    },
}

/// Errors that end a plot run.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The device did not answer as a plotter.
    #[error("plotter not found or not responding")]
    NotConnected,

    /// A device command failed.
    #[error("plotter failed: {0}")]
    Device(#[from] DeviceError),

    /// The remainder could not be saved.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Returning home or disconnecting failed.
    #[error("failed to return home and disconnect: {0}")]
    Cleanup(#[source] DeviceError),
}

/// Why the plotting loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Finished,
    Cancelled,
    Paused,
}

/// Drives one connected plotter through one plan.
pub struct PlotDriver<'a, P: Plotter> {
    device: P,
    on_progress: Option<Box<dyn FnMut(&Progress) + 'a>>,
}

impl<P: Plotter> std::fmt::Debug for PlotDriver<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotDriver").finish_non_exhaustive()
    }
}

impl<'a, P: Plotter> PlotDriver<'a, P> {
    /// Connect to `device` and switch it to centimeters.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotConnected`] if the device reports it is
    /// not there, and [`DriverError::Device`] if talking to it fails.
    pub fn connect(mut device: P) -> Result<Self, DriverError> {
        if !device.connect()? {
            return Err(DriverError::NotConnected);
        }
        if let Err(e) = device.set_units(Units::Centimeters) {
            let _ = device.disconnect();
            return Err(e.into());
        }
        info!("plotter connected");
        Ok(Self {
            device,
            on_progress: None,
        })
    }

    /// Call `callback` after every completed pen-down.
    #[must_use]
    pub fn on_progress(mut self, callback: impl FnMut(&Progress) + 'a) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Disconnect without moving, e.g. when the operator declines to
    /// start.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Cleanup`] if disconnecting fails.
    pub fn abandon(mut self) -> Result<(), DriverError> {
        debug!("disconnecting without plotting");
        self.device.disconnect().map_err(DriverError::Cleanup)
    }

    /// Plot every position of `plan` in order.
    ///
    /// `cancel` and the device's pause state are checked before each
    /// position. When the run ends with positions left, they are saved to
    /// `store`. The device then returns to the origin and disconnects,
    /// on every path.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Device`] if a device command fails during
    /// plotting, [`DriverError::Recovery`] if the remainder could not be
    /// saved, and [`DriverError::Cleanup`] if returning home or
    /// disconnecting fails. An earlier error in that list wins; the
    /// others are logged.
    pub fn run(
        mut self,
        plan: &PlotPlan,
        store: &RecoveryStore,
        cancel: &CancellationToken,
    ) -> Result<PlotOutcome, DriverError> {
        let mut remaining: VecDeque<Position> = plan.iter().copied().collect();
        info!(positions = plan.len(), "plotting");

        let plotted = self.plot(&mut remaining, cancel);

        // Saved however the loop ended.
        let saved = if remaining.is_empty() {
            Ok(())
        } else {
            warn!(
                remaining = remaining.len(),
                path = %store.path().display(),
                "aborting, saving unplotted positions"
            );
            store.save(&remaining)
        };

        let released = self.release();

        let exit = match plotted {
            Ok(exit) => exit,
            Err(e) => {
                if let Err(save_err) = &saved {
                    error!(%save_err, "unplotted positions were lost");
                }
                if let Err(release_err) = &released {
                    warn!(%release_err, "cleanup after device failure also failed");
                }
                return Err(DriverError::Device(e));
            }
        };
        saved?;
        released.map_err(DriverError::Cleanup)?;

        let outcome = match (exit, remaining.len()) {
            (_, 0) => PlotOutcome::Completed,
            (LoopExit::Cancelled, remaining) => PlotOutcome::Cancelled { remaining },
            (LoopExit::Paused | LoopExit::Finished, remaining) => {
                PlotOutcome::Paused { remaining }
            }
        };
        info!(?outcome, "plot finished");
        Ok(outcome)
    }

    /// The plotting loop. Positions leave `remaining` as they complete.
    fn plot(
        &mut self,
        remaining: &mut VecDeque<Position>,
        cancel: &CancellationToken,
    ) -> Result<LoopExit, DeviceError> {
        let total = remaining.len();
        let mut completed = 0;
        while let Some(&position) = remaining.front() {
            if cancel.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }
            if self.device.is_paused()? {
                return Ok(LoopExit::Paused);
            }

            self.device.move_to(position.x_cm(), position.y_cm())?;
            self.device.pen_down()?;
            self.device.pen_up()?;
            remaining.pop_front();
            completed += 1;

            if let Some(callback) = self.on_progress.as_mut() {
                callback(&Progress {
                    completed,
                    total,
                    position,
                });
            }
        }
        Ok(LoopExit::Finished)
    }

    /// Return to the origin and disconnect. Both are attempted once, even
    /// if the first fails.
    fn release(&mut self) -> Result<(), DeviceError> {
        let home = self.device.move_to(0.0, 0.0);
        let disconnect = self.device.disconnect();
        home.and(disconnect)
    }
}

//! The pen plotter device interface.
//!
//! The driver only needs a handful of primitives from a device: connect,
//! configure units, move, lower and raise the pen, disconnect. Each
//! backend implements [`Plotter`]; the driver is generic over it.

/// Length unit used for [`Plotter::move_to`] coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    /// Inches, the native unit of AxiDraw-class machines.
    Inches,
    /// Centimeters. Plot plans are expressed in centimeters.
    #[default]
    Centimeters,
    /// Millimeters.
    Millimeters,
}

impl Units {
    /// How many of this unit make up one inch.
    #[must_use]
    pub const fn per_inch(self) -> f64 {
        match self {
            Self::Inches => 1.0,
            Self::Centimeters => 2.54,
            Self::Millimeters => 25.4,
        }
    }
}

/// Errors reported by a plotter device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Reading from or writing to the device failed.
    #[error("device I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered a command with something other than an
    /// acknowledgement.
    #[error("device rejected `{command}`: {response:?}")]
    Protocol {
        /// The command that was sent, without its terminator.
        command: String,
        /// What the device answered.
        response: String,
    },

    /// A motion command was issued while disconnected.
    #[error("device is not connected")]
    NotConnected,

    /// A simulated fault, injected by [`SimulatedPlotter`](crate::SimulatedPlotter).
    #[error("simulated device fault: {0}")]
    Simulated(String),
}

/// A pen plotter.
///
/// Calls block until the device has accepted the command. There are no
/// timeouts: a device that never answers blocks forever.
pub trait Plotter {
    /// Open the connection. Returns `false` if the device is not there or
    /// does not identify as a supported plotter.
    ///
    /// # Errors
    ///
    /// Returns an error if talking to the device fails outright.
    fn connect(&mut self) -> Result<bool, DeviceError>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be released cleanly.
    fn disconnect(&mut self) -> Result<(), DeviceError>;

    /// Set the unit for subsequent [`move_to`](Self::move_to) calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the configuration.
    fn set_units(&mut self, units: Units) -> Result<(), DeviceError>;

    /// Travel to an absolute position, relative to the home corner.
    ///
    /// # Errors
    ///
    /// Returns an error if the move cannot be sent or is rejected.
    fn move_to(&mut self, x: f64, y: f64) -> Result<(), DeviceError>;

    /// Lower the pen onto the surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent or is rejected.
    fn pen_down(&mut self) -> Result<(), DeviceError>;

    /// Lift the pen off the surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent or is rejected.
    fn pen_up(&mut self) -> Result<(), DeviceError>;

    /// Whether the operator paused the plot on the device itself.
    ///
    /// Devices without a pause control never report a pause.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn is_paused(&mut self) -> Result<bool, DeviceError> {
        Ok(false)
    }
}

impl<P: Plotter + ?Sized> Plotter for Box<P> {
    fn connect(&mut self) -> Result<bool, DeviceError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        (**self).disconnect()
    }

    fn set_units(&mut self, units: Units) -> Result<(), DeviceError> {
        (**self).set_units(units)
    }

    fn move_to(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        (**self).move_to(x, y)
    }

    fn pen_down(&mut self) -> Result<(), DeviceError> {
        (**self).pen_down()
    }

    fn pen_up(&mut self) -> Result<(), DeviceError> {
        (**self).pen_up()
    }

    fn is_paused(&mut self) -> Result<bool, DeviceError> {
        (**self).is_paused()
    }
}

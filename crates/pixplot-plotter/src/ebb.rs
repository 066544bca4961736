//! EiBotBoard (EBB) backend, the controller inside AxiDraw plotters.
//!
//! The EBB speaks a line-based ASCII protocol over a USB serial port.
//! Commands end in `\r`; the board answers each one with `OK\r\n`, or
//! with a value line followed by `OK` for queries. Only the handful of
//! commands a pixel plot needs are used:
//!
//! | Command | Meaning |
//! |---|---|
//! | `V` | firmware version, used as the connect handshake |
//! | `EM,1,1` | enable both motors at 1/16 microstepping |
//! | `SP,0,<ms>` / `SP,1,<ms>` | pen down / pen up, then wait `<ms>` |
//! | `SM,<ms>,<a>,<b>` | move motors A and B by the given steps |
//! | `QB` | was the pause button pressed since the last query |
//!
//! AxiDraw uses mixed-axis (CoreXY style) kinematics: motor A moves
//! `x + y` steps and motor B moves `x - y` steps.
//!
//! The port must already be in raw mode (e.g. `stty -F /dev/ttyACM0 raw`)
//! when it is opened as a plain file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::device::{DeviceError, Plotter, Units};

/// Motor steps per inch at 1/16 microstepping.
pub const STEPS_PER_INCH: f64 = 2032.0;

/// Tuning for the EBB backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EbbSettings {
    /// Pen-up travel speed in inches per second.
    pub speed_inches_per_sec: f64,
    /// Time to wait after the pen servo moves, in milliseconds.
    pub pen_delay_ms: u32,
}

impl EbbSettings {
    /// Default travel speed in inches per second.
    pub const DEFAULT_SPEED: f64 = 3.0;

    /// Default servo settle time in milliseconds.
    pub const DEFAULT_PEN_DELAY_MS: u32 = 150;
}

impl Default for EbbSettings {
    fn default() -> Self {
        Self {
            speed_inches_per_sec: Self::DEFAULT_SPEED,
            pen_delay_ms: Self::DEFAULT_PEN_DELAY_MS,
        }
    }
}

/// An AxiDraw driven through its EBB serial protocol.
///
/// Generic over the port so the protocol can be exercised against an
/// in-memory stream.
#[derive(Debug)]
pub struct EbbPlotter<P: Read + Write> {
    port: BufReader<P>,
    settings: EbbSettings,
    units: Units,
    connected: bool,
    /// Current carriage position in motor steps along x and y.
    steps: (i64, i64),
}

impl EbbPlotter<File> {
    /// Open a serial device node, e.g. `/dev/ttyACM0`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Io`] if the device node cannot be opened.
    pub fn open(path: impl AsRef<Path>, settings: EbbSettings) -> Result<Self, DeviceError> {
        let port = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::new(port, settings))
    }
}

impl<P: Read + Write> EbbPlotter<P> {
    /// Wrap an already opened port.
    pub fn new(port: P, settings: EbbSettings) -> Self {
        Self {
            port: BufReader::new(port),
            settings,
            units: Units::default(),
            connected: false,
            steps: (0, 0),
        }
    }

    /// Consumes the plotter and returns the underlying port.
    pub fn into_inner(self) -> P {
        self.port.into_inner()
    }

    /// Send one command and return the first line of the answer.
    fn send(&mut self, command: &str) -> Result<String, DeviceError> {
        trace!(command, "ebb send");
        let port = self.port.get_mut();
        port.write_all(command.as_bytes())?;
        port.write_all(b"\r")?;
        port.flush()?;
        self.read_line()
    }

    /// Send a command that answers with a bare `OK`.
    fn command(&mut self, command: &str) -> Result<(), DeviceError> {
        let response = self.send(command)?;
        expect_ok(command, response)
    }

    /// Send a query that answers with a value line, then `OK`.
    fn query(&mut self, command: &str) -> Result<String, DeviceError> {
        let value = self.send(command)?;
        let ack = self.read_line()?;
        expect_ok(command, ack)?;
        Ok(value)
    }

    fn read_line(&mut self) -> Result<String, DeviceError> {
        let mut line = String::new();
        if self.port.read_line(&mut line)? == 0 {
            return Err(DeviceError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        let line = line.trim().to_owned();
        trace!(response = %line, "ebb recv");
        Ok(line)
    }

    fn ensure_connected(&self) -> Result<(), DeviceError> {
        if self.connected {
            Ok(())
        } else {
            Err(DeviceError::NotConnected)
        }
    }

    fn pen(&mut self, state: u8) -> Result<(), DeviceError> {
        self.ensure_connected()?;
        let command = format!("SP,{state},{}", self.settings.pen_delay_ms);
        self.command(&command)
    }
}

impl<P: Read + Write> Plotter for EbbPlotter<P> {
    fn connect(&mut self) -> Result<bool, DeviceError> {
        let version = self.send("V")?;
        if !version.starts_with("EBB") {
            debug!(%version, "device did not identify as an EiBotBoard");
            return Ok(false);
        }
        debug!(%version, "connected");
        self.command("EM,1,1")?;
        self.connected = true;
        self.steps = (0, 0);
        Ok(true)
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        if self.connected {
            self.connected = false;
            self.port.get_mut().flush()?;
            debug!("disconnected");
        }
        Ok(())
    }

    fn set_units(&mut self, units: Units) -> Result<(), DeviceError> {
        self.units = units;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn move_to(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        self.ensure_connected()?;
        let scale = STEPS_PER_INCH / self.units.per_inch();
        let target = ((x * scale).round() as i64, (y * scale).round() as i64);
        let (dx, dy) = (target.0 - self.steps.0, target.1 - self.steps.1);
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        #[allow(clippy::cast_precision_loss)]
        let inches = (dx as f64).hypot(dy as f64) / STEPS_PER_INCH;
        let millis = (inches / self.settings.speed_inches_per_sec * 1000.0)
            .ceil()
            .max(1.0) as u64;
        let command = format!("SM,{millis},{},{}", dx + dy, dx - dy);
        self.command(&command)?;
        self.steps = target;
        Ok(())
    }

    fn pen_down(&mut self) -> Result<(), DeviceError> {
        self.pen(0)
    }

    fn pen_up(&mut self) -> Result<(), DeviceError> {
        self.pen(1)
    }

    fn is_paused(&mut self) -> Result<bool, DeviceError> {
        self.ensure_connected()?;
        let pressed = self.query("QB")?;
        match pressed.as_str() {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(DeviceError::Protocol {
                command: "QB".to_owned(),
                response: pressed,
            }),
        }
    }
}

fn expect_ok(command: &str, response: String) -> Result<(), DeviceError> {
    if response == "OK" {
        Ok(())
    } else {
        Err(DeviceError::Protocol {
            command: command.to_owned(),
            response,
        })
    }
}

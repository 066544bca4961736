//! Shared types for the pixplot analysis pipeline.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationRule;

/// Number of coordinate steps per centimeter kept after rounding.
///
/// Positions are rounded to two decimal places so that equality holds
/// across recovery round-trips.
const HUNDREDTHS_PER_CM: f64 = 100.0;

/// A physical pen-down coordinate on the plotting surface.
///
/// Stored as whole hundredths of a centimeter, which makes equality,
/// hashing, and ordering exact. Serialized as an `[x, y]` pair of
/// centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Position {
    x: i64,
    y: i64,
}

impl Position {
    /// The plotter's home position.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a position from centimeter coordinates, rounding each to
    /// two decimal places.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_cm(x: f64, y: f64) -> Self {
        Self {
            x: (x * HUNDREDTHS_PER_CM).round() as i64,
            y: (y * HUNDREDTHS_PER_CM).round() as i64,
        }
    }

    /// Horizontal coordinate in centimeters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn x_cm(self) -> f64 {
        self.x as f64 / HUNDREDTHS_PER_CM
    }

    /// Vertical coordinate in centimeters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn y_cm(self) -> f64 {
        self.y as f64 / HUNDREDTHS_PER_CM
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self::from_cm(x, y)
    }
}

impl From<Position> for (f64, f64) {
    fn from(p: Position) -> Self {
        (p.x_cm(), p.y_cm())
    }
}

/// The ordered pen-down positions for one plot job.
///
/// Positions are unique. Order is the physical plotting order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Position>", into = "Vec<Position>")]
pub struct PlotPlan(Vec<Position>);

impl PlotPlan {
    /// Build a plan from positions in plotting order.
    ///
    /// Repeated positions are dropped, keeping the first occurrence.
    #[must_use]
    pub fn from_positions(positions: impl IntoIterator<Item = Position>) -> Self {
        let mut seen = HashSet::new();
        Self(positions.into_iter().filter(|p| seen.insert(*p)).collect())
    }

    /// Returns `true` if there is nothing to plot.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of pen-downs in the plan.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all positions in plotting order.
    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.0
    }

    /// Iterate over the positions in plotting order.
    pub fn iter(&self) -> std::slice::Iter<'_, Position> {
        self.0.iter()
    }

    /// Count the positions of `other` that are not part of this plan.
    ///
    /// A recovery snapshot taken from this plan always yields zero.
    #[must_use]
    pub fn count_foreign(&self, other: &Self) -> usize {
        let own: HashSet<&Position> = self.0.iter().collect();
        other.0.iter().filter(|p| !own.contains(p)).count()
    }

    /// Consumes the plan and returns the underlying positions.
    #[must_use]
    pub fn into_positions(self) -> Vec<Position> {
        self.0
    }
}

impl From<Vec<Position>> for PlotPlan {
    fn from(positions: Vec<Position>) -> Self {
        Self::from_positions(positions)
    }
}

impl From<PlotPlan> for Vec<Position> {
    fn from(plan: PlotPlan) -> Self {
        plan.0
    }
}

impl<'a> IntoIterator for &'a PlotPlan {
    type Item = &'a Position;
    type IntoIter = std::slice::Iter<'a, Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Pixel layout of a decoded source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    /// One 8-bit intensity per pixel.
    Grayscale,
    /// One palette index per pixel.
    Indexed,
    /// Three 8-bit channels per pixel.
    Rgb,
}

impl ColorMode {
    /// Human-readable description used in statistics reports.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Grayscale => "L (8bit pixels, black and white)",
            Self::Indexed => "P (8bit pixels, mapped to palette)",
            Self::Rgb => "RGB (3x8-bit pixels, true color)",
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Grayscale => "grayscale",
            Self::Indexed => "indexed",
            Self::Rgb => "rgb",
        };
        f.write_str(name)
    }
}

/// Configuration for analysing an image and estimating plot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Physical distance in centimeters covered by one source pixel.
    pub resolution: f64,

    /// Grayscale pixels strictly darker than this value are marks.
    pub gray_threshold: u8,

    /// Palette index that marks a pen-down in indexed images.
    pub foreground_index: u8,

    /// Empirical plotting rate in pen-downs per second.
    pub duration_factor: f64,
}

impl PlotConfig {
    /// Default physical size of one pixel in centimeters.
    pub const DEFAULT_RESOLUTION: f64 = 0.05;

    /// Default grayscale threshold. Near-white counts as background.
    pub const DEFAULT_GRAY_THRESHOLD: u8 = 250;

    /// Default foreground palette index (two-color line art).
    pub const DEFAULT_FOREGROUND_INDEX: u8 = 1;

    /// Default plotting rate in pen-downs per second.
    pub const DEFAULT_DURATION_FACTOR: f64 = 2.5;

    /// Finest resolution that survives two-decimal rounding without
    /// merging neighbouring pixels.
    pub const MIN_RESOLUTION: f64 = 0.01;

    /// Coarsest resolution that still yields one pixel per centimeter.
    pub const MAX_RESOLUTION: f64 = 1.0;

    /// Check the configuration before any work begins.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the resolution is not a
    /// finite value within
    /// [`MIN_RESOLUTION`](Self::MIN_RESOLUTION)..=[`MAX_RESOLUTION`](Self::MAX_RESOLUTION),
    /// or if the duration factor is not finite and positive.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.resolution.is_finite()
            || !(Self::MIN_RESOLUTION..=Self::MAX_RESOLUTION).contains(&self.resolution)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "resolution must be between {} and {} cm per pixel, got {}",
                Self::MIN_RESOLUTION,
                Self::MAX_RESOLUTION,
                self.resolution,
            )));
        }
        if !self.duration_factor.is_finite() || self.duration_factor <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "duration factor must be positive, got {}",
                self.duration_factor,
            )));
        }
        Ok(())
    }

    /// Whole source pixels per physical centimeter.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixels_per_cm(&self) -> u32 {
        (1.0 / self.resolution).floor() as u32
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            resolution: Self::DEFAULT_RESOLUTION,
            gray_threshold: Self::DEFAULT_GRAY_THRESHOLD,
            foreground_index: Self::DEFAULT_FOREGROUND_INDEX,
            duration_factor: Self::DEFAULT_DURATION_FACTOR,
        }
    }
}

/// Result of analysing one source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Dimensions of the source image in pixels.
    pub dimensions: Dimensions,

    /// Color mode the image was decoded in.
    pub color_mode: ColorMode,

    /// The rule pixels were classified with.
    pub rule: ClassificationRule,

    /// Every pen-down position in plotting order.
    pub plan: PlotPlan,
}

/// Errors that can occur while analysing an image.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image uses a pixel layout that cannot be classified.
    #[error("image mode {0} not supported, expected grayscale, palette or RGB")]
    UnsupportedColorMode(String),

    /// An RGB image was given without a color to isolate.
    #[error("RGB images need a target color (-r, -g, -b)")]
    MissingTargetColor,

    /// The classification rule does not apply to the image's color mode.
    #[error("classification rule {rule} cannot be applied to a {mode} image")]
    RuleModeMismatch {
        /// The rule that was requested.
        rule: ClassificationRule,
        /// The image's color mode.
        mode: ColorMode,
    },

    /// Configuration is invalid.
    #[error("invalid plot configuration: {0}")]
    InvalidConfig(String),
}

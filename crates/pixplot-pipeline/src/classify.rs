//! Pixel classification into pen-down positions.
//!
//! Every pixel is either a mark or background. Marks become
//! [`Position`]s in physical centimeters, visited column by column:
//! x ascending in the outer loop, y ascending in the inner loop. The
//! plotting order, and therefore the meaning of a recovery snapshot,
//! depends on this traversal, so it must not change.

use serde::{Deserialize, Serialize};

use crate::decode::Raster;
use crate::types::{ColorMode, PipelineError, PlotConfig, PlotPlan, Position};

/// How a pixel is decided to be a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationRule {
    /// Grayscale: intensity strictly below `below` is a mark.
    Threshold {
        /// Exclusive upper bound on marked intensities.
        below: u8,
    },
    /// Indexed: pixels with exactly this palette index are marks.
    PaletteIndex(u8),
    /// RGB: pixels with exactly this color are marks.
    Color([u8; 3]),
}

impl ClassificationRule {
    /// Pick the rule for the raster's color mode.
    ///
    /// `target_color` selects the layer to isolate from an RGB image and
    /// is ignored for the other modes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingTargetColor`] for an RGB raster
    /// without a target color.
    pub fn for_raster(
        raster: &Raster,
        config: &PlotConfig,
        target_color: Option<[u8; 3]>,
    ) -> Result<Self, PipelineError> {
        match raster.color_mode() {
            ColorMode::Grayscale => Ok(Self::Threshold {
                below: config.gray_threshold,
            }),
            ColorMode::Indexed => Ok(Self::PaletteIndex(config.foreground_index)),
            ColorMode::Rgb => match target_color {
                Some(color) => Ok(Self::Color(color)),
                None => Err(PipelineError::MissingTargetColor),
            },
        }
    }

    /// The color mode this rule applies to.
    #[must_use]
    pub const fn color_mode(self) -> ColorMode {
        match self {
            Self::Threshold { .. } => ColorMode::Grayscale,
            Self::PaletteIndex(_) => ColorMode::Indexed,
            Self::Color(_) => ColorMode::Rgb,
        }
    }
}

impl std::fmt::Display for ClassificationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threshold { below } => write!(f, "intensity < {below}"),
            Self::PaletteIndex(index) => write!(f, "palette index == {index}"),
            Self::Color([r, g, b]) => write!(f, "color == {r},{g},{b}"),
        }
    }
}

/// Classify every pixel and return the marks as a [`PlotPlan`].
///
/// Pixel `(px, py)` maps to `(px * resolution, py * resolution)`
/// centimeters, rounded to two decimals. An image without marks yields
/// an empty plan.
///
/// # Errors
///
/// Returns [`PipelineError::RuleModeMismatch`] if `rule` does not apply to
/// the raster's color mode.
pub fn classify(
    raster: &Raster,
    rule: ClassificationRule,
    resolution: f64,
) -> Result<PlotPlan, PipelineError> {
    let is_mark: Box<dyn Fn(u32, u32) -> bool + '_> = match (raster, rule) {
        (Raster::Gray(img), ClassificationRule::Threshold { below }) => {
            Box::new(move |x, y| img.get_pixel(x, y).0[0] < below)
        }
        (
            Raster::Indexed {
                width, indices, ..
            },
            ClassificationRule::PaletteIndex(foreground),
        ) => {
            let width = *width as usize;
            Box::new(move |x, y| indices[y as usize * width + x as usize] == foreground)
        }
        (Raster::Rgb(img), ClassificationRule::Color(target)) => {
            Box::new(move |x, y| img.get_pixel(x, y).0 == target)
        }
        _ => {
            return Err(PipelineError::RuleModeMismatch {
                rule,
                mode: raster.color_mode(),
            });
        }
    };

    let dimensions = raster.dimensions();
    let positions = (0..dimensions.width).flat_map(|x| {
        let is_mark = &is_mark;
        (0..dimensions.height)
            .filter(move |&y| is_mark(x, y))
            .map(move |y| {
                Position::from_cm(f64::from(x) * resolution, f64::from(y) * resolution)
            })
    });
    Ok(PlotPlan::from_positions(positions))
}

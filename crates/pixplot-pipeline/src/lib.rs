//! pixplot-pipeline: Pure image-to-pen-down analysis (sans-IO).
//!
//! Turns a raster image into the ordered pen-down positions a plotter
//! has to visit, and derives plot statistics from them:
//! decode -> classify -> plan -> statistics.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. Device control and recovery
//! files live in `pixplot-plotter`.

pub mod classify;
pub mod decode;
pub mod stats;
pub mod types;

pub use classify::{ClassificationRule, classify};
pub use decode::{Raster, decode};
pub use stats::{PlotStatistics, RecoverySource, RecoveryStatistics};
pub use types::{
    Analysis, ColorMode, Dimensions, PipelineError, PlotConfig, PlotPlan, Position,
};

/// Run the full analysis.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// then produces an [`Analysis`] containing the plot plan and the
/// source image metadata the statistics engine needs.
///
/// `target_color` isolates one color layer of an RGB image; it is
/// required for RGB images and ignored otherwise.
///
/// # Pipeline steps
///
/// 1. Validate the configuration
/// 2. Decode the image, keeping its color mode
/// 3. Pick the classification rule for that mode
/// 4. Classify every pixel, x outer and y inner, into pen-down positions
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::UnsupportedColorMode`] if the image is not
/// grayscale, palette, or RGB.
/// Returns [`PipelineError::MissingTargetColor`] for an RGB image without
/// `target_color`.
pub fn analyse(
    image_bytes: &[u8],
    config: &PlotConfig,
    target_color: Option<[u8; 3]>,
) -> Result<Analysis, PipelineError> {
    // 1. Reject bad configuration before decoding anything.
    config.validate()?;

    // 2. Decode.
    let raster = decode::decode(image_bytes)?;

    // 3. Classification rule.
    let rule = ClassificationRule::for_raster(&raster, config, target_color)?;

    // 4. Classify.
    let plan = classify::classify(&raster, rule, config.resolution)?;

    Ok(Analysis {
        dimensions: raster.dimensions(),
        color_mode: raster.color_mode(),
        rule,
        plan,
    })
}

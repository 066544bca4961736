//! Plot statistics: sizes, pen-down counts, and duration estimates.
//!
//! Statistics are derived from an [`Analysis`] and, when resuming, the
//! recovery snapshot. They are recomputed on every run and never
//! persisted. The total and remaining figures are reported side by side
//! whenever a snapshot is active, which is how the operator can see that
//! a resume skips work already done.

use std::fmt::Write;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::classify::ClassificationRule;
use crate::types::{Analysis, ColorMode, Dimensions, PlotConfig, PlotPlan};

/// Durations are written as fractional seconds.
#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// An active recovery snapshot, as seen by the statistics engine.
#[derive(Debug, Clone, Copy)]
pub struct RecoverySource<'a> {
    /// Name of the file the snapshot was read from.
    pub file: &'a str,
    /// Positions still to be plotted.
    pub remaining: &'a PlotPlan,
}

/// Remaining work when resuming from a recovery snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryStatistics {
    /// Name of the recovery file.
    pub file: String,
    /// Pen-downs left to plot.
    pub pen_downs: usize,
    /// Estimated time to plot the remaining pen-downs.
    #[serde(serialize_with = "as_seconds")]
    pub plot_duration: Duration,
}

/// Descriptive and predictive metrics for one plot job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotStatistics {
    /// Source image name.
    pub name: String,
    /// Color mode the image was classified in.
    pub color_mode: ColorMode,
    /// Color isolated from an RGB image, if any.
    pub rgb_filter: Option<[u8; 3]>,
    /// Source image size in pixels.
    pub image_size: Dimensions,
    /// Whole source pixels per physical centimeter.
    pub pixels_per_cm: u32,
    /// Physical plot width in centimeters.
    pub plot_width_cm: f64,
    /// Physical plot height in centimeters.
    pub plot_height_cm: f64,
    /// Pen-downs in the full plan.
    pub pen_downs: usize,
    /// Estimated time to plot the full plan.
    #[serde(serialize_with = "as_seconds")]
    pub plot_duration: Duration,
    /// Remaining work, present only when resuming from a non-empty
    /// snapshot.
    pub recovery: Option<RecoveryStatistics>,
}

impl PlotStatistics {
    /// Derive statistics for `analysis`, optionally resuming from
    /// `recovery`.
    ///
    /// An empty snapshot counts as no snapshot. The remaining count never
    /// exceeds the total; callers are expected to reject snapshots that do
    /// not belong to the plan (see [`PlotPlan::count_foreign`]).
    #[must_use]
    pub fn new(
        name: &str,
        analysis: &Analysis,
        config: &PlotConfig,
        recovery: Option<RecoverySource<'_>>,
    ) -> Self {
        let pixels_per_cm = 1.0 / config.resolution;
        let pen_downs = analysis.plan.len();
        let recovery = recovery
            .filter(|r| !r.remaining.is_empty())
            .map(|r| {
                let left = r.remaining.len().min(pen_downs);
                RecoveryStatistics {
                    file: r.file.to_owned(),
                    pen_downs: left,
                    plot_duration: estimate_duration(left, config.duration_factor),
                }
            });

        Self {
            name: name.to_owned(),
            color_mode: analysis.color_mode,
            rgb_filter: match analysis.rule {
                ClassificationRule::Color(color) => Some(color),
                _ => None,
            },
            image_size: analysis.dimensions,
            pixels_per_cm: config.pixels_per_cm(),
            plot_width_cm: f64::from(analysis.dimensions.width) / pixels_per_cm,
            plot_height_cm: f64::from(analysis.dimensions.height) / pixels_per_cm,
            pen_downs,
            plot_duration: estimate_duration(pen_downs, config.duration_factor),
            recovery,
        }
    }

    /// Pen-downs left to plot: the snapshot's count when resuming,
    /// otherwise the full count.
    #[must_use]
    pub fn remaining_pen_downs(&self) -> usize {
        self.recovery.as_ref().map_or(self.pen_downs, |r| r.pen_downs)
    }

    /// Estimated time left: the snapshot's estimate when resuming,
    /// otherwise the full estimate.
    #[must_use]
    pub fn remaining_duration(&self) -> Duration {
        self.recovery
            .as_ref()
            .map_or(self.plot_duration, |r| r.plot_duration)
    }

    /// Format the statistics as a human-readable block.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Plot statistics...");
        push_line(&mut out, "Image", &self.name);
        push_line(&mut out, "Image mode", self.color_mode.description());
        if let Some([r, g, b]) = self.rgb_filter {
            push_line(&mut out, "RGB filter", &format!("{r},{g},{b}"));
        }
        push_line(
            &mut out,
            "Size",
            &format!("{}x{}px", self.image_size.width, self.image_size.height),
        );
        push_line(
            &mut out,
            "Plot resolution",
            &format!("{}px/cm", self.pixels_per_cm),
        );
        push_line(
            &mut out,
            "Plotsize",
            // `{:?}` keeps a decimal place on whole numbers: `2.0x1.0cm`.
            &format!("{:?}x{:?}cm", self.plot_width_cm, self.plot_height_cm),
        );
        if let Some(recovery) = &self.recovery {
            push_line(&mut out, "Recover file", &recovery.file);
            push_line(&mut out, "# Total Pen-Downs", &self.pen_downs.to_string());
            push_line(&mut out, "# Pen-Downs left", &recovery.pen_downs.to_string());
            push_line(
                &mut out,
                "Plot duration total",
                &format_duration(self.plot_duration),
            );
            push_line(
                &mut out,
                "Plot duration left",
                &format_duration(recovery.plot_duration),
            );
        } else {
            push_line(&mut out, "# Pen-Downs", &self.pen_downs.to_string());
            push_line(
                &mut out,
                "Plot duration",
                &format_duration(self.plot_duration),
            );
        }
        out
    }
}

/// Estimated plotting time for `pen_downs` at `duration_factor`
/// pen-downs per second.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_duration(pen_downs: usize, duration_factor: f64) -> Duration {
    Duration::try_from_secs_f64(pen_downs as f64 / duration_factor).unwrap_or(Duration::MAX)
}

/// Format a duration as `H:MM:SS`, with a six-digit fraction when the
/// duration is not a whole number of seconds.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    let micros = duration.subsec_micros();
    if micros == 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours}:{minutes:02}:{seconds:02}.{micros:06}")
    }
}

/// Append one ` label:        value` report line.
fn push_line(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, " {:<17}{value}", format!("{label}: "));
}

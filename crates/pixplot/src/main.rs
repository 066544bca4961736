//! pixplot: plot raster images pixel by pixel on a pen plotter.
//!
//! Every dark pixel of a grayscale image, every foreground pixel of a
//! palette image, or every pixel of one chosen color of an RGB image
//! becomes a single pen-down on the plotter.
//!
//! Interrupted plots leave a recovery file next to the image; the next
//! plot of the same image offers to continue where the last one stopped.
//!
//! # Usage
//!
//! ```text
//! pixplot --analyse drawing.bmp
//! pixplot --plot -r 255 -g 0 -b 0 poster.png
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod progress;
mod prompt;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use pixplot_pipeline::{PipelineError, PlotConfig, PlotPlan, PlotStatistics, RecoverySource};
use pixplot_plotter::{
    CancellationToken, DriverError, EbbPlotter, EbbSettings, PlotDriver, PlotOutcome, Plotter,
    RecoveryError, RecoveryStore, SimulatedPlotter,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::progress::ProgressLine;
use crate::prompt::{Prompt, Terminal};

/// Centimeters per inch, for the travel speed flag.
const CM_PER_INCH: f64 = 2.54;

/// Exit status after the operator interrupts a plot.
const EXIT_INTERRUPTED: u8 = 130;

/// Plot raster images pixel by pixel on an AxiDraw-style pen plotter.
///
/// Without `--plot` the image is only analysed: the plot statistics are
/// printed and the plotter is never touched.
#[derive(Parser)]
#[command(name = "pixplot", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Plot the image.
    #[arg(short, long, conflicts_with = "analyse")]
    plot: bool,

    /// Only print the plot statistics (the default).
    #[arg(short, long)]
    analyse: bool,

    /// Red component of the color to isolate in an RGB image.
    #[arg(short, requires_all = ["green", "blue"])]
    red: Option<u8>,

    /// Green component of the color to isolate in an RGB image.
    #[arg(short, requires_all = ["red", "blue"])]
    green: Option<u8>,

    /// Blue component of the color to isolate in an RGB image.
    #[arg(short, requires_all = ["red", "green"])]
    blue: Option<u8>,

    /// Physical size of one pixel in centimeters.
    #[arg(long, default_value_t = PlotConfig::DEFAULT_RESOLUTION)]
    resolution: f64,

    /// Grayscale pixels darker than this are plotted.
    #[arg(long, default_value_t = PlotConfig::DEFAULT_GRAY_THRESHOLD)]
    threshold: u8,

    /// Palette index plotted in palette images.
    #[arg(long, default_value_t = PlotConfig::DEFAULT_FOREGROUND_INDEX)]
    foreground_index: u8,

    /// Plotting rate in pen-downs per second, for time estimates.
    #[arg(long, default_value_t = PlotConfig::DEFAULT_DURATION_FACTOR)]
    duration_factor: f64,

    /// Full plot config as a JSON string.
    ///
    /// When provided, the individual config flags are ignored. The JSON
    /// must be a valid `PlotConfig` serialization; missing fields take
    /// their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Recovery file to use instead of `recovery_<name>.json` next to
    /// the image.
    #[arg(long)]
    recovery_file: Option<PathBuf>,

    /// Serial device of the plotter.
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: PathBuf,

    /// Plot on a simulated device instead of real hardware.
    #[arg(long)]
    dry_run: bool,

    /// Pen-up travel speed in centimeters per second.
    #[arg(long, default_value_t = EbbSettings::DEFAULT_SPEED * CM_PER_INCH)]
    speed: f64,

    /// Time to wait after raising or lowering the pen, in milliseconds.
    #[arg(long, default_value_t = EbbSettings::DEFAULT_PEN_DELAY_MS)]
    pen_delay: u32,

    /// Print the statistics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Log debug output (`RUST_LOG` takes precedence).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// The color to isolate, when all three components were given.
    const fn target_color(&self) -> Option<[u8; 3]> {
        match (self.red, self.green, self.blue) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ => None,
        }
    }

    fn recovery_store(&self) -> RecoveryStore {
        self.recovery_file.as_ref().map_or_else(
            || RecoveryStore::for_image(&self.image_path),
            RecoveryStore::new,
        )
    }

    fn ebb_settings(&self) -> EbbSettings {
        EbbSettings {
            speed_inches_per_sec: self.speed / CM_PER_INCH,
            pen_delay_ms: self.pen_delay,
        }
    }
}

/// Everything that stops the tool before or during a plot.
#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("failed to read {}: {source}", path.display())]
    ReadImage { path: PathBuf, source: io::Error },

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(
        "recovery file {} holds {foreign} positions that are not part of this image's plot",
        path.display()
    )]
    ForeignSnapshot { path: PathBuf, foreign: usize },

    #[error("failed to serialize statistics: {0}")]
    Json(#[from] serde_json::Error),

    #[error("terminal: {0}")]
    Prompt(#[source] io::Error),

    #[error("failed to install Ctrl-C handler: {0}")]
    Interrupt(#[from] ctrlc::Error),
}

/// Build a [`PlotConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual config flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PlotConfig, Error> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Error parsing --config-json: {e}")));
    }

    Ok(PlotConfig {
        resolution: cli.resolution,
        gray_threshold: cli.threshold,
        foreground_index: cli.foreground_index,
        duration_factor: cli.duration_factor,
    })
}

fn init_logging(verbose: u8) {
    let level = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli, &mut Terminal::stdio()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, prompt: &mut impl Prompt) -> Result<ExitCode, Error> {
    let config = config_from_cli(cli)?;
    debug!(?config, "plot configuration");

    let image_bytes = std::fs::read(&cli.image_path).map_err(|source| Error::ReadImage {
        path: cli.image_path.clone(),
        source,
    })?;
    let name = display_name(&cli.image_path);
    let store = cli.recovery_store();
    let store_name = display_name(store.path());

    let resume = if cli.plot && store.exists() {
        let question = format!("Continue plotting {name} from {store_name}?");
        if prompt.confirm(&question).map_err(Error::Prompt)? {
            println!("Recovering plotting data from {store_name}...");
            Some(store.load()?)
        } else {
            info!(path = %store.path().display(), "starting over, recovery file left in place");
            None
        }
    } else {
        None
    };

    println!("Analysing {name}...");
    let analysis = pixplot_pipeline::analyse(&image_bytes, &config, cli.target_color())?;

    if let Some(snapshot) = &resume {
        let foreign = analysis.plan.count_foreign(snapshot);
        if foreign > 0 {
            return Err(Error::ForeignSnapshot {
                path: store.path().to_path_buf(),
                foreign,
            });
        }
    }

    let stats = PlotStatistics::new(
        &name,
        &analysis,
        &config,
        resume.as_ref().map(|remaining| RecoverySource {
            file: &store_name,
            remaining,
        }),
    );
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", stats.report());
    }

    if !cli.plot {
        return Ok(ExitCode::SUCCESS);
    }

    let plan = match resume {
        Some(snapshot) if !snapshot.is_empty() => snapshot,
        _ => analysis.plan,
    };
    println!("Connecting to AxiDraw...");
    let device = open_device(cli)?;
    plot(prompt, device, &plan, &store, install_interrupt_handler)
}

/// Connect, confirm, and drive the plotter through `plan`.
fn plot(
    prompt: &mut impl Prompt,
    device: Box<dyn Plotter>,
    plan: &PlotPlan,
    store: &RecoveryStore,
    install_interrupt: impl FnOnce(&CancellationToken) -> Result<(), ctrlc::Error>,
) -> Result<ExitCode, Error> {
    let driver = PlotDriver::connect(device)?;

    let start = match prompt.confirm("Start plotting?") {
        Ok(start) => start,
        Err(e) => {
            let _ = driver.abandon();
            return Err(Error::Prompt(e));
        }
    };
    if !start {
        driver.abandon()?;
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    if let Err(e) = install_interrupt(&cancel) {
        let _ = driver.abandon();
        return Err(e.into());
    }

    let mut progress = ProgressLine::new(io::stderr());
    let outcome = driver
        .on_progress(|p| progress.update(p))
        .run(plan, store, &cancel);
    progress.finish();

    let store_name = display_name(store.path());
    match outcome? {
        PlotOutcome::Completed => {
            println!("Done, returned to home");
            Ok(ExitCode::SUCCESS)
        }
        PlotOutcome::Cancelled { remaining } => {
            println!("Aborting, saving unplotted data to {store_name}...");
            info!(remaining, "plot interrupted");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        PlotOutcome::Paused { remaining } => {
            println!("Plotter paused, saved {remaining} unplotted pen-downs to {store_name}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Route Ctrl-C to `cancel`. The plot stops after the current pen-down
/// and the remainder is saved, however often Ctrl-C is pressed.
fn install_interrupt_handler(cancel: &CancellationToken) -> Result<(), ctrlc::Error> {
    let handler = cancel.clone();
    ctrlc::set_handler(move || interrupt(&handler))
}

fn interrupt(cancel: &CancellationToken) {
    if cancel.cancel() {
        eprintln!("\nAlready stopping, saving unplotted data...");
    } else {
        eprintln!("\nStopping after the current pen-down...");
    }
}

fn open_device(cli: &Cli) -> Result<Box<dyn Plotter>, Error> {
    if cli.dry_run {
        warn!("dry run, plotting on a simulated device");
        return Ok(Box::new(SimulatedPlotter::new().unrecorded()));
    }
    let device = EbbPlotter::open(&cli.port, cli.ebb_settings())
        .map_err(|e| Error::Driver(DriverError::Device(e)))?;
    Ok(Box::new(device))
}

/// The file name part of `path`, for messages.
fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use pixplot_plotter::{Call, Units};

    use super::*;

    /// Answers every question with the next scripted reply and records
    /// what was asked.
    struct Scripted {
        replies: Vec<bool>,
        asked: Vec<String>,
    }

    impl Scripted {
        fn new(replies: &[bool]) -> Self {
            Self {
                replies: replies.iter().rev().copied().collect(),
                asked: Vec::new(),
            }
        }
    }

    impl Prompt for Scripted {
        fn confirm(&mut self, question: &str) -> io::Result<bool> {
            self.asked.push(question.to_owned());
            Ok(self.replies.pop().unwrap_or(false))
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pixplot-cli-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes a 4x2 grayscale PNG with three dark pixels.
    fn write_gray_png(path: &Path) {
        let pixels: [u8; 8] = [0, 255, 255, 10, 255, 0, 255, 255];
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&pixels, 4, 2, ExtendedColorType::L8)
            .unwrap();
        std::fs::write(path, buf).unwrap();
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pixplot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_come_from_config_constants() {
        let cli = parse(&["a.png"]);
        assert_eq!(config_from_cli(&cli).unwrap(), PlotConfig::default());
        assert!(!cli.plot);
        assert_eq!(cli.port, PathBuf::from("/dev/ttyACM0"));
        assert!((cli.ebb_settings().speed_inches_per_sec - EbbSettings::DEFAULT_SPEED).abs() < 1e-9);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&["--resolution", "0.1", "--config-json", r#"{"resolution":0.2}"#, "a.png"]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.resolution - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.gray_threshold, PlotConfig::DEFAULT_GRAY_THRESHOLD);
    }

    #[test]
    fn bad_config_json_is_an_error() {
        let cli = parse(&["--config-json", "{", "a.png"]);
        assert!(matches!(config_from_cli(&cli), Err(Error::Config(_))));
    }

    #[test]
    fn color_needs_all_three_components() {
        assert!(Cli::try_parse_from(["pixplot", "-r", "1", "-g", "2", "a.png"]).is_err());
        let cli = parse(&["-r", "1", "-g", "2", "-b", "3", "a.png"]);
        assert_eq!(cli.target_color(), Some([1, 2, 3]));
    }

    #[test]
    fn plot_and_analyse_conflict() {
        assert!(Cli::try_parse_from(["pixplot", "--plot", "--analyse", "a.png"]).is_err());
    }

    #[test]
    fn recovery_file_flag_overrides_default_location() {
        let cli = parse(&["--recovery-file", "/tmp/r.json", "art/a.png"]);
        assert_eq!(cli.recovery_store().path(), Path::new("/tmp/r.json"));
        let cli = parse(&["art/a.b.png"]);
        assert_eq!(cli.recovery_store().path(), Path::new("art/recovery_a.json"));
    }

    #[test]
    fn analyse_mode_never_asks() {
        let dir = scratch_dir("analyse");
        let image = dir.join("marks.png");
        write_gray_png(&image);
        std::fs::write(dir.join("recovery_marks.json"), "[[0.0, 0.0]]").unwrap();

        let mut prompt = Scripted::new(&[]);
        let code = run(&parse(&[image.to_str().unwrap()]), &mut prompt).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(prompt.asked.is_empty());
    }

    #[test]
    fn declining_start_writes_nothing() {
        let dir = scratch_dir("decline");
        let image = dir.join("marks.png");
        write_gray_png(&image);

        let mut prompt = Scripted::new(&[false]);
        let code = run(
            &parse(&["--plot", "--dry-run", image.to_str().unwrap()]),
            &mut prompt,
        )
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(prompt.asked, ["Start plotting?"]);
        assert!(!dir.join("recovery_marks.json").exists());
    }

    #[test]
    fn dry_run_plot_completes() {
        let dir = scratch_dir("dry-run");
        let image = dir.join("marks.png");
        write_gray_png(&image);

        let mut prompt = Scripted::new(&[true]);
        let code = run(
            &parse(&["--plot", "--dry-run", image.to_str().unwrap()]),
            &mut prompt,
        )
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(!dir.join("recovery_marks.json").exists());
    }

    #[test]
    fn resume_is_offered_and_declining_keeps_file() {
        let dir = scratch_dir("resume-declined");
        let image = dir.join("marks.png");
        write_gray_png(&image);
        let snapshot = dir.join("recovery_marks.json");
        std::fs::write(&snapshot, "[[0.05, 0.05]]").unwrap();

        let mut prompt = Scripted::new(&[false, false]);
        run(
            &parse(&["--plot", "--dry-run", image.to_str().unwrap()]),
            &mut prompt,
        )
        .unwrap();
        assert_eq!(
            prompt.asked,
            [
                "Continue plotting marks.png from recovery_marks.json?",
                "Start plotting?"
            ]
        );
        assert_eq!(std::fs::read_to_string(&snapshot).unwrap(), "[[0.05, 0.05]]");
    }

    #[test]
    fn foreign_snapshot_is_rejected_before_connecting() {
        let dir = scratch_dir("foreign");
        let image = dir.join("marks.png");
        write_gray_png(&image);
        std::fs::write(dir.join("recovery_marks.json"), "[[9.0, 9.0]]").unwrap();

        let mut prompt = Scripted::new(&[true]);
        let result = run(
            &parse(&["--plot", "--dry-run", image.to_str().unwrap()]),
            &mut prompt,
        );
        assert!(matches!(result, Err(Error::ForeignSnapshot { foreign: 1, .. })));
        assert_eq!(prompt.asked.len(), 1);
    }

    #[test]
    fn malformed_snapshot_is_fatal() {
        let dir = scratch_dir("malformed");
        let image = dir.join("marks.png");
        write_gray_png(&image);
        std::fs::write(dir.join("recovery_marks.json"), "not json").unwrap();

        let mut prompt = Scripted::new(&[true]);
        let result = run(
            &parse(&["--plot", "--dry-run", image.to_str().unwrap()]),
            &mut prompt,
        );
        assert!(matches!(
            result,
            Err(Error::Recovery(RecoveryError::Malformed { .. }))
        ));
    }

    #[test]
    fn repeated_interrupts_only_cancel() {
        let cancel = CancellationToken::new();
        interrupt(&cancel);
        interrupt(&cancel);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn failed_interrupt_handler_disconnects_without_motion() {
        let dir = scratch_dir("no-handler");
        let store = RecoveryStore::new(dir.join("recovery_marks.json"));
        let device = SimulatedPlotter::new();
        let log = device.log();
        let plan = PlotPlan::from_positions([pixplot_pipeline::Position::ORIGIN]);

        let result = plot(
            &mut Scripted::new(&[true]),
            Box::new(device),
            &plan,
            &store,
            |_| Err(ctrlc::Error::MultipleHandlers),
        );

        assert!(matches!(result, Err(Error::Interrupt(_))));
        assert_eq!(
            log.calls(),
            [Call::Connect, Call::SetUnits(Units::Centimeters), Call::Disconnect]
        );
        assert!(!store.exists());
    }

    #[test]
    fn json_statistics() {
        let dir = scratch_dir("json");
        let image = dir.join("marks.png");
        write_gray_png(&image);
        let code = run(
            &parse(&["--json", image.to_str().unwrap()]),
            &mut Scripted::new(&[]),
        )
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn missing_image_is_a_read_error() {
        let mut prompt = Scripted::new(&[]);
        let result = run(&parse(&["/nonexistent/pixplot.png"]), &mut prompt);
        assert!(matches!(result, Err(Error::ReadImage { .. })));
    }
}

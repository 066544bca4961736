//! Single-line plotting progress on the terminal.

use std::io::Write;

use pixplot_plotter::Progress;

/// Rewrites one status line per completed pen-down.
pub struct ProgressLine<W: Write> {
    out: W,
    drawn: bool,
}

impl<W: Write> ProgressLine<W> {
    pub const fn new(out: W) -> Self {
        Self { out, drawn: false }
    }

    /// Redraw the line for `progress`.
    pub fn update(&mut self, progress: &Progress) {
        #[allow(clippy::cast_precision_loss)]
        let percent = if progress.total == 0 {
            100.0
        } else {
            progress.completed as f64 * 100.0 / progress.total as f64
        };
        // Terminal output is best effort; a closed stderr must not stop the plot.
        let _ = write!(
            self.out,
            "\rPlotting progress ({:.2}/{:.2}): {}/{} pd ({percent:.0}%)",
            progress.position.x_cm(),
            progress.position.y_cm(),
            progress.completed,
            progress.total,
        );
        let _ = self.out.flush();
        self.drawn = true;
    }

    /// End the status line so later output starts on a fresh line.
    pub fn finish(&mut self) {
        if self.drawn {
            let _ = writeln!(self.out);
            self.drawn = false;
        }
    }
}

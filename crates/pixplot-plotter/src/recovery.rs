//! Recovery snapshots: the unplotted remainder of an interrupted plot.
//!
//! A snapshot is a JSON array of `[x, y]` centimeter pairs, written when
//! a plot stops with work left and read back when the operator chooses
//! to resume. Snapshots are never deleted automatically.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use pixplot_pipeline::{PlotPlan, Position};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, info};

/// Errors reading or writing a recovery snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// The snapshot file could not be read.
    #[error("failed to read recovery file {}: {source}", path.display())]
    Read {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The snapshot file could not be written.
    #[error("failed to write recovery file {}: {source}", path.display())]
    Write {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The snapshot file is not a JSON array of coordinate pairs.
    #[error("recovery file {} is malformed: {source}", path.display())]
    Malformed {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying parse failure.
        source: serde_json::Error,
    },
}

/// Where the recovery snapshot for one source image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryStore {
    path: PathBuf,
}

impl RecoveryStore {
    /// A store backed by an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store for `image`: `recovery_<name>.json` next to the image,
    /// where `<name>` is the image file name up to its first `.`.
    #[must_use]
    pub fn for_image(image: &Path) -> Self {
        Self::new(image.with_file_name(file_name_for(image)))
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot is waiting to be resumed.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::Read`] if the file cannot be read and
    /// [`RecoveryError::Malformed`] if it is not valid snapshot JSON.
    pub fn load(&self) -> Result<PlotPlan, RecoveryError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| RecoveryError::Read {
            path: self.path.clone(),
            source,
        })?;
        let plan: PlotPlan =
            serde_json::from_str(&text).map_err(|source| RecoveryError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), positions = plan.len(), "loaded recovery snapshot");
        Ok(plan)
    }

    /// Write `remaining` as the snapshot, replacing any previous one.
    ///
    /// The file is written under a temporary name and renamed into place,
    /// so a crash mid-write never leaves a truncated snapshot behind.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::Write`] if the file cannot be written.
    pub fn save<'a>(
        &self,
        remaining: impl IntoIterator<Item = &'a Position>,
    ) -> Result<(), RecoveryError> {
        let positions: Vec<Position> = remaining.into_iter().copied().collect();
        let temp = self.path.with_extension("json.tmp");

        if let Err(source) = write_then_rename(&positions, &temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(RecoveryError::Write {
                path: self.path.clone(),
                source,
            });
        }

        debug!(path = %self.path.display(), positions = positions.len(), "saved recovery snapshot");
        Ok(())
    }
}

/// Write `positions` as pretty JSON to `temp`, then move it to `path`.
fn write_then_rename(positions: &[Position], temp: &Path, path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(temp)?);
    let mut serializer =
        Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    positions.serialize(&mut serializer)?;
    writer.flush()?;
    drop(writer);
    std::fs::rename(temp, path)
}

/// `recovery_<name>.json` for an image path, `<name>` being the file name
/// up to its first `.`.
fn file_name_for(image: &Path) -> String {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    format!("recovery_{stem}.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A fresh, empty directory for one test.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pixplot-recovery-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn path_is_derived_from_image_name() {
        let store = RecoveryStore::for_image(Path::new("art/line.drawing.bmp"));
        assert_eq!(store.path(), Path::new("art/recovery_line.json"));
    }

    #[test]
    fn path_for_bare_file_name() {
        let store = RecoveryStore::for_image(Path::new("test.bmp"));
        assert_eq!(store.path(), Path::new("recovery_test.json"));
    }

    #[test]
    fn save_then_load_preserves_order() {
        let dir = scratch_dir("roundtrip");
        let store = RecoveryStore::new(dir.join("recovery_a.json"));
        let plan = PlotPlan::from_positions([
            Position::from_cm(0.5, 0.05),
            Position::from_cm(0.0, 1.0),
            Position::from_cm(0.25, 0.1),
        ]);
        assert!(!store.exists());
        store.save(&plan).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), plan);
    }

    #[test]
    fn snapshot_is_pretty_json_pairs() {
        let dir = scratch_dir("format");
        let store = RecoveryStore::new(dir.join("recovery_b.json"));
        store.save(&[Position::from_cm(0.1, 0.05)]).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "[\n    [\n        0.1,\n        0.05\n    ]\n]");
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = scratch_dir("failed-save");
        // A directory in the way makes the final rename fail.
        let path = dir.join("recovery_e.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "").unwrap();

        let result = RecoveryStore::new(&path).save(&[Position::from_cm(0.1, 0.1)]);

        assert!(matches!(result, Err(RecoveryError::Write { .. })));
        assert!(!dir.join("recovery_e.json.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn malformed_snapshot_is_rejected() {
        let dir = scratch_dir("malformed");
        let path = dir.join("recovery_c.json");
        std::fs::write(&path, "{\"not\": \"pairs\"}").unwrap();
        let result = RecoveryStore::new(path).load();
        assert!(matches!(result, Err(RecoveryError::Malformed { .. })));
    }

    #[test]
    fn missing_snapshot_is_a_read_error() {
        let dir = scratch_dir("missing");
        let result = RecoveryStore::new(dir.join("nope.json")).load();
        assert!(matches!(result, Err(RecoveryError::Read { .. })));
    }

    #[test]
    fn hand_written_snapshot_is_accepted() {
        let dir = scratch_dir("python");
        let path = dir.join("recovery_d.json");
        std::fs::write(&path, "[[0.0, 0.05], [0.05, 0.1], [0.0, 0.05]]").unwrap();
        let plan = RecoveryStore::new(path).load().unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.positions()[1], Position::from_cm(0.05, 0.1));
    }
}

//! Run logging.
//!
//! `setup_logging` wires the `log` facade to `env_logger`, writing every
//! record to a per-run file and to stderr. `RunLog` is the collaborator
//! handed to the plugin group and the stress loop: it owns the artifact
//! directory and writes statistics and serial transcripts.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{LevelFilter, info, warn};

use crate::domain::{CaptureName, Outcome, RunStats};
use crate::error::Result;
use crate::id::run_stamp;

/// Writer that copies everything to a log file and to stderr
struct TeeWriter {
    file: fs::File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        io::stderr().flush()
    }
}

/// Path of the run log for a run started at `started`
pub fn run_log_path(log_dir: &Path, started: DateTime<Local>) -> PathBuf {
    log_dir.join(format!("hilstress_{}.log", run_stamp(started)))
}

/// Initialize the global logger. Returns the path of the run log file.
///
/// `RUST_LOG` still overrides `level` when set.
pub fn setup_logging(log_dir: &Path, started: DateTime<Local>, level: LevelFilter) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_file = run_log_path(log_dir, started);

    let file = fs::OpenOptions::new().create(true).append(true).open(&log_file)?;

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

/// Per-run reporting collaborator.
#[derive(Debug, Clone)]
pub struct RunLog {
    artifact_dir: PathBuf,
}

impl RunLog {
    /// Create a run log writing artifacts into `artifact_dir`
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Result<Self> {
        let artifact_dir = artifact_dir.into();
        fs::create_dir_all(&artifact_dir)?;
        Ok(Self { artifact_dir })
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn record_outcome(&self, iteration: u64, outcome: Outcome, fail_streak: u32) {
        if outcome.is_failure() {
            warn!("Iteration {} finished: {} (fail streak {})", iteration, outcome, fail_streak);
        } else {
            info!("Iteration {} finished: {} (fail streak {})", iteration, outcome, fail_streak);
        }
    }

    pub fn record_stats(&self, stats: &RunStats) {
        info!("Stats: {}", stats);
    }

    /// Write the serial transcript of a failed iteration
    pub fn persist_serial(&self, name: &CaptureName, transcript: &str) -> Result<PathBuf> {
        let path = name.serial_log_path(&self.artifact_dir);
        fs::write(&path, transcript)?;
        info!("Serial transcript saved to {}", path.display());
        Ok(path)
    }
}

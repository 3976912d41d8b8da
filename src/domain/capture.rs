//! Per-iteration capture name.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::id::generate_capture_id;

/// Name shared by every artifact produced for one iteration.
///
/// Generated once at stop-time and handed read-only to each plugin and to
/// the serial transcript dump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureName(String);

impl CaptureName {
    /// Create a name for the given iteration stamped with the current time
    pub fn for_iteration(iteration: u64) -> Self {
        Self(generate_capture_id(Local::now(), iteration))
    }

    /// Wrap an existing name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the serial transcript for this iteration inside `dir`
    pub fn serial_log_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_serial.log", self.0))
    }

    /// Path of an artifact with the given extension inside `dir`
    pub fn artifact_path(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(format!("{}.{}", self.0, extension))
    }
}

impl fmt::Display for CaptureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Timestamp-based identifiers for runs and iterations
//!
//! All names use local time so they line up with bench notes taken at the rig.

use chrono::{DateTime, Local};

/// Format used for the run log file name
const RUN_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Format used for per-iteration capture names
const CAPTURE_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Generate the stamp that names a run
///
/// Format: `YYYY-mm-dd_HH-MM-SS`
/// Example: `2026-10-19_14-03-22`
pub fn run_stamp(now: DateTime<Local>) -> String {
    now.format(RUN_STAMP_FORMAT).to_string()
}

/// Generate the capture identifier for an iteration
///
/// Format: `{YYYYmmdd-HHMMSS}-it{iteration:06}`
/// Example: `20261019-140322-it000042`
pub fn generate_capture_id(now: DateTime<Local>, iteration: u64) -> String {
    format!("{}-it{:06}", now.format(CAPTURE_STAMP_FORMAT), iteration)
}

//! Run statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Counters for one stress run. They only ever grow.
///
/// `resyncs` counts every first-wait failure, whether or not the retry then
/// succeeded, so it is tracked independently of `timeouts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub iterations: u64,
    pub syncs: u64,
    pub timeouts: u64,
    pub resyncs: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentage of iterations that synced on the first wait
    pub fn sync_rate(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.syncs as f64 * 100.0 / self.iterations as f64
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iterations={} syncs={} resyncs={} timeouts={}",
            self.iterations, self.syncs, self.resyncs, self.timeouts
        )
    }
}

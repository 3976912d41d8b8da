//! Iteration outcome types.
//!
//! One `Outcome` is produced per completed iteration and consumed right away
//! by the escalation controller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single evaluate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Success marker seen within the evaluation timeout
    Synced,
    /// First wait failed, success marker seen after the retry command
    Resynced,
    /// No success marker, or the error marker was seen
    Timeout,
}

impl Outcome {
    /// Whether this outcome counts toward the failure streak
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Timeout)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Synced => write!(f, "SYNCED"),
            Outcome::Resynced => write!(f, "RESYNCED"),
            Outcome::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

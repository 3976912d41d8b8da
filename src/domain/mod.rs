//! Domain types for hilstress
//!
//! - Outcome: classification of one iteration (Synced, Resynced, Timeout)
//! - RunStats: monotonic counters for a whole run
//! - CaptureName: per-iteration artifact name shared by plugins and the serial dump

pub mod capture;
pub mod outcome;
pub mod stats;

pub use capture::CaptureName;
pub use outcome::Outcome;
pub use stats::RunStats;

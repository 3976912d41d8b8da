//! Power controller - last-resort recovery by cutting device power.

pub mod smart_plug;

pub use smart_plug::SmartPlug;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a power controller
#[derive(Debug, Error)]
pub enum PowerError {
    #[error("power controller timed out: {0}")]
    Timeout(String),

    #[error("power controller protocol error: {0}")]
    Protocol(String),

    #[error("power controller rejected command (err_code {0})")]
    Rejected(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remote power relay for the device under test
#[async_trait]
pub trait PowerController: Send + Sync {
    /// Human-readable target, for logs
    fn describe(&self) -> String;

    /// Cut power, wait, restore power
    async fn power_cycle(&self) -> Result<(), PowerError>;
}

//! Error types for hilstress.

use thiserror::Error;

use crate::plugin::PluginError;
use crate::power::PowerError;

/// All error types that can occur during a stress run
#[derive(Debug, Error)]
pub enum StressError {
    /// Operator asked the run to stop
    #[error("Run cancelled by operator")]
    Cancelled,

    /// The serial link reached end-of-stream
    #[error("Serial link closed")]
    LinkClosed,

    /// A plugin needs the host to intervene and no power controller is available
    #[error("Reboot required by plugin '{plugin}': {reason}")]
    RebootRequired { plugin: String, reason: String },

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Capture plugin error
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Power controller error
    #[error("Power error: {0}")]
    Power(#[from] PowerError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for hilstress operations
pub type Result<T> = std::result::Result<T, StressError>;

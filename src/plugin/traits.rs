//! Capture plugin contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CaptureName;

/// Errors raised by capture plugins
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin's device or service misbehaved; a restart may fix it
    #[error("Plugin '{plugin}' device error: {reason}")]
    Device { plugin: String, reason: String },

    /// The plugin was restarted but the host needs a power cycle
    #[error("Plugin '{plugin}' requires a reboot: {reason}")]
    RebootRequired { plugin: String, reason: String },

    /// Anything else; not recoverable by a restart
    #[error("Plugin '{plugin}' failed: {reason}")]
    Failed { plugin: String, reason: String },
}

impl PluginError {
    /// Name of the plugin that raised the error
    pub fn plugin(&self) -> &str {
        match self {
            PluginError::Device { plugin, .. }
            | PluginError::RebootRequired { plugin, .. }
            | PluginError::Failed { plugin, .. } => plugin,
        }
    }

    pub fn is_reboot_required(&self) -> bool {
        matches!(self, PluginError::RebootRequired { .. })
    }
}

/// Result type for plugin operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Auxiliary tooling run around every iteration.
///
/// Lifecycle per run: `setup` once, then per iteration `start`, `stop`,
/// optionally `fail` or `resync`, then `close`. `terminate` releases the
/// external resource for good; `restart` must be safe to call repeatedly.
#[async_trait]
pub trait CapturePlugin: Send {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Acquire the external resource
    async fn setup(&mut self) -> PluginResult<()>;

    /// Begin capturing for the iteration
    async fn start(&mut self) -> PluginResult<()>;

    /// End capturing for the iteration
    async fn stop(&mut self) -> PluginResult<()>;

    /// The iteration needed the retry command
    async fn resync(&mut self, name: &CaptureName) -> PluginResult<()>;

    /// The iteration timed out
    async fn fail(&mut self, name: &CaptureName) -> PluginResult<()>;

    /// Release per-iteration state
    async fn close(&mut self) -> PluginResult<()>;

    /// Release the external resource
    async fn terminate(&mut self) -> PluginResult<()>;

    /// Tear down and re-acquire the external resource
    async fn restart(&mut self) -> PluginResult<()> {
        self.terminate().await?;
        self.setup().await
    }
}

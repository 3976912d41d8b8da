//! Plugin that does nothing.

use async_trait::async_trait;

use super::{CapturePlugin, PluginResult};
use crate::domain::CaptureName;

/// Stand-in plugin for runs without auxiliary tooling
#[derive(Debug, Default, Clone)]
pub struct NoopPlugin;

#[async_trait]
impl CapturePlugin for NoopPlugin {
    fn name(&self) -> &str {
        "noop"
    }

    async fn setup(&mut self) -> PluginResult<()> {
        Ok(())
    }

    async fn start(&mut self) -> PluginResult<()> {
        Ok(())
    }

    async fn stop(&mut self) -> PluginResult<()> {
        Ok(())
    }

    async fn resync(&mut self, _name: &CaptureName) -> PluginResult<()> {
        Ok(())
    }

    async fn fail(&mut self, _name: &CaptureName) -> PluginResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> PluginResult<()> {
        Ok(())
    }

    async fn terminate(&mut self) -> PluginResult<()> {
        Ok(())
    }
}

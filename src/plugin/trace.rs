//! Logic-analyzer trace capture plugin.
//!
//! Launches the capture application in automation mode, records one trace
//! per iteration, and keeps the trace of every failed or resynced iteration
//! next to its serial transcript.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::{Child, Command};

use super::automation::{AutomationClient, AutomationError};
use super::{CapturePlugin, PluginError, PluginResult};
use crate::domain::CaptureName;

/// Extension of saved trace files
pub const TRACE_EXTENSION: &str = "sal";

/// Configuration for the trace capture plugin.
#[derive(Debug, Clone)]
pub struct TraceSettings {
    /// Capture device identifier on the analyzer
    pub device_id: String,
    /// Capture application; `None` attaches to an already running service
    pub executable: Option<PathBuf>,
    pub launch_args: Vec<String>,
    /// Wait between launching the application and connecting to it
    pub startup_grace: Duration,
    /// Where saved traces go
    pub output_dir: PathBuf,
}

impl TraceSettings {
    pub fn new(device_id: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_id: device_id.into(),
            executable: None,
            launch_args: Vec::new(),
            startup_grace: Duration::from_secs(5),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.executable = Some(executable.into());
        self.launch_args = args;
        self
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }
}

/// Trace capture plugin over an automation client
pub struct TraceCapturePlugin<C> {
    settings: TraceSettings,
    client: C,
    app: Option<Child>,
    capturing: bool,
}

impl<C: AutomationClient> TraceCapturePlugin<C> {
    pub fn new(settings: TraceSettings, client: C) -> Self {
        Self {
            settings,
            client,
            app: None,
            capturing: false,
        }
    }

    fn map_err(&self, e: AutomationError) -> PluginError {
        let plugin = self.name().to_string();
        match e {
            AutomationError::Unavailable(reason) => PluginError::Device { plugin, reason },
            AutomationError::Rejected(reason) => PluginError::Failed { plugin, reason },
        }
    }

    /// Launch the application and connect. Safe to call repeatedly.
    async fn acquire(&mut self) -> PluginResult<()> {
        self.release().await;

        if let Some(executable) = &self.settings.executable {
            info!("Launching capture application {}", executable.display());
            let child = Command::new(executable)
                .args(&self.settings.launch_args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| PluginError::Failed {
                    plugin: self.name().to_string(),
                    reason: format!("failed to launch {}: {}", executable.display(), e),
                })?;
            self.app = Some(child);
            tokio::time::sleep(self.settings.startup_grace).await;
        }

        self.client.connect().await.map_err(|e| self.map_err(e))
    }

    /// Disconnect and stop the application. Never fails.
    async fn release(&mut self) {
        self.capturing = false;
        if let Err(e) = self.client.disconnect().await {
            debug!("Automation disconnect failed: {}", e);
        }
        if let Some(mut app) = self.app.take() {
            if let Err(e) = app.kill().await {
                warn!("Failed to stop capture application: {}", e);
            }
        }
    }

    async fn save(&mut self, name: &CaptureName) -> PluginResult<()> {
        let path = name.artifact_path(&self.settings.output_dir, TRACE_EXTENSION);
        info!("Saving trace to {}", path.display());
        self.client.save_capture(&path).await.map_err(|e| self.map_err(e))
    }
}

#[async_trait]
impl<C: AutomationClient> CapturePlugin for TraceCapturePlugin<C> {
    fn name(&self) -> &str {
        "trace"
    }

    async fn setup(&mut self) -> PluginResult<()> {
        self.acquire().await
    }

    async fn start(&mut self) -> PluginResult<()> {
        let device_id = self.settings.device_id.clone();
        self.client
            .start_capture(&device_id)
            .await
            .map_err(|e| self.map_err(e))?;
        self.capturing = true;
        Ok(())
    }

    async fn stop(&mut self) -> PluginResult<()> {
        if !self.capturing {
            return Ok(());
        }
        self.client.stop_capture().await.map_err(|e| self.map_err(e))
    }

    async fn resync(&mut self, name: &CaptureName) -> PluginResult<()> {
        self.save(name).await
    }

    async fn fail(&mut self, name: &CaptureName) -> PluginResult<()> {
        self.save(name).await
    }

    async fn close(&mut self) -> PluginResult<()> {
        self.capturing = false;
        self.client.close_capture().await.map_err(|e| self.map_err(e))
    }

    async fn terminate(&mut self) -> PluginResult<()> {
        self.release().await;
        Ok(())
    }

    async fn restart(&mut self) -> PluginResult<()> {
        info!("Restarting trace capture");
        self.acquire().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Automation client that records calls and can be told to fail
    #[derive(Clone, Default)]
    struct FakeClient {
        calls: Arc<Mutex<Vec<String>>>,
        unavailable_on: Option<&'static str>,
    }

    impl FakeClient {
        fn record(&self, call: String, op: &'static str) -> Result<(), AutomationError> {
            self.calls.lock().unwrap().push(call);
            if self.unavailable_on == Some(op) {
                return Err(AutomationError::Unavailable(format!("{} lost", op)));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AutomationClient for FakeClient {
        async fn connect(&mut self) -> Result<(), AutomationError> {
            self.record("connect".to_string(), "connect")
        }
        async fn start_capture(&mut self, device_id: &str) -> Result<(), AutomationError> {
            self.record(format!("start {}", device_id), "start")
        }
        async fn stop_capture(&mut self) -> Result<(), AutomationError> {
            self.record("stop".to_string(), "stop")
        }
        async fn save_capture(&mut self, path: &Path) -> Result<(), AutomationError> {
            self.record(format!("save {}", path.display()), "save")
        }
        async fn close_capture(&mut self) -> Result<(), AutomationError> {
            self.record("close".to_string(), "close")
        }
        async fn disconnect(&mut self) -> Result<(), AutomationError> {
            self.record("disconnect".to_string(), "disconnect")
        }
    }

    fn settings() -> TraceSettings {
        TraceSettings::new("F4241", "/tmp/traces").with_startup_grace(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_iteration_lifecycle() {
        let client = FakeClient::default();
        let mut plugin = TraceCapturePlugin::new(settings(), client.clone());

        plugin.setup().await.unwrap();
        plugin.start().await.unwrap();
        plugin.stop().await.unwrap();
        plugin.fail(&CaptureName::new("cap")).await.unwrap();
        plugin.close().await.unwrap();

        assert_eq!(
            client.calls(),
            vec!["disconnect", "connect", "start F4241", "stop", "save /tmp/traces/cap.sal", "close"]
        );
    }

    #[tokio::test]
    async fn test_stop_skipped_when_start_failed() {
        let client = FakeClient {
            unavailable_on: Some("start"),
            ..Default::default()
        };
        let mut plugin = TraceCapturePlugin::new(settings(), client.clone());
        plugin.setup().await.unwrap();

        let err = plugin.start().await.unwrap_err();
        plugin.stop().await.unwrap();

        assert!(matches!(err, PluginError::Device { .. }));
        assert!(!client.calls().contains(&"stop".to_string()));
    }

    #[tokio::test]
    async fn test_unavailable_maps_to_device_error() {
        let client = FakeClient {
            unavailable_on: Some("save"),
            ..Default::default()
        };
        let mut plugin = TraceCapturePlugin::new(settings(), client);

        let err = plugin.resync(&CaptureName::new("cap")).await.unwrap_err();
        assert!(matches!(err, PluginError::Device { ref plugin, .. } if plugin == "trace"));
    }

    #[tokio::test]
    async fn test_restart_is_idempotent() {
        let client = FakeClient::default();
        let mut plugin = TraceCapturePlugin::new(settings(), client.clone());

        plugin.setup().await.unwrap();
        plugin.restart().await.unwrap();
        plugin.restart().await.unwrap();

        let connects = client.calls().iter().filter(|c| *c == "connect").count();
        assert_eq!(connects, 3);
    }

    #[tokio::test]
    async fn test_launches_and_kills_application() {
        let client = FakeClient::default();
        let settings = settings().with_executable("sleep", vec!["30".to_string()]);
        let mut plugin = TraceCapturePlugin::new(settings, client);

        plugin.setup().await.unwrap();
        assert!(plugin.app.is_some());

        plugin.terminate().await.unwrap();
        assert!(plugin.app.is_none());
    }

    #[tokio::test]
    async fn test_missing_executable_fails_setup() {
        let client = FakeClient::default();
        let settings = settings().with_executable("/nonexistent/capture-app", Vec::new());
        let mut plugin = TraceCapturePlugin::new(settings, client);

        let err = plugin.setup().await.unwrap_err();
        assert!(matches!(err, PluginError::Failed { .. }));
    }
}

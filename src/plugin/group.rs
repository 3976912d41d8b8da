//! Plugin group - fans lifecycle hooks out to every registered plugin.
//!
//! Plugins are called one at a time in registration order. A failing plugin
//! does not stop the fan-out; failures are collected and the most severe one
//! is returned once every plugin has been called.

use std::sync::Arc;

use log::{error, info, warn};

use super::{CapturePlugin, PluginError, PluginResult};
use crate::domain::CaptureName;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::logging::RunLog;

/// Lifecycle hook being fanned out
#[derive(Debug, Clone, Copy)]
enum Hook<'a> {
    Start,
    Stop,
    Resync(&'a CaptureName),
    Fail(&'a CaptureName),
    Close,
    Terminate,
}

impl Hook<'_> {
    fn label(&self) -> &'static str {
        match self {
            Hook::Start => "start",
            Hook::Stop => "stop",
            Hook::Resync(_) => "resync",
            Hook::Fail(_) => "fail",
            Hook::Close => "close",
            Hook::Terminate => "terminate",
        }
    }

    /// Terminate is final, so a device error there is not worth a restart
    fn allows_restart(&self) -> bool {
        !matches!(self, Hook::Terminate)
    }
}

/// Ordered collection of capture plugins for a run.
pub struct PluginGroup {
    plugins: Vec<Box<dyn CapturePlugin>>,
    run_log: Arc<RunLog>,
}

impl PluginGroup {
    /// Register plugins and call `setup` on each, in order.
    ///
    /// The first setup failure aborts construction.
    pub async fn new(mut plugins: Vec<Box<dyn CapturePlugin>>, run_log: Arc<RunLog>) -> PluginResult<Self> {
        for plugin in plugins.iter_mut() {
            info!("Setting up plugin '{}'", plugin.name());
            plugin.setup().await?;
        }
        Ok(Self { plugins, run_log })
    }

    /// Group with no plugins
    pub fn empty(run_log: Arc<RunLog>) -> Self {
        Self {
            plugins: Vec::new(),
            run_log,
        }
    }

    /// Plugin names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Begin the iteration on every plugin
    pub async fn start(&mut self) -> PluginResult<()> {
        self.fan_out(Hook::Start).await
    }

    /// Release per-iteration state on every plugin
    pub async fn close(&mut self) -> PluginResult<()> {
        self.fan_out(Hook::Close).await
    }

    /// Release every plugin's external resource
    pub async fn terminate(&mut self) -> PluginResult<()> {
        self.fan_out(Hook::Terminate).await
    }

    /// Name the iteration's artifacts and stop capturing
    pub async fn on_stop(&mut self, iteration: u64) -> (CaptureName, PluginResult<()>) {
        let name = CaptureName::for_iteration(iteration);
        let result = self.fan_out(Hook::Stop).await;
        (name, result)
    }

    /// Report a timed-out iteration and persist its serial transcript.
    ///
    /// The transcript is written even when a plugin fails. A plugin failure
    /// takes precedence over a failed transcript write, which is only logged.
    pub async fn on_fail<E>(&mut self, name: &CaptureName, evaluator: &mut E) -> Result<()>
    where
        E: Evaluator + ?Sized,
    {
        warn!("Iteration failed, capture {}", name);
        let plugins = self.fan_out(Hook::Fail(name)).await;

        let persisted = self.run_log.persist_serial(name, evaluator.log());
        evaluator.clear_log();

        match (plugins, persisted) {
            (Err(e), Err(write_err)) => {
                error!("Failed to persist serial transcript for {}: {}", name, write_err);
                Err(e.into())
            }
            (Err(e), Ok(_)) => Err(e.into()),
            (Ok(()), persisted) => persisted.map(|_| ()),
        }
    }

    /// Report an iteration that needed the retry command
    pub async fn on_resync(&mut self, name: &CaptureName) -> PluginResult<()> {
        info!("Iteration resynced, capture {}", name);
        self.fan_out(Hook::Resync(name)).await
    }

    async fn fan_out(&mut self, hook: Hook<'_>) -> PluginResult<()> {
        let mut failures = Vec::new();
        for plugin in self.plugins.iter_mut() {
            if let Err(e) = Self::invoke(plugin.as_mut(), hook).await {
                failures.push(e);
            }
        }
        Self::most_severe(hook, failures)
    }

    /// Call one hook on one plugin, restarting it on a device error
    async fn invoke(plugin: &mut dyn CapturePlugin, hook: Hook<'_>) -> PluginResult<()> {
        let result = match hook {
            Hook::Start => plugin.start().await,
            Hook::Stop => plugin.stop().await,
            Hook::Resync(name) => plugin.resync(name).await,
            Hook::Fail(name) => plugin.fail(name).await,
            Hook::Close => plugin.close().await,
            Hook::Terminate => plugin.terminate().await,
        };

        match result {
            Err(PluginError::Device { plugin: name, reason }) if hook.allows_restart() => {
                warn!("Plugin '{}' device error during {}: {}; restarting", name, hook.label(), reason);
                if let Err(e) = plugin.restart().await {
                    error!("Plugin '{}' restart failed: {}", name, e);
                }
                Err(PluginError::RebootRequired { plugin: name, reason })
            }
            other => other,
        }
    }

    fn most_severe(hook: Hook<'_>, mut failures: Vec<PluginError>) -> PluginResult<()> {
        if failures.is_empty() {
            return Ok(());
        }

        let index = failures.iter().position(|e| e.is_reboot_required()).unwrap_or(0);
        let chosen = failures.remove(index);
        for other in &failures {
            error!("Plugin {} hook: {}", hook.label(), other);
        }
        Err(chosen)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording plugin shared by the group and stress loop tests.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::super::{CapturePlugin, PluginError, PluginResult};
    use crate::domain::CaptureName;

    /// How a recording plugin fails
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailMode {
        Device,
        Failed,
    }

    /// Plugin that records every call as `"<name>:<hook>"` into a shared journal
    pub struct RecordingPlugin {
        name: String,
        journal: Arc<Mutex<Vec<String>>>,
        fail_on: Option<(&'static str, FailMode)>,
    }

    impl RecordingPlugin {
        pub fn new(name: &str, journal: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                journal,
                fail_on: None,
            }
        }

        pub fn failing(mut self, hook: &'static str, mode: FailMode) -> Self {
            self.fail_on = Some((hook, mode));
            self
        }

        fn record(&self, hook: &'static str) -> PluginResult<()> {
            self.journal.lock().unwrap().push(format!("{}:{}", self.name, hook));
            match self.fail_on {
                Some((h, FailMode::Device)) if h == hook => Err(PluginError::Device {
                    plugin: self.name.clone(),
                    reason: format!("{} broke", hook),
                }),
                Some((h, FailMode::Failed)) if h == hook => Err(PluginError::Failed {
                    plugin: self.name.clone(),
                    reason: format!("{} broke", hook),
                }),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CapturePlugin for RecordingPlugin {
        fn name(&self) -> &str {
            &self.name
        }
        async fn setup(&mut self) -> PluginResult<()> {
            self.record("setup")
        }
        async fn start(&mut self) -> PluginResult<()> {
            self.record("start")
        }
        async fn stop(&mut self) -> PluginResult<()> {
            self.record("stop")
        }
        async fn resync(&mut self, _name: &CaptureName) -> PluginResult<()> {
            self.record("resync")
        }
        async fn fail(&mut self, _name: &CaptureName) -> PluginResult<()> {
            self.record("fail")
        }
        async fn close(&mut self) -> PluginResult<()> {
            self.record("close")
        }
        async fn terminate(&mut self) -> PluginResult<()> {
            self.record("terminate")
        }
    }

    pub fn journal() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn count(journal: &Arc<Mutex<Vec<String>>>, entry: &str) -> usize {
        journal.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

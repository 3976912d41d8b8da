//! Stress loop - the escalation controller.
//!
//! Each cycle:
//! 1. Starts every plugin (close always follows)
//! 2. Evaluates the device
//! 3. Stops the plugins, reports the failed or resynced iteration and
//!    updates the failure streak
//! 4. Applies the recovery action the escalation policy picks
//! 5. Emits run statistics
//!
//! A plugin asking for a reboot short-circuits the cycle and power-cycles the
//! host; without a power controller that ends the run with an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::escalation::{EscalationPolicy, RecoveryAction};
use super::iteration::IterationEngine;
use super::{cancellable, pause};
use crate::domain::{Outcome, RunStats};
use crate::error::{Result, StressError};
use crate::evaluator::Evaluator;
use crate::logging::RunLog;
use crate::plugin::{PluginError, PluginGroup};
use crate::power::PowerController;

/// Configuration for the stress loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Reboot the MCU instead of the SoC on clean cycles
    pub stress_mcu: bool,
    /// End the run as soon as a failure streak begins
    pub fail_fast: bool,
    /// Stop after this many iterations
    pub max_iterations: Option<u64>,
    pub policy: EscalationPolicy,
    /// Wait after a power cycle before the next cycle
    pub reboot_cooldown: Duration,
    /// Wait after a transient link fault
    pub fault_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            stress_mcu: false,
            fail_fast: false,
            max_iterations: None,
            policy: EscalationPolicy::default(),
            reboot_cooldown: Duration::from_secs(20),
            fault_backoff: Duration::from_secs(1),
        }
    }
}

/// Why a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunExit {
    /// Operator interrupt
    Interrupted,
    /// A failure streak began with fail-fast enabled
    FailFast,
    /// The iteration bound was reached
    Completed,
}

impl fmt::Display for RunExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunExit::Interrupted => write!(f, "interrupted"),
            RunExit::FailFast => write!(f, "fail-fast"),
            RunExit::Completed => write!(f, "completed"),
        }
    }
}

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub stats: RunStats,
    pub fail_streak: u32,
    pub exit: RunExit,
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    Continue,
    FailFast,
}

/// Main loop driving evaluator, plugins and power controller.
pub struct StressLoop<E> {
    engine: IterationEngine<E>,
    plugins: PluginGroup,
    power: Option<Box<dyn PowerController>>,
    run_log: Arc<RunLog>,
    settings: LoopSettings,
    cancel: CancellationToken,
    fail_streak: u32,
}

impl<E: Evaluator> StressLoop<E> {
    pub fn new(
        engine: IterationEngine<E>,
        plugins: PluginGroup,
        run_log: Arc<RunLog>,
        settings: LoopSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            plugins,
            power: None,
            run_log,
            settings,
            cancel,
            fail_streak: 0,
        }
    }

    /// Use `power` for last-resort recovery
    pub fn with_power(mut self, power: Box<dyn PowerController>) -> Self {
        self.power = Some(power);
        self
    }

    pub fn fail_streak(&self) -> u32 {
        self.fail_streak
    }

    pub fn stats(&self) -> RunStats {
        self.engine.stats()
    }

    /// Run cycles until interrupted, fail-fast, the iteration bound, or a
    /// fatal error.
    ///
    /// Plugins are terminated and final statistics emitted on every exit path.
    pub async fn run(&mut self) -> Result<RunSummary> {
        info!(
            "Starting stress loop: plugins={:?} power={} stress_mcu={} fail_fast={}",
            self.plugins.names(),
            self.power.as_ref().map(|p| p.describe()).unwrap_or_else(|| "none".to_string()),
            self.settings.stress_mcu,
            self.settings.fail_fast
        );

        let result = self.run_cycles().await;

        if let Err(e) = self.plugins.terminate().await {
            error!("Plugin terminate failed: {}", e);
        }
        let stats = self.engine.stats();
        self.run_log.record_stats(&stats);

        let exit = result?;
        info!("Stress loop ended ({}): {}", exit, stats);
        Ok(RunSummary {
            stats,
            fail_streak: self.fail_streak,
            exit,
        })
    }

    async fn run_cycles(&mut self) -> Result<RunExit> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(RunExit::Interrupted);
            }
            if let Some(max) = self.settings.max_iterations
                && self.engine.stats().iterations >= max
            {
                info!("Reached {} iterations", max);
                return Ok(RunExit::Completed);
            }

            let fault = match self.scoped_cycle().await {
                Ok(CycleEnd::Continue) => continue,
                Ok(CycleEnd::FailFast) => return Ok(RunExit::FailFast),
                Err(e) => e,
            };

            if let Some(exit) = self.handle_fault(fault).await? {
                return Ok(exit);
            }
        }
    }

    /// One cycle inside the plugins' start/close scope
    async fn scoped_cycle(&mut self) -> Result<CycleEnd> {
        let started = self.plugins.start().await.map_err(StressError::from);
        let result = match absorb("start", started) {
            Ok(()) => self.cycle().await,
            Err(e) => Err(e),
        };

        let closed = absorb("close", self.plugins.close().await.map_err(StressError::from));
        match (result, closed) {
            (Err(e), Err(close_err)) => {
                error!("Plugin close failed: {}", close_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(end), closed) => closed.map(|()| end),
        }
    }

    async fn cycle(&mut self) -> Result<CycleEnd> {
        let outcome = self.engine.evaluate().await?;
        let iteration = self.engine.stats().iterations;

        let (name, stopped) = self.plugins.on_stop(iteration).await;
        absorb("stop", stopped.map_err(StressError::from))?;

        // A reboot-required short-circuit leaves the streak as it was
        match outcome {
            Outcome::Synced => self.fail_streak = 0,
            Outcome::Timeout => {
                let failed = self.plugins.on_fail(&name, self.engine.evaluator_mut()).await;
                absorb("fail", failed)?;
                self.fail_streak += 1;
            }
            Outcome::Resynced => {
                let resynced = self.plugins.on_resync(&name).await.map_err(StressError::from);
                absorb("resync", resynced)?;
            }
        }

        self.run_log.record_outcome(iteration, outcome, self.fail_streak);

        if self.settings.fail_fast && self.fail_streak != 0 {
            warn!("Fail-fast: stopping after failed iteration {}", iteration);
            return Ok(CycleEnd::FailFast);
        }

        self.recover_device().await?;
        self.run_log.record_stats(&self.engine.stats());
        Ok(CycleEnd::Continue)
    }

    /// Decide what a cycle error means for the run.
    ///
    /// Returns the exit reason when the run should end cleanly.
    async fn handle_fault(&mut self, fault: StressError) -> Result<Option<RunExit>> {
        let recovered = match fault {
            StressError::Cancelled => return Ok(Some(RunExit::Interrupted)),
            StressError::Plugin(PluginError::RebootRequired { plugin, reason }) => {
                self.recover_host(plugin, reason).await
            }
            e @ (StressError::LinkClosed | StressError::Io(_)) => {
                warn!("Transient link fault: {}; continuing", e);
                pause(&self.cancel, self.settings.fault_backoff).await
            }
            other => return Err(other),
        };

        match recovered {
            Ok(()) => Ok(None),
            Err(StressError::Cancelled) => Ok(Some(RunExit::Interrupted)),
            Err(e) => Err(e),
        }
    }

    /// A plugin needs the host power-cycled
    async fn recover_host(&mut self, plugin: String, reason: String) -> Result<()> {
        if self.power.is_none() {
            error!("Plugin '{}' requires a reboot and no power controller is configured", plugin);
            return Err(StressError::RebootRequired { plugin, reason });
        }
        warn!("Plugin '{}' requires a reboot: {}", plugin, reason);
        self.power_cycle().await
    }

    async fn recover_device(&mut self) -> Result<()> {
        let action = self
            .settings
            .policy
            .select(self.fail_streak, self.power.is_some(), self.settings.stress_mcu);
        if self.fail_streak > 0 {
            warn!("Fail streak {}: {}", self.fail_streak, action);
        } else {
            debug!("Recovery: {}", action);
        }

        match action {
            RecoveryAction::PowerCycle => match self.power_cycle().await {
                Err(StressError::Power(e)) => {
                    error!("Power cycle failed: {}; rebooting MCU and SoC instead", e);
                    self.reboot_both().await
                }
                other => other,
            },
            RecoveryAction::RebootBoth => self.reboot_both().await,
            RecoveryAction::RebootMcu => cancellable(&self.cancel, self.engine.evaluator_mut().mcu_reboot()).await,
            RecoveryAction::RebootSoc => cancellable(&self.cancel, self.engine.evaluator_mut().soc_reboot()).await,
        }
    }

    async fn reboot_both(&mut self) -> Result<()> {
        cancellable(&self.cancel, self.engine.evaluator_mut().mcu_reboot()).await?;
        cancellable(&self.cancel, self.engine.evaluator_mut().soc_reboot()).await
    }

    /// Cycle the relay, then wait out the cooldown.
    ///
    /// The relay sequence itself always runs to completion so power is
    /// restored; only the cooldown is interruptible.
    async fn power_cycle(&mut self) -> Result<()> {
        let Some(power) = self.power.as_ref() else {
            return Err(StressError::Config("no power controller configured".to_string()));
        };
        info!("Power cycling {}", power.describe());
        power.power_cycle().await?;
        pause(&self.cancel, self.settings.reboot_cooldown).await
    }
}

/// Log and swallow plugin trouble that does not need the host.
///
/// Reboot-required errors and non-plugin errors pass through.
fn absorb(hook: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(StressError::Plugin(e)) if !e.is_reboot_required() => {
            error!("Plugin '{}' {} hook failed: {}", e.plugin(), hook, e);
            Ok(())
        }
        Err(StressError::Io(e)) if hook == "fail" => {
            error!("Failed to persist serial transcript: {}", e);
            Ok(())
        }
        other => other,
    }
}

//! Configuration system for hilstress.
//!
//! Two-layer configuration:
//! 1. File config (explicit path, ~/.config/hilstress/hilstress.yml or ./hilstress.yml)
//! 2. Command-line overrides
//!
//! The merged `GlobalConfig` hands out the settings each component takes.

use eyre::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use self::global::{
    CaptureConfig, DeviceConfig, EscalationConfig, EvaluationConfig, GlobalConfig, LoggingConfig, PowerConfig,
};
pub use self::overrides::ConfigOverrides;

mod global;
mod overrides;

/// Default console line announcing a healthy link.
pub const DEFAULT_SUCCESS_MARKER: &str = "SESSION READY";

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Load the file configuration and apply command-line overrides on top.
pub fn load_config(explicit_path: Option<&PathBuf>, overrides: ConfigOverrides) -> Result<GlobalConfig> {
    let config = overrides.apply(GlobalConfig::load(explicit_path)?);
    config.validate()?;
    Ok(config)
}

impl GlobalConfig {
    /// Serial device path
    pub fn port(&self) -> Result<&Path> {
        self.device
            .port
            .as_deref()
            .ok_or_else(|| eyre::eyre!("no serial port given (--port or device.port)"))
    }

    pub fn device_settings(&self) -> crate::evaluator::DeviceSettings {
        let mut settings = crate::evaluator::DeviceSettings::new(self.device.success_marker.clone())
            .with_commands(self.device.commands.clone())
            .with_settle_delay(self.device.settle_delay())
            .with_max_line_length(self.device.max_line_length);
        if let Some(marker) = &self.device.error_marker {
            settings = settings.with_error_marker(marker.clone());
        }
        settings
    }

    pub fn iteration_settings(&self) -> crate::runner::IterationSettings {
        crate::runner::IterationSettings {
            timeout: Duration::from_secs(self.evaluation.timeout_secs),
            retry_command: self.evaluation.retry_command.clone(),
            retry_timeout: Duration::from_secs(self.evaluation.retry_timeout_secs),
        }
    }

    pub fn loop_settings(&self) -> crate::runner::LoopSettings {
        crate::runner::LoopSettings {
            stress_mcu: self.evaluation.stress_mcu,
            fail_fast: self.evaluation.fail_fast,
            max_iterations: self.evaluation.max_iterations,
            policy: self.escalation.policy(),
            reboot_cooldown: Duration::from_secs(self.escalation.reboot_cooldown_secs),
            fault_backoff: Duration::from_millis(self.escalation.fault_backoff_ms),
        }
    }

    /// Trace plugin settings, or `None` when capture is not configured
    pub fn trace_settings(&self, output_dir: &Path) -> Option<crate::plugin::TraceSettings> {
        let device_id = self.capture.device_id.as_ref()?;
        let mut settings = crate::plugin::TraceSettings::new(device_id.clone(), output_dir)
            .with_startup_grace(Duration::from_millis(self.capture.startup_grace_ms));
        if let Some(exe) = &self.capture.executable {
            settings = settings.with_executable(exe.clone(), self.capture.args.clone());
        }
        Some(settings)
    }

    /// Smart plug, or `None` when power cycling is not configured
    pub fn smart_plug(&self) -> Option<crate::power::SmartPlug> {
        let address = self.power.plug.as_ref()?;
        Some(
            crate::power::SmartPlug::new(address)
                .with_off_duration(Duration::from_millis(self.power.off_duration_ms))
                .with_io_timeout(Duration::from_millis(self.power.io_timeout_ms)),
        )
    }
}

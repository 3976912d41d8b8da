//! File configuration.
//!
//! Loaded from an explicit path, ~/.config/hilstress/hilstress.yml or
//! ./hilstress.yml

use eyre::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::evaluator::ShellCommands;
use crate::runner::EscalationPolicy;

/// Configuration file contents. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Serial device and console matching.
    pub device: DeviceConfig,

    /// Evaluate step timing and the retry command.
    pub evaluation: EvaluationConfig,

    /// Recovery thresholds and delays.
    pub escalation: EscalationConfig,

    /// Trace capture plugin.
    pub capture: CaptureConfig,

    /// Smart plug timing.
    pub power: PowerConfig,

    /// Run log settings.
    pub logging: LoggingConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. ~/.config/hilstress/hilstress.yml
    /// 3. ./hilstress.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let mut candidates = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("hilstress").join("hilstress.yml"));
        }
        candidates.push(PathBuf::from("hilstress.yml"));

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => {
                    log::info!("Loaded config from {}", candidate.display());
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", candidate.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub(crate) fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.device.success_marker.trim().is_empty() {
            eyre::bail!("device.success-marker must not be empty");
        }
        if self.device.error_marker.as_deref().is_some_and(|m| m.trim().is_empty()) {
            eyre::bail!("device.error-marker must not be empty when set");
        }
        if self.device.baud == 0 {
            eyre::bail!("device.baud must be > 0");
        }
        if self.device.max_line_length == 0 {
            eyre::bail!("device.max-line-length must be > 0");
        }
        if self.evaluation.timeout_secs == 0 {
            eyre::bail!("evaluation.timeout-secs must be > 0");
        }
        if self.escalation.power_cycle_after < self.escalation.hard_reboot_after {
            eyre::bail!("escalation.power-cycle-after must be >= escalation.hard-reboot-after");
        }
        self.logging.level_filter()?;
        Ok(())
    }
}

/// Serial device and console matching.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial device path; normally given on the command line.
    pub port: Option<PathBuf>,

    pub baud: u32,

    #[serde(rename = "success-marker")]
    pub success_marker: String,

    #[serde(rename = "error-marker")]
    pub error_marker: Option<String>,

    /// Wait after an MCU reset in milliseconds.
    #[serde(rename = "settle-delay-ms")]
    pub settle_delay_ms: u64,

    /// Console lines longer than this many bytes are dropped.
    #[serde(rename = "max-line-length")]
    pub max_line_length: usize,

    /// Remote shell command lines.
    pub commands: ShellCommands,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: crate::config::DEFAULT_BAUD,
            success_marker: crate::config::DEFAULT_SUCCESS_MARKER.to_string(),
            error_marker: None,
            settle_delay_ms: 1_000,
            max_line_length: crate::evaluator::codec::DEFAULT_MAX_LINE_LENGTH,
            commands: ShellCommands::default(),
        }
    }
}

impl DeviceConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Evaluate step timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EvaluationConfig {
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Diagnostic command sent after a failed first wait.
    #[serde(rename = "retry-command")]
    pub retry_command: Option<String>,

    #[serde(rename = "retry-timeout-secs")]
    pub retry_timeout_secs: u64,

    /// Stop after this many iterations.
    #[serde(rename = "max-iterations")]
    pub max_iterations: Option<u64>,

    /// Reboot the MCU instead of the SoC on clean cycles.
    #[serde(rename = "stress-mcu")]
    pub stress_mcu: bool,

    #[serde(rename = "fail-fast")]
    pub fail_fast: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            retry_command: None,
            retry_timeout_secs: 10,
            max_iterations: None,
            stress_mcu: false,
            fail_fast: false,
        }
    }
}

/// Recovery thresholds and delays.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Reboot MCU and SoC once the streak exceeds this.
    #[serde(rename = "hard-reboot-after")]
    pub hard_reboot_after: u32,

    /// Power-cycle once the streak exceeds this.
    #[serde(rename = "power-cycle-after")]
    pub power_cycle_after: u32,

    /// Wait after a power cycle in seconds.
    #[serde(rename = "reboot-cooldown-secs")]
    pub reboot_cooldown_secs: u64,

    /// Wait after a transient link fault in milliseconds.
    #[serde(rename = "fault-backoff-ms")]
    pub fault_backoff_ms: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        let policy = EscalationPolicy::default();
        Self {
            hard_reboot_after: policy.hard_reboot_after,
            power_cycle_after: policy.power_cycle_after,
            reboot_cooldown_secs: 20,
            fault_backoff_ms: 1_000,
        }
    }
}

impl EscalationConfig {
    pub fn policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            hard_reboot_after: self.hard_reboot_after,
            power_cycle_after: self.power_cycle_after,
        }
    }
}

/// Trace capture plugin.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture device identifier; capture is enabled when set.
    #[serde(rename = "device-id")]
    pub device_id: Option<String>,

    /// Capture application launched in automation mode.
    pub executable: Option<PathBuf>,

    /// Extra arguments for the capture application.
    pub args: Vec<String>,

    /// Local port of the automation service.
    #[serde(rename = "automation-port")]
    pub automation_port: u16,

    #[serde(rename = "startup-grace-ms")]
    pub startup_grace_ms: u64,

    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            executable: None,
            args: Vec::new(),
            automation_port: 10430,
            startup_grace_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Smart plug.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Plug address, HOST or HOST:PORT; power cycling is enabled when set.
    pub plug: Option<String>,

    #[serde(rename = "off-duration-ms")]
    pub off_duration_ms: u64,

    #[serde(rename = "io-timeout-ms")]
    pub io_timeout_ms: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            plug: None,
            off_duration_ms: 5_000,
            io_timeout_ms: 5_000,
        }
    }
}

/// Run log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Run log and artifact directory.
    pub dir: PathBuf,

    /// One of off, error, warn, info, debug, trace.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.level).map_err(|_| eyre::eyre!("logging.level '{}' is not a log level", self.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.device.baud, 115_200);
        assert_eq!(config.device.success_marker, "SESSION READY");
        assert_eq!(config.evaluation.timeout_secs, 20);
        assert_eq!(config.evaluation.retry_timeout_secs, 10);
        assert_eq!(config.escalation.hard_reboot_after, 3);
        assert_eq!(config.escalation.power_cycle_after, 10);
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Info);
    }

    #[test]
    fn test_config_validation() {
        let config = GlobalConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_success_marker_invalid() {
        let config = GlobalConfig {
            device: DeviceConfig {
                success_marker: "  ".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_thresholds_invalid() {
        let config = GlobalConfig {
            escalation: EscalationConfig {
                hard_reboot_after: 10,
                power_cycle_after: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_line_length_invalid() {
        let mut config = GlobalConfig::default();
        config.device.max_line_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_invalid() {
        let config = GlobalConfig {
            logging: LoggingConfig {
                level: "loud".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
device:
  success-marker: link up
  max-line-length: 512
  commands:
    mcu-reset: mcuctl -r
evaluation:
  retry-command: dmesg | tail
escalation:
  power-cycle-after: 5
"#;
        let config: GlobalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.device.success_marker, "link up");
        assert_eq!(config.device.commands.mcu_reset, "mcuctl -r");
        assert_eq!(config.device.max_line_length, 512);
        assert_eq!(config.evaluation.retry_command.as_deref(), Some("dmesg | tail"));
        assert_eq!(config.escalation.policy().power_cycle_after, 5);
        // Other fields should have defaults
        assert_eq!(config.device.commands.elevate, "su");
        assert_eq!(config.escalation.hard_reboot_after, 3);
        assert_eq!(config.device.baud, 115_200);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bench.yml");
        fs::write(&path, "logging:\n  level: debug\n").unwrap();

        let config = GlobalConfig::load(Some(&path)).unwrap();

        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/hilstress.yml");
        assert!(GlobalConfig::load(Some(&path)).is_err());
    }
}

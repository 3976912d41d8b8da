//! Command-line overrides.
//!
//! Values given on the command line replace the file configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::GlobalConfig;

/// Configuration overrides for one run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baud: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_marker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_marker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_timeout_secs: Option<u64>,

    /// Only ever switches the mode on.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stress_mcu: bool,

    /// Only ever switches the mode on.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fail_fast: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_device: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_exe: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_plug: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides (no overrides applied).
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if any overrides are set.
    pub fn is_empty(&self) -> bool {
        self.port.is_none()
            && self.baud.is_none()
            && self.success_marker.is_none()
            && self.error_marker.is_none()
            && self.timeout_secs.is_none()
            && self.retry_command.is_none()
            && self.retry_timeout_secs.is_none()
            && !self.stress_mcu
            && !self.fail_fast
            && self.capture_device.is_none()
            && self.capture_exe.is_none()
            && self.power_plug.is_none()
            && self.max_iterations.is_none()
            && self.log_dir.is_none()
            && self.log_level.is_none()
    }

    /// Apply the overrides on top of `config`.
    pub fn apply(self, mut config: GlobalConfig) -> GlobalConfig {
        if let Some(port) = self.port {
            config.device.port = Some(port);
        }
        if let Some(baud) = self.baud {
            config.device.baud = baud;
        }
        if let Some(marker) = self.success_marker {
            config.device.success_marker = marker;
        }
        if let Some(marker) = self.error_marker {
            config.device.error_marker = Some(marker);
        }
        if let Some(secs) = self.timeout_secs {
            config.evaluation.timeout_secs = secs;
        }
        if let Some(command) = self.retry_command {
            config.evaluation.retry_command = Some(command);
        }
        if let Some(secs) = self.retry_timeout_secs {
            config.evaluation.retry_timeout_secs = secs;
        }
        config.evaluation.stress_mcu |= self.stress_mcu;
        config.evaluation.fail_fast |= self.fail_fast;
        if let Some(max) = self.max_iterations {
            config.evaluation.max_iterations = Some(max);
        }
        if let Some(device_id) = self.capture_device {
            config.capture.device_id = Some(device_id);
        }
        if let Some(exe) = self.capture_exe {
            config.capture.executable = Some(exe);
        }
        if let Some(plug) = self.power_plug {
            config.power.plug = Some(plug);
        }
        if let Some(dir) = self.log_dir {
            config.logging.dir = dir;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_overrides() {
        let overrides = ConfigOverrides::none();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let mut config = GlobalConfig::default();
        config.evaluation.retry_command = Some("dmesg".to_string());
        config.evaluation.fail_fast = true;

        let config = ConfigOverrides::none().apply(config);

        assert_eq!(config.evaluation.retry_command.as_deref(), Some("dmesg"));
        assert!(config.evaluation.fail_fast);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let overrides = ConfigOverrides {
            port: Some(PathBuf::from("/dev/ttyUSB1")),
            success_marker: Some("link up".to_string()),
            timeout_secs: Some(45),
            stress_mcu: true,
            power_plug: Some("10.0.0.7".to_string()),
            ..Default::default()
        };
        assert!(!overrides.is_empty());

        let config = overrides.apply(GlobalConfig::default());

        assert_eq!(config.device.port, Some(PathBuf::from("/dev/ttyUSB1")));
        assert_eq!(config.device.success_marker, "link up");
        assert_eq!(config.evaluation.timeout_secs, 45);
        assert!(config.evaluation.stress_mcu);
        assert_eq!(config.power.plug.as_deref(), Some("10.0.0.7"));
        // Untouched fields keep defaults
        assert_eq!(config.evaluation.retry_timeout_secs, 10);
    }

    #[test]
    fn test_serialize_skips_unset() {
        let overrides = ConfigOverrides {
            max_iterations: Some(25),
            ..Default::default()
        };
        let json = serde_json::to_string(&overrides).unwrap();
        assert!(json.contains("25"));
        assert!(!json.contains("fail_fast"));
        assert!(!json.contains("port"));
    }
}

//! CLI definitions using clap.
//!
//! Every option is optional at the clap level so that unset flags fall back
//! to the config file and its defaults.

use clap::Parser;
use std::path::PathBuf;

use crate::config::ConfigOverrides;

/// hilstress - hardware-in-the-loop reboot/resync stress tester
#[derive(Parser, Debug)]
#[command(name = "hilstress")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Serial device of the device console (required here or in the config file)
    #[arg(short, long)]
    pub port: Option<PathBuf>,

    /// Serial baud rate [default: 115200]
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Console text announcing a healthy link, matched case-insensitively [default: SESSION READY]
    #[arg(long)]
    pub success_marker: Option<String>,

    /// Console text that fails the wait immediately
    #[arg(long)]
    pub error_marker: Option<String>,

    /// Seconds to wait for the success marker [default: 20]
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Diagnostic command sent when the first wait fails; enables the retry wait
    #[arg(long)]
    pub retry_command: Option<String>,

    /// Seconds to wait after the retry command [default: 10]
    #[arg(long)]
    pub retry_timeout: Option<u64>,

    /// Reboot the MCU instead of the SoC on clean cycles
    #[arg(long)]
    pub stress_mcu: bool,

    /// Stop as soon as an iteration fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Logic analyzer device id; enables trace capture
    #[arg(long, requires = "capture_exe")]
    pub capture_device: Option<String>,

    /// Logic analyzer capture application
    #[arg(long, requires = "capture_device")]
    pub capture_exe: Option<PathBuf>,

    /// Smart plug address, HOST or HOST:PORT; enables power cycling
    #[arg(long)]
    pub power_plug: Option<String>,

    /// Stop after this many iterations
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Directory for the run log and failure artifacts [default: logs]
    #[arg(short, long)]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Command-line values that replace the config file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port.clone(),
            baud: self.baud,
            success_marker: self.success_marker.clone(),
            error_marker: self.error_marker.clone(),
            timeout_secs: self.timeout,
            retry_command: self.retry_command.clone(),
            retry_timeout_secs: self.retry_timeout,
            stress_mcu: self.stress_mcu,
            fail_fast: self.fail_fast,
            capture_device: self.capture_device.clone(),
            capture_exe: self.capture_exe.clone(),
            power_plug: self.power_plug.clone(),
            max_iterations: self.iterations,
            log_dir: self.log_dir.clone(),
            log_level: self.verbose.then(|| "debug".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_minimal() {
        let cli = Cli::try_parse_from(["hilstress", "--port", "/dev/ttyUSB0"]).unwrap();
        assert_eq!(cli.port, Some(PathBuf::from("/dev/ttyUSB0")));
        assert!(!cli.verbose);
        assert!(!cli.stress_mcu);
        assert!(!cli.fail_fast);
        assert!(cli.config.is_none());
        assert!(cli.retry_command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["hilstress", "-v"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.overrides().log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["hilstress", "-c", "/path/to/bench.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/bench.yml")));
    }

    #[test]
    fn test_cli_full() {
        let cli = Cli::try_parse_from([
            "hilstress",
            "-p",
            "/dev/ttyACM0",
            "--baud",
            "921600",
            "--success-marker",
            "link up",
            "--error-marker",
            "fatal",
            "--timeout",
            "30",
            "--retry-command",
            "dmesg -c",
            "--retry-timeout",
            "5",
            "--stress-mcu",
            "--fail-fast",
            "--power-plug",
            "10.0.0.7:9999",
            "-n",
            "500",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.baud, Some(921_600));
        assert_eq!(overrides.success_marker.as_deref(), Some("link up"));
        assert_eq!(overrides.error_marker.as_deref(), Some("fatal"));
        assert_eq!(overrides.timeout_secs, Some(30));
        assert_eq!(overrides.retry_command.as_deref(), Some("dmesg -c"));
        assert_eq!(overrides.retry_timeout_secs, Some(5));
        assert!(overrides.stress_mcu);
        assert!(overrides.fail_fast);
        assert_eq!(overrides.power_plug.as_deref(), Some("10.0.0.7:9999"));
        assert_eq!(overrides.max_iterations, Some(500));
        assert!(overrides.log_level.is_none());
    }

    #[test]
    fn test_capture_options_both_or_neither() {
        assert!(Cli::try_parse_from(["hilstress", "--capture-device", "F4241"]).is_err());
        assert!(Cli::try_parse_from(["hilstress", "--capture-exe", "/opt/logic/Logic"]).is_err());

        let cli = Cli::try_parse_from([
            "hilstress",
            "--capture-device",
            "F4241",
            "--capture-exe",
            "/opt/logic/Logic",
        ])
        .unwrap();
        assert_eq!(cli.capture_device.as_deref(), Some("F4241"));
        assert_eq!(cli.capture_exe, Some(PathBuf::from("/opt/logic/Logic")));
    }

    #[test]
    fn test_unset_options_do_not_override() {
        let cli = Cli::try_parse_from(["hilstress"]).unwrap();
        assert!(cli.overrides().is_empty());
    }
}

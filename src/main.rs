use chrono::Local;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{error, info};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use hilstress::cli::Cli;
use hilstress::config::{GlobalConfig, load_config};
use hilstress::evaluator::{DeviceEvaluator, open_serial};
use hilstress::logging::{RunLog, setup_logging};
use hilstress::plugin::{CapturePlugin, HttpAutomationClient, PluginGroup, TraceCapturePlugin};
use hilstress::runner::{IterationEngine, RunExit, RunSummary, StressLoop, watch_interrupts};

/// Exit code for a forced second interrupt (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

/// Cancel `cancel` on the first Ctrl-C and exit on the second
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match watch_interrupts(tokio::signal::ctrl_c, cancel).await {
            Ok(()) => {
                error!("Second interrupt received, exiting without cleanup");
                log::logger().flush();
                std::process::exit(FORCED_EXIT_CODE);
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

async fn build_plugins(config: &GlobalConfig, run_log: Arc<RunLog>) -> Result<PluginGroup> {
    let Some(settings) = config.trace_settings(run_log.artifact_dir()) else {
        info!("Trace capture disabled");
        return Ok(PluginGroup::empty(run_log));
    };

    let timeout = Duration::from_millis(config.capture.request_timeout_ms);
    let client = HttpAutomationClient::new(config.capture.automation_port, timeout)
        .context("Failed to create automation client")?;
    let plugins: Vec<Box<dyn CapturePlugin>> = vec![Box::new(TraceCapturePlugin::new(settings, client))];

    PluginGroup::new(plugins, run_log)
        .await
        .context("Failed to set up capture plugins")
}

async fn run_application(config: &GlobalConfig) -> Result<RunSummary> {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let port = config.port()?;
    let serial = open_serial(port, config.device.baud)
        .with_context(|| format!("Failed to open serial port {}", port.display()))?;
    let evaluator = DeviceEvaluator::new(serial, config.device_settings());
    let engine = IterationEngine::new(evaluator, config.iteration_settings(), cancel.clone());

    let run_log = Arc::new(RunLog::new(&config.logging.dir).context("Failed to create artifact directory")?);
    let plugins = build_plugins(config, run_log.clone()).await?;

    let mut stress = StressLoop::new(engine, plugins, run_log, config.loop_settings(), cancel);
    if let Some(plug) = config.smart_plug() {
        info!("Power cycling through smart plug {}", plug.address());
        stress = stress.with_power(Box::new(plug));
    }

    Ok(stress.run().await?)
}

fn print_summary(summary: &RunSummary, log_file: &Path) {
    let exit = match summary.exit {
        RunExit::Completed => summary.exit.to_string().green(),
        RunExit::Interrupted => summary.exit.to_string().yellow(),
        RunExit::FailFast => summary.exit.to_string().red(),
    };
    let stats = &summary.stats;

    println!("{} {}", "Run ended:".bold(), exit);
    println!("  iterations: {}", stats.iterations);
    println!("  syncs:      {} ({:.1}%)", stats.syncs.to_string().green(), stats.sync_rate());
    println!("  resyncs:    {}", stats.resyncs.to_string().yellow());
    println!("  timeouts:   {}", stats.timeouts.to_string().red());
    println!("  fail streak at exit: {}", summary.fail_streak);
    println!("  run log: {}", log_file.display());
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config.as_ref(), cli.overrides()).context("Failed to load configuration")?;

    // Logging goes next to the run artifacts
    let level = config.logging.level_filter()?;
    let log_file = setup_logging(&config.logging.dir, Local::now(), level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);
    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let summary = run_application(&config).await.context("Stress run failed")?;
    print_summary(&summary, &log_file);

    Ok(())
}

//! Line-oriented device evaluator.
//!
//! Reads the device console line by line through [`ConsoleCodec`], matching
//! each line against the configured markers, and writes shell command lines
//! back. Every privileged
//! write is preceded by the elevation command because the shell session does
//! not survive a reboot.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{self, Instant};
use tokio_util::codec::FramedRead;

use super::codec::{ConsoleCodec, ConsoleLine, DEFAULT_MAX_LINE_LENGTH};
use super::{Evaluator, Marker};
use crate::error::{Result, StressError};

/// Shell command lines sent to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ShellCommands {
    /// Issued before every privileged command
    pub elevate: String,
    pub mcu_reset: String,
    pub soc_reboot: String,
}

impl Default for ShellCommands {
    fn default() -> Self {
        Self {
            elevate: "su".to_string(),
            mcu_reset: "mcu_ctl reset".to_string(),
            soc_reboot: "reboot".to_string(),
        }
    }
}

/// Everything the evaluator needs besides the stream itself.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub success_marker: Marker,
    pub error_marker: Option<Marker>,
    pub commands: ShellCommands,
    /// Wait applied after an MCU reset
    pub settle_delay: Duration,
    /// Longer console lines are dropped
    pub max_line_length: usize,
}

impl DeviceSettings {
    pub fn new(success_marker: impl Into<String>) -> Self {
        Self {
            success_marker: Marker::new(success_marker),
            error_marker: None,
            commands: ShellCommands::default(),
            settle_delay: Duration::from_secs(1),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    pub fn with_error_marker(mut self, marker: impl Into<String>) -> Self {
        self.error_marker = Some(Marker::new(marker));
        self
    }

    pub fn with_commands(mut self, commands: ShellCommands) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }
}

/// What a single console line means for the current wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineMatch {
    Success,
    Error,
    Neither,
}

/// Evaluator over any async byte stream (serial port in production).
///
/// Bytes of a line not yet terminated when a wait times out stay buffered in
/// the framed reader for the next wait.
pub struct DeviceEvaluator<S> {
    reader: FramedRead<ReadHalf<S>, ConsoleCodec>,
    writer: WriteHalf<S>,
    settings: DeviceSettings,
    log: String,
}

impl<S> DeviceEvaluator<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    pub fn new(stream: S, settings: DeviceSettings) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let codec = ConsoleCodec::with_max_length(settings.max_line_length);
        Self {
            reader: FramedRead::new(read_half, codec),
            writer: write_half,
            settings,
            log: String::new(),
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    fn classify(&self, line: &str) -> LineMatch {
        if self.settings.success_marker.matches(line) {
            LineMatch::Success
        } else if self.settings.error_marker.as_ref().is_some_and(|m| m.matches(line)) {
            LineMatch::Error
        } else {
            LineMatch::Neither
        }
    }

    /// Read the next line.
    ///
    /// Returns `None` for a line that is not valid UTF-8 or is over the
    /// length cap. Cancel-safe.
    async fn next_line(&mut self) -> Result<Option<String>> {
        match self.reader.next().await {
            Some(Ok(ConsoleLine::Text(line))) => Ok(Some(line)),
            Some(Ok(ConsoleLine::Undecodable(raw))) => {
                warn!("Skipping undecodable serial line: {}", hex::encode(raw));
                Ok(None)
            }
            Some(Ok(ConsoleLine::Overlong(len))) => {
                warn!(
                    "Skipping {} byte serial line over the {} byte limit",
                    len, self.settings.max_line_length
                );
                Ok(None)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(StressError::LinkClosed),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        debug!("serial> {}", line);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn privileged(&mut self, command: &str) -> Result<()> {
        let elevate = self.settings.commands.elevate.clone();
        self.write_line(&elevate).await?;
        self.write_line(command).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<S> Evaluator for DeviceEvaluator<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    async fn sync(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;

        loop {
            let line = match time::timeout_at(deadline, self.next_line()).await {
                Ok(line) => line?,
                Err(_) => {
                    debug!("No sync marker within {:?}", timeout);
                    return Ok(false);
                }
            };

            // Undecodable or overlong lines count as an empty line
            let Some(line) = line else { continue };
            debug!("serial< {}", line.trim_end());
            self.log.push_str(&line);

            match self.classify(&line) {
                LineMatch::Success => return Ok(true),
                LineMatch::Error => {
                    info!("Error marker seen: {}", line.trim_end());
                    return Ok(false);
                }
                LineMatch::Neither => {}
            }
        }
    }

    async fn mcu_reboot(&mut self) -> Result<()> {
        info!("Rebooting MCU");
        let command = self.settings.commands.mcu_reset.clone();
        self.privileged(&command).await?;
        time::sleep(self.settings.settle_delay).await;
        Ok(())
    }

    async fn soc_reboot(&mut self) -> Result<()> {
        info!("Rebooting SoC");
        let command = self.settings.commands.soc_reboot.clone();
        self.privileged(&command).await
    }

    async fn send_eval_command(&mut self, command: &str) -> Result<()> {
        info!("Sending eval command: {}", command);
        self.privileged(command).await
    }

    fn log(&self) -> &str {
        &self.log
    }

    fn clear_log(&mut self) {
        self.log.clear();
    }
}

//! Device evaluator - owns the serial link to the device under test.
//!
//! This module provides:
//! - Evaluator trait: the sync/reboot/command contract the runner drives
//! - DeviceEvaluator: the line-oriented implementation over any async stream
//! - ConsoleCodec: length-capped console line framing
//! - Marker: case-insensitive success/error marker matching
//! - open_serial: opens the production serial port

pub mod codec;
pub mod device;
pub mod marker;
pub mod serial;

pub use codec::{ConsoleCodec, ConsoleLine};
pub use device::{DeviceEvaluator, DeviceSettings, ShellCommands};
pub use marker::Marker;
pub use serial::open_serial;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Contract between the iteration engine and the device under test.
///
/// Implementations hold an append-only log buffer for the current
/// iteration; `clear_log` must run before the first `sync` of an iteration.
#[async_trait]
pub trait Evaluator: Send {
    /// Wait for the success marker.
    ///
    /// Returns `true` as soon as a line contains the success marker, `false`
    /// as soon as a line contains the error marker or when `timeout` elapses.
    async fn sync(&mut self, timeout: Duration) -> Result<bool>;

    /// Reset the MCU through the remote shell and wait for it to settle
    async fn mcu_reboot(&mut self) -> Result<()>;

    /// Reboot the SoC through the remote shell
    async fn soc_reboot(&mut self) -> Result<()>;

    /// Send a one-shot diagnostic command line
    async fn send_eval_command(&mut self, command: &str) -> Result<()>;

    /// Transcript accumulated since the last `clear_log`
    fn log(&self) -> &str;

    fn clear_log(&mut self);
}

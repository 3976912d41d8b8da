//! hilstress - hardware-in-the-loop stress testing for serial-attached devices
//!
//! hilstress repeatedly reboots an MCU/SoC pair, watches the serial console
//! for a sync marker, and escalates recovery (SoC reboot, MCU+SoC reboot,
//! power cycle) as failures accumulate, while capture plugins record
//! evidence around every iteration.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod id;
pub mod logging;
pub mod plugin;
pub mod power;
pub mod runner;

pub use error::{Result, StressError};

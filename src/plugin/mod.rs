//! Capture plugins - auxiliary tooling sequenced around every iteration.
//!
//! This module provides:
//! - CapturePlugin trait and PluginError
//! - PluginGroup for ordered fan-out with restart-on-device-error
//! - TraceCapturePlugin backed by a logic-analyzer automation service
//! - NoopPlugin for runs without tooling

pub mod automation;
pub mod group;
pub mod noop;
pub mod trace;
pub mod traits;

pub use automation::{AutomationClient, AutomationError, HttpAutomationClient};
pub use group::PluginGroup;
pub use noop::NoopPlugin;
pub use trace::{TraceCapturePlugin, TraceSettings};
pub use traits::{CapturePlugin, PluginError, PluginResult};

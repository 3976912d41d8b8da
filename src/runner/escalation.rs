//! Escalation policy - maps the failure streak to a recovery action.

use std::fmt;

/// Corrective action taken at the end of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    PowerCycle,
    RebootBoth,
    RebootMcu,
    RebootSoc,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecoveryAction::PowerCycle => "power cycle",
            RecoveryAction::RebootBoth => "reboot MCU and SoC",
            RecoveryAction::RebootMcu => "reboot MCU",
            RecoveryAction::RebootSoc => "reboot SoC",
        };
        f.write_str(label)
    }
}

/// Failure-streak thresholds. A threshold is crossed once the streak is
/// strictly greater than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub hard_reboot_after: u32,
    pub power_cycle_after: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            hard_reboot_after: 3,
            power_cycle_after: 10,
        }
    }
}

impl EscalationPolicy {
    /// Pick the action for the current streak, in strict priority order
    pub fn select(&self, fail_streak: u32, has_power: bool, stress_mcu: bool) -> RecoveryAction {
        if fail_streak > self.power_cycle_after && has_power {
            RecoveryAction::PowerCycle
        } else if fail_streak > self.hard_reboot_after {
            RecoveryAction::RebootBoth
        } else if stress_mcu {
            RecoveryAction::RebootMcu
        } else {
            RecoveryAction::RebootSoc
        }
    }
}

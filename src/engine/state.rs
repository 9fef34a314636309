use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Last observed truth about the machine, plus whether auto-switching is on.
/// Only the engine task mutates it; everyone else sees published copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkState {
    pub wired_connected: bool,
    pub wireless_powered: bool,
    pub auto_switch_enabled: bool,
}

impl NetworkState {
    /// Icon hint for a status indicator
    pub fn icon(&self) -> &'static str {
        match (self.auto_switch_enabled, self.wired_connected) {
            (false, _) => "paused",
            (true, true) => "cable",
            (true, false) => "antenna",
        }
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.auto_switch_enabled {
            return write!(f, "Auto switch disabled");
        }
        write!(
            f,
            "Ethernet: {} | Wi-Fi: {}",
            if self.wired_connected {
                "Connected"
            } else {
                "Disconnected"
            },
            if self.wireless_powered { "On" } else { "Off" }
        )
    }
}

/// Where the state machine currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineMode {
    /// Auto-switch off; observations are ignored
    Disabled,
    /// Observing, nothing scheduled
    Idle,
    /// A debounced switch is scheduled
    Pending,
}

/// A scheduled, debounced reconciliation. Dropping it cancels the timer,
/// so replacing the engine's single slot cancels the previous one.
#[derive(Debug)]
pub struct PendingSwitch {
    pub scheduled_at: Instant,
    pub generation: u64,
    timer: JoinHandle<()>,
}

impl PendingSwitch {
    pub fn new(scheduled_at: Instant, generation: u64, timer: JoinHandle<()>) -> Self {
        Self {
            scheduled_at,
            generation,
            timer,
        }
    }
}

impl Drop for PendingSwitch {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// The switching policy: `Some(target)` when the radio must change, `None` when it is
/// already right (or there is nothing unambiguous to do).
pub fn decide(wired_connected: bool, wireless_powered: bool) -> Option<bool> {
    match (wired_connected, wireless_powered) {
        (true, true) => Some(false),
        (false, false) => Some(true),
        _ => None,
    }
}

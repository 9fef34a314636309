use std::fmt;
use std::time::Duration;

use crate::error::SwitchResult;
use crate::network::observer::PathView;

/// Where an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    /// Pushed by the OS through one of the path subscriptions
    Path(PathView),
    /// Fixed-interval status poll
    Poll,
    /// Injected directly through the engine handle
    External,
}

impl fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(view) => write!(f, "path:{}", view),
            Self::Poll => write!(f, "poll"),
            Self::External => write!(f, "external"),
        }
    }
}

/// A freshly observed pair of interface facts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub source: ObservationSource,
    pub wired: bool,
    pub wireless: bool,
}

/// Why a probe was requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReason {
    /// The reconcile pass that runs right after enabling
    Enable,
    /// A debounced switch fired
    Fire,
    /// A reconcile skipped while an earlier session's radio command was still running
    Deferred,
}

/// Everything the reconciliation engine consumes, merged into one queue.
/// Completions carry the epoch they were started in so late results can be discarded.
#[derive(Debug)]
pub enum Event {
    Enable,
    Disable,
    Toggle,
    Observation(Observation),
    /// The debounce timer of the given pending switch elapsed
    DebounceElapsed {
        generation: u64,
    },
    Probed {
        epoch: u64,
        reason: ProbeReason,
        wired: bool,
        wireless: bool,
    },
    RadioResult {
        epoch: u64,
        enabled: bool,
        result: SwitchResult<()>,
    },
    SetDebounce(Duration),
    SetShowNotifications(bool),
    /// User-triggered notification that bypasses the `show_notifications` gate
    TestNotification {
        title: String,
        body: String,
    },
    Shutdown,
}

use thiserror::Error;

/// Unified error type for wifi-autoswitch
#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// An OS query failed. Probes map this to `false`.
    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// The privileged radio command failed.
    #[error("Radio control failed: {reason}")]
    ControlFailed { reason: String },

    #[error("Could not resolve {kind} interface: {reason}")]
    IdentifierResolutionFailed { kind: String, reason: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reconciliation engine is not running")]
    EngineStopped,
}

impl SwitchError {
    /// True when the failure looks like a missing privilege rather than a broken command.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::ControlFailed { reason } => looks_like_permission_denied(reason),
            _ => false,
        }
    }
}

pub(crate) fn looks_like_permission_denied(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("not authorized")
        || lowered.contains("permission denied")
        || lowered.contains("operation not permitted")
        || lowered.contains("accessdenied")
}

pub type SwitchResult<T> = Result<T, SwitchError>;

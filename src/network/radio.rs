use std::process::{Command, Output};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SwitchError, SwitchResult};

/// Powers the wireless radio on or off. Implementations block.
pub trait RadioController: Send + Sync + 'static {
    /// Idempotent: requesting the current state is harmless.
    /// Failures are returned, never raised.
    fn set_wireless_power(&self, enabled: bool) -> SwitchResult<()>;
}

/// How the radio is read and switched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioBackend {
    /// NetworkManager's `nmcli radio wifi` (authorized through polkit)
    #[default]
    Nmcli,
    /// util-linux `rfkill`, state read from sysfs
    Rfkill,
}

impl RadioBackend {
    /// The stock command line that switches the radio
    pub fn switch_command(&self, enabled: bool) -> Vec<String> {
        let argv: &[&str] = match (self, enabled) {
            (Self::Nmcli, true) => &["nmcli", "radio", "wifi", "on"],
            (Self::Nmcli, false) => &["nmcli", "radio", "wifi", "off"],
            (Self::Rfkill, true) => &["rfkill", "unblock", "wlan"],
            (Self::Rfkill, false) => &["rfkill", "block", "wlan"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }
}

/// Runs an argv without a shell, capturing output
pub(crate) fn run(argv: &[String]) -> std::io::Result<Output> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
    })?;
    Command::new(program).args(args).output()
}

/// Parse `nmcli radio wifi` output ("enabled" / "disabled")
pub fn parse_nmcli_radio(output: &str) -> Option<bool> {
    match output.trim().to_lowercase().as_str() {
        "enabled" => Some(true),
        "disabled" => Some(false),
        _ => None,
    }
}

/// Reads radio power through `nmcli radio wifi`
pub fn nmcli_wireless_enabled() -> SwitchResult<bool> {
    let argv: Vec<String> = ["nmcli", "radio", "wifi"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let output = run(&argv).map_err(|e| SwitchError::ProbeUnavailable(format!("nmcli: {}", e)))?;
    if !output.status.success() {
        return Err(SwitchError::ProbeUnavailable(format!(
            "nmcli exited with {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_nmcli_radio(&stdout).ok_or_else(|| {
        SwitchError::ProbeUnavailable(format!("unexpected nmcli output: {:?}", stdout.trim()))
    })
}

/// Switches the radio by running a privileged command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRadio {
    on_command: Vec<String>,
    off_command: Vec<String>,
}

impl CommandRadio {
    pub fn new(on_command: Vec<String>, off_command: Vec<String>) -> Self {
        Self {
            on_command,
            off_command,
        }
    }
}

impl RadioController for CommandRadio {
    fn set_wireless_power(&self, enabled: bool) -> SwitchResult<()> {
        let argv = if enabled {
            &self.on_command
        } else {
            &self.off_command
        };
        debug!("Running radio command: {:?}", argv);

        let output = run(argv).map_err(|e| SwitchError::ControlFailed {
            reason: format!("{}: {}", argv.first().map(String::as_str).unwrap_or(""), e),
        })?;

        if output.status.success() {
            info!("Wireless radio switched {}", if enabled { "on" } else { "off" });
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let reason = if stderr.is_empty() {
            format!("command exited with {}", output.status)
        } else {
            stderr.to_string()
        };
        Err(SwitchError::ControlFailed { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn parses_nmcli_output() {
        assert_eq!(parse_nmcli_radio("enabled\n"), Some(true));
        assert_eq!(parse_nmcli_radio("Disabled"), Some(false));
        assert_eq!(parse_nmcli_radio("missing"), None);
    }

    #[test]
    fn backend_commands() {
        assert_eq!(
            RadioBackend::Nmcli.switch_command(false),
            vec!["nmcli", "radio", "wifi", "off"]
        );
        assert_eq!(
            RadioBackend::Rfkill.switch_command(true),
            vec!["rfkill", "unblock", "wlan"]
        );
    }

    #[test]
    fn successful_command_reports_ok() {
        let radio = CommandRadio::new(sh("exit 0"), sh("exit 0"));
        assert!(radio.set_wireless_power(true).is_ok());
    }

    #[test]
    fn failure_carries_stderr_as_reason() {
        let radio = CommandRadio::new(
            sh("exit 0"),
            sh("echo 'Error: Not authorized to enable/disable Wi-Fi.' >&2; exit 4"),
        );
        let err = radio.set_wireless_power(false).unwrap_err();
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("Not authorized"));
    }

    #[test]
    fn missing_binary_is_a_control_failure() {
        let radio = CommandRadio::new(vec!["/nonexistent/radio-tool".into()], Vec::new());
        assert!(matches!(
            radio.set_wireless_power(true),
            Err(SwitchError::ControlFailed { .. })
        ));
        assert!(matches!(
            radio.set_wireless_power(false),
            Err(SwitchError::ControlFailed { .. })
        ));
    }
}

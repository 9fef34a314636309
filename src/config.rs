use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use tracing::info;

use crate::network::radio::{CommandRadio, RadioBackend};
use crate::network::sysfs::Sysfs;
use crate::network::types::{InterfaceId, InterfaceKind};

// ─── Embedded Default ────────────────────────────────────────────────────
/// Baked into the binary at compile time and written out on first run.
const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

// ─── CLI Arguments (override layer) ─────────────────────────────────────
/// Turns Wi-Fi off while Ethernet is plugged in, and back on when it is not
#[derive(Parser, Debug, Clone)]
#[command(name = "wifi-autoswitch", version, about, long_about = None)]
pub struct CliArgs {
    /// Path to a custom config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (overrides config file)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr (overrides config file)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Wired interface name (overrides config file)
    #[arg(long, global = true)]
    pub wired: Option<String>,

    /// Wireless interface name (overrides config file)
    #[arg(long, global = true)]
    pub wireless: Option<String>,

    /// Radio backend (overrides config file)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Print the default config to stdout and exit
    #[arg(long)]
    pub print_default_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the switching daemon (default)
    Run,
    /// Probe the interfaces once and show preferences
    Status {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },
    /// Turn auto switch on
    Enable,
    /// Turn auto switch off
    Disable,
    /// Flip auto switch
    Toggle,
    /// Change preferences
    Set {
        /// Seconds to wait for the network to settle (0-60)
        #[arg(long)]
        delay: Option<f64>,
        #[arg(long, value_enum)]
        notifications: Option<Toggle>,
        #[arg(long, value_enum)]
        launch_at_login: Option<Toggle>,
    },
    /// Restore default preferences, keeping auto switch as it is
    Reset,
    /// Send a notification to check that the desktop shows them
    TestNotification,
    /// Print the default config to stdout
    PrintDefaultConfig,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(value: Toggle) -> Self {
        value == Toggle::On
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Nmcli,
    Rfkill,
}

impl From<BackendArg> for RadioBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Nmcli => RadioBackend::Nmcli,
            BackendArg::Rfkill => RadioBackend::Rfkill,
        }
    }
}

// ─── TOML Structs ───────────────────────────────────────────────────────

/// Root configuration, parsed from TOML, then overridden by CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub interfaces: InterfacesConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Empty string = stderr
    pub log_file: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InterfacesConfig {
    /// Empty string = auto-detect
    pub wired: String,
    pub wireless: String,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Listen for NetworkManager signals in addition to polling
    #[serde(default = "default_true")]
    pub path_events: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub backend: RadioBackend,
    pub on_command: Option<Vec<String>>,
    pub off_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

// ─── Defaults ───────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

impl Default for InterfacesConfig {
    fn default() -> Self {
        Self {
            wired: String::new(),
            wireless: String::new(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            path_events: true,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
        }
    }
}

// ─── Serde Default Helpers ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}
fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys")
}
fn default_poll_interval() -> u64 {
    5
}
fn default_app_name() -> String {
    "wifi-autoswitch".into()
}

// ─── Path Resolution ────────────────────────────────────────────────────

impl Config {
    /// Standard config file path: ~/.config/wifi-autoswitch/config.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wifi-autoswitch")
            .join("config.toml")
    }

    /// Configured interface name, `None` when auto-detecting
    pub fn interface(&self, kind: InterfaceKind) -> Option<InterfaceId> {
        let name = match kind {
            InterfaceKind::Wired => &self.interfaces.wired,
            InterfaceKind::Wireless => &self.interfaces.wireless,
        };
        InterfaceId::new(name.trim())
    }

    pub fn sysfs(&self) -> Sysfs {
        Sysfs::new(&self.interfaces.sysfs_root)
    }

    /// Never zero; a zero interval would spin
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_secs.max(1))
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        let path = self.general.log_file.trim();
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }

    /// Backend command lines with any configured overrides applied
    pub fn radio_controller(&self) -> CommandRadio {
        let backend = self.radio.backend;
        let on = self
            .radio
            .on_command
            .clone()
            .filter(|argv| !argv.is_empty())
            .unwrap_or_else(|| backend.switch_command(true));
        let off = self
            .radio
            .off_command
            .clone()
            .filter(|argv| !argv.is_empty())
            .unwrap_or_else(|| backend.switch_command(false));
        CommandRadio::new(on, off)
    }
}

// ─── Bootloader ─────────────────────────────────────────────────────────

/// The single entry point for configuration. Called exactly once at startup.
///
/// 1. Resolve config file path (CLI override or default)
/// 2. If config file doesn't exist, create directory tree + write defaults
/// 3. Parse TOML from disk into Config
/// 4. Apply CLI overrides on top
pub fn load(cli: &CliArgs) -> Result<Config> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&config_path, DEFAULT_CONFIG_TOML).wrap_err_with(|| {
            format!(
                "Failed to write default config to {}",
                config_path.display()
            )
        })?;
        info!("Created default config at {}", config_path.display());
    }

    let toml_str = std::fs::read_to_string(&config_path)
        .wrap_err_with(|| format!("Failed to read config from {}", config_path.display()))?;

    let mut config: Config = toml::from_str(&toml_str).wrap_err_with(|| {
        format!(
            "Failed to parse config at {}.\n\
             Delete the file to regenerate defaults, or run:\n  \
             wifi-autoswitch print-default-config > {:?}",
            config_path.display(),
            config_path
        )
    })?;

    // ── CLI overrides ───────────────────────────────────────────────
    if let Some(ref level) = cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(ref path) = cli.log_file {
        config.general.log_file = path.display().to_string();
    }
    if let Some(ref iface) = cli.wired {
        config.interfaces.wired = iface.clone();
    }
    if let Some(ref iface) = cli.wireless {
        config.interfaces.wireless = iface.clone();
    }
    if let Some(backend) = cli.backend {
        config.radio.backend = backend.into();
    }

    Ok(config)
}

/// Returns the embedded default config TOML string.
pub fn default_config_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}

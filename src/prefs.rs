use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const MAX_DELAY_SECS: f64 = 60.0;

/// User preferences, persisted as a small TOML key-value file and written on every change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub auto_switch_enabled: bool,
    pub launch_at_login: bool,
    pub show_notifications: bool,
    /// Debounce before acting on a change, in seconds
    pub auto_switch_delay: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_switch_enabled: false,
            launch_at_login: false,
            show_notifications: true,
            auto_switch_delay: 1.0,
        }
    }
}

impl Preferences {
    /// The delay as a duration, clamped to 0–60 s; garbage falls back to the default
    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f64(normalize_delay(self.auto_switch_delay))
    }

    pub fn set_delay(&mut self, secs: f64) {
        self.auto_switch_delay = normalize_delay(secs);
    }
}

fn normalize_delay(secs: f64) -> f64 {
    if secs.is_finite() {
        secs.clamp(0.0, MAX_DELAY_SECS)
    } else {
        Preferences::default().auto_switch_delay
    }
}

/// Loads and saves [`Preferences`] at a fixed path
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Standard location: ~/.config/wifi-autoswitch/preferences.toml
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wifi-autoswitch")
            .join("preferences.toml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means defaults
    pub fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            debug!("No preferences at {}, using defaults", self.path.display());
            return Ok(Preferences::default());
        }
        let text = std::fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Failed to read preferences from {}", self.path.display()))?;
        toml::from_str(&text)
            .wrap_err_with(|| format!("Failed to parse preferences at {}", self.path.display()))
    }

    /// Like [`load`](Self::load), but an unreadable file yields defaults
    pub fn load_or_default(&self) -> Preferences {
        self.load().unwrap_or_else(|e| {
            warn!("{:#}; using default preferences", e);
            Preferences::default()
        })
    }

    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create preferences directory: {}", parent.display())
            })?;
        }
        let text = toml::to_string_pretty(prefs).wrap_err("Failed to serialize preferences")?;
        std::fs::write(&self.path, text)
            .wrap_err_with(|| format!("Failed to write preferences to {}", self.path.display()))?;
        debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }

    /// Load, apply `change`, save, and return the result
    pub fn update(&self, change: impl FnOnce(&mut Preferences)) -> Result<Preferences> {
        let mut prefs = self.load()?;
        change(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }

    /// Restore defaults for everything except the auto-switch flag itself
    pub fn reset_to_defaults(&self) -> Result<Preferences> {
        let prefs = self.update(|prefs| {
            *prefs = Preferences {
                auto_switch_enabled: prefs.auto_switch_enabled,
                ..Preferences::default()
            };
        })?;
        info!("Preferences reset to defaults");
        Ok(prefs)
    }
}

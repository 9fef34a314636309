mod auth;
mod config;
mod engine;
mod error;
mod event;
mod network;
mod notify;
mod prefs;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::Serialize;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{CliArgs, Command, Config};
use crate::engine::{decide, Collaborators, Engine, EngineHandle, EngineSettings, NetworkState};
use crate::network::observer::{NmPathSource, PathSource};
use crate::network::probe::{InterfaceProbe, SystemProbe};
use crate::network::{InterfaceId, InterfaceKind, NetworkManager};
use crate::notify::{test_message, DesktopNotifier, LogNotifier, Notifier};
use crate::prefs::{Preferences, PreferencesStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print!("{}", config::default_config_toml());
        return Ok(());
    }

    color_eyre::install()?;

    let config = config::load(&cli)?;
    let _log_guard = init_logging(&config)?;
    let store = PreferencesStore::new(PreferencesStore::default_path());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(config, store).await,
        Command::Status { json } => print_status(&config, &store, json).await,
        Command::Enable => set_auto_switch(&store, |_| true),
        Command::Disable => set_auto_switch(&store, |_| false),
        Command::Toggle => set_auto_switch(&store, |enabled| !enabled),
        Command::Set {
            delay,
            notifications,
            launch_at_login,
        } => {
            let prefs = store.update(|prefs| {
                if let Some(delay) = delay {
                    prefs.set_delay(delay);
                }
                if let Some(show) = notifications {
                    prefs.show_notifications = show.into();
                }
                if let Some(launch) = launch_at_login {
                    prefs.launch_at_login = launch.into();
                }
            })?;
            print_preferences(&prefs);
            println!("Send SIGHUP to a running daemon to apply.");
            Ok(())
        }
        Command::Reset => {
            let prefs = store.reset_to_defaults()?;
            print_preferences(&prefs);
            Ok(())
        }
        Command::TestNotification => {
            let app_name = &config.notifications.app_name;
            let (title, body) = test_message(app_name);
            let notifier = DesktopNotifier::new(app_name)
                .await
                .wrap_err("No desktop notification service on the session bus")?;
            let id = notifier
                .send(&title, &body)
                .await
                .wrap_err("Failed to send test notification")?;
            println!("Sent notification {}", id);
            Ok(())
        }
        Command::PrintDefaultConfig => {
            print!("{}", config::default_config_toml());
            Ok(())
        }
    }
}

/// Initialize tracing to stderr, or to a file when one is configured
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = config.log_file() else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create log directory: {}", dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn build_probe(config: &Config) -> SystemProbe {
    SystemProbe::new(
        config.sysfs(),
        config.radio.backend,
        config.interface(InterfaceKind::Wired),
        config.interface(InterfaceKind::Wireless),
    )
}

// ── Daemon ────────────────────────────────────────────────────────────

async fn run_daemon(config: Config, store: PreferencesStore) -> Result<()> {
    info!("wifi-autoswitch starting");
    let permission = auth::check_permissions();
    debug!("Permission level: {}", permission.label());

    let prefs = store.load_or_default();
    let probe = Arc::new(build_probe(&config));
    info!(
        "Watching wired {} and wireless {} ({:?} backend)",
        probe.wired_interface(),
        probe.wireless_interface(),
        config.radio.backend
    );

    let app_name = config.notifications.app_name.clone();
    let notifier: Arc<dyn Notifier> = match DesktopNotifier::new(&app_name).await {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            warn!("No desktop notifications ({}), logging them instead", e);
            Arc::new(LogNotifier)
        }
    };

    let path_source = if config.monitor.path_events {
        connect_path_source(probe.clone()).await
    } else {
        info!("Path events disabled, relying on the status poll");
        None
    };

    let initial = {
        let probe = probe.clone();
        let (wired, wireless) = tokio::task::spawn_blocking(move || probe.probe()).await?;
        NetworkState {
            wired_connected: wired,
            wireless_powered: wireless,
            auto_switch_enabled: prefs.auto_switch_enabled,
        }
    };

    let settings = EngineSettings {
        debounce: prefs.debounce(),
        poll_interval: config.poll_interval(),
        show_notifications: prefs.show_notifications,
        app_name,
    };
    let (engine, handle) = Engine::new(
        initial,
        settings,
        Collaborators {
            probe,
            radio: Arc::new(config.radio_controller()),
            notifier,
            path_source,
        },
    );
    let engine_task = engine.spawn();

    tokio::spawn(follow_state(handle.clone(), store.clone(), prefs.auto_switch_enabled));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = sigterm.recv() => {
                info!("Terminated");
                break;
            }
            _ = sigusr1.recv() => {
                debug!("SIGUSR1: toggling auto switch");
                handle.toggle()?;
            }
            _ = sigusr2.recv() => {
                let (title, body) = test_message(&config.notifications.app_name);
                handle.send_test_notification(&title, &body)?;
            }
            _ = sighup.recv() => {
                if let Err(e) = reload_preferences(&handle, &store) {
                    warn!("Failed to reload preferences: {:#}", e);
                }
            }
        }
    }

    handle.shutdown()?;
    engine_task.await?;
    info!("wifi-autoswitch exiting");
    Ok(())
}

/// `None` when NetworkManager is unreachable; the status poll still covers changes
async fn connect_path_source(probe: Arc<SystemProbe>) -> Option<Arc<dyn PathSource>> {
    let nm = match NetworkManager::new().await {
        Ok(nm) => nm,
        Err(e) => {
            warn!("Failed to connect to NetworkManager D-Bus: {}", e);
            return None;
        }
    };

    if !nm.is_running().await {
        warn!("NetworkManager is not running, relying on the status poll");
        return None;
    }

    info!(
        "Connected to NetworkManager v{}",
        nm.version().await.unwrap_or_default()
    );
    Some(Arc::new(NmPathSource::new(nm, probe)))
}

/// Log every published snapshot and persist the auto-switch flag when it changes
async fn follow_state(handle: EngineHandle, store: PreferencesStore, mut persisted: bool) {
    let mut updates = handle.subscribe();
    while updates.changed().await.is_ok() {
        let state = *updates.borrow_and_update();
        info!("[{}] {} ({:?})", state.icon(), state, handle.mode());

        if state.auto_switch_enabled != persisted {
            match store.update(|prefs| prefs.auto_switch_enabled = state.auto_switch_enabled) {
                Ok(_) => persisted = state.auto_switch_enabled,
                Err(e) => warn!("Failed to save preferences: {:#}", e),
            }
        }
    }
}

fn reload_preferences(handle: &EngineHandle, store: &PreferencesStore) -> Result<()> {
    let prefs = store.load()?;
    info!("Reloaded preferences from {}", store.path().display());

    handle.set_debounce(prefs.debounce())?;
    handle.set_show_notifications(prefs.show_notifications)?;
    if prefs.auto_switch_enabled {
        handle.enable()?;
    } else {
        handle.disable()?;
    }
    Ok(())
}

// ── One-shot commands ─────────────────────────────────────────────────

fn set_auto_switch(store: &PreferencesStore, change: impl FnOnce(bool) -> bool) -> Result<()> {
    let prefs = store.update(|prefs| prefs.auto_switch_enabled = change(prefs.auto_switch_enabled))?;
    println!(
        "Auto switch {}. Send SIGHUP (or SIGUSR1 to toggle) to a running daemon to apply.",
        if prefs.auto_switch_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}

fn print_preferences(prefs: &Preferences) {
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    println!("Auto switch:      {}", on_off(prefs.auto_switch_enabled));
    println!("Delay:            {:.1} s", prefs.debounce().as_secs_f64());
    println!("Notifications:    {}", on_off(prefs.show_notifications));
    println!("Launch at login:  {}", on_off(prefs.launch_at_login));
}

#[derive(Debug, Serialize)]
struct StatusReport {
    timestamp: DateTime<Local>,
    wired_interface: InterfaceId,
    wireless_interface: InterfaceId,
    state: NetworkState,
    /// What the engine would do with these facts, if anything
    pending_action: Option<String>,
    preferences: Preferences,
}

async fn print_status(config: &Config, store: &PreferencesStore, json: bool) -> Result<()> {
    let prefs = store.load()?;
    let probe = build_probe(config);
    let report = tokio::task::spawn_blocking(move || {
        let (wired, wireless) = probe.probe();
        let state = NetworkState {
            wired_connected: wired,
            wireless_powered: wireless,
            auto_switch_enabled: prefs.auto_switch_enabled,
        };
        StatusReport {
            timestamp: Local::now(),
            wired_interface: probe.wired_interface(),
            wireless_interface: probe.wireless_interface(),
            state,
            pending_action: decide(wired, wireless)
                .filter(|_| state.auto_switch_enabled)
                .map(|on| format!("turn Wi-Fi {}", if on { "on" } else { "off" })),
            preferences: prefs,
        }
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let state = &report.state;
    println!("{}", report.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "Ethernet ({}): {}",
        report.wired_interface,
        if state.wired_connected {
            "Connected"
        } else {
            "Disconnected"
        }
    );
    println!(
        "Wi-Fi ({}): {}",
        report.wireless_interface,
        if state.wireless_powered { "On" } else { "Off" }
    );
    println!("Status: {}", state);
    if let Some(ref action) = report.pending_action {
        println!("Next action: {}", action);
    }
    println!();
    print_preferences(&report.preferences);
    Ok(())
}

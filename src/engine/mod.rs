//! The reconciliation engine: a single task that owns [`NetworkState`], debounces
//! observations from the path observer and status poller, and drives the radio.
//!
//! Everything reaches the engine through one merged queue of [`Event`]s. Blocking
//! probe and radio calls run on the blocking pool and report back as events tagged
//! with the epoch they were started in; a result from an earlier epoch (auto-switch
//! was disabled meanwhile) is dropped.

pub mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::{SwitchError, SwitchResult};
use crate::event::{Event, Observation, ObservationSource, ProbeReason};
use crate::network::observer::{PathObserver, PathSource};
use crate::network::poller::StatusPoller;
use crate::network::probe::InterfaceProbe;
use crate::network::radio::RadioController;
use crate::notify::{toggle_message, Notifier};

pub use state::{decide, EngineMode, NetworkState, PendingSwitch};

/// Tunables the engine reads on every decision
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Quiet period before a burst of observations is acted on
    pub debounce: Duration,
    pub poll_interval: Duration,
    pub show_notifications: bool,
    pub app_name: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
            show_notifications: true,
            app_name: "wifi-autoswitch".into(),
        }
    }
}

/// External collaborators, constructed once at startup
pub struct Collaborators {
    pub probe: Arc<dyn InterfaceProbe>,
    pub radio: Arc<dyn RadioController>,
    pub notifier: Arc<dyn Notifier>,
    /// `None` runs on the status poller alone
    pub path_source: Option<Arc<dyn PathSource>>,
}

pub struct Engine {
    state: NetworkState,
    pending: Option<PendingSwitch>,
    /// Bumped on every enable/disable; completions from older epochs are discarded
    epoch: u64,
    generation: u64,
    /// Epoch of the radio command currently running, if any
    radio_in_flight: Option<u64>,
    /// A reconcile was skipped behind an earlier session's radio command
    reconcile_deferred: bool,
    settings: EngineSettings,
    probe: Arc<dyn InterfaceProbe>,
    radio: Arc<dyn RadioController>,
    notifier: Arc<dyn Notifier>,
    observer: Option<PathObserver>,
    poller: StatusPoller,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    state_tx: watch::Sender<NetworkState>,
    mode_tx: watch::Sender<EngineMode>,
}

impl Engine {
    /// Build the engine and a handle to it. `initial` carries the persisted
    /// auto-switch flag and freshly probed connectivity; when the flag is set the
    /// engine enables itself as soon as it runs.
    pub fn new(
        initial: NetworkState,
        settings: EngineSettings,
        collaborators: Collaborators,
    ) -> (Self, EngineHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(NetworkState {
            auto_switch_enabled: false,
            ..initial
        });
        let (mode_tx, mode_rx) = watch::channel(EngineMode::Disabled);

        let observer = collaborators.path_source.map(|source| {
            PathObserver::new(source, collaborators.probe.clone(), events_tx.clone())
        });
        let poller = StatusPoller::new(collaborators.probe.clone(), events_tx.clone());

        let handle = EngineHandle {
            events: events_tx.clone(),
            state: state_rx,
            mode: mode_rx,
        };

        let engine = Self {
            state: initial,
            pending: None,
            epoch: 0,
            generation: 0,
            radio_in_flight: None,
            reconcile_deferred: false,
            settings,
            probe: collaborators.probe,
            radio: collaborators.radio,
            notifier: collaborators.notifier,
            observer,
            poller,
            events_tx,
            events_rx,
            state_tx,
            mode_tx,
        };

        (engine, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consume events until shutdown
    pub async fn run(mut self) {
        info!("Reconciliation engine started");

        // Start Disabled and go through the normal transition
        if std::mem::take(&mut self.state.auto_switch_enabled) {
            self.enable();
        }

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle(event) {
                break;
            }
        }

        self.stop_activity();
        info!("Reconciliation engine stopped");
    }

    pub fn mode(&self) -> EngineMode {
        if !self.state.auto_switch_enabled {
            EngineMode::Disabled
        } else if self.pending.is_some() {
            EngineMode::Pending
        } else {
            EngineMode::Idle
        }
    }

    /// Returns false on shutdown
    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Enable => self.enable(),
            Event::Disable => self.disable(),
            Event::Toggle => {
                if self.state.auto_switch_enabled {
                    self.disable();
                } else {
                    self.enable();
                }
            }
            Event::Observation(observation) => self.on_observation(observation),
            Event::DebounceElapsed { generation } => self.on_debounce_elapsed(generation),
            Event::Probed {
                epoch,
                reason,
                wired,
                wireless,
            } => self.on_probed(epoch, reason, wired, wireless),
            Event::RadioResult {
                epoch,
                enabled,
                result,
            } => self.on_radio_result(epoch, enabled, result),
            Event::SetDebounce(debounce) => {
                debug!("Debounce set to {:?}", debounce);
                self.settings.debounce = debounce;
            }
            Event::SetShowNotifications(show) => {
                debug!("Notifications {}", if show { "on" } else { "off" });
                self.settings.show_notifications = show;
            }
            Event::TestNotification { title, body } => self.notifier.notify(&title, &body),
            Event::Shutdown => return false,
        }
        self.publish();
        true
    }

    // ── Transitions ───────────────────────────────────────────────────

    fn enable(&mut self) {
        if self.state.auto_switch_enabled {
            debug!("Auto switch already enabled");
            return;
        }

        info!("Auto switch enabled");
        self.epoch += 1;
        self.state.auto_switch_enabled = true;
        if let Some(observer) = self.observer.as_mut() {
            observer.start();
        }
        self.poller.start(self.settings.poll_interval);
        self.publish();

        self.spawn_probe(ProbeReason::Enable);
    }

    fn disable(&mut self) {
        if self.state.auto_switch_enabled {
            info!("Auto switch disabled");
        }

        self.epoch += 1;
        self.state.auto_switch_enabled = false;
        self.reconcile_deferred = false;
        self.stop_activity();
        self.publish();
    }

    /// Cancel the pending switch and every signal source
    fn stop_activity(&mut self) {
        if self.pending.take().is_some() {
            debug!("Cancelled pending switch");
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.stop();
        }
        self.poller.stop();
    }

    fn on_observation(&mut self, observation: Observation) {
        if !self.state.auto_switch_enabled {
            trace!("Ignoring {} observation while disabled", observation.source);
            return;
        }

        if observation.wired == self.state.wired_connected
            && observation.wireless == self.state.wireless_powered
        {
            trace!("{} observation unchanged", observation.source);
            return;
        }

        debug!(
            "Observation from {}: wired={} wireless={}",
            observation.source, observation.wired, observation.wireless
        );
        self.state.wired_connected = observation.wired;
        self.state.wireless_powered = observation.wireless;
        self.schedule_switch();
    }

    /// Replace the pending switch with one firing after the debounce interval
    fn schedule_switch(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let delay = self.settings.debounce;
        let events = self.events_tx.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::DebounceElapsed { generation });
        });

        // Dropping the previous switch aborts its timer
        let previous = self
            .pending
            .replace(PendingSwitch::new(Instant::now() + delay, generation, timer));
        if let Some(previous) = previous {
            trace!("Pending switch {} superseded", previous.generation);
        }
    }

    fn on_debounce_elapsed(&mut self, generation: u64) {
        match self.pending.as_ref() {
            Some(pending) if pending.generation == generation => {
                trace!(
                    "Pending switch {} fired {:?} after schedule",
                    generation,
                    Instant::now().saturating_duration_since(pending.scheduled_at)
                );
            }
            _ => {
                trace!("Stale debounce timer {}", generation);
                return;
            }
        }

        self.pending = None;
        // The queued observation is already a debounce interval old; act on fresh facts
        self.spawn_probe(ProbeReason::Fire);
    }

    fn on_probed(&mut self, epoch: u64, reason: ProbeReason, wired: bool, wireless: bool) {
        if epoch != self.epoch || !self.state.auto_switch_enabled {
            debug!("Discarding {:?} probe from an earlier session", reason);
            return;
        }

        self.state.wired_connected = wired;
        self.state.wireless_powered = wireless;
        self.reconcile(reason);
    }

    fn reconcile(&mut self, reason: ProbeReason) {
        let Some(target) = decide(self.state.wired_connected, self.state.wireless_powered) else {
            debug!(
                "Nothing to switch ({:?}): wired={} wireless={}",
                reason, self.state.wired_connected, self.state.wireless_powered
            );
            return;
        };

        if let Some(in_flight) = self.radio_in_flight {
            if in_flight == self.epoch {
                debug!("Radio command already in flight, not issuing another");
            } else {
                debug!("Earlier session's radio command still running, deferring");
                self.reconcile_deferred = true;
            }
            return;
        }

        info!(
            "Ethernet {}, turning Wi-Fi {}",
            if self.state.wired_connected {
                "connected"
            } else {
                "disconnected"
            },
            if target { "on" } else { "off" }
        );
        self.radio_in_flight = Some(self.epoch);

        let radio = self.radio.clone();
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        tokio::task::spawn_blocking(move || {
            let result = radio.set_wireless_power(target);
            let _ = events.send(Event::RadioResult {
                epoch,
                enabled: target,
                result,
            });
        });
    }

    fn on_radio_result(&mut self, epoch: u64, enabled: bool, result: SwitchResult<()>) {
        self.radio_in_flight = None;

        if epoch != self.epoch || !self.state.auto_switch_enabled {
            debug!("Discarding radio result from an earlier session");
            if std::mem::take(&mut self.reconcile_deferred) && self.state.auto_switch_enabled {
                self.spawn_probe(ProbeReason::Deferred);
            }
            return;
        }

        // State is left alone either way: the next observation reports what really happened
        match &result {
            Ok(()) => info!("Wi-Fi turned {}", if enabled { "on" } else { "off" }),
            Err(e) => {
                warn!(
                    "Failed to turn Wi-Fi {}: {}",
                    if enabled { "on" } else { "off" },
                    e
                );
                if e.is_permission_denied() {
                    warn!("Tip: run as root or add a polkit rule for NetworkManager radio control");
                }
            }
        }

        if self.settings.show_notifications {
            let (title, body) = toggle_message(&self.settings.app_name, enabled, &result);
            self.notifier.notify(&title, &body);
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────

    fn spawn_probe(&self, reason: ProbeReason) {
        let probe = self.probe.clone();
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        tokio::task::spawn_blocking(move || {
            let (wired, wireless) = probe.probe();
            let _ = events.send(Event::Probed {
                epoch,
                reason,
                wired,
                wireless,
            });
        });
    }

    /// Push the current snapshot to subscribers if it changed
    fn publish(&self) {
        let state = self.state;
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        let mode = self.mode();
        self.mode_tx.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        });
    }
}

/// Cloneable front door to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<NetworkState>,
    mode: watch::Receiver<EngineMode>,
}

impl EngineHandle {
    fn send(&self, event: Event) -> SwitchResult<()> {
        self.events
            .send(event)
            .map_err(|_| SwitchError::EngineStopped)
    }

    pub fn enable(&self) -> SwitchResult<()> {
        self.send(Event::Enable)
    }

    pub fn disable(&self) -> SwitchResult<()> {
        self.send(Event::Disable)
    }

    pub fn toggle(&self) -> SwitchResult<()> {
        self.send(Event::Toggle)
    }

    /// Feed an observation through the same path as OS events and polls
    pub fn observe(&self, wired: bool, wireless: bool) -> SwitchResult<()> {
        self.send(Event::Observation(Observation {
            source: ObservationSource::External,
            wired,
            wireless,
        }))
    }

    pub fn set_debounce(&self, debounce: Duration) -> SwitchResult<()> {
        self.send(Event::SetDebounce(debounce))
    }

    pub fn set_show_notifications(&self, show: bool) -> SwitchResult<()> {
        self.send(Event::SetShowNotifications(show))
    }

    /// Sends regardless of the notification preference
    pub fn send_test_notification(&self, title: &str, body: &str) -> SwitchResult<()> {
        self.send(Event::TestNotification {
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    pub fn shutdown(&self) -> SwitchResult<()> {
        self.send(Event::Shutdown)
    }

    /// Latest published state
    pub fn snapshot(&self) -> NetworkState {
        *self.state.borrow()
    }

    pub fn mode(&self) -> EngineMode {
        *self.mode.borrow()
    }

    /// Receives a new snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.clone()
    }
}

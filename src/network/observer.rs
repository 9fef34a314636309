use std::fmt;
use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::SwitchResult;
use crate::event::{Event, Observation, ObservationSource};
use crate::network::dbus_proxies::*;
use crate::network::nm::NetworkManager;
use crate::network::probe::{InterfaceProbe, SystemProbe};
use crate::network::types::{DeviceType, InterfaceId};

/// The three logical views the OS reports path changes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathView {
    /// Overall connectivity
    Combined,
    /// Wired interface only
    Wired,
    /// Wireless interface only
    Wireless,
}

impl PathView {
    pub const ALL: [PathView; 3] = [Self::Combined, Self::Wired, Self::Wireless];
}

impl fmt::Display for PathView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Combined => write!(f, "combined"),
            Self::Wired => write!(f, "wired"),
            Self::Wireless => write!(f, "wireless"),
        }
    }
}

/// Supplies push notifications for one path view.
pub trait PathSource: Send + Sync + 'static {
    /// Spawn a subscription that sends `view` into `signals` every time the OS reports a change.
    /// The subscription ends when the returned task is aborted or `signals` closes.
    fn watch(&self, view: PathView, signals: mpsc::UnboundedSender<PathView>) -> JoinHandle<()>;
}

/// Turns raw path signals from all three views into observations on the engine queue.
pub struct PathObserver {
    source: Arc<dyn PathSource>,
    probe: Arc<dyn InterfaceProbe>,
    events: mpsc::UnboundedSender<Event>,
    tasks: Vec<JoinHandle<()>>,
}

impl PathObserver {
    pub fn new(
        source: Arc<dyn PathSource>,
        probe: Arc<dyn InterfaceProbe>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            source,
            probe,
            events,
            tasks: Vec::new(),
        }
    }

    /// Start all three subscriptions, replacing any that are running
    pub fn start(&mut self) {
        self.stop();
        debug!("Starting path observer");

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        for view in PathView::ALL {
            self.tasks.push(self.source.watch(view, signal_tx.clone()));
        }
        self.tasks.push(tokio::spawn(normalize(
            signal_rx,
            self.probe.clone(),
            self.events.clone(),
        )));
    }

    /// Cancel all subscriptions. Safe to call when not started.
    pub fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        debug!("Stopping path observer");
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }
}

impl Drop for PathObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Re-probes on every signal (off the async workers) so each observation
/// carries the current pair, then forwards it. Signals are handled in arrival order.
async fn normalize(
    mut signals: mpsc::UnboundedReceiver<PathView>,
    probe: Arc<dyn InterfaceProbe>,
    events: mpsc::UnboundedSender<Event>,
) {
    while let Some(view) = signals.recv().await {
        let probe = probe.clone();
        let (wired, wireless) = match tokio::task::spawn_blocking(move || probe.probe()).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Probe task failed: {}", e);
                continue;
            }
        };

        let observation = Observation {
            source: ObservationSource::Path(view),
            wired,
            wireless,
        };
        if events.send(Event::Observation(observation)).is_err() {
            break;
        }
    }
}

// ── NetworkManager-backed source ──────────────────────────────────────

/// Path events from NetworkManager property changes on the system bus
pub struct NmPathSource {
    nm: NetworkManager,
    probe: Arc<SystemProbe>,
}

impl NmPathSource {
    pub fn new(nm: NetworkManager, probe: Arc<SystemProbe>) -> Self {
        Self { nm, probe }
    }
}

impl PathSource for NmPathSource {
    fn watch(&self, view: PathView, signals: mpsc::UnboundedSender<PathView>) -> JoinHandle<()> {
        let nm = self.nm.clone();
        let probe = self.probe.clone();

        tokio::spawn(async move {
            let result = match view {
                PathView::Combined => watch_combined(&nm).await,
                PathView::Wired | PathView::Wireless => {
                    let iface = tokio::task::spawn_blocking(move || match view {
                        PathView::Wired => probe.wired_interface(),
                        _ => probe.wireless_interface(),
                    })
                    .await;
                    match iface {
                        Ok(iface) if view == PathView::Wired => watch_wired(&nm, iface).await,
                        Ok(iface) => watch_wireless(&nm, iface).await,
                        Err(e) => {
                            warn!("Interface resolution task failed: {}", e);
                            return;
                        }
                    }
                }
            };

            match result {
                Ok(streams) => forward(stream::select_all(streams), view, &signals).await,
                Err(e) => warn!("{} path subscription unavailable: {}", view, e),
            }
        })
    }
}

type SignalStream = BoxStream<'static, ()>;

async fn forward(
    mut changes: stream::SelectAll<SignalStream>,
    view: PathView,
    signals: &mpsc::UnboundedSender<PathView>,
) {
    while changes.next().await.is_some() {
        trace!("{} path changed", view);
        if signals.send(view).is_err() {
            return;
        }
    }
    debug!("{} path subscription closed", view);
}

async fn watch_combined(nm: &NetworkManager) -> SwitchResult<Vec<SignalStream>> {
    let proxy = NetworkManagerProxy::new(nm.connection()).await?;
    Ok(vec![
        proxy.receive_state_changed().await.map(|_| ()).boxed(),
        proxy
            .receive_primary_connection_changed()
            .await
            .map(|_| ())
            .boxed(),
    ])
}

async fn watch_wired(nm: &NetworkManager, iface: InterfaceId) -> SwitchResult<Vec<SignalStream>> {
    let device = nm.find_device(&iface).await?;
    if device.device_type != DeviceType::Ethernet {
        warn!("{} is not an Ethernet device ({:?})", iface, device.device_type);
    }
    debug!("Watching {} ({:?})", iface, device.state);

    let state = DeviceProxy::builder(nm.connection())
        .path(device.path.clone())?
        .build()
        .await?;
    let wired = WiredProxy::builder(nm.connection())
        .path(device.path)?
        .build()
        .await?;

    Ok(vec![
        state.receive_state_changed().await.map(|_| ()).boxed(),
        wired.receive_carrier_changed().await.map(|_| ()).boxed(),
    ])
}

async fn watch_wireless(
    nm: &NetworkManager,
    iface: InterfaceId,
) -> SwitchResult<Vec<SignalStream>> {
    let proxy = NetworkManagerProxy::new(nm.connection()).await?;
    let mut streams = vec![
        proxy
            .receive_wireless_enabled_changed()
            .await
            .map(|_| ())
            .boxed(),
        proxy
            .receive_wireless_hardware_enabled_changed()
            .await
            .map(|_| ())
            .boxed(),
    ];

    // The radio switch alone is enough; the device state only adds earlier signals
    match nm.find_device(&iface).await {
        Ok(device) => {
            let state = DeviceProxy::builder(nm.connection())
                .path(device.path)?
                .build()
                .await?;
            streams.push(state.receive_state_changed().await.map(|_| ()).boxed());
        }
        Err(e) => debug!("No device state for {}: {}", iface, e),
    }

    Ok(streams)
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::event::{Event, Observation, ObservationSource};
use crate::network::probe::InterfaceProbe;

/// Fixed-interval fallback that re-probes in case a push event was missed
pub struct StatusPoller {
    probe: Arc<dyn InterfaceProbe>,
    events: mpsc::UnboundedSender<Event>,
    task: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn new(probe: Arc<dyn InterfaceProbe>, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            probe,
            events,
            task: None,
        }
    }

    /// Begin polling. A running timer is replaced, never doubled.
    /// The first poll happens one interval after start.
    pub fn start(&mut self, interval: Duration) {
        self.stop();
        debug!("Starting status poller every {:?}", interval);

        let probe = self.probe.clone();
        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                let probe = probe.clone();
                let (wired, wireless) =
                    match tokio::task::spawn_blocking(move || probe.probe()).await {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("Status poll failed: {}", e);
                            continue;
                        }
                    };

                let observation = Observation {
                    source: ObservationSource::Poll,
                    wired,
                    wireless,
                };
                if events.send(Event::Observation(observation)).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Stopping status poller");
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

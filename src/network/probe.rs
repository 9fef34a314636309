use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tracing::{debug, info, warn};

use super::radio::{nmcli_wireless_enabled, RadioBackend};
use super::sysfs::Sysfs;
use super::types::{InterfaceId, InterfaceKind};

/// Answers "is the wired link up?" and "is the wireless radio powered?".
/// Both calls block on OS queries and never fail: an unanswerable query reads as `false`.
pub trait InterfaceProbe: Send + Sync + 'static {
    fn probe_wired(&self) -> bool;

    fn probe_wireless(&self) -> bool;

    /// Both answers, wired first
    fn probe(&self) -> (bool, bool) {
        (self.probe_wired(), self.probe_wireless())
    }
}

/// Resolves the interface of one kind, caching the first successful answer
#[derive(Debug)]
pub struct InterfaceResolver {
    kind: InterfaceKind,
    configured: Option<InterfaceId>,
    sysfs: Sysfs,
    cached: OnceLock<InterfaceId>,
    fallback_logged: AtomicBool,
}

impl InterfaceResolver {
    pub fn new(kind: InterfaceKind, configured: Option<InterfaceId>, sysfs: Sysfs) -> Self {
        Self {
            kind,
            configured,
            sysfs,
            cached: OnceLock::new(),
            fallback_logged: AtomicBool::new(false),
        }
    }

    /// The interface to query. Falls back to the kind's default (not cached) when
    /// nothing can be resolved, so a later hot-plugged adapter is still picked up.
    pub fn resolve(&self) -> InterfaceId {
        if let Some(ref id) = self.configured {
            return id.clone();
        }
        if let Some(id) = self.cached.get() {
            return id.clone();
        }

        match self.sysfs.find_first(self.kind) {
            Ok(id) => {
                info!("Resolved {} interface: {}", self.kind, id);
                self.cached.get_or_init(|| id).clone()
            }
            Err(e) => {
                let fallback = self.kind.default_id();
                if !self.fallback_logged.swap(true, Ordering::Relaxed) {
                    warn!("{}; falling back to {}", e, fallback);
                }
                fallback
            }
        }
    }
}

/// Probe backed by sysfs for the wired link and the configured radio backend for Wi-Fi
#[derive(Debug)]
pub struct SystemProbe {
    sysfs: Sysfs,
    backend: RadioBackend,
    wired: InterfaceResolver,
    wireless: InterfaceResolver,
}

impl SystemProbe {
    pub fn new(
        sysfs: Sysfs,
        backend: RadioBackend,
        wired: Option<InterfaceId>,
        wireless: Option<InterfaceId>,
    ) -> Self {
        Self {
            wired: InterfaceResolver::new(InterfaceKind::Wired, wired, sysfs.clone()),
            wireless: InterfaceResolver::new(InterfaceKind::Wireless, wireless, sysfs.clone()),
            sysfs,
            backend,
        }
    }

    pub fn wired_interface(&self) -> InterfaceId {
        self.wired.resolve()
    }

    pub fn wireless_interface(&self) -> InterfaceId {
        self.wireless.resolve()
    }
}

impl InterfaceProbe for SystemProbe {
    fn probe_wired(&self) -> bool {
        let iface = self.wired.resolve();
        self.sysfs.carrier(&iface).unwrap_or_else(|e| {
            debug!("{}", e);
            false
        })
    }

    fn probe_wireless(&self) -> bool {
        let result = match self.backend {
            RadioBackend::Nmcli => nmcli_wireless_enabled(),
            RadioBackend::Rfkill => self.sysfs.radio_unblocked(&self.wireless.resolve()),
        };
        result.unwrap_or_else(|e| {
            debug!("{}", e);
            false
        })
    }
}

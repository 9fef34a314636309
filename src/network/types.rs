use std::fmt;

use serde::{Deserialize, Serialize};

/// Which physical class an interface belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Wired,
    Wireless,
}

impl InterfaceKind {
    /// Identifier used when nothing better can be resolved
    pub fn default_id(&self) -> InterfaceId {
        match self {
            Self::Wired => InterfaceId::new_unchecked("eth0"),
            Self::Wireless => InterfaceId::new_unchecked("wlan0"),
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wired => write!(f, "wired"),
            Self::Wireless => write!(f, "wireless"),
        }
    }
}

/// Opaque, non-empty handle to a kernel network interface (e.g. "enp3s0")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(String);

impl InterfaceId {
    /// Returns `None` for empty or whitespace-only names.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// NetworkManager device types we care about (NMDeviceType)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Ethernet,
    WiFi,
    Other(u32),
}

impl DeviceType {
    pub fn from_nm(val: u32) -> Self {
        match val {
            1 => Self::Ethernet,
            2 => Self::WiFi,
            other => Self::Other(other),
        }
    }
}

/// NetworkManager device state (NMDeviceState), reduced to what matters for link presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unavailable,
    Disconnected,
    Connecting,
    Activated,
    Deactivating,
    Failed,
    Unknown,
}

impl DeviceState {
    pub fn from_nm(val: u32) -> Self {
        match val {
            20 => Self::Unavailable,
            30 => Self::Disconnected,
            40..=90 => Self::Connecting,
            100 => Self::Activated,
            110 => Self::Deactivating,
            120 => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

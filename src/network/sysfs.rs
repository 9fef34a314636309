use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::types::{InterfaceId, InterfaceKind};
use crate::error::{SwitchError, SwitchResult};

/// ARPHRD_ETHER, reported in /sys/class/net/<iface>/type
const ARPHRD_ETHER: u32 = 1;

/// Read-only view of /sys/class/net and /sys/class/rfkill.
/// The root is configurable so tests can point it at a fixture tree.
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new("/sys")
    }
}

impl Sysfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn net_dir(&self) -> PathBuf {
        self.root.join("class").join("net")
    }

    fn iface_dir(&self, iface: &InterfaceId) -> PathBuf {
        self.net_dir().join(iface.as_str())
    }

    /// All interface names under /sys/class/net, sorted
    pub fn list_interfaces(&self) -> SwitchResult<Vec<InterfaceId>> {
        let mut interfaces: Vec<InterfaceId> = fs::read_dir(self.net_dir())?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| InterfaceId::new(&name))
            .collect();
        interfaces.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(interfaces)
    }

    /// Classify an interface, or `None` for loopback, bridges, tunnels and other virtual links
    pub fn classify(&self, iface: &InterfaceId) -> Option<InterfaceKind> {
        let dir = self.iface_dir(iface);
        if dir.join("wireless").exists() || dir.join("phy80211").exists() {
            return Some(InterfaceKind::Wireless);
        }

        // Virtual links (veth, bridge, docker0...) have no backing device
        if !dir.join("device").exists() {
            return None;
        }

        match read_trimmed(&dir.join("type")).ok()?.parse::<u32>() {
            Ok(ARPHRD_ETHER) => Some(InterfaceKind::Wired),
            _ => None,
        }
    }

    /// First interface of the given kind, in name order
    pub fn find_first(&self, kind: InterfaceKind) -> SwitchResult<InterfaceId> {
        let interfaces = self.list_interfaces()?;
        interfaces
            .into_iter()
            .find(|iface| self.classify(iface) == Some(kind))
            .ok_or_else(|| SwitchError::IdentifierResolutionFailed {
                kind: kind.to_string(),
                reason: format!("no {} interface under {}", kind, self.net_dir().display()),
            })
    }

    /// Physical link state of an interface (carrier detect)
    pub fn carrier(&self, iface: &InterfaceId) -> SwitchResult<bool> {
        // The kernel refuses to read `carrier` (EINVAL) while the interface is administratively down
        let value = read_trimmed(&self.iface_dir(iface).join("carrier")).map_err(|e| {
            SwitchError::ProbeUnavailable(format!("carrier of {}: {}", iface, e))
        })?;
        Ok(value == "1")
    }

    /// Radio power of a wireless interface as seen by rfkill.
    /// Powered means neither soft- nor hard-blocked.
    pub fn radio_unblocked(&self, iface: &InterfaceId) -> SwitchResult<bool> {
        let phy_dir = self.iface_dir(iface).join("phy80211");
        let entries = fs::read_dir(&phy_dir).map_err(|e| {
            SwitchError::ProbeUnavailable(format!("{}: {}", phy_dir.display(), e))
        })?;

        let rfkill = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("rfkill"))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                SwitchError::ProbeUnavailable(format!("no rfkill switch for {}", iface))
            })?;

        let soft = read_flag(&rfkill.join("soft"))?;
        let hard = read_flag(&rfkill.join("hard"))?;
        Ok(!soft && !hard)
    }
}

fn read_trimmed(path: &Path) -> io::Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

fn read_flag(path: &Path) -> SwitchResult<bool> {
    let value = read_trimmed(path)
        .map_err(|e| SwitchError::ProbeUnavailable(format!("{}: {}", path.display(), e)))?;
    Ok(value != "0")
}

#[cfg(test)]
pub(crate) mod fixture {
    use std::fs;
    use std::path::Path;

    /// Builds a fake /sys tree with one wired, one wireless and one virtual interface
    pub fn build(root: &Path, wired_carrier: bool, radio_soft_blocked: bool) {
        let net = root.join("class/net");

        let lo = net.join("lo");
        fs::create_dir_all(&lo).unwrap();
        fs::write(lo.join("type"), "772\n").unwrap();

        let eth = net.join("enp3s0");
        fs::create_dir_all(eth.join("device")).unwrap();
        fs::write(eth.join("type"), "1\n").unwrap();
        fs::write(eth.join("carrier"), if wired_carrier { "1\n" } else { "0\n" }).unwrap();

        let veth = net.join("docker0");
        fs::create_dir_all(&veth).unwrap();
        fs::write(veth.join("type"), "1\n").unwrap();
        fs::write(veth.join("carrier"), "1\n").unwrap();

        let wlan = net.join("wlp2s0");
        fs::create_dir_all(wlan.join("device")).unwrap();
        fs::create_dir_all(wlan.join("wireless")).unwrap();
        let rfkill = wlan.join("phy80211/rfkill1");
        fs::create_dir_all(&rfkill).unwrap();
        fs::write(wlan.join("type"), "1\n").unwrap();
        fs::write(rfkill.join("soft"), if radio_soft_blocked { "1\n" } else { "0\n" }).unwrap();
        fs::write(rfkill.join("hard"), "0\n").unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(name: &str) -> InterfaceId {
        InterfaceId::new(name).unwrap()
    }

    #[test]
    fn classifies_physical_interfaces_only() {
        let dir = TempDir::new().unwrap();
        fixture::build(dir.path(), true, false);
        let sysfs = Sysfs::new(dir.path());

        assert_eq!(sysfs.classify(&id("enp3s0")), Some(InterfaceKind::Wired));
        assert_eq!(sysfs.classify(&id("wlp2s0")), Some(InterfaceKind::Wireless));
        assert_eq!(sysfs.classify(&id("docker0")), None);
        assert_eq!(sysfs.classify(&id("lo")), None);
    }

    #[test]
    fn finds_first_of_each_kind() {
        let dir = TempDir::new().unwrap();
        fixture::build(dir.path(), true, false);
        let sysfs = Sysfs::new(dir.path());

        assert_eq!(sysfs.find_first(InterfaceKind::Wired).unwrap(), id("enp3s0"));
        assert_eq!(sysfs.find_first(InterfaceKind::Wireless).unwrap(), id("wlp2s0"));
    }

    #[test]
    fn missing_tree_is_a_resolution_failure() {
        let dir = TempDir::new().unwrap();
        let sysfs = Sysfs::new(dir.path());
        assert!(sysfs.find_first(InterfaceKind::Wired).is_err());
    }

    #[test]
    fn reads_carrier_and_rfkill() {
        let dir = TempDir::new().unwrap();
        fixture::build(dir.path(), false, true);
        let sysfs = Sysfs::new(dir.path());

        assert!(!sysfs.carrier(&id("enp3s0")).unwrap());
        assert!(!sysfs.radio_unblocked(&id("wlp2s0")).unwrap());
        assert!(sysfs.carrier(&id("nope0")).is_err());
    }
}

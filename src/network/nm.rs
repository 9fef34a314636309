use tracing::debug;
use zbus::zvariant::OwnedObjectPath;
use zbus::Connection;

use crate::error::{SwitchError, SwitchResult};
use crate::network::dbus_proxies::*;
use crate::network::types::{DeviceState, DeviceType, InterfaceId};

/// A NetworkManager device matched to a kernel interface
#[derive(Debug, Clone)]
pub struct NmDevice {
    pub path: OwnedObjectPath,
    pub device_type: DeviceType,
    pub state: DeviceState,
}

/// Thin facade over NetworkManager's D-Bus API, limited to what the path observer needs
#[derive(Debug, Clone)]
pub struct NetworkManager {
    connection: Connection,
}

impl NetworkManager {
    /// Connect to the system D-Bus
    pub async fn new() -> SwitchResult<Self> {
        let connection = Connection::system().await?;
        Ok(Self { connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Check if NetworkManager is running
    pub async fn is_running(&self) -> bool {
        self.version().await.is_ok()
    }

    /// Get NM version string
    pub async fn version(&self) -> SwitchResult<String> {
        let proxy = NetworkManagerProxy::new(&self.connection).await?;
        Ok(proxy.version().await?)
    }

    /// Find the NM device that manages the given interface
    pub async fn find_device(&self, iface: &InterfaceId) -> SwitchResult<NmDevice> {
        let proxy = NetworkManagerProxy::new(&self.connection).await?;
        let path = proxy
            .get_device_by_ip_iface(iface.as_str())
            .await
            .map_err(|e| SwitchError::DeviceNotFound(format!("{}: {}", iface, e)))?;

        let device = DeviceProxy::builder(&self.connection)
            .path(path.clone())?
            .build()
            .await?;
        let device_type = DeviceType::from_nm(device.device_type().await.unwrap_or(0));
        let state = DeviceState::from_nm(device.state().await.unwrap_or(0));
        debug!("{} is {} ({:?}, {:?})", iface, path, device_type, state);

        Ok(NmDevice {
            path,
            device_type,
            state,
        })
    }
}

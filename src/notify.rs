use std::collections::HashMap;

use tracing::{debug, info, warn};
use zbus::Connection;

use crate::error::{SwitchError, SwitchResult};
use crate::network::dbus_proxies::NotificationsProxy;

/// Delivers user-facing notifications. Must not block.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, title: &str, body: &str);
}

/// Title and body reporting the outcome of a radio toggle
pub fn toggle_message(app_name: &str, enabled: bool, result: &SwitchResult<()>) -> (String, String) {
    let operation = if enabled {
        "Wi-Fi enabled"
    } else {
        "Wi-Fi disabled"
    };
    match result {
        Ok(()) => (
            format!("{} - {}", app_name, operation),
            format!("Wi-Fi has been turned {}", if enabled { "on" } else { "off" }),
        ),
        Err(SwitchError::ControlFailed { reason }) => (
            format!("{} - {} failed", app_name, operation),
            format!("Check system permissions: {}", reason),
        ),
        Err(e) => (
            format!("{} - {} failed", app_name, operation),
            e.to_string(),
        ),
    }
}

/// Title and body of the user-triggered test notification
pub fn test_message(app_name: &str) -> (String, String) {
    (
        format!("{} - Test notification", app_name),
        "Notifications are working".to_string(),
    )
}

/// Writes notifications to the log only; used when no desktop session is reachable
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!("{}: {}", title, body);
    }
}

/// Sends notifications through the freedesktop notification service on the session bus
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    connection: Connection,
    app_name: String,
}

impl DesktopNotifier {
    pub async fn new(app_name: &str) -> SwitchResult<Self> {
        let connection = Connection::session().await?;
        Ok(Self {
            connection,
            app_name: app_name.to_string(),
        })
    }

    /// Send and wait for the server to assign an id
    pub async fn send(&self, title: &str, body: &str) -> SwitchResult<u32> {
        let proxy = NotificationsProxy::new(&self.connection).await?;
        let id = proxy
            .notify(
                &self.app_name,
                0,
                "network-wireless",
                title,
                body,
                &[],
                HashMap::new(),
                -1,
            )
            .await?;
        Ok(id)
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        let notifier = self.clone();
        let title = title.to_string();
        let body = body.to_string();

        tokio::spawn(async move {
            match notifier.send(&title, &body).await {
                Ok(id) => debug!("Notification {} sent: {}", id, title),
                Err(e) => warn!("Failed to send notification '{}': {}", title, e),
            }
        });
    }
}

pub mod dbus_proxies;
pub mod nm;
pub mod observer;
pub mod poller;
pub mod probe;
pub mod radio;
pub mod sysfs;
pub mod types;

pub use nm::NetworkManager;
pub use types::*;

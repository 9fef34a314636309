use tracing::info;

/// How radio commands will be authorized for this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    /// Running as root
    Full,
    /// Unprivileged; polkit or sudo rules decide whether a toggle succeeds
    Delegated,
}

impl PermissionLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Full => "Full Access",
            Self::Delegated => "Delegated (polkit)",
        }
    }

    pub fn from_euid(euid: u32) -> Self {
        if euid == 0 {
            Self::Full
        } else {
            Self::Delegated
        }
    }
}

/// Detect the permission level of the current process
pub fn check_permissions() -> PermissionLevel {
    let level = PermissionLevel::from_euid(unsafe { libc::geteuid() });
    match level {
        PermissionLevel::Full => info!("Running as root, radio commands run directly"),
        PermissionLevel::Delegated => {
            info!("Running unprivileged, radio commands rely on polkit authorization")
        }
    }
    level
}

//! crossnet-system: Operating-system collaborators for the CrossNet scan engine.
//!
//! Implements the `Probe` and `NamingMethod` interfaces by calling the
//! platform's own utilities (`ping`, `arp`, `nmblookup`, `nbtstat`,
//! `avahi-resolve`, `dns-sd`), the system resolver and the hosts file.
//! The platform is detected once and the matching implementations are
//! built up front, so nothing downstream branches on the OS again.

pub mod command;
pub mod config;
pub mod error;
pub mod interfaces;
pub mod naming;
pub mod neighbor;
pub mod platform;
pub mod probe;

pub use config::SystemConfig;
pub use error::SystemError;
pub use platform::Platform;
pub use probe::SystemProbe;

use crossnet_core::NamingMethod;

/// Everything the scan engine needs from the operating system.
pub struct SystemCollaborators {
    pub platform: Platform,
    pub probe: SystemProbe,
    pub naming: Vec<Box<dyn NamingMethod>>,
}

impl SystemCollaborators {
    /// Build the collaborators for the platform this binary runs on.
    pub fn detect(config: &SystemConfig) -> Self {
        Self::for_platform(Platform::detect(), config)
    }

    pub fn for_platform(platform: Platform, config: &SystemConfig) -> Self {
        let naming = naming::default_methods(platform, config);
        tracing::debug!(
            platform = %platform,
            naming_methods = ?naming.iter().map(|m| m.kind()).collect::<Vec<_>>(),
            "System collaborators selected"
        );

        Self {
            platform,
            probe: SystemProbe::new(platform, config),
            naming,
        }
    }
}

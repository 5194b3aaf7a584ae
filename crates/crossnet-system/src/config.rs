//! Configuration for the operating-system collaborators.

use std::time::Duration;

use serde::Deserialize;

/// Timeouts and paths used by the probe and naming methods.
///
/// Loaded from the `[system]` section of `crossnet.toml` or
/// `CROSSNET_SYSTEM__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Hosts file override (default: the platform's hosts file).
    #[serde(default)]
    pub hosts_file: Option<String>,

    /// Upper bound for one reverse DNS lookup.
    #[serde(default = "default_reverse_dns_timeout_ms")]
    pub reverse_dns_timeout_ms: u64,

    /// Upper bound for one NetBIOS node status query.
    #[serde(default = "default_netbios_timeout_secs")]
    pub netbios_timeout_secs: u64,

    /// Upper bound for one multicast DNS query.
    #[serde(default = "default_mdns_timeout_secs")]
    pub mdns_timeout_secs: u64,

    /// Upper bound for reading the neighbor table.
    #[serde(default = "default_neighbor_timeout_secs")]
    pub neighbor_timeout_secs: u64,
}

impl SystemConfig {
    pub fn reverse_dns_timeout(&self) -> Duration {
        Duration::from_millis(self.reverse_dns_timeout_ms)
    }

    pub fn netbios_timeout(&self) -> Duration {
        Duration::from_secs(self.netbios_timeout_secs)
    }

    pub fn mdns_timeout(&self) -> Duration {
        Duration::from_secs(self.mdns_timeout_secs)
    }

    pub fn neighbor_timeout(&self) -> Duration {
        Duration::from_secs(self.neighbor_timeout_secs)
    }
}

fn default_reverse_dns_timeout_ms() -> u64 {
    2000
}

fn default_netbios_timeout_secs() -> u64 {
    3
}

fn default_mdns_timeout_secs() -> u64 {
    2
}

fn default_neighbor_timeout_secs() -> u64 {
    5
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            hosts_file: None,
            reverse_dns_timeout_ms: default_reverse_dns_timeout_ms(),
            netbios_timeout_secs: default_netbios_timeout_secs(),
            mdns_timeout_secs: default_mdns_timeout_secs(),
            neighbor_timeout_secs: default_neighbor_timeout_secs(),
        }
    }
}

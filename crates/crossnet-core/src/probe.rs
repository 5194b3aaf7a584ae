//! Interfaces to the operating system collaborators.
//!
//! The scan engine never talks to the network directly. Liveness checks,
//! neighbor-table reads and name lookups all go through these traits, and the
//! implementation for the current platform is chosen once at start-up.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{LinkEntry, Liveness};

/// Host liveness and link-layer discovery for single addresses.
///
/// Every operation is fallible-to-empty: failures are reported inside the
/// returned value (or as an empty value), never as an error.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Send one echo probe and wait at most `timeout` for the answer.
    async fn probe_liveness(&self, address: Ipv4Addr, timeout: Duration) -> Liveness;

    /// Link-layer address for `address`, or an empty string when unknown.
    async fn lookup_link_address(&self, address: Ipv4Addr) -> String;

    /// Snapshot of the OS neighbor (ARP) table.
    async fn list_neighbor_table(&self) -> Vec<LinkEntry>;
}

/// The strategy a naming method uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingKind {
    ReverseDns,
    HostsFile,
    NetBios,
    Mdns,
}

impl fmt::Display for NamingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReverseDns => "reverse-dns",
            Self::HostsFile => "hosts-file",
            Self::NetBios => "netbios",
            Self::Mdns => "mdns",
        };
        f.write_str(name)
    }
}

/// One way of turning an address into a host name.
#[async_trait]
pub trait NamingMethod: Send + Sync {
    fn kind(&self) -> NamingKind;

    /// `None` covers both "no name" and "the method failed".
    async fn resolve(&self, address: Ipv4Addr) -> Option<String>;
}

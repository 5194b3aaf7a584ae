//! Local interface discovery.

use std::net::Ipv4Addr;

use crossnet_core::CurrentAddress;
use if_addrs::IfAddr;
use ipnet::Ipv4Net;

use crate::error::{Result, SystemError};

/// Widest block suggested for a scan. Larger subnets are narrowed to a /24.
const WIDEST_SUGGESTED_PREFIX: u8 = 24;

/// The machine's primary IPv4 address and the block to scan around it.
pub fn current_address() -> CurrentAddress {
    match find_current_ipv4() {
        Ok((ip, network)) => CurrentAddress::found(ip, network.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine local address");
            CurrentAddress::failed(e.to_string())
        }
    }
}

/// First non-loopback, non-link-local IPv4 interface address.
pub fn find_current_ipv4() -> Result<(Ipv4Addr, Ipv4Net)> {
    let interfaces = if_addrs::get_if_addrs()?;

    interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .find_map(|iface| match &iface.addr {
            IfAddr::V4(v4) if is_candidate(v4.ip) => {
                tracing::debug!(interface = %iface.name, ip = %v4.ip, "Using interface");
                Some((v4.ip, suggested_network(v4.ip, v4.netmask)))
            }
            _ => None,
        })
        .ok_or(SystemError::NoActiveInterface)
}

fn is_candidate(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_link_local() && !ip.is_unspecified()
}

/// Network of `ip` under `netmask`, narrowed to at most a /24.
pub fn suggested_network(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Net {
    let prefix = Ipv4Net::with_netmask(ip, netmask)
        .map(|net| net.prefix_len())
        .unwrap_or(WIDEST_SUGGESTED_PREFIX)
        .max(WIDEST_SUGGESTED_PREFIX);

    Ipv4Net::new(ip, prefix)
        .map(|net| net.trunc())
        .unwrap_or_else(|_| Ipv4Net::from(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_network_keeps_small_subnets() {
        let net = suggested_network(Ipv4Addr::new(10, 1, 2, 77), Ipv4Addr::new(255, 255, 255, 192));
        assert_eq!(net.to_string(), "10.1.2.64/26");
    }

    #[test]
    fn test_suggested_network_narrows_wide_subnets() {
        let net = suggested_network(Ipv4Addr::new(10, 1, 2, 77), Ipv4Addr::new(255, 0, 0, 0));
        assert_eq!(net.to_string(), "10.1.2.0/24");
    }

    #[test]
    fn test_invalid_netmask_falls_back_to_24() {
        let net = suggested_network(Ipv4Addr::new(192, 168, 5, 9), Ipv4Addr::new(255, 0, 255, 0));
        assert_eq!(net.to_string(), "192.168.5.0/24");
    }

    #[test]
    fn test_candidate_filter() {
        assert!(is_candidate(Ipv4Addr::new(192, 168, 1, 5)));
        assert!(!is_candidate(Ipv4Addr::LOCALHOST));
        assert!(!is_candidate(Ipv4Addr::new(169, 254, 3, 4)));
    }

    #[test]
    fn test_current_address_shape() {
        let current = current_address();
        if current.success {
            assert!(current.ip.is_some() && current.network.is_some());
        } else {
            assert!(current.error.is_some());
        }
    }
}

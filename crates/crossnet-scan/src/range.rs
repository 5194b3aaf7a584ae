//! Expansion of CIDR blocks into host addresses.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::error::{Result, ScanError};

/// Parse `cidr` as an IPv4 block, dropping any host bits of the base address.
pub fn parse(cidr: &str) -> Result<Ipv4Net> {
    cidr.trim()
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|e| ScanError::InvalidRange {
            cidr: cidr.to_string(),
            reason: e.to_string(),
        })
}

/// Usable host addresses of `cidr` in ascending order.
///
/// The network and broadcast addresses are excluded, except for /31 and /32
/// blocks where every address is returned.
pub fn expand(cidr: &str) -> Result<Vec<Ipv4Addr>> {
    // Ipv4Net::hosts already applies the /31 and /32 exception.
    Ok(parse(cidr)?.hosts().collect())
}

/// Whether `address` lies inside `cidr`. An invalid block contains nothing.
pub fn contains(cidr: &str, address: Ipv4Addr) -> bool {
    parse(cidr).map(|net| net.contains(&address)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_slash_30() {
        assert_eq!(
            expand("192.168.1.0/30").unwrap(),
            vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]
        );
    }

    #[test]
    fn test_expand_slash_24() {
        let hosts = expand("10.0.0.0/24").unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts.first(), Some(&Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(10, 0, 0, 254)));
        assert!(hosts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_expand_counts_follow_prefix() {
        for prefix in 20..=30u32 {
            let hosts = expand(&format!("172.16.0.0/{prefix}")).unwrap();
            assert_eq!(hosts.len(), (1usize << (32 - prefix)) - 2, "prefix /{prefix}");
        }
    }

    #[test]
    fn test_small_blocks_keep_every_address() {
        assert_eq!(
            expand("10.0.0.4/31").unwrap(),
            vec![Ipv4Addr::new(10, 0, 0, 4), Ipv4Addr::new(10, 0, 0, 5)]
        );
        assert_eq!(expand("10.0.0.9/32").unwrap(), vec![Ipv4Addr::new(10, 0, 0, 9)]);
    }

    #[test]
    fn test_host_bits_are_ignored() {
        assert_eq!(expand("192.168.1.77/30").unwrap(), expand("192.168.1.76/30").unwrap());
    }

    #[test]
    fn test_invalid_ranges() {
        for bad in ["not-a-network", "192.168.1.0", "192.168.1.0/33", "fe80::/64", ""] {
            let err = expand(bad).unwrap_err();
            assert!(matches!(err, ScanError::InvalidRange { .. }), "{bad}");
        }
    }

    #[test]
    fn test_contains() {
        assert!(contains("192.168.1.0/24", Ipv4Addr::new(192, 168, 1, 200)));
        assert!(!contains("192.168.1.0/24", Ipv4Addr::new(192, 168, 2, 1)));
        assert!(!contains("garbage", Ipv4Addr::new(192, 168, 1, 1)));
    }
}

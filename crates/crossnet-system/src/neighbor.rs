//! Parsing of `arp` output into link entries.
//!
//! The three supported platforms print the neighbor table differently:
//!
//! ```text
//! linux  (arp -a): ? (192.168.1.1) at aa:bb:cc:dd:ee:01 [ether] on eth0
//! linux  (arp -n): 192.168.1.1  ether  aa:bb:cc:dd:ee:01  C  eth0
//! darwin (arp -a): ? (192.168.1.1) at 0:1b:cc:dd:ee:1 on en0 ifscope [ethernet]
//! windows(arp -a):   192.168.1.1          aa-bb-cc-dd-ee-01     dynamic
//! ```
//!
//! Rather than one pattern per platform, each line is searched for the first
//! IPv4 address and the first MAC-shaped token.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use crossnet_core::{LinkEntry, LinkSource};
use regex::Regex;

const BROADCAST_MAC: &str = "FF:FF:FF:FF:FF:FF";
const ZERO_MAC: &str = "00:00:00:00:00:00";

fn ipv4_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").expect("valid IPv4 pattern")
    })
}

fn mac_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b([0-9A-Fa-f]{1,2}(?:[:-][0-9A-Fa-f]{1,2}){5})\b")
            .expect("valid MAC pattern")
    })
}

/// Normalize a MAC to upper-case, colon separated, two digits per octet.
///
/// Accepts `-` separators (Windows) and single-digit octets (macOS).
pub fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<u8> = raw
        .split([':', '-'])
        .map(|part| u8::from_str_radix(part, 16))
        .collect::<Result<_, _>>()
        .ok()?;

    if octets.len() != 6 {
        return None;
    }

    Some(
        octets
            .iter()
            .map(|o| format!("{o:02X}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

/// Extract `(address, mac)` from one line of `arp` output.
///
/// Lines without a usable MAC (incomplete entries, interface headers,
/// broadcast or all-zero addresses) yield `None`.
pub fn parse_neighbor_line(line: &str) -> Option<(Ipv4Addr, String)> {
    let address = ipv4_pattern()
        .captures_iter(line)
        .find_map(|c| c[1].parse::<Ipv4Addr>().ok())?;

    let mac = mac_pattern()
        .captures(line)
        .and_then(|c| normalize_mac(&c[1]))?;

    if mac == BROADCAST_MAC || mac == ZERO_MAC {
        return None;
    }

    Some((address, mac))
}

/// Parse a full neighbor table listing. The first entry per address wins.
pub fn parse_neighbor_table(output: &str) -> Vec<LinkEntry> {
    let mut seen = HashSet::new();

    output
        .lines()
        .filter_map(parse_neighbor_line)
        .filter(|(address, _)| seen.insert(*address))
        .map(|(address, mac)| LinkEntry::new(address, mac, LinkSource::CachedTable))
        .collect()
}

/// Find the MAC recorded for `address`, or an empty string.
pub fn find_link_address(output: &str, address: Ipv4Addr) -> String {
    output
        .lines()
        .filter_map(parse_neighbor_line)
        .find(|(a, _)| *a == address)
        .map(|(_, mac)| mac)
        .unwrap_or_default()
}

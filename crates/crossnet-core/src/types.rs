//! Core domain types for CrossNet scans.
//!
//! These types describe what a scan is asked to do and what it reports back
//! for every host. They are shared by the scan engine, the OS collaborators
//! and any front end that consumes the event stream.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

// ── Scan Request ──────────────────────────────────────────────────

/// Which sweeps a scan runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Echo sweep only.
    Ping,
    /// Neighbor table plus link-layer sweep.
    Arp,
    /// Ping sweep followed by the ARP sweep.
    #[default]
    Both,
}

impl ScanType {
    pub fn includes_ping(&self) -> bool {
        matches!(self, Self::Ping | Self::Both)
    }

    pub fn includes_arp(&self) -> bool {
        matches!(self, Self::Arp | Self::Both)
    }

    /// Number of address sweeps this scan type performs.
    pub fn sweep_count(&self) -> usize {
        usize::from(self.includes_ping()) + usize::from(self.includes_arp())
    }
}

impl FromStr for ScanType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ping" => Ok(Self::Ping),
            "arp" => Ok(Self::Arp),
            "both" => Ok(Self::Both),
            _ => Err(CoreError::InvalidScanType(s.to_string())),
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ping => "ping",
            Self::Arp => "arp",
            Self::Both => "both",
        };
        f.write_str(name)
    }
}

/// A request to scan one IPv4 block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRequest {
    /// CIDR block to scan (e.g., "192.168.1.0/24").
    pub network: String,

    #[serde(default)]
    pub scan_type: ScanType,

    /// Maximum number of hosts probed at once.
    #[serde(alias = "threads")]
    pub concurrency: usize,

    /// Per-probe timeout, in seconds on the wire.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Also emit results for hosts that did not answer the ping sweep.
    #[serde(default)]
    pub report_down: bool,
}

impl ScanRequest {
    pub fn new(network: &str, scan_type: ScanType, concurrency: usize, timeout: Duration) -> Self {
        Self {
            network: network.to_string(),
            scan_type,
            concurrency,
            timeout,
            report_down: false,
        }
    }

    pub fn with_report_down(mut self, report_down: bool) -> Self {
        self.report_down = report_down;
        self
    }

    /// Check the invariants that do not need the address range.
    ///
    /// The network itself is validated when the scan expands it, so a bad
    /// CIDR surfaces as an error event rather than a rejected request.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(CoreError::InvalidRequest(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.network.trim().is_empty() {
            return Err(CoreError::InvalidRequest("network is required".to_string()));
        }
        Ok(())
    }
}

// ── Probe Results ─────────────────────────────────────────────────

/// Raw answer of a single liveness probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Liveness {
    pub alive: bool,
    pub rtt: Duration,
    pub error: Option<String>,
}

impl Liveness {
    pub fn alive(rtt: Duration) -> Self {
        Self {
            alive: true,
            rtt,
            error: None,
        }
    }

    pub fn dead(rtt: Duration) -> Self {
        Self {
            alive: false,
            rtt,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            alive: false,
            rtt: Duration::ZERO,
            error: Some(error.into()),
        }
    }
}

/// Outcome of the ping sweep for one address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingResult {
    #[serde(rename = "ip")]
    pub address: Ipv4Addr,
    pub alive: bool,
    #[serde(rename = "rtt_ms", with = "duration_ms")]
    pub rtt: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl PingResult {
    pub fn from_liveness(address: Ipv4Addr, liveness: Liveness) -> Self {
        Self {
            address,
            alive: liveness.alive,
            rtt: liveness.rtt,
            error: liveness.error,
            hostname: None,
        }
    }
}

/// Where a link entry was learned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    /// Already present in the OS neighbor table before the sweep.
    CachedTable,
    /// Found by probing the address during the sweep.
    ActiveScan,
}

/// An address paired with its link-layer (MAC) address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkEntry {
    #[serde(rename = "ip")]
    pub address: Ipv4Addr,
    /// Upper-case, colon separated. Empty when unknown.
    #[serde(rename = "mac")]
    pub link_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub source: LinkSource,
}

impl LinkEntry {
    pub fn new(address: Ipv4Addr, link_address: impl Into<String>, source: LinkSource) -> Self {
        Self {
            address,
            link_address: link_address.into(),
            hostname: None,
            source,
        }
    }

    pub fn has_link_address(&self) -> bool {
        !self.link_address.is_empty()
    }
}

/// A per-host result carried by a `Result` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ProbeResult {
    Ping(PingResult),
    Link(LinkEntry),
}

impl ProbeResult {
    pub fn address(&self) -> Ipv4Addr {
        match self {
            Self::Ping(r) => r.address,
            Self::Link(e) => e.address,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        match self {
            Self::Ping(r) => r.hostname.as_deref(),
            Self::Link(e) => e.hostname.as_deref(),
        }
    }
}

// ── Local Machine ─────────────────────────────────────────────────

/// Answer to "which address and network is this machine on".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentAddress {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CurrentAddress {
    pub fn found(ip: Ipv4Addr, network: impl Into<String>) -> Self {
        Self {
            success: true,
            ip: Some(ip.to_string()),
            network: Some(network.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            ip: None,
            network: None,
            error: Some(error.into()),
        }
    }
}

// ── Duration encodings ────────────────────────────────────────────

/// Durations as (possibly fractional) seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Durations as fractional milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(ms / 1000.0).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_type_parsing() {
        assert_eq!("ping".parse::<ScanType>().unwrap(), ScanType::Ping);
        assert_eq!("ARP".parse::<ScanType>().unwrap(), ScanType::Arp);
        assert_eq!("Both".parse::<ScanType>().unwrap(), ScanType::Both);
        assert!("syn".parse::<ScanType>().is_err());
    }

    #[test]
    fn test_scan_type_sweeps() {
        assert_eq!(ScanType::Ping.sweep_count(), 1);
        assert_eq!(ScanType::Arp.sweep_count(), 1);
        assert_eq!(ScanType::Both.sweep_count(), 2);
        assert!(ScanType::Both.includes_ping() && ScanType::Both.includes_arp());
        assert!(!ScanType::Arp.includes_ping());
    }

    #[test]
    fn test_request_accepts_original_field_names() {
        let json = r#"{"network":"10.0.0.0/24","scan_type":"ping","threads":20,"timeout":2}"#;
        let request: ScanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.concurrency, 20);
        assert_eq!(request.timeout, Duration::from_secs(2));
        assert_eq!(request.scan_type, ScanType::Ping);
        assert!(!request.report_down);
    }

    #[test]
    fn test_request_rejects_zero_concurrency() {
        let request = ScanRequest::new("10.0.0.0/24", ScanType::Ping, 0, Duration::from_secs(1));
        assert!(matches!(
            request.validate(),
            Err(CoreError::InvalidRequest(_))
        ));

        let request = ScanRequest::new("10.0.0.0/24", ScanType::Ping, 1, Duration::from_secs(1));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_ping_result_wire_shape() {
        let result = PingResult {
            address: Ipv4Addr::new(10, 0, 0, 5),
            alive: true,
            rtt: Duration::from_millis(3),
            error: None,
            hostname: Some("printer".to_string()),
        };

        let value = serde_json::to_value(ProbeResult::Ping(result)).unwrap();
        assert_eq!(value["ip"], "10.0.0.5");
        assert_eq!(value["alive"], true);
        assert_eq!(value["rtt_ms"], 3.0);
        assert_eq!(value["hostname"], "printer");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_link_entry_wire_shape() {
        let entry = LinkEntry::new(
            Ipv4Addr::new(192, 168, 1, 1),
            "AA:BB:CC:DD:EE:01",
            LinkSource::CachedTable,
        );

        let value = serde_json::to_value(ProbeResult::Link(entry)).unwrap();
        assert_eq!(value["ip"], "192.168.1.1");
        assert_eq!(value["mac"], "AA:BB:CC:DD:EE:01");
        assert_eq!(value["source"], "cached_table");
    }

    #[test]
    fn test_current_address_failure_omits_fields() {
        let failed = CurrentAddress::failed("no active network interface found");
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(
            json,
            r#"{"success":false,"error":"no active network interface found"}"#
        );
    }
}

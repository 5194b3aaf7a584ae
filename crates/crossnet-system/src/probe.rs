//! `Probe` implementation over the system `ping` and `arp` utilities.

use std::net::Ipv4Addr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossnet_core::{LinkEntry, Liveness, Probe};
use regex::Regex;

use crate::command;
use crate::config::SystemConfig;
use crate::neighbor;
use crate::platform::Platform;

/// Extra time granted to `ping` on top of its own reply timeout.
const PING_GRACE: Duration = Duration::from_secs(2);

/// Probe backed by the platform's `ping` and `arp` commands.
pub struct SystemProbe {
    platform: Platform,
    neighbor_timeout: Duration,
}

impl SystemProbe {
    pub fn new(platform: Platform, config: &SystemConfig) -> Self {
        Self {
            platform,
            neighbor_timeout: config.neighbor_timeout(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    async fn run_arp(&self, args: Vec<String>) -> Option<String> {
        match command::run("arp", &args, self.neighbor_timeout).await {
            Ok(out) if out.success => Some(out.stdout),
            Ok(out) => {
                tracing::debug!(args = ?args, status = %out.exit_description(), "arp failed");
                None
            }
            Err(e) => {
                tracing::debug!(args = ?args, error = %e, "arp unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl Probe for SystemProbe {
    async fn probe_liveness(&self, address: Ipv4Addr, timeout: Duration) -> Liveness {
        let Some(args) = ping_args(self.platform, address, timeout) else {
            return Liveness::failed("Unsupported operating system");
        };

        let start = Instant::now();
        let result = command::run("ping", &args, timeout + PING_GRACE).await;
        let elapsed = start.elapsed();

        match result {
            Ok(out) if out.success => {
                if is_echo_reply(&out.stdout) {
                    Liveness::alive(parse_rtt(&out.stdout).unwrap_or(elapsed))
                } else {
                    Liveness::dead(elapsed)
                }
            }
            Ok(out) => Liveness {
                alive: false,
                rtt: elapsed,
                error: Some(out.exit_description()),
            },
            Err(e) => Liveness {
                alive: false,
                rtt: elapsed,
                error: Some(e.to_string()),
            },
        }
    }

    async fn lookup_link_address(&self, address: Ipv4Addr) -> String {
        let flag = match self.platform {
            Platform::Windows => "-a",
            Platform::Linux | Platform::Darwin => "-n",
            Platform::Unknown => return String::new(),
        };

        self.run_arp(vec![flag.to_string(), address.to_string()])
            .await
            .map(|out| neighbor::find_link_address(&out, address))
            .unwrap_or_default()
    }

    async fn list_neighbor_table(&self) -> Vec<LinkEntry> {
        if self.platform == Platform::Unknown {
            tracing::warn!("Neighbor table not available on this platform");
            return Vec::new();
        }

        match self.run_arp(vec!["-a".to_string()]).await {
            Some(out) => neighbor::parse_neighbor_table(&out),
            None => {
                tracing::warn!("Failed to read neighbor table");
                Vec::new()
            }
        }
    }
}

/// Arguments for a single echo request, or `None` on unsupported platforms.
pub fn ping_args(platform: Platform, address: Ipv4Addr, timeout: Duration) -> Option<Vec<String>> {
    let secs = timeout.as_secs().max(1).to_string();
    let ip = address.to_string();

    let args = match platform {
        Platform::Linux => vec!["-c".into(), "1".into(), "-W".into(), secs, ip],
        Platform::Darwin => vec!["-c".into(), "1".into(), "-t".into(), secs, ip],
        Platform::Windows => vec![
            "-n".into(),
            "1".into(),
            "-w".into(),
            timeout.as_millis().to_string(),
            ip,
        ],
        Platform::Unknown => return None,
    };
    Some(args)
}

/// Whether `ping` output shows an echo reply.
pub fn is_echo_reply(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("ttl=") || lower.contains("time=") || lower.contains("time<")
}

/// Round-trip time reported by `ping`, e.g. `time=3.21 ms` or `time<1ms`.
pub fn parse_rtt(output: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("valid rtt pattern")
    });

    let ms: f64 = pattern.captures(output)?[1].parse().ok()?;
    Some(Duration::from_micros((ms * 1000.0).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_REPLY: &str = "\
PING 10.0.0.5 (10.0.0.5) 56(84) bytes of data.
64 bytes from 10.0.0.5: icmp_seq=1 ttl=64 time=3.21 ms
";

    const WINDOWS_REPLY: &str = "\
Pinging 10.0.0.5 with 32 bytes of data:
Reply from 10.0.0.5: bytes=32 time<1ms TTL=128
";

    #[test]
    fn test_ping_args_per_platform() {
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        let timeout = Duration::from_millis(1500);

        assert_eq!(
            ping_args(Platform::Linux, ip, timeout).unwrap(),
            vec!["-c", "1", "-W", "1", "10.0.0.5"]
        );
        assert_eq!(
            ping_args(Platform::Darwin, ip, Duration::from_secs(3)).unwrap(),
            vec!["-c", "1", "-t", "3", "10.0.0.5"]
        );
        assert_eq!(
            ping_args(Platform::Windows, ip, timeout).unwrap(),
            vec!["-n", "1", "-w", "1500", "10.0.0.5"]
        );
        assert!(ping_args(Platform::Unknown, ip, timeout).is_none());
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let args =
            ping_args(Platform::Linux, Ipv4Addr::LOCALHOST, Duration::from_millis(200)).unwrap();
        assert_eq!(args[3], "1");
    }

    #[test]
    fn test_echo_reply_detection() {
        assert!(is_echo_reply(LINUX_REPLY));
        assert!(is_echo_reply(WINDOWS_REPLY));
        assert!(!is_echo_reply("Request timed out."));
        assert!(!is_echo_reply("Destination Host Unreachable"));
    }

    #[test]
    fn test_parse_rtt() {
        assert_eq!(parse_rtt(LINUX_REPLY), Some(Duration::from_micros(3210)));
        assert_eq!(parse_rtt(WINDOWS_REPLY), Some(Duration::from_millis(1)));
        assert_eq!(parse_rtt("no timing here"), None);
    }

    #[tokio::test]
    async fn test_unknown_platform_degrades_to_empty() {
        let probe = SystemProbe::new(Platform::Unknown, &SystemConfig::default());
        let ip = Ipv4Addr::new(10, 0, 0, 5);

        let liveness = probe.probe_liveness(ip, Duration::from_secs(1)).await;
        assert!(!liveness.alive);
        assert_eq!(liveness.error.as_deref(), Some("Unsupported operating system"));

        assert_eq!(probe.lookup_link_address(ip).await, "");
        assert!(probe.list_neighbor_table().await.is_empty());
    }
}

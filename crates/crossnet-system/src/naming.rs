//! Host name lookups.
//!
//! Each strategy implements `NamingMethod`. The resolver tries them in the
//! order returned by [`default_methods`] and keeps the first name found.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use crossnet_core::{NamingKind, NamingMethod};

use crate::command;
use crate::config::SystemConfig;
use crate::platform::Platform;

/// Naming methods available on `platform`, in lookup order.
pub fn default_methods(platform: Platform, config: &SystemConfig) -> Vec<Box<dyn NamingMethod>> {
    let hosts_path = config
        .hosts_file
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_hosts_path(platform));

    let mut methods: Vec<Box<dyn NamingMethod>> = vec![
        Box::new(ReverseDns::new(config.reverse_dns_timeout())),
        Box::new(HostsFile::new(hosts_path)),
    ];

    if matches!(platform, Platform::Linux | Platform::Windows) {
        methods.push(Box::new(NetBios::new(platform, config.netbios_timeout())));
    }
    if matches!(platform, Platform::Linux | Platform::Darwin) {
        methods.push(Box::new(Mdns::new(platform, config.mdns_timeout())));
    }

    methods
}

fn default_hosts_path(platform: Platform) -> PathBuf {
    match platform {
        Platform::Windows => {
            let root = std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
            PathBuf::from(root).join(r"System32\drivers\etc\hosts")
        }
        _ => PathBuf::from("/etc/hosts"),
    }
}

// ── Reverse DNS ───────────────────────────────────────────────────

/// PTR lookup through the system resolver.
pub struct ReverseDns {
    timeout: Duration,
}

impl ReverseDns {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl NamingMethod for ReverseDns {
    fn kind(&self) -> NamingKind {
        NamingKind::ReverseDns
    }

    async fn resolve(&self, address: Ipv4Addr) -> Option<String> {
        let ip = IpAddr::V4(address);
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip));

        let name = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(name))) => name,
            Ok(Ok(Err(e))) => {
                tracing::trace!(ip = %address, error = %e, "Reverse lookup failed");
                return None;
            }
            Ok(Err(e)) => {
                tracing::debug!(ip = %address, error = %e, "Reverse lookup task failed");
                return None;
            }
            Err(_) => {
                tracing::trace!(ip = %address, "Reverse lookup timed out");
                return None;
            }
        };

        clean_dns_name(&name, address)
    }
}

/// Strip the root dot. Resolvers that echo the address back count as no answer.
pub fn clean_dns_name(name: &str, address: Ipv4Addr) -> Option<String> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name == address.to_string() {
        None
    } else {
        Some(name.to_string())
    }
}

// ── Hosts File ────────────────────────────────────────────────────

/// Static entries from the hosts file. The file is re-read on every lookup.
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NamingMethod for HostsFile {
    fn kind(&self) -> NamingKind {
        NamingKind::HostsFile
    }

    async fn resolve(&self, address: Ipv4Addr) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => lookup_hosts(&contents, address),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Cannot read hosts file");
                None
            }
        }
    }
}

/// First name listed for `address` in hosts-file `contents`.
pub fn lookup_hosts(contents: &str, address: Ipv4Addr) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        let ip: Ipv4Addr = fields.next()?.parse().ok()?;
        if ip != address {
            return None;
        }
        fields.next().map(str::to_string)
    })
}

// ── NetBIOS ───────────────────────────────────────────────────────

/// NetBIOS node status query (`nmblookup -A` or `nbtstat -A`).
pub struct NetBios {
    platform: Platform,
    timeout: Duration,
}

impl NetBios {
    pub fn new(platform: Platform, timeout: Duration) -> Self {
        Self { platform, timeout }
    }
}

#[async_trait]
impl NamingMethod for NetBios {
    fn kind(&self) -> NamingKind {
        NamingKind::NetBios
    }

    async fn resolve(&self, address: Ipv4Addr) -> Option<String> {
        let program = match self.platform {
            Platform::Linux => "nmblookup",
            Platform::Windows => "nbtstat",
            _ => return None,
        };
        let args = vec!["-A".to_string(), address.to_string()];

        match command::run(program, &args, self.timeout).await {
            Ok(out) if out.success => parse_netbios_name(&out.stdout),
            Ok(_) => None,
            Err(e) => {
                tracing::trace!(program, ip = %address, error = %e, "NetBIOS lookup failed");
                None
            }
        }
    }
}

/// Workstation name from a node status table: the first unique `<00>` entry.
pub fn parse_netbios_name(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("<00>") && line.to_uppercase().contains("UNIQUE"))
        .filter_map(|line| line.split_whitespace().next())
        .find(|name| !name.starts_with("__"))
        .map(str::to_string)
}

// ── Multicast DNS ─────────────────────────────────────────────────

/// Multicast DNS reverse query (`avahi-resolve` or `dns-sd`).
pub struct Mdns {
    platform: Platform,
    timeout: Duration,
}

impl Mdns {
    pub fn new(platform: Platform, timeout: Duration) -> Self {
        Self { platform, timeout }
    }
}

#[async_trait]
impl NamingMethod for Mdns {
    fn kind(&self) -> NamingKind {
        NamingKind::Mdns
    }

    async fn resolve(&self, address: Ipv4Addr) -> Option<String> {
        let result = match self.platform {
            Platform::Linux => {
                let args = vec!["-a".to_string(), address.to_string()];
                command::run("avahi-resolve", &args, self.timeout)
                    .await
                    .map(|out| {
                        if out.success {
                            parse_avahi_name(&out.stdout, address)
                        } else {
                            None
                        }
                    })
            }
            // dns-sd never exits on its own.
            Platform::Darwin => {
                let args = vec!["-q".to_string(), reverse_pointer(address), "PTR".to_string()];
                command::first_match("dns-sd", &args, self.timeout, parse_dns_sd_line).await
            }
            _ => return None,
        };

        match result {
            Ok(name) => name,
            Err(e) => {
                tracing::trace!(ip = %address, error = %e, "mDNS lookup failed");
                None
            }
        }
    }
}

/// `in-addr.arpa` name for a PTR query.
pub fn reverse_pointer(address: Ipv4Addr) -> String {
    let [a, b, c, d] = address.octets();
    format!("{d}.{c}.{b}.{a}.in-addr.arpa")
}

/// `avahi-resolve -a` prints `<ip>\t<name>.local`. Lines for other addresses
/// and error messages are ignored.
pub fn parse_avahi_name(output: &str, address: Ipv4Addr) -> Option<String> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let ip: Ipv4Addr = fields.next()?.parse().ok()?;
        if ip != address {
            return None;
        }
        let name = fields.next()?;
        let name = name.trim_end_matches('.').trim_end_matches(".local");
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// One line of `dns-sd -q` output; the answer is the field ending in `.local.`.
pub fn parse_dns_sd_line(line: &str) -> Option<String> {
    line.split_whitespace()
        .find(|field| field.ends_with(".local."))
        .map(|field| field.trim_end_matches(".local."))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HOSTS: &str = "\
# static entries
127.0.0.1   localhost
192.168.1.10  nas nas.lan   # storage
192.168.1.10  duplicate
::1         ip6-localhost
";

    #[test]
    fn test_lookup_hosts() {
        assert_eq!(
            lookup_hosts(HOSTS, Ipv4Addr::new(192, 168, 1, 10)).as_deref(),
            Some("nas")
        );
        assert_eq!(lookup_hosts(HOSTS, Ipv4Addr::LOCALHOST).as_deref(), Some("localhost"));
        assert!(lookup_hosts(HOSTS, Ipv4Addr::new(192, 168, 1, 11)).is_none());
    }

    #[test]
    fn test_lookup_hosts_ignores_commented_lines() {
        let contents = "#192.168.1.5 hidden\n192.168.1.5 # no name\n";
        assert!(lookup_hosts(contents, Ipv4Addr::new(192, 168, 1, 5)).is_none());
    }

    #[tokio::test]
    async fn test_hosts_file_method_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HOSTS.as_bytes()).unwrap();

        let method = HostsFile::new(file.path());
        assert_eq!(method.kind(), NamingKind::HostsFile);
        assert_eq!(
            method.resolve(Ipv4Addr::new(192, 168, 1, 10)).await.as_deref(),
            Some("nas")
        );
    }

    #[tokio::test]
    async fn test_missing_hosts_file_is_no_answer() {
        let method = HostsFile::new("/nonexistent/crossnet/hosts");
        assert!(method.resolve(Ipv4Addr::LOCALHOST).await.is_none());
    }

    #[test]
    fn test_clean_dns_name() {
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(clean_dns_name("router.lan.", ip).as_deref(), Some("router.lan"));
        assert!(clean_dns_name("10.0.0.1", ip).is_none());
        assert!(clean_dns_name(".", ip).is_none());
    }

    #[test]
    fn test_parse_netbios_name() {
        let output = "\
Looking up status of 192.168.1.40
\t__MSBROWSE__   <01> - <GROUP> B <ACTIVE>
\tDESKTOP-7Q     <00> -         B <ACTIVE>
\tDESKTOP-7Q     <00> - UNIQUE  B <ACTIVE>
\tWORKGROUP      <00> - <GROUP> B <ACTIVE>
";
        assert_eq!(parse_netbios_name(output).as_deref(), Some("DESKTOP-7Q"));
        assert!(parse_netbios_name("No reply from 192.168.1.40").is_none());
    }

    #[test]
    fn test_parse_nbtstat_output() {
        let output = "\
    NetBIOS Remote Machine Name Table

       Name               Type         Status
    ---------------------------------------------
    OFFICE-PC      <00>  UNIQUE      Registered
    WORKGROUP      <00>  GROUP       Registered
";
        assert_eq!(parse_netbios_name(output).as_deref(), Some("OFFICE-PC"));
    }

    #[test]
    fn test_parse_mdns_answers() {
        let ip = Ipv4Addr::new(192, 168, 1, 50);
        assert_eq!(
            parse_avahi_name("192.168.1.50\tprinter.local\n", ip).as_deref(),
            Some("printer")
        );
        assert!(parse_avahi_name("Failed to resolve address", ip).is_none());

        let line = "10:01:02.123  Add  2  4 50.1.168.192.in-addr.arpa.  PTR  macbook.local.";
        assert_eq!(parse_dns_sd_line(line).as_deref(), Some("macbook"));
        assert!(parse_dns_sd_line("Timestamp  A/R Flags if Name").is_none());
    }

    #[test]
    fn test_avahi_failure_text_is_not_a_name() {
        let ip = Ipv4Addr::new(10, 0, 0, 9);
        let output = "Failed to resolve address '10.0.0.9': Timeout reached\n";
        assert!(parse_avahi_name(output, ip).is_none());

        let other_host = "10.0.0.8\tkitchen.local\n";
        assert!(parse_avahi_name(other_host, ip).is_none());

        let mixed = "10.0.0.8\tkitchen.local\n10.0.0.9\tstudy.local\n";
        assert_eq!(parse_avahi_name(mixed, ip).as_deref(), Some("study"));
    }

    #[test]
    fn test_reverse_pointer() {
        assert_eq!(
            reverse_pointer(Ipv4Addr::new(192, 168, 1, 50)),
            "50.1.168.192.in-addr.arpa"
        );
    }

    #[test]
    fn test_default_methods_per_platform() {
        let config = SystemConfig::default();
        let kinds = |p| {
            default_methods(p, &config)
                .iter()
                .map(|m| m.kind())
                .collect::<Vec<_>>()
        };

        assert_eq!(
            kinds(Platform::Linux),
            vec![
                NamingKind::ReverseDns,
                NamingKind::HostsFile,
                NamingKind::NetBios,
                NamingKind::Mdns
            ]
        );
        assert_eq!(
            kinds(Platform::Darwin),
            vec![NamingKind::ReverseDns, NamingKind::HostsFile, NamingKind::Mdns]
        );
        assert_eq!(
            kinds(Platform::Windows),
            vec![NamingKind::ReverseDns, NamingKind::HostsFile, NamingKind::NetBios]
        );
        assert_eq!(
            kinds(Platform::Unknown),
            vec![NamingKind::ReverseDns, NamingKind::HostsFile]
        );
    }
}

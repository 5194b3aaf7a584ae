//! Configuration for scans started from the command line.

use std::time::Duration;

use serde::Deserialize;

use crossnet_core::{ScanRequest, ScanType};

/// Default scan parameters.
///
/// Loaded from the `[scan]` section of `crossnet.toml` or
/// `CROSSNET_SCAN__` environment variables. CLI flags override these.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// CIDR block to scan (default: "192.168.1.0/24").
    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default)]
    pub scan_type: ScanType,

    /// Maximum hosts probed at once.
    #[serde(default = "default_concurrency", alias = "threads")]
    pub concurrency: usize,

    /// Per-probe timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Queue length of each observer.
    #[serde(default = "default_observer_capacity")]
    pub observer_capacity: usize,

    /// What happens to undispatched probes after a stop request.
    #[serde(default)]
    pub stop_behavior: StopBehavior,

    /// Report hosts that did not answer the ping sweep.
    #[serde(default)]
    pub report_down: bool,
}

/// Handling of probes that have not started when a scan is stopped.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopBehavior {
    /// Do not dispatch any further probes.
    #[default]
    SkipPending,
    /// Dispatch every probe and discard the results.
    Drain,
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn to_request(&self) -> ScanRequest {
        ScanRequest::new(&self.network, self.scan_type, self.concurrency, self.timeout())
            .with_report_down(self.report_down)
    }
}

fn default_network() -> String {
    "192.168.1.0/24".to_string()
}

fn default_concurrency() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    2
}

fn default_observer_capacity() -> usize {
    100
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            scan_type: ScanType::default(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            observer_capacity: default_observer_capacity(),
            stop_behavior: StopBehavior::default(),
            report_down: false,
        }
    }
}

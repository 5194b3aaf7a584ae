//! crossnet-scan: Concurrent host discovery for local IPv4 networks.
//!
//! Expands a CIDR block, probes every address with bounded concurrency,
//! resolves names for live hosts and streams progress and results to any
//! number of observers. One scan runs at a time; it can be stopped at any
//! point and always ends with exactly one terminal event.

pub mod broadcast;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod range;
pub mod resolver;
pub mod runner;
pub mod state;

pub use broadcast::{EventBroadcaster, Observer};
pub use config::{ScanConfig, StopBehavior};
pub use controller::{ScanController, ScanStatus};
pub use engine::{ScanEngine, ScanOutcome};
pub use error::ScanError;
pub use resolver::{CacheStats, HostnameResolver};
pub use runner::BoundedRunner;
pub use state::{ScanGate, ScanState};

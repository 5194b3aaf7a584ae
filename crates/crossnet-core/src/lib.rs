//! crossnet-core: Shared types, events, and interfaces for CrossNet.
//!
//! This crate provides the foundational pieces used by every CrossNet component:
//! - Scan requests and per-host results (ping results, link entries)
//! - Scan events and their wire format
//! - The `Probe` and `NamingMethod` interfaces implemented by the OS layer
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod probe;
pub mod types;

pub use error::CoreError;
pub use events::ScanEvent;
pub use probe::{NamingKind, NamingMethod, Probe};
pub use types::{
    CurrentAddress, LinkEntry, LinkSource, Liveness, PingResult, ProbeResult, ScanRequest,
    ScanType,
};

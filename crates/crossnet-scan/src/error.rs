//! Error types for the crossnet-scan crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("A scan is already running")]
    Conflict,

    #[error("Invalid network range {cidr}: {reason}")]
    InvalidRange { cidr: String, reason: String },

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error(transparent)]
    Core(#[from] crossnet_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

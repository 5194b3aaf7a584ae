//! Error types for the crossnet-system crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Command not found: {program}")]
    CommandNotFound { program: String },

    #[error("Command {program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u128 },

    #[error("No active network interface found")]
    NoActiveInterface,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SystemError>;

use std::fmt;

use serde::Serialize;

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
    Unknown,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` style name to a platform.
    pub fn from_os(os: &str) -> Self {
        match os.to_lowercase().as_str() {
            "linux" => Self::Linux,
            "macos" | "darwin" => Self::Darwin,
            "windows" => Self::Windows,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

//! Host family detection for the removable-disk export path

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host family as far as disk export is concerned
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Devices appear under `/dev` and are mounted explicitly
    Linux,
    /// Volumes are already mounted under `/Volumes`
    MacOs,
    /// Anything else; disk export refuses to run
    Unsupported(String),
}

impl Platform {
    /// Detect the family of the running OS
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            other => Platform::Unsupported(other.to_string()),
        }
    }

    /// Whether disk export can run on this host
    pub fn is_supported(&self) -> bool {
        !matches!(self, Platform::Unsupported(_))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => write!(f, "Linux"),
            Platform::MacOs => write!(f, "macOS"),
            Platform::Unsupported(os) => write!(f, "{os}"),
        }
    }
}

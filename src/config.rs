//! Configuration types for mpme

use crate::error::{Error, Result};
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download behavior configuration (directory, tagging, size threshold)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "__downloads__")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Clear the download directory before a run (default: true)
    ///
    /// Disable when resuming with a start index so earlier files survive.
    #[serde(default = "default_true")]
    pub reset_download_dir: bool,

    /// Songs whose file exceeds this many megabytes are flagged as oversized (default: 20.0)
    #[serde(default = "default_oversize_threshold_mb")]
    pub oversize_threshold_mb: f64,

    /// Write ID3 tags after each successful fetch (default: true)
    #[serde(default = "default_true")]
    pub tag_songs: bool,

    /// Self-update the downloader binary before a run (default: true)
    #[serde(default = "default_true")]
    pub update_downloader: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            reset_download_dir: true,
            oversize_threshold_mb: default_oversize_threshold_mb(),
            tag_songs: true,
            update_downloader: true,
        }
    }
}

/// Retry configuration for flaky downloads
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of download attempts per song, first try included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retry policy with no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Export destinations and removable-disk discovery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Local backup folder (default: "backup")
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Volume names never offered as export targets (default: {"Macintosh HD"})
    #[serde(default = "default_ignore_disks")]
    pub ignore_disks: BTreeSet<String>,

    /// Parent directory of mounted volumes on macOS (default: "/Volumes")
    #[serde(default = "default_mac_volumes_dir")]
    pub mac_volumes_dir: PathBuf,

    /// Device directory scanned on Linux (default: "/dev")
    #[serde(default = "default_linux_device_dir")]
    pub linux_device_dir: PathBuf,

    /// Substring a Linux device name must contain to be a candidate (default: "sd")
    #[serde(default = "default_linux_device_marker")]
    pub linux_device_marker: String,

    /// Mount point used on Linux (default: "/mnt")
    #[serde(default = "default_linux_mount_dir")]
    pub linux_mount_dir: PathBuf,

    /// Program invoked to mount a device on Linux (default: "mount")
    #[serde(default = "default_mount_program")]
    pub mount_program: PathBuf,

    /// Wait between volume enumerations while no disk is present (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            ignore_disks: default_ignore_disks(),
            mac_volumes_dir: default_mac_volumes_dir(),
            linux_device_dir: default_linux_device_dir(),
            linux_device_marker: default_linux_device_marker(),
            linux_mount_dir: default_linux_mount_dir(),
            mount_program: default_mount_program(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp / youtube-dl (auto-detected if None)
    #[serde(default)]
    pub downloader_path: Option<PathBuf>,

    /// Whether to search PATH for the downloader if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader_path: None,
            search_path: true,
        }
    }
}

/// Main configuration for mpme
///
/// Built once at startup and shared read-only (`Arc<Config>`) with the
/// batch runner and every export sink.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for the downloader
    #[serde(default)]
    pub retry: RetryConfig,

    /// Export destinations
    #[serde(default)]
    pub export: ExportConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Host family override (detected from the running OS if None)
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl Config {
    /// Load a JSON configuration file; missing fields take their defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "at least one attempt is required",
                "retry.max_attempts",
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff multiplier must be a finite number >= 1.0",
                "retry.backoff_multiplier",
            ));
        }
        let threshold = self.download.oversize_threshold_mb;
        if threshold.is_nan() || threshold <= 0.0 {
            return Err(Error::config(
                "threshold must be a positive number of megabytes",
                "download.oversize_threshold_mb",
            ));
        }
        if self.download.download_dir.as_os_str().is_empty() {
            return Err(Error::config(
                "download directory must not be empty",
                "download.download_dir",
            ));
        }
        Ok(())
    }

    /// Download directory
    pub fn download_dir(&self) -> &Path {
        &self.download.download_dir
    }

    /// Host family in effect: the override if set, otherwise the running OS
    pub fn platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("__downloads__")
}

fn default_true() -> bool {
    true
}

fn default_oversize_threshold_mb() -> f64 {
    20.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backup")
}

fn default_ignore_disks() -> BTreeSet<String> {
    BTreeSet::from(["Macintosh HD".to_string()])
}

fn default_mac_volumes_dir() -> PathBuf {
    PathBuf::from("/Volumes")
}

fn default_linux_device_dir() -> PathBuf {
    PathBuf::from("/dev")
}

fn default_linux_device_marker() -> String {
    "sd".to_string()
}

fn default_linux_mount_dir() -> PathBuf {
    PathBuf::from("/mnt")
}

fn default_mount_program() -> PathBuf {
    PathBuf::from("mount")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

// Durations are stored as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

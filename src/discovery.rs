//! Removable-disk discovery
//!
//! [`DiskDiscovery::poll`] enumerates visible volumes, drops the ignored
//! ones, and waits `poll_interval` between tries until a candidate shows up.
//! There is no timeout. The caller's [`CancellationToken`] is the only way
//! out, so an unattended run with no disk attached waits indefinitely.
//!
//! Choosing among candidates goes through a [`DiskSelector`]; unparseable or
//! out-of-range answers are logged and asked again.

use crate::config::ExportConfig;
use crate::error::{ExportError, SelectionError};
use crate::platform::Platform;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Enumerates currently visible volumes
pub trait VolumeSource: Send + Sync {
    /// Names of the volumes visible right now
    fn volumes(&self) -> Result<BTreeSet<String>, ExportError>;
}

/// Volumes listed as entries of a directory (`/Volumes`, `/dev`)
#[derive(Debug, Clone)]
pub struct DirectoryVolumes {
    dir: PathBuf,
    marker: Option<String>,
}

impl DirectoryVolumes {
    /// List every entry of `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            marker: None,
        }
    }

    /// Only keep entries whose name contains `marker`
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }
}

impl VolumeSource for DirectoryVolumes {
    fn volumes(&self) -> Result<BTreeSet<String>, ExportError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| ExportError::Enumerate {
            dir: self.dir.clone(),
            source,
        })?;

        let mut volumes = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| ExportError::Enumerate {
                dir: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.marker.as_deref().is_none_or(|m| name.contains(m)) {
                volumes.insert(name);
            }
        }
        Ok(volumes)
    }
}

/// Result of a discovery poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// At least one candidate volume, sorted by name
    Found(Vec<String>),
    /// The cancellation token fired first
    Cancelled,
}

/// Polls a [`VolumeSource`] until a non-ignored volume appears
pub struct DiskDiscovery {
    source: Box<dyn VolumeSource>,
    ignore: BTreeSet<String>,
    poll_interval: Duration,
}

impl DiskDiscovery {
    /// Create a discovery over any volume source
    pub fn new(
        source: Box<dyn VolumeSource>,
        ignore: BTreeSet<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            ignore,
            poll_interval,
        }
    }

    /// Discovery for a host family: `/dev` entries on Linux, `/Volumes` on macOS
    pub fn for_platform(platform: &Platform, config: &ExportConfig) -> Result<Self, ExportError> {
        let source = match platform {
            Platform::Linux => DirectoryVolumes::new(&config.linux_device_dir)
                .with_marker(&config.linux_device_marker),
            Platform::MacOs => DirectoryVolumes::new(&config.mac_volumes_dir),
            Platform::Unsupported(os) => return Err(ExportError::UnsupportedPlatform(os.clone())),
        };
        Ok(Self::new(
            Box::new(source),
            config.ignore_disks.clone(),
            config.poll_interval,
        ))
    }

    /// One enumeration with ignored volumes removed
    pub fn candidates(&self) -> Result<Vec<String>, ExportError> {
        Ok(self
            .source
            .volumes()?
            .difference(&self.ignore)
            .cloned()
            .collect())
    }

    /// Enumerate until a candidate appears or `cancel` fires
    pub async fn poll(&self, cancel: &CancellationToken) -> Result<Discovery, ExportError> {
        info!("searching for disks");
        loop {
            if cancel.is_cancelled() {
                return Ok(Discovery::Cancelled);
            }

            let candidates = self.candidates()?;
            if !candidates.is_empty() {
                debug!(?candidates, "found candidate disks");
                return Ok(Discovery::Found(candidates));
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("disk search cancelled");
                    return Ok(Discovery::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Poll, then ask the operator to pick one candidate
    pub async fn discover(
        &self,
        selector: &dyn DiskSelector,
        cancel: &CancellationToken,
    ) -> Result<String, ExportError> {
        match self.poll(cancel).await? {
            Discovery::Found(candidates) => choose(selector, &candidates).await,
            Discovery::Cancelled => Err(ExportError::Cancelled),
        }
    }
}

/// Operator prompt for choosing a disk
#[async_trait]
pub trait DiskSelector: Send + Sync {
    /// Show the numbered candidates and return the raw answer
    async fn prompt(&self, candidates: &[String]) -> Result<String, ExportError>;
}

/// Parse a 1-based answer into an index into `count` candidates
pub fn parse_selection(raw: &str, count: usize) -> Result<usize, SelectionError> {
    let trimmed = raw.trim();
    let choice: usize = trimmed
        .parse()
        .map_err(|_| SelectionError::NotANumber(trimmed.to_string()))?;
    if choice == 0 || choice > count {
        return Err(SelectionError::OutOfRange { choice, max: count });
    }
    Ok(choice - 1)
}

/// Ask until the operator gives a valid answer
pub async fn choose(
    selector: &dyn DiskSelector,
    candidates: &[String],
) -> Result<String, ExportError> {
    if candidates.is_empty() {
        return Err(ExportError::Prompt("no disks to choose from".into()));
    }

    loop {
        let raw = selector.prompt(candidates).await?;
        match parse_selection(&raw, candidates.len()) {
            Ok(index) => {
                if let Some(disk) = candidates.get(index) {
                    info!(disk = %disk, "disk selected");
                    return Ok(disk.clone());
                }
            }
            Err(e) => warn!(error = %e, "invalid disk selection, asking again"),
        }
    }
}

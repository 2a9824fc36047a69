//! Removable disk (MP3 player) export

use crate::config::Config;
use crate::discovery::{DiskDiscovery, DiskSelector};
use crate::error::ExportError;
use crate::platform::Platform;
use crate::types::ExportReport;
use crate::utils::copy_tree;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Copies downloads onto an operator-chosen removable disk
///
/// On Linux the chosen device is mounted at `export.linux_mount_dir` first.
/// On macOS the volume is already mounted under `export.mac_volumes_dir`.
/// Other hosts fail before any discovery starts.
#[derive(Clone)]
pub struct RemovableDiskSink {
    config: Arc<Config>,
    selector: Arc<dyn DiskSelector>,
    cancel: CancellationToken,
}

impl RemovableDiskSink {
    /// Create a sink; `cancel` aborts the wait for a disk
    pub fn new(
        config: Arc<Config>,
        selector: Arc<dyn DiskSelector>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            selector,
            cancel,
        }
    }

    /// Wait for a disk, let the operator pick it, and return its mounted path
    pub async fn resolve_mount(&self) -> Result<PathBuf, ExportError> {
        let platform = self.config.platform();
        if !platform.is_supported() {
            return Err(ExportError::UnsupportedPlatform(platform.to_string()));
        }

        let export = &self.config.export;
        let discovery = DiskDiscovery::for_platform(&platform, export)?;
        let disk = discovery
            .discover(self.selector.as_ref(), &self.cancel)
            .await?;

        match platform {
            Platform::Linux => {
                let device = export.linux_device_dir.join(&disk);
                self.mount(&device, &export.linux_mount_dir).await?;
                Ok(export.linux_mount_dir.clone())
            }
            Platform::MacOs => Ok(export.mac_volumes_dir.join(&disk)),
            Platform::Unsupported(os) => Err(ExportError::UnsupportedPlatform(os)),
        }
    }

    async fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), ExportError> {
        let program = &self.config.export.mount_program;
        info!(device = %device.display(), mount_point = %mount_point.display(), "mounting disk");

        let mount_error = |reason: String| ExportError::Mount {
            device: device.display().to_string(),
            mount_point: mount_point.to_path_buf(),
            reason,
        };

        let output = Command::new(program)
            .arg(device)
            .arg(mount_point)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| mount_error(format!("failed to run {}: {e}", program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(mount_error(format!("{}: {}", output.status, stderr.trim())));
        }
        Ok(())
    }

    pub(crate) async fn export(&self, source: &Path) -> Result<ExportReport, ExportError> {
        let destination = self.resolve_mount().await?;
        info!(destination = %destination.display(), "exporting songs to disk");

        let files_copied = copy_tree(source, &destination).await?;
        Ok(ExportReport {
            destination,
            files_copied,
        })
    }
}

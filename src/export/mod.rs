//! Export sinks
//!
//! A closed set of destinations for the download directory. Sinks are
//! offered one after another; a failing sink never affects the next one.

mod disk;
mod local;

pub use disk::RemovableDiskSink;
pub use local::LocalBackupSink;

use crate::config::Config;
use crate::discovery::DiskSelector;
use crate::error::ExportError;
use crate::types::ExportReport;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Destination for exported songs
#[derive(Clone)]
pub enum ExportSink {
    /// MP3 player or other removable disk
    RemovableDisk(RemovableDiskSink),
    /// Backup folder on the local filesystem
    LocalBackup(LocalBackupSink),
    /// Cloud storage, not implemented
    Cloud,
}

impl ExportSink {
    /// Every sink in the order they are offered: disk, local backup, cloud
    pub fn all(
        config: &Arc<Config>,
        selector: Arc<dyn DiskSelector>,
        cancel: CancellationToken,
    ) -> Vec<ExportSink> {
        vec![
            ExportSink::RemovableDisk(RemovableDiskSink::new(config.clone(), selector, cancel)),
            ExportSink::LocalBackup(LocalBackupSink::new(&config.export.backup_dir)),
            ExportSink::Cloud,
        ]
    }

    /// Name shown when offering the sink
    pub fn name(&self) -> &'static str {
        match self {
            ExportSink::RemovableDisk(_) => "MP3 Player (external disk)",
            ExportSink::LocalBackup(_) => "Local (backup)",
            ExportSink::Cloud => "Cloud",
        }
    }

    /// Merge-copy `source` into this sink's destination
    pub async fn export(&self, source: &Path) -> Result<ExportReport, ExportError> {
        tracing::info!(sink = self.name(), source = %source.display(), "exporting");
        match self {
            ExportSink::RemovableDisk(sink) => sink.export(source).await,
            ExportSink::LocalBackup(sink) => sink.export(source).await,
            ExportSink::Cloud => Err(ExportError::NotImplemented("cloud")),
        }
    }
}

//! Local backup folder

use crate::error::ExportError;
use crate::types::ExportReport;
use crate::utils::copy_tree;
use std::path::{Path, PathBuf};

/// Merge-copies downloads into a backup folder, creating it if absent
#[derive(Debug, Clone)]
pub struct LocalBackupSink {
    backup_dir: PathBuf,
}

impl LocalBackupSink {
    /// Back up into `backup_dir`
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    /// Destination folder
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub(crate) async fn export(&self, source: &Path) -> Result<ExportReport, ExportError> {
        let files_copied = copy_tree(source, &self.backup_dir).await?;
        Ok(ExportReport {
            destination: self.backup_dir.clone(),
            files_copied,
        })
    }
}

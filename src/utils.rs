//! Filesystem helpers shared by the batch runner and the export sinks

use crate::error::ExportError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Create the download directory, clearing it first when `reset` is set
pub async fn prepare_download_dir(dir: &Path, reset: bool) -> std::io::Result<()> {
    if reset && tokio::fs::try_exists(dir).await? {
        tracing::info!(dir = %dir.display(), "clearing download directory");
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await
}

/// Recursively merge the contents of `source` into `dest`
///
/// Directories are created as needed and files with the same relative path
/// are overwritten. Nothing already in `dest` is removed. Returns the number
/// of files copied. A destination inside `source` is rejected.
///
/// # Examples
///
/// ```no_run
/// use mpme::utils::copy_tree;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), mpme::error::ExportError> {
/// let copied = copy_tree(Path::new("__downloads__"), Path::new("/mnt")).await?;
/// println!("copied {copied} files");
/// # Ok(())
/// # }
/// ```
pub async fn copy_tree(source: &Path, dest: &Path) -> Result<usize, ExportError> {
    let source_owned = source.to_path_buf();
    let dest_owned = dest.to_path_buf();

    tokio::task::spawn_blocking(move || copy_tree_blocking(&source_owned, &dest_owned))
        .await
        .map_err(|e| copy_error(source, dest, format!("copy task failed: {e}")))?
}

fn copy_tree_blocking(source: &Path, dest: &Path) -> Result<usize, ExportError> {
    if !source.is_dir() {
        return Err(copy_error(source, dest, "source is not a directory"));
    }

    let source_abs = std::path::absolute(source).map_err(|e| copy_error(source, dest, e))?;
    let dest_abs = std::path::absolute(dest).map_err(|e| copy_error(source, dest, e))?;
    if dest_abs.starts_with(&source_abs) {
        return Err(copy_error(source, dest, "destination lies inside the source"));
    }

    std::fs::create_dir_all(dest).map_err(|e| copy_error(source, dest, e))?;

    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| copy_error(source, dest, e))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| copy_error(source, dest, e))?;
        let target: PathBuf = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| copy_error(source, dest, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| copy_error(source, dest, e))?;
            tracing::debug!(file = %relative.display(), "copied");
            copied += 1;
        }
    }

    Ok(copied)
}

fn copy_error(source: &Path, dest: &Path, reason: impl ToString) -> ExportError {
    ExportError::Copy {
        source_dir: source.to_path_buf(),
        dest_dir: dest.to_path_buf(),
        reason: reason.to_string(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_copy_tree_merges_into_existing_destination() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(source.path().join("A.mp3"), b"new a").unwrap();
        fs::create_dir(source.path().join("nested")).unwrap();
        fs::write(source.path().join("nested/C.mp3"), b"c").unwrap();
        fs::write(dest.path().join("A.mp3"), b"old a").unwrap();
        fs::write(dest.path().join("B.mp3"), b"b").unwrap();

        let copied = copy_tree(source.path(), dest.path()).await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read(dest.path().join("A.mp3")).unwrap(), b"new a");
        assert_eq!(fs::read(dest.path().join("B.mp3")).unwrap(), b"b");
        assert_eq!(fs::read(dest.path().join("nested/C.mp3")).unwrap(), b"c");
    }

    #[tokio::test]
    async fn test_copy_tree_creates_missing_destination() {
        let source = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        fs::write(source.path().join("A.mp3"), b"a").unwrap();
        let dest = root.path().join("backup/music");

        assert_eq!(copy_tree(source.path(), &dest).await.unwrap(), 1);
        assert!(dest.join("A.mp3").exists());
    }

    #[tokio::test]
    async fn test_copy_tree_missing_source_is_error() {
        let root = tempfile::tempdir().unwrap();
        let result = copy_tree(&root.path().join("absent"), &root.path().join("out")).await;

        assert!(matches!(result, Err(ExportError::Copy { .. })));
    }

    #[tokio::test]
    async fn test_copy_tree_rejects_destination_inside_source() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("A.mp3"), b"a").unwrap();
        let dest = source.path().join("backup");

        let result = copy_tree(source.path(), &dest).await;

        assert!(matches!(result, Err(ExportError::Copy { .. })));
        assert!(!dest.exists(), "nothing is written on rejection");

        let result = copy_tree(source.path(), source.path()).await;
        assert!(matches!(result, Err(ExportError::Copy { .. })));
    }

    #[tokio::test]
    async fn test_prepare_download_dir_reset_policy() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("__downloads__");

        prepare_download_dir(&dir, true).await.unwrap();
        fs::write(dir.join("old.mp3"), b"x").unwrap();

        prepare_download_dir(&dir, false).await.unwrap();
        assert!(dir.join("old.mp3").exists(), "reuse keeps earlier files");

        prepare_download_dir(&dir, true).await.unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join("old.mp3").exists(), "reset clears the directory");
    }
}

//! Downloader seam

use crate::error::FetchError;
use crate::song::{AUDIO_EXTENSION, Song};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Everything a downloader needs to fetch one song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Query for the provider's search step
    pub search_term: String,
    /// Output path with a `%(ext)s` placeholder for the downloader
    pub output_template: PathBuf,
    /// Where the converted audio must end up
    pub expected_path: PathBuf,
    /// Target audio format
    pub audio_format: &'static str,
}

impl FetchRequest {
    /// Build the request for `song` inside `download_dir`
    ///
    /// A literal `%` in the name is doubled so the downloader does not read
    /// it as template syntax.
    pub fn for_song(song: &Song, download_dir: &Path) -> Self {
        let stem = song.full_name().replace('%', "%%");
        Self {
            search_term: song.search_term(),
            output_template: download_dir.join(format!("{stem}.%(ext)s")),
            expected_path: song.file_path(download_dir),
            audio_format: AUDIO_EXTENSION,
        }
    }
}

/// Trait for the external search-and-download step
///
/// Implementations are treated as slow and flaky; callers wrap them in
/// bounded retry. A successful return must leave an audio file at
/// `request.expected_path`.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Search, download and convert one song
    async fn download(&self, request: &FetchRequest) -> Result<(), FetchError>;

    /// Refresh the downloader itself before a run
    async fn update(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

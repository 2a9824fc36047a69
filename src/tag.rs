//! ID3 tagging of downloaded audio
//!
//! Tagging runs once, after a successful fetch. A failure is reported and
//! the download is kept.

use crate::error::TagError;
use async_trait::async_trait;
use id3::{ErrorKind, Tag, TagLike, Version};
use std::path::{Path, PathBuf};

/// Trait for writing metadata into an audio file
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Write artist and title into the file at `path`
    async fn tag(&self, path: &Path, artist: &str, title: &str) -> Result<(), TagError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Tagger using the `id3` crate
///
/// Sets title and artist, and sets album to the artist as well since most
/// players group songs by album. Files without a tag get a fresh ID3v2.4 tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3Tagger;

impl Id3Tagger {
    /// Create a new tagger
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tagger for Id3Tagger {
    async fn tag(&self, path: &Path, artist: &str, title: &str) -> Result<(), TagError> {
        let owned: PathBuf = path.to_path_buf();
        let artist = artist.to_string();
        let title = title.to_string();

        tokio::task::spawn_blocking(move || write_tags(&owned, &artist, &title))
            .await
            .map_err(|e| TagError::Write {
                path: path.to_path_buf(),
                reason: format!("tagging task failed: {e}"),
            })?
    }

    fn name(&self) -> &'static str {
        "id3"
    }
}

fn write_tags(path: &Path, artist: &str, title: &str) -> Result<(), TagError> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Tag::new(),
        Err(e) => {
            return Err(TagError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    tag.set_title(title);
    tag.set_artist(artist);
    tag.set_album(artist);

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| TagError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    tracing::debug!(path = %path.display(), artist, title, "wrote tags");
    Ok(())
}

/// Read the album tag of an audio file
///
/// Returns `None` when the file has no tag or no album frame.
pub fn read_album(path: &Path) -> Result<Option<String>, TagError> {
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(tag.album().map(str::to_string)),
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Ok(None),
        Err(e) => Err(TagError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tag_untagged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Song - Artist.mp3");
        std::fs::write(&path, b"").unwrap();

        Id3Tagger::new().tag(&path, "Artist", "Song").await.unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Song"));
        assert_eq!(tag.artist(), Some("Artist"));
        assert_eq!(tag.album(), Some("Artist"));
        assert_eq!(read_album(&path).unwrap().as_deref(), Some("Artist"));
    }

    #[tokio::test]
    async fn test_retag_overwrites_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"").unwrap();
        let tagger = Id3Tagger::new();

        tagger.tag(&path, "Old", "Old Title").await.unwrap();
        tagger.tag(&path, "New", "New Title").await.unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("New Title"));
        assert_eq!(tag.album(), Some("New"));
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.mp3");

        assert!(Id3Tagger::new().tag(&path, "a", "b").await.is_err());
    }

    #[test]
    fn test_read_album_of_untagged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.mp3");
        std::fs::write(&path, b"not really audio").unwrap();

        assert_eq!(read_album(&path).unwrap(), None);
    }
}

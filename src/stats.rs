//! Per-artist statistics for a folder of downloaded songs

use crate::error::{Error, Result};
use crate::song::{AUDIO_EXTENSION, Song};
use crate::tag::read_album;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Default number of artists shown
pub const DEFAULT_TOP_ARTISTS: usize = 50;

/// Song count for one artist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCount {
    /// Artist name
    pub artist: String,
    /// Number of songs by the artist
    pub songs: usize,
}

/// Song counts per artist, most prolific first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryStats {
    /// Number of songs counted
    pub total: usize,
    /// Counts sorted by songs descending, then artist name
    pub artists: Vec<ArtistCount>,
}

impl LibraryStats {
    /// Count songs per artist
    pub fn from_songs(songs: &[Song]) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for song in songs {
            *counts.entry(song.artist.as_str()).or_default() += 1;
        }

        let mut artists: Vec<ArtistCount> = counts
            .into_iter()
            .map(|(artist, songs)| ArtistCount {
                artist: artist.to_string(),
                songs,
            })
            .collect();
        artists.sort_by(|a, b| b.songs.cmp(&a.songs).then_with(|| a.artist.cmp(&b.artist)));

        Self {
            total: songs.len(),
            artists,
        }
    }

    /// The `n` artists with the most songs
    pub fn top(&self, n: usize) -> &[ArtistCount] {
        &self.artists[..n.min(self.artists.len())]
    }

    /// Printable view limited to the top `n` artists
    pub fn display_top(&self, n: usize) -> TopArtists<'_> {
        TopArtists { stats: self, n }
    }
}

/// Display adapter returned by [`LibraryStats::display_top`]
pub struct TopArtists<'a> {
    stats: &'a LibraryStats,
    n: usize,
}

impl fmt::Display for TopArtists<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total: {}", self.stats.total)?;
        writeln!(f)?;
        for count in self.stats.top(self.n) {
            writeln!(f, "{}: {} songs", count.artist, count.songs)?;
        }
        Ok(())
    }
}

/// Rebuild songs from the audio files directly inside `dir`
///
/// The artist comes from the album tag when the file has one, since that is
/// what tagging writes it into. Files whose names cannot be turned back into
/// a song are skipped with a warning.
pub async fn load_songs(dir: &Path) -> Result<Vec<Song>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || load_songs_blocking(&dir))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn load_songs_blocking(dir: &Path) -> Result<Vec<Song>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let is_audio = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(AUDIO_EXTENSION));
        if entry.file_type().is_file() && is_audio {
            files.push(entry.into_path());
        }
    }

    let mut songs = Vec::with_capacity(files.len());
    for path in files {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let song = match Song::from_file_name(&file_name) {
            Ok(song) => song,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                continue;
            }
        };

        let song = match read_album(&path) {
            Ok(Some(album)) if !album.trim().is_empty() => Song::new(song.name, album),
            Ok(_) => song,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable tags, using file name");
                song
            }
        };
        songs.push(song);
    }

    Ok(songs)
}

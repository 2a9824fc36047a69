//! Core types: progress events and batch results

use crate::song::Song;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Progress event published by the batch runner
///
/// Song fields carry [`Song::full_name`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Batch started
    BatchStarted {
        /// Number of songs in the list
        total: usize,
        /// 0-based offset the run resumes from
        start_index: usize,
    },

    /// A song is about to be fetched
    Fetching {
        /// 1-based position in the full list
        index: usize,
        /// Number of songs in the list
        total: usize,
        /// Song being fetched
        song: String,
        /// Estimated seconds left for the remaining songs (None until one completes)
        eta_seconds: Option<f64>,
    },

    /// One download attempt failed
    AttemptFailed {
        /// Song being fetched
        song: String,
        /// 1-based attempt number
        attempt: u32,
        /// Attempts allowed
        max_attempts: u32,
        /// Error message
        error: String,
    },

    /// Song downloaded
    Fetched {
        /// Song that was fetched
        song: String,
        /// Attempts used
        attempts: u32,
    },

    /// Song could not be downloaded within the allowed attempts
    FetchFailed {
        /// Song that failed
        song: String,
        /// Attempts used
        attempts: u32,
    },

    /// Tags written
    Tagged {
        /// Song that was tagged
        song: String,
    },

    /// Tagging failed (the download is kept)
    TagFailed {
        /// Song whose tagging failed
        song: String,
        /// Error message
        error: String,
    },

    /// File exceeds the size threshold
    Oversized {
        /// Song whose file is too large
        song: String,
        /// File size in megabytes
        size_mb: f64,
    },

    /// Batch finished
    BatchFinished {
        /// Songs fetched
        succeeded: usize,
        /// Songs that failed
        failed: usize,
        /// Songs flagged as oversized
        oversized: usize,
    },
}

/// Terminal state of one song in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Downloaded (tagging may still have failed)
    Succeeded,
    /// Not downloaded after all attempts
    Failed,
}

/// What happened to one song
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongOutcome {
    /// The song
    pub song: Song,
    /// Terminal state
    pub status: Status,
    /// Download attempts made
    pub attempts: u32,
    /// Whether tags were written (None when tagging did not run)
    pub tagged: Option<bool>,
    /// File size in megabytes, negative when absent
    pub size_mb: f64,
    /// Whether the file exceeded the size threshold
    pub oversized: bool,
}

/// Partitioned result of one batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Number of songs in the list
    pub total: usize,
    /// 0-based offset the run started from
    pub start_index: usize,
    /// One entry per processed song, in list order
    pub outcomes: Vec<SongOutcome>,
    /// Songs that could not be downloaded
    pub failed: Vec<Song>,
    /// Songs whose file exceeds the size threshold, regardless of status
    pub oversized: Vec<Song>,
    /// Final moving average in seconds per song
    pub average_seconds: f64,
}

impl BatchReport {
    /// Songs that were downloaded
    pub fn succeeded(&self) -> impl Iterator<Item = &Song> {
        self.outcomes
            .iter()
            .filter(|o| o.status == Status::Succeeded)
            .map(|o| &o.song)
    }

    /// Number of songs downloaded
    pub fn succeeded_count(&self) -> usize {
        self.succeeded().count()
    }

    /// Outcome for a song, if it was processed
    pub fn outcome(&self, song: &Song) -> Option<&SongOutcome> {
        self.outcomes.iter().find(|o| &o.song == song)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fetched {} of {} songs ({} failed, {} oversized)",
            self.succeeded_count(),
            self.outcomes.len(),
            self.failed.len(),
            self.oversized.len()
        )?;
        if !self.failed.is_empty() {
            writeln!(f, "Failed:")?;
            for song in &self.failed {
                writeln!(f, "  {}", song.full_name())?;
            }
        }
        if !self.oversized.is_empty() {
            writeln!(f, "Oversized:")?;
            for song in &self.oversized {
                writeln!(f, "  {}", song.full_name())?;
            }
        }
        Ok(())
    }
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Directory the files were merged into
    pub destination: PathBuf,
    /// Number of files copied
    pub files_copied: usize,
}

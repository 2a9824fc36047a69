//! Error types for mpme
//!
//! This module provides the error taxonomy for the library:
//! - [`ParseError`] for malformed song-list input
//! - [`FetchError`] for downloader failures (recovered by retry, then reported)
//! - [`TagError`] for metadata writes after a successful fetch
//! - [`ExportError`] for sink failures, including unsupported hosts and the cloud stub
//! - [`SelectionError`] for operator input that is re-prompted, never propagated

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mpme operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mpme
///
/// Per-song failures inside a batch never surface as this type; they are
/// recorded in the batch report instead. `Error` is what aborts a whole
/// operation (loading a list, preparing a run, an export).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// Song-list parsing failed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Download failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Tagging failed
    #[error("tag error: {0}")]
    Tag(#[from] TagError),

    /// Export to a sink failed
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Resume offset lies past the end of the song list
    #[error("start index {start} is out of range for {total} songs")]
    InvalidStartIndex {
        /// Requested 0-based start offset
        start: usize,
        /// Number of songs in the list
        total: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Song-list parse errors
///
/// A malformed line aborts the load of its source; partial song lists are
/// never returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Line did not split into two or three fields
    #[error("expected 2 or 3 '~'-separated fields, found {fields} in {line:?}")]
    InvalidFormat {
        /// The offending line after cleaning
        line: String,
        /// Number of fields the line split into
        fields: usize,
    },

    /// A required field was empty
    #[error("empty {field} in {line:?}")]
    EmptyField {
        /// The offending line after cleaning
        line: String,
        /// Which field was empty ("name" or "artist")
        field: &'static str,
    },

    /// File name could not be turned back into a song
    #[error("cannot reconstruct a song from file name {0:?}")]
    InvalidFileName(String),

    /// Grouped-by-artist document was not an object of string arrays
    #[error("invalid song document: {0}")]
    InvalidDocument(String),
}

/// Download errors reported by a [`Downloader`](crate::fetch::Downloader)
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Downloader binary could not be started
    #[error("failed to run {tool}: {reason}")]
    Spawn {
        /// Program that was launched
        tool: String,
        /// OS-level reason
        reason: String,
    },

    /// Downloader ran but reported failure
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        /// Program that was launched
        tool: String,
        /// Exit status as reported by the OS
        status: String,
        /// Trimmed standard error output
        stderr: String,
    },

    /// Downloader reported success but the expected file is missing
    #[error("expected output {} was not produced", .path.display())]
    MissingOutput {
        /// Path the audio file should have been written to
        path: PathBuf,
    },

    /// No downloader binary is available
    #[error("no downloader found (tried {0})")]
    NotFound(String),
}

/// Tagging errors (reported, never retried)
#[derive(Debug, Error)]
pub enum TagError {
    /// Existing tag could not be read
    #[error("failed to read tags from {}: {reason}", .path.display())]
    Read {
        /// Audio file path
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Tag could not be written
    #[error("failed to write tags to {}: {reason}", .path.display())]
    Write {
        /// Audio file path
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },
}

/// Export sink errors
///
/// Each error is fatal for the sink that raised it only; the caller moves on
/// to the next sink.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Host family has no removable-disk support
    #[error("unsupported platform for disk export: {0}")]
    UnsupportedPlatform(String),

    /// Sink exists but has no implementation yet
    #[error("{0} export is not implemented")]
    NotImplemented(&'static str),

    /// Operator cancelled while waiting for a disk
    #[error("disk discovery cancelled")]
    Cancelled,

    /// Volume enumeration failed
    #[error("failed to list volumes in {}: {source}", .dir.display())]
    Enumerate {
        /// Directory that was listed
        dir: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Mount command failed
    #[error("failed to mount {device} at {}: {reason}", .mount_point.display())]
    Mount {
        /// Device that was mounted
        device: String,
        /// Target mount point
        mount_point: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Recursive copy failed
    #[error("failed to copy {} to {}: {reason}", .source_dir.display(), .dest_dir.display())]
    Copy {
        /// Directory being exported
        source_dir: PathBuf,
        /// Destination directory
        dest_dir: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Operator prompt failed (e.g. stdin closed)
    #[error("operator prompt failed: {0}")]
    Prompt(String),
}

/// Invalid operator selection
///
/// Always recovered locally by asking again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Input was not a number
    #[error("{0:?} is not a number")]
    NotANumber(String),

    /// Number outside `1..=max`
    #[error("{choice} is not between 1 and {max}")]
    OutOfRange {
        /// Parsed choice
        choice: usize,
        /// Number of options offered
        max: usize,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_converts_into_error() {
        let err: Error = ParseError::InvalidFormat {
            line: "a~b~c~d".into(),
            fields: 4,
        }
        .into();

        assert!(matches!(err, Error::Parse(ParseError::InvalidFormat { fields: 4, .. })));
        assert!(err.to_string().contains("found 4"));
    }

    #[test]
    fn test_config_helper_sets_key() {
        let err = Error::config("must be at least 1", "retry.max_attempts");
        match err {
            Error::Config { message, key } => {
                assert_eq!(message, "must be at least 1");
                assert_eq!(key.as_deref(), Some("retry.max_attempts"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unsupported_platform_message_names_the_host() {
        let err = ExportError::UnsupportedPlatform("windows".into());
        assert_eq!(
            err.to_string(),
            "unsupported platform for disk export: windows"
        );
    }

    #[test]
    fn not_implemented_is_distinct_from_unsupported() {
        let cloud = Error::from(ExportError::NotImplemented("cloud"));
        assert!(matches!(
            cloud,
            Error::Export(ExportError::NotImplemented("cloud"))
        ));
        assert_eq!(cloud.to_string(), "export error: cloud export is not implemented");
    }
}

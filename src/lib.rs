//! # mpme
//!
//! Batch music fetcher: turn a list of songs into tagged MP3 files and copy
//! them onto an MP3 player or a backup folder.
//!
//! ## Design Philosophy
//!
//! mpme is designed to be:
//! - **Sequential** - One download at a time, so the provider is never hammered
//! - **Forgiving** - A failed song is retried, then reported; the batch carries on
//! - **Resumable** - A start index skips songs handled by an earlier run
//! - **Event-driven** - Front ends subscribe to progress events instead of parsing logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use mpme::{BatchRunner, Config, ExportSink, song_list};
//! use mpme::export::LocalBackupSink;
//! use mpme::fetch::YtDlpDownloader;
//! use mpme::tag::Id3Tagger;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::default());
//!     let songs = song_list::load_file(Path::new("songs.txt")).await?;
//!
//!     let downloader = Arc::new(YtDlpDownloader::from_config(&config.tools)?);
//!     let runner = BatchRunner::new(config.clone(), downloader)
//!         .with_tagger(Arc::new(Id3Tagger::new()));
//!
//!     // Subscribe to events
//!     let mut events = runner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     runner.prepare().await?;
//!     let report = runner.fetch_all(&songs, 0).await?;
//!     println!("{report}");
//!
//!     let backup = ExportSink::LocalBackup(LocalBackupSink::new(&config.export.backup_dir));
//!     backup.export(config.download_dir()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Removable-disk discovery and operator selection
pub mod discovery;
/// Error types
pub mod error;
/// Export sinks
pub mod export;
/// Per-song download with bounded retry
pub mod fetch;
/// Host family detection
pub mod platform;
/// Retry logic with exponential backoff
pub mod retry;
/// Batch orchestration
pub mod runner;
/// Song entity and name normalization
pub mod song;
/// Song-list loading
pub mod song_list;
/// Per-artist library statistics
pub mod stats;
/// ID3 tagging
pub mod tag;
/// Core types and events
pub mod types;
/// Filesystem helpers
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use discovery::{DiskDiscovery, DiskSelector, Discovery};
pub use error::{Error, ExportError, FetchError, ParseError, Result, SelectionError, TagError};
pub use export::ExportSink;
pub use fetch::{Downloader, FetchAttempt};
pub use platform::Platform;
pub use runner::{Accumulator, BatchRunner};
pub use song::Song;
pub use tag::Tagger;
pub use types::{BatchReport, Event, ExportReport, SongOutcome, Status};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal
///
/// Pair with [`DiskDiscovery::poll`], which otherwise waits for a disk
/// forever.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let cancel = CancellationToken::new();
/// tokio::spawn(mpme::cancel_on_signal(cancel.clone()));
/// # }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    wait_for_signal().await;
    token.cancel();
}

/// Wait for a termination signal
///
/// - **Unix:** SIGTERM or SIGINT, with fallbacks if registration fails.
/// - **Other hosts:** Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

/// Wait for a termination signal (Ctrl+C)
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}

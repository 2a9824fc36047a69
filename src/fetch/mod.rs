//! Per-song download with bounded retry
//!
//! [`FetchAttempt`] drives a [`Downloader`] for one song. Failures are
//! retried up to the configured attempt count and then reported in the
//! returned outcome; they never propagate as errors.

mod traits;
mod ytdlp;

pub use traits::{Downloader, FetchRequest};
pub use ytdlp::YtDlpDownloader;

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::retry::{Attempted, with_retry};
use crate::song::Song;
use crate::types::Event;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Outcome of fetching one song: the audio path on success
pub type FetchOutcome = Attempted<PathBuf, FetchError>;

/// Bounded-retry download of one song
pub struct FetchAttempt<'a> {
    downloader: &'a dyn Downloader,
    retry: &'a RetryConfig,
    download_dir: &'a Path,
    event_tx: Option<&'a broadcast::Sender<Event>>,
}

impl<'a> FetchAttempt<'a> {
    /// Create an attempt writing into `download_dir`
    pub fn new(
        downloader: &'a dyn Downloader,
        retry: &'a RetryConfig,
        download_dir: &'a Path,
    ) -> Self {
        Self {
            downloader,
            retry,
            download_dir,
            event_tx: None,
        }
    }

    /// Publish an [`Event::AttemptFailed`] for every failed attempt
    pub fn with_events(mut self, event_tx: &'a broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Fetch `song`, retrying until it succeeds or attempts run out
    ///
    /// On success the audio file exists at [`Song::file_path`].
    pub async fn run(&self, song: &Song) -> FetchOutcome {
        let request = FetchRequest::for_song(song, self.download_dir);
        let song_name = song.full_name();
        let max_attempts = self.retry.max_attempts.max(1);

        tracing::info!(song = %song_name, term = %request.search_term, "fetching");

        let outcome = with_retry(self.retry, |attempt| {
            let request = &request;
            let song_name = &song_name;
            async move {
                let result = self.try_once(request).await;
                if let Err(e) = &result {
                    if let Some(tx) = self.event_tx {
                        tx.send(Event::AttemptFailed {
                            song: song_name.clone(),
                            attempt,
                            max_attempts,
                            error: e.to_string(),
                        })
                        .ok();
                    }
                }
                result
            }
        })
        .await;

        if outcome.result.is_err() {
            tracing::warn!(song = %song_name, attempts = outcome.attempts, "unable to fetch song, skipping");
        }
        outcome
    }

    async fn try_once(&self, request: &FetchRequest) -> Result<PathBuf, FetchError> {
        self.downloader.download(request).await?;

        let produced = tokio::fs::try_exists(&request.expected_path)
            .await
            .unwrap_or(false);
        if !produced {
            return Err(FetchError::MissingOutput {
                path: request.expected_path.clone(),
            });
        }
        Ok(request.expected_path.clone())
    }
}

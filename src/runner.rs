//! Batch orchestration over a song list
//!
//! [`BatchRunner::fetch_all`] processes songs strictly one at a time:
//! fetch with bounded retry, tag on success, then check the file size.
//! Each song ends up succeeded or failed; oversized is a separate flag.
//! Timing goes through an [`Accumulator`] value that produces the ETA.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{Downloader, FetchAttempt};
use crate::song::Song;
use crate::tag::Tagger;
use crate::types::{BatchReport, Event, SongOutcome, Status};
use crate::utils::prepare_download_dir;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Running timing totals for a batch
///
/// Every processed song counts, whether it succeeded or failed, so a run
/// of fast failures pulls the average down instead of stalling the ETA.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    /// Seconds spent on all processed songs
    pub total_seconds: f64,
    /// Number of processed songs
    pub completed: usize,
    /// `total_seconds / completed`, rounded to two decimals
    pub average_seconds: f64,
}

impl Accumulator {
    /// Fold one processed song's duration into the totals
    pub fn record(self, elapsed: Duration) -> Self {
        let total_seconds = self.total_seconds + elapsed.as_secs_f64();
        let completed = self.completed + 1;
        Self {
            total_seconds,
            completed,
            average_seconds: round2(total_seconds / completed as f64),
        }
    }

    /// Estimated seconds for `remaining` songs, or None before the first completes
    pub fn eta_seconds(&self, remaining: usize) -> Option<f64> {
        (self.completed > 0).then(|| self.average_seconds * remaining as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render an ETA as `HH:MM:SS`, or `N/A` when unknown
pub fn format_eta(eta_seconds: Option<f64>) -> String {
    match eta_seconds {
        Some(secs) if secs.is_finite() && secs >= 0.0 => {
            let secs = secs.round() as u64;
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
        _ => "N/A".to_string(),
    }
}

/// Sequential fetch-tag-check loop over a song list
///
/// # Examples
///
/// ```no_run
/// use mpme::{BatchRunner, Config, Song};
/// use mpme::fetch::YtDlpDownloader;
/// use mpme::tag::Id3Tagger;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> mpme::Result<()> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(YtDlpDownloader::from_config(&config.tools)?);
/// let runner = BatchRunner::new(config, downloader).with_tagger(Arc::new(Id3Tagger::new()));
///
/// runner.prepare().await?;
/// let report = runner
///     .fetch_all(&[Song::new("Waterloo", "ABBA")], 0)
///     .await?;
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
pub struct BatchRunner {
    config: Arc<Config>,
    downloader: Arc<dyn Downloader>,
    tagger: Option<Arc<dyn Tagger>>,
    event_tx: broadcast::Sender<Event>,
}

impl BatchRunner {
    /// Create a runner; tagging stays off until a tagger is attached
    pub fn new(config: Arc<Config>, downloader: Arc<dyn Downloader>) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config,
            downloader,
            tagger: None,
            event_tx,
        }
    }

    /// Attach a tagger, used when `download.tag_songs` is set
    pub fn with_tagger(mut self, tagger: Arc<dyn Tagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ready the download directory and refresh the downloader
    ///
    /// A failed downloader update is logged and the run continues with the
    /// installed version.
    pub async fn prepare(&self) -> Result<()> {
        prepare_download_dir(self.config.download_dir(), self.config.download.reset_download_dir)
            .await?;

        if self.config.download.update_downloader {
            info!(downloader = self.downloader.name(), "updating downloader");
            if let Err(e) = self.downloader.update().await {
                warn!(downloader = self.downloader.name(), error = %e, "downloader update failed, continuing");
            }
        }
        Ok(())
    }

    /// Fetch every song from `start_index` onward
    ///
    /// Per-song failures never abort the batch. The only error is a
    /// `start_index` past the end of the list.
    pub async fn fetch_all(&self, songs: &[Song], start_index: usize) -> Result<BatchReport> {
        let total = songs.len();
        if start_index > total {
            return Err(Error::InvalidStartIndex {
                start: start_index,
                total,
            });
        }

        let download_dir = self.config.download_dir();
        let threshold = self.config.download.oversize_threshold_mb;
        let mut report = BatchReport {
            total,
            start_index,
            ..Default::default()
        };
        let mut accumulator = Accumulator::default();

        info!(total, start_index, "starting batch");
        self.emit(Event::BatchStarted { total, start_index });

        for (i, song) in songs.iter().enumerate().skip(start_index) {
            let name = song.full_name();
            let eta_seconds = accumulator.eta_seconds(total - i);
            info!(
                index = i + 1,
                total,
                song = %name,
                eta = %format_eta(eta_seconds),
                "processing"
            );
            self.emit(Event::Fetching {
                index: i + 1,
                total,
                song: name.clone(),
                eta_seconds,
            });

            let started = Instant::now();
            let outcome = FetchAttempt::new(self.downloader.as_ref(), &self.config.retry, download_dir)
                .with_events(&self.event_tx)
                .run(song)
                .await;

            let (status, tagged) = match &outcome.result {
                Ok(path) => {
                    self.emit(Event::Fetched {
                        song: name.clone(),
                        attempts: outcome.attempts,
                    });
                    (Status::Succeeded, self.tag(song, path).await)
                }
                Err(_) => {
                    self.emit(Event::FetchFailed {
                        song: name.clone(),
                        attempts: outcome.attempts,
                    });
                    report.failed.push(song.clone());
                    (Status::Failed, None)
                }
            };

            accumulator = accumulator.record(started.elapsed());

            let size_mb = song.size_mb(download_dir);
            let oversized = size_mb > threshold;
            if oversized {
                warn!(song = %name, size_mb, threshold, "file exceeds size threshold");
                self.emit(Event::Oversized {
                    song: name.clone(),
                    size_mb,
                });
                report.oversized.push(song.clone());
            }

            report.outcomes.push(SongOutcome {
                song: song.clone(),
                status,
                attempts: outcome.attempts,
                tagged,
                size_mb,
                oversized,
            });
        }

        report.average_seconds = accumulator.average_seconds;

        info!(
            succeeded = report.succeeded_count(),
            failed = report.failed.len(),
            oversized = report.oversized.len(),
            average_seconds = report.average_seconds,
            "batch finished"
        );
        self.emit(Event::BatchFinished {
            succeeded: report.succeeded_count(),
            failed: report.failed.len(),
            oversized: report.oversized.len(),
        });

        Ok(report)
    }

    /// Tag a fetched song; None when tagging is disabled
    async fn tag(&self, song: &Song, path: &Path) -> Option<bool> {
        let tagger = self.tagger.as_ref().filter(|_| self.config.download.tag_songs)?;
        let name = song.full_name();

        match tagger.tag(path, &song.artist, &song.name).await {
            Ok(()) => {
                self.emit(Event::Tagged { song: name });
                Some(true)
            }
            Err(e) => {
                warn!(song = %name, tagger = tagger.name(), error = %e, "tagging failed, keeping download");
                self.emit(Event::TagFailed {
                    song: name,
                    error: e.to_string(),
                });
                Some(false)
            }
        }
    }

    fn emit(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::{FetchError, TagError};
    use crate::fetch::FetchRequest;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fails a song's first `n` calls (by search term), then writes `bytes` bytes
    struct TestDownloader {
        failures: HashMap<String, u32>,
        calls: Mutex<HashMap<String, u32>>,
        bytes: usize,
        delay: Duration,
    }

    impl TestDownloader {
        fn new() -> Self {
            Self {
                failures: HashMap::new(),
                calls: Mutex::new(HashMap::new()),
                bytes: 16,
                delay: Duration::ZERO,
            }
        }

        fn failing(mut self, song: &Song, failures: u32) -> Self {
            self.failures.insert(song.search_term(), failures);
            self
        }
    }

    #[async_trait]
    impl Downloader for TestDownloader {
        async fn download(&self, request: &FetchRequest) -> std::result::Result<(), FetchError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(request.search_term.clone()).or_insert(0);
                *count += 1;
                *count
            };
            if call <= self.failures.get(&request.search_term).copied().unwrap_or(0) {
                return Err(FetchError::ToolFailed {
                    tool: "test".into(),
                    status: "exit status: 1".into(),
                    stderr: "no results".into(),
                });
            }
            tokio::fs::write(&request.expected_path, vec![0u8; self.bytes])
                .await
                .unwrap();
            Ok(())
        }

        fn name(&self) -> &'static str {
            "test"
        }
    }

    struct FailingTagger;

    #[async_trait]
    impl Tagger for FailingTagger {
        async fn tag(&self, path: &Path, _: &str, _: &str) -> std::result::Result<(), TagError> {
            Err(TagError::Write {
                path: path.to_path_buf(),
                reason: "read-only".into(),
            })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.download.download_dir = dir.to_path_buf();
        config.download.update_downloader = false;
        config.retry = RetryConfig::immediate(3);
        config
    }

    fn songs() -> Vec<Song> {
        vec![
            Song::new("one", "artist"),
            Song::new("two", "artist"),
            Song::new("three", "artist"),
        ]
    }

    #[test]
    fn test_moving_average_counts_every_item() {
        let durations = [1.0, 2.0, 4.0];
        let acc = durations
            .iter()
            .fold(Accumulator::default(), |acc, d| acc.record(Duration::from_secs_f64(*d)));

        assert_eq!(acc.completed, 3);
        assert_eq!(acc.total_seconds, 7.0);
        assert_eq!(acc.average_seconds, 2.33);
    }

    #[test]
    fn test_eta_unknown_until_first_completion() {
        let acc = Accumulator::default();
        assert_eq!(acc.eta_seconds(5), None);
        assert_eq!(format_eta(acc.eta_seconds(5)), "N/A");

        let acc = acc.record(Duration::from_secs(90));
        assert_eq!(acc.eta_seconds(3), Some(270.0));
        assert_eq!(format_eta(acc.eta_seconds(3)), "00:04:30");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Some(0.0)), "00:00:00");
        assert_eq!(format_eta(Some(3661.4)), "01:01:01");
        assert_eq!(format_eta(Some(f64::NAN)), "N/A");
        assert_eq!(format_eta(None), "N/A");
    }

    #[tokio::test]
    async fn test_every_song_ends_in_one_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let list = songs();
        let downloader = TestDownloader::new()
            .failing(&list[0], 2)
            .failing(&list[1], 3);
        let runner = BatchRunner::new(Arc::new(test_config(dir.path())), Arc::new(downloader));

        let report = runner.fetch_all(&list, 0).await.unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed, vec![list[1].clone()]);
        assert_eq!(report.succeeded_count(), 2);
        assert_eq!(report.outcome(&list[0]).unwrap().attempts, 3);
        assert_eq!(report.outcome(&list[1]).unwrap().attempts, 3);
        assert_eq!(report.outcome(&list[2]).unwrap().attempts, 1);
        assert!(report.oversized.is_empty());
    }

    #[tokio::test]
    async fn test_start_index_skips_earlier_songs() {
        let dir = tempfile::tempdir().unwrap();
        let list = songs();
        let runner = BatchRunner::new(
            Arc::new(test_config(dir.path())),
            Arc::new(TestDownloader::new()),
        );

        let report = runner.fetch_all(&list, 2).await.unwrap();

        assert_eq!(report.start_index, 2);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].song, list[2]);
        assert!(!list[0].file_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_start_index_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let list = songs();
        let runner = BatchRunner::new(
            Arc::new(test_config(dir.path())),
            Arc::new(TestDownloader::new()),
        );

        let empty = runner.fetch_all(&list, 3).await.unwrap();
        assert!(empty.outcomes.is_empty());

        assert!(matches!(
            runner.fetch_all(&list, 4).await,
            Err(Error::InvalidStartIndex { start: 4, total: 3 })
        ));
    }

    #[tokio::test]
    async fn test_oversized_is_independent_of_status() {
        let dir = tempfile::tempdir().unwrap();
        let list = songs();
        let mut config = test_config(dir.path());
        config.download.oversize_threshold_mb = 0.001;
        // left over from an earlier run, larger than the threshold
        std::fs::write(list[1].file_path(dir.path()), vec![0u8; 4096]).unwrap();

        let mut downloader = TestDownloader::new().failing(&list[1], 10);
        downloader.bytes = 4096;
        let runner = BatchRunner::new(Arc::new(config), Arc::new(downloader));

        let report = runner.fetch_all(&list[..2], 0).await.unwrap();

        assert_eq!(report.failed, vec![list[1].clone()]);
        assert_eq!(report.oversized, vec![list[0].clone(), list[1].clone()]);
        assert!(report.outcome(&list[1]).unwrap().oversized);
    }

    #[tokio::test]
    async fn test_failed_items_move_the_average() {
        let dir = tempfile::tempdir().unwrap();
        let list = songs();
        let mut downloader = TestDownloader::new().failing(&list[0], 10);
        downloader.delay = Duration::from_millis(20);
        let mut config = test_config(dir.path());
        config.retry = RetryConfig::immediate(1);
        let runner = BatchRunner::new(Arc::new(config), Arc::new(downloader));

        let report = runner.fetch_all(&list[..1], 0).await.unwrap();

        assert_eq!(report.succeeded_count(), 0);
        assert!(report.average_seconds > 0.0);
    }

    #[tokio::test]
    async fn test_tag_failure_keeps_download() {
        let dir = tempfile::tempdir().unwrap();
        let list = songs();
        let runner = BatchRunner::new(
            Arc::new(test_config(dir.path())),
            Arc::new(TestDownloader::new()),
        )
        .with_tagger(Arc::new(FailingTagger));
        let mut events = runner.subscribe();

        let report = runner.fetch_all(&list[..1], 0).await.unwrap();

        let outcome = report.outcome(&list[0]).unwrap();
        assert_eq!(outcome.status, Status::Succeeded);
        assert_eq!(outcome.tagged, Some(false));
        assert!(list[0].file_path(dir.path()).exists());

        let mut saw_tag_failure = false;
        while let Ok(event) = events.try_recv() {
            saw_tag_failure |= matches!(event, Event::TagFailed { .. });
        }
        assert!(saw_tag_failure);
    }

    #[tokio::test]
    async fn test_tagging_disabled_by_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.download.tag_songs = false;
        let runner = BatchRunner::new(Arc::new(config), Arc::new(TestDownloader::new()))
            .with_tagger(Arc::new(FailingTagger));

        let report = runner.fetch_all(&songs()[..1], 0).await.unwrap();

        assert_eq!(report.outcomes[0].tagged, None);
    }

    #[tokio::test]
    async fn test_eta_is_unknown_only_for_first_song() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BatchRunner::new(
            Arc::new(test_config(dir.path())),
            Arc::new(TestDownloader::new()),
        );
        let mut events = runner.subscribe();

        runner.fetch_all(&songs(), 0).await.unwrap();

        let mut etas = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::Fetching { index, eta_seconds, .. } = event {
                etas.push((index, eta_seconds.is_some()));
            }
        }
        assert_eq!(etas, vec![(1, false), (2, true), (3, true)]);
    }

    #[tokio::test]
    async fn test_prepare_resets_download_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("downloads");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("stale.mp3"), b"x").unwrap();
        let runner = BatchRunner::new(Arc::new(test_config(&dir)), Arc::new(TestDownloader::new()));

        runner.prepare().await.unwrap();

        assert!(dir.is_dir());
        assert!(!dir.join("stale.mp3").exists());
    }
}

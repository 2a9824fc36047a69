//! yt-dlp / youtube-dl downloader using the external binary

use super::traits::{Downloader, FetchRequest};
use crate::config::ToolsConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Binaries tried in order when searching PATH
const CANDIDATE_BINARIES: [&str; 2] = ["yt-dlp", "youtube-dl"];

/// Longest stderr excerpt kept in an error
const STDERR_EXCERPT: usize = 500;

/// Downloader that shells out to yt-dlp (or youtube-dl)
///
/// Runs `<binary> -x -o <template> ytsearch:<term> --audio-format mp3`, so the
/// first search hit is downloaded and converted to the target format.
///
/// # Examples
///
/// ```no_run
/// use mpme::fetch::{Downloader, FetchRequest, YtDlpDownloader};
/// use mpme::song::Song;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = YtDlpDownloader::from_path().expect("yt-dlp not found in PATH");
/// let song = Song::new("Hey Jude", "The Beatles");
/// downloader
///     .download(&FetchRequest::for_song(&song, Path::new("__downloads__")))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    binary_path: PathBuf,
}

impl YtDlpDownloader {
    /// Create a downloader with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Find yt-dlp, then youtube-dl, in PATH
    pub fn from_path() -> Option<Self> {
        CANDIDATE_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::new)
    }

    /// Resolve the binary from configuration
    pub fn from_config(tools: &ToolsConfig) -> Result<Self, FetchError> {
        if let Some(path) = &tools.downloader_path {
            return Ok(Self::new(path.clone()));
        }
        if tools.search_path {
            if let Some(downloader) = Self::from_path() {
                return Ok(downloader);
            }
        }
        Err(FetchError::NotFound(CANDIDATE_BINARIES.join(", ")))
    }

    /// Path of the binary in use
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    fn tool(&self) -> String {
        self.binary_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary_path.display().to_string())
    }

    async fn run(&self, command: &mut Command) -> Result<(), FetchError> {
        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::Spawn {
                tool: self.tool(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let excerpt_start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_EXCERPT)
            .map_or(0, |(i, _)| i);

        Err(FetchError::ToolFailed {
            tool: self.tool(),
            status: output.status.to_string(),
            stderr: stderr[excerpt_start..].to_string(),
        })
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(&self, request: &FetchRequest) -> Result<(), FetchError> {
        let mut command = Command::new(&self.binary_path);
        command
            .arg("-x")
            .arg("-o")
            .arg(&request.output_template)
            .arg(format!("ytsearch:{}", request.search_term))
            .arg("--audio-format")
            .arg(request.audio_format);
        self.run(&mut command).await
    }

    async fn update(&self) -> Result<(), FetchError> {
        let mut command = Command::new(&self.binary_path);
        command.arg("-U");
        self.run(&mut command).await
    }

    fn name(&self) -> &'static str {
        let stem = self
            .binary_path
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();
        if stem.starts_with("youtube-dl") {
            "youtube-dl"
        } else {
            "yt-dlp"
        }
    }
}

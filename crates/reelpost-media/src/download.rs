//! Video download using yt-dlp.
//!
//! yt-dlp covers both plain HTTP(S) file URLs (generic extractor) and the
//! video-sharing sites it has extractors for. Format selection follows a
//! fallback chain so the best combined audio+video encoding is used when the
//! site offers separate streams, and the best single file otherwise.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::{check_ytdlp, stderr_tail};
use crate::error::{MediaError, MediaResult};

/// Container every fetched file is delivered in.
pub const FETCH_CONTAINER: &str = "mp4";

/// Fetches a remote video into local scratch storage.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `locator` to `<output_stem>.mp4` and return that path.
    ///
    /// No retries are performed here.
    async fn fetch(&self, locator: &str, output_stem: &Path) -> MediaResult<PathBuf>;
}

/// Ordered list of yt-dlp format selectors, tried left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatStrategy {
    selectors: Vec<String>,
}

impl Default for FormatStrategy {
    fn default() -> Self {
        Self::new([
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]",
            "best[ext=mp4]",
            "best",
        ])
    }
}

impl FormatStrategy {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    /// The `-f` argument for yt-dlp.
    pub fn format_arg(&self) -> String {
        self.selectors.join("/")
    }
}

/// `Fetcher` backed by the yt-dlp CLI.
#[derive(Debug, Clone, Default)]
pub struct YtDlpFetcher {
    strategy: FormatStrategy,
    timeout: Option<Duration>,
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: FormatStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the yt-dlp argument list.
    fn build_args(&self, locator: &str, output_stem: &Path) -> Vec<String> {
        let template = format!("{}.%(ext)s", output_stem.to_string_lossy());
        vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-part".to_string(),
            "-f".to_string(),
            self.strategy.format_arg(),
            "--merge-output-format".to_string(),
            FETCH_CONTAINER.to_string(),
            "--remux-video".to_string(),
            FETCH_CONTAINER.to_string(),
            "-o".to_string(),
            template,
            "--".to_string(),
            locator.to_string(),
        ]
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn fetch(&self, locator: &str, output_stem: &Path) -> MediaResult<PathBuf> {
        check_ytdlp()?;

        let output_path = output_stem.with_extension(FETCH_CONTAINER);
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(
            locator = %locator,
            output = %output_path.display(),
            "Downloading video"
        );

        let args = self.build_args(locator, output_stem);
        let child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(locator = %locator, "yt-dlp timed out after {:?}", timeout);
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(MediaError::download_failed(classify_failure(&stderr)));
        }

        if !output_path.exists() {
            return Err(MediaError::download_failed(format!(
                "Output file not created: {}",
                output_path.display()
            )));
        }

        let file_size = output_path.metadata()?.len();
        info!(
            output = %output_path.display(),
            size_mb = file_size as f64 / (1024.0 * 1024.0),
            "Downloaded video successfully"
        );

        Ok(output_path)
    }
}

/// Summarize a yt-dlp failure from its stderr.
fn classify_failure(stderr: &str) -> String {
    let last_line = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("Unknown error");
    let lower = stderr.to_lowercase();

    let reason = if lower.contains("requested format is not available")
        || lower.contains("no video formats found")
    {
        "no compatible encoding"
    } else if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("http error 404")
        || lower.contains("http error 410")
    {
        "resource unavailable or removed"
    } else if lower.contains("unable to download webpage")
        || lower.contains("name or service not known")
        || lower.contains("connection refused")
        || lower.contains("timed out")
    {
        "locator unreachable"
    } else {
        "yt-dlp failed"
    };

    format!("{}: {}", reason, stderr_tail(last_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_chain() {
        assert_eq!(
            FormatStrategy::default().format_arg(),
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        );
    }

    #[test]
    fn test_build_args() {
        let fetcher = YtDlpFetcher::new();
        let args = fetcher.build_args("https://example.com/v", Path::new("/tmp/job/source"));

        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], FormatStrategy::default().format_arg());

        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "/tmp/job/source.%(ext)s");

        assert!(args.contains(&"--merge-output-format".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/v");
    }

    #[test]
    fn test_custom_strategy_in_args() {
        let fetcher = YtDlpFetcher::new().with_strategy(FormatStrategy::new(["best[height<=720]"]));
        let args = fetcher.build_args("https://example.com/v", Path::new("/tmp/job/source"));
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], "best[height<=720]");
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure("ERROR: [youtube] abc: Video unavailable")
            .starts_with("resource unavailable"));
        assert!(classify_failure("ERROR: Requested format is not available")
            .starts_with("no compatible encoding"));
        assert!(classify_failure("ERROR: Unable to download webpage: <urlopen error>")
            .starts_with("locator unreachable"));
        assert!(classify_failure("").starts_with("yt-dlp failed: Unknown error"));
    }

    #[tokio::test]
    #[ignore = "requires yt-dlp and network"]
    async fn test_fetch_unreachable_locator() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = YtDlpFetcher::new()
            .fetch("https://invalid.invalid/video.mp4", &dir.path().join("source"))
            .await;
        assert!(matches!(result, Err(MediaError::DownloadFailed { .. })));
    }
}

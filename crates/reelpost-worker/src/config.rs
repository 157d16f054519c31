//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reelpost_media::FormatStrategy;
use reelpost_models::EncodingConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for per-job scratch files
    pub scratch_dir: PathBuf,
    /// How often the scheduler checks for due jobs
    pub tick_interval: Duration,
    /// Maximum jobs running at once
    pub max_concurrent_jobs: usize,
    /// Upper bound for a single download
    pub fetch_timeout: Duration,
    /// Upper bound for a single composition
    pub compose_timeout: Duration,
    /// Upper bound for a single destination publish
    pub publish_timeout: Duration,
    /// Publish to all destinations concurrently
    pub parallel_publish: bool,
    /// Extra fetch attempts after the first failure
    pub fetch_retries: u32,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How long finished job records stay queryable
    pub record_retention: Duration,
    /// Output encoding for the composited video
    pub encoding: EncodingConfig,
    /// yt-dlp format fallback chain
    pub fetch_formats: FormatStrategy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("/tmp/reelpost"),
            tick_interval: Duration::from_secs(1),
            max_concurrent_jobs: 4,
            fetch_timeout: Duration::from_secs(1800), // 30 minutes
            compose_timeout: Duration::from_secs(3600), // 1 hour
            publish_timeout: Duration::from_secs(600),
            parallel_publish: true,
            fetch_retries: 0,
            shutdown_timeout: Duration::from_secs(30),
            record_retention: Duration::from_secs(86400), // 24 hours
            encoding: EncodingConfig::default(),
            fetch_formats: FormatStrategy::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_preset = defaults.encoding.preset.clone();
        let default_crf = defaults.encoding.crf;
        Self {
            scratch_dir: std::env::var("REELPOST_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            tick_interval: Duration::from_millis(env_or("REELPOST_TICK_MS", 1000)),
            max_concurrent_jobs: env_or("REELPOST_MAX_JOBS", defaults.max_concurrent_jobs).max(1),
            fetch_timeout: Duration::from_secs(env_or("REELPOST_FETCH_TIMEOUT_SECS", 1800)),
            compose_timeout: Duration::from_secs(env_or("REELPOST_COMPOSE_TIMEOUT_SECS", 3600)),
            publish_timeout: Duration::from_secs(env_or("REELPOST_PUBLISH_TIMEOUT_SECS", 600)),
            parallel_publish: env_or("REELPOST_PARALLEL_PUBLISH", defaults.parallel_publish),
            fetch_retries: env_or("REELPOST_FETCH_RETRIES", defaults.fetch_retries),
            shutdown_timeout: Duration::from_secs(env_or("REELPOST_SHUTDOWN_TIMEOUT_SECS", 30)),
            record_retention: Duration::from_secs(env_or("REELPOST_RECORD_RETENTION_SECS", 86400)),
            encoding: defaults
                .encoding
                .with_preset(env_or("REELPOST_VIDEO_PRESET", default_preset))
                .with_crf(env_or("REELPOST_VIDEO_CRF", default_crf)),
            fetch_formats: std::env::var("REELPOST_FETCH_FORMATS")
                .ok()
                .and_then(|chain| parse_format_chain(&chain))
                .unwrap_or(defaults.fetch_formats),
        }
    }

    /// Use a different scratch root.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Use a different tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// Parse a `/`-separated yt-dlp selector chain. `None` when it has no selectors.
fn parse_format_chain(chain: &str) -> Option<FormatStrategy> {
    let selectors: Vec<&str> = chain
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if selectors.is_empty() {
        None
    } else {
        Some(FormatStrategy::new(selectors))
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.fetch_retries, 0);
        assert!(config.parallel_publish);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("REELPOST_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("REELPOST_TEST_GARBAGE", 7u32), 7);
        std::env::set_var("REELPOST_TEST_NUMBER", "12");
        assert_eq!(env_or("REELPOST_TEST_NUMBER", 7u32), 12);
    }

    #[test]
    fn test_parse_format_chain() {
        let strategy = parse_format_chain(" best[ext=mp4] / best ").unwrap();
        assert_eq!(strategy.format_arg(), "best[ext=mp4]/best");
        assert!(parse_format_chain(" / ").is_none());
    }

    #[test]
    fn test_encoding_defaults_match_models() {
        let config = WorkerConfig::default();
        assert_eq!(config.encoding, EncodingConfig::default());
        assert_eq!(config.fetch_formats, FormatStrategy::default());
        assert_eq!(config.record_retention, Duration::from_secs(86400));
    }

    #[test]
    fn test_builders() {
        let config = WorkerConfig::default()
            .with_scratch_dir("/var/tmp/x")
            .with_tick_interval(Duration::from_millis(50));
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/x"));
        assert_eq!(config.tick_interval, Duration::from_millis(50));
    }
}

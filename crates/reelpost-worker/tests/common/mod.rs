//! Fakes and fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use reelpost_media::{Compositor, Fetcher, MediaError, MediaResult};
use reelpost_models::{Destination, LogoUpload, SubmitJobRequest};
use reelpost_worker::{
    JobRegistry, JobService, Pipeline, PublishError, PublishReceipt, Publisher, PublisherSet,
    Scheduler, StaticDirectory, WorkerConfig,
};

pub const TICK: Duration = Duration::from_millis(20);
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// Writes a small file at `<stem>.mp4` and remembers every stem it saw.
#[derive(Default)]
pub struct FakeFetcher {
    pub stems: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, _locator: &str, output_stem: &Path) -> MediaResult<PathBuf> {
        self.stems.lock().unwrap().push(output_stem.to_path_buf());
        let path = output_stem.with_extension("mp4");
        tokio::fs::write(&path, b"source video").await?;
        Ok(path)
    }
}

pub struct FailingFetcher;

#[async_trait]
impl Fetcher for FailingFetcher {
    async fn fetch(&self, locator: &str, _output_stem: &Path) -> MediaResult<PathBuf> {
        Err(MediaError::download_failed(format!(
            "locator unreachable: {}",
            locator
        )))
    }
}

/// Copies the source to the output and records what it was given.
#[derive(Default)]
pub struct FakeCompositor {
    pub calls: Mutex<Vec<(PathBuf, PathBuf, String)>>,
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn compose(
        &self,
        source: &Path,
        logo: &Path,
        caption: &str,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        if !logo.exists() {
            return Err(MediaError::FileNotFound(logo.to_path_buf()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((source.to_path_buf(), logo.to_path_buf(), caption.to_string()));
        tokio::fs::copy(source, output).await?;
        Ok(output.to_path_buf())
    }
}

/// Fails after checking that the download is still there.
#[derive(Default)]
pub struct FailingCompositor {
    pub saw_source: Mutex<Option<PathBuf>>,
}

#[async_trait]
impl Compositor for FailingCompositor {
    async fn compose(
        &self,
        source: &Path,
        _logo: &Path,
        _caption: &str,
        _output: &Path,
    ) -> MediaResult<PathBuf> {
        if source.exists() {
            *self.saw_source.lock().unwrap() = Some(source.to_path_buf());
        }
        Err(MediaError::ffmpeg_failed("No space left on device", None, Some(1)))
    }
}

pub struct PanickingCompositor;

#[async_trait]
impl Compositor for PanickingCompositor {
    async fn compose(&self, _: &Path, _: &Path, _: &str, _: &Path) -> MediaResult<PathBuf> {
        panic!("decoder crashed");
    }
}

/// Succeeds for every destination except the ones listed.
pub struct SelectivePublisher {
    pub refuse: Vec<String>,
    pub seen: Mutex<Vec<String>>,
}

impl SelectivePublisher {
    pub fn refusing(ids: &[&str]) -> Self {
        Self {
            refuse: ids.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Publisher for SelectivePublisher {
    async fn publish(
        &self,
        destination_id: &str,
        media_path: &Path,
        _caption: &str,
    ) -> Result<PublishReceipt, PublishError> {
        self.seen.lock().unwrap().push(destination_id.to_string());
        if !media_path.exists() {
            return Err(PublishError::MediaUnavailable(media_path.to_path_buf()));
        }
        if self.refuse.iter().any(|id| id == destination_id) {
            return Err(PublishError::rejected("token expired"));
        }
        Ok(PublishReceipt::new(format!("post-{}", destination_id)))
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub service: JobService,
}

impl Harness {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        compositor: Arc<dyn Compositor>,
        publishers: PublisherSet,
    ) -> Self {
        let tmp = TempDir::new().unwrap();
        let config = WorkerConfig::default()
            .with_scratch_dir(tmp.path())
            .with_tick_interval(TICK);
        let pipeline = Pipeline::new(
            config,
            Arc::new(JobRegistry::new()),
            fetcher,
            compositor,
            publishers,
        );
        let scheduler = Arc::new(Scheduler::new(Arc::new(pipeline)));
        let service = JobService::new(scheduler, Arc::new(StaticDirectory::default()));
        Self { tmp, service }
    }

    /// Fake fetcher and compositor with dry-run publishers.
    pub fn happy() -> Self {
        Self::new(
            Arc::new(FakeFetcher::default()),
            Arc::new(FakeCompositor::default()),
            PublisherSet::dry_run(Duration::from_secs(5)),
        )
    }

    pub fn start(&self) {
        self.service.scheduler().start(TICK).unwrap();
    }

    pub fn scratch_root(&self) -> &Path {
        self.tmp.path()
    }

    /// Files and directories left under the scratch root.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

pub fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn request(destinations: Vec<Destination>, scheduled_at: DateTime<Utc>) -> SubmitJobRequest {
    SubmitJobRequest {
        media_locator: "https://example/video123".to_string(),
        logo: Some(LogoUpload::new("brand.png", PNG_BYTES.to_vec())),
        overlay_text: Some("Big Sale".to_string()),
        destinations,
        caption: Some("New drop is live".to_string()),
        scheduled_at: rfc3339(scheduled_at),
    }
}

//! Pipeline orchestration.
//!
//! Runs one job through Fetch -> Compose -> Publish and turns the outcome
//! into the job's terminal record. Stages never run concurrently with each
//! other. Scratch files are released before the terminal status is recorded,
//! on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use reelpost_media::{Compositor, Fetcher, MediaError};
use reelpost_models::{Job, JobRecord, JobStatus, PublishOutcome};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::publish::PublisherSet;
use crate::registry::JobRegistry;
use crate::retry::{retry_async, RetryConfig};
use crate::scratch::{JobScratch, ScratchSpace};

const STAGE_FETCH: &str = "fetch";
const STAGE_COMPOSE: &str = "compose";
const STAGE_PUBLISH: &str = "publish";

/// A failed stage and why.
struct StageFailure {
    stage: &'static str,
    error: WorkerError,
}

impl StageFailure {
    fn new(stage: &'static str, error: WorkerError) -> Self {
        Self { stage, error }
    }
}

/// Executes scheduled jobs.
pub struct Pipeline {
    config: WorkerConfig,
    registry: Arc<JobRegistry>,
    scratch: ScratchSpace,
    fetcher: Arc<dyn Fetcher>,
    compositor: Arc<dyn Compositor>,
    publishers: PublisherSet,
}

impl Pipeline {
    pub fn new(
        config: WorkerConfig,
        registry: Arc<JobRegistry>,
        fetcher: Arc<dyn Fetcher>,
        compositor: Arc<dyn Compositor>,
        publishers: PublisherSet,
    ) -> Self {
        let scratch = ScratchSpace::new(&config.scratch_dir);
        Self {
            config,
            registry,
            scratch,
            fetcher,
            compositor,
            publishers,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Run a job to a terminal state and return its record.
    ///
    /// Stage failures end up in the record, not in the `Err` branch; an
    /// error here means the registry refused a status change.
    pub async fn execute(&self, job: Job) -> WorkerResult<JobRecord> {
        let logger = JobLogger::new(&job.id, "scheduled_post");
        let span = logger.create_span();
        self.execute_logged(job, logger).instrument(span).await
    }

    async fn execute_logged(&self, job: Job, logger: JobLogger) -> WorkerResult<JobRecord> {
        if !self.registry.contains(&job.id).await {
            self.registry.insert(job.clone()).await?;
        }

        logger.log_start(&format!(
            "{} -> {} destination(s), scheduled for {}",
            job.media_locator,
            job.destinations.len(),
            job.scheduled_at
        ));

        let mut scratch = self.scratch.scratch_for(&job);
        let outcome = self.run_stages(&job, &mut scratch, &logger).await;

        if let Err(e) = scratch.release().await {
            logger.log_warning(&format!("Failed to release scratch files: {}", e));
        }

        match outcome {
            Ok(results) => {
                let record = self.registry.complete(&job.id, results).await?;
                let failed = record.failed_destinations().count();
                metrics::record_job_completed(failed > 0);
                if failed > 0 {
                    logger.log_warning(&format!(
                        "Published with {} of {} destination(s) failing",
                        failed,
                        record.publish_results.len()
                    ));
                } else {
                    logger.log_completion(&format!(
                        "Published to {} destination(s)",
                        record.publish_results.len()
                    ));
                }
                Ok(record)
            }
            Err(failure) => {
                logger.log_error(&format!("{} stage failed: {}", failure.stage, failure.error));
                metrics::record_job_failed(failure.stage);
                self.registry.fail(&job.id, failure.error.to_string()).await
            }
        }
    }

    async fn run_stages(
        &self,
        job: &Job,
        scratch: &mut JobScratch,
        logger: &JobLogger,
    ) -> Result<Vec<PublishOutcome>, StageFailure> {
        self.enter(job, JobStatus::Downloading, STAGE_FETCH).await?;
        let started = Instant::now();
        let source = self
            .fetch(job)
            .await
            .map_err(|e| StageFailure::new(STAGE_FETCH, e))?;
        scratch.track(&source);
        metrics::record_stage_duration(STAGE_FETCH, started.elapsed());
        logger.log_progress(&format!("Fetched {}", source.display()));

        self.enter(job, JobStatus::Composing, STAGE_COMPOSE).await?;
        let started = Instant::now();
        let output = self.scratch.composited_path(&job.id);
        let composited = match self.compose(job, &source, &output).await {
            Ok(path) => path,
            Err(e) => {
                if let Err(release_err) = scratch.release_file(&source).await {
                    logger.log_warning(&format!(
                        "Failed to remove download {}: {}",
                        source.display(),
                        release_err
                    ));
                }
                return Err(StageFailure::new(STAGE_COMPOSE, e));
            }
        };
        scratch.track(&composited);
        metrics::record_stage_duration(STAGE_COMPOSE, started.elapsed());
        logger.log_progress(&format!("Composited {}", composited.display()));

        self.enter(job, JobStatus::Publishing, STAGE_PUBLISH).await?;
        let started = Instant::now();
        let results = self
            .publishers
            .publish_all(
                &job.destinations,
                &composited,
                &job.caption,
                self.config.parallel_publish,
            )
            .await;
        metrics::record_stage_duration(STAGE_PUBLISH, started.elapsed());

        Ok(results)
    }

    async fn enter(
        &self,
        job: &Job,
        status: JobStatus,
        stage: &'static str,
    ) -> Result<(), StageFailure> {
        self.registry
            .transition(&job.id, status)
            .await
            .map(|_| ())
            .map_err(|e| StageFailure::new(stage, e))
    }

    async fn fetch(&self, job: &Job) -> WorkerResult<PathBuf> {
        let stem = self.scratch.source_stem(&job.id);
        if let Some(dir) = stem.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let retry = RetryConfig::new("fetch").with_max_retries(self.config.fetch_retries);
        let timeout = self.config.fetch_timeout;
        let fetcher = &self.fetcher;
        let locator = job.media_locator.as_str();
        let stem = stem.as_path();
        retry_async(&retry, move || async move {
            bounded(timeout, fetcher.fetch(locator, stem)).await
        })
        .await
        .map_err(|e| WorkerError::fetch_failed(e.to_string()))
    }

    async fn compose(
        &self,
        job: &Job,
        source: &Path,
        output: &Path,
    ) -> WorkerResult<PathBuf> {
        bounded(
            self.config.compose_timeout,
            self.compositor.compose(
                source,
                &job.overlay.logo_path,
                &job.overlay.caption_text,
                output,
            ),
        )
        .await
        .map_err(|e| WorkerError::composition_failed(e.to_string()))
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, MediaError>>,
) -> Result<T, MediaError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MediaError::Timeout(limit.as_secs())),
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("scratch", &self.scratch)
            .field("publishers", &self.publishers)
            .finish()
    }
}

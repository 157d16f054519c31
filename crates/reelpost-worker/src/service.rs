//! Submission surface consumed by the request-handling layer.

use std::sync::Arc;
use tracing::{error, info, warn};

use reelpost_models::{
    DestinationInfo, Job, JobId, JobRecord, Overlay, SubmissionAck, SubmitJobRequest,
};

use reelpost_media::{FfmpegCompositor, YtDlpFetcher};

use crate::config::WorkerConfig;
use crate::directory::{DestinationDirectory, StaticDirectory};
use crate::error::{WorkerError, WorkerResult};
use crate::orchestrator::Pipeline;
use crate::publish::PublisherSet;
use crate::registry::JobRegistry;
use crate::scheduler::Scheduler;

/// Accepts submissions and answers status queries.
pub struct JobService {
    scheduler: Arc<Scheduler>,
    directory: Arc<dyn DestinationDirectory>,
}

impl JobService {
    pub fn new(scheduler: Arc<Scheduler>, directory: Arc<dyn DestinationDirectory>) -> Self {
        Self {
            scheduler,
            directory,
        }
    }

    /// Wire the yt-dlp fetcher, the ffmpeg compositor, dry-run publishers
    /// and the sample directory.
    pub fn from_config(config: WorkerConfig) -> Self {
        let fetcher = YtDlpFetcher::new()
            .with_strategy(config.fetch_formats.clone())
            .with_timeout(config.fetch_timeout);
        let compositor = FfmpegCompositor::new()
            .with_encoding(config.encoding.clone())
            .with_timeout(config.compose_timeout);
        let publishers = PublisherSet::dry_run(config.publish_timeout);
        let pipeline = Pipeline::new(
            config,
            Arc::new(JobRegistry::new()),
            Arc::new(fetcher),
            Arc::new(compositor),
            publishers,
        );
        Self::new(
            Arc::new(Scheduler::new(Arc::new(pipeline))),
            Arc::new(StaticDirectory::default()),
        )
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Validate, stage the logo, and schedule a new job.
    ///
    /// Nothing is left in scratch storage when this returns an error.
    pub async fn submit(&self, request: SubmitJobRequest) -> WorkerResult<SubmissionAck> {
        let submission = request.validate()?;
        let id = JobId::new();
        let scratch = self.scheduler.pipeline().scratch();

        let logo_path = match scratch.stage_logo(&id, &submission.logo).await {
            Ok(path) => path,
            Err(e) => {
                if let Err(cleanup_err) = scratch.discard_job_dir(&id).await {
                    warn!(job_id = %id, "Failed to remove partial job dir: {}", cleanup_err);
                }
                return Err(e);
            }
        };

        let job = Job::new(
            id.clone(),
            submission.media_locator,
            Overlay {
                logo_path,
                caption_text: submission.overlay_text,
            },
            submission.destinations,
            submission.caption,
            submission.scheduled_at,
        );
        let ack = SubmissionAck::new(id, job.scheduled_at, job.destinations.clone());

        if let Err(e) = self.scheduler.schedule(job.clone()).await {
            if e.is_rejection() {
                warn!(job_id = %job.id, "Scheduling rejected: {}", e);
            } else {
                error!(job_id = %job.id, "Scheduling failed: {}", e);
            }
            if let Err(release_err) = scratch.scratch_for(&job).release().await {
                warn!(job_id = %job.id, "Failed to remove staged logo: {}", release_err);
            }
            return Err(e);
        }

        info!(job_id = %ack.job_id, "{}", ack.message);
        Ok(ack)
    }

    pub async fn list_destinations(&self) -> WorkerResult<Vec<DestinationInfo>> {
        self.directory.list_destinations().await
    }

    /// Jobs waiting to fire, earliest first.
    pub async fn list_pending(&self) -> Vec<Job> {
        self.scheduler.list_pending().await
    }

    pub async fn job_status(&self, id: &JobId) -> WorkerResult<JobRecord> {
        self.scheduler
            .registry()
            .get(id)
            .await
            .ok_or_else(|| WorkerError::JobNotFound(id.clone()))
    }

    pub async fn cancel(&self, id: &JobId) -> WorkerResult<()> {
        self.scheduler.cancel(id).await.map(|_| ())
    }
}

//! Timer-driven job scheduler.
//!
//! Holds pending jobs in a time-ordered waiting set and hands each one to
//! the [`Pipeline`] exactly once, no earlier than its `scheduled_at`.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use reelpost_models::{validate_destinations, validate_locator, Job, JobId, JobStatus};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::orchestrator::Pipeline;
use crate::registry::JobRegistry;

/// How often the tick loop drops expired job records.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Jobs waiting for their fire time.
///
/// `order` and `jobs` always hold the same ids.
#[derive(Debug, Default)]
struct WaitingSet {
    order: BTreeSet<(DateTime<Utc>, JobId)>,
    jobs: HashMap<JobId, Job>,
}

impl WaitingSet {
    fn insert(&mut self, job: Job) {
        self.order.insert((job.scheduled_at, job.id.clone()));
        self.jobs.insert(job.id.clone(), job);
    }

    fn remove(&mut self, id: &JobId) -> Option<Job> {
        let job = self.jobs.remove(id)?;
        self.order.remove(&(job.scheduled_at, job.id.clone()));
        Some(job)
    }

    /// Remove up to `limit` jobs due at `now`, earliest first.
    fn take_due(&mut self, now: DateTime<Utc>, limit: usize) -> Vec<Job> {
        let mut due = Vec::new();
        while due.len() < limit {
            let Some((at, id)) = self.order.first().cloned() else {
                break;
            };
            if let Some(job) = self.jobs.get(&id) {
                if !job.is_due(now) {
                    break;
                }
            }
            self.order.remove(&(at, id.clone()));
            if let Some(job) = self.jobs.remove(&id) {
                due.push(job);
            }
        }
        due
    }

    fn drain(&mut self) -> Vec<Job> {
        self.order.clear();
        let mut jobs: Vec<Job> = self.jobs.drain().map(|(_, job)| job).collect();
        jobs.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        jobs
    }
}

/// Process-wide scheduler.
///
/// The waiting set is the only state shared by the submission path and the
/// firing path, and every access goes through one mutex.
pub struct Scheduler {
    waiting: Mutex<WaitingSet>,
    pipeline: Arc<Pipeline>,
    job_semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    shutdown: watch::Sender<bool>,
    stopped: AtomicBool,
    tick_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let max_concurrent_jobs = pipeline.config().max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            waiting: Mutex::new(WaitingSet::default()),
            pipeline,
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            shutdown,
            stopped: AtomicBool::new(false),
            tick_task: std::sync::Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.pipeline.registry()
    }

    /// Add a job to the waiting set.
    ///
    /// Rejects an id that is already known and jobs whose locator or
    /// destinations would fail submission. Past-due jobs are accepted and
    /// fire on the next tick.
    pub async fn schedule(&self, mut job: Job) -> WorkerResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::SchedulerStopped);
        }
        job.media_locator = validate_locator(&job.media_locator)?;
        validate_destinations(&job.destinations)?;
        if job.status != JobStatus::Pending {
            return Err(WorkerError::InvalidTransition {
                id: job.id.clone(),
                from: job.status,
                to: JobStatus::Pending,
            });
        }

        let mut waiting = self.waiting.lock().await;
        // `shutdown` flips the flag under this lock before draining.
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::SchedulerStopped);
        }
        if waiting.jobs.contains_key(&job.id) {
            return Err(WorkerError::DuplicateJob(job.id));
        }
        self.registry().insert(job.clone()).await?;

        info!(
            job_id = %job.id,
            scheduled_at = %job.scheduled_at,
            destinations = job.destinations.len(),
            "Job scheduled"
        );
        waiting.insert(job);
        metrics::record_job_scheduled();
        Ok(())
    }

    /// Remove a job that has not fired yet and release its scratch files.
    pub async fn cancel(&self, id: &JobId) -> WorkerResult<Job> {
        let mut waiting = self.waiting.lock().await;
        let Some(job) = waiting.remove(id) else {
            drop(waiting);
            return match self.registry().get(id).await {
                Some(record) if record.status() != JobStatus::Cancelled => {
                    Err(WorkerError::AlreadyFired(id.clone()))
                }
                _ => Err(WorkerError::JobNotFound(id.clone())),
            };
        };
        drop(waiting);

        if let Err(e) = self.pipeline.scratch().scratch_for(&job).release().await {
            warn!(job_id = %id, "Failed to release scratch files: {}", e);
        }
        self.registry().transition(id, JobStatus::Cancelled).await?;
        metrics::record_job_cancelled();
        info!(job_id = %id, "Job cancelled");
        Ok(job)
    }

    /// Pending jobs, earliest first.
    pub async fn list_pending(&self) -> Vec<Job> {
        let waiting = self.waiting.lock().await;
        waiting
            .order
            .iter()
            .filter_map(|(_, id)| waiting.jobs.get(id).cloned())
            .collect()
    }

    pub async fn pending_len(&self) -> usize {
        self.waiting.lock().await.jobs.len()
    }

    /// Start the tick loop.
    pub fn start(self: &Arc<Self>, tick: Duration) -> WorkerResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::SchedulerStopped);
        }
        let mut slot = self
            .tick_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return Ok(());
        }

        info!(
            "Starting scheduler with {:?} tick and {} max concurrent jobs",
            tick, self.max_concurrent_jobs
        );

        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_prune = Instant::now();
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let fired = scheduler.fire_due(Utc::now()).await;
                        if fired > 0 {
                            debug!("Fired {} job(s)", fired);
                        }
                        if last_prune.elapsed() >= PRUNE_INTERVAL {
                            scheduler.prune_records(Utc::now()).await;
                            last_prune = Instant::now();
                        }
                    }
                }
            }
            debug!("Scheduler tick loop stopped");
        }));
        Ok(())
    }

    /// Forget finished jobs older than the configured retention.
    pub async fn prune_records(&self, now: DateTime<Utc>) -> usize {
        let retention = self.pipeline.config().record_retention;
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return 0;
        };
        self.registry().prune_finished_before(cutoff).await
    }

    /// Fire every job due at `now` that fits in the free run slots.
    ///
    /// Jobs beyond the free slots stay in the waiting set for a later tick.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> usize {
        let free = self.job_semaphore.available_permits();
        if free == 0 {
            return 0;
        }

        let due = self.waiting.lock().await.take_due(now, free);
        let count = due.len();
        for job in due {
            let permit = match Arc::clone(&self.job_semaphore).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    // Slots only shrink here; put the job back for the next tick.
                    self.waiting.lock().await.insert(job);
                    continue;
                }
            };
            self.spawn_run(job, permit);
        }
        count
    }

    fn spawn_run(&self, job: Job, permit: tokio::sync::OwnedSemaphorePermit) {
        let id = job.id.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let run = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.execute(job).await }
        });

        tokio::spawn(async move {
            let _permit = permit;
            match run.await {
                Ok(Ok(record)) => {
                    debug!(job_id = %id, status = %record.status(), "Run finished");
                }
                Ok(Err(e)) => {
                    error!(job_id = %id, "Run could not record its outcome: {}", e);
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        "run panicked".to_string()
                    } else {
                        format!("run aborted: {}", join_err)
                    };
                    error!(job_id = %id, "{}", reason);
                    if pipeline.registry().abort(&id, reason).await.is_some() {
                        metrics::record_job_failed("panic");
                    }
                }
            }
        });
    }

    /// Stop firing, wait for in-flight runs, and cancel jobs still waiting.
    pub async fn shutdown(&self, timeout: Duration) {
        {
            let _waiting = self.waiting.lock().await;
            if self.stopped.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        let _ = self.shutdown.send(true);

        let handle = self
            .tick_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Scheduler tick loop ended abnormally: {}", e);
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(timeout, self.wait_for_jobs()).await.is_err() {
            warn!("Timed out after {:?} waiting for in-flight jobs", timeout);
        }

        let remaining = self.waiting.lock().await.drain();
        if !remaining.is_empty() {
            warn!("Cancelling {} job(s) that never fired", remaining.len());
        }
        for job in remaining {
            if let Err(e) = self.pipeline.scratch().scratch_for(&job).release().await {
                warn!(job_id = %job.id, "Failed to release scratch files: {}", e);
            }
            if let Err(e) = self.registry().transition(&job.id, JobStatus::Cancelled).await {
                warn!(job_id = %job.id, "Failed to record cancellation: {}", e);
            }
            metrics::record_job_cancelled();
        }

        info!("Scheduler stopped");
    }

    /// Wait for all in-flight runs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

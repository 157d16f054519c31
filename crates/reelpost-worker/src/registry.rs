//! In-memory job status registry.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{Notify, RwLock};
use tracing::debug;

use reelpost_models::{Job, JobId, JobRecord, JobStatus, PublishOutcome};

use crate::error::{WorkerError, WorkerResult};

/// Status records for every job this process has seen.
///
/// Status changes go through [`JobStatus::can_transition_to`]; waiters in
/// [`JobRegistry::wait_for_terminal`] are woken on every change.
#[derive(Debug, Default)]
pub struct JobRegistry {
    records: RwLock<HashMap<JobId, JobRecord>>,
    changed: Notify,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job.
    pub async fn insert(&self, job: Job) -> WorkerResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&job.id) {
            return Err(WorkerError::DuplicateJob(job.id));
        }
        records.insert(job.id.clone(), JobRecord::new(job));
        drop(records);

        self.changed.notify_waiters();
        Ok(())
    }

    pub async fn contains(&self, id: &JobId) -> bool {
        self.records.read().await.contains_key(id)
    }

    pub async fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// All records, oldest schedule first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            a.job
                .scheduled_at
                .cmp(&b.job.scheduled_at)
                .then_with(|| a.job.id.cmp(&b.job.id))
        });
        records
    }

    /// Move a job to `next`, rejecting transitions the lifecycle forbids.
    pub async fn transition(&self, id: &JobId, next: JobStatus) -> WorkerResult<JobRecord> {
        self.update(id, next, |_| {}).await
    }

    /// Record a fatal stage failure.
    pub async fn fail(&self, id: &JobId, reason: impl Into<String>) -> WorkerResult<JobRecord> {
        let reason = reason.into();
        self.update(id, JobStatus::Failed, move |record| {
            record.failure = Some(reason);
        })
        .await
    }

    /// Record completion with every per-destination outcome.
    pub async fn complete(
        &self,
        id: &JobId,
        results: Vec<PublishOutcome>,
    ) -> WorkerResult<JobRecord> {
        self.update(id, JobStatus::Completed, move |record| {
            record.publish_results = results;
        })
        .await
    }

    /// Mark a run that died unexpectedly as failed, whatever stage it was in.
    ///
    /// Returns `None` if the job is unknown or already terminal.
    pub async fn abort(&self, id: &JobId, reason: impl Into<String>) -> Option<JobRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(id)?;
        if record.is_terminal() {
            return None;
        }
        record.job.status = JobStatus::Failed;
        record.failure = Some(reason.into());
        record.finished_at = Some(Utc::now());
        let snapshot = record.clone();
        drop(records);

        self.changed.notify_waiters();
        Some(snapshot)
    }

    /// Drop terminal records that finished before `cutoff`.
    ///
    /// Returns how many records were removed.
    pub async fn prune_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| {
            !(record.is_terminal() && record.finished_at.is_some_and(|at| at < cutoff))
        });
        let removed = before - records.len();
        drop(records);

        if removed > 0 {
            debug!("Pruned {} finished job record(s)", removed);
            self.changed.notify_waiters();
        }
        removed
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait_for_terminal(&self, id: &JobId) -> WorkerResult<JobRecord> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.get(id).await {
                Some(record) if record.is_terminal() => return Ok(record),
                Some(_) => {}
                None => return Err(WorkerError::JobNotFound(id.clone())),
            }

            notified.await;
        }
    }

    async fn update<F>(&self, id: &JobId, next: JobStatus, apply: F) -> WorkerResult<JobRecord>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| WorkerError::JobNotFound(id.clone()))?;

        let current = record.job.status;
        if !current.can_transition_to(next) {
            return Err(WorkerError::InvalidTransition {
                id: id.clone(),
                from: current,
                to: next,
            });
        }

        apply(record);
        record.job.status = next;
        let now = Utc::now();
        if current == JobStatus::Pending && next == JobStatus::Downloading {
            record.started_at = Some(now);
        }
        if next.is_terminal() {
            record.finished_at = Some(now);
        }
        let snapshot = record.clone();
        drop(records);

        debug!(job_id = %id, "Job status {} -> {}", current, next);
        self.changed.notify_waiters();
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelpost_models::{Destination, Overlay};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn job(id: &str) -> Job {
        Job::new(
            JobId::from_string(id),
            "https://example.com/v.mp4",
            Overlay {
                logo_path: PathBuf::from("/tmp/logo.png"),
                caption_text: "hi".to_string(),
            },
            vec![Destination::social_page("p1")],
            "caption",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let registry = JobRegistry::new();
        registry.insert(job("a")).await.unwrap();
        let err = registry.insert(job("a")).await.unwrap_err();
        assert!(matches!(err, WorkerError::DuplicateJob(_)));
    }

    #[tokio::test]
    async fn test_transitions_are_validated() {
        let registry = JobRegistry::new();
        let id = JobId::from_string("a");
        registry.insert(job("a")).await.unwrap();

        let err = registry
            .transition(&id, JobStatus::Publishing)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidTransition { .. }));

        let record = registry.transition(&id, JobStatus::Downloading).await.unwrap();
        assert!(record.started_at.is_some());

        let record = registry.fail(&id, "unreachable").await.unwrap();
        assert_eq!(record.status(), JobStatus::Failed);
        assert_eq!(record.failure.as_deref(), Some("unreachable"));
        assert!(record.finished_at.is_some());

        // Terminal states are absorbing.
        assert!(registry.transition(&id, JobStatus::Composing).await.is_err());
        assert!(registry.abort(&id, "late").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = JobRegistry::new();
        let id = JobId::from_string("missing");
        assert!(matches!(
            registry.transition(&id, JobStatus::Downloading).await,
            Err(WorkerError::JobNotFound(_))
        ));
        assert!(matches!(
            registry.wait_for_terminal(&id).await,
            Err(WorkerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_abort_from_publishing() {
        let registry = JobRegistry::new();
        let id = JobId::from_string("a");
        registry.insert(job("a")).await.unwrap();
        for status in [JobStatus::Downloading, JobStatus::Composing, JobStatus::Publishing] {
            registry.transition(&id, status).await.unwrap();
        }

        let record = registry.abort(&id, "run panicked").await.unwrap();
        assert_eq!(record.status(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_wait_for_terminal_wakes_on_completion() {
        let registry = Arc::new(JobRegistry::new());
        let id = JobId::from_string("a");
        registry.insert(job("a")).await.unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            tokio::spawn(async move { registry.wait_for_terminal(&id).await })
        };

        for status in [JobStatus::Downloading, JobStatus::Composing, JobStatus::Publishing] {
            registry.transition(&id, status).await.unwrap();
        }
        registry.complete(&id, Vec::new()).await.unwrap();

        let record = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_prune_keeps_live_and_recent_records() {
        let registry = JobRegistry::new();
        for id in ["done", "failed", "pending", "running"] {
            registry.insert(job(id)).await.unwrap();
        }
        let done = JobId::from_string("done");
        for status in [JobStatus::Downloading, JobStatus::Composing, JobStatus::Publishing] {
            registry.transition(&done, status).await.unwrap();
        }
        registry.complete(&done, Vec::new()).await.unwrap();
        registry
            .transition(&JobId::from_string("failed"), JobStatus::Downloading)
            .await
            .unwrap();
        registry
            .fail(&JobId::from_string("failed"), "gone")
            .await
            .unwrap();
        registry
            .transition(&JobId::from_string("running"), JobStatus::Downloading)
            .await
            .unwrap();

        // Nothing finished an hour ago.
        let removed = registry
            .prune_finished_before(Utc::now() - chrono::Duration::hours(1))
            .await;
        assert_eq!(removed, 0);

        let removed = registry
            .prune_finished_before(Utc::now() + chrono::Duration::seconds(1))
            .await;
        assert_eq!(removed, 2);
        assert!(!registry.contains(&done).await);
        assert!(!registry.contains(&JobId::from_string("failed")).await);
        assert!(registry.contains(&JobId::from_string("pending")).await);
        assert!(registry.contains(&JobId::from_string("running")).await);
    }

    #[tokio::test]
    async fn test_list_orders_by_schedule() {
        let registry = JobRegistry::new();
        let mut late = job("late");
        late.scheduled_at = Utc::now() + chrono::Duration::hours(1);
        registry.insert(late).await.unwrap();
        registry.insert(job("early")).await.unwrap();

        let ids: Vec<String> = registry
            .list()
            .await
            .into_iter()
            .map(|r| r.job.id.to_string())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }
}

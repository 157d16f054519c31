//! Worker error types.

use reelpost_models::{JobId, JobStatus, ValidationError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job {0} is already scheduled")]
    DuplicateJob(JobId),

    #[error("Job {0} not found")]
    JobNotFound(JobId),

    #[error("Job {0} has already fired")]
    AlreadyFired(JobId),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Composition failed: {0}")]
    CompositionFailed(String),

    #[error("Job {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Scheduler is stopped")]
    SchedulerStopped,

    #[error("Media error: {0}")]
    Media(#[from] reelpost_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::FetchFailed(msg.into())
    }

    pub fn composition_failed(msg: impl Into<String>) -> Self {
        Self::CompositionFailed(msg.into())
    }

    /// Rejections surfaced synchronously to the submitter.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            WorkerError::Validation(_) | WorkerError::DuplicateJob(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(WorkerError::from(ValidationError::MissingLogo).is_rejection());
        assert!(WorkerError::DuplicateJob(JobId::new()).is_rejection());
        assert!(!WorkerError::fetch_failed("gone").is_rejection());
        assert!(!WorkerError::SchedulerStopped.is_rejection());
    }

    #[test]
    fn test_display() {
        let err = WorkerError::InvalidTransition {
            id: JobId::from_string("j1"),
            from: JobStatus::Completed,
            to: JobStatus::Downloading,
        };
        assert_eq!(err.to_string(), "Job j1: invalid transition completed -> downloading");
    }
}

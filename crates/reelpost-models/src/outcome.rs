//! Per-destination publish outcomes and job status records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Destination, Job, JobStatus};

/// Result of one publish attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PublishOutcome {
    pub destination: Destination,
    pub success: bool,
    /// Identifier assigned by the platform, when it returned one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl PublishOutcome {
    pub fn succeeded(destination: Destination, remote_id: Option<String>) -> Self {
        Self {
            destination,
            success: true,
            remote_id,
            error: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn failed(destination: Destination, error: impl Into<String>) -> Self {
        Self {
            destination,
            success: false,
            remote_id: None,
            error: Some(error.into()),
            attempted_at: Utc::now(),
        }
    }
}

/// Status record of a job, observable through the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub job: Job,

    /// Stage error for `failed` jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// One entry per destination once publishing finished
    #[serde(default)]
    pub publish_results: Vec<PublishOutcome>,

    /// When the scheduler fired the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            failure: None,
            publish_results: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    pub fn is_terminal(&self) -> bool {
        self.job.status.is_terminal()
    }

    /// Publish attempts that failed.
    pub fn failed_destinations(&self) -> impl Iterator<Item = &PublishOutcome> {
        self.publish_results.iter().filter(|o| !o.success)
    }

    /// Completed, but at least one destination rejected the post.
    pub fn is_partial_failure(&self) -> bool {
        self.job.status == JobStatus::Completed && self.failed_destinations().next().is_some()
    }
}

//! Scheduled job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::Destination;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
///
/// `Pending -> Downloading -> Composing -> Publishing -> Completed`, with
/// `Failed` reachable from `Downloading` or `Composing` and `Cancelled`
/// reachable only from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the scheduler for its fire time
    #[default]
    Pending,
    /// Fetching the remote video
    Downloading,
    /// Overlaying logo and caption
    Composing,
    /// Delivering to destinations
    Publishing,
    /// Every destination was attempted (some may have failed)
    Completed,
    /// Fetch or composition failed
    Failed,
    /// Removed from the scheduler before it fired
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Composing => "composing",
            JobStatus::Publishing => "publishing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Pending, Cancelled)
                | (Downloading, Composing)
                | (Downloading, Failed)
                | (Composing, Publishing)
                | (Composing, Failed)
                | (Publishing, Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overlay parameters applied to the fetched video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Overlay {
    /// Staged logo file, owned by the job until cleanup
    pub logo_path: PathBuf,
    /// Text rendered centered over the video
    pub caption_text: String,
}

/// The unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Source video URL
    pub media_locator: String,

    /// Logo and overlay text
    pub overlay: Overlay,

    /// Ordered publishing targets (never empty)
    pub destinations: Vec<Destination>,

    /// Post caption applied to every destination
    pub caption: String,

    /// The job must not execute before this instant
    pub scheduled_at: DateTime<Utc>,

    /// Submission timestamp
    pub created_at: DateTime<Utc>,

    /// Lifecycle state
    #[serde(default)]
    pub status: JobStatus,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        id: JobId,
        media_locator: impl Into<String>,
        overlay: Overlay,
        destinations: Vec<Destination>,
        caption: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            media_locator: media_locator.into(),
            overlay,
            destinations,
            caption: caption.into(),
            scheduled_at,
            created_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }

    /// Whether the job may run at `now`. Past-due jobs are runnable.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}

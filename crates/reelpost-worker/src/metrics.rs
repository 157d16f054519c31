//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; a no-op until the embedding
//! process installs a recorder.

use metrics::{counter, histogram};
use std::time::Duration;

use reelpost_models::DestinationKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SCHEDULED_TOTAL: &str = "reelpost_jobs_scheduled_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reelpost_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reelpost_jobs_failed_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "reelpost_jobs_cancelled_total";
    pub const PUBLISH_ATTEMPTS_TOTAL: &str = "reelpost_publish_attempts_total";
    pub const STAGE_DURATION_SECONDS: &str = "reelpost_stage_duration_seconds";
}

pub fn record_job_scheduled() {
    counter!(names::JOBS_SCHEDULED_TOTAL).increment(1);
}

/// Record a completed job; `partial` when some destination failed.
pub fn record_job_completed(partial: bool) {
    let labels = [("partial", partial.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record a failed job with the stage that failed.
pub fn record_job_failed(stage: &'static str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_cancelled() {
    counter!(names::JOBS_CANCELLED_TOTAL).increment(1);
}

pub fn record_publish_attempt(kind: DestinationKind, success: bool) {
    let labels = [
        ("kind", kind.as_str().to_string()),
        ("outcome", if success { "success" } else { "failure" }.to_string()),
    ];
    counter!(names::PUBLISH_ATTEMPTS_TOTAL, &labels).increment(1);
}

pub fn record_stage_duration(stage: &'static str, elapsed: Duration) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(elapsed.as_secs_f64());
}

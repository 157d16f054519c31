//! Shared data models for the ReelPost scheduler.
//!
//! This crate provides Serde-serializable types for:
//! - Scheduled jobs and their lifecycle states
//! - Publishing destinations and per-destination outcomes
//! - Job submission requests, validation and acknowledgements
//! - Encoding configuration

pub mod destination;
pub mod encoding;
pub mod job;
pub mod outcome;
pub mod schedule;
pub mod submission;

// Re-export common types
pub use destination::{parse_destination_ids, Destination, DestinationInfo, DestinationKind};
pub use encoding::EncodingConfig;
pub use job::{Job, JobId, JobStatus, Overlay};
pub use outcome::{JobRecord, PublishOutcome};
pub use schedule::parse_schedule_time;
pub use submission::{
    validate_destinations, validate_locator, LogoUpload, SubmissionAck, SubmitJobRequest,
    ValidatedSubmission, ValidationError, DEFAULT_CAPTION, DEFAULT_OVERLAY_TEXT,
};

//! Job submission requests and validation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use url::Url;

use crate::{parse_destination_ids, parse_schedule_time, Destination, DestinationKind, JobId};

/// Overlay text used when the submitter provides none.
pub const DEFAULT_OVERLAY_TEXT: &str = "Default Text";

/// Post caption used when the submitter provides none.
pub const DEFAULT_CAPTION: &str = "Check out this cool video!";

/// Maximum accepted locator length.
const MAX_LOCATOR_LENGTH: usize = 2048;

/// Submission rejected before a job was created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing media locator")]
    MissingLocator,

    #[error("Invalid media locator: {0}")]
    InvalidLocator(String),

    #[error("Unsupported locator scheme '{0}', only http and https are allowed")]
    UnsupportedScheme(String),

    #[error("At least one destination is required")]
    EmptyDestinations,

    #[error("Destination id cannot be empty")]
    EmptyDestinationId,

    #[error("Duplicate destination id: {0}")]
    DuplicateDestination(String),

    #[error("Logo file is required")]
    MissingLogo,

    #[error("Invalid schedule time: {0}")]
    InvalidSchedule(String),
}

/// Logo image uploaded with a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LogoUpload {
    /// Original filename; only its extension is kept
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl LogoUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercased extension of the uploaded filename, with the leading dot,
    /// or an empty string. Non-alphanumeric extensions are dropped.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

/// A job submission as received from the request-handling layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitJobRequest {
    pub media_locator: String,
    #[serde(default)]
    pub logo: Option<LogoUpload>,
    #[serde(default)]
    pub overlay_text: Option<String>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub caption: Option<String>,
    /// RFC 3339 or naive ISO-8601 date-time
    pub scheduled_at: String,
}

/// Submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub media_locator: String,
    pub logo: LogoUpload,
    pub overlay_text: String,
    pub destinations: Vec<Destination>,
    pub caption: String,
    pub scheduled_at: DateTime<Utc>,
}

impl SubmitJobRequest {
    /// Append destinations from a comma-separated id field.
    pub fn with_destination_ids(mut self, kind: DestinationKind, csv: &str) -> Self {
        self.destinations.extend(parse_destination_ids(kind, csv));
        self
    }

    /// Validate the request and apply defaults.
    pub fn validate(self) -> Result<ValidatedSubmission, ValidationError> {
        let media_locator = validate_locator(&self.media_locator)?;
        validate_destinations(&self.destinations)?;

        let logo = match self.logo {
            Some(logo) if !logo.bytes.is_empty() && !logo.filename.trim().is_empty() => logo,
            _ => return Err(ValidationError::MissingLogo),
        };

        let scheduled_at = parse_schedule_time(&self.scheduled_at)
            .ok_or_else(|| ValidationError::InvalidSchedule(self.scheduled_at.clone()))?;

        Ok(ValidatedSubmission {
            media_locator,
            logo,
            overlay_text: self
                .overlay_text
                .unwrap_or_else(|| DEFAULT_OVERLAY_TEXT.to_string()),
            destinations: self.destinations,
            caption: self.caption.unwrap_or_else(|| DEFAULT_CAPTION.to_string()),
            scheduled_at,
        })
    }
}

/// Validate a media locator and return it trimmed.
pub fn validate_locator(locator: &str) -> Result<String, ValidationError> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(ValidationError::MissingLocator);
    }
    if locator.len() > MAX_LOCATOR_LENGTH {
        return Err(ValidationError::InvalidLocator(format!(
            "exceeds {} characters",
            MAX_LOCATOR_LENGTH
        )));
    }

    let parsed = Url::parse(locator).map_err(|e| ValidationError::InvalidLocator(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(ValidationError::UnsupportedScheme(scheme.to_string())),
    }
    if parsed.host_str().is_none() {
        return Err(ValidationError::InvalidLocator(
            "URL must have a host".to_string(),
        ));
    }

    Ok(locator.to_string())
}

/// Destination lists must be non-empty with unique, non-blank ids.
pub fn validate_destinations(destinations: &[Destination]) -> Result<(), ValidationError> {
    if destinations.is_empty() {
        return Err(ValidationError::EmptyDestinations);
    }

    let mut seen = HashSet::new();
    for dest in destinations {
        if dest.destination_id.trim().is_empty() {
            return Err(ValidationError::EmptyDestinationId);
        }
        if !seen.insert(dest.destination_id.as_str()) {
            return Err(ValidationError::DuplicateDestination(
                dest.destination_id.clone(),
            ));
        }
    }
    Ok(())
}

/// Accepted-for-scheduling acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmissionAck {
    pub job_id: JobId,
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
    pub destinations: Vec<Destination>,
}

impl SubmissionAck {
    pub fn new(job_id: JobId, scheduled_at: DateTime<Utc>, destinations: Vec<Destination>) -> Self {
        Self {
            job_id,
            message: "Video post scheduled successfully!".to_string(),
            scheduled_at,
            destinations,
        }
    }
}

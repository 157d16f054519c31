//! Publishing destinations.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of external publishing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// A page on a page-based social platform
    SocialPage,
    /// A channel on a video-hosting platform
    VideoHost,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::SocialPage => "social_page",
            DestinationKind::VideoHost => "video_host",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single publishing target, identified by kind and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Destination {
    pub kind: DestinationKind,
    pub destination_id: String,
}

impl Destination {
    pub fn new(kind: DestinationKind, destination_id: impl Into<String>) -> Self {
        Self {
            kind,
            destination_id: destination_id.into(),
        }
    }

    pub fn social_page(destination_id: impl Into<String>) -> Self {
        Self::new(DestinationKind::SocialPage, destination_id)
    }

    pub fn video_host(destination_id: impl Into<String>) -> Self {
        Self::new(DestinationKind::VideoHost, destination_id)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.destination_id)
    }
}

/// Entry returned by destination discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DestinationInfo {
    pub destination_id: String,
    pub display_name: String,
}

impl DestinationInfo {
    pub fn new(destination_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            destination_id: destination_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Parse a comma-separated id list (the form-field shape submitters send)
/// into destinations of one kind. Blank entries are dropped.
pub fn parse_destination_ids(kind: DestinationKind, csv: &str) -> Vec<Destination> {
    csv.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| Destination::new(kind, id))
        .collect()
}

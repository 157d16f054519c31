//! Destination discovery.

use async_trait::async_trait;

use reelpost_models::DestinationInfo;

use crate::error::WorkerResult;

/// Read-only lookup of destinations a submitter may choose from.
///
/// Existence of a destination is not checked at submission time; this is
/// discovery only.
#[async_trait]
pub trait DestinationDirectory: Send + Sync {
    async fn list_destinations(&self) -> WorkerResult<Vec<DestinationInfo>>;
}

/// Directory backed by a fixed list.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    entries: Vec<DestinationInfo>,
}

impl StaticDirectory {
    pub fn new(entries: Vec<DestinationInfo>) -> Self {
        Self { entries }
    }
}

impl Default for StaticDirectory {
    /// Sample pages used when no real directory is wired in.
    fn default() -> Self {
        Self::new(vec![
            DestinationInfo::new("123456789012345", "My First Awesome Page"),
            DestinationInfo::new("987654321098765", "My Second Business Page"),
            DestinationInfo::new("555555555555555", "Test Page for Videos"),
        ])
    }
}

#[async_trait]
impl DestinationDirectory for StaticDirectory {
    async fn list_destinations(&self) -> WorkerResult<Vec<DestinationInfo>> {
        Ok(self.entries.clone())
    }
}

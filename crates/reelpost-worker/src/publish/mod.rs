//! Destination publishing.
//!
//! One [`Publisher`] per destination kind. A failure is scoped to its
//! destination: [`PublisherSet::publish_all`] attempts every destination
//! exactly once and returns one outcome per destination, in order.

mod social_page;
mod video_host;

pub use social_page::SocialPagePublisher;
pub use video_host::VideoHostPublisher;

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use reelpost_models::{Destination, DestinationKind, PublishOutcome};

use crate::metrics;

/// Successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Identifier assigned by the remote platform
    pub remote_id: String,
}

impl PublishReceipt {
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Media file not available: {0}")]
    MediaUnavailable(PathBuf),

    #[error("No publisher registered for {0}")]
    NoPublisher(DestinationKind),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rejected by destination: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Posts a finished video to one kind of destination.
///
/// Implementations must not modify or delete `media_path`: the same file is
/// handed to every destination of the job.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        destination_id: &str,
        media_path: &Path,
        caption: &str,
    ) -> Result<PublishReceipt, PublishError>;
}

/// Check that the media file exists and is a readable regular file.
pub(crate) async fn ensure_media_readable(media_path: &Path) -> Result<u64, PublishError> {
    match tokio::fs::metadata(media_path).await {
        Ok(meta) if meta.is_file() => {
            tokio::fs::File::open(media_path).await?;
            Ok(meta.len())
        }
        _ => Err(PublishError::MediaUnavailable(media_path.to_path_buf())),
    }
}

/// Publishers keyed by destination kind.
#[derive(Clone)]
pub struct PublisherSet {
    publishers: HashMap<DestinationKind, Arc<dyn Publisher>>,
    timeout: Duration,
}

impl PublisherSet {
    /// Empty set; every publish fails until publishers are registered.
    pub fn new(timeout: Duration) -> Self {
        Self {
            publishers: HashMap::new(),
            timeout,
        }
    }

    /// Dry-run publishers for both destination kinds.
    pub fn dry_run(timeout: Duration) -> Self {
        Self::new(timeout)
            .with_publisher(DestinationKind::SocialPage, SocialPagePublisher::new())
            .with_publisher(DestinationKind::VideoHost, VideoHostPublisher::new())
    }

    pub fn with_publisher(mut self, kind: DestinationKind, publisher: impl Publisher + 'static) -> Self {
        self.publishers.insert(kind, Arc::new(publisher));
        self
    }

    pub fn with_shared(mut self, kind: DestinationKind, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.insert(kind, publisher);
        self
    }

    /// Publish to a single destination, bounded by the publish timeout.
    pub async fn publish_to(
        &self,
        destination: &Destination,
        media_path: &Path,
        caption: &str,
    ) -> PublishOutcome {
        let result = match self.publishers.get(&destination.kind) {
            None => Err(PublishError::NoPublisher(destination.kind)),
            Some(publisher) => {
                let attempt = publisher.publish(&destination.destination_id, media_path, caption);
                match tokio::time::timeout(self.timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(PublishError::Timeout(self.timeout)),
                }
            }
        };

        metrics::record_publish_attempt(destination.kind, result.is_ok());
        match result {
            Ok(receipt) => {
                info!(destination = %destination, remote_id = %receipt.remote_id, "Published");
                PublishOutcome::succeeded(destination.clone(), Some(receipt.remote_id))
            }
            Err(e) => {
                warn!(destination = %destination, "Publish failed: {}", e);
                PublishOutcome::failed(destination.clone(), e.to_string())
            }
        }
    }

    /// Attempt every destination once; outcomes keep the input order.
    pub async fn publish_all(
        &self,
        destinations: &[Destination],
        media_path: &Path,
        caption: &str,
        parallel: bool,
    ) -> Vec<PublishOutcome> {
        if parallel {
            join_all(
                destinations
                    .iter()
                    .map(|destination| self.publish_to(destination, media_path, caption)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(destinations.len());
            for destination in destinations {
                outcomes.push(self.publish_to(destination, media_path, caption).await);
            }
            outcomes
        }
    }
}

impl std::fmt::Debug for PublisherSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherSet")
            .field("kinds", &self.publishers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

use async_trait::async_trait;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use super::{ensure_media_readable, PublishError, PublishReceipt, Publisher};

/// Dry-run adapter for page-based social platforms.
///
/// Verifies the video is readable and logs the post it would make.
#[derive(Debug, Clone, Default)]
pub struct SocialPagePublisher;

impl SocialPagePublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Publisher for SocialPagePublisher {
    async fn publish(
        &self,
        destination_id: &str,
        media_path: &Path,
        caption: &str,
    ) -> Result<PublishReceipt, PublishError> {
        if destination_id.trim().is_empty() {
            return Err(PublishError::rejected("empty page id"));
        }
        let size = ensure_media_readable(media_path).await?;

        info!(
            page_id = destination_id,
            bytes = size,
            "Dry run: would post {} to page with caption {:?}",
            media_path.display(),
            caption
        );

        Ok(PublishReceipt::new(format!(
            "{}_{}",
            destination_id,
            Uuid::new_v4().simple()
        )))
    }
}

use async_trait::async_trait;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use super::{ensure_media_readable, PublishError, PublishReceipt, Publisher};

/// Longest title most video hosts accept.
const MAX_TITLE_CHARS: usize = 100;

/// Dry-run adapter for video-hosting channels.
///
/// The caption is used as both title and description.
#[derive(Debug, Clone, Default)]
pub struct VideoHostPublisher;

impl VideoHostPublisher {
    pub fn new() -> Self {
        Self
    }
}

fn title_from_caption(caption: &str) -> String {
    caption.chars().take(MAX_TITLE_CHARS).collect()
}

#[async_trait]
impl Publisher for VideoHostPublisher {
    async fn publish(
        &self,
        destination_id: &str,
        media_path: &Path,
        caption: &str,
    ) -> Result<PublishReceipt, PublishError> {
        if destination_id.trim().is_empty() {
            return Err(PublishError::rejected("empty channel id"));
        }
        let size = ensure_media_readable(media_path).await?;

        info!(
            channel_id = destination_id,
            bytes = size,
            title = %title_from_caption(caption),
            "Dry run: would upload {} with description {:?}",
            media_path.display(),
            caption
        );

        Ok(PublishReceipt::new(Uuid::new_v4().simple().to_string()))
    }
}

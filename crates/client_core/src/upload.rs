use std::{path::Path, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use shared::{
    domain::{MediaType, Story},
    protocol::CreateStoryRequest,
};
use tracing::{info, warn};

use crate::{feed::StoryFeed, StoriesApi, UploadError};

/// Turns a local image file into a stored story, then re-fetches the feed.
#[derive(Clone)]
pub struct UploadPipeline {
    api: Arc<dyn StoriesApi>,
}

impl UploadPipeline {
    pub fn new(api: Arc<dyn StoriesApi>) -> Self {
        Self { api }
    }

    /// Allow-list check on the file name alone; runs before any I/O.
    pub fn media_type_for(path: &Path) -> Result<MediaType, UploadError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(MediaType::from_extension)
            .ok_or_else(|| UploadError::UnsupportedMediaType {
                path: path.to_path_buf(),
            })
    }

    pub async fn upload(&self, path: &Path, feed: &mut StoryFeed) -> Result<Story, UploadError> {
        let media_type = Self::media_type_for(path)?;
        let _uploading = feed
            .uploading_flag()
            .try_acquire()
            .ok_or(UploadError::Busy)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(UploadError::Empty {
                path: path.to_path_buf(),
            });
        }

        let request = CreateStoryRequest::new(encode_data_url(media_type, &bytes), Utc::now());
        let story = self.api.create_story(&request).await.map_err(|err| {
            warn!(error = %err, path = %path.display(), "story upload failed");
            err
        })?;
        info!(id = %story.id, bytes = bytes.len(), "story uploaded");

        feed.refresh(self.api.as_ref()).await;
        Ok(story)
    }
}

pub fn encode_data_url(media_type: MediaType, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type.mime(), STANDARD.encode(bytes))
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{expiry_for, Story},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateStoryRequest, DeleteStoryRequest, DeleteStoryResponse, MISSING_STORY_ID,
        STORY_NOT_FOUND,
    },
};
use storage::{DeleteOutcome, Storage, StoryStore};
use tracing::{info, warn};

pub const UPLOADED_AT_OUT_OF_RANGE: &str = "uploadedAt out of range";

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn StoryStore>,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            store: Arc::new(storage),
        }
    }

    pub fn with_store(store: Arc<dyn StoryStore>) -> Self {
        Self { store }
    }
}

pub async fn list_stories(ctx: &ApiContext, now: DateTime<Utc>) -> Result<Vec<Story>, ApiError> {
    ctx.store.list_visible(now).await.map_err(internal)
}

/// Persists a story whose expiry is computed from the client-supplied
/// `uploadedAt`, not from the time the request arrived.
pub async fn create_story(ctx: &ApiContext, req: CreateStoryRequest) -> Result<Story, ApiError> {
    let image = req
        .image
        .filter(|image| !image.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Missing story image"))?;
    let uploaded_at = req
        .uploaded_at
        .ok_or_else(|| ApiError::validation("Missing uploadedAt"))?;
    if expiry_for(uploaded_at).is_none() {
        return Err(ApiError::validation(UPLOADED_AT_OUT_OF_RANGE));
    }

    let story = ctx
        .store
        .create_story(&image, uploaded_at)
        .await
        .map_err(internal)?;
    info!(id = %story.id, expires_at = %story.expires_at, "story created");
    Ok(story)
}

pub async fn delete_story(
    ctx: &ApiContext,
    req: DeleteStoryRequest,
) -> Result<DeleteStoryResponse, ApiError> {
    let id = req
        .id
        .filter(|id| !id.as_str().trim().is_empty())
        .ok_or_else(|| ApiError::validation(MISSING_STORY_ID))?;

    match ctx.store.delete_story(&id).await.map_err(internal)? {
        DeleteOutcome::Deleted => {
            info!(%id, "story deleted");
            Ok(DeleteStoryResponse { success: true })
        }
        DeleteOutcome::NotFound => Err(ApiError::not_found(STORY_NOT_FOUND)),
    }
}

pub async fn reap_expired(ctx: &ApiContext, now: DateTime<Utc>) -> Result<u64, ApiError> {
    ctx.store.reap_expired(now).await.map_err(internal)
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.store.health_check().await.map_err(|err| {
        warn!(error = %err, "storage health check failed");
        ApiError::new(ErrorCode::Unavailable, err.to_string())
    })
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StoryId;

pub const STORIES_ROUTE: &str = "/stories";
pub const HEALTH_ROUTE: &str = "/healthz";

pub const MISSING_STORY_ID: &str = "Missing story id";
pub const STORY_NOT_FOUND: &str = "Story not found";

/// Body of `POST /stories`. Fields are optional so a missing one is a
/// validation failure rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryRequest {
    #[serde(alias = "img", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl CreateStoryRequest {
    pub fn new(image: impl Into<String>, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            image: Some(image.into()),
            uploaded_at: Some(uploaded_at),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteStoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<StoryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteStoryResponse {
    pub success: bool,
}

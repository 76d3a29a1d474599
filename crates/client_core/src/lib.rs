use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{Story, StoryId},
    error::ApiError,
    protocol::{CreateStoryRequest, DeleteStoryRequest, STORIES_ROUTE},
};
use url::Url;

pub mod error;
pub mod feed;
pub mod gesture;
pub mod playback;
pub mod scheduler;
pub mod upload;
pub mod viewer;

pub use error::{ClientError, UploadError};
pub use feed::{BusyFlag, BusyGuard, RefreshOutcome, RefreshTicket, StoryFeed};
pub use gesture::{
    Cursor, GestureController, ListenerId, ListenerKind, PointerEvent, PointerHost, PointerKind,
    PointerPosition, SessionId,
};
pub use playback::{PlaybackController, PlaybackState, PlaybackView, TickOutcome, TickToken};
pub use scheduler::TickScheduler;
pub use upload::UploadPipeline;
pub use viewer::StoriesViewer;

/// Remote story operations the viewer depends on.
#[async_trait]
pub trait StoriesApi: Send + Sync {
    async fn list_stories(&self) -> Result<Vec<Story>, ClientError>;
    async fn create_story(&self, request: &CreateStoryRequest) -> Result<Story, ClientError>;
    async fn delete_story(&self, id: &StoryId) -> Result<(), ClientError>;
}

#[derive(Clone)]
pub struct HttpStoriesClient {
    http: Client,
    server_url: String,
}

impl HttpStoriesClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(server_url)?;
        Ok(Self {
            http: Client::new(),
            server_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn stories_url(&self) -> String {
        format!("{}{STORIES_ROUTE}", self.server_url)
    }
}

#[async_trait]
impl StoriesApi for HttpStoriesClient {
    async fn list_stories(&self) -> Result<Vec<Story>, ClientError> {
        let response = self.http.get(self.stories_url()).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn create_story(&self, request: &CreateStoryRequest) -> Result<Story, ClientError> {
        let response = self
            .http
            .post(self.stories_url())
            .json(request)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn delete_story(&self, id: &StoryId) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.stories_url())
            .json(&DeleteStoryRequest {
                id: Some(id.clone()),
            })
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiError>(&body) {
        Ok(err) => (Some(err.code), err.message),
        Err(_) => (None, body),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

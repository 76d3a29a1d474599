//! In-memory `StoriesApi` shared by the client unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use shared::{
    domain::{expiry_for, Story, StoryId},
    protocol::CreateStoryRequest,
};

use crate::{ClientError, StoriesApi};

#[derive(Default)]
pub struct FakeStoriesApi {
    stories: Mutex<Vec<Story>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub created: Mutex<Vec<CreateStoryRequest>>,
    fail_lists: Mutex<bool>,
    fail_creates: Mutex<bool>,
}

impl FakeStoriesApi {
    pub fn with_stories(stories: Vec<Story>) -> Arc<Self> {
        let api = Self::default();
        *api.stories.lock().unwrap() = stories;
        Arc::new(api)
    }

    pub fn fail_lists(&self, fail: bool) {
        *self.fail_lists.lock().unwrap() = fail;
    }

    pub fn fail_creates(&self, fail: bool) {
        *self.fail_creates.lock().unwrap() = fail;
    }

    pub fn push(&self, story: Story) {
        self.stories.lock().unwrap().insert(0, story);
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

fn unavailable() -> ClientError {
    ClientError::Api {
        status: 503,
        code: None,
        message: "store unavailable".to_string(),
    }
}

#[async_trait]
impl StoriesApi for FakeStoriesApi {
    async fn list_stories(&self) -> Result<Vec<Story>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_lists.lock().unwrap() {
            return Err(unavailable());
        }
        Ok(self.stories.lock().unwrap().clone())
    }

    async fn create_story(&self, request: &CreateStoryRequest) -> Result<Story, ClientError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_creates.lock().unwrap() {
            return Err(unavailable());
        }
        self.created.lock().unwrap().push(request.clone());
        let uploaded_at = request.uploaded_at.unwrap_or_else(Utc::now);
        let story = Story {
            id: StoryId::generate(),
            image: request.image.clone().unwrap_or_default(),
            uploaded_at,
            expires_at: expiry_for(uploaded_at).expect("in range"),
        };
        self.push(story.clone());
        Ok(story)
    }

    async fn delete_story(&self, id: &StoryId) -> Result<(), ClientError> {
        let mut stories = self.stories.lock().unwrap();
        let before = stories.len();
        stories.retain(|story| &story.id != id);
        if stories.len() == before {
            return Err(ClientError::NotFound);
        }
        Ok(())
    }
}

pub fn story_at(id: &str, uploaded_at: DateTime<Utc>) -> Story {
    Story {
        id: StoryId::from(id),
        image: format!("data:image/png;base64,{id}"),
        uploaded_at,
        expires_at: expiry_for(uploaded_at).expect("in range"),
    }
}

/// Newest first, one minute apart.
pub fn stories(ids: &[&str]) -> Vec<Story> {
    let newest = Utc::now();
    ids.iter()
        .enumerate()
        .map(|(i, id)| story_at(id, newest - ChronoDuration::minutes(i as i64)))
        .collect()
}

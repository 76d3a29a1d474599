use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a story stays servable after its upload instant.
pub const VISIBILITY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed on-screen time for a single story in the viewer.
pub const STORY_DISPLAY_DURATION: Duration = Duration::from_secs(5);

/// Cadence of playback progress ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Scroll distance per pixel of horizontal drag on the story rail.
pub const DRAG_SENSITIVITY: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(pub String);

impl StoryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: StoryId,
    pub image: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Story {
    /// A story is visible strictly before its expiry instant.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// `uploaded_at + VISIBILITY_WINDOW`, the only way an expiry is derived.
/// `None` when the sum falls outside the representable date range.
pub fn expiry_for(uploaded_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let window = chrono::Duration::from_std(VISIBILITY_WINDOW).ok()?;
    uploaded_at.checked_add_signed(window)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
}

impl MediaType {
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(MediaType::Png),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "webp" => Some(MediaType::Webp),
            _ => None,
        }
    }
}

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{expiry_for, Story, StoryId};

/// Result of a delete by identifier. A repeated delete of the same id
/// reports `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Persistence contract for stories. Listing filters on expiry itself and
/// never relies on the reaper having run.
#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn list_visible(&self, now: DateTime<Utc>) -> Result<Vec<Story>>;
    async fn create_story(&self, image: &str, uploaded_at: DateTime<Utc>) -> Result<Story>;
    async fn delete_story(&self, id: &StoryId) -> Result<DeleteOutcome>;
    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<u64>;
    async fn health_check(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

const STORY_COLUMNS: &str = "id, image, uploaded_at_ms, expires_at_ms";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        // Schema and the expiry index are set up here once, never per write.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Raw pool access for tests and maintenance tooling.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_visible(&self, now: DateTime<Utc>) -> Result<Vec<Story>> {
        let rows = sqlx::query(&format!(
            "SELECT {STORY_COLUMNS}
             FROM stories
             WHERE expires_at_ms > ?
             ORDER BY uploaded_at_ms DESC, seq ASC"
        ))
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .context("failed to list visible stories")?;

        rows.iter().map(story_from_row).collect()
    }

    /// Not part of `StoryStore`; used by tests.
    pub async fn count_visible(&self, now: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stories WHERE expires_at_ms > ?")
            .bind(now.timestamp_millis())
            .fetch_one(&self.pool)
            .await
            .context("failed to count visible stories")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Looks up a story that is still visible at `now`; expired rows that the
    /// reaper has not yet removed are reported as absent. Not part of
    /// `StoryStore`, so no route serves it.
    pub async fn get_story(&self, id: &StoryId, now: DateTime<Utc>) -> Result<Option<Story>> {
        let row = sqlx::query(&format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE id = ? AND expires_at_ms > ?"
        ))
        .bind(id.as_str())
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load story {id}"))?;

        row.as_ref().map(story_from_row).transpose()
    }

    pub async fn create_story(&self, image: &str, uploaded_at: DateTime<Utc>) -> Result<Story> {
        // Rows hold millisecond precision; return exactly what a later list sees.
        let uploaded_at = uploaded_at.trunc_subsecs(3);
        let expires_at = expiry_for(uploaded_at)
            .ok_or_else(|| anyhow!("expiry for upload time {uploaded_at} is out of range"))?;
        let story = Story {
            id: StoryId::generate(),
            image: image.to_string(),
            uploaded_at,
            expires_at,
        };

        sqlx::query(
            "INSERT INTO stories (id, image, uploaded_at_ms, expires_at_ms) VALUES (?, ?, ?, ?)",
        )
        .bind(story.id.as_str())
        .bind(&story.image)
        .bind(story.uploaded_at.timestamp_millis())
        .bind(story.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("failed to insert story")?;

        debug!(id = %story.id, expires_at = %story.expires_at, "story stored");
        Ok(story)
    }

    pub async fn delete_story(&self, id: &StoryId) -> Result<DeleteOutcome> {
        let result = sqlx::query("DELETE FROM stories WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete story {id}"))?;

        Ok(if result.rows_affected() == 0 {
            DeleteOutcome::NotFound
        } else {
            DeleteOutcome::Deleted
        })
    }

    /// Physically removes every story whose expiry is at or before `now`.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM stories WHERE expires_at_ms <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .context("failed to reap expired stories")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StoryStore for Storage {
    async fn list_visible(&self, now: DateTime<Utc>) -> Result<Vec<Story>> {
        Storage::list_visible(self, now).await
    }

    async fn create_story(&self, image: &str, uploaded_at: DateTime<Utc>) -> Result<Story> {
        Storage::create_story(self, image, uploaded_at).await
    }

    async fn delete_story(&self, id: &StoryId) -> Result<DeleteOutcome> {
        Storage::delete_story(self, id).await
    }

    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        Storage::reap_expired(self, now).await
    }

    async fn health_check(&self) -> Result<()> {
        Storage::health_check(self).await
    }
}

fn story_from_row(row: &SqliteRow) -> Result<Story> {
    let uploaded_at_ms: i64 = row.try_get("uploaded_at_ms")?;
    let expires_at_ms: i64 = row.try_get("expires_at_ms")?;
    Ok(Story {
        id: StoryId(row.try_get("id")?),
        image: row.try_get("image")?,
        uploaded_at: timestamp_from_millis(uploaded_at_ms)?,
        expires_at: timestamp_from_millis(expires_at_ms)?,
    })
}

fn timestamp_from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

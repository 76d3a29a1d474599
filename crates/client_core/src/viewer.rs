use std::{path::Path, sync::Arc, time::Duration};

use shared::domain::{Story, StoryId, STORY_DISPLAY_DURATION, TICK_INTERVAL};
use tokio::{sync::mpsc::UnboundedReceiver, time::Instant};
use tracing::{debug, info};

use crate::{
    feed::{RefreshOutcome, StoryFeed},
    playback::{PlaybackController, PlaybackState, TickOutcome, TickToken},
    scheduler::TickScheduler,
    upload::UploadPipeline,
    ClientError, StoriesApi, UploadError,
};

/// The story strip plus its full-screen player. After every transition the
/// tick task is brought in line with the controller's active token, so at
/// most one timer ever drives playback.
pub struct StoriesViewer {
    api: Arc<dyn StoriesApi>,
    feed: StoryFeed,
    playback: PlaybackController,
    scheduler: TickScheduler,
    ticks: UnboundedReceiver<TickToken>,
    uploader: UploadPipeline,
}

impl StoriesViewer {
    pub fn new(api: Arc<dyn StoriesApi>) -> Self {
        Self::with_timing(api, STORY_DISPLAY_DURATION, TICK_INTERVAL)
    }

    pub fn with_timing(api: Arc<dyn StoriesApi>, display: Duration, tick: Duration) -> Self {
        let (scheduler, ticks) = TickScheduler::new(tick);
        Self {
            uploader: UploadPipeline::new(Arc::clone(&api)),
            api,
            feed: StoryFeed::new(),
            playback: PlaybackController::new(display),
            scheduler,
            ticks,
        }
    }

    pub fn feed(&self) -> &StoryFeed {
        &self.feed
    }

    pub fn stories(&self) -> &[Story] {
        self.feed.stories()
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn refresh(&mut self) -> RefreshOutcome {
        let outcome = self.feed.refresh(self.api.as_ref()).await;
        if matches!(outcome, RefreshOutcome::Updated { .. }) {
            self.playback.replace_stories(self.feed.stories().to_vec());
            self.sync();
        }
        outcome
    }

    pub async fn upload(&mut self, path: &Path) -> Result<Story, UploadError> {
        let story = self.uploader.upload(path, &mut self.feed).await?;
        self.playback.replace_stories(self.feed.stories().to_vec());
        self.sync();
        Ok(story)
    }

    pub async fn delete(&mut self, id: &StoryId) -> Result<(), ClientError> {
        self.api.delete_story(id).await?;
        info!(id = %id, "story deleted");
        self.refresh().await;
        Ok(())
    }

    pub fn select(&mut self, id: &StoryId) -> bool {
        let opened = self.playback.select(id, Instant::now());
        self.sync();
        opened
    }

    pub fn advance(&mut self) -> PlaybackState {
        let state = self.playback.advance(Instant::now());
        self.sync();
        state
    }

    pub fn retreat(&mut self) -> PlaybackState {
        let state = self.playback.retreat(Instant::now());
        self.sync();
        state
    }

    pub fn pause(&mut self) -> PlaybackState {
        let state = self.playback.pause(Instant::now());
        self.sync();
        state
    }

    pub fn resume(&mut self) -> PlaybackState {
        let state = self.playback.resume(Instant::now());
        self.sync();
        state
    }

    pub fn toggle_pause(&mut self) -> PlaybackState {
        let state = self.playback.toggle_pause(Instant::now());
        self.sync();
        state
    }

    pub fn close(&mut self) -> PlaybackState {
        let state = self.playback.close();
        self.sync();
        state
    }

    pub fn apply_tick(&mut self, token: TickToken) -> TickOutcome {
        let outcome = self.playback.tick(token, Instant::now());
        match outcome {
            TickOutcome::Advanced { index } => debug!(index, "story finished; advancing"),
            TickOutcome::Closed => debug!("last story finished; closing viewer"),
            TickOutcome::Progressed(_) | TickOutcome::Ignored => {}
        }
        self.sync();
        outcome
    }

    /// Waits for the next tick while playback is running. Returns `None`
    /// straight away when nothing is scheduled.
    pub async fn next_tick(&mut self) -> Option<TickOutcome> {
        self.playback.active_token()?;
        let token = self.ticks.recv().await?;
        Some(self.apply_tick(token))
    }

    /// Drives playback until the viewer closes or is paused, reporting each
    /// tick that changed something.
    pub async fn play<F>(&mut self, mut on_tick: F)
    where
        F: FnMut(TickOutcome, &PlaybackController),
    {
        while let Some(outcome) = self.next_tick().await {
            if outcome != TickOutcome::Ignored {
                on_tick(outcome, &self.playback);
            }
        }
    }

    fn sync(&mut self) {
        self.scheduler.sync(self.playback.active_token());
    }
}

#[cfg(test)]
#[path = "tests/viewer_tests.rs"]
mod tests;

//! Timed slideshow state machine for the full-screen story viewer.
//!
//! The controller is driven with explicit instants so it can be exercised
//! without a runtime. Progress is always derived from the time elapsed since
//! a recorded start instant; ticks only sample it. Every transition that
//! changes what is being timed bumps a generation counter, and a
//! [`TickToken`] from an older generation is ignored.

use std::time::Duration;

use shared::domain::{Story, StoryId, STORY_DISPLAY_DURATION};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackState {
    Closed,
    Showing {
        index: usize,
        progress: f64,
        paused: bool,
    },
}

/// Identity of the tick stream that is allowed to mutate the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken {
    generation: u64,
    index: usize,
}

impl TickToken {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Progressed(f64),
    Advanced { index: usize },
    Closed,
    /// Stale token, closed controller, or paused playback.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct PlaybackView<'a> {
    pub story: &'a Story,
    pub index: usize,
    pub total: usize,
    pub progress: f64,
    pub paused: bool,
}

#[derive(Debug)]
pub struct PlaybackController {
    stories: Vec<Story>,
    state: PlaybackState,
    duration: Duration,
    started_at: Option<Instant>,
    generation: u64,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(STORY_DISPLAY_DURATION)
    }
}

impl PlaybackController {
    pub fn new(duration: Duration) -> Self {
        Self {
            stories: Vec::new(),
            state: PlaybackState::Closed,
            duration: duration.max(Duration::from_millis(1)),
            started_at: None,
            generation: 0,
        }
    }

    pub fn with_stories(duration: Duration, stories: Vec<Story>) -> Self {
        let mut controller = Self::new(duration);
        controller.stories = stories;
        controller
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, PlaybackState::Showing { .. })
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            PlaybackState::Showing { index, .. } => Some(index),
            PlaybackState::Closed => None,
        }
    }

    pub fn current(&self) -> Option<&Story> {
        self.current_index().and_then(|index| self.stories.get(index))
    }

    pub fn view(&self) -> Option<PlaybackView<'_>> {
        let PlaybackState::Showing {
            index,
            progress,
            paused,
        } = self.state
        else {
            return None;
        };
        self.stories.get(index).map(|story| PlaybackView {
            story,
            index,
            total: self.stories.len(),
            progress,
            paused,
        })
    }

    pub fn has_previous(&self) -> bool {
        matches!(self.current_index(), Some(index) if index > 0)
    }

    pub fn has_next(&self) -> bool {
        matches!(self.current_index(), Some(index) if index + 1 < self.stories.len())
    }

    /// Fill fraction of each progress-bar segment: finished stories are full,
    /// the active one shows its progress, later ones are empty.
    pub fn segments(&self) -> Vec<f64> {
        let (current, progress) = match self.state {
            PlaybackState::Showing {
                index, progress, ..
            } => (Some(index), progress),
            PlaybackState::Closed => (None, 0.0),
        };
        (0..self.stories.len())
            .map(|i| match current {
                Some(index) if i < index => 1.0,
                Some(index) if i == index => progress.clamp(0.0, 1.0),
                _ => 0.0,
            })
            .collect()
    }

    /// The token a running scheduler must carry, or `None` when nothing
    /// should tick.
    pub fn active_token(&self) -> Option<TickToken> {
        match self.state {
            PlaybackState::Showing {
                index,
                paused: false,
                ..
            } => Some(TickToken {
                generation: self.generation,
                index,
            }),
            _ => None,
        }
    }

    /// Swaps in a freshly fetched list. The active story keeps playing at its
    /// new position; if it is gone the viewer closes.
    pub fn replace_stories(&mut self, stories: Vec<Story>) {
        let current_id = self.current().map(|story| story.id.clone());
        self.stories = stories;

        let Some(current_id) = current_id else {
            return;
        };
        match self.position_of(&current_id) {
            Some(new_index) => {
                if let PlaybackState::Showing { index, .. } = &mut self.state {
                    if *index != new_index {
                        *index = new_index;
                        self.generation += 1;
                    }
                }
            }
            None => {
                debug!(id = %current_id, "active story left the feed; closing viewer");
                self.close();
            }
        }
    }

    /// Opens (or jumps to) `id` from the beginning. Returns `false` when the
    /// story is not in the current list, including when the list is empty.
    pub fn select(&mut self, id: &StoryId, now: Instant) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.show(index, now);
                true
            }
            None => false,
        }
    }

    pub fn tick(&mut self, token: TickToken, now: Instant) -> TickOutcome {
        let PlaybackState::Showing {
            index,
            paused: false,
            ..
        } = self.state
        else {
            return TickOutcome::Ignored;
        };
        if token.generation != self.generation || token.index != index {
            return TickOutcome::Ignored;
        }

        let progress = self.elapsed_fraction(now);
        if progress >= 1.0 {
            return match self.advance(now) {
                PlaybackState::Showing { index, .. } => TickOutcome::Advanced { index },
                PlaybackState::Closed => TickOutcome::Closed,
            };
        }

        self.state = PlaybackState::Showing {
            index,
            progress,
            paused: false,
        };
        TickOutcome::Progressed(progress)
    }

    pub fn advance(&mut self, now: Instant) -> PlaybackState {
        if let PlaybackState::Showing { index, .. } = self.state {
            if index + 1 < self.stories.len() {
                self.show(index + 1, now);
            } else {
                self.close();
            }
        }
        self.state
    }

    /// Steps back one story; a no-op on the first story.
    pub fn retreat(&mut self, now: Instant) -> PlaybackState {
        if let PlaybackState::Showing { index, .. } = self.state {
            if index > 0 {
                self.show(index - 1, now);
            }
        }
        self.state
    }

    pub fn pause(&mut self, now: Instant) -> PlaybackState {
        if let PlaybackState::Showing {
            index,
            paused: false,
            ..
        } = self.state
        {
            let progress = self.elapsed_fraction(now).min(1.0);
            self.state = PlaybackState::Showing {
                index,
                progress,
                paused: true,
            };
            self.started_at = None;
            self.generation += 1;
        }
        self.state
    }

    /// Continues from the paused fraction; time spent paused is not counted.
    pub fn resume(&mut self, now: Instant) -> PlaybackState {
        if let PlaybackState::Showing {
            index,
            progress,
            paused: true,
        } = self.state
        {
            let already_shown = self.duration.mul_f64(progress);
            self.started_at = Some(now.checked_sub(already_shown).unwrap_or(now));
            self.state = PlaybackState::Showing {
                index,
                progress,
                paused: false,
            };
            self.generation += 1;
        }
        self.state
    }

    pub fn toggle_pause(&mut self, now: Instant) -> PlaybackState {
        match self.state {
            PlaybackState::Showing { paused: true, .. } => self.resume(now),
            _ => self.pause(now),
        }
    }

    pub fn close(&mut self) -> PlaybackState {
        self.state = PlaybackState::Closed;
        self.started_at = None;
        self.generation += 1;
        self.state
    }

    fn show(&mut self, index: usize, now: Instant) {
        self.state = PlaybackState::Showing {
            index,
            progress: 0.0,
            paused: false,
        };
        self.started_at = Some(now);
        self.generation += 1;
    }

    fn elapsed_fraction(&self, now: Instant) -> f64 {
        let Some(started_at) = self.started_at else {
            return match self.state {
                PlaybackState::Showing { progress, .. } => progress,
                PlaybackState::Closed => 0.0,
            };
        };
        now.saturating_duration_since(started_at).as_secs_f64() / self.duration.as_secs_f64()
    }

    fn position_of(&self, id: &StoryId) -> Option<usize> {
        self.stories.iter().position(|story| &story.id == id)
    }
}

#[cfg(test)]
#[path = "tests/playback_tests.rs"]
mod tests;

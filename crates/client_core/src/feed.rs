//! Last-known story list plus the loading/uploading indicators that sit
//! next to it in the viewer.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use shared::domain::Story;
use tracing::{debug, warn};

use crate::{ClientError, StoriesApi};

/// Shared in-progress indicator. It reads as set while at least one
/// [`BusyGuard`] is alive, so it is cleared on every exit path of the work
/// that holds it.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicUsize>);

impl BusyFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }

    pub fn acquire(&self) -> BusyGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        BusyGuard(Arc::clone(&self.0))
    }

    /// Exclusive variant: fails while any other guard is alive.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }
}

#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicUsize>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle for one in-flight list fetch. Holding it keeps the loading flag set.
#[derive(Debug)]
pub struct RefreshTicket {
    seq: u64,
    _loading: BusyGuard,
}

impl RefreshTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { count: usize },
    /// A newer fetch already landed; this result was discarded.
    Stale,
    /// The fetch failed; the last-known list is kept.
    Failed,
}

#[derive(Debug, Default)]
pub struct StoryFeed {
    stories: Vec<Story>,
    loading: BusyFlag,
    uploading: BusyFlag,
    issued: u64,
    applied: u64,
    last_error: Option<String>,
}

impl StoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.is_set()
    }

    pub fn uploading_flag(&self) -> BusyFlag {
        self.uploading.clone()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket {
            seq: self.issued,
            _loading: self.loading.acquire(),
        }
    }

    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<Story>, ClientError>,
    ) -> RefreshOutcome {
        if ticket.seq <= self.applied {
            debug!(seq = ticket.seq, applied = self.applied, "discarding stale story list");
            return RefreshOutcome::Stale;
        }

        match result {
            Ok(stories) => {
                self.applied = ticket.seq;
                self.stories = stories;
                self.last_error = None;
                RefreshOutcome::Updated {
                    count: self.stories.len(),
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch stories; keeping last-known list");
                self.last_error = Some(err.to_string());
                RefreshOutcome::Failed
            }
        }
    }

    /// Full re-fetch of the visible list.
    pub async fn refresh(&mut self, api: &dyn StoriesApi) -> RefreshOutcome {
        let ticket = self.begin_refresh();
        let result = api.list_stories().await;
        self.complete_refresh(ticket, result)
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;

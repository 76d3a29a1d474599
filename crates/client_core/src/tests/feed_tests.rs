use super::*;
use crate::test_support::{stories, FakeStoriesApi};

fn unavailable() -> ClientError {
    ClientError::Api {
        status: 503,
        code: None,
        message: "down".to_string(),
    }
}

#[test]
fn loading_flag_tracks_outstanding_tickets() {
    let mut feed = StoryFeed::new();
    assert!(!feed.is_loading());

    let first = feed.begin_refresh();
    let second = feed.begin_refresh();
    assert!(feed.is_loading());
    assert!(second.seq() > first.seq());

    feed.complete_refresh(first, Ok(Vec::new()));
    assert!(feed.is_loading());
    feed.complete_refresh(second, Ok(Vec::new()));
    assert!(!feed.is_loading());
}

#[test]
fn older_fetch_landing_late_is_discarded() {
    let mut feed = StoryFeed::new();
    let older = feed.begin_refresh();
    let newer = feed.begin_refresh();

    assert_eq!(
        feed.complete_refresh(newer, Ok(stories(&["b", "a"]))),
        RefreshOutcome::Updated { count: 2 }
    );
    assert_eq!(
        feed.complete_refresh(older, Ok(stories(&["a"]))),
        RefreshOutcome::Stale
    );
    assert_eq!(feed.stories().len(), 2);
    assert!(!feed.is_loading());
}

#[test]
fn failed_fetch_keeps_last_known_list() {
    let mut feed = StoryFeed::new();
    let ticket = feed.begin_refresh();
    feed.complete_refresh(ticket, Ok(stories(&["a"])));

    let ticket = feed.begin_refresh();
    assert_eq!(
        feed.complete_refresh(ticket, Err(unavailable())),
        RefreshOutcome::Failed
    );
    assert_eq!(feed.stories().len(), 1);
    assert!(feed.last_error().is_some());
    assert!(!feed.is_loading());

    let ticket = feed.begin_refresh();
    feed.complete_refresh(ticket, Ok(Vec::new()));
    assert!(feed.last_error().is_none());
    assert!(feed.stories().is_empty());
}

#[test]
fn exclusive_flag_refuses_second_holder() {
    let flag = BusyFlag::default();
    let guard = flag.try_acquire().unwrap();
    assert!(flag.is_set());
    assert!(flag.try_acquire().is_none());

    drop(guard);
    assert!(!flag.is_set());
    assert!(flag.try_acquire().is_some());
}

#[tokio::test]
async fn refresh_pulls_list_from_api() {
    let api = FakeStoriesApi::with_stories(stories(&["c", "b", "a"]));
    let mut feed = StoryFeed::new();

    assert_eq!(
        feed.refresh(api.as_ref()).await,
        RefreshOutcome::Updated { count: 3 }
    );
    assert_eq!(feed.stories()[0].id.as_str(), "c");

    api.fail_lists(true);
    assert_eq!(feed.refresh(api.as_ref()).await, RefreshOutcome::Failed);
    assert_eq!(feed.stories().len(), 3);
    assert!(!feed.is_loading());
    assert_eq!(api.list_count(), 2);
}

use std::sync::Arc;
use std::time::Duration;

use clinic_core::model::{LikertAnswer, QuestionId, SessionId, SurveyProgress};
use clinic_core::time::fixed_now;
use services::{
    ApiError, InMemoryProgressApi, MemorySink, ProgressApi, ProgressAutosaveTracker,
    ProgressEvent, SkipReason,
};
use storage::repository::InMemorySessionStore;

fn build_progress() -> SurveyProgress {
    SurveyProgress::new(SessionId::new("placeholder"), 15, fixed_now()).unwrap()
}

fn build_tracker(
    api: &InMemoryProgressApi,
) -> (Arc<ProgressAutosaveTracker>, MemorySink) {
    let sink = MemorySink::new();
    let tracker = ProgressAutosaveTracker::new(
        Arc::new(api.clone()),
        Arc::new(InMemorySessionStore::new()),
    )
    .with_sink(Arc::new(sink.clone()));
    (Arc::new(tracker), sink)
}

#[tokio::test]
async fn starting_twice_issues_one_create_call() {
    let api = InMemoryProgressApi::new();
    let (tracker, _sink) = build_tracker(&api);

    let mut progress = build_progress();
    let first = tracker.start(&mut progress).await.unwrap();

    let mut rerendered = build_progress();
    let second = tracker.start(&mut rerendered).await.unwrap();

    assert_eq!(api.create_calls(), 1);
    assert_eq!(first, second);
    assert_eq!(rerendered.session_id(), &first);
}

#[tokio::test]
async fn complete_clears_session_and_next_start_creates_fresh() {
    let api = InMemoryProgressApi::new();
    let (tracker, sink) = build_tracker(&api);

    let mut progress = build_progress();
    let first = tracker.start(&mut progress).await.unwrap();

    tracker.complete().await;

    assert_eq!(tracker.current_session_id().await, None);
    assert_eq!(api.delete_calls(), 1);
    assert!(sink.any(|e| matches!(e, ProgressEvent::SessionCompleted { .. })));

    let mut next = build_progress();
    let second = tracker.start(&mut next).await.unwrap();
    assert_eq!(api.create_calls(), 2);
    assert_ne!(first, second);
}

#[tokio::test]
async fn remote_snapshots_never_regress() {
    let api = InMemoryProgressApi::new();
    let (tracker, _sink) = build_tracker(&api);

    let mut progress = build_progress();
    let session_id = tracker.start(&mut progress).await.unwrap();

    for (step, (question, value)) in [("q1", 3), ("q2", 4), ("q3", 2), ("q4", 5), ("q5", 3)]
        .into_iter()
        .enumerate()
    {
        progress.record_answer(
            QuestionId::new(question),
            LikertAnswer::new(value).unwrap(),
            fixed_now(),
        );
        progress
            .advance_to(u32::try_from(step).unwrap() + 1, fixed_now())
            .unwrap();
        tracker.update(&progress).await;
    }

    let history = api.history(&session_id);
    assert_eq!(history.len(), 6); // initial snapshot plus five pushes

    for window in history.windows(2) {
        let (earlier, later) = (&window[0], &window[1]);
        assert!(later.current_step() >= earlier.current_step());
        for question in earlier.responses().keys() {
            assert!(
                later.responses().contains_key(question),
                "response for {question} regressed"
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn superseded_snapshot_is_dropped_not_reordered() {
    let api = InMemoryProgressApi::new();
    let (tracker, sink) = build_tracker(&api);

    let mut progress = build_progress();
    let session_id = tracker.start(&mut progress).await.unwrap();
    api.set_update_delay(Duration::from_secs(1));

    let mut v1 = progress.clone();
    v1.record_answer(QuestionId::new("q1"), LikertAnswer::new(3).unwrap(), fixed_now());
    v1.advance_to(1, fixed_now()).unwrap();
    let mut v2 = v1.clone();
    v2.record_answer(QuestionId::new("q2"), LikertAnswer::new(4).unwrap(), fixed_now());
    v2.advance_to(2, fixed_now()).unwrap();
    let mut v3 = v2.clone();
    v3.record_answer(QuestionId::new("q3"), LikertAnswer::new(2).unwrap(), fixed_now());
    v3.advance_to(3, fixed_now()).unwrap();

    // v1 occupies the send slot while v2 and v3 queue up behind it; by the
    // time v2 gets its turn a newer snapshot exists, so v2 must be dropped.
    let h1 = tokio::spawn({
        let tracker = Arc::clone(&tracker);
        async move { tracker.update(&v1).await }
    });
    tokio::task::yield_now().await;
    let h2 = tokio::spawn({
        let tracker = Arc::clone(&tracker);
        async move { tracker.update(&v2).await }
    });
    tokio::task::yield_now().await;
    let h3 = tokio::spawn({
        let tracker = Arc::clone(&tracker);
        async move { tracker.update(&v3).await }
    });

    h1.await.unwrap();
    h2.await.unwrap();
    h3.await.unwrap();

    let steps: Vec<u32> = api
        .history(&session_id)
        .iter()
        .map(|snapshot| snapshot.current_step())
        .collect();
    assert_eq!(steps, vec![0, 1, 3]);
    assert!(sink.any(|e| matches!(
        e,
        ProgressEvent::AutosaveSkipped {
            reason: SkipReason::Superseded,
            ..
        }
    )));
}

#[tokio::test]
async fn update_for_an_abandoned_session_is_discarded() {
    let api = InMemoryProgressApi::new();
    let (tracker, sink) = build_tracker(&api);

    let mut progress = build_progress();
    tracker.start(&mut progress).await.unwrap();
    tracker.clear_session().await;

    tracker.update(&progress).await;

    assert_eq!(api.update_calls(), 0);
    assert!(sink.any(|e| matches!(
        e,
        ProgressEvent::AutosaveSkipped {
            reason: SkipReason::StaleSession,
            ..
        }
    )));
}

#[tokio::test]
async fn expired_session_is_reported_and_non_fatal() {
    let api = InMemoryProgressApi::new();
    let (tracker, sink) = build_tracker(&api);

    let mut progress = build_progress();
    let session_id = tracker.start(&mut progress).await.unwrap();

    // The backend forgets the session (TTL expiry).
    api.delete_progress(&session_id).await.unwrap();

    tracker.update(&progress).await;

    assert!(sink.any(|e| matches!(e, ProgressEvent::SessionExpired { .. })));
    // The tracker does not restart a session on its own.
    assert_eq!(tracker.current_session_id().await, Some(session_id));
    assert_eq!(api.create_calls(), 1);
}

#[tokio::test]
async fn failed_remote_delete_still_clears_local_session() {
    let api = InMemoryProgressApi::new();
    let (tracker, sink) = build_tracker(&api);

    let mut progress = build_progress();
    tracker.start(&mut progress).await.unwrap();

    api.queue_failure(ApiError::server(500, "cleanup failed"));
    tracker.complete().await;

    assert_eq!(tracker.current_session_id().await, None);
    assert!(sink.any(|e| matches!(e, ProgressEvent::AutosaveFailed { .. })));
    assert!(sink.any(|e| matches!(e, ProgressEvent::SessionCompleted { .. })));
}

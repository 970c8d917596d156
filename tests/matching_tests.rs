mod common;

use amora::core::{CandidateSelector, MatchEngine};
use amora::models::{VoteChoice, VoteOutcome};
use amora::services::{MemoryStore, SessionStore};
use amora::EngineError;
use common::{profile, MockDelivery, MockDirectory};
use std::sync::Arc;

struct MatchHarness {
    engine: Arc<MatchEngine>,
    selector: CandidateSelector,
    store: Arc<MemoryStore>,
    delivery: Arc<MockDelivery>,
}

fn match_harness(profiles: Vec<amora::models::Profile>) -> MatchHarness {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MockDirectory::with_profiles(profiles));
    let delivery = Arc::new(MockDelivery::default());
    let engine = Arc::new(MatchEngine::new(
        store.clone(),
        directory.clone(),
        delivery.clone(),
    ));
    let selector = CandidateSelector::new(directory, store.clone());
    MatchHarness {
        engine,
        selector,
        store,
        delivery,
    }
}

#[tokio::test]
async fn test_mutual_like_fires_one_match_regardless_of_order() {
    for (first, second) in [("a", "b"), ("b", "a")] {
        let h = match_harness(vec![profile("a", "Alice"), profile("b", "Bob")]);

        let outcome = h.engine.vote(first, second, VoteChoice::Like).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Recorded);
        assert_eq!(h.delivery.count_containing("It's a match!").await, 0);

        let outcome = h.engine.vote(second, first, VoteChoice::Like).await.unwrap();
        assert_eq!(
            outcome,
            VoteOutcome::Matched { counterpart: first.to_string() }
        );
        assert_eq!(h.delivery.count_containing("It's a match!").await, 2);
    }
}

#[tokio::test]
async fn test_match_notifications_carry_the_counterpart_contact() {
    let h = match_harness(vec![profile("a", "Alice"), profile("b", "Bob")]);

    h.engine.vote("a", "b", VoteChoice::Like).await.unwrap();
    h.engine.vote("b", "a", VoteChoice::Like).await.unwrap();

    let to_a = h.delivery.texts_for("a").await;
    let to_b = h.delivery.texts_for("b").await;
    assert!(to_a.iter().any(|t| t.contains("@bob")), "got: {:?}", to_a);
    assert!(to_b.iter().any(|t| t.contains("@alice")), "got: {:?}", to_b);
}

#[tokio::test]
async fn test_racing_mutual_likes_fire_exactly_one_match() {
    // The race is scheduler-dependent; repeat to give it a chance to bite
    for _ in 0..25 {
        let h = match_harness(vec![profile("a", "Alice"), profile("b", "Bob")]);

        let e1 = h.engine.clone();
        let e2 = h.engine.clone();
        let v1 = tokio::spawn(async move { e1.vote("a", "b", VoteChoice::Like).await });
        let v2 = tokio::spawn(async move { e2.vote("b", "a", VoteChoice::Like).await });

        let o1 = v1.await.unwrap().unwrap();
        let o2 = v2.await.unwrap().unwrap();

        let matched = [&o1, &o2]
            .iter()
            .filter(|o| matches!(o, VoteOutcome::Matched { .. }))
            .count();
        assert_eq!(matched, 1, "outcomes: {:?} / {:?}", o1, o2);
        assert_eq!(h.delivery.count_containing("It's a match!").await, 2);
    }
}

#[tokio::test]
async fn test_dislike_never_matches() {
    let h = match_harness(vec![profile("a", "Alice"), profile("b", "Bob")]);

    h.engine.vote("a", "b", VoteChoice::Dislike).await.unwrap();
    let outcome = h.engine.vote("b", "a", VoteChoice::Like).await.unwrap();
    assert_eq!(outcome, VoteOutcome::Recorded);
    assert_eq!(h.delivery.count_containing("It's a match!").await, 0);
}

#[tokio::test]
async fn test_stale_display_rejects_without_recording() {
    let h = match_harness(vec![profile("a", "Alice"), profile("b", "Bob")]);

    h.engine.bind_display(10, "b").await.unwrap();
    h.engine
        .vote_on_display("a", 10, VoteChoice::Dislike)
        .await
        .unwrap();

    // The binding was consumed; pressing the stale button again changes
    // nothing
    let err = h
        .engine
        .vote_on_display("a", 10, VoteChoice::Like)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownCandidate));
    assert_eq!(
        h.store.vote_of("a", "b").await.unwrap(),
        Some(VoteChoice::Dislike)
    );
}

#[tokio::test]
async fn test_browse_then_vote_via_display_binding() {
    let h = match_harness(vec![profile("a", "Alice"), profile("b", "Bob")]);

    let candidate = h.selector.next("a").await.unwrap().unwrap();
    assert_eq!(candidate.user_id, "b");

    h.engine.bind_display(42, &candidate.user_id).await.unwrap();
    let outcome = h
        .engine
        .vote_on_display("a", 42, VoteChoice::Like)
        .await
        .unwrap();
    assert_eq!(outcome, VoteOutcome::Recorded);

    h.engine.vote("b", "a", VoteChoice::Like).await.unwrap();
    assert_eq!(h.delivery.count_containing("It's a match!").await, 2);

    // "b" was claimed on display; the selector moves on
    assert!(h.selector.next("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_selector_walks_directory_order_once() {
    let h = match_harness(vec![
        profile("a", "Alice"),
        profile("b", "Bob"),
        profile("c", "Cleo"),
        profile("d", "Dana"),
    ]);

    let mut seen = Vec::new();
    while let Some(candidate) = h.selector.next("a").await.unwrap() {
        seen.push(candidate.user_id);
    }
    assert_eq!(seen, vec!["b", "c", "d"]);
    assert!(h.selector.next("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_liked_by_review_pages_and_restarts() {
    let h = match_harness(vec![
        profile("a", "Alice"),
        profile("b", "Bob"),
        profile("c", "Cleo"),
    ]);

    h.engine.vote("b", "a", VoteChoice::Like).await.unwrap();
    h.engine.vote("c", "a", VoteChoice::Like).await.unwrap();
    assert_eq!(h.engine.liked_by_count("a").await.unwrap(), 2);

    assert_eq!(h.engine.start_review("a").await.unwrap().as_deref(), Some("b"));
    assert_eq!(h.engine.continue_review("a").await.unwrap().as_deref(), Some("c"));
    assert_eq!(h.engine.continue_review("a").await.unwrap(), None);

    // A fresh review replaces whatever was left of the previous one
    assert_eq!(h.engine.start_review("a").await.unwrap().as_deref(), Some("b"));
}

mod common;

use amora::core::{BatchEvent, IntakeInput};
use amora::models::{AttachmentRef, Gender, IntakeStep};
use amora::services::SessionStore;
use amora::EngineError;
use common::{intake_harness, wait_for_step, IntakeHarness};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn text(s: &str) -> IntakeInput {
    IntakeInput::Text(s.to_string())
}

fn photo(file_id: &str, batch_id: Option<&str>) -> IntakeInput {
    IntakeInput::Photo {
        attachment: AttachmentRef {
            file_id: file_id.to_string(),
        },
        batch_id: batch_id.map(|b| b.to_string()),
    }
}

/// Answer every step up to the photo prompt, taking the manual-city path.
async fn drive_to_photos(h: &IntakeHarness, user: &str) {
    h.intake.start(user, Some("ann".to_string())).await.unwrap();
    h.intake.handle(user, text("Ann")).await.unwrap();
    h.intake.handle(user, text("27")).await.unwrap();
    h.intake.handle(user, text("female")).await.unwrap();
    h.intake.handle(user, text("music, chess")).await.unwrap();
    h.intake.handle(user, text("manual")).await.unwrap();
    h.intake.handle(user, text("Riga")).await.unwrap();
}

async fn step_of(h: &IntakeHarness, user: &str) -> IntakeStep {
    h.store.load_session(user).await.unwrap().unwrap().step
}

#[tokio::test]
async fn test_non_numeric_age_rejects_without_advancing() {
    let h = intake_harness(None, Duration::from_millis(100));
    h.intake.start("7", None).await.unwrap();
    h.intake.handle("7", text("Ann")).await.unwrap();

    let err = h.intake.handle("7", text("abc")).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(step_of(&h, "7").await, IntakeStep::Age);

    h.intake.handle("7", text("27")).await.unwrap();
    let session = h.store.load_session("7").await.unwrap().unwrap();
    assert_eq!(session.step, IntakeStep::Gender);
    assert_eq!(session.draft.age, Some(27));
}

#[tokio::test]
async fn test_full_intake_persists_exactly_one_profile() {
    let h = intake_harness(None, Duration::from_millis(100));
    drive_to_photos(&h, "7").await;
    h.intake.handle("7", photo("p1", None)).await.unwrap();
    assert_eq!(step_of(&h, "7").await, IntakeStep::Preview);

    h.intake.handle("7", text("confirm")).await.unwrap();

    let created = h.directory.created.lock().await;
    assert_eq!(created.len(), 1);
    let profile = &created[0];
    assert_eq!(profile.user_id, "7");
    assert_eq!(profile.name, "Ann");
    assert_eq!(profile.age, 27);
    assert_eq!(profile.gender, Gender::Female);
    assert_eq!(profile.interests, vec!["music", "chess"]);
    assert_eq!(profile.city, "Riga");
    assert_eq!(profile.photos, vec!["p1.jpg"]);
    assert_eq!(profile.username.as_deref(), Some("ann"));

    // Session is gone and the rating pass ran once
    assert!(h.store.load_session("7").await.unwrap().is_none());
    assert_eq!(h.scoring.calls.load(Ordering::SeqCst), 1);

    // A later message finds no session and gets the /start hint
    h.intake.handle("7", text("hi again")).await.unwrap();
    let texts = h.delivery.texts_for("7").await;
    assert!(texts.last().unwrap().contains("/start"));
}

#[tokio::test]
async fn test_restart_at_preview_resets_to_name() {
    let h = intake_harness(None, Duration::from_millis(100));
    drive_to_photos(&h, "7").await;
    h.intake.handle("7", photo("p1", None)).await.unwrap();

    h.intake.handle("7", text("restart")).await.unwrap();

    let session = h.store.load_session("7").await.unwrap().unwrap();
    assert_eq!(session.step, IntakeStep::Name);
    assert!(session.draft.name.is_none());
    assert!(session.draft.photos.is_empty());
    assert!(h.directory.created.lock().await.is_empty());
}

#[tokio::test]
async fn test_shared_location_resolves_city() {
    let h = intake_harness(Some("Riga"), Duration::from_millis(100));
    h.intake.start("7", None).await.unwrap();
    h.intake.handle("7", text("Ann")).await.unwrap();
    h.intake.handle("7", text("27")).await.unwrap();
    h.intake.handle("7", text("female")).await.unwrap();
    h.intake.handle("7", text("music")).await.unwrap();

    h.intake
        .handle("7", IntakeInput::Location { latitude: 56.95, longitude: 24.11 })
        .await
        .unwrap();

    let session = h.store.load_session("7").await.unwrap().unwrap();
    assert_eq!(session.step, IntakeStep::Photos);
    assert_eq!(session.draft.city.as_deref(), Some("Riga"));
    assert_eq!(session.draft.latitude, Some(56.95));
    assert_eq!(session.draft.longitude, Some(24.11));
}

#[tokio::test]
async fn test_unresolvable_location_degrades_to_manual_entry() {
    let h = intake_harness(None, Duration::from_millis(100));
    h.intake.start("7", None).await.unwrap();
    h.intake.handle("7", text("Ann")).await.unwrap();
    h.intake.handle("7", text("27")).await.unwrap();
    h.intake.handle("7", text("female")).await.unwrap();
    h.intake.handle("7", text("music")).await.unwrap();

    h.intake
        .handle("7", IntakeInput::Location { latitude: 0.0, longitude: 0.0 })
        .await
        .unwrap();
    assert_eq!(step_of(&h, "7").await, IntakeStep::CityText);

    // Typed city anchors the profile to the default coordinates
    h.intake.handle("7", text("Riga")).await.unwrap();
    let session = h.store.load_session("7").await.unwrap().unwrap();
    assert_eq!(session.step, IntakeStep::Photos);
    assert_eq!(session.draft.city.as_deref(), Some("Riga"));
    assert_eq!(session.draft.latitude, Some(55.75));
    assert_eq!(session.draft.longitude, Some(37.61));
}

#[tokio::test(start_paused = true)]
async fn test_album_burst_coalesces_into_one_preview() {
    let h = intake_harness(None, Duration::from_millis(500));
    drive_to_photos(&h, "7").await;

    for id in ["p1", "p2", "p3"] {
        h.intake.handle("7", photo(id, Some("g1"))).await.unwrap();
    }

    wait_for_step(&h.store, "7", IntakeStep::Preview).await;
    let session = h.store.load_session("7").await.unwrap().unwrap();
    assert_eq!(session.draft.photos, vec!["p1.jpg", "p2.jpg", "p3.jpg"]);

    // One preview card, not one per album part
    let previews = h
        .delivery
        .sent
        .lock()
        .await
        .iter()
        .filter(|m| m.with_photo)
        .count();
    assert_eq!(previews, 1);
}

#[tokio::test]
async fn test_failed_photo_keeps_the_photo_step() {
    let h = intake_harness(None, Duration::from_millis(100));
    drive_to_photos(&h, "7").await;

    let err = h.intake.handle("7", photo("broken", None)).await.unwrap_err();
    assert!(matches!(err, EngineError::BatchIncomplete));
    assert_eq!(step_of(&h, "7").await, IntakeStep::Photos);

    // The step is still live: a good photo gets through afterwards
    h.intake.handle("7", photo("p1", None)).await.unwrap();
    assert_eq!(step_of(&h, "7").await, IntakeStep::Preview);
}

#[tokio::test]
async fn test_unreadable_preview_photo_apologizes_and_keeps_photo_step() {
    let h = intake_harness(None, Duration::from_millis(100));
    drive_to_photos(&h, "7").await;

    // The aggregator stores the photo fine; only the preview read fails
    h.media.fail_reads.store(true, Ordering::SeqCst);
    let before = h.delivery.texts_for("7").await.len();

    let err = h.intake.handle("7", photo("p1", None)).await.unwrap_err();
    assert!(matches!(err, EngineError::Upstream(_)));
    assert_eq!(step_of(&h, "7").await, IntakeStep::Photos);

    // The user is told to retry, not left in silence
    let texts = h.delivery.texts_for("7").await;
    assert_eq!(texts.len(), before + 1);
    assert!(texts.last().unwrap().contains("send them again"));

    // Retrying once the store recovers goes through
    h.media.fail_reads.store(false, Ordering::SeqCst);
    h.intake.handle("7", photo("p2", None)).await.unwrap();
    assert_eq!(step_of(&h, "7").await, IntakeStep::Preview);
}

#[tokio::test]
async fn test_empty_batch_reprompts_for_photos() {
    let h = intake_harness(None, Duration::from_millis(100));
    drive_to_photos(&h, "7").await;

    h.intake
        .complete_batch(BatchEvent {
            owner_id: "7".to_string(),
            result: Ok(vec![]),
        })
        .await
        .unwrap();

    assert_eq!(step_of(&h, "7").await, IntakeStep::Photos);
}

#[tokio::test]
async fn test_wrong_input_shape_reprompts_without_advancing() {
    let h = intake_harness(None, Duration::from_millis(100));
    h.intake.start("7", None).await.unwrap();
    h.intake.handle("7", text("Ann")).await.unwrap();

    h.intake.handle("7", photo("p1", None)).await.unwrap();
    assert_eq!(step_of(&h, "7").await, IntakeStep::Age);
}

#[tokio::test]
async fn test_event_without_session_suggests_start() {
    let h = intake_harness(None, Duration::from_millis(100));
    h.intake.handle("7", text("hello")).await.unwrap();

    let texts = h.delivery.texts_for("7").await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("/start"));
    assert!(h.store.load_session("7").await.unwrap().is_none());
}

#![allow(dead_code)]

// Shared mock collaborators for the integration tests. Each mock keeps the
// same contract as its production counterpart and records what it was
// asked to do.

use amora::core::{IntakeMachine, PhotoAggregator};
use amora::models::{AttachmentRef, Gender, Profile};
use amora::services::{
    Delivery, DeliveryError, DirectoryError, GeocodeError, Geocoder, MediaError, MemoryStore,
    ObjectStore, ProfileDirectory, ScoringError, ScoringService, SessionStore,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub fn profile(id: &str, name: &str) -> Profile {
    Profile {
        user_id: id.to_string(),
        name: name.to_string(),
        age: 25,
        gender: Gender::Female,
        interests: vec!["music".to_string()],
        city: "Riga".to_string(),
        latitude: 56.95,
        longitude: 24.11,
        photos: vec![],
        username: Some(name.to_lowercase()),
        created_at: None,
    }
}

/// Profile directory over in-memory vectors, listing in insertion order.
#[derive(Default)]
pub struct MockDirectory {
    pub profiles: Mutex<Vec<Profile>>,
    pub created: Mutex<Vec<Profile>>,
}

impl MockDirectory {
    pub fn with_profiles(profiles: Vec<Profile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
            created: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProfileDirectory for MockDirectory {
    async fn create(&self, profile: &Profile) -> Result<(), DirectoryError> {
        self.created.lock().await.push(profile.clone());
        self.profiles.lock().await.push(profile.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Profile, DirectoryError> {
        self.profiles
            .lock()
            .await
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(user_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Profile>, DirectoryError> {
        Ok(self.profiles.lock().await.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub user_id: String,
    pub text: String,
    pub with_photo: bool,
    pub message_id: i64,
}

/// Recording delivery channel. Attachment fetches resolve to the file id
/// bytes; the id "broken" simulates a transport fetch failure.
#[derive(Default)]
pub struct MockDelivery {
    pub sent: Mutex<Vec<SentMessage>>,
    next_id: AtomicI64,
}

impl MockDelivery {
    async fn record(&self, user_id: &str, text: &str, with_photo: bool) -> i64 {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().await.push(SentMessage {
            user_id: user_id.to_string(),
            text: text.to_string(),
            with_photo,
            message_id,
        });
        message_id
    }

    pub async fn texts_for(&self, user_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub async fn count_containing(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.text.contains(needle))
            .count()
    }
}

#[async_trait]
impl Delivery for MockDelivery {
    async fn send_text(&self, user_id: &str, text: &str) -> Result<i64, DeliveryError> {
        Ok(self.record(user_id, text, false).await)
    }

    async fn send_photo(&self, user_id: &str, _photo: &[u8], caption: &str) -> Result<i64, DeliveryError> {
        Ok(self.record(user_id, caption, true).await)
    }

    async fn send_media_group(
        &self,
        user_id: &str,
        _photos: &[Vec<u8>],
        caption: &str,
    ) -> Result<i64, DeliveryError> {
        Ok(self.record(user_id, caption, true).await)
    }

    async fn fetch_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, DeliveryError> {
        if attachment.file_id == "broken" {
            return Err(DeliveryError::ApiError("file gone".to_string()));
        }
        Ok(attachment.file_id.as_bytes().to_vec())
    }
}

/// In-memory object store keyed by "bucket/name". Reads can be switched to
/// fail to simulate a store that accepts writes but cannot serve objects.
#[derive(Default)]
pub struct MockMedia {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_reads: AtomicBool,
}

#[async_trait]
impl ObjectStore for MockMedia {
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), MediaError> {
        self.objects
            .lock()
            .await
            .insert(format!("{}/{}", bucket, name), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, MediaError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MediaError::ApiError("object store unavailable".to_string()));
        }
        self.objects
            .lock()
            .await
            .get(&format!("{}/{}", bucket, name))
            .cloned()
            .ok_or_else(|| MediaError::NotFound(format!("{}/{}", bucket, name)))
    }
}

/// Geocoder with a fixed answer.
pub struct MockGeocoder {
    pub city: Option<String>,
    pub fail: bool,
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn reverse(&self, _: f64, _: f64) -> Result<Option<String>, GeocodeError> {
        if self.fail {
            return Err(GeocodeError::ApiError("geocoder down".to_string()));
        }
        Ok(self.city.clone())
    }
}

/// Scoring service counting calls; optionally failing.
#[derive(Default)]
pub struct MockScoring {
    pub calls: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl ScoringService for MockScoring {
    async fn score(&self, _: &Profile) -> Result<f64, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ScoringError::ApiError("rating down".to_string()));
        }
        Ok(50.0)
    }
}

pub struct IntakeHarness {
    pub intake: Arc<IntakeMachine>,
    pub store: Arc<MemoryStore>,
    pub directory: Arc<MockDirectory>,
    pub delivery: Arc<MockDelivery>,
    pub media: Arc<MockMedia>,
    pub scoring: Arc<MockScoring>,
}

/// Wire an intake machine over mocks, with the batch pump running, the
/// same way main.rs wires the production pieces.
pub fn intake_harness(geocoded_city: Option<&str>, quiet_period: Duration) -> IntakeHarness {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MockDirectory::default());
    let delivery = Arc::new(MockDelivery::default());
    let media = Arc::new(MockMedia::default());
    let scoring = Arc::new(MockScoring::default());
    let geocoder = Arc::new(MockGeocoder {
        city: geocoded_city.map(|c| c.to_string()),
        fail: false,
    });

    let (aggregator, mut batch_events) = PhotoAggregator::new(
        delivery.clone(),
        media.clone(),
        "photos".to_string(),
        quiet_period,
    );

    let intake = Arc::new(IntakeMachine::new(
        store.clone(),
        directory.clone(),
        geocoder,
        scoring.clone(),
        media.clone(),
        delivery.clone(),
        aggregator,
        "photos".to_string(),
    ));

    {
        let intake = intake.clone();
        tokio::spawn(async move {
            while let Some(event) = batch_events.recv().await {
                let _ = intake.complete_batch(event).await;
            }
        });
    }

    IntakeHarness {
        intake,
        store,
        directory,
        delivery,
        media,
        scoring,
    }
}

/// Poll until the user's session reaches the given step, or panic after
/// the (virtual) deadline.
pub async fn wait_for_step(
    store: &Arc<MemoryStore>,
    user_id: &str,
    step: amora::models::IntakeStep,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let session = store.load_session(user_id).await.unwrap();
        if session.as_ref().map(|s| s.step) == Some(step) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session for {} never reached {:?} (now at {:?})",
            user_id,
            step,
            session.map(|s| s.step)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

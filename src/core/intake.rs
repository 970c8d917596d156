use crate::core::aggregator::{BatchEvent, PhotoAggregator, SubmitOutcome};
use crate::core::locks::KeyedLocks;
use crate::core::EngineError;
use crate::models::{
    AttachmentRef, ConversationSession, Gender, IntakeStep, Profile, ProfileDraft,
};
use crate::services::{Delivery, Geocoder, ObjectStore, ProfileDirectory, ScoringService, SessionStore};
use std::sync::Arc;

/// Coordinates recorded when the user types a city instead of sharing
/// location. The original flow anchors such profiles to a fixed point.
const DEFAULT_LATITUDE: f64 = 55.75;
const DEFAULT_LONGITUDE: f64 = 37.61;

/// Input shapes an intake step can receive.
#[derive(Debug, Clone)]
pub enum IntakeInput {
    Text(String),
    Location { latitude: f64, longitude: f64 },
    Photo { attachment: AttachmentRef, batch_id: Option<String> },
}

/// The profile intake conversation state machine.
///
/// Linear per user: every event for a user runs under that user's lock, so
/// two events can never interleave their read-modify-write of the session.
/// Concurrent users are fully independent.
pub struct IntakeMachine {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn ProfileDirectory>,
    geocoder: Arc<dyn Geocoder>,
    scoring: Arc<dyn ScoringService>,
    media: Arc<dyn ObjectStore>,
    delivery: Arc<dyn Delivery>,
    aggregator: Arc<PhotoAggregator>,
    bucket: String,
    locks: KeyedLocks,
}

impl IntakeMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn ProfileDirectory>,
        geocoder: Arc<dyn Geocoder>,
        scoring: Arc<dyn ScoringService>,
        media: Arc<dyn ObjectStore>,
        delivery: Arc<dyn Delivery>,
        aggregator: Arc<PhotoAggregator>,
        bucket: String,
    ) -> Self {
        Self {
            store,
            directory,
            geocoder,
            scoring,
            media,
            delivery,
            aggregator,
            bucket,
            locks: KeyedLocks::new(),
        }
    }

    /// Begin (or restart) intake: clear any prior session and prompt for
    /// the name.
    pub async fn start(&self, user_id: &str, username: Option<String>) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(user_id).await;
        self.start_locked(user_id, username).await
    }

    async fn start_locked(&self, user_id: &str, username: Option<String>) -> Result<(), EngineError> {
        self.store.clear_session(user_id).await?;
        let session = ConversationSession::new(user_id, username);
        self.store.save_session(&session).await?;
        self.delivery.send_text(user_id, "What's your name?").await?;
        tracing::info!("Intake started for user {}", user_id);
        Ok(())
    }

    /// Handle one inbound event for the user's current step.
    ///
    /// Shape mismatches re-prompt the same step and change nothing.
    pub async fn handle(&self, user_id: &str, input: IntakeInput) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(user_id).await;

        let Some(mut session) = self.store.load_session(user_id).await? else {
            self.delivery
                .send_text(user_id, "Send /start to create a profile.")
                .await?;
            return Ok(());
        };

        match session.step {
            IntakeStep::Name => self.handle_name(&mut session, input).await,
            IntakeStep::Age => self.handle_age(&mut session, input).await,
            IntakeStep::Gender => self.handle_gender(&mut session, input).await,
            IntakeStep::Interests => self.handle_interests(&mut session, input).await,
            IntakeStep::LocationChoice => self.handle_location_choice(&mut session, input).await,
            IntakeStep::CityText => self.handle_city_text(&mut session, input).await,
            IntakeStep::Photos => self.handle_photo(&mut session, input).await,
            IntakeStep::Preview => self.handle_preview(&mut session, input).await,
        }
    }

    /// Consume a resolved photo batch from the aggregator.
    ///
    /// Stale batches (session gone or no longer on the photo step) are
    /// dropped silently.
    pub async fn complete_batch(&self, event: BatchEvent) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(&event.owner_id).await;

        let Some(mut session) = self.store.load_session(&event.owner_id).await? else {
            tracing::debug!("Dropping batch for user {} without a session", event.owner_id);
            return Ok(());
        };
        if session.step != IntakeStep::Photos {
            tracing::debug!(
                "Dropping batch for user {} at step {:?}",
                event.owner_id,
                session.step
            );
            return Ok(());
        }

        match event.result {
            Ok(names) => self.apply_photo_batch(&mut session, names).await,
            Err(e) => {
                tracing::warn!("Photo batch failed for user {}: {}", event.owner_id, e);
                self.delivery
                    .send_text(
                        &session.user_id,
                        "Sorry, something went wrong with those photos. Please send them again.",
                    )
                    .await?;
                Err(EngineError::BatchIncomplete)
            }
        }
    }

    async fn handle_name(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        let IntakeInput::Text(text) = input else {
            return self.reprompt(session, "What's your name?").await;
        };
        let name = text.trim();
        if name.is_empty() {
            return self.reprompt(session, "What's your name?").await;
        }

        session.draft.name = Some(name.to_string());
        session.step = IntakeStep::Age;
        self.store.save_session(session).await?;
        self.delivery
            .send_text(&session.user_id, "How old are you?")
            .await?;
        Ok(())
    }

    async fn handle_age(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        let IntakeInput::Text(text) = input else {
            return self.reprompt(session, "How old are you?").await;
        };

        let age: u8 = match text.trim().parse() {
            Ok(age) => age,
            Err(_) => {
                self.delivery
                    .send_text(
                        &session.user_id,
                        "Sorry, I didn't get that. Please send your age as a number.",
                    )
                    .await?;
                return Err(EngineError::Validation(format!(
                    "age is not a number: {:?}",
                    text
                )));
            }
        };

        session.draft.age = Some(age);
        session.step = IntakeStep::Gender;
        self.store.save_session(session).await?;
        self.delivery
            .send_text(&session.user_id, "Pick your gender: male or female.")
            .await?;
        Ok(())
    }

    async fn handle_gender(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        let IntakeInput::Text(text) = input else {
            return self.reprompt(session, "Pick your gender: male or female.").await;
        };
        let Some(gender) = Gender::parse_choice(&text) else {
            return self.reprompt(session, "Pick your gender: male or female.").await;
        };

        session.draft.gender = Some(gender);
        session.step = IntakeStep::Interests;
        self.store.save_session(session).await?;
        self.delivery
            .send_text(&session.user_id, "List your interests, separated by commas:")
            .await?;
        Ok(())
    }

    async fn handle_interests(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        let IntakeInput::Text(text) = input else {
            return self
                .reprompt(session, "List your interests, separated by commas:")
                .await;
        };

        let interests: Vec<String> = text
            .split(',')
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if interests.is_empty() {
            return self
                .reprompt(session, "List your interests, separated by commas:")
                .await;
        }

        session.draft.interests = interests;
        session.step = IntakeStep::LocationChoice;
        self.store.save_session(session).await?;
        self.delivery
            .send_text(
                &session.user_id,
                "Share your location, or send \"manual\" to type your city.",
            )
            .await?;
        Ok(())
    }

    async fn handle_location_choice(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        match input {
            IntakeInput::Location { latitude, longitude } => {
                // Geocoding degrades to manual entry, never fails the flow
                let city = match self.geocoder.reverse(latitude, longitude).await {
                    Ok(city) => city,
                    Err(e) => {
                        tracing::warn!(
                            "Reverse geocode failed for user {}: {}",
                            session.user_id,
                            e
                        );
                        None
                    }
                };

                match city {
                    Some(city) => {
                        session.draft.city = Some(city);
                        session.draft.latitude = Some(latitude);
                        session.draft.longitude = Some(longitude);
                        session.step = IntakeStep::Photos;
                        self.store.save_session(session).await?;
                        self.delivery
                            .send_text(&session.user_id, "Now send 1-2 profile photos.")
                            .await?;
                    }
                    None => {
                        session.step = IntakeStep::CityText;
                        self.store.save_session(session).await?;
                        self.delivery
                            .send_text(
                                &session.user_id,
                                "Couldn't work out your city. Please type it:",
                            )
                            .await?;
                    }
                }
                Ok(())
            }
            IntakeInput::Text(text) if text.trim().eq_ignore_ascii_case("manual") => {
                session.step = IntakeStep::CityText;
                self.store.save_session(session).await?;
                self.delivery
                    .send_text(&session.user_id, "Okay, type your city:")
                    .await?;
                Ok(())
            }
            _ => {
                self.reprompt(
                    session,
                    "Share your location, or send \"manual\" to type your city.",
                )
                .await
            }
        }
    }

    async fn handle_city_text(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        let IntakeInput::Text(text) = input else {
            return self.reprompt(session, "Okay, type your city:").await;
        };
        let city = text.trim();
        if city.is_empty() {
            return self.reprompt(session, "Okay, type your city:").await;
        }

        session.draft.city = Some(city.to_string());
        session.draft.latitude = Some(DEFAULT_LATITUDE);
        session.draft.longitude = Some(DEFAULT_LONGITUDE);
        session.step = IntakeStep::Photos;
        self.store.save_session(session).await?;
        self.delivery
            .send_text(&session.user_id, "Now send 1-2 profile photos.")
            .await?;
        Ok(())
    }

    async fn handle_photo(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        let IntakeInput::Photo { attachment, batch_id } = input else {
            return self.reprompt(session, "Please send a photo.").await;
        };

        let outcome = match self
            .aggregator
            .submit(&session.user_id, batch_id.as_deref(), attachment)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Photo submission failed for user {}: {}", session.user_id, e);
                self.delivery
                    .send_text(
                        &session.user_id,
                        "Sorry, something went wrong with that photo. Please send it again.",
                    )
                    .await?;
                return Err(EngineError::BatchIncomplete);
            }
        };

        match outcome {
            SubmitOutcome::Finalized(names) => self.apply_photo_batch(session, names).await,
            SubmitOutcome::Buffered { pending } => {
                // Ack the first part only; the rest of the album arrives in
                // the same burst
                if pending == 1 {
                    self.delivery
                        .send_text(&session.user_id, "Got it, waiting for the rest of the album...")
                        .await?;
                }
                Ok(())
            }
        }
    }

    /// Store a resolved photo batch and advance to preview. Caller holds
    /// the user lock and has verified the session is on the photo step.
    async fn apply_photo_batch(
        &self,
        session: &mut ConversationSession,
        names: Vec<String>,
    ) -> Result<(), EngineError> {
        if names.is_empty() {
            return self.reprompt(session, "Please send at least one photo.").await;
        }

        // Fetch the preview photos before mutating the session, so an object
        // store failure leaves the user on the photo step
        let mut previews = Vec::with_capacity(names.len());
        for name in &names {
            match self.media.get(&self.bucket, name).await {
                Ok(bytes) => previews.push(bytes),
                Err(e) => {
                    tracing::error!(
                        "Preview photo fetch failed for user {}: {}",
                        session.user_id,
                        e
                    );
                    self.delivery
                        .send_text(
                            &session.user_id,
                            "Sorry, something went wrong with those photos. Please send them again.",
                        )
                        .await?;
                    return Err(e.into());
                }
            }
        }

        session.draft.photos = names;
        session.step = IntakeStep::Preview;
        self.store.save_session(session).await?;

        let caption = format!(
            "Here's how your profile looks:\n{}\n\nSend \"confirm\" to save it, or \"restart\" to start over.",
            render_draft(&session.draft)
        );
        if previews.len() == 1 {
            self.delivery
                .send_photo(&session.user_id, &previews[0], &caption)
                .await?;
        } else {
            self.delivery
                .send_media_group(&session.user_id, &previews, &caption)
                .await?;
        }
        Ok(())
    }

    async fn handle_preview(
        &self,
        session: &mut ConversationSession,
        input: IntakeInput,
    ) -> Result<(), EngineError> {
        let IntakeInput::Text(text) = input else {
            return self
                .reprompt(session, "Send \"confirm\" to save your profile, or \"restart\" to start over.")
                .await;
        };

        match text.trim().to_lowercase().as_str() {
            "confirm" => self.confirm(session).await,
            "restart" => {
                let user_id = session.user_id.clone();
                let username = session.username.clone();
                self.start_locked(&user_id, username).await
            }
            _ => {
                self.reprompt(session, "Send \"confirm\" to save your profile, or \"restart\" to start over.")
                    .await
            }
        }
    }

    async fn confirm(&self, session: &mut ConversationSession) -> Result<(), EngineError> {
        let profile = build_profile(session)?;

        if let Err(e) = self.directory.create(&profile).await {
            tracing::error!("Profile save failed for user {}: {}", session.user_id, e);
            self.delivery
                .send_text(
                    &session.user_id,
                    "Sorry, your profile couldn't be saved. Please try again.",
                )
                .await?;
            return Err(e.into());
        }

        // Scoring is best-effort and never blocks the save
        if let Err(e) = self.scoring.score(&profile).await {
            tracing::warn!("Scoring failed for user {}: {}", session.user_id, e);
        }

        self.store.clear_session(&session.user_id).await?;
        self.delivery
            .send_text(
                &session.user_id,
                "Your profile is saved! Send /search to start browsing.",
            )
            .await?;
        tracing::info!("Intake completed for user {}", session.user_id);
        Ok(())
    }

    /// Re-prompt the current step without changing state.
    async fn reprompt(
        &self,
        session: &ConversationSession,
        prompt: &str,
    ) -> Result<(), EngineError> {
        self.delivery.send_text(&session.user_id, prompt).await?;
        Ok(())
    }
}

/// Render the collected draft as the preview caption body.
pub fn render_draft(draft: &ProfileDraft) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}",
        draft.name.as_deref().unwrap_or("-"),
        draft.age.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
        draft.gender.map(|g| g.as_str().to_string()).unwrap_or_else(|| "-".to_string()),
        draft.interests.join(", "),
        draft.city.as_deref().unwrap_or("-"),
    )
}

fn build_profile(session: &ConversationSession) -> Result<Profile, EngineError> {
    let draft = &session.draft;
    let missing = |field: &str| EngineError::Validation(format!("draft is missing {}", field));

    Ok(Profile {
        user_id: session.user_id.clone(),
        name: draft.name.clone().ok_or_else(|| missing("name"))?,
        age: draft.age.ok_or_else(|| missing("age"))?,
        gender: draft.gender.ok_or_else(|| missing("gender"))?,
        interests: draft.interests.clone(),
        city: draft.city.clone().ok_or_else(|| missing("city"))?,
        latitude: draft.latitude.ok_or_else(|| missing("latitude"))?,
        longitude: draft.longitude.ok_or_else(|| missing("longitude"))?,
        photos: draft.photos.clone(),
        username: session.username.clone(),
        created_at: Some(chrono::Utc::now()),
    })
}

use crate::core::{CandidateSelector, EngineError, IntakeInput, IntakeMachine, MatchEngine};
use crate::models::{
    ErrorResponse, EventAck, EventPayload, HealthResponse, InboundEvent, Interaction, Profile,
};
use crate::services::{Delivery, ObjectStore, ProfileDirectory, SessionStore};
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<IntakeMachine>,
    pub selector: Arc<CandidateSelector>,
    pub engine: Arc<MatchEngine>,
    pub store: Arc<dyn SessionStore>,
    pub directory: Arc<dyn ProfileDirectory>,
    pub media: Arc<dyn ObjectStore>,
    pub delivery: Arc<dyn Delivery>,
    pub photo_bucket: String,
}

/// Configure all event-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/events", web::post().to(ingest_event));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Inbound event webhook
///
/// POST /api/v1/events
///
/// One task per event; ordering per user is enforced inside the core, not
/// by the transport.
async fn ingest_event(
    state: web::Data<AppState>,
    req: web::Json<InboundEvent>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for inbound event: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let event = req.into_inner();
    let result = dispatch(&state, &event).await;

    match result {
        Ok(()) => HttpResponse::Ok().json(EventAck::ok()),
        // Recoverable: the user was re-prompted; the transport gets a 200
        Err(EngineError::Validation(detail)) => {
            tracing::info!("Rejected input from {}: {}", event.user_id, detail);
            HttpResponse::Ok().json(EventAck::rejected(detail))
        }
        Err(EngineError::BatchIncomplete) => {
            HttpResponse::Ok().json(EventAck::rejected("photo batch failed, step re-prompted"))
        }
        Err(EngineError::UnknownCandidate) => {
            HttpResponse::Ok().json(EventAck::rejected("unknown candidate display"))
        }
        Err(EngineError::Upstream(message)) => {
            tracing::error!("Upstream failure handling event from {}: {}", event.user_id, message);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Upstream unavailable".to_string(),
                message,
                status_code: 500,
            })
        }
    }
}

/// Route an event to the intake machine or the browsing flow by kind.
async fn dispatch(state: &AppState, event: &InboundEvent) -> Result<(), EngineError> {
    let user_id = event.user_id.as_str();

    match &event.payload {
        EventPayload::Command { name } => match name.as_str() {
            "start" => state.intake.start(user_id, event.username.clone()).await,
            "myprofile" => show_my_profile(state, user_id).await,
            "search" => show_next_candidate(state, user_id).await,
            other => {
                tracing::debug!("Unknown command {:?} from {}", other, user_id);
                state
                    .delivery
                    .send_text(user_id, "I know /start, /myprofile and /search.")
                    .await?;
                Ok(())
            }
        },
        EventPayload::Text { text } => {
            state.intake.handle(user_id, IntakeInput::Text(text.clone())).await
        }
        EventPayload::Location { latitude, longitude } => {
            state
                .intake
                .handle(
                    user_id,
                    IntakeInput::Location { latitude: *latitude, longitude: *longitude },
                )
                .await
        }
        EventPayload::Photo { attachment, batch_id } => {
            state
                .intake
                .handle(
                    user_id,
                    IntakeInput::Photo {
                        attachment: attachment.clone(),
                        batch_id: batch_id.clone(),
                    },
                )
                .await
        }
        EventPayload::ButtonPress { message_id, interaction } => match interaction {
            Interaction::AdvanceStep { value } => {
                state.intake.handle(user_id, IntakeInput::Text(value.clone())).await
            }
            Interaction::CastVote { choice } => {
                handle_vote(state, user_id, *message_id, *choice).await
            }
            Interaction::StartReview => {
                let next = state.engine.start_review(user_id).await?;
                show_review_entry(state, user_id, next).await
            }
            Interaction::ContinueReview => {
                let next = state.engine.continue_review(user_id).await?;
                show_review_entry(state, user_id, next).await
            }
            Interaction::Dismiss => {
                state.delivery.send_text(user_id, "Maybe later then.").await?;
                Ok(())
            }
        },
    }
}

async fn handle_vote(
    state: &AppState,
    user_id: &str,
    message_id: i64,
    choice: crate::models::VoteChoice,
) -> Result<(), EngineError> {
    match state.engine.vote_on_display(user_id, message_id, choice).await {
        Ok(_) => {
            state.delivery.send_text(user_id, "Vote recorded.").await?;
        }
        Err(EngineError::UnknownCandidate) => {
            state
                .delivery
                .send_text(user_id, "Couldn't work out which profile that was.")
                .await?;
            return Err(EngineError::UnknownCandidate);
        }
        Err(e) => return Err(e),
    }

    // Keep the review flow moving: show the next queued entry, if any
    if let Some(next) = state.engine.continue_review(user_id).await? {
        return show_candidate_by_id(state, user_id, &next).await;
    }
    Ok(())
}

async fn show_review_entry(
    state: &AppState,
    user_id: &str,
    entry: Option<String>,
) -> Result<(), EngineError> {
    match entry {
        Some(candidate_id) => show_candidate_by_id(state, user_id, &candidate_id).await,
        None => {
            state
                .delivery
                .send_text(user_id, "Nobody has liked you yet.")
                .await?;
            Ok(())
        }
    }
}

/// Show the next unseen candidate, or fall back to the liked-by review
/// offer / empty-deck message.
async fn show_next_candidate(state: &AppState, user_id: &str) -> Result<(), EngineError> {
    if let Some(profile) = state.selector.next(user_id).await? {
        return show_candidate_card(state, user_id, &profile).await;
    }

    let liked_count = state.engine.liked_by_count(user_id).await?;
    if liked_count > 0 {
        state
            .delivery
            .send_text(
                user_id,
                &format!(
                    "{} people liked your profile. Want to take a look?",
                    liked_count
                ),
            )
            .await?;
    } else {
        state.delivery.send_text(user_id, "No new profiles for now.").await?;
    }
    Ok(())
}

async fn show_candidate_by_id(
    state: &AppState,
    viewer_id: &str,
    candidate_id: &str,
) -> Result<(), EngineError> {
    let profile = match state.directory.get(candidate_id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!("Couldn't load candidate {}: {}", candidate_id, e);
            state
                .delivery
                .send_text(viewer_id, "Couldn't load that profile.")
                .await?;
            return Ok(());
        }
    };
    show_candidate_card(state, viewer_id, &profile).await
}

/// Send a candidate card and bind the resulting display handle to the
/// candidate, so a vote button press can be resolved later.
async fn show_candidate_card(
    state: &AppState,
    viewer_id: &str,
    profile: &Profile,
) -> Result<(), EngineError> {
    let caption = format!("{}, {}\n{}", profile.name, profile.age, profile.city);

    let handle = match profile.photos.first() {
        Some(photo_name) => {
            let photo = state.media.get(&state.photo_bucket, photo_name).await?;
            state.delivery.send_photo(viewer_id, &photo, &caption).await?
        }
        None => state.delivery.send_text(viewer_id, &caption).await?,
    };

    state.engine.bind_display(handle, &profile.user_id).await
}

/// Render the requesting user's own profile.
async fn show_my_profile(state: &AppState, user_id: &str) -> Result<(), EngineError> {
    let profile = match state.directory.get(user_id).await {
        Ok(profile) => profile,
        Err(crate::services::DirectoryError::NotFound(_)) => {
            state
                .delivery
                .send_text(user_id, "No profile yet. Send /start to create one.")
                .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let caption = format!(
        "Here's how your profile looks:\n{}\n{}\n{}\n{}\n{}",
        profile.name,
        profile.age,
        profile.gender.as_str(),
        profile.interests.join(", "),
        profile.city,
    );

    match profile.photos.first() {
        Some(photo_name) => {
            let photo = state.media.get(&state.photo_bucket, photo_name).await?;
            state.delivery.send_photo(user_id, &photo, &caption).await?;
        }
        None => {
            state.delivery.send_text(user_id, &caption).await?;
        }
    }
    Ok(())
}

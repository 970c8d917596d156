use crate::models::domain::{AttachmentRef, VoteChoice};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An inbound user event delivered by the transport webhook.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InboundEvent {
    #[validate(length(min = 1))]
    #[serde(alias = "userId", rename = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub payload: EventPayload,
}

/// The shape of an inbound event. Exactly one of a command, free text,
/// a location payload, a photo attachment, or a button press.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A slash command: `start`, `myprofile`, `search`.
    Command { name: String },
    Text {
        text: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Photo {
        attachment: AttachmentRef,
        /// Present when the photo is part of an album; attachments sharing
        /// a batch id are coalesced by the aggregator.
        #[serde(default)]
        batch_id: Option<String>,
    },
    /// A button press referencing a previously sent message.
    ButtonPress {
        message_id: i64,
        interaction: Interaction,
    },
}

/// Closed set of interaction kinds a button press can carry.
///
/// Dispatched by kind through a single router, never by string matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    /// A constrained choice for the current intake step (gender, location
    /// mode, preview confirm/restart).
    AdvanceStep { value: String },
    CastVote { choice: VoteChoice },
    StartReview,
    ContinueReview,
    Dismiss,
}

// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AttachmentRef, ConversationSession, Gender, IntakeStep, Profile, ProfileDraft, VoteChoice,
    VoteOutcome,
};
pub use requests::{EventPayload, InboundEvent, Interaction};
pub use responses::{ErrorResponse, EventAck, HealthResponse};

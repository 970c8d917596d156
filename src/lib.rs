//! Amora - conversation-driven profile intake and mutual-match core
//!
//! This library implements the two subsystems behind the Amora dating bot:
//! the profile-intake conversation state machine (with batched photo
//! intake) and the candidate-selection / mutual-interest matching engine.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    CandidateSelector, EngineError, IntakeInput, IntakeMachine, MatchEngine, PhotoAggregator,
};
pub use crate::models::{ConversationSession, IntakeStep, Profile, VoteChoice, VoteOutcome};

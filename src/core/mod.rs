// Core engine exports
pub mod aggregator;
pub mod intake;
pub mod locks;
pub mod selector;
pub mod voting;

pub use aggregator::{AggregatorError, BatchEvent, PhotoAggregator, SubmitOutcome};
pub use intake::{IntakeInput, IntakeMachine};
pub use locks::{pair_key, KeyedLocks};
pub use selector::CandidateSelector;
pub use voting::MatchEngine;

use crate::services::{DeliveryError, DirectoryError, MediaError, StoreError};
use thiserror::Error;

/// Error taxonomy of the conversation and matching core.
///
/// `Validation` and `BatchIncomplete` are recoverable: the user has been
/// re-prompted for the same step and no state was advanced. `Upstream`
/// covers collaborator failures that the current step could not degrade
/// around. `UnknownCandidate` rejects a vote without touching vote state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("unknown or already-consumed candidate display")]
    UnknownCandidate,

    #[error("photo batch could not be completed")]
    BatchIncomplete,
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Upstream(e.to_string())
    }
}

impl From<DirectoryError> for EngineError {
    fn from(e: DirectoryError) -> Self {
        EngineError::Upstream(e.to_string())
    }
}

impl From<MediaError> for EngineError {
    fn from(e: MediaError) -> Self {
        EngineError::Upstream(e.to_string())
    }
}

impl From<DeliveryError> for EngineError {
    fn from(e: DeliveryError) -> Self {
        EngineError::Upstream(e.to_string())
    }
}

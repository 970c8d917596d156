use crate::core::locks::{pair_key, KeyedLocks};
use crate::core::EngineError;
use crate::models::{VoteChoice, VoteOutcome};
use crate::services::{Delivery, DisplayHandle, ProfileDirectory, SessionStore};
use std::sync::Arc;

/// Records votes, detects mutual likes, and manages the liked-by review
/// queue.
///
/// The mutual-match check is the sole de-duplication mechanism: recording
/// a vote and reading the counterpart's vote happen under a per-unordered-
/// pair lock, so of two racing likes exactly one (the one recorded second)
/// observes the counterpart's prior like and fires the notifications.
/// The lock scopes only the store read-check-write, never the notification
/// delivery.
pub struct MatchEngine {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn ProfileDirectory>,
    delivery: Arc<dyn Delivery>,
    pair_locks: KeyedLocks,
}

impl MatchEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn ProfileDirectory>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            store,
            directory,
            delivery,
            pair_locks: KeyedLocks::new(),
        }
    }

    /// Resolve a display handle and record the vote it carries.
    ///
    /// An unknown or already-consumed handle rejects the vote without
    /// touching any vote state.
    pub async fn vote_on_display(
        &self,
        voter_id: &str,
        handle: DisplayHandle,
        choice: VoteChoice,
    ) -> Result<VoteOutcome, EngineError> {
        let Some(candidate_id) = self.store.take_binding(handle).await? else {
            tracing::info!("Vote on unbound display {} by user {}", handle, voter_id);
            return Err(EngineError::UnknownCandidate);
        };
        self.vote(voter_id, &candidate_id, choice).await
    }

    /// Record a vote (overwrite semantics) and run the mutual-match check.
    pub async fn vote(
        &self,
        voter_id: &str,
        candidate_id: &str,
        choice: VoteChoice,
    ) -> Result<VoteOutcome, EngineError> {
        let matched = {
            let _guard = self.pair_locks.acquire(&pair_key(voter_id, candidate_id)).await;

            self.store.record_vote(voter_id, candidate_id, choice).await?;

            match choice {
                VoteChoice::Dislike => false,
                VoteChoice::Like => {
                    self.store.push_liked_by(candidate_id, voter_id).await?;
                    self.store.vote_of(candidate_id, voter_id).await? == Some(VoteChoice::Like)
                }
            }
        };

        tracing::debug!(
            "Vote recorded: {} -> {} ({})",
            voter_id,
            candidate_id,
            choice.as_str()
        );

        if matched {
            tracing::info!("Mutual match: {} <-> {}", voter_id, candidate_id);
            self.notify_match(voter_id, candidate_id).await;
            return Ok(VoteOutcome::Matched {
                counterpart: candidate_id.to_string(),
            });
        }

        Ok(VoteOutcome::Recorded)
    }

    /// Copy the liked-by queue into a fresh review queue, replacing any
    /// review in progress, and pop the first entry.
    pub async fn start_review(&self, user_id: &str) -> Result<Option<String>, EngineError> {
        let liked_by = self.store.liked_by(user_id).await?;
        self.store.replace_review_queue(user_id, &liked_by).await?;
        Ok(self.store.pop_review(user_id).await?)
    }

    /// Pop the next review entry, or None when the queue is drained.
    pub async fn continue_review(&self, user_id: &str) -> Result<Option<String>, EngineError> {
        Ok(self.store.pop_review(user_id).await?)
    }

    /// How many users have liked this one. Used for the review offer.
    pub async fn liked_by_count(&self, user_id: &str) -> Result<usize, EngineError> {
        Ok(self.store.liked_by(user_id).await?.len())
    }

    /// Bind a freshly displayed candidate to its message handle, so a later
    /// button press can be resolved back to the candidate.
    pub async fn bind_display(
        &self,
        handle: DisplayHandle,
        candidate_id: &str,
    ) -> Result<(), EngineError> {
        Ok(self.store.put_binding(handle, candidate_id).await?)
    }

    /// Deliver one notification to each side of a freshly declared match.
    /// Best-effort: contact lookup failures degrade to the stable id form,
    /// delivery failures are logged.
    async fn notify_match(&self, a: &str, b: &str) {
        let contact_of = |user_id: String| {
            let directory = self.directory.clone();
            async move {
                match directory.get(&user_id).await {
                    Ok(profile) => profile.contact(),
                    Err(e) => {
                        tracing::warn!("Contact lookup failed for {}: {}", user_id, e);
                        format!("id:{}", user_id)
                    }
                }
            }
        };

        let contact_a = contact_of(a.to_string()).await;
        let contact_b = contact_of(b.to_string()).await;

        for (user, contact) in [(a, contact_b), (b, contact_a)] {
            if let Err(e) = self
                .delivery
                .send_text(user, &format!("It's a match! Get in touch: {}", contact))
                .await
            {
                tracing::warn!("Match notification to {} failed: {}", user, e);
            }
        }
    }
}

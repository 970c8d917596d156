use crate::core::EngineError;
use crate::models::Profile;
use crate::services::{ProfileDirectory, SessionStore};
use std::sync::Arc;

/// Picks the next unseen candidate for a viewer.
///
/// Directory order is the policy: deterministic and stable, no
/// randomization. Returning a candidate claims it in the viewer's
/// exclusion set, so repeated calls never return the same profile twice,
/// even when they race. A linear scan is fine at directory scale; the
/// contract (stable order, monotonic exclusion, at-most-once exposure) is
/// what matters.
pub struct CandidateSelector {
    directory: Arc<dyn ProfileDirectory>,
    store: Arc<dyn SessionStore>,
}

impl CandidateSelector {
    pub fn new(directory: Arc<dyn ProfileDirectory>, store: Arc<dyn SessionStore>) -> Self {
        Self { directory, store }
    }

    /// Return the next unseen candidate profile, or None when every
    /// candidate has been shown.
    pub async fn next(&self, viewer_id: &str) -> Result<Option<Profile>, EngineError> {
        let profiles = self.directory.list().await?;

        for profile in profiles {
            if profile.user_id == viewer_id {
                continue;
            }
            // Atomic add-and-return: only the call that first adds the id
            // gets to show this candidate
            if self.store.claim_shown(viewer_id, &profile.user_id).await? {
                tracing::debug!("Showing candidate {} to viewer {}", profile.user_id, viewer_id);
                return Ok(Some(profile));
            }
        }

        tracing::debug!("No unseen candidates left for viewer {}", viewer_id);
        Ok(None)
    }
}

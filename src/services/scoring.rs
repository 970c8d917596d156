use crate::models::Profile;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when submitting a profile for scoring
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),
}

/// Scoring collaborator. Best-effort: a failure here never blocks a
/// profile save.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(&self, profile: &Profile) -> Result<f64, ScoringError>;
}

#[derive(Debug, Deserialize)]
struct RatingResponse {
    score: f64,
}

/// HTTP client for the rating service
pub struct RatingClient {
    base_url: String,
    client: Client,
}

impl RatingClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }
}

#[async_trait]
impl ScoringService for RatingClient {
    async fn score(&self, profile: &Profile) -> Result<f64, ScoringError> {
        let url = format!("{}/rate", self.base_url.trim_end_matches('/'));

        let response = self.client.post(&url).json(profile).send().await?;

        if !response.status().is_success() {
            return Err(ScoringError::ApiError(format!(
                "Rating request failed: {}",
                response.status()
            )));
        }

        let rating: RatingResponse = response.json().await?;

        tracing::debug!("Profile {} scored {}", profile.user_id, rating.score);

        Ok(rating.score)
    }
}

use crate::models::Profile;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with the profile directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// The external profile directory: create, fetch-by-id, list-all.
///
/// The core treats the directory as the owner of finished profiles; it is
/// never written to except through `create` at the end of intake.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn create(&self, profile: &Profile) -> Result<(), DirectoryError>;
    async fn get(&self, user_id: &str) -> Result<Profile, DirectoryError>;
    async fn list(&self) -> Result<Vec<Profile>, DirectoryError>;
}

/// HTTP client for the user-service profile directory
///
/// Single-profile reads go through a short-lived in-memory cache so that
/// rendering a candidate card and the follow-up match notification don't
/// hit the directory twice for the same profile.
pub struct DirectoryClient {
    base_url: String,
    client: Client,
    profile_cache: moka::future::Cache<String, Profile>,
}

impl DirectoryClient {
    pub fn new(base_url: String, cache_size: u64, cache_ttl_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let profile_cache = moka::future::CacheBuilder::new(cache_size)
            .time_to_live(Duration::from_secs(cache_ttl_secs))
            .build();

        Self {
            base_url,
            client,
            profile_cache,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ProfileDirectory for DirectoryClient {
    async fn create(&self, profile: &Profile) -> Result<(), DirectoryError> {
        let url = self.url("profile");

        let response = self.client.post(&url).json(profile).send().await?;

        if !response.status().is_success() {
            return Err(DirectoryError::ApiError(format!(
                "Failed to create profile: {}",
                response.status()
            )));
        }

        // A replaced profile must not be served stale from cache
        self.profile_cache.invalidate(&profile.user_id).await;

        tracing::debug!("Created profile for user {}", profile.user_id);
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Profile, DirectoryError> {
        if let Some(profile) = self.profile_cache.get(user_id).await {
            tracing::trace!("Profile cache hit: {}", user_id);
            return Ok(profile);
        }

        let url = self.url(&format!("profile/{}", urlencoding::encode(user_id)));

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(format!(
                "Profile not found for user {}",
                user_id
            )));
        }

        if !response.status().is_success() {
            return Err(DirectoryError::ApiError(format!(
                "Failed to fetch profile: {}",
                response.status()
            )));
        }

        let profile: Profile = response.json().await?;
        self.profile_cache
            .insert(user_id.to_string(), profile.clone())
            .await;

        Ok(profile)
    }

    async fn list(&self) -> Result<Vec<Profile>, DirectoryError> {
        let url = self.url("users");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(DirectoryError::ApiError(format!(
                "Failed to list profiles: {}",
                response.status()
            )));
        }

        let profiles: Vec<Profile> = response.json().await?;
        tracing::debug!("Directory listed {} profiles", profiles.len());

        Ok(profiles)
    }
}

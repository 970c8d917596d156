use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with the photo object store
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Binary blob store keyed by (bucket, object name).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), MediaError>;
    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, MediaError>;
}

/// HTTP client for a MinIO-style object store gateway
pub struct MediaClient {
    base_url: String,
    client: Client,
}

impl MediaClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            bucket,
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl ObjectStore for MediaClient {
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), MediaError> {
        let url = self.object_url(bucket, name);

        let response = self
            .client
            .put(&url)
            .header("Content-Type", "image/jpeg")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::ApiError(format!(
                "Failed to store object {}: {}",
                name,
                response.status()
            )));
        }

        tracing::debug!("Stored object {}/{}", bucket, name);
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, MediaError> {
        let url = self.object_url(bucket, name);

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MediaError::NotFound(format!("{}/{}", bucket, name)));
        }

        if !response.status().is_success() {
            return Err(MediaError::ApiError(format!(
                "Failed to fetch object {}: {}",
                name,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

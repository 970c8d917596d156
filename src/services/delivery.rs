use crate::models::AttachmentRef;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur on the delivery channel
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),
}

/// Display handle: the transport message id of a previously sent message,
/// later referenced by button presses.
pub type DisplayHandle = i64;

/// The outbound side of the bot transport, plus raw-attachment retrieval.
///
/// Rendering (keyboards, markup) is the transport's concern; the core only
/// hands over text, photo bytes, and captions.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send_text(&self, user_id: &str, text: &str) -> Result<DisplayHandle, DeliveryError>;

    async fn send_photo(
        &self,
        user_id: &str,
        photo: &[u8],
        caption: &str,
    ) -> Result<DisplayHandle, DeliveryError>;

    async fn send_media_group(
        &self,
        user_id: &str,
        photos: &[Vec<u8>],
        caption: &str,
    ) -> Result<DisplayHandle, DeliveryError>;

    /// Fetch the raw bytes behind an attachment reference.
    async fn fetch_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, DeliveryError>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: i64,
}

/// HTTP client for the bot transport gateway
pub struct BotChannel {
    base_url: String,
    client: Client,
}

impl BotChannel {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn read_handle(response: reqwest::Response) -> Result<DisplayHandle, DeliveryError> {
        if !response.status().is_success() {
            return Err(DeliveryError::ApiError(format!(
                "Transport send failed: {}",
                response.status()
            )));
        }
        let sent: SendResponse = response.json().await?;
        Ok(sent.message_id)
    }
}

#[async_trait]
impl Delivery for BotChannel {
    async fn send_text(&self, user_id: &str, text: &str) -> Result<DisplayHandle, DeliveryError> {
        let response = self
            .client
            .post(self.url("sendText"))
            .json(&serde_json::json!({ "user_id": user_id, "text": text }))
            .send()
            .await?;

        Self::read_handle(response).await
    }

    async fn send_photo(
        &self,
        user_id: &str,
        photo: &[u8],
        caption: &str,
    ) -> Result<DisplayHandle, DeliveryError> {
        let response = self
            .client
            .post(self.url("sendPhoto"))
            .query(&[("user_id", user_id), ("caption", caption)])
            .header("Content-Type", "application/octet-stream")
            .body(photo.to_vec())
            .send()
            .await?;

        Self::read_handle(response).await
    }

    async fn send_media_group(
        &self,
        user_id: &str,
        photos: &[Vec<u8>],
        caption: &str,
    ) -> Result<DisplayHandle, DeliveryError> {
        // The gateway accepts a JSON array of hex-encoded parts; albums are
        // small (a handful of photos) so the encoding overhead is fine.
        let parts: Vec<String> = photos.iter().map(hex_encode).collect();

        let response = self
            .client
            .post(self.url("sendMediaGroup"))
            .json(&serde_json::json!({
                "user_id": user_id,
                "caption": caption,
                "photos": parts,
            }))
            .send()
            .await?;

        Self::read_handle(response).await
    }

    async fn fetch_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, DeliveryError> {
        let url = self.url(&format!("file/{}", urlencoding::encode(&attachment.file_id)));

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(DeliveryError::ApiError(format!(
                "Attachment fetch failed for {}: {}",
                attachment.file_id,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

fn hex_encode(bytes: &Vec<u8>) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

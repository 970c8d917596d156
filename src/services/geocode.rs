use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when reverse-geocoding
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),
}

/// Reverse-geocoding collaborator: coordinates to a city name, if any.
///
/// Failures and unresolvable coordinates are both recoverable: the intake
/// flow falls back to manual city entry.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>, GeocodeError>;
}

/// Nominatim-style reverse geocoding client
pub struct NominatimClient {
    base_url: String,
    client: Client,
}

impl NominatimClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>, GeocodeError> {
        let url = format!("{}/reverse", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::ApiError(format!(
                "Reverse geocode failed: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        // city, then town, then village, as Nominatim populates one of them
        let city = json
            .get("address")
            .and_then(|a| {
                a.get("city")
                    .or_else(|| a.get("town"))
                    .or_else(|| a.get("village"))
            })
            .and_then(|c| c.as_str())
            .map(|c| c.to_string());

        tracing::debug!("Reverse geocode ({}, {}) -> {:?}", latitude, longitude, city);

        Ok(city)
    }
}

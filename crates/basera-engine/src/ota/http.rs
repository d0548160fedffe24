//! # HTTP OTA Provider
//!
//! JSON-over-HTTP provider used for every configured channel. Channels
//! differ in base URL, credentials, and push scope, not in wire shape:
//! the connectivity partner endpoints we integrate normalize to
//! push/pull JSON documents.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::ChannelConfig;
use crate::ota::provider::{ChannelBooking, Provider, ProviderError, PushScope, RoomListing};

/// HTTP-backed OTA channel.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    listings: &'a [RoomListing],
    include_rates: bool,
    include_availability: bool,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    accepted: usize,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    bookings: Vec<ChannelBooking>,
}

impl HttpProvider {
    /// Creates a provider from channel config.
    pub fn new(config: &ChannelConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Protocol(e.to_string()))?;

        Ok(HttpProvider {
            client,
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "channel returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected(format!("{status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, listings), fields(channel = %self.name, count = listings.len()))]
    async fn push(
        &self,
        listings: &[RoomListing],
        scope: PushScope,
    ) -> Result<usize, ProviderError> {
        let url = format!("{}/v1/listings/push", self.base_url);

        debug!("Pushing listings to channel");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&PushRequest {
                listings,
                include_rates: scope.rates,
                include_availability: scope.availability,
            })
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let parsed: PushResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(e.to_string()))?;

        Ok(parsed.accepted)
    }

    #[instrument(skip(self), fields(channel = %self.name))]
    async fn pull(
        &self,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<ChannelBooking>, ProviderError> {
        let url = format!("{}/v1/bookings/pull", self.base_url);

        let mut request = self.client.get(&url).bearer_auth(&self.api_key);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        let response = request.send().await?;

        let response = Self::check_status(response).await?;
        let parsed: PullResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(e.to_string()))?;

        debug!(count = parsed.bookings.len(), "Pulled channel bookings");

        Ok(parsed.bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_response_parsing() {
        let raw = r#"{
            "bookings": [{
                "external_ref": "BDC-9001",
                "room_id": "room-101",
                "guest_name": "A. Sharma",
                "check_in": "2025-11-01",
                "check_out": "2025-11-04",
                "adults": 2,
                "children": 0,
                "total_paisa": 1500000
            }]
        }"#;

        let parsed: PullResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.bookings.len(), 1);
        assert_eq!(parsed.bookings[0].external_ref, "BDC-9001");
        assert_eq!(parsed.bookings[0].total_paisa, 1_500_000);
    }
}

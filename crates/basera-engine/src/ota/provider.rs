//! # OTA Provider Trait
//!
//! Common interface over online travel agency channels (Booking.com,
//! Agoda). A provider can receive our rates and availability (push) and
//! hand back bookings made on its side (pull).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Rate and availability snapshot for one room on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomListing {
    pub room_id: String,
    /// Nightly rate in paisa.
    pub rate_paisa: i64,
    /// Dates with an availability-blocking booking, as half-open
    /// [check_in, check_out) ranges.
    pub blocked: Vec<(NaiveDate, NaiveDate)>,
}

/// What a push should carry.
#[derive(Debug, Clone, Copy)]
pub struct PushScope {
    pub rates: bool,
    pub availability: bool,
}

/// A booking made on the channel's side, in the channel's terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBooking {
    /// The channel's own booking reference. Stable across re-pulls.
    pub external_ref: String,
    pub room_id: String,
    pub guest_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i64,
    pub children: i64,
    /// Total the channel collected, in paisa.
    pub total_paisa: i64,
}

/// Provider operation failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Channel could not be reached or returned a 5xx.
    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    /// Channel rejected the request (auth, validation).
    #[error("Channel rejected request: {0}")]
    Rejected(String),

    /// Response did not match the expected wire format.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ProviderError::Unavailable(err.to_string())
        } else {
            ProviderError::Protocol(err.to_string())
        }
    }
}

/// An OTA channel connection.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Channel name as it appears in the sync log and on imported
    /// bookings.
    fn name(&self) -> &str;

    /// Pushes rates and/or availability to the channel.
    ///
    /// Returns the number of listings accepted.
    async fn push(&self, listings: &[RoomListing], scope: PushScope)
        -> Result<usize, ProviderError>;

    /// Pulls bookings created or modified on the channel after `since`.
    ///
    /// `None` asks for everything the channel still has.
    async fn pull(&self, since: Option<DateTime<Utc>>)
        -> Result<Vec<ChannelBooking>, ProviderError>;
}

//! # Engine Error Types
//!
//! Error types for booking, payment, and OTA sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Booking      │  │    Payment      │  │     Gateway             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  RoomUnavailable│  │  AmountMismatch │  │  Unavailable            │ │
//! │  │  InvalidState   │  │  Outstanding-   │  │  Timeout                │ │
//! │  │  NotFound       │  │    Mismatch     │  │  Declined               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Configuration  │  │  Passthrough    │                              │
//! │  │                 │  │                 │                              │
//! │  │  InvalidConfig  │  │  Core(..)       │                              │
//! │  │  ConfigLoad     │  │  Db(..)         │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::payment::gateway::GatewayError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type covering booking, payment, and sync failures.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Booking Errors
    // =========================================================================
    /// Requested room has an overlapping availability-blocking booking.
    #[error("Room {room_id} is unavailable: booking {conflicting_id} occupies {check_in} to {check_out}")]
    RoomUnavailable {
        room_id: String,
        conflicting_id: String,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
    },

    /// The entity exists but is in the wrong state for this operation.
    #[error("{entity} {id} is {actual}, cannot {operation}")]
    InvalidState {
        entity: &'static str,
        id: String,
        actual: String,
        operation: &'static str,
    },

    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // =========================================================================
    // Payment Errors
    // =========================================================================
    /// Gateway settled a different amount than the local payment row.
    #[error("Amount mismatch on payment {payment_id}: expected {expected} paisa, gateway settled {actual} paisa")]
    AmountMismatch {
        payment_id: String,
        expected: i64,
        actual: i64,
    },

    /// Verification callback token does not match the payment's recorded
    /// gateway reference.
    ///
    /// The guest's return URL carries the gateway's token; a token for a
    /// different transaction is rejected before any gateway call.
    #[error("Token mismatch on payment {payment_id}: callback token does not match the recorded gateway reference")]
    TokenMismatch { payment_id: String },

    /// Requested payment does not match the booking's outstanding balance.
    ///
    /// Payments settle the whole outstanding amount in one record; a
    /// partial or excess amount is rejected before anything is written.
    #[error("Payment of {requested} paisa does not match the outstanding balance of {outstanding} paisa for booking {booking_id}")]
    OutstandingMismatch {
        booking_id: String,
        requested: i64,
        outstanding: i64,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Passthrough
    // =========================================================================
    /// Business rule violation from the core layer.
    #[error(transparent)]
    Core(#[from] basera_core::CoreError),

    /// Database failure.
    #[error(transparent)]
    Db(#[from] basera_db::DbError),

    /// Gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// OTA provider failure.
    #[error("Channel {provider} sync failed: {message}")]
    ChannelFailed { provider: String, message: String },

    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl EngineError {
    /// Returns true if retrying the same operation can succeed.
    ///
    /// ## Retryable
    /// - Gateway timeouts and outages (the payment stays Pending)
    /// - Lost optimistic-lock races (re-read and try again)
    ///
    /// ## Non-Retryable
    /// - Business rule violations (availability, state, amounts)
    /// - Declined payments
    /// - Configuration problems
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Gateway(g) => g.is_retryable(),
            EngineError::Db(basera_db::DbError::StaleState { .. }) => true,
            EngineError::ChannelFailed { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::Gateway(GatewayError::Timeout { seconds: 30 }).is_retryable());
        assert!(EngineError::ChannelFailed {
            provider: "agoda".into(),
            message: "503".into()
        }
        .is_retryable());

        assert!(!EngineError::Gateway(GatewayError::Declined {
            reason: "insufficient funds".into()
        })
        .is_retryable());
        assert!(!EngineError::AmountMismatch {
            payment_id: "p-1".into(),
            expected: 1_500_000,
            actual: 1_400_000,
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::RoomUnavailable {
            room_id: "room-101".into(),
            conflicting_id: "bkg-7".into(),
            check_in: chrono::NaiveDate::from_ymd_opt(2025, 10, 22).unwrap(),
            check_out: chrono::NaiveDate::from_ymd_opt(2025, 10, 25).unwrap(),
        };
        assert!(err.to_string().contains("room-101"));
        assert!(err.to_string().contains("bkg-7"));
    }
}

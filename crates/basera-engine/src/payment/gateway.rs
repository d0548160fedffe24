//! # Payment Gateway Trait
//!
//! Common interface over Khalti and eSewa. Each gateway knows how to
//! start a payment (returning what the guest must do next) and how to
//! look up what actually happened to it.
//!
//! ## Gateway Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Gateway Interaction                               │
//! │                                                                         │
//! │  initiate(payment)                                                      │
//! │    Khalti → server-to-server POST, guest follows payment_url           │
//! │    eSewa  → signed form the guest's browser posts to eSewa             │
//! │                                                                         │
//! │  lookup(payment)                                                        │
//! │    The ONLY source of truth for settlement. Redirect-back query        │
//! │    params are untrusted hints; verification always calls lookup.       │
//! │                                                                         │
//! │  Timeout on lookup ⇒ UNKNOWN outcome. The local payment stays          │
//! │  Pending and the reconcile sweep retries later. Never mark Failed      │
//! │  on a timeout - the money may have moved.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use basera_core::types::Payment;
use basera_core::Money;

// =============================================================================
// Errors
// =============================================================================

/// Gateway operation failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Gateway could not be reached or returned a 5xx.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// Request exceeded its deadline. Outcome unknown.
    #[error("Gateway timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Gateway definitively refused the payment.
    #[error("Payment declined: {reason}")]
    Declined { reason: String },

    /// Response did not match the documented wire format.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Returns true if retrying can succeed.
    ///
    /// Timeouts and outages are transient; declines and malformed
    /// responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable(_) | GatewayError::Timeout { .. }
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout { seconds: 0 }
        } else if err.is_connect() {
            GatewayError::Unavailable(err.to_string())
        } else {
            GatewayError::Protocol(err.to_string())
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// What the guest must do to complete a freshly initiated payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInstruction {
    /// Redirect the guest's browser to this URL (Khalti).
    Redirect { url: String },

    /// Post this form from the guest's browser (eSewa).
    ///
    /// Fields are ordered for a stable rendering; the signature field is
    /// already included.
    FormPost {
        action_url: String,
        fields: BTreeMap<String, String>,
    },
}

/// Result of initiating a payment with a gateway.
#[derive(Debug, Clone)]
pub struct InitiateOutcome {
    /// Gateway's identifier for this payment (Khalti pidx, eSewa
    /// transaction UUID).
    pub gateway_ref: String,

    /// What the guest does next.
    pub instruction: PaymentInstruction,
}

/// Settlement state reported by a gateway lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeState {
    /// Money moved.
    Completed,

    /// Guest has not finished (or abandoned) the flow.
    Pending,

    /// Gateway refused or the guest cancelled at the gateway.
    Failed,

    /// Gateway refunded this charge on its side.
    Refunded,
}

/// What the gateway says happened to a payment.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub state: ChargeState,

    /// Amount the gateway actually settled. Compared against the local
    /// row; a mismatch fails verification.
    pub amount: Money,

    /// Raw gateway response, stored on the payment row for audit.
    pub raw_payload: String,
}

// =============================================================================
// Trait
// =============================================================================

/// A payment gateway capable of initiating and looking up payments.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Starts a payment, returning the gateway reference and the guest
    /// instruction.
    async fn initiate(&self, payment: &Payment) -> Result<InitiateOutcome, GatewayError>;

    /// Looks up the settlement state of a previously initiated payment.
    ///
    /// `gateway_ref` is the reference returned by [`initiate`].
    ///
    /// [`initiate`]: PaymentGateway::initiate
    async fn lookup(&self, gateway_ref: &str) -> Result<GatewayCharge, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_split() {
        assert!(GatewayError::Timeout { seconds: 30 }.is_retryable());
        assert!(GatewayError::Unavailable("connection refused".into()).is_retryable());
        assert!(!GatewayError::Declined {
            reason: "insufficient balance".into()
        }
        .is_retryable());
        assert!(!GatewayError::Protocol("unexpected field".into()).is_retryable());
    }
}

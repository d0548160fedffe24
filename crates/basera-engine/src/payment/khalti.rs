//! # Khalti Gateway
//!
//! Khalti ePayment API v2 client.
//!
//! ## Flow
//! 1. `POST {base}/epayment/initiate/` with amount (paisa), purchase
//!    order id/name, and return URL → `{ pidx, payment_url }`
//! 2. Guest completes payment at `payment_url`
//! 3. `POST {base}/epayment/lookup/` with `{ pidx }` → status + amount
//!
//! Authentication is the `Authorization: Key <secret>` header on every
//! request. Amounts are paisa end to end, matching our Money unit.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use basera_core::types::Payment;
use basera_core::Money;

use crate::config::KhaltiConfig;
use crate::payment::gateway::{
    ChargeState, GatewayCharge, GatewayError, InitiateOutcome, PaymentGateway, PaymentInstruction,
};

/// Khalti ePayment v2 gateway client.
#[derive(Debug, Clone)]
pub struct KhaltiGateway {
    client: Client,
    base_url: String,
    secret_key: String,
    timeout_secs: u64,
    return_url: String,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct InitiateRequest<'a> {
    return_url: &'a str,
    website_url: &'a str,
    amount: i64,
    purchase_order_id: &'a str,
    purchase_order_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    pidx: String,
    payment_url: String,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    pidx: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    total_amount: i64,
}

impl KhaltiGateway {
    /// Creates a Khalti gateway from config.
    pub fn new(config: &KhaltiConfig, return_url: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        Ok(KhaltiGateway {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            timeout_secs: config.timeout_secs,
            return_url: return_url.into(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.secret_key)
    }

    fn wrap_timeout(&self, err: GatewayError) -> GatewayError {
        match err {
            GatewayError::Timeout { .. } => GatewayError::Timeout {
                seconds: self.timeout_secs,
            },
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for KhaltiGateway {
    fn name(&self) -> &'static str {
        "khalti"
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn initiate(&self, payment: &Payment) -> Result<InitiateOutcome, GatewayError> {
        let url = format!("{}/epayment/initiate/", self.base_url);

        let request = InitiateRequest {
            return_url: &self.return_url,
            website_url: &self.return_url,
            amount: payment.amount_paisa,
            purchase_order_id: &payment.id,
            purchase_order_name: "Room booking",
        };

        debug!(amount = payment.amount_paisa, "Initiating Khalti payment");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.wrap_timeout(e.into()))?;

        if response.status().is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "khalti returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Declined {
                reason: format!("khalti {}: {}", status, body),
            });
        }

        let parsed: InitiateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        Ok(InitiateOutcome {
            gateway_ref: parsed.pidx,
            instruction: PaymentInstruction::Redirect {
                url: parsed.payment_url,
            },
        })
    }

    #[instrument(skip(self))]
    async fn lookup(&self, gateway_ref: &str) -> Result<GatewayCharge, GatewayError> {
        let url = format!("{}/epayment/lookup/", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&LookupRequest { pidx: gateway_ref })
            .send()
            .await
            .map_err(|e| self.wrap_timeout(e.into()))?;

        if response.status().is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "khalti returned {}",
                response.status()
            )));
        }

        let raw_payload = response
            .text()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let parsed: LookupResponse = serde_json::from_str(&raw_payload)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        // Khalti lookup statuses: Completed, Pending, Initiated,
        // Expired, User canceled, Refunded
        let state = match parsed.status.as_str() {
            "Completed" => ChargeState::Completed,
            "Pending" | "Initiated" => ChargeState::Pending,
            "Refunded" => ChargeState::Refunded,
            "Expired" | "User canceled" => ChargeState::Failed,
            other => {
                return Err(GatewayError::Protocol(format!(
                    "unknown khalti status: {other}"
                )))
            }
        };

        Ok(GatewayCharge {
            state,
            amount: Money::from_paisa(parsed.total_amount),
            raw_payload,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

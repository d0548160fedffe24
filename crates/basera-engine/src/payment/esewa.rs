//! # eSewa Gateway
//!
//! eSewa ePay v2 client.
//!
//! ## Flow
//! 1. Build a form the guest's browser posts to
//!    `{base}/api/epay/main/v2/form`. The form carries an HMAC-SHA256
//!    signature (base64) over `total_amount=X,transaction_uuid=Y,
//!    product_code=Z` - field order is part of the contract.
//! 2. Guest completes payment at eSewa.
//! 3. `GET {base}/api/epay/transaction/status/?product_code=..&
//!    total_amount=..&transaction_uuid=..` → status + amount.
//!
//! eSewa amounts are rupees on the wire, so we convert at the boundary
//! and convert back on lookup.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use basera_core::types::Payment;
use basera_core::Money;

use crate::config::EsewaConfig;
use crate::payment::gateway::{
    ChargeState, GatewayCharge, GatewayError, InitiateOutcome, PaymentGateway, PaymentInstruction,
};

type HmacSha256 = Hmac<Sha256>;

/// eSewa ePay v2 gateway client.
#[derive(Debug, Clone)]
pub struct EsewaGateway {
    client: Client,
    base_url: String,
    product_code: String,
    secret_key: String,
    timeout_secs: u64,
    success_url: String,
    failure_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    total_amount: f64,
}

impl EsewaGateway {
    /// Creates an eSewa gateway from config.
    pub fn new(
        config: &EsewaConfig,
        success_url: impl Into<String>,
        failure_url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        Ok(EsewaGateway {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            product_code: config.product_code.clone(),
            secret_key: config.secret_key.clone(),
            timeout_secs: config.timeout_secs,
            success_url: success_url.into(),
            failure_url: failure_url.into(),
        })
    }

    /// Signs `total_amount=X,transaction_uuid=Y,product_code=Z`.
    ///
    /// The signed-field order is fixed by the eSewa contract and must
    /// match the `signed_field_names` form field exactly.
    fn sign(&self, total_amount: &str, transaction_uuid: &str) -> Result<String, GatewayError> {
        let message = format!(
            "total_amount={},transaction_uuid={},product_code={}",
            total_amount, transaction_uuid, self.product_code
        );

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;
        mac.update(message.as_bytes());

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn wrap_timeout(&self, err: GatewayError) -> GatewayError {
        match err {
            GatewayError::Timeout { .. } => GatewayError::Timeout {
                seconds: self.timeout_secs,
            },
            other => other,
        }
    }

    /// Rupee string without trailing zeros, the format eSewa signs.
    fn amount_string(amount: Money) -> String {
        if amount.paisa_part() == 0 {
            format!("{}", amount.paisa() / 100)
        } else {
            format!("{:.2}", amount.paisa() as f64 / 100.0)
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for EsewaGateway {
    fn name(&self) -> &'static str {
        "esewa"
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn initiate(&self, payment: &Payment) -> Result<InitiateOutcome, GatewayError> {
        // The payment row id doubles as the eSewa transaction UUID
        let transaction_uuid = payment.id.clone();
        let total_amount = Self::amount_string(Money::from_paisa(payment.amount_paisa));

        let signature = self.sign(&total_amount, &transaction_uuid)?;

        debug!(amount = %total_amount, "Building eSewa form");

        let mut fields = BTreeMap::new();
        fields.insert("amount".to_string(), total_amount.clone());
        fields.insert("tax_amount".to_string(), "0".to_string());
        fields.insert("total_amount".to_string(), total_amount);
        fields.insert("transaction_uuid".to_string(), transaction_uuid.clone());
        fields.insert("product_code".to_string(), self.product_code.clone());
        fields.insert("product_service_charge".to_string(), "0".to_string());
        fields.insert("product_delivery_charge".to_string(), "0".to_string());
        fields.insert("success_url".to_string(), self.success_url.clone());
        fields.insert("failure_url".to_string(), self.failure_url.clone());
        fields.insert(
            "signed_field_names".to_string(),
            "total_amount,transaction_uuid,product_code".to_string(),
        );
        fields.insert("signature".to_string(), signature);

        Ok(InitiateOutcome {
            gateway_ref: transaction_uuid,
            instruction: PaymentInstruction::FormPost {
                action_url: format!("{}/api/epay/main/v2/form", self.base_url),
                fields,
            },
        })
    }

    #[instrument(skip(self))]
    async fn lookup(&self, gateway_ref: &str) -> Result<GatewayCharge, GatewayError> {
        let url = format!("{}/api/epay/transaction/status/", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("product_code", self.product_code.as_str()),
                ("transaction_uuid", gateway_ref),
            ])
            .send()
            .await
            .map_err(|e| self.wrap_timeout(e.into()))?;

        if response.status().is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "esewa returned {}",
                response.status()
            )));
        }

        let raw_payload = response
            .text()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let parsed: StatusResponse = serde_json::from_str(&raw_payload)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        // eSewa statuses: COMPLETE, PENDING, FULL_REFUND, PARTIAL_REFUND,
        // CANCELED, NOT_FOUND, AMBIGUOUS
        let state = match parsed.status.as_str() {
            "COMPLETE" => ChargeState::Completed,
            "PENDING" | "AMBIGUOUS" => ChargeState::Pending,
            "FULL_REFUND" | "PARTIAL_REFUND" => ChargeState::Refunded,
            "CANCELED" | "NOT_FOUND" => ChargeState::Failed,
            other => {
                return Err(GatewayError::Protocol(format!(
                    "unknown esewa status: {other}"
                )))
            }
        };

        // Wire amount is rupees; round to whole paisa
        let paisa = (parsed.total_amount * 100.0).round() as i64;

        Ok(GatewayCharge {
            state,
            amount: Money::from_paisa(paisa),
            raw_payload,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

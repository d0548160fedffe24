//! # Mock Payment Gateway
//!
//! Scriptable in-process gateway for tests. Each lookup pops the next
//! scripted response, so a test can model "timeout, then completed"
//! without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use basera_core::types::Payment;

use crate::payment::gateway::{
    GatewayCharge, GatewayError, InitiateOutcome, PaymentGateway, PaymentInstruction,
};

/// A gateway whose lookup responses are scripted up front.
#[derive(Default)]
pub struct MockGateway {
    lookups: Mutex<VecDeque<Result<GatewayCharge, GatewayError>>>,
    lookup_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        MockGateway::default()
    }

    /// Queues the next lookup response.
    pub fn push_lookup(&self, response: Result<GatewayCharge, GatewayError>) {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// How many times lookup was called.
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initiate(&self, payment: &Payment) -> Result<InitiateOutcome, GatewayError> {
        Ok(InitiateOutcome {
            gateway_ref: format!("mock-{}", payment.id),
            instruction: PaymentInstruction::Redirect {
                url: format!("https://mock.gateway/pay/{}", payment.id),
            },
        })
    }

    async fn lookup(&self, _gateway_ref: &str) -> Result<GatewayCharge, GatewayError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Err(GatewayError::Unavailable(
                "no scripted response".to_string(),
            )))
    }
}

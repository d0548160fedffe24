//! # Payment Orchestration
//!
//! Coordinates payment rows, gateways, and booking confirmation.
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Payment Lifecycle                                 │
//! │                                                                         │
//! │  create_payment(booking, method, amount)                               │
//! │    │  amount must equal the outstanding balance                        │
//! │    ├── Cash   → row inserted Completed (settled at the desk)           │
//! │    ├── Card   → row inserted Pending, settled by capture_card_payment  │
//! │    └── Khalti/eSewa → gateway initiate, row inserted Pending with      │
//! │                       gateway_ref, guest gets a redirect/form          │
//! │                                                                         │
//! │  verify_payment(payment, token, amount)   [after guest returns]        │
//! │    │  per-payment lock, idempotent; token must match the stored        │
//! │    │  gateway ref and amount the stored row before any lookup          │
//! │    ├── gateway: Completed + amount matches → mark Completed            │
//! │    ├── gateway: Completed + amount differs → mark Failed, error        │
//! │    ├── gateway: Pending → leave Pending (retry later)                  │
//! │    ├── gateway: Failed  → mark Failed                                  │
//! │    └── timeout/outage   → leave Pending, error is retryable            │
//! │                                                                         │
//! │  After any completion: booking fully paid ⇒ auto-confirm;              │
//! │  booking cancelled in the meantime ⇒ auto-refund.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod esewa;
pub mod gateway;
pub mod khalti;
pub mod mock;
pub mod reconcile;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use basera_core::types::{Payment, PaymentMethod, PaymentStatus};
use basera_core::validation::validate_payment_amount;
use basera_core::Money;
use basera_db::{generate_id, Database};

use crate::error::{EngineError, EngineResult};
use crate::locks::KeyedLocks;
use crate::payment::gateway::{ChargeState, PaymentGateway, PaymentInstruction};

/// Reason recorded when a verification completes against a booking that
/// was cancelled while the guest was at the gateway.
const CANCELLED_REFUND_REASON: &str = "booking cancelled before verification";

// =============================================================================
// Outcomes
// =============================================================================

/// Result of creating a payment.
#[derive(Debug)]
pub struct PaymentCreated {
    pub payment: Payment,

    /// Present for gateway methods: what the guest does next.
    pub instruction: Option<PaymentInstruction>,
}

/// Result of verifying a gateway payment.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// Money landed and the row is Completed.
    Completed(Payment),

    /// Money landed, but the booking had been cancelled; the payment was
    /// completed and immediately refunded.
    AutoRefunded(Payment),

    /// Guest has not finished the gateway flow. Try again later.
    StillPending(Payment),

    /// Gateway reported the payment failed or was abandoned.
    Failed(Payment),
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Coordinates payments across repositories and gateways.
pub struct PaymentOrchestrator {
    db: Database,
    locks: Arc<KeyedLocks>,
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl PaymentOrchestrator {
    /// Creates an orchestrator with no gateways registered (cash and
    /// card only).
    pub fn new(db: Database, locks: Arc<KeyedLocks>) -> Self {
        PaymentOrchestrator {
            db,
            locks,
            gateways: HashMap::new(),
        }
    }

    /// Registers a gateway for a method.
    pub fn with_gateway(mut self, method: PaymentMethod, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(method, gateway);
        self
    }

    fn gateway_for(&self, method: PaymentMethod) -> EngineResult<&Arc<dyn PaymentGateway>> {
        self.gateways.get(&method).ok_or_else(|| {
            EngineError::InvalidConfig(format!("no gateway configured for {method:?}"))
        })
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a payment against a booking.
    ///
    /// The amount must equal the booking's outstanding balance exactly;
    /// anything else is rejected before a row is written. Held under the
    /// booking's payment lock so concurrent creates see each other's
    /// pending intents and cannot both charge the guest.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn create_payment(
        &self,
        booking_id: &str,
        method: PaymentMethod,
        amount: Money,
    ) -> EngineResult<PaymentCreated> {
        validate_payment_amount(amount.paisa()).map_err(basera_core::CoreError::from)?;

        let _guard = self
            .locks
            .acquire(&format!("payments:{booking_id}"))
            .await;

        let bookings = self.db.bookings();
        let booking = bookings
            .get_by_id(booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Booking",
                id: booking_id.to_string(),
            })?;

        match booking.status {
            basera_core::types::BookingStatus::Pending
            | basera_core::types::BookingStatus::Confirmed
            | basera_core::types::BookingStatus::CheckedIn => {}
            other => {
                return Err(EngineError::InvalidState {
                    entity: "Booking",
                    id: booking_id.to_string(),
                    actual: format!("{other:?}"),
                    operation: "accept a payment",
                })
            }
        }

        // Pending intents count: an unverified gateway payment reserves
        // its slice of the total
        let payments = self.db.payments();
        let reserved = payments.sum_counting(booking_id).await?;
        let outstanding = Money::from_paisa(booking.total_paisa) - reserved;

        if amount != outstanding {
            return Err(EngineError::OutstandingMismatch {
                booking_id: booking_id.to_string(),
                requested: amount.paisa(),
                outstanding: outstanding.paisa(),
            });
        }

        let now = chrono::Utc::now();
        let mut payment = Payment {
            id: generate_id(),
            booking_id: booking_id.to_string(),
            method,
            amount_paisa: amount.paisa(),
            status: PaymentStatus::Pending,
            gateway_ref: None,
            gateway_payload: None,
            refund_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let instruction = match method {
            PaymentMethod::Cash => {
                // Settled at the desk: the row is born Completed
                payment.status = PaymentStatus::Completed;
                payment.completed_at = Some(now);
                None
            }
            PaymentMethod::Card => None,
            PaymentMethod::Khalti | PaymentMethod::Esewa => {
                let gateway = self.gateway_for(method)?;
                let outcome = gateway.initiate(&payment).await?;
                payment.gateway_ref = Some(outcome.gateway_ref);
                Some(outcome.instruction)
            }
        };

        payments.insert(&payment).await?;

        info!(
            payment_id = %payment.id,
            method = ?method,
            amount = amount.paisa(),
            "Payment created"
        );

        if payment.status == PaymentStatus::Completed {
            self.after_completion(&payment.id).await?;
        }

        let payment = self.reload(&payment.id).await?;
        Ok(PaymentCreated {
            payment,
            instruction,
        })
    }

    // =========================================================================
    // Verify
    // =========================================================================

    /// Verifies a gateway payment against the gateway's lookup API.
    ///
    /// `token` is the callback token the guest returned with and must
    /// match the stored gateway reference; `claimed_amount` is what the
    /// callback says was paid and must match the recorded row. Both are
    /// checked before the lookup - the gateway's word, not the client's,
    /// settles the payment.
    ///
    /// Idempotent: an already-Completed payment returns immediately.
    /// Timeouts and outages leave the payment Pending and surface a
    /// retryable error - money may have moved, so nothing is marked
    /// Failed on an unknown outcome.
    #[instrument(skip(self, token), fields(payment_id = %payment_id))]
    pub async fn verify_payment(
        &self,
        payment_id: &str,
        token: &str,
        claimed_amount: Money,
    ) -> EngineResult<VerifyOutcome> {
        let _guard = self.locks.acquire(&format!("payment:{payment_id}")).await;

        let payments = self.db.payments();
        let payment = payments
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Payment",
                id: payment_id.to_string(),
            })?;

        match payment.status {
            PaymentStatus::Completed => return Ok(VerifyOutcome::Completed(payment)),
            PaymentStatus::Failed => return Ok(VerifyOutcome::Failed(payment)),
            PaymentStatus::Refunded => return Ok(VerifyOutcome::AutoRefunded(payment)),
            PaymentStatus::Pending => {}
        }

        if !payment.method.is_gateway() {
            return Err(EngineError::InvalidState {
                entity: "Payment",
                id: payment_id.to_string(),
                actual: format!("{:?}", payment.method),
                operation: "verify against a gateway",
            });
        }

        let gateway_ref =
            payment
                .gateway_ref
                .as_deref()
                .ok_or_else(|| EngineError::InvalidState {
                    entity: "Payment",
                    id: payment_id.to_string(),
                    actual: "missing gateway reference".to_string(),
                    operation: "verify",
                })?;

        if token != gateway_ref {
            warn!(payment_id = %payment_id, "Callback token does not match stored gateway reference");
            return Err(EngineError::TokenMismatch {
                payment_id: payment_id.to_string(),
            });
        }

        // A callback claiming a different amount is reported without
        // touching the row; the gateway lookup below is the authority
        if claimed_amount.paisa() != payment.amount_paisa {
            return Err(EngineError::AmountMismatch {
                payment_id: payment_id.to_string(),
                expected: payment.amount_paisa,
                actual: claimed_amount.paisa(),
            });
        }

        let gateway = self.gateway_for(payment.method)?;
        let charge = gateway.lookup(gateway_ref).await?;

        match charge.state {
            ChargeState::Completed => {
                if charge.amount.paisa() != payment.amount_paisa {
                    warn!(
                        payment_id = %payment_id,
                        expected = payment.amount_paisa,
                        actual = charge.amount.paisa(),
                        "Gateway settled a different amount"
                    );
                    payments
                        .mark_failed(payment_id, Some(&charge.raw_payload))
                        .await?;
                    return Err(EngineError::AmountMismatch {
                        payment_id: payment_id.to_string(),
                        expected: payment.amount_paisa,
                        actual: charge.amount.paisa(),
                    });
                }

                payments
                    .mark_completed(payment_id, None, Some(&charge.raw_payload))
                    .await?;

                info!(payment_id = %payment_id, "Payment verified and completed");

                let refunded = self.after_completion(payment_id).await?;
                let payment = self.reload(payment_id).await?;
                if refunded {
                    Ok(VerifyOutcome::AutoRefunded(payment))
                } else {
                    Ok(VerifyOutcome::Completed(payment))
                }
            }
            ChargeState::Pending => Ok(VerifyOutcome::StillPending(payment)),
            ChargeState::Failed | ChargeState::Refunded => {
                payments
                    .mark_failed(payment_id, Some(&charge.raw_payload))
                    .await?;
                let payment = self.reload(payment_id).await?;
                Ok(VerifyOutcome::Failed(payment))
            }
        }
    }

    // =========================================================================
    // Card Capture
    // =========================================================================

    /// Settles a pending card payment with the terminal's reference.
    ///
    /// Card payments have no lookup API; the desk confirms settlement
    /// against the physical terminal and records its reference here.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn capture_card_payment(
        &self,
        payment_id: &str,
        terminal_ref: &str,
    ) -> EngineResult<VerifyOutcome> {
        let _guard = self.locks.acquire(&format!("payment:{payment_id}")).await;

        let payments = self.db.payments();
        let payment = payments
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Payment",
                id: payment_id.to_string(),
            })?;

        if payment.method != PaymentMethod::Card {
            return Err(EngineError::InvalidState {
                entity: "Payment",
                id: payment_id.to_string(),
                actual: format!("{:?}", payment.method),
                operation: "capture as a card payment",
            });
        }

        payments
            .mark_completed(payment_id, Some(terminal_ref), None)
            .await?;

        info!(payment_id = %payment_id, terminal_ref = %terminal_ref, "Card payment captured");

        let refunded = self.after_completion(payment_id).await?;
        let payment = self.reload(payment_id).await?;
        if refunded {
            Ok(VerifyOutcome::AutoRefunded(payment))
        } else {
            Ok(VerifyOutcome::Completed(payment))
        }
    }

    // =========================================================================
    // Refund
    // =========================================================================

    /// Refunds a completed payment, recording the reason.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn refund_payment(&self, payment_id: &str, reason: &str) -> EngineResult<Payment> {
        let _guard = self.locks.acquire(&format!("payment:{payment_id}")).await;

        self.db.payments().mark_refunded(payment_id, reason).await?;

        info!(payment_id = %payment_id, reason = %reason, "Payment refunded");

        self.reload(payment_id).await
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Post-completion bookkeeping: auto-refund if the booking was
    /// cancelled while the payment was in flight, otherwise confirm the
    /// booking once it is fully paid.
    ///
    /// Returns true if the payment was auto-refunded.
    async fn after_completion(&self, payment_id: &str) -> EngineResult<bool> {
        let payments = self.db.payments();
        let bookings = self.db.bookings();

        let payment = self.reload(payment_id).await?;
        let booking = bookings
            .get_by_id(&payment.booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Booking",
                id: payment.booking_id.clone(),
            })?;

        if booking.status == basera_core::types::BookingStatus::Cancelled {
            warn!(
                payment_id = %payment_id,
                booking_id = %booking.id,
                "Payment completed against a cancelled booking, refunding"
            );
            payments
                .mark_refunded(payment_id, CANCELLED_REFUND_REASON)
                .await?;
            return Ok(true);
        }

        if booking.status == basera_core::types::BookingStatus::Pending {
            let completed: i64 = payments
                .list_for_booking(&booking.id)
                .await?
                .iter()
                .filter(|p| p.status == PaymentStatus::Completed)
                .map(|p| p.amount_paisa)
                .sum();

            if completed >= booking.total_paisa {
                // Re-check availability before confirming: another
                // booking may have taken the room while this one sat
                // unpaid
                let conflict = bookings
                    .find_conflict(
                        &booking.room_id,
                        booking.check_in,
                        booking.check_out,
                        Some(&booking.id),
                    )
                    .await?;

                if let Some(blocking) = conflict {
                    warn!(
                        booking_id = %booking.id,
                        conflicting_id = %blocking.id,
                        "Fully paid booking cannot confirm: room taken"
                    );
                } else if bookings.confirm(&booking.id).await? > 0 {
                    info!(booking_id = %booking.id, "Booking fully paid, confirmed");
                }
            }
        }

        Ok(false)
    }

    async fn reload(&self, payment_id: &str) -> EngineResult<Payment> {
        self.db
            .payments()
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Payment",
                id: payment_id.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::gateway::{GatewayCharge, GatewayError};
    use crate::payment::mock::MockGateway;
    use basera_core::types::{Booking, BookingStatus, Room, RoomStatus, RoomType};
    use basera_db::DbConfig;
    use chrono::{NaiveDate, Utc};

    async fn seeded_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        let rooms = db.rooms();
        rooms
            .insert_room_type(&RoomType {
                id: "rt-std".into(),
                name: "Standard".into(),
                max_adults: 2,
                max_children: 1,
            })
            .await
            .unwrap();
        rooms
            .insert(&Room {
                id: "room-101".into(),
                number: "101".into(),
                floor: 1,
                room_type_id: "rt-std".into(),
                base_price_paisa: Money::from_rupees(5000).paisa(),
                status: RoomStatus::VacantClean,
                status_before_ooo: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let booking = Booking {
            id: "bkg-1".into(),
            guest_id: "guest-1".into(),
            room_id: "room-101".into(),
            check_in: NaiveDate::from_ymd_opt(2025, 10, 22).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 10, 25).unwrap(),
            adults: 2,
            children: 0,
            status: BookingStatus::Pending,
            total_paisa: Money::from_rupees(15_000).paisa(),
            coupon_code: None,
            promotion_id: None,
            package_id: None,
            channel: None,
            external_ref: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        db.bookings()
            .insert_pending_atomic(&booking, None)
            .await
            .unwrap();

        db
    }

    fn orchestrator(db: Database, gateway: Arc<MockGateway>) -> PaymentOrchestrator {
        PaymentOrchestrator::new(db, Arc::new(KeyedLocks::new()))
            .with_gateway(PaymentMethod::Khalti, gateway)
    }

    fn completed_charge(amount: Money) -> GatewayCharge {
        GatewayCharge {
            state: ChargeState::Completed,
            amount,
            raw_payload: r#"{"status":"Completed"}"#.to_string(),
        }
    }

    fn token_of(created: &PaymentCreated) -> String {
        created.payment.gateway_ref.clone().unwrap()
    }

    #[tokio::test]
    async fn test_cash_payment_completes_and_confirms() {
        let db = seeded_db().await;
        let orch = orchestrator(db.clone(), Arc::new(MockGateway::new()));

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Cash, Money::from_rupees(15_000))
            .await
            .unwrap();

        assert_eq!(created.payment.status, PaymentStatus::Completed);
        assert!(created.instruction.is_none());

        let booking = db.bookings().get_by_id("bkg-1").await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_partial_amount_rejected() {
        let db = seeded_db().await;
        let orch = orchestrator(db.clone(), Arc::new(MockGateway::new()));

        let err = orch
            .create_payment("bkg-1", PaymentMethod::Cash, Money::from_rupees(5000))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::OutstandingMismatch { outstanding, .. }
            if outstanding == Money::from_rupees(15_000).paisa()));

        let booking = db.bookings().get_by_id("bkg-1").await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(db.payments().list_for_booking("bkg-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_payment_rejected_once_settled() {
        let db = seeded_db().await;
        let orch = orchestrator(db.clone(), Arc::new(MockGateway::new()));

        orch.create_payment("bkg-1", PaymentMethod::Cash, Money::from_rupees(15_000))
            .await
            .unwrap();

        let err = orch
            .create_payment("bkg-1", PaymentMethod::Cash, Money::from_rupees(15_000))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::OutstandingMismatch { outstanding: 0, .. }));
    }

    #[tokio::test]
    async fn test_pending_intent_blocks_duplicate_charge() {
        let db = seeded_db().await;
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(db.clone(), gateway.clone());

        orch.create_payment("bkg-1", PaymentMethod::Khalti, Money::from_rupees(15_000))
            .await
            .unwrap();

        // The unverified intent reserves the balance
        let err = orch
            .create_payment("bkg-1", PaymentMethod::Cash, Money::from_rupees(15_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::OutstandingMismatch { outstanding: 0, .. }));
    }

    #[tokio::test]
    async fn test_gateway_verify_completes() {
        let db = seeded_db().await;
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(db.clone(), gateway.clone());

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Khalti, Money::from_rupees(15_000))
            .await
            .unwrap();
        assert_eq!(created.payment.status, PaymentStatus::Pending);
        assert!(created.instruction.is_some());

        gateway.push_lookup(Ok(completed_charge(Money::from_rupees(15_000))));

        let token = token_of(&created);
        let outcome = orch
            .verify_payment(&created.payment.id, &token, Money::from_rupees(15_000))
            .await
            .unwrap();
        assert!(matches!(outcome, VerifyOutcome::Completed(_)));

        // Idempotent: no second lookup
        let outcome = orch
            .verify_payment(&created.payment.id, &token, Money::from_rupees(15_000))
            .await
            .unwrap();
        assert!(matches!(outcome, VerifyOutcome::Completed(_)));
        assert_eq!(gateway.lookup_calls(), 1);

        let booking = db.bookings().get_by_id("bkg-1").await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_foreign_token_rejected_before_lookup() {
        let db = seeded_db().await;
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(db.clone(), gateway.clone());

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Khalti, Money::from_rupees(15_000))
            .await
            .unwrap();

        let err = orch
            .verify_payment(
                &created.payment.id,
                "some-other-pidx",
                Money::from_rupees(15_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TokenMismatch { .. }));

        // No gateway call was made, nothing changed on the row
        assert_eq!(gateway.lookup_calls(), 0);
        let payment = db
            .payments()
            .get_by_id(&created.payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_claimed_amount_mismatch_leaves_payment_pending() {
        let db = seeded_db().await;
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(db.clone(), gateway.clone());

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Khalti, Money::from_rupees(15_000))
            .await
            .unwrap();

        // Callback claims less than the recorded row
        let err = orch
            .verify_payment(
                &created.payment.id,
                &token_of(&created),
                Money::from_rupees(14_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AmountMismatch { expected, actual, .. }
            if expected == Money::from_rupees(15_000).paisa()
                && actual == Money::from_rupees(14_000).paisa()));

        // The client's claim never reached the gateway or the row
        assert_eq!(gateway.lookup_calls(), 0);
        let payment = db
            .payments()
            .get_by_id(&created.payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_amount_mismatch_fails_payment() {
        let db = seeded_db().await;
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(db.clone(), gateway.clone());

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Khalti, Money::from_rupees(15_000))
            .await
            .unwrap();

        gateway.push_lookup(Ok(completed_charge(Money::from_rupees(14_000))));

        let err = orch
            .verify_payment(
                &created.payment.id,
                &token_of(&created),
                Money::from_rupees(15_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AmountMismatch { .. }));

        let payment = db
            .payments()
            .get_by_id(&created.payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_timeout_leaves_payment_pending() {
        let db = seeded_db().await;
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(db.clone(), gateway.clone());

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Khalti, Money::from_rupees(15_000))
            .await
            .unwrap();

        gateway.push_lookup(Err(GatewayError::Timeout { seconds: 30 }));

        let token = token_of(&created);
        let err = orch
            .verify_payment(&created.payment.id, &token, Money::from_rupees(15_000))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let payment = db
            .payments()
            .get_by_id(&created.payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        // The retry succeeds
        gateway.push_lookup(Ok(completed_charge(Money::from_rupees(15_000))));
        let outcome = orch
            .verify_payment(&created.payment.id, &token, Money::from_rupees(15_000))
            .await
            .unwrap();
        assert!(matches!(outcome, VerifyOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_verify_after_cancel_auto_refunds() {
        let db = seeded_db().await;
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(db.clone(), gateway.clone());

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Khalti, Money::from_rupees(15_000))
            .await
            .unwrap();

        // Guest is at the gateway; front desk cancels the booking
        db.bookings().cancel("bkg-1", "guest no-show").await.unwrap();

        gateway.push_lookup(Ok(completed_charge(Money::from_rupees(15_000))));

        let outcome = orch
            .verify_payment(
                &created.payment.id,
                &token_of(&created),
                Money::from_rupees(15_000),
            )
            .await
            .unwrap();
        match outcome {
            VerifyOutcome::AutoRefunded(payment) => {
                assert_eq!(payment.status, PaymentStatus::Refunded);
                assert_eq!(
                    payment.refund_reason.as_deref(),
                    Some(CANCELLED_REFUND_REASON)
                );
            }
            other => panic!("expected auto-refund, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_card_capture() {
        let db = seeded_db().await;
        let orch = orchestrator(db.clone(), Arc::new(MockGateway::new()));

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Card, Money::from_rupees(15_000))
            .await
            .unwrap();
        assert_eq!(created.payment.status, PaymentStatus::Pending);

        let outcome = orch
            .capture_card_payment(&created.payment.id, "TERM-00417")
            .await
            .unwrap();
        assert!(matches!(outcome, VerifyOutcome::Completed(_)));

        let payment = db
            .payments()
            .get_by_id(&created.payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.gateway_ref.as_deref(), Some("TERM-00417"));

        let booking = db.bookings().get_by_id("bkg-1").await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_refund_requires_completed() {
        let db = seeded_db().await;
        let orch = orchestrator(db.clone(), Arc::new(MockGateway::new()));

        let created = orch
            .create_payment("bkg-1", PaymentMethod::Card, Money::from_rupees(15_000))
            .await
            .unwrap();

        let err = orch
            .refund_payment(&created.payment.id, "guest request")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Db(basera_db::DbError::StaleState { .. })
        ));
    }
}

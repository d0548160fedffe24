//! # Payment Repository
//!
//! Append-only payment audit trail. Payment rows are never deleted:
//! every attempt, failure, and refund stays on record, and totals are
//! derived by summing rather than mutating a balance column.
//!
//! Status moves through guarded UPDATEs only - `mark_completed` matches
//! Pending rows, `mark_refunded` matches Completed rows. A concurrent
//! verifier that loses the race gets zero rows back and the caller
//! treats the payment as already settled.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use basera_core::types::{Payment, PaymentMethod};
use basera_core::Money;

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Inserts a payment row.
    pub async fn insert(&self, payment: &Payment) -> DbResult<()> {
        debug!(
            id = %payment.id,
            booking_id = %payment.booking_id,
            method = ?payment.method,
            "Inserting payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, method, amount_paisa, status,
                gateway_ref, gateway_payload, refund_reason,
                created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.booking_id)
        .bind(payment.method)
        .bind(payment.amount_paisa)
        .bind(payment.status)
        .bind(&payment.gateway_ref)
        .bind(&payment.gateway_payload)
        .bind(&payment.refund_reason)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(payment.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a payment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    /// Lists all payments for a booking, oldest first.
    pub async fn list_for_booking(&self, booking_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE booking_id = ?1 ORDER BY created_at",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Sums payments that count towards the booking total.
    ///
    /// Pending intents are included: an unverified intent reserves its
    /// slice of the total so a second create cannot over-collect.
    /// Failed and refunded payments never count.
    pub async fn sum_counting(&self, booking_id: &str) -> DbResult<Money> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount_paisa) FROM payments
            WHERE booking_id = ?1 AND status IN ('pending', 'completed')
            "#,
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_paisa(sum.unwrap_or(0)))
    }

    /// Marks a pending payment as completed, recording the gateway
    /// reference and raw payload.
    ///
    /// Guarded on `status = 'pending'`: a payment already settled (or
    /// failed) yields `StaleState` instead of a double completion.
    pub async fn mark_completed(
        &self,
        id: &str,
        gateway_ref: Option<&str>,
        gateway_payload: Option<&str>,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'completed',
                gateway_ref = COALESCE(?2, gateway_ref),
                gateway_payload = COALESCE(?3, gateway_payload),
                completed_at = ?4,
                updated_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(gateway_ref)
        .bind(gateway_payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Payment", id));
        }

        Ok(())
    }

    /// Marks a pending payment as failed.
    pub async fn mark_failed(&self, id: &str, gateway_payload: Option<&str>) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'failed',
                gateway_payload = COALESCE(?2, gateway_payload),
                updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(gateway_payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Payment", id));
        }

        Ok(())
    }

    /// Marks a completed payment as refunded, recording the reason.
    ///
    /// Only Completed payments are refundable - money that never landed
    /// cannot come back.
    pub async fn mark_refunded(&self, id: &str, reason: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'refunded',
                refund_reason = ?2,
                updated_at = ?3
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Payment", id));
        }

        Ok(())
    }

    /// Fails every still-pending payment for a booking.
    ///
    /// Used when a booking is cancelled: outstanding intents can never
    /// complete, so they are closed out in one sweep. Returns the number
    /// of payments failed.
    pub async fn fail_pending_for_booking(&self, booking_id: &str, note: &str) -> DbResult<u64> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'failed',
                refund_reason = ?2,
                updated_at = ?3
            WHERE booking_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(booking_id)
        .bind(note)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lists pending gateway payments older than the given cutoff.
    ///
    /// Feed for the reconciliation sweep: cash and card settle at the
    /// desk, so only Khalti/eSewa intents can be stranded mid-verify.
    pub async fn list_pending_gateway(
        &self,
        older_than: DateTime<Utc>,
    ) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE status = 'pending'
              AND method IN (?1, ?2)
              AND created_at < ?3
            ORDER BY created_at
            "#,
        )
        .bind(PaymentMethod::Khalti)
        .bind(PaymentMethod::Esewa)
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

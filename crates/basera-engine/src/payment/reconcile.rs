//! # Payment Reconciliation
//!
//! Sweep for gateway payments stranded in Pending: the guest paid but
//! never returned, the verify call timed out, or the process restarted
//! mid-flow. Each stranded payment is re-verified against the gateway's
//! lookup API with exponential backoff on transient failures.

use backoff::ExponentialBackoff;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use basera_core::Money;
use basera_db::Database;

use crate::error::{EngineError, EngineResult};
use crate::payment::{PaymentOrchestrator, VerifyOutcome};

/// Summary of one reconciliation sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
    /// Payments whose gateway could not be reached even after backoff.
    pub unreachable: usize,
}

/// Reconciliation sweep over stranded gateway payments.
pub struct ReconcileSweep {
    db: Database,
    orchestrator: Arc<PaymentOrchestrator>,
    min_age: Duration,
}

impl ReconcileSweep {
    /// Creates a sweep.
    ///
    /// `min_age` keeps the sweep away from payments whose guest may
    /// still be mid-redirect.
    pub fn new(db: Database, orchestrator: Arc<PaymentOrchestrator>, min_age: Duration) -> Self {
        ReconcileSweep {
            db,
            orchestrator,
            min_age,
        }
    }

    /// Runs one sweep and reports what happened.
    ///
    /// Transient gateway failures are retried with exponential backoff;
    /// a payment that stays unreachable is left Pending for the next
    /// sweep rather than failing the whole run.
    pub async fn run_once(&self) -> EngineResult<SweepReport> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.min_age)
                .map_err(|e| EngineError::Internal(e.to_string()))?;

        let stranded = self.db.payments().list_pending_gateway(cutoff).await?;

        let mut report = SweepReport {
            examined: stranded.len(),
            ..SweepReport::default()
        };

        if stranded.is_empty() {
            return Ok(report);
        }

        info!(count = stranded.len(), "Reconciling stranded gateway payments");

        for payment in stranded {
            let payment_id = payment.id.clone();
            let amount = Money::from_paisa(payment.amount_paisa);

            // The stored reference is the sweep's token; a gateway row
            // without one can never be verified
            let token = match payment.gateway_ref.clone() {
                Some(token) => token,
                None => {
                    warn!(payment_id = %payment_id, "Pending gateway payment has no reference, skipping");
                    report.failed += 1;
                    continue;
                }
            };

            let outcome = backoff::future::retry(short_backoff(), || async {
                match self
                    .orchestrator
                    .verify_payment(&payment_id, &token, amount)
                    .await
                {
                    Ok(outcome) => Ok(outcome),
                    Err(e) if e.is_retryable() => Err(backoff::Error::transient(e)),
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            })
            .await;

            match outcome {
                Ok(VerifyOutcome::Completed(_)) | Ok(VerifyOutcome::AutoRefunded(_)) => {
                    report.completed += 1;
                }
                Ok(VerifyOutcome::Failed(_)) => report.failed += 1,
                Ok(VerifyOutcome::StillPending(_)) => report.still_pending += 1,
                Err(e) if e.is_retryable() => {
                    warn!(payment_id = %payment_id, error = %e, "Gateway unreachable, leaving pending");
                    report.unreachable += 1;
                }
                Err(e) => {
                    // Permanent per-payment failures (amount mismatch)
                    // are already recorded on the row
                    warn!(payment_id = %payment_id, error = %e, "Reconciliation marked payment failed");
                    report.failed += 1;
                }
            }
        }

        info!(?report, "Reconciliation sweep finished");
        Ok(report)
    }
}

/// Backoff tuned for an in-sweep retry: a few quick attempts, then give
/// up and let the next sweep try again.
fn short_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(Duration::from_secs(15)),
        ..ExponentialBackoff::default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

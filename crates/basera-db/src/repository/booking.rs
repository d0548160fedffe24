//! # Booking Repository
//!
//! Database operations for bookings: overlap queries, the atomic
//! booking+payment-intent insert, guarded lifecycle transitions, and the
//! idempotent OTA upsert.
//!
//! ## Booking Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Booking Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE (atomic)                                                    │
//! │     └── insert_pending_atomic() → Booking { status: Pending }          │
//! │         └── same transaction: overlap re-check + payment intent        │
//! │                                                                         │
//! │  2. CONFIRM (idempotent at the service layer)                          │
//! │     └── confirm() → status: Confirmed                                  │
//! │                                                                         │
//! │  3. CHECK-IN / CHECK-OUT                                               │
//! │     └── set_checked_in() / set_checked_out()                           │
//! │         (the room status machine transitions FIRST; see engine)        │
//! │                                                                         │
//! │  4. (OPTIONAL) CANCEL - from Pending/Confirmed only                    │
//! │     └── cancel() → status: Cancelled, reason recorded                  │
//! │                                                                         │
//! │  Every transition is a guarded UPDATE: wrong current status means      │
//! │  zero rows matched and the caller finds out.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use basera_core::types::{Booking, BookingStatus, Payment};

/// Outcome of an atomic insert that re-checks availability first.
#[derive(Debug)]
pub enum InsertOutcome {
    /// Booking (and payment intent, if any) written.
    Inserted,
    /// An availability-blocking booking overlaps; nothing was written.
    Conflict(Booking),
}

/// Outcome of an OTA upsert keyed by (channel, external_ref).
#[derive(Debug)]
pub enum UpsertOutcome {
    /// No booking with this external key existed; a new one was written.
    Inserted,
    /// A booking with this external key existed; it was updated in place.
    Updated,
    /// A different local booking blocks the requested dates; nothing was
    /// written. Carries the conflicting booking for the sync log message.
    Conflict(Booking),
}

/// Repository for booking database operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    /// Creates a new BookingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    /// Gets a booking by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    /// Finds an availability-blocking booking overlapping the given
    /// half-open range for a room.
    ///
    /// Overlap test: `existing.check_in < new.check_out AND
    /// existing.check_out > new.check_in`. Only bookings with status in
    /// {confirmed, checked_in} block availability.
    ///
    /// ## Arguments
    /// * `exclude` - booking ID to ignore (re-checks during confirm)
    pub async fn find_conflict(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        exclude: Option<&str>,
    ) -> DbResult<Option<Booking>> {
        let conflict = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE room_id = ?1
              AND status IN ('confirmed', 'checked_in')
              AND check_in < ?3
              AND check_out > ?2
              AND (?4 IS NULL OR id != ?4)
            ORDER BY check_in
            LIMIT 1
            "#,
        )
        .bind(room_id)
        .bind(check_in)
        .bind(check_out)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conflict)
    }

    /// Atomically inserts a pending booking plus its at-most-one payment
    /// intent, re-running the overlap check inside the same transaction.
    ///
    /// Both rows land or neither does - an orphaned booking with no
    /// payment path is impossible. The caller holds the per-room lock,
    /// making check + insert a serialized unit.
    pub async fn insert_pending_atomic(
        &self,
        booking: &Booking,
        intent: Option<&Payment>,
    ) -> DbResult<InsertOutcome> {
        debug!(id = %booking.id, room_id = %booking.room_id, "Inserting booking");

        let mut tx = self.pool.begin().await?;

        // Overlap re-check inside the transaction scope
        let conflict = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE room_id = ?1
              AND status IN ('confirmed', 'checked_in')
              AND check_in < ?3
              AND check_out > ?2
            LIMIT 1
            "#,
        )
        .bind(&booking.room_id)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = conflict {
            tx.rollback().await?;
            return Ok(InsertOutcome::Conflict(existing));
        }

        insert_booking_row(&mut tx, booking).await?;

        if let Some(payment) = intent {
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
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(InsertOutcome::Inserted)
    }

    /// Confirms a pending booking.
    ///
    /// Returns the number of rows changed: 0 means the booking was not
    /// Pending (the service layer decides whether that's idempotent
    /// success or an error).
    pub async fn confirm(&self, id: &str) -> DbResult<u64> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE bookings SET status = 'confirmed', updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks a confirmed booking as checked in.
    pub async fn set_checked_in(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE bookings SET status = 'checked_in', updated_at = ?2
            WHERE id = ?1 AND status = 'confirmed'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Booking", id));
        }

        Ok(())
    }

    /// Marks a checked-in booking as checked out.
    pub async fn set_checked_out(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE bookings SET status = 'checked_out', updated_at = ?2
            WHERE id = ?1 AND status = 'checked_in'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Booking", id));
        }

        Ok(())
    }

    /// Cancels a booking, recording the reason.
    ///
    /// Legal only from Pending/Confirmed - a stay in progress or
    /// completed cannot be cancelled.
    pub async fn cancel(&self, id: &str, reason: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                status = 'cancelled',
                cancel_reason = ?2,
                updated_at = ?3
            WHERE id = ?1 AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Booking", id));
        }

        Ok(())
    }

    /// Lists bookings for a room, newest first.
    pub async fn list_for_room(&self, room_id: &str) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE room_id = ?1 ORDER BY created_at DESC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// Finds a booking by its OTA channel reference.
    pub async fn find_by_external_ref(
        &self,
        channel: &str,
        external_ref: &str,
    ) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE channel = ?1 AND external_ref = ?2",
        )
        .bind(channel)
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Idempotent upsert for an OTA-imported booking, keyed by
    /// (channel, external_ref).
    ///
    /// ## Behavior
    /// - same key already imported → update the local copy in place
    ///   (dates, party, total), never a second row
    /// - new key → availability check, then insert
    /// - a DIFFERENT local booking blocks the dates → nothing written,
    ///   `Conflict` returned for the sync log
    ///
    /// The caller holds the per-external-key lock, so two imports of the
    /// same key cannot interleave.
    pub async fn upsert_external(&self, booking: &Booking) -> DbResult<UpsertOutcome> {
        let (channel, external_ref) = match (&booking.channel, &booking.external_ref) {
            (Some(c), Some(r)) => (c.clone(), r.clone()),
            _ => {
                return Err(DbError::Internal(
                    "upsert_external requires channel and external_ref".to_string(),
                ))
            }
        };

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE channel = ?1 AND external_ref = ?2",
        )
        .bind(&channel)
        .bind(&external_ref)
        .fetch_optional(&mut *tx)
        .await?;

        // Availability must hold against every OTHER blocking booking
        let exclude = existing.as_ref().map(|b| b.id.clone());
        let conflict = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE room_id = ?1
              AND status IN ('confirmed', 'checked_in')
              AND check_in < ?3
              AND check_out > ?2
              AND (?4 IS NULL OR id != ?4)
            LIMIT 1
            "#,
        )
        .bind(&booking.room_id)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(&exclude)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(blocking) = conflict {
            tx.rollback().await?;
            return Ok(UpsertOutcome::Conflict(blocking));
        }

        let outcome = match existing {
            Some(local) => {
                debug!(
                    external_ref = %external_ref,
                    local_id = %local.id,
                    "Updating previously imported booking"
                );

                let now = Utc::now();
                sqlx::query(
                    r#"
                    UPDATE bookings SET
                        room_id = ?2, check_in = ?3, check_out = ?4,
                        adults = ?5, children = ?6, status = ?7,
                        total_paisa = ?8, updated_at = ?9
                    WHERE id = ?1
                    "#,
                )
                .bind(&local.id)
                .bind(&booking.room_id)
                .bind(booking.check_in)
                .bind(booking.check_out)
                .bind(booking.adults)
                .bind(booking.children)
                .bind(booking.status)
                .bind(booking.total_paisa)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                UpsertOutcome::Updated
            }
            None => {
                debug!(external_ref = %external_ref, "Importing new channel booking");
                insert_booking_row(&mut tx, booking).await?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;

        Ok(outcome)
    }
}

/// Shared INSERT used by both the atomic create and the OTA upsert.
async fn insert_booking_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    booking: &Booking,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, guest_id, room_id, check_in, check_out,
            adults, children, status, total_paisa,
            coupon_code, promotion_id, package_id,
            channel, external_ref, cancel_reason,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12,
            ?13, ?14, ?15,
            ?16, ?17
        )
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.guest_id)
    .bind(&booking.room_id)
    .bind(booking.check_in)
    .bind(booking.check_out)
    .bind(booking.adults)
    .bind(booking.children)
    .bind(booking.status)
    .bind(booking.total_paisa)
    .bind(&booking.coupon_code)
    .bind(&booking.promotion_id)
    .bind(&booking.package_id)
    .bind(&booking.channel)
    .bind(&booking.external_ref)
    .bind(&booking.cancel_reason)
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;
    use basera_core::types::{Room, RoomStatus, RoomType};
    use basera_core::Money;

    async fn seeded_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let rooms = db.rooms();
        rooms
            .insert_room_type(&RoomType {
                id: "rt-deluxe".into(),
                name: "Deluxe Double".into(),
                max_adults: 2,
                max_children: 2,
            })
            .await
            .unwrap();

        let now = Utc::now();
        rooms
            .insert(&Room {
                id: "room-101".into(),
                number: "101".into(),
                floor: 1,
                room_type_id: "rt-deluxe".into(),
                base_price_paisa: Money::from_rupees(5000).paisa(),
                status: RoomStatus::VacantClean,
                status_before_ooo: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        db
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_booking(status: BookingStatus, check_in: NaiveDate, check_out: NaiveDate) -> Booking {
        let now = Utc::now();
        Booking {
            id: generate_id(),
            guest_id: "guest-1".into(),
            room_id: "room-101".into(),
            check_in,
            check_out,
            adults: 2,
            children: 0,
            status,
            total_paisa: Money::from_rupees(15_000).paisa(),
            coupon_code: None,
            promotion_id: None,
            package_id: None,
            channel: None,
            external_ref: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_atomic_insert_then_conflict() {
        let db = seeded_db().await;
        let repo = db.bookings();

        let first = sample_booking(
            BookingStatus::Confirmed,
            date(2025, 10, 22),
            date(2025, 10, 25),
        );
        let outcome = repo.insert_pending_atomic(&first, None).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted));

        // Overlapping range against a confirmed booking loses
        let second = sample_booking(
            BookingStatus::Pending,
            date(2025, 10, 24),
            date(2025, 10, 26),
        );
        let outcome = repo.insert_pending_atomic(&second, None).await.unwrap();
        match outcome {
            InsertOutcome::Conflict(existing) => assert_eq!(existing.id, first.id),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert!(repo.get_by_id(&second.id).await.unwrap().is_none());

        // Back-to-back stay is fine (half-open interval)
        let third = sample_booking(
            BookingStatus::Pending,
            date(2025, 10, 25),
            date(2025, 10, 27),
        );
        let outcome = repo.insert_pending_atomic(&third, None).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted));
    }

    #[tokio::test]
    async fn test_pending_bookings_do_not_block() {
        let db = seeded_db().await;
        let repo = db.bookings();

        let pending = sample_booking(
            BookingStatus::Pending,
            date(2025, 10, 22),
            date(2025, 10, 25),
        );
        repo.insert_pending_atomic(&pending, None).await.unwrap();

        let overlapping = sample_booking(
            BookingStatus::Pending,
            date(2025, 10, 23),
            date(2025, 10, 24),
        );
        let outcome = repo.insert_pending_atomic(&overlapping, None).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted));
    }

    #[tokio::test]
    async fn test_lifecycle_guards() {
        let db = seeded_db().await;
        let repo = db.bookings();

        let booking = sample_booking(
            BookingStatus::Pending,
            date(2025, 10, 22),
            date(2025, 10, 25),
        );
        repo.insert_pending_atomic(&booking, None).await.unwrap();

        // Check-in before confirmation is a stale-state failure
        assert!(matches!(
            repo.set_checked_in(&booking.id).await.unwrap_err(),
            DbError::StaleState { .. }
        ));

        assert_eq!(repo.confirm(&booking.id).await.unwrap(), 1);
        // Second confirm matches nothing (idempotence decided by service)
        assert_eq!(repo.confirm(&booking.id).await.unwrap(), 0);

        repo.set_checked_in(&booking.id).await.unwrap();

        // Cancelling a stay in progress is rejected
        assert!(matches!(
            repo.cancel(&booking.id, "changed plans").await.unwrap_err(),
            DbError::StaleState { .. }
        ));

        repo.set_checked_out(&booking.id).await.unwrap();
        let b = repo.get_by_id(&booking.id).await.unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::CheckedOut);
    }

    #[tokio::test]
    async fn test_cancel_records_reason() {
        let db = seeded_db().await;
        let repo = db.bookings();

        let booking = sample_booking(
            BookingStatus::Pending,
            date(2025, 10, 22),
            date(2025, 10, 25),
        );
        repo.insert_pending_atomic(&booking, None).await.unwrap();

        repo.cancel(&booking.id, "guest request").await.unwrap();
        let b = repo.get_by_id(&booking.id).await.unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.cancel_reason.as_deref(), Some("guest request"));
    }

    #[tokio::test]
    async fn test_upsert_external_idempotent() {
        let db = seeded_db().await;
        let repo = db.bookings();

        let mut imported = sample_booking(
            BookingStatus::Confirmed,
            date(2025, 11, 1),
            date(2025, 11, 4),
        );
        imported.channel = Some("booking.com".into());
        imported.external_ref = Some("BDC-9001".into());

        let outcome = repo.upsert_external(&imported).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Inserted));

        // Same key again: update in place, never a duplicate
        let mut updated = imported.clone();
        updated.id = generate_id(); // a fresh import carries a fresh candidate id
        updated.check_out = date(2025, 11, 5);
        let outcome = repo.upsert_external(&updated).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Updated));

        let local = repo
            .find_by_external_ref("booking.com", "BDC-9001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local.id, imported.id); // original row kept
        assert_eq!(local.check_out, date(2025, 11, 5));

        let all = repo.list_for_room("room-101").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_external_conflict_with_local_booking() {
        let db = seeded_db().await;
        let repo = db.bookings();

        let local = sample_booking(
            BookingStatus::Confirmed,
            date(2025, 11, 1),
            date(2025, 11, 4),
        );
        repo.insert_pending_atomic(&local, None).await.unwrap();

        let mut imported = sample_booking(
            BookingStatus::Confirmed,
            date(2025, 11, 3),
            date(2025, 11, 6),
        );
        imported.channel = Some("agoda".into());
        imported.external_ref = Some("AGD-17".into());

        let outcome = repo.upsert_external(&imported).await.unwrap();
        match outcome {
            UpsertOutcome::Conflict(blocking) => assert_eq!(blocking.id, local.id),
            other => panic!("expected conflict, got {:?}", other),
        }

        // Nothing was written
        assert!(repo
            .find_by_external_ref("agoda", "AGD-17")
            .await
            .unwrap()
            .is_none());
    }
}

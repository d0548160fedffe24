//! # Booking Service
//!
//! The booking lifecycle: quote, create, confirm, check-in, check-out,
//! cancel.
//!
//! ## Concurrency
//! Every write to a room's booking calendar happens under that room's
//! keyed lock, and the insert re-checks availability inside its own
//! transaction. Two guests racing for the last night get one winner and
//! one `RoomUnavailable`, deterministically.
//!
//! ## Room Status Coupling
//! Check-in and check-out drive the room status machine FIRST: if the
//! room cannot accept the event (not clean, out of order), the booking
//! row is never touched.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use chrono::{NaiveDate, Utc};

use basera_core::pricing::compute_quote;
use basera_core::status::RoomEvent;
use basera_core::types::{
    Booking, BookingStatus, DiscountSet, Payment, PaymentMethod, PaymentStatus, PriceQuote,
};
use basera_core::Money;
use basera_db::{generate_id, Database, InsertOutcome};

use crate::error::{EngineError, EngineResult};
use crate::locks::KeyedLocks;
use crate::status::RoomStatusService;

// =============================================================================
// Requests
// =============================================================================

/// Everything needed to create a booking.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub guest_id: String,
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i64,
    pub children: i64,
    pub discounts: DiscountSet,

    /// Cash handed over at the desk when the booking is made. Must equal
    /// the quoted total; recorded atomically with the booking row.
    pub cash_deposit: Option<Money>,
}

/// A created booking plus the quote that priced it.
#[derive(Debug)]
pub struct BookingCreated {
    pub booking: Booking,
    pub quote: PriceQuote,
}

// =============================================================================
// Service
// =============================================================================

/// Service driving the booking lifecycle.
#[derive(Clone)]
pub struct BookingService {
    db: Database,
    locks: Arc<KeyedLocks>,
    rooms: RoomStatusService,
}

impl BookingService {
    /// Creates a new booking service.
    pub fn new(db: Database, locks: Arc<KeyedLocks>, rooms: RoomStatusService) -> Self {
        BookingService { db, locks, rooms }
    }

    fn room_lock_key(room_id: &str) -> String {
        format!("room:{room_id}")
    }

    // =========================================================================
    // Quote
    // =========================================================================

    /// Prices a stay without creating anything.
    pub async fn quote(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        adults: i64,
        children: i64,
        discounts: &DiscountSet,
    ) -> EngineResult<PriceQuote> {
        let rooms = self.db.rooms();
        let room = rooms
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Room",
                id: room_id.to_string(),
            })?;
        let room_type = rooms
            .get_room_type(&room.room_type_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "RoomType",
                id: room.room_type_id.clone(),
            })?;

        let quote = compute_quote(
            &room, &room_type, check_in, check_out, adults, children, discounts,
        )?;

        Ok(quote)
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a pending booking.
    ///
    /// ## Flow
    /// 1. Quote the stay (validates dates, occupancy, room active)
    /// 2. Take the room's lock
    /// 3. Insert booking (+ cash deposit, if any) atomically with an
    ///    in-transaction availability re-check
    /// 4. A deposit (always the full total) confirms the booking
    ///    immediately
    #[instrument(skip(self, request), fields(room_id = %request.room_id, guest_id = %request.guest_id))]
    pub async fn create_booking(&self, request: CreateBooking) -> EngineResult<BookingCreated> {
        let quote = self
            .quote(
                &request.room_id,
                request.check_in,
                request.check_out,
                request.adults,
                request.children,
                &request.discounts,
            )
            .await?;

        let now = Utc::now();
        let booking = Booking {
            id: generate_id(),
            guest_id: request.guest_id.clone(),
            room_id: request.room_id.clone(),
            check_in: request.check_in,
            check_out: request.check_out,
            adults: request.adults,
            children: request.children,
            status: BookingStatus::Pending,
            total_paisa: quote.total_paisa,
            coupon_code: request.discounts.coupon.as_ref().map(|c| c.code.clone()),
            promotion_id: request.discounts.promotion.as_ref().map(|p| p.id.clone()),
            package_id: request.discounts.package.as_ref().map(|p| p.id.clone()),
            channel: None,
            external_ref: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        let deposit = request.cash_deposit.map(|amount| Payment {
            id: generate_id(),
            booking_id: booking.id.clone(),
            method: PaymentMethod::Cash,
            amount_paisa: amount.paisa(),
            status: PaymentStatus::Completed,
            gateway_ref: None,
            gateway_payload: None,
            refund_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        });

        if let Some(d) = &deposit {
            if d.amount_paisa != booking.total_paisa {
                return Err(EngineError::OutstandingMismatch {
                    booking_id: booking.id.clone(),
                    requested: d.amount_paisa,
                    outstanding: booking.total_paisa,
                });
            }
        }

        let _guard = self.locks.acquire(&Self::room_lock_key(&request.room_id)).await;

        let bookings = self.db.bookings();
        match bookings
            .insert_pending_atomic(&booking, deposit.as_ref())
            .await?
        {
            InsertOutcome::Inserted => {}
            InsertOutcome::Conflict(existing) => {
                return Err(EngineError::RoomUnavailable {
                    room_id: request.room_id,
                    conflicting_id: existing.id,
                    check_in: existing.check_in,
                    check_out: existing.check_out,
                })
            }
        }

        info!(booking_id = %booking.id, total = quote.total_paisa, "Booking created");

        // A deposit means the guest already paid in full; confirm now
        if deposit.is_some() && bookings.confirm(&booking.id).await? > 0 {
            info!(booking_id = %booking.id, "Booking confirmed on deposit");
        }

        let booking = self.reload(&booking.id).await?;
        Ok(BookingCreated { booking, quote })
    }

    // =========================================================================
    // Confirm
    // =========================================================================

    /// Confirms a pending booking.
    ///
    /// Idempotent: confirming an already-Confirmed booking succeeds.
    /// Availability is re-checked under the room lock, since pending
    /// bookings do not block and the room may have been taken.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn confirm_booking(&self, booking_id: &str) -> EngineResult<Booking> {
        let bookings = self.db.bookings();
        let booking = self.reload(booking_id).await?;

        match booking.status {
            BookingStatus::Confirmed => return Ok(booking),
            BookingStatus::Pending => {}
            other => {
                return Err(EngineError::InvalidState {
                    entity: "Booking",
                    id: booking_id.to_string(),
                    actual: format!("{other:?}"),
                    operation: "confirm",
                })
            }
        }

        let _guard = self.locks.acquire(&Self::room_lock_key(&booking.room_id)).await;

        if let Some(blocking) = bookings
            .find_conflict(
                &booking.room_id,
                booking.check_in,
                booking.check_out,
                Some(booking_id),
            )
            .await?
        {
            return Err(EngineError::RoomUnavailable {
                room_id: booking.room_id,
                conflicting_id: blocking.id,
                check_in: blocking.check_in,
                check_out: blocking.check_out,
            });
        }

        if bookings.confirm(booking_id).await? == 0 {
            // Lost a race; accept if someone else confirmed it
            let current = self.reload(booking_id).await?;
            if current.status != BookingStatus::Confirmed {
                return Err(EngineError::InvalidState {
                    entity: "Booking",
                    id: booking_id.to_string(),
                    actual: format!("{:?}", current.status),
                    operation: "confirm",
                });
            }
            return Ok(current);
        }

        info!(booking_id = %booking_id, "Booking confirmed");
        self.reload(booking_id).await
    }

    // =========================================================================
    // Check-in / Check-out
    // =========================================================================

    /// Checks a guest in.
    ///
    /// The room must be VacantClean; the room event runs first so a
    /// dirty or out-of-order room blocks the check-in before anything
    /// changes.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn check_in(&self, booking_id: &str) -> EngineResult<Booking> {
        let booking = self.reload(booking_id).await?;

        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidState {
                entity: "Booking",
                id: booking_id.to_string(),
                actual: format!("{:?}", booking.status),
                operation: "check in",
            });
        }

        let _guard = self.locks.acquire(&Self::room_lock_key(&booking.room_id)).await;

        self.rooms.apply(&booking.room_id, RoomEvent::CheckIn).await?;

        if let Err(e) = self.db.bookings().set_checked_in(booking_id).await {
            // Roll the room back so it is not stuck occupied with no
            // checked-in booking
            warn!(booking_id = %booking_id, error = %e, "Check-in failed after room transition, reverting");
            if let Err(revert) = self.rooms.apply(&booking.room_id, RoomEvent::CheckOut).await {
                warn!(booking_id = %booking_id, error = %revert, "Room revert failed");
            }
            return Err(e.into());
        }

        info!(booking_id = %booking_id, room_id = %booking.room_id, "Guest checked in");
        self.reload(booking_id).await
    }

    /// Checks a guest out.
    ///
    /// Requires the booking to be fully paid; the room goes VacantDirty
    /// for housekeeping.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn check_out(&self, booking_id: &str) -> EngineResult<Booking> {
        let booking = self.reload(booking_id).await?;

        if booking.status != BookingStatus::CheckedIn {
            return Err(EngineError::InvalidState {
                entity: "Booking",
                id: booking_id.to_string(),
                actual: format!("{:?}", booking.status),
                operation: "check out",
            });
        }

        let outstanding = self.outstanding(&booking).await?;
        if outstanding.is_positive() {
            return Err(EngineError::InvalidState {
                entity: "Booking",
                id: booking_id.to_string(),
                actual: format!("unpaid ({} outstanding)", outstanding),
                operation: "check out",
            });
        }

        let _guard = self.locks.acquire(&Self::room_lock_key(&booking.room_id)).await;

        self.rooms.apply(&booking.room_id, RoomEvent::CheckOut).await?;

        if let Err(e) = self.db.bookings().set_checked_out(booking_id).await {
            warn!(booking_id = %booking_id, error = %e, "Check-out failed after room transition, reverting");
            if let Err(revert) = self.rooms.apply(&booking.room_id, RoomEvent::CheckIn).await {
                warn!(booking_id = %booking_id, error = %revert, "Room revert failed");
            }
            return Err(e.into());
        }

        info!(booking_id = %booking_id, room_id = %booking.room_id, "Guest checked out");
        self.reload(booking_id).await
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels a pending or confirmed booking and fails its outstanding
    /// payment intents.
    ///
    /// Completed payments are untouched; refunds are an explicit,
    /// separate decision.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn cancel_booking(&self, booking_id: &str, reason: &str) -> EngineResult<Booking> {
        self.db.bookings().cancel(booking_id, reason).await?;

        let failed = self
            .db
            .payments()
            .fail_pending_for_booking(booking_id, "booking cancelled")
            .await?;

        info!(
            booking_id = %booking_id,
            reason = %reason,
            intents_failed = failed,
            "Booking cancelled"
        );

        self.reload(booking_id).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Amount still owed on a booking (completed payments only).
    pub async fn outstanding(&self, booking: &Booking) -> EngineResult<Money> {
        let completed: i64 = self
            .db
            .payments()
            .list_for_booking(&booking.id)
            .await?
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .map(|p| p.amount_paisa)
            .sum();

        Ok(Money::from_paisa(booking.total_paisa - completed))
    }

    async fn reload(&self, booking_id: &str) -> EngineResult<Booking> {
        self.db
            .bookings()
            .get_by_id(booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Booking",
                id: booking_id.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

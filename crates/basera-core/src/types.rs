//! # Domain Types
//!
//! Core domain types used throughout Basera.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Room       │   │     Booking     │   │     Payment     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  number         │   │  room_id (FK)   │   │  booking_id (FK)│       │
//! │  │  status         │   │  status         │   │  method         │       │
//! │  │  base_price     │   │  total_paisa    │   │  amount_paisa   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   RoomStatus    │   │  BookingStatus  │   │  PaymentStatus  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  VacantClean    │   │  Pending        │   │  Pending        │       │
//! │  │  VacantDirty    │   │  Confirmed      │   │  Completed      │       │
//! │  │  OccupiedClean  │   │  CheckedIn      │   │  Failed         │       │
//! │  │  OccupiedDirty  │   │  CheckedOut     │   │  Refunded       │       │
//! │  │  OutOfOrder     │   │  Cancelled      │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (room number, OTA external reference)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Room Status
// =============================================================================

/// The operational state of a room.
///
/// Mutated only through the room status machine (`status::apply_event`);
/// no other component writes this directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Ready for a new guest.
    VacantClean,
    /// Empty but needs housekeeping before the next check-in.
    VacantDirty,
    /// Guest in residence, room serviced.
    OccupiedClean,
    /// Guest in residence, room awaiting housekeeping.
    OccupiedDirty,
    /// Taken out of service (maintenance). Overlay state: the prior
    /// occupancy/cleanliness pairing is remembered and restored on exit.
    OutOfOrder,
}

impl Default for RoomStatus {
    /// New rooms default to needing preparation.
    fn default() -> Self {
        RoomStatus::VacantDirty
    }
}

// =============================================================================
// Room Type
// =============================================================================

/// A category of rooms sharing occupancy limits (Deluxe, Suite, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RoomType {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name ("Deluxe Double").
    pub name: String,

    /// Maximum adults this room type sleeps.
    pub max_adults: i64,

    /// Maximum children on top of the adult count.
    pub max_children: i64,
}

// =============================================================================
// Room
// =============================================================================

/// A physical room in the property's inventory.
///
/// Created at inventory setup; never deleted while bookings reference it
/// (soft-disable via `is_active` instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Room {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Room number as printed on the door - business identifier.
    pub number: String,

    /// Floor the room is on.
    pub floor: i64,

    /// Room type this room belongs to.
    pub room_type_id: String,

    /// Nightly base price in paisa.
    pub base_price_paisa: i64,

    /// Current operational status.
    pub status: RoomStatus,

    /// The state to restore when `OutOfOrder` is cleared.
    /// Only set while `status == OutOfOrder`.
    pub status_before_ooo: Option<RoomStatus>,

    /// Whether the room can take new bookings (soft disable).
    pub is_active: bool,

    /// When the room was created.
    pub created_at: DateTime<Utc>,

    /// When the room was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Returns the nightly base price as a Money type.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_paisa(self.base_price_paisa)
    }
}

// =============================================================================
// Booking Status
// =============================================================================

/// The status of a booking.
///
/// Transitions are one-directional (`Pending → Confirmed → CheckedIn →
/// CheckedOut`) except cancellation, which is reachable from Pending or
/// Confirmed only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting payment/confirmation.
    Pending,
    /// Payment settled or manually confirmed. Holds the room dates.
    Confirmed,
    /// Guest is in the room.
    CheckedIn,
    /// Stay completed.
    CheckedOut,
    /// Cancelled before check-in.
    Cancelled,
}

impl BookingStatus {
    /// Statuses that hold room inventory for availability purposes.
    ///
    /// A room may have at most one booking in one of these statuses
    /// overlapping any given date range.
    pub const fn blocks_availability(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::CheckedIn)
    }
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

// =============================================================================
// Booking
// =============================================================================

/// A reservation of one room for a half-open date range `[check_in, check_out)`.
///
/// Invariants:
/// - `check_out > check_in` (validated before creation)
/// - no two bookings with availability-blocking status overlap on one room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Booking {
    pub id: String,
    pub guest_id: String,
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i64,
    pub children: i64,
    pub status: BookingStatus,
    /// Computed total for the stay, in paisa.
    pub total_paisa: i64,
    /// Coupon code applied at quote time, if any.
    pub coupon_code: Option<String>,
    /// Promotion applied at quote time, if any.
    pub promotion_id: Option<String>,
    /// Package applied at quote time, if any.
    pub package_id: Option<String>,
    /// Distribution channel this booking arrived through (None = direct).
    pub channel: Option<String>,
    /// The channel's own booking reference - idempotent upsert key for
    /// OTA imports.
    pub external_ref: Option<String>,
    /// Reason recorded when the booking was cancelled.
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Returns the computed total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paisa(self.total_paisa)
    }

    /// Number of nights in the stay.
    #[inline]
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Half-open interval overlap test against another date range.
    ///
    /// `[a_in, a_out)` overlaps `[b_in, b_out)` iff
    /// `a_in < b_out && a_out > b_in`.
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        self.check_in < check_out && self.check_out > check_in
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash, recorded at settlement.
    Cash,
    /// Card on an external terminal, awaiting capture.
    Card,
    /// Khalti hosted payment page (redirect flow).
    Khalti,
    /// eSewa ePay (signed form-post flow).
    Esewa,
}

impl PaymentMethod {
    /// True for methods settled through an external payment gateway.
    pub const fn is_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Khalti | PaymentMethod::Esewa)
    }
}

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting settlement (gateway capture, card capture).
    Pending,
    /// Funds collected and reconciled.
    Completed,
    /// Settlement failed; the record stays for audit.
    Failed,
    /// Previously completed payment returned to the guest.
    Refunded,
}

impl PaymentStatus {
    /// Statuses that count towards the amount collected on a booking.
    pub const fn counts_towards_total(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Completed)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a booking.
///
/// Append-only audit trail: refunds flip status and record a reason,
/// cancellations mark intents failed - nothing is ever hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub method: PaymentMethod,
    /// Amount in paisa. Never exceeds the booking's outstanding balance
    /// at creation time.
    pub amount_paisa: i64,
    pub status: PaymentStatus,
    /// Gateway transaction reference (pidx, transaction_uuid, auth code).
    pub gateway_ref: Option<String>,
    /// Raw gateway response payload, kept verbatim for auditability.
    pub gateway_payload: Option<String>,
    /// Reason recorded when the payment was refunded.
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the payment reached Completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_paisa(self.amount_paisa)
    }
}

// =============================================================================
// Sync Log
// =============================================================================

/// Direction of an OTA synchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Local inventory/rates pushed out to the channel.
    Push,
    /// Channel bookings pulled into the local store.
    Pull,
}

/// Final status of an OTA synchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failure,
    /// Completed with some records skipped (e.g. conflicting imports).
    Partial,
}

/// One record per sync attempt, success or not.
///
/// Append-only: created by the sync service, never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SyncLogEntry {
    pub id: String,
    /// Channel name ("booking.com", "agoda", "mock").
    pub provider: String,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    /// Human-readable outcome summary, when the attempt produced one.
    pub message: Option<String>,
    /// Identifier of the background job that ran the sync, if any.
    pub job_id: Option<String>,
    /// Wall-clock duration of the attempt in milliseconds.
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discounts
// =============================================================================

/// Which discount source won the percentage slot of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Coupon,
    Promotion,
    Package,
}

/// A coupon code carrying a percentage discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub percent_bps: u32,
}

/// A property-wide promotion carrying a percentage discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub percent_bps: u32,
}

/// A package deal: optional percentage discount plus a fixed add-on fee
/// (e.g. breakfast) that is an independent additive line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDeal {
    pub id: String,
    pub percent_bps: u32,
    pub fixed_fee_paisa: i64,
}

/// The discount inputs resolved for a quote request.
///
/// At most ONE percentage discount applies, priority coupon > promotion >
/// package. A package's fixed fee is additive regardless of which
/// percentage source wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscountSet {
    pub coupon: Option<Coupon>,
    pub promotion: Option<Promotion>,
    pub package: Option<PackageDeal>,
}

// =============================================================================
// Price Quote
// =============================================================================

/// Computed price for a prospective stay, before a booking is committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    /// nights × nightly base price.
    pub base_paisa: i64,
    /// The single percentage discount applied, as an amount.
    pub discount_paisa: i64,
    /// Additive package fee lines.
    pub fee_paisa: i64,
    /// base - discount + fees.
    pub total_paisa: i64,
    /// Which source won the percentage slot, if any.
    pub discount_source: Option<DiscountKind>,
}

impl PriceQuote {
    /// Returns the quote total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paisa(self.total_paisa)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

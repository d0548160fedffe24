//! # Error Types
//!
//! Domain-specific error types for basera-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  basera-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations (quote, status)       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  basera-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  basera-engine errors (separate crate)                                 │
//! │  └── EngineError      - Orchestration, gateway and provider failures   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (room id, dates, amounts)
//! 3. Errors are enum variants, never String
//! 4. Illegal state transitions are hard failures, never coerced

use chrono::NaiveDate;
use thiserror::Error;

use crate::status::InvalidTransitionError;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Check-out date is not strictly after check-in date.
    #[error("Invalid date range: check-out {check_out} must be after check-in {check_in}")]
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    /// Requested stay exceeds the maximum bookable length.
    #[error("Stay of {nights} nights exceeds the maximum of {max}")]
    StayTooLong { nights: i64, max: i64 },

    /// Requested occupancy exceeds the room type's maximums.
    ///
    /// ## When This Occurs
    /// - 4 adults requested for a room type capped at 2
    /// - Children beyond the room type's child capacity
    #[error(
        "Occupancy {adults} adults / {children} children exceeds room type limit of \
         {max_adults} adults / {max_children} children"
    )]
    OccupancyExceeded {
        adults: i64,
        children: i64,
        max_adults: i64,
        max_children: i64,
    },

    /// Room is soft-disabled and cannot take new bookings.
    #[error("Room {room_id} is disabled and cannot be booked")]
    RoomInactive { room_id: String },

    /// Room status machine rejected an event (wraps InvalidTransitionError).
    ///
    /// Surfaced as a hard failure: an illegal transition is a programming
    /// or race-condition signal, never something to silently coerce.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::OccupancyExceeded {
            adults: 4,
            children: 1,
            max_adults: 2,
            max_children: 2,
        };
        assert!(err.to_string().contains("4 adults"));
        assert!(err.to_string().contains("2 adults"));
    }

    #[test]
    fn test_date_range_error_message() {
        let err = CoreError::InvalidDateRange {
            check_in: NaiveDate::from_ymd_opt(2025, 10, 25).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 10, 22).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid date range: check-out 2025-10-22 must be after check-in 2025-10-25"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "adults".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}

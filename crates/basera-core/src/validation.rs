//! # Validation Module
//!
//! Input validation utilities for Basera.
//!
//! Validation errors are returned synchronously to the caller and are
//! never retried automatically - they mean the request itself is wrong.

use chrono::NaiveDate;

use crate::error::{CoreError, ValidationError};
use crate::types::RoomType;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Date Validators
// =============================================================================

/// Validates a stay's date range.
///
/// ## Rules
/// - check-out must be STRICTLY after check-in (half-open interval,
///   so a zero-night stay is invalid)
pub fn validate_date_range(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), CoreError> {
    if check_out <= check_in {
        return Err(CoreError::InvalidDateRange {
            check_in,
            check_out,
        });
    }
    Ok(())
}

// =============================================================================
// Occupancy Validators
// =============================================================================

/// Validates a party against a room type's occupancy maximums.
///
/// ## Rules
/// - at least one adult (children cannot stay alone)
/// - adults and children within the room type's respective maximums
pub fn validate_occupancy(
    adults: i64,
    children: i64,
    room_type: &RoomType,
) -> Result<(), CoreError> {
    if adults <= 0 {
        return Err(CoreError::Validation(ValidationError::MustBePositive {
            field: "adults".to_string(),
        }));
    }
    if children < 0 {
        return Err(CoreError::Validation(ValidationError::OutOfRange {
            field: "children".to_string(),
            min: 0,
            max: room_type.max_children,
        }));
    }

    if adults > room_type.max_adults || children > room_type.max_children {
        return Err(CoreError::OccupancyExceeded {
            adults,
            children,
            max_adults: room_type.max_adults,
            max_children: room_type.max_children,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a nightly price in paisa.
///
/// ## Rules
/// - Must be non-negative (>= 0); zero is allowed (complimentary rooms)
pub fn validate_price_paisa(paisa: i64) -> ValidationResult<()> {
    if paisa < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a payment amount in paisa.
///
/// ## Rules
/// - Must be positive (> 0); zero or negative payments are meaningless
pub fn validate_payment_amount(paisa: i64) -> ValidationResult<()> {
    if paisa <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    Ok(())
}

/// Validates a discount rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "discount_bps".to_string(),
            min: 0,
            max: 10000,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

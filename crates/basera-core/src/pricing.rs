//! # Pricing Resolver
//!
//! Computes the price of a prospective stay: nightly rate × nights,
//! minus at most one percentage discount, plus additive package fees.
//!
//! ## Discount Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Discount Resolution                                 │
//! │                                                                         │
//! │  Percentage slot (exactly one winner, never stacked):                  │
//! │      coupon  >  promotion  >  package                                  │
//! │                                                                         │
//! │  Fee lines (independent, additive):                                    │
//! │      package fixed fee is ALWAYS added when a package is present,      │
//! │      even when a coupon won the percentage slot                        │
//! │                                                                         │
//! │  total = nights × base  −  percentage(winner)  +  package fee          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Availability (the overlap check against existing bookings) lives in the
//! database layer, where it can run inside the same serialization scope as
//! the booking insert. This module is pure math and validation.

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DiscountKind, DiscountSet, PriceQuote, Room, RoomType};
use crate::validation::{
    validate_date_range, validate_discount_bps, validate_occupancy, validate_price_paisa,
};
use crate::MAX_STAY_NIGHTS;

/// Computes a price quote for a prospective stay.
///
/// Validates dates and occupancy, then prices the stay. Does NOT check
/// availability - the caller must run the overlap check inside its
/// booking transaction.
///
/// ## Errors
/// * `InvalidDateRange` - check-out not strictly after check-in
/// * `StayTooLong` - stay exceeds [`MAX_STAY_NIGHTS`]
/// * `OccupancyExceeded` - party larger than the room type allows
/// * `RoomInactive` - room is soft-disabled
/// * `Validation` - negative base price, or a discount rate above 100%
///
/// ## Example
/// ```rust,ignore
/// let quote = compute_quote(&room, &room_type, check_in, check_out, 2, 0, &DiscountSet::default())?;
/// assert_eq!(quote.total_paisa, quote.base_paisa);
/// ```
pub fn compute_quote(
    room: &Room,
    room_type: &RoomType,
    check_in: NaiveDate,
    check_out: NaiveDate,
    adults: i64,
    children: i64,
    discounts: &DiscountSet,
) -> CoreResult<PriceQuote> {
    if !room.is_active {
        return Err(CoreError::RoomInactive {
            room_id: room.id.clone(),
        });
    }

    validate_price_paisa(room.base_price_paisa)?;
    validate_date_range(check_in, check_out)?;
    validate_occupancy(adults, children, room_type)?;

    // A corrupt discount rate would silently produce a negative total,
    // so every attached source is range-checked before resolution.
    if let Some(coupon) = &discounts.coupon {
        validate_discount_bps(coupon.percent_bps)?;
    }
    if let Some(promotion) = &discounts.promotion {
        validate_discount_bps(promotion.percent_bps)?;
    }
    if let Some(package) = &discounts.package {
        validate_discount_bps(package.percent_bps)?;
    }

    let nights = (check_out - check_in).num_days();
    if nights > MAX_STAY_NIGHTS {
        return Err(CoreError::StayTooLong {
            nights,
            max: MAX_STAY_NIGHTS,
        });
    }

    let base = room.base_price().multiply_nights(nights);

    // Exactly one percentage source wins; zero-percent sources still win
    // their slot so a zero-rate coupon can't be "topped up" by a promotion.
    let (discount_source, percent_bps) = if let Some(coupon) = &discounts.coupon {
        (Some(DiscountKind::Coupon), coupon.percent_bps)
    } else if let Some(promotion) = &discounts.promotion {
        (Some(DiscountKind::Promotion), promotion.percent_bps)
    } else if let Some(package) = &discounts.package {
        (Some(DiscountKind::Package), package.percent_bps)
    } else {
        (None, 0)
    };

    let discount = base.percentage(percent_bps);

    // The package's fixed fee is an additive line regardless of which
    // source won the percentage slot.
    let fee = discounts
        .package
        .as_ref()
        .map(|p| Money::from_paisa(p.fixed_fee_paisa))
        .unwrap_or_else(Money::zero);

    let total = base - discount + fee;

    Ok(PriceQuote {
        room_id: room.id.clone(),
        check_in,
        check_out,
        nights,
        base_paisa: base.paisa(),
        discount_paisa: discount.paisa(),
        fee_paisa: fee.paisa(),
        total_paisa: total.paisa(),
        discount_source,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coupon, PackageDeal, Promotion, RoomStatus};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn deluxe() -> RoomType {
        RoomType {
            id: "rt-deluxe".into(),
            name: "Deluxe Double".into(),
            max_adults: 2,
            max_children: 2,
        }
    }

    fn room_101() -> Room {
        Room {
            id: "room-101".into(),
            number: "101".into(),
            floor: 1,
            room_type_id: "rt-deluxe".into(),
            base_price_paisa: Money::from_rupees(5000).paisa(),
            status: RoomStatus::VacantClean,
            status_before_ooo: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_three_night_stay_base_price() {
        // Room at Rs 5000/night, 2025-10-22 → 2025-10-25 = 3 nights = Rs 15000
        let quote = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            2,
            0,
            &DiscountSet::default(),
        )
        .unwrap();

        assert_eq!(quote.nights, 3);
        assert_eq!(quote.total(), Money::from_rupees(15_000));
        assert_eq!(quote.discount_paisa, 0);
        assert!(quote.discount_source.is_none());
    }

    #[test]
    fn test_invalid_date_range_rejected() {
        let err = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 10, 25),
            date(2025, 10, 25),
            2,
            0,
            &DiscountSet::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_occupancy_limit_enforced() {
        let err = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            3,
            0,
            &DiscountSet::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::OccupancyExceeded { .. }));
    }

    #[test]
    fn test_inactive_room_rejected() {
        let mut room = room_101();
        room.is_active = false;
        let err = compute_quote(
            &room,
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            2,
            0,
            &DiscountSet::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::RoomInactive { .. }));
    }

    #[test]
    fn test_coupon_beats_promotion() {
        let discounts = DiscountSet {
            coupon: Some(Coupon {
                code: "DASHAIN10".into(),
                percent_bps: 1000,
            }),
            promotion: Some(Promotion {
                id: "promo-20".into(),
                percent_bps: 2000,
            }),
            package: None,
        };

        let quote = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            2,
            0,
            &discounts,
        )
        .unwrap();

        // 10% coupon wins even though the promotion is larger
        assert_eq!(quote.discount_source, Some(DiscountKind::Coupon));
        assert_eq!(quote.discount_paisa, Money::from_rupees(1500).paisa());
        assert_eq!(quote.total(), Money::from_rupees(13_500));
    }

    #[test]
    fn test_package_fee_combines_with_coupon_percentage() {
        let discounts = DiscountSet {
            coupon: Some(Coupon {
                code: "DASHAIN10".into(),
                percent_bps: 1000,
            }),
            promotion: None,
            package: Some(PackageDeal {
                id: "pkg-breakfast".into(),
                percent_bps: 500,
                fixed_fee_paisa: Money::from_rupees(900).paisa(),
            }),
        };

        let quote = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            2,
            0,
            &discounts,
        )
        .unwrap();

        // Coupon takes the percentage slot (the package's 5% does NOT
        // stack), but the package's fixed fee still applies.
        assert_eq!(quote.discount_source, Some(DiscountKind::Coupon));
        assert_eq!(quote.discount_paisa, Money::from_rupees(1500).paisa());
        assert_eq!(quote.fee_paisa, Money::from_rupees(900).paisa());
        assert_eq!(quote.total(), Money::from_rupees(14_400));
    }

    #[test]
    fn test_package_alone_takes_percentage_slot() {
        let discounts = DiscountSet {
            coupon: None,
            promotion: None,
            package: Some(PackageDeal {
                id: "pkg-breakfast".into(),
                percent_bps: 500,
                fixed_fee_paisa: Money::from_rupees(900).paisa(),
            }),
        };

        let quote = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            2,
            0,
            &discounts,
        )
        .unwrap();

        assert_eq!(quote.discount_source, Some(DiscountKind::Package));
        assert_eq!(quote.discount_paisa, Money::from_rupees(750).paisa());
        assert_eq!(quote.total(), Money::from_rupees(15_150));
    }

    #[test]
    fn test_negative_base_price_rejected() {
        let mut room = room_101();
        room.base_price_paisa = -1;
        let err = compute_quote(
            &room,
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            2,
            0,
            &DiscountSet::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_discount_above_full_price_rejected() {
        let discounts = DiscountSet {
            coupon: Some(Coupon {
                code: "BROKEN".into(),
                percent_bps: 10_001,
            }),
            promotion: None,
            package: None,
        };

        let err = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 10, 22),
            date(2025, 10, 25),
            2,
            0,
            &discounts,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_stay_too_long_rejected() {
        let err = compute_quote(
            &room_101(),
            &deluxe(),
            date(2025, 1, 1),
            date(2026, 1, 1),
            2,
            0,
            &DiscountSet::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::StayTooLong { .. }));
    }
}

//! # Room Status Machine
//!
//! Owns each room's operational state and legal transitions.
//!
//! ## The State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Room Status Transitions                             │
//! │                                                                         │
//! │                 CheckIn                                                 │
//! │   VacantClean ──────────────► OccupiedClean                            │
//! │       ▲  │                        │  ▲                                  │
//! │       │  │ MarkDirty    MarkDirty │  │ CleaningFinished                │
//! │       │  ▼                        ▼  │                                  │
//! │   VacantDirty ◄────────────── OccupiedDirty                            │
//! │       ▲        CheckOut           │                                     │
//! │       │                           │                                     │
//! │       └───────────────────────────┘                                     │
//! │              CheckOut (either occupied state → VacantDirty)            │
//! │                                                                         │
//! │   OutOfOrder is an OVERLAY: SetOutOfOrder is legal from any state      │
//! │   and remembers the prior pairing; ClearOutOfOrder restores it.        │
//! │                                                                         │
//! │   Everything not drawn above is REJECTED, never coerced.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module is pure: it computes the next state and leaves persistence
//! and notification to the engine layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RoomStatus;

// =============================================================================
// Events
// =============================================================================

/// An event applied to a room's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomEvent {
    /// Guest arrives. Legal only on a clean, vacant room.
    CheckIn,
    /// Guest leaves. The room always needs housekeeping afterwards.
    CheckOut,
    /// Housekeeping finished. Clears the dirty bit, preserves occupancy.
    CleaningFinished,
    /// Room flagged for housekeeping (spill, inspection failure).
    MarkDirty,
    /// Take the room out of service for maintenance.
    SetOutOfOrder,
    /// Return the room to service, restoring its prior state.
    ClearOutOfOrder,
}

// =============================================================================
// Transition Result
// =============================================================================

/// The outcome of a legal transition: the new status plus the remembered
/// prior state while out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: RoomStatus,
    /// Set while `status == OutOfOrder`, cleared otherwise.
    pub status_before_ooo: Option<RoomStatus>,
}

impl Transition {
    fn to(status: RoomStatus) -> Self {
        Transition {
            status,
            status_before_ooo: None,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// An event was not legal for the room's current state.
///
/// This is a hard failure for the caller to handle - e.g. attempting
/// `CheckIn` on an `OutOfOrder` room fails, it is never silently coerced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Illegal room transition: {event:?} not allowed from {from:?}")]
pub struct InvalidTransitionError {
    pub from: RoomStatus,
    pub event: RoomEvent,
}

// =============================================================================
// The Machine
// =============================================================================

/// Applies an event to a room's current status.
///
/// ## Arguments
/// * `current` - the room's current status
/// * `before_ooo` - the remembered state if the room is currently
///   `OutOfOrder` (ignored otherwise)
/// * `event` - the event to apply
///
/// ## Returns
/// * `Ok(Transition)` - the new status pairing to persist
/// * `Err(InvalidTransitionError)` - the event is not legal from `current`
///
/// ## Example
/// ```rust
/// use basera_core::status::{apply_event, RoomEvent};
/// use basera_core::types::RoomStatus;
///
/// let t = apply_event(RoomStatus::VacantClean, None, RoomEvent::CheckIn).unwrap();
/// assert_eq!(t.status, RoomStatus::OccupiedClean);
///
/// // Checking into a dirty room is rejected
/// assert!(apply_event(RoomStatus::VacantDirty, None, RoomEvent::CheckIn).is_err());
/// ```
pub fn apply_event(
    current: RoomStatus,
    before_ooo: Option<RoomStatus>,
    event: RoomEvent,
) -> Result<Transition, InvalidTransitionError> {
    use RoomEvent::*;
    use RoomStatus::*;

    let reject = || {
        Err(InvalidTransitionError {
            from: current,
            event,
        })
    };

    match (current, event) {
        // Guest arrival requires a prepared room
        (VacantClean, CheckIn) => Ok(Transition::to(OccupiedClean)),

        // Departure always leaves the room needing housekeeping
        (OccupiedClean, CheckOut) | (OccupiedDirty, CheckOut) => Ok(Transition::to(VacantDirty)),

        // Cleaning never changes occupancy
        (VacantDirty, CleaningFinished) => Ok(Transition::to(VacantClean)),
        (OccupiedDirty, CleaningFinished) => Ok(Transition::to(OccupiedClean)),

        // Dirtying never changes occupancy either
        (VacantClean, MarkDirty) => Ok(Transition::to(VacantDirty)),
        (OccupiedClean, MarkDirty) => Ok(Transition::to(OccupiedDirty)),

        // Out-of-order overlay: enter from any in-service state,
        // remembering where we came from
        (OutOfOrder, SetOutOfOrder) => reject(),
        (from, SetOutOfOrder) => Ok(Transition {
            status: OutOfOrder,
            status_before_ooo: Some(from),
        }),

        // Exit restores the remembered pairing. A missing prior state
        // falls back to VacantDirty: the room needs inspection anyway.
        (OutOfOrder, ClearOutOfOrder) => {
            Ok(Transition::to(before_ooo.unwrap_or(VacantDirty)))
        }

        _ => reject(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use RoomEvent::*;
    use RoomStatus::*;

    const ALL_STATES: [RoomStatus; 5] = [
        VacantClean,
        VacantDirty,
        OccupiedClean,
        OccupiedDirty,
        OutOfOrder,
    ];

    const ALL_EVENTS: [RoomEvent; 6] = [
        CheckIn,
        CheckOut,
        CleaningFinished,
        MarkDirty,
        SetOutOfOrder,
        ClearOutOfOrder,
    ];

    #[test]
    fn test_check_in_only_from_vacant_clean() {
        assert_eq!(
            apply_event(VacantClean, None, CheckIn).unwrap().status,
            OccupiedClean
        );

        for state in [VacantDirty, OccupiedClean, OccupiedDirty, OutOfOrder] {
            let err = apply_event(state, None, CheckIn).unwrap_err();
            assert_eq!(err.from, state);
            assert_eq!(err.event, CheckIn);
        }
    }

    #[test]
    fn test_check_out_leaves_room_dirty() {
        assert_eq!(
            apply_event(OccupiedClean, None, CheckOut).unwrap().status,
            VacantDirty
        );
        assert_eq!(
            apply_event(OccupiedDirty, None, CheckOut).unwrap().status,
            VacantDirty
        );

        assert!(apply_event(VacantClean, None, CheckOut).is_err());
        assert!(apply_event(VacantDirty, None, CheckOut).is_err());
    }

    #[test]
    fn test_cleaning_preserves_occupancy() {
        assert_eq!(
            apply_event(VacantDirty, None, CleaningFinished).unwrap().status,
            VacantClean
        );
        assert_eq!(
            apply_event(OccupiedDirty, None, CleaningFinished).unwrap().status,
            OccupiedClean
        );

        // Cleaning an already-clean room is rejected
        assert!(apply_event(VacantClean, None, CleaningFinished).is_err());
        assert!(apply_event(OccupiedClean, None, CleaningFinished).is_err());
    }

    #[test]
    fn test_mark_dirty_preserves_occupancy() {
        assert_eq!(
            apply_event(VacantClean, None, MarkDirty).unwrap().status,
            VacantDirty
        );
        assert_eq!(
            apply_event(OccupiedClean, None, MarkDirty).unwrap().status,
            OccupiedDirty
        );
        assert!(apply_event(VacantDirty, None, MarkDirty).is_err());
    }

    #[test]
    fn test_out_of_order_overlay_round_trip() {
        for prior in [VacantClean, VacantDirty, OccupiedClean, OccupiedDirty] {
            let t = apply_event(prior, None, SetOutOfOrder).unwrap();
            assert_eq!(t.status, OutOfOrder);
            assert_eq!(t.status_before_ooo, Some(prior));

            let back = apply_event(t.status, t.status_before_ooo, ClearOutOfOrder).unwrap();
            assert_eq!(back.status, prior);
            assert_eq!(back.status_before_ooo, None);
        }
    }

    #[test]
    fn test_out_of_order_without_prior_falls_back_dirty() {
        let t = apply_event(OutOfOrder, None, ClearOutOfOrder).unwrap();
        assert_eq!(t.status, VacantDirty);
    }

    #[test]
    fn test_double_out_of_order_rejected() {
        assert!(apply_event(OutOfOrder, Some(VacantClean), SetOutOfOrder).is_err());
    }

    /// Totality: every (state, event) pair either transitions to a state
    /// inside the five-state enum or returns a typed rejection. Nothing
    /// panics, nothing escapes the enum.
    #[test]
    fn test_machine_is_total() {
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                match apply_event(state, Some(VacantClean), event) {
                    Ok(t) => assert!(ALL_STATES.contains(&t.status)),
                    Err(e) => {
                        assert_eq!(e.from, state);
                        assert_eq!(e.event, event);
                    }
                }
            }
        }
    }
}

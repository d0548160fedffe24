//! # Room Status Service
//!
//! Applies housekeeping and occupancy events to rooms: reads the current
//! row, runs the pure status machine, persists the result with the
//! optimistic status guard, then broadcasts the change.
//!
//! The status machine itself lives in `basera_core::status` and knows
//! nothing about the database. This service is the only writer of the
//! `rooms.status` column.

use std::sync::Arc;
use tracing::{info, warn};

use basera_core::status::{apply_event, RoomEvent};
use basera_core::types::{Room, RoomStatus};
use basera_db::Database;

use crate::error::{EngineError, EngineResult};
use crate::notify::{StatusChange, StatusNotifier};

/// Service for applying room status events.
#[derive(Debug, Clone)]
pub struct RoomStatusService {
    db: Database,
    notifier: Arc<StatusNotifier>,
}

impl RoomStatusService {
    /// Creates a new room status service.
    pub fn new(db: Database, notifier: Arc<StatusNotifier>) -> Self {
        RoomStatusService { db, notifier }
    }

    /// Applies a status event to a room and returns the updated room.
    ///
    /// ## Flow
    /// 1. Load the room (must exist and be active for guest-facing events)
    /// 2. Run the pure transition function
    /// 3. Persist with the status guard (losing a race yields StaleState)
    /// 4. Broadcast the change to listeners
    pub async fn apply(&self, room_id: &str, event: RoomEvent) -> EngineResult<Room> {
        let rooms = self.db.rooms();

        let room = rooms
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Room",
                id: room_id.to_string(),
            })?;

        if !room.is_active && matches!(event, RoomEvent::CheckIn) {
            return Err(EngineError::Core(
                basera_core::CoreError::RoomInactive {
                    room_id: room_id.to_string(),
                },
            ));
        }

        let transition = apply_event(room.status, room.status_before_ooo, event)
            .map_err(basera_core::CoreError::from)?;

        rooms
            .apply_transition(room_id, room.status, &transition)
            .await?;

        info!(
            room_id = %room_id,
            event = ?event,
            from = ?room.status,
            to = ?transition.status,
            "Room status changed"
        );

        self.notifier.publish(StatusChange {
            room_id: room_id.to_string(),
            from: room.status,
            to: transition.status,
        });

        rooms
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Room",
                id: room_id.to_string(),
            })
    }

    /// Current status of a room.
    pub async fn current(&self, room_id: &str) -> EngineResult<RoomStatus> {
        let room = self
            .db
            .rooms()
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Room",
                id: room_id.to_string(),
            })?;

        Ok(room.status)
    }

    /// Marks every occupied-dirty room for the morning housekeeping run.
    ///
    /// Skips rooms whose status moved between the read and the write
    /// rather than failing the whole sweep.
    pub async fn nightly_mark_dirty(&self) -> EngineResult<usize> {
        let rooms = self.db.rooms();
        let mut marked = 0;

        for room in rooms.list_active().await? {
            if room.status != RoomStatus::OccupiedClean {
                continue;
            }

            match self.apply(&room.id, RoomEvent::MarkDirty).await {
                Ok(_) => marked += 1,
                Err(e) if e.is_retryable() => {
                    warn!(room_id = %room.id, error = %e, "Skipping room in nightly sweep");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(marked)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

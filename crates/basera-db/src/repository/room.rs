//! # Room Repository
//!
//! Database operations for rooms and room types.
//!
//! Room status rows are only ever updated through [`apply_transition`],
//! which takes the status the caller believes the room is in and refuses
//! to write if the row has moved on - racing transitions lose cleanly
//! instead of clobbering each other.
//!
//! [`apply_transition`]: RoomRepository::apply_transition

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use basera_core::status::Transition;
use basera_core::types::{Room, RoomStatus, RoomType};

/// Repository for room database operations.
#[derive(Debug, Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    /// Creates a new RoomRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RoomRepository { pool }
    }

    // =========================================================================
    // Room Types
    // =========================================================================

    /// Inserts a room type.
    pub async fn insert_room_type(&self, room_type: &RoomType) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO room_types (id, name, max_adults, max_children)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&room_type.id)
        .bind(&room_type.name)
        .bind(room_type.max_adults)
        .bind(room_type.max_children)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a room type by ID.
    pub async fn get_room_type(&self, id: &str) -> DbResult<Option<RoomType>> {
        let room_type = sqlx::query_as::<_, RoomType>(
            "SELECT id, name, max_adults, max_children FROM room_types WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(room_type)
    }

    // =========================================================================
    // Rooms
    // =========================================================================

    /// Inserts a room into inventory.
    pub async fn insert(&self, room: &Room) -> DbResult<()> {
        debug!(id = %room.id, number = %room.number, "Inserting room");

        sqlx::query(
            r#"
            INSERT INTO rooms (
                id, number, floor, room_type_id, base_price_paisa,
                status, status_before_ooo, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&room.id)
        .bind(&room.number)
        .bind(room.floor)
        .bind(&room.room_type_id)
        .bind(room.base_price_paisa)
        .bind(room.status)
        .bind(room.status_before_ooo)
        .bind(room.is_active)
        .bind(room.created_at)
        .bind(room.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a room by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(room)
    }

    /// Lists active rooms, ordered by room number.
    pub async fn list_active(&self) -> DbResult<Vec<Room>> {
        let rooms =
            sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE is_active = 1 ORDER BY number")
                .fetch_all(&self.pool)
                .await?;

        Ok(rooms)
    }

    /// Persists a status machine transition.
    ///
    /// Guarded by the status the caller observed: if the row changed in
    /// the meantime the update matches nothing and `StaleState` is
    /// returned, so a lost race surfaces instead of silently clobbering.
    pub async fn apply_transition(
        &self,
        room_id: &str,
        expected: RoomStatus,
        transition: &Transition,
    ) -> DbResult<()> {
        let now = Utc::now();

        debug!(
            room_id = %room_id,
            from = ?expected,
            to = ?transition.status,
            "Applying room status transition"
        );

        let result = sqlx::query(
            r#"
            UPDATE rooms SET
                status = ?3,
                status_before_ooo = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(room_id)
        .bind(expected)
        .bind(transition.status)
        .bind(transition.status_before_ooo)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Room", room_id));
        }

        Ok(())
    }

    /// Soft-disables (or re-enables) a room.
    ///
    /// Rooms referenced by bookings are never deleted.
    pub async fn set_active(&self, room_id: &str, active: bool) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query("UPDATE rooms SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(room_id)
            .bind(active)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Room", room_id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use basera_core::status::{apply_event, RoomEvent};
    use basera_core::Money;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_room_type() -> RoomType {
        RoomType {
            id: "rt-deluxe".into(),
            name: "Deluxe Double".into(),
            max_adults: 2,
            max_children: 2,
        }
    }

    fn sample_room(status: RoomStatus) -> Room {
        let now = Utc::now();
        Room {
            id: "room-101".into(),
            number: "101".into(),
            floor: 1,
            room_type_id: "rt-deluxe".into(),
            base_price_paisa: Money::from_rupees(5000).paisa(),
            status,
            status_before_ooo: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_room() {
        let db = test_db().await;
        let repo = db.rooms();

        repo.insert_room_type(&sample_room_type()).await.unwrap();
        repo.insert(&sample_room(RoomStatus::VacantClean)).await.unwrap();

        let room = repo.get_by_id("room-101").await.unwrap().unwrap();
        assert_eq!(room.number, "101");
        assert_eq!(room.status, RoomStatus::VacantClean);
        assert_eq!(room.status_before_ooo, None);
        assert!(room.is_active);
    }

    #[tokio::test]
    async fn test_apply_transition_persists_pairing() {
        let db = test_db().await;
        let repo = db.rooms();

        repo.insert_room_type(&sample_room_type()).await.unwrap();
        repo.insert(&sample_room(RoomStatus::VacantClean)).await.unwrap();

        let t = apply_event(RoomStatus::VacantClean, None, RoomEvent::SetOutOfOrder).unwrap();
        repo.apply_transition("room-101", RoomStatus::VacantClean, &t)
            .await
            .unwrap();

        let room = repo.get_by_id("room-101").await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::OutOfOrder);
        assert_eq!(room.status_before_ooo, Some(RoomStatus::VacantClean));
    }

    #[tokio::test]
    async fn test_stale_transition_rejected() {
        let db = test_db().await;
        let repo = db.rooms();

        repo.insert_room_type(&sample_room_type()).await.unwrap();
        repo.insert(&sample_room(RoomStatus::VacantDirty)).await.unwrap();

        // Caller thinks the room is VacantClean, but it isn't
        let t = apply_event(RoomStatus::VacantClean, None, RoomEvent::CheckIn).unwrap();
        let err = repo
            .apply_transition("room-101", RoomStatus::VacantClean, &t)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::StaleState { .. }));
    }

    #[tokio::test]
    async fn test_soft_disable() {
        let db = test_db().await;
        let repo = db.rooms();

        repo.insert_room_type(&sample_room_type()).await.unwrap();
        repo.insert(&sample_room(RoomStatus::VacantClean)).await.unwrap();

        repo.set_active("room-101", false).await.unwrap();
        assert!(repo.list_active().await.unwrap().is_empty());

        let room = repo.get_by_id("room-101").await.unwrap().unwrap();
        assert!(!room.is_active);
    }
}

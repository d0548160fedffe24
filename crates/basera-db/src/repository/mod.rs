//! # Repository Pattern Implementation
//!
//! Each aggregate gets its own repository struct wrapping the shared pool:
//!
//! - [`room::RoomRepository`] - inventory + guarded status persistence
//! - [`booking::BookingRepository`] - overlap checks, atomic inserts,
//!   lifecycle transitions, OTA upserts
//! - [`payment::PaymentRepository`] - append-only payment audit trail
//! - [`sync_log::SyncLogRepository`] - append-only OTA sync log
//!
//! Repositories are cheap to construct (they clone the pool handle), so
//! services ask the [`crate::Database`] for a fresh one per use.

pub mod booking;
pub mod payment;
pub mod room;
pub mod sync_log;

pub use booking::BookingRepository;
pub use payment::PaymentRepository;
pub use room::RoomRepository;
pub use sync_log::SyncLogRepository;

/// Generates a new entity ID (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

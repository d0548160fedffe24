//! # basera-engine: Coordination Engine for Basera
//!
//! Orchestrates the booking lifecycle, payment verification, the room
//! status machine, and OTA channel sync on top of `basera-core` (pure
//! rules) and `basera-db` (persistence).
//!
//! ## Module Organization
//!
//! - [`booking`] - Booking lifecycle (quote, create, confirm, check-in/out, cancel)
//! - [`payment`] - Payment orchestration, Khalti/eSewa gateways, reconciliation
//! - [`status`] - Room status service over the pure status machine
//! - [`ota`] - OTA channel push/pull sync with the sync log
//! - [`locks`] - Per-key async locks (room, payment, import key)
//! - [`notify`] - Room status change broadcast
//! - [`config`] - TOML configuration (gateways, channels, reconcile sweep)
//! - [`error`] - Engine error types
//!
//! ## Wiring
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use basera_db::{Database, DbConfig};
//! use basera_engine::{
//!     BookingService, EngineConfig, KeyedLocks, PaymentOrchestrator,
//!     RoomStatusService, StatusNotifier,
//! };
//!
//! let config = EngineConfig::load("basera.toml")?;
//! let db = Database::new(DbConfig::new("basera.db")).await?;
//! let locks = Arc::new(KeyedLocks::new());
//!
//! let rooms = RoomStatusService::new(db.clone(), Arc::new(StatusNotifier::default()));
//! let bookings = BookingService::new(db.clone(), locks.clone(), rooms.clone());
//! let payments = PaymentOrchestrator::new(db.clone(), locks.clone());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod booking;
pub mod config;
pub mod error;
pub mod locks;
pub mod notify;
pub mod ota;
pub mod payment;
pub mod status;

// =============================================================================
// Re-exports
// =============================================================================

pub use booking::{BookingCreated, BookingService, CreateBooking};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use locks::KeyedLocks;
pub use notify::{StatusChange, StatusNotifier};
pub use ota::{ImportReport, SyncReport, SyncService};
pub use payment::reconcile::{ReconcileSweep, SweepReport};
pub use payment::{PaymentCreated, PaymentOrchestrator, VerifyOutcome};
pub use status::RoomStatusService;

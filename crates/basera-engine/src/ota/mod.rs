//! # OTA Channel Sync
//!
//! Keeps online travel agency channels in step with the local calendar:
//! rates and availability go out, channel bookings come in.
//!
//! ## Sync Round
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One Sync Round                                   │
//! │                                                                         │
//! │  for each configured channel:                                          │
//! │                                                                         │
//! │    PUSH  rates + blocked date ranges for every active room             │
//! │          └── one sync_log row (success or failure, with duration)      │
//! │                                                                         │
//! │    PULL  bookings made on the channel since the last good pull         │
//! │          └── import each under its external-key lock:                  │
//! │              • new key + room free      → insert (Confirmed)           │
//! │              • known key                → update in place              │
//! │              • room taken locally       → skipped, logged              │
//! │          └── one sync_log row; Partial when any import was skipped     │
//! │                                                                         │
//! │  One channel failing never stops the others.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod mock;
pub mod provider;

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use chrono::Utc;

use basera_core::types::{Booking, BookingStatus, SyncDirection, SyncLogEntry, SyncStatus};
use basera_db::{generate_id, Database, UpsertOutcome};

use crate::error::EngineResult;
use crate::locks::KeyedLocks;
use crate::ota::provider::{ChannelBooking, Provider, PushScope, RoomListing};

// =============================================================================
// Reports
// =============================================================================

/// Outcome of importing one channel's pulled bookings.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    /// Bookings skipped because a local booking blocks their dates.
    pub conflicts: usize,
}

impl ImportReport {
    fn total_applied(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Outcome of one full sync round across all channels.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub job_id: String,
    pub entries: Vec<SyncLogEntry>,
}

// =============================================================================
// Service
// =============================================================================

/// Synchronizes the local calendar with OTA channels.
pub struct SyncService {
    db: Database,
    locks: Arc<KeyedLocks>,
    channels: Vec<(Arc<dyn Provider>, PushScope)>,
}

impl SyncService {
    /// Creates a sync service with no channels.
    pub fn new(db: Database, locks: Arc<KeyedLocks>) -> Self {
        SyncService {
            db,
            locks,
            channels: Vec::new(),
        }
    }

    /// Registers a channel.
    pub fn with_channel(mut self, provider: Arc<dyn Provider>, scope: PushScope) -> Self {
        self.channels.push((provider, scope));
        self
    }

    // =========================================================================
    // Sync Round
    // =========================================================================

    /// Runs one push+pull round across every channel.
    ///
    /// Every attempt lands in the sync log, and a failing channel does
    /// not short-circuit the rest.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> EngineResult<SyncReport> {
        let job_id = generate_id();
        let mut report = SyncReport {
            job_id: job_id.clone(),
            entries: Vec::new(),
        };

        info!(job_id = %job_id, channels = self.channels.len(), "Starting sync round");

        for (provider, scope) in &self.channels {
            let entry = self.push_channel(provider.as_ref(), *scope, &job_id).await?;
            report.entries.push(entry);

            let entry = self.pull_channel(provider.as_ref(), &job_id).await?;
            report.entries.push(entry);
        }

        Ok(report)
    }

    /// Pushes rates and availability to one channel, logging the attempt.
    async fn push_channel(
        &self,
        provider: &dyn Provider,
        scope: PushScope,
        job_id: &str,
    ) -> EngineResult<SyncLogEntry> {
        let started = Instant::now();

        let outcome = async {
            let listings = self.build_listings().await?;
            let accepted = provider
                .push(&listings, scope)
                .await
                .map_err(|e| crate::error::EngineError::ChannelFailed {
                    provider: provider.name().to_string(),
                    message: e.to_string(),
                })?;
            Ok::<usize, crate::error::EngineError>(accepted)
        }
        .await;

        let entry = match &outcome {
            Ok(accepted) => self.log_entry(
                provider.name(),
                SyncDirection::Push,
                SyncStatus::Success,
                Some(format!("pushed {accepted} listings")),
                job_id,
                started,
            ),
            Err(e) => {
                warn!(channel = %provider.name(), error = %e, "Push failed");
                self.log_entry(
                    provider.name(),
                    SyncDirection::Push,
                    SyncStatus::Failure,
                    Some(e.to_string()),
                    job_id,
                    started,
                )
            }
        };

        self.db.sync_log().append(&entry).await?;
        Ok(entry)
    }

    /// Pulls and imports one channel's bookings, logging the attempt.
    ///
    /// The `since` watermark is the last pull that reached this channel,
    /// read back from the sync log; a never-pulled channel gets
    /// everything.
    async fn pull_channel(
        &self,
        provider: &dyn Provider,
        job_id: &str,
    ) -> EngineResult<SyncLogEntry> {
        let started = Instant::now();

        let since = self
            .db
            .sync_log()
            .last_pull_watermark(provider.name())
            .await?;

        let outcome = match provider.pull(since).await {
            Ok(bookings) => self
                .import_bookings(provider.name(), &bookings)
                .await
                .map(|report| (bookings.len(), report)),
            Err(e) => Err(crate::error::EngineError::ChannelFailed {
                provider: provider.name().to_string(),
                message: e.to_string(),
            }),
        };

        let entry = match &outcome {
            Ok((pulled, import)) => {
                let status = if import.conflicts > 0 {
                    SyncStatus::Partial
                } else {
                    SyncStatus::Success
                };
                self.log_entry(
                    provider.name(),
                    SyncDirection::Pull,
                    status,
                    Some(format!(
                        "pulled {pulled}, inserted {}, updated {}, conflicts {}",
                        import.inserted, import.updated, import.conflicts
                    )),
                    job_id,
                    started,
                )
            }
            Err(e) => {
                warn!(channel = %provider.name(), error = %e, "Pull failed");
                self.log_entry(
                    provider.name(),
                    SyncDirection::Pull,
                    SyncStatus::Failure,
                    Some(e.to_string()),
                    job_id,
                    started,
                )
            }
        };

        self.db.sync_log().append(&entry).await?;
        Ok(entry)
    }

    // =========================================================================
    // Import
    // =========================================================================

    /// Imports channel bookings, idempotently keyed on (channel,
    /// external_ref).
    ///
    /// A booking whose dates clash with a local availability-blocking
    /// booking is skipped and counted - the channel side keeps it, and
    /// resolution is a front-desk decision, not data loss.
    pub async fn import_bookings(
        &self,
        channel: &str,
        bookings: &[ChannelBooking],
    ) -> EngineResult<ImportReport> {
        let mut report = ImportReport::default();
        let repo = self.db.bookings();

        for cb in bookings {
            let _guard = self
                .locks
                .acquire(&format!("import:{channel}:{}", cb.external_ref))
                .await;

            let now = Utc::now();
            let booking = Booking {
                id: generate_id(),
                // No guest directory for channel guests; the channel's
                // name string is the identity we have
                guest_id: cb.guest_name.clone(),
                room_id: cb.room_id.clone(),
                check_in: cb.check_in,
                check_out: cb.check_out,
                adults: cb.adults,
                children: cb.children,
                // Channel bookings arrive paid on the channel's side
                status: BookingStatus::Confirmed,
                total_paisa: cb.total_paisa,
                coupon_code: None,
                promotion_id: None,
                package_id: None,
                channel: Some(channel.to_string()),
                external_ref: Some(cb.external_ref.clone()),
                cancel_reason: None,
                created_at: now,
                updated_at: now,
            };

            match repo.upsert_external(&booking).await? {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Conflict(blocking) => {
                    warn!(
                        channel = %channel,
                        external_ref = %cb.external_ref,
                        conflicting_id = %blocking.id,
                        "Channel booking clashes with local booking, skipped"
                    );
                    report.conflicts += 1;
                }
            }
        }

        info!(
            channel = %channel,
            applied = report.total_applied(),
            conflicts = report.conflicts,
            "Channel import finished"
        );

        Ok(report)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Builds the current rate + availability picture for every active
    /// room.
    async fn build_listings(&self) -> EngineResult<Vec<RoomListing>> {
        let rooms = self.db.rooms().list_active().await?;
        let bookings = self.db.bookings();

        let mut listings = Vec::with_capacity(rooms.len());
        for room in rooms {
            let blocked = bookings
                .list_for_room(&room.id)
                .await?
                .into_iter()
                .filter(|b| b.status.blocks_availability())
                .map(|b| (b.check_in, b.check_out))
                .collect();

            listings.push(RoomListing {
                room_id: room.id,
                rate_paisa: room.base_price_paisa,
                blocked,
            });
        }

        Ok(listings)
    }

    fn log_entry(
        &self,
        provider: &str,
        direction: SyncDirection,
        status: SyncStatus,
        message: Option<String>,
        job_id: &str,
        started: Instant,
    ) -> SyncLogEntry {
        SyncLogEntry {
            id: generate_id(),
            provider: provider.to_string(),
            direction,
            status,
            message,
            job_id: Some(job_id.to_string()),
            duration_ms: started.elapsed().as_millis() as i64,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ota::mock::MockProvider;
    use crate::ota::provider::ProviderError;
    use basera_core::types::{Room, RoomStatus, RoomType};
    use basera_core::Money;
    use basera_db::DbConfig;
    use chrono::NaiveDate;

    async fn seeded_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        let rooms = db.rooms();
        rooms
            .insert_room_type(&RoomType {
                id: "rt-std".into(),
                name: "Standard".into(),
                max_adults: 2,
                max_children: 1,
            })
            .await
            .unwrap();
        rooms
            .insert(&Room {
                id: "room-101".into(),
                number: "101".into(),
                floor: 1,
                room_type_id: "rt-std".into(),
                base_price_paisa: Money::from_rupees(5000).paisa(),
                status: RoomStatus::VacantClean,
                status_before_ooo: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        db
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn channel_booking(external_ref: &str, check_in: NaiveDate, check_out: NaiveDate) -> ChannelBooking {
        ChannelBooking {
            external_ref: external_ref.to_string(),
            room_id: "room-101".into(),
            guest_name: "A. Sharma".into(),
            check_in,
            check_out,
            adults: 2,
            children: 0,
            total_paisa: Money::from_rupees(15_000).paisa(),
        }
    }

    fn full_scope() -> PushScope {
        PushScope {
            rates: true,
            availability: true,
        }
    }

    #[tokio::test]
    async fn test_sync_round_logs_push_and_pull() {
        let db = seeded_db().await;
        let provider = Arc::new(MockProvider::new("booking.com"));
        provider.script_pull(Ok(vec![channel_booking(
            "BDC-9001",
            date(2025, 11, 1),
            date(2025, 11, 4),
        )]));

        let service = SyncService::new(db.clone(), Arc::new(KeyedLocks::new()))
            .with_channel(provider.clone(), full_scope());

        let report = service.sync().await.unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].direction, SyncDirection::Push);
        assert_eq!(report.entries[0].status, SyncStatus::Success);
        assert_eq!(report.entries[1].direction, SyncDirection::Pull);
        assert_eq!(report.entries[1].status, SyncStatus::Success);

        // Both attempts landed in the log with the same job id
        assert_eq!(db.sync_log().count().await.unwrap(), 2);
        assert_eq!(report.entries[0].job_id, report.entries[1].job_id);

        // The pulled booking was imported
        let imported = db
            .bookings()
            .find_by_external_ref("booking.com", "BDC-9001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(imported.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_push_carries_blocked_ranges() {
        let db = seeded_db().await;

        // One confirmed local booking blocks its range
        let now = Utc::now();
        let local = Booking {
            id: "bkg-local".into(),
            guest_id: "guest-1".into(),
            room_id: "room-101".into(),
            check_in: date(2025, 10, 22),
            check_out: date(2025, 10, 25),
            adults: 2,
            children: 0,
            status: BookingStatus::Confirmed,
            total_paisa: Money::from_rupees(15_000).paisa(),
            coupon_code: None,
            promotion_id: None,
            package_id: None,
            channel: None,
            external_ref: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        db.bookings()
            .insert_pending_atomic(&local, None)
            .await
            .unwrap();

        let provider = Arc::new(MockProvider::new("agoda"));
        let service = SyncService::new(db, Arc::new(KeyedLocks::new()))
            .with_channel(provider.clone(), full_scope());

        service.sync().await.unwrap();

        let pushed = provider.last_pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].rate_paisa, Money::from_rupees(5000).paisa());
        assert_eq!(pushed[0].blocked, vec![(date(2025, 10, 22), date(2025, 10, 25))]);
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let db = seeded_db().await;
        let service = SyncService::new(db.clone(), Arc::new(KeyedLocks::new()));

        let bookings = vec![channel_booking("AGD-17", date(2025, 11, 1), date(2025, 11, 4))];

        let report = service.import_bookings("agoda", &bookings).await.unwrap();
        assert_eq!(report.inserted, 1);

        // Same pull again: updates, never duplicates
        let report = service.import_bookings("agoda", &bookings).await.unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 1);

        let all = db.bookings().list_for_room("room-101").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_import_marks_round_partial() {
        let db = seeded_db().await;

        let now = Utc::now();
        let local = Booking {
            id: "bkg-local".into(),
            guest_id: "guest-1".into(),
            room_id: "room-101".into(),
            check_in: date(2025, 11, 2),
            check_out: date(2025, 11, 5),
            adults: 2,
            children: 0,
            status: BookingStatus::Confirmed,
            total_paisa: Money::from_rupees(15_000).paisa(),
            coupon_code: None,
            promotion_id: None,
            package_id: None,
            channel: None,
            external_ref: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        db.bookings()
            .insert_pending_atomic(&local, None)
            .await
            .unwrap();

        let provider = Arc::new(MockProvider::new("booking.com"));
        provider.script_pull(Ok(vec![
            channel_booking("BDC-1", date(2025, 11, 1), date(2025, 11, 4)),
            channel_booking("BDC-2", date(2025, 11, 10), date(2025, 11, 12)),
        ]));

        let service = SyncService::new(db.clone(), Arc::new(KeyedLocks::new()))
            .with_channel(provider, full_scope());

        let report = service.sync().await.unwrap();
        let pull_entry = &report.entries[1];
        assert_eq!(pull_entry.status, SyncStatus::Partial);

        // The clean one landed, the clashing one did not
        assert!(db
            .bookings()
            .find_by_external_ref("booking.com", "BDC-2")
            .await
            .unwrap()
            .is_some());
        assert!(db
            .bookings()
            .find_by_external_ref("booking.com", "BDC-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_pull_watermark_advances_between_rounds() {
        let db = seeded_db().await;
        let provider = Arc::new(MockProvider::new("agoda"));

        let service = SyncService::new(db, Arc::new(KeyedLocks::new()))
            .with_channel(provider.clone(), full_scope());

        // First pull has no history behind it
        service.sync().await.unwrap();
        assert_eq!(provider.last_since(), Some(None));

        // Second round picks up where the first one left off
        service.sync().await.unwrap();
        let since = provider.last_since().unwrap();
        assert!(since.is_some());
    }

    #[tokio::test]
    async fn test_channel_failure_logged_not_fatal() {
        let db = seeded_db().await;

        let broken = Arc::new(MockProvider::new("booking.com"));
        broken.script_push(Err(ProviderError::Unavailable("503".into())));
        broken.script_pull(Err(ProviderError::Unavailable("503".into())));

        let healthy = Arc::new(MockProvider::new("agoda"));

        let service = SyncService::new(db.clone(), Arc::new(KeyedLocks::new()))
            .with_channel(broken, full_scope())
            .with_channel(healthy, full_scope());

        let report = service.sync().await.unwrap();
        assert_eq!(report.entries.len(), 4);
        assert_eq!(report.entries[0].status, SyncStatus::Failure);
        assert_eq!(report.entries[1].status, SyncStatus::Failure);
        assert_eq!(report.entries[2].status, SyncStatus::Success);
        assert_eq!(report.entries[3].status, SyncStatus::Success);

        assert_eq!(db.sync_log().count().await.unwrap(), 4);
    }
}

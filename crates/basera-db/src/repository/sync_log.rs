//! # Sync Log Repository
//!
//! Append-only log of OTA sync attempts. Every attempt writes exactly
//! one row, success or failure, so the log doubles as the channel-health
//! history for the dashboard.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use basera_core::types::{SyncDirection, SyncLogEntry, SyncStatus};

/// Repository for sync log database operations.
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    /// Creates a new SyncLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }

    /// Appends a sync log entry.
    pub async fn append(&self, entry: &SyncLogEntry) -> DbResult<()> {
        debug!(
            provider = %entry.provider,
            status = ?entry.status,
            "Appending sync log entry"
        );

        sqlx::query(
            r#"
            INSERT INTO sync_log (
                id, provider, direction, status, message,
                job_id, duration_ms, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.provider)
        .bind(entry.direction)
        .bind(entry.status)
        .bind(&entry.message)
        .bind(&entry.job_id)
        .bind(entry.duration_ms)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists sync log entries, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<SyncLogEntry>> {
        let entries = sqlx::query_as::<_, SyncLogEntry>(
            r#"
            SELECT * FROM sync_log
            ORDER BY created_at DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Counts all sync log entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Timestamp of the newest pull from a provider that reached the
    /// channel (Success or Partial). Used as the `since` watermark for
    /// the next pull; `None` means the channel has never been pulled.
    pub async fn last_pull_watermark(&self, provider: &str) -> DbResult<Option<DateTime<Utc>>> {
        let watermark = sqlx::query_scalar(
            r#"
            SELECT created_at FROM sync_log
            WHERE provider = ?1 AND direction = ?2 AND status IN (?3, ?4)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .bind(SyncDirection::Pull)
        .bind(SyncStatus::Success)
        .bind(SyncStatus::Partial)
        .fetch_optional(&self.pool)
        .await?;

        Ok(watermark)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

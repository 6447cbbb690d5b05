//! # Sync Repository
//!
//! Per-record sync flags, serving an external sync collaborator.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Sync State Machine (per record)                  │
//! │                                                                     │
//! │   business write ──────────────► pending                           │
//! │   collaborator ack ────────────► synced   (+ last_sync_at)         │
//! │   collaborator nack ───────────► failed   (+ last_sync_at)         │
//! │                                                                     │
//! │   pending(kind) = pending ∪ failed, oldest update first            │
//! │                                                                     │
//! │   This repository touches ONLY sync_status / last_sync_at.         │
//! │   It never reads or writes business columns, and it never stamps   │
//! │   updated_at - acknowledgements are not business mutations.        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Table names come from [`EntityKind::table`], a fixed enum, so the
//! `format!` SQL here never interpolates caller input.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tally_core::{EntityKind, SyncStatus};

/// A record due for (or tracked by) synchronization.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRecord {
    pub id: String,
    #[sqlx(rename = "sync_status")]
    pub status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Per-table counts of each sync status.
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct SyncCounts {
    pub pending: i64,
    pub synced: i64,
    pub failed: i64,
}

/// Repository for per-record sync flags across all syncable tables.
#[derive(Debug, Clone)]
pub struct SyncRepository {
    pool: SqlitePool,
}

impl SyncRepository {
    /// Creates a new SyncRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncRepository { pool }
    }

    /// Records of the given kind due for a sync attempt: `pending` and
    /// `failed` both qualify (failed records retry on the next cycle),
    /// oldest business update first.
    pub async fn pending(&self, kind: EntityKind, limit: u32) -> DbResult<Vec<SyncRecord>> {
        let records = sqlx::query_as::<_, SyncRecord>(&format!(
            "SELECT id, sync_status, last_sync_at, updated_at FROM {} \
             WHERE sync_status IN ('pending', 'failed') \
             ORDER BY updated_at ASC LIMIT ?",
            kind.table()
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(kind = ?kind, count = records.len(), "Fetched records due for sync");
        Ok(records)
    }

    /// Marks a record acknowledged by the remote store.
    pub async fn mark_synced(&self, kind: EntityKind, id: &str) -> DbResult<bool> {
        self.stamp(kind, id, SyncStatus::Synced).await
    }

    /// Marks a record as failed on the last sync attempt. It stays
    /// eligible for the next cycle.
    pub async fn mark_failed(&self, kind: EntityKind, id: &str) -> DbResult<bool> {
        self.stamp(kind, id, SyncStatus::Failed).await
    }

    async fn stamp(&self, kind: EntityKind, id: &str, status: SyncStatus) -> DbResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET sync_status = ?, last_sync_at = ? WHERE id = ?",
            kind.table()
        ))
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Status counts for one table, for diagnostics and the sync
    /// dashboard.
    pub async fn counts(&self, kind: EntityKind) -> DbResult<SyncCounts> {
        let counts = sqlx::query_as::<_, SyncCounts>(&format!(
            "SELECT \
               COALESCE(SUM(sync_status = 'pending'), 0) AS pending, \
               COALESCE(SUM(sync_status = 'synced'), 0) AS synced, \
               COALESCE(SUM(sync_status = 'failed'), 0) AS failed \
             FROM {}",
            kind.table()
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::Product;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_new_record_is_pending() {
        let db = test_db().await;
        db.products()
            .insert(&Product::new("Cola 330ml", 299))
            .await
            .unwrap();

        let due = db.sync().pending(EntityKind::Product, 100).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, SyncStatus::Pending);
        assert!(due[0].last_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_ack_and_nack_lifecycle() {
        let db = test_db().await;
        let product = Product::new("Cola 330ml", 299);
        db.products().insert(&product).await.unwrap();
        let sync = db.sync();

        // Ack: record leaves the due set
        assert!(sync.mark_synced(EntityKind::Product, &product.id).await.unwrap());
        assert!(sync.pending(EntityKind::Product, 100).await.unwrap().is_empty());

        // Nack: record rejoins the due set
        assert!(sync.mark_failed(EntityKind::Product, &product.id).await.unwrap());
        let due = sync.pending(EntityKind::Product, 100).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, SyncStatus::Failed);
        assert!(due[0].last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_business_write_restamps_pending() {
        let db = test_db().await;
        let mut product = Product::new("Cola 330ml", 299);
        db.products().insert(&product).await.unwrap();
        let sync = db.sync();

        sync.mark_synced(EntityKind::Product, &product.id).await.unwrap();

        product.name = "Cola 500ml".to_string();
        db.products().update(&product).await.unwrap();

        let due = sync.pending(EntityKind::Product, 100).await.unwrap();
        assert_eq!(due.len(), 1);

        let counts = sync.counts(EntityKind::Product).await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.synced, 0);
    }
}

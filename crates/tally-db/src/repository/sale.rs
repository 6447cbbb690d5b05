//! # Sale Repository
//!
//! Persistence and queries for sales and sale items.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │            Sale writes belong to engine transactions                │
//! │                                                                     │
//! │  tally-engine                                                       │
//! │     │  db.begin()                                                   │
//! │     ▼                                                               │
//! │  ┌──────────────────── one transaction ─────────────────────┐       │
//! │  │ count_receipts_with_prefix_tx  → next sequence number    │       │
//! │  │ insert_sale_tx                 → sales row               │       │
//! │  │ insert_item_tx ×N              → sale_items rows         │       │
//! │  │ (stock / customer updates via their repositories)        │       │
//! │  └──────────────────────── commit ──────────────────────────┘       │
//! │                                                                     │
//! │  Pool-level methods on this type are reads only; a sale is never    │
//! │  mutated outside a transaction.                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::{Sale, SaleItem, SaleStatus, SyncStatus};

const SALE_COLUMNS: &str = "id, receipt_number, customer_id, user_id, sale_date, \
     subtotal_cents, tax_cents, discount_cents, total_cents, payment_method, \
     cash_received_cents, change_cents, status, notes, is_refunded, refund_amount_cents, \
     refund_reason, refunded_at, created_at, updated_at, sync_status, last_sync_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, product_name, product_barcode, \
     unit_price_cents, unit_cost_cents, quantity, discount_cents, tax_cents, \
     line_total_cents, is_refunded, refunded_quantity, refund_reason, created_at, \
     updated_at, sync_status, last_sync_at";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetches a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Fetches a sale by its receipt number.
    pub async fn get_by_receipt(&self, receipt_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE receipt_number = ?"
        ))
        .bind(receipt_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Fetches the line items of a sale, in insertion order.
    pub async fn items_for_sale(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ? ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sales within `[from, to)`, newest first.
    pub async fn list_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE sale_date >= ? AND sale_date < ? ORDER BY sale_date DESC"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Sales with the given status, newest first.
    pub async fn list_by_status(&self, status: SaleStatus, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE status = ? ORDER BY sale_date DESC LIMIT ?"
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// A customer's purchase history, newest first.
    pub async fn list_by_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE customer_id = ? \
             ORDER BY sale_date DESC LIMIT ?"
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// The N most recent sales.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY sale_date DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Count and gross total of non-cancelled sales within `[from, to)`.
    /// Used for the register's "today" summary.
    pub async fn stats_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<SaleStats> {
        let stats = sqlx::query_as::<_, SaleStats>(
            "SELECT COUNT(*) AS sale_count, COALESCE(SUM(total_cents), 0) AS total_cents \
             FROM sales \
             WHERE sale_date >= ? AND sale_date < ? AND status != 'cancelled'",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    // =========================================================================
    // Transactional Operations
    // =========================================================================

    /// Fetches a sale inside an open transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sale)
    }

    /// Fetches a sale's items inside an open transaction.
    pub async fn items_tx(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ? ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// Counts receipts carrying the given daily prefix (`YYYYMMDD-`),
    /// inside the posting transaction. The next sequence number is this
    /// count + 1; the UNIQUE index on `receipt_number` backstops races.
    pub async fn count_receipts_with_prefix_tx(
        conn: &mut SqliteConnection,
        prefix: &str,
    ) -> DbResult<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sales WHERE receipt_number LIKE ?")
                .bind(format!("{prefix}%"))
                .fetch_one(&mut *conn)
                .await?;

        Ok(count.0)
    }

    /// Inserts a sale row inside an open transaction.
    pub async fn insert_sale_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            "INSERT INTO sales (id, receipt_number, customer_id, user_id, sale_date, \
             subtotal_cents, tax_cents, discount_cents, total_cents, payment_method, \
             cash_received_cents, change_cents, status, notes, is_refunded, \
             refund_amount_cents, refund_reason, refunded_at, created_at, updated_at, \
             sync_status, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(sale.sale_date)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.cash_received_cents)
        .bind(sale.change_cents)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(sale.is_refunded)
        .bind(sale.refund_amount_cents)
        .bind(&sale.refund_reason)
        .bind(sale.refunded_at)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.sync.status)
        .bind(sale.sync.last_sync_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a sale item row inside an open transaction.
    pub async fn insert_item_tx(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO sale_items (id, sale_id, product_id, product_name, product_barcode, \
             unit_price_cents, unit_cost_cents, quantity, discount_cents, tax_cents, \
             line_total_cents, is_refunded, refunded_quantity, refund_reason, created_at, \
             updated_at, sync_status, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(&item.product_barcode)
        .bind(item.unit_price_cents)
        .bind(item.unit_cost_cents)
        .bind(item.quantity)
        .bind(item.discount_cents)
        .bind(item.tax_cents)
        .bind(item.line_total_cents)
        .bind(item.is_refunded)
        .bind(item.refunded_quantity)
        .bind(&item.refund_reason)
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(item.sync.status)
        .bind(item.sync.last_sync_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Advances an item's refund bookkeeping inside an open transaction:
    /// absolute refunded quantity, exhaustion flag and reason.
    pub async fn update_item_refund_tx(
        conn: &mut SqliteConnection,
        item_id: &str,
        refunded_quantity: i64,
        is_refunded: bool,
        reason: Option<&str>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE sale_items \
             SET refunded_quantity = ?, is_refunded = ?, refund_reason = ?, updated_at = ?, \
                 sync_status = ? \
             WHERE id = ?",
        )
        .bind(refunded_quantity)
        .bind(is_refunded)
        .bind(reason)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Applies a refund to the sale header inside an open transaction:
    /// accumulates the refund amount and, when the sale is exhausted,
    /// stamps the terminal status.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_sale_refund_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        status: SaleStatus,
        is_refunded: bool,
        refund_delta_cents: i64,
        reason: Option<&str>,
        refunded_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE sales \
             SET status = ?, is_refunded = ?, \
                 refund_amount_cents = refund_amount_cents + ?, \
                 refund_reason = COALESCE(?, refund_reason), \
                 refunded_at = COALESCE(?, refunded_at), \
                 updated_at = ?, sync_status = ? \
             WHERE id = ?",
        )
        .bind(status)
        .bind(is_refunded)
        .bind(refund_delta_cents)
        .bind(reason)
        .bind(refunded_at)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Marks a sale cancelled inside an open transaction.
    pub async fn mark_cancelled_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        reason: Option<&str>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE sales \
             SET status = ?, notes = COALESCE(?, notes), updated_at = ?, sync_status = ? \
             WHERE id = ?",
        )
        .bind(SaleStatus::Cancelled)
        .bind(reason)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Aggregate figures over a window of sales, in cents.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct SaleStats {
    pub sale_count: i64,
    pub total_cents: i64,
}

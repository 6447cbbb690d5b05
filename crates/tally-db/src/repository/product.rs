//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD with soft delete
//! - Barcode lookup (the scan path)
//! - Low-stock / out-of-stock queries
//! - Stock arithmetic executed inside the UPDATE statement
//!
//! ## Conditional Stock Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │            Why the decrement is a conditional UPDATE                │
//! │                                                                     │
//! │  read stock → check → write           UPDATE ... WHERE stock >= ?   │
//! │  ─────────────────────────            ───────────────────────────   │
//! │  two sales read stock=1,              the row is checked and        │
//! │  both pass the check,                 written in one statement;     │
//! │  stock ends at −1 ✗                   the second sale matches no    │
//! │                                       row and fails cleanly ✓       │
//! │                                                                     │
//! │  rows_affected == 1  →  decrement happened                          │
//! │  rows_affected == 0  →  insufficient stock (or product gone)        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::{Product, SyncStatus};

const PRODUCT_COLUMNS: &str = "id, name, description, barcode, category_id, supplier_id, \
     price_cents, cost_cents, tax_rate_bps, stock, min_stock, track_stock, \
     allow_negative_stock, is_active, created_at, updated_at, sync_status, last_sync_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_barcode("5449000000996").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Inserts a new product.
    ///
    /// A duplicate barcode surfaces as `DbError::UniqueViolation`.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            "INSERT INTO products (id, name, description, barcode, category_id, supplier_id, \
             price_cents, cost_cents, tax_rate_bps, stock, min_stock, track_stock, \
             allow_negative_stock, is_active, created_at, updated_at, sync_status, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.barcode)
        .bind(&product.category_id)
        .bind(&product.supplier_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.track_stock)
        .bind(product.allow_negative_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.sync.status)
        .bind(product.sync.last_sync_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates the mutable fields of a product (stock is deliberately
    /// excluded; stock moves only through the delta operations below).
    /// Stamps `pending` and `updated_at`.
    pub async fn update(&self, product: &Product) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET name = ?, description = ?, barcode = ?, category_id = ?, \
             supplier_id = ?, price_cents = ?, cost_cents = ?, tax_rate_bps = ?, min_stock = ?, \
             track_stock = ?, allow_negative_stock = ?, is_active = ?, updated_at = ?, \
             sync_status = ? \
             WHERE id = ?",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.barcode)
        .bind(&product.category_id)
        .bind(&product.supplier_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.min_stock)
        .bind(product.track_stock)
        .bind(product.allow_negative_stock)
        .bind(product.is_active)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(&product.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Fetches a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Fetches an active product by barcode. This is the scan path.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ? AND is_active = 1"
        ))
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Searches active products by name or barcode substring, sorted by
    /// name. Empty query lists active products.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{query}%");
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND (name LIKE ? OR barcode LIKE ?) \
             ORDER BY name LIMIT ?"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Soft-deletes a product. Sale history keeps its snapshot rows; the
    /// FK on `sale_items.product_id` is why there is no hard delete.
    pub async fn soft_delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Stock Queries
    // =========================================================================

    /// Active, stock-tracked products at or below their reorder threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND track_stock = 1 AND stock <= min_stock \
             ORDER BY stock ASC, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Active, stock-tracked products with zero or negative stock.
    pub async fn list_out_of_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND track_stock = 1 AND stock <= 0 \
             ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inventory valuation over active, stock-tracked products: total at
    /// cost and total at retail, in cents. Products without a recorded
    /// cost contribute zero to the cost total.
    pub async fn inventory_valuation(&self) -> DbResult<InventoryValuation> {
        let valuation = sqlx::query_as::<_, InventoryValuation>(
            "SELECT \
               COALESCE(SUM(COALESCE(cost_cents, 0) * MAX(stock, 0)), 0) AS cost_cents, \
               COALESCE(SUM(price_cents * MAX(stock, 0)), 0) AS retail_cents \
             FROM products WHERE is_active = 1 AND track_stock = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(valuation)
    }

    // =========================================================================
    // Transactional Operations
    // =========================================================================

    /// Fetches a product inside an open transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Conditionally decrements stock inside an open transaction.
    ///
    /// Returns `true` when the decrement happened, `false` when the
    /// product was missing, inactive, or lacked cover. Untracked products
    /// and products allowing negative stock always pass the guard.
    pub async fn try_decrement_stock_tx(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products \
             SET stock = stock - ?, updated_at = ?, sync_status = ? \
             WHERE id = ? AND is_active = 1 \
               AND (track_stock = 0 OR allow_negative_stock = 1 OR stock >= ?)",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Increments stock inside an open transaction (refund restore, goods
    /// received). Unconditional: adding stock cannot violate anything.
    pub async fn restore_stock_tx(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + ?, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sets stock to an absolute level inside an open transaction (manual
    /// recount). The caller validates non-negativity.
    pub async fn set_stock_tx(
        conn: &mut SqliteConnection,
        product_id: &str,
        stock: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET stock = ?, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(stock)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Stock valuation totals, in cents.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct InventoryValuation {
    pub cost_cents: i64,
    pub retail_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let mut product = Product::new("Cola 330ml", 299);
        product.barcode = Some("5449000000996".to_string());
        product.stock = 10;
        repo.insert(&product).await.unwrap();

        let found = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Cola 330ml");
        assert_eq!(found.price_cents, 299);
        assert_eq!(found.stock, 10);

        let by_barcode = repo.get_by_barcode("5449000000996").await.unwrap();
        assert!(by_barcode.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_barcode_rejected() {
        let db = test_db().await;
        let repo = db.products();

        let mut a = Product::new("A", 100);
        a.barcode = Some("111".to_string());
        repo.insert(&a).await.unwrap();

        let mut b = Product::new("B", 200);
        b.barcode = Some("111".to_string());
        let err = repo.insert(&b).await.unwrap_err();
        assert!(err.is_unique_violation_on("barcode"));
    }

    #[tokio::test]
    async fn test_conditional_decrement_guards_stock() {
        let db = test_db().await;
        let repo = db.products();

        let mut product = Product::new("Cola 330ml", 299);
        product.stock = 3;
        repo.insert(&product).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(
            ProductRepository::try_decrement_stock_tx(&mut tx, &product.id, 3)
                .await
                .unwrap()
        );
        // Now at zero: further decrement must fail
        assert!(
            !ProductRepository::try_decrement_stock_tx(&mut tx, &product.id, 1)
                .await
                .unwrap()
        );
        tx.commit().await.unwrap();

        let found = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.stock, 0);
    }

    #[tokio::test]
    async fn test_decrement_allows_negative_when_configured() {
        let db = test_db().await;
        let repo = db.products();

        let mut product = Product::new("Backorder item", 500);
        product.stock = 0;
        product.allow_negative_stock = true;
        repo.insert(&product).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(
            ProductRepository::try_decrement_stock_tx(&mut tx, &product.id, 5)
                .await
                .unwrap()
        );
        tx.commit().await.unwrap();

        let found = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.stock, -5);
    }

    #[tokio::test]
    async fn test_low_stock_query() {
        let db = test_db().await;
        let repo = db.products();

        let mut low = Product::new("Low", 100);
        low.stock = 2;
        low.min_stock = 5;
        repo.insert(&low).await.unwrap();

        let mut fine = Product::new("Fine", 100);
        fine.stock = 50;
        fine.min_stock = 5;
        repo.insert(&fine).await.unwrap();

        let flagged = repo.list_low_stock().await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].name, "Low");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_search() {
        let db = test_db().await;
        let repo = db.products();

        let product = Product::new("Discontinued", 100);
        repo.insert(&product).await.unwrap();
        assert!(repo.soft_delete(&product.id).await.unwrap());

        let results = repo.search("Discontinued", 10).await.unwrap();
        assert!(results.is_empty());

        // Still reachable by ID for history display
        let found = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!found.is_active);
    }
}

//! # Customer Repository
//!
//! Database operations for customers: CRUD, loyalty points, lifetime
//! stats and the marketing-facing queries (high value, inactive).
//!
//! ## Loyalty Invariant
//! ```text
//! loyalty_points >= 0, always
//!
//! add_points_tx     : unconditional  UPDATE ... points = points + ?
//! try_redeem_tx     : conditional    UPDATE ... WHERE points >= ?
//!                     rows_affected == 0 → insufficient balance
//! ```
//! The balance check and the debit are one statement, so two concurrent
//! redemptions can never both succeed against the same balance.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::{Customer, SyncStatus};

const CUSTOMER_COLUMNS: &str = "id, first_name, last_name, email, phone, loyalty_points, \
     total_spent_cents, total_visits, last_visit_at, is_active, created_at, updated_at, \
     sync_status, last_sync_at";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Inserts a new customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            "INSERT INTO customers (id, first_name, last_name, email, phone, loyalty_points, \
             total_spent_cents, total_visits, last_visit_at, is_active, created_at, updated_at, \
             sync_status, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.loyalty_points)
        .bind(customer.total_spent_cents)
        .bind(customer.total_visits)
        .bind(customer.last_visit_at)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .bind(customer.sync.status)
        .bind(customer.sync.last_sync_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a customer's profile fields. Loyalty points and lifetime
    /// stats are excluded; they move only through the engine's delta
    /// operations.
    pub async fn update(&self, customer: &Customer) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE customers SET first_name = ?, last_name = ?, email = ?, phone = ?, \
             is_active = ?, updated_at = ?, sync_status = ? \
             WHERE id = ?",
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.is_active)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(&customer.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Fetches a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Finds an active customer by exact email or phone, for duplicate
    /// detection at registration time.
    pub async fn find_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE is_active = 1 \
               AND ((email IS NOT NULL AND email = ?) OR (phone IS NOT NULL AND phone = ?)) \
             LIMIT 1"
        ))
        .bind(email)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Searches active customers by name, email or phone substring.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE is_active = 1 \
               AND (first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR phone LIKE ?) \
             ORDER BY last_name, first_name LIMIT ?"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Lists active customers sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE is_active = 1 \
             ORDER BY last_name, first_name LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Activates or deactivates a customer (soft delete).
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE customers SET is_active = ?, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Marketing Queries
    // =========================================================================

    /// Active customers whose lifetime spend meets the given threshold,
    /// biggest spenders first.
    pub async fn list_high_value(&self, threshold_cents: i64) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE is_active = 1 AND total_spent_cents >= ? \
             ORDER BY total_spent_cents DESC"
        ))
        .bind(threshold_cents)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Active customers with no recorded visit since the cutoff (customers
    /// who have never visited count as inactive).
    pub async fn list_inactive_since(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE is_active = 1 AND (last_visit_at IS NULL OR last_visit_at < ?) \
             ORDER BY last_visit_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    // =========================================================================
    // Transactional Operations
    // =========================================================================

    /// Fetches a customer inside an open transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(customer)
    }

    /// Records a completed sale against a customer's lifetime stats and
    /// accrues loyalty points, all in one statement.
    pub async fn record_sale_tx(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount_cents: i64,
        loyalty_points: i64,
        visited_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE customers \
             SET total_spent_cents = total_spent_cents + ?, \
                 total_visits = total_visits + 1, \
                 last_visit_at = ?, \
                 loyalty_points = loyalty_points + ?, \
                 updated_at = ?, sync_status = ? \
             WHERE id = ?",
        )
        .bind(amount_cents)
        .bind(visited_at)
        .bind(loyalty_points)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Adds loyalty points inside an open transaction.
    pub async fn add_points_tx(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE customers \
             SET loyalty_points = loyalty_points + ?, updated_at = ?, sync_status = ? \
             WHERE id = ?",
        )
        .bind(points)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Conditionally redeems loyalty points inside an open transaction.
    /// `false` means the balance was insufficient (or the customer is
    /// missing); the caller decides which by reading the row.
    pub async fn try_redeem_points_tx(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE customers \
             SET loyalty_points = loyalty_points - ?, updated_at = ?, sync_status = ? \
             WHERE id = ? AND loyalty_points >= ?",
        )
        .bind(points)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(customer_id)
        .bind(points)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
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
    async fn test_insert_and_search() {
        let db = test_db().await;
        let repo = db.customers();

        let mut customer = Customer::new("Maria", "Lopez");
        customer.email = Some("maria@example.com".to_string());
        repo.insert(&customer).await.unwrap();

        let results = repo.search("lopez", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].full_name(), "Maria Lopez");

        let dup = repo
            .find_by_contact(Some("maria@example.com"), None)
            .await
            .unwrap();
        assert!(dup.is_some());
    }

    #[tokio::test]
    async fn test_redeem_points_is_conditional() {
        let db = test_db().await;
        let repo = db.customers();

        let mut customer = Customer::new("Ana", "Silva");
        customer.loyalty_points = 10;
        repo.insert(&customer).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(
            CustomerRepository::try_redeem_points_tx(&mut tx, &customer.id, 10)
                .await
                .unwrap()
        );
        // Balance is now zero: next redemption must fail
        assert!(
            !CustomerRepository::try_redeem_points_tx(&mut tx, &customer.id, 1)
                .await
                .unwrap()
        );
        tx.commit().await.unwrap();

        let found = repo.get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(found.loyalty_points, 0);
    }

    #[tokio::test]
    async fn test_record_sale_updates_stats() {
        let db = test_db().await;
        let repo = db.customers();

        let customer = Customer::new("Ana", "Silva");
        repo.insert(&customer).await.unwrap();

        let now = Utc::now();
        let mut tx = db.begin().await.unwrap();
        assert!(
            CustomerRepository::record_sale_tx(&mut tx, &customer.id, 1740, 17, now)
                .await
                .unwrap()
        );
        tx.commit().await.unwrap();

        let found = repo.get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(found.total_spent_cents, 1740);
        assert_eq!(found.total_visits, 1);
        assert_eq!(found.loyalty_points, 17);
        assert!(found.last_visit_at.is_some());
    }

    #[tokio::test]
    async fn test_high_value_and_inactive_queries() {
        let db = test_db().await;
        let repo = db.customers();

        let whale = Customer::new("Big", "Spender");
        repo.insert(&whale).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        CustomerRepository::record_sale_tx(&mut tx, &whale.id, 100_000, 0, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let ghost = Customer::new("Never", "Visited");
        repo.insert(&ghost).await.unwrap();

        let high = repo.list_high_value(50_000).await.unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].id, whale.id);

        let inactive = repo.list_inactive_since(Utc::now()).await.unwrap();
        assert!(inactive.iter().any(|c| c.id == ghost.id));
    }
}

//! # Catalog Repositories
//!
//! Categories, suppliers and register users: small supporting aggregates
//! with the same CRUD + soft-delete shape. Products reference categories
//! and suppliers with `ON DELETE SET NULL`, so catalog rows are safe to
//! soft-delete without touching products.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tally_core::{Category, Supplier, SyncStatus, User};

// =============================================================================
// Category
// =============================================================================

/// Repository for product categories. `categories.name` is unique.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Inserts a new category. Duplicate names surface as
    /// `DbError::UniqueViolation`.
    pub async fn insert(&self, category: &Category) -> DbResult<()> {
        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query(
            "INSERT INTO categories (id, name, description, is_active, created_at, updated_at, \
             sync_status, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .bind(category.sync.status)
        .bind(category.sync.last_sync_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a category's name and description.
    pub async fn update(&self, category: &Category) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE categories SET name = ?, description = ?, is_active = ?, updated_at = ?, \
             sync_status = ? WHERE id = ?",
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(&category.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, is_active, created_at, updated_at, sync_status, \
             last_sync_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn list_active(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, is_active, created_at, updated_at, sync_status, \
             last_sync_at FROM categories WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE categories SET is_active = 0, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// Repository for stock suppliers.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn insert(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query(
            "INSERT INTO suppliers (id, name, contact_name, email, phone, is_active, \
             created_at, updated_at, sync_status, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(supplier.is_active)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .bind(supplier.sync.status)
        .bind(supplier.sync.last_sync_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update(&self, supplier: &Supplier) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE suppliers SET name = ?, contact_name = ?, email = ?, phone = ?, \
             is_active = ?, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(supplier.is_active)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(&supplier.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, contact_name, email, phone, is_active, created_at, updated_at, \
             sync_status, last_sync_at FROM suppliers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(supplier)
    }

    pub async fn list_active(&self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, contact_name, email, phone, is_active, created_at, updated_at, \
             sync_status, last_sync_at FROM suppliers WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(suppliers)
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE suppliers SET is_active = 0, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// User
// =============================================================================

/// Repository for register operators. `users.username` is unique;
/// authentication lives outside this system.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, username = %user.username, "Inserting user");

        sqlx::query(
            "INSERT INTO users (id, username, display_name, is_active, created_at, updated_at, \
             sync_status, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.sync.status)
        .bind(user.sync.last_sync_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update(&self, user: &User) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET username = ?, display_name = ?, is_active = ?, updated_at = ?, \
             sync_status = ? WHERE id = ?",
        )
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(user.is_active)
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(&user.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, is_active, created_at, updated_at, sync_status, \
             last_sync_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, is_active, created_at, updated_at, sync_status, \
             last_sync_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list_active(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, is_active, created_at, updated_at, sync_status, \
             last_sync_at FROM users WHERE is_active = 1 ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_active = 0, updated_at = ?, sync_status = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(SyncStatus::Pending)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # The Engine
//!
//! The single entry point for business operations. Owns the database
//! handle, the configuration and the change-event channel; every
//! multi-aggregate write runs inside one transaction begun here.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Anatomy of an engine operation                   │
//! │                                                                     │
//! │  1. validate request        → Err(Domain(..)), nothing written      │
//! │  2. tx = db.begin()                                                 │
//! │  3. read + write via *_tx repository functions                      │
//! │  4. tx.commit()             → Err(Store(..)) rolls everything back  │
//! │  5. broadcast ChangeEvent   → only after a successful commit        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sale posting and reversal live in [`crate::sale`]; stock primitives in
//! [`crate::stock`]; loyalty in [`crate::loyalty`]. This module carries
//! the constructor and the catalog/customer management operations.

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tracing::info;

use tally_core::{
    validation, Category, CoreError, Customer, Product, Supplier, User, ValidationError,
};
use tally_db::{Database, DbError};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::{self, ChangeEvent};

/// The Tally POS business engine.
///
/// Cheap to clone; all clones share the pool and the event channel.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./tally.db")).await?;
/// let engine = Engine::new(db, EngineConfig::default());
///
/// let receipt = engine.post_sale(request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    config: EngineConfig,
    events: broadcast::Sender<ChangeEvent>,
}

impl Engine {
    /// Creates an engine over an open database.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Engine {
            db,
            config,
            events: events::channel(),
        }
    }

    /// The underlying database handle, for read-only queries that need no
    /// business rules (lists, lookups, sync repository).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribes to post-commit change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: ChangeEvent) {
        // No subscribers is fine; events are best-effort notifications
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Product Management
    // =========================================================================

    /// Creates a product after field validation. A duplicate barcode is
    /// reported as a domain error, not an infrastructure one.
    pub async fn create_product(&self, product: Product) -> EngineResult<Product> {
        validation::validate_name("name", &product.name)?;
        validation::validate_price_cents(product.price_cents)?;
        if let Some(cost) = product.cost_cents {
            validation::validate_cost_cents(cost)?;
        }
        validation::validate_tax_rate_bps(product.tax_rate_bps)?;
        if !product.allow_negative_stock {
            validation::validate_stock_level(product.stock)?;
        }
        if let Some(barcode) = &product.barcode {
            validation::validate_barcode(barcode)?;
        }

        self.db
            .products()
            .insert(&product)
            .await
            .map_err(|e| Self::map_duplicate(e, "barcode", product.barcode.as_deref()))?;

        info!(id = %product.id, name = %product.name, "Product created");
        self.emit(ChangeEvent::ProductChanged {
            product_id: product.id.clone(),
        });
        Ok(product)
    }

    /// Updates a product's fields (not its stock; see [`crate::stock`]).
    pub async fn update_product(&self, product: Product) -> EngineResult<Product> {
        validation::validate_name("name", &product.name)?;
        validation::validate_price_cents(product.price_cents)?;
        if let Some(cost) = product.cost_cents {
            validation::validate_cost_cents(cost)?;
        }
        validation::validate_tax_rate_bps(product.tax_rate_bps)?;
        if let Some(barcode) = &product.barcode {
            validation::validate_barcode(barcode)?;
        }

        let updated = self
            .db
            .products()
            .update(&product)
            .await
            .map_err(|e| Self::map_duplicate(e, "barcode", product.barcode.as_deref()))?;
        if !updated {
            return Err(CoreError::ProductNotFound(product.id.clone()).into());
        }

        self.emit(ChangeEvent::ProductChanged {
            product_id: product.id.clone(),
        });
        Ok(product)
    }

    /// Soft-deletes a product, keeping its sale history intact.
    pub async fn deactivate_product(&self, product_id: &str) -> EngineResult<()> {
        if !self.db.products().soft_delete(product_id).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        info!(id = %product_id, "Product deactivated");
        self.emit(ChangeEvent::ProductChanged {
            product_id: product_id.to_string(),
        });
        Ok(())
    }

    /// Active products at or below their reorder threshold.
    pub async fn low_stock_products(&self) -> EngineResult<Vec<Product>> {
        Ok(self.db.products().list_low_stock().await?)
    }

    /// Active products with no sellable stock.
    pub async fn out_of_stock_products(&self) -> EngineResult<Vec<Product>> {
        Ok(self.db.products().list_out_of_stock().await?)
    }

    // =========================================================================
    // Customer Management
    // =========================================================================

    /// Registers a customer. Names are required; an email or phone already
    /// registered to an active customer is rejected as a duplicate.
    pub async fn create_customer(&self, customer: Customer) -> EngineResult<Customer> {
        validation::validate_name("first_name", &customer.first_name)?;
        validation::validate_name("last_name", &customer.last_name)?;

        if customer.email.is_some() || customer.phone.is_some() {
            let existing = self
                .db
                .customers()
                .find_by_contact(customer.email.as_deref(), customer.phone.as_deref())
                .await?;
            if let Some(existing) = existing {
                let (field, value) = match (&customer.email, &existing.email) {
                    (Some(e), Some(x)) if e == x => ("email", e.clone()),
                    _ => (
                        "phone",
                        customer.phone.clone().unwrap_or_default(),
                    ),
                };
                return Err(CoreError::Validation(ValidationError::Duplicate {
                    field: field.to_string(),
                    value,
                })
                .into());
            }
        }

        self.db.customers().insert(&customer).await?;

        info!(id = %customer.id, "Customer created");
        self.emit(ChangeEvent::CustomerChanged {
            customer_id: customer.id.clone(),
        });
        Ok(customer)
    }

    /// Updates a customer's profile fields.
    pub async fn update_customer(&self, customer: Customer) -> EngineResult<Customer> {
        validation::validate_name("first_name", &customer.first_name)?;
        validation::validate_name("last_name", &customer.last_name)?;

        if !self.db.customers().update(&customer).await? {
            return Err(CoreError::CustomerNotFound(customer.id.clone()).into());
        }

        self.emit(ChangeEvent::CustomerChanged {
            customer_id: customer.id.clone(),
        });
        Ok(customer)
    }

    /// Activates or deactivates a customer.
    pub async fn set_customer_active(&self, customer_id: &str, active: bool) -> EngineResult<()> {
        if !self.db.customers().set_active(customer_id, active).await? {
            return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
        }
        self.emit(ChangeEvent::CustomerChanged {
            customer_id: customer_id.to_string(),
        });
        Ok(())
    }

    /// Customers whose lifetime spend meets the configured threshold.
    pub async fn high_value_customers(&self) -> EngineResult<Vec<Customer>> {
        Ok(self
            .db
            .customers()
            .list_high_value(self.config.high_value_threshold_cents)
            .await?)
    }

    /// Customers with no visit inside the configured window.
    pub async fn inactive_customers(&self) -> EngineResult<Vec<Customer>> {
        let cutoff = Utc::now() - Duration::days(self.config.inactive_after_days);
        Ok(self.db.customers().list_inactive_since(cutoff).await?)
    }

    // =========================================================================
    // Catalog Management
    // =========================================================================

    /// Creates a category. Names are unique.
    pub async fn create_category(&self, category: Category) -> EngineResult<Category> {
        validation::validate_name("name", &category.name)?;
        self.db
            .categories()
            .insert(&category)
            .await
            .map_err(|e| Self::map_duplicate(e, "name", Some(&category.name)))?;
        Ok(category)
    }

    /// Creates a supplier.
    pub async fn create_supplier(&self, supplier: Supplier) -> EngineResult<Supplier> {
        validation::validate_name("name", &supplier.name)?;
        self.db.suppliers().insert(&supplier).await?;
        Ok(supplier)
    }

    /// Creates a register user. Usernames are unique.
    pub async fn create_user(&self, user: User) -> EngineResult<User> {
        validation::validate_name("username", &user.username)?;
        validation::validate_name("display_name", &user.display_name)?;
        self.db
            .users()
            .insert(&user)
            .await
            .map_err(|e| Self::map_duplicate(e, "username", Some(&user.username)))?;
        Ok(user)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Turns a unique-constraint violation on the given column into a
    /// domain duplicate error; everything else stays infrastructure.
    fn map_duplicate(
        err: DbError,
        field: &str,
        value: Option<&str>,
    ) -> crate::error::EngineError {
        if err.is_unique_violation_on(field) {
            CoreError::Validation(ValidationError::Duplicate {
                field: field.to_string(),
                value: value.unwrap_or_default().to_string(),
            })
            .into()
        } else {
            err.into()
        }
    }
}

//! # Stock Ledger Primitives
//!
//! Manual stock movements outside the sale flow: goods received,
//! shrinkage, recounts. Sales and refunds move stock through their own
//! transactions in [`crate::sale`].
//!
//! All arithmetic happens inside the UPDATE statement; a stale read can
//! never be written back over a concurrent movement.

use tracing::info;

use tally_core::{validation, CoreError, Product};
use tally_db::repository::product::ProductRepository;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::events::ChangeEvent;

impl Engine {
    /// Adds stock (goods received, found inventory). Quantity must be
    /// positive.
    pub async fn increase_stock(&self, product_id: &str, quantity: i64) -> EngineResult<Product> {
        validation::validate_quantity(quantity)?;

        let mut tx = self.db().begin().await?;
        if !ProductRepository::restore_stock_tx(&mut tx, product_id, quantity).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        let product = Self::reread(&mut tx, product_id).await?;
        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(product_id = %product_id, quantity, stock = product.stock, "Stock increased");
        self.emit(ChangeEvent::StockChanged {
            product_id: product_id.to_string(),
        });
        Ok(product)
    }

    /// Removes stock (damage, shrinkage). Quantity must be positive, and
    /// the product must have cover under its own tracking rules.
    pub async fn decrease_stock(&self, product_id: &str, quantity: i64) -> EngineResult<Product> {
        validation::validate_quantity(quantity)?;

        let mut tx = self.db().begin().await?;
        if !ProductRepository::try_decrement_stock_tx(&mut tx, product_id, quantity).await? {
            // Distinguish "no such product" and "soft-deleted" from
            // "not enough stock"
            let err = match ProductRepository::get_tx(&mut tx, product_id).await? {
                None => CoreError::ProductNotFound(product_id.to_string()),
                Some(p) if !p.is_active => CoreError::ProductInactive(product_id.to_string()),
                Some(p) => CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    requested: quantity,
                    available: p.stock,
                },
            };
            return Err(err.into());
        }
        let product = Self::reread(&mut tx, product_id).await?;
        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(product_id = %product_id, quantity, stock = product.stock, "Stock decreased");
        self.emit(ChangeEvent::StockChanged {
            product_id: product_id.to_string(),
        });
        Ok(product)
    }

    /// Sets stock to an absolute level (manual recount). Rejects negative
    /// levels; bypasses the sufficiency guard because a recount states a
    /// fact rather than requesting a movement.
    pub async fn set_stock(&self, product_id: &str, stock: i64) -> EngineResult<Product> {
        validation::validate_stock_level(stock)?;

        let mut tx = self.db().begin().await?;
        if !ProductRepository::set_stock_tx(&mut tx, product_id, stock).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        let product = Self::reread(&mut tx, product_id).await?;
        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(product_id = %product_id, stock, "Stock recounted");
        self.emit(ChangeEvent::StockChanged {
            product_id: product_id.to_string(),
        });
        Ok(product)
    }

    /// Signed stock adjustment with an audit reason, delegating to
    /// increase/decrease. A zero delta just returns the current row.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
    ) -> EngineResult<Product> {
        info!(product_id = %product_id, delta, reason, "Stock adjustment");

        if delta > 0 {
            self.increase_stock(product_id, delta).await
        } else if delta < 0 {
            self.decrease_stock(product_id, -delta).await
        } else {
            self.db()
                .products()
                .get_by_id(product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
        }
    }

    async fn reread(
        conn: &mut sqlx::SqliteConnection,
        product_id: &str,
    ) -> EngineResult<Product> {
        Ok(ProductRepository::get_tx(conn, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?)
    }
}

//! # Loyalty Points
//!
//! Accrual and redemption of customer loyalty points.
//!
//! Accrual happens inside `post_sale`'s transaction at
//! `floor(total_cents / 100) × loyalty_points_per_unit`. The operations
//! here are the manual paths: goodwill grants and redemptions at the
//! register. The balance never goes negative; the debit and the balance
//! check are one conditional UPDATE.

use tracing::info;

use tally_core::{validation, CoreError, Customer};
use tally_db::repository::customer::CustomerRepository;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::events::ChangeEvent;

impl Engine {
    /// Points accrued for a sale of the given total.
    pub(crate) fn loyalty_accrual(&self, total_cents: i64) -> i64 {
        (total_cents / 100) * self.config().loyalty_points_per_unit
    }

    /// Grants loyalty points (goodwill, promotions). Points must be
    /// positive.
    pub async fn add_loyalty_points(
        &self,
        customer_id: &str,
        points: i64,
    ) -> EngineResult<Customer> {
        validation::validate_quantity(points)?;

        let mut tx = self.db().begin().await?;
        if !CustomerRepository::add_points_tx(&mut tx, customer_id, points).await? {
            return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
        }
        let customer = Self::reread_customer(&mut tx, customer_id).await?;
        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(customer_id = %customer_id, points, balance = customer.loyalty_points, "Loyalty points added");
        self.emit(ChangeEvent::CustomerChanged {
            customer_id: customer_id.to_string(),
        });
        Ok(customer)
    }

    /// Redeems loyalty points. Fails with
    /// [`CoreError::InsufficientLoyaltyPoints`] when the balance does not
    /// cover the request.
    pub async fn redeem_loyalty_points(
        &self,
        customer_id: &str,
        points: i64,
    ) -> EngineResult<Customer> {
        validation::validate_quantity(points)?;

        let mut tx = self.db().begin().await?;
        if !CustomerRepository::try_redeem_points_tx(&mut tx, customer_id, points).await? {
            let err = match CustomerRepository::get_tx(&mut tx, customer_id).await? {
                None => CoreError::CustomerNotFound(customer_id.to_string()),
                Some(c) => CoreError::InsufficientLoyaltyPoints {
                    customer_id: customer_id.to_string(),
                    requested: points,
                    available: c.loyalty_points,
                },
            };
            return Err(err.into());
        }
        let customer = Self::reread_customer(&mut tx, customer_id).await?;
        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(customer_id = %customer_id, points, balance = customer.loyalty_points, "Loyalty points redeemed");
        self.emit(ChangeEvent::CustomerChanged {
            customer_id: customer_id.to_string(),
        });
        Ok(customer)
    }

    async fn reread_customer(
        conn: &mut sqlx::SqliteConnection,
        customer_id: &str,
    ) -> EngineResult<Customer> {
        Ok(CustomerRepository::get_tx(conn, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?)
    }
}

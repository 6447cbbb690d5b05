//! # Engine Configuration
//!
//! Tunables for the business engine, passed explicitly into
//! [`Engine::new`](crate::Engine::new). No globals, no environment
//! lookups; a test constructs exactly the configuration it needs.

use serde::{Deserialize, Serialize};

/// Configuration for the sale/stock/loyalty engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Loyalty points accrued per whole major currency unit spent
    /// (`floor(total_cents / 100) × this`). Default: 1.
    pub loyalty_points_per_unit: i64,

    /// How many times `post_sale` retries the whole transaction when the
    /// receipt number collides with a concurrent post. Default: 3.
    pub receipt_retry_attempts: u32,

    /// Lifetime spend, in cents, at which a customer counts as high
    /// value. Default: $1,000.00.
    pub high_value_threshold_cents: i64,

    /// Days without a visit after which a customer counts as inactive.
    /// Default: 90.
    pub inactive_after_days: i64,
}

impl EngineConfig {
    /// Sets the loyalty accrual rate.
    pub fn loyalty_points_per_unit(mut self, points: i64) -> Self {
        self.loyalty_points_per_unit = points;
        self
    }

    /// Sets the receipt retry bound.
    pub fn receipt_retry_attempts(mut self, attempts: u32) -> Self {
        self.receipt_retry_attempts = attempts;
        self
    }

    /// Sets the high-value customer threshold.
    pub fn high_value_threshold_cents(mut self, cents: i64) -> Self {
        self.high_value_threshold_cents = cents;
        self
    }

    /// Sets the inactive-customer window.
    pub fn inactive_after_days(mut self, days: i64) -> Self {
        self.inactive_after_days = days;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            loyalty_points_per_unit: 1,
            receipt_retry_attempts: 3,
            high_value_threshold_cents: 100_000,
            inactive_after_days: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.loyalty_points_per_unit, 1);
        assert_eq!(config.receipt_retry_attempts, 3);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .loyalty_points_per_unit(2)
            .high_value_threshold_cents(50_000);
        assert_eq!(config.loyalty_points_per_unit, 2);
        assert_eq!(config.high_value_threshold_cents, 50_000);
    }
}

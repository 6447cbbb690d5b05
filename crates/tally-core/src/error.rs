//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  tally-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                    │
//! │  ├── LineError        - Per-line sale validation failures           │
//! │  └── ValidationError  - Field-level input failures                  │
//! │                                                                     │
//! │  tally-db errors (separate crate)                                   │
//! │  └── DbError          - Infrastructure/database failures            │
//! │                                                                     │
//! │  tally-engine                                                       │
//! │  └── EngineError      - Domain(CoreError) | Store(DbError)          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities, ...)
//! 3. Errors are enum variants, never String
//! 4. Business violations are `Err` values; nothing in this crate panics

use serde::Serialize;
use thiserror::Error;

use crate::types::SaleStatus;

// =============================================================================
// Line Error
// =============================================================================

/// A single line violation found while validating a sale request.
///
/// `post_sale` validates every line and reports all violations together,
/// so the caller can surface them in one round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineError {
    #[error("line {line}: product not found: {product_id}")]
    ProductNotFound { line: usize, product_id: String },

    #[error("line {line}: product {product_id} is inactive")]
    ProductInactive { line: usize, product_id: String },

    #[error("line {line}: quantity must be positive, got {quantity}")]
    NonPositiveQuantity { line: usize, quantity: i64 },

    #[error("line {line}: tax rate {bps} bps out of range (0..=10000)")]
    InvalidTaxRate { line: usize, bps: u32 },

    #[error(
        "line {line}: insufficient stock for {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        line: usize,
        product_id: String,
        requested: i64,
        available: i64,
    },
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations and domain logic failures.
///
/// All of these are caller-fixable conditions the engine reports
/// synchronously with no side effects; none of them are retried
/// automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale request with no lines.
    #[error("sale must contain at least one line")]
    EmptySale,

    /// One or more sale lines failed validation. Contains every violation
    /// found, not just the first.
    #[error("sale validation failed: {}", format_line_errors(.errors))]
    InvalidLines { errors: Vec<LineError> },

    /// Product cannot be found.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but is soft-deleted; stock operations target
    /// active products only.
    #[error("product is inactive: {0}")]
    ProductInactive(String),

    /// Sale cannot be found.
    #[error("sale not found: {0}")]
    SaleNotFound(String),

    /// Sale item cannot be found (or belongs to a different sale).
    #[error("sale item not found: {0}")]
    SaleItemNotFound(String),

    /// Customer cannot be found.
    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    /// Insufficient stock to complete an operation.
    ///
    /// Raised by the validation pass of `post_sale`, and again by the
    /// conditional stock decrement when a concurrent sale consumed the
    /// stock between validation and write.
    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// Redeeming more loyalty points than the customer holds.
    #[error(
        "insufficient loyalty points for {customer_id}: requested {requested}, available {available}"
    )]
    InsufficientLoyaltyPoints {
        customer_id: String,
        requested: i64,
        available: i64,
    },

    /// Sale is not in a state that allows the requested operation,
    /// e.g. cancelling an already-cancelled sale or refunding twice.
    #[error("sale {sale_id} is {current_status:?}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: SaleStatus,
    },

    /// A refund entry asks for more units than remain unrefunded.
    /// The whole batch is rejected; nothing is applied.
    #[error(
        "refund exceeds remaining quantity for item {sale_item_id}: requested {requested}, refundable {refundable}"
    )]
    RefundExceedsQuantity {
        sale_item_id: String,
        requested: i64,
        refundable: i64,
    },

    /// Receipt number allocation kept colliding under concurrent posts.
    /// Surfaced after bounded retries rather than looping forever.
    #[error("could not allocate a unique receipt number after {attempts} attempts")]
    ReceiptAllocation { attempts: u32 },

    /// Field-level validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn format_line_errors(errors: &[LineError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level input validation errors, raised before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed barcode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value for a unique field (e.g., barcode, email).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for p-1: requested 5, available 3"
        );
    }

    #[test]
    fn test_invalid_lines_collects_all() {
        let err = CoreError::InvalidLines {
            errors: vec![
                LineError::NonPositiveQuantity {
                    line: 0,
                    quantity: 0,
                },
                LineError::ProductNotFound {
                    line: 2,
                    product_id: "p-9".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("line 0"));
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_refund_exceeds_quantity_message() {
        let err = CoreError::RefundExceedsQuantity {
            sale_item_id: "item-1".to_string(),
            requested: 7,
            refundable: 6,
        };
        assert!(err.to_string().contains("requested 7, refundable 6"));
    }
}

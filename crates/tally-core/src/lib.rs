//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate is the heart of Tally POS: a point-of-sale ledger that
//! records sales against stock-tracked inventory, keeps stock from going
//! negative, and reconciles cancellations and refunds. Everything here is
//! pure - types and calculations with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Tally POS Architecture                        │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                 Caller (UI/API, out of scope)               │    │
//! │  └────────────────────────────┬────────────────────────────────┘    │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐    │
//! │  │                      tally-engine                           │    │
//! │  │   post_sale, cancel/refund, stock ledger, sync flags        │    │
//! │  └──────────────┬─────────────────────────────┬────────────────┘    │
//! │                 │                             │                     │
//! │  ┌──────────────▼──────────────┐  ┌───────────▼─────────────────┐   │
//! │  │   ★ tally-core (THIS) ★     │  │         tally-db            │   │
//! │  │                             │  │  SQLite pool, migrations,   │   │
//! │  │  types  money  sale  error  │  │  repositories               │   │
//! │  │  validation                 │  │                             │   │
//! │  │                             │  └─────────────────────────────┘   │
//! │  │  NO I/O • PURE FUNCTIONS    │                                    │
//! │  └─────────────────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Customer, SyncState, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`sale`] - Sale totals math, receipt numbering, refund arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic - same input, same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, LineError, ValidationError};
pub use money::Money;
pub use sale::{PricedLine, SaleLine, SaleTotals};
pub use types::*;

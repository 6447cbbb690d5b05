//! # tally-db: Database Layer for Tally POS
//!
//! SQLite persistence for the point-of-sale ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Tally POS Architecture                        │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                      tally-engine                           │    │
//! │  └──────────────┬─────────────────────────────┬────────────────┘    │
//! │                 │                             │                     │
//! │  ┌──────────────▼──────────────┐  ┌───────────▼─────────────────┐   │
//! │  │         tally-core          │  │    ★ tally-db (THIS) ★      │   │
//! │  │    pure types & math        │  │                             │   │
//! │  └─────────────────────────────┘  │  pool       migrations      │   │
//! │                                   │  error      repository/     │   │
//! │                                   └─────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pool`] - [`Database`] handle: pooled connections, WAL, migrations
//! - [`migrations`] - Embedded schema migrations
//! - [`repository`] - One repository per aggregate
//! - [`error`] - [`DbError`] mapping of sqlx/SQLite failures
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("./tally.db")).await?;
//! let product = db.products().get_by_barcode("5449000000996").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::catalog::{CategoryRepository, SupplierRepository, UserRepository};
pub use repository::customer::CustomerRepository;
pub use repository::product::{InventoryValuation, ProductRepository};
pub use repository::sale::{SaleRepository, SaleStats};
pub use repository::sync::{SyncCounts, SyncRecord, SyncRepository};

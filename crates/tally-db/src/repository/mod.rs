//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                               │
//! │                                                                     │
//! │  Engine / caller                                                    │
//! │       │                                                             │
//! │       │  db.products().get_by_barcode("5449...")                    │
//! │       ▼                                                             │
//! │  ProductRepository                                                  │
//! │  ├── pool methods      ← single-aggregate reads and writes          │
//! │  └── *_tx functions    ← same queries against an open transaction,  │
//! │                          composed by tally-engine into atomic       │
//! │                          multi-aggregate operations                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite                                                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every business write stamps `sync_status = 'pending'` and `updated_at`
//! in the same statement; the sync flag can never drift from the data it
//! describes.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product CRUD, lookup, stock queries
//! - [`customer::CustomerRepository`] - Customer CRUD, loyalty, stats
//! - [`sale::SaleRepository`] - Sale and sale item persistence and queries
//! - [`catalog`] - Category, supplier and user repositories
//! - [`sync::SyncRepository`] - Per-record sync flags

pub mod catalog;
pub mod customer;
pub mod product;
pub mod sale;
pub mod sync;

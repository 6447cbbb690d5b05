//! # tally-engine: Transactional Core for Tally POS
//!
//! The business engine over [`tally_db`]: posts sales, reverses them,
//! moves stock, accrues loyalty, and broadcasts change events.
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
//! │  │                  ★ tally-engine (THIS) ★                    │    │
//! │  │                                                             │    │
//! │  │  engine   sale   stock   loyalty   events   config          │    │
//! │  │                                                             │    │
//! │  │  One transaction per operation; commit-or-abort; change     │    │
//! │  │  events after commit only                                   │    │
//! │  └──────────────┬─────────────────────────────┬────────────────┘    │
//! │                 │                             │                     │
//! │  ┌──────────────▼──────────────┐  ┌───────────▼─────────────────┐   │
//! │  │         tally-core          │  │         tally-db            │   │
//! │  └─────────────────────────────┘  └─────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - The [`Engine`] handle and catalog/customer management
//! - [`sale`] - `post_sale`, `cancel_sale`, `refund_sale`, `partial_refund`
//! - [`stock`] - Manual stock movements (increase/decrease/set/adjust)
//! - [`loyalty`] - Loyalty accrual and redemption
//! - [`events`] - Post-commit [`ChangeEvent`] broadcast
//! - [`config`] - [`EngineConfig`] tunables
//! - [`error`] - [`EngineError`]: domain vs. store failures

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod loyalty;
pub mod sale;
pub mod stock;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use events::ChangeEvent;
pub use sale::{RefundLine, SaleReceipt, SaleRequest};

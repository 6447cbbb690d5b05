//! # Change Events
//!
//! Post-commit notifications for anything observing the ledger (UI lists,
//! dashboards, the sync scheduler).
//!
//! ## Query + Notification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   Why events carry IDs, not data                    │
//! │                                                                     │
//! │  Engine commit ──► broadcast(ChangeEvent::SalePosted { sale_id })   │
//! │                         │                                           │
//! │         ┌───────────────┼───────────────┐                           │
//! │         ▼               ▼               ▼                           │
//! │     sales list      dashboard      sync scheduler                   │
//! │         │               │               │                           │
//! │         └── each consumer RE-QUERIES what it displays ──┘           │
//! │                                                                     │
//! │  A lagged consumer that misses events still converges on the next   │
//! │  query; stale payloads cannot exist because there are no payloads.  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events fire only after a successful commit. A rolled-back transaction
//! emits nothing.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A committed change to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A product was created or its fields changed.
    ProductChanged { product_id: String },
    /// A product's stock level moved (sale, refund, manual adjustment).
    StockChanged { product_id: String },
    /// A customer was created or changed (profile, stats, loyalty).
    CustomerChanged { customer_id: String },
    /// A new sale was posted.
    SalePosted { sale_id: String },
    /// A sale was cancelled.
    SaleCancelled { sale_id: String },
    /// A sale was refunded, fully or partially.
    SaleRefunded { sale_id: String },
}

/// Creates the engine's broadcast channel.
pub fn channel() -> broadcast::Sender<ChangeEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

//! # Domain Types
//!
//! Core domain types used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────┐         │
//! │  │    Product    │   │     Sale      │   │   SaleItem    │         │
//! │  │ ───────────── │   │ ───────────── │   │ ───────────── │         │
//! │  │ id (UUID)     │   │ id (UUID)     │   │ id (UUID)     │         │
//! │  │ barcode       │   │ receipt_number│   │ sale_id (FK)  │         │
//! │  │ stock         │   │ status        │   │ product snap  │         │
//! │  │ price_cents   │   │ total_cents   │   │ refunded_qty  │         │
//! │  └───────────────┘   └───────────────┘   └───────────────┘         │
//! │                                                                     │
//! │  Customer, Category, Supplier, User: supporting aggregates          │
//! │                                                                     │
//! │  Every mutable entity embeds SyncState:                             │
//! │    sync_status ∈ {pending, synced, failed} + last_sync_at           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has an immutable UUID v4 `id` for relations, and where it
//! makes sense a human-facing business key (barcode, receipt_number,
//! username) carrying the uniqueness constraint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 825 bps = 8.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Sync State
// =============================================================================

/// Per-record synchronization status.
///
/// ## State Machine
/// ```text
/// any business mutation ──► pending
/// sync collaborator ack ──► synced
/// sync collaborator nack ─► failed
/// ```
/// Both `pending` and `failed` records are eligible for the next sync
/// attempt. The flag is per-record, not per-field: a record touched twice
/// between sync cycles is pushed once, in its latest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local mutation not yet acknowledged by the remote store.
    Pending,
    /// Acknowledged by the remote store.
    Synced,
    /// Remote rejected or transport error on the last attempt.
    Failed,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Pending
    }
}

/// The sync mixin embedded in every mutable entity.
///
/// One value type instead of a status/timestamp pair duplicated across
/// seven entities; `stamp_pending` is the single shared helper every
/// business mutation goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SyncState {
    #[serde(rename = "sync_status")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "sync_status"))]
    pub status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Fresh state for a newly created record.
    pub fn pending() -> Self {
        SyncState {
            status: SyncStatus::Pending,
            last_sync_at: None,
        }
    }

    /// Stamps the record as needing sync again after a business mutation.
    /// `last_sync_at` is left alone; it records the last acknowledgement.
    pub fn stamp_pending(&mut self) {
        self.status = SyncStatus::Pending;
    }

    /// Whether this record is due for a sync attempt (pending or failed).
    pub fn needs_sync(&self) -> bool {
        matches!(self.status, SyncStatus::Pending | SyncStatus::Failed)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::pending()
    }
}

// =============================================================================
// Entity Kind
// =============================================================================

/// The set of syncable tables, used by the sync repository to address
/// per-record flags generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Category,
    Supplier,
    Customer,
    User,
    Sale,
    SaleItem,
}

impl EntityKind {
    /// The backing table name. Fixed set, safe to splice into SQL.
    pub const fn table(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Category => "categories",
            EntityKind::Supplier => "suppliers",
            EntityKind::Customer => "customers",
            EntityKind::User => "users",
            EntityKind::Sale => "sales",
            EntityKind::SaleItem => "sale_items",
        }
    }

    /// All syncable kinds, in drain order (parents before children so the
    /// remote store sees referenced rows first).
    pub const fn all() -> [EntityKind; 7] {
        [
            EntityKind::Category,
            EntityKind::Supplier,
            EntityKind::User,
            EntityKind::Customer,
            EntityKind::Product,
            EntityKind::Sale,
            EntityKind::SaleItem,
        ]
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `stock` is the single authoritative quantity; it is mutated only by
/// delta operations (sale decrement, refund restore, adjust) or an
/// explicit recount, never recomputed from a stale read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Barcode (EAN-13, UPC-A, etc.). Unique when present.
    pub barcode: Option<String>,

    /// Owning category, if any.
    pub category_id: Option<String>,

    /// Preferred supplier, if any.
    pub supplier_id: Option<String>,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Unit cost in cents (for margin/valuation; may be unknown).
    pub cost_cents: Option<i64>,

    /// Tax rate in basis points (825 = 8.25%).
    pub tax_rate_bps: u32,

    /// Current stock level in whole units.
    pub stock: i64,

    /// Reorder threshold; `stock <= min_stock` flags the product as low.
    pub min_stock: i64,

    /// Whether stock is tracked for this product.
    pub track_stock: bool,

    /// Allow selling below zero stock.
    pub allow_negative_stock: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sync: SyncState,
}

impl Product {
    /// Creates an active, stock-tracked product with sensible defaults.
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            barcode: None,
            category_id: None,
            supplier_id: None,
            price_cents,
            cost_cents: None,
            tax_rate_bps: 0,
            stock: 0,
            min_stock: 0,
            track_stock: true,
            allow_negative_stock: false,
            is_active: true,
            created_at: now,
            updated_at: now,
            sync: SyncState::pending(),
        }
    }

    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Checks whether `quantity` units can be sold at the current stock
    /// level (tracked products without negative stock need cover).
    pub fn can_sell(&self, quantity: i64) -> bool {
        if !self.track_stock || self.allow_negative_stock {
            return true;
        }
        self.stock >= quantity
    }

    /// Low-stock flag: at or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.track_stock && self.is_active && self.stock <= self.min_stock
    }
}

// =============================================================================
// Catalog: Category, Supplier, User
// =============================================================================

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sync: SyncState,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            sync: SyncState::pending(),
        }
    }
}

/// A stock supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sync: SyncState,
}

impl Supplier {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Supplier {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            contact_name: None,
            email: None,
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            sync: SyncState::pending(),
        }
    }
}

/// A register operator. Authentication is handled outside this system;
/// sales only need a valid `user_id` to attribute the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sync: SyncState,
}

impl User {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            display_name: display_name.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
            sync: SyncState::pending(),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with loyalty and lifetime-value stats.
///
/// `loyalty_points`, `total_spent_cents` and `total_visits` never go
/// negative; the sale engine's post-commit hook and the explicit loyalty
/// operations are the only writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub loyalty_points: i64,
    pub total_spent_cents: i64,
    pub total_visits: i64,
    pub last_visit_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sync: SyncState,
}

impl Customer {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4().to_string(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            loyalty_points: 0,
            total_spent_cents: 0,
            total_visits: 0,
            last_visit_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            sync: SyncState::pending(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// Sales are born `Completed` (there is no draft state in this system).
/// `Cancelled` and fully `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Reserved for externally staged sales; the engine never creates one.
    Pending,
    /// Paid and finalized. Partial refunds keep the sale here.
    Completed,
    /// Fully reversed; stock restored.
    Cancelled,
    /// Every line fully refunded.
    Refunded,
}

impl SaleStatus {
    /// Terminal states cannot be cancelled or refunded again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Cancelled | SaleStatus::Refunded)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment (tendered/change tracked on the sale).
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Bank transfer.
    Transfer,
    /// Anything else (voucher, account, ...).
    Other,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale transaction.
///
/// `refund_amount_cents` is a running total across partial refunds and is
/// kept separate from `total_cents`, which never changes after posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Human-facing receipt identifier, `YYYYMMDD-NNNN`, unique.
    pub receipt_number: String,
    pub customer_id: Option<String>,
    pub user_id: String,
    pub sale_date: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub cash_received_cents: Option<i64>,
    pub change_cents: Option<i64>,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub is_refunded: bool,
    pub refund_amount_cents: i64,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sync: SyncState,
}

impl Sale {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn refund_amount(&self) -> Money {
        Money::from_cents(self.refund_amount_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Uses the snapshot pattern: product name/barcode/price/cost are frozen
/// at time of sale and never recomputed from the live product.
/// `refunded_quantity` is monotonically non-decreasing and never exceeds
/// `quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Barcode at time of sale (frozen).
    pub product_barcode: Option<String>,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Unit cost in cents at time of sale (frozen).
    pub unit_cost_cents: Option<i64>,
    /// Quantity sold. Always > 0.
    pub quantity: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// quantity × unit_price − discount + tax.
    pub line_total_cents: i64,
    pub is_refunded: bool,
    pub refunded_quantity: i64,
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sync: SyncState,
}

impl SaleItem {
    /// Units not yet refunded.
    #[inline]
    pub fn refundable_quantity(&self) -> i64 {
        self.quantity - self.refunded_quantity
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_sync_state_machine() {
        let mut sync = SyncState::pending();
        assert!(sync.needs_sync());

        sync.status = SyncStatus::Synced;
        assert!(!sync.needs_sync());

        sync.stamp_pending();
        assert_eq!(sync.status, SyncStatus::Pending);

        sync.status = SyncStatus::Failed;
        assert!(sync.needs_sync());
    }

    #[test]
    fn test_can_sell() {
        let mut p = Product::new("Cola 330ml", 299);
        p.stock = 3;

        assert!(p.can_sell(3));
        assert!(!p.can_sell(4));

        p.allow_negative_stock = true;
        assert!(p.can_sell(100));

        p.allow_negative_stock = false;
        p.track_stock = false;
        assert!(p.can_sell(100));
    }

    #[test]
    fn test_low_stock_flag() {
        let mut p = Product::new("Cola 330ml", 299);
        p.stock = 2;
        p.min_stock = 5;
        assert!(p.is_low_stock());

        p.stock = 6;
        assert!(!p.is_low_stock());

        p.stock = 2;
        p.track_stock = false;
        assert!(!p.is_low_stock());
    }

    #[test]
    fn test_sale_status_terminal() {
        assert!(SaleStatus::Cancelled.is_terminal());
        assert!(SaleStatus::Refunded.is_terminal());
        assert!(!SaleStatus::Completed.is_terminal());
        assert!(!SaleStatus::Pending.is_terminal());
    }

    #[test]
    fn test_refundable_quantity() {
        let mut p = Product::new("Cola 330ml", 299);
        p.stock = 10;

        let now = Utc::now();
        let item = SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: Uuid::new_v4().to_string(),
            product_id: p.id.clone(),
            product_name: p.name.clone(),
            product_barcode: None,
            unit_price_cents: 299,
            unit_cost_cents: None,
            quantity: 10,
            discount_cents: 0,
            tax_cents: 0,
            line_total_cents: 2990,
            is_refunded: false,
            refunded_quantity: 4,
            refund_reason: None,
            created_at: now,
            updated_at: now,
            sync: SyncState::pending(),
        };
        assert_eq!(item.refundable_quantity(), 6);
    }

    #[test]
    fn test_entity_kind_tables() {
        assert_eq!(EntityKind::Product.table(), "products");
        assert_eq!(EntityKind::SaleItem.table(), "sale_items");
        assert_eq!(EntityKind::all().len(), 7);
    }
}

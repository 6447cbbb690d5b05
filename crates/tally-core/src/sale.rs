//! # Sale Math
//!
//! Pure sale calculations: line pricing, totals, receipt numbering and
//! refund arithmetic. No I/O here - the engine crate reads products and
//! feeds the snapshots in.
//!
//! ## Posting Flow (math portion)
//! ```text
//! SaleLine (request)      Product (read by engine)
//!       │                        │
//!       └────────┬───────────────┘
//!                ▼
//!          PricedLine              ← price/cost snapshot frozen here
//!                │
//!                ▼
//!          compute_totals          ← subtotal, tax, clamped total
//!                │
//!                ▼
//!          Sale + SaleItems persisted by the engine
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::TaxRate;

// =============================================================================
// Request Types
// =============================================================================

/// One requested line of a sale, as it arrives from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    /// Overrides the product's list price when set (price negotiation,
    /// markdowns). Snapshot still records whatever was charged.
    pub unit_price_override_cents: Option<i64>,
    /// Overrides the product's tax rate when set, in basis points.
    pub tax_rate_override_bps: Option<u32>,
    /// Line-level discount in cents, off the line subtotal.
    pub discount_cents: i64,
}

impl SaleLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            product_id: product_id.into(),
            quantity,
            unit_price_override_cents: None,
            tax_rate_override_bps: None,
            discount_cents: 0,
        }
    }
}

// =============================================================================
// Priced Line
// =============================================================================

/// A sale line after product resolution, with the price/cost snapshot
/// taken and per-line amounts computed. This is what becomes a SaleItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub product_barcode: Option<String>,
    pub unit_price_cents: i64,
    pub unit_cost_cents: Option<i64>,
    pub quantity: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// quantity × unit_price − discount + tax.
    pub line_total_cents: i64,
}

impl PricedLine {
    /// Prices a line from its snapshot inputs.
    ///
    /// `line_subtotal = unit_price × quantity`; tax applies to the
    /// subtotal at the line's rate; the line total folds discount and tax
    /// in.
    pub fn price(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        product_barcode: Option<String>,
        unit_price_cents: i64,
        unit_cost_cents: Option<i64>,
        quantity: i64,
        discount_cents: i64,
        tax_rate: TaxRate,
    ) -> Self {
        let subtotal = Money::from_cents(unit_price_cents).multiply_quantity(quantity);
        let tax = subtotal.calculate_tax(tax_rate);
        let line_total = subtotal
            .sub_floor_zero(Money::from_cents(discount_cents))
            + tax;

        PricedLine {
            product_id: product_id.into(),
            product_name: product_name.into(),
            product_barcode,
            unit_price_cents,
            unit_cost_cents,
            quantity,
            discount_cents,
            tax_cents: tax.cents(),
            line_total_cents: line_total.cents(),
        }
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Sale-level totals over a set of priced lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    /// Sale-level discount plus every line-level discount.
    pub discount_cents: i64,
    /// subtotal + tax − discount, floored at zero.
    pub total_cents: i64,
}

/// Computes sale totals from priced lines and a sale-level discount.
///
/// Line discounts are folded into the sale's discount total so that
/// `total = subtotal + tax − discount` holds however the discounts were
/// entered.
pub fn compute_totals(lines: &[PricedLine], discount_cents: i64) -> SaleTotals {
    let subtotal: Money = lines
        .iter()
        .fold(Money::zero(), |acc, line| acc + line.subtotal());
    let tax: Money = lines.iter().fold(Money::zero(), |acc, line| {
        acc + Money::from_cents(line.tax_cents)
    });
    let line_discounts: i64 = lines.iter().map(|line| line.discount_cents).sum();

    let discount = discount_cents + line_discounts;
    let total = (subtotal + tax).sub_floor_zero(Money::from_cents(discount));

    SaleTotals {
        subtotal_cents: subtotal.cents(),
        tax_cents: tax.cents(),
        discount_cents: discount,
        total_cents: total.cents(),
    }
}

/// Change due on a cash payment, floored at zero when the customer
/// underpays (the register still records what was received).
pub fn cash_change(total_cents: i64, cash_received_cents: i64) -> i64 {
    Money::from_cents(cash_received_cents)
        .sub_floor_zero(Money::from_cents(total_cents))
        .cents()
}

// =============================================================================
// Receipt Numbering
// =============================================================================

/// Formats a receipt number: `YYYYMMDD-NNNN`.
///
/// `NNNN` is a zero-padded per-day sequence starting at 0001. Sequences
/// past 9999 simply widen; the daily counter, not the width, carries the
/// uniqueness.
pub fn format_receipt_number(date: NaiveDate, seq: i64) -> String {
    format!("{}-{:04}", date.format("%Y%m%d"), seq)
}

/// The per-day receipt prefix (`YYYYMMDD-`), used to count how many sales
/// were already posted today.
pub fn receipt_prefix(date: NaiveDate) -> String {
    format!("{}-", date.format("%Y%m%d"))
}

// =============================================================================
// Refund Math
// =============================================================================

/// The refund value of taking a line's refunded count from
/// `already_refunded` up by `quantity` more units.
///
/// `unit_refund = line_total / original_quantity` (integer division,
/// truncated), so partial refunds never give back more than the line was
/// worth. The remainder cents resolve on whichever refund exhausts the
/// line: cumulative refunds over a line's life always sum to exactly
/// `line_total`.
pub fn refund_delta_cents(
    line_total_cents: i64,
    original_quantity: i64,
    already_refunded: i64,
    quantity: i64,
) -> i64 {
    let unit = Money::from_cents(line_total_cents).divide_quantity(original_quantity);

    if already_refunded + quantity == original_quantity {
        // Exhausting refund settles the truncation remainder
        (Money::from_cents(line_total_cents) - unit.multiply_quantity(already_refunded)).cents()
    } else {
        unit.multiply_quantity(quantity).cents()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit_price: i64, qty: i64, tax_bps: u32) -> PricedLine {
        PricedLine::price(
            "p-1",
            "Test Product",
            None,
            unit_price,
            None,
            qty,
            0,
            TaxRate::from_bps(tax_bps),
        )
    }

    #[test]
    fn test_price_line_no_tax() {
        let l = line(299, 3, 0);
        assert_eq!(l.subtotal().cents(), 897);
        assert_eq!(l.tax_cents, 0);
        assert_eq!(l.line_total_cents, 897);
    }

    #[test]
    fn test_price_line_with_tax() {
        // $10.00 × 2 = $20.00, 8.25% tax = $1.65
        let l = line(1000, 2, 825);
        assert_eq!(l.subtotal().cents(), 2000);
        assert_eq!(l.tax_cents, 165);
        assert_eq!(l.line_total_cents, 2165);
    }

    #[test]
    fn test_price_line_with_discount() {
        let l = PricedLine::price("p-1", "X", None, 1000, None, 2, 500, TaxRate::zero());
        assert_eq!(l.line_total_cents, 1500);
    }

    #[test]
    fn test_compute_totals() {
        let lines = vec![line(1000, 2, 1000), line(500, 1, 0)];
        // subtotal 2500, tax 200
        let totals = compute_totals(&lines, 0);
        assert_eq!(totals.subtotal_cents, 2500);
        assert_eq!(totals.tax_cents, 200);
        assert_eq!(totals.total_cents, 2700);
    }

    #[test]
    fn test_compute_totals_folds_line_discounts() {
        let discounted = PricedLine::price("p-1", "X", None, 1000, None, 2, 300, TaxRate::zero());
        let totals = compute_totals(&[discounted], 200);
        assert_eq!(totals.subtotal_cents, 2000);
        assert_eq!(totals.discount_cents, 500);
        assert_eq!(totals.total_cents, 1500);
    }

    #[test]
    fn test_compute_totals_discount_clamps_at_zero() {
        let lines = vec![line(500, 1, 0)];
        let totals = compute_totals(&lines, 10_000);
        assert_eq!(totals.total_cents, 0);
        assert_eq!(totals.discount_cents, 10_000);
    }

    #[test]
    fn test_cash_change() {
        assert_eq!(cash_change(1740, 2000), 260);
        assert_eq!(cash_change(1740, 1740), 0);
        // Underpayment records zero change, not negative
        assert_eq!(cash_change(1740, 1000), 0);
    }

    #[test]
    fn test_format_receipt_number() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(format_receipt_number(date, 1), "20260131-0001");
        assert_eq!(format_receipt_number(date, 42), "20260131-0042");
        assert_eq!(format_receipt_number(date, 12345), "20260131-12345");
        assert_eq!(receipt_prefix(date), "20260131-");
    }

    #[test]
    fn test_refund_delta_cents() {
        // Line of 10 units worth 1000 cents: 100 per unit
        assert_eq!(refund_delta_cents(1000, 10, 0, 4), 400);
        // Uneven split truncates per unit: 1000/3 = 333
        assert_eq!(refund_delta_cents(1000, 3, 0, 2), 666);
        // Exhausting refund settles the remainder cent
        assert_eq!(refund_delta_cents(1000, 3, 2, 1), 334);
        // One-shot full refund returns the whole line value
        assert_eq!(refund_delta_cents(1000, 3, 0, 3), 1000);
    }

    #[test]
    fn test_refund_deltas_conserve_line_total() {
        // Refunding a 7-unit line in three steps never creates or loses
        // a cent overall
        let total = 1003;
        let mut refunded_value = 0;
        let mut refunded_qty = 0;
        for step in [2, 3, 2] {
            refunded_value += refund_delta_cents(total, 7, refunded_qty, step);
            refunded_qty += step;
        }
        assert_eq!(refunded_qty, 7);
        assert_eq!(refunded_value, total);
    }
}

//! # Sale Posting and Reversal
//!
//! The transactional heart of the register: `post_sale` and its three
//! reversal shapes (`cancel_sale`, `refund_sale`, `partial_refund`).
//!
//! ## Posting Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          post_sale                                  │
//! │                                                                     │
//! │  SaleRequest                                                        │
//! │      │                                                              │
//! │      ▼                                                              │
//! │  ┌── transaction (retried up to N times on receipt collision) ──┐   │
//! │  │                                                              │   │
//! │  │  1. resolve products, validate EVERY line (collect errors)   │   │
//! │  │  2. price lines, compute totals (integer cents)              │   │
//! │  │  3. allocate receipt: YYYYMMDD-(count+1)                     │   │
//! │  │  4. conditional stock decrement per line                     │   │
//! │  │  5. insert sale + items (snapshot pattern)                   │   │
//! │  │  6. customer stats + loyalty accrual                         │   │
//! │  │                                                              │   │
//! │  └──────────── commit ── or ── rollback, nothing written ───────┘   │
//! │      │                                                              │
//! │      ▼                                                              │
//! │  ChangeEvents: SalePosted, StockChanged×N, CustomerChanged          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reversal Semantics
//! - **cancel**: the sale never happened; restore the FULL original
//!   quantity of every line, even after partial refunds.
//! - **refund**: restore what remains unrefunded, mark every line
//!   exhausted, stamp the sale `Refunded`.
//! - **partial refund**: per-line quantities; validate the whole batch
//!   before touching anything; the sale flips to `Refunded` only once
//!   every line is exhausted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::sale::{cash_change, compute_totals, receipt_prefix, refund_delta_cents};
use tally_core::validation::MAX_LINE_QUANTITY;
use tally_core::{
    CoreError, LineError, PaymentMethod, PricedLine, Sale, SaleItem, SaleLine, SaleStatus,
    SyncState, TaxRate,
};
use tally_db::repository::customer::CustomerRepository;
use tally_db::repository::product::ProductRepository;
use tally_db::repository::sale::SaleRepository;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::events::ChangeEvent;

// =============================================================================
// Request / Response Types
// =============================================================================

/// A request to post a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    /// Optional customer to attribute the sale to.
    pub customer_id: Option<String>,
    /// The operator posting the sale.
    pub user_id: String,
    /// Requested lines; must be non-empty.
    pub lines: Vec<SaleLine>,
    /// Sale-level discount in cents, applied after tax.
    pub discount_cents: i64,
    pub payment_method: PaymentMethod,
    /// Cash tendered; change is computed when the method is cash.
    pub cash_received_cents: Option<i64>,
    pub notes: Option<String>,
}

impl SaleRequest {
    /// A minimal request for the given operator and lines.
    pub fn new(user_id: impl Into<String>, lines: Vec<SaleLine>) -> Self {
        SaleRequest {
            customer_id: None,
            user_id: user_id.into(),
            lines,
            discount_cents: 0,
            payment_method: PaymentMethod::Cash,
            cash_received_cents: None,
            notes: None,
        }
    }
}

/// A posted sale with its line items, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// One entry of a partial refund batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundLine {
    pub sale_item_id: String,
    /// Units to refund; must be positive and within what remains.
    pub quantity: i64,
}

// =============================================================================
// Posting
// =============================================================================

impl Engine {
    /// Posts a sale: validates every line, prices them from live product
    /// rows, allocates the day's next receipt number, decrements stock,
    /// persists the sale with frozen snapshots, and updates customer
    /// stats and loyalty. All inside one transaction.
    ///
    /// On a receipt-number collision with a concurrent post the whole
    /// transaction is retried with a fresh count, up to the configured
    /// bound.
    pub async fn post_sale(&self, request: SaleRequest) -> EngineResult<SaleReceipt> {
        if request.lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }

        let attempts = self.config().receipt_retry_attempts.max(1);
        for attempt in 1..=attempts {
            let mut tx = self.db().begin().await?;

            match self.post_sale_tx(&mut tx, &request).await {
                Ok(receipt) => {
                    tx.commit().await.map_err(tally_db::DbError::from)?;

                    info!(
                        sale_id = %receipt.sale.id,
                        receipt = %receipt.sale.receipt_number,
                        total_cents = receipt.sale.total_cents,
                        "Sale posted"
                    );

                    self.emit(ChangeEvent::SalePosted {
                        sale_id: receipt.sale.id.clone(),
                    });
                    for item in &receipt.items {
                        self.emit(ChangeEvent::StockChanged {
                            product_id: item.product_id.clone(),
                        });
                    }
                    if let Some(customer_id) = &receipt.sale.customer_id {
                        self.emit(ChangeEvent::CustomerChanged {
                            customer_id: customer_id.clone(),
                        });
                    }

                    return Ok(receipt);
                }
                Err(EngineError::Store(e)) if e.is_unique_violation_on("receipt_number") => {
                    // Concurrent post took our sequence number; retry
                    // the whole transaction with a fresh count
                    warn!(attempt, "Receipt number collision, retrying");
                    drop(tx);
                }
                Err(e) => {
                    drop(tx);
                    return Err(e);
                }
            }
        }

        Err(CoreError::ReceiptAllocation { attempts }.into())
    }

    /// The body of one posting attempt.
    async fn post_sale_tx(
        &self,
        conn: &mut SqliteConnection,
        request: &SaleRequest,
    ) -> EngineResult<SaleReceipt> {
        let now = Utc::now();

        // ---- 1. Validate every line, collecting all violations --------------
        let mut errors: Vec<LineError> = Vec::new();
        let mut priced: Vec<PricedLine> = Vec::with_capacity(request.lines.len());

        for (line_no, line) in request.lines.iter().enumerate() {
            if line.quantity <= 0 || line.quantity > MAX_LINE_QUANTITY {
                errors.push(LineError::NonPositiveQuantity {
                    line: line_no,
                    quantity: line.quantity,
                });
                continue;
            }

            if let Some(bps) = line.tax_rate_override_bps {
                if bps > 10_000 {
                    errors.push(LineError::InvalidTaxRate { line: line_no, bps });
                    continue;
                }
            }

            let product = match ProductRepository::get_tx(conn, &line.product_id).await? {
                Some(p) => p,
                None => {
                    errors.push(LineError::ProductNotFound {
                        line: line_no,
                        product_id: line.product_id.clone(),
                    });
                    continue;
                }
            };

            if !product.is_active {
                errors.push(LineError::ProductInactive {
                    line: line_no,
                    product_id: product.id,
                });
                continue;
            }

            if !product.can_sell(line.quantity) {
                errors.push(LineError::InsufficientStock {
                    line: line_no,
                    product_id: product.id,
                    requested: line.quantity,
                    available: product.stock,
                });
                continue;
            }

            let unit_price = line.unit_price_override_cents.unwrap_or(product.price_cents);
            let tax_rate = line
                .tax_rate_override_bps
                .map(TaxRate::from_bps)
                .unwrap_or_else(|| product.tax_rate());

            priced.push(PricedLine::price(
                product.id.clone(),
                product.name.clone(),
                product.barcode.clone(),
                unit_price,
                product.cost_cents,
                line.quantity,
                line.discount_cents,
                tax_rate,
            ));
        }

        if !errors.is_empty() {
            return Err(CoreError::InvalidLines { errors }.into());
        }

        // ---- 2. Totals and tendering ----------------------------------------
        let totals = compute_totals(&priced, request.discount_cents);

        let change_cents = match (request.payment_method, request.cash_received_cents) {
            (PaymentMethod::Cash, Some(received)) => {
                Some(cash_change(totals.total_cents, received))
            }
            _ => None,
        };

        // ---- 3. Receipt number ----------------------------------------------
        let prefix = receipt_prefix(now.date_naive());
        let seq = SaleRepository::count_receipts_with_prefix_tx(conn, &prefix).await? + 1;
        let receipt_number = tally_core::sale::format_receipt_number(now.date_naive(), seq);

        debug!(receipt = %receipt_number, lines = priced.len(), "Allocated receipt number");

        // ---- 4. Stock decrements --------------------------------------------
        for line in &priced {
            let decremented =
                ProductRepository::try_decrement_stock_tx(conn, &line.product_id, line.quantity)
                    .await?;
            if !decremented {
                // A concurrent sale consumed the cover between our
                // validation read and this write
                let available = ProductRepository::get_tx(conn, &line.product_id)
                    .await?
                    .map(|p| p.stock)
                    .unwrap_or(0);
                return Err(CoreError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available,
                }
                .into());
            }
        }

        // ---- 5. Persist sale + items ----------------------------------------
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            receipt_number,
            customer_id: request.customer_id.clone(),
            user_id: request.user_id.clone(),
            sale_date: now,
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            discount_cents: totals.discount_cents,
            total_cents: totals.total_cents,
            payment_method: request.payment_method,
            cash_received_cents: request.cash_received_cents,
            change_cents,
            status: SaleStatus::Completed,
            notes: request.notes.clone(),
            is_refunded: false,
            refund_amount_cents: 0,
            refund_reason: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
            sync: SyncState::pending(),
        };
        SaleRepository::insert_sale_tx(conn, &sale).await?;

        let mut items = Vec::with_capacity(priced.len());
        for line in priced {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id,
                product_name: line.product_name,
                product_barcode: line.product_barcode,
                unit_price_cents: line.unit_price_cents,
                unit_cost_cents: line.unit_cost_cents,
                quantity: line.quantity,
                discount_cents: line.discount_cents,
                tax_cents: line.tax_cents,
                line_total_cents: line.line_total_cents,
                is_refunded: false,
                refunded_quantity: 0,
                refund_reason: None,
                created_at: now,
                updated_at: now,
                sync: SyncState::pending(),
            };
            SaleRepository::insert_item_tx(conn, &item).await?;
            items.push(item);
        }

        // ---- 6. Customer stats + loyalty ------------------------------------
        if let Some(customer_id) = &request.customer_id {
            let points = self.loyalty_accrual(totals.total_cents);
            let recorded =
                CustomerRepository::record_sale_tx(conn, customer_id, totals.total_cents, points, now)
                    .await?;
            if !recorded {
                return Err(CoreError::CustomerNotFound(customer_id.clone()).into());
            }
        }

        Ok(SaleReceipt { sale, items })
    }

    /// Loads a posted sale with its items.
    pub async fn get_receipt(&self, sale_id: &str) -> EngineResult<SaleReceipt> {
        let sale = self
            .db()
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = self.db().sales().items_for_sale(sale_id).await?;
        Ok(SaleReceipt { sale, items })
    }
}

// =============================================================================
// Reversal
// =============================================================================

impl Engine {
    /// Cancels a completed sale as if it never happened: restores the
    /// full original quantity of every line (prior partial refunds
    /// already restored their share via `partial_refund`, so a sale is
    /// only cancellable while `Completed`) and stamps it `Cancelled`.
    pub async fn cancel_sale(&self, sale_id: &str, reason: Option<&str>) -> EngineResult<Sale> {
        let mut tx = self.db().begin().await?;

        let sale = SaleRepository::get_tx(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        if sale.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: sale.status,
            }
            .into());
        }

        let items = SaleRepository::items_tx(&mut tx, sale_id).await?;
        for item in &items {
            ProductRepository::restore_stock_tx(&mut tx, &item.product_id, item.quantity).await?;
        }

        SaleRepository::mark_cancelled_tx(&mut tx, sale_id, reason).await?;
        let cancelled = SaleRepository::get_tx(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(sale_id = %sale_id, "Sale cancelled");
        self.emit(ChangeEvent::SaleCancelled {
            sale_id: sale_id.to_string(),
        });
        for item in &items {
            self.emit(ChangeEvent::StockChanged {
                product_id: item.product_id.clone(),
            });
        }

        Ok(cancelled)
    }

    /// Refunds everything that remains unrefunded on a completed sale:
    /// restores remaining stock per line, marks every line exhausted,
    /// accrues the refund amount and stamps the sale `Refunded`.
    pub async fn refund_sale(&self, sale_id: &str, reason: Option<&str>) -> EngineResult<Sale> {
        let mut tx = self.db().begin().await?;

        let sale = SaleRepository::get_tx(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        if sale.status != SaleStatus::Completed || sale.is_refunded {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: sale.status,
            }
            .into());
        }

        let items = SaleRepository::items_tx(&mut tx, sale_id).await?;
        let now = Utc::now();
        let mut refund_delta = 0i64;

        for item in &items {
            let remaining = item.refundable_quantity();
            if remaining > 0 {
                ProductRepository::restore_stock_tx(&mut tx, &item.product_id, remaining).await?;
                refund_delta += refund_delta_cents(
                    item.line_total_cents,
                    item.quantity,
                    item.refunded_quantity,
                    remaining,
                );
            }
            SaleRepository::update_item_refund_tx(&mut tx, &item.id, item.quantity, true, reason)
                .await?;
        }

        SaleRepository::apply_sale_refund_tx(
            &mut tx,
            sale_id,
            SaleStatus::Refunded,
            true,
            refund_delta,
            reason,
            Some(now),
        )
        .await?;
        let refunded = SaleRepository::get_tx(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(sale_id = %sale_id, refund_cents = refund_delta, "Sale refunded");
        self.emit(ChangeEvent::SaleRefunded {
            sale_id: sale_id.to_string(),
        });
        for item in &items {
            if item.refundable_quantity() > 0 {
                self.emit(ChangeEvent::StockChanged {
                    product_id: item.product_id.clone(),
                });
            }
        }

        Ok(refunded)
    }

    /// Refunds specific quantities of specific lines. The whole batch is
    /// validated first; any violation rejects the batch with no effect.
    /// The sale flips to `Refunded` only when every line is exhausted;
    /// until then it stays `Completed` and the refund amount accumulates.
    pub async fn partial_refund(
        &self,
        sale_id: &str,
        refunds: &[RefundLine],
        reason: Option<&str>,
    ) -> EngineResult<Sale> {
        if refunds.is_empty() {
            return Err(tally_core::ValidationError::Required {
                field: "refunds".to_string(),
            }
            .into());
        }

        let mut tx = self.db().begin().await?;

        let sale = SaleRepository::get_tx(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        if sale.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: sale.status,
            }
            .into());
        }

        let items = SaleRepository::items_tx(&mut tx, sale_id).await?;

        // Merge duplicate entries for the same line, then validate the
        // whole batch before any write
        let mut requested: Vec<(usize, i64)> = Vec::new();
        for refund in refunds {
            let idx = items
                .iter()
                .position(|i| i.id == refund.sale_item_id)
                .ok_or_else(|| CoreError::SaleItemNotFound(refund.sale_item_id.clone()))?;

            if refund.quantity <= 0 {
                return Err(CoreError::RefundExceedsQuantity {
                    sale_item_id: refund.sale_item_id.clone(),
                    requested: refund.quantity,
                    refundable: items[idx].refundable_quantity(),
                }
                .into());
            }

            match requested.iter_mut().find(|(i, _)| *i == idx) {
                Some((_, qty)) => *qty += refund.quantity,
                None => requested.push((idx, refund.quantity)),
            }
        }

        for (idx, qty) in &requested {
            let refundable = items[*idx].refundable_quantity();
            if *qty > refundable {
                return Err(CoreError::RefundExceedsQuantity {
                    sale_item_id: items[*idx].id.clone(),
                    requested: *qty,
                    refundable,
                }
                .into());
            }
        }

        // Apply: stock restore + per-line bookkeeping
        let mut refund_delta = 0i64;
        let mut new_refunded: Vec<i64> = items.iter().map(|i| i.refunded_quantity).collect();

        for (idx, qty) in &requested {
            let item = &items[*idx];
            ProductRepository::restore_stock_tx(&mut tx, &item.product_id, *qty).await?;

            refund_delta +=
                refund_delta_cents(item.line_total_cents, item.quantity, item.refunded_quantity, *qty);

            new_refunded[*idx] = item.refunded_quantity + qty;
            let exhausted = new_refunded[*idx] == item.quantity;
            SaleRepository::update_item_refund_tx(
                &mut tx,
                &item.id,
                new_refunded[*idx],
                exhausted,
                reason,
            )
            .await?;
        }

        let all_exhausted = items
            .iter()
            .zip(&new_refunded)
            .all(|(item, refunded)| *refunded == item.quantity);

        let (status, is_refunded, refunded_at) = if all_exhausted {
            (SaleStatus::Refunded, true, Some(Utc::now()))
        } else {
            (SaleStatus::Completed, false, None)
        };

        SaleRepository::apply_sale_refund_tx(
            &mut tx, sale_id, status, is_refunded, refund_delta, reason, refunded_at,
        )
        .await?;
        let updated = SaleRepository::get_tx(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        tx.commit().await.map_err(tally_db::DbError::from)?;

        info!(
            sale_id = %sale_id,
            refund_cents = refund_delta,
            fully_refunded = all_exhausted,
            "Partial refund applied"
        );
        self.emit(ChangeEvent::SaleRefunded {
            sale_id: sale_id.to_string(),
        });
        for (idx, _) in &requested {
            self.emit(ChangeEvent::StockChanged {
                product_id: items[*idx].product_id.clone(),
            });
        }

        Ok(updated)
    }
}

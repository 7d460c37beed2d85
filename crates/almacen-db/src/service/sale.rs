//! # Sale Transaction Processor
//!
//! Commits multi-line sales atomically against the stock ledger, and voids
//! them.
//!
//! ## Commit Protocol
//! ```text
//! validate input
//! compute totals (pure, before any I/O)
//! BEGIN
//!   reserve each line, sorted by stock_entry_id
//!   insert sale record (status = completed)
//!   insert lines in request order
//! COMMIT
//! ```
//! Reservations come first so the transaction is a writer from its opening
//! statement; a concurrent commit queues behind the busy timeout instead of
//! failing a snapshot upgrade. Any line failure rolls the whole transaction
//! back, which undoes every reservation made before it.
//!
//! Lines are reserved in `stock_entry_id` order but persisted in request
//! order: the sort exists for lock discipline, not for the audit trail.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, LedgerResult};
use crate::pool::Database;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockRepository;
use crate::service::with_conflict_retry;
use almacen_core::sale::{compute_totals, line_total, SaleTotals};
use almacen_core::validation::validate_sale_input;
use almacen_core::{
    CoreError, CreateSaleInput, Sale, SaleLine, SaleLineInput, SaleStatus, SaleWithLines,
};

/// Transactional service for committing and voiding sales.
#[derive(Debug, Clone)]
pub struct SaleProcessor {
    db: Database,
}

impl SaleProcessor {
    /// Creates a new SaleProcessor.
    pub fn new(db: Database) -> Self {
        SaleProcessor { db }
    }

    /// Commits a sale: reserves stock for every line and persists the sale
    /// with its lines, all in one transaction.
    ///
    /// Returns the persisted sale; totals are computed here and stored, so
    /// the caller's `discount_cents` may come back clamped.
    pub async fn commit_sale(&self, input: CreateSaleInput) -> LedgerResult<SaleWithLines> {
        validate_sale_input(&input)?;
        let totals = compute_totals(&input.lines, input.discount_cents)?;

        let input = &input;
        let result = with_conflict_retry("commit_sale", || self.try_commit(input, totals)).await?;

        info!(
            sale = %result.sale.id,
            lines = result.lines.len(),
            total = result.sale.total_cents,
            "sale committed"
        );
        Ok(result)
    }

    async fn try_commit(
        &self,
        input: &CreateSaleInput,
        totals: SaleTotals,
    ) -> LedgerResult<SaleWithLines> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        // Deterministic lock order: sorted by entry id, original index kept
        // so error reports point at the caller's line.
        let mut ordered: Vec<(usize, &SaleLineInput)> = input.lines.iter().enumerate().collect();
        ordered.sort_by(|a, b| a.1.stock_entry_id.cmp(&b.1.stock_entry_id));

        for (idx, line) in &ordered {
            StockRepository::reserve_in_tx(&mut tx, &line.stock_entry_id, line.quantity, Some(*idx))
                .await?;
        }

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            client_id: input.client_id.clone(),
            user_id: input.user_id.clone(),
            payment_method_id: input.payment_method_id.clone(),
            status: SaleStatus::Completed,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            sold_at: input.sold_at.unwrap_or(now),
            created_at: now,
        };
        SaleRepository::insert_in_tx(&mut tx, &sale).await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line_input in &input.lines {
            let line = SaleLine {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                stock_entry_id: line_input.stock_entry_id.clone(),
                quantity: line_input.quantity,
                unit_price_cents: line_input.unit_price_cents,
                line_total_cents: line_total(line_input).map_err(CoreError::from)?.cents(),
                created_at: now,
            };
            SaleRepository::insert_line_in_tx(&mut tx, &line).await?;
            lines.push(line);
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(SaleWithLines { sale, lines })
    }

    /// Voids a completed sale: flips its status and returns every line's
    /// quantity to stock, in one transaction.
    ///
    /// Lines and totals stay untouched; the sale remains in the history with
    /// status `voided`. Voiding an already voided sale is rejected with
    /// `InvalidSaleStatus`.
    pub async fn void_sale(&self, sale_id: &str) -> LedgerResult<Sale> {
        let sale = with_conflict_retry("void_sale", || self.try_void(sale_id)).await?;
        info!(sale = %sale.id, "sale voided, stock released");
        Ok(sale)
    }

    async fn try_void(&self, sale_id: &str) -> LedgerResult<Sale> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let changed = SaleRepository::void_in_tx(&mut tx, sale_id).await?;
        if changed == 0 {
            // Guard failed: either the sale does not exist or it is not
            // in a voidable status. Re-read to report which.
            return match SaleRepository::get_in_tx(&mut tx, sale_id).await? {
                None => Err(CoreError::SaleNotFound(sale_id.to_string()).into()),
                Some(sale) => Err(CoreError::InvalidSaleStatus {
                    sale_id: sale_id.to_string(),
                    current_status: sale.status.to_string(),
                    operation: "void".to_string(),
                }
                .into()),
            };
        }

        let mut lines = SaleRepository::lines_in_tx(&mut tx, sale_id).await?;
        lines.sort_by(|a, b| a.stock_entry_id.cmp(&b.stock_entry_id));
        for line in &lines {
            StockRepository::release_in_tx(&mut tx, &line.stock_entry_id, line.quantity).await?;
        }

        let sale = SaleRepository::get_in_tx(&mut tx, sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(sale)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

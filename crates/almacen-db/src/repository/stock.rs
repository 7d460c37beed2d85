//! # Stock Repository
//!
//! The stock ledger: per-variant quantity counters and the atomic
//! reserve/release primitives every transactional service builds on.
//!
//! ## The Reserve Primitive
//! ```text
//! UPDATE stock_entries
//! SET    quantity_on_hand = quantity_on_hand - :qty
//! WHERE  id = :entry AND quantity_on_hand >= :qty
//! ```
//! The guard and the decrement are one statement, so the check and the
//! mutation cannot be separated by another writer: mutations to a given
//! entry are totally ordered by SQLite's single-writer discipline, and two
//! concurrent reservations can never both succeed past the available
//! quantity. Zero rows affected means the guard failed; a follow-up read
//! distinguishes "entry missing" from "insufficient stock".
//!
//! ## Tx-Scoped vs Pool-Scoped
//! `reserve_in_tx`/`release_in_tx` take the caller's open transaction, so a
//! failed line aborts the whole commit and the rollback is the compensating
//! release. Pool-scoped methods (create, adjust, reads) own their access.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, LedgerResult};
use almacen_core::validation::validate_stock_input;
use almacen_core::{CoreError, CreateStockInput, Page, StockAdjustment, StockEntry, VariantKey};

const STOCK_COLUMNS: &str = "id, product_id, color_id, size_id, quantity_on_hand, \
     purchase_price_cents, sale_price_cents, created_at, updated_at";

/// Repository for stock ledger operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    // =========================================================================
    // Tx-scoped primitives (used inside service transactions)
    // =========================================================================

    /// Atomically reserves `quantity` units of an entry inside the caller's
    /// transaction.
    ///
    /// Fails with `StockEntryNotFound` for unknown ids and
    /// `InsufficientStock` (naming the entry, the deficit and the offending
    /// line index) when the guard rejects the decrement. Reserving never
    /// creates entries.
    pub async fn reserve_in_tx(
        conn: &mut SqliteConnection,
        stock_entry_id: &str,
        quantity: i64,
        line: Option<usize>,
    ) -> LedgerResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE stock_entries \
             SET quantity_on_hand = quantity_on_hand - ?1, updated_at = ?2 \
             WHERE id = ?3 AND quantity_on_hand >= ?1",
        )
        .bind(quantity)
        .bind(now)
        .bind(stock_entry_id)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT quantity_on_hand FROM stock_entries WHERE id = ?1")
                    .bind(stock_entry_id)
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(DbError::from)?;

            return Err(match available {
                None => CoreError::StockEntryNotFound(stock_entry_id.to_string()).into(),
                Some(available) => CoreError::InsufficientStock {
                    stock_entry_id: stock_entry_id.to_string(),
                    available,
                    requested: quantity,
                    line,
                }
                .into(),
            });
        }

        debug!(entry = %stock_entry_id, quantity, "reserved stock");
        Ok(())
    }

    /// Atomically returns `quantity` units to an entry inside the caller's
    /// transaction. No upper bound: physical stock can always grow.
    pub async fn release_in_tx(
        conn: &mut SqliteConnection,
        stock_entry_id: &str,
        quantity: i64,
    ) -> LedgerResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE stock_entries \
             SET quantity_on_hand = quantity_on_hand + ?1, updated_at = ?2 \
             WHERE id = ?3",
        )
        .bind(quantity)
        .bind(now)
        .bind(stock_entry_id)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::StockEntryNotFound(stock_entry_id.to_string()).into());
        }

        debug!(entry = %stock_entry_id, quantity, "released stock");
        Ok(())
    }

    /// Looks up an entry by variant key inside the caller's transaction.
    ///
    /// `IS` comparison so a bound NULL matches a NULL column.
    pub async fn find_by_key_in_tx(
        conn: &mut SqliteConnection,
        key: &VariantKey,
    ) -> DbResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock_entries \
             WHERE product_id = ?1 AND color_id IS ?2 AND size_id IS ?3"
        ))
        .bind(&key.product_id)
        .bind(&key.color_id)
        .bind(&key.size_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// Creates a fresh entry inside the caller's transaction. Used by
    /// purchase intake for unseen variants.
    pub async fn create_in_tx(
        conn: &mut SqliteConnection,
        key: &VariantKey,
        quantity: i64,
        purchase_price_cents: i64,
        sale_price_cents: i64,
    ) -> DbResult<StockEntry> {
        let now = Utc::now();
        let entry = StockEntry {
            id: Uuid::new_v4().to_string(),
            product_id: key.product_id.clone(),
            color_id: key.color_id.clone(),
            size_id: key.size_id.clone(),
            quantity_on_hand: quantity,
            purchase_price_cents,
            sale_price_cents,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO stock_entries (\
                 id, product_id, color_id, size_id, quantity_on_hand, \
                 purchase_price_cents, sale_price_cents, created_at, updated_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(&entry.color_id)
        .bind(&entry.size_id)
        .bind(entry.quantity_on_hand)
        .bind(entry.purchase_price_cents)
        .bind(entry.sale_price_cents)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *conn)
        .await?;

        debug!(entry = %entry.id, key = %key, quantity, "created stock entry");
        Ok(entry)
    }

    /// Increments an existing entry and records the new unit cost, inside
    /// the caller's transaction. Purchase intake path for known variants.
    pub async fn restock_in_tx(
        conn: &mut SqliteConnection,
        stock_entry_id: &str,
        quantity: i64,
        unit_cost_cents: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE stock_entries \
             SET quantity_on_hand = quantity_on_hand + ?1, \
                 purchase_price_cents = ?2, \
                 updated_at = ?3 \
             WHERE id = ?4",
        )
        .bind(quantity)
        .bind(unit_cost_cents)
        .bind(now)
        .bind(stock_entry_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockEntry", stock_entry_id));
        }

        Ok(())
    }

    // =========================================================================
    // Pool-scoped operations
    // =========================================================================

    /// Creates a stock entry directly (the create-stock boundary operation).
    ///
    /// Purchase intake is the only other place entries come from.
    pub async fn create_entry(&self, input: &CreateStockInput) -> LedgerResult<StockEntry> {
        validate_stock_input(input)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let entry = Self::create_in_tx(
            &mut tx,
            &input.key(),
            input.quantity,
            input.purchase_price_cents,
            input.sale_price_cents,
        )
        .await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(entry = %entry.id, key = %entry.key(), quantity = entry.quantity_on_hand, "stock entry created");
        Ok(entry)
    }

    /// Gets an entry by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock_entries WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Gets an entry by variant key.
    pub async fn get_by_key(&self, key: &VariantKey) -> DbResult<Option<StockEntry>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_key_in_tx(&mut conn, key).await
    }

    /// Current stock view, paginated, ordered by variant key.
    pub async fn list(&self, page: u32, limit: u32) -> DbResult<Page<StockEntry>> {
        let page = page.max(1);
        let limit = limit.clamp(1, almacen_core::MAX_PAGE_LIMIT);
        // Widened before multiplying; a huge page is an empty page, not an
        // overflow.
        let offset = (page as u64 - 1) * limit as u64;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_entries")
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, StockEntry>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock_entries \
             ORDER BY product_id, color_id, size_id \
             LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Administrative correction of an entry's quantity.
    ///
    /// The delta is recorded in the append-only `stock_adjustments` audit
    /// table in the same transaction. A negative delta larger than the
    /// on-hand quantity is rejected: corrections obey the non-negativity
    /// invariant like everything else.
    pub async fn adjust(
        &self,
        stock_entry_id: &str,
        delta: i64,
        reason: Option<&str>,
    ) -> LedgerResult<StockEntry> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = sqlx::query(
            "UPDATE stock_entries \
             SET quantity_on_hand = quantity_on_hand + ?1, updated_at = ?2 \
             WHERE id = ?3 AND quantity_on_hand + ?1 >= 0",
        )
        .bind(delta)
        .bind(now)
        .bind(stock_entry_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT quantity_on_hand FROM stock_entries WHERE id = ?1")
                    .bind(stock_entry_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(DbError::from)?;

            return Err(match available {
                None => CoreError::StockEntryNotFound(stock_entry_id.to_string()).into(),
                Some(available) => CoreError::InsufficientStock {
                    stock_entry_id: stock_entry_id.to_string(),
                    available,
                    requested: -delta,
                    line: None,
                }
                .into(),
            });
        }

        sqlx::query(
            "INSERT INTO stock_adjustments (id, stock_entry_id, delta, reason, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(stock_entry_id)
        .bind(delta)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let entry = sqlx::query_as::<_, StockEntry>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock_entries WHERE id = ?1"
        ))
        .bind(stock_entry_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(entry = %stock_entry_id, delta, "stock adjusted");
        Ok(entry)
    }

    /// Adjustment audit trail for an entry, oldest first.
    pub async fn adjustments(&self, stock_entry_id: &str) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query_as::<_, StockAdjustment>(
            "SELECT id, stock_entry_id, delta, reason, created_at \
             FROM stock_adjustments WHERE stock_entry_id = ?1 ORDER BY created_at, id",
        )
        .bind(stock_entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

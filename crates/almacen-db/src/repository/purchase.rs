//! # Purchase Repository
//!
//! Persistence for purchase transactions and their lines. Purchases are
//! append-only records of supplier intake; the stock mutations they imply
//! are handled by the purchase processor through the stock repository.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use almacen_core::{Purchase, PurchaseLine};

const PURCHASE_COLUMNS: &str = "id, supplier_id, user_id, purchased_at, created_at";

/// Repository for purchase database operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Inserts the purchase record inside the caller's transaction.
    pub async fn insert_in_tx(conn: &mut SqliteConnection, purchase: &Purchase) -> DbResult<()> {
        debug!(purchase = %purchase.id, supplier = %purchase.supplier_id, "inserting purchase");

        sqlx::query(
            "INSERT INTO purchases (id, supplier_id, user_id, purchased_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&purchase.id)
        .bind(&purchase.supplier_id)
        .bind(&purchase.user_id)
        .bind(purchase.purchased_at)
        .bind(purchase.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one purchase line inside the caller's transaction.
    pub async fn insert_line_in_tx(
        conn: &mut SqliteConnection,
        line: &PurchaseLine,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO purchase_lines (\
                 id, purchase_id, stock_entry_id, quantity, unit_cost_cents, created_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&line.id)
        .bind(&line.purchase_id)
        .bind(&line.stock_entry_id)
        .bind(line.quantity)
        .bind(line.unit_cost_cents)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a purchase by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(purchase)
    }

    /// Gets all lines of a purchase.
    pub async fn get_lines(&self, purchase_id: &str) -> DbResult<Vec<PurchaseLine>> {
        let lines = sqlx::query_as::<_, PurchaseLine>(
            "SELECT id, purchase_id, stock_entry_id, quantity, unit_cost_cents, created_at \
             FROM purchase_lines WHERE purchase_id = ?1 ORDER BY created_at, id",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

//! # Layaway Repository
//!
//! Persistence for layaway plans, their reserved items and the append-only
//! abono ledger.
//!
//! ## Abono Ledger
//! Abonos are only ever inserted. There is no update or delete statement in
//! this file for them, deliberately: replaying the rows in order from the
//! plan's initial debt must reproduce the stored remaining debt, and
//! `abono_total` exists so tests (and audits) can check exactly that.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use almacen_core::{Abono, LayawayItem, LayawayPlan, PlanState};

const PLAN_COLUMNS: &str = "id, client_id, user_id, state, initial_debt_cents, \
     remaining_debt_cents, created_at, updated_at";

/// Repository for layaway database operations.
#[derive(Debug, Clone)]
pub struct LayawayRepository {
    pool: SqlitePool,
}

impl LayawayRepository {
    /// Creates a new LayawayRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LayawayRepository { pool }
    }

    // =========================================================================
    // Tx-scoped persistence (used by the layaway engine)
    // =========================================================================

    /// Inserts the plan record inside the caller's transaction.
    pub async fn insert_in_tx(conn: &mut SqliteConnection, plan: &LayawayPlan) -> DbResult<()> {
        debug!(plan = %plan.id, debt = plan.initial_debt_cents, "inserting layaway plan");

        sqlx::query(
            "INSERT INTO layaway_plans (\
                 id, client_id, user_id, state, initial_debt_cents, \
                 remaining_debt_cents, created_at, updated_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&plan.id)
        .bind(&plan.client_id)
        .bind(&plan.user_id)
        .bind(plan.state)
        .bind(plan.initial_debt_cents)
        .bind(plan.remaining_debt_cents)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one reserved item inside the caller's transaction.
    pub async fn insert_item_in_tx(conn: &mut SqliteConnection, item: &LayawayItem) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO layaway_items (id, plan_id, stock_entry_id, quantity, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&item.id)
        .bind(&item.plan_id)
        .bind(&item.stock_entry_id)
        .bind(item.quantity)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Appends one abono inside the caller's transaction.
    pub async fn insert_abono_in_tx(conn: &mut SqliteConnection, abono: &Abono) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO abonos (id, plan_id, user_id, amount_cents, memo, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&abono.id)
        .bind(&abono.plan_id)
        .bind(&abono.user_id)
        .bind(abono.amount_cents)
        .bind(&abono.memo)
        .bind(abono.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Updates a plan's debt position and state inside the caller's
    /// transaction.
    ///
    /// Guarded on `state = 'active'`: a plan that was concurrently completed
    /// or cancelled yields zero rows and the engine re-reads to report the
    /// correct `InvalidPlanState`.
    pub async fn update_position_in_tx(
        conn: &mut SqliteConnection,
        plan_id: &str,
        remaining_debt_cents: i64,
        state: PlanState,
    ) -> DbResult<u64> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "UPDATE layaway_plans \
             SET remaining_debt_cents = ?1, state = ?2, updated_at = ?3 \
             WHERE id = ?4 AND state = 'active'",
        )
        .bind(remaining_debt_cents)
        .bind(state)
        .bind(now)
        .bind(plan_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Fetches a plan inside the caller's transaction.
    pub async fn get_in_tx(
        conn: &mut SqliteConnection,
        plan_id: &str,
    ) -> DbResult<Option<LayawayPlan>> {
        let plan = sqlx::query_as::<_, LayawayPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM layaway_plans WHERE id = ?1"
        ))
        .bind(plan_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(plan)
    }

    /// Fetches a plan's reserved items inside the caller's transaction.
    pub async fn items_in_tx(
        conn: &mut SqliteConnection,
        plan_id: &str,
    ) -> DbResult<Vec<LayawayItem>> {
        let items = sqlx::query_as::<_, LayawayItem>(
            "SELECT id, plan_id, stock_entry_id, quantity, created_at \
             FROM layaway_items WHERE plan_id = ?1 ORDER BY stock_entry_id",
        )
        .bind(plan_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    // =========================================================================
    // Read side
    // =========================================================================

    /// Gets a plan by id.
    pub async fn get_plan(&self, plan_id: &str) -> DbResult<Option<LayawayPlan>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in_tx(&mut conn, plan_id).await
    }

    /// Gets a plan's reserved items.
    pub async fn get_items(&self, plan_id: &str) -> DbResult<Vec<LayawayItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items_in_tx(&mut conn, plan_id).await
    }

    /// Full abono history of a plan, oldest first.
    pub async fn get_abonos(&self, plan_id: &str) -> DbResult<Vec<Abono>> {
        let abonos = sqlx::query_as::<_, Abono>(
            "SELECT id, plan_id, user_id, amount_cents, memo, created_at \
             FROM abonos WHERE plan_id = ?1 ORDER BY created_at, id",
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(abonos)
    }

    /// Sum of all abonos recorded against a plan.
    pub async fn abono_total(&self, plan_id: &str) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount_cents) FROM abonos WHERE plan_id = ?1")
                .bind(plan_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0))
    }
}

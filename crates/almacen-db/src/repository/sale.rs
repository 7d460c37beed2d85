//! # Sale Repository
//!
//! Persistence for committed sales and their lines, plus the read-side
//! history query.
//!
//! Committed sales are immutable: there is no update path for lines or
//! totals. The only post-commit mutation is the status flip performed by
//! `void_in_tx`, which the sale processor pairs with a stock release in the
//! same transaction.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use almacen_core::{Page, Sale, SaleLine, SaleQuery, SaleStatus};

const SALE_COLUMNS: &str = "id, client_id, user_id, payment_method_id, status, \
     subtotal_cents, discount_cents, total_cents, sold_at, created_at";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Tx-scoped persistence (used by the sale processor)
    // =========================================================================

    /// Inserts the sale record inside the caller's transaction.
    pub async fn insert_in_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(sale = %sale.id, total = sale.total_cents, "inserting sale");

        sqlx::query(
            "INSERT INTO sales (\
                 id, client_id, user_id, payment_method_id, status, \
                 subtotal_cents, discount_cents, total_cents, sold_at, created_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&sale.id)
        .bind(&sale.client_id)
        .bind(&sale.user_id)
        .bind(&sale.payment_method_id)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.sold_at)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one sale line inside the caller's transaction.
    pub async fn insert_line_in_tx(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO sale_lines (\
                 id, sale_id, stock_entry_id, quantity, unit_price_cents, \
                 line_total_cents, created_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.stock_entry_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Flips a completed sale to voided inside the caller's transaction.
    ///
    /// Guarded on the current status so a double void is rejected, not
    /// silently absorbed. Returns the number of rows changed (0 or 1); the
    /// caller maps 0 to the right business error.
    pub async fn void_in_tx(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<u64> {
        let result = sqlx::query("UPDATE sales SET status = 'voided' WHERE id = ?1 AND status = 'completed'")
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Fetches a sale inside the caller's transaction.
    pub async fn get_in_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sale)
    }

    /// Fetches the lines of a sale inside the caller's transaction.
    pub async fn lines_in_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            "SELECT id, sale_id, stock_entry_id, quantity, unit_price_cents, \
                    line_total_cents, created_at \
             FROM sale_lines WHERE sale_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    // =========================================================================
    // Read side
    // =========================================================================

    /// Gets a sale by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in_tx(&mut conn, id).await
    }

    /// Gets all lines of a sale.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let mut conn = self.pool.acquire().await?;
        Self::lines_in_tx(&mut conn, sale_id).await
    }

    /// Sales history, filtered and paginated.
    ///
    /// Filters combine with AND; each one is optional. Results are newest
    /// first. `total` counts every row matching the filters, not just the
    /// returned page. Single-statement reads under WAL see a consistent
    /// snapshot, so a concurrently committing sale is either fully visible
    /// or not at all.
    pub async fn query(&self, query: &SaleQuery) -> DbResult<Page<Sale>> {
        debug!(?query, "querying sales history");

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales WHERE 1 = 1");
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE 1 = 1"
        ));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY sold_at DESC, id DESC LIMIT ");
        qb.push_bind(query.limit() as i64);
        qb.push(" OFFSET ");
        qb.push_bind(query.offset() as i64);

        let items = qb
            .build_query_as::<Sale>()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(Page {
            items,
            total,
            page: query.page(),
            limit: query.limit(),
        })
    }
}

/// Appends the WHERE fragments shared by the count and page queries.
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &SaleQuery) {
    if let Some(client_id) = &query.client_id {
        qb.push(" AND client_id = ");
        qb.push_bind(client_id.clone());
    }
    if let Some(user_id) = &query.user_id {
        qb.push(" AND user_id = ");
        qb.push_bind(user_id.clone());
    }
    if let Some(payment_method_id) = &query.payment_method_id {
        qb.push(" AND payment_method_id = ");
        qb.push_bind(payment_method_id.clone());
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ");
        qb.push_bind(match status {
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
        });
    }
    if let Some(from) = query.from {
        qb.push(" AND sold_at >= ");
        qb.push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND sold_at <= ");
        qb.push_bind(to);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    async fn test_db() -> Database {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_sale(
        db: &Database,
        client: Option<&str>,
        user: &str,
        status: SaleStatus,
        days_ago: i64,
    ) -> String {
        let sold_at = Utc::now() - Duration::days(days_ago);
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            client_id: client.map(str::to_string),
            user_id: user.to_string(),
            payment_method_id: "cash".to_string(),
            status,
            subtotal_cents: 10_000,
            discount_cents: 0,
            total_cents: 10_000,
            sold_at,
            created_at: sold_at,
        };

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_in_tx(&mut tx, &sale).await.unwrap();
        tx.commit().await.unwrap();
        sale.id
    }

    #[tokio::test]
    async fn test_query_filters_combine_with_and() {
        let db = test_db().await;
        seed_sale(&db, Some("c-1"), "u-1", SaleStatus::Completed, 1).await;
        seed_sale(&db, Some("c-1"), "u-2", SaleStatus::Completed, 2).await;
        seed_sale(&db, Some("c-2"), "u-1", SaleStatus::Voided, 3).await;
        seed_sale(&db, None, "u-1", SaleStatus::Completed, 4).await;

        let repo = db.sales();

        let page = repo
            .query(&SaleQuery {
                client_id: Some("c-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let page = repo
            .query(&SaleQuery {
                client_id: Some("c-1".to_string()),
                user_id: Some("u-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let page = repo
            .query(&SaleQuery {
                status: Some(SaleStatus::Voided),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].status, SaleStatus::Voided);
    }

    #[tokio::test]
    async fn test_query_date_range_is_inclusive() {
        let db = test_db().await;
        seed_sale(&db, None, "u-1", SaleStatus::Completed, 1).await;
        seed_sale(&db, None, "u-1", SaleStatus::Completed, 5).await;
        seed_sale(&db, None, "u-1", SaleStatus::Completed, 10).await;

        let page = db
            .sales()
            .query(&SaleQuery {
                from: Some(Utc::now() - Duration::days(6)),
                to: Some(Utc::now()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_query_paginates_newest_first() {
        let db = test_db().await;
        for days_ago in 1..=5 {
            seed_sale(&db, None, "u-1", SaleStatus::Completed, days_ago).await;
        }

        let repo = db.sales();
        let first = repo
            .query(&SaleQuery {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.items.len(), 2);
        assert!(first.items[0].sold_at > first.items[1].sold_at);

        let third = repo
            .query(&SaleQuery {
                page: Some(3),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(third.items.len(), 1);

        let beyond = repo
            .query(&SaleQuery {
                page: Some(4),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[tokio::test]
    async fn test_query_with_extreme_page_is_empty() {
        let db = test_db().await;
        seed_sale(&db, None, "u-1", SaleStatus::Completed, 1).await;

        let page = db
            .sales()
            .query(&SaleQuery {
                page: Some(u32::MAX),
                limit: Some(200),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_empty_history_is_an_empty_page() {
        let db = test_db().await;

        let page = db.sales().query(&SaleQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
        assert_eq!(page.page, 1);
    }
}

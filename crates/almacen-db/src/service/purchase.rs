//! # Purchase Intake Processor
//!
//! Commits supplier purchases: every line finds or creates the stock entry
//! for its variant key and increments it, plus the purchase record, all in
//! one transaction.
//!
//! ## Find-or-Create
//! Lines are identified by variant key, not entry id, because intake is how
//! unseen variants enter the system. The lookup and the create run inside
//! the same transaction, so the unique variant index can never see two
//! committed entries for one key; a race between two intakes of the same
//! new variant resolves as one winner and one UNIQUE violation that the
//! retry turns into a find hit.
//!
//! Stock mutations run in variant-key order for lock discipline; lines are
//! persisted in request order, the same split sales use.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, LedgerResult};
use crate::pool::Database;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::stock::StockRepository;
use crate::service::with_conflict_retry;
use almacen_core::validation::validate_purchase_input;
use almacen_core::{
    CreatePurchaseInput, Purchase, PurchaseLine, PurchaseLineInput, PurchaseWithLines,
};

/// Transactional service for supplier intake.
#[derive(Debug, Clone)]
pub struct PurchaseProcessor {
    db: Database,
}

impl PurchaseProcessor {
    /// Creates a new PurchaseProcessor.
    pub fn new(db: Database) -> Self {
        PurchaseProcessor { db }
    }

    /// Commits a purchase: increments (or creates) the stock entry for every
    /// line and persists the purchase with its lines, atomically.
    ///
    /// Existing entries keep their sale price and get the line's unit cost
    /// as their new purchase price; entries created here take the line's
    /// `sale_price_cents` (0 when omitted, to be priced later).
    pub async fn commit_purchase(
        &self,
        input: CreatePurchaseInput,
    ) -> LedgerResult<PurchaseWithLines> {
        validate_purchase_input(&input)?;

        let input = &input;
        let result = with_conflict_retry("commit_purchase", || self.try_commit(input)).await?;

        info!(
            purchase = %result.purchase.id,
            supplier = %result.purchase.supplier_id,
            lines = result.lines.len(),
            "purchase committed"
        );
        Ok(result)
    }

    async fn try_commit(&self, input: &CreatePurchaseInput) -> LedgerResult<PurchaseWithLines> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        // Stock mutations run in variant-key order, the same lock discipline
        // sales apply to entry ids; the original index remembers which entry
        // each line touched.
        let mut ordered: Vec<(usize, &PurchaseLineInput)> =
            input.lines.iter().enumerate().collect();
        ordered.sort_by(|a, b| a.1.key().cmp(&b.1.key()));

        let mut entry_ids = vec![String::new(); input.lines.len()];
        for (idx, line_input) in &ordered {
            let key = line_input.key();
            entry_ids[*idx] = match StockRepository::find_by_key_in_tx(&mut tx, &key).await? {
                Some(entry) => {
                    StockRepository::restock_in_tx(
                        &mut tx,
                        &entry.id,
                        line_input.quantity,
                        line_input.unit_cost_cents,
                    )
                    .await?;
                    entry.id
                }
                None => {
                    let entry = StockRepository::create_in_tx(
                        &mut tx,
                        &key,
                        line_input.quantity,
                        line_input.unit_cost_cents,
                        line_input.sale_price_cents.unwrap_or(0),
                    )
                    .await?;
                    entry.id
                }
            };
        }

        let now = Utc::now();
        let purchase = Purchase {
            id: Uuid::new_v4().to_string(),
            supplier_id: input.supplier_id.clone(),
            user_id: input.user_id.clone(),
            purchased_at: input.purchased_at.unwrap_or(now),
            created_at: now,
        };
        PurchaseRepository::insert_in_tx(&mut tx, &purchase).await?;

        // Lines are persisted and returned in request order, like sale lines.
        let mut lines = Vec::with_capacity(input.lines.len());
        for (line_input, entry_id) in input.lines.iter().zip(entry_ids) {
            let line = PurchaseLine {
                id: Uuid::new_v4().to_string(),
                purchase_id: purchase.id.clone(),
                stock_entry_id: entry_id,
                quantity: line_input.quantity,
                unit_cost_cents: line_input.unit_cost_cents,
                created_at: now,
            };
            PurchaseRepository::insert_line_in_tx(&mut tx, &line).await?;
            lines.push(line);
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(PurchaseWithLines { purchase, lines })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::pool::{Database, DbConfig};
    use almacen_core::{CoreError, CreateStockInput, VariantKey};

    async fn test_db() -> Database {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn purchase_input(lines: Vec<PurchaseLineInput>) -> CreatePurchaseInput {
        CreatePurchaseInput {
            supplier_id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            purchased_at: None,
            lines,
        }
    }

    fn variant_line(
        product: &str,
        color: Option<&str>,
        qty: i64,
        cost: i64,
        sale_price: Option<i64>,
    ) -> PurchaseLineInput {
        PurchaseLineInput {
            product_id: product.to_string(),
            color_id: color.map(str::to_string),
            size_id: None,
            quantity: qty,
            unit_cost_cents: cost,
            sale_price_cents: sale_price,
        }
    }

    #[tokio::test]
    async fn test_intake_creates_entry_for_unseen_variant() {
        let db = test_db().await;

        let result = db
            .purchase_intake()
            .commit_purchase(purchase_input(vec![variant_line(
                "p1",
                Some("red"),
                10,
                1_500,
                Some(2_990),
            )]))
            .await
            .unwrap();
        assert_eq!(result.lines.len(), 1);

        let key = VariantKey {
            product_id: "p1".to_string(),
            color_id: Some("red".to_string()),
            size_id: None,
        };
        let entry = db.stock().get_by_key(&key).await.unwrap().unwrap();
        assert_eq!(entry.id, result.lines[0].stock_entry_id);
        assert_eq!(entry.quantity_on_hand, 10);
        assert_eq!(entry.purchase_price_cents, 1_500);
        assert_eq!(entry.sale_price_cents, 2_990);
    }

    #[tokio::test]
    async fn test_intake_increments_existing_entry() {
        let db = test_db().await;
        let existing = db
            .stock()
            .create_entry(&CreateStockInput {
                product_id: "p1".to_string(),
                color_id: None,
                size_id: None,
                purchase_price_cents: 1_000,
                sale_price_cents: 2_500,
                quantity: 4,
            })
            .await
            .unwrap();

        let result = db
            .purchase_intake()
            .commit_purchase(purchase_input(vec![variant_line(
                "p1",
                None,
                6,
                1_200,
                Some(9_999),
            )]))
            .await
            .unwrap();
        assert_eq!(result.lines[0].stock_entry_id, existing.id);

        let entry = db.stock().get_by_id(&existing.id).await.unwrap().unwrap();
        assert_eq!(entry.quantity_on_hand, 10);
        // New unit cost is recorded; sale price is untouched for existing entries.
        assert_eq!(entry.purchase_price_cents, 1_200);
        assert_eq!(entry.sale_price_cents, 2_500);
    }

    #[tokio::test]
    async fn test_distinct_variants_are_distinct_entries() {
        let db = test_db().await;

        db.purchase_intake()
            .commit_purchase(purchase_input(vec![
                variant_line("p1", Some("red"), 3, 1_000, None),
                variant_line("p1", Some("blue"), 5, 1_000, None),
                variant_line("p1", None, 7, 1_000, None),
            ]))
            .await
            .unwrap();

        let red = VariantKey {
            product_id: "p1".to_string(),
            color_id: Some("red".to_string()),
            size_id: None,
        };
        let bare = VariantKey::product("p1");
        assert_eq!(
            db.stock().get_by_key(&red).await.unwrap().unwrap().quantity_on_hand,
            3
        );
        assert_eq!(
            db.stock().get_by_key(&bare).await.unwrap().unwrap().quantity_on_hand,
            7
        );

        let page = db.stock().list(1, 50).await.unwrap();
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_lines_keep_request_order() {
        let db = test_db().await;

        // Request order is the reverse of variant-key order; the returned
        // lines must follow the request, not the lock order.
        let result = db
            .purchase_intake()
            .commit_purchase(purchase_input(vec![
                variant_line("z-product", None, 2, 1_000, None),
                variant_line("a-product", None, 3, 1_000, None),
            ]))
            .await
            .unwrap();

        let z = db
            .stock()
            .get_by_key(&VariantKey::product("z-product"))
            .await
            .unwrap()
            .unwrap();
        let a = db
            .stock()
            .get_by_key(&VariantKey::product("a-product"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.lines[0].stock_entry_id, z.id);
        assert_eq!(result.lines[0].quantity, 2);
        assert_eq!(result.lines[1].stock_entry_id, a.id);
        assert_eq!(result.lines[1].quantity, 3);
    }

    #[tokio::test]
    async fn test_repeated_intake_accumulates() {
        let db = test_db().await;
        let intake = db.purchase_intake();

        for _ in 0..3 {
            intake
                .commit_purchase(purchase_input(vec![variant_line("p1", None, 5, 800, None)]))
                .await
                .unwrap();
        }

        let entry = db
            .stock()
            .get_by_key(&VariantKey::product("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.quantity_on_hand, 15);
    }

    #[tokio::test]
    async fn test_invalid_cost_rejected_before_any_io() {
        let db = test_db().await;

        let err = db
            .purchase_intake()
            .commit_purchase(purchase_input(vec![variant_line("p1", None, 5, 0, None)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));

        assert!(db
            .stock()
            .get_by_key(&VariantKey::product("p1"))
            .await
            .unwrap()
            .is_none());
    }
}

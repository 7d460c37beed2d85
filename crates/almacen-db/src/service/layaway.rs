//! # Layaway Engine
//!
//! Plan creation, installment payments (abonos) and cancellation for
//! layaway (plan separe) plans.
//!
//! ## Where the Rules Live
//! Every debt decision is made by the pure functions in
//! `almacen_core::layaway`; this service supplies the transaction around
//! them. The `update_position_in_tx` guard (`state = 'active'`) is the
//! persistence-side echo of the same state machine: a plan that went
//! terminal between the read and the write yields zero rows and the
//! operation reports `InvalidPlanState` instead of silently clobbering it.
//!
//! Stock is reserved when the plan is created and released only on
//! cancellation. Completion hands the reserved items to the client, so
//! nothing returns to the shelf.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, LedgerResult};
use crate::pool::Database;
use crate::repository::layaway::LayawayRepository;
use crate::repository::stock::StockRepository;
use crate::service::with_conflict_retry;
use almacen_core::layaway::{apply_abono, ensure_cancellable, initial_position};
use almacen_core::validation::{validate_abono_input, validate_plan_input};
use almacen_core::{
    Abono, AbonoInput, CoreError, CreatePlanInput, LayawayItem, LayawayPlan, Money,
    PlanItemInput, PlanState, PlanWithDetails,
};

/// Transactional service for layaway plans.
#[derive(Debug, Clone)]
pub struct LayawayEngine {
    db: Database,
}

impl LayawayEngine {
    /// Creates a new LayawayEngine.
    pub fn new(db: Database) -> Self {
        LayawayEngine { db }
    }

    /// Creates a plan: reserves stock for every item, persists the plan and
    /// items, and records the optional creation-time payment as the plan's
    /// first abono, all in one transaction.
    ///
    /// A payment covering the whole debt births the plan `Completed`; the
    /// items stay reserved for pickup either way.
    pub async fn create_plan(&self, input: CreatePlanInput) -> LedgerResult<PlanWithDetails> {
        validate_plan_input(&input)?;

        let input = &input;
        let result = with_conflict_retry("create_plan", || self.try_create(input)).await?;

        info!(
            plan = %result.plan.id,
            state = %result.plan.state,
            remaining = result.plan.remaining_debt_cents,
            items = result.items.len(),
            "layaway plan created"
        );
        Ok(result)
    }

    async fn try_create(&self, input: &CreatePlanInput) -> LedgerResult<PlanWithDetails> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let mut ordered: Vec<(usize, &PlanItemInput)> = input.items.iter().enumerate().collect();
        ordered.sort_by(|a, b| a.1.stock_entry_id.cmp(&b.1.stock_entry_id));

        for (idx, item) in &ordered {
            StockRepository::reserve_in_tx(&mut tx, &item.stock_entry_id, item.quantity, Some(*idx))
                .await?;
        }

        let initial_payment = input.initial_payment_cents.map(Money::from_cents);
        let position = initial_position(Money::from_cents(input.initial_debt_cents), initial_payment);

        let now = Utc::now();
        let plan = LayawayPlan {
            id: Uuid::new_v4().to_string(),
            client_id: input.client_id.clone(),
            user_id: input.user_id.clone(),
            state: position.new_state,
            initial_debt_cents: input.initial_debt_cents,
            remaining_debt_cents: position.new_remaining.cents(),
            created_at: now,
            updated_at: now,
        };
        LayawayRepository::insert_in_tx(&mut tx, &plan).await?;

        let mut items = Vec::with_capacity(input.items.len());
        for item_input in &input.items {
            let item = LayawayItem {
                id: Uuid::new_v4().to_string(),
                plan_id: plan.id.clone(),
                stock_entry_id: item_input.stock_entry_id.clone(),
                quantity: item_input.quantity,
                created_at: now,
            };
            LayawayRepository::insert_item_in_tx(&mut tx, &item).await?;
            items.push(item);
        }

        let mut abonos = Vec::new();
        if let Some(payment) = initial_payment {
            if payment.is_positive() {
                let abono = Abono {
                    id: Uuid::new_v4().to_string(),
                    plan_id: plan.id.clone(),
                    user_id: input.user_id.clone(),
                    amount_cents: payment.cents(),
                    memo: Some("initial payment".to_string()),
                    created_at: now,
                };
                LayawayRepository::insert_abono_in_tx(&mut tx, &abono).await?;
                abonos.push(abono);
            }
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(PlanWithDetails {
            plan,
            items,
            abonos,
        })
    }

    /// Applies an installment payment to an active plan.
    ///
    /// The full amount is appended to the abono ledger even when it exceeds
    /// the remaining debt; the debt floors at zero and the plan completes.
    pub async fn apply_abono(&self, input: AbonoInput) -> LedgerResult<LayawayPlan> {
        validate_abono_input(&input)?;

        let input = &input;
        let plan = with_conflict_retry("apply_abono", || self.try_abono(input)).await?;

        info!(
            plan = %plan.id,
            remaining = plan.remaining_debt_cents,
            state = %plan.state,
            "abono applied"
        );
        Ok(plan)
    }

    async fn try_abono(&self, input: &AbonoInput) -> LedgerResult<LayawayPlan> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let plan = LayawayRepository::get_in_tx(&mut tx, &input.plan_id)
            .await?
            .ok_or_else(|| CoreError::PlanNotFound(input.plan_id.clone()))?;

        let outcome = apply_abono(
            &plan.id,
            plan.state,
            plan.remaining_debt(),
            Money::from_cents(input.amount_cents),
        )?;

        let changed = LayawayRepository::update_position_in_tx(
            &mut tx,
            &plan.id,
            outcome.new_remaining.cents(),
            outcome.new_state,
        )
        .await?;
        if changed == 0 {
            // Lost a race with a concurrent completion or cancellation.
            let current = LayawayRepository::get_in_tx(&mut tx, &plan.id)
                .await?
                .ok_or_else(|| CoreError::PlanNotFound(plan.id.clone()))?;
            return Err(CoreError::InvalidPlanState {
                plan_id: plan.id,
                current_state: current.state.to_string(),
                operation: "apply abono".to_string(),
            }
            .into());
        }

        let abono = Abono {
            id: Uuid::new_v4().to_string(),
            plan_id: plan.id.clone(),
            user_id: input.user_id.clone(),
            amount_cents: input.amount_cents,
            memo: input.memo.clone(),
            created_at: Utc::now(),
        };
        LayawayRepository::insert_abono_in_tx(&mut tx, &abono).await?;

        let updated = LayawayRepository::get_in_tx(&mut tx, &plan.id)
            .await?
            .ok_or_else(|| DbError::not_found("LayawayPlan", &plan.id))?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(updated)
    }

    /// Cancels an active plan: releases every reserved item back to stock
    /// and marks the plan `Cancelled`, in one transaction.
    ///
    /// The remaining debt is left as it stood; recorded abonos stay on the
    /// ledger. Refund policy belongs to the surrounding accounting.
    pub async fn cancel_plan(&self, plan_id: &str) -> LedgerResult<LayawayPlan> {
        let plan = with_conflict_retry("cancel_plan", || self.try_cancel(plan_id)).await?;
        info!(plan = %plan.id, "layaway plan cancelled, stock released");
        Ok(plan)
    }

    async fn try_cancel(&self, plan_id: &str) -> LedgerResult<LayawayPlan> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let plan = LayawayRepository::get_in_tx(&mut tx, plan_id)
            .await?
            .ok_or_else(|| CoreError::PlanNotFound(plan_id.to_string()))?;
        ensure_cancellable(&plan.id, plan.state)?;

        // Items come back ordered by stock_entry_id, the shared lock order.
        let items = LayawayRepository::items_in_tx(&mut tx, plan_id).await?;
        for item in &items {
            StockRepository::release_in_tx(&mut tx, &item.stock_entry_id, item.quantity).await?;
        }

        let changed = LayawayRepository::update_position_in_tx(
            &mut tx,
            plan_id,
            plan.remaining_debt_cents,
            PlanState::Cancelled,
        )
        .await?;
        if changed == 0 {
            let current = LayawayRepository::get_in_tx(&mut tx, plan_id)
                .await?
                .ok_or_else(|| CoreError::PlanNotFound(plan_id.to_string()))?;
            return Err(CoreError::InvalidPlanState {
                plan_id: plan_id.to_string(),
                current_state: current.state.to_string(),
                operation: "cancel".to_string(),
            }
            .into());
        }

        let updated = LayawayRepository::get_in_tx(&mut tx, plan_id)
            .await?
            .ok_or_else(|| DbError::not_found("LayawayPlan", plan_id))?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(updated)
    }

    /// Fetches a plan with its items and full abono history.
    pub async fn get_plan(&self, plan_id: &str) -> LedgerResult<PlanWithDetails> {
        let repo = self.db.layaway();
        let plan = repo
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| CoreError::PlanNotFound(plan_id.to_string()))?;
        let items = repo.get_items(plan_id).await?;
        let abonos = repo.get_abonos(plan_id).await?;

        Ok(PlanWithDetails {
            plan,
            items,
            abonos,
        })
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
    use almacen_core::layaway::replay_remaining;
    use almacen_core::CreateStockInput;

    async fn test_db() -> Database {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_entry(db: &Database, product: &str, quantity: i64) -> String {
        db.stock()
            .create_entry(&CreateStockInput {
                product_id: product.to_string(),
                color_id: None,
                size_id: None,
                purchase_price_cents: 5_000,
                sale_price_cents: 10_000,
                quantity,
            })
            .await
            .unwrap()
            .id
    }

    fn plan_input(
        items: Vec<(String, i64)>,
        debt: i64,
        initial_payment: Option<i64>,
    ) -> CreatePlanInput {
        CreatePlanInput {
            client_id: "c-1".to_string(),
            user_id: "u-1".to_string(),
            items: items
                .into_iter()
                .map(|(entry, qty)| PlanItemInput {
                    stock_entry_id: entry,
                    quantity: qty,
                })
                .collect(),
            initial_debt_cents: debt,
            initial_payment_cents: initial_payment,
        }
    }

    fn abono(plan_id: &str, amount: i64) -> AbonoInput {
        AbonoInput {
            plan_id: plan_id.to_string(),
            user_id: "u-1".to_string(),
            amount_cents: amount,
            memo: None,
        }
    }

    #[tokio::test]
    async fn test_creation_reserves_stock() {
        let db = test_db().await;
        let entry = seed_entry(&db, "p1", 5).await;

        let result = db
            .layaway_engine()
            .create_plan(plan_input(vec![(entry.clone(), 2)], 100_000, None))
            .await
            .unwrap();
        assert_eq!(result.plan.state, PlanState::Active);
        assert_eq!(result.plan.remaining_debt_cents, 100_000);
        assert!(result.abonos.is_empty());

        let entry = db.stock().get_by_id(&entry).await.unwrap().unwrap();
        assert_eq!(entry.quantity_on_hand, 3);
    }

    #[tokio::test]
    async fn test_abonos_reduce_debt_until_completion() {
        let db = test_db().await;
        let entry = seed_entry(&db, "p1", 5).await;
        let engine = db.layaway_engine();

        let plan = engine
            .create_plan(plan_input(vec![(entry.clone(), 1)], 100_000, None))
            .await
            .unwrap()
            .plan;

        let plan_after_first = engine.apply_abono(abono(&plan.id, 40_000)).await.unwrap();
        assert_eq!(plan_after_first.remaining_debt_cents, 60_000);
        assert_eq!(plan_after_first.state, PlanState::Active);
        assert!((plan_after_first.percentage_paid() - 40.0).abs() < f64::EPSILON);

        let plan_after_second = engine.apply_abono(abono(&plan.id, 60_000)).await.unwrap();
        assert_eq!(plan_after_second.remaining_debt_cents, 0);
        assert_eq!(plan_after_second.state, PlanState::Completed);

        // Completion does not release the reserved stock.
        let entry = db.stock().get_by_id(&entry).await.unwrap().unwrap();
        assert_eq!(entry.quantity_on_hand, 4);
    }

    #[tokio::test]
    async fn test_abono_on_terminal_plan_is_rejected() {
        let db = test_db().await;
        let entry = seed_entry(&db, "p1", 5).await;
        let engine = db.layaway_engine();

        let plan = engine
            .create_plan(plan_input(vec![(entry, 1)], 10_000, None))
            .await
            .unwrap()
            .plan;
        engine.apply_abono(abono(&plan.id, 10_000)).await.unwrap();

        let err = engine.apply_abono(abono(&plan.id, 1_000)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::InvalidPlanState { .. })
        ));

        // The rejected payment left no trace on the ledger.
        assert_eq!(db.layaway().abono_total(&plan.id).await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_overpayment_floors_at_zero() {
        let db = test_db().await;
        let entry = seed_entry(&db, "p1", 5).await;
        let engine = db.layaway_engine();

        let plan = engine
            .create_plan(plan_input(vec![(entry, 1)], 10_000, None))
            .await
            .unwrap()
            .plan;

        let updated = engine.apply_abono(abono(&plan.id, 25_000)).await.unwrap();
        assert_eq!(updated.remaining_debt_cents, 0);
        assert_eq!(updated.state, PlanState::Completed);

        // The full amount stays on the ledger.
        assert_eq!(db.layaway().abono_total(&plan.id).await.unwrap(), 25_000);
    }

    #[tokio::test]
    async fn test_cancellation_releases_reserved_stock() {
        let db = test_db().await;
        let a = seed_entry(&db, "a-product", 5).await;
        let b = seed_entry(&db, "b-product", 3).await;
        let engine = db.layaway_engine();

        let plan = engine
            .create_plan(plan_input(vec![(a.clone(), 2), (b.clone(), 1)], 50_000, None))
            .await
            .unwrap()
            .plan;
        assert_eq!(db.stock().get_by_id(&a).await.unwrap().unwrap().quantity_on_hand, 3);

        let cancelled = engine.cancel_plan(&plan.id).await.unwrap();
        assert_eq!(cancelled.state, PlanState::Cancelled);

        assert_eq!(db.stock().get_by_id(&a).await.unwrap().unwrap().quantity_on_hand, 5);
        assert_eq!(db.stock().get_by_id(&b).await.unwrap().unwrap().quantity_on_hand, 3);

        // Terminal: a second cancellation is rejected and releases nothing.
        let err = engine.cancel_plan(&plan.id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::InvalidPlanState { .. })
        ));
        assert_eq!(db.stock().get_by_id(&a).await.unwrap().unwrap().quantity_on_hand, 5);
    }

    #[tokio::test]
    async fn test_initial_payment_is_recorded_as_first_abono() {
        let db = test_db().await;
        let entry = seed_entry(&db, "p1", 5).await;

        let result = db
            .layaway_engine()
            .create_plan(plan_input(vec![(entry, 1)], 100_000, Some(30_000)))
            .await
            .unwrap();
        assert_eq!(result.plan.remaining_debt_cents, 70_000);
        assert_eq!(result.plan.state, PlanState::Active);
        assert_eq!(result.abonos.len(), 1);
        assert_eq!(result.abonos[0].amount_cents, 30_000);
    }

    #[tokio::test]
    async fn test_full_initial_payment_births_completed_plan() {
        let db = test_db().await;
        let entry = seed_entry(&db, "p1", 5).await;

        let result = db
            .layaway_engine()
            .create_plan(plan_input(vec![(entry.clone(), 2)], 50_000, Some(50_000)))
            .await
            .unwrap();
        assert_eq!(result.plan.state, PlanState::Completed);
        assert_eq!(result.plan.remaining_debt_cents, 0);

        // Stock is still reserved: the items belong to the client now.
        let entry = db.stock().get_by_id(&entry).await.unwrap().unwrap();
        assert_eq!(entry.quantity_on_hand, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_aborts_plan_creation() {
        let db = test_db().await;
        let a = seed_entry(&db, "a-product", 5).await;
        let b = seed_entry(&db, "b-product", 1).await;

        let err = db
            .layaway_engine()
            .create_plan(plan_input(vec![(a.clone(), 2), (b, 4)], 50_000, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::InsufficientStock { .. })
        ));

        let a = db.stock().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(a.quantity_on_hand, 5);
    }

    #[tokio::test]
    async fn test_abono_history_replays_to_stored_remaining() {
        let db = test_db().await;
        let entry = seed_entry(&db, "p1", 5).await;
        let engine = db.layaway_engine();

        let plan = engine
            .create_plan(plan_input(vec![(entry, 1)], 100_000, Some(20_000)))
            .await
            .unwrap()
            .plan;
        engine.apply_abono(abono(&plan.id, 15_000)).await.unwrap();
        engine.apply_abono(abono(&plan.id, 25_000)).await.unwrap();

        let details = engine.get_plan(&plan.id).await.unwrap();
        let amounts: Vec<i64> = details.abonos.iter().map(|a| a.amount_cents).collect();
        assert_eq!(
            replay_remaining(details.plan.initial_debt(), &amounts),
            details.plan.remaining_debt()
        );
        assert_eq!(details.plan.remaining_debt_cents, 40_000);
    }

    #[tokio::test]
    async fn test_unknown_plan_is_not_found() {
        let db = test_db().await;
        let engine = db.layaway_engine();

        let err = engine.apply_abono(abono("missing", 1_000)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::PlanNotFound(id)) if id == "missing"
        ));

        let err = engine.cancel_plan("missing").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::PlanNotFound(_))));
    }
}

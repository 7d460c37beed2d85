//! # Domain Types
//!
//! Core domain types for the inventory ledger.
//!
//! ## Type Map
//! ```text
//! StockEntry ── keyed by VariantKey (product + optional color/size)
//!     ▲               ▲                  ▲
//!     │ reserve       │ release          │ reserve at creation
//! Sale + SaleLine   Purchase +        LayawayPlan + LayawayItem
//!                   PurchaseLine          └── Abono (append-only debt ledger)
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every stock entry has:
//! - `id`: UUID v4, immutable, used for relations (sale lines, plan items)
//! - `VariantKey`: the business identity `(product_id, color_id?, size_id?)`,
//!   unique per entry, used by purchase intake to find-or-create

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Variant Key
// =============================================================================

/// The business identity of a stock entry: a product plus its optional
/// color/size variant.
///
/// ## Ordering
/// `Ord` is derived so multi-line commits can sort their lines into a single
/// deterministic lock order. Two concurrent sales touching the same two
/// variants always reserve them in the same sequence, which rules out
/// circular waits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub product_id: String,
    pub color_id: Option<String>,
    pub size_id: Option<String>,
}

impl VariantKey {
    /// Creates a key for a product with no color/size variant.
    pub fn product(product_id: impl Into<String>) -> Self {
        VariantKey {
            product_id: product_id.into(),
            color_id: None,
            size_id: None,
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.product_id,
            self.color_id.as_deref().unwrap_or("-"),
            self.size_id.as_deref().unwrap_or("-")
        )
    }
}

// =============================================================================
// Stock Entry
// =============================================================================

/// A single trackable inventory unit.
///
/// Never physically deleted, only zeroed; historical sales and plans keep
/// referencing it. `quantity_on_hand >= 0` is enforced transactionally by the
/// ledger (and double-checked by a database CHECK constraint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockEntry {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub product_id: String,
    pub color_id: Option<String>,
    pub size_id: Option<String>,
    /// Units currently on hand. Invariant: never negative.
    pub quantity_on_hand: i64,
    /// Last cost paid per unit, in cents. Updated by purchase intake.
    pub purchase_price_cents: i64,
    /// Current selling price per unit, in cents.
    pub sale_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockEntry {
    /// Returns the variant key of this entry.
    pub fn key(&self) -> VariantKey {
        VariantKey {
            product_id: self.product_id.clone(),
            color_id: self.color_id.clone(),
            size_id: self.size_id.clone(),
        }
    }

    /// Returns the purchase price as Money.
    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    /// Returns the sale price as Money.
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }
}

/// An administrative stock correction, kept for audit.
///
/// Append-only: corrections of corrections are new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockAdjustment {
    pub id: String,
    pub stock_entry_id: String,
    /// Signed change applied to `quantity_on_hand`.
    pub delta: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// The status of a committed sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Committed and counted against stock.
    Completed,
    /// Voided after commit; stock was released back. Lines and totals are
    /// preserved untouched for the audit trail.
    Voided,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed sale transaction.
///
/// Immutable once committed: corrections are new transactions (or a void),
/// never in-place edits. This is what makes the table an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Buyer reference; walk-in sales have none.
    pub client_id: Option<String>,
    /// Seller (user) reference.
    pub user_id: String,
    pub payment_method_id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    /// Discount actually applied, already clamped to `[0, subtotal]`.
    pub discount_cents: i64,
    /// Invariant: `total_cents == subtotal_cents - discount_cents`.
    pub total_cents: i64,
    pub sold_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item of a sale. Prices are frozen at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub stock_entry_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A sale together with its lines, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithLines {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Purchase
// =============================================================================

/// A committed purchase (supplier intake).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: String,
    pub supplier_id: String,
    pub user_id: String,
    pub purchased_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A line item of a purchase.
///
/// `stock_entry_id` points at the entry the line incremented, whether it
/// already existed or intake created it for an unseen variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseLine {
    pub id: String,
    pub purchase_id: String,
    pub stock_entry_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A purchase together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseWithLines {
    pub purchase: Purchase,
    pub lines: Vec<PurchaseLine>,
}

// =============================================================================
// Layaway (Plan Separe)
// =============================================================================

/// Layaway plan state machine.
///
/// ```text
/// Active ──(remaining debt reaches 0)──► Completed   (terminal)
/// Active ──(explicit cancellation)────► Cancelled    (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    /// Debt outstanding, abonos accepted, stock reserved.
    Active,
    /// Fully paid. Terminal.
    Completed,
    /// Explicitly cancelled, reserved stock released. Terminal.
    Cancelled,
}

impl PlanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanState::Active => "active",
            PlanState::Completed => "completed",
            PlanState::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlanState::Active)
    }
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A layaway plan: stock reserved against an installment debt.
///
/// Stock is decremented at plan creation, not at final payment, so
/// concurrent sales cannot oversell reserved items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LayawayPlan {
    pub id: String,
    pub client_id: String,
    pub user_id: String,
    pub state: PlanState,
    pub initial_debt_cents: i64,
    /// Invariant: `initial_debt_cents - Σ(applied abonos)`, floored at 0.
    pub remaining_debt_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LayawayPlan {
    #[inline]
    pub fn initial_debt(&self) -> Money {
        Money::from_cents(self.initial_debt_cents)
    }

    #[inline]
    pub fn remaining_debt(&self) -> Money {
        Money::from_cents(self.remaining_debt_cents)
    }

    /// Share of the debt already paid, in percent, clamped to `[0, 100]`.
    ///
    /// Derived on every read rather than stored, so it can never drift from
    /// the debt columns.
    pub fn percentage_paid(&self) -> f64 {
        if self.initial_debt_cents <= 0 {
            return 100.0;
        }
        let paid = (self.initial_debt_cents - self.remaining_debt_cents) as f64;
        (paid / self.initial_debt_cents as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// A reserved item on a layaway plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LayawayItem {
    pub id: String,
    pub plan_id: String,
    pub stock_entry_id: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// A single installment payment against a plan's debt.
///
/// Append-only: abonos are never mutated or deleted once recorded. Replaying
/// them in order from `initial_debt` must reproduce `remaining_debt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Abono {
    pub id: String,
    pub plan_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A plan with its reserved items and full abono history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWithDetails {
    pub plan: LayawayPlan,
    pub items: Vec<LayawayItem>,
    pub abonos: Vec<Abono>,
}

// =============================================================================
// Operation Inputs
// =============================================================================
// The request layer validates shapes before calling in; these structs carry
// the already-deserialized payloads. The core re-validates every business
// constraint regardless (see `validation`).

/// Input for creating a stock entry directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStockInput {
    pub product_id: String,
    pub color_id: Option<String>,
    pub size_id: Option<String>,
    pub purchase_price_cents: i64,
    pub sale_price_cents: i64,
    pub quantity: i64,
}

impl CreateStockInput {
    pub fn key(&self) -> VariantKey {
        VariantKey {
            product_id: self.product_id.clone(),
            color_id: self.color_id.clone(),
            size_id: self.size_id.clone(),
        }
    }
}

/// One line of a sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub stock_entry_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// Input for committing a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleInput {
    pub user_id: String,
    pub client_id: Option<String>,
    pub payment_method_id: String,
    /// Requested discount; clamped to `[0, subtotal]` at commit.
    #[serde(default)]
    pub discount_cents: i64,
    /// Sale timestamp; defaults to now when omitted.
    pub sold_at: Option<DateTime<Utc>>,
    pub lines: Vec<SaleLineInput>,
}

/// One line of a purchase request, identified by variant key because the
/// entry may not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub product_id: String,
    pub color_id: Option<String>,
    pub size_id: Option<String>,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    /// Selling price for entries created by this line; existing entries keep
    /// their current sale price.
    pub sale_price_cents: Option<i64>,
}

impl PurchaseLineInput {
    pub fn key(&self) -> VariantKey {
        VariantKey {
            product_id: self.product_id.clone(),
            color_id: self.color_id.clone(),
            size_id: self.size_id.clone(),
        }
    }
}

/// Input for committing a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseInput {
    pub supplier_id: String,
    pub user_id: String,
    pub purchased_at: Option<DateTime<Utc>>,
    pub lines: Vec<PurchaseLineInput>,
}

/// One reserved item of a layaway plan request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItemInput {
    pub stock_entry_id: String,
    pub quantity: i64,
}

/// Input for creating a layaway plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanInput {
    pub client_id: String,
    pub user_id: String,
    pub items: Vec<PlanItemInput>,
    pub initial_debt_cents: i64,
    /// Optional payment taken at plan creation (the `deudaParcial` of the
    /// boundary contract), recorded as the plan's first abono.
    #[serde(default)]
    pub initial_payment_cents: Option<i64>,
}

/// Input for applying an installment payment to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbonoInput {
    pub plan_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub memo: Option<String>,
}

// =============================================================================
// Query Surface
// =============================================================================

/// Default page size for history queries.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Upper bound on page size, keeps a single query from dragging the whole
/// history into memory.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Filters for the sales history query. All filters are optional and
/// combined with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleQuery {
    pub client_id: Option<String>,
    pub user_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub status: Option<SaleStatus>,
    /// Inclusive lower bound on `sold_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `sold_at`.
    pub to: Option<DateTime<Utc>>,
    /// 1-based page number; defaults to 1.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SaleQuery {
    /// Effective page number (1-based).
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size, capped at [`MAX_PAGE_LIMIT`].
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Row offset for the effective page.
    ///
    /// Widened to `u64` before multiplying: `page` is caller-supplied and
    /// unbounded, and a page number near `u32::MAX` must land on a far
    /// (empty) offset, not overflow.
    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.limit() as u64
    }
}

/// One page of query results with the total row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_key_ordering_is_deterministic() {
        let a = VariantKey::product("p1");
        let b = VariantKey {
            product_id: "p1".to_string(),
            color_id: Some("c1".to_string()),
            size_id: None,
        };
        let c = VariantKey::product("p2");

        let mut keys = vec![c.clone(), b.clone(), a.clone()];
        keys.sort();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_variant_key_display() {
        let key = VariantKey {
            product_id: "p1".to_string(),
            color_id: Some("red".to_string()),
            size_id: None,
        };
        assert_eq!(key.to_string(), "p1/red/-");
    }

    #[test]
    fn test_percentage_paid_derivation() {
        let mut plan = LayawayPlan {
            id: "p".to_string(),
            client_id: "c".to_string(),
            user_id: "u".to_string(),
            state: PlanState::Active,
            initial_debt_cents: 100_000,
            remaining_debt_cents: 60_000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!((plan.percentage_paid() - 40.0).abs() < f64::EPSILON);

        plan.remaining_debt_cents = 0;
        assert!((plan.percentage_paid() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_plan_state_terminality() {
        assert!(!PlanState::Active.is_terminal());
        assert!(PlanState::Completed.is_terminal());
        assert!(PlanState::Cancelled.is_terminal());
    }

    #[test]
    fn test_sale_query_defaults() {
        let q = SaleQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(q.offset(), 0);

        let q = SaleQuery {
            page: Some(3),
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(q.limit(), MAX_PAGE_LIMIT);
        assert_eq!(q.offset(), 2 * MAX_PAGE_LIMIT as u64);
    }

    #[test]
    fn test_sale_query_offset_survives_extreme_pages() {
        let q = SaleQuery {
            page: Some(u32::MAX),
            limit: Some(MAX_PAGE_LIMIT),
            ..Default::default()
        };
        assert_eq!(q.offset(), (u32::MAX as u64 - 1) * MAX_PAGE_LIMIT as u64);
    }
}

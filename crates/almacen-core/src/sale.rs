//! # Sale Totals
//!
//! Pure total computation for sale transactions.
//!
//! The invariant enforced here and re-checked by tests:
//! `total == Σ(quantity × unit_price) − discount`, with the discount clamped
//! to `[0, subtotal]` so a total can never go negative.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::SaleLineInput;

/// Computed monetary breakdown of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Money,
    /// Discount actually applied (after clamping).
    pub discount: Money,
    pub total: Money,
}

/// Total for a single line (`quantity × unit_price`), checked.
pub fn line_total(line: &SaleLineInput) -> Result<Money, ValidationError> {
    Money::from_cents(line.unit_price_cents)
        .checked_mul(line.quantity)
        .ok_or_else(|| ValidationError::AmountOverflow {
            field: "line_total".to_string(),
        })
}

/// Computes subtotal, applied discount and total for a set of lines.
///
/// ## Discount Clamping
/// The requested discount is a caller suggestion, not a trusted value:
/// negative discounts become 0, discounts above the subtotal become the
/// subtotal. The *applied* discount is what gets persisted, so the stored
/// triple always satisfies the total invariant.
pub fn compute_totals(
    lines: &[SaleLineInput],
    requested_discount_cents: i64,
) -> Result<SaleTotals, ValidationError> {
    let mut subtotal = Money::zero();
    for line in lines {
        subtotal =
            subtotal
                .checked_add(line_total(line)?)
                .ok_or_else(|| ValidationError::AmountOverflow {
                    field: "subtotal".to_string(),
                })?;
    }

    let discount = Money::from_cents(requested_discount_cents).clamp(Money::zero(), subtotal);
    let total = subtotal - discount;

    Ok(SaleTotals {
        subtotal,
        discount,
        total,
    })
}

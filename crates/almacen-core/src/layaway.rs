//! # Layaway State Machine
//!
//! Pure debt arithmetic and state transitions for layaway (plan separe)
//! plans. The persistence layer calls in here for every decision; no
//! transition rule lives in SQL.
//!
//! ## States
//! ```text
//! Active ──(debt hits 0)──► Completed   terminal
//! Active ──(cancel)───────► Cancelled   terminal
//! ```
//!
//! ## Overpayment Policy
//! An abono larger than the remaining debt is accepted: the full amount is
//! recorded on the append-only abono ledger, the debt floors at zero and the
//! plan completes. The excess is visible in the ledger for the surrounding
//! accounting to settle; rejecting the payment at the counter is not this
//! module's call.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::PlanState;

/// Result of applying an abono to a plan's debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbonoOutcome {
    pub new_remaining: Money,
    pub new_state: PlanState,
}

/// Initial debt position of a freshly created plan, after the optional
/// creation-time payment (`deudaParcial`) is applied.
///
/// A plan whose initial payment covers the whole debt is born `Completed`.
pub fn initial_position(initial_debt: Money, initial_payment: Option<Money>) -> AbonoOutcome {
    let remaining = match initial_payment {
        Some(payment) => initial_debt.saturating_sub_zero(payment),
        None => initial_debt,
    };
    AbonoOutcome {
        new_remaining: remaining,
        new_state: if remaining.is_zero() {
            PlanState::Completed
        } else {
            PlanState::Active
        },
    }
}

/// Applies one abono to an active plan.
///
/// Rejects terminal states with `InvalidPlanState`; the amount itself is
/// assumed positive (validated at the boundary and re-checked here).
pub fn apply_abono(
    plan_id: &str,
    state: PlanState,
    remaining: Money,
    amount: Money,
) -> CoreResult<AbonoOutcome> {
    if state != PlanState::Active {
        return Err(CoreError::InvalidPlanState {
            plan_id: plan_id.to_string(),
            current_state: state.to_string(),
            operation: "apply abono".to_string(),
        });
    }
    if !amount.is_positive() {
        return Err(crate::error::ValidationError::must_be_positive("amount").into());
    }

    let new_remaining = remaining.saturating_sub_zero(amount);
    Ok(AbonoOutcome {
        new_remaining,
        new_state: if new_remaining.is_zero() {
            PlanState::Completed
        } else {
            PlanState::Active
        },
    })
}

/// Checks that a plan may be cancelled. Only `Active` plans can; a completed
/// plan's stock belongs to the client, a cancelled plan was already released.
pub fn ensure_cancellable(plan_id: &str, state: PlanState) -> CoreResult<()> {
    if state != PlanState::Active {
        return Err(CoreError::InvalidPlanState {
            plan_id: plan_id.to_string(),
            current_state: state.to_string(),
            operation: "cancel".to_string(),
        });
    }
    Ok(())
}

/// Replays an abono history from the initial debt.
///
/// Audit helper: for a consistent plan the result equals the stored
/// `remaining_debt`. Tests use this to pin down the append-only property.
pub fn replay_remaining(initial_debt: Money, abono_amounts: &[i64]) -> Money {
    abono_amounts.iter().fold(initial_debt, |remaining, &amount| {
        remaining.saturating_sub_zero(Money::from_cents(amount))
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_abono_keeps_plan_active() {
        let outcome = apply_abono(
            "p-1",
            PlanState::Active,
            Money::from_cents(100_000),
            Money::from_cents(40_000),
        )
        .unwrap();
        assert_eq!(outcome.new_remaining, Money::from_cents(60_000));
        assert_eq!(outcome.new_state, PlanState::Active);
    }

    #[test]
    fn test_final_abono_completes_plan() {
        let outcome = apply_abono(
            "p-1",
            PlanState::Active,
            Money::from_cents(60_000),
            Money::from_cents(60_000),
        )
        .unwrap();
        assert_eq!(outcome.new_remaining, Money::zero());
        assert_eq!(outcome.new_state, PlanState::Completed);
    }

    #[test]
    fn test_overpayment_floors_at_zero_and_completes() {
        let outcome = apply_abono(
            "p-1",
            PlanState::Active,
            Money::from_cents(10_000),
            Money::from_cents(25_000),
        )
        .unwrap();
        assert_eq!(outcome.new_remaining, Money::zero());
        assert_eq!(outcome.new_state, PlanState::Completed);
    }

    #[test]
    fn test_terminal_states_reject_abonos() {
        for state in [PlanState::Completed, PlanState::Cancelled] {
            let err = apply_abono("p-1", state, Money::zero(), Money::from_cents(1)).unwrap_err();
            assert!(matches!(err, CoreError::InvalidPlanState { .. }));
        }
    }

    #[test]
    fn test_cancel_only_from_active() {
        assert!(ensure_cancellable("p-1", PlanState::Active).is_ok());
        assert!(ensure_cancellable("p-1", PlanState::Completed).is_err());
        assert!(ensure_cancellable("p-1", PlanState::Cancelled).is_err());
    }

    #[test]
    fn test_initial_position_with_creation_payment() {
        let pos = initial_position(Money::from_cents(100_000), Some(Money::from_cents(30_000)));
        assert_eq!(pos.new_remaining, Money::from_cents(70_000));
        assert_eq!(pos.new_state, PlanState::Active);

        // Paying the whole debt up front births a completed plan
        let pos = initial_position(Money::from_cents(100_000), Some(Money::from_cents(100_000)));
        assert_eq!(pos.new_remaining, Money::zero());
        assert_eq!(pos.new_state, PlanState::Completed);
    }

    #[test]
    fn test_replay_matches_sequential_application() {
        let initial = Money::from_cents(100_000);
        let abonos = [40_000, 25_000, 35_000];

        let mut remaining = initial;
        let mut state = PlanState::Active;
        for amount in abonos {
            let outcome =
                apply_abono("p-1", state, remaining, Money::from_cents(amount)).unwrap();
            remaining = outcome.new_remaining;
            state = outcome.new_state;
        }

        assert_eq!(replay_remaining(initial, &abonos), remaining);
        assert_eq!(state, PlanState::Completed);
    }
}

//! # Validation Module
//!
//! Business-rule validation for ledger operation inputs.
//!
//! ## Validation Strategy
//! ```text
//! Layer 1: Request layer (out of scope here)
//!          shape checks, auth, deserialization
//! Layer 2: THIS MODULE
//!          quantities, prices, required references, line limits
//! Layer 3: Database
//!          CHECK (quantity_on_hand >= 0), UNIQUE variant key, foreign keys
//! ```
//!
//! The core never trusts the caller: every operation re-validates its input
//! here before any transaction is opened, so a malformed request can never
//! cost a rollback.

use crate::error::ValidationError;
use crate::types::{
    AbonoInput, CreatePlanInput, CreatePurchaseInput, CreateSaleInput, CreateStockInput,
};
use crate::{MAX_LINES_PER_TRANSACTION, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a reference id (user, client, supplier, payment method, ...).
///
/// References are opaque to the ledger; the only rule is that a required one
/// is present and non-blank.
pub fn validate_reference(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates a line quantity: strictly positive, bounded.
///
/// The upper bound catches fat-finger entries (1000 instead of 10) before
/// they reach the stock ledger.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }
    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a strictly positive amount in cents (unit prices, costs, abonos).
pub fn validate_positive_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

/// Validates a non-negative amount in cents (stock prices may be zero while
/// an entry is being set up).
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_line_count(field: &str, count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::EmptyLines {
            field: field.to_string(),
        });
    }
    if count > MAX_LINES_PER_TRANSACTION {
        return Err(ValidationError::OutOfRange {
            field: format!("{field} count"),
            min: 1,
            max: MAX_LINES_PER_TRANSACTION as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Operation Input Validators
// =============================================================================

/// Validates a sale request before any stock is touched.
pub fn validate_sale_input(input: &CreateSaleInput) -> ValidationResult<()> {
    validate_reference("user_id", &input.user_id)?;
    validate_reference("payment_method_id", &input.payment_method_id)?;
    validate_line_count("lines", input.lines.len())?;

    for (idx, line) in input.lines.iter().enumerate() {
        validate_reference(&format!("lines[{idx}].stock_entry_id"), &line.stock_entry_id)?;
        validate_quantity(&format!("lines[{idx}].quantity"), line.quantity)?;
        validate_positive_cents(&format!("lines[{idx}].unit_price"), line.unit_price_cents)?;
    }

    Ok(())
}

/// Validates a purchase request.
///
/// Purchases only grow stock, so there is no upper-quantity concern beyond
/// the shared bound; unit costs must still be positive.
pub fn validate_purchase_input(input: &CreatePurchaseInput) -> ValidationResult<()> {
    validate_reference("supplier_id", &input.supplier_id)?;
    validate_reference("user_id", &input.user_id)?;
    validate_line_count("lines", input.lines.len())?;

    for (idx, line) in input.lines.iter().enumerate() {
        validate_reference(&format!("lines[{idx}].product_id"), &line.product_id)?;
        validate_quantity(&format!("lines[{idx}].quantity"), line.quantity)?;
        validate_positive_cents(&format!("lines[{idx}].unit_cost"), line.unit_cost_cents)?;
        if let Some(sale_price) = line.sale_price_cents {
            validate_non_negative_cents(&format!("lines[{idx}].sale_price"), sale_price)?;
        }
    }

    Ok(())
}

/// Validates a direct stock-entry creation.
pub fn validate_stock_input(input: &CreateStockInput) -> ValidationResult<()> {
    validate_reference("product_id", &input.product_id)?;
    validate_non_negative_cents("purchase_price", input.purchase_price_cents)?;
    validate_non_negative_cents("sale_price", input.sale_price_cents)?;
    if input.quantity < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a layaway plan request.
pub fn validate_plan_input(input: &CreatePlanInput) -> ValidationResult<()> {
    validate_reference("client_id", &input.client_id)?;
    validate_reference("user_id", &input.user_id)?;
    validate_line_count("items", input.items.len())?;
    validate_positive_cents("initial_debt", input.initial_debt_cents)?;

    if let Some(initial_payment) = input.initial_payment_cents {
        validate_non_negative_cents("initial_payment", initial_payment)?;
    }

    for (idx, item) in input.items.iter().enumerate() {
        validate_reference(&format!("items[{idx}].stock_entry_id"), &item.stock_entry_id)?;
        validate_quantity(&format!("items[{idx}].quantity"), item.quantity)?;
    }

    Ok(())
}

/// Validates an installment payment request.
pub fn validate_abono_input(input: &AbonoInput) -> ValidationResult<()> {
    validate_reference("plan_id", &input.plan_id)?;
    validate_reference("user_id", &input.user_id)?;
    validate_positive_cents("amount", input.amount_cents)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlanItemInput, PurchaseLineInput, SaleLineInput};

    fn sale_input() -> CreateSaleInput {
        CreateSaleInput {
            user_id: "u-1".to_string(),
            client_id: None,
            payment_method_id: "cash".to_string(),
            discount_cents: 0,
            sold_at: None,
            lines: vec![SaleLineInput {
                stock_entry_id: "e-1".to_string(),
                quantity: 2,
                unit_price_cents: 4_990,
            }],
        }
    }

    #[test]
    fn test_valid_sale_input_passes() {
        assert!(validate_sale_input(&sale_input()).is_ok());
    }

    #[test]
    fn test_sale_rejects_empty_lines() {
        let mut input = sale_input();
        input.lines.clear();
        assert!(matches!(
            validate_sale_input(&input),
            Err(ValidationError::EmptyLines { .. })
        ));
    }

    #[test]
    fn test_sale_rejects_zero_quantity_and_price() {
        let mut input = sale_input();
        input.lines[0].quantity = 0;
        assert!(validate_sale_input(&input).is_err());

        let mut input = sale_input();
        input.lines[0].unit_price_cents = 0;
        assert!(validate_sale_input(&input).is_err());
    }

    #[test]
    fn test_quantity_upper_bound() {
        assert!(validate_quantity("q", MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity("q", MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_purchase_rejects_blank_supplier() {
        let input = CreatePurchaseInput {
            supplier_id: "  ".to_string(),
            user_id: "u-1".to_string(),
            purchased_at: None,
            lines: vec![PurchaseLineInput {
                product_id: "p-1".to_string(),
                color_id: None,
                size_id: None,
                quantity: 1,
                unit_cost_cents: 100,
                sale_price_cents: None,
            }],
        };
        assert!(matches!(
            validate_purchase_input(&input),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_plan_requires_positive_debt() {
        let input = CreatePlanInput {
            client_id: "c-1".to_string(),
            user_id: "u-1".to_string(),
            items: vec![PlanItemInput {
                stock_entry_id: "e-1".to_string(),
                quantity: 1,
            }],
            initial_debt_cents: 0,
            initial_payment_cents: None,
        };
        assert!(validate_plan_input(&input).is_err());
    }

    #[test]
    fn test_abono_requires_positive_amount() {
        let input = AbonoInput {
            plan_id: "p-1".to_string(),
            user_id: "u-1".to_string(),
            amount_cents: 0,
            memo: None,
        };
        assert!(validate_abono_input(&input).is_err());

        let input = AbonoInput {
            amount_cents: 1,
            ..input
        };
        assert!(validate_abono_input(&input).is_ok());
    }
}

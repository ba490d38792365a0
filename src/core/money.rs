use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::{AppError, Result};

/// Rand amounts carry two decimal places
pub const CENT_SCALE: u32 = 2;

/// Currency symbol used on printed documents
pub const CURRENCY_SYMBOL: &str = "R";

/// Rounds to the nearest cent, halves away from zero (round-half-up for
/// the non-negative figures payroll produces)
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CENT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// The smallest representable amount (R0.01)
pub fn one_cent() -> Decimal {
    Decimal::new(1, CENT_SCALE)
}

/// Validates that an input amount is non-negative with at most two decimals
pub fn validate_amount(field: &str, amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(AppError::validation(format!(
            "{} cannot be negative, got {}",
            field, amount
        )));
    }

    if amount.scale() > CENT_SCALE && amount.normalize().scale() > CENT_SCALE {
        return Err(AppError::validation(format!(
            "{} must have at most {} decimal places, got {}",
            field, CENT_SCALE, amount
        )));
    }

    Ok(())
}

/// Formats an amount with exactly two fraction digits (export format)
pub fn format_decimal(amount: Decimal) -> String {
    format!("{:.2}", round_cents(amount))
}

/// Formats an amount for printed documents, e.g. `R 30000.00`
pub fn format_amount(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-{} {}", CURRENCY_SYMBOL, format_decimal(amount.abs()))
    } else {
        format!("{} {}", CURRENCY_SYMBOL, format_decimal(amount))
    }
}

/// True when `a` and `b` differ by no more than `tolerance`
pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

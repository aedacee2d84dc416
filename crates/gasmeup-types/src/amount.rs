//! Decimal amount parsing and smallest-unit scaling.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::{Result, SwapError};

/// Largest decimal exponent a token may use; keeps `10^decimals` inside `Decimal`.
pub const MAX_DECIMALS: u32 = 18;

/// Parse a user-typed pay amount.
///
/// Accepts digits with at most one decimal point (`"12"`, `"0.5"`, `".5"`, `"5."`).
/// Returns `Ok(None)` for input that carries no digits (`""`, `"."`), which callers
/// treat as "clear the quote".
pub fn parse_pay_amount(input: &str) -> Result<Option<Decimal>> {
    let mut dots = 0;
    for c in input.chars() {
        match c {
            '0'..='9' => {}
            '.' => dots += 1,
            _ => return Err(SwapError::InvalidInput(format!("unexpected character {c:?}"))),
        }
    }
    if dots > 1 {
        return Err(SwapError::InvalidInput("more than one decimal point".into()));
    }
    if !input.chars().any(|c| c.is_ascii_digit()) {
        return Ok(None);
    }

    let normalized = match (input.starts_with('.'), input.ends_with('.')) {
        (true, _) => format!("0{input}"),
        (false, true) => input.trim_end_matches('.').to_string(),
        _ => input.to_string(),
    };
    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|e| SwapError::InvalidInput(format!("{input}: {e}")))
}

/// `10^decimals` as a decimal.
pub fn unit_scale(decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(decimals.min(MAX_DECIMALS)), 0)
}

/// Scale a token amount to its smallest unit, truncating sub-unit digits.
pub fn to_smallest_units(amount: Decimal, decimals: u32) -> Result<u64> {
    let scaled = amount
        .checked_mul(unit_scale(decimals))
        .ok_or_else(|| SwapError::InvalidInput(format!("amount {amount} is too large")))?;
    scaled
        .trunc()
        .to_u64()
        .ok_or_else(|| SwapError::InvalidInput(format!("amount {amount} is out of range")))
}

/// Express a smallest-unit integer as a token amount.
pub fn from_smallest_units(units: u64, decimals: u32) -> Decimal {
    let mut value = Decimal::from(units) / unit_scale(decimals);
    value.rescale(decimals.min(MAX_DECIMALS));
    value.normalize()
}

//! First-fit funding coin selection.
//!
//! No merging: one coin must cover the amount on its own. A native-coin funding
//! object must also keep `gas_buffer` after the payment is split off it.

use gasmeup_types::{FundingCoin, Result, SwapError};

/// Coin chosen for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    pub coin: FundingCoin,
    /// Amount (smallest units) the swap takes from the coin.
    pub amount: u64,
    /// Balance the coin must keep, zero for non-native funding.
    pub gas_buffer: u64,
}

/// Pick the first coin that covers `amount`.
///
/// With a `gas_buffer` the coin's balance must be strictly greater than
/// `amount + buffer`; without one, `balance >= amount` suffices.
pub fn select_funding_coin(
    coins: &[FundingCoin],
    amount: u64,
    gas_buffer: Option<u64>,
) -> Result<CoinSelection> {
    select_available_coin(coins, amount, gas_buffer, |_| false)
}

/// First-fit selection that skips coins for which `reserved` returns true.
///
/// When every covering coin is reserved the attempt fails with `CoinInUse`
/// naming the first of them.
pub fn select_available_coin(
    coins: &[FundingCoin],
    amount: u64,
    gas_buffer: Option<u64>,
    reserved: impl Fn(&FundingCoin) -> bool,
) -> Result<CoinSelection> {
    let (threshold, strict) = match gas_buffer {
        Some(buffer) => (amount.saturating_add(buffer), true),
        None => (amount, false),
    };
    let admissible = |coin: &&FundingCoin| {
        if strict {
            coin.balance > threshold
        } else {
            coin.balance >= threshold
        }
    };

    let mut first_reserved = None;
    for coin in coins.iter().filter(admissible) {
        if !reserved(coin) {
            return Ok(CoinSelection {
                coin: coin.clone(),
                amount,
                gas_buffer: gas_buffer.unwrap_or(0),
            });
        }
        first_reserved.get_or_insert(coin);
    }

    match first_reserved {
        Some(coin) => Err(SwapError::CoinInUse(coin.object_id.clone())),
        None => Err(SwapError::InsufficientBalance {
            required: if strict { threshold.saturating_add(1) } else { threshold },
            available: coins.iter().map(|c| c.balance).max().unwrap_or(0),
        }),
    }
}

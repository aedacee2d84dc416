//! Gas-safety reserve.
//!
//! reserve = ceil(reference_gas_price * typical_tx_gas_units * safety_multiplier)
//!
//! An unavailable oracle degrades to the configured fallback reserve instead of
//! blocking the swap.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use gasmeup_chain::ChainOracle;
use gasmeup_types::{GasConfig, Result, SwapConfig};

use crate::quote::Quote;

/// Outcome of one gas-price query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasAssessment {
    /// Gas price to record in the transaction.
    pub gas_price: u64,
    /// Minimum output (smallest units). Zero when the output is not the native coin.
    pub reserve: u64,
    /// True when the oracle failed and fallback constants were used.
    pub degraded: bool,
}

pub struct GasSafety {
    oracle: Arc<dyn ChainOracle>,
    gas: GasConfig,
    output_is_native: bool,
}

impl GasSafety {
    pub fn new(config: &SwapConfig, oracle: Arc<dyn ChainOracle>) -> Self {
        Self {
            oracle,
            gas: config.gas.clone(),
            output_is_native: config.output_asset.is_native(),
        }
    }

    /// Reserve implied by a gas price, or `None` if it does not fit in a u64.
    pub fn reserve_for_price(&self, gas_price: u64) -> Option<u64> {
        Decimal::from(gas_price)
            .checked_mul(Decimal::from(self.gas.typical_tx_gas_units))?
            .checked_mul(self.gas.safety_multiplier)?
            .ceil()
            .to_u64()
    }

    /// Query the oracle and derive the reserve. Never fails.
    pub async fn assess(&self) -> GasAssessment {
        let timeout = Duration::from_millis(self.gas.oracle_timeout_ms);
        let queried = match tokio::time::timeout(timeout, self.oracle.reference_gas_price()).await {
            Ok(Ok(0)) => Err("oracle reported a zero gas price".to_string()),
            Ok(Ok(price)) => Ok(price),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("oracle timed out after {}ms", self.gas.oracle_timeout_ms)),
        };

        let priced = queried.and_then(|price| {
            self.reserve_for_price(price)
                .map(|reserve| (price, reserve))
                .ok_or_else(|| format!("reserve overflows at gas price {price}"))
        });

        let (gas_price, reserve, degraded) = match priced {
            Ok((price, reserve)) => {
                debug!(target: "gasmeup::gas", price, reserve, "gas reserve from oracle");
                (price, reserve, false)
            }
            Err(reason) => {
                warn!(
                    target: "gasmeup::gas",
                    %reason,
                    fallback_reserve = self.gas.fallback_reserve,
                    "gas price unavailable, using fallback reserve"
                );
                (self.gas.fallback_gas_price, self.gas.fallback_reserve, true)
            }
        };

        GasAssessment {
            gas_price,
            reserve: if self.output_is_native { reserve } else { 0 },
            degraded,
        }
    }

    /// Reject a quote whose output cannot cover the reserve.
    pub fn check(&self, quote: Quote, assessment: GasAssessment) -> Result<CheckedQuote> {
        let quote = quote.with_reserve(assessment.reserve)?;
        Ok(CheckedQuote { quote, assessment })
    }
}

/// A quote that passed the gas-safety check, paired with the gas price it was
/// checked against. Only `GasSafety::check` produces one, so transactions cannot
/// be built from unchecked quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedQuote {
    quote: Quote,
    assessment: GasAssessment,
}

impl CheckedQuote {
    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn assessment(&self) -> &GasAssessment {
        &self.assessment
    }

    pub fn into_quote(self) -> Quote {
        self.quote
    }
}

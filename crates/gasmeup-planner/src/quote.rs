//! Quote engine.
//!
//! receive = floor(((pay - pay * fee%) / markup) * rate - gas_coverage), clamped at zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use gasmeup_types::amount::{from_smallest_units, parse_pay_amount, to_smallest_units};
use gasmeup_types::{AssetConfig, PricingConfig, Result, SwapConfig, SwapError};

/// A priced swap. Immutable once handed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub pay_amount: Decimal,
    pub receive_amount: Decimal,
    pub rate_per_unit: Decimal,
    pub fee_percent: Decimal,
    /// Fee withheld, in funding-asset terms.
    pub fee_amount: Decimal,
    /// Gas coverage withheld, in output-asset terms.
    pub gas_coverage: Decimal,
    pub pay_units: u64,
    pub receive_units: u64,
    pub gas_reserve: u64,
    pub min_acceptable_output: u64,
}

impl Quote {
    /// The quote for an empty pay field.
    pub fn zero() -> Self {
        Self {
            pay_amount: Decimal::ZERO,
            receive_amount: Decimal::ZERO,
            rate_per_unit: Decimal::ZERO,
            fee_percent: Decimal::ZERO,
            fee_amount: Decimal::ZERO,
            gas_coverage: Decimal::ZERO,
            pay_units: 0,
            receive_units: 0,
            gas_reserve: 0,
            min_acceptable_output: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.pay_units == 0
    }

    /// Bind the gas-safety reserve, rejecting quotes that fall below it.
    ///
    /// The on-chain minimum output is raised to the reserve so slippage can never
    /// push the realized amount under the gas floor.
    pub fn with_reserve(self, reserve: u64) -> Result<Self> {
        if self.receive_units < reserve {
            return Err(SwapError::QuoteTooSmall {
                receive: self.receive_units,
                reserve,
            });
        }
        Ok(Self {
            gas_reserve: reserve,
            min_acceptable_output: self.min_acceptable_output.max(reserve),
            ..self
        })
    }
}

fn overflow(what: &str) -> SwapError {
    SwapError::InvalidInput(format!("{what} overflows"))
}

/// Pure pricing function over an injected configuration.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    funding: AssetConfig,
    output: AssetConfig,
    pricing: PricingConfig,
}

impl QuoteEngine {
    pub fn new(config: &SwapConfig) -> Self {
        Self {
            funding: config.funding_asset.clone(),
            output: config.output_asset.clone(),
            pricing: config.pricing.clone(),
        }
    }

    /// Quote a raw pay-field string. Empty input yields the zero quote.
    pub fn quote(&self, input: &str) -> Result<Quote> {
        match parse_pay_amount(input)? {
            Some(amount) => self.quote_amount(amount),
            None => Ok(Quote::zero()),
        }
    }

    pub fn quote_amount(&self, pay_amount: Decimal) -> Result<Quote> {
        if pay_amount.is_sign_negative() && !pay_amount.is_zero() {
            return Err(SwapError::InvalidInput("pay amount must not be negative".into()));
        }
        let pricing = &self.pricing;
        let hundred = Decimal::ONE_HUNDRED;

        let pay_units = to_smallest_units(pay_amount, self.funding.decimals)?;
        let pay = from_smallest_units(pay_units, self.funding.decimals);

        let fee_amount = pay
            .checked_mul(pricing.fee_percent)
            .ok_or_else(|| overflow("fee"))?
            / hundred;
        let mut net = pay - fee_amount;
        if let Some(divisor) = pricing.markup_divisor {
            net = net.checked_div(divisor).ok_or_else(|| overflow("markup"))?;
        }

        let gross = net.checked_mul(pricing.rate).ok_or_else(|| overflow("conversion"))?;
        let out = (gross - pricing.gas_coverage).max(Decimal::ZERO);

        let receive_units = to_smallest_units(out, self.output.decimals)?;
        let receive_amount = from_smallest_units(receive_units, self.output.decimals);

        let keep = (hundred - pricing.slippage_percent) / hundred;
        let min_acceptable_output = to_smallest_units(
            Decimal::from(receive_units)
                .checked_mul(keep)
                .ok_or_else(|| overflow("slippage bound"))?,
            0,
        )?;

        trace!(
            target: "gasmeup::quote",
            %pay, %fee_amount, %receive_amount, min_acceptable_output,
            "quoted swap"
        );

        Ok(Quote {
            pay_amount: pay,
            receive_amount,
            rate_per_unit: pricing.rate,
            fee_percent: pricing.fee_percent,
            fee_amount,
            gas_coverage: pricing.gas_coverage,
            pay_units,
            receive_units,
            gas_reserve: 0,
            min_acceptable_output,
        })
    }
}

/// Pay input state: the last accepted text and its quote.
///
/// Rejected input leaves both untouched.
#[derive(Debug, Clone)]
pub struct PayField {
    engine: QuoteEngine,
    text: String,
    quote: Quote,
}

impl PayField {
    pub fn new(engine: QuoteEngine) -> Self {
        Self {
            engine,
            text: String::new(),
            quote: Quote::zero(),
        }
    }

    pub fn update(&mut self, text: &str) -> Result<&Quote> {
        let quote = self.engine.quote(text)?;
        self.text = text.to_string();
        self.quote = quote;
        Ok(&self.quote)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }
}

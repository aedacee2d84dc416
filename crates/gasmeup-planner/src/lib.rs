//! Quoting, gas-safety and coin selection for gas swaps.
//!
//! - Quote: pay amount -> receive amount, fee breakdown, slippage bound
//! - Reserve: minimum native output derived from the reference gas price
//! - Selection: first-fit funding coin, keeping a gas buffer on native coins

pub mod quote;
pub mod reserve;
pub mod selection;

pub use quote::{PayField, Quote, QuoteEngine};
pub use reserve::{CheckedQuote, GasAssessment, GasSafety};
pub use selection::{select_available_coin, select_funding_coin, CoinSelection};

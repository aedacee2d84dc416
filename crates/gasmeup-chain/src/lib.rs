//! Read-only chain access: reference gas price and owned coin objects.
//!
//! The pipeline only needs two answers from a full node, so they sit behind the
//! `ChainOracle` trait. `RpcClient` implements it over Sui JSON-RPC.

use async_trait::async_trait;
use gasmeup_types::{FundingCoin, Result};

pub mod rpc_client;

pub use rpc_client::RpcClient;

/// Best-effort chain queries. Callers decide how to degrade on failure.
#[async_trait]
pub trait ChainOracle: Send + Sync {
    /// Current reference gas price (smallest native units per gas unit).
    async fn reference_gas_price(&self) -> Result<u64>;

    /// Coin objects of `coin_type` owned by `owner`, in node order.
    async fn owned_coins(&self, owner: &str, coin_type: &str) -> Result<Vec<FundingCoin>>;
}

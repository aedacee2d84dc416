//! JSON-RPC client for a Sui full node.
//!
//! Methods:
//! - suix_getReferenceGasPrice
//! - suix_getCoins(owner, coinType, cursor, limit)

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use gasmeup_types::{FundingCoin, Result, SwapError};

use crate::ChainOracle;

/// Page size requested from `suix_getCoins`.
const COIN_PAGE_LIMIT: u64 = 50;

/// Upper bound on pages fetched for one owner listing.
const MAX_COIN_PAGES: usize = 200;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// One entry of a `suix_getCoins` page. Amount fields arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinEntry {
    pub coin_object_id: String,
    pub coin_type: String,
    pub balance: String,
    pub version: String,
    pub digest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<CoinEntry>,
    next_cursor: Option<String>,
    has_next_page: bool,
}

impl CoinEntry {
    fn into_funding_coin(self) -> Result<FundingCoin> {
        let parse = |field: &str, value: &str| {
            value.parse::<u64>().map_err(|e| {
                SwapError::TransportFailure(format!("malformed coin {field} {value:?}: {e}"))
            })
        };
        Ok(FundingCoin {
            balance: parse("balance", &self.balance)?,
            version: parse("version", &self.version)?,
            object_id: self.coin_object_id,
            asset_type: self.coin_type,
            digest: self.digest,
        })
    }
}

/// Full node client.
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(20_000);
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SwapError::TransportFailure(format!("rpc request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(SwapError::TransportFailure(format!(
                "rpc node returned status {} for {}",
                resp.status(),
                method
            )));
        }

        let body: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| SwapError::TransportFailure(format!("failed to parse rpc response: {}", e)))?;

        if let Some(err) = body.error {
            return Err(SwapError::TransportFailure(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }
        body.result
            .ok_or_else(|| SwapError::TransportFailure(format!("{} returned no result", method)))
    }

    /// Fetch one page of coins.
    pub async fn get_coins_page(
        &self,
        owner: &str,
        coin_type: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<CoinEntry>, Option<String>)> {
        let page: CoinPage = self
            .call(
                "suix_getCoins",
                json!([owner, coin_type, cursor, COIN_PAGE_LIMIT]),
            )
            .await?;
        let next = if page.has_next_page { page.next_cursor } else { None };
        Ok((page.data, next))
    }
}

#[async_trait]
impl ChainOracle for RpcClient {
    async fn reference_gas_price(&self) -> Result<u64> {
        // Sui encodes u64 results as strings; accept plain numbers too.
        let raw: Value = self.call("suix_getReferenceGasPrice", json!([])).await?;
        let price = match &raw {
            Value::String(s) => s.parse::<u64>().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        price.ok_or_else(|| {
            SwapError::TransportFailure(format!("malformed reference gas price: {}", raw))
        })
    }

    async fn owned_coins(&self, owner: &str, coin_type: &str) -> Result<Vec<FundingCoin>> {
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        for _ in 0..MAX_COIN_PAGES {
            let (entries, next) = self
                .get_coins_page(owner, coin_type, cursor.as_deref())
                .await?;
            for entry in entries {
                coins.push(entry.into_funding_coin()?);
            }
            match next {
                None => {
                    debug!(target: "gasmeup::chain", owner, coin_type, count = coins.len(), "fetched owned coins");
                    return Ok(coins);
                }
                Some(c) if !seen.insert(c.clone()) => {
                    return Err(SwapError::TransportFailure(format!(
                        "suix_getCoins repeated cursor {}",
                        c
                    )));
                }
                Some(c) => cursor = Some(c),
            }
        }

        Err(SwapError::TransportFailure(format!(
            "suix_getCoins did not finish within {} pages",
            MAX_COIN_PAGES
        )))
    }
}

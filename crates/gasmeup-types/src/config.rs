//! Immutable swap configuration.
//!
//! One `SwapConfig` describes a network deployment: contract addresses, the asset
//! pair, pricing parameters, gas-safety constants and the relay endpoint. It is
//! built once (preset or TOML) and injected into every component.

use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::MAX_DECIMALS;
use crate::{is_native_coin_type, Address, ObjectId, TypeTag, CLOCK_OBJECT_ID, NATIVE_COIN_TYPE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A token the swap spends or receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    pub type_tag: TypeTag,
    pub decimals: u32,
}

impl AssetConfig {
    pub fn is_native(&self) -> bool {
        is_native_coin_type(&self.type_tag)
    }
}

/// Reference to a shared on-chain object (liquidity vaults, the clock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedObjectRef {
    pub object_id: ObjectId,
    pub initial_shared_version: u64,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Output units received per input unit.
    pub rate: Decimal,
    /// Service fee as a percentage of the input (2 means 2%).
    pub fee_percent: Decimal,
    /// Optional fixed markup; the net input is divided by it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup_divisor: Option<Decimal>,
    /// Fixed amount, in output-asset terms, withheld to cover the sponsor's gas.
    pub gas_coverage: Decimal,
    /// Maximum tolerated deviation between quoted and realized output, in percent.
    pub slippage_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasConfig {
    /// Gas units a typical follow-up transaction consumes.
    pub typical_tx_gas_units: u64,
    /// Factor (> 1) applied on top of `gas price * typical units`.
    pub safety_multiplier: Decimal,
    /// Reserve (smallest units) used when the gas price oracle is unavailable.
    pub fallback_reserve: u64,
    /// Reference gas price assumed for the intent when the oracle is unavailable.
    pub fallback_gas_price: u64,
    /// Balance a native funding coin must keep beyond the paid amount.
    pub native_gas_buffer: u64,
    /// Gas budget recorded in the sponsored transaction.
    pub gas_budget: u64,
    pub oracle_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub base_url: String,
    /// Address of the sponsor that pays chain-level gas.
    pub sponsor_address: Address,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapConfig {
    pub network: String,
    pub rpc_url: String,
    pub package_id: ObjectId,
    pub module: String,
    pub function: String,
    /// Liquidity object holding the funding asset.
    pub input_vault: SharedObjectRef,
    /// Liquidity object holding the output asset.
    pub output_vault: SharedObjectRef,
    pub clock: SharedObjectRef,
    pub funding_asset: AssetConfig,
    pub output_asset: AssetConfig,
    pub pricing: PricingConfig,
    pub gas: GasConfig,
    pub relay: RelayConfig,
}

impl SwapConfig {
    /// Testnet deployment swapping USDC for SUI.
    pub fn testnet() -> Self {
        Self {
            network: "testnet".into(),
            rpc_url: "https://fullnode.testnet.sui.io:443".into(),
            package_id: "0x5896b20996917a4e41cb410bb9789934e1ae5504ee30b1a9a768eba2ab321d2c".into(),
            module: "router".into(),
            function: "swap_exact_input".into(),
            input_vault: SharedObjectRef {
                object_id: "0x0".into(),
                initial_shared_version: 1,
                mutable: true,
            },
            output_vault: SharedObjectRef {
                object_id: "0x0".into(),
                initial_shared_version: 1,
                mutable: true,
            },
            clock: SharedObjectRef {
                object_id: CLOCK_OBJECT_ID.into(),
                initial_shared_version: 1,
                mutable: false,
            },
            funding_asset: AssetConfig {
                symbol: "USDC".into(),
                type_tag: "0xa1ec7fc00a6f40db9693ad1415d0c193ad3906494428cf252621037bd7117e29::usdc::USDC"
                    .into(),
                decimals: 6,
            },
            output_asset: AssetConfig {
                symbol: "SUI".into(),
                type_tag: NATIVE_COIN_TYPE.into(),
                decimals: 9,
            },
            pricing: PricingConfig {
                rate: Decimal::new(64, 2),
                fee_percent: Decimal::new(3, 1),
                markup_divisor: None,
                gas_coverage: Decimal::new(5, 3),
                slippage_percent: Decimal::from(5),
            },
            gas: GasConfig {
                typical_tx_gas_units: 3_000,
                safety_multiplier: Decimal::new(15, 1),
                fallback_reserve: 10_000_000,
                fallback_gas_price: 1_000,
                native_gas_buffer: 50_000_000,
                gas_budget: 10_000_000,
                oracle_timeout_ms: 5_000,
            },
            relay: RelayConfig {
                base_url: "http://localhost:3001".into(),
                sponsor_address: "0x0".into(),
                timeout_ms: 30_000,
            },
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SwapConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.pricing.rate <= Decimal::ZERO {
            return invalid("pricing.rate must be positive");
        }
        if self.pricing.fee_percent < Decimal::ZERO || self.pricing.fee_percent >= Decimal::ONE_HUNDRED {
            return invalid("pricing.fee_percent must be in [0, 100)");
        }
        if let Some(divisor) = self.pricing.markup_divisor {
            if divisor < Decimal::ONE {
                return invalid("pricing.markup_divisor must be at least 1");
            }
        }
        if self.pricing.gas_coverage < Decimal::ZERO {
            return invalid("pricing.gas_coverage must not be negative");
        }
        if self.pricing.slippage_percent < Decimal::ZERO
            || self.pricing.slippage_percent >= Decimal::ONE_HUNDRED
        {
            return invalid("pricing.slippage_percent must be in [0, 100)");
        }
        if self.gas.safety_multiplier <= Decimal::ONE {
            return invalid("gas.safety_multiplier must be greater than 1");
        }
        if self.gas.fallback_reserve == 0 {
            return invalid("gas.fallback_reserve must be positive");
        }
        if self.funding_asset.decimals > MAX_DECIMALS || self.output_asset.decimals > MAX_DECIMALS {
            return invalid("asset decimals must not exceed 18");
        }
        if self.funding_asset.type_tag == self.output_asset.type_tag {
            return invalid("funding and output assets must differ");
        }
        if self.relay.base_url.is_empty() {
            return invalid("relay.base_url must be set");
        }
        Ok(())
    }

    /// Fully qualified Move call target.
    pub fn call_target(&self) -> String {
        format!("{}::{}::{}", self.package_id, self.module, self.function)
    }
}

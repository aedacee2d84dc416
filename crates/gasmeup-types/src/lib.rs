use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod amount;
pub mod config;

pub use config::{AssetConfig, ConfigError, GasConfig, PricingConfig, RelayConfig, SharedObjectRef, SwapConfig};

/// 0x-prefixed hex string (object ids, addresses, digests of the chain).
pub type Hex = String;

/// Sui object id.
pub type ObjectId = Hex;

/// Sui account address.
pub type Address = Hex;

/// Move type tag, e.g. `0x2::sui::SUI`.
pub type TypeTag = String;

/// Type tag of the chain's native gas coin.
pub const NATIVE_COIN_TYPE: &str = "0x2::sui::SUI";

/// Shared clock object (time source for on-chain freshness checks).
pub const CLOCK_OBJECT_ID: &str = "0x6";

/// GasMeUp error taxonomy.
///
/// Every variant resolves to a displayed outcome; nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("invalid amount: {0}")]
    InvalidInput(String),

    #[error("quote too small: receive {receive} is below the gas reserve {reserve} (short by {})", .reserve.saturating_sub(*.receive))]
    QuoteTooSmall { receive: u64, reserve: u64 },

    #[error("insufficient balance: need a coin holding at least {required}, largest available is {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("wallet declined to sign: {0}")]
    UserRejected(String),

    #[error("Backend error: {status} - {body}")]
    RelayRejected { status: u16, body: String },

    #[error("Network error: {0}")]
    TransportFailure(String),

    #[error("another swap attempt is already in progress")]
    AttemptInProgress,

    #[error("coin {0} is already committed to an in-flight attempt")]
    CoinInUse(ObjectId),

    #[error("failed to serialize transaction: {0}")]
    Serialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SwapError {
    /// Whether starting a fresh attempt may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwapError::UserRejected(_)
                | SwapError::RelayRejected { .. }
                | SwapError::TransportFailure(_)
                | SwapError::AttemptInProgress
                | SwapError::CoinInUse(_)
        )
    }

    /// Amount still missing for `QuoteTooSmall` / `InsufficientBalance`.
    pub fn shortfall(&self) -> Option<u64> {
        match self {
            SwapError::QuoteTooSmall { receive, reserve } => Some(reserve.saturating_sub(*receive)),
            SwapError::InsufficientBalance { required, available } => {
                Some(required.saturating_sub(*available))
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;

/// A coin object of the funding asset owned by the user.
///
/// `version` and `digest` complete the owned-object reference the chain expects
/// when the coin is passed as a call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingCoin {
    pub object_id: ObjectId,
    pub balance: u64,
    pub asset_type: TypeTag,
    pub version: u64,
    pub digest: String,
}

/// Whether a type tag names the native gas coin.
///
/// Accepts both the short (`0x2::sui::SUI`) and the zero-padded address form.
pub fn is_native_coin_type(type_tag: &str) -> bool {
    let Some((address, rest)) = type_tag.split_once("::") else {
        return false;
    };
    let address = address.strip_prefix("0x").unwrap_or(address);
    address.trim_start_matches('0') == "2" && rest == "sui::SUI"
}

/// Normalize an object id or address to lowercase 0x-prefixed hex.
pub fn normalize_hex(value: &str) -> Result<Hex> {
    let body = value.strip_prefix("0x").unwrap_or(value);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SwapError::InvalidInput(format!("invalid hex id: {value}")));
    }
    Ok(format!("0x{}", body.to_ascii_lowercase()))
}

/// Parse a hex id into 32 big-endian bytes, left-padding short forms like `0x6`.
pub fn hex_to_id_bytes(value: &str) -> Result<[u8; 32]> {
    let body = value.strip_prefix("0x").unwrap_or(value);
    if body.len() > 64 {
        return Err(SwapError::InvalidInput(format!("hex id too long: {value}")));
    }
    let padded = format!("{body:0>64}");
    let bytes = hex::decode(&padded).map_err(|e| SwapError::InvalidInput(e.to_string()))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

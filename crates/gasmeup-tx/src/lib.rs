//! Sponsored swap transaction: build, authorize, relay.
//!
//! - Build the swap call from a checked quote and a selected coin
//! - Hand the serialized transaction to the wallet for signing only
//! - Submit the signed payload to the sponsor relay

use serde::{Deserialize, Serialize};
use tracing::debug;

use gasmeup_planner::{CheckedQuote, CoinSelection};
use gasmeup_types::{
    hex_to_id_bytes, normalize_hex, Address, AssetConfig, FundingCoin, ObjectId, Result, SharedObjectRef,
    SwapConfig, SwapError, TypeTag,
};

pub mod relay_client;
pub mod wallet;

pub use relay_client::{RelayClient, RelayResult, RelaySubmission};
pub use wallet::{WalletError, WalletSigner};

/// Where the swap's input coin comes from. Resolved once, at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSource {
    /// Native funding: split an exact-value coin off the selected object so the
    /// remainder stays in the wallet.
    Split { coin: FundingCoin, amount: u64 },
    /// Any other asset: pass the selected object itself.
    Whole(FundingCoin),
}

impl PaymentSource {
    pub fn resolve(funding: &AssetConfig, selection: &CoinSelection) -> Self {
        if funding.is_native() {
            PaymentSource::Split {
                coin: selection.coin.clone(),
                amount: selection.amount,
            }
        } else {
            PaymentSource::Whole(selection.coin.clone())
        }
    }

    pub fn coin(&self) -> &FundingCoin {
        match self {
            PaymentSource::Split { coin, .. } | PaymentSource::Whole(coin) => coin,
        }
    }
}

/// One argument of the swap call, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentArg {
    Shared(SharedObjectRef),
    Payment,
    U64(u64),
}

/// The unsigned swap call for one attempt.
///
/// Not `Clone`. `authorize` consumes it, so an intent is signed and submitted at
/// most once.
#[derive(Debug, PartialEq, Eq)]
pub struct TransactionIntent {
    pub call_target: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<IntentArg>,
    pub payment: PaymentSource,
    pub sender: Address,
    /// Sponsor paying chain-level gas for this intent.
    pub gas_owner: Address,
    pub gas_budget: u64,
    pub gas_price: u64,
}

// Wire model of the programmable transaction handed to the wallet.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ObjectArg {
    Owned {
        object_id: [u8; 32],
        version: u64,
        digest: String,
    },
    Shared {
        object_id: [u8; 32],
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Argument {
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl Argument {
    pub fn input(&self) -> Option<u16> {
        match self {
            Argument::Input(index) => Some(*index),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Command {
    SplitCoins { coin: Argument, amounts: Vec<Argument> },
    MoveCall {
        target: String,
        type_arguments: Vec<TypeTag>,
        arguments: Vec<Argument>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionData {
    pub sender: [u8; 32],
    pub gas_owner: [u8; 32],
    pub gas_price: u64,
    pub gas_budget: u64,
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

fn owned_arg(coin: &FundingCoin) -> Result<CallArg> {
    Ok(CallArg::Object(ObjectArg::Owned {
        object_id: hex_to_id_bytes(&coin.object_id)?,
        version: coin.version,
        digest: coin.digest.clone(),
    }))
}

fn input_index(inputs: &[CallArg]) -> Result<u16> {
    u16::try_from(inputs.len())
        .map_err(|_| SwapError::Serialization("too many transaction inputs".into()))
}

impl TransactionIntent {
    /// Object consumed (or split) by this intent.
    pub fn funding_object(&self) -> &ObjectId {
        &self.payment.coin().object_id
    }

    /// Lower the intent into the programmable transaction the wallet signs.
    pub fn to_transaction_data(&self) -> Result<TransactionData> {
        let mut inputs = Vec::new();
        let mut commands = Vec::new();

        let payment = match &self.payment {
            PaymentSource::Split { coin, amount } => {
                let coin_input = input_index(&inputs)?;
                inputs.push(owned_arg(coin)?);
                let amount_input = input_index(&inputs)?;
                inputs.push(CallArg::Pure(amount.to_le_bytes().to_vec()));
                commands.push(Command::SplitCoins {
                    coin: Argument::Input(coin_input),
                    amounts: vec![Argument::Input(amount_input)],
                });
                Argument::NestedResult(0, 0)
            }
            PaymentSource::Whole(coin) => {
                let coin_input = input_index(&inputs)?;
                inputs.push(owned_arg(coin)?);
                Argument::Input(coin_input)
            }
        };

        let mut arguments = Vec::with_capacity(self.arguments.len());
        for arg in &self.arguments {
            let lowered = match arg {
                IntentArg::Payment => payment,
                IntentArg::Shared(shared) => {
                    let index = input_index(&inputs)?;
                    inputs.push(CallArg::Object(ObjectArg::Shared {
                        object_id: hex_to_id_bytes(&shared.object_id)?,
                        initial_shared_version: shared.initial_shared_version,
                        mutable: shared.mutable,
                    }));
                    Argument::Input(index)
                }
                IntentArg::U64(value) => {
                    let index = input_index(&inputs)?;
                    inputs.push(CallArg::Pure(value.to_le_bytes().to_vec()));
                    Argument::Input(index)
                }
            };
            arguments.push(lowered);
        }

        commands.push(Command::MoveCall {
            target: self.call_target.clone(),
            type_arguments: self.type_arguments.clone(),
            arguments,
        });

        Ok(TransactionData {
            sender: hex_to_id_bytes(&self.sender)?,
            gas_owner: hex_to_id_bytes(&self.gas_owner)?,
            gas_price: self.gas_price,
            gas_budget: self.gas_budget,
            inputs,
            commands,
        })
    }

    /// Serialized transaction bytes, as presented to the wallet.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let data = self.to_transaction_data()?;
        bincode::serde::encode_to_vec(&data, bincode::config::standard())
            .map_err(|e| SwapError::Serialization(e.to_string()))
    }

    /// Have the wallet sign (never broadcast) this intent, consuming it.
    pub async fn authorize(self, wallet: &dyn WalletSigner) -> Result<SignedPayload> {
        let transaction_bytes = self.to_bytes()?;
        let signature = wallet
            .sign_transaction(&transaction_bytes)
            .await
            .map_err(|e| SwapError::UserRejected(e.to_string()))?;
        Ok(SignedPayload {
            transaction_bytes,
            signature,
        })
    }
}

/// Signed transaction, forwarded to the relay without inspection.
#[derive(Debug, PartialEq, Eq)]
pub struct SignedPayload {
    pub transaction_bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Builds swap intents for one deployment.
#[derive(Debug, Clone)]
pub struct IntentBuilder {
    config: SwapConfig,
}

impl IntentBuilder {
    pub fn new(config: &SwapConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Swap call arguments, in order: input vault, output vault, payment coin,
    /// minimum output, clock.
    pub fn build(
        &self,
        sender: &str,
        checked: &CheckedQuote,
        selection: &CoinSelection,
    ) -> Result<TransactionIntent> {
        let quote = checked.quote();
        if quote.is_zero() {
            return Err(SwapError::InvalidInput("nothing to swap".into()));
        }
        if selection.amount != quote.pay_units {
            return Err(SwapError::InvalidInput(format!(
                "selected amount {} does not match quoted input {}",
                selection.amount, quote.pay_units
            )));
        }

        let config = &self.config;
        let payment = PaymentSource::resolve(&config.funding_asset, selection);
        let intent = TransactionIntent {
            call_target: config.call_target(),
            type_arguments: vec![
                config.funding_asset.type_tag.clone(),
                config.output_asset.type_tag.clone(),
            ],
            arguments: vec![
                IntentArg::Shared(config.input_vault.clone()),
                IntentArg::Shared(config.output_vault.clone()),
                IntentArg::Payment,
                IntentArg::U64(quote.min_acceptable_output),
                IntentArg::Shared(config.clock.clone()),
            ],
            payment,
            sender: normalize_hex(sender)?,
            gas_owner: normalize_hex(&config.relay.sponsor_address)?,
            gas_budget: config.gas.gas_budget,
            gas_price: checked.assessment().gas_price,
        };

        debug!(
            target: "gasmeup::tx",
            sender = %intent.sender,
            coin = %intent.funding_object(),
            min_out = quote.min_acceptable_output,
            split = matches!(intent.payment, PaymentSource::Split { .. }),
            "built swap intent"
        );
        Ok(intent)
    }
}

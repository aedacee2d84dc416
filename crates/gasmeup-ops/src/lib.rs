//! End-to-end swap attempts: quote, gas check, coin selection, sponsored submission.
//!
//! One `SwapEngine` serves one user session. Each attempt runs
//! BUILD -> AUTHORIZE -> SUBMIT -> SETTLED in order and settles into a
//! `RelayResult`; nothing in the pipeline panics or aborts the process.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, info, warn};

use gasmeup_chain::ChainOracle;
use gasmeup_planner::{select_available_coin, GasSafety, Quote, QuoteEngine};
use gasmeup_tx::{IntentBuilder, RelayClient, RelayResult, RelaySubmission, WalletSigner};
use gasmeup_types::{Result, SwapConfig, SwapError};

pub mod locks;

pub use locks::{CoinLease, CoinLocks};
use locks::SessionGuard;

/// Phase of an attempt, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Build,
    Authorize,
    Submit,
    Settled,
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptPhase::Build => "build",
            AttemptPhase::Authorize => "authorize",
            AttemptPhase::Submit => "submit",
            AttemptPhase::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// Orchestrates swap attempts for one session.
pub struct SwapEngine {
    config: SwapConfig,
    quotes: QuoteEngine,
    safety: GasSafety,
    oracle: Arc<dyn ChainOracle>,
    builder: IntentBuilder,
    relay: RelayClient,
    locks: Arc<CoinLocks>,
    busy: AtomicBool,
}

impl SwapEngine {
    pub fn new(config: SwapConfig, oracle: Arc<dyn ChainOracle>) -> Result<Self> {
        config.validate()?;
        let relay = RelayClient::new(&config.relay.base_url, Some(config.relay.timeout_ms));
        Ok(Self {
            quotes: QuoteEngine::new(&config),
            safety: GasSafety::new(&config, Arc::clone(&oracle)),
            builder: IntentBuilder::new(&config),
            relay,
            oracle,
            config,
            locks: Arc::new(CoinLocks::new()),
            busy: AtomicBool::new(false),
        })
    }

    /// Share coin reservations with other engines spending the same wallet.
    pub fn with_coin_locks(mut self, locks: Arc<CoinLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    /// Price a pay-field input without touching the network.
    pub fn quote(&self, pay_input: &str) -> Result<Quote> {
        self.quotes.quote(pay_input)
    }

    /// Run one attempt and settle it into a `RelayResult`.
    pub async fn swap(&self, sender: &str, pay_input: &str, wallet: &dyn WalletSigner) -> RelayResult {
        let result = self.try_swap(sender, pay_input, wallet).await;
        if let Err(e) = &result {
            warn!(target: "gasmeup::ops", sender, retryable = e.is_retryable(), "swap attempt failed: {e}");
        }
        result.into()
    }

    /// Run one attempt, returning the transaction digest.
    ///
    /// Rejects a second attempt while one is in flight. Dropping the future
    /// abandons the attempt and releases its session and coin reservations.
    pub async fn try_swap(&self, sender: &str, pay_input: &str, wallet: &dyn WalletSigner) -> Result<String> {
        let _session = SessionGuard::enter(&self.busy)?;

        let quote = self.quotes.quote(pay_input)?;
        if quote.is_zero() {
            return Err(SwapError::InvalidInput("enter an amount to swap".into()));
        }

        let assessment = self.safety.assess().await;
        let checked = self.safety.check(quote, assessment)?;

        let funding = &self.config.funding_asset;
        let coins = self.oracle.owned_coins(sender, &funding.type_tag).await?;
        let buffer = funding.is_native().then_some(self.config.gas.native_gas_buffer);
        let selection = select_available_coin(&coins, checked.quote().pay_units, buffer, |coin| {
            self.locks.is_reserved(&coin.object_id)
        })?;
        let _lease = self.locks.reserve(&selection.coin.object_id)?;

        self.enter(AttemptPhase::Build, sender);
        let intent = self.builder.build(sender, &checked, &selection)?;

        self.enter(AttemptPhase::Authorize, sender);
        let signed = intent.authorize(wallet).await?;

        self.enter(AttemptPhase::Submit, sender);
        let submission = RelaySubmission::from(signed);
        let key = submission.idempotency_key.clone();
        let outcome = self.relay.try_submit(submission).await;

        self.enter(AttemptPhase::Settled, sender);
        match &outcome {
            Ok(digest) => info!(
                target: "gasmeup::ops",
                %digest,
                receive = %checked.quote().receive_amount,
                degraded_reserve = checked.assessment().degraded,
                "swap settled"
            ),
            Err(_) => debug!(target: "gasmeup::ops", %key, "submission failed; recover with the idempotency key"),
        }
        outcome
    }

    /// Ask the relay whether an abandoned submission landed.
    ///
    /// `Ok(None)` means the relay does not know the key; a relay outage is an error.
    pub async fn recover(&self, idempotency_key: &str) -> Result<Option<String>> {
        self.relay.status(idempotency_key).await
    }

    fn enter(&self, phase: AttemptPhase, sender: &str) {
        debug!(target: "gasmeup::ops", %phase, sender, "attempt phase");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gasmeup_tx::WalletError;
    use gasmeup_types::FundingCoin;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SENDER: &str = "0xa11ce";

    struct StubOracle {
        gas_price: Option<u64>,
        coins: Vec<FundingCoin>,
    }

    #[async_trait]
    impl ChainOracle for StubOracle {
        async fn reference_gas_price(&self) -> Result<u64> {
            self.gas_price
                .ok_or_else(|| SwapError::TransportFailure("rpc unreachable".into()))
        }

        async fn owned_coins(&self, _owner: &str, _coin_type: &str) -> Result<Vec<FundingCoin>> {
            Ok(self.coins.clone())
        }
    }

    #[derive(Default)]
    struct TestWallet {
        signed: AtomicUsize,
        decline: bool,
        entered: Option<Arc<Notify>>,
        release: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl WalletSigner for TestWallet {
        async fn sign_transaction(&self, tx_bytes: &[u8]) -> std::result::Result<Vec<u8>, WalletError> {
            if let Some(entered) = &self.entered {
                entered.notify_one();
            }
            if let Some(release) = &self.release {
                release.notified().await;
            }
            if self.decline {
                return Err(WalletError::Declined);
            }
            self.signed.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0xAB; 64].into_iter().chain(tx_bytes.iter().take(1).copied()).collect())
        }
    }

    fn coin(id: &str, balance: u64, asset_type: &str) -> FundingCoin {
        FundingCoin {
            object_id: id.into(),
            balance,
            asset_type: asset_type.into(),
            version: 3,
            digest: "digest".into(),
        }
    }

    fn config(relay_url: &str) -> SwapConfig {
        let mut config = SwapConfig::testnet();
        config.input_vault.object_id = "0x1001".into();
        config.output_vault.object_id = "0x1002".into();
        config.relay.base_url = relay_url.into();
        config.relay.sponsor_address = "0x5b0".into();
        config.gas.oracle_timeout_ms = 200;
        config
    }

    fn usdc_coins(config: &SwapConfig, balances: &[u64]) -> Vec<FundingCoin> {
        balances
            .iter()
            .enumerate()
            .map(|(i, b)| coin(&format!("0xc{:02}", i + 1), *b, &config.funding_asset.type_tag))
            .collect()
    }

    fn engine(config: SwapConfig, gas_price: Option<u64>, coins: Vec<FundingCoin>) -> SwapEngine {
        SwapEngine::new(config, Arc::new(StubOracle { gas_price, coins })).unwrap()
    }

    async fn relay_ok(expected: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sponsor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"digest": "DiGeSt"})))
            .expect(expected)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn successful_swap_settles_with_digest() {
        let server = relay_ok(1).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[5_000_000, 250_000_000]);
        let engine = engine(config, Some(750), coins);
        let wallet = TestWallet::default();

        let result = engine.swap(SENDER, "100", &wallet).await;
        assert_eq!(result, RelayResult::settled("DiGeSt".into()));
        assert_eq!(wallet.signed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn small_quote_is_rejected_before_any_relay_call() {
        let server = relay_ok(0).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000]);
        let engine = engine(config, Some(1_000), coins);
        let wallet = TestWallet::default();

        let err = engine.try_swap(SENDER, "0.01", &wallet).await.unwrap_err();
        assert!(matches!(err, SwapError::QuoteTooSmall { reserve: 4_500_000, .. }));
        assert_eq!(wallet.signed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn insufficient_balance_builds_no_intent() {
        let server = relay_ok(0).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[40_000_000, 90_000_000]);
        let engine = engine(config, Some(1_000), coins);
        let wallet = TestWallet::default();

        let err = engine.try_swap(SENDER, "100", &wallet).await.unwrap_err();
        assert!(matches!(
            err,
            SwapError::InsufficientBalance { required: 100_000_000, available: 90_000_000 }
        ));
        assert_eq!(err.shortfall(), Some(10_000_000));
        assert_eq!(wallet.signed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oracle_outage_proceeds_with_fallback_reserve() {
        let server = relay_ok(1).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000]);
        let engine = engine(config, None, coins);

        let result = engine.swap(SENDER, "100", &TestWallet::default()).await;
        assert!(result.success);

        // Above the 0.0045 SUI oracle reserve but below the 0.01 SUI fallback.
        let err = engine.try_swap(SENDER, "0.02", &TestWallet::default()).await.unwrap_err();
        assert!(matches!(err, SwapError::QuoteTooSmall { reserve: 10_000_000, .. }));
    }

    #[tokio::test]
    async fn relay_failure_is_reported_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sponsor"))
            .respond_with(ResponseTemplate::new(500).set_body_string("gas exhausted"))
            .expect(1)
            .mount(&server)
            .await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000]);
        let engine = engine(config, Some(1_000), coins);

        let result = engine.swap(SENDER, "100", &TestWallet::default()).await;
        assert!(!result.success);
        assert_eq!(result.digest, None);
        assert_eq!(result.error.as_deref(), Some("Backend error: 500 - gas exhausted"));
    }

    #[tokio::test]
    async fn declined_signature_never_reaches_relay() {
        let server = relay_ok(0).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000]);
        let engine = engine(config, Some(1_000), coins);
        let wallet = TestWallet {
            decline: true,
            ..Default::default()
        };

        let err = engine.try_swap(SENDER, "100", &wallet).await.unwrap_err();
        assert!(matches!(err, SwapError::UserRejected(_)));

        // Session and coin are free again.
        let engine_locks = Arc::clone(&engine.locks);
        assert!(!engine_locks.is_reserved("0xc01"));
    }

    #[tokio::test]
    async fn invalid_and_empty_input_fail_locally() {
        let server = relay_ok(0).await;
        let config = config(&server.uri());
        let engine = engine(config, Some(1_000), Vec::new());
        let wallet = TestWallet::default();

        assert!(matches!(
            engine.try_swap(SENDER, "1.2.3", &wallet).await,
            Err(SwapError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.try_swap(SENDER, "", &wallet).await,
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn second_attempt_is_rejected_while_first_is_authorizing() {
        let server = relay_ok(1).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000, 250_000_000]);
        let engine = engine(config, Some(1_000), coins);

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let slow = TestWallet {
            entered: Some(Arc::clone(&entered)),
            release: Some(Arc::clone(&release)),
            ..Default::default()
        };

        let (first, second) = tokio::join!(engine.try_swap(SENDER, "100", &slow), async {
            entered.notified().await;
            let second = engine.try_swap(SENDER, "100", &TestWallet::default()).await;
            release.notify_one();
            second
        });

        assert_eq!(first.unwrap(), "DiGeSt");
        assert!(matches!(second, Err(SwapError::AttemptInProgress)));
    }

    #[tokio::test]
    async fn shared_coin_locks_move_second_attempt_to_free_coin() {
        let server = relay_ok(2).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000, 250_000_000]);
        let locks = Arc::new(CoinLocks::new());
        let first_engine = engine(config.clone(), Some(1_000), coins.clone()).with_coin_locks(Arc::clone(&locks));
        let second_engine = engine(config, Some(1_000), coins).with_coin_locks(Arc::clone(&locks));

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let slow = TestWallet {
            entered: Some(Arc::clone(&entered)),
            release: Some(Arc::clone(&release)),
            ..Default::default()
        };

        let (first, second) = tokio::join!(first_engine.try_swap(SENDER, "100", &slow), async {
            entered.notified().await;
            assert!(locks.is_reserved("0xc01"));
            let second = second_engine.try_swap(SENDER, "100", &TestWallet::default()).await;
            release.notify_one();
            second
        });

        assert_eq!(first.unwrap(), "DiGeSt");
        assert_eq!(second.unwrap(), "DiGeSt");
        assert!(!locks.is_reserved("0xc01"));
        assert!(!locks.is_reserved("0xc02"));
    }

    #[tokio::test]
    async fn shared_coin_locks_reject_double_spend_across_engines() {
        let server = relay_ok(1).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000]);
        let locks = Arc::new(CoinLocks::new());
        let first_engine = engine(config.clone(), Some(1_000), coins.clone()).with_coin_locks(Arc::clone(&locks));
        let second_engine = engine(config, Some(1_000), coins).with_coin_locks(Arc::clone(&locks));

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let slow = TestWallet {
            entered: Some(Arc::clone(&entered)),
            release: Some(Arc::clone(&release)),
            ..Default::default()
        };

        let (first, second) = tokio::join!(first_engine.try_swap(SENDER, "100", &slow), async {
            entered.notified().await;
            let second = second_engine.try_swap(SENDER, "100", &TestWallet::default()).await;
            release.notify_one();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(SwapError::CoinInUse(id)) if id == "0xc01"));
        assert!(!locks.is_reserved("0xc01"));
    }

    #[tokio::test]
    async fn abandoned_attempt_releases_reservations_without_settling() {
        let server = relay_ok(1).await;
        let config = config(&server.uri());
        let coins = usdc_coins(&config, &[250_000_000]);
        let engine = engine(config, Some(1_000), coins);

        let hanging = TestWallet {
            release: Some(Arc::new(Notify::new())),
            ..Default::default()
        };
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            engine.try_swap(SENDER, "100", &hanging),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(hanging.signed.load(Ordering::SeqCst), 0);
        assert!(!engine.locks.is_reserved("0xc01"));

        let result = engine.swap(SENDER, "100", &TestWallet::default()).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn native_funding_keeps_gas_buffer() {
        let server = relay_ok(1).await;
        let mut config = config(&server.uri());
        std::mem::swap(&mut config.funding_asset, &mut config.output_asset);
        config.pricing.rate = "1.5".parse().unwrap();
        let sui = config.funding_asset.type_tag.clone();
        // 2 SUI + 0.05 SUI buffer: the first coin is exactly at the threshold.
        let coins = vec![coin("0xc01", 2_050_000_000, &sui), coin("0xc02", 2_050_000_001, &sui)];
        let locks = Arc::new(CoinLocks::new());
        let engine = engine(config, Some(1_000), coins).with_coin_locks(Arc::clone(&locks));

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let slow = TestWallet {
            entered: Some(Arc::clone(&entered)),
            release: Some(Arc::clone(&release)),
            ..Default::default()
        };
        let (result, chosen) = tokio::join!(engine.try_swap(SENDER, "2", &slow), async {
            entered.notified().await;
            let chosen = (locks.is_reserved("0xc01"), locks.is_reserved("0xc02"));
            release.notify_one();
            chosen
        });

        assert!(result.is_ok());
        assert_eq!(chosen, (false, true));
    }

    #[tokio::test]
    async fn recover_queries_status_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/status/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"digest": "late"})))
            .expect(1)
            .mount(&server)
            .await;
        let engine = engine(config(&server.uri()), Some(1_000), Vec::new());
        assert_eq!(engine.recover("feed").await.unwrap(), Some("late".into()));
    }

    #[tokio::test]
    async fn recover_reports_relay_outage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/status/feed"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        let engine = engine(config(&server.uri()), Some(1_000), Vec::new());
        let err = engine.recover("feed").await.unwrap_err();
        assert!(matches!(err, SwapError::RelayRejected { status: 503, .. }));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = SwapConfig::testnet();
        config.pricing.rate = "0".parse().unwrap();
        let oracle = Arc::new(StubOracle { gas_price: None, coins: Vec::new() });
        assert!(matches!(SwapEngine::new(config, oracle), Err(SwapError::Config(_))));
    }
}

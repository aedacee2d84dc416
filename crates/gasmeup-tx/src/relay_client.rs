//! HTTP client for the sponsor relay.
//!
//! Endpoints:
//! - POST /api/v1/sponsor
//! - GET /api/v1/status/<idempotency_key>

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use gasmeup_types::{Result, SwapError};

use crate::SignedPayload;

/// Header carrying the submission's idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Wire request for one sponsored submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySubmission {
    pub tx_bytes: String,
    pub signature: String,
    #[serde(skip)]
    pub idempotency_key: String,
}

impl From<SignedPayload> for RelaySubmission {
    fn from(payload: SignedPayload) -> Self {
        let idempotency_key = hex::encode(Sha256::digest(&payload.transaction_bytes));
        Self {
            tx_bytes: BASE64.encode(&payload.transaction_bytes),
            signature: BASE64.encode(&payload.signature),
            idempotency_key,
        }
    }
}

/// Terminal outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResult {
    pub fn settled(digest: String) -> Self {
        Self {
            success: true,
            digest: Some(digest),
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            digest: None,
            error: Some(error.to_string()),
        }
    }
}

impl From<Result<String>> for RelayResult {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(digest) => RelayResult::settled(digest),
            Err(e) => RelayResult::failed(e),
        }
    }
}

/// Relay reply body. Successful replies carry `digest`; some relays answer 2xx
/// with an `error` instead.
#[derive(Debug, Clone, Deserialize)]
struct SponsorResponse {
    digest: Option<String>,
    error: Option<String>,
}

/// Sponsor relay client.
pub struct RelayClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Submit once and normalize the reply. Never retries.
    pub async fn submit(&self, submission: RelaySubmission) -> RelayResult {
        self.try_submit(submission).await.into()
    }

    /// Submit once, returning the transaction digest.
    ///
    /// POST /api/v1/sponsor
    pub async fn try_submit(&self, submission: RelaySubmission) -> Result<String> {
        let url = format!("{}/api/v1/sponsor", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_HEADER, &submission.idempotency_key)
            .json(&submission)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "gasmeup::relay", key = %submission.idempotency_key, "relay unreachable: {e}");
                SwapError::TransportFailure(format!("relay request failed: {}", e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(target: "gasmeup::relay", status = status.as_u16(), %body, "relay rejected submission");
            return Err(SwapError::RelayRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: SponsorResponse = resp.json().await.map_err(|e| {
            warn!(target: "gasmeup::relay", key = %submission.idempotency_key, "unreadable relay reply: {e}");
            SwapError::RelayRejected {
                status: status.as_u16(),
                body: format!(
                    "unreadable relay response ({}); check submission {} before retrying",
                    e, submission.idempotency_key
                ),
            }
        })?;

        match body.digest {
            Some(digest) => {
                info!(target: "gasmeup::relay", %digest, key = %submission.idempotency_key, "sponsored transaction submitted");
                Ok(digest)
            }
            None => Err(SwapError::RelayRejected {
                status: status.as_u16(),
                body: body.error.unwrap_or_else(|| "relay response missing digest".into()),
            }),
        }
    }

    /// Digest of a previous submission, if the relay has landed it.
    ///
    /// `None` only when the relay answers 404 or has no digest yet. Other
    /// non-2xx replies are errors: the outcome is still unknown.
    ///
    /// GET /api/v1/status/<idempotency_key>
    pub async fn status(&self, idempotency_key: &str) -> Result<Option<String>> {
        let url = format!("{}/api/v1/status/{}", self.base_url, idempotency_key);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SwapError::TransportFailure(format!("relay request failed: {}", e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SwapError::RelayRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: SponsorResponse = resp.json().await.map_err(|e| {
            SwapError::TransportFailure(format!("failed to parse relay response: {}", e))
        })?;

        Ok(body.digest)
    }

    /// Poll `status` until a digest appears, waiting between attempts.
    pub async fn wait_for_digest(
        &self,
        idempotency_key: &str,
        max_attempts: u32,
        poll_interval_ms: u64,
    ) -> Result<String> {
        for attempt in 0..max_attempts {
            if let Some(digest) = self.status(idempotency_key).await? {
                return Ok(digest);
            }
            if attempt + 1 < max_attempts {
                tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await;
            }
        }
        Err(SwapError::TransportFailure(format!(
            "digest not available after {} attempts for submission {}",
            max_attempts, idempotency_key
        )))
    }
}

//! Settlement handoff to the payment endpoint.
//!
//! When a session stops, the amount owed is posted once to
//! `POST /api/invest` as `{usdCents, toAddress}`. The endpoint converts the
//! amount to SOL and returns the transaction signature. Failures are reported
//! to the caller and never retried automatically.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Payment endpoint configuration.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Base URL, e.g. `http://localhost:3000`
    pub base_url: String,
}

impl PaymentConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    /// Get the settlement endpoint URL.
    pub fn invest_url(&self) -> String {
        format!("{}/api/invest", self.url())
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }
}

/// Settlement error types.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Configuration error
    #[error("Payment config error: {0}")]
    Config(String),
    /// Network/HTTP error
    #[error("Payment network error: {0}")]
    Network(String),
    /// Endpoint refused the payment
    #[error("Payment rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// Response could not be decoded
    #[error("Payment response error: {0}")]
    Serialization(String),
}

/// Request body for the settlement endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestRequest {
    pub usd_cents: u64,
    pub to_address: String,
}

/// Successful endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestResponse {
    /// Transaction signature
    pub sig: String,
    /// Amount transferred, in SOL
    pub sol_amount: f64,
    /// Block explorer link for the transaction
    pub explorer: String,
}

/// Error body returned with a non-200 status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Outcome of one settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub amount_cents: u64,
    /// Absent when nothing was sent
    pub transaction_id: Option<String>,
    /// Empty when no destination was configured
    pub destination_address: String,
    pub explorer_url: Option<String>,
}

impl SettlementResult {
    fn skipped(amount_cents: u64, destination_address: &str) -> Self {
        Self {
            amount_cents,
            transaction_id: None,
            destination_address: destination_address.to_string(),
            explorer_url: None,
        }
    }

    /// Whether a transfer actually happened.
    pub fn is_settled(&self) -> bool {
        self.transaction_id.is_some()
    }
}

/// HTTP client for the payment endpoint.
#[derive(Debug, Clone)]
pub struct PaymentClient {
    config: PaymentConfig,
    client: reqwest::Client,
}

impl PaymentClient {
    pub fn new(config: PaymentConfig) -> Result<Self, SettlementError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SettlementError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Test connection to the endpoint.
    pub async fn test_connection(&self) -> Result<bool, SettlementError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| SettlementError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Post one payment.
    pub async fn invest(
        &self,
        usd_cents: u64,
        to_address: &str,
    ) -> Result<InvestResponse, SettlementError> {
        let request = InvestRequest {
            usd_cents,
            to_address: to_address.to_string(),
        };

        let response = self
            .client
            .post(self.config.invest_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| SettlementError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(SettlementError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| SettlementError::Serialization(e.to_string()))
    }
}

/// Forwards a stopped session's total to the payment endpoint.
#[derive(Debug, Clone)]
pub struct SettlementHandoff {
    client: PaymentClient,
}

impl SettlementHandoff {
    pub fn new(client: PaymentClient) -> Self {
        Self { client }
    }

    pub fn from_url(base_url: impl Into<String>) -> Result<Self, SettlementError> {
        Ok(Self::new(PaymentClient::new(PaymentConfig::new(base_url))?))
    }

    /// Settle `cents` to `address`.
    ///
    /// Nothing is sent when the amount is zero or no address is given; the
    /// result then carries no transaction id.
    pub async fn settle(
        &self,
        cents: u64,
        address: Option<&str>,
    ) -> Result<SettlementResult, SettlementError> {
        let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
            tracing::info!("No destination address configured, {cents} cents left unsettled");
            return Ok(SettlementResult::skipped(cents, ""));
        };

        if cents == 0 {
            tracing::info!("Nothing owed, skipping settlement");
            return Ok(SettlementResult::skipped(0, address));
        }

        tracing::info!("Settling {cents} cents to {address}");
        match self.client.invest(cents, address).await {
            Ok(response) => {
                tracing::info!(
                    "Settled {cents} cents ({} SOL), signature {}",
                    response.sol_amount,
                    response.sig
                );
                Ok(SettlementResult {
                    amount_cents: cents,
                    transaction_id: Some(response.sig),
                    destination_address: address.to_string(),
                    explorer_url: Some(response.explorer),
                })
            }
            Err(e) => {
                tracing::error!("Settlement of {cents} cents failed: {e}");
                Err(e)
            }
        }
    }
}

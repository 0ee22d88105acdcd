//! Payment endpoint logic: validation, price conversion and transfer.
//!
//! This is the server side of `POST /api/invest`. It is kept independent of
//! the HTTP framework so the rules can be tested directly; `server` only maps
//! results to responses.

use crate::settlement::InvestResponse;
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Price used when none is configured, in USD per SOL.
pub const DEFAULT_SOL_PRICE_USD: f64 = 100.0;

/// Default Solana RPC endpoint.
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

const COINGECKO_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd";

/// Length of an ed25519 public key, in bytes.
const PUBKEY_LEN: usize = 32;

/// Length of a transaction signature, in bytes.
const SIGNATURE_LEN: usize = 64;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors returned by the payment endpoint.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid JSON")]
    InvalidJson,
    #[error("usdCents must be a positive integer")]
    InvalidAmount,
    #[error("toAddress must be a base58 Solana address")]
    InvalidAddress,
    #[error("Amount too small at current SOL price")]
    AmountTooSmall,
    #[error("Server not configured: {0}")]
    NotConfigured(String),
    #[error("Price lookup failed: {0}")]
    Price(String),
    #[error("Transfer failed: {0}")]
    Transfer(String),
}

impl PaymentError {
    /// HTTP status for this error: 400 for caller input, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::InvalidJson
            | PaymentError::InvalidAmount
            | PaymentError::InvalidAddress
            | PaymentError::AmountTooSmall => 400,
            PaymentError::NotConfigured(_)
            | PaymentError::Price(_)
            | PaymentError::Transfer(_) => 500,
        }
    }

    /// Short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::InvalidJson => "INVALID_JSON",
            PaymentError::InvalidAmount => "INVALID_AMOUNT",
            PaymentError::InvalidAddress => "INVALID_ADDRESS",
            PaymentError::AmountTooSmall => "AMOUNT_TOO_SMALL",
            PaymentError::NotConfigured(_) => "NOT_CONFIGURED",
            PaymentError::Price(_) => "PRICE_ERROR",
            PaymentError::Transfer(_) => "TRANSFER_ERROR",
        }
    }
}

/// Whether `address` is a base58 string decoding to a 32-byte public key.
pub fn validate_address(address: &str) -> bool {
    bs58::decode(address)
        .into_vec()
        .map(|bytes| bytes.len() == PUBKEY_LEN)
        .unwrap_or(false)
}

/// Lamports for `usd_cents` at `price_usd` per SOL, rounded down.
pub fn lamports_for(usd_cents: u64, price_usd: f64) -> u64 {
    if !price_usd.is_finite() || price_usd <= 0.0 {
        return 0;
    }
    let sol = usd_cents as f64 / 100.0 / price_usd;
    (sol * LAMPORTS_PER_SOL).floor().max(0.0) as u64
}

/// Block explorer link for a devnet transaction.
pub fn explorer_url(signature: &str) -> String {
    format!("https://explorer.solana.com/tx/{signature}?cluster=devnet")
}

/// Validated `{usdCents, toAddress}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestOrder {
    pub usd_cents: u64,
    pub to_address: String,
}

impl InvestOrder {
    /// Validate a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        let value: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_slice(body).map_err(|_| PaymentError::InvalidJson)?
        };

        let usd_cents = value
            .get("usdCents")
            .and_then(serde_json::Value::as_u64)
            .filter(|cents| *cents > 0)
            .ok_or(PaymentError::InvalidAmount)?;

        let to_address = value
            .get("toAddress")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|address| validate_address(address))
            .ok_or(PaymentError::InvalidAddress)?
            .to_string();

        Ok(Self {
            usd_cents,
            to_address,
        })
    }
}

/// Where the SOL/USD price comes from.
#[derive(Debug, Clone)]
pub enum PriceSource {
    /// A fixed price in USD per SOL
    Fixed(f64),
    /// The CoinGecko simple price API
    CoinGecko,
}

impl Default for PriceSource {
    fn default() -> Self {
        PriceSource::Fixed(DEFAULT_SOL_PRICE_USD)
    }
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    solana: CoinGeckoUsd,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoUsd {
    usd: f64,
}

impl PriceSource {
    /// Current price in USD per SOL.
    pub async fn price_usd(&self, client: &reqwest::Client) -> Result<f64, PaymentError> {
        let price = match self {
            PriceSource::Fixed(price) => *price,
            PriceSource::CoinGecko => {
                let response = client
                    .get(COINGECKO_PRICE_URL)
                    .send()
                    .await
                    .map_err(|e| PaymentError::Price(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(PaymentError::Price(format!(
                        "price API returned {}",
                        response.status()
                    )));
                }
                let body: CoinGeckoPrice = response
                    .json()
                    .await
                    .map_err(|e| PaymentError::Price(e.to_string()))?;
                body.solana.usd
            }
        };

        if price.is_finite() && price > 0.0 {
            Ok(price)
        } else {
            Err(PaymentError::Price(format!("unusable price {price}")))
        }
    }
}

/// Moves lamports to a destination address.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Transfer `lamports` to `to_address`, returning the transaction signature.
    async fn transfer(&self, to_address: &str, lamports: u64) -> Result<String, PaymentError>;
}

/// Pretends to transfer and returns a random signature.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedTransfer;

impl SimulatedTransfer {
    fn random_signature() -> String {
        let mut bytes = [0u8; SIGNATURE_LEN];
        rand::thread_rng().fill(&mut bytes[..]);
        bs58::encode(bytes).into_string()
    }
}

#[async_trait]
impl TransferBackend for SimulatedTransfer {
    async fn transfer(&self, to_address: &str, lamports: u64) -> Result<String, PaymentError> {
        let sig = Self::random_signature();
        tracing::info!("Simulated transfer of {lamports} lamports to {to_address}: {sig}");
        Ok(sig)
    }
}

/// Funds the destination through a devnet `requestAirdrop` call.
#[derive(Debug, Clone)]
pub struct DevnetAirdrop {
    rpc_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

impl DevnetAirdrop {
    pub fn new(rpc_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            client,
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl TransferBackend for DevnetAirdrop {
    async fn transfer(&self, to_address: &str, lamports: u64) -> Result<String, PaymentError> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "requestAirdrop",
            "params": [to_address, lamports],
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Transfer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Transfer(format!("RPC returned {status}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Transfer(e.to_string()))?;

        match (body.result, body.error) {
            (Some(sig), _) => Ok(sig),
            (None, Some(error)) => Err(PaymentError::Transfer(error.message)),
            (None, None) => Err(PaymentError::Transfer("empty RPC response".to_string())),
        }
    }
}

/// Handles settlement requests end to end.
#[derive(Clone)]
pub struct InvestService {
    price: PriceSource,
    backend: Option<Arc<dyn TransferBackend>>,
    client: reqwest::Client,
}

impl InvestService {
    pub fn new(
        price: PriceSource,
        backend: Option<Arc<dyn TransferBackend>>,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            price,
            backend,
            client,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Validate, convert and transfer.
    pub async fn invest(&self, body: &[u8]) -> Result<InvestResponse, PaymentError> {
        let order = InvestOrder::parse(body)?;

        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| PaymentError::NotConfigured("no transfer backend".to_string()))?;

        let price = self.price.price_usd(&self.client).await?;
        let sol_amount = order.usd_cents as f64 / 100.0 / price;
        let lamports = lamports_for(order.usd_cents, price);
        if lamports == 0 {
            return Err(PaymentError::AmountTooSmall);
        }

        let sig = backend.transfer(&order.to_address, lamports).await?;
        Ok(InvestResponse {
            explorer: explorer_url(&sig),
            sig,
            sol_amount,
        })
    }
}

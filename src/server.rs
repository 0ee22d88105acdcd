//! Reference payment endpoint.
//!
//! A small HTTP server that accepts settlement requests from the tracker and
//! turns them into SOL transfers on devnet:
//! - `GET /health`
//! - `POST /api/invest` with `{usdCents, toAddress}`
//!
//! # Architecture
//!
//! ```text
//! focus-fee run ──→ POST /api/invest ──→ price lookup ──→ transfer backend ──→ devnet
//!                                          (fixed or         (airdrop or
//!                                           CoinGecko)        simulated)
//! ```

use crate::payment::{InvestService, PaymentError, PriceSource, TransferBackend};
use crate::settlement::InvestResponse;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Where the SOL price comes from
    pub price: PriceSource,
    /// How transfers are made; `None` rejects every request with 500
    pub backend: Option<Arc<dyn TransferBackend>>,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, price: PriceSource, backend: Option<Arc<dyn TransferBackend>>) -> Self {
        Self {
            port,
            price,
            backend,
        }
    }
}

/// Shared server state
pub struct ServerState {
    service: InvestService,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Result<Self, PaymentError> {
        Ok(Self {
            service: InvestService::new(config.price.clone(), config.backend.clone())?,
        })
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_response(e: &PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: e.code().to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/invest
///
/// The body is read raw so malformed JSON gets the same `{error}` shape as
/// every other failure.
async fn invest(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<InvestResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service.invest(&body).await {
        Ok(response) => {
            tracing::info!(
                "Invest succeeded: {} SOL, signature {}",
                response.sol_amount,
                response.sig
            );
            Ok(Json(response))
        }
        Err(e) => {
            if e.status_code() >= 500 {
                tracing::error!("Invest failed: {e}");
            } else {
                tracing::warn!("Invest rejected: {e}");
            }
            Err(error_response(&e))
        }
    }
}

/// Not found fallback
async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
            code: "NOT_FOUND".to_string(),
        }),
    )
}

/// Known route, wrong method
async fn method_not_allowed() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse {
            error: "Method not allowed".to_string(),
            code: "METHOD_NOT_ALLOWED".to_string(),
        }),
    )
}

/// Build the router.
pub fn router(config: &ServerConfig) -> Result<Router, PaymentError> {
    let state = Arc::new(ServerState::new(config)?);

    Ok(Router::new()
        .route("/health", get(health).fallback(method_not_allowed))
        .route("/api/invest", post(invest).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state))
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(&config)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Payment endpoint listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

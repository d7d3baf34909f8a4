//! Market data lookup. The ledger only ever sees the `PriceOracle` trait, so
//! the HTTP quote service can be swapped for the in-process table in tests
//! and offline runs.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("no tradable price for symbol {0}")]
    SymbolNotFound(String),

    #[error("market data temporarily unavailable: {0}")]
    TemporarilyUnavailable(String),
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current price for a symbol. `SymbolNotFound` is permanent for the
    /// request; `TemporarilyUnavailable` may be retried by the caller.
    async fn price(&self, symbol: &str) -> Result<Decimal, OracleError>;
}

/// Client for an external quote service exposing `GET {base}/quote/{symbol}`.
#[derive(Clone)]
pub struct HttpPriceOracle {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct QuoteResponse {
    price: Decimal,
}

impl HttpPriceOracle {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn price(&self, symbol: &str) -> Result<Decimal, OracleError> {
        let url = format!("{}/quote/{}", self.base_url, symbol);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::TemporarilyUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OracleError::SymbolNotFound(symbol.to_string()));
        }
        if !response.status().is_success() {
            return Err(OracleError::TemporarilyUnavailable(format!(
                "quote service returned {}",
                response.status()
            )));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| OracleError::TemporarilyUnavailable(e.to_string()))?;

        if quote.price <= Decimal::ZERO {
            return Err(OracleError::SymbolNotFound(symbol.to_string()));
        }
        Ok(quote.price)
    }
}

/// Fixed price table keyed by uppercase symbol. Backs tests and runs without
/// a configured quote service.
#[derive(Default)]
pub struct StaticOracle {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices
            .write()
            .await
            .insert(symbol.to_uppercase(), price);
    }

    pub async fn remove_price(&self, symbol: &str) {
        self.prices.write().await.remove(&symbol.to_uppercase());
    }
}

#[async_trait]
impl PriceOracle for StaticOracle {
    async fn price(&self, symbol: &str) -> Result<Decimal, OracleError> {
        self.prices
            .read()
            .await
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| OracleError::SymbolNotFound(symbol.to_string()))
    }
}

//! Startup configuration. Everything the process needs is read once from the
//! environment here and passed down explicitly; nothing reads env vars later.

use rust_decimal::Decimal;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// When absent the service runs memory-only (no durability).
    pub database_url: Option<String>,
    pub jwt_secret: Vec<u8>,
    /// When absent the static price table is used instead of the HTTP oracle.
    pub oracle_url: Option<String>,
    pub oracle_timeout: Duration,
    pub starting_balance: Decimal,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_STARTING_BALANCE: &str = "100000.00";

impl Config {
    /// Load from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::Missing("JWT_SECRET"))?
            .into_bytes();

        let oracle_timeout_ms = match env::var("ORACLE_TIMEOUT_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid("ORACLE_TIMEOUT_MS", e.to_string()))?,
            Err(_) => DEFAULT_ORACLE_TIMEOUT_MS,
        };

        let starting_balance = env::var("STARTING_BALANCE")
            .unwrap_or_else(|_| DEFAULT_STARTING_BALANCE.to_string())
            .parse::<Decimal>()
            .map_err(|e| ConfigError::Invalid("STARTING_BALANCE", e.to_string()))?;
        if starting_balance < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "STARTING_BALANCE",
                "must not be negative".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            jwt_secret,
            oracle_url: env::var("ORACLE_URL").ok(),
            oracle_timeout: Duration::from_millis(oracle_timeout_ms),
            starting_balance,
        })
    }
}

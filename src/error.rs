use rust_decimal::Decimal;
use thiserror::Error;

use crate::oracle::OracleError;
use crate::types::order::OrderStatus;

/// Domain failures surfaced by ledger operations. Business-rule failures are
/// deterministic and never retried; `Internal` means the store rejected the
/// write and the whole mutation was rolled back.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("user not found")]
    UserNotFound,

    #[error("price unavailable for {symbol}: {source}")]
    PriceUnavailable { symbol: String, source: OracleError },

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("insufficient shares of {symbol}: holding {held}, tried to sell {requested}")]
    InsufficientShares {
        symbol: String,
        held: Decimal,
        requested: Decimal,
    },

    #[error("no open position in {symbol}")]
    NoPosition { symbol: String },

    #[error("username or email already exists")]
    DuplicateUser,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not allowed to access another user's account")]
    Unauthorized,

    #[error("limit order not found")]
    OrderNotFound,

    #[error("limit order is already {status:?}")]
    OrderClosed { status: OrderStatus },

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Internal(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

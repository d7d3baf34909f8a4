use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::error::LedgerError;

/// Wrapper mapping ledger failures and auth rejections onto HTTP responses.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("authentication required")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("failed to issue token")]
    TokenCreation(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingToken | ApiError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::TokenCreation(error) => {
                tracing::error!(%error, "token creation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an internal error occurred".to_string(),
                )
            }
            ApiError::Ledger(ledger_error) => match ledger_error {
                LedgerError::Validation(_)
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::InsufficientShares { .. }
                | LedgerError::NoPosition { .. }
                | LedgerError::OrderClosed { .. } => {
                    (StatusCode::BAD_REQUEST, ledger_error.to_string())
                }
                LedgerError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, ledger_error.to_string())
                }
                LedgerError::Unauthorized => (StatusCode::FORBIDDEN, ledger_error.to_string()),
                LedgerError::UserNotFound | LedgerError::OrderNotFound => {
                    (StatusCode::NOT_FOUND, ledger_error.to_string())
                }
                LedgerError::DuplicateUser => (StatusCode::CONFLICT, ledger_error.to_string()),
                LedgerError::PriceUnavailable { .. } => {
                    (StatusCode::BAD_GATEWAY, ledger_error.to_string())
                }
                LedgerError::Internal(error) => {
                    tracing::error!(%error, "storage error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "an internal error occurred".to_string(),
                    )
                }
                LedgerError::PasswordHash(error) => {
                    tracing::error!(%error, "password hashing error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "an internal error occurred".to_string(),
                    )
                }
            },
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
